//! Random forest classifier
//!
//! Bagged Gini trees with per-split feature subsampling. Trees are grown in
//! parallel; tree `i` draws from its own RNG seeded from `(seed, i)`, so the
//! fitted forest does not depend on thread scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::model::tree::{Criterion, Tree, TreeBuilder, TreeParams};
use crate::model::validate_training_set;
use crate::Result;

/// Features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
    Count(usize),
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().round() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().round() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(k) => k,
        };
        k.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
}

impl Default for ForestConfig {
    fn default() -> Self {
        ForestConfig {
            n_trees: 200,
            max_depth: 15,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<Tree>,
}

impl RandomForest {
    /// Fit on rows `x` with 0/1 labels `y`
    pub fn fit(x: &[Vec<f64>], y: &[f64], config: &ForestConfig, seed: u64) -> Result<Self> {
        let n_features = validate_training_set(x, y)?;
        let n = x.len();
        let params = TreeParams {
            criterion: Criterion::Gini,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features: Some(config.max_features.resolve(n_features)),
        };
        let ones = vec![1.0; n];

        let trees: Vec<Tree> = (0..config.n_trees.max(1))
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(tree_seed(seed, i));
                let rows: Vec<usize> = if config.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                TreeBuilder::new(x, y, &ones, &params, (0..n_features).collect(), &mut rng).build(rows)
            })
            .collect();

        log::debug!(
            "Random forest: {} trees, mean {:.1} nodes",
            trees.len(),
            trees.iter().map(Tree::node_count).sum::<usize>() as f64 / trees.len() as f64
        );

        Ok(RandomForest { n_features, trees })
    }

    /// Mean of per-tree positive-class fractions
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        (sum / self.trees.len() as f64).clamp(0.0, 1.0)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

fn tree_seed(seed: u64, index: usize) -> u64 {
    seed ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(7);
        let mut x = Vec::new();
        let mut y = Vec::new();
        for _ in 0..200 {
            let a: f64 = rng.gen_range(-1.0..1.0);
            let b: f64 = rng.gen_range(-1.0..1.0);
            let noise: f64 = rng.gen_range(-1.0..1.0);
            x.push(vec![a, b, noise]);
            y.push(if a + 0.5 * b > 0.0 { 1.0 } else { 0.0 });
        }
        (x, y)
    }

    fn small_config() -> ForestConfig {
        ForestConfig {
            n_trees: 25,
            max_depth: 6,
            ..ForestConfig::default()
        }
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(24), 5);
        assert_eq!(MaxFeatures::Log2.resolve(24), 5);
        assert_eq!(MaxFeatures::All.resolve(24), 24);
        assert_eq!(MaxFeatures::Count(100).resolve(24), 24);
        assert_eq!(MaxFeatures::Count(0).resolve(24), 1);
    }

    #[test]
    fn test_forest_learns_linear_boundary() {
        let (x, y) = toy_data();
        let forest = RandomForest::fit(&x, &y, &small_config(), 42).unwrap();
        assert_eq!(forest.n_trees(), 25);

        let correct = x
            .iter()
            .zip(&y)
            .filter(|(row, label)| (forest.predict_proba(row) >= 0.5) == (**label == 1.0))
            .count();
        assert!(correct as f64 / x.len() as f64 > 0.9);
        assert!(forest.predict_proba(&[0.9, 0.9, 0.0]) > 0.7);
        assert!(forest.predict_proba(&[-0.9, -0.9, 0.0]) < 0.3);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = toy_data();
        let a = RandomForest::fit(&x, &y, &small_config(), 9).unwrap();
        let b = RandomForest::fit(&x, &y, &small_config(), 9).unwrap();
        for row in x.iter().take(20) {
            assert_eq!(a.predict_proba(row), b.predict_proba(row));
        }
    }

    #[test]
    fn test_rejects_empty_input() {
        assert!(RandomForest::fit(&[], &[], &small_config(), 1).is_err());
    }
}
