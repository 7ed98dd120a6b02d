//! Gradient boosted trees on logistic loss
//!
//! Second-order boosting: each round fits a Newton tree to the gradient and
//! hessian of the log loss at the current margins, with shrinkage, row and
//! column subsampling, L2 leaf regularization and a split penalty.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::model::tree::{Criterion, Tree, TreeBuilder, TreeParams};
use crate::model::{sigmoid, validate_training_set};
use crate::{CricketError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingConfig {
    /// Learner name reported in training output
    pub name: String,
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub lambda: f64,
    /// Minimum gain to make a split
    pub gamma: f64,
    /// Row fraction sampled per round
    pub subsample: f64,
    /// Column fraction sampled per round
    pub colsample: f64,
}

impl BoostingConfig {
    /// Deep, slow-learning booster
    pub fn slow() -> Self {
        BoostingConfig {
            name: "gbm_slow".to_string(),
            n_rounds: 300,
            learning_rate: 0.03,
            max_depth: 6,
            min_child_weight: 1.0,
            lambda: 1.0,
            gamma: 0.1,
            subsample: 0.85,
            colsample: 0.85,
        }
    }

    /// Shallow, fast-learning booster
    pub fn fast() -> Self {
        BoostingConfig {
            name: "gbm_fast".to_string(),
            n_rounds: 150,
            learning_rate: 0.1,
            max_depth: 3,
            min_child_weight: 1.0,
            lambda: 0.0,
            gamma: 0.0,
            subsample: 0.8,
            colsample: 0.8,
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![Self::slow(), Self::fast()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    name: String,
    /// Initial margin: log-odds of the training base rate
    base_margin: f64,
    learning_rate: f64,
    trees: Vec<Tree>,
}

impl GradientBoosting {
    pub fn fit(x: &[Vec<f64>], y: &[f64], config: &BoostingConfig, seed: u64) -> Result<Self> {
        let n_features = validate_training_set(x, y)?;
        let n = x.len();
        let mut rng = StdRng::seed_from_u64(seed);

        let base_rate = (y.iter().sum::<f64>() / n as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_margin = (base_rate / (1.0 - base_rate)).ln();
        let params = TreeParams {
            criterion: Criterion::Newton {
                lambda: config.lambda,
                gamma: config.gamma,
                min_child_weight: config.min_child_weight,
            },
            max_depth: config.max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        };

        let n_rows = fraction_of(n, config.subsample);
        let n_cols = fraction_of(n_features, config.colsample);

        let mut margins = vec![base_margin; n];
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut trees = Vec::with_capacity(config.n_rounds);

        for round in 0..config.n_rounds {
            for i in 0..n {
                let p = sigmoid(margins[i]);
                grad[i] = p - y[i];
                hess[i] = (p * (1.0 - p)).max(1e-16);
            }

            let mut rows = sample(&mut rng, n, n_rows).into_vec();
            rows.sort_unstable();
            let mut cols = sample(&mut rng, n_features, n_cols).into_vec();
            cols.sort_unstable();

            let tree = TreeBuilder::new(x, &grad, &hess, &params, cols, &mut rng).build(rows);
            for (m, row) in margins.iter_mut().zip(x) {
                *m += config.learning_rate * tree.predict(row);
            }
            trees.push(tree);

            if margins.iter().any(|m| !m.is_finite()) {
                return Err(CricketError::Training(format!(
                    "{}: margins diverged at round {}",
                    config.name, round
                )));
            }
        }

        let loss = margins
            .iter()
            .zip(y)
            .map(|(m, t)| {
                let p = sigmoid(*m).clamp(1e-15, 1.0 - 1e-15);
                -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
            })
            .sum::<f64>()
            / n as f64;
        log::debug!("{}: {} rounds, train log loss {:.4}", config.name, trees.len(), loss);

        Ok(GradientBoosting {
            name: config.name.clone(),
            base_margin,
            learning_rate: config.learning_rate,
            trees,
        })
    }

    pub fn margin(&self, row: &[f64]) -> f64 {
        self.base_margin
            + self.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        sigmoid(self.margin(row))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_rounds(&self) -> usize {
        self.trees.len()
    }
}

fn fraction_of(n: usize, fraction: f64) -> usize {
    ((n as f64 * fraction.clamp(0.0, 1.0)).round() as usize).clamp(1, n.max(1))
}
