//! Binary decision trees
//!
//! One arena-based CART implementation shared by the forest and the boosters.
//! Each training row carries a pair of statistics `(a, b)` that the split
//! criterion reduces:
//!
//! - Gini classification: `a` = label, `b` = 1
//! - Newton (second-order boosting): `a` = gradient, `b` = hessian

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Arena node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Leaf value for a row. Rows go left when `row[feature] <= threshold`.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = row.get(*feature).copied().unwrap_or(0.0);
                    idx = if x <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Split criterion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Criterion {
    Gini,
    Newton {
        lambda: f64,
        gamma: f64,
        min_child_weight: f64,
    },
}

impl Criterion {
    /// Node score; split gain is `score(left) + score(right) - score(parent) - penalty`
    fn score(&self, a: f64, b: f64) -> f64 {
        match *self {
            // Negated weighted Gini impurity: b * 2p(1 - p)
            Criterion::Gini => {
                if b <= 0.0 {
                    0.0
                } else {
                    -2.0 * a * (b - a) / b
                }
            }
            Criterion::Newton { lambda, .. } => {
                let denom = b + lambda;
                if denom <= 1e-12 {
                    0.0
                } else {
                    0.5 * a * a / denom
                }
            }
        }
    }

    fn penalty(&self) -> f64 {
        match *self {
            Criterion::Gini => 1e-12,
            Criterion::Newton { gamma, .. } => gamma.max(1e-12),
        }
    }

    fn leaf_value(&self, a: f64, b: f64) -> f64 {
        match *self {
            Criterion::Gini => {
                if b <= 0.0 {
                    0.5
                } else {
                    a / b
                }
            }
            Criterion::Newton { lambda, .. } => {
                let denom = b + lambda;
                if denom <= 1e-12 {
                    0.0
                } else {
                    -a / denom
                }
            }
        }
    }

    fn child_ok(&self, b: f64) -> bool {
        match *self {
            Criterion::Gini => true,
            Criterion::Newton { min_child_weight, .. } => b >= min_child_weight,
        }
    }
}

/// Growth limits
#[derive(Debug, Clone, PartialEq)]
pub struct TreeParams {
    pub criterion: Criterion,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; `None` examines all allowed features
    pub max_features: Option<usize>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Grows one tree over a borrowed training set
pub struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    a: &'a [f64],
    b: &'a [f64],
    params: &'a TreeParams,
    features: Vec<usize>,
    rng: &'a mut StdRng,
    nodes: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    /// `features` restricts which columns may be split on
    pub fn new(
        x: &'a [Vec<f64>],
        a: &'a [f64],
        b: &'a [f64],
        params: &'a TreeParams,
        features: Vec<usize>,
        rng: &'a mut StdRng,
    ) -> Self {
        TreeBuilder {
            x,
            a,
            b,
            params,
            features,
            rng,
            nodes: Vec::new(),
        }
    }

    /// Grow over the given row indices (duplicates act as weights)
    pub fn build(mut self, mut rows: Vec<usize>) -> Tree {
        self.grow(&mut rows, 0);
        Tree { nodes: self.nodes }
    }

    fn totals(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter()
            .fold((0.0, 0.0), |(sa, sb), &r| (sa + self.a[r], sb + self.b[r]))
    }

    fn grow(&mut self, rows: &mut [usize], depth: usize) -> usize {
        let (sum_a, sum_b) = self.totals(rows);
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.params.criterion.leaf_value(sum_a, sum_b),
        });

        if depth >= self.params.max_depth || rows.len() < self.params.min_samples_split.max(2) {
            return id;
        }

        let Some(split) = self.best_split(rows, sum_a, sum_b) else {
            return id;
        };

        let x = self.x;
        let mid = partition(rows, |&r| x[r][split.feature] <= split.threshold);
        if mid == 0 || mid == rows.len() {
            return id;
        }

        let (left_rows, right_rows) = rows.split_at_mut(mid);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let mut features = self.features.clone();
        if let Some(k) = self.params.max_features {
            if k < features.len() {
                features.shuffle(&mut *self.rng);
                features.truncate(k.max(1));
            }
        }
        features
    }

    fn best_split(&mut self, rows: &[usize], sum_a: f64, sum_b: f64) -> Option<SplitCandidate> {
        let criterion = self.params.criterion;
        let min_leaf = self.params.min_samples_leaf.max(1);
        let parent = criterion.score(sum_a, sum_b);
        let mut best: Option<SplitCandidate> = None;

        let mut sorted = rows.to_vec();
        for feature in self.candidate_features() {
            let x = self.x;
            sorted.sort_by(|&i, &j| {
                x[i][feature]
                    .partial_cmp(&x[j][feature])
                    .unwrap_or(Ordering::Equal)
            });

            let (mut left_a, mut left_b) = (0.0, 0.0);
            for pos in 0..sorted.len() - 1 {
                let r = sorted[pos];
                left_a += self.a[r];
                left_b += self.b[r];

                let here = x[r][feature];
                let next = x[sorted[pos + 1]][feature];
                if here >= next {
                    continue;
                }
                let left_n = pos + 1;
                let right_n = sorted.len() - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }
                let (right_a, right_b) = (sum_a - left_a, sum_b - left_b);
                if !criterion.child_ok(left_b) || !criterion.child_ok(right_b) {
                    continue;
                }

                let gain = criterion.score(left_a, left_b) + criterion.score(right_a, right_b)
                    - parent
                    - criterion.penalty();
                if gain > 0.0 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (here + next) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

/// Stable-order partition; returns the count of rows satisfying `pred`
fn partition<F: Fn(&usize) -> bool>(rows: &mut [usize], pred: F) -> usize {
    let (mut yes, no): (Vec<usize>, Vec<usize>) = rows.iter().partition(|r| pred(r));
    let mid = yes.len();
    yes.extend(no);
    rows.copy_from_slice(&yes);
    mid
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn params(criterion: Criterion, max_depth: usize) -> TreeParams {
        TreeParams {
            criterion,
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }

    #[test]
    fn test_gini_tree_separates_threshold() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y: Vec<f64> = (0..20).map(|i| if i >= 12 { 1.0 } else { 0.0 }).collect();
        let ones = vec![1.0; 20];
        let p = params(Criterion::Gini, 4);
        let mut rng = StdRng::seed_from_u64(1);

        let tree = TreeBuilder::new(&x, &y, &ones, &p, vec![0, 1], &mut rng).build((0..20).collect());

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(&[3.0, 0.0]), 0.0);
        assert_eq!(tree.predict(&[15.0, 2.0]), 1.0);
        // Threshold sits halfway between 11 and 12
        assert_eq!(tree.predict(&[11.5, 0.0]), 0.0);
        assert_eq!(tree.predict(&[11.6, 0.0]), 1.0);
    }

    #[test]
    fn test_pure_node_is_leaf() {
        let x: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64]).collect();
        let y = vec![1.0; 5];
        let ones = vec![1.0; 5];
        let p = params(Criterion::Gini, 5);
        let mut rng = StdRng::seed_from_u64(1);
        let tree = TreeBuilder::new(&x, &y, &ones, &p, vec![0], &mut rng).build((0..5).collect());
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict(&[2.0]), 1.0);
    }

    #[test]
    fn test_max_depth_respected() {
        let x: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..64).map(|i| (i % 2) as f64).collect();
        let ones = vec![1.0; 64];
        let p = params(Criterion::Gini, 3);
        let mut rng = StdRng::seed_from_u64(1);
        let tree = TreeBuilder::new(&x, &y, &ones, &p, vec![0], &mut rng).build((0..64).collect());
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_newton_leaf_values() {
        // Gradients of logistic loss at p = 0.5: p - y
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let g: Vec<f64> = (0..10).map(|i| if i < 5 { 0.5 } else { -0.5 }).collect();
        let h = vec![0.25; 10];
        let p = params(
            Criterion::Newton {
                lambda: 0.0,
                gamma: 0.0,
                min_child_weight: 0.0,
            },
            1,
        );
        let mut rng = StdRng::seed_from_u64(1);
        let tree = TreeBuilder::new(&x, &g, &h, &p, vec![0], &mut rng).build((0..10).collect());

        // Leaf = -G / H = -(5 * 0.5) / (5 * 0.25) = -2
        assert!((tree.predict(&[0.0]) + 2.0).abs() < 1e-12);
        assert!((tree.predict(&[9.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_gamma_blocks_weak_splits() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let g: Vec<f64> = (0..10).map(|i| if i < 5 { 0.01 } else { -0.01 }).collect();
        let h = vec![0.25; 10];
        let p = params(
            Criterion::Newton {
                lambda: 1.0,
                gamma: 10.0,
                min_child_weight: 0.0,
            },
            3,
        );
        let mut rng = StdRng::seed_from_u64(1);
        let tree = TreeBuilder::new(&x, &g, &h, &p, vec![0], &mut rng).build((0..10).collect());
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_serde_roundtrip_preserves_predictions() {
        let x: Vec<Vec<f64>> = (0..30).map(|i| vec![(i * 7 % 30) as f64, i as f64]).collect();
        let y: Vec<f64> = (0..30).map(|i| if i % 4 == 0 { 1.0 } else { 0.0 }).collect();
        let ones = vec![1.0; 30];
        let p = params(Criterion::Gini, 6);
        let mut rng = StdRng::seed_from_u64(3);
        let tree = TreeBuilder::new(&x, &y, &ones, &p, vec![0, 1], &mut rng).build((0..30).collect());

        let json = serde_json::to_string(&tree).unwrap();
        let back: Tree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
    }
}
