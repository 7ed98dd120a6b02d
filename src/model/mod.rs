//! Win probability models
//!
//! Tree-based base learners and the ensemble that combines them:
//! - Random forest: bagged Gini trees
//! - Gradient boosting: Newton trees on logistic loss, one per config
//! - Combiner: stacking meta-learner or accuracy-weighted soft vote

pub mod boosting;
pub mod combiner;
pub mod ensemble;
pub mod forest;
pub mod tree;

pub use boosting::{BoostingConfig, GradientBoosting};
pub use combiner::{Combiner, CombinerKind};
pub use ensemble::{BaseLearner, EnsembleModel, LearnerSpec};
pub use forest::{ForestConfig, MaxFeatures, RandomForest};

use crate::{CricketError, Result};

/// Logistic function, stable for large |x|
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Check a training matrix and return its feature count
pub(crate) fn validate_training_set(x: &[Vec<f64>], y: &[f64]) -> Result<usize> {
    if x.is_empty() {
        return Err(CricketError::Training("no training rows".to_string()));
    }
    if x.len() != y.len() {
        return Err(CricketError::Training(format!(
            "{} rows but {} labels",
            x.len(),
            y.len()
        )));
    }
    let n_features = x[0].len();
    if n_features == 0 {
        return Err(CricketError::Training("rows have no features".to_string()));
    }
    for (i, row) in x.iter().enumerate() {
        if row.len() != n_features {
            return Err(CricketError::Training(format!(
                "row {} has {} features, expected {}",
                i,
                row.len(),
                n_features
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(CricketError::Training(format!("row {} contains non-finite values", i)));
        }
    }
    if let Some(bad) = y.iter().find(|t| **t != 0.0 && **t != 1.0) {
        return Err(CricketError::Training(format!("label {} is not 0 or 1", bad)));
    }
    Ok(n_features)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-12);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!(sigmoid(-800.0).is_finite());
    }

    #[test]
    fn test_validate_training_set() {
        let x = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_eq!(validate_training_set(&x, &[0.0, 1.0]).unwrap(), 2);
        assert!(validate_training_set(&x, &[0.0]).is_err());
        assert!(validate_training_set(&x, &[0.0, 0.5]).is_err());
        assert!(validate_training_set(&[vec![1.0], vec![1.0, 2.0]], &[0.0, 1.0]).is_err());
        assert!(validate_training_set(&[vec![f64::NAN]], &[1.0]).is_err());
        assert!(validate_training_set(&[vec![]], &[1.0]).is_err());
    }
}
