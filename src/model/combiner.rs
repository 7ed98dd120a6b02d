//! Combining base-learner probabilities
//!
//! Every strategy takes one probability per base learner, in learner order,
//! and returns a single probability for team 1 winning.

use serde::{Deserialize, Serialize};

use crate::model::sigmoid;
use crate::{CricketError, Result};

/// Strategy selected in config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinerKind {
    /// Logistic meta-learner over out-of-fold base predictions
    Stacking,
    /// Accuracy-weighted average
    SoftVote,
}

impl std::fmt::Display for CombinerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CombinerKind::Stacking => write!(f, "stacking"),
            CombinerKind::SoftVote => write!(f, "soft_vote"),
        }
    }
}

/// A fitted combiner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Combiner {
    SoftVote { weights: Vec<f64> },
    Stacking { weights: Vec<f64>, bias: f64 },
}

impl Combiner {
    /// Soft vote with weights proportional to squared accuracy
    pub fn soft_vote(accuracies: &[f64]) -> Self {
        let squared: Vec<f64> = accuracies.iter().map(|a| a.max(0.0).powi(2)).collect();
        let total: f64 = squared.iter().sum();
        let weights = if total > 0.0 {
            squared.iter().map(|w| w / total).collect()
        } else {
            vec![1.0 / accuracies.len().max(1) as f64; accuracies.len()]
        };
        Combiner::SoftVote { weights }
    }

    pub fn kind(&self) -> CombinerKind {
        match self {
            Combiner::SoftVote { .. } => CombinerKind::SoftVote,
            Combiner::Stacking { .. } => CombinerKind::Stacking,
        }
    }

    pub fn weights(&self) -> &[f64] {
        match self {
            Combiner::SoftVote { weights } | Combiner::Stacking { weights, .. } => weights,
        }
    }

    /// Number of base probabilities expected
    pub fn arity(&self) -> usize {
        self.weights().len()
    }

    pub fn combine(&self, probabilities: &[f64]) -> Result<f64> {
        if probabilities.len() != self.arity() {
            return Err(CricketError::InvalidInput(format!(
                "combiner expects {} probabilities, got {}",
                self.arity(),
                probabilities.len()
            )));
        }
        let weighted: f64 = self
            .weights()
            .iter()
            .zip(probabilities)
            .map(|(w, p)| w * p)
            .sum();
        let p = match self {
            Combiner::SoftVote { .. } => weighted,
            Combiner::Stacking { bias, .. } => sigmoid(bias + weighted),
        };
        if p.is_finite() {
            Ok(p.clamp(0.0, 1.0))
        } else {
            Err(CricketError::Training("combiner produced a non-finite probability".to_string()))
        }
    }
}

/// Team 1 is predicted to win when its probability reaches the threshold
pub fn label(probability: f64, threshold: f64) -> bool {
    probability >= threshold
}
