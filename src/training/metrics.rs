//! Training metrics and evaluation

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::combiner::CombinerKind;

/// Probabilistic classification metrics accumulated over predictions
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    /// Number of correct win predictions
    pub correct: usize,
    /// Total predictions
    pub total: usize,
    /// Sum of per-prediction log loss
    pub log_loss_sum: f64,
    /// Sum of squared probability errors
    pub brier_sum: f64,
    threshold: f64,
}

impl Metrics {
    pub fn new(threshold: f64) -> Self {
        Metrics {
            threshold,
            ..Self::default()
        }
    }

    /// Metrics for a batch of team-1 probabilities against 0/1 targets
    pub fn from_predictions(probabilities: &[f64], targets: &[f64], threshold: f64) -> Self {
        let mut m = Metrics::new(threshold);
        for (p, t) in probabilities.iter().zip(targets) {
            m.update(*p, *t);
        }
        m
    }

    /// Add one prediction
    pub fn update(&mut self, probability: f64, target: f64) {
        let p = probability.clamp(1e-15, 1.0 - 1e-15);
        let won = target >= 0.5;
        if (probability >= self.threshold) == won {
            self.correct += 1;
        }
        self.total += 1;
        self.log_loss_sum += -(target * p.ln() + (1.0 - target) * (1.0 - p).ln());
        self.brier_sum += (probability - target).powi(2);
    }

    /// Get win prediction accuracy
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    pub fn log_loss(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.log_loss_sum / self.total as f64
        }
    }

    pub fn brier(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.brier_sum / self.total as f64
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            accuracy: self.accuracy(),
            log_loss: self.log_loss(),
            brier: self.brier(),
            samples: self.total,
        }
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Acc: {:.2}% | Log loss: {:.4} | Brier: {:.4} | n={}",
            self.accuracy() * 100.0,
            self.log_loss(),
            self.brier(),
            self.total
        )
    }
}

/// Frozen metrics stored in the model artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub accuracy: f64,
    pub log_loss: f64,
    pub brier: f64,
    pub samples: usize,
}

/// Cross-validation accuracy across folds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvSummary {
    pub fold_accuracies: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

impl CvSummary {
    pub fn from_folds(fold_accuracies: Vec<f64>) -> Self {
        let n = fold_accuracies.len().max(1) as f64;
        let mean = fold_accuracies.iter().sum::<f64>() / n;
        let std = (fold_accuracies.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n).sqrt();
        CvSummary {
            fold_accuracies,
            mean,
            std,
        }
    }
}

/// Validation accuracy of one base learner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerScore {
    pub name: String,
    pub accuracy: f64,
}

/// Everything measured during one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub combiner: CombinerKind,
    pub train_rows: usize,
    pub validation_rows: usize,
    /// Share of rows where team 1 won
    pub positive_rate: f64,
    pub cross_validation: CvSummary,
    pub validation: MetricsSummary,
    pub learners: Vec<LearnerScore>,
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Rows: {} train / {} validation (team 1 won {:.1}%)",
            self.train_rows,
            self.validation_rows,
            self.positive_rate * 100.0
        )?;
        writeln!(
            f,
            "Cross-validation: {:.2}% +/- {:.2}% over {} folds",
            self.cross_validation.mean * 100.0,
            self.cross_validation.std * 100.0,
            self.cross_validation.fold_accuracies.len()
        )?;
        for learner in &self.learners {
            writeln!(f, "  {:<16} {:.2}%", learner.name, learner.accuracy * 100.0)?;
        }
        write!(
            f,
            "Ensemble ({}): {:.2}% accuracy, log loss {:.4}, Brier {:.4}",
            self.combiner,
            self.validation.accuracy * 100.0,
            self.validation.log_loss,
            self.validation.brier
        )
    }
}

/// Per-epoch loss history for iterative training
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub losses: Vec<f64>,
    pub best_loss: f64,
    pub best_epoch: usize,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self {
            best_loss: f64::INFINITY,
            ..Default::default()
        }
    }

    /// Record the loss for an epoch
    pub fn record_epoch(&mut self, epoch: usize, loss: f64) {
        self.losses.push(loss);
        if loss < self.best_loss - 1e-9 {
            self.best_loss = loss;
            self.best_epoch = epoch;
        }
    }

    /// Check if we should early stop
    pub fn should_early_stop(&self, patience: usize) -> bool {
        if self.losses.len() < patience {
            return false;
        }
        let current_epoch = self.losses.len() - 1;
        current_epoch - self.best_epoch >= patience
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_from_predictions() {
        let m = Metrics::from_predictions(&[0.9, 0.2, 0.6, 0.4], &[1.0, 0.0, 0.0, 1.0], 0.5);
        assert_eq!(m.total, 4);
        assert_eq!(m.correct, 2);
        assert_eq!(m.accuracy(), 0.5);
        let brier = (0.01 + 0.04 + 0.36 + 0.36) / 4.0;
        assert!((m.brier() - brier).abs() < 1e-12);
        let ll = -(0.9f64.ln() + 0.8f64.ln() + 0.4f64.ln() + 0.4f64.ln()) / 4.0;
        assert!((m.log_loss() - ll).abs() < 1e-12);
    }

    #[test]
    fn test_cv_summary() {
        let cv = CvSummary::from_folds(vec![0.6, 0.7, 0.8]);
        assert!((cv.mean - 0.7).abs() < 1e-12);
        assert!((cv.std - (0.02f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_early_stop() {
        let mut h = TrainingHistory::new();
        h.record_epoch(0, 0.7);
        h.record_epoch(1, 0.6);
        h.record_epoch(2, 0.61);
        h.record_epoch(3, 0.62);
        assert_eq!(h.best_epoch, 1);
        assert!(h.should_early_stop(2));
        assert!(!h.should_early_stop(3));
    }
}
