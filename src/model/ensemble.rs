//! Ensemble model artifact
//!
//! Base learners, the fitted combiner and everything needed to check that a
//! serving process is feeding the model the features it was trained on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::features::assembler::{AssemblyParams, FeatureSchema, FeatureVector};
use crate::model::boosting::{BoostingConfig, GradientBoosting};
use crate::model::combiner::Combiner;
use crate::model::forest::{ForestConfig, RandomForest};
use crate::training::metrics::TrainingReport;
use crate::{write_json_atomic, CricketError, Result, TrainingConfig};

/// A fitted base learner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "learner", rename_all = "snake_case")]
pub enum BaseLearner {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
}

impl BaseLearner {
    pub fn name(&self) -> &str {
        match self {
            BaseLearner::RandomForest(_) => "random_forest",
            BaseLearner::GradientBoosting(gb) => gb.name(),
        }
    }

    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        match self {
            BaseLearner::RandomForest(rf) => rf.predict_proba(row),
            BaseLearner::GradientBoosting(gb) => gb.predict_proba(row),
        }
    }
}

/// Unfitted learner configuration
#[derive(Debug, Clone, PartialEq)]
pub enum LearnerSpec {
    Forest(ForestConfig),
    Boosting(BoostingConfig),
}

impl LearnerSpec {
    /// The forest (unless disabled with zero trees) followed by each booster
    pub fn from_config(config: &TrainingConfig) -> Vec<LearnerSpec> {
        let mut specs = Vec::new();
        if config.forest.n_trees > 0 {
            specs.push(LearnerSpec::Forest(config.forest.clone()));
        }
        specs.extend(config.boosters.iter().cloned().map(LearnerSpec::Boosting));
        specs
    }

    pub fn name(&self) -> &str {
        match self {
            LearnerSpec::Forest(_) => "random_forest",
            LearnerSpec::Boosting(b) => &b.name,
        }
    }

    pub fn fit(&self, x: &[Vec<f64>], y: &[f64], seed: u64) -> Result<BaseLearner> {
        match self {
            LearnerSpec::Forest(config) => Ok(BaseLearner::RandomForest(RandomForest::fit(x, y, config, seed)?)),
            LearnerSpec::Boosting(config) => Ok(BaseLearner::GradientBoosting(GradientBoosting::fit(
                x, y, config, seed,
            )?)),
        }
    }
}

/// Versioned, immutable trained model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleModel {
    /// Crate version that wrote the artifact
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub schema: FeatureSchema,
    /// Normalization and defaults the training rows were assembled with
    pub assembly: AssemblyParams,
    /// Fingerprint of the profile snapshot used for training
    pub profile_fingerprint: String,
    pub threshold: f64,
    pub learners: Vec<BaseLearner>,
    pub combiner: Combiner,
    pub report: TrainingReport,
}

impl EnsembleModel {
    /// Per-learner probabilities for a raw row
    pub fn base_probabilities(&self, row: &[f64]) -> Vec<f64> {
        self.learners.iter().map(|l| l.predict_proba(row)).collect()
    }

    /// Combined probability for a raw row
    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        self.combiner.combine(&self.base_probabilities(row))
    }

    /// Probability that team 1 wins. Refuses vectors built for another schema.
    pub fn predict_proba(&self, features: &FeatureVector) -> Result<f64> {
        features.ensure_schema(&self.schema)?;
        if features.values.iter().any(|v| !v.is_finite()) {
            return Err(CricketError::InvalidInput(
                "feature vector contains non-finite values".to_string(),
            ));
        }
        self.predict_row(&features.values)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_json_atomic(path.as_ref(), self)?;
        log::info!("Saved ensemble model to {}", path.as_ref().display());
        Ok(())
    }

    /// Load an artifact, failing unless it was trained on `expected`
    pub fn load<P: AsRef<Path>>(path: P, expected: &FeatureSchema) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CricketError::NoModel);
        }
        let content = std::fs::read_to_string(path)?;
        let model: EnsembleModel = serde_json::from_str(&content)
            .map_err(|e| CricketError::Artifact(format!("{}: {}", path.display(), e)))?;

        expected.ensure_matches(&model.schema)?;
        if model.combiner.arity() != model.learners.len() {
            return Err(CricketError::Artifact(format!(
                "combiner expects {} learners, artifact has {}",
                model.combiner.arity(),
                model.learners.len()
            )));
        }
        log::info!(
            "Loaded ensemble v{} ({} learners, {}) trained {}",
            model.version,
            model.learners.len(),
            model.combiner.kind(),
            model.created_at.format("%Y-%m-%d %H:%M")
        );
        Ok(model)
    }
}
