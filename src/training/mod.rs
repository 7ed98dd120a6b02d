//! Model training
//!
//! Labelled rows, resampling, the stacking meta-learner and the ensemble
//! training protocol with its metrics.

pub mod dataset;
pub mod meta_trainer;
pub mod metrics;
pub mod trainer;

pub use dataset::LabelledRows;
pub use meta_trainer::MetaTrainer;
pub use metrics::{Metrics, TrainingHistory, TrainingReport};
pub use trainer::Trainer;
