//! Prediction and inference
//!
//! Load the profile snapshot and trained ensemble, then score match states.

pub mod inference;

pub use inference::{format_prediction, PredictionResponse, Predictor};
