//! Stacking meta-learner
//!
//! Logistic regression over base-learner probabilities: a single `Linear`
//! layer with sigmoid output, trained full-batch with SGD on binary cross
//! entropy. The fitted layer is read back into plain weights for the
//! `Combiner`, so the artifact carries no burn state.

use burn::nn::{Initializer, Linear, LinearConfig};
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor};

use crate::model::combiner::Combiner;
use crate::training::metrics::TrainingHistory;
use crate::{CricketError, Result};

/// Epochs without loss improvement before stopping
const PATIENCE: usize = 50;

pub struct MetaTrainer<B: AutodiffBackend> {
    model: Linear<B>,
    optimizer: burn::optim::adaptor::OptimizerAdaptor<burn::optim::Sgd<B::InnerBackend>, Linear<B>, B>,
    n_inputs: usize,
    learning_rate: f64,
    device: B::Device,
}

impl<B: AutodiffBackend> MetaTrainer<B> {
    /// Zero-initialised layer over `n_inputs` base probabilities
    pub fn new(device: B::Device, n_inputs: usize, learning_rate: f64) -> Self {
        let model = LinearConfig::new(n_inputs, 1)
            .with_initializer(Initializer::Zeros)
            .init(&device);
        let optimizer = SgdConfig::new().init();

        MetaTrainer {
            model,
            optimizer,
            n_inputs,
            learning_rate,
            device,
        }
    }

    /// Fit on rows of base probabilities and 0/1 targets.
    ///
    /// Fails if the loss turns non-finite.
    pub fn fit(mut self, x: &[Vec<f64>], y: &[f64], epochs: usize) -> Result<Combiner> {
        if x.is_empty() || x.len() != y.len() || x.iter().any(|r| r.len() != self.n_inputs) {
            return Err(CricketError::Training(format!(
                "meta-learner needs {} columns per row and one target per row",
                self.n_inputs
            )));
        }
        let n = x.len();
        let flat: Vec<f32> = x.iter().flatten().map(|v| *v as f32).collect();
        let targets: Vec<f32> = y.iter().map(|v| *v as f32).collect();

        let inputs = Tensor::<B, 1>::from_floats(flat.as_slice(), &self.device).reshape([n, self.n_inputs]);
        let targets = Tensor::<B, 1>::from_floats(targets.as_slice(), &self.device).reshape([n, 1]);

        let mut history = TrainingHistory::new();
        log::info!("Training stacking meta-learner for up to {} epochs", epochs);

        for epoch in 0..epochs {
            let probs = sigmoid(self.model.forward(inputs.clone()));
            let loss = self.binary_cross_entropy(probs.clone(), targets.clone());
            let loss_val: f32 = loss.clone().into_scalar().elem();
            if !loss_val.is_finite() {
                return Err(CricketError::Training(format!(
                    "meta-learner loss diverged at epoch {}",
                    epoch
                )));
            }
            let train_acc = self.compute_accuracy(&probs, y)?;

            let grads = loss.backward();
            let grads_params = GradientsParams::from_grads(grads, &self.model);
            self.model = self.optimizer.step(self.learning_rate, self.model, grads_params);

            history.record_epoch(epoch, loss_val as f64);
            if epoch % 100 == 0 || epoch + 1 == epochs {
                log::debug!(
                    "Meta epoch {}/{}: loss={:.4}, acc={:.1}%",
                    epoch + 1,
                    epochs,
                    loss_val,
                    train_acc * 100.0
                );
            }
            if history.should_early_stop(PATIENCE) {
                log::debug!("Meta-learner stopped at epoch {}", epoch + 1);
                break;
            }
        }
        log::info!(
            "Meta-learner best loss {:.4} at epoch {}",
            history.best_loss,
            history.best_epoch + 1
        );

        self.into_combiner()
    }

    fn binary_cross_entropy(&self, probs: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
        let eps = 1e-7;
        let probs_clamped = probs.clamp(eps, 1.0 - eps);
        let loss = targets.clone().neg() * probs_clamped.clone().log()
            - (targets.neg() + 1.0) * (probs_clamped.neg() + 1.0).log();
        loss.mean()
    }

    fn compute_accuracy(&self, probs: &Tensor<B, 2>, targets: &[f64]) -> Result<f64> {
        let probs_data = probs.clone().into_data();
        let probs_slice: &[f32] = probs_data
            .as_slice()
            .map_err(|e| CricketError::Training(format!("{:?}", e)))?;

        let correct = probs_slice
            .iter()
            .zip(targets)
            .filter(|(p, t)| (**p >= 0.5) == (**t >= 0.5))
            .count();
        Ok(correct as f64 / probs_slice.len().max(1) as f64)
    }

    /// Read the fitted layer back into stacking weights
    fn into_combiner(self) -> Result<Combiner> {
        let read = |data: burn::tensor::TensorData| -> Result<Vec<f64>> {
            let values: &[f32] = data
                .as_slice()
                .map_err(|e| CricketError::Training(format!("{:?}", e)))?;
            Ok(values.iter().map(|v| *v as f64).collect())
        };

        let weights = read(self.model.weight.val().into_data())?;
        let bias = match &self.model.bias {
            Some(b) => read(b.val().into_data())?.first().copied().unwrap_or(0.0),
            None => 0.0,
        };
        if weights.len() != self.n_inputs || weights.iter().chain([&bias]).any(|w| !w.is_finite()) {
            return Err(CricketError::Training(
                "meta-learner produced invalid weights".to_string(),
            ));
        }
        Ok(Combiner::Stacking { weights, bias })
    }
}
