//! Ensemble training protocol
//!
//! Labelled rows are split into train and validation sets. The whole ensemble
//! is cross-validated on the train split, then fitted on it and scored on
//! the held-out rows. Combiner weights come from out-of-fold base predictions
//! so they never see the rows the base learners were fitted on.

use burn::backend::{Autodiff, NdArray};
use chrono::Utc;

use crate::features::assembler::FeatureAssembler;
use crate::features::profiles::ProfileSet;
use crate::model::combiner::{Combiner, CombinerKind};
use crate::model::ensemble::{BaseLearner, EnsembleModel, LearnerSpec};
use crate::training::dataset::{complement, stratified_folds, stratified_split, LabelledRows};
use crate::training::meta_trainer::MetaTrainer;
use crate::training::metrics::{CvSummary, LearnerScore, Metrics, TrainingReport};
use crate::{CricketError, MatchSummary, Result, TrainingConfig};

type MetaBackend = Autodiff<NdArray<f32>>;

/// Fitted base learners plus their combiner
struct FittedEnsemble {
    learners: Vec<BaseLearner>,
    combiner: Combiner,
}

impl FittedEnsemble {
    fn predict(&self, row: &[f64]) -> Result<f64> {
        let base: Vec<f64> = self.learners.iter().map(|l| l.predict_proba(row)).collect();
        self.combiner.combine(&base)
    }
}

pub struct Trainer {
    config: TrainingConfig,
    assembler: FeatureAssembler,
    specs: Vec<LearnerSpec>,
}

impl Trainer {
    pub fn new(config: &TrainingConfig, assembler: FeatureAssembler) -> Self {
        Trainer {
            specs: LearnerSpec::from_config(config),
            config: config.clone(),
            assembler,
        }
    }

    /// Train a model from summaries and the profile snapshot built from them
    pub fn train(&self, summaries: &[MatchSummary], profiles: &ProfileSet) -> Result<EnsembleModel> {
        if self.specs.is_empty() {
            return Err(CricketError::Config("no base learners configured".to_string()));
        }
        let rows = LabelledRows::build(summaries, profiles, &self.assembler)?;
        let seed = self.config.seed;

        let (train_idx, val_idx) = stratified_split(&rows.y, self.config.validation_fraction, seed);
        let train = rows.subset(&train_idx);
        let validation = rows.subset(&val_idx);
        train.ensure_both_classes()?;
        log::info!(
            "Training rows: {} train / {} validation ({:.1}% team 1 wins)",
            train.len(),
            validation.len(),
            rows.positive_rate() * 100.0
        );

        let cross_validation = self.cross_validate(&train)?;

        let fitted = self.fit_ensemble(&train, seed)?;
        let mut metrics = Metrics::new(self.config.threshold);
        let mut learner_metrics: Vec<Metrics> =
            vec![Metrics::new(self.config.threshold); fitted.learners.len()];
        for (row, target) in validation.x.iter().zip(&validation.y) {
            for (learner, m) in fitted.learners.iter().zip(learner_metrics.iter_mut()) {
                m.update(finite(learner.predict_proba(row), learner.name())?, *target);
            }
            metrics.update(finite(fitted.predict(row)?, "ensemble")?, *target);
        }

        let learners: Vec<LearnerScore> = fitted
            .learners
            .iter()
            .zip(&learner_metrics)
            .map(|(l, m)| LearnerScore {
                name: l.name().to_string(),
                accuracy: m.accuracy(),
            })
            .collect();
        for score in &learners {
            log::info!("  {:<16} validation accuracy {:.2}%", score.name, score.accuracy * 100.0);
        }
        log::info!("Ensemble validation: {}", metrics);

        let report = TrainingReport {
            combiner: fitted.combiner.kind(),
            train_rows: train.len(),
            validation_rows: validation.len(),
            positive_rate: rows.positive_rate(),
            cross_validation,
            validation: metrics.summary(),
            learners,
        };

        Ok(EnsembleModel {
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            schema: self.assembler.schema(),
            assembly: self.assembler.params(),
            profile_fingerprint: profiles.fingerprint.clone(),
            threshold: self.config.threshold,
            learners: fitted.learners,
            combiner: fitted.combiner,
            report,
        })
    }

    /// Stratified k-fold accuracy of the whole ensemble
    fn cross_validate(&self, data: &LabelledRows) -> Result<CvSummary> {
        let folds = stratified_folds(&data.y, self.config.cv_folds, self.config.seed);
        let mut accuracies = Vec::with_capacity(folds.len());

        for (f, held_out) in folds.iter().enumerate() {
            let fit_rows = data.subset(&complement(data.len(), held_out));
            let test_rows = data.subset(held_out);
            if test_rows.is_empty() || fit_rows.ensure_both_classes().is_err() {
                log::warn!("Skipping CV fold {}: not enough rows of each class", f + 1);
                continue;
            }

            let fitted = self.fit_ensemble(&fit_rows, fold_seed(self.config.seed, f + 1))?;
            let mut metrics = Metrics::new(self.config.threshold);
            for (row, target) in test_rows.x.iter().zip(&test_rows.y) {
                metrics.update(finite(fitted.predict(row)?, "ensemble")?, *target);
            }
            log::info!("CV fold {}/{}: {}", f + 1, folds.len(), metrics);
            accuracies.push(metrics.accuracy());
        }

        let summary = CvSummary::from_folds(accuracies);
        log::info!(
            "Cross-validation accuracy {:.2}% +/- {:.2}%",
            summary.mean * 100.0,
            summary.std * 100.0
        );
        Ok(summary)
    }

    /// Fit every base learner on `data`, then the combiner on out-of-fold predictions
    fn fit_ensemble(&self, data: &LabelledRows, seed: u64) -> Result<FittedEnsemble> {
        let oof = self.out_of_fold(data, seed)?;
        let combiner = match self.config.combiner {
            CombinerKind::Stacking => {
                let trainer = MetaTrainer::<MetaBackend>::new(
                    Default::default(),
                    self.specs.len(),
                    self.config.meta_learning_rate,
                );
                trainer.fit(&oof, &data.y, self.config.meta_epochs)?
            }
            CombinerKind::SoftVote => {
                let accuracies: Vec<f64> = (0..self.specs.len())
                    .map(|j| {
                        let probs: Vec<f64> = oof.iter().map(|r| r[j]).collect();
                        Metrics::from_predictions(&probs, &data.y, self.config.threshold).accuracy()
                    })
                    .collect();
                Combiner::soft_vote(&accuracies)
            }
        };
        log::debug!("{} weights: {:?}", combiner.kind(), combiner.weights());

        let learners = self
            .specs
            .iter()
            .enumerate()
            .map(|(j, spec)| spec.fit(&data.x, &data.y, learner_seed(seed, j)))
            .collect::<Result<Vec<_>>>()?;

        Ok(FittedEnsemble { learners, combiner })
    }

    /// Base-learner probabilities for every row, each predicted by learners
    /// that did not see it
    fn out_of_fold(&self, data: &LabelledRows, seed: u64) -> Result<Vec<Vec<f64>>> {
        let mut oof = vec![vec![0.5; self.specs.len()]; data.len()];
        let folds = stratified_folds(&data.y, self.config.stacking_folds, seed);

        for (f, held_out) in folds.iter().enumerate() {
            if held_out.is_empty() {
                continue;
            }
            let fit_rows = data.subset(&complement(data.len(), held_out));
            let fold = fold_seed(seed, 1000 + f);
            for (j, spec) in self.specs.iter().enumerate() {
                let learner = spec.fit(&fit_rows.x, &fit_rows.y, learner_seed(fold, j))?;
                for &i in held_out {
                    oof[i][j] = finite(learner.predict_proba(&data.x[i]), spec.name())?;
                }
            }
        }
        Ok(oof)
    }
}

fn finite(p: f64, source: &str) -> Result<f64> {
    if p.is_finite() {
        Ok(p)
    } else {
        Err(CricketError::Training(format!("{} produced a non-finite probability", source)))
    }
}

fn fold_seed(seed: u64, fold: usize) -> u64 {
    seed.wrapping_add((fold as u64).wrapping_mul(0x2545_F491_4F6C_DD1D))
}

fn learner_seed(seed: u64, index: usize) -> u64 {
    seed.wrapping_add(index as u64 * 7919)
}
