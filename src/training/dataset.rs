//! Labelled training rows and resampling

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::features::assembler::{FeatureAssembler, MatchState};
use crate::features::profiles::{ConfidenceMode, ProfileSet};
use crate::{CricketError, MatchSummary, Result};

/// Feature matrix with 0/1 "team 1 won" targets
#[derive(Debug, Clone, Default)]
pub struct LabelledRows {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
}

impl LabelledRows {
    /// One row per summary, assembled from its first-innings end state.
    ///
    /// With `ConfidenceMode::Exclude`, matches whose teams or venue were
    /// dropped from the snapshot are skipped.
    pub fn build(
        summaries: &[MatchSummary],
        profiles: &ProfileSet,
        assembler: &FeatureAssembler,
    ) -> Result<Self> {
        let exclude = profiles.policy.mode == ConfidenceMode::Exclude;
        let mut rows = LabelledRows::default();
        let mut dropped = 0;

        for summary in summaries {
            if exclude && !profiles.covers(summary) {
                dropped += 1;
                continue;
            }
            let features = assembler.assemble(&MatchState::from_summary(summary), profiles);
            rows.x.push(features.values);
            rows.y.push(if summary.team1_won { 1.0 } else { 0.0 });
        }

        if dropped > 0 {
            log::info!("Dropped {} matches with excluded profiles", dropped);
        }
        if rows.is_empty() {
            return Err(CricketError::NoData);
        }
        rows.ensure_both_classes()?;
        Ok(rows)
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Share of rows labelled 1
    pub fn positive_rate(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.y.iter().sum::<f64>() / self.len() as f64
        }
    }

    pub fn ensure_both_classes(&self) -> Result<()> {
        let positives = self.y.iter().filter(|t| **t == 1.0).count();
        if positives == 0 || positives == self.len() {
            return Err(CricketError::Training(format!(
                "target is single-valued across {} rows",
                self.len()
            )));
        }
        Ok(())
    }

    /// Rows at the given indices, in index order
    pub fn subset(&self, indices: &[usize]) -> LabelledRows {
        LabelledRows {
            x: indices.iter().map(|&i| self.x[i].clone()).collect(),
            y: indices.iter().map(|&i| self.y[i]).collect(),
        }
    }
}

/// Row indices per class, each class shuffled with `rng`
fn shuffled_classes(y: &[f64], rng: &mut StdRng) -> [Vec<usize>; 2] {
    let mut classes: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (i, t) in y.iter().enumerate() {
        classes[usize::from(*t == 1.0)].push(i);
    }
    for class in classes.iter_mut() {
        class.shuffle(rng);
    }
    classes
}

/// Seeded stratified split into (train, validation) indices.
///
/// Each class contributes `round(n * fraction)` rows to validation, keeping at
/// least one row of every class in the training side.
pub fn stratified_split(y: &[f64], fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut validation = Vec::new();

    for class in shuffled_classes(y, &mut rng) {
        let n = class.len();
        let n_val = ((n as f64 * fraction.clamp(0.0, 1.0)).round() as usize).min(n.saturating_sub(1));
        validation.extend_from_slice(&class[..n_val]);
        train.extend_from_slice(&class[n_val..]);
    }

    train.sort_unstable();
    validation.sort_unstable();
    (train, validation)
}

/// Seeded stratified k-fold: returns the held-out indices of each fold
pub fn stratified_folds(y: &[f64], k: usize, seed: u64) -> Vec<Vec<usize>> {
    let k = k.max(1);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut folds = vec![Vec::new(); k];

    let mut next = 0;
    for class in shuffled_classes(y, &mut rng) {
        for i in class {
            folds[next % k].push(i);
            next += 1;
        }
    }
    for fold in folds.iter_mut() {
        fold.sort_unstable();
    }
    folds
}

/// Indices of `0..n` not in the (sorted) held-out fold
pub fn complement(n: usize, held_out: &[usize]) -> Vec<usize> {
    (0..n).filter(|i| held_out.binary_search(i).is_err()).collect()
}
