//! Model inference for predictions

use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::features::assembler::{FeatureAssembler, FeatureVector, MatchState, VenueSource};
use crate::features::profiles::ProfileSet;
use crate::model::combiner::label;
use crate::model::ensemble::EnsembleModel;
use crate::{ConfidenceBucket, CricketError, Result};

/// How a first-innings score compares with the venue average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreVerdict {
    Excellent,
    Good,
    Par,
    BelowPar,
}

impl ScoreVerdict {
    /// From runs minus venue average
    pub fn from_difference(difference: f64) -> Self {
        if difference > 20.0 {
            ScoreVerdict::Excellent
        } else if difference > 0.0 {
            ScoreVerdict::Good
        } else if difference > -15.0 {
            ScoreVerdict::Par
        } else {
            ScoreVerdict::BelowPar
        }
    }
}

impl fmt::Display for ScoreVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreVerdict::Excellent => write!(f, "excellent"),
            ScoreVerdict::Good => write!(f, "good"),
            ScoreVerdict::Par => write!(f, "par"),
            ScoreVerdict::BelowPar => write!(f, "below par"),
        }
    }
}

/// Gap between the two win probabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSituation {
    VeryClose,     // < 10 points
    Competitive,   // 10-20
    ClearFavorite, // 20-40
    Dominant,      // >= 40
}

impl MatchSituation {
    pub fn from_margin(margin: f64) -> Self {
        let points = margin.abs() * 100.0;
        if points < 10.0 {
            MatchSituation::VeryClose
        } else if points < 20.0 {
            MatchSituation::Competitive
        } else if points < 40.0 {
            MatchSituation::ClearFavorite
        } else {
            MatchSituation::Dominant
        }
    }
}

impl fmt::Display for MatchSituation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchSituation::VeryClose => write!(f, "very close"),
            MatchSituation::Competitive => write!(f, "competitive"),
            MatchSituation::ClearFavorite => write!(f, "clear favorite"),
            MatchSituation::Dominant => write!(f, "dominant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VenueComparison {
    pub venue: String,
    pub venue_avg: f64,
    /// Current runs minus venue average
    pub difference: f64,
    pub verdict: ScoreVerdict,
    /// Share of matches at the venue won by the side batting first
    pub bat_first_success: f64,
    /// False when the venue figures are neutral defaults
    pub used_history: bool,
    pub summary: String,
}

impl VenueComparison {
    fn from_features(state: &MatchState, features: &FeatureVector) -> Self {
        let venue_avg = features.get("venue_avg_score").unwrap_or_default();
        let bat_first_success = features.get("venue_bat_first_advantage").unwrap_or_default();
        let difference = state.current_runs as f64 - venue_avg;
        let verdict = ScoreVerdict::from_difference(difference);
        let used_history = features.fallbacks.venue != VenueSource::Default;

        let summary = format!(
            "{} at {} is {} ({:+.0} vs {} average {:.0})",
            state.current_runs,
            state.venue,
            verdict,
            difference,
            if used_history { "venue" } else { "default" },
            venue_avg
        );

        VenueComparison {
            venue: state.venue.clone(),
            venue_avg,
            difference,
            verdict,
            bat_first_success,
            used_history,
            summary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResponse {
    pub team1: String,
    pub team2: String,
    pub predicted_winner: String,
    pub win_probability_team1: f64,
    pub win_probability_team2: f64,
    pub confidence_bucket: ConfidenceBucket,
    pub match_situation: MatchSituation,
    pub venue_comparison: VenueComparison,
}

/// Immutable serving context: one profile snapshot and one model
#[derive(Debug)]
pub struct Predictor {
    profiles: ProfileSet,
    model: EnsembleModel,
    assembler: FeatureAssembler,
}

impl Predictor {
    /// Fails unless the assembler builds the vectors the model was trained on
    /// and the profiles are the snapshot it was trained with
    pub fn new(profiles: ProfileSet, model: EnsembleModel, assembler: FeatureAssembler) -> Result<Self> {
        assembler.schema().ensure_matches(&model.schema)?;
        model.assembly.ensure_matches(&assembler.params())?;
        if model.profile_fingerprint != profiles.fingerprint {
            return Err(CricketError::Artifact(format!(
                "profile snapshot {} is not the one the model was trained with ({}); retrain",
                short(&profiles.fingerprint),
                short(&model.profile_fingerprint)
            )));
        }
        Ok(Predictor {
            profiles,
            model,
            assembler,
        })
    }

    /// Load both artifacts
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        profiles_path: P,
        model_path: Q,
        assembler: FeatureAssembler,
    ) -> Result<Self> {
        let model = EnsembleModel::load(model_path, &assembler.schema())?;
        let profiles = ProfileSet::load(profiles_path)?;
        Self::new(profiles, model, assembler)
    }

    pub fn model(&self) -> &EnsembleModel {
        &self.model
    }

    pub fn profiles(&self) -> &ProfileSet {
        &self.profiles
    }

    /// Predict the outcome from the batting-first side's current state
    pub fn predict(&self, state: &MatchState) -> Result<PredictionResponse> {
        state.validate()?;
        let features = self.assembler.assemble(state, &self.profiles);
        if features.fallbacks.team1 || features.fallbacks.team2 {
            log::debug!(
                "Neutral team defaults used (team1: {}, team2: {})",
                features.fallbacks.team1,
                features.fallbacks.team2
            );
        }
        if features.fallbacks.venue == VenueSource::Default {
            log::debug!("Neutral venue defaults used for '{}'", state.venue);
        }

        let p1 = self.model.predict_proba(&features)?;
        let p2 = 1.0 - p1;
        let predicted_winner = if label(p1, self.model.threshold) {
            state.team1.clone()
        } else {
            state.team2.clone()
        };

        Ok(PredictionResponse {
            team1: state.team1.clone(),
            team2: state.team2.clone(),
            predicted_winner,
            win_probability_team1: p1,
            win_probability_team2: p2,
            confidence_bucket: ConfidenceBucket::from_probability(p1.max(p2)),
            match_situation: MatchSituation::from_margin(p1 - p2),
            venue_comparison: VenueComparison::from_features(state, &features),
        })
    }
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

/// Format prediction for display
pub fn format_prediction(pred: &PredictionResponse, state: &MatchState) -> String {
    let winner_prob = if pred.predicted_winner == pred.team1 {
        pred.win_probability_team1
    } else {
        pred.win_probability_team2
    };
    let venue = &pred.venue_comparison;

    format!(
        r#"
┌─────────────────────────────────────────────────┐
│  {} vs {} at {} ({})
│  {}/{} at {:.2} an over
├─────────────────────────────────────────────────┤
│  Predicted winner: {} {:.1}%
│  Win probability:  {} {:.1}% - {} {:.1}%
│  Confidence:       {} ({})
├─────────────────────────────────────────────────┤
│  Venue average:    {:.0} ({:+.0}, {})
│  Bat-first wins:   {:.0}%
│  {}
└─────────────────────────────────────────────────┘
"#,
        pred.team1,
        pred.team2,
        state.venue,
        state.format,
        state.current_runs,
        state.current_wickets,
        state.current_run_rate,
        pred.predicted_winner,
        winner_prob * 100.0,
        pred.team1,
        pred.win_probability_team1 * 100.0,
        pred.team2,
        pred.win_probability_team2 * 100.0,
        pred.confidence_bucket,
        pred.match_situation,
        venue.venue_avg,
        venue.difference,
        venue.verdict,
        venue.bat_first_success * 100.0,
        venue.summary
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::profiles::fixtures::{profile_set, team_profile, venue_profile};
    use crate::model::ensemble::fixtures::tiny_model;
    use crate::data::formats::FormatRules;
    use crate::{CricketError, MatchFormat};

    fn predictor() -> Predictor {
        let profiles = profile_set(
            vec![team_profile("Team A", 0.60), team_profile("Team B", 0.45)],
            vec![venue_profile("Ground P", 165.0, 25.0)],
        );
        Predictor::new(profiles, tiny_model(), FeatureAssembler::default()).unwrap()
    }

    fn state(team1: &str, team2: &str, venue: &str, runs: u32, wickets: u32, rr: f64) -> MatchState {
        MatchState {
            team1: team1.to_string(),
            team2: team2.to_string(),
            venue: venue.to_string(),
            format: MatchFormat::T20,
            current_runs: runs,
            current_wickets: wickets,
            current_run_rate: rr,
        }
    }

    #[test]
    fn test_strong_first_innings_favours_team1() {
        let response = predictor()
            .predict(&state("Team A", "Team B", "Ground P", 180, 4, 7.2))
            .unwrap();
        assert!(response.win_probability_team1 > 0.5);
        assert_eq!(response.predicted_winner, "Team A");
        assert!((response.win_probability_team1 + response.win_probability_team2 - 1.0).abs() < 1e-12);
        assert_eq!(
            response.confidence_bucket,
            ConfidenceBucket::from_probability(response.win_probability_team1)
        );

        let venue = &response.venue_comparison;
        assert_eq!(venue.venue_avg, 165.0);
        assert_eq!(venue.difference, 15.0);
        assert_eq!(venue.verdict, ScoreVerdict::Good);
        assert_eq!(venue.bat_first_success, 0.55);
        assert!(venue.used_history);
    }

    #[test]
    fn test_unseen_teams_and_venue_still_predict() {
        let response = predictor()
            .predict(&state("Nowhere XI", "Somewhere XI", "New Ground", 150, 5, 7.5))
            .unwrap();
        assert!((0.0..=1.0).contains(&response.win_probability_team1));
        assert!(!response.venue_comparison.used_history);
        assert_eq!(response.venue_comparison.venue_avg, 160.0);
        assert_eq!(response.venue_comparison.verdict, ScoreVerdict::Par);
    }

    #[test]
    fn test_invalid_state_rejected() {
        let p = predictor();
        for bad in [
            state("Team A", "Team B", "Ground P", 180, 11, 7.2),
            state("Team A", "Team A", "Ground P", 180, 4, 7.2),
            state("Team A", "Team B", "", 180, 4, 7.2),
            state("Team A", "Team B", "Ground P", 180, 4, f64::NAN),
        ] {
            assert!(matches!(p.predict(&bad), Err(CricketError::InvalidInput(_))));
        }
    }

    #[test]
    fn test_schema_mismatch_at_startup() {
        let mut model = tiny_model();
        model.schema.names.swap(0, 1);
        let profiles = profile_set(vec![], vec![]);
        let err = Predictor::new(profiles, model, FeatureAssembler::default()).unwrap_err();
        assert!(matches!(err, CricketError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_changed_normalization_rejected_at_startup() {
        let mut t20 = FormatRules::t20();
        t20.normalized_mean = 0.0;
        t20.normalized_scale = 1.0;
        let assembler = FeatureAssembler::new(vec![t20, FormatRules::odi(), FormatRules::league()]);
        let profiles = profile_set(vec![], vec![]);
        let err = Predictor::new(profiles, tiny_model(), assembler).unwrap_err();
        assert!(matches!(err, CricketError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_foreign_profile_snapshot_rejected() {
        let mut profiles = profile_set(vec![team_profile("Team A", 0.60)], vec![]);
        profiles.fingerprint = "0123456789abcdef".to_string();
        let err = Predictor::new(profiles, tiny_model(), FeatureAssembler::default()).unwrap_err();
        assert!(matches!(err, CricketError::Artifact(_)));
    }

    #[test]
    fn test_load_pairs_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let profiles_path = dir.path().join("profiles.json");
        let model_path = dir.path().join("ensemble.json");
        profile_set(vec![team_profile("Team A", 0.60)], vec![])
            .save(&profiles_path)
            .unwrap();
        tiny_model().save(&model_path).unwrap();

        let p = Predictor::load(&profiles_path, &model_path, FeatureAssembler::default()).unwrap();
        assert_eq!(p.profiles().fingerprint, p.model().profile_fingerprint);
    }

    #[test]
    fn test_verdict_and_situation_thresholds() {
        assert_eq!(ScoreVerdict::from_difference(20.5), ScoreVerdict::Excellent);
        assert_eq!(ScoreVerdict::from_difference(20.0), ScoreVerdict::Good);
        assert_eq!(ScoreVerdict::from_difference(0.0), ScoreVerdict::Par);
        assert_eq!(ScoreVerdict::from_difference(-15.0), ScoreVerdict::BelowPar);
        assert_eq!(MatchSituation::from_margin(0.05), MatchSituation::VeryClose);
        assert_eq!(MatchSituation::from_margin(-0.15), MatchSituation::Competitive);
        assert_eq!(MatchSituation::from_margin(0.3), MatchSituation::ClearFavorite);
        assert_eq!(MatchSituation::from_margin(0.6), MatchSituation::Dominant);
    }

    #[test]
    fn test_format_prediction() {
        let s = state("Team A", "Team B", "Ground P", 180, 4, 7.2);
        let response = predictor().predict(&s).unwrap();
        let table = format_prediction(&response, &s);
        assert!(table.contains("Team A vs Team B at Ground P (T20)"));
        assert!(table.contains("180/4"));
        assert!(table.contains("Venue average:    165 (+15, good)"));
    }

    #[test]
    fn test_predictor_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Predictor>();
    }
}
