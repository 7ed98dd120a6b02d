//! Feature vector assembly
//!
//! The single code path that turns a match state plus a `ProfileSet` into the
//! model's ordered numeric input. Training rows and live predictions both go
//! through `FeatureAssembler::assemble`.

use serde::{Deserialize, Serialize};

use crate::data::formats::FormatRules;
use crate::features::profiles::ProfileSet;
use crate::{CricketError, MatchFormat, MatchSummary, Result};

pub const SCHEMA_VERSION: &str = "cricket-features-v1";

/// Feature names in vector order
pub const FEATURE_NAMES: [&str; 24] = [
    "runs",
    "wickets",
    "run_rate",
    "team1_win_rate",
    "team2_win_rate",
    "team1_bat_first_win_rate",
    "team2_chase_win_rate",
    "team_strength",
    "situation_advantage",
    "form_difference",
    "venue_avg_score",
    "venue_bat_first_advantage",
    "score_vs_venue_avg",
    "score_zscore",
    "run_rate_vs_venue_avg",
    "wickets_remaining",
    "wicket_quality",
    "dominant_score",
    "struggling_innings",
    "batting_momentum",
    "normalized_score",
    "score_ratio",
    "balanced_match",
    "overall_strength",
];

/// Version tag plus ordered feature names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: String,
    pub names: Vec<String>,
}

impl FeatureSchema {
    pub fn current() -> Self {
        FeatureSchema {
            version: SCHEMA_VERSION.to_string(),
            names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Fail unless `other` is exactly this schema
    pub fn ensure_matches(&self, other: &FeatureSchema) -> Result<()> {
        if self == other {
            Ok(())
        } else {
            Err(CricketError::SchemaMismatch {
                expected: self.tagged_names(),
                found: other.tagged_names(),
            })
        }
    }

    fn tagged_names(&self) -> Vec<String> {
        std::iter::once(format!("@{}", self.version))
            .chain(self.names.iter().cloned())
            .collect()
    }
}

/// Live (or end-of-first-innings) state of the team batting first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchState {
    pub team1: String,
    pub team2: String,
    pub venue: String,
    pub format: MatchFormat,
    pub current_runs: u32,
    pub current_wickets: u32,
    pub current_run_rate: f64,
}

impl MatchState {
    /// First-innings end state of a historical match
    pub fn from_summary(summary: &MatchSummary) -> Self {
        MatchState {
            team1: summary.team1.clone(),
            team2: summary.team2.clone(),
            venue: summary.venue.clone(),
            format: summary.format,
            current_runs: summary.innings1.runs,
            current_wickets: summary.innings1.wickets.min(10),
            current_run_rate: summary.innings1.run_rate,
        }
    }

    /// Reject states no real innings can be in
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(CricketError::InvalidInput(msg));
        if self.team1.trim().is_empty() || self.team2.trim().is_empty() {
            return invalid("team names must not be empty".to_string());
        }
        if self.team1.trim() == self.team2.trim() {
            return invalid(format!("team1 and team2 are both '{}'", self.team1));
        }
        if self.venue.trim().is_empty() {
            return invalid("venue must not be empty".to_string());
        }
        if self.current_wickets > 10 {
            return invalid(format!("wickets must be 0-10, got {}", self.current_wickets));
        }
        if self.current_runs > 1000 {
            return invalid(format!("runs must be at most 1000, got {}", self.current_runs));
        }
        if !self.current_run_rate.is_finite() || !(0.0..=36.0).contains(&self.current_run_rate) {
            return invalid(format!(
                "run rate must be between 0 and 36, got {}",
                self.current_run_rate
            ));
        }
        Ok(())
    }
}

/// Values used when a profile is missing or low-confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeutralDefaults {
    pub win_rate: f64,
    pub recent_form: f64,
    pub venue_avg_score: f64,
    pub venue_score_std: f64,
    pub venue_bat_first_advantage: f64,
    pub venue_run_rate: f64,
    pub team_run_rate: f64,
}

impl Default for NeutralDefaults {
    fn default() -> Self {
        NeutralDefaults {
            win_rate: 0.5,
            recent_form: 0.5,
            venue_avg_score: 160.0,
            venue_score_std: 25.0,
            venue_bat_first_advantage: 0.5,
            venue_run_rate: 7.0,
            team_run_rate: 6.5,
        }
    }
}

/// Score normalization applied for one format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreNormalization {
    pub format: MatchFormat,
    pub mean: f64,
    pub scale: f64,
}

/// Constants baked into every assembled vector. Stored with the model so a
/// serving process configured differently is caught at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyParams {
    pub normalization: Vec<ScoreNormalization>,
    pub defaults: NeutralDefaults,
}

impl AssemblyParams {
    /// Fail unless `found` assembles vectors exactly as this does
    pub fn ensure_matches(&self, found: &AssemblyParams) -> Result<()> {
        let mut expected = Vec::new();
        let mut actual = Vec::new();
        for (a, b) in self.normalization.iter().zip(&found.normalization) {
            if a != b {
                expected.push(format!("{} normalization ({}, {})", a.format, a.mean, a.scale));
                actual.push(format!("{} normalization ({}, {})", b.format, b.mean, b.scale));
            }
        }
        if self.normalization.len() != found.normalization.len() {
            expected.push(format!("{} normalized formats", self.normalization.len()));
            actual.push(format!("{} normalized formats", found.normalization.len()));
        }
        if self.defaults != found.defaults {
            expected.push(format!("defaults {:?}", self.defaults));
            actual.push(format!("defaults {:?}", found.defaults));
        }

        if expected.is_empty() {
            Ok(())
        } else {
            Err(CricketError::SchemaMismatch {
                expected,
                found: actual,
            })
        }
    }
}

/// Where the venue figures came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueSource {
    Format,
    Overall,
    Default,
}

/// Which inputs fell back to neutral defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fallbacks {
    pub team1: bool,
    pub team2: bool,
    pub venue: VenueSource,
}

/// Ordered feature values tagged with their schema version
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub version: String,
    pub values: Vec<f64>,
    pub fallbacks: Fallbacks,
}

impl FeatureVector {
    /// Value by feature name
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .and_then(|i| self.values.get(i).copied())
    }

    pub fn to_f32(&self) -> Vec<f32> {
        self.values.iter().map(|v| *v as f32).collect()
    }

    /// Fail unless this vector was built against `schema`
    pub fn ensure_schema(&self, schema: &FeatureSchema) -> Result<()> {
        if self.version == schema.version && self.values.len() == schema.len() {
            Ok(())
        } else {
            Err(CricketError::SchemaMismatch {
                expected: schema.names.clone(),
                found: vec![format!("@{} ({} values)", self.version, self.values.len())],
            })
        }
    }
}

/// Builds feature vectors from match states and profiles
#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    defaults: NeutralDefaults,
    formats: Vec<FormatRules>,
}

impl Default for FeatureAssembler {
    fn default() -> Self {
        Self::new(FormatRules::defaults())
    }
}

impl FeatureAssembler {
    pub fn new(formats: Vec<FormatRules>) -> Self {
        FeatureAssembler {
            defaults: NeutralDefaults::default(),
            formats,
        }
    }

    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::current()
    }

    /// Normalization per format (resolved, so missing config entries show
    /// their built-in values) plus the neutral defaults
    pub fn params(&self) -> AssemblyParams {
        let normalization = [MatchFormat::T20, MatchFormat::Odi, MatchFormat::League]
            .into_iter()
            .map(|format| {
                let rules = self.rules(format);
                ScoreNormalization {
                    format,
                    mean: rules.normalized_mean,
                    scale: rules.normalized_scale,
                }
            })
            .collect();
        AssemblyParams {
            normalization,
            defaults: self.defaults.clone(),
        }
    }

    fn rules(&self, format: MatchFormat) -> FormatRules {
        self.formats
            .iter()
            .find(|r| r.format == format)
            .cloned()
            .unwrap_or_else(|| match format {
                MatchFormat::Odi => FormatRules::odi(),
                MatchFormat::T20 => FormatRules::t20(),
                MatchFormat::League => FormatRules::league(),
            })
    }

    /// Assemble the feature vector for a state. Never fails: unknown or
    /// low-confidence teams and venues take neutral defaults.
    pub fn assemble(&self, state: &MatchState, profiles: &ProfileSet) -> FeatureVector {
        let d = &self.defaults;

        let team1 = profiles.confident_team(&state.team1);
        let team2 = profiles.confident_team(&state.team2);

        let t1_wr = team1.map_or(d.win_rate, |t| t.win_rate);
        let t2_wr = team2.map_or(d.win_rate, |t| t.win_rate);
        let t1_bat_first = team1.map_or(d.win_rate, |t| t.bat_first_win_rate);
        let t2_chase = team2.map_or(d.win_rate, |t| t.chase_win_rate);
        let t1_form = team1.map_or(d.recent_form, |t| t.recent_form);
        let t2_form = team2.map_or(d.recent_form, |t| t.recent_form);
        let t1_run_rate = team1
            .and_then(|t| t.batting_run_rate())
            .unwrap_or(d.team_run_rate);

        let venue = profiles.venue_for(&state.venue, state.format);
        let venue_source = match venue {
            Some(v) if v.format.is_some() => VenueSource::Format,
            Some(_) => VenueSource::Overall,
            None => VenueSource::Default,
        };
        let venue_avg = venue.map_or(d.venue_avg_score, |v| v.avg_score);
        let venue_std = venue.map_or(d.venue_score_std, |v| v.score_std);
        let venue_adv = venue.map_or(d.venue_bat_first_advantage, |v| v.bat_first_advantage);
        let venue_rr = venue.map_or(d.venue_run_rate, |v| v.avg_run_rate);

        let runs = state.current_runs as f64;
        let wickets = state.current_wickets as f64;
        let run_rate = state.current_run_rate;

        let team_strength = t1_wr - t2_wr;
        let situation_advantage = t1_bat_first - t2_chase;
        let score_vs_venue = runs - venue_avg;
        let zscore = (score_vs_venue / venue_std.max(1.0)).clamp(-3.0, 3.0);
        let wickets_remaining = 10u32.saturating_sub(state.current_wickets) as f64;
        let score_ratio = runs / venue_avg.max(1.0);
        let wicket_quality = wickets_remaining / 10.0 * score_ratio;
        let dominant = runs >= venue_avg + 15.0 && state.current_wickets <= 5;
        let struggling = runs < venue_avg - 10.0 || state.current_wickets >= 8;
        let momentum = run_rate / (t1_run_rate + 0.1) * wickets_remaining / 10.0;
        let normalized = self.rules(state.format).normalize_score(runs);
        let overall = 0.4 * zscore + 0.3 * team_strength + 0.2 * wicket_quality + 0.1 * situation_advantage;

        let flag = |b: bool| if b { 1.0 } else { 0.0 };

        let values = vec![
            runs,
            wickets,
            run_rate,
            t1_wr,
            t2_wr,
            t1_bat_first,
            t2_chase,
            team_strength,
            situation_advantage,
            t1_form - t2_form,
            venue_avg,
            venue_adv,
            score_vs_venue,
            zscore,
            run_rate - venue_rr,
            wickets_remaining,
            wicket_quality,
            flag(dominant),
            flag(struggling),
            momentum,
            normalized,
            score_ratio,
            flag(team_strength.abs() < 0.15),
            overall,
        ];

        FeatureVector {
            version: SCHEMA_VERSION.to_string(),
            values,
            fallbacks: Fallbacks {
                team1: team1.is_none(),
                team2: team2.is_none(),
                venue: venue_source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::profiles::fixtures::{profile_set, team_profile, venue_profile};

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

    fn scenario_profiles() -> ProfileSet {
        profile_set(
            vec![team_profile("Team A", 0.60), team_profile("Team B", 0.45)],
            vec![venue_profile("Ground P", 165.0, 25.0)],
        )
    }

    #[test]
    fn test_schema_matches_vector_length() {
        let schema = FeatureSchema::current();
        assert_eq!(schema.len(), 24);
        let v = FeatureAssembler::default().assemble(
            &state("Team A", "Team B", "Ground P", 150, 3, 7.5),
            &scenario_profiles(),
        );
        assert_eq!(v.values.len(), schema.len());
        assert!(v.ensure_schema(&schema).is_ok());
    }

    #[test]
    fn test_strong_position_features() {
        let v = FeatureAssembler::default().assemble(
            &state("Team A", "Team B", "Ground P", 180, 4, 7.2),
            &scenario_profiles(),
        );
        let get = |n: &str| v.get(n).unwrap();

        assert!((get("team_strength") - 0.15).abs() < 1e-9);
        assert!((get("score_zscore") - 0.6).abs() < 1e-9);
        assert_eq!(get("score_vs_venue_avg"), 15.0);
        assert_eq!(get("dominant_score"), 1.0);
        assert_eq!(get("struggling_innings"), 0.0);
        assert_eq!(get("wickets_remaining"), 6.0);
        assert!((get("wicket_quality") - 0.6 * 180.0 / 165.0).abs() < 1e-9);
        assert!((get("batting_momentum") - 7.2 / 8.1 * 0.6).abs() < 1e-9);
        assert!((get("normalized_score") - (20.0 / 30.0)).abs() < 1e-9);
        assert!(!v.fallbacks.team1 && !v.fallbacks.team2);
        assert_eq!(v.fallbacks.venue, VenueSource::Overall);
    }

    #[test]
    fn test_unknown_team_and_venue_use_defaults() {
        let v = FeatureAssembler::default().assemble(
            &state("ZZZ", "Team B", "Ground Q", 150, 5, 7.5),
            &scenario_profiles(),
        );
        assert_eq!(v.get("team1_win_rate"), Some(0.5));
        assert_eq!(v.get("team2_win_rate"), Some(0.45));
        assert_eq!(v.get("venue_avg_score"), Some(160.0));
        assert_eq!(v.get("venue_bat_first_advantage"), Some(0.5));
        assert_eq!(v.get("run_rate_vs_venue_avg"), Some(0.5));
        assert!((v.get("batting_momentum").unwrap() - 7.5 / 6.6 * 0.5).abs() < 1e-9);
        assert!(v.fallbacks.team1);
        assert!(!v.fallbacks.team2);
        assert_eq!(v.fallbacks.venue, VenueSource::Default);
        assert!(v.values.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_low_confidence_team_falls_back() {
        let mut weak = team_profile("Team C", 0.9);
        weak.low_confidence = true;
        let profiles = profile_set(vec![weak, team_profile("Team B", 0.45)], vec![]);
        let v = FeatureAssembler::default().assemble(&state("Team C", "Team B", "Ground P", 150, 5, 7.5), &profiles);
        assert_eq!(v.get("team1_win_rate"), Some(0.5));
        assert!(v.fallbacks.team1);
    }

    #[test]
    fn test_all_out_boundary() {
        let v = FeatureAssembler::default().assemble(
            &state("Team A", "Team B", "Ground P", 120, 10, 6.0),
            &scenario_profiles(),
        );
        assert_eq!(v.get("wickets_remaining"), Some(0.0));
        assert_eq!(v.get("wicket_quality"), Some(0.0));
        assert_eq!(v.get("batting_momentum"), Some(0.0));
        assert_eq!(v.get("struggling_innings"), Some(1.0));
    }

    #[test]
    fn test_par_score_boundary() {
        let v = FeatureAssembler::default().assemble(
            &state("Team A", "Team B", "Ground P", 165, 6, 8.25),
            &scenario_profiles(),
        );
        assert_eq!(v.get("score_vs_venue_avg"), Some(0.0));
        assert_eq!(v.get("score_zscore"), Some(0.0));
        assert_eq!(v.get("score_ratio"), Some(1.0));
        assert_eq!(v.get("dominant_score"), Some(0.0));
    }

    #[test]
    fn test_zscore_is_clipped() {
        let v = FeatureAssembler::default().assemble(
            &state("Team A", "Team B", "Ground P", 400, 2, 12.0),
            &scenario_profiles(),
        );
        assert_eq!(v.get("score_zscore"), Some(3.0));
    }

    #[test]
    fn test_format_specific_venue_preferred() {
        let mut profiles = scenario_profiles();
        let mut t20 = venue_profile("Ground P", 190.0, 20.0);
        t20.format = Some(MatchFormat::T20);
        profiles
            .venue_formats
            .entry(MatchFormat::T20)
            .or_default()
            .insert("Ground P".to_string(), t20);

        let v = FeatureAssembler::default().assemble(&state("Team A", "Team B", "Ground P", 190, 3, 9.5), &profiles);
        assert_eq!(v.get("venue_avg_score"), Some(190.0));
        assert_eq!(v.fallbacks.venue, VenueSource::Format);
    }

    #[test]
    fn test_validate_rejects_bad_states() {
        assert!(state("A", "B", "V", 100, 3, 6.0).validate().is_ok());
        assert!(state("A", "B", "V", 100, 11, 6.0).validate().is_err());
        assert!(state("A", "B", "V", 1001, 3, 6.0).validate().is_err());
        assert!(state("A", "B", "V", 100, 3, f64::NAN).validate().is_err());
        assert!(state("A", "B", "V", 100, 3, 37.0).validate().is_err());
        assert!(state("A", "A", "V", 100, 3, 6.0).validate().is_err());
        assert!(state("", "B", "V", 100, 3, 6.0).validate().is_err());
        assert!(state("A", "B", " ", 100, 3, 6.0).validate().is_err());
    }

    #[test]
    fn test_schema_mismatch_detected() {
        let current = FeatureSchema::current();
        let mut other = current.clone();
        other.names.swap(0, 1);
        assert!(matches!(
            current.ensure_matches(&other),
            Err(CricketError::SchemaMismatch { .. })
        ));
        let mut renamed = current.clone();
        renamed.version = "cricket-features-v0".to_string();
        assert!(current.ensure_matches(&renamed).is_err());
        assert!(current.ensure_matches(&FeatureSchema::current()).is_ok());
    }

    #[test]
    fn test_params_track_format_normalization() {
        let trained = FeatureAssembler::default().params();
        assert_eq!(trained.normalization.len(), 3);
        // Config listing only T20 still resolves ODI and league to built-ins
        assert!(trained
            .ensure_matches(&FeatureAssembler::new(vec![FormatRules::t20()]).params())
            .is_ok());

        let mut t20 = FormatRules::t20();
        t20.normalized_mean = 0.0;
        t20.normalized_scale = 1.0;
        let serving = FeatureAssembler::new(vec![t20]);
        match trained.ensure_matches(&serving.params()) {
            Err(CricketError::SchemaMismatch { expected, found }) => {
                assert_eq!(expected, vec!["T20 normalization (160, 30)".to_string()]);
                assert_eq!(found, vec!["T20 normalization (0, 1)".to_string()]);
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }
}
