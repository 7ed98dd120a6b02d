//! Cricket match outcome prediction
//!
//! Normalizes ball-by-ball history into match summaries, builds team and venue
//! profiles, assembles a fixed feature vector from a live score state and scores
//! it with a tree ensemble.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::data::formats::FormatRules;
use crate::data::ingest::ExtractionPolicy;
use crate::features::profiles::ConfidencePolicy;
use crate::model::boosting::BoostingConfig;
use crate::model::combiner::CombinerKind;
use crate::model::forest::ForestConfig;

/// Limited-overs match format
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchFormat {
    T20,
    Odi,
    /// Franchise T20 leagues (IPL and similar)
    League,
}

impl MatchFormat {
    pub fn code(&self) -> &'static str {
        match self {
            MatchFormat::T20 => "t20",
            MatchFormat::Odi => "odi",
            MatchFormat::League => "league",
        }
    }

    pub fn all() -> [MatchFormat; 3] {
        [MatchFormat::T20, MatchFormat::Odi, MatchFormat::League]
    }
}

impl fmt::Display for MatchFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchFormat::T20 => write!(f, "T20"),
            MatchFormat::Odi => write!(f, "ODI"),
            MatchFormat::League => write!(f, "League"),
        }
    }
}

impl FromStr for MatchFormat {
    type Err = CricketError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "t20" | "t20i" => Ok(MatchFormat::T20),
            "odi" => Ok(MatchFormat::Odi),
            "league" | "ipl" => Ok(MatchFormat::League),
            other => Err(CricketError::Parse(format!(
                "Unknown format: {}. Use t20, odi or league.",
                other
            ))),
        }
    }
}

/// Aggregates for one innings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InningsSummary {
    /// Off-bat runs plus extras
    pub runs: u32,
    pub wickets: u32,
    pub balls: u32,
    pub strike_rate: f64,
    pub run_rate: f64,
    pub fours: u32,
    pub sixes: u32,
    pub boundaries: u32,
    pub boundary_runs: u32,
    pub boundary_percentage: f64,
    pub powerplay_runs: u32,
    pub middle_runs: u32,
    pub death_runs: u32,
    pub extras: u32,
    pub dot_balls: u32,
    pub dot_percentage: f64,
}

/// Natural key used to collapse duplicate source files
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchKey {
    pub team1: String,
    pub team2: String,
    pub venue: String,
    pub season: String,
    pub team1_runs: u32,
    pub team2_runs: u32,
}

/// One normalized historical match. Team 1 always batted first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub format: MatchFormat,
    pub venue: String,
    pub season: String,
    pub team1: String,
    pub team2: String,
    pub innings1: InningsSummary,
    pub innings2: InningsSummary,
    pub winner: String,
    pub team1_won: bool,
    /// File the match was extracted from
    pub source: String,
}

impl MatchSummary {
    pub fn key(&self) -> MatchKey {
        MatchKey {
            team1: self.team1.clone(),
            team2: self.team2.clone(),
            venue: self.venue.clone(),
            season: self.season.clone(),
            team1_runs: self.innings1.runs,
            team2_runs: self.innings2.runs,
        }
    }

    pub fn total_runs(&self) -> u32 {
        self.innings1.runs + self.innings2.runs
    }

    pub fn run_difference(&self) -> u32 {
        self.innings1.runs.abs_diff(self.innings2.runs)
    }

    /// Check if the given team won this match
    pub fn did_win(&self, team: &str) -> Option<bool> {
        if team == self.team1 {
            Some(self.team1_won)
        } else if team == self.team2 {
            Some(!self.team1_won)
        } else {
            None
        }
    }

}

/// Decimal overs from cricket notation, where `15.3` is 15 overs and 3 balls
pub fn decimal_overs(overs: f64) -> Result<f64> {
    if !overs.is_finite() || overs < 0.0 {
        return Err(CricketError::InvalidInput(format!("invalid overs: {}", overs)));
    }
    let completed = overs.trunc();
    let balls = ((overs - completed) * 10.0).round();
    if balls > 5.0 {
        return Err(CricketError::InvalidInput(format!(
            "{} is not an over count: an over has 6 balls, so use .0 to .5",
            overs
        )));
    }
    Ok(completed + balls / 6.0)
}

/// Confidence bucket on the larger of the two win probabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBucket {
    VeryHigh, // >= 80%
    High,     // 70-80%
    Moderate, // 60-70%
    Low,      // < 60%
}

impl ConfidenceBucket {
    pub fn from_probability(max_prob: f64) -> Self {
        if max_prob >= 0.80 {
            ConfidenceBucket::VeryHigh
        } else if max_prob >= 0.70 {
            ConfidenceBucket::High
        } else if max_prob >= 0.60 {
            ConfidenceBucket::Moderate
        } else {
            ConfidenceBucket::Low
        }
    }
}

impl fmt::Display for ConfidenceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceBucket::VeryHigh => write!(f, "very high"),
            ConfidenceBucket::High => write!(f, "high"),
            ConfidenceBucket::Moderate => write!(f, "moderate"),
            ConfidenceBucket::Low => write!(f, "low"),
        }
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum CricketError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feature schema mismatch: model expects {expected:?}, assembler produces {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model not trained - run `cricket train` first")]
    NoModel,

    #[error("No usable matches - run `cricket data ingest` first")]
    NoData,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Artifact error: {0}")]
    Artifact(String),
}

pub type Result<T> = std::result::Result<T, CricketError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub ingest: IngestConfig,
    pub formats: Vec<FormatRules>,
    pub profiles: ProfileConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    pub profiles_path: String,
    pub model_path: String,
    pub sources: Vec<SourceConfig>,
}

/// A directory of ball-by-ball CSV files of one format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub format: MatchFormat,
    pub dir: String,
}

/// Quality thresholds; unset overrides fall back to the policy's values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub policy: ExtractionPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rows_per_file: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_balls_per_innings: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_total: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_venue: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Matches counted for recent form
    pub recent_form_window: usize,
    pub confidence: ConfidencePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub seed: u64,
    pub validation_fraction: f64,
    pub cv_folds: usize,
    pub threshold: f64,
    pub combiner: CombinerKind,
    pub stacking_folds: usize,
    pub meta_epochs: usize,
    pub meta_learning_rate: f64,
    pub forest: ForestConfig,
    pub boosters: Vec<BoostingConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data: DataConfig {
                database_path: "data/cricket.db".to_string(),
                profiles_path: "model/profiles.json".to_string(),
                model_path: "model/ensemble.json".to_string(),
                sources: vec![
                    SourceConfig {
                        format: MatchFormat::T20,
                        dir: "data/raw/t20".to_string(),
                    },
                    SourceConfig {
                        format: MatchFormat::League,
                        dir: "data/raw/ipl".to_string(),
                    },
                    SourceConfig {
                        format: MatchFormat::Odi,
                        dir: "data/raw/odi".to_string(),
                    },
                ],
            },
            ingest: IngestConfig {
                policy: ExtractionPolicy::Quality,
                min_rows_per_file: None,
                min_balls_per_innings: None,
                min_total: None,
                max_total: None,
                require_venue: None,
            },
            formats: FormatRules::defaults(),
            profiles: ProfileConfig {
                recent_form_window: 20,
                confidence: ConfidencePolicy::default(),
            },
            training: TrainingConfig {
                seed: 42,
                validation_fraction: 0.2,
                cv_folds: 5,
                threshold: 0.5,
                combiner: CombinerKind::Stacking,
                stacking_folds: 5,
                meta_epochs: 400,
                meta_learning_rate: 0.5,
                forest: ForestConfig::default(),
                boosters: BoostingConfig::defaults(),
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CricketError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| CricketError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CricketError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let t = &self.training;
        if !(0.0..1.0).contains(&t.validation_fraction) || t.validation_fraction == 0.0 {
            return Err(CricketError::Config(
                "training.validation_fraction must be in (0, 1)".to_string(),
            ));
        }
        if t.cv_folds < 2 || t.stacking_folds < 2 {
            return Err(CricketError::Config(
                "training.cv_folds and training.stacking_folds must be at least 2".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&t.threshold) {
            return Err(CricketError::Config(
                "training.threshold must be in [0, 1]".to_string(),
            ));
        }
        if t.boosters.is_empty() && t.forest.n_trees == 0 {
            return Err(CricketError::Config("no base learners configured".to_string()));
        }
        for format in MatchFormat::all() {
            if !self.formats.iter().any(|r| r.format == format) {
                return Err(CricketError::Config(format!(
                    "missing [[formats]] entry for {}",
                    format
                )));
            }
        }
        Ok(())
    }

    /// Rules record for a format
    pub fn format_rules(&self, format: MatchFormat) -> Result<&FormatRules> {
        self.formats
            .iter()
            .find(|r| r.format == format)
            .ok_or_else(|| CricketError::Config(format!("no format rules for {}", format)))
    }
}

/// Serialize to JSON in a temp file beside `path`, then rename over it.
///
/// Readers see either the previous artifact or the complete new one.
pub(crate) fn write_json_atomic<T: Serialize>(path: &std::path::Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => std::path::Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        use std::io::Write;
        let mut writer = std::io::BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CricketError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Build a summary with the given first/second innings totals
    pub fn summary(
        format: MatchFormat,
        venue: &str,
        season: &str,
        team1: &str,
        team2: &str,
        team1_runs: u32,
        team2_runs: u32,
    ) -> MatchSummary {
        let team1_won = team1_runs > team2_runs;
        let innings = |runs: u32, wickets: u32| {
            let balls = 120;
            InningsSummary {
                runs,
                wickets,
                balls,
                strike_rate: runs as f64 / balls as f64 * 100.0,
                run_rate: runs as f64 / balls as f64 * 6.0,
                fours: runs / 12,
                sixes: runs / 30,
                boundaries: runs / 12 + runs / 30,
                boundary_runs: (runs / 12) * 4 + (runs / 30) * 6,
                ..InningsSummary::default()
            }
        };
        MatchSummary {
            format,
            venue: venue.to_string(),
            season: season.to_string(),
            team1: team1.to_string(),
            team2: team2.to_string(),
            innings1: innings(team1_runs, 5),
            innings2: innings(team2_runs, 7),
            winner: if team1_won { team1 } else { team2 }.to_string(),
            team1_won,
            source: format!("{}-{}-{}.csv", team1, team2, season),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("ODI".parse::<MatchFormat>().unwrap(), MatchFormat::Odi);
        assert_eq!("ipl".parse::<MatchFormat>().unwrap(), MatchFormat::League);
        assert_eq!(" t20 ".parse::<MatchFormat>().unwrap(), MatchFormat::T20);
        assert!("test".parse::<MatchFormat>().is_err());
    }

    #[test]
    fn test_confidence_buckets() {
        assert_eq!(ConfidenceBucket::from_probability(0.85), ConfidenceBucket::VeryHigh);
        assert_eq!(ConfidenceBucket::from_probability(0.80), ConfidenceBucket::VeryHigh);
        assert_eq!(ConfidenceBucket::from_probability(0.75), ConfidenceBucket::High);
        assert_eq!(ConfidenceBucket::from_probability(0.65), ConfidenceBucket::Moderate);
        assert_eq!(ConfidenceBucket::from_probability(0.55), ConfidenceBucket::Low);
    }

    #[test]
    fn test_summary_perspective() {
        let m = test_support::summary(MatchFormat::T20, "Eden Gardens", "2021", "India", "England", 180, 170);
        assert_eq!(m.did_win("India"), Some(true));
        assert_eq!(m.did_win("England"), Some(false));
        assert_eq!(m.did_win("Nepal"), None);
        assert_eq!(m.run_difference(), 10);
    }

    #[test]
    fn test_decimal_overs() {
        assert_eq!(decimal_overs(20.0).unwrap(), 20.0);
        assert!((decimal_overs(15.3).unwrap() - 15.5).abs() < 1e-12);
        assert!((decimal_overs(0.1).unwrap() - 1.0 / 6.0).abs() < 1e-12);
        assert!(decimal_overs(15.7).is_err());
        assert!(decimal_overs(-1.0).is_err());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();

        let config = Config::default();
        config.save(path).unwrap();
        let loaded = Config::load(path).unwrap();

        assert_eq!(loaded.training.cv_folds, 5);
        assert_eq!(loaded.formats.len(), 3);
        assert_eq!(loaded.data.sources.len(), 3);
        assert!(loaded.format_rules(MatchFormat::Odi).is_ok());
    }

    #[test]
    fn test_config_rejects_single_fold() {
        let mut config = Config::default();
        config.training.cv_folds = 1;
        assert!(config.validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();
        config.save(path).unwrap();
        assert!(matches!(Config::load(path), Err(CricketError::Config(_))));
    }
}
