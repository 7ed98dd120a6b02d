//! Profile snapshot
//!
//! `ProfileSet` bundles team and venue profiles with the confidence policy used
//! to build them and a fingerprint of the source dataset. It is built once,
//! persisted next to the model, and shared read-only by training and serving.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

use crate::features::team_stats::{TeamProfile, TeamStatisticsComputer};
use crate::features::venue::{VenueProfile, VenueTracker};
use crate::{write_json_atomic, CricketError, MatchFormat, MatchSummary, ProfileConfig, Result};

/// What to do with profiles built from too few matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceMode {
    /// Keep the entry, mark it low-confidence
    FlagAndFallback,
    /// Drop the entry from the snapshot
    Exclude,
}

/// Minimum sample sizes for a profile to be trusted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidencePolicy {
    pub min_team_matches: usize,
    pub min_venue_matches: usize,
    pub mode: ConfidenceMode,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        ConfidencePolicy {
            min_team_matches: 10,
            min_venue_matches: 5,
            mode: ConfidenceMode::FlagAndFallback,
        }
    }
}

/// Immutable snapshot of all profiles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSet {
    pub teams: BTreeMap<String, TeamProfile>,
    pub venues: BTreeMap<String, VenueProfile>,
    pub venue_formats: BTreeMap<MatchFormat, BTreeMap<String, VenueProfile>>,
    pub policy: ConfidencePolicy,
    pub recent_form_window: usize,
    /// SHA-256 over the ordered summary keys
    pub fingerprint: String,
    pub summary_count: usize,
    pub built_at: DateTime<Utc>,
}

impl ProfileSet {
    pub fn team(&self, name: &str) -> Option<&TeamProfile> {
        self.teams.get(name)
    }

    /// Team profile usable as-is by the assembler
    pub fn confident_team(&self, name: &str) -> Option<&TeamProfile> {
        self.teams.get(name).filter(|p| !p.low_confidence)
    }

    pub fn venue(&self, venue: &str) -> Option<&VenueProfile> {
        self.venues.get(venue)
    }

    /// Most specific confident venue profile: venue x format, then venue
    pub fn venue_for(&self, venue: &str, format: MatchFormat) -> Option<&VenueProfile> {
        self.venue_formats
            .get(&format)
            .and_then(|m| m.get(venue))
            .filter(|p| !p.low_confidence)
            .or_else(|| self.venues.get(venue).filter(|p| !p.low_confidence))
    }

    /// Whether every profile a match references is present in the snapshot
    pub fn covers(&self, summary: &MatchSummary) -> bool {
        self.teams.contains_key(&summary.team1)
            && self.teams.contains_key(&summary.team2)
            && self.venues.contains_key(&summary.venue)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_json_atomic(path.as_ref(), self)?;
        log::info!(
            "Saved {} team and {} venue profiles to {}",
            self.teams.len(),
            self.venues.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CricketError::Artifact(format!("cannot read profiles {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// SHA-256 over the natural keys of the summaries, in order
pub fn fingerprint(summaries: &[MatchSummary]) -> String {
    let mut hasher = Sha256::new();
    for s in summaries {
        let key = s.key();
        hasher.update(key.team1.as_bytes());
        hasher.update([0x1f]);
        hasher.update(key.team2.as_bytes());
        hasher.update([0x1f]);
        hasher.update(key.venue.as_bytes());
        hasher.update([0x1f]);
        hasher.update(key.season.as_bytes());
        hasher.update([0x1f]);
        hasher.update(key.team1_runs.to_le_bytes());
        hasher.update(key.team2_runs.to_le_bytes());
        hasher.update([0x1e]);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Builds a `ProfileSet` from match summaries
pub struct ProfileBuilder {
    policy: ConfidencePolicy,
    recent_form_window: usize,
}

impl ProfileBuilder {
    pub fn new(config: &ProfileConfig) -> Self {
        ProfileBuilder {
            policy: config.confidence.clone(),
            recent_form_window: config.recent_form_window,
        }
    }

    pub fn build(&self, summaries: &[MatchSummary]) -> ProfileSet {
        let mut teams = TeamStatisticsComputer::new(self.recent_form_window);
        teams.process_matches(summaries);
        let mut venues = VenueTracker::new();
        venues.process_matches(summaries);

        let mut team_profiles = teams.into_profiles(self.policy.min_team_matches);
        let mut venue_profiles = venues.venue_profiles(self.policy.min_venue_matches);
        let mut format_profiles = venues.format_profiles(self.policy.min_venue_matches);

        if self.policy.mode == ConfidenceMode::Exclude {
            team_profiles.retain(|_, p| !p.low_confidence);
            venue_profiles.retain(|_, p| !p.low_confidence);
            for by_venue in format_profiles.values_mut() {
                by_venue.retain(|_, p| !p.low_confidence);
            }
            format_profiles.retain(|_, m| !m.is_empty());
        }

        let low_teams = team_profiles.values().filter(|p| p.low_confidence).count();
        let low_venues = venue_profiles.values().filter(|p| p.low_confidence).count();
        log::info!(
            "Built profiles from {} matches: {} teams ({} low confidence), {} venues ({} low confidence)",
            summaries.len(),
            team_profiles.len(),
            low_teams,
            venue_profiles.len(),
            low_venues
        );

        ProfileSet {
            teams: team_profiles,
            venues: venue_profiles,
            venue_formats: format_profiles,
            policy: self.policy.clone(),
            recent_form_window: self.recent_form_window,
            fingerprint: fingerprint(summaries),
            summary_count: summaries.len(),
            built_at: Utc::now(),
        }
    }
}
