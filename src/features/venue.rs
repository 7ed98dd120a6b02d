//! Venue scoring profiles
//!
//! First-innings scoring patterns per venue, overall and per format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::features::team_stats::{mean, median, std_dev};
use crate::{MatchFormat, MatchSummary};

/// First-innings aggregates at one venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueProfile {
    pub venue: String,
    /// `None` for the all-format profile
    pub format: Option<MatchFormat>,
    pub matches: usize,
    pub avg_score: f64,
    pub median_score: f64,
    pub score_std: f64,
    pub min_score: f64,
    pub max_score: f64,
    /// Share of matches won by the team batting first
    pub bat_first_advantage: f64,
    pub avg_run_rate: f64,
    pub avg_boundaries: f64,
    pub avg_wickets: f64,
    pub low_confidence: bool,
}

#[derive(Debug, Clone, Default)]
struct VenueStatistics {
    scores: Vec<f64>,
    run_rates: Vec<f64>,
    boundaries: Vec<f64>,
    wickets: Vec<f64>,
    bat_first_wins: usize,
}

impl VenueStatistics {
    fn update(&mut self, record: &MatchSummary) {
        let first = &record.innings1;
        self.scores.push(first.runs as f64);
        self.run_rates.push(first.run_rate);
        self.boundaries.push(first.boundaries as f64);
        self.wickets.push(first.wickets as f64);
        if record.team1_won {
            self.bat_first_wins += 1;
        }
    }

    fn finish(&self, venue: &str, format: Option<MatchFormat>, min_matches: usize) -> VenueProfile {
        let matches = self.scores.len();
        let fold = |init: f64, f: fn(f64, f64) -> f64| self.scores.iter().copied().fold(init, f);
        VenueProfile {
            venue: venue.to_string(),
            format,
            matches,
            avg_score: mean(&self.scores),
            median_score: median(&self.scores),
            score_std: std_dev(&self.scores),
            min_score: if matches == 0 { 0.0 } else { fold(f64::INFINITY, f64::min) },
            max_score: if matches == 0 { 0.0 } else { fold(f64::NEG_INFINITY, f64::max) },
            bat_first_advantage: if matches == 0 {
                0.5
            } else {
                self.bat_first_wins as f64 / matches as f64
            },
            avg_run_rate: mean(&self.run_rates),
            avg_boundaries: mean(&self.boundaries),
            avg_wickets: mean(&self.wickets),
            low_confidence: matches < min_matches,
        }
    }
}

/// Tracks first-innings scoring at venues
#[derive(Default)]
pub struct VenueTracker {
    overall: BTreeMap<String, VenueStatistics>,
    by_format: BTreeMap<(MatchFormat, String), VenueStatistics>,
}

impl VenueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_matches(&mut self, matches: &[MatchSummary]) {
        for record in matches {
            self.update(record);
        }
    }

    pub fn update(&mut self, record: &MatchSummary) {
        self.overall
            .entry(record.venue.clone())
            .or_default()
            .update(record);
        self.by_format
            .entry((record.format, record.venue.clone()))
            .or_default()
            .update(record);
    }

    /// Overall profiles keyed by venue
    pub fn venue_profiles(&self, min_matches: usize) -> BTreeMap<String, VenueProfile> {
        self.overall
            .iter()
            .map(|(venue, stats)| (venue.clone(), stats.finish(venue, None, min_matches)))
            .collect()
    }

    /// Per-format profiles keyed by format, then venue
    pub fn format_profiles(
        &self,
        min_matches: usize,
    ) -> BTreeMap<MatchFormat, BTreeMap<String, VenueProfile>> {
        let mut out: BTreeMap<MatchFormat, BTreeMap<String, VenueProfile>> = BTreeMap::new();
        for ((format, venue), stats) in &self.by_format {
            out.entry(*format)
                .or_default()
                .insert(venue.clone(), stats.finish(venue, Some(*format), min_matches));
        }
        out
    }
}
