//! Team statistics computation
//!
//! Per-team aggregates over match history, split by batting first and chasing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::MatchSummary;

static YEAR: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\d{4}").ok());

/// Ordering key for season strings such as "2019", "2019/20" or "2021-03-14".
///
/// Seasons with a year sort after those without, by year then raw text.
pub fn season_sort_key(season: &str) -> (Option<u32>, String) {
    let year = YEAR
        .as_ref()
        .and_then(|re| re.find(season))
        .and_then(|m| m.as_str().parse().ok());
    (year, season.to_string())
}

/// Aggregated record of one team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamProfile {
    pub team: String,
    /// Total matches played
    pub matches: usize,
    pub wins: usize,
    pub bat_first_matches: usize,
    pub bat_first_wins: usize,
    pub chase_matches: usize,
    pub chase_wins: usize,
    pub win_rate: f64,
    pub bat_first_win_rate: f64,
    pub chase_win_rate: f64,
    /// Batting-first aggregates
    pub avg_score: f64,
    pub avg_run_rate: f64,
    pub score_std: f64,
    pub consistency: f64,
    pub avg_boundaries: f64,
    /// Win rate over the most recent matches
    pub recent_form: f64,
    pub low_confidence: bool,
}

impl TeamProfile {
    /// Batting-first run rate, if the team has ever batted first
    pub fn batting_run_rate(&self) -> Option<f64> {
        (self.bat_first_matches > 0).then_some(self.avg_run_rate)
    }
}

/// Running totals for one team
#[derive(Debug, Clone, Default)]
struct TeamStatistics {
    matches: usize,
    wins: usize,
    bat_first_matches: usize,
    bat_first_wins: usize,
    chase_matches: usize,
    chase_wins: usize,
    first_innings_scores: Vec<f64>,
    first_innings_run_rates: Vec<f64>,
    first_innings_boundaries: Vec<f64>,
    /// (season key, dataset index, won)
    results: Vec<((Option<u32>, String), usize, bool)>,
}

impl TeamStatistics {
    fn update(&mut self, record: &MatchSummary, index: usize, team: &str) {
        let batted_first = record.team1 == team;
        let won = record.did_win(team).unwrap_or(false);

        self.matches += 1;
        if won {
            self.wins += 1;
        }

        if batted_first {
            self.bat_first_matches += 1;
            if won {
                self.bat_first_wins += 1;
            }
            self.first_innings_scores.push(record.innings1.runs as f64);
            self.first_innings_run_rates.push(record.innings1.run_rate);
            self.first_innings_boundaries
                .push(record.innings1.boundaries as f64);
        } else {
            self.chase_matches += 1;
            if won {
                self.chase_wins += 1;
            }
        }

        self.results
            .push((season_sort_key(&record.season), index, won));
    }

    fn finish(mut self, team: &str, form_window: usize) -> TeamProfile {
        let rate = |wins: usize, played: usize| {
            if played == 0 {
                0.5
            } else {
                wins as f64 / played as f64
            }
        };

        let score_std = std_dev(&self.first_innings_scores);

        self.results
            .sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        let recent: Vec<bool> = self
            .results
            .iter()
            .rev()
            .take(form_window)
            .map(|r| r.2)
            .collect();
        let recent_form = rate(recent.iter().filter(|w| **w).count(), recent.len());

        TeamProfile {
            team: team.to_string(),
            matches: self.matches,
            wins: self.wins,
            bat_first_matches: self.bat_first_matches,
            bat_first_wins: self.bat_first_wins,
            chase_matches: self.chase_matches,
            chase_wins: self.chase_wins,
            win_rate: rate(self.wins, self.matches),
            bat_first_win_rate: rate(self.bat_first_wins, self.bat_first_matches),
            chase_win_rate: rate(self.chase_wins, self.chase_matches),
            avg_score: mean(&self.first_innings_scores),
            avg_run_rate: mean(&self.first_innings_run_rates),
            score_std,
            consistency: 1.0 / (score_std + 10.0),
            avg_boundaries: mean(&self.first_innings_boundaries),
            recent_form,
            low_confidence: false,
        }
    }
}

/// Compute profiles for every team in a set of matches
pub struct TeamStatisticsComputer {
    form_window: usize,
    stats: BTreeMap<String, TeamStatistics>,
}

impl TeamStatisticsComputer {
    pub fn new(form_window: usize) -> Self {
        TeamStatisticsComputer {
            form_window: form_window.max(1),
            stats: BTreeMap::new(),
        }
    }

    /// Process matches in dataset order
    pub fn process_matches(&mut self, matches: &[MatchSummary]) {
        for (index, record) in matches.iter().enumerate() {
            self.stats
                .entry(record.team1.clone())
                .or_default()
                .update(record, index, &record.team1);
            self.stats
                .entry(record.team2.clone())
                .or_default()
                .update(record, index, &record.team2);
        }
    }

    /// Finish into profiles, flagging teams below `min_matches`
    pub fn into_profiles(self, min_matches: usize) -> BTreeMap<String, TeamProfile> {
        let window = self.form_window;
        self.stats
            .into_iter()
            .map(|(team, stats)| {
                let mut profile = stats.finish(&team, window);
                profile.low_confidence = profile.matches < min_matches;
                (team, profile)
            })
            .collect()
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Population standard deviation
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

pub(crate) fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
