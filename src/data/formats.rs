//! Per-format rules
//!
//! Phase boundaries, realistic score ranges and score normalization, one record
//! per format.

use serde::{Deserialize, Serialize};

use crate::MatchFormat;

/// Innings phase a delivery falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Powerplay,
    Middle,
    Death,
    /// Outside every band: the over after the powerplay and the over before the death
    Unassigned,
}

/// Rules record tagged by format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatRules {
    pub format: MatchFormat,
    /// Ball index at or below which a delivery is powerplay
    pub powerplay_end: f64,
    /// Inclusive start of middle overs
    pub middle_start: f64,
    /// Exclusive end of middle overs
    pub middle_end: f64,
    /// Ball index at or above which a delivery is death overs
    pub death_start: f64,
    /// Realistic innings total range under the quality policy
    pub min_total: u32,
    pub max_total: u32,
    /// Score normalization: (runs - mean) / scale
    pub normalized_mean: f64,
    pub normalized_scale: f64,
}

impl FormatRules {
    pub fn odi() -> Self {
        FormatRules {
            format: MatchFormat::Odi,
            powerplay_end: 6.0,
            middle_start: 11.0,
            middle_end: 40.0,
            death_start: 41.0,
            min_total: 100,
            max_total: 450,
            normalized_mean: 200.0,
            normalized_scale: 50.0,
        }
    }

    pub fn t20() -> Self {
        FormatRules {
            format: MatchFormat::T20,
            powerplay_end: 6.0,
            middle_start: 7.0,
            middle_end: 16.0,
            death_start: 17.0,
            min_total: 80,
            max_total: 280,
            normalized_mean: 160.0,
            normalized_scale: 30.0,
        }
    }

    pub fn league() -> Self {
        FormatRules {
            format: MatchFormat::League,
            ..Self::t20()
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![Self::t20(), Self::odi(), Self::league()]
    }

    /// Classify a ball index (e.g. `12.3`) into a phase
    pub fn phase(&self, ball: f64) -> Phase {
        if ball <= self.powerplay_end {
            Phase::Powerplay
        } else if ball >= self.death_start {
            Phase::Death
        } else if ball >= self.middle_start && ball < self.middle_end {
            Phase::Middle
        } else {
            Phase::Unassigned
        }
    }

    pub fn normalize_score(&self, runs: f64) -> f64 {
        if self.normalized_scale <= 0.0 {
            return 0.0;
        }
        (runs - self.normalized_mean) / self.normalized_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odi_phases() {
        let rules = FormatRules::odi();
        assert_eq!(rules.phase(0.1), Phase::Powerplay);
        assert_eq!(rules.phase(6.0), Phase::Powerplay);
        assert_eq!(rules.phase(8.2), Phase::Unassigned);
        assert_eq!(rules.phase(11.0), Phase::Middle);
        assert_eq!(rules.phase(39.6), Phase::Middle);
        assert_eq!(rules.phase(40.3), Phase::Unassigned);
        assert_eq!(rules.phase(41.0), Phase::Death);
        assert_eq!(rules.phase(49.6), Phase::Death);
    }

    #[test]
    fn test_t20_phases() {
        let rules = FormatRules::t20();
        assert_eq!(rules.phase(5.4), Phase::Powerplay);
        assert_eq!(rules.phase(6.3), Phase::Unassigned);
        assert_eq!(rules.phase(7.0), Phase::Middle);
        assert_eq!(rules.phase(15.6), Phase::Middle);
        assert_eq!(rules.phase(16.2), Phase::Unassigned);
        assert_eq!(rules.phase(17.0), Phase::Death);
    }

    #[test]
    fn test_league_shares_t20_boundaries() {
        let league = FormatRules::league();
        assert_eq!(league.format, MatchFormat::League);
        assert_eq!(league.death_start, FormatRules::t20().death_start);
    }

    #[test]
    fn test_normalize_score() {
        assert_eq!(FormatRules::odi().normalize_score(250.0), 1.0);
        assert_eq!(FormatRules::t20().normalize_score(160.0), 0.0);
    }
}
