//! Flat CSV export of stored match summaries

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::{MatchSummary, Result};

/// One exported row; innings fields are flattened with a team prefix
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    format: &'a str,
    venue: &'a str,
    season: &'a str,
    team1: &'a str,
    team2: &'a str,
    winner: &'a str,
    team1_won: u8,
    team1_runs: u32,
    team1_wickets: u32,
    team1_balls: u32,
    team1_run_rate: f64,
    team1_boundaries: u32,
    team1_powerplay_runs: u32,
    team1_middle_runs: u32,
    team1_death_runs: u32,
    team1_extras: u32,
    team2_runs: u32,
    team2_wickets: u32,
    team2_balls: u32,
    team2_run_rate: f64,
    team2_boundaries: u32,
    team2_powerplay_runs: u32,
    team2_middle_runs: u32,
    team2_death_runs: u32,
    team2_extras: u32,
    total_runs: u32,
    run_difference: u32,
    source: &'a str,
}

impl<'a> From<&'a MatchSummary> for ExportRow<'a> {
    fn from(m: &'a MatchSummary) -> Self {
        let (i1, i2) = (&m.innings1, &m.innings2);
        ExportRow {
            format: m.format.code(),
            venue: &m.venue,
            season: &m.season,
            team1: &m.team1,
            team2: &m.team2,
            winner: &m.winner,
            team1_won: u8::from(m.team1_won),
            team1_runs: i1.runs,
            team1_wickets: i1.wickets,
            team1_balls: i1.balls,
            team1_run_rate: i1.run_rate,
            team1_boundaries: i1.boundaries,
            team1_powerplay_runs: i1.powerplay_runs,
            team1_middle_runs: i1.middle_runs,
            team1_death_runs: i1.death_runs,
            team1_extras: i1.extras,
            team2_runs: i2.runs,
            team2_wickets: i2.wickets,
            team2_balls: i2.balls,
            team2_run_rate: i2.run_rate,
            team2_boundaries: i2.boundaries,
            team2_powerplay_runs: i2.powerplay_runs,
            team2_middle_runs: i2.middle_runs,
            team2_death_runs: i2.death_runs,
            team2_extras: i2.extras,
            total_runs: m.total_runs(),
            run_difference: m.run_difference(),
            source: &m.source,
        }
    }
}

/// Write summaries as CSV to any writer
pub fn write_csv<W: Write>(writer: W, matches: &[MatchSummary]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for m in matches {
        wtr.serialize(ExportRow::from(m))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write summaries to a CSV file, creating parent directories
pub fn export_csv<P: AsRef<Path>>(path: P, matches: &[MatchSummary]) -> Result<usize> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::File::create(path)?;
    write_csv(file, matches)?;
    log::info!("Exported {} matches to {}", matches.len(), path.display());
    Ok(matches.len())
}
