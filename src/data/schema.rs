//! Column alias resolution
//!
//! Raw ball-by-ball files name the same logical field differently. Each logical
//! field maps to an ordered list of candidate headers; the first candidate
//! present in a file wins.

use std::collections::HashMap;
use std::fmt;

/// Logical fields extracted from a ball-by-ball file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalField {
    Innings,
    BattingTeam,
    RunsOffBat,
    Extras,
    Wicket,
    Ball,
    Venue,
    Season,
    Winner,
}

impl LogicalField {
    pub const ALL: [LogicalField; 9] = [
        LogicalField::Innings,
        LogicalField::BattingTeam,
        LogicalField::RunsOffBat,
        LogicalField::Extras,
        LogicalField::Wicket,
        LogicalField::Ball,
        LogicalField::Venue,
        LogicalField::Season,
        LogicalField::Winner,
    ];

    /// A file without this field cannot produce a summary
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            LogicalField::Innings | LogicalField::BattingTeam | LogicalField::RunsOffBat
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            LogicalField::Innings => "innings",
            LogicalField::BattingTeam => "batting_team",
            LogicalField::RunsOffBat => "runs_off_bat",
            LogicalField::Extras => "extras",
            LogicalField::Wicket => "wicket",
            LogicalField::Ball => "ball",
            LogicalField::Venue => "venue",
            LogicalField::Season => "season",
            LogicalField::Winner => "winner",
        }
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logical field -> ordered candidate header names
#[derive(Debug, Clone)]
pub struct AliasTable {
    aliases: HashMap<LogicalField, Vec<String>>,
}

impl Default for AliasTable {
    fn default() -> Self {
        let mut table = AliasTable {
            aliases: HashMap::new(),
        };
        table.set(LogicalField::Innings, &["innings", "inning", "innings_number"]);
        table.set(LogicalField::BattingTeam, &["batting_team", "team", "batting_side"]);
        table.set(LogicalField::RunsOffBat, &["runs_off_bat", "runs", "runs_scored"]);
        table.set(LogicalField::Extras, &["extras", "extra"]);
        table.set(
            LogicalField::Wicket,
            &["wicket_type", "wicket", "dismissal", "player_dismissed"],
        );
        table.set(LogicalField::Ball, &["ball", "over", "overs"]);
        table.set(LogicalField::Venue, &["venue", "ground", "city"]);
        table.set(LogicalField::Season, &["season", "year", "start_date", "date"]);
        table.set(LogicalField::Winner, &["winner", "winning_team", "match_winner"]);
        table
    }
}

impl AliasTable {
    /// Replace the candidates for a field
    pub fn set(&mut self, field: LogicalField, candidates: &[&str]) {
        self.aliases.insert(
            field,
            candidates.iter().map(|c| c.trim().to_lowercase()).collect(),
        );
    }

    pub fn candidates(&self, field: LogicalField) -> &[String] {
        self.aliases.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolve every logical field against a file's headers.
    ///
    /// Fails with the first required field that has no matching header.
    pub fn resolve<'a, I>(&self, headers: I) -> std::result::Result<ResolvedColumns, LogicalField>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let positions: HashMap<String, usize> = headers
            .into_iter()
            .enumerate()
            .map(|(idx, h)| (h.trim().trim_start_matches('\u{feff}').to_lowercase(), idx))
            .collect();

        let mut columns = HashMap::new();
        for field in LogicalField::ALL {
            let found = self
                .candidates(field)
                .iter()
                .find_map(|candidate| positions.get(candidate).copied());
            match found {
                Some(idx) => {
                    columns.insert(field, idx);
                }
                None if field.is_required() => return Err(field),
                None => {}
            }
        }

        Ok(ResolvedColumns { columns })
    }
}

/// Column positions resolved for one file
#[derive(Debug, Clone)]
pub struct ResolvedColumns {
    columns: HashMap<LogicalField, usize>,
}

impl ResolvedColumns {
    pub fn index(&self, field: LogicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn has(&self, field: LogicalField) -> bool {
        self.columns.contains_key(&field)
    }
}
