//! SQLite storage for extracted match summaries

use crate::data::ingest::IngestReport;
use crate::{CricketError, InningsSummary, MatchFormat, MatchSummary, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS matches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                format TEXT NOT NULL,
                venue TEXT NOT NULL,
                season TEXT NOT NULL,
                team1 TEXT NOT NULL,
                team2 TEXT NOT NULL,
                team1_runs INTEGER NOT NULL,
                team2_runs INTEGER NOT NULL,
                innings1 TEXT NOT NULL,
                innings2 TEXT NOT NULL,
                winner TEXT NOT NULL,
                team1_won INTEGER NOT NULL,
                source TEXT NOT NULL,
                UNIQUE(team1, team2, venue, season, team1_runs, team2_runs)
            );

            CREATE TABLE IF NOT EXISTS ingest_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                attempted INTEGER NOT NULL,
                extracted INTEGER NOT NULL,
                inserted INTEGER NOT NULL,
                skipped TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_matches_format ON matches(format);
            CREATE INDEX IF NOT EXISTS idx_matches_venue ON matches(venue);
            "#,
        )?;
        Ok(())
    }

    // ==================== Match Operations ====================

    /// Insert a summary unless its natural key is already stored.
    ///
    /// Returns whether a row was written.
    pub fn insert_match(&self, summary: &MatchSummary) -> Result<bool> {
        insert_summary(&self.conn, summary)
    }

    /// Insert many summaries in one transaction; returns the number written
    pub fn insert_matches(&mut self, summaries: &[MatchSummary]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        for summary in summaries {
            if insert_summary(&tx, summary)? {
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// All stored summaries in insertion order
    pub fn get_all_matches(&self) -> Result<Vec<MatchSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT format, venue, season, team1, team2, innings1, innings2,
                    winner, team1_won, source
             FROM matches ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], Self::row_to_raw)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawRow::into_summary).collect()
    }

    /// Stored summaries of one format in insertion order
    pub fn get_matches_by_format(&self, format: MatchFormat) -> Result<Vec<MatchSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT format, venue, season, team1, team2, innings1, innings2,
                    winner, team1_won, source
             FROM matches WHERE format = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![format.code()], Self::row_to_raw)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawRow::into_summary).collect()
    }

    fn row_to_raw(row: &rusqlite::Row) -> rusqlite::Result<RawRow> {
        Ok(RawRow {
            format: row.get(0)?,
            venue: row.get(1)?,
            season: row.get(2)?,
            team1: row.get(3)?,
            team2: row.get(4)?,
            innings1: row.get(5)?,
            innings2: row.get(6)?,
            winner: row.get(7)?,
            team1_won: row.get(8)?,
            source: row.get(9)?,
        })
    }

    /// Record the outcome of an ingestion run
    pub fn record_ingest(&self, report: &IngestReport, inserted: usize) -> Result<()> {
        let skipped = serde_json::to_string(&report.skipped)?;
        self.conn.execute(
            "INSERT INTO ingest_runs (attempted, extracted, inserted, skipped) VALUES (?1, ?2, ?3, ?4)",
            params![report.attempted, report.extracted, inserted, skipped],
        )?;
        Ok(())
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let match_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM matches", [], |row| row.get(0))?;

        let team_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM (SELECT team1 AS t FROM matches UNION SELECT team2 FROM matches)",
            [],
            |row| row.get(0),
        )?;

        let venue_count: i64 = self
            .conn
            .query_row("SELECT COUNT(DISTINCT venue) FROM matches", [], |row| row.get(0))?;

        let mut per_format = BTreeMap::new();
        let mut stmt = self
            .conn
            .prepare("SELECT format, COUNT(*) FROM matches GROUP BY format")?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (code, count) in counts {
            let format: MatchFormat = code.parse()?;
            per_format.insert(format, count as usize);
        }

        let last_ingest: Option<String> = self
            .conn
            .query_row("SELECT MAX(created_at) FROM ingest_runs", [], |row| row.get(0))
            .optional()?
            .flatten();

        Ok(DatabaseStats {
            match_count: match_count as usize,
            team_count: team_count as usize,
            venue_count: venue_count as usize,
            per_format,
            last_ingest,
        })
    }
}

fn insert_summary(conn: &Connection, summary: &MatchSummary) -> Result<bool> {
    let innings1 = serde_json::to_string(&summary.innings1)?;
    let innings2 = serde_json::to_string(&summary.innings2)?;
    let changed = conn.execute(
        r#"
        INSERT OR IGNORE INTO matches (format, venue, season, team1, team2,
                                       team1_runs, team2_runs, innings1, innings2,
                                       winner, team1_won, source)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
        params![
            summary.format.code(),
            summary.venue,
            summary.season,
            summary.team1,
            summary.team2,
            summary.innings1.runs,
            summary.innings2.runs,
            innings1,
            innings2,
            summary.winner,
            summary.team1_won,
            summary.source,
        ],
    )?;
    Ok(changed > 0)
}

struct RawRow {
    format: String,
    venue: String,
    season: String,
    team1: String,
    team2: String,
    innings1: String,
    innings2: String,
    winner: String,
    team1_won: bool,
    source: String,
}

impl RawRow {
    fn into_summary(self) -> Result<MatchSummary> {
        let innings1: InningsSummary = serde_json::from_str(&self.innings1)?;
        let innings2: InningsSummary = serde_json::from_str(&self.innings2)?;
        let format = self
            .format
            .parse()
            .map_err(|_| CricketError::Parse(format!("stored format '{}'", self.format)))?;
        Ok(MatchSummary {
            format,
            venue: self.venue,
            season: self.season,
            team1: self.team1,
            team2: self.team2,
            innings1,
            innings2,
            winner: self.winner,
            team1_won: self.team1_won,
            source: self.source,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub match_count: usize,
    pub team_count: usize,
    pub venue_count: usize,
    pub per_format: BTreeMap<MatchFormat, usize>,
    pub last_ingest: Option<String>,
}
