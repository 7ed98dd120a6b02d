//! Ball-by-ball ingestion
//!
//! Turns heterogeneous per-ball CSV files into deduplicated `MatchSummary`
//! records. Every per-file problem becomes a `SkipReason` in the report; a bad
//! file never aborts the batch.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::formats::{FormatRules, Phase};
use crate::data::schema::{AliasTable, LogicalField, ResolvedColumns};
use crate::{Config, IngestConfig, InningsSummary, MatchFormat, MatchSummary, Result, SourceConfig};

/// How strict extraction is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPolicy {
    /// Only complete, realistic innings at a known venue
    Quality,
    /// Keep as many matches as possible
    MaxRecall,
}

/// Effective thresholds after applying config overrides to a policy
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    pub min_rows_per_file: usize,
    pub min_balls_per_innings: usize,
    pub require_venue: bool,
    /// Fixed realistic range; `None` uses the format's range
    pub total_range: Option<(u32, u32)>,
}

impl Thresholds {
    pub fn for_policy(policy: ExtractionPolicy) -> Self {
        match policy {
            ExtractionPolicy::Quality => Thresholds {
                min_rows_per_file: 30,
                min_balls_per_innings: 50,
                require_venue: true,
                total_range: None,
            },
            ExtractionPolicy::MaxRecall => Thresholds {
                min_rows_per_file: 20,
                min_balls_per_innings: 10,
                require_venue: false,
                total_range: Some((30, 500)),
            },
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        let mut t = Self::for_policy(config.policy);
        if let Some(rows) = config.min_rows_per_file {
            t.min_rows_per_file = rows;
        }
        if let Some(balls) = config.min_balls_per_innings {
            t.min_balls_per_innings = balls;
        }
        if let Some(require) = config.require_venue {
            t.require_venue = require;
        }
        if config.min_total.is_some() || config.max_total.is_some() {
            let (lo, hi) = t.total_range.unwrap_or((0, u32::MAX));
            t.total_range = Some((config.min_total.unwrap_or(lo), config.max_total.unwrap_or(hi)));
        }
        t
    }

    fn range_for(&self, rules: &FormatRules) -> (u32, u32) {
        self.total_range.unwrap_or((rules.min_total, rules.max_total))
    }
}

/// Why a file produced no summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    Unreadable,
    MissingField(LogicalField),
    MissingTeams,
    ShortInnings,
    UnrealisticScore,
    Duplicate,
}

impl SkipReason {
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::Unreadable => "unreadable",
            SkipReason::MissingField(_) => "missing_field",
            SkipReason::MissingTeams => "missing_teams",
            SkipReason::ShortInnings => "short_innings",
            SkipReason::UnrealisticScore => "unrealistic_score",
            SkipReason::Duplicate => "duplicate",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingField(field) => write!(f, "missing_field ({})", field),
            other => f.write_str(other.code()),
        }
    }
}

/// Attempted/extracted counts for one format
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatCounts {
    pub attempted: usize,
    pub extracted: usize,
}

/// Outcome of an ingestion run
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub attempted: usize,
    pub extracted: usize,
    /// Reason code -> count
    pub skipped: BTreeMap<&'static str, usize>,
    pub per_format: BTreeMap<MatchFormat, FormatCounts>,
}

impl IngestReport {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn skipped_for(&self, code: &str) -> usize {
        self.skipped.get(code).copied().unwrap_or(0)
    }

    fn record_skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason.code()).or_insert(0) += 1;
    }

    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.extracted as f64 / self.attempted as f64
        }
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempted={} extracted={} skipped={}",
            self.attempted,
            self.extracted,
            self.skipped_total()
        )?;
        for (code, count) in &self.skipped {
            write!(f, " {}={}", code, count)?;
        }
        Ok(())
    }
}

/// One parsed delivery
#[derive(Debug, Clone)]
struct Delivery {
    innings: u8,
    batting_team: String,
    runs_off_bat: u32,
    extras: u32,
    is_wicket: bool,
    ball: Option<f64>,
}

/// Deliveries plus per-file metadata
#[derive(Debug, Default)]
struct ParsedFile {
    rows: usize,
    deliveries: Vec<Delivery>,
    venue: Option<String>,
    season: Option<String>,
    winner: Option<String>,
    has_ball: bool,
}

/// Extracts match summaries from ball-by-ball files
pub struct Ingestor {
    aliases: AliasTable,
    thresholds: Thresholds,
    formats: Vec<FormatRules>,
}

impl Ingestor {
    pub fn new(config: &Config) -> Self {
        Ingestor {
            aliases: AliasTable::default(),
            thresholds: Thresholds::from_config(&config.ingest),
            formats: config.formats.clone(),
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

    /// List CSV files under every configured source, sorted for stable order
    pub fn collect_files(&self, sources: &[SourceConfig]) -> Result<Vec<(PathBuf, MatchFormat)>> {
        let mut files = Vec::new();
        for source in sources {
            let dir = Path::new(&source.dir);
            if !dir.is_dir() {
                log::warn!("Source directory {} not found, skipping", dir.display());
                continue;
            }
            let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
                })
                .collect();
            paths.sort();
            files.extend(paths.into_iter().map(|p| (p, source.format)));
        }
        Ok(files)
    }

    /// Ingest every configured source directory
    pub fn ingest_sources(&self, sources: &[SourceConfig]) -> Result<(Vec<MatchSummary>, IngestReport)> {
        let files = self.collect_files(sources)?;
        Ok(self.ingest_files(&files))
    }

    /// Extract, filter and deduplicate a list of files (first occurrence wins)
    pub fn ingest_files(&self, files: &[(PathBuf, MatchFormat)]) -> (Vec<MatchSummary>, IngestReport) {
        let mut report = IngestReport::default();
        let mut seen = HashSet::new();
        let mut summaries = Vec::new();

        for (idx, (path, format)) in files.iter().enumerate() {
            report.attempted += 1;
            report.per_format.entry(*format).or_default().attempted += 1;

            if (idx + 1) % 1000 == 0 {
                log::info!("Progress: {}/{} files, {} extracted", idx + 1, files.len(), summaries.len());
            }

            let summary = match self.extract_file(path, *format) {
                Ok(s) => s,
                Err(reason) => {
                    log::debug!("Skipping {}: {}", path.display(), reason);
                    report.record_skip(reason);
                    continue;
                }
            };

            if !seen.insert(summary.key()) {
                log::debug!("Skipping {}: duplicate of an earlier file", path.display());
                report.record_skip(SkipReason::Duplicate);
                continue;
            }

            report.extracted += 1;
            report.per_format.entry(*format).or_default().extracted += 1;
            summaries.push(summary);
        }

        for (format, counts) in &report.per_format {
            log::info!("{}: {}/{} files extracted", format, counts.extracted, counts.attempted);
        }
        log::info!("Ingestion complete: {}", report);

        (summaries, report)
    }

    /// Extract a single file
    pub fn extract_file(&self, path: &Path, format: MatchFormat) -> std::result::Result<MatchSummary, SkipReason> {
        let file = File::open(path).map_err(|_| SkipReason::Unreadable)?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.extract_reader(file, &source, format)
    }

    /// Extract a match from any CSV reader
    pub fn extract_reader<R: Read>(
        &self,
        reader: R,
        source: &str,
        format: MatchFormat,
    ) -> std::result::Result<MatchSummary, SkipReason> {
        let parsed = self.parse(reader)?;
        self.summarize(parsed, source, format)
    }

    fn parse<R: Read>(&self, reader: R) -> std::result::Result<ParsedFile, SkipReason> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .byte_headers()
            .map_err(|_| SkipReason::Unreadable)?
            .iter()
            .map(|h| String::from_utf8_lossy(h).into_owned())
            .collect();

        let cols = self
            .aliases
            .resolve(headers.iter().map(String::as_str))
            .map_err(SkipReason::MissingField)?;

        let mut parsed = ParsedFile {
            has_ball: cols.has(LogicalField::Ball),
            ..ParsedFile::default()
        };

        for record in rdr.byte_records() {
            let record = record.map_err(|_| SkipReason::Unreadable)?;
            parsed.rows += 1;

            let field = |f: LogicalField| -> Option<String> {
                cols.index(f)
                    .and_then(|i| record.get(i))
                    .map(|raw| String::from_utf8_lossy(raw).trim().to_string())
                    .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("nan"))
            };

            if parsed.venue.is_none() {
                parsed.venue = field(LogicalField::Venue);
            }
            if parsed.season.is_none() {
                parsed.season = field(LogicalField::Season);
            }
            if parsed.winner.is_none() {
                parsed.winner = field(LogicalField::Winner);
            }

            if let Some(delivery) = parse_delivery(&cols, &field) {
                parsed.deliveries.push(delivery);
            }
        }

        Ok(parsed)
    }

    fn summarize(
        &self,
        parsed: ParsedFile,
        source: &str,
        format: MatchFormat,
    ) -> std::result::Result<MatchSummary, SkipReason> {
        let t = &self.thresholds;
        let rules = self.rules(format);

        if parsed.rows < t.min_rows_per_file {
            return Err(SkipReason::ShortInnings);
        }

        let inn1: Vec<&Delivery> = parsed.deliveries.iter().filter(|d| d.innings == 1).collect();
        let inn2: Vec<&Delivery> = parsed.deliveries.iter().filter(|d| d.innings == 2).collect();

        if inn1.len() < t.min_balls_per_innings.max(1) || inn2.len() < t.min_balls_per_innings.max(1) {
            return Err(SkipReason::ShortInnings);
        }

        let team1 = inn1[0].batting_team.clone();
        let team2 = inn2[0].batting_team.clone();
        if team1.is_empty() || team2.is_empty() || team1 == team2 {
            return Err(SkipReason::MissingTeams);
        }

        let venue = match parsed.venue {
            Some(v) if v.len() > 2 && !v.eq_ignore_ascii_case("unknown") => v,
            _ if t.require_venue => return Err(SkipReason::MissingField(LogicalField::Venue)),
            _ => "Unknown".to_string(),
        };
        let season = parsed.season.unwrap_or_else(|| "Unknown".to_string());

        let innings1 = summarize_innings(&inn1, &rules, parsed.has_ball)?;
        let innings2 = summarize_innings(&inn2, &rules, parsed.has_ball)?;

        let (lo, hi) = t.range_for(&rules);
        let realistic = |runs: u32| runs >= lo && runs <= hi;
        if !realistic(innings1.runs) || !realistic(innings2.runs) {
            return Err(SkipReason::UnrealisticScore);
        }

        let winner = match parsed.winner {
            Some(w) => w,
            None if innings1.runs > innings2.runs => team1.clone(),
            None => team2.clone(),
        };
        let team1_won = winner == team1;

        Ok(MatchSummary {
            format,
            venue,
            season,
            team1,
            team2,
            innings1,
            innings2,
            winner,
            team1_won,
            source: source.to_string(),
        })
    }
}

fn parse_delivery<F>(cols: &ResolvedColumns, field: &F) -> Option<Delivery>
where
    F: Fn(LogicalField) -> Option<String>,
{
    let innings = field(LogicalField::Innings)?.parse::<f64>().ok()?;
    if !(1.0..=255.0).contains(&innings) {
        return None;
    }
    let batting_team = field(LogicalField::BattingTeam).unwrap_or_default();
    let runs_off_bat = field(LogicalField::RunsOffBat).map(|v| parse_count(&v)).unwrap_or(0);
    let extras = field(LogicalField::Extras).map(|v| parse_count(&v)).unwrap_or(0);
    let is_wicket = cols.has(LogicalField::Wicket)
        && field(LogicalField::Wicket).is_some_and(|v| is_dismissal(&v));
    let ball = field(LogicalField::Ball).and_then(|v| v.parse::<f64>().ok());

    Some(Delivery {
        innings: innings as u8,
        batting_team,
        runs_off_bat,
        extras,
        is_wicket,
        ball,
    })
}

/// Parse a run count, tolerating "4.0"; anything else counts as zero
fn parse_count(raw: &str) -> u32 {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u32)
        .unwrap_or(0)
}

/// A non-empty wicket cell marks a dismissal unless it is a falsy flag
fn is_dismissal(value: &str) -> bool {
    !matches!(
        value.to_lowercase().as_str(),
        "0" | "0.0" | "false" | "no" | "none"
    )
}

/// Most runs one delivery can carry, off the bat plus extras
const MAX_RUNS_PER_BALL: u32 = 12;

fn summarize_innings(
    deliveries: &[&Delivery],
    rules: &FormatRules,
    has_ball: bool,
) -> std::result::Result<InningsSummary, SkipReason> {
    let balls = u32::try_from(deliveries.len()).map_err(|_| SkipReason::UnrealisticScore)?;
    let mut s = InningsSummary {
        balls,
        ..InningsSummary::default()
    };
    let mut off_bat = 0u32;

    for d in deliveries {
        // Corrupt cells; every total below is bounded once this holds
        if d.runs_off_bat.saturating_add(d.extras) > MAX_RUNS_PER_BALL {
            return Err(SkipReason::UnrealisticScore);
        }
        off_bat += d.runs_off_bat;
        s.extras += d.extras;
        if d.is_wicket {
            s.wickets += 1;
        }
        match d.runs_off_bat {
            4 => s.fours += 1,
            6 => s.sixes += 1,
            0 => s.dot_balls += 1,
            _ => {}
        }
        if has_ball {
            if let Some(ball) = d.ball {
                match rules.phase(ball) {
                    Phase::Powerplay => s.powerplay_runs += d.runs_off_bat,
                    Phase::Middle => s.middle_runs += d.runs_off_bat,
                    Phase::Death => s.death_runs += d.runs_off_bat,
                    Phase::Unassigned => {}
                }
            }
        }
    }

    if !has_ball {
        let estimate = |share: f64| (off_bat as f64 * share) as u32;
        s.powerplay_runs = estimate(0.25);
        s.middle_runs = estimate(0.40);
        s.death_runs = estimate(0.35);
    }

    s.runs = off_bat + s.extras;
    s.boundaries = s.fours + s.sixes;
    s.boundary_runs = s.fours * 4 + s.sixes * 6;
    if s.balls > 0 {
        let balls = s.balls as f64;
        s.strike_rate = s.runs as f64 / balls * 100.0;
        s.run_rate = s.runs as f64 / balls * 6.0;
        s.dot_percentage = s.dot_balls as f64 / balls * 100.0;
    }
    if s.runs > 0 {
        s.boundary_percentage = s.boundary_runs as f64 / s.runs as f64 * 100.0;
    }
    Ok(s)
}

/// Drop later summaries that share a natural key with an earlier one.
///
/// Returns the kept summaries and the number removed.
pub fn deduplicate(summaries: Vec<MatchSummary>) -> (Vec<MatchSummary>, usize) {
    let mut seen = HashSet::new();
    let before = summaries.len();
    let kept: Vec<MatchSummary> = summaries.into_iter().filter(|s| seen.insert(s.key())).collect();
    let removed = before - kept.len();
    (kept, removed)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn ingestor() -> Ingestor {
        Ingestor::new(&Config::default())
    }

    fn recall_ingestor() -> Ingestor {
        let mut config = Config::default();
        config.ingest.policy = ExtractionPolicy::MaxRecall;
        Ingestor::new(&config)
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_extract_totals_and_phases() {
        // 7 runs an over off the bat
        let csv = t20_match("Wankhede Stadium", "2021", "India", "England", &[1, 0, 1, 4, 0, 1], &[1, 0, 0, 4, 0, 1]);
        let m = ingestor()
            .extract_reader(csv.as_bytes(), "a.csv", MatchFormat::T20)
            .unwrap();

        assert_eq!(m.team1, "India");
        assert_eq!(m.team2, "England");
        assert_eq!(m.venue, "Wankhede Stadium");
        assert_eq!(m.season, "2021");
        // 140 off bat + 6 extras (every 20th ball)
        assert_eq!(m.innings1.runs, 146);
        assert_eq!(m.innings1.extras, 6);
        assert_eq!(m.innings1.balls, 120);
        assert_eq!(m.innings1.fours, 20);
        assert_eq!(m.innings1.sixes, 0);
        assert_eq!(m.innings1.boundary_runs, 80);
        assert_eq!(m.innings1.dot_balls, 40);
        assert_eq!(m.innings1.wickets, 5);
        assert!((m.innings1.run_rate - 7.3).abs() < 1e-9);
        // 120 off bat + 4 extras
        assert_eq!(m.innings2.runs, 124);
        // No explicit winner column: decided by totals
        assert!(m.team1_won);
        assert_eq!(m.winner, "India");
        // Overs 0-5; over 6 falls between powerplay and middle
        assert_eq!(m.innings1.powerplay_runs, 42);
        // Middle 7.0-15.6 = overs 7..=15; over 16 is unassigned
        assert_eq!(m.innings1.middle_runs, 63);
        // Death 17.0+ = overs 17..=19
        assert_eq!(m.innings1.death_runs, 21);
    }

    #[test]
    fn test_explicit_winner_overrides_totals() {
        let csv = t20_match("Eden Gardens", "2019", "India", "Australia", &[1, 0, 1, 4, 0, 1], &[1, 0, 0, 4, 0, 1]);
        let csv = csv.replacen(
            "wicket_type\n",
            "wicket_type,winner\n",
            1,
        );
        // Append the winner cell to the first data row only
        let mut lines: Vec<String> = csv.lines().map(str::to_string).collect();
        lines[1].push_str(",Australia");
        let csv = lines.join("\n");

        let m = ingestor()
            .extract_reader(csv.as_bytes(), "w.csv", MatchFormat::T20)
            .unwrap();
        assert_eq!(m.winner, "Australia");
        assert!(!m.team1_won);
    }

    #[test]
    fn test_first_innings_only_is_short() {
        let csv = render_csv(
            "Lord's",
            "2020",
            &[InningsSpec {
                team: "England",
                balls: 120,
                pattern: &[1, 2, 0, 4],
                wickets: 3,
                extras_every: 0,
            }],
        );
        let err = ingestor()
            .extract_reader(csv.as_bytes(), "c.csv", MatchFormat::T20)
            .unwrap_err();
        assert_eq!(err, SkipReason::ShortInnings);
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let csv = "innings,batting_team,extras\n1,India,0\n";
        let err = ingestor()
            .extract_reader(csv.as_bytes(), "m.csv", MatchFormat::T20)
            .unwrap_err();
        assert_eq!(err, SkipReason::MissingField(LogicalField::RunsOffBat));
        assert_eq!(err.code(), "missing_field");
    }

    #[test]
    fn test_unrealistic_score_rejected() {
        // 120 balls of 6 = 720
        let csv = t20_match("Eden Gardens", "2019", "India", "Australia", &[6], &[1, 0, 0, 4, 0, 1]);
        let err = ingestor()
            .extract_reader(csv.as_bytes(), "u.csv", MatchFormat::T20)
            .unwrap_err();
        assert_eq!(err, SkipReason::UnrealisticScore);
    }

    #[test]
    fn test_corrupt_run_cells_skip_the_file() {
        let good = t20_match("Eden Gardens", "2019", "India", "Australia", &[1, 0, 1, 4, 0, 1], &[1, 0, 0, 4, 0, 1]);
        let mut lines: Vec<String> = good.lines().map(str::to_string).collect();
        for line in lines.iter_mut().skip(1).take(2) {
            let mut cols: Vec<&str> = line.split(',').collect();
            cols[6] = "4000000000";
            *line = cols.join(",");
        }
        let corrupt = lines.join("\n");

        let err = ingestor()
            .extract_reader(corrupt.as_bytes(), "x.csv", MatchFormat::T20)
            .unwrap_err();
        assert_eq!(err, SkipReason::UnrealisticScore);

        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            (write(dir.path(), "a.csv", &corrupt), MatchFormat::T20),
            (write(dir.path(), "b.csv", &good), MatchFormat::T20),
        ];
        let (summaries, report) = ingestor().ingest_files(&files);
        assert_eq!(summaries.len(), 1);
        assert_eq!(report.skipped_for("unrealistic_score"), 1);
    }

    #[test]
    fn test_quality_requires_venue_but_recall_does_not() {
        let csv = t20_match("", "2019", "India", "Australia", &[1, 0, 1, 4, 0, 1], &[1, 0, 0, 4, 0, 1]);
        let err = ingestor()
            .extract_reader(csv.as_bytes(), "v.csv", MatchFormat::T20)
            .unwrap_err();
        assert_eq!(err, SkipReason::MissingField(LogicalField::Venue));

        let recall = recall_ingestor();
        let m = recall
            .extract_reader(csv.as_bytes(), "v.csv", MatchFormat::T20)
            .unwrap();
        assert_eq!(m.venue, "Unknown");
    }

    #[test]
    fn test_recall_policy_accepts_short_innings() {
        let csv = render_csv(
            "Harare Sports Club",
            "2018",
            &[
                InningsSpec { team: "Zimbabwe", balls: 40, pattern: &[1, 2, 0, 1], wickets: 2, extras_every: 0 },
                InningsSpec { team: "Ireland", balls: 36, pattern: &[1, 2, 0, 1], wickets: 4, extras_every: 0 },
            ],
        );
        assert_eq!(
            ingestor().extract_reader(csv.as_bytes(), "s.csv", MatchFormat::T20).unwrap_err(),
            SkipReason::ShortInnings
        );
        let recall = recall_ingestor();
        let m = recall.extract_reader(csv.as_bytes(), "s.csv", MatchFormat::T20).unwrap();
        assert_eq!(m.innings1.runs, 40);
    }

    #[test]
    fn test_config_overrides_thresholds() {
        let mut config = Config::default();
        config.ingest.min_balls_per_innings = Some(5);
        config.ingest.max_total = Some(150);
        let t = Thresholds::from_config(&config.ingest);
        assert_eq!(t.min_balls_per_innings, 5);
        assert_eq!(t.min_rows_per_file, 30);
        assert_eq!(t.total_range, Some((0, 150)));
    }

    #[test]
    fn test_batch_continues_past_bad_files_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let good = t20_match("Eden Gardens", "2019", "India", "Australia", &[1, 0, 1, 4, 0, 1], &[1, 0, 0, 4, 0, 1]);
        let other = t20_match("Eden Gardens", "2019", "India", "Pakistan", &[1, 0, 1, 4, 0, 1], &[1, 0, 0, 4, 0, 1]);
        let files = vec![
            (write(dir.path(), "a.csv", &good), MatchFormat::T20),
            (write(dir.path(), "b.csv", "not,a,cricket,file\n1,2,3,4\n"), MatchFormat::T20),
            (write(dir.path(), "c.csv", &good), MatchFormat::T20),
            (write(dir.path(), "d.csv", &other), MatchFormat::T20),
            (dir.path().join("missing.csv"), MatchFormat::T20),
        ];

        let (summaries, report) = ingestor().ingest_files(&files);

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].source, "a.csv");
        assert_eq!(report.attempted, 5);
        assert_eq!(report.extracted, 2);
        assert_eq!(report.skipped_for("duplicate"), 1);
        assert_eq!(report.skipped_for("missing_field"), 1);
        assert_eq!(report.skipped_for("unreadable"), 1);
        assert_eq!(report.skipped_total(), 3);
        assert_eq!(report.per_format[&MatchFormat::T20].extracted, 2);
    }

    #[test]
    fn test_ingestion_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let t20 = dir.path().join("t20");
        std::fs::create_dir_all(&t20).unwrap();
        for (i, opp) in ["Australia", "Pakistan", "England"].iter().enumerate() {
            let csv = t20_match("Eden Gardens", &format!("20{}", 10 + i), "India", opp, &[1, 0, 1, 4, 0, 1], &[1, 0, 0, 4, 0, 1]);
            write(&t20, &format!("{}.csv", i), &csv);
        }
        write(&t20, "notes.txt", "ignored");
        let sources = vec![SourceConfig {
            format: MatchFormat::T20,
            dir: t20.to_string_lossy().into_owned(),
        }];

        let (first, _) = ingestor().ingest_sources(&sources).unwrap();
        let (second, _) = ingestor().ingest_sources(&sources).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_ball_column_estimates_phases() {
        let csv = t20_match("Eden Gardens", "2019", "India", "Australia", &[1, 0, 1, 4, 0, 1], &[1, 0, 0, 4, 0, 1]);
        let csv: String = csv
            .lines()
            .map(|l| {
                let mut cols: Vec<&str> = l.split(',').collect();
                cols.remove(4);
                cols.join(",")
            })
            .collect::<Vec<_>>()
            .join("\n");
        let m = ingestor().extract_reader(csv.as_bytes(), "n.csv", MatchFormat::T20).unwrap();
        assert_eq!(m.innings1.powerplay_runs, 35);
        assert_eq!(m.innings1.middle_runs, 56);
        assert_eq!(m.innings1.death_runs, 49);
    }

    #[test]
    fn test_phase_estimate_truncates() {
        let deliveries: Vec<Delivery> = [4, 3]
            .iter()
            .map(|&runs| Delivery {
                innings: 1,
                batting_team: "India".to_string(),
                runs_off_bat: runs,
                extras: 0,
                is_wicket: false,
                ball: None,
            })
            .collect();
        let refs: Vec<&Delivery> = deliveries.iter().collect();
        let s = summarize_innings(&refs, &FormatRules::t20(), false).unwrap();
        // 7 off the bat: 1.75, 2.8 and 2.45
        assert_eq!(s.powerplay_runs, 1);
        assert_eq!(s.middle_runs, 2);
        assert_eq!(s.death_runs, 2);
        assert_eq!(s.runs, 7);
    }

    #[test]
    fn test_deduplicate_keeps_first() {
        use crate::test_support::summary;
        let a = summary(MatchFormat::T20, "Eden Gardens", "2019", "India", "Australia", 170, 160);
        let mut b = a.clone();
        b.source = "copy.csv".to_string();
        let c = summary(MatchFormat::T20, "Eden Gardens", "2019", "India", "Australia", 171, 160);

        let (kept, removed) = deduplicate(vec![a.clone(), b, c]);
        assert_eq!(removed, 1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].source, a.source);
    }
}
