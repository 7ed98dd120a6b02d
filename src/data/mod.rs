//! Data ingestion and storage
//!
//! Column aliasing and per-format rules for raw ball-by-ball files, extraction
//! into match summaries, and SQLite persistence.

pub mod database;
pub mod export;
pub mod formats;
pub mod ingest;
pub mod schema;

pub use database::Database;
pub use formats::FormatRules;
pub use ingest::{ExtractionPolicy, IngestReport, Ingestor, SkipReason};
pub use schema::{AliasTable, LogicalField};
