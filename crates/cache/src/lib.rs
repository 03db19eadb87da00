//! SQLite cache database for tracked series and chapters.
//!
//! This crate persists every chapter the watcher has already seen so that
//! subsequent discovery passes can skip them. Two linked tables are stored:
//! - **series_cache**: one row per series, keyed naturally by
//!   `(source_id, provider)`.
//! - **chapter_cache**: one row per translated chapter, keyed naturally by
//!   `(series_id, source_id, language)`.
//!
//! # Id stability
//! The integer primary keys handed out by this crate are treated as stable,
//! gap-free identifiers by downstream consumers. Writes therefore go through
//! a *fake upsert* (select, then insert or update) instead of SQLite's
//! native `ON CONFLICT` clause, which advances the sequence counter even
//! when the conflict resolves to an update. See [`Repository`].

mod db;
pub mod error;
mod models;
mod repo;
mod schema;

pub use crate::db::Database;
pub use crate::models::{CachedPair, ChapterRecord, ChapterState, SeriesRecord};
pub use crate::repo::Repository;
