//! Catalog Module
//!
//! Records for tapes, the segments ("tars") written to them and the files
//! queued into each segment, plus the narrow contract the write path needs.

pub mod sqlite;

use crate::error::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use sqlite::SqliteCatalog;

/// A physical cartridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tape {
    pub id: i64,
    pub manufacturer: String,
    pub model: String,
    /// Generation code, e.g. `LTO8RW`
    pub generation: String,
    pub serial: String,
    pub barcode: Option<String>,
    pub purchased: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct NewTape {
    pub manufacturer: String,
    pub model: String,
    pub generation: String,
    pub serial: String,
    pub barcode: Option<String>,
    pub purchased: Option<NaiveDate>,
}

/// One archive write occupying one file-mark delimited slot on a tape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: i64,
    pub tape_id: i64,
    /// File number on the cartridge
    pub number: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub access_count: i64,
    pub block_offset: Option<i64>,
    /// Extra archiver options, e.g. `-z`
    pub options: Option<String>,
    /// `uname -a` of the writing host
    pub uname: Option<String>,
}

impl Segment {
    /// Whitespace separated archiver options
    pub fn archiver_options(&self) -> Vec<String> {
        self.options
            .as_deref()
            .map(|options| options.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewSegment {
    pub number: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub access_count: i64,
    pub block_offset: Option<i64>,
    pub options: Option<String>,
    pub uname: Option<String>,
}

/// A file queued for inclusion in a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedFile {
    pub id: i64,
    pub tape_id: i64,
    pub segment_id: i64,
    pub full_path: PathBuf,
    /// Path handed to the archiver, relative to the segment's base directory
    pub relative_path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub sha256: String,
}

impl QueuedFile {
    /// `full_path` with the `relative_path` suffix stripped off.
    pub fn base_dir(&self) -> Option<PathBuf> {
        let full: Vec<_> = self.full_path.components().collect();
        let relative: Vec<_> = self.relative_path.components().collect();
        if relative.is_empty() || relative.len() >= full.len() {
            return None;
        }

        let split = full.len() - relative.len();
        if full[split..] != relative[..] {
            return None;
        }
        Some(full[..split].iter().collect())
    }
}

#[derive(Debug, Clone)]
pub struct NewQueuedFile {
    pub full_path: PathBuf,
    pub relative_path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub sha256: String,
}

/// Optional filters for file listings.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub tape_id: Option<i64>,
    pub segment_id: Option<i64>,
    pub segment_number: Option<u32>,
}

/// The catalog operations the write path depends on.
///
/// Timestamp updates are each their own short transaction; nothing here is
/// expected to hold a lock across an archiver run.
pub trait Catalog {
    /// Resolve an internal id, serial number or barcode, tried in that order.
    fn resolve_tape(&self, identifier: &str) -> Result<Tape>;

    fn find_segment(&self, tape: &Tape, number: u32) -> Result<Segment>;

    fn list_queued_files(&self, segment: &Segment) -> Result<Vec<QueuedFile>>;

    fn set_segment_start_time(&self, segment_id: i64, at: DateTime<Utc>) -> Result<()>;

    fn set_segment_end_time(&self, segment_id: i64, at: DateTime<Utc>) -> Result<()>;
}
