//! SQLite catalog.

use super::{
    Catalog, FileFilter, NewQueuedFile, NewSegment, NewTape, QueuedFile, Segment, Tape,
};
use crate::error::{MtarError, Result};
use chrono::{DateTime, Utc};
use glob::{MatchOptions, Pattern};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SCHEMA: &str = "
    PRAGMA foreign_keys=ON;

    CREATE TABLE IF NOT EXISTS tape (
        id INTEGER PRIMARY KEY,
        manufacturer TEXT NOT NULL,
        model TEXT NOT NULL,
        gen TEXT NOT NULL,
        sn TEXT NOT NULL UNIQUE,
        barcode TEXT UNIQUE,
        ptime TEXT
    );

    CREATE TABLE IF NOT EXISTS tar (
        id INTEGER PRIMARY KEY,
        id_tape INTEGER NOT NULL REFERENCES tape(id),
        num INTEGER NOT NULL CHECK (num >= 0),
        stime TEXT,
        etime TEXT,
        access_cnt INTEGER NOT NULL DEFAULT 0,
        blk_offset INTEGER,
        options TEXT,
        uname TEXT,
        UNIQUE (id_tape, num)
    );

    CREATE TABLE IF NOT EXISTS tarfile (
        id INTEGER PRIMARY KEY,
        id_tape INTEGER NOT NULL REFERENCES tape(id),
        id_tar INTEGER NOT NULL REFERENCES tar(id),
        fullpath TEXT NOT NULL,
        relpath TEXT NOT NULL,
        fname TEXT NOT NULL,
        sz INTEGER NOT NULL,
        sha256 TEXT NOT NULL,
        UNIQUE (id_tar, fullpath)
    );

    CREATE INDEX IF NOT EXISTS idx_tarfile_tar ON tarfile(id_tar);
";

const TAPE_COLUMNS: &str = "id, manufacturer, model, gen, sn, barcode, ptime";
const TAR_COLUMNS: &str =
    "id, id_tape, num, stime, etime, access_cnt, blk_offset, options, uname";
const TARFILE_COLUMNS: &str = "id, id_tape, id_tar, fullpath, relpath, fname, sz, sha256";

pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    /// Open the catalog at `path`, creating the schema when the file is new.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("Creating new catalog at {}", path.display());
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // -------------------------------------------------------------------------
    // Tapes

    pub fn new_tape(&self, tape: &NewTape) -> Result<Tape> {
        if self.tape_where("sn = ?1", &tape.serial)?.is_some() {
            return Err(MtarError::exists(format!(
                "tape with serial number '{}' already exists",
                tape.serial
            )));
        }
        if let Some(barcode) = &tape.barcode {
            if self.tape_where("barcode = ?1", barcode)?.is_some() {
                return Err(MtarError::exists(format!(
                    "tape with barcode '{}' already exists",
                    barcode
                )));
            }
        }

        self.conn.execute(
            "INSERT INTO tape (manufacturer, model, gen, sn, barcode, ptime)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                tape.manufacturer,
                tape.model,
                tape.generation,
                tape.serial,
                tape.barcode,
                tape.purchased
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!("Inserted tape {} (serial {})", id, tape.serial);

        self.tape_where("id = ?1", &id)?
            .ok_or_else(|| MtarError::not_found(format!("tape {id} vanished after insert")))
    }

    pub fn list_tapes(&self) -> Result<Vec<Tape>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TAPE_COLUMNS} FROM tape ORDER BY id"))?;
        let tapes = stmt
            .query_map([], tape_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tapes)
    }

    pub fn find_tapes_by_barcode(&self, pattern: &str) -> Result<Vec<Tape>> {
        let pattern = compile_pattern(pattern)?;
        Ok(self
            .list_tapes()?
            .into_iter()
            .filter(|tape| {
                tape.barcode
                    .as_deref()
                    .map(|barcode| pattern.matches_with(barcode, match_options()))
                    .unwrap_or(false)
            })
            .collect())
    }

    pub fn find_tapes_by_serial(&self, pattern: &str) -> Result<Vec<Tape>> {
        let pattern = compile_pattern(pattern)?;
        Ok(self
            .list_tapes()?
            .into_iter()
            .filter(|tape| pattern.matches_with(&tape.serial, match_options()))
            .collect())
    }

    fn tape_where(&self, condition: &str, value: &dyn rusqlite::ToSql) -> Result<Option<Tape>> {
        let tape = self
            .conn
            .query_row(
                &format!("SELECT {TAPE_COLUMNS} FROM tape WHERE {condition}"),
                params![value],
                tape_from_row,
            )
            .optional()?;
        Ok(tape)
    }

    // -------------------------------------------------------------------------
    // Segments

    pub fn new_segment(&self, tape_identifier: &str, segment: &NewSegment) -> Result<Segment> {
        let tape = self.resolve_tape(tape_identifier)?;

        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM tar WHERE id_tape = ?1 AND num = ?2",
                params![tape.id, segment.number],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(MtarError::exists(format!(
                "tar number {} on tape '{}' (id={}) already exists",
                segment.number, tape_identifier, tape.id
            )));
        }

        self.conn.execute(
            "INSERT INTO tar (id_tape, num, stime, etime, access_cnt, blk_offset, options, uname)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                tape.id,
                segment.number,
                segment.start_time,
                segment.end_time,
                segment.access_count,
                segment.block_offset,
                segment.options,
                segment.uname
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!("Inserted tar {} (num {} on tape {})", id, segment.number, tape.id);

        self.find_segment(&tape, segment.number)
    }

    pub fn list_segments(&self, tape: Option<&Tape>) -> Result<Vec<Segment>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TAR_COLUMNS} FROM tar
             WHERE (?1 IS NULL OR id_tape = ?1)
             ORDER BY id_tape, num"
        ))?;
        let segments = stmt
            .query_map(params![tape.map(|t| t.id)], segment_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(segments)
    }

    fn update_segment_time(&self, column: &str, segment_id: i64, at: DateTime<Utc>) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let updated = tx.execute(
            &format!("UPDATE tar SET {column} = ?1 WHERE id = ?2"),
            params![at, segment_id],
        )?;
        if updated == 0 {
            return Err(MtarError::not_found(format!("tar id {segment_id}")));
        }
        tx.commit()?;

        debug!("Set tar {} {} = {}", segment_id, column, at);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Queued files

    pub fn new_queued_file(&self, segment: &Segment, file: &NewQueuedFile) -> Result<QueuedFile> {
        self.conn.execute(
            "INSERT INTO tarfile (id_tape, id_tar, fullpath, relpath, fname, sz, sha256)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                segment.tape_id,
                segment.id,
                path_text(&file.full_path)?,
                path_text(&file.relative_path)?,
                file.file_name,
                file.size as i64,
                file.sha256
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        Ok(QueuedFile {
            id,
            tape_id: segment.tape_id,
            segment_id: segment.id,
            full_path: file.full_path.clone(),
            relative_path: file.relative_path.clone(),
            file_name: file.file_name.clone(),
            size: file.size,
            sha256: file.sha256.clone(),
        })
    }

    /// Refresh size and hash of an already queued file.
    pub fn update_queued_file(&self, file_id: i64, size: u64, sha256: &str) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE tarfile SET sz = ?1, sha256 = ?2 WHERE id = ?3",
            params![size as i64, sha256, file_id],
        )?;
        if updated == 0 {
            return Err(MtarError::not_found(format!("tarfile id {file_id}")));
        }
        Ok(())
    }

    pub fn find_queued_file(&self, segment: &Segment, full_path: &Path) -> Result<Option<QueuedFile>> {
        let file = self
            .conn
            .query_row(
                &format!("SELECT {TARFILE_COLUMNS} FROM tarfile WHERE id_tar = ?1 AND fullpath = ?2"),
                params![segment.id, path_text(full_path)?],
                queued_file_from_row,
            )
            .optional()?;
        Ok(file)
    }

    pub fn list_files(&self, filter: &FileFilter) -> Result<Vec<QueuedFile>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TARFILE_COLUMNS} FROM tarfile
             WHERE (?1 IS NULL OR id_tape = ?1)
               AND (?2 IS NULL OR id_tar = ?2)
               AND (?3 IS NULL OR id_tar IN (SELECT id FROM tar WHERE num = ?3))
             ORDER BY id_tape, id_tar, fullpath"
        ))?;
        let files = stmt
            .query_map(
                params![filter.tape_id, filter.segment_id, filter.segment_number],
                queued_file_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }

    /// Case-insensitive glob match on the file name only.
    pub fn find_files_by_name(&self, pattern: &str) -> Result<Vec<QueuedFile>> {
        let pattern = compile_pattern(pattern)?;
        Ok(self
            .list_files(&FileFilter::default())?
            .into_iter()
            .filter(|file| pattern.matches_with(&file.file_name, match_options()))
            .collect())
    }
}

impl Catalog for SqliteCatalog {
    fn resolve_tape(&self, identifier: &str) -> Result<Tape> {
        if let Ok(id) = identifier.parse::<i64>() {
            if let Some(tape) = self.tape_where("id = ?1", &id)? {
                return Ok(tape);
            }
        }
        if let Some(tape) = self.tape_where("sn = ?1", &identifier)? {
            return Ok(tape);
        }
        if let Some(tape) = self.tape_where("barcode = ?1", &identifier)? {
            return Ok(tape);
        }

        Err(MtarError::not_found(format!(
            "no tape with id, serial number, or barcode '{identifier}'"
        )))
    }

    fn find_segment(&self, tape: &Tape, number: u32) -> Result<Segment> {
        self.conn
            .query_row(
                &format!("SELECT {TAR_COLUMNS} FROM tar WHERE id_tape = ?1 AND num = ?2"),
                params![tape.id, number],
                segment_from_row,
            )
            .optional()?
            .ok_or_else(|| {
                MtarError::not_found(format!(
                    "no tar number {} on tape '{}' (id={})",
                    number, tape.serial, tape.id
                ))
            })
    }

    fn list_queued_files(&self, segment: &Segment) -> Result<Vec<QueuedFile>> {
        self.list_files(&FileFilter {
            segment_id: Some(segment.id),
            ..Default::default()
        })
    }

    fn set_segment_start_time(&self, segment_id: i64, at: DateTime<Utc>) -> Result<()> {
        self.update_segment_time("stime", segment_id, at)
    }

    fn set_segment_end_time(&self, segment_id: i64, at: DateTime<Utc>) -> Result<()> {
        self.update_segment_time("etime", segment_id, at)
    }
}

fn tape_from_row(row: &Row<'_>) -> rusqlite::Result<Tape> {
    Ok(Tape {
        id: row.get(0)?,
        manufacturer: row.get(1)?,
        model: row.get(2)?,
        generation: row.get(3)?,
        serial: row.get(4)?,
        barcode: row.get(5)?,
        purchased: row.get(6)?,
    })
}

fn segment_from_row(row: &Row<'_>) -> rusqlite::Result<Segment> {
    Ok(Segment {
        id: row.get(0)?,
        tape_id: row.get(1)?,
        number: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        access_count: row.get(5)?,
        block_offset: row.get(6)?,
        options: row.get(7)?,
        uname: row.get(8)?,
    })
}

fn queued_file_from_row(row: &Row<'_>) -> rusqlite::Result<QueuedFile> {
    let full_path: String = row.get(3)?;
    let relative_path: String = row.get(4)?;
    let size: i64 = row.get(6)?;

    Ok(QueuedFile {
        id: row.get(0)?,
        tape_id: row.get(1)?,
        segment_id: row.get(2)?,
        full_path: PathBuf::from(full_path),
        relative_path: PathBuf::from(relative_path),
        file_name: row.get(5)?,
        size: size.max(0) as u64,
        sha256: row.get(7)?,
    })
}

/// Paths are stored as TEXT; a lossy conversion would record a file that no longer exists.
fn path_text(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        MtarError::parameter_validation(format!("{} is not valid UTF-8", path.display()))
    })
}

fn compile_pattern(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern)
        .map_err(|e| MtarError::parse(format!("invalid pattern '{}': {}", pattern, e)))
}

fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    }
}
