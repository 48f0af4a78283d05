//! Queueing files into a segment.
//!
//! Paths are expanded, hashed and recorded in the catalog ahead of a write,
//! each with the path relative to the segment's base directory.

use super::hash::sha256_file;
use crate::catalog::{Catalog, NewQueuedFile, Segment, SqliteCatalog};
use crate::error::{MtarError, Result};
use crate::notify::{NotifyEvent, Notifications};
use crate::utils::{absolute_path, format_bytes};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Minimum number of files between progress notifications
const PROGRESS_NOTIFY_MIN: usize = 100;

#[derive(Debug, Clone)]
pub struct QueueRequest {
    pub tape: String,
    pub segment: u32,
    pub base_dir: PathBuf,
    /// Re-hash and update files that are already queued
    pub force_update: bool,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueSummary {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub bytes: u64,
}

impl QueueSummary {
    pub fn processed(&self) -> usize {
        self.added + self.updated + self.skipped
    }
}

pub async fn queue_files(
    catalog: &SqliteCatalog,
    notifications: &Notifications,
    request: &QueueRequest,
    show_progress: bool,
) -> Result<QueueSummary> {
    let tape = catalog.resolve_tape(&request.tape)?;
    let segment = catalog.find_segment(&tape, request.segment)?;

    let base_dir = absolute_path(&request.base_dir)?;
    if !base_dir.is_dir() {
        return Err(MtarError::parameter_validation(format!(
            "base directory {} is not a directory",
            base_dir.display()
        )));
    }
    check_established_base_dir(catalog, &segment, &base_dir)?;

    let files = expand_paths(&request.paths)?;
    // Every path is checked before the first insert so a bad request leaves no rows behind.
    let entries = files
        .iter()
        .map(|path| entry_for(&base_dir, path))
        .collect::<Result<Vec<_>>>()?;
    info!(
        "Queueing {} files into tar {} on tape {}",
        files.len(),
        segment.number,
        tape.serial
    );

    let progress = if show_progress {
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {wide_msg}")
                .map_err(|e| MtarError::configuration(format!("progress template: {e}")))?,
        );
        bar
    } else {
        ProgressBar::hidden()
    };
    let notify_every = std::cmp::max(PROGRESS_NOTIFY_MIN, files.len() / 10);

    let mut summary = QueueSummary::default();
    for (index, entry) in entries.into_iter().enumerate() {
        progress.set_message(entry.full_path.display().to_string());
        queue_one(catalog, &segment, entry, request.force_update, &mut summary)?;
        progress.inc(1);

        let done = index + 1;
        if done % notify_every == 0 && done < files.len() {
            notifications
                .notify(
                    NotifyEvent::QueueProgress,
                    "rustmtar: queue progress",
                    &format!(
                        "Queued {} of {} files into tar {} on tape {}",
                        done,
                        files.len(),
                        segment.number,
                        tape.serial
                    ),
                )
                .await;
        }
    }
    progress.finish_and_clear();

    info!(
        "Queue complete: {} added, {} updated, {} skipped, {}",
        summary.added,
        summary.updated,
        summary.skipped,
        format_bytes(summary.bytes)
    );
    notifications
        .notify(
            NotifyEvent::QueueComplete,
            "rustmtar: queue complete",
            &format!(
                "Tar {} on tape {}: {} added, {} updated, {} skipped",
                segment.number, tape.serial, summary.added, summary.updated, summary.skipped
            ),
        )
        .await;

    Ok(summary)
}

/// Catalog row for `path`, with the path relative to `base_dir`. The catalog
/// stores paths as text, so names that are not valid UTF-8 are refused here
/// rather than mangled.
fn entry_for(base_dir: &Path, path: &Path) -> Result<NewQueuedFile> {
    let relative_path = path
        .strip_prefix(base_dir)
        .map_err(|_| {
            MtarError::parameter_validation(format!(
                "{} is not under base directory {}",
                path.display(),
                base_dir.display()
            ))
        })?
        .to_path_buf();
    if path.to_str().is_none() {
        return Err(MtarError::parameter_validation(format!(
            "{} is not valid UTF-8",
            path.display()
        )));
    }
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| MtarError::parameter_validation(format!("{} has no file name", path.display())))?;

    Ok(NewQueuedFile {
        full_path: path.to_path_buf(),
        relative_path,
        file_name,
        size: 0,
        sha256: String::new(),
    })
}

fn queue_one(
    catalog: &SqliteCatalog,
    segment: &Segment,
    mut entry: NewQueuedFile,
    force_update: bool,
    summary: &mut QueueSummary,
) -> Result<()> {
    let path = entry.full_path.as_path();
    let existing = catalog.find_queued_file(segment, path)?;
    if existing.is_some() && !force_update {
        debug!("Already queued, skipping {}", path.display());
        summary.skipped += 1;
        return Ok(());
    }

    let size = std::fs::metadata(path)?.len();
    let sha256 = sha256_file(path)?;
    summary.bytes += size;

    match existing {
        Some(known) => {
            catalog.update_queued_file(known.id, size, &sha256)?;
            debug!("Re-hashed {} ({})", path.display(), sha256);
            summary.updated += 1;
        }
        None => {
            entry.size = size;
            entry.sha256 = sha256;
            catalog.new_queued_file(segment, &entry)?;
            debug!("Queued {}", path.display());
            summary.added += 1;
        }
    }
    Ok(())
}

/// Files already queued into `segment` fix its base directory.
fn check_established_base_dir(catalog: &SqliteCatalog, segment: &Segment, base_dir: &Path) -> Result<()> {
    let existing = catalog.list_queued_files(segment)?;
    let Some(first) = existing.first() else {
        return Ok(());
    };

    match first.base_dir() {
        Some(established) if established == base_dir => Ok(()),
        Some(established) => Err(MtarError::parameter_validation(format!(
            "tar {} already uses base directory {}, not {}",
            segment.number,
            established.display(),
            base_dir.display()
        ))),
        None => {
            warn!(
                "Cannot derive base directory of tar {} from {}",
                segment.number,
                first.full_path.display()
            );
            Ok(())
        }
    }
}

/// Absolute paths of every regular file named by `paths`, directories
/// expanded recursively, in a stable order without duplicates.
pub fn expand_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        let absolute = absolute_path(path)?;
        let metadata = std::fs::metadata(&absolute)
            .map_err(|_| MtarError::MissingFile(absolute.clone()))?;

        if metadata.is_dir() {
            for entry in WalkDir::new(&absolute).follow_links(false).sort_by_file_name() {
                let entry = entry.map_err(std::io::Error::from)?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
        } else if metadata.is_file() {
            files.push(absolute);
        } else {
            warn!("Skipping {}: not a regular file", absolute.display());
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}
