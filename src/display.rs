//! Terminal output: aligned tables by default, JSON with `--json`.

use crate::catalog::{QueuedFile, Segment, Tape};
use crate::drive::DriveStatusReport;
use crate::error::{MtarError, Result};
use crate::tape_ops::{QueueSummary, SegmentOutcome};
use crate::utils::{format_bytes, format_duration};
use chrono::{DateTime, Utc};
use serde::Serialize;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| MtarError::parse(format!("cannot encode JSON output: {e}")))?;
    println!("{}", text);
    Ok(())
}

fn format_time(time: &Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn display_tapes(tapes: &[Tape], json: bool) -> Result<()> {
    if json {
        return print_json(tapes);
    }

    println!(
        "{:>5} {:<14} {:<14} {:<8} {:<16} {:<10} {:<10}",
        "Id", "Manufacturer", "Model", "Gen", "Serial", "Barcode", "Purchased"
    );
    println!("{:-<84}", "");
    for tape in tapes {
        println!(
            "{:>5} {:<14} {:<14} {:<8} {:<16} {:<10} {:<10}",
            tape.id,
            tape.manufacturer,
            tape.model,
            tape.generation,
            tape.serial,
            tape.barcode.as_deref().unwrap_or("-"),
            tape.purchased
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}

pub fn display_segments(segments: &[Segment], json: bool) -> Result<()> {
    if json {
        return print_json(segments);
    }

    println!(
        "{:>5} {:>5} {:>5} {:<19} {:<19} {:>6} {:<10}",
        "Id", "Tape", "Num", "Start", "End", "Access", "Options"
    );
    println!("{:-<80}", "");
    for segment in segments {
        println!(
            "{:>5} {:>5} {:>5} {:<19} {:<19} {:>6} {:<10}",
            segment.id,
            segment.tape_id,
            segment.number,
            format_time(&segment.start_time),
            format_time(&segment.end_time),
            segment.access_count,
            segment.options.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub fn display_files(files: &[QueuedFile], json: bool) -> Result<()> {
    if json {
        return print_json(files);
    }

    println!("{:>5} {:>5} {:>12} {:<16} {}", "Tape", "Tar", "Size", "SHA256", "Path");
    println!("{:-<80}", "");
    for file in files {
        println!(
            "{:>5} {:>5} {:>12} {:<16} {}",
            file.tape_id,
            file.segment_id,
            format_bytes(file.size),
            file.sha256.get(..16).unwrap_or(&file.sha256),
            file.full_path.display()
        );
    }
    let total: u64 = files.iter().map(|f| f.size).sum();
    println!("{} files, {}", files.len(), format_bytes(total));
    Ok(())
}

pub fn display_status(device: &str, status: &DriveStatusReport, json: bool) -> Result<()> {
    if json {
        return print_json(&serde_json::json!({ "device": device, "status": status }));
    }

    if status.is_loaded() {
        println!(
            "{}: file {} block {} partition {}",
            device, status.segment, status.block, status.partition
        );
    } else {
        println!("{}: no tape loaded", device);
    }
    Ok(())
}

pub fn display_queue_summary(summary: &QueueSummary, json: bool) -> Result<()> {
    if json {
        return print_json(summary);
    }

    println!(
        "Queued {} files: {} added, {} updated, {} skipped ({} hashed)",
        summary.processed(),
        summary.added,
        summary.updated,
        summary.skipped,
        format_bytes(summary.bytes)
    );
    Ok(())
}

pub fn display_write_outcomes(outcomes: &[SegmentOutcome], json: bool) -> Result<()> {
    if json {
        let entries: Vec<serde_json::Value> = outcomes
            .iter()
            .map(|outcome| match &outcome.result {
                Ok(report) => serde_json::json!({ "tar": outcome.segment, "ok": true, "report": report }),
                Err(e) => serde_json::json!({ "tar": outcome.segment, "ok": false, "error": e.to_string() }),
            })
            .collect();
        return print_json(&entries);
    }

    for outcome in outcomes {
        match &outcome.result {
            Ok(report) => {
                let seconds = (report.finished - report.started).num_milliseconds() as f64 / 1000.0;
                println!(
                    "tar {:>4}: written, {} files, {} in {}",
                    outcome.segment,
                    report.files,
                    format_bytes(report.bytes),
                    format_duration(seconds)
                );
            }
            Err(e) => println!("tar {:>4}: FAILED: {}", outcome.segment, e),
        }
    }
    Ok(())
}
