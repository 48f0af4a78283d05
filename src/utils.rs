//! Utility functions for RustMtar

use crate::error::{MtarError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::ops::RangeInclusive;
use std::path::{Component, Path, PathBuf};

/// Format bytes in human-readable format (B, KB, MB, GB, TB)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    const THRESHOLD: u64 = 1024;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD as f64 && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD as f64;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Format duration in human-readable format
pub fn format_duration(duration_secs: f64) -> String {
    if duration_secs < 60.0 {
        format!("{:.1}s", duration_secs)
    } else if duration_secs < 3600.0 {
        let minutes = (duration_secs / 60.0) as u32;
        let seconds = duration_secs % 60.0;
        format!("{}m {:.1}s", minutes, seconds)
    } else {
        let hours = (duration_secs / 3600.0) as u32;
        let minutes = ((duration_secs % 3600.0) / 60.0) as u32;
        let seconds = duration_secs % 60.0;
        format!("{}h {}m {:.1}s", hours, minutes, seconds)
    }
}

/// Make `path` absolute against the working directory and fold `.`/`..`
/// lexically. Symlinks are left alone.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut result = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            other => result.push(other.as_os_str()),
        }
    }
    Ok(result)
}

/// Parse `N` or `A-B` into an inclusive, ascending range.
pub fn parse_range(value: &str) -> Result<RangeInclusive<u32>> {
    let value = value.trim();
    if let Ok(single) = value.parse::<u32>() {
        return Ok(single..=single);
    }

    let (start, end) = value
        .split_once('-')
        .ok_or_else(|| MtarError::parse(format!("unrecognized integer range '{value}'")))?;
    let start: u32 = start
        .trim()
        .parse()
        .map_err(|_| MtarError::parse(format!("unrecognized integer range '{value}'")))?;
    let end: u32 = end
        .trim()
        .parse()
        .map_err(|_| MtarError::parse(format!("unrecognized integer range '{value}'")))?;

    if start > end {
        return Err(MtarError::parse(format!(
            "range '{value}' must be ascending"
        )));
    }
    Ok(start..=end)
}

/// `YYYY-MM-DD` or `now`
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    if value == "now" {
        return Ok(Utc::now().date_naive());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| MtarError::parse(format!("invalid date '{value}': {e}")))
}

/// `YYYY-MM-DD HH:MM:SS` (UTC) or `now`
pub fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    if value == "now" {
        return Ok(Utc::now());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| MtarError::parse(format!("invalid date and time '{value}': {e}")))
}

/// Output of `uname -a`, recorded with each tar written.
pub fn uname() -> Result<String> {
    let output = std::process::Command::new("uname").arg("-a").output()?;
    if !output.status.success() {
        return Err(MtarError::parse(format!("uname -a exited with {}", output.status)));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
