//! `mt(1)` backed drive controller.

use super::{DriveController, DriveOperation, DriveStatusReport};
use crate::error::{MtarError, Result};
use crate::utils::absolute_path;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MtDrive {
    device: String,
    tool: String,
    status_timeout: Duration,
    movement_timeout: Option<Duration>,
}

impl MtDrive {
    /// Validate `device`, then query it once so an unusable drive fails fast.
    pub async fn open(
        device: &str,
        tool: &str,
        status_timeout: Duration,
        movement_timeout: Option<Duration>,
    ) -> Result<Self> {
        let device = validate_device_path(device)?;
        let drive = Self {
            device: device.to_string_lossy().to_string(),
            tool: tool.to_string(),
            status_timeout,
            movement_timeout,
        };

        let status = drive.status().await?;
        debug!("Opened {}: {}", drive.device, status);
        Ok(drive)
    }

    async fn run(&self, args: &[String], limit: Option<Duration>) -> Result<String> {
        let command_line = format!("{} -f {} {}", self.tool, self.device, args.join(" "));
        debug!("Running `{}`", command_line);

        let mut command = Command::new(&self.tool);
        command
            .arg("-f")
            .arg(&self.device)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let pending = command.output();
        let output = match limit {
            Some(limit) => tokio::time::timeout(limit, pending).await.map_err(|_| {
                MtarError::drive(format!(
                    "`{}` did not complete within {:?}",
                    command_line, limit
                ))
            })?,
            None => pending.await,
        }
        .map_err(|e| MtarError::drive(format!("failed to run `{}`: {}", command_line, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("`{}` failed: {} {}", command_line, output.status, stderr.trim());
            return Err(MtarError::DriveCommand {
                command: command_line,
                status: format!("{} {}", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn movement(&self, operation: DriveOperation) -> Result<()> {
        let mut args = vec![operation.verb().to_string()];
        if let Some(count) = operation.count() {
            args.push(count.to_string());
        }
        self.run(&args, self.movement_timeout).await.map(|_| ())
    }
}

#[async_trait]
impl DriveController for MtDrive {
    fn device(&self) -> &str {
        &self.device
    }

    async fn status(&self) -> Result<DriveStatusReport> {
        let output = self
            .run(&["status".to_string()], Some(self.status_timeout))
            .await?;
        parse_status(&output)
    }

    async fn rewind(&self) -> Result<()> {
        self.movement(DriveOperation::Rewind).await
    }

    async fn step_back(&self, count: u32) -> Result<()> {
        if count == 0 {
            return Err(MtarError::parameter_validation("bsf count must be at least 1"));
        }
        self.movement(DriveOperation::StepBack(count)).await
    }

    async fn step_forward(&self, count: u32) -> Result<()> {
        if count == 0 {
            return Err(MtarError::parameter_validation("fsf count must be at least 1"));
        }
        self.movement(DriveOperation::StepForward(count)).await
    }

    async fn absolute_seek(&self, segment: u32) -> Result<()> {
        self.movement(DriveOperation::AbsoluteSeek(segment)).await
    }

    async fn offline(&self) -> Result<()> {
        self.movement(DriveOperation::Offline).await
    }
}

/// Only non-rewinding tape nodes directly under `/dev` (`/dev/nst0`, `/dev/nsa0`) are accepted.
/// A rewinding node would rewind on close and make every position meaningless.
pub fn validate_device_path(device: &str) -> Result<PathBuf> {
    let absolute = absolute_path(Path::new(device))?;

    if absolute.parent() != Some(Path::new("/dev")) {
        return Err(MtarError::configuration(format!(
            "tape drive is not a device: {}",
            absolute.display()
        )));
    }

    let is_non_rewinding = absolute
        .file_name()
        .map(|name| name.to_string_lossy().starts_with('n'))
        .unwrap_or(false);
    if !is_non_rewinding {
        return Err(MtarError::configuration(format!(
            "refusing anything but a non-rewinding tape device: {}",
            absolute.display()
        )));
    }

    Ok(absolute)
}

/// Parse `mt status` output.
///
/// The second line carries the position, for example
/// `File number=3, block number=0, partition=0.`
pub fn parse_status(output: &str) -> Result<DriveStatusReport> {
    let line = output
        .lines()
        .nth(1)
        .ok_or_else(|| MtarError::drive(format!("unexpected status output: {:?}", output)))?;

    let values = line
        .trim()
        .trim_end_matches('.')
        .split(',')
        .map(|part| {
            let value = part.rsplit('=').next().unwrap_or("").trim();
            value.parse::<i64>().map_err(|_| {
                MtarError::drive(format!("cannot parse drive status field {:?}", part.trim()))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    match values.as_slice() {
        [segment, block, partition] => {
            Ok(DriveStatusReport::new(*segment, *block, *partition))
        }
        _ => Err(MtarError::drive(format!(
            "drive status line has {} fields, expected 3: {:?}",
            values.len(),
            line
        ))),
    }
}
