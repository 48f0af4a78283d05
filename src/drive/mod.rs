//! Tape Drive Module
//!
//! Position reports, discrete repositioning operations and the controller
//! abstraction used to drive them. `MtDrive` shells out to `mt(1)`,
//! `SimulatedDrive` models a drive in memory.

pub mod mt;
pub mod planner;
pub mod simulated;

use crate::error::{MtarError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

pub use mt::MtDrive;
pub use planner::{plan_positioning, PositionPlan, PositionPolicy};
pub use simulated::SimulatedDrive;

/// Physical position of the drive as reported at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveStatusReport {
    /// Segment (tape file) number, -1 when no tape is loaded
    pub segment: i64,
    /// Block offset within the segment, -1 at the end-of-segment mark
    pub block: i64,
    /// Partition index, reported but not used for positioning
    pub partition: i64,
}

impl DriveStatusReport {
    pub fn new(segment: i64, block: i64, partition: i64) -> Self {
        Self {
            segment,
            block,
            partition,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.segment >= 0
    }

    /// True when the drive sits exactly at the start of `segment`.
    pub fn is_at_start_of(&self, segment: u32) -> bool {
        self.segment == i64::from(segment) && self.block == 0
    }
}

impl fmt::Display for DriveStatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "segment={} block={} partition={}",
            self.segment, self.block, self.partition
        )
    }
}

/// A single repositioning request understood by the drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveOperation {
    /// Rewind to the beginning of tape
    Rewind,
    /// Backward space N file marks
    StepBack(u32),
    /// Forward space N file marks
    StepForward(u32),
    /// Rewind and forward space to segment N
    AbsoluteSeek(u32),
    /// Rewind and unload the cartridge
    Offline,
}

impl DriveOperation {
    /// `mt` verb for this operation
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Rewind => "rewind",
            Self::StepBack(_) => "bsf",
            Self::StepForward(_) => "fsf",
            Self::AbsoluteSeek(_) => "asf",
            Self::Offline => "offline",
        }
    }

    pub fn count(&self) -> Option<u32> {
        match self {
            Self::StepBack(n) | Self::StepForward(n) | Self::AbsoluteSeek(n) => Some(*n),
            Self::Rewind | Self::Offline => None,
        }
    }
}

impl fmt::Display for DriveOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.count() {
            Some(n) => write!(f, "{} {}", self.verb(), n),
            None => write!(f, "{}", self.verb()),
        }
    }
}

/// Controller for one tape device.
///
/// Every call blocks until the drive acknowledges the operation. Movement
/// operations may legitimately take minutes.
#[async_trait]
pub trait DriveController: Send + Sync {
    /// Device path this controller addresses
    fn device(&self) -> &str;

    async fn status(&self) -> Result<DriveStatusReport>;

    async fn rewind(&self) -> Result<()>;

    async fn step_back(&self, count: u32) -> Result<()>;

    async fn step_forward(&self, count: u32) -> Result<()>;

    async fn absolute_seek(&self, segment: u32) -> Result<()>;

    async fn offline(&self) -> Result<()>;

    async fn execute(&self, operation: DriveOperation) -> Result<()> {
        match operation {
            DriveOperation::Rewind => self.rewind().await,
            DriveOperation::StepBack(n) => self.step_back(n).await,
            DriveOperation::StepForward(n) => self.step_forward(n).await,
            DriveOperation::AbsoluteSeek(n) => self.absolute_seek(n).await,
            DriveOperation::Offline => self.offline().await,
        }
    }
}

/// Move the drive to the start of `target` and verify it got there.
///
/// Returns the plan that was executed. Any mismatch between the final
/// reported position and `(target, 0)` is a `SeekVerification` error.
pub async fn position_to(
    drive: &dyn DriveController,
    target: u32,
    policy: PositionPolicy,
) -> Result<PositionPlan> {
    let current = drive.status().await?;
    if !current.is_loaded() {
        return Err(MtarError::NoTape(format!(
            "drive {} reports no tape, cannot position to segment {}",
            drive.device(),
            target
        )));
    }

    let plan = plan_positioning(&current, target, policy)?;
    if plan.operations.is_empty() {
        debug!("Drive already at start of segment {}", target);
    } else {
        info!(
            "Positioning {} from {} to segment {}: [{}]",
            drive.device(),
            current,
            target,
            plan.describe()
        );
    }

    for operation in &plan.operations {
        drive.execute(*operation).await?;
    }

    let verified = drive.status().await?;
    if !verified.is_at_start_of(target) {
        return Err(MtarError::SeekVerification {
            expected_segment: target,
            actual: verified,
        });
    }
    debug!("Seek verified: {}", verified);

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display() {
        assert_eq!(DriveOperation::Rewind.to_string(), "rewind");
        assert_eq!(DriveOperation::StepBack(6).to_string(), "bsf 6");
        assert_eq!(DriveOperation::StepForward(1).to_string(), "fsf 1");
        assert_eq!(DriveOperation::AbsoluteSeek(3).to_string(), "asf 3");
        assert_eq!(DriveOperation::Offline.to_string(), "offline");
    }

    #[tokio::test]
    async fn test_position_to_mid_segment() {
        let drive = SimulatedDrive::loaded(5, 120);
        let plan = position_to(&drive, 5, PositionPolicy::Step).await.unwrap();

        assert_eq!(
            plan.operations,
            vec![DriveOperation::StepBack(1), DriveOperation::StepForward(1)]
        );
        assert_eq!(drive.status().await.unwrap(), DriveStatusReport::new(5, 0, 0));
    }

    #[tokio::test]
    async fn test_position_to_already_there() {
        let drive = SimulatedDrive::loaded(3, 0);
        let plan = position_to(&drive, 3, PositionPolicy::Step).await.unwrap();

        assert!(plan.operations.is_empty());
        assert!(drive.operations().is_empty());
    }

    #[tokio::test]
    async fn test_position_to_without_tape() {
        let drive = SimulatedDrive::empty();
        let err = position_to(&drive, 2, PositionPolicy::Step)
            .await
            .unwrap_err();

        assert!(matches!(err, MtarError::NoTape(_)));
        assert!(drive.operations().is_empty());
    }

    #[tokio::test]
    async fn test_position_to_detects_drift() {
        let drive = SimulatedDrive::loaded(2, 0).with_drift();
        let err = position_to(&drive, 7, PositionPolicy::Step)
            .await
            .unwrap_err();

        match err {
            MtarError::SeekVerification {
                expected_segment,
                actual,
            } => {
                assert_eq!(expected_segment, 7);
                assert_ne!(actual.block, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
