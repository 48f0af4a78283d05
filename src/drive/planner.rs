//! Position Planner
//!
//! Maps the drive's current position and a target segment to the ordered
//! list of operations that lands the head at the start of the target.

use super::{DriveOperation, DriveStatusReport};
use crate::error::{MtarError, Result};
use serde::{Deserialize, Serialize};

/// How the planner reaches a segment that is not the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionPolicy {
    /// Relative file-mark spacing with explicit mid-segment re-homing
    #[default]
    Step,
    /// Single absolute seek (`mt asf`) whenever the drive is not already in place
    Absolute,
}

/// Operations to issue, in order, followed by an expected state of `(target, 0)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionPlan {
    pub target: u32,
    pub operations: Vec<DriveOperation>,
}

impl PositionPlan {
    pub fn describe(&self) -> String {
        self.operations
            .iter()
            .map(|op| op.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn plan_positioning(
    current: &DriveStatusReport,
    target: u32,
    policy: PositionPolicy,
) -> Result<PositionPlan> {
    if !current.is_loaded() {
        return Err(MtarError::NoTape(format!(
            "cannot plan positioning to segment {target}"
        )));
    }

    let operations = match policy {
        PositionPolicy::Step => plan_step(current, target),
        PositionPolicy::Absolute => plan_absolute(current, target),
    };

    Ok(PositionPlan { target, operations })
}

fn plan_step(current: &DriveStatusReport, target: u32) -> Vec<DriveOperation> {
    let target_segment = i64::from(target);

    if target == 0 {
        return vec![DriveOperation::Rewind];
    }

    if current.segment == target_segment {
        if current.block == 0 {
            return Vec::new();
        }
        // Cross the preceding file mark and come back to land on the segment start.
        return vec![DriveOperation::StepBack(1), DriveOperation::StepForward(1)];
    }

    if current.segment < target_segment {
        let distance = (target_segment - current.segment) as u32;
        vec![DriveOperation::StepForward(distance)]
    } else {
        // One extra file mark puts us at the end of target - 1.
        let distance = (current.segment - target_segment + 1) as u32;
        vec![
            DriveOperation::StepBack(distance),
            DriveOperation::StepForward(1),
        ]
    }
}

fn plan_absolute(current: &DriveStatusReport, target: u32) -> Vec<DriveOperation> {
    if target == 0 {
        vec![DriveOperation::Rewind]
    } else if current.is_at_start_of(target) {
        Vec::new()
    } else {
        vec![DriveOperation::AbsoluteSeek(target)]
    }
}
