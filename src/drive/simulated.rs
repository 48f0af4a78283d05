//! In-memory drive model.
//!
//! File marks are crossed the way a non-rewinding SCSI tape device crosses
//! them: `fsf` lands on the first block after the mark, `bsf` lands on the
//! beginning-of-tape side of the mark, reported as block -1 of the previous
//! segment.

use super::{DriveController, DriveOperation, DriveStatusReport};
use crate::error::{MtarError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

#[derive(Debug)]
struct SimState {
    position: DriveStatusReport,
    operations: Vec<DriveOperation>,
    status_queries: usize,
}

pub struct SimulatedDrive {
    device: String,
    state: Mutex<SimState>,
    drift: bool,
    failing_movement: bool,
}

impl SimulatedDrive {
    pub fn loaded(segment: i64, block: i64) -> Self {
        Self::with_position(DriveStatusReport::new(segment, block, 0))
    }

    pub fn empty() -> Self {
        Self::with_position(DriveStatusReport::new(-1, -1, -1))
    }

    fn with_position(position: DriveStatusReport) -> Self {
        Self {
            device: "/dev/nst-sim".to_string(),
            state: Mutex::new(SimState {
                position,
                operations: Vec::new(),
                status_queries: 0,
            }),
            drift: false,
            failing_movement: false,
        }
    }

    /// Forward spacing stops a few blocks past the file mark.
    pub fn with_drift(mut self) -> Self {
        self.drift = true;
        self
    }

    /// Every movement command fails as if `mt` exited non-zero.
    pub fn with_failing_movement(mut self) -> Self {
        self.failing_movement = true;
        self
    }

    /// Operations issued so far, in order
    pub fn operations(&self) -> Vec<DriveOperation> {
        self.state.lock().operations.clone()
    }

    pub fn status_queries(&self) -> usize {
        self.state.lock().status_queries
    }

    fn apply(&self, operation: DriveOperation) -> Result<()> {
        let mut state = self.state.lock();
        state.operations.push(operation);

        if self.failing_movement {
            return Err(MtarError::DriveCommand {
                command: format!("mt -f {} {}", self.device, operation),
                status: "exit status: 2".to_string(),
            });
        }
        if !state.position.is_loaded() {
            return Err(MtarError::NoTape(self.device.clone()));
        }

        let landing_block = if self.drift { 3 } else { 0 };
        let partition = state.position.partition;
        let segment = state.position.segment;

        let next = match operation {
            DriveOperation::Rewind => DriveStatusReport::new(0, 0, partition),
            DriveOperation::StepForward(n) => {
                DriveStatusReport::new(segment + i64::from(n), landing_block, partition)
            }
            DriveOperation::StepBack(n) => {
                let landed = segment - i64::from(n);
                if landed < 0 {
                    state.position = DriveStatusReport::new(0, 0, partition);
                    return Err(MtarError::DriveCommand {
                        command: format!("mt -f {} {}", self.device, operation),
                        status: "beginning of tape reached".to_string(),
                    });
                }
                DriveStatusReport::new(landed, -1, partition)
            }
            DriveOperation::AbsoluteSeek(n) => {
                DriveStatusReport::new(i64::from(n), landing_block, partition)
            }
            DriveOperation::Offline => DriveStatusReport::new(-1, -1, -1),
        };
        state.position = next;
        Ok(())
    }
}

#[async_trait]
impl DriveController for SimulatedDrive {
    fn device(&self) -> &str {
        &self.device
    }

    async fn status(&self) -> Result<DriveStatusReport> {
        let mut state = self.state.lock();
        state.status_queries += 1;
        Ok(state.position)
    }

    async fn rewind(&self) -> Result<()> {
        self.apply(DriveOperation::Rewind)
    }

    async fn step_back(&self, count: u32) -> Result<()> {
        self.apply(DriveOperation::StepBack(count))
    }

    async fn step_forward(&self, count: u32) -> Result<()> {
        self.apply(DriveOperation::StepForward(count))
    }

    async fn absolute_seek(&self, segment: u32) -> Result<()> {
        self.apply(DriveOperation::AbsoluteSeek(segment))
    }

    async fn offline(&self) -> Result<()> {
        self.apply(DriveOperation::Offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_mark_crossing() {
        let drive = SimulatedDrive::loaded(4, 17);

        drive.step_back(1).await.unwrap();
        assert_eq!(drive.status().await.unwrap(), DriveStatusReport::new(3, -1, 0));

        drive.step_forward(1).await.unwrap();
        assert_eq!(drive.status().await.unwrap(), DriveStatusReport::new(4, 0, 0));

        drive.offline().await.unwrap();
        assert!(!drive.status().await.unwrap().is_loaded());
        assert_eq!(drive.status_queries(), 3);
    }

    #[tokio::test]
    async fn test_step_back_past_beginning() {
        let drive = SimulatedDrive::loaded(1, 0);
        assert!(drive.step_back(3).await.is_err());
        assert_eq!(drive.status().await.unwrap(), DriveStatusReport::new(0, 0, 0));
    }

    #[tokio::test]
    async fn test_failing_movement_is_recorded() {
        let drive = SimulatedDrive::loaded(1, 0).with_failing_movement();
        let err = drive.rewind().await.unwrap_err();

        assert!(matches!(err, MtarError::DriveCommand { .. }));
        assert_eq!(drive.operations(), vec![DriveOperation::Rewind]);
    }
}
