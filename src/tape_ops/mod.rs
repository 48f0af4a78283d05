//! Tape operations: queueing files into segments and writing segments to tape.

pub mod hash;
pub mod queue_operations;
pub mod write_operations;

pub use queue_operations::{queue_files, QueueRequest, QueueSummary};
pub use write_operations::{SegmentOutcome, SegmentReport, WriteOrchestrator};
