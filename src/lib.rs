//! RustMtar Library
//!
//! Catalogued tar archives on non-rewinding tape drives: a SQLite catalog of
//! tapes, the tars written to them and the files in each tar, drive
//! positioning by file mark, and the write path that ties them together.

pub mod archiver;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod display;
pub mod drive;
pub mod error;
pub mod lock;
pub mod logger;
pub mod manifest;
pub mod notify;
pub mod tape_ops;
pub mod utils;

// Re-export key types for easier use
pub use catalog::{Catalog, SqliteCatalog};
pub use drive::{
    plan_positioning, position_to, DriveController, DriveOperation, DriveStatusReport, MtDrive,
    PositionPlan, PositionPolicy, SimulatedDrive,
};
pub use error::{ErrorKind, MtarError, Result};
pub use tape_ops::{SegmentOutcome, SegmentReport, WriteOrchestrator};
