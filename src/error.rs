use crate::drive::DriveStatusReport;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MtarError>;

#[derive(Error, Debug)]
pub enum MtarError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Drive error: {0}")]
    Drive(String),

    #[error("Drive command `{command}` failed: {status}")]
    DriveCommand { command: String, status: String },

    #[error("No tape loaded: {0}")]
    NoTape(String),

    #[error(
        "Seek verification failed: expected segment {expected_segment} block 0, drive reports segment {} block {}",
        .actual.segment, .actual.block
    )]
    SeekVerification {
        expected_segment: u32,
        actual: DriveStatusReport,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Item exists: {0}")]
    Exists(String),

    #[error("Queued file no longer exists on disk: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Archiver error: {0}")]
    Archiver(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),

    #[error("Device is locked: {0}")]
    Locked(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Parameter validation error: {0}")]
    ParameterValidation(String),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

/// Coarse classification used when deciding whether a multi-segment write can go on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Drive,
    NotFound,
    Io,
    Notification,
    Catalog,
    Usage,
    Other,
}

impl MtarError {
    pub fn configuration<T: Into<String>>(msg: T) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn drive<T: Into<String>>(msg: T) -> Self {
        Self::Drive(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn exists<T: Into<String>>(msg: T) -> Self {
        Self::Exists(msg.into())
    }

    pub fn archiver<T: Into<String>>(msg: T) -> Self {
        Self::Archiver(msg.into())
    }

    pub fn notification<T: Into<String>>(msg: T) -> Self {
        Self::Notification(msg.into())
    }

    pub fn parse<T: Into<String>>(msg: T) -> Self {
        Self::Parse(msg.into())
    }

    pub fn parameter_validation<T: Into<String>>(msg: T) -> Self {
        Self::ParameterValidation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::Locked(_) => ErrorKind::Configuration,
            Self::Drive(_)
            | Self::DriveCommand { .. }
            | Self::NoTape(_)
            | Self::SeekVerification { .. } => ErrorKind::Drive,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Io(_) | Self::MissingFile(_) | Self::Archiver(_) => ErrorKind::Io,
            Self::Notification(_) => ErrorKind::Notification,
            Self::Catalog(_) => ErrorKind::Catalog,
            Self::Exists(_) | Self::Parse(_) | Self::ParameterValidation(_) => ErrorKind::Usage,
            Self::Generic(_) => ErrorKind::Other,
        }
    }
}
