//! Command Handlers Module
//!
//! This module contains handlers for all CLI subcommands.

pub mod eject;
pub mod find;
pub mod list;
pub mod new;
pub mod queue;
pub mod status;
pub mod write;

use rust_mtar::catalog::SqliteCatalog;
use rust_mtar::cli::Cli;
use rust_mtar::config::Config;
use rust_mtar::drive::MtDrive;
use rust_mtar::error::{MtarError, Result};
use rust_mtar::notify::{Notifications, NotifyLevel, PushoverNotifier};
use std::path::PathBuf;
use tracing::debug;

/// Settings shared by every handler: configuration with CLI overrides applied.
pub struct Context {
    pub config: Config,
    pub device: String,
    pub db: Option<PathBuf>,
    pub json: bool,
    pub notify: NotifyLevel,
}

impl Context {
    pub fn new(cli: &Cli, config: Config) -> Self {
        let device = cli.device.clone().unwrap_or_else(|| config.device.clone());
        Self {
            device,
            db: cli.db.clone(),
            json: cli.json,
            notify: cli.notify.unwrap_or_default(),
            config,
        }
    }

    pub fn open_catalog(&self) -> Result<SqliteCatalog> {
        let path = self
            .db
            .as_ref()
            .ok_or_else(|| MtarError::configuration("a catalog database is required (-d/--db)"))?;
        debug!("Opening catalog {}", path.display());
        SqliteCatalog::open(path)
    }

    pub fn notifications(&self) -> Result<Notifications> {
        if self.notify == NotifyLevel::None {
            return Ok(Notifications::disabled());
        }
        let pushover = self.config.pushover.as_ref().ok_or_else(|| {
            MtarError::configuration("pushover is not configured, cannot send notifications")
        })?;
        Ok(Notifications::new(
            self.notify,
            Box::new(PushoverNotifier::new(pushover)?),
        ))
    }

    pub async fn open_drive(&self) -> Result<MtDrive> {
        MtDrive::open(
            &self.device,
            &self.config.mt_tool,
            self.config.status_timeout(),
            self.config.movement_timeout(),
        )
        .await
    }
}
