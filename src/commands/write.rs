//! Write Command Handler
//!
//! Handles the `write` subcommand for writing queued tars to tape.

use super::Context;
use rust_mtar::archiver::TarArchiver;
use rust_mtar::display;
use rust_mtar::drive::{mt::validate_device_path, DriveController};
use rust_mtar::error::Result;
use rust_mtar::lock::DeviceLock;
use rust_mtar::tape_ops::WriteOrchestrator;
use std::ops::RangeInclusive;
use tracing::{info, warn};

pub async fn execute(ctx: &Context, tape: String, tars: RangeInclusive<u32>) -> Result<()> {
    info!(
        "Starting write operation: tape {} tars {}-{} -> {}",
        tape,
        tars.start(),
        tars.end(),
        ctx.device
    );

    let catalog = ctx.open_catalog()?;
    let notifications = ctx.notifications()?;

    let device = validate_device_path(&ctx.device)?;
    let _lock = DeviceLock::acquire(&ctx.config.lock_dir(), &device.to_string_lossy())?;

    let drive = ctx.open_drive().await?;
    let archiver = TarArchiver::new(&ctx.config.tar_tool, drive.device());

    let outcomes = WriteOrchestrator::new(&catalog, &drive, &archiver, &notifications)
        .with_policy(ctx.config.positioning)
        .write_range(&tape, tars.clone())
        .await?;

    display::display_write_outcomes(&outcomes, ctx.json)?;

    let attempted = tars.count();
    let written = outcomes.iter().filter(|o| o.is_success()).count();
    if written < attempted {
        warn!("{} of {} tars were not written", attempted - written, attempted);
        return Err(anyhow::anyhow!(
            "{} of {} tars were not written",
            attempted - written,
            attempted
        )
        .into());
    }
    Ok(())
}

