//! Eject Command Handler
//!
//! Handles the `eject` subcommand: rewind and unload the cartridge.

use super::Context;
use rust_mtar::drive::{mt::validate_device_path, DriveController};
use rust_mtar::error::{MtarError, Result};
use rust_mtar::lock::DeviceLock;
use tracing::info;

pub async fn execute(ctx: &Context) -> Result<()> {
    let device = validate_device_path(&ctx.device)?;
    let _lock = DeviceLock::acquire(&ctx.config.lock_dir(), &device.to_string_lossy())?;

    let drive = ctx.open_drive().await?;
    let status = drive.status().await?;
    if !status.is_loaded() {
        return Err(MtarError::NoTape(drive.device().to_string()));
    }

    info!("Ejecting tape from {} (was at {})", drive.device(), status);
    drive.offline().await?;

    if !ctx.json {
        println!("{}: tape ejected", drive.device());
    }
    Ok(())
}
