//! Status Command Handler
//!
//! Handles the `status` subcommand for reporting the drive position.

use super::Context;
use rust_mtar::display;
use rust_mtar::drive::DriveController;
use rust_mtar::error::Result;
use tracing::info;

pub async fn execute(ctx: &Context) -> Result<()> {
    info!("Querying drive status: {}", ctx.device);

    let drive = ctx.open_drive().await?;
    let status = drive.status().await?;

    display::display_status(drive.device(), &status, ctx.json)
}
