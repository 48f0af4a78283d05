//! Queue Command Handler
//!
//! Handles the `queue` subcommand for adding files to a tar ahead of writing.

use super::Context;
use rust_mtar::display;
use rust_mtar::error::Result;
use rust_mtar::tape_ops::{queue_files, QueueRequest};
use std::io::IsTerminal;
use tracing::info;

pub async fn execute(ctx: &Context, request: QueueRequest) -> Result<()> {
    info!(
        "Queueing {} paths into tar {} on tape {} (base {})",
        request.paths.len(),
        request.segment,
        request.tape,
        request.base_dir.display()
    );

    let catalog = ctx.open_catalog()?;
    let notifications = ctx.notifications()?;
    let show_progress = !ctx.json && std::io::stderr().is_terminal();

    let summary = queue_files(&catalog, &notifications, &request, show_progress).await?;
    display::display_queue_summary(&summary, ctx.json)
}
