//! Find Command Handler
//!
//! Handles the `find` subcommand: glob searches over tapes and queued files.

use super::Context;
use rust_mtar::cli::FindTarget;
use rust_mtar::display;
use rust_mtar::error::Result;
use tracing::debug;

pub async fn execute(ctx: &Context, target: FindTarget) -> Result<()> {
    let catalog = ctx.open_catalog()?;

    match target {
        FindTarget::TapeBarcode { pattern } => {
            debug!("Finding tapes by barcode '{}'", pattern);
            display::display_tapes(&catalog.find_tapes_by_barcode(&pattern)?, ctx.json)
        }
        FindTarget::TapeSn { pattern } => {
            debug!("Finding tapes by serial '{}'", pattern);
            display::display_tapes(&catalog.find_tapes_by_serial(&pattern)?, ctx.json)
        }
        FindTarget::TarfileName { pattern } => {
            debug!("Finding files named '{}'", pattern);
            display::display_files(&catalog.find_files_by_name(&pattern)?, ctx.json)
        }
    }
}
