//! List Command Handler

use super::Context;
use rust_mtar::catalog::{Catalog, FileFilter};
use rust_mtar::cli::ListTarget;
use rust_mtar::display;
use rust_mtar::error::Result;

pub async fn execute(ctx: &Context, target: ListTarget) -> Result<()> {
    let catalog = ctx.open_catalog()?;

    match target {
        ListTarget::Tapes => display::display_tapes(&catalog.list_tapes()?, ctx.json),
        ListTarget::Tars { tape } => {
            let tape = tape.map(|id| catalog.resolve_tape(&id)).transpose()?;
            display::display_segments(&catalog.list_segments(tape.as_ref())?, ctx.json)
        }
        ListTarget::Files { tape, tar, tarnum } => {
            let tape = tape.map(|id| catalog.resolve_tape(&id)).transpose()?;
            let filter = FileFilter {
                tape_id: tape.map(|t| t.id),
                segment_id: tar,
                segment_number: tarnum,
            };
            display::display_files(&catalog.list_files(&filter)?, ctx.json)
        }
    }
}
