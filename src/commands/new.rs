//! New Command Handler
//!
//! Handles the `new` subcommand for creating catalog records by hand.

use super::Context;
use rust_mtar::catalog::{Catalog, NewQueuedFile, NewSegment, NewTape};
use rust_mtar::cli::NewRecord;
use rust_mtar::display;
use rust_mtar::error::{MtarError, Result};
use rust_mtar::utils;
use tracing::info;

pub async fn execute(ctx: &Context, record: NewRecord) -> Result<()> {
    let catalog = ctx.open_catalog()?;

    match record {
        NewRecord::Tape {
            manufacturer,
            model,
            generation,
            sn,
            barcode,
            ptime,
        } => {
            let tape = catalog.new_tape(&NewTape {
                manufacturer,
                model,
                generation,
                serial: sn,
                barcode,
                purchased: ptime,
            })?;
            info!("Created tape {} (id={})", tape.serial, tape.id);
            display::display_tapes(&[tape], ctx.json)
        }

        NewRecord::Tar {
            tape,
            num,
            stime,
            etime,
            access_cnt,
            options,
            uname,
        } => {
            let uname = match uname {
                Some(uname) => uname,
                None => utils::uname()?,
            };
            let segment = catalog.new_segment(
                &tape,
                &NewSegment {
                    number: num,
                    start_time: stime,
                    end_time: etime,
                    access_count: access_cnt,
                    block_offset: None,
                    options,
                    uname: Some(uname),
                },
            )?;
            info!("Created tar {} on tape {} (id={})", num, tape, segment.id);
            display::display_segments(&[segment], ctx.json)
        }

        NewRecord::File {
            tape,
            tar,
            fullpath,
            relpath,
            fname,
            sz,
            sha256,
        } => {
            let tape = catalog.resolve_tape(&tape)?;
            let segment = catalog.find_segment(&tape, tar)?;
            let file_name = match fname {
                Some(name) => name,
                None => fullpath
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .ok_or_else(|| {
                        MtarError::parameter_validation(format!(
                            "cannot take a file name from {}",
                            fullpath.display()
                        ))
                    })?,
            };

            let file = catalog.new_queued_file(
                &segment,
                &NewQueuedFile {
                    full_path: fullpath,
                    relative_path: relpath,
                    file_name,
                    size: sz,
                    sha256,
                },
            )?;
            info!("Created file record {} (id={})", file.full_path.display(), file.id);
            display::display_files(&[file], ctx.json)
        }
    }
}
