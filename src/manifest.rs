//! Manifest staging.
//!
//! The archiver reads the exact list of relative paths to write from a
//! temporary file. The file is removed when the `Manifest` is dropped.

use crate::catalog::QueuedFile;
use crate::error::{MtarError, Result};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug)]
pub struct Manifest {
    file: NamedTempFile,
    entries: usize,
}

impl Manifest {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

/// Write one relative path per line, in the order given.
///
/// `files` must already be sorted by absolute path. The returned manifest is
/// flushed and rewound.
pub fn stage(files: &[QueuedFile]) -> Result<Manifest> {
    let mut file = tempfile::Builder::new()
        .prefix("rustmtar-manifest-")
        .suffix(".lst")
        .tempfile()?;

    {
        let mut writer = BufWriter::new(file.as_file_mut());
        for queued in files {
            let relative = queued.relative_path.to_str().ok_or_else(|| {
                MtarError::parameter_validation(format!(
                    "relative path is not valid UTF-8: {}",
                    queued.relative_path.display()
                ))
            })?;
            if relative.contains('\n') {
                return Err(MtarError::parameter_validation(format!(
                    "relative path contains a newline and cannot be listed: {:?}",
                    relative
                )));
            }
            writeln!(writer, "{}", relative)?;
        }
        writer.flush()?;
    }

    file.as_file_mut().sync_all()?;
    file.as_file_mut().seek(SeekFrom::Start(0))?;
    debug!(
        "Staged manifest {} with {} entries",
        file.path().display(),
        files.len()
    );

    Ok(Manifest {
        file,
        entries: files.len(),
    })
}
