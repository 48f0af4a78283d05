//! Advisory per-device lock.
//!
//! Two invocations writing to the same drive would interleave file marks.
//! The lock is an exclusive `flock(2)` on a file named after the device and
//! is released when the guard is dropped or the process exits.

use crate::error::{MtarError, Result};
use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct DeviceLock {
    file: File,
    path: PathBuf,
}

impl DeviceLock {
    pub fn acquire(lock_dir: &Path, device: &str) -> Result<Self> {
        let path = lock_dir.join(lock_file_name(device));
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
            Ok(()) => {}
            Err(Errno::EWOULDBLOCK) => {
                let holder = std::fs::read_to_string(&path).unwrap_or_default();
                return Err(MtarError::Locked(format!(
                    "{} is in use by another process (pid {})",
                    device,
                    holder.trim()
                )));
            }
            Err(e) => {
                return Err(MtarError::Io(std::io::Error::from_raw_os_error(e as i32)));
            }
        }

        file.set_len(0)?;
        write!(file, "{}", std::process::id())?;
        file.flush()?;
        debug!("Acquired device lock {}", path.display());

        Ok(Self { file, path })
    }
}

impl Drop for DeviceLock {
    fn drop(&mut self) {
        let _ = flock(self.file.as_raw_fd(), FlockArg::Unlock);
        debug!("Released device lock {}", self.path.display());
    }
}

fn lock_file_name(device: &str) -> String {
    let key: String = device
        .trim_start_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("rustmtar-{key}.lock")
}
