//! External archiver invocation.

use crate::error::{MtarError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Streams the files listed in a manifest onto the device.
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Run with `base_dir` as working directory so manifest entries resolve against it.
    async fn archive(&self, manifest: &Path, base_dir: &Path, options: &[String]) -> Result<()>;
}

/// `tar vcf <device> [options] --verbatim-files-from -T <manifest>`
pub struct TarArchiver {
    tool: String,
    device: String,
}

impl TarArchiver {
    pub fn new(tool: &str, device: &str) -> Self {
        Self {
            tool: tool.to_string(),
            device: device.to_string(),
        }
    }

    pub fn arguments(&self, manifest: &Path, options: &[String]) -> Vec<String> {
        let mut args = vec!["vcf".to_string(), self.device.clone()];
        args.extend(options.iter().cloned());
        args.push("--verbatim-files-from".to_string());
        args.push("-T".to_string());
        args.push(manifest.to_string_lossy().to_string());
        args
    }
}

#[async_trait]
impl Archiver for TarArchiver {
    async fn archive(&self, manifest: &Path, base_dir: &Path, options: &[String]) -> Result<()> {
        let args = self.arguments(manifest, options);
        let command_line = format!("{} {}", self.tool, args.join(" "));
        info!("Running `{}` in {}", command_line, base_dir.display());

        // The child gets its own working directory; ours is never touched.
        let status = Command::new(&self.tool)
            .args(&args)
            .current_dir(base_dir)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| MtarError::archiver(format!("failed to run `{}`: {}", command_line, e)))?;

        if !status.success() {
            warn!("`{}` exited with {}", command_line, status);
            return Err(MtarError::archiver(format!(
                "`{}` exited with {}",
                command_line, status
            )));
        }

        debug!("Archiver finished: {}", status);
        Ok(())
    }
}
