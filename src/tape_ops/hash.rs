//! Hash Calculation Module
//!
//! Streaming SHA-256 of queued files, recorded in the catalog next to each
//! file so a later restore can be checked.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Blockwise SHA-256 calculator
pub struct Sha256Calculator {
    hasher: Sha256,
    bytes_processed: u64,
}

impl Default for Sha256Calculator {
    fn default() -> Self {
        Self::new()
    }
}

impl Sha256Calculator {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
            bytes_processed: 0,
        }
    }

    pub fn propagate(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes_processed += data.len() as u64;
    }

    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }

    /// Lowercase hex digest
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Hash a file without loading it into memory.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, File::open(path)?);
    let mut calculator = Sha256Calculator::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        calculator.propagate(&buffer[..read]);
    }

    Ok(calculator.finish())
}
