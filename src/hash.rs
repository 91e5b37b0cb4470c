// src/hash.rs

//! SHA-256 verification of tarballs before ingestion
//!
//! The staging pipeline records a SHA-256 digest for every uploaded tarball.
//! When the caller passes that digest along, the tarball is checked before
//! anything is read from it, so a truncated or corrupted download never
//! reaches the repository.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Length of a SHA-256 digest in hex characters
pub const SHA256_HEX_LEN: usize = 64;

/// Compute the SHA-256 digest of everything `reader` yields, as lowercase hex
pub fn sha256_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute the SHA-256 digest of the file at `path`
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::archive(path, e))?;
    sha256_reader(&mut file).map_err(|e| Error::archive(path, e))
}

/// Check that `expected` is a well-formed SHA-256 hex digest
pub fn parse_sha256(expected: &str) -> Result<String> {
    let expected = expected.trim();
    if expected.len() != SHA256_HEX_LEN || !expected.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::Usage(format!(
            "'{}' is not a valid SHA-256 digest (expected {} hex characters)",
            expected, SHA256_HEX_LEN
        )));
    }
    Ok(expected.to_ascii_lowercase())
}

/// Verify the tarball at `path` against an expected SHA-256 digest
pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let expected = parse_sha256(expected)?;
    let started = Instant::now();
    let actual = sha256_file(path)?;
    info!(
        "Computed checksum of {} in {:.2} seconds",
        path.display(),
        started.elapsed().as_secs_f64()
    );
    debug!("Checksum of {}: {}", path.display(), actual);

    if actual != expected {
        return Err(Error::ChecksumMismatch {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(())
}
