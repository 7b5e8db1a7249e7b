//! Checksum utilities for cache keys and archive verification

use sha2::{Digest, Sha256};
use std::io::{self, Read};
use std::path::Path;

/// Digest algorithms used by the workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    /// SHA-256, used for deterministic cache keys
    Sha256,
    /// MD5, the algorithm NCBI publishes `.md5` sidecar files with
    Md5,
}

/// Compute the lowercase hex digest of an in-memory buffer
pub fn compute_bytes_checksum(data: &[u8], algorithm: ChecksumAlgorithm) -> String {
    match algorithm {
        ChecksumAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
        ChecksumAlgorithm::Md5 => format!("{:x}", md5::compute(data)),
    }
}

/// Compute checksum for any readable source
pub fn compute_checksum<R: Read>(reader: &mut R, algorithm: ChecksumAlgorithm) -> io::Result<String> {
    let mut buffer = [0u8; 8192];

    match algorithm {
        ChecksumAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            loop {
                let bytes_read = reader.read(&mut buffer)?;
                if bytes_read == 0 {
                    break;
                }
                hasher.update(&buffer[..bytes_read]);
            }
            Ok(hex::encode(hasher.finalize()))
        },
        ChecksumAlgorithm::Md5 => {
            let mut context = md5::Context::new();
            loop {
                let bytes_read = reader.read(&mut buffer)?;
                if bytes_read == 0 {
                    break;
                }
                context.consume(&buffer[..bytes_read]);
            }
            Ok(format!("{:x}", context.compute()))
        },
    }
}

/// Compute checksum for a file
pub fn compute_file_checksum(
    path: impl AsRef<Path>,
    algorithm: ChecksumAlgorithm,
) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    compute_checksum(&mut file, algorithm)
}

/// Extract the digest from a `md5sum`-style sidecar (`<hex>  <file name>`)
///
/// Returns `None` when the first token is not a 32 character hex string.
pub fn parse_md5_sidecar(content: &str) -> Option<String> {
    let digest = content.split_whitespace().next()?;
    if digest.len() == 32 && digest.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(digest.to_ascii_lowercase())
    } else {
        None
    }
}
