//! Taxa Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Ambient utilities shared by the taxa workspace members:
//!
//! - **Logging**: tracing subscriber setup (console, rolling file, JSON)
//! - **Checksums**: SHA-256 / MD5 digests for cache keys and archive integrity
//!
//! # Example
//!
//! ```no_run
//! use taxa_common::checksum::{compute_file_checksum, ChecksumAlgorithm};
//! use taxa_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     let digest = compute_file_checksum("taxdump.tar.gz", ChecksumAlgorithm::Md5)?;
//!     tracing::info!(%digest, "archive digest");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod logging;
