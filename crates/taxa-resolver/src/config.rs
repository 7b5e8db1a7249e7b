//! Resolver configuration
//!
//! Supplies the remote location of the taxonomy dump, the archive entry holding
//! the hierarchy records, and the transfer/caching knobs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TaxonomyError};

/// Default NCBI FTP host
pub const DEFAULT_FTP_HOST: &str = "ftp.ncbi.nlm.nih.gov";

/// Default path of the classic taxonomy dump on the NCBI FTP server
pub const DEFAULT_ARCHIVE_PATH: &str = "/pub/taxonomy/taxdump.tar.gz";

/// Archive entry holding the `tax_id | parent tax_id | ...` records
pub const DEFAULT_NODES_ENTRY: &str = "nodes.dmp";

/// When an already cached archive is considered usable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    /// Any non-empty cached file is reused without contacting the server
    #[default]
    Reuse,
    /// Compare against the `<archive>.md5` sidecar published next to the archive
    VerifyMd5,
    /// Re-download when the remote modification time is newer than the cached file
    RefreshIfNewer,
}

impl std::str::FromStr for CachePolicy {
    type Err = TaxonomyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "reuse" => Ok(CachePolicy::Reuse),
            "verify-md5" | "md5" => Ok(CachePolicy::VerifyMd5),
            "refresh-if-newer" | "newer" => Ok(CachePolicy::RefreshIfNewer),
            other => Err(TaxonomyError::Config(format!("Unknown cache policy: {}", other))),
        }
    }
}

impl std::fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CachePolicy::Reuse => write!(f, "reuse"),
            CachePolicy::VerifyMd5 => write!(f, "verify-md5"),
            CachePolicy::RefreshIfNewer => write!(f, "refresh-if-newer"),
        }
    }
}

/// Configuration for the taxonomy resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// FTP server hostname
    pub ftp_host: String,
    /// FTP port (default: 21)
    pub ftp_port: u16,
    /// FTP username (default: "anonymous")
    pub ftp_username: String,
    /// FTP password (default: "anonymous")
    pub ftp_password: String,
    /// Path of the compressed taxonomy dump on the server
    pub remote_archive_path: String,
    /// Archive entry holding the hierarchy records
    pub nodes_entry_name: String,
    /// Directory holding cached archives
    pub cache_dir: PathBuf,
    /// Connection timeout in seconds (default: 30)
    pub connect_timeout_secs: u64,
    /// Attempts per connect/download before giving up (default: 3)
    pub max_retries: u32,
    /// Base delay between attempts; multiplied by the attempt number
    pub retry_delay_secs: u64,
    /// Staleness policy for cached archives
    pub cache_policy: CachePolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ftp_host: DEFAULT_FTP_HOST.to_string(),
            ftp_port: 21,
            ftp_username: "anonymous".to_string(),
            ftp_password: "anonymous".to_string(),
            remote_archive_path: DEFAULT_ARCHIVE_PATH.to_string(),
            nodes_entry_name: DEFAULT_NODES_ENTRY.to_string(),
            cache_dir: default_cache_dir(),
            connect_timeout_secs: 30,
            max_retries: 3,
            retry_delay_secs: 5,
            cache_policy: CachePolicy::Reuse,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("taxa"))
        .unwrap_or_else(|| PathBuf::from(".taxa-cache"))
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables on top of the defaults
    ///
    /// Environment variables:
    /// - `TAXA_FTP_HOST`, `TAXA_FTP_PORT`, `TAXA_FTP_USER`, `TAXA_FTP_PASSWORD`
    /// - `TAXA_ARCHIVE_PATH`, `TAXA_NODES_ENTRY`
    /// - `TAXA_CACHE_DIR`, `TAXA_CACHE_POLICY`
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env()
    }

    /// Read a TOML file; keys that are absent keep their defaults
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TaxonomyError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| TaxonomyError::Config(format!("Invalid {}: {}", path.display(), e)))
    }

    /// Override fields with any `TAXA_*` variables that are set
    pub fn merge_env(mut self) -> Result<Self> {
        if let Ok(host) = std::env::var("TAXA_FTP_HOST") {
            self.ftp_host = host;
        }
        if let Ok(port) = std::env::var("TAXA_FTP_PORT") {
            self.ftp_port = port
                .parse()
                .map_err(|_| TaxonomyError::Config(format!("Invalid TAXA_FTP_PORT: {}", port)))?;
        }
        if let Ok(user) = std::env::var("TAXA_FTP_USER") {
            self.ftp_username = user;
        }
        if let Ok(password) = std::env::var("TAXA_FTP_PASSWORD") {
            self.ftp_password = password;
        }
        if let Ok(path) = std::env::var("TAXA_ARCHIVE_PATH") {
            self.remote_archive_path = path;
        }
        if let Ok(entry) = std::env::var("TAXA_NODES_ENTRY") {
            self.nodes_entry_name = entry;
        }
        if let Ok(dir) = std::env::var("TAXA_CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Ok(policy) = std::env::var("TAXA_CACHE_POLICY") {
            self.cache_policy = policy.parse()?;
        }
        Ok(self)
    }

    pub fn with_ftp_host(mut self, host: impl Into<String>) -> Self {
        self.ftp_host = host.into();
        self
    }

    pub fn with_remote_archive_path(mut self, path: impl Into<String>) -> Self {
        self.remote_archive_path = path.into();
        self
    }

    pub fn with_nodes_entry_name(mut self, entry: impl Into<String>) -> Self {
        self.nodes_entry_name = entry.into();
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    pub fn with_connection_timeout(mut self, timeout_secs: u64) -> Self {
        self.connect_timeout_secs = timeout_secs;
        self
    }

    /// Set retry attempts and base delay
    pub fn with_retries(mut self, max_retries: u32, delay_secs: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_secs = delay_secs;
        self
    }

    /// Remote host holding the taxonomy dump
    pub fn host(&self) -> &str {
        &self.ftp_host
    }

    /// Path of the compressed dump on the remote host
    pub fn remote_archive_path(&self) -> &str {
        &self.remote_archive_path
    }

    /// Archive entry holding the hierarchy records
    pub fn nodes_entry_name(&self) -> &str {
        &self.nodes_entry_name
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
