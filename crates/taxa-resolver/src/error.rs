//! Error types for taxonomy resolution

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::service::Stage;

/// Result type alias for resolver components
pub type Result<T> = std::result::Result<T, TaxonomyError>;

/// Failure raised by one component of the resolution pipeline
#[derive(Error, Debug)]
pub enum TaxonomyError {
    /// Host unreachable, anonymous login refused or handshake timed out
    #[error("Cannot connect to {host}: {source}")]
    Connection {
        host: String,
        #[source]
        source: io::Error,
    },

    /// I/O or protocol fault while streaming a remote file
    #[error("Transfer of '{path}' failed: {source}")]
    Transfer {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Archive could not be opened or a requested entry is absent
    #[error("Cannot extract from '{}': {reason}", .archive.display())]
    Extraction {
        archive: PathBuf,
        reason: String,
        #[source]
        source: Option<io::Error>,
    },

    /// Malformed hierarchy record; the whole parse is abandoned
    #[error("Malformed record at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// Cooperative cancellation observed at a stage boundary
    #[error("Resolution cancelled")]
    Cancelled,

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TaxonomyError {
    pub(crate) fn connection(host: impl Into<String>, source: io::Error) -> Self {
        Self::Connection {
            host: host.into(),
            source,
        }
    }

    pub(crate) fn transfer(path: impl Into<String>, source: io::Error) -> Self {
        Self::Transfer {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn extraction(archive: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            archive: archive.into(),
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn extraction_io(
        archive: impl Into<PathBuf>,
        reason: impl Into<String>,
        source: io::Error,
    ) -> Self {
        Self::Extraction {
            archive: archive.into(),
            reason: reason.into(),
            source: Some(source),
        }
    }

    pub(crate) fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }

    /// Whether retrying the same operation could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Transfer { .. })
    }
}

/// The single failure surfaced by [`crate::TaxonomyResolver::children`]
///
/// `stage` is the pipeline state that was active when the failure happened.
#[derive(Error, Debug)]
#[error("Taxonomy resolution failed at stage '{stage}': {source}")]
pub struct ResolveError {
    pub stage: Stage,
    #[source]
    pub source: TaxonomyError,
}

impl ResolveError {
    /// Whether the failure was a cancellation rather than a fault
    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, TaxonomyError::Cancelled)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_resolve_error_names_stage_and_keeps_cause() {
        let err = ResolveError {
            stage: Stage::Downloading,
            source: TaxonomyError::transfer(
                "/pub/taxonomy/taxdump.tar.gz",
                io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"),
            ),
        };

        let text = err.to_string();
        assert!(text.contains("downloading"), "{text}");
        assert!(text.contains("taxdump.tar.gz"), "{text}");

        let cause = err.source().unwrap();
        assert!(cause.source().unwrap().to_string().contains("reset by peer"));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(TaxonomyError::connection("h", io::Error::other("x")).is_retryable());
        assert!(!TaxonomyError::parse(3, "bad id").is_retryable());
        assert!(!TaxonomyError::Cancelled.is_retryable());
    }
}
