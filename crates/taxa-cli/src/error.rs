//! Error types for the taxa CLI

use taxa_resolver::{ResolveError, TaxonomyError};
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// User-facing CLI failures
#[derive(Error, Debug)]
pub enum CliError {
    /// The resolution pipeline failed; the message names the stage
    #[error("{0}")]
    Resolve(#[from] ResolveError),

    /// Configuration file, environment or option is invalid
    #[error("Configuration error: {0}. Check --config, --cache-policy and the TAXA_* environment variables.")]
    Config(String),

    /// The background resolution task did not finish
    #[error("Resolution task failed: {0}")]
    Worker(String),

    /// Writing results failed
    #[error("Output failed: {0}")]
    Io(#[from] std::io::Error),

    /// JSON rendering failed
    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<TaxonomyError> for CliError {
    fn from(err: TaxonomyError) -> Self {
        match err {
            TaxonomyError::Config(message) => CliError::Config(message),
            other => CliError::Config(other.to_string()),
        }
    }
}

impl CliError {
    /// Whether the user interrupted the run
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CliError::Resolve(e) if e.is_cancelled())
    }

    /// Process exit status; an interrupted run exits like SIGINT
    pub fn exit_code(&self) -> i32 {
        if self.is_cancelled() {
            130
        } else {
            1
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use taxa_resolver::Stage;

    #[test]
    fn test_cancelled_run_exits_like_sigint() {
        let err = CliError::from(ResolveError {
            stage: Stage::Downloading,
            source: TaxonomyError::Cancelled,
        });
        assert!(err.is_cancelled());
        assert_eq!(err.exit_code(), 130);
    }

    #[test]
    fn test_other_failures_exit_with_one() {
        let err = CliError::from(ResolveError {
            stage: Stage::Parsing,
            source: TaxonomyError::Config("bad".to_string()),
        });
        assert!(!err.is_cancelled());
        assert_eq!(err.exit_code(), 1);
        assert_eq!(CliError::Worker("panicked".to_string()).exit_code(), 1);
    }
}
