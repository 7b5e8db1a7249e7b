//! Taxonomy resolution pipeline
//!
//! # Stages
//!
//! ```text
//! Idle -> Connecting -> Downloading -> Extracting -> Parsing -> Ready -> Querying -> Done
//! ```
//!
//! `Failed` is reachable from every non-terminal stage. Each stage owns a band
//! of the overall progress fraction; the download band advances with the
//! bytes received.
//!
//! The pipeline runs synchronously on the calling thread. Cancellation is
//! checked at every stage boundary.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::archive;
use crate::config::ResolverConfig;
use crate::error::{ResolveError, TaxonomyError};
use crate::i18n::{Locale, Message};
use crate::index::{TaxonId, TaxonomyIndex};
use crate::parser::TaxdumpParser;
use crate::progress::{CancellationToken, ProgressSink, ScaledProgress};
use crate::transfer::{Connector, FtpConnector, TransferService};

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    Connecting,
    Downloading,
    Extracting,
    Parsing,
    Ready,
    Querying,
    Done,
    Failed,
}

impl Stage {
    /// Whether `next` directly follows `self`
    pub fn can_transition_to(self, next: Stage) -> bool {
        use Stage::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Idle, Connecting)
            | (Connecting, Downloading)
            | (Downloading, Extracting)
            | (Extracting, Parsing)
            | (Parsing, Ready)
            | (Ready, Querying)
            | (Querying, Done) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// Overall progress fraction at which the stage begins
    fn progress_start(self) -> f64 {
        match self {
            Stage::Idle | Stage::Connecting => 0.0,
            Stage::Downloading => 0.05,
            Stage::Extracting => 0.60,
            Stage::Parsing => 0.70,
            Stage::Ready => 0.95,
            Stage::Querying => 0.96,
            Stage::Done => 1.0,
            Stage::Failed => 0.0,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Connecting => "connecting",
            Stage::Downloading => "downloading",
            Stage::Extracting => "extracting",
            Stage::Parsing => "parsing",
            Stage::Ready => "ready",
            Stage::Querying => "querying",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Resolves descendant sets from the configured taxonomy dump
///
/// # Example
///
/// ```rust,no_run
/// use taxa_resolver::{Locale, LogProgress, ResolverConfig, TaxonomyResolver};
///
/// let resolver = TaxonomyResolver::new(ResolverConfig::default());
/// let hominidae = resolver.children(9604, &LogProgress, &Locale::english())?;
/// assert!(hominidae.contains(&9606));
/// # Ok::<(), taxa_resolver::ResolveError>(())
/// ```
pub struct TaxonomyResolver {
    config: ResolverConfig,
    transfer: TransferService,
}

impl TaxonomyResolver {
    /// Resolver fetching over FTP
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_connector(config, Arc::new(FtpConnector::new()))
    }

    /// Resolver fetching through another connector (e.g. a local mirror)
    pub fn with_connector(config: ResolverConfig, connector: Arc<dyn Connector>) -> Self {
        let transfer = TransferService::new(config.clone(), connector);
        Self { config, transfer }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Cache location of the configured archive
    pub fn cache_path(&self) -> PathBuf {
        self.transfer.archive_path()
    }

    /// All transitive descendants of `taxon_id`, excluding `taxon_id` itself
    ///
    /// An id absent from the dump yields an empty set, not an error.
    pub fn children(
        &self,
        taxon_id: TaxonId,
        sink: &dyn ProgressSink,
        locale: &Locale,
    ) -> Result<HashSet<TaxonId>, ResolveError> {
        self.children_with_cancel(taxon_id, sink, locale, &CancellationToken::new())
    }

    /// [`children`](Self::children) observing `token` at every stage boundary
    ///
    /// On cancellation the per-call working directory is removed and the
    /// persistent cache is left untouched.
    pub fn children_with_cancel(
        &self,
        taxon_id: TaxonId,
        sink: &dyn ProgressSink,
        locale: &Locale,
        token: &CancellationToken,
    ) -> Result<HashSet<TaxonId>, ResolveError> {
        let mut run = Run {
            stage: Stage::Idle,
            sink,
            locale,
            token,
        };

        match self.resolve(taxon_id, &mut run) {
            Ok(descendants) => Ok(descendants),
            Err(source) => {
                let stage = run.fail(&source);
                if matches!(source, TaxonomyError::Cancelled) {
                    info!("Resolution of taxon {} cancelled during {}", taxon_id, stage);
                } else {
                    warn!("Resolution of taxon {} failed during {}: {}", taxon_id, stage, source);
                }
                Err(ResolveError { stage, source })
            },
        }
    }

    fn resolve(&self, taxon_id: TaxonId, run: &mut Run<'_>) -> Result<HashSet<TaxonId>, TaxonomyError> {
        let index = self.load_index(run)?;

        run.enter(Stage::Querying)?;
        run.message(Message::Querying { taxon: taxon_id });
        let descendants = index.descendants(taxon_id);
        if !index.contains(taxon_id) && descendants.is_empty() {
            debug!("Taxon {} is not in the taxonomy", taxon_id);
        }

        run.enter(Stage::Done)?;
        run.message(Message::Done {
            taxon: taxon_id,
            count: descendants.len(),
        });
        Ok(descendants)
    }

    /// Scratch directory for one resolution, removed when dropped
    fn workspace(&self) -> std::io::Result<TempDir> {
        std::fs::create_dir_all(&self.config.cache_dir)?;
        tempfile::Builder::new()
            .prefix(".extract-")
            .tempdir_in(&self.config.cache_dir)
    }

    /// Runs the stages up to `Ready`; the working directory lives only for this call
    fn load_index(&self, run: &mut Run<'_>) -> Result<TaxonomyIndex, TaxonomyError> {
        run.enter(Stage::Connecting)?;
        run.message(Message::Connecting {
            host: self.transfer.host().to_string(),
        });
        let archive_path = self.transfer.archive_path();
        let mut session = if self.transfer.requires_session(&archive_path) {
            Some(self.transfer.connect(run.sink, run.locale, run.token)?)
        } else {
            debug!("Cached archive {} is usable, not connecting", archive_path.display());
            None
        };

        run.enter(Stage::Downloading)?;
        let band = ScaledProgress::new(
            run.sink,
            Stage::Downloading.progress_start(),
            Stage::Extracting.progress_start(),
        );
        let fetched = match session.as_mut() {
            Some(remote) => {
                let remote_path = self.config.remote_archive_path();
                let current =
                    self.transfer.is_cache_current(remote.as_mut(), remote_path, &archive_path);
                let result = match current {
                    Ok(true) => Ok(false),
                    Ok(false) => self
                        .transfer
                        .download(remote, remote_path, &archive_path, &band, run.locale, run.token)
                        .map(|_| true),
                    Err(e) => Err(e),
                };
                remote.close();
                result?
            },
            None => false,
        };
        if !fetched {
            run.message(Message::UsingCache {
                path: archive_path.clone(),
            });
        }

        run.enter(Stage::Extracting)?;
        let entry = self.config.nodes_entry_name();
        run.message(Message::Extracting {
            entry: entry.to_string(),
        });
        let workspace = self.workspace().map_err(|e| {
            TaxonomyError::extraction_io(&archive_path, "cannot create working directory", e)
        })?;
        let extracted = archive::extract(&archive_path, &[entry], workspace.path())?;
        let nodes_path = extracted.get(entry).cloned().ok_or_else(|| {
            TaxonomyError::extraction(&archive_path, format!("entry '{}' not extracted", entry))
        })?;

        run.enter(Stage::Parsing)?;
        run.message(Message::Parsing {
            entry: entry.to_string(),
        });
        let index = TaxdumpParser::new().parse(&nodes_path)?;
        drop(workspace);

        run.enter(Stage::Ready)?;
        run.message(Message::IndexReady { taxa: index.len() });
        Ok(index)
    }
}

/// Per-call pipeline state
struct Run<'a> {
    stage: Stage,
    sink: &'a dyn ProgressSink,
    locale: &'a Locale,
    token: &'a CancellationToken,
}

impl Run<'_> {
    /// Move to `next` after checking for cancellation
    fn enter(&mut self, next: Stage) -> Result<(), TaxonomyError> {
        if self.token.is_cancelled() {
            return Err(TaxonomyError::Cancelled);
        }
        if !self.stage.can_transition_to(next) {
            return Err(TaxonomyError::Config(format!(
                "invalid stage transition {} -> {}",
                self.stage, next
            )));
        }
        debug!("Stage {} -> {}", self.stage, next);
        self.stage = next;
        self.sink.advance(next.progress_start());
        Ok(())
    }

    /// Move to `Failed` and report `error`; returns the stage that failed
    fn fail(&mut self, error: &TaxonomyError) -> Stage {
        let failed = self.stage;
        if self.stage.can_transition_to(Stage::Failed) {
            debug!("Stage {} -> {}", self.stage, Stage::Failed);
            self.stage = Stage::Failed;
        }
        match error {
            TaxonomyError::Cancelled => self.message(Message::Cancelled),
            _ => self.message(Message::Failed { stage: failed }),
        }
        failed
    }

    fn message(&self, message: Message) {
        self.sink.set_message(&message.render(self.locale));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            Stage::Idle,
            Stage::Connecting,
            Stage::Downloading,
            Stage::Extracting,
            Stage::Parsing,
            Stage::Ready,
            Stage::Querying,
            Stage::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_failed_reachable_from_non_terminal_only() {
        for stage in [Stage::Idle, Stage::Downloading, Stage::Ready, Stage::Querying] {
            assert!(stage.can_transition_to(Stage::Failed));
        }
        assert!(!Stage::Done.can_transition_to(Stage::Failed));
        assert!(!Stage::Failed.can_transition_to(Stage::Connecting));
        assert!(Stage::Done.is_terminal());
    }

    #[test]
    fn test_stages_cannot_be_skipped() {
        assert!(!Stage::Idle.can_transition_to(Stage::Parsing));
        assert!(!Stage::Downloading.can_transition_to(Stage::Connecting));
        assert!(!Stage::Parsing.can_transition_to(Stage::Querying));
    }

    #[test]
    fn test_progress_bands_increase() {
        let order = [
            Stage::Connecting,
            Stage::Downloading,
            Stage::Extracting,
            Stage::Parsing,
            Stage::Ready,
            Stage::Querying,
            Stage::Done,
        ];
        for pair in order.windows(2) {
            assert!(pair[0].progress_start() < pair[1].progress_start());
        }
    }

    #[derive(Default)]
    struct Messages(std::sync::Mutex<Vec<String>>);

    impl ProgressSink for Messages {
        fn advance(&self, _fraction: f64) {}
        fn set_message(&self, text: &str) {
            self.0.lock().unwrap().push(text.to_string());
        }
    }

    #[test]
    fn test_fail_enters_failed_and_reports_failing_stage() {
        let sink = Messages::default();
        let locale = Locale::german();
        let token = CancellationToken::new();
        let mut run = Run {
            stage: Stage::Idle,
            sink: &sink,
            locale: &locale,
            token: &token,
        };
        run.enter(Stage::Connecting).unwrap();
        run.enter(Stage::Downloading).unwrap();

        let failed = run.fail(&TaxonomyError::Config("boom".to_string()));

        assert_eq!(failed, Stage::Downloading);
        assert_eq!(run.stage, Stage::Failed);
        assert!(run.stage.is_terminal());
        assert!(run.enter(Stage::Extracting).is_err());
        assert_eq!(
            sink.0.lock().unwrap().last().map(String::as_str),
            Some("Fehlgeschlagen beim Herunterladen")
        );
    }

    #[test]
    fn test_fail_on_cancellation_reports_cancelled() {
        let sink = Messages::default();
        let locale = Locale::english();
        let token = CancellationToken::new();
        let mut run = Run {
            stage: Stage::Idle,
            sink: &sink,
            locale: &locale,
            token: &token,
        };

        assert_eq!(run.fail(&TaxonomyError::Cancelled), Stage::Idle);
        assert_eq!(run.stage, Stage::Failed);
        assert_eq!(*sink.0.lock().unwrap(), vec!["Cancelled".to_string()]);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Downloading.to_string(), "downloading");
        assert_eq!(Stage::Failed.to_string(), "failed");
    }
}
