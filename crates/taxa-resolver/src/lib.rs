//! Taxonomy resolution
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Answers "which taxa descend from X" against an NCBI-style taxonomy dump:
//!
//! - **Transfer**: fetches the dump archive over FTP (or from a local mirror)
//!   into a deterministic cache location
//! - **Archive**: extracts the hierarchy entry (`nodes.dmp`) from tar.gz/zip
//! - **Parser**: reads `tax_id | parent tax_id | ...` records
//! - **Index**: parent/child maps with cycle-safe traversal
//! - **Service**: the staged pipeline behind [`TaxonomyResolver::children`]
//!
//! # Example
//!
//! ```no_run
//! use taxa_resolver::{Locale, MirrorConnector, NoProgress, ResolverConfig, TaxonomyResolver};
//! use std::sync::Arc;
//!
//! let resolver = TaxonomyResolver::with_connector(
//!     ResolverConfig::default(),
//!     Arc::new(MirrorConnector::new("/srv/ncbi-mirror")),
//! );
//! let descendants = resolver.children(4930, &NoProgress, &Locale::german())?;
//! println!("{} taxa below Saccharomyces", descendants.len());
//! # Ok::<(), taxa_resolver::ResolveError>(())
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod i18n;
pub mod index;
pub mod parser;
pub mod progress;
pub mod service;
pub mod transfer;

pub use config::{CachePolicy, ResolverConfig};
pub use error::{ResolveError, Result, TaxonomyError};
pub use i18n::{Language, Locale, Message};
pub use index::{TaxonId, TaxonomyIndex, ROOT_TAXON};
pub use parser::TaxdumpParser;
pub use progress::{CancellationToken, LogProgress, NoProgress, ProgressSink};
pub use service::{Stage, TaxonomyResolver};
pub use transfer::{Connector, FtpConnector, MirrorConnector, RemoteSession, TransferService};
