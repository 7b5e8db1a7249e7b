//! Local directory standing in for the remote host
//!
//! Remote paths are resolved below the mirror root, so a mirror laid out as
//! `<root>/pub/taxonomy/taxdump.tar.gz` serves the default archive path.
//! Useful for air-gapped installs and for tests.

use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{Connector, RemoteSession};
use crate::config::ResolverConfig;
use crate::error::{Result, TaxonomyError};

/// Serves archives from a local directory
#[derive(Debug, Clone)]
pub struct MirrorConnector {
    root: PathBuf,
    host: String,
}

impl MirrorConnector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let host = format!("mirror{}", root.display());
        Self { root, host }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Connector for MirrorConnector {
    fn host<'a>(&'a self, _config: &'a ResolverConfig) -> &'a str {
        &self.host
    }

    fn connect(&self, _config: &ResolverConfig) -> Result<Box<dyn RemoteSession>> {
        if !self.root.is_dir() {
            return Err(TaxonomyError::connection(
                &self.host,
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("mirror directory {} does not exist", self.root.display()),
                ),
            ));
        }
        debug!("Using mirror at {}", self.root.display());
        Ok(Box::new(MirrorSession {
            root: self.root.clone(),
        }))
    }
}

struct MirrorSession {
    root: PathBuf,
}

impl MirrorSession {
    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl RemoteSession for MirrorSession {
    fn size(&mut self, path: &str) -> Option<u64> {
        fs::metadata(self.resolve(path)).ok().map(|m| m.len())
    }

    fn modified(&mut self, path: &str) -> Option<DateTime<Utc>> {
        fs::metadata(self.resolve(path))
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }

    fn fetch(&mut self, path: &str) -> Result<Vec<u8>> {
        fs::read(self.resolve(path)).map_err(|e| TaxonomyError::transfer(path, e))
    }

    fn retrieve(
        &mut self,
        path: &str,
        consume: &mut dyn FnMut(&mut dyn Read) -> io::Result<u64>,
    ) -> Result<u64> {
        let file = File::open(self.resolve(path)).map_err(|e| TaxonomyError::transfer(path, e))?;
        let mut reader = BufReader::new(file);
        consume(&mut reader).map_err(|e| TaxonomyError::transfer(path, e))
    }
}
