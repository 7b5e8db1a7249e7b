//! Remote archive transfer with a local cache
//!
//! The archive is fetched once per `(host, path)` into
//! `cache_dir/<host>/<key>-<file name>` and reused on later resolutions.
//! Downloads are written to a temporary file next to the cache entry and
//! renamed into place only after the transfer completed, so an interrupted
//! download never leaves a truncated archive behind.
//!
//! The protocol side is abstracted behind [`Connector`] / [`RemoteSession`]:
//! [`FtpConnector`] talks to an FTP server, [`MirrorConnector`] serves the
//! same layout from a local directory.

mod ftp;
mod mirror;

pub use ftp::FtpConnector;
pub use mirror::MirrorConnector;

use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use taxa_common::checksum::{self, ChecksumAlgorithm};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::{CachePolicy, ResolverConfig};
use crate::error::{Result, TaxonomyError};
use crate::i18n::{Locale, Message};
use crate::progress::{CancellationToken, ProgressSink};

const CHUNK_SIZE: usize = 64 * 1024;

/// Bytes between two download status messages
const MESSAGE_INTERVAL_BYTES: u64 = 4 * 1024 * 1024;

/// Opens sessions against a remote archive host
pub trait Connector: Send + Sync {
    /// Host name used in messages and cache paths
    fn host<'a>(&'a self, config: &'a ResolverConfig) -> &'a str {
        config.host()
    }

    fn connect(&self, config: &ResolverConfig) -> Result<Box<dyn RemoteSession>>;
}

/// An open, authenticated session
pub trait RemoteSession {
    /// Remote file size, if the server reports it
    fn size(&mut self, path: &str) -> Option<u64>;

    /// Remote modification time, if the server reports it
    fn modified(&mut self, path: &str) -> Option<DateTime<Utc>>;

    /// Read a small remote file (e.g. a checksum sidecar) into memory
    fn fetch(&mut self, path: &str) -> Result<Vec<u8>>;

    /// Stream a remote file through `consume`
    fn retrieve(
        &mut self,
        path: &str,
        consume: &mut dyn FnMut(&mut dyn Read) -> io::Result<u64>,
    ) -> Result<u64>;

    /// End the session; failures are logged, not returned
    fn close(&mut self) {}
}

/// Fetches the configured archive into the local cache
pub struct TransferService {
    config: ResolverConfig,
    connector: Arc<dyn Connector>,
}

impl TransferService {
    pub fn new(config: ResolverConfig, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    pub fn host(&self) -> &str {
        self.connector.host(&self.config)
    }

    /// Cache location of the configured archive
    pub fn archive_path(&self) -> PathBuf {
        self.local_path(self.config.remote_archive_path())
    }

    /// Cache location of `remote_path` on this service's host
    pub fn local_path(&self, remote_path: &str) -> PathBuf {
        local_path(&self.config.cache_dir, self.host(), remote_path)
    }

    /// Whether the cache state requires talking to the server
    ///
    /// Under [`CachePolicy::Reuse`] a non-empty cached archive is used as is.
    pub fn requires_session(&self, local: &Path) -> bool {
        self.config.cache_policy != CachePolicy::Reuse || !is_usable(local)
    }

    /// Open a session, retrying with linear backoff
    pub fn connect(
        &self,
        sink: &dyn ProgressSink,
        locale: &Locale,
        token: &CancellationToken,
    ) -> Result<Box<dyn RemoteSession>> {
        let max = self.config.max_retries.max(1);
        let mut attempt = 1;

        loop {
            check_cancelled(token)?;
            debug!("Connection attempt {}/{} to {}", attempt, max, self.host());

            match self.connector.connect(&self.config) {
                Ok(session) => return Ok(session),
                Err(e) if attempt < max && e.is_retryable() => {
                    let delay = self.retry_delay(attempt);
                    warn!(
                        "Connection attempt {}/{} failed: {}. Retrying in {}s...",
                        attempt,
                        max,
                        e,
                        delay.as_secs()
                    );
                    sink.set_message(&Message::Retrying { attempt, max }.render(locale));
                    pause(delay, token)?;
                    attempt += 1;
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Whether the cached copy of `remote` at `local` can be used without downloading
    pub fn is_cache_current(
        &self,
        session: &mut dyn RemoteSession,
        remote: &str,
        local: &Path,
    ) -> Result<bool> {
        if !is_usable(local) {
            return Ok(false);
        }

        match self.config.cache_policy {
            CachePolicy::Reuse => Ok(true),
            CachePolicy::VerifyMd5 => {
                let Some(expected) = expected_md5(session, remote) else {
                    warn!("No checksum published for {}, keeping cached copy", remote);
                    return Ok(true);
                };
                let actual = checksum::compute_file_checksum(local, ChecksumAlgorithm::Md5)
                    .map_err(|e| TaxonomyError::transfer(remote, e))?;
                if actual != expected {
                    info!("Cached {} does not match published checksum", local.display());
                }
                Ok(actual == expected)
            },
            CachePolicy::RefreshIfNewer => {
                let Some(remote_time) = session.modified(remote) else {
                    debug!("No modification time for {}, keeping cached copy", remote);
                    return Ok(true);
                };
                let local_time = fs::metadata(local)
                    .and_then(|m| m.modified())
                    .map(DateTime::<Utc>::from)
                    .map_err(|e| TaxonomyError::transfer(remote, e))?;
                if remote_time > local_time {
                    info!("Remote {} changed at {}, refreshing cache", remote, remote_time);
                }
                Ok(remote_time <= local_time)
            },
        }
    }

    /// Download `remote` to `local`, retrying failed attempts
    ///
    /// A failed attempt reconnects before the next one. Returns the number of
    /// bytes written.
    pub fn download(
        &self,
        session: &mut Box<dyn RemoteSession>,
        remote: &str,
        local: &Path,
        sink: &dyn ProgressSink,
        locale: &Locale,
        token: &CancellationToken,
    ) -> Result<u64> {
        let expected_md5 = match self.config.cache_policy {
            CachePolicy::VerifyMd5 => expected_md5(session.as_mut(), remote),
            _ => None,
        };
        let max = self.config.max_retries.max(1);
        let mut attempt = 1;

        sink.set_message(&Message::Downloading { path: remote.to_string() }.render(locale));

        loop {
            check_cancelled(token)?;
            debug!("Download attempt {}/{} for: {}", attempt, max, remote);

            match download_once(
                session.as_mut(),
                remote,
                local,
                expected_md5.as_deref(),
                sink,
                locale,
                token,
            ) {
                Ok(bytes) => {
                    info!("Successfully downloaded {} ({} bytes)", remote, bytes);
                    return Ok(bytes);
                },
                Err(e) if attempt < max && e.is_retryable() && !token.is_cancelled() => {
                    let delay = self.retry_delay(attempt);
                    warn!(
                        "Download attempt {}/{} failed: {}. Retrying in {}s...",
                        attempt,
                        max,
                        e,
                        delay.as_secs()
                    );
                    sink.set_message(&Message::Retrying { attempt, max }.render(locale));
                    session.close();
                    pause(delay, token)?;
                    *session = self.connect(sink, locale, token)?;
                    attempt += 1;
                },
                Err(e) => return Err(e),
            }
        }
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.config.retry_delay_secs * attempt as u64)
    }
}

fn download_once(
    session: &mut dyn RemoteSession,
    remote: &str,
    local: &Path,
    expected_md5: Option<&str>,
    sink: &dyn ProgressSink,
    locale: &Locale,
    token: &CancellationToken,
) -> Result<u64> {
    let io_err = |e: io::Error| TaxonomyError::transfer(remote, e);

    let parent = local.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(io_err)?;
    let mut staging = NamedTempFile::new_in(parent).map_err(io_err)?;

    let total = session.size(remote);
    let started = Instant::now();
    let mut next_message = 0;

    let received = session.retrieve(remote, &mut |reader: &mut dyn Read| -> io::Result<u64> {
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut received = 0u64;
        loop {
            if token.is_cancelled() {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "download cancelled"));
            }
            let n = match reader.read(&mut buffer) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if n == 0 {
                break;
            }
            staging.write_all(&buffer[..n])?;
            received += n as u64;

            if let Some(total) = total.filter(|t| *t > 0) {
                sink.advance(received as f64 / total as f64);
            }
            if received >= next_message {
                sink.set_message(&Message::DownloadProgress { received, total }.render(locale));
                next_message = received + MESSAGE_INTERVAL_BYTES;
            }
        }
        Ok(received)
    });

    check_cancelled(token)?;
    let received = received?;

    if let Some(total) = total {
        if received != total {
            return Err(io_err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("received {} of {} bytes", received, total),
            )));
        }
    }
    sink.advance(1.0);
    sink.set_message(&Message::DownloadProgress { received, total: Some(received) }.render(locale));

    staging.flush().map_err(io_err)?;
    if let Some(expected) = expected_md5 {
        let actual = checksum::compute_file_checksum(staging.path(), ChecksumAlgorithm::Md5)
            .map_err(io_err)?;
        if actual != expected {
            return Err(io_err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("checksum mismatch: expected {}, got {}", expected, actual),
            )));
        }
        debug!("Checksum verified for {}", remote);
    }

    staging.persist(local).map_err(|e| io_err(e.error))?;
    debug!(
        "Stored {} at {} in {:.1}s",
        remote,
        local.display(),
        started.elapsed().as_secs_f64()
    );
    Ok(received)
}

/// Remote path of the MD5 sidecar NCBI publishes next to `remote`
pub fn checksum_path(remote: &str) -> String {
    format!("{}.md5", remote)
}

/// Digest published in the checksum sidecar, if any
fn expected_md5(session: &mut dyn RemoteSession, remote: &str) -> Option<String> {
    let sidecar = checksum_path(remote);
    match session.fetch(&sidecar) {
        Ok(bytes) => {
            let digest = checksum::parse_md5_sidecar(&String::from_utf8_lossy(&bytes));
            if digest.is_none() {
                warn!("Unreadable checksum file {}", sidecar);
            }
            digest
        },
        Err(e) => {
            debug!("Checksum file {} unavailable: {}", sidecar, e);
            None
        },
    }
}

/// Cache location for `remote_path` on `host`
///
/// `cache_dir/<host>/<first 16 hex digits of sha256(host + path)>-<file name>`;
/// the hash keeps archives with equal file names on one host apart.
pub fn local_path(cache_dir: &Path, host: &str, remote_path: &str) -> PathBuf {
    let key = checksum::compute_bytes_checksum(
        format!("{}{}", host, remote_path).as_bytes(),
        ChecksumAlgorithm::Sha256,
    );
    let file_name = remote_path
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("archive");

    cache_dir
        .join(sanitize(host))
        .join(format!("{}-{}", &key[..16], sanitize(file_name)))
}

fn sanitize(component: &str) -> String {
    let cleaned: String = component
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    match cleaned.trim_matches('.') {
        "" => "_".to_string(),
        _ => cleaned,
    }
}

/// An empty cache entry counts as absent
fn is_usable(local: &Path) -> bool {
    fs::metadata(local).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

fn check_cancelled(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        Err(TaxonomyError::Cancelled)
    } else {
        Ok(())
    }
}

/// Sleep for `delay`, waking early on cancellation
fn pause(delay: Duration, token: &CancellationToken) -> Result<()> {
    const TICK: Duration = Duration::from_millis(100);
    let deadline = Instant::now() + delay;
    loop {
        check_cancelled(token)?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        std::thread::sleep(TICK.min(deadline - now));
    }
}
