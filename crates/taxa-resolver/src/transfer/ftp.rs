//! FTP access to the taxonomy dump host
//!
//! Sessions log in (anonymously by default), switch to Extended Passive Mode
//! (EPSV) for NAT/firewall compatibility and transfer in binary mode.

use chrono::{DateTime, Utc};
use std::io::{self, Read};
use std::net::ToSocketAddrs;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Mode};
use tracing::{debug, warn};

use super::{Connector, RemoteSession};
use crate::config::ResolverConfig;
use crate::error::{Result, TaxonomyError};

/// Connects to the configured FTP server
#[derive(Debug, Clone, Copy, Default)]
pub struct FtpConnector;

impl FtpConnector {
    pub fn new() -> Self {
        Self
    }
}

fn ftp_io(e: FtpError) -> io::Error {
    match e {
        FtpError::ConnectionError(inner) => inner,
        other => io::Error::other(other),
    }
}

impl Connector for FtpConnector {
    fn connect(&self, config: &ResolverConfig) -> Result<Box<dyn RemoteSession>> {
        let host = config.host();
        let connection_err = |e: io::Error| TaxonomyError::connection(host, e);

        debug!("Connecting to FTP server: {}:{}", host, config.ftp_port);
        let addr = (host, config.ftp_port)
            .to_socket_addrs()
            .map_err(connection_err)?
            .next()
            .ok_or_else(|| {
                connection_err(io::Error::new(io::ErrorKind::NotFound, "host has no address"))
            })?;

        let mut stream = FtpStream::connect_timeout(addr, config.connect_timeout())
            .map_err(|e| connection_err(ftp_io(e)))?;

        // Use Extended Passive Mode - better for NAT/Docker environments
        stream.set_mode(Mode::ExtendedPassive);

        debug!("Logging in as: {}", config.ftp_username);
        stream
            .login(&config.ftp_username, &config.ftp_password)
            .map_err(|e| connection_err(ftp_io(e)))?;
        stream
            .transfer_type(FileType::Binary)
            .map_err(|e| connection_err(ftp_io(e)))?;

        Ok(Box::new(FtpSession { stream }))
    }
}

struct FtpSession {
    stream: FtpStream,
}

impl RemoteSession for FtpSession {
    fn size(&mut self, path: &str) -> Option<u64> {
        match self.stream.size(path) {
            Ok(size) => Some(size as u64),
            Err(e) => {
                debug!("SIZE {} unavailable: {}", path, e);
                None
            },
        }
    }

    fn modified(&mut self, path: &str) -> Option<DateTime<Utc>> {
        match self.stream.mdtm(path) {
            Ok(time) => Some(time.and_utc()),
            Err(e) => {
                debug!("MDTM {} unavailable: {}", path, e);
                None
            },
        }
    }

    fn fetch(&mut self, path: &str) -> Result<Vec<u8>> {
        self.stream
            .retr_as_buffer(path)
            .map(|cursor| cursor.into_inner())
            .map_err(|e| TaxonomyError::transfer(path, ftp_io(e)))
    }

    fn retrieve(
        &mut self,
        path: &str,
        consume: &mut dyn FnMut(&mut dyn Read) -> io::Result<u64>,
    ) -> Result<u64> {
        debug!("Downloading file: {}", path);
        let mut data = self
            .stream
            .retr_as_stream(path)
            .map_err(|e| TaxonomyError::transfer(path, ftp_io(e)))?;

        let received = consume(&mut data).map_err(|e| TaxonomyError::transfer(path, e))?;

        self.stream
            .finalize_retr_stream(data)
            .map_err(|e| TaxonomyError::transfer(path, ftp_io(e)))?;
        Ok(received)
    }

    fn close(&mut self) {
        if let Err(e) = self.stream.quit() {
            warn!("Failed to quit FTP session gracefully: {}", e);
        }
    }
}
