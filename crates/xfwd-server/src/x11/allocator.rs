//! Display allocation: find a free display port and write its authority file.
//!
//! The authority file is created before any port is tried and is fully
//! written before the listener is handed back, so callers never observe a
//! bound display without its credentials. Every failure path drops the
//! listener and deletes the file before returning.

use crate::config::X11Config;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use xfwd_core::{AuthorityRecord, ByteOrder, X11Request, XfwdError, XfwdResult};

/// A bound display listener plus the authority file describing it.
///
/// Consumed by [`super::X11Forwarder::start`], which owns both for the rest
/// of their lives.
#[derive(Debug)]
pub struct DisplayBinding {
    listener: TcpListener,
    authority: NamedTempFile,
    display_number: u16,
    port: u16,
    display_host: String,
}

impl DisplayBinding {
    pub fn display_number(&self) -> u16 {
        self.display_number
    }

    /// The port actually bound.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path to advertise as `XAUTHORITY`.
    pub fn authority_path(&self) -> &Path {
        self.authority.path()
    }

    /// Value to advertise as `DISPLAY`.
    pub fn display_env(&self, request: &X11Request) -> String {
        request.display_env(&self.display_host, self.display_number)
    }

    pub(super) fn into_parts(self) -> (TcpListener, NamedTempFile, u16) {
        (self.listener, self.authority, self.display_number)
    }
}

/// Allocates forwarded X displays on local TCP ports.
///
/// Concurrent allocations are not coordinated; two racing allocators rely on
/// the OS refusing the second bind of a port.
#[derive(Debug, Clone)]
pub struct DisplayAllocator {
    config: X11Config,
    byte_order: ByteOrder,
    authority_dir: PathBuf,
}

impl DisplayAllocator {
    pub fn new(config: X11Config) -> Self {
        let authority_dir = config
            .authority_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        Self {
            config,
            byte_order: ByteOrder::native(),
            authority_dir,
        }
    }

    /// Override the byte order used for the authority record family field.
    #[cfg(test)]
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Bind the first free display in the configured range and write the
    /// authority record for it.
    ///
    /// # Errors
    ///
    /// - [`XfwdError::PortExhaustion`] when every candidate port is taken.
    /// - [`XfwdError::InvalidHexCredential`] when the request's cookie is not hex.
    /// - [`XfwdError::HostResolution`] when the local host name is unavailable.
    /// - [`XfwdError::RecordWrite`] when the authority file cannot be written.
    pub async fn allocate(&self, request: &X11Request) -> XfwdResult<DisplayBinding> {
        let mut authority = tempfile::Builder::new()
            .prefix(".Xauthority")
            .tempfile_in(&self.authority_dir)
            .map_err(XfwdError::RecordWrite)?;

        let mut last_err = None;
        for attempt in 0..self.config.max_attempts {
            let Some((display_number, port)) = self.candidate(attempt) else {
                break;
            };
            let addr = format!("{}:{}", self.config.display_host, port);

            let listener = match TcpListener::bind(&addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    debug!(addr = %addr, error = %e, "display port unavailable");
                    last_err = Some(e);
                    continue;
                }
            };

            // Early returns drop the listener and the temp file, which
            // removes it from disk.
            let port = listener.local_addr().map(|a| a.port()).unwrap_or(port);
            let record = AuthorityRecord::for_request(request, &local_hostname()?, display_number)?;
            let buf = record.encode(self.byte_order)?;
            write_authority(&mut authority, &buf).map_err(XfwdError::RecordWrite)?;

            info!(
                display = display_number,
                addr = %addr,
                xauthority = %authority.path().display(),
                "x11 display allocated"
            );

            return Ok(DisplayBinding {
                listener,
                authority,
                display_number,
                port,
                display_host: self.config.display_host.clone(),
            });
        }

        let path = authority.path().to_path_buf();
        if let Err(e) = authority.close() {
            warn!(path = %path.display(), error = %e, "failed to remove authority file");
        }

        let attempts = self.config.max_attempts;
        warn!(attempts, "no free x11 display port");
        Err(XfwdError::PortExhaustion {
            attempts,
            source: last_err.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "empty display range")
            }),
        })
    }

    /// Display number and port for the given attempt, or `None` past `u16`.
    fn candidate(&self, attempt: u16) -> Option<(u16, u16)> {
        let display = self.config.display_offset.checked_add(attempt)?;
        let port = self.config.base_port.checked_add(display)?;
        Some((display, port))
    }
}

/// Write the record and restrict the file to its owner.
fn write_authority(file: &mut NamedTempFile, buf: &[u8]) -> std::io::Result<()> {
    let f = file.as_file_mut();
    f.set_len(0)?;
    f.write_all(buf)?;
    f.sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        f.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Host name recorded in the authority entry.
#[cfg(unix)]
pub fn local_hostname() -> XfwdResult<String> {
    nix::unistd::gethostname()
        .map_err(|e| XfwdError::HostResolution(e.to_string()))?
        .into_string()
        .map_err(|_| XfwdError::HostResolution("host name is not valid UTF-8".into()))
}

#[cfg(not(unix))]
pub fn local_hostname() -> XfwdResult<String> {
    std::env::var("COMPUTERNAME").map_err(|e| XfwdError::HostResolution(e.to_string()))
}
