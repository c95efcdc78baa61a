//! X11 forwarding engine: accept local display connections and relay each
//! one over its own `x11` channel on the secure session.
//!
//! The accept loop runs until [`X11Forwarder::close`] is called, the handle
//! is dropped, or `accept` fails. On the way out it drops the listener and
//! deletes the authority file; that is the only place the file is removed.

use super::allocator::DisplayBinding;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use xfwd_core::{
    discard_requests, SecureSession, X11ChannelData, XfwdError, XfwdResult, X11_CHANNEL_TYPE,
};

/// Handle to a running forwarding engine.
pub struct X11Forwarder {
    /// Cancel signal for the accept loop; dropping it also stops the loop.
    cancel_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
    display_number: u16,
    active: Arc<AtomicUsize>,
}

impl X11Forwarder {
    /// Start accepting on the binding's listener.
    ///
    /// Takes ownership of the listener and the authority file. `session` is
    /// shared by every connection task to open channels.
    pub fn start(binding: DisplayBinding, session: Arc<dyn SecureSession>) -> Self {
        let (listener, authority, display_number) = binding.into_parts();
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>(1);
        let active = Arc::new(AtomicUsize::new(0));

        let loop_active = active.clone();
        let task = tokio::spawn(async move {
            Self::accept_loop(listener, cancel_rx, session, loop_active, display_number).await;
            remove_authority(authority, display_number);
        });

        Self {
            cancel_tx,
            task,
            display_number,
            active,
        }
    }

    pub fn display_number(&self) -> u16 {
        self.display_number
    }

    /// Connections whose local socket has not been released yet.
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop accepting. Connections already being relayed drain on their own.
    pub async fn close(&self) {
        let _ = self.cancel_tx.send(()).await;
    }

    /// Wait for the accept loop to finish its teardown.
    pub async fn wait(self) -> XfwdResult<()> {
        let Self { cancel_tx, task, .. } = self;
        // Keep the sender alive so waiting alone never cancels.
        let result = task.await;
        drop(cancel_tx);
        result.map_err(|e| XfwdError::Io(std::io::Error::other(e)))
    }

    async fn accept_loop(
        listener: TcpListener,
        mut cancel_rx: mpsc::Receiver<()>,
        session: Arc<dyn SecureSession>,
        active: Arc<AtomicUsize>,
        display_number: u16,
    ) {
        info!(display = display_number, "x11 forwarding started");

        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    debug!(display = display_number, "x11 listener closed");
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let count = active.fetch_add(1, Ordering::SeqCst) + 1;
                            debug!(display = display_number, peer = %peer, active = count, "x11 connection accepted");
                            let session = session.clone();
                            let active = active.clone();
                            tokio::spawn(async move {
                                // The local socket is dropped when this returns.
                                if let Err(e) = forward_connection(stream, peer, session.as_ref()).await {
                                    warn!(display = display_number, peer = %peer, error = %e, "x11 connection failed");
                                }
                                active.fetch_sub(1, Ordering::SeqCst);
                            });
                        }
                        Err(e) => {
                            warn!(display = display_number, error = %e, "x11 accept failed");
                            break;
                        }
                    }
                }
            }
        }

        info!(display = display_number, "x11 forwarding stopped");
    }
}

fn remove_authority(authority: NamedTempFile, display_number: u16) {
    let path = authority.path().to_path_buf();
    match authority.close() {
        Ok(()) => debug!(display = display_number, path = %path.display(), "authority file removed"),
        Err(e) => warn!(
            display = display_number,
            path = %path.display(),
            error = %e,
            "failed to remove authority file"
        ),
    }
}

/// Relay one local connection over a new `x11` channel.
///
/// Each direction copies until EOF or error, then half-closes its write
/// side. Both directions finish before the socket and the channel drop.
async fn forward_connection(
    stream: TcpStream,
    peer: SocketAddr,
    session: &dyn SecureSession,
) -> XfwdResult<()> {
    let origin = X11ChannelData {
        origin_addr: peer.ip().to_string(),
        origin_port: u32::from(peer.port()),
    };

    let channel = session
        .open_channel(X11_CHANNEL_TYPE, origin.encode())
        .await?;
    tokio::spawn(discard_requests(channel.requests));

    let (mut local_read, mut local_write) = stream.into_split();
    let (mut chan_read, mut chan_write) = tokio::io::split(channel.stream);

    let upstream = async {
        let result = tokio::io::copy(&mut local_read, &mut chan_write).await;
        let _ = chan_write.shutdown().await;
        result
    };
    let downstream = async {
        let result = tokio::io::copy(&mut chan_read, &mut local_write).await;
        let _ = local_write.shutdown().await;
        result
    };

    let (up, down) = tokio::join!(upstream, downstream);
    let up = up.map_err(XfwdError::StreamRelay)?;
    let down = down.map_err(XfwdError::StreamRelay)?;
    debug!(peer = %peer, sent = up, received = down, "x11 connection closed");
    Ok(())
}
