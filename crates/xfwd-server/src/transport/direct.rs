//! Direct session: every `x11` channel is a plain TCP connection to a
//! configured display.
//!
//! Stands in for an encrypted session when running the forwarder against a
//! local X server, e.g. to check a client against `127.0.0.1:6000`.

use std::future::Future;
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::info;
use xfwd_core::{
    OpenedChannel, SecureSession, X11ChannelData, XfwdError, XfwdResult, X11_CHANNEL_TYPE,
};

pub struct DirectSession {
    /// `host:port` of the display to dial.
    target: String,
}

impl DirectSession {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    async fn open(&self, channel_type: &str, payload: Vec<u8>) -> XfwdResult<OpenedChannel> {
        if channel_type != X11_CHANNEL_TYPE {
            return Err(XfwdError::ChannelOpen(format!(
                "unsupported channel type: {channel_type}"
            )));
        }
        let origin = X11ChannelData::decode(&payload)?;

        let stream = TcpStream::connect(&self.target)
            .await
            .map_err(|e| XfwdError::ChannelOpen(format!("connect {}: {e}", self.target)))?;

        info!(
            display_addr = %self.target,
            origin = %origin.origin_addr,
            origin_port = origin.origin_port,
            "x11 channel opened"
        );

        // Plain TCP carries no channel requests; the sender is dropped so
        // the request stream reads as closed straight away.
        let (_requests_tx, requests) = mpsc::channel(1);

        Ok(OpenedChannel {
            stream: Box::new(stream),
            requests,
        })
    }
}

impl SecureSession for DirectSession {
    fn open_channel<'a>(
        &'a self,
        channel_type: &'a str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = XfwdResult<OpenedChannel>> + Send + 'a>> {
        Box::pin(self.open(channel_type, payload))
    }
}
