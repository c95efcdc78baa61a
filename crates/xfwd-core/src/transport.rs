//! Abstract secure-session boundary for X11 forwarding.
//!
//! The secure transport (key exchange, encryption, channel framing) lives
//! elsewhere. The forwarding engine only needs to open typed sub-channels on
//! an established session and read/write the resulting byte streams.

use crate::codec::{parse_string, parse_u32, put_string, put_u32};
use crate::error::{XfwdError, XfwdResult};
use std::future::Future;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Channel type tag for forwarded X11 connections.
pub const X11_CHANNEL_TYPE: &str = "x11";

/// A bidirectional sub-channel byte stream.
///
/// `AsyncWrite::poll_shutdown` must close only the write direction
/// (channel EOF), leaving the read direction open.
pub trait ChannelStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ChannelStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// An out-of-band request sent by the peer on an open channel.
#[derive(Debug)]
pub struct ChannelRequest {
    pub request_type: String,
    pub want_reply: bool,
    pub payload: Vec<u8>,
    /// Answer channel, present when `want_reply` is set.
    pub reply: Option<oneshot::Sender<bool>>,
}

impl ChannelRequest {
    /// A request that expects an answer, plus the end the answer arrives on.
    pub fn with_reply(
        request_type: impl Into<String>,
        payload: Vec<u8>,
    ) -> (Self, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        let req = Self {
            request_type: request_type.into(),
            want_reply: true,
            payload,
            reply: Some(tx),
        };
        (req, rx)
    }
}

/// A freshly opened sub-channel.
pub struct OpenedChannel {
    pub stream: Box<dyn ChannelStream>,
    /// Out-of-band requests for this channel. Must be drained, see
    /// [`discard_requests`].
    pub requests: mpsc::Receiver<ChannelRequest>,
}

/// An established secure session that can open sub-channels.
///
/// `open_channel` takes `&self` and is called concurrently from one task per
/// forwarded connection; implementations must be safe to share.
pub trait SecureSession: Send + Sync {
    fn open_channel<'a>(
        &'a self,
        channel_type: &'a str,
        payload: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = XfwdResult<OpenedChannel>> + Send + 'a>>;
}

/// Drain and drop every out-of-band request on a channel, answering `false`
/// to those that want a reply.
///
/// Returns once the session closes the request stream.
pub async fn discard_requests(mut requests: mpsc::Receiver<ChannelRequest>) {
    while let Some(req) = requests.recv().await {
        debug!(
            request_type = %req.request_type,
            want_reply = req.want_reply,
            "discarding channel request"
        );
        if req.want_reply {
            if let Some(reply) = req.reply {
                let _ = reply.send(false);
            }
        }
    }
}

/// Open payload of an `x11` channel: where the local connection came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X11ChannelData {
    pub origin_addr: String,
    pub origin_port: u32,
}

impl X11ChannelData {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + self.origin_addr.len());
        put_string(&mut buf, &self.origin_addr);
        put_u32(&mut buf, self.origin_port);
        buf
    }

    pub fn decode(payload: &[u8]) -> XfwdResult<Self> {
        let malformed = || XfwdError::MalformedPayload("x11 channel open data".into());

        let (origin_addr, rest) = parse_string(payload).ok_or_else(malformed)?;
        let (origin_port, _) = parse_u32(rest).ok_or_else(malformed)?;
        Ok(Self {
            origin_addr,
            origin_port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_data_layout() {
        let data = X11ChannelData {
            origin_addr: "127.0.0.1".into(),
            origin_port: 51234,
        };
        let buf = data.encode();
        assert_eq!(&buf[..4], &[0, 0, 0, 9]);
        assert_eq!(&buf[4..13], b"127.0.0.1");
        assert_eq!(&buf[13..], &51234u32.to_be_bytes());
        assert_eq!(X11ChannelData::decode(&buf).unwrap(), data);
    }

    #[test]
    fn channel_data_truncated() {
        assert!(X11ChannelData::decode(&[0, 0, 0, 1, b'x', 0]).is_err());
    }

    #[tokio::test]
    async fn discard_requests_drains_until_closed() {
        let (tx, rx) = mpsc::channel(4);
        let drain = tokio::spawn(discard_requests(rx));

        for i in 0..3 {
            tx.send(ChannelRequest {
                request_type: format!("req-{i}"),
                want_reply: false,
                payload: Vec::new(),
                reply: None,
            })
            .await
            .unwrap();
        }

        let (req, answer) = ChannelRequest::with_reply("env", b"DISPLAY".to_vec());
        tx.send(req).await.unwrap();
        assert!(!answer.await.unwrap());

        drop(tx);
        drain.await.unwrap();
    }

    #[test]
    fn with_reply_wants_reply() {
        let (req, _answer) = ChannelRequest::with_reply("keepalive@openssh.com", Vec::new());
        assert!(req.want_reply);
        assert!(req.reply.is_some());
        assert_eq!(req.request_type, "keepalive@openssh.com");
    }
}
