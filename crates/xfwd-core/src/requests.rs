//! Session request payloads: `pty-req`, `x11-req` and `window-change`.
//!
//! Each decoder reads its fields greedily in a fixed order and ignores any
//! trailing bytes, so newer peers may append fields without breaking us.

use crate::codec::{parse_bool, parse_string, parse_u32};
use crate::error::{XfwdError, XfwdResult};
use std::fmt;
use std::str::FromStr;

/// Request types carried in session control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Pty,
    X11,
    WindowChange,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Pty => "pty-req",
            RequestKind::X11 => "x11-req",
            RequestKind::WindowChange => "window-change",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = XfwdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pty-req" => Ok(RequestKind::Pty),
            "x11-req" => Ok(RequestKind::X11),
            "window-change" => Ok(RequestKind::WindowChange),
            other => Err(XfwdError::MalformedPayload(format!(
                "unknown request type: {other}"
            ))),
        }
    }
}

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub width: u32,
    pub height: u32,
}

impl Window {
    /// Decode a `window-change` payload.
    ///
    /// A zero width or height is rejected: an empty window is not a resize.
    pub fn parse_change(payload: &[u8]) -> XfwdResult<Self> {
        let malformed = || XfwdError::MalformedPayload(RequestKind::WindowChange.to_string());

        let (width, rest) = parse_u32(payload).ok_or_else(malformed)?;
        if width < 1 {
            return Err(malformed());
        }
        let (height, _) = parse_u32(rest).ok_or_else(malformed)?;
        if height < 1 {
            return Err(malformed());
        }
        Ok(Self { width, height })
    }
}

/// A decoded `pty-req` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyRequest {
    /// Terminal type, e.g. `xterm-256color`.
    pub term: String,
    pub window: Window,
}

impl PtyRequest {
    pub fn parse(payload: &[u8]) -> XfwdResult<Self> {
        let malformed = || XfwdError::MalformedPayload(RequestKind::Pty.to_string());

        let (term, rest) = parse_string(payload).ok_or_else(malformed)?;
        let (width, rest) = parse_u32(rest).ok_or_else(malformed)?;
        let (height, _) = parse_u32(rest).ok_or_else(malformed)?;
        Ok(Self {
            term,
            window: Window { width, height },
        })
    }
}

/// A decoded `x11-req` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X11Request {
    /// Forward only a single connection.
    pub single_connection: bool,
    /// Authentication protocol name, usually `MIT-MAGIC-COOKIE-1`.
    pub auth_protocol: String,
    /// Hex-encoded authentication cookie chosen by the client.
    pub auth_data: String,
    pub screen_number: u32,
}

impl X11Request {
    pub fn parse(payload: &[u8]) -> XfwdResult<Self> {
        let malformed = || XfwdError::MalformedPayload(RequestKind::X11.to_string());

        let (single_connection, rest) = parse_bool(payload).ok_or_else(malformed)?;
        let (auth_protocol, rest) = parse_string(rest).ok_or_else(malformed)?;
        let (auth_data, rest) = parse_string(rest).ok_or_else(malformed)?;
        let (screen_number, _) = parse_u32(rest).ok_or_else(malformed)?;
        Ok(Self {
            single_connection,
            auth_protocol,
            auth_data,
            screen_number,
        })
    }

    /// The `DISPLAY` value for a forwarded environment, e.g. `localhost:10.0`.
    pub fn display_env(&self, host: &str, display_number: u16) -> String {
        format!("{host}:{display_number}.{}", self.screen_number)
    }
}
