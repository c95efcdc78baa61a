//! xfwd-core: Shared library for X11 forwarding.
//!
//! Provides the binary payload codec for session requests (`pty-req`,
//! `x11-req`, `window-change`), the X authority record encoding, and the
//! abstract secure-session boundary the forwarding engine opens channels on.

pub mod codec;
pub mod error;
pub mod requests;
pub mod transport;
pub mod xauth;

// Re-export commonly used items at crate root.
pub use error::{XfwdError, XfwdResult};
pub use requests::{PtyRequest, RequestKind, Window, X11Request};
pub use transport::{
    discard_requests, ChannelRequest, ChannelStream, OpenedChannel, SecureSession, X11ChannelData,
    X11_CHANNEL_TYPE,
};
pub use xauth::{AuthorityRecord, ByteOrder, FAMILY_LOCAL};
