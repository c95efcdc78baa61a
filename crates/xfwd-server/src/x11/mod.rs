//! X11 module — display allocation and connection forwarding.
//!
//! Handles an `x11-req` once the outer protocol layer has decoded it into an
//! [`X11Request`](xfwd_core::X11Request).
//!
//! # Submodule Architecture
//!
//! - **[`allocator`]** — The [`DisplayAllocator`] scans a bounded range of
//!   TCP ports (`base_port + display_offset + n`), binds the first free one,
//!   and writes an authority file carrying the client's cookie for that
//!   display. The result is a [`DisplayBinding`].
//!
//! - **[`forwarder`]** — The [`X11Forwarder`] takes ownership of a
//!   [`DisplayBinding`], accepts local display connections, and relays each
//!   one over a fresh `x11` channel opened on the secure session. It deletes
//!   the authority file when it stops.
//!
//! # Data Flow
//!
//! ```text
//! x11-req payload
//!   → X11Request::parse (xfwd-core)
//!   → DisplayAllocator::allocate
//!       → TcpListener::bind (first free port)
//!       → AuthorityRecord::for_request + encode → authority file
//!   → DISPLAY / XAUTHORITY advertised to the session environment
//!   → X11Forwarder::start
//!       → accept loop → per connection: SecureSession::open_channel("x11")
//!           → local→channel copy, then channel half-close
//!           → channel→local copy, then TCP half-close
//! ```

pub mod allocator;
pub mod forwarder;

pub use allocator::DisplayAllocator;
pub use forwarder::X11Forwarder;
