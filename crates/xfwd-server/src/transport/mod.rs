//! Session adapters implementing [`xfwd_core::SecureSession`].

pub mod direct;

pub use direct::DirectSession;
