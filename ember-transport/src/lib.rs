//! Transport layer for Ember+
//!
//! This crate provides the TCP byte stream the protocol stack runs over,
//! behind a trait seam so tests can substitute in-memory streams.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{EmberError, EmberResult};
pub use stream::{ByteStream, Transport};
pub use tcp::{TcpSettings, TcpTransport};
