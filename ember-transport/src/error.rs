//! Error re-exports for the transport crate

pub use ember_core::{EmberError, EmberResult};
