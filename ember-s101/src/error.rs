//! Error re-exports for the S101 crate

pub use ember_core::{EmberError, EmberResult};
