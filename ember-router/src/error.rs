//! Error re-exports for the router crate

pub use ember_core::{EmberError, EmberResult};
