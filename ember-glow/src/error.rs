//! Error re-exports for the Glow crate

pub use ember_core::{ber_code, EmberError, EmberResult};
