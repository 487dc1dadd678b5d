//! Error re-exports for the BER layer

pub use ember_core::{ber_code, EmberError, EmberResult};
