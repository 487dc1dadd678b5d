//! Rust implementation of the Ember+ device-control protocol
//!
//! Ember+ carries a provider's device tree (nodes, parameters, matrices,
//! functions) to consumers over a framed TCP stream. This library is
//! organized as a workspace with one crate per protocol layer:
//!
//! - `ember-core`: Error handling and shared types
//! - `ember-ber`: EmBER encoding, the tree model and the incremental
//!   decoder
//! - `ember-s101`: S101 framing (escaping, CRC, packages, keep-alives)
//! - `ember-transport`: Byte stream abstraction and TCP transport
//! - `ember-glow`: The typed Glow schema over EmBER trees
//! - `ember-router`: The provider (device tree, path resolution, matrix
//!   state, sessions, listener)

// Re-export core types
pub use ember_core::{ber_code, EmberError, EmberResult};

// Re-export the encoding layers
pub mod ber {
    pub use ember_ber::*;
}

pub mod s101 {
    pub use ember_s101::*;
}

pub mod transport {
    pub use ember_transport::*;
}

pub mod glow {
    pub use ember_glow::*;
}

// Re-export the provider API
pub mod router {
    pub use ember_router::*;
}
