//! Core types and error handling for the Ember+ protocol stack
//!
//! This crate holds the error taxonomy shared by all layers. Protocol logic
//! lives in the layer crates (`ember-ber`, `ember-s101`, `ember-transport`,
//! `ember-glow`, `ember-router`).

pub mod error;

pub use error::{ber_code, EmberError, EmberResult};
