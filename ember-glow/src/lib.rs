//! Glow schema layer for Ember+
//!
//! This crate interprets and constructs the application-level Glow
//! elements (nodes, parameters, matrices, functions, commands and their
//! qualified counterparts) as typed views over EmBER trees.

pub mod error;
pub mod types;
pub mod tags;
pub mod element;
pub mod matrix;

pub use element::{
    is_root, root_collection, root_elements, root_of, GlowCommand, GlowElement, GlowFunction,
    GlowNode, GlowParameter, GlowQualifiedFunction, GlowQualifiedNode, GlowQualifiedParameter,
};
pub use error::{ber_code, EmberError, EmberResult};
pub use matrix::{GlowConnection, GlowMatrix, GlowQualifiedMatrix};
pub use types::{
    command_number, glow_type, ConnectionDisposition, ConnectionOperation, MatrixType,
    ParameterAccess, ROOT_TAG_NUMBER,
};
