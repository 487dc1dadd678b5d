//! EmBER encoding for the Ember+ protocol
//!
//! This crate provides the BER/TLV wire format used by Ember+: tags,
//! lengths, primitive value codecs, the in-memory tree model and an
//! incremental push-byte decoder.
//!
//! Every node on the wire is a pair of TLVs: an outer TLV carrying the
//! node's tag and an inner TLV carrying its type. Containers are written
//! with indefinite lengths and closed by zero terminators; the decoder
//! additionally accepts definite-length forms produced by third-party
//! encoders.

pub mod error;
pub mod tag;
pub mod types;
pub mod encoding;
pub mod decoding;
pub mod node;
pub mod reader;

pub use error::{ber_code, EmberError, EmberResult};
pub use tag::{BerClass, BerLength, BerTag};
pub use types::{ber_type, EmberTime, Value};
pub use node::{ContainerKind, EmberContainer, EmberNode, NodeKind};
pub use reader::AsyncBerReader;
