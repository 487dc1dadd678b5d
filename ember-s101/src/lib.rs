//! S101 framing layer for Ember+
//!
//! This crate provides the byte-oriented transport framing that carries
//! EmBER payloads: escaping/CRC frame encoding and decoding, the package
//! header with multi-package fragmentation and reassembly, and keep-alive
//! handling.

pub mod error;
pub mod crc;
pub mod frame;
pub mod package;
pub mod reader;
pub mod writer;

pub use crc::FrameCrc;
pub use error::{EmberError, EmberResult};
pub use frame::{
    encode_frame, encode_frame_raw, FrameReceiver, FramingErrorKind, FramingStats,
};
pub use package::{
    keep_alive_request, keep_alive_response, PackageHeader, DTD_GLOW, GLOW_DTD_VERSION,
};
pub use reader::{FramingEvent, FramingReader};
pub use writer::{encode_message, PackageWriter, WriterConfig};
