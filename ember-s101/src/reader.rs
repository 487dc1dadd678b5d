//! Incoming package reassembly
//!
//! `FramingReader` sits above the frame receiver: it deframes wire bytes,
//! decodes package headers, reassembles multi-package Ember payloads and
//! surfaces keep-alives as ready-to-send reply frames.

use bytes::{BufMut, BytesMut};

use crate::error::{EmberError, EmberResult};
use crate::frame::{self, FrameReceiver, FramingStats};
use crate::package::{self, command, PackageHeader};

/// Events produced by the framing reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramingEvent {
    /// A complete logical Ember payload, reassembled across packages
    EmberPayload(Vec<u8>),
    /// The peer asked for a keep-alive; `reply` is the wire-ready response
    /// frame to send back
    KeepAliveRequest { slot: u8, reply: Vec<u8> },
    /// The peer answered our keep-alive
    KeepAliveResponse { slot: u8 },
}

/// Package-level receive pipeline for one connection
pub struct FramingReader {
    receiver: FrameReceiver,
    assembly: BytesMut,
    in_message: bool,
}

impl Default for FramingReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FramingReader {
    pub fn new() -> Self {
        Self {
            receiver: FrameReceiver::new(),
            assembly: BytesMut::new(),
            in_message: false,
        }
    }

    pub fn stats(&self) -> &FramingStats {
        self.receiver.stats()
    }

    /// Consume one wire byte.
    ///
    /// # Returns
    /// `Ok(Some(event))` when this byte completed a package that finishes a
    /// message or carries a keep-alive. Framing errors discard the current
    /// frame only.
    pub fn feed(&mut self, byte: u8) -> EmberResult<Option<FramingEvent>> {
        match self.receiver.receive(byte)? {
            Some(package) => self.on_package(&package),
            None => Ok(None),
        }
    }

    /// Consume a slice, collecting every completed event
    pub fn feed_all(&mut self, data: &[u8]) -> EmberResult<Vec<FramingEvent>> {
        let mut events = Vec::new();
        for &byte in data {
            if let Some(event) = self.feed(byte)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn on_package(&mut self, data: &[u8]) -> EmberResult<Option<FramingEvent>> {
        let (header, offset) = PackageHeader::decode(data)?;
        match header.command {
            command::KEEPALIVE_REQUEST => Ok(Some(FramingEvent::KeepAliveRequest {
                slot: header.slot,
                reply: frame::encode_frame(&package::keep_alive_response(header.slot)),
            })),
            command::KEEPALIVE_RESPONSE => {
                Ok(Some(FramingEvent::KeepAliveResponse { slot: header.slot }))
            }
            command::EMBER => {
                if header.is_first() {
                    if self.in_message && !self.assembly.is_empty() {
                        log::warn!(
                            "discarding {} bytes of unterminated message",
                            self.assembly.len()
                        );
                    }
                    self.assembly.clear();
                }
                self.in_message = true;
                if !header.is_empty() {
                    self.assembly.put_slice(&data[offset..]);
                }
                if header.is_last() {
                    self.in_message = false;
                    let payload = self.assembly.split().to_vec();
                    Ok(Some(FramingEvent::EmberPayload(payload)))
                } else {
                    Ok(None)
                }
            }
            other => Err(EmberError::Framing(format!(
                "unknown package command 0x{:02X}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{encode_message, WriterConfig, MIN_PACKAGE_LENGTH};

    #[test]
    fn test_reassembly_across_packages() {
        // payload much larger than one package, with boundary-hostile bytes
        let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let config = WriterConfig {
            max_package_length: MIN_PACKAGE_LENGTH,
            ..WriterConfig::default()
        };
        let frames = encode_message(&config, &payload).unwrap();
        assert!(frames.len() > 3);

        let mut reader = FramingReader::new();
        let mut events = Vec::new();
        for frame in &frames {
            events.extend(reader.feed_all(frame).unwrap());
        }
        assert_eq!(events, vec![FramingEvent::EmberPayload(payload)]);
    }

    #[test]
    fn test_single_package_payload() {
        let frames = encode_message(&WriterConfig::default(), &[0x60, 0x80, 0x00, 0x00]).unwrap();
        assert_eq!(frames.len(), 1);

        let mut reader = FramingReader::new();
        let events = reader.feed_all(&frames[0]).unwrap();
        assert_eq!(
            events,
            vec![FramingEvent::EmberPayload(vec![0x60, 0x80, 0x00, 0x00])]
        );
    }

    #[test]
    fn test_keep_alive_request_yields_reply_frame() {
        let wire = frame::encode_frame(&package::keep_alive_request(7));
        let mut reader = FramingReader::new();
        let events = reader.feed_all(&wire).unwrap();

        let FramingEvent::KeepAliveRequest { slot, reply } = &events[0] else {
            panic!("expected a keep-alive request event");
        };
        assert_eq!(*slot, 7);

        // the prebuilt reply round-trips as a keep-alive response
        let mut peer = FramingReader::new();
        let responses = peer.feed_all(reply).unwrap();
        assert_eq!(responses, vec![FramingEvent::KeepAliveResponse { slot: 7 }]);
    }

    #[test]
    fn test_empty_message_yields_empty_payload() {
        let frames = encode_message(&WriterConfig::default(), &[]).unwrap();
        let mut reader = FramingReader::new();
        let events = reader.feed_all(&frames[0]).unwrap();
        assert_eq!(events, vec![FramingEvent::EmberPayload(Vec::new())]);
    }

    #[test]
    fn test_new_first_package_discards_stale_partial() {
        let config = WriterConfig {
            max_package_length: MIN_PACKAGE_LENGTH,
            ..WriterConfig::default()
        };
        let big = vec![0x55u8; 200];
        let frames = encode_message(&config, &big).unwrap();

        let mut reader = FramingReader::new();
        // deliver only the first package of a fragmented message
        reader.feed_all(&frames[0]).unwrap();

        // a fresh complete message supersedes the stale partial
        let second = encode_message(&WriterConfig::default(), &[1, 2, 3]).unwrap();
        let events = reader.feed_all(&second[0]).unwrap();
        assert_eq!(events, vec![FramingEvent::EmberPayload(vec![1, 2, 3])]);
    }
}
