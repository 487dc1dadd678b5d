//! Incremental push-byte BER decoder
//!
//! `AsyncBerReader` consumes one byte at a time and materializes a complete
//! [`EmberNode`] tree once the root closes. Each in-progress container is a
//! frame on an explicit stack; a frame is popped only when its declared
//! length is exhausted or its indefinite-length terminator is observed.
//!
//! Recovery discipline: after surfacing any error the reader has already
//! reset itself to a clean idle state. Callers never need to reset it
//! explicitly; the byte that produced the error and all buffered partial
//! state are discarded.

use crate::decoding;
use crate::error::{ber_code, EmberError, EmberResult};
use crate::node::{ContainerKind, EmberContainer, EmberNode};
use crate::tag::{BerClass, BerTag};
use crate::types::{ber_type, Value};

const MAX_NESTING_DEPTH: usize = 64;

/// Decoder states, advanced one input byte at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// Expecting a tag preamble octet (idle when the stack is empty)
    Tag,
    /// Reading base-128 tag-number continuation bytes
    TagContinuation,
    /// Expecting the first length octet
    Length,
    /// Reading long-form length bytes
    LengthBytes,
    /// Accumulating a primitive's content octets
    Value,
    /// Consuming the zero octets of an indefinite-length terminator
    Terminator,
}

/// What has been established about a stack frame's content so far
#[derive(Debug)]
enum FrameContent {
    /// Outer header read, inner (type) header still pending
    Pending,
    /// A container accumulating children
    Container(EmberContainer),
    /// A leaf whose value is being read
    Leaf {
        type_number: u32,
        value: Option<Value>,
    },
}

/// One in-progress node
#[derive(Debug)]
struct Frame {
    tag: BerTag,
    /// Declared outer content length; `None` for the indefinite form
    outer_length: Option<usize>,
    /// Bytes consumed since the end of the outer header
    consumed: usize,
    inner_indefinite: bool,
    content: FrameContent,
}

/// Incremental TLV decoder producing materialized Ember trees.
pub struct AsyncBerReader {
    state: ReaderState,
    stack: Vec<Frame>,
    // tag under construction
    tag_preamble: u8,
    tag_number: u32,
    tag_continuations: u8,
    // length under construction
    length: Option<usize>,
    length_acc: usize,
    length_bytes_remaining: usize,
    current_tag: Option<BerTag>,
    // value accumulation
    value: Vec<u8>,
    value_remaining: usize,
    terminator_remaining: u8,
}

impl Default for AsyncBerReader {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncBerReader {
    pub fn new() -> Self {
        Self {
            state: ReaderState::Tag,
            stack: Vec::new(),
            tag_preamble: 0,
            tag_number: 0,
            tag_continuations: 0,
            length: None,
            length_acc: 0,
            length_bytes_remaining: 0,
            current_tag: None,
            value: Vec::new(),
            value_remaining: 0,
            terminator_remaining: 0,
        }
    }

    /// Whether the reader is between roots with no partial state
    pub fn is_idle(&self) -> bool {
        self.stack.is_empty() && self.state == ReaderState::Tag
    }

    /// Current container nesting depth
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Discard all partial state and return to idle
    pub fn reset(&mut self) {
        self.state = ReaderState::Tag;
        self.stack.clear();
        self.tag_number = 0;
        self.tag_continuations = 0;
        self.length = None;
        self.length_acc = 0;
        self.length_bytes_remaining = 0;
        self.current_tag = None;
        self.value.clear();
        self.value_remaining = 0;
        self.terminator_remaining = 0;
    }

    /// Consume one byte.
    ///
    /// # Returns
    /// `Ok(Some(root))` when this byte completed a root tree, `Ok(None)`
    /// otherwise. On `Err` the reader has reset itself to idle.
    pub fn feed(&mut self, byte: u8) -> EmberResult<Option<EmberNode>> {
        match self.feed_inner(byte) {
            Ok(root) => Ok(root),
            Err(err) => {
                self.reset();
                Err(err)
            }
        }
    }

    /// Consume a slice, collecting every completed root
    pub fn feed_all(&mut self, data: &[u8]) -> EmberResult<Vec<EmberNode>> {
        let mut roots = Vec::new();
        for &byte in data {
            if let Some(root) = self.feed(byte)? {
                roots.push(root);
            }
        }
        Ok(roots)
    }

    fn feed_inner(&mut self, byte: u8) -> EmberResult<Option<EmberNode>> {
        for frame in &mut self.stack {
            frame.consumed += 1;
        }

        match self.state {
            ReaderState::Tag => self.on_tag_preamble(byte),
            ReaderState::TagContinuation => self.on_tag_continuation(byte),
            ReaderState::Length => self.on_length(byte),
            ReaderState::LengthBytes => self.on_length_byte(byte),
            ReaderState::Value => self.on_value(byte),
            ReaderState::Terminator => self.on_terminator(byte),
        }
    }

    fn parsing_inner_header(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Frame {
                content: FrameContent::Pending,
                ..
            })
        )
    }

    fn on_tag_preamble(&mut self, byte: u8) -> EmberResult<Option<EmberNode>> {
        if byte == 0x00 {
            if self.parsing_inner_header() {
                return Err(EmberError::ber(
                    ber_code::INVALID_TAG,
                    "zero tag octet in type position",
                ));
            }
            // first octet of an indefinite-length terminator
            let frame = self.stack.last().ok_or_else(|| {
                EmberError::ber(ber_code::INVALID_TAG, "terminator octet outside a container")
            })?;
            if !frame.inner_indefinite {
                return Err(EmberError::ber(
                    ber_code::INVALID_TAG,
                    "terminator octet in a definite-length container",
                ));
            }
            // one more zero closes the inner form; an indefinite outer
            // adds its own two-zero terminator
            self.terminator_remaining = if frame.outer_length.is_none() { 3 } else { 1 };
            self.state = ReaderState::Terminator;
            return Ok(None);
        }

        self.tag_preamble = byte;
        let number_bits = byte & 0x1F;
        if number_bits == 0x1F {
            self.tag_number = 0;
            self.tag_continuations = 0;
            self.state = ReaderState::TagContinuation;
        } else {
            self.finish_tag(number_bits as u32);
        }
        Ok(None)
    }

    fn on_tag_continuation(&mut self, byte: u8) -> EmberResult<Option<EmberNode>> {
        self.tag_continuations += 1;
        if self.tag_continuations > 5 {
            return Err(EmberError::ber(
                ber_code::INVALID_TAG,
                "tag number exceeds 32 bits",
            ));
        }
        if self.tag_number > u32::MAX >> 7 {
            return Err(EmberError::ber(
                ber_code::INVALID_TAG,
                "tag number exceeds 32 bits",
            ));
        }
        self.tag_number = (self.tag_number << 7) | (byte & 0x7F) as u32;
        if (byte & 0x80) == 0 {
            let number = self.tag_number;
            self.finish_tag(number);
        }
        Ok(None)
    }

    fn finish_tag(&mut self, number: u32) {
        let class = BerClass::from_bits(self.tag_preamble);
        let mut tag = BerTag::new(class, number);
        if (self.tag_preamble & crate::tag::CONTAINER_FLAG) != 0 {
            tag = tag.to_container();
        }
        self.current_tag = Some(tag);
        self.state = ReaderState::Length;
    }

    fn on_length(&mut self, byte: u8) -> EmberResult<Option<EmberNode>> {
        if (byte & 0x80) == 0 {
            self.length = Some(byte as usize);
            return self.on_header_complete();
        }
        if byte == 0x80 {
            self.length = None;
            return self.on_header_complete();
        }
        let count = (byte & 0x7F) as usize;
        if count > 4 {
            return Err(EmberError::ber(
                ber_code::INVALID_LENGTH,
                format!("length prefix of {} bytes exceeds 4-byte limit", count),
            ));
        }
        self.length_acc = 0;
        self.length_bytes_remaining = count;
        self.state = ReaderState::LengthBytes;
        Ok(None)
    }

    fn on_length_byte(&mut self, byte: u8) -> EmberResult<Option<EmberNode>> {
        self.length_acc = (self.length_acc << 8) | byte as usize;
        self.length_bytes_remaining -= 1;
        if self.length_bytes_remaining == 0 {
            self.length = Some(self.length_acc);
            return self.on_header_complete();
        }
        Ok(None)
    }

    fn on_header_complete(&mut self) -> EmberResult<Option<EmberNode>> {
        let tag = self.current_tag.take().ok_or_else(|| {
            EmberError::ber(ber_code::INVALID_TAG, "header completed without a tag")
        })?;
        let length = self.length;

        if self.parsing_inner_header() {
            self.on_inner_header(tag, length)
        } else {
            self.on_outer_header(tag, length)
        }
    }

    /// A node's outer header: push a pending frame
    fn on_outer_header(&mut self, tag: BerTag, length: Option<usize>) -> EmberResult<Option<EmberNode>> {
        if !tag.is_container() {
            return Err(EmberError::ber(
                ber_code::INVALID_TAG,
                format!("outer tag {} lacks the container bit", tag),
            ));
        }
        if length == Some(0) {
            return Err(EmberError::ber(
                ber_code::INVALID_LENGTH,
                "outer length of zero leaves no room for a type",
            ));
        }
        if self.stack.len() >= MAX_NESTING_DEPTH {
            return Err(EmberError::ber(
                ber_code::NESTING_TOO_DEEP,
                format!("nesting depth exceeds {}", MAX_NESTING_DEPTH),
            ));
        }

        self.stack.push(Frame {
            tag: tag.to_primitive(),
            outer_length: length,
            consumed: 0,
            inner_indefinite: false,
            content: FrameContent::Pending,
        });
        self.state = ReaderState::Tag;
        Ok(None)
    }

    /// A node's inner (type) header: the frame becomes a container or leaf
    fn on_inner_header(&mut self, tag: BerTag, length: Option<usize>) -> EmberResult<Option<EmberNode>> {
        let type_number = match tag.class() {
            BerClass::Universal => tag.number(),
            BerClass::Application => ber_type::application(tag.number()),
            BerClass::ContextSpecific | BerClass::Private => {
                return Err(EmberError::ber(
                    ber_code::TYPE_MISMATCH,
                    format!("tag {} is not a valid type tag", tag),
                ));
            }
        };

        let frame = self
            .stack
            .last_mut()
            .ok_or_else(|| EmberError::ber(ber_code::INVALID_TAG, "type header without a node"))?;

        if tag.is_container() {
            if length.is_some() && frame.outer_length.is_none() {
                return Err(EmberError::ber(
                    ber_code::UNSUPPORTED,
                    "definite inner length inside an indefinite outer length",
                ));
            }
            // sets materialized from the wire stay tolerant of duplicate
            // tags (legacy DTD v1 dynamic-container behavior)
            let kind = if type_number == ber_type::SET {
                ContainerKind::DynamicSet
            } else {
                ContainerKind::Sequence
            };
            frame.inner_indefinite = length.is_none();
            frame.content = FrameContent::Container(EmberContainer::new(type_number, kind));
            self.state = ReaderState::Tag;
            return self.drain_exhausted();
        }

        // primitive: a definite content length is required
        let content_length = length.ok_or_else(|| {
            EmberError::ber(
                ber_code::INVALID_LENGTH,
                "indefinite length on a primitive value",
            )
        })?;
        frame.content = FrameContent::Leaf {
            type_number,
            value: None,
        };
        if content_length == 0 {
            // zero-length strings decode to empty values
            self.finish_value()
        } else {
            self.value.clear();
            self.value_remaining = content_length;
            self.state = ReaderState::Value;
            Ok(None)
        }
    }

    fn on_value(&mut self, byte: u8) -> EmberResult<Option<EmberNode>> {
        self.value.push(byte);
        self.value_remaining -= 1;
        if self.value_remaining == 0 {
            self.finish_value()
        } else {
            Ok(None)
        }
    }

    fn finish_value(&mut self) -> EmberResult<Option<EmberNode>> {
        let content = std::mem::take(&mut self.value);
        let frame = self.stack.last_mut().ok_or_else(|| {
            EmberError::ber(ber_code::INVALID_VALUE, "value completed without a node")
        })?;
        let type_number = match &frame.content {
            FrameContent::Leaf { type_number, .. } => *type_number,
            _ => {
                return Err(EmberError::ber(
                    ber_code::INVALID_VALUE,
                    "value completed on a container frame",
                ));
            }
        };
        let value = decoding::decode_value(type_number, &content)?;
        frame.content = FrameContent::Leaf {
            type_number,
            value: Some(value),
        };

        match frame.outer_length {
            Some(length) => {
                if frame.consumed != length {
                    return Err(EmberError::ber(
                        ber_code::INVALID_LENGTH,
                        "leaf content does not fill its declared outer length",
                    ));
                }
                self.state = ReaderState::Tag;
                self.close_top()
            }
            None => {
                // leaf under an indefinite outer: expect its terminator
                self.terminator_remaining = 2;
                self.state = ReaderState::Terminator;
                Ok(None)
            }
        }
    }

    fn on_terminator(&mut self, byte: u8) -> EmberResult<Option<EmberNode>> {
        if byte != 0x00 {
            return Err(EmberError::ber(
                ber_code::INVALID_TAG,
                format!("expected terminator octet, got 0x{:02X}", byte),
            ));
        }
        self.terminator_remaining -= 1;
        if self.terminator_remaining > 0 {
            return Ok(None);
        }
        self.state = ReaderState::Tag;
        self.close_top()
    }

    /// Pop the top frame, attach its node, then close any ancestors whose
    /// definite length is now exhausted. Emits the root when the stack
    /// empties.
    fn close_top(&mut self) -> EmberResult<Option<EmberNode>> {
        loop {
            let frame = self.stack.pop().ok_or_else(|| {
                EmberError::ber(ber_code::INVALID_VALUE, "close with an empty stack")
            })?;

            if let Some(length) = frame.outer_length {
                if frame.consumed != length {
                    return Err(EmberError::ber(
                        ber_code::INVALID_LENGTH,
                        format!(
                            "node {} consumed {} of {} declared bytes",
                            frame.tag, frame.consumed, length
                        ),
                    ));
                }
            }

            let node = match frame.content {
                FrameContent::Container(container) => {
                    EmberNode::from_container(frame.tag, container)
                }
                FrameContent::Leaf {
                    type_number,
                    value: Some(value),
                } => EmberNode::typed_leaf(frame.tag, type_number, value),
                FrameContent::Leaf { value: None, .. } | FrameContent::Pending => {
                    return Err(EmberError::ber(
                        ber_code::INVALID_VALUE,
                        "node closed before its content completed",
                    ));
                }
            };

            match self.stack.last_mut() {
                None => return Ok(Some(node)),
                Some(parent) => {
                    match &mut parent.content {
                        FrameContent::Container(container) => container.insert(node)?,
                        _ => {
                            return Err(EmberError::ber(
                                ber_code::INVALID_VALUE,
                                "child completed inside a non-container node",
                            ));
                        }
                    }
                    if !self.top_exhausted() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Close definite-length frames that became exhausted without content
    /// following them (e.g. empty definite containers)
    fn drain_exhausted(&mut self) -> EmberResult<Option<EmberNode>> {
        if self.top_exhausted() {
            self.close_top()
        } else {
            Ok(None)
        }
    }

    fn top_exhausted(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Frame {
                outer_length: Some(length),
                consumed,
                content: FrameContent::Container(_),
                ..
            }) if consumed == length
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::BerTag;

    fn decode_one(bytes: &[u8]) -> EmberNode {
        let mut reader = AsyncBerReader::new();
        let mut roots = reader.feed_all(bytes).unwrap();
        assert!(reader.is_idle());
        assert_eq!(roots.len(), 1, "expected exactly one root");
        roots.pop().unwrap()
    }

    #[test]
    fn test_smoke_sequence_roundtrip() {
        // the historical reference smoke test: a sequence holding a REAL
        // of -0.54321 under C-3 and the string "Wuppdich" under C-5
        let mut original = EmberNode::sequence(BerTag::application(0));
        original
            .insert(EmberNode::leaf(BerTag::context(3), Value::Real(-0.54321)))
            .unwrap();
        original
            .insert(EmberNode::leaf(
                BerTag::context(5),
                Value::Utf8String("Wuppdich".to_string()),
            ))
            .unwrap();

        let bytes = original.to_bytes();
        let decoded = decode_one(&bytes);

        assert_eq!(decoded.to_text(), original.to_text());
        let real = decoded.child(BerTag::context(3)).unwrap().value().unwrap();
        assert_eq!(real.as_f64(), Some(-0.54321));
        let text = decoded.child(BerTag::context(5)).unwrap().value().unwrap();
        assert_eq!(text.as_str(), Some("Wuppdich"));
    }

    #[test]
    fn test_reencode_is_byte_identical() {
        let mut root = EmberNode::sequence(BerTag::application(11));
        let mut inner = EmberNode::set(BerTag::context(1));
        inner
            .insert(EmberNode::leaf(BerTag::context(0), Value::Integer(-300)))
            .unwrap();
        inner
            .insert(EmberNode::leaf(BerTag::context(1), Value::Boolean(true)))
            .unwrap();
        root.insert(inner).unwrap();
        root.insert(EmberNode::leaf(
            BerTag::context(2),
            Value::OctetString(vec![0xDE, 0xAD]),
        ))
        .unwrap();

        let first = root.to_bytes();
        let decoded = decode_one(&first);
        assert_eq!(decoded.to_bytes(), first);
    }

    #[test]
    fn test_accepts_definite_lengths() {
        // third-party encoders may use definite lengths throughout:
        // outer 60 07 / inner 30 05 / leaf A3 03 02 01 05
        let bytes = [0x60, 0x07, 0x30, 0x05, 0xA3, 0x03, 0x02, 0x01, 0x05];
        let root = decode_one(&bytes);
        let child = root.child(BerTag::context(3)).unwrap();
        assert_eq!(child.value().unwrap().as_i64(), Some(5));
    }

    #[test]
    fn test_empty_string_leaf_decodes_empty_not_absent() {
        let mut root = EmberNode::sequence(BerTag::application(0));
        root.insert(EmberNode::leaf(
            BerTag::context(0),
            Value::Utf8String(String::new()),
        ))
        .unwrap();
        let decoded = decode_one(&root.to_bytes());
        let value = decoded.child(BerTag::context(0)).unwrap().value().unwrap();
        assert_eq!(value.as_str(), Some(""));
    }

    #[test]
    fn test_multiple_roots_in_order() {
        let a = EmberNode::leaf(BerTag::application(1), Value::Integer(1)).to_bytes();
        let b = EmberNode::leaf(BerTag::application(2), Value::Integer(2)).to_bytes();
        let mut stream = a.clone();
        stream.extend_from_slice(&b);

        let mut reader = AsyncBerReader::new();
        let roots = reader.feed_all(&stream).unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].tag(), BerTag::application(1));
        assert_eq!(roots[1].tag(), BerTag::application(2));
    }

    #[test]
    fn test_duplicate_set_tags_from_wire_are_tolerated() {
        // hand-built stream: a SET containing two children with tag C-0
        let leaf = EmberNode::leaf(BerTag::context(0), Value::Integer(1)).to_bytes();
        let mut stream = vec![0x60, 0x80, 0x31, 0x80];
        stream.extend_from_slice(&leaf);
        stream.extend_from_slice(&leaf);
        stream.extend_from_slice(&[0, 0, 0, 0]);

        let root = decode_one(&stream);
        let container = root.as_container().unwrap();
        assert_eq!(container.len(), 2);
        assert_eq!(container.kind(), ContainerKind::Sequence); // downgraded
    }

    #[test]
    fn test_error_resets_to_idle() {
        let mut reader = AsyncBerReader::new();
        // outer tag without container bit is malformed
        assert!(reader.feed_all(&[0x43, 0x02]).is_err());
        assert!(reader.is_idle());

        // the reader accepts a fresh stream afterwards
        let bytes = EmberNode::leaf(BerTag::application(3), Value::Boolean(false)).to_bytes();
        let roots = reader.feed_all(&bytes).unwrap();
        assert_eq!(roots.len(), 1);
    }

    #[test]
    fn test_nesting_depth_limit() {
        let mut reader = AsyncBerReader::new();
        let mut result = Ok(Vec::new());
        for _ in 0..(MAX_NESTING_DEPTH + 1) {
            result = reader.feed_all(&[0x60, 0x80, 0x30, 0x80]);
            if result.is_err() {
                break;
            }
        }
        let err = result.unwrap_err();
        match err {
            EmberError::Ber { code, .. } => assert_eq!(code, ber_code::NESTING_TOO_DEEP),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(reader.is_idle());
    }

    #[test]
    fn test_extended_tag_past_32_bits_rejected() {
        // outer tag with five continuation bytes encoding 2^32
        let mut reader = AsyncBerReader::new();
        let err = reader
            .feed_all(&[0x9F, 0x90, 0x80, 0x80, 0x80, 0x00])
            .unwrap_err();
        match err {
            EmberError::Ber { code, .. } => assert_eq!(code, ber_code::INVALID_TAG),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(reader.is_idle());
    }

    #[test]
    fn test_deep_tree_roundtrip() {
        let mut node = EmberNode::sequence(BerTag::context(0));
        node.insert(EmberNode::leaf(BerTag::context(9), Value::Real(32.1)))
            .unwrap();
        for _ in 0..10 {
            let mut wrap = EmberNode::sequence(BerTag::context(0));
            wrap.insert(node).unwrap();
            node = wrap;
        }
        let mut root = EmberNode::sequence(BerTag::application(0));
        root.insert(node).unwrap();

        let bytes = root.to_bytes();
        let decoded = decode_one(&bytes);
        assert_eq!(decoded.to_bytes(), bytes);
    }
}
