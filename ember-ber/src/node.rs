//! In-memory Ember tree model
//!
//! Nodes are either typed leaves or containers. Each node is owned
//! exclusively by its parent container; the closed set of node kinds is
//! dispatched by exhaustive matching.
//!
//! Encoding follows the EmBER explicit-tagging convention: every node is an
//! outer TLV carrying the node's tag (container flag forced) that wraps an
//! inner TLV carrying the type. Containers always encode with indefinite
//! lengths; the decoder accepts definite forms as well for interop.

use crate::encoding;
use crate::error::{EmberError, EmberResult};
use crate::tag::{BerLength, BerTag};
use crate::types::{ber_type, Value};
use std::fmt::Write as _;

/// Container behavior for child insertion and encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Children kept in insertion order, duplicate tags allowed
    Sequence,
    /// Children sorted by tag immediately before encoding
    OrderedSequence,
    /// Safe-mode set: duplicate tags are rejected with `DuplicateTag`
    Set,
    /// Legacy dynamic container: starts with set uniqueness, but the first
    /// duplicate-tagged insert irreversibly downgrades it to a plain
    /// sequence and both children are retained. Confined to decode paths
    /// for Glow DTD v1 tolerance; new code should not construct these.
    DynamicSet,
}

/// A container node's state: type number, insertion-ordered children and
/// the kind governing uniqueness/ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct EmberContainer {
    type_number: u32,
    kind: ContainerKind,
    children: Vec<EmberNode>,
}

impl EmberContainer {
    pub fn new(type_number: u32, kind: ContainerKind) -> Self {
        Self {
            type_number,
            kind,
            children: Vec::new(),
        }
    }

    pub fn type_number(&self) -> u32 {
        self.type_number
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn children(&self) -> &[EmberNode] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Append a child.
    ///
    /// Sets in safe mode reject duplicate tags; a dynamic set downgrades to
    /// a sequence on the first collision and keeps both children.
    pub fn insert(&mut self, node: EmberNode) -> EmberResult<()> {
        match self.kind {
            ContainerKind::Set => {
                if self.children.iter().any(|c| c.tag() == node.tag()) {
                    return Err(EmberError::DuplicateTag(node.tag().to_string()));
                }
            }
            ContainerKind::DynamicSet => {
                if self.children.iter().any(|c| c.tag() == node.tag()) {
                    // one-way, order-losing downgrade
                    self.kind = ContainerKind::Sequence;
                }
            }
            ContainerKind::Sequence | ContainerKind::OrderedSequence => {}
        }
        self.children.push(node);
        Ok(())
    }

    /// Remove and return the first child with the given tag
    pub fn remove(&mut self, tag: BerTag) -> Option<EmberNode> {
        let index = self.children.iter().position(|c| c.tag() == tag)?;
        Some(self.children.remove(index))
    }

    /// First child with the given tag
    pub fn child(&self, tag: BerTag) -> Option<&EmberNode> {
        self.children.iter().find(|c| c.tag() == tag)
    }

    /// Mutable access to the first child with the given tag
    pub fn child_mut(&mut self, tag: BerTag) -> Option<&mut EmberNode> {
        self.children.iter_mut().find(|c| c.tag() == tag)
    }
}

/// Leaf or container payload of a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Leaf { type_number: u32, value: Value },
    Container(EmberContainer),
}

/// One node of an Ember tree: a tag plus leaf or container content
#[derive(Debug, Clone, PartialEq)]
pub struct EmberNode {
    tag: BerTag,
    kind: NodeKind,
}

impl EmberNode {
    /// Create a leaf holding `value`, typed by the value's universal type
    pub fn leaf(tag: BerTag, value: Value) -> Self {
        let type_number = value.universal_type();
        Self {
            tag,
            kind: NodeKind::Leaf { type_number, value },
        }
    }

    /// Create a leaf with an explicit type number (used by the decoder)
    pub fn typed_leaf(tag: BerTag, type_number: u32, value: Value) -> Self {
        Self {
            tag,
            kind: NodeKind::Leaf { type_number, value },
        }
    }

    /// Create an empty sequence container
    pub fn sequence(tag: BerTag) -> Self {
        Self::container(tag, ber_type::SEQUENCE, ContainerKind::Sequence)
    }

    /// Create a sequence whose children are sorted by tag before encoding
    pub fn ordered_sequence(tag: BerTag) -> Self {
        Self::container(tag, ber_type::SEQUENCE, ContainerKind::OrderedSequence)
    }

    /// Create an empty safe-mode set container
    pub fn set(tag: BerTag) -> Self {
        Self::container(tag, ber_type::SET, ContainerKind::Set)
    }

    /// Create an empty legacy dynamic set (decode-path tolerance only)
    pub fn dynamic_set(tag: BerTag) -> Self {
        Self::container(tag, ber_type::SET, ContainerKind::DynamicSet)
    }

    /// Create an application-typed container (sequence semantics)
    pub fn application(tag: BerTag, application_number: u32) -> Self {
        Self::container(
            tag,
            ber_type::application(application_number),
            ContainerKind::Sequence,
        )
    }

    /// Create a container with explicit type and kind
    pub fn container(tag: BerTag, type_number: u32, kind: ContainerKind) -> Self {
        Self {
            tag,
            kind: NodeKind::Container(EmberContainer::new(type_number, kind)),
        }
    }

    pub fn from_container(tag: BerTag, container: EmberContainer) -> Self {
        Self {
            tag,
            kind: NodeKind::Container(container),
        }
    }

    pub fn tag(&self) -> BerTag {
        self.tag
    }

    /// The node's type: a universal number or application number with the
    /// high bit set
    pub fn type_number(&self) -> u32 {
        match &self.kind {
            NodeKind::Leaf { type_number, .. } => *type_number,
            NodeKind::Container(c) => c.type_number(),
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Container(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            NodeKind::Leaf { value, .. } => Some(value),
            NodeKind::Container(_) => None,
        }
    }

    pub fn as_container(&self) -> Option<&EmberContainer> {
        match &self.kind {
            NodeKind::Container(c) => Some(c),
            NodeKind::Leaf { .. } => None,
        }
    }

    pub fn as_container_mut(&mut self) -> Option<&mut EmberContainer> {
        match &mut self.kind {
            NodeKind::Container(c) => Some(c),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// Insert a child into this container node
    ///
    /// # Errors
    /// `InvalidData` if the node is a leaf; `DuplicateTag` per the
    /// container kind rules.
    pub fn insert(&mut self, node: EmberNode) -> EmberResult<()> {
        match &mut self.kind {
            NodeKind::Container(c) => c.insert(node),
            NodeKind::Leaf { .. } => Err(EmberError::InvalidData(
                "cannot insert a child into a leaf node".to_string(),
            )),
        }
    }

    /// Remove the first child with the given tag
    pub fn remove(&mut self, tag: BerTag) -> Option<EmberNode> {
        self.as_container_mut()?.remove(tag)
    }

    /// First child with the given tag
    pub fn child(&self, tag: BerTag) -> Option<&EmberNode> {
        self.as_container()?.child(tag)
    }

    /// Encode the node, appending the full TLV stream to `out`
    pub fn encode(&self, out: &mut Vec<u8>) {
        match &self.kind {
            NodeKind::Leaf { type_number, value } => {
                let mut content = Vec::new();
                encoding::encode_value(&mut content, value);

                let mut inner = Vec::new();
                type_tag(*type_number, false).encode(&mut inner);
                BerLength::Definite(content.len()).encode(&mut inner);
                inner.extend_from_slice(&content);

                self.tag.to_container().encode(out);
                BerLength::Definite(inner.len()).encode(out);
                out.extend_from_slice(&inner);
            }
            NodeKind::Container(container) => {
                self.tag.to_container().encode(out);
                BerLength::Indefinite.encode(out);

                type_tag(container.type_number(), true).encode(out);
                BerLength::Indefinite.encode(out);

                if container.kind() == ContainerKind::OrderedSequence {
                    let mut sorted: Vec<&EmberNode> = container.children().iter().collect();
                    sorted.sort_by_key(|c| c.tag());
                    for child in sorted {
                        child.encode(out);
                    }
                } else {
                    for child in container.children() {
                        child.encode(out);
                    }
                }

                // inner and outer indefinite terminators
                out.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
            }
        }
    }

    /// Encode into a fresh buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    /// Plain-text projection of the tree, one node per line.
    ///
    /// Used by tests and diagnostics in place of the historical XML view.
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        self.write_text(&mut text, 0);
        text
    }

    fn write_text(&self, text: &mut String, depth: usize) {
        for _ in 0..depth {
            text.push_str("  ");
        }
        match &self.kind {
            NodeKind::Leaf { type_number, value } => {
                let _ = writeln!(text, "{} {}: {}", self.tag, type_name(*type_number), value);
            }
            NodeKind::Container(container) => {
                let _ = writeln!(
                    text,
                    "{} {} ({} children)",
                    self.tag,
                    type_name(container.type_number()),
                    container.len()
                );
                for child in container.children() {
                    child.write_text(text, depth + 1);
                }
            }
        }
    }
}

/// The inner type tag for a node's type number
fn type_tag(type_number: u32, container: bool) -> BerTag {
    let tag = if ber_type::is_application(type_number) {
        BerTag::application(ber_type::number_of(type_number))
    } else {
        BerTag::universal(type_number)
    };
    if container {
        tag.to_container()
    } else {
        tag
    }
}

fn type_name(type_number: u32) -> String {
    if ber_type::is_application(type_number) {
        return format!("APPLICATION-{}", ber_type::number_of(type_number));
    }
    match type_number {
        ber_type::BOOLEAN => "BOOLEAN".to_string(),
        ber_type::INTEGER => "INTEGER".to_string(),
        ber_type::BIT_STRING => "BIT-STRING".to_string(),
        ber_type::OCTET_STRING => "OCTET-STRING".to_string(),
        ber_type::NULL => "NULL".to_string(),
        ber_type::OBJECT_IDENTIFIER => "OBJECT-IDENTIFIER".to_string(),
        ber_type::REAL => "REAL".to_string(),
        ber_type::UTF8_STRING => "UTF8-STRING".to_string(),
        ber_type::RELATIVE_OID => "RELATIVE-OID".to_string(),
        ber_type::SEQUENCE => "SEQUENCE".to_string(),
        ber_type::SET => "SET".to_string(),
        ber_type::GENERALIZED_TIME => "GENERALIZED-TIME".to_string(),
        other => format!("UNIVERSAL-{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::BerClass;

    #[test]
    fn test_set_rejects_duplicate_tag() {
        let mut set = EmberNode::set(BerTag::application(1));
        set.insert(EmberNode::leaf(BerTag::context(0), Value::Integer(1)))
            .unwrap();
        let err = set
            .insert(EmberNode::leaf(BerTag::context(0), Value::Integer(2)))
            .unwrap_err();
        assert!(matches!(err, EmberError::DuplicateTag(_)));
        assert_eq!(set.as_container().unwrap().len(), 1);
    }

    #[test]
    fn test_dynamic_set_downgrades_and_keeps_both() {
        let mut set = EmberNode::dynamic_set(BerTag::application(1));
        set.insert(EmberNode::leaf(BerTag::context(0), Value::Integer(1)))
            .unwrap();
        set.insert(EmberNode::leaf(BerTag::context(0), Value::Integer(2)))
            .unwrap();

        let container = set.as_container().unwrap();
        assert_eq!(container.kind(), ContainerKind::Sequence);
        assert_eq!(container.len(), 2);

        // downgrade is one-way: a third duplicate also lands
        set.insert(EmberNode::leaf(BerTag::context(0), Value::Integer(3)))
            .unwrap();
        assert_eq!(set.as_container().unwrap().len(), 3);
    }

    #[test]
    fn test_remove_unmaps_child() {
        let mut seq = EmberNode::sequence(BerTag::application(5));
        seq.insert(EmberNode::leaf(BerTag::context(1), Value::Boolean(true)))
            .unwrap();
        let removed = seq.remove(BerTag::context(1)).unwrap();
        assert_eq!(removed.value(), Some(&Value::Boolean(true)));
        assert!(seq.child(BerTag::context(1)).is_none());
    }

    #[test]
    fn test_leaf_encoding_shape() {
        let leaf = EmberNode::leaf(BerTag::context(3), Value::Integer(5));
        let bytes = leaf.to_bytes();
        // outer: A3 03, inner: 02 01 05
        assert_eq!(bytes, vec![0xA3, 0x03, 0x02, 0x01, 0x05]);
    }

    #[test]
    fn test_container_encoding_is_indefinite() {
        let mut seq = EmberNode::sequence(BerTag::application(0));
        seq.insert(EmberNode::leaf(BerTag::context(0), Value::Boolean(true)))
            .unwrap();
        let bytes = seq.to_bytes();
        assert_eq!(bytes[0], 0x60); // APPLICATION 0, container
        assert_eq!(bytes[1], 0x80); // indefinite
        assert_eq!(bytes[2], 0x30); // SEQUENCE, container
        assert_eq!(bytes[3], 0x80); // indefinite
        assert_eq!(&bytes[bytes.len() - 4..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_ordered_sequence_sorts_by_tag() {
        let mut seq = EmberNode::ordered_sequence(BerTag::application(0));
        seq.insert(EmberNode::leaf(BerTag::context(5), Value::Integer(5)))
            .unwrap();
        seq.insert(EmberNode::leaf(BerTag::context(1), Value::Integer(1)))
            .unwrap();
        let bytes = seq.to_bytes();
        // first encoded child must carry tag C-1 (0xA1 with container bit)
        assert_eq!(bytes[4], 0xA1);
        // insertion order itself is preserved
        assert_eq!(
            seq.as_container().unwrap().children()[0].tag(),
            BerTag::new(BerClass::ContextSpecific, 5)
        );
    }

    #[test]
    fn test_text_projection() {
        let mut seq = EmberNode::sequence(BerTag::application(7));
        seq.insert(EmberNode::leaf(
            BerTag::context(5),
            Value::Utf8String("Wuppdich".to_string()),
        ))
        .unwrap();
        let text = seq.to_text();
        assert!(text.contains("A-7 SEQUENCE (1 children)"));
        assert!(text.contains("C-5 UTF8-STRING: Wuppdich"));
    }
}
