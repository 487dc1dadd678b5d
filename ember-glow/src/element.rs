//! Typed Glow element views over EmBER trees
//!
//! Each wrapper owns a plain `EmberNode` shaped by the Glow schema and
//! exposes the schema's fields through accessors. `GlowElement` is the
//! closed dispatch over every element kind this stack understands; an
//! unknown application type yields a recoverable type-mismatch error so a
//! caller can skip the element without tearing down the connection.

use ember_ber::{ber_type, BerTag, ContainerKind, EmberNode, Value};

use crate::error::{ber_code, EmberError, EmberResult};
use crate::matrix::{GlowMatrix, GlowQualifiedMatrix};
use crate::tags;
use crate::types::{command_number, glow_type, ParameterAccess, ROOT_TAG_NUMBER};

/// A fresh element node shaped as a collection item
pub(crate) fn element_node(type_number: u32) -> EmberNode {
    EmberNode::application(BerTag::context(tags::COLLECTION_ITEM), type_number)
}

pub(crate) fn expect_type(node: &EmberNode, wanted: u32, what: &str) -> EmberResult<()> {
    if node.type_number() == ber_type::application(wanted) {
        Ok(())
    } else {
        Err(EmberError::ber(
            ber_code::TYPE_MISMATCH,
            format!("expected {} element, got type 0x{:X}", what, node.type_number()),
        ))
    }
}

pub(crate) fn field_value(node: &EmberNode, tag_number: u32) -> Option<&Value> {
    node.child(BerTag::context(tag_number))?.value()
}

/// Replace a top-level leaf field
pub(crate) fn put_field(node: &mut EmberNode, tag_number: u32, value: Value) {
    let tag = BerTag::context(tag_number);
    if let Some(container) = node.as_container_mut() {
        container.remove(tag);
        // removed first, so the insert cannot collide
        let _ = container.insert(EmberNode::leaf(tag, value));
    }
}

pub(crate) fn contents_value(node: &EmberNode, field: u32) -> Option<&Value> {
    node.child(BerTag::context(tags::element::CONTENTS))?
        .child(BerTag::context(field))?
        .value()
}

/// Replace a field inside the element's contents set, creating the set on
/// first use
pub(crate) fn put_contents_field(node: &mut EmberNode, field: u32, value: Value) {
    let contents_tag = BerTag::context(tags::element::CONTENTS);
    let Some(container) = node.as_container_mut() else {
        return;
    };
    if container.child(contents_tag).is_none() {
        let _ = container.insert(EmberNode::set(contents_tag));
    }
    if let Some(contents) = container.child_mut(contents_tag) {
        contents.remove(BerTag::context(field));
        let _ = contents.insert(EmberNode::leaf(BerTag::context(field), value));
    }
}

/// The collection child under `tag_number`, created with the given inner
/// type on first use
pub(crate) fn ensure_collection<'a>(
    node: &'a mut EmberNode,
    tag_number: u32,
    type_number: u32,
) -> EmberResult<&'a mut EmberNode> {
    let tag = BerTag::context(tag_number);
    let container = node
        .as_container_mut()
        .ok_or_else(|| EmberError::InvalidData("element is not a container".to_string()))?;
    if container.child(tag).is_none() {
        let collection = if ber_type::is_application(type_number) {
            EmberNode::application(tag, ber_type::number_of(type_number))
        } else {
            EmberNode::container(tag, type_number, ContainerKind::Sequence)
        };
        let _ = container.insert(collection);
    }
    container
        .child_mut(tag)
        .ok_or_else(|| EmberError::InvalidData("collection insertion failed".to_string()))
}

/// Interpret every item of the collection under `tag_number` as an element.
///
/// Items with application types this stack does not model are skipped so a
/// third-party tree carrying labels or stream entries still parses.
pub(crate) fn collection_elements(
    node: &EmberNode,
    tag_number: u32,
) -> EmberResult<Vec<GlowElement>> {
    let Some(collection) = node.child(BerTag::context(tag_number)) else {
        return Ok(Vec::new());
    };
    let Some(container) = collection.as_container() else {
        return Ok(Vec::new());
    };
    interpret_items(container.children())
}

fn interpret_items(items: &[EmberNode]) -> EmberResult<Vec<GlowElement>> {
    let mut elements = Vec::new();
    for item in items {
        match GlowElement::from_node(item.clone()) {
            Ok(element) => elements.push(element),
            Err(EmberError::Ber {
                code: ber_code::TYPE_MISMATCH,
                ..
            }) => {
                log::debug!(
                    "skipping element with unsupported type 0x{:X}",
                    item.type_number()
                );
            }
            Err(err) => return Err(err),
        }
    }
    Ok(elements)
}

/// A Glow node element
#[derive(Debug, Clone, PartialEq)]
pub struct GlowNode(pub(crate) EmberNode);

impl GlowNode {
    pub fn new(number: i64) -> Self {
        let mut node = element_node(glow_type::NODE);
        put_field(&mut node, tags::element::NUMBER, Value::Integer(number));
        Self(node)
    }

    pub fn from_node(node: EmberNode) -> EmberResult<Self> {
        expect_type(&node, glow_type::NODE, "node")?;
        Ok(Self(node))
    }

    pub fn number(&self) -> Option<i64> {
        field_value(&self.0, tags::element::NUMBER)?.as_i64()
    }

    pub fn identifier(&self) -> Option<&str> {
        contents_value(&self.0, tags::node_contents::IDENTIFIER)?.as_str()
    }

    pub fn description(&self) -> Option<&str> {
        contents_value(&self.0, tags::node_contents::DESCRIPTION)?.as_str()
    }

    pub fn set_identifier(&mut self, identifier: &str) {
        put_contents_field(
            &mut self.0,
            tags::node_contents::IDENTIFIER,
            Value::Utf8String(identifier.to_string()),
        );
    }

    pub fn set_description(&mut self, description: &str) {
        put_contents_field(
            &mut self.0,
            tags::node_contents::DESCRIPTION,
            Value::Utf8String(description.to_string()),
        );
    }

    pub fn children(&self) -> EmberResult<Vec<GlowElement>> {
        collection_elements(&self.0, tags::element::CHILDREN)
    }

    pub fn add_child(&mut self, element: GlowElement) -> EmberResult<()> {
        let children = ensure_collection(
            &mut self.0,
            tags::element::CHILDREN,
            ber_type::application(glow_type::ELEMENT_COLLECTION),
        )?;
        children.insert(element.into_node())
    }

    pub fn node(&self) -> &EmberNode {
        &self.0
    }

    pub fn into_node(self) -> EmberNode {
        self.0
    }
}

/// A Glow node addressed by a full relative-OID path
#[derive(Debug, Clone, PartialEq)]
pub struct GlowQualifiedNode(pub(crate) EmberNode);

impl GlowQualifiedNode {
    pub fn new(path: &[u32]) -> Self {
        let mut node = element_node(glow_type::QUALIFIED_NODE);
        put_field(
            &mut node,
            tags::element::PATH,
            Value::RelativeOid(path.to_vec()),
        );
        Self(node)
    }

    pub fn from_node(node: EmberNode) -> EmberResult<Self> {
        expect_type(&node, glow_type::QUALIFIED_NODE, "qualified node")?;
        Ok(Self(node))
    }

    pub fn path(&self) -> Option<&[u32]> {
        field_value(&self.0, tags::element::PATH)?.as_oid()
    }

    pub fn identifier(&self) -> Option<&str> {
        contents_value(&self.0, tags::node_contents::IDENTIFIER)?.as_str()
    }

    pub fn description(&self) -> Option<&str> {
        contents_value(&self.0, tags::node_contents::DESCRIPTION)?.as_str()
    }

    pub fn set_identifier(&mut self, identifier: &str) {
        put_contents_field(
            &mut self.0,
            tags::node_contents::IDENTIFIER,
            Value::Utf8String(identifier.to_string()),
        );
    }

    pub fn set_description(&mut self, description: &str) {
        put_contents_field(
            &mut self.0,
            tags::node_contents::DESCRIPTION,
            Value::Utf8String(description.to_string()),
        );
    }

    pub fn children(&self) -> EmberResult<Vec<GlowElement>> {
        collection_elements(&self.0, tags::element::CHILDREN)
    }

    pub fn add_child(&mut self, element: GlowElement) -> EmberResult<()> {
        let children = ensure_collection(
            &mut self.0,
            tags::element::CHILDREN,
            ber_type::application(glow_type::ELEMENT_COLLECTION),
        )?;
        children.insert(element.into_node())
    }

    pub fn node(&self) -> &EmberNode {
        &self.0
    }

    pub fn into_node(self) -> EmberNode {
        self.0
    }
}

/// A Glow parameter element
#[derive(Debug, Clone, PartialEq)]
pub struct GlowParameter(pub(crate) EmberNode);

impl GlowParameter {
    pub fn new(number: i64) -> Self {
        let mut node = element_node(glow_type::PARAMETER);
        put_field(&mut node, tags::element::NUMBER, Value::Integer(number));
        Self(node)
    }

    pub fn from_node(node: EmberNode) -> EmberResult<Self> {
        expect_type(&node, glow_type::PARAMETER, "parameter")?;
        Ok(Self(node))
    }

    pub fn number(&self) -> Option<i64> {
        field_value(&self.0, tags::element::NUMBER)?.as_i64()
    }

    pub fn identifier(&self) -> Option<&str> {
        contents_value(&self.0, tags::parameter_contents::IDENTIFIER)?.as_str()
    }

    pub fn value(&self) -> Option<&Value> {
        contents_value(&self.0, tags::parameter_contents::VALUE)
    }

    pub fn minimum(&self) -> Option<&Value> {
        contents_value(&self.0, tags::parameter_contents::MINIMUM)
    }

    pub fn maximum(&self) -> Option<&Value> {
        contents_value(&self.0, tags::parameter_contents::MAXIMUM)
    }

    pub fn access(&self) -> ParameterAccess {
        contents_value(&self.0, tags::parameter_contents::ACCESS)
            .and_then(Value::as_i64)
            .and_then(|v| ParameterAccess::from_i64(v).ok())
            .unwrap_or_default()
    }

    pub fn set_identifier(&mut self, identifier: &str) {
        put_contents_field(
            &mut self.0,
            tags::parameter_contents::IDENTIFIER,
            Value::Utf8String(identifier.to_string()),
        );
    }

    pub fn set_description(&mut self, description: &str) {
        put_contents_field(
            &mut self.0,
            tags::parameter_contents::DESCRIPTION,
            Value::Utf8String(description.to_string()),
        );
    }

    pub fn set_value(&mut self, value: Value) {
        put_contents_field(&mut self.0, tags::parameter_contents::VALUE, value);
    }

    pub fn set_minimum(&mut self, value: Value) {
        put_contents_field(&mut self.0, tags::parameter_contents::MINIMUM, value);
    }

    pub fn set_maximum(&mut self, value: Value) {
        put_contents_field(&mut self.0, tags::parameter_contents::MAXIMUM, value);
    }

    pub fn set_access(&mut self, access: ParameterAccess) {
        put_contents_field(
            &mut self.0,
            tags::parameter_contents::ACCESS,
            Value::Integer(access as i64),
        );
    }

    pub fn children(&self) -> EmberResult<Vec<GlowElement>> {
        collection_elements(&self.0, tags::element::CHILDREN)
    }

    pub fn node(&self) -> &EmberNode {
        &self.0
    }

    pub fn into_node(self) -> EmberNode {
        self.0
    }
}

/// A Glow parameter addressed by a full relative-OID path
#[derive(Debug, Clone, PartialEq)]
pub struct GlowQualifiedParameter(pub(crate) EmberNode);

impl GlowQualifiedParameter {
    pub fn new(path: &[u32]) -> Self {
        let mut node = element_node(glow_type::QUALIFIED_PARAMETER);
        put_field(
            &mut node,
            tags::element::PATH,
            Value::RelativeOid(path.to_vec()),
        );
        Self(node)
    }

    pub fn from_node(node: EmberNode) -> EmberResult<Self> {
        expect_type(&node, glow_type::QUALIFIED_PARAMETER, "qualified parameter")?;
        Ok(Self(node))
    }

    pub fn path(&self) -> Option<&[u32]> {
        field_value(&self.0, tags::element::PATH)?.as_oid()
    }

    pub fn identifier(&self) -> Option<&str> {
        contents_value(&self.0, tags::parameter_contents::IDENTIFIER)?.as_str()
    }

    pub fn value(&self) -> Option<&Value> {
        contents_value(&self.0, tags::parameter_contents::VALUE)
    }

    pub fn minimum(&self) -> Option<&Value> {
        contents_value(&self.0, tags::parameter_contents::MINIMUM)
    }

    pub fn maximum(&self) -> Option<&Value> {
        contents_value(&self.0, tags::parameter_contents::MAXIMUM)
    }

    pub fn access(&self) -> ParameterAccess {
        contents_value(&self.0, tags::parameter_contents::ACCESS)
            .and_then(Value::as_i64)
            .and_then(|v| ParameterAccess::from_i64(v).ok())
            .unwrap_or_default()
    }

    pub fn set_identifier(&mut self, identifier: &str) {
        put_contents_field(
            &mut self.0,
            tags::parameter_contents::IDENTIFIER,
            Value::Utf8String(identifier.to_string()),
        );
    }

    pub fn set_value(&mut self, value: Value) {
        put_contents_field(&mut self.0, tags::parameter_contents::VALUE, value);
    }

    pub fn set_minimum(&mut self, value: Value) {
        put_contents_field(&mut self.0, tags::parameter_contents::MINIMUM, value);
    }

    pub fn set_maximum(&mut self, value: Value) {
        put_contents_field(&mut self.0, tags::parameter_contents::MAXIMUM, value);
    }

    pub fn set_access(&mut self, access: ParameterAccess) {
        put_contents_field(
            &mut self.0,
            tags::parameter_contents::ACCESS,
            Value::Integer(access as i64),
        );
    }

    pub fn children(&self) -> EmberResult<Vec<GlowElement>> {
        collection_elements(&self.0, tags::element::CHILDREN)
    }

    pub fn node(&self) -> &EmberNode {
        &self.0
    }

    pub fn into_node(self) -> EmberNode {
        self.0
    }
}

/// A Glow command element (subscribe, unsubscribe, get-directory, invoke)
#[derive(Debug, Clone, PartialEq)]
pub struct GlowCommand(pub(crate) EmberNode);

impl GlowCommand {
    pub fn new(number: i64) -> Self {
        let mut node = element_node(glow_type::COMMAND);
        put_field(&mut node, tags::command::NUMBER, Value::Integer(number));
        Self(node)
    }

    pub fn get_directory() -> Self {
        Self::new(command_number::GET_DIRECTORY)
    }

    pub fn subscribe() -> Self {
        Self::new(command_number::SUBSCRIBE)
    }

    pub fn unsubscribe() -> Self {
        Self::new(command_number::UNSUBSCRIBE)
    }

    pub fn from_node(node: EmberNode) -> EmberResult<Self> {
        expect_type(&node, glow_type::COMMAND, "command")?;
        Ok(Self(node))
    }

    pub fn number(&self) -> Option<i64> {
        field_value(&self.0, tags::command::NUMBER)?.as_i64()
    }

    pub fn dir_field_mask(&self) -> Option<i64> {
        field_value(&self.0, tags::command::DIR_FIELD_MASK)?.as_i64()
    }

    pub fn set_dir_field_mask(&mut self, mask: i64) {
        put_field(&mut self.0, tags::command::DIR_FIELD_MASK, Value::Integer(mask));
    }

    pub fn node(&self) -> &EmberNode {
        &self.0
    }

    pub fn into_node(self) -> EmberNode {
        self.0
    }
}

/// A Glow function element
#[derive(Debug, Clone, PartialEq)]
pub struct GlowFunction(pub(crate) EmberNode);

impl GlowFunction {
    pub fn new(number: i64) -> Self {
        let mut node = element_node(glow_type::FUNCTION);
        put_field(&mut node, tags::element::NUMBER, Value::Integer(number));
        Self(node)
    }

    pub fn from_node(node: EmberNode) -> EmberResult<Self> {
        expect_type(&node, glow_type::FUNCTION, "function")?;
        Ok(Self(node))
    }

    pub fn number(&self) -> Option<i64> {
        field_value(&self.0, tags::element::NUMBER)?.as_i64()
    }

    pub fn identifier(&self) -> Option<&str> {
        contents_value(&self.0, tags::function_contents::IDENTIFIER)?.as_str()
    }

    pub fn set_identifier(&mut self, identifier: &str) {
        put_contents_field(
            &mut self.0,
            tags::function_contents::IDENTIFIER,
            Value::Utf8String(identifier.to_string()),
        );
    }

    pub fn children(&self) -> EmberResult<Vec<GlowElement>> {
        collection_elements(&self.0, tags::element::CHILDREN)
    }

    pub fn node(&self) -> &EmberNode {
        &self.0
    }

    pub fn into_node(self) -> EmberNode {
        self.0
    }
}

/// A Glow function addressed by a full relative-OID path
#[derive(Debug, Clone, PartialEq)]
pub struct GlowQualifiedFunction(pub(crate) EmberNode);

impl GlowQualifiedFunction {
    pub fn new(path: &[u32]) -> Self {
        let mut node = element_node(glow_type::QUALIFIED_FUNCTION);
        put_field(
            &mut node,
            tags::element::PATH,
            Value::RelativeOid(path.to_vec()),
        );
        Self(node)
    }

    pub fn from_node(node: EmberNode) -> EmberResult<Self> {
        expect_type(&node, glow_type::QUALIFIED_FUNCTION, "qualified function")?;
        Ok(Self(node))
    }

    pub fn path(&self) -> Option<&[u32]> {
        field_value(&self.0, tags::element::PATH)?.as_oid()
    }

    pub fn identifier(&self) -> Option<&str> {
        contents_value(&self.0, tags::function_contents::IDENTIFIER)?.as_str()
    }

    pub fn set_identifier(&mut self, identifier: &str) {
        put_contents_field(
            &mut self.0,
            tags::function_contents::IDENTIFIER,
            Value::Utf8String(identifier.to_string()),
        );
    }

    pub fn node(&self) -> &EmberNode {
        &self.0
    }

    pub fn into_node(self) -> EmberNode {
        self.0
    }
}

/// Closed dispatch over every Glow element kind
#[derive(Debug, Clone, PartialEq)]
pub enum GlowElement {
    Node(GlowNode),
    QualifiedNode(GlowQualifiedNode),
    Parameter(GlowParameter),
    QualifiedParameter(GlowQualifiedParameter),
    Matrix(GlowMatrix),
    QualifiedMatrix(GlowQualifiedMatrix),
    Function(GlowFunction),
    QualifiedFunction(GlowQualifiedFunction),
    Command(GlowCommand),
}

impl GlowElement {
    /// Interpret a decoded node as a Glow element.
    ///
    /// # Errors
    /// A recoverable type-mismatch error for application types this stack
    /// does not model; callers typically log and skip the element.
    pub fn from_node(node: EmberNode) -> EmberResult<Self> {
        let type_number = node.type_number();
        if !ber_type::is_application(type_number) {
            return Err(EmberError::ber(
                ber_code::TYPE_MISMATCH,
                format!("type 0x{:X} is not a Glow element", type_number),
            ));
        }
        match ber_type::number_of(type_number) {
            glow_type::NODE => Ok(GlowElement::Node(GlowNode(node))),
            glow_type::QUALIFIED_NODE => Ok(GlowElement::QualifiedNode(GlowQualifiedNode(node))),
            glow_type::PARAMETER => Ok(GlowElement::Parameter(GlowParameter(node))),
            glow_type::QUALIFIED_PARAMETER => {
                Ok(GlowElement::QualifiedParameter(GlowQualifiedParameter(node)))
            }
            glow_type::MATRIX => Ok(GlowElement::Matrix(GlowMatrix::wrap(node))),
            glow_type::QUALIFIED_MATRIX => {
                Ok(GlowElement::QualifiedMatrix(GlowQualifiedMatrix::wrap(node)))
            }
            glow_type::FUNCTION => Ok(GlowElement::Function(GlowFunction(node))),
            glow_type::QUALIFIED_FUNCTION => {
                Ok(GlowElement::QualifiedFunction(GlowQualifiedFunction(node)))
            }
            glow_type::COMMAND => Ok(GlowElement::Command(GlowCommand(node))),
            other => Err(EmberError::ber(
                ber_code::TYPE_MISMATCH,
                format!("unsupported Glow element type {}", other),
            )),
        }
    }

    pub fn node(&self) -> &EmberNode {
        match self {
            GlowElement::Node(e) => e.node(),
            GlowElement::QualifiedNode(e) => e.node(),
            GlowElement::Parameter(e) => e.node(),
            GlowElement::QualifiedParameter(e) => e.node(),
            GlowElement::Matrix(e) => e.node(),
            GlowElement::QualifiedMatrix(e) => e.node(),
            GlowElement::Function(e) => e.node(),
            GlowElement::QualifiedFunction(e) => e.node(),
            GlowElement::Command(e) => e.node(),
        }
    }

    pub fn into_node(self) -> EmberNode {
        match self {
            GlowElement::Node(e) => e.into_node(),
            GlowElement::QualifiedNode(e) => e.into_node(),
            GlowElement::Parameter(e) => e.into_node(),
            GlowElement::QualifiedParameter(e) => e.into_node(),
            GlowElement::Matrix(e) => e.into_node(),
            GlowElement::QualifiedMatrix(e) => e.into_node(),
            GlowElement::Function(e) => e.into_node(),
            GlowElement::QualifiedFunction(e) => e.into_node(),
            GlowElement::Command(e) => e.into_node(),
        }
    }
}

/// An empty root element collection
pub fn root_collection() -> EmberNode {
    EmberNode::container(
        BerTag::application(ROOT_TAG_NUMBER),
        ber_type::application(glow_type::ROOT_ELEMENT_COLLECTION),
        ContainerKind::Sequence,
    )
}

/// A root element collection holding the given elements
pub fn root_of(elements: Vec<GlowElement>) -> EmberResult<EmberNode> {
    let mut root = root_collection();
    for element in elements {
        root.insert(element.into_node())?;
    }
    Ok(root)
}

pub fn is_root(node: &EmberNode) -> bool {
    node.type_number() == ber_type::application(glow_type::ROOT_ELEMENT_COLLECTION)
}

/// Interpret a decoded root's items as Glow elements
pub fn root_elements(node: &EmberNode) -> EmberResult<Vec<GlowElement>> {
    if !is_root(node) {
        return Err(EmberError::ber(
            ber_code::TYPE_MISMATCH,
            format!("type 0x{:X} is not a root collection", node.type_number()),
        ));
    }
    let Some(container) = node.as_container() else {
        return Ok(Vec::new());
    };
    interpret_items(container.children())
}
