//! Matrix family of Glow elements
//!
//! A matrix carries its targets, sources and connections in dedicated
//! collections beside the usual contents/children fields. Targets and
//! sources are plain numbered signals; connections describe one target's
//! source set together with the requested operation and, in provider
//! responses, the resulting disposition.

use ember_ber::{ber_type, BerTag, EmberNode, Value};

use crate::element::{
    collection_elements, contents_value, element_node, ensure_collection, expect_type,
    field_value, put_contents_field, put_field, GlowElement,
};
use crate::error::EmberResult;
use crate::tags;
use crate::types::{glow_type, ConnectionDisposition, ConnectionOperation, MatrixType};

/// Numbers of every signal in the collection under `tag_number`
fn signal_numbers(node: &EmberNode, tag_number: u32) -> Vec<i64> {
    let Some(collection) = node.child(BerTag::context(tag_number)) else {
        return Vec::new();
    };
    let Some(container) = collection.as_container() else {
        return Vec::new();
    };
    container
        .children()
        .iter()
        .filter_map(|item| field_value(item, tags::signal::NUMBER)?.as_i64())
        .collect()
}

fn push_signal(
    node: &mut EmberNode,
    tag_number: u32,
    type_number: u32,
    number: i64,
) -> EmberResult<()> {
    let collection = ensure_collection(node, tag_number, ber_type::SEQUENCE)?;
    let mut signal = element_node(type_number);
    put_field(&mut signal, tags::signal::NUMBER, Value::Integer(number));
    collection.insert(signal)
}

/// A Glow matrix element
#[derive(Debug, Clone, PartialEq)]
pub struct GlowMatrix(EmberNode);

impl GlowMatrix {
    pub fn new(number: i64) -> Self {
        let mut node = element_node(glow_type::MATRIX);
        put_field(&mut node, tags::element::NUMBER, Value::Integer(number));
        Self(node)
    }

    pub(crate) fn wrap(node: EmberNode) -> Self {
        Self(node)
    }

    pub fn from_node(node: EmberNode) -> EmberResult<Self> {
        expect_type(&node, glow_type::MATRIX, "matrix")?;
        Ok(Self(node))
    }

    pub fn number(&self) -> Option<i64> {
        field_value(&self.0, tags::element::NUMBER)?.as_i64()
    }

    pub fn identifier(&self) -> Option<&str> {
        contents_value(&self.0, tags::matrix_contents::IDENTIFIER)?.as_str()
    }

    pub fn set_identifier(&mut self, identifier: &str) {
        put_contents_field(
            &mut self.0,
            tags::matrix_contents::IDENTIFIER,
            Value::Utf8String(identifier.to_string()),
        );
    }

    /// The matrix fan-out type; absent contents default to 1:N
    pub fn matrix_type(&self) -> MatrixType {
        contents_value(&self.0, tags::matrix_contents::TYPE)
            .and_then(Value::as_i64)
            .and_then(|v| MatrixType::from_i64(v).ok())
            .unwrap_or_default()
    }

    pub fn set_matrix_type(&mut self, matrix_type: MatrixType) {
        put_contents_field(
            &mut self.0,
            tags::matrix_contents::TYPE,
            Value::Integer(matrix_type as i64),
        );
    }

    pub fn target_count(&self) -> Option<i64> {
        contents_value(&self.0, tags::matrix_contents::TARGET_COUNT)?.as_i64()
    }

    pub fn source_count(&self) -> Option<i64> {
        contents_value(&self.0, tags::matrix_contents::SOURCE_COUNT)?.as_i64()
    }

    pub fn set_target_count(&mut self, count: i64) {
        put_contents_field(
            &mut self.0,
            tags::matrix_contents::TARGET_COUNT,
            Value::Integer(count),
        );
    }

    pub fn set_source_count(&mut self, count: i64) {
        put_contents_field(
            &mut self.0,
            tags::matrix_contents::SOURCE_COUNT,
            Value::Integer(count),
        );
    }

    pub fn targets(&self) -> Vec<i64> {
        signal_numbers(&self.0, tags::element::TARGETS)
    }

    pub fn sources(&self) -> Vec<i64> {
        signal_numbers(&self.0, tags::element::SOURCES)
    }

    pub fn add_target(&mut self, number: i64) -> EmberResult<()> {
        push_signal(
            &mut self.0,
            tags::element::TARGETS,
            glow_type::TARGET,
            number,
        )
    }

    pub fn add_source(&mut self, number: i64) -> EmberResult<()> {
        push_signal(
            &mut self.0,
            tags::element::SOURCES,
            glow_type::SOURCE,
            number,
        )
    }

    pub fn connections(&self) -> EmberResult<Vec<GlowConnection>> {
        let Some(collection) = self.0.child(BerTag::context(tags::element::CONNECTIONS)) else {
            return Ok(Vec::new());
        };
        let Some(container) = collection.as_container() else {
            return Ok(Vec::new());
        };
        container
            .children()
            .iter()
            .cloned()
            .map(GlowConnection::from_node)
            .collect()
    }

    pub fn add_connection(&mut self, connection: GlowConnection) -> EmberResult<()> {
        let collection =
            ensure_collection(&mut self.0, tags::element::CONNECTIONS, ber_type::SEQUENCE)?;
        collection.insert(connection.into_node())
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

/// A Glow matrix addressed by a full relative-OID path
#[derive(Debug, Clone, PartialEq)]
pub struct GlowQualifiedMatrix(EmberNode);

impl GlowQualifiedMatrix {
    pub fn new(path: &[u32]) -> Self {
        let mut node = element_node(glow_type::QUALIFIED_MATRIX);
        put_field(
            &mut node,
            tags::element::PATH,
            Value::RelativeOid(path.to_vec()),
        );
        Self(node)
    }

    pub(crate) fn wrap(node: EmberNode) -> Self {
        Self(node)
    }

    pub fn from_node(node: EmberNode) -> EmberResult<Self> {
        expect_type(&node, glow_type::QUALIFIED_MATRIX, "qualified matrix")?;
        Ok(Self(node))
    }

    pub fn path(&self) -> Option<&[u32]> {
        field_value(&self.0, tags::element::PATH)?.as_oid()
    }

    pub fn identifier(&self) -> Option<&str> {
        contents_value(&self.0, tags::matrix_contents::IDENTIFIER)?.as_str()
    }

    pub fn set_identifier(&mut self, identifier: &str) {
        put_contents_field(
            &mut self.0,
            tags::matrix_contents::IDENTIFIER,
            Value::Utf8String(identifier.to_string()),
        );
    }

    pub fn matrix_type(&self) -> MatrixType {
        contents_value(&self.0, tags::matrix_contents::TYPE)
            .and_then(Value::as_i64)
            .and_then(|v| MatrixType::from_i64(v).ok())
            .unwrap_or_default()
    }

    pub fn set_matrix_type(&mut self, matrix_type: MatrixType) {
        put_contents_field(
            &mut self.0,
            tags::matrix_contents::TYPE,
            Value::Integer(matrix_type as i64),
        );
    }

    pub fn set_target_count(&mut self, count: i64) {
        put_contents_field(
            &mut self.0,
            tags::matrix_contents::TARGET_COUNT,
            Value::Integer(count),
        );
    }

    pub fn set_source_count(&mut self, count: i64) {
        put_contents_field(
            &mut self.0,
            tags::matrix_contents::SOURCE_COUNT,
            Value::Integer(count),
        );
    }

    pub fn targets(&self) -> Vec<i64> {
        signal_numbers(&self.0, tags::element::TARGETS)
    }

    pub fn sources(&self) -> Vec<i64> {
        signal_numbers(&self.0, tags::element::SOURCES)
    }

    pub fn add_target(&mut self, number: i64) -> EmberResult<()> {
        push_signal(
            &mut self.0,
            tags::element::TARGETS,
            glow_type::TARGET,
            number,
        )
    }

    pub fn add_source(&mut self, number: i64) -> EmberResult<()> {
        push_signal(
            &mut self.0,
            tags::element::SOURCES,
            glow_type::SOURCE,
            number,
        )
    }

    pub fn connections(&self) -> EmberResult<Vec<GlowConnection>> {
        GlowMatrix(self.0.clone()).connections()
    }

    pub fn add_connection(&mut self, connection: GlowConnection) -> EmberResult<()> {
        let collection =
            ensure_collection(&mut self.0, tags::element::CONNECTIONS, ber_type::SEQUENCE)?;
        collection.insert(connection.into_node())
    }

    pub fn node(&self) -> &EmberNode {
        &self.0
    }

    pub fn into_node(self) -> EmberNode {
        self.0
    }
}

/// One target's source set plus the requested operation/disposition
#[derive(Debug, Clone, PartialEq)]
pub struct GlowConnection(EmberNode);

impl GlowConnection {
    pub fn new(target: i64) -> Self {
        let mut node = element_node(glow_type::CONNECTION);
        put_field(&mut node, tags::connection::TARGET, Value::Integer(target));
        Self(node)
    }

    pub fn from_node(node: EmberNode) -> EmberResult<Self> {
        expect_type(&node, glow_type::CONNECTION, "connection")?;
        Ok(Self(node))
    }

    pub fn target(&self) -> Option<i64> {
        field_value(&self.0, tags::connection::TARGET)?.as_i64()
    }

    /// Source numbers; absent field means an empty set
    pub fn sources(&self) -> Vec<u32> {
        field_value(&self.0, tags::connection::SOURCES)
            .and_then(Value::as_oid)
            .map(|oid| oid.to_vec())
            .unwrap_or_default()
    }

    pub fn set_sources(&mut self, sources: &[u32]) {
        put_field(
            &mut self.0,
            tags::connection::SOURCES,
            Value::RelativeOid(sources.to_vec()),
        );
    }

    /// The requested operation; absent field defaults to absolute
    pub fn operation(&self) -> ConnectionOperation {
        field_value(&self.0, tags::connection::OPERATION)
            .and_then(Value::as_i64)
            .and_then(|v| ConnectionOperation::from_i64(v).ok())
            .unwrap_or_default()
    }

    pub fn set_operation(&mut self, operation: ConnectionOperation) {
        put_field(
            &mut self.0,
            tags::connection::OPERATION,
            Value::Integer(operation as i64),
        );
    }

    pub fn set_disposition(&mut self, disposition: ConnectionDisposition) {
        put_field(
            &mut self.0,
            tags::connection::DISPOSITION,
            Value::Integer(disposition as i64),
        );
    }

    pub fn node(&self) -> &EmberNode {
        &self.0
    }

    pub fn into_node(self) -> EmberNode {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{root_elements, root_of};
    use ember_ber::AsyncBerReader;

    #[test]
    fn test_matrix_roundtrip() {
        let mut matrix = GlowMatrix::new(4);
        matrix.set_identifier("router");
        matrix.set_matrix_type(MatrixType::OneToOne);
        matrix.set_target_count(2);
        matrix.set_source_count(2);
        matrix.add_target(0).unwrap();
        matrix.add_target(1).unwrap();
        matrix.add_source(0).unwrap();
        matrix.add_source(1).unwrap();

        let mut connection = GlowConnection::new(1);
        connection.set_sources(&[0]);
        connection.set_operation(ConnectionOperation::Connect);
        matrix.add_connection(connection).unwrap();

        let root = root_of(vec![GlowElement::Matrix(matrix)]).unwrap();
        let bytes = root.to_bytes();

        let mut reader = AsyncBerReader::new();
        let decoded = reader.feed_all(&bytes).unwrap().pop().unwrap();
        let elements = root_elements(&decoded).unwrap();
        let GlowElement::Matrix(matrix) = &elements[0] else {
            panic!("expected a matrix element");
        };

        assert_eq!(matrix.number(), Some(4));
        assert_eq!(matrix.identifier(), Some("router"));
        assert_eq!(matrix.matrix_type(), MatrixType::OneToOne);
        assert_eq!(matrix.targets(), vec![0, 1]);
        assert_eq!(matrix.sources(), vec![0, 1]);

        let connections = matrix.connections().unwrap();
        assert_eq!(connections.len(), 1);
        assert_eq!(connections[0].target(), Some(1));
        assert_eq!(connections[0].sources(), vec![0]);
        assert_eq!(connections[0].operation(), ConnectionOperation::Connect);
    }

    #[test]
    fn test_matrix_type_defaults_to_one_to_n() {
        let matrix = GlowMatrix::new(0);
        assert_eq!(matrix.matrix_type(), MatrixType::OneToN);
    }

    #[test]
    fn test_connection_defaults() {
        let connection = GlowConnection::new(3);
        assert_eq!(connection.target(), Some(3));
        assert!(connection.sources().is_empty());
        assert_eq!(connection.operation(), ConnectionOperation::Absolute);
    }
}
