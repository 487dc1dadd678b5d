//! Provider-side device tree
//!
//! The tree is an arena of elements addressed by index, with parent links
//! and per-parent child lists. Relative-OID paths map onto child numbers,
//! so every element's number must be unique among its siblings.

use ember_ber::Value;
use ember_glow::ParameterAccess;

use crate::error::{EmberError, EmberResult};
use crate::matrix::MatrixState;

pub type ElementIndex = usize;

/// Mutable state of a parameter element
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterState {
    pub value: Value,
    pub minimum: Option<Value>,
    pub maximum: Option<Value>,
    pub access: ParameterAccess,
}

impl ParameterState {
    pub fn read_only(value: Value) -> Self {
        Self {
            value,
            minimum: None,
            maximum: None,
            access: ParameterAccess::Read,
        }
    }

    pub fn writable(value: Value) -> Self {
        Self {
            value,
            minimum: None,
            maximum: None,
            access: ParameterAccess::ReadWrite,
        }
    }

    /// Clamp an incoming value into the declared bounds, when both the
    /// value and the bounds are numeric
    pub fn clamp(&self, value: Value) -> Value {
        let Value::Integer(mut v) = value else {
            return value;
        };
        if let Some(min) = self.minimum.as_ref().and_then(Value::as_i64) {
            v = v.max(min);
        }
        if let Some(max) = self.maximum.as_ref().and_then(Value::as_i64) {
            v = v.min(max);
        }
        Value::Integer(v)
    }
}

#[derive(Debug)]
pub enum ElementKind {
    Node,
    Parameter(ParameterState),
    Matrix(MatrixState),
    Function,
}

impl ElementKind {
    pub fn as_parameter(&self) -> Option<&ParameterState> {
        match self {
            ElementKind::Parameter(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&MatrixState> {
        match self {
            ElementKind::Matrix(state) => Some(state),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Element {
    pub number: u32,
    pub identifier: String,
    pub description: Option<String>,
    pub kind: ElementKind,
    pub(crate) parent: Option<ElementIndex>,
    pub(crate) children: Vec<ElementIndex>,
}

impl Element {
    pub fn parent(&self) -> Option<ElementIndex> {
        self.parent
    }

    pub fn children(&self) -> &[ElementIndex] {
        &self.children
    }
}

/// The provider's element arena
#[derive(Debug, Default)]
pub struct DeviceTree {
    elements: Vec<Element>,
    roots: Vec<ElementIndex>,
}

impl DeviceTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roots(&self) -> &[ElementIndex] {
        &self.roots
    }

    pub fn element(&self, index: ElementIndex) -> Option<&Element> {
        self.elements.get(index)
    }

    pub fn element_mut(&mut self, index: ElementIndex) -> Option<&mut Element> {
        self.elements.get_mut(index)
    }

    /// Add a top-level element
    pub fn add_root(
        &mut self,
        number: u32,
        identifier: &str,
        kind: ElementKind,
    ) -> EmberResult<ElementIndex> {
        self.attach(None, number, identifier, kind)
    }

    /// Add a child under `parent`
    pub fn add_child(
        &mut self,
        parent: ElementIndex,
        number: u32,
        identifier: &str,
        kind: ElementKind,
    ) -> EmberResult<ElementIndex> {
        if parent >= self.elements.len() {
            return Err(EmberError::InvalidData(format!(
                "no element at index {}",
                parent
            )));
        }
        self.attach(Some(parent), number, identifier, kind)
    }

    fn attach(
        &mut self,
        parent: Option<ElementIndex>,
        number: u32,
        identifier: &str,
        kind: ElementKind,
    ) -> EmberResult<ElementIndex> {
        if self.child_by_number(parent, number).is_some() {
            return Err(EmberError::InvalidData(format!(
                "duplicate element number {} under {}",
                number,
                parent.map_or("root".to_string(), |p| self.path_text(p)),
            )));
        }
        let index = self.elements.len();
        self.elements.push(Element {
            number,
            identifier: identifier.to_string(),
            description: None,
            kind,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(p) => self.elements[p].children.push(index),
            None => self.roots.push(index),
        }
        Ok(index)
    }

    /// The child of `parent` (or the root with `parent` = None) carrying
    /// the given number
    pub fn child_by_number(
        &self,
        parent: Option<ElementIndex>,
        number: u32,
    ) -> Option<ElementIndex> {
        let candidates = match parent {
            Some(p) => self.elements.get(p)?.children.as_slice(),
            None => self.roots.as_slice(),
        };
        candidates
            .iter()
            .copied()
            .find(|&index| self.elements[index].number == number)
    }

    /// The element's full relative-OID path from the root
    pub fn path_of(&self, index: ElementIndex) -> Vec<u32> {
        let mut path = Vec::new();
        let mut cursor = Some(index);
        while let Some(i) = cursor {
            let element = &self.elements[i];
            path.push(element.number);
            cursor = element.parent;
        }
        path.reverse();
        path
    }

    fn path_text(&self, index: ElementIndex) -> String {
        self.path_of(index)
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}
