//! Provider-side request handling
//!
//! The router holds the device tree behind an async lock and interprets
//! decoded Glow roots against it. Directory queries produce a response
//! root; parameter writes and connection edits mutate the tree and publish
//! events through the dispatcher once the lock is released, so every
//! session (the requester included) learns about a change exactly once.

use ember_ber::{EmberNode, Value};
use ember_glow::{
    command_number, root_of, ConnectionDisposition, GlowConnection, GlowElement,
    GlowQualifiedFunction, GlowQualifiedMatrix, GlowQualifiedNode, GlowQualifiedParameter,
    ParameterAccess,
};
use tokio::sync::{broadcast, RwLock};

use crate::dispatcher::{DeviceEvent, Dispatcher};
use crate::element::{DeviceTree, ElementIndex, ElementKind};
use crate::error::{EmberError, EmberResult};
use crate::matrix::{MAXIMUM_GAIN, MINIMUM_GAIN};
use crate::resolver::{resolve, xpoint_address, Resolution};

/// Ember+ provider over a device tree
pub struct Router {
    tree: RwLock<DeviceTree>,
    dispatcher: Dispatcher,
}

impl Router {
    pub fn new(tree: DeviceTree) -> Self {
        Self {
            tree: RwLock::new(tree),
            dispatcher: Dispatcher::default(),
        }
    }

    /// Subscribe to committed device changes
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.dispatcher.subscribe()
    }

    /// Handle one decoded Glow root.
    ///
    /// # Arguments
    /// * `root` - A decoded root element collection
    ///
    /// # Returns
    /// The response root for directory queries, `None` when the root only
    /// carried mutations or nothing actionable
    pub async fn handle_root(&self, root: &EmberNode) -> EmberResult<Option<EmberNode>> {
        let elements = ember_glow::root_elements(root)?;
        let mut responses = Vec::new();
        let mut events = Vec::new();
        {
            let mut tree = self.tree.write().await;
            for element in elements {
                handle_element(&mut tree, &[], element, &mut responses, &mut events)?;
            }
        }
        // fan out only after the lock is gone
        for event in events {
            self.dispatcher.notify(event);
        }
        if responses.is_empty() {
            Ok(None)
        } else {
            root_of(responses).map(Some)
        }
    }
}

fn handle_element(
    tree: &mut DeviceTree,
    prefix: &[u32],
    element: GlowElement,
    responses: &mut Vec<GlowElement>,
    events: &mut Vec<DeviceEvent>,
) -> EmberResult<()> {
    match element {
        GlowElement::Command(command) => match command.number() {
            Some(command_number::GET_DIRECTORY) => list_directory(tree, prefix, responses),
            Some(command_number::SUBSCRIBE) | Some(command_number::UNSUBSCRIBE) => {
                // every session receives every committed change already
                log::debug!("subscription command at {:?} acknowledged", prefix);
                Ok(())
            }
            Some(other) => {
                log::warn!("unsupported command {} at {:?}", other, prefix);
                Ok(())
            }
            None => {
                log::warn!("command without number at {:?}", prefix);
                Ok(())
            }
        },
        GlowElement::Node(node) => {
            let Some(number) = node.number().and_then(|n| u32::try_from(n).ok()) else {
                log::warn!("node without usable number under {:?}", prefix);
                return Ok(());
            };
            let path = join_path(prefix, number);
            for child in node.children()? {
                handle_element(tree, &path, child, responses, events)?;
            }
            Ok(())
        }
        GlowElement::QualifiedNode(node) => {
            let path = node.path().map(<[u32]>::to_vec).unwrap_or_default();
            for child in node.children()? {
                handle_element(tree, &path, child, responses, events)?;
            }
            Ok(())
        }
        GlowElement::Parameter(parameter) => {
            let Some(number) = parameter.number().and_then(|n| u32::try_from(n).ok()) else {
                log::warn!("parameter without usable number under {:?}", prefix);
                return Ok(());
            };
            let path = join_path(prefix, number);
            if let Some(value) = parameter.value() {
                write_parameter(tree, &path, value.clone(), events);
            }
            for child in parameter.children()? {
                handle_element(tree, &path, child, responses, events)?;
            }
            Ok(())
        }
        GlowElement::QualifiedParameter(parameter) => {
            let path = parameter.path().map(<[u32]>::to_vec).unwrap_or_default();
            if let Some(value) = parameter.value() {
                write_parameter(tree, &path, value.clone(), events);
            }
            for child in parameter.children()? {
                handle_element(tree, &path, child, responses, events)?;
            }
            Ok(())
        }
        GlowElement::Matrix(matrix) => {
            let Some(number) = matrix.number().and_then(|n| u32::try_from(n).ok()) else {
                log::warn!("matrix without usable number under {:?}", prefix);
                return Ok(());
            };
            let path = join_path(prefix, number);
            apply_connections(tree, &path, matrix.connections()?, events);
            for child in matrix.children()? {
                handle_element(tree, &path, child, responses, events)?;
            }
            Ok(())
        }
        GlowElement::QualifiedMatrix(matrix) => {
            let path = matrix.path().map(<[u32]>::to_vec).unwrap_or_default();
            apply_connections(tree, &path, matrix.connections()?, events);
            Ok(())
        }
        GlowElement::Function(function) => {
            let Some(number) = function.number().and_then(|n| u32::try_from(n).ok()) else {
                return Ok(());
            };
            let path = join_path(prefix, number);
            for child in function.children()? {
                handle_element(tree, &path, child, responses, events)?;
            }
            Ok(())
        }
        GlowElement::QualifiedFunction(_) => Ok(()),
    }
}

fn join_path(prefix: &[u32], number: u32) -> Vec<u32> {
    let mut path = prefix.to_vec();
    path.push(number);
    path
}

/// Answer a get-directory at `path` with qualified descriptions
fn list_directory(
    tree: &DeviceTree,
    path: &[u32],
    responses: &mut Vec<GlowElement>,
) -> EmberResult<()> {
    if path.is_empty() {
        for &root in tree.roots() {
            responses.push(describe(tree, root)?);
        }
        return Ok(());
    }
    match resolve(tree, path) {
        Resolution::Found(index) => {
            let element = tree
                .element(index)
                .ok_or_else(|| EmberError::PathNotFound(path_text(path)))?;
            if element.children().is_empty() {
                responses.push(describe(tree, index)?);
            } else {
                for &child in element.children() {
                    responses.push(describe(tree, child)?);
                }
            }
            Ok(())
        }
        Resolution::Partial {
            ancestor,
            remaining,
        } => {
            if let Some(address) = xpoint_address(tree, ancestor, &remaining) {
                responses.push(describe_xpoint_gain(tree, ancestor, path, address)?);
            } else {
                log::warn!("get-directory at unknown path {}", path_text(path));
            }
            Ok(())
        }
        Resolution::Miss => {
            log::warn!("get-directory at unknown path {}", path_text(path));
            Ok(())
        }
    }
}

/// Build the qualified description of one element
fn describe(tree: &DeviceTree, index: ElementIndex) -> EmberResult<GlowElement> {
    let element = tree
        .element(index)
        .ok_or_else(|| EmberError::InvalidData(format!("no element at index {}", index)))?;
    let path = tree.path_of(index);
    match &element.kind {
        ElementKind::Node => {
            let mut node = GlowQualifiedNode::new(&path);
            node.set_identifier(&element.identifier);
            if let Some(description) = &element.description {
                node.set_description(description);
            }
            Ok(GlowElement::QualifiedNode(node))
        }
        ElementKind::Parameter(state) => {
            let mut parameter = GlowQualifiedParameter::new(&path);
            parameter.set_identifier(&element.identifier);
            parameter.set_value(state.value.clone());
            if let Some(minimum) = &state.minimum {
                parameter.set_minimum(minimum.clone());
            }
            if let Some(maximum) = &state.maximum {
                parameter.set_maximum(maximum.clone());
            }
            parameter.set_access(state.access);
            Ok(GlowElement::QualifiedParameter(parameter))
        }
        ElementKind::Matrix(state) => {
            let mut matrix = GlowQualifiedMatrix::new(&path);
            matrix.set_identifier(&element.identifier);
            matrix.set_matrix_type(state.matrix_type());
            matrix.set_target_count(state.targets().len() as i64);
            matrix.set_source_count(state.sources().len() as i64);
            for &target in state.targets() {
                matrix.add_target(i64::from(target))?;
            }
            for &source in state.sources() {
                matrix.add_source(i64::from(source))?;
            }
            for target in state.active_targets() {
                let mut connection = GlowConnection::new(i64::from(target));
                connection.set_sources(&state.sources_of(target));
                connection.set_disposition(ConnectionDisposition::Tally);
                matrix.add_connection(connection)?;
            }
            Ok(GlowElement::QualifiedMatrix(matrix))
        }
        ElementKind::Function => {
            let mut function = GlowQualifiedFunction::new(&path);
            function.set_identifier(&element.identifier);
            Ok(GlowElement::QualifiedFunction(function))
        }
    }
}

/// Describe a crosspoint gain synthesized beneath a matrix
fn describe_xpoint_gain(
    tree: &DeviceTree,
    matrix_index: ElementIndex,
    path: &[u32],
    address: crate::resolver::XpointAddress,
) -> EmberResult<GlowElement> {
    let element = tree
        .element(matrix_index)
        .ok_or_else(|| EmberError::InvalidData("matrix element vanished".to_string()))?;
    let gain = element
        .kind
        .as_matrix()
        .and_then(|state| state.gain(address.target, address.source))
        .ok_or_else(|| EmberError::PathNotFound(path_text(path)))?;
    let mut parameter = GlowQualifiedParameter::new(path);
    parameter.set_identifier(&format!("gain-{}-{}", address.target, address.source));
    parameter.set_value(Value::Integer(gain));
    parameter.set_minimum(Value::Integer(MINIMUM_GAIN));
    parameter.set_maximum(Value::Integer(MAXIMUM_GAIN));
    parameter.set_access(ParameterAccess::ReadWrite);
    Ok(GlowElement::QualifiedParameter(parameter))
}

/// Apply a parameter write, publishing an event only on an actual change
fn write_parameter(tree: &mut DeviceTree, path: &[u32], value: Value, events: &mut Vec<DeviceEvent>) {
    match resolve(tree, path) {
        Resolution::Found(index) => {
            let Some(element) = tree.element_mut(index) else {
                return;
            };
            match &mut element.kind {
                ElementKind::Parameter(state) => {
                    if !state.access.is_writable() {
                        log::warn!("write to read-only parameter {} denied", path_text(path));
                        return;
                    }
                    let clamped = state.clamp(value);
                    if state.value != clamped {
                        state.value = clamped.clone();
                        events.push(DeviceEvent::ParameterChanged {
                            path: path.to_vec(),
                            value: clamped,
                        });
                    }
                }
                _ => log::warn!("write to non-parameter {} ignored", path_text(path)),
            }
        }
        Resolution::Partial {
            ancestor,
            remaining,
        } => {
            let Some(address) = xpoint_address(tree, ancestor, &remaining) else {
                log::warn!("write to unknown path {} ignored", path_text(path));
                return;
            };
            let Some(wanted) = value.as_i64() else {
                log::warn!("non-integer gain write at {} ignored", path_text(path));
                return;
            };
            let Some(ElementKind::Matrix(state)) =
                tree.element_mut(ancestor).map(|e| &mut e.kind)
            else {
                return;
            };
            let prior = state.gain(address.target, address.source);
            if let Some(stored) = state.set_gain(address.target, address.source, wanted) {
                if Some(stored) != prior {
                    events.push(DeviceEvent::ParameterChanged {
                        path: path.to_vec(),
                        value: Value::Integer(stored),
                    });
                }
            }
        }
        Resolution::Miss => {
            log::warn!("write to unknown path {} ignored", path_text(path));
        }
    }
}

/// Apply connection edits to the matrix at `path`
fn apply_connections(
    tree: &mut DeviceTree,
    path: &[u32],
    connections: Vec<GlowConnection>,
    events: &mut Vec<DeviceEvent>,
) {
    if connections.is_empty() {
        return;
    }
    let Resolution::Found(index) = resolve(tree, path) else {
        log::warn!("connection edit at unknown path {} ignored", path_text(path));
        return;
    };
    let Some(ElementKind::Matrix(state)) = tree.element_mut(index).map(|e| &mut e.kind) else {
        log::warn!("connection edit at non-matrix {} ignored", path_text(path));
        return;
    };
    for connection in connections {
        let Some(target) = connection.target().and_then(|t| u32::try_from(t).ok()) else {
            log::warn!("connection without usable target at {}", path_text(path));
            continue;
        };
        let sources = connection.sources();
        if let Some(changes) = state.connect(target, &sources, connection.operation()) {
            for change in changes {
                events.push(DeviceEvent::ConnectionChanged {
                    matrix_path: path.to_vec(),
                    target: change.target,
                    sources: change.sources,
                });
            }
        }
    }
}

/// Build the update root a committed event turns into on the wire
pub fn event_root(event: &DeviceEvent) -> EmberResult<EmberNode> {
    match event {
        DeviceEvent::ParameterChanged { path, value } => {
            let mut parameter = GlowQualifiedParameter::new(path);
            parameter.set_value(value.clone());
            root_of(vec![GlowElement::QualifiedParameter(parameter)])
        }
        DeviceEvent::ConnectionChanged {
            matrix_path,
            target,
            sources,
        } => {
            let mut matrix = GlowQualifiedMatrix::new(matrix_path);
            let mut connection = GlowConnection::new(i64::from(*target));
            connection.set_sources(sources);
            connection.set_disposition(ConnectionDisposition::Modified);
            matrix.add_connection(connection)?;
            root_of(vec![GlowElement::QualifiedMatrix(matrix)])
        }
    }
}

fn path_text(path: &[u32]) -> String {
    path.iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(".")
}
