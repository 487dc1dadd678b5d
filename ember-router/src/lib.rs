//! Router/provider core for Ember+
//!
//! This crate implements the provider side of the protocol: a device tree
//! of nodes, parameters, matrices and functions, relative-OID path
//! resolution with matrix crosspoints synthesized on demand, connection
//! state under the matrix fan-out rules, and the session/listener plumbing
//! that serves consumers over TCP.

pub mod error;
pub mod element;
pub mod matrix;
pub mod resolver;
pub mod dispatcher;
pub mod provider;
pub mod session;
pub mod listener;

pub use dispatcher::{DeviceEvent, Dispatcher};
pub use element::{DeviceTree, Element, ElementIndex, ElementKind, ParameterState};
pub use error::{EmberError, EmberResult};
pub use listener::RouterListener;
pub use matrix::{ConnectionChange, MatrixState, MAXIMUM_GAIN, MINIMUM_GAIN};
pub use provider::{event_root, Router};
pub use resolver::{resolve, xpoint_address, Resolution, XpointAddress};
pub use session::{run_session, SessionConfig};
