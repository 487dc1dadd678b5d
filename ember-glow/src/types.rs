//! Glow schema constants and enumerations
//!
//! The application type number assignment is fixed by the Glow DTD and must
//! be reproduced exactly for interop with other Ember+ stacks.

use crate::error::{ber_code, EmberError, EmberResult};

/// Application-defined type numbers of the Glow schema
pub mod glow_type {
    pub const PARAMETER: u32 = 1;
    pub const COMMAND: u32 = 2;
    pub const NODE: u32 = 3;
    pub const ELEMENT_COLLECTION: u32 = 4;
    pub const STREAM_ENTRY: u32 = 5;
    pub const STREAM_COLLECTION: u32 = 6;
    pub const STRING_INTEGER_PAIR: u32 = 7;
    pub const STRING_INTEGER_COLLECTION: u32 = 8;
    pub const QUALIFIED_PARAMETER: u32 = 9;
    pub const QUALIFIED_NODE: u32 = 10;
    pub const ROOT_ELEMENT_COLLECTION: u32 = 11;
    pub const STREAM_DESCRIPTION: u32 = 12;
    pub const MATRIX: u32 = 13;
    pub const TARGET: u32 = 14;
    pub const SOURCE: u32 = 15;
    pub const CONNECTION: u32 = 16;
    pub const QUALIFIED_MATRIX: u32 = 17;
    pub const LABEL: u32 = 18;
    pub const FUNCTION: u32 = 19;
    pub const QUALIFIED_FUNCTION: u32 = 20;
    pub const TUPLE_ITEM_DESCRIPTION: u32 = 21;
    pub const INVOCATION: u32 = 22;
    pub const INVOCATION_RESULT: u32 = 23;
}

/// Tag number of the root element collection node (Application class)
pub const ROOT_TAG_NUMBER: u32 = 30;

/// Command numbers carried in a GlowCommand's number field
pub mod command_number {
    pub const SUBSCRIBE: i64 = 30;
    pub const UNSUBSCRIBE: i64 = 31;
    pub const GET_DIRECTORY: i64 = 32;
    pub const INVOKE: i64 = 33;
}

/// Parameter access rights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterAccess {
    None = 0,
    #[default]
    Read = 1,
    Write = 2,
    ReadWrite = 3,
}

impl ParameterAccess {
    pub fn from_i64(value: i64) -> EmberResult<Self> {
        match value {
            0 => Ok(ParameterAccess::None),
            1 => Ok(ParameterAccess::Read),
            2 => Ok(ParameterAccess::Write),
            3 => Ok(ParameterAccess::ReadWrite),
            other => Err(EmberError::ber(
                ber_code::INVALID_VALUE,
                format!("invalid parameter access {}", other),
            )),
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, ParameterAccess::Write | ParameterAccess::ReadWrite)
    }
}

/// Matrix signal fan-out discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixType {
    /// Each target takes at most one source
    #[default]
    OneToN = 0,
    /// Each target takes at most one source, and each source feeds at most
    /// one target
    OneToOne = 1,
    /// Arbitrary target/source fan-out
    NToN = 2,
}

impl MatrixType {
    pub fn from_i64(value: i64) -> EmberResult<Self> {
        match value {
            0 => Ok(MatrixType::OneToN),
            1 => Ok(MatrixType::OneToOne),
            2 => Ok(MatrixType::NToN),
            other => Err(EmberError::ber(
                ber_code::INVALID_VALUE,
                format!("invalid matrix type {}", other),
            )),
        }
    }
}

/// Requested connection edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionOperation {
    /// Replace the target's source set
    #[default]
    Absolute = 0,
    /// Add sources to the target
    Connect = 1,
    /// Remove sources from the target
    Disconnect = 2,
}

impl ConnectionOperation {
    pub fn from_i64(value: i64) -> EmberResult<Self> {
        match value {
            0 => Ok(ConnectionOperation::Absolute),
            1 => Ok(ConnectionOperation::Connect),
            2 => Ok(ConnectionOperation::Disconnect),
            other => Err(EmberError::ber(
                ber_code::INVALID_VALUE,
                format!("invalid connection operation {}", other),
            )),
        }
    }
}

/// Provider's report on a connection's state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionDisposition {
    #[default]
    Tally = 0,
    Modified = 1,
    Pending = 2,
    Locked = 3,
}
