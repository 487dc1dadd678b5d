//! Fixed per-field tag numbers of the Glow schema
//!
//! All field tags are ContextSpecific class; the numbers below are fixed by
//! the DTD.

/// Items of element/target/source/connection collections
pub const COLLECTION_ITEM: u32 = 0;

/// Top-level fields shared by the element kinds
pub mod element {
    /// Local element number (INTEGER); qualified elements carry a path
    /// (RELATIVE-OID) under the same tag instead
    pub const NUMBER: u32 = 0;
    pub const PATH: u32 = 0;
    pub const CONTENTS: u32 = 1;
    pub const CHILDREN: u32 = 2;
    /// Matrix only
    pub const TARGETS: u32 = 3;
    pub const SOURCES: u32 = 4;
    pub const CONNECTIONS: u32 = 5;
}

/// Fields of a node's contents set
pub mod node_contents {
    pub const IDENTIFIER: u32 = 0;
    pub const DESCRIPTION: u32 = 1;
}

/// Fields of a parameter's contents set
pub mod parameter_contents {
    pub const IDENTIFIER: u32 = 0;
    pub const DESCRIPTION: u32 = 1;
    pub const VALUE: u32 = 2;
    pub const MINIMUM: u32 = 3;
    pub const MAXIMUM: u32 = 4;
    pub const ACCESS: u32 = 5;
}

/// Fields of a matrix's contents set
pub mod matrix_contents {
    pub const IDENTIFIER: u32 = 0;
    pub const DESCRIPTION: u32 = 1;
    pub const TYPE: u32 = 2;
    pub const TARGET_COUNT: u32 = 4;
    pub const SOURCE_COUNT: u32 = 5;
}

/// Fields of a function's contents set
pub mod function_contents {
    pub const IDENTIFIER: u32 = 0;
    pub const DESCRIPTION: u32 = 1;
}

/// Fields of a command element
pub mod command {
    pub const NUMBER: u32 = 0;
    pub const DIR_FIELD_MASK: u32 = 1;
}

/// Fields of a connection element
pub mod connection {
    pub const TARGET: u32 = 0;
    pub const SOURCES: u32 = 1;
    pub const OPERATION: u32 = 2;
    pub const DISPOSITION: u32 = 3;
}

/// Fields of a target/source signal element
pub mod signal {
    pub const NUMBER: u32 = 0;
}
