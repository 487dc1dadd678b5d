use thiserror::Error;

/// Stable numeric codes for BER decode/encode diagnostics.
///
/// The codes are part of the protocol-level diagnostic surface and must not
/// be renumbered.
pub mod ber_code {
    /// Input ended in the middle of a tag, length or value.
    pub const UNEXPECTED_EOF: u32 = 1;
    /// Tag preamble or continuation bytes are malformed.
    pub const INVALID_TAG: u32 = 2;
    /// Length octets are malformed or exceed the supported range.
    pub const INVALID_LENGTH: u32 = 3;
    /// Value content does not match its declared universal type.
    pub const INVALID_VALUE: u32 = 4;
    /// An element carried a different application type than expected.
    pub const TYPE_MISMATCH: u32 = 5;
    /// Container nesting exceeded the decoder's depth limit.
    pub const NESTING_TOO_DEEP: u32 = 6;
    /// A structurally valid construct this implementation does not accept.
    pub const UNSUPPORTED: u32 = 7;
}

/// Main error type for Ember+ operations
#[derive(Error, Debug)]
pub enum EmberError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Timeout")]
    Timeout,

    #[error("BER error {code}: {message}")]
    Ber { code: u32, message: String },

    #[error("Framing error: {0}")]
    Framing(String),

    #[error("Duplicate tag in set: {0}")]
    DuplicateTag(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Incomplete write: {0} buffered bytes discarded before finish")]
    IncompleteWrite(usize),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl EmberError {
    /// Build a BER error with a stable diagnostic code
    pub fn ber(code: u32, message: impl Into<String>) -> Self {
        EmberError::Ber {
            code,
            message: message.into(),
        }
    }
}

/// Result type alias for Ember+ operations
pub type EmberResult<T> = Result<T, EmberError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ber_error_carries_code() {
        let err = EmberError::ber(ber_code::INVALID_TAG, "bad preamble");
        match err {
            EmberError::Ber { code, .. } => assert_eq!(code, ber_code::INVALID_TAG),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: EmberError = io.into();
        assert!(matches!(err, EmberError::Connection(_)));
    }
}
