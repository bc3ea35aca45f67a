use thiserror::Error;

/// Errors from constructing or parsing foundation types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    /// A key must contain at least one segment.
    #[error("key must not be empty")]
    EmptyKey,

    /// Key segments must be non-empty strings.
    #[error("key segment {index} is empty")]
    EmptySegment { index: usize },

    /// A key segment contains a character reserved by the path syntax.
    #[error("invalid key segment {segment:?}: {reason}")]
    InvalidSegment { segment: String, reason: String },

    /// A hex string could not be decoded.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// A decoded byte string has the wrong length.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
