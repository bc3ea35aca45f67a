use thiserror::Error;

/// Errors from backend adapters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Backend I/O failure or unavailability. Never used for misses;
    /// those are `Ok(None)`.
    #[error("backend error: {0}")]
    Backend(String),

    /// A reference name failed git-style validation.
    #[error("invalid reference name {name:?}: {reason}")]
    InvalidReference { name: String, reason: String },

    /// Refusing to store a record at the null id.
    #[error("null id is reserved for the empty-branch sentinel")]
    NullId,
}

pub type StoreResult<T> = Result<T, StoreError>;
