use thiserror::Error;
use tvs_model::{EntityKind, ModelError};
use tvs_store::StoreError;
use tvs_types::{Id, Key};

use crate::types::KeyConflict;

/// Errors surfaced by the version store.
///
/// Conflict variants carry the fresh state observed at failure time so a
/// caller can decide whether and how to retry. The store itself never
/// retries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    /// The named reference does not exist.
    #[error("reference not found: {0}")]
    ReferenceNotFound(String),

    /// Tried to create a reference that already exists.
    #[error("reference already exists: {0}")]
    ReferenceAlreadyExists(String),

    /// The reference moved between the caller's read and the swap, or the
    /// caller's expectation was stale from the start.
    #[error("reference {name:?} moved: expected {expected:?}, found {current:?}")]
    ReferenceConflict {
        name: String,
        expected: Option<Id>,
        /// Tip observed at failure time; `None` if the reference vanished.
        current: Option<Id>,
    },

    /// One or more per-key expectations were stale at the branch tip.
    #[error("value conflicts on {} key(s)", .0.len())]
    ValueConflict(Vec<KeyConflict>),

    /// Tags only move when the store is configured to allow it.
    #[error("tag {0:?} is immutable")]
    TagImmutable(String),

    /// A tag cannot be created without a commit to point at.
    #[error("tag {0:?} requires a target commit")]
    TagTargetRequired(String),

    /// Two operations in one commit named the same key.
    #[error("duplicate key in commit: {0}")]
    DuplicateKey(Key),

    /// A leaf still overflows at the maximum nesting depth. Raising
    /// `max_depth` or `bucket_count` is a configuration decision.
    #[error("tree depth limit of {max_depth} exceeded")]
    TreeDepthExceeded { max_depth: usize },

    /// A commit or tree node points at a record the backend does not
    /// have. This indicates a corrupt store, not a caller mistake.
    #[error("missing {kind} entity {id}")]
    MissingEntity { kind: EntityKind, id: Id },

    /// Configuration rejected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type VersionResult<T> = Result<T, VersionError>;
