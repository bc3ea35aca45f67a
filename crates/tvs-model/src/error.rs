use thiserror::Error;
use tvs_types::Id;

use crate::entity::EntityKind;

/// Errors from entity construction and marshalling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    /// A required attribute was never supplied before `finalize()`.
    #[error("incomplete {kind} entity: missing {missing}")]
    IncompleteEntity { kind: EntityKind, missing: String },

    /// An attribute was supplied more than once.
    #[error("duplicate attribute {attribute:?} on {kind} consumer")]
    DuplicateAttribute {
        kind: EntityKind,
        attribute: &'static str,
    },

    /// The supplied content id does not match the rebuilt entity.
    #[error("id mismatch for {kind} entity: expected {expected}, computed {actual}")]
    IdMismatch {
        kind: EntityKind,
        expected: Id,
        actual: Id,
    },

    /// A record decoded as a different entity kind than requested.
    #[error("kind mismatch: expected {expected}, got {actual}")]
    KindMismatch {
        expected: EntityKind,
        actual: EntityKind,
    },

    /// An index entity must carry at least one bucket.
    #[error("index must have at least one bucket")]
    EmptyIndex,

    #[error("serialization failed: {0}")]
    Serialization(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
