use thiserror::Error;
use tvs_model::{EntityKind, ModelError};
use tvs_store::StoreError;
use tvs_types::Id;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GcError {
    /// A root or tree node points at a record the backend does not have.
    #[error("missing {kind} entity {id}")]
    MissingEntity { kind: EntityKind, id: Id },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type GcResult<T> = Result<T, GcError>;
