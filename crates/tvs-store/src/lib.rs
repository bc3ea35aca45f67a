//! Backend adapter layer for the Tiered Version Store.
//!
//! [`EntityStore`] is the contract every backend implements: immutable
//! entity records keyed by content id, plus named references whose only
//! mutation primitive is an atomic per-name compare-and-swap. The commit
//! algorithm upstream is backend-agnostic; a backend supplies this trait
//! and an [`EntityCodec`](tvs_model::EntityCodec) for its record shape.
//!
//! The crate ships the reference implementation pair: an in-memory store
//! ([`InMemoryEntityStore`]) and a JSON document codec ([`DocumentCodec`]).

pub mod document;
pub mod error;
pub mod memory;
pub mod names;
pub mod traits;

pub use document::DocumentCodec;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryEntityStore;
pub use names::validate_reference_name;
pub use traits::EntityStore;
