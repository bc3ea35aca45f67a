//! Foundation types for the Tiered Version Store (TVS).
//!
//! This crate provides the identifier and key model shared by every other
//! TVS crate. Everything here is a pure value type: no I/O, no storage
//! dependencies.
//!
//! # Key Types
//!
//! - [`Id`] — Content-addressed identifier (BLAKE3 hash of canonical bytes)
//! - [`ContentHasher`] — Domain-separated hasher, one domain per entity kind
//! - [`Key`] — Ordered path segments naming one addressable item
//! - [`Payload`] — Opaque type tag carried alongside content references
//! - [`WithPayload`] — A value paired with its payload tag

pub mod error;
pub mod hash;
pub mod id;
pub mod key;
pub mod payload;

pub use error::TypeError;
pub use hash::ContentHasher;
pub use id::Id;
pub use key::Key;
pub use payload::{Payload, WithPayload};
