//! Entity model and marshalling protocol for the Tiered Version Store.
//!
//! One version of the key space is a three-tier tree of immutable,
//! content-addressed entities: [`CommitNode`] → [`IndexNode`] →
//! [`Fragment`], plus the [`CommitMetadata`] record a commit points at.
//! Backends marshal these through the consumer/producer protocol instead
//! of depending on the typed structs' layout: a producer replays an entity
//! attribute-by-attribute into a backend's consumer, and typed builders
//! rebuild entities from stored records with set-once validation.
//!
//! # Key Types
//!
//! - [`Entity`] / [`EntityKind`] — closed union over the persisted types
//! - [`FragmentConsumer`] et al. — per-entity marshalling traits
//! - [`FragmentBuilder`] et al. — validating consumers producing typed entities
//! - [`EntityCodec`] — bytes-level seam a backend plugs into the store

pub mod codec;
pub mod consumer;
pub mod entity;
pub mod error;

pub use codec::{BincodeCodec, EntityCodec};
pub use consumer::{
    CommitBuilder, CommitConsumer, EntityConsumer, FragmentBuilder, FragmentConsumer,
    IndexBuilder, IndexConsumer, MetadataBuilder, MetadataConsumer,
};
pub use entity::{
    now_ms, CommitMetadata, CommitNode, Entity, EntityKind, Fragment, IndexNode, KeyEntry,
    Mutation, TreeRef,
};
pub use error::{ModelError, ModelResult};
