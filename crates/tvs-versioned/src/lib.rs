//! Version control over a tiered key tree.
//!
//! [`VersionStore`] layers a git-like commit graph on any
//! [`tvs_store::EntityStore`]: branches and tags resolve to commit ids,
//! commits point at immutable trees of key fragments, and every write
//! funnels through one optimistic compare-and-swap on the branch
//! reference. Conflicts come back as typed errors carrying the fresh
//! state; retry policy belongs to the caller.

pub mod config;
pub mod error;
pub mod store;
pub mod types;

mod tree;

pub use config::StoreConfig;
pub use error::{VersionError, VersionResult};
pub use store::VersionStore;
pub use types::{
    KeyConflict, LogEntry, Operation, RefKind, ReferenceInfo, DEFAULT_BRANCH,
};
