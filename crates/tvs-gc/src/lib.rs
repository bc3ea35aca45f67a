//! Garbage collection support for the version store.
//!
//! Records are content addressed and never deleted on the write path, so
//! aborted commits and rewritten trees leave unreferenced records behind.
//! This crate computes the reachable set from the current reference
//! targets; sweeping is left to the owner of the backend, which knows how
//! and when deletion is safe.

pub mod error;
pub mod walk;

pub use error::{GcError, GcResult};
pub use walk::{collect_reachable, ReachabilityReport};
