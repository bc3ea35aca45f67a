use bytes::Bytes;
use tvs_types::Id;

use crate::error::StoreResult;

/// Backend adapter: content-addressed entity records plus named references.
///
/// All implementations must satisfy these invariants:
/// - Entity records are immutable once written; `put_if_absent` never
///   replaces an existing record.
/// - References are the only mutable state, and every reference mutation
///   is atomic per name.
/// - `Ok(None)` means "not present". `Err` is reserved for backend
///   failures, never for misses.
/// - The store never interprets record bytes; a codec owns that mapping.
pub trait EntityStore: Send + Sync {
    /// Read an entity record by content id.
    fn get(&self, id: &Id) -> StoreResult<Option<Bytes>>;

    /// Write an entity record unless one already exists at `id`.
    ///
    /// Returns `true` when this call stored the record, `false` when a
    /// record was already present. Both are success: content addressing
    /// makes a rewrite byte-equivalent.
    fn put_if_absent(&self, id: &Id, bytes: Bytes) -> StoreResult<bool>;

    /// Read several records at once.
    ///
    /// Default implementation calls `get()` for each id. Backends may
    /// override to save round-trips; results stay positionally aligned
    /// with `ids`.
    fn get_batch(&self, ids: &[Id]) -> StoreResult<Vec<Option<Bytes>>> {
        ids.iter().map(|id| self.get(id)).collect()
    }

    /// Current target of a named reference.
    fn get_reference(&self, name: &str) -> StoreResult<Option<Id>>;

    /// Atomically move `name` from `expected` to `new`.
    ///
    /// `expected = None` creates the reference only if absent. Returns
    /// `false` without writing when the current target does not match.
    fn compare_and_swap_reference(
        &self,
        name: &str,
        expected: Option<&Id>,
        new: &Id,
    ) -> StoreResult<bool>;

    /// Delete `name` only while it still points at `expected`. Returns
    /// `false` when the reference is missing or has moved.
    fn delete_reference(&self, name: &str, expected: &Id) -> StoreResult<bool>;

    /// All references, sorted by name.
    fn list_references(&self) -> StoreResult<Vec<(String, Id)>>;
}
