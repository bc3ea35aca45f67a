//! In-memory backend for testing and ephemeral use.
//!
//! [`InMemoryEntityStore`] keeps entity records and references in
//! `HashMap`s behind `RwLock`s. It is the reference implementation of the
//! [`EntityStore`] contract and suitable for unit tests and short-lived
//! embedding.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use tvs_types::Id;

use crate::error::{StoreError, StoreResult};
use crate::names::validate_reference_name;
use crate::traits::EntityStore;

/// An in-memory implementation of [`EntityStore`].
///
/// All data is lost when the store is dropped. Reference mutations hold
/// the write lock for the compare and the swap together, which gives the
/// per-name atomicity the contract requires.
pub struct InMemoryEntityStore {
    entities: RwLock<HashMap<Id, Bytes>>,
    references: RwLock<HashMap<String, Id>>,
}

impl InMemoryEntityStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            references: RwLock::new(HashMap::new()),
        }
    }

    /// Number of entity records currently stored.
    pub fn len(&self) -> usize {
        self.entities.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no entity records are stored.
    pub fn is_empty(&self) -> bool {
        self.entities.read().expect("lock poisoned").is_empty()
    }

    /// Number of references currently stored.
    pub fn reference_count(&self) -> usize {
        self.references.read().expect("lock poisoned").len()
    }

    /// A sorted list of every stored entity id. Used by collectors to
    /// compute the unreachable set.
    pub fn all_ids(&self) -> Vec<Id> {
        let map = self.entities.read().expect("lock poisoned");
        let mut ids: Vec<Id> = map.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Remove an entity record. Returns `true` if it existed.
    ///
    /// Intended for garbage collection only; deleting a reachable record
    /// corrupts every tree that points at it.
    pub fn remove(&self, id: &Id) -> bool {
        self.entities
            .write()
            .expect("lock poisoned")
            .remove(id)
            .is_some()
    }
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore for InMemoryEntityStore {
    fn get(&self, id: &Id) -> StoreResult<Option<Bytes>> {
        let map = self.entities.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn put_if_absent(&self, id: &Id, bytes: Bytes) -> StoreResult<bool> {
        if id.is_null() {
            return Err(StoreError::NullId);
        }
        let mut map = self.entities.write().expect("lock poisoned");
        match map.entry(*id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(bytes);
                Ok(true)
            }
        }
    }

    fn get_reference(&self, name: &str) -> StoreResult<Option<Id>> {
        let refs = self.references.read().expect("lock poisoned");
        Ok(refs.get(name).copied())
    }

    fn compare_and_swap_reference(
        &self,
        name: &str,
        expected: Option<&Id>,
        new: &Id,
    ) -> StoreResult<bool> {
        validate_reference_name(name)?;
        let mut refs = self.references.write().expect("lock poisoned");
        let swapped = match (refs.get(name), expected) {
            (None, None) => {
                refs.insert(name.to_string(), *new);
                true
            }
            (Some(current), Some(expected)) if current == expected => {
                refs.insert(name.to_string(), *new);
                true
            }
            _ => false,
        };
        Ok(swapped)
    }

    fn delete_reference(&self, name: &str, expected: &Id) -> StoreResult<bool> {
        let mut refs = self.references.write().expect("lock poisoned");
        match refs.get(name) {
            Some(current) if current == expected => {
                refs.remove(name);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn list_references(&self) -> StoreResult<Vec<(String, Id)>> {
        let refs = self.references.read().expect("lock poisoned");
        let mut result: Vec<(String, Id)> =
            refs.iter().map(|(k, v)| (k.clone(), *v)).collect();
        result.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(result)
    }
}

impl std::fmt::Debug for InMemoryEntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEntityStore")
            .field("entity_count", &self.len())
            .field("reference_count", &self.reference_count())
            .finish()
    }
}
