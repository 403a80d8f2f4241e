//! Base key-value stores.

use crate::errors::StoreError;
use std::collections::BTreeMap;
use std::ops::{Bound, Deref};
use tokio::sync::OwnedRwLockWriteGuard;

/// A key with its value.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Iteration order for range reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    /// Smallest key first.
    Ascending,
    /// Largest key first.
    Descending,
}

/// Ordered byte key-value store.
///
/// Writes return a result so read-only views can refuse them.
pub trait KvStore {
    /// Value at `key`.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Stores `value` at `key`.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Removes `key`.
    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError>;

    /// Pairs in `[start, end)` in the given order. `None` is unbounded.
    fn range(&self, start: Option<&[u8]>, end: Option<&[u8]>, order: Order) -> Vec<KvPair>;
}

pub(crate) fn bounds<'a>(
    start: Option<&'a [u8]>,
    end: Option<&'a [u8]>,
) -> (Bound<&'a [u8]>, Bound<&'a [u8]>) {
    (
        start.map_or(Bound::Unbounded, Bound::Included),
        end.map_or(Bound::Unbounded, Bound::Excluded),
    )
}

/// Returns true if `start..end` is a non-empty or unbounded interval.
pub(crate) fn valid_range(start: Option<&[u8]>, end: Option<&[u8]>) -> bool {
    match (start, end) {
        (Some(s), Some(e)) => s < e,
        _ => true,
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// In-memory store backed by a `BTreeMap`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).cloned()
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.data.remove(key);
        Ok(())
    }

    fn range(&self, start: Option<&[u8]>, end: Option<&[u8]>, order: Order) -> Vec<KvPair> {
        if !valid_range(start, end) {
            return Vec::new();
        }
        let iter = self
            .data
            .range::<[u8], _>(bounds(start, end))
            .map(|(k, v)| (k.clone(), v.clone()));
        match order {
            Order::Ascending => iter.collect(),
            Order::Descending => iter.rev().collect(),
        }
    }
}

// =============================================================================
// LOCK GUARDS
// =============================================================================

impl<S: KvStore + ?Sized> KvStore for OwnedRwLockWriteGuard<S> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn range(&self, start: Option<&[u8]>, end: Option<&[u8]>, order: Order) -> Vec<KvPair> {
        (**self).range(start, end, order)
    }
}

/// Read-only view over a shared reference or read guard.
pub struct ReadOnlyStore<G>(pub G);

impl<G> KvStore for ReadOnlyStore<G>
where
    G: Deref,
    G::Target: KvStore,
{
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.0.get(key)
    }

    fn set(&mut self, _key: &[u8], _value: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }

    fn delete(&mut self, _key: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }

    fn range(&self, start: Option<&[u8]>, end: Option<&[u8]>, order: Order) -> Vec<KvPair> {
        self.0.range(start, end, order)
    }
}
