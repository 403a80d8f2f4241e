//! # State Arena
//!
//! Copy-on-write overlays on top of a base store, addressed by [`ScopeId`].
//!
//! The root scope always exists and buffers every write of the transaction
//! until [`StateArena::flush`]. Nested scopes are opened with a parent and
//! must be committed into it or discarded before the parent closes.

use crate::errors::StoreError;
use crate::store::kv::{bounds, valid_range, KvPair, KvStore, Order};
use std::collections::BTreeMap;

/// Handle of an overlay scope.
pub type ScopeId = usize;

/// Scope that every transaction starts in.
pub const ROOT_SCOPE: ScopeId = 0;

type Writes = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

#[derive(Debug, Default)]
struct Overlay {
    parent: Option<ScopeId>,
    writes: Writes,
    children: usize,
}

/// Base store plus overlay scopes.
pub struct StateArena {
    base: Box<dyn KvStore + Send>,
    scopes: Vec<Option<Overlay>>,
}

impl std::fmt::Debug for StateArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateArena")
            .field("live_scopes", &self.live_scopes())
            .finish_non_exhaustive()
    }
}

impl StateArena {
    /// Arena over `base` with only the root scope open.
    #[must_use]
    pub fn new(base: Box<dyn KvStore + Send>) -> Self {
        Self {
            base,
            scopes: vec![Some(Overlay::default())],
        }
    }

    /// Number of open scopes, root included.
    #[must_use]
    pub fn live_scopes(&self) -> usize {
        self.scopes.iter().filter(|s| s.is_some()).count()
    }

    /// Opens a child of `parent`.
    pub fn open_scope(&mut self, parent: ScopeId) -> Result<ScopeId, StoreError> {
        self.overlay_mut(parent)?.children += 1;
        self.scopes.push(Some(Overlay {
            parent: Some(parent),
            ..Overlay::default()
        }));
        Ok(self.scopes.len() - 1)
    }

    /// Merges `scope` into its parent and closes it.
    pub fn commit(&mut self, scope: ScopeId) -> Result<(), StoreError> {
        let overlay = self.close(scope)?;
        let parent = overlay.parent.ok_or(StoreError::RootScope)?;
        let target = self.overlay_mut(parent)?;
        target.writes.extend(overlay.writes);
        target.children -= 1;
        Ok(())
    }

    /// Drops `scope` and all its writes.
    pub fn discard(&mut self, scope: ScopeId) -> Result<(), StoreError> {
        let overlay = self.close(scope)?;
        let parent = overlay.parent.ok_or(StoreError::RootScope)?;
        self.overlay_mut(parent)?.children -= 1;
        Ok(())
    }

    /// Writes the root scope into the base store.
    ///
    /// All nested scopes must be closed.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        let open = self.live_scopes();
        if open > 1 {
            return Err(StoreError::OpenChildren(ROOT_SCOPE));
        }
        let writes = std::mem::take(&mut self.overlay_mut(ROOT_SCOPE)?.writes);
        for (key, value) in writes {
            match value {
                Some(v) => self.base.set(&key, &v)?,
                None => self.base.delete(&key)?,
            }
        }
        Ok(())
    }

    /// Value of `key` as seen from `scope`.
    pub fn get(&self, scope: ScopeId, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        for id in self.chain(scope)? {
            if let Some(entry) = self.overlay(id)?.writes.get(key) {
                return Ok(entry.clone());
            }
        }
        Ok(self.base.get(key))
    }

    /// Sets `key` in `scope`.
    pub fn set(&mut self, scope: ScopeId, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.overlay_mut(scope)?
            .writes
            .insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    /// Deletes `key` in `scope`.
    pub fn delete(&mut self, scope: ScopeId, key: &[u8]) -> Result<(), StoreError> {
        self.overlay_mut(scope)?.writes.insert(key.to_vec(), None);
        Ok(())
    }

    /// Pairs in `[start, end)` as seen from `scope`.
    pub fn range(
        &self,
        scope: ScopeId,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> Result<Vec<KvPair>, StoreError> {
        if !valid_range(start, end) {
            return Ok(Vec::new());
        }
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .base
            .range(start, end, Order::Ascending)
            .into_iter()
            .collect();
        let chain = self.chain(scope)?;
        // outermost first so inner writes win
        for id in chain.into_iter().rev() {
            let overlay = self.overlay(id)?;
            for (key, value) in overlay.writes.range::<[u8], _>(bounds(start, end)) {
                match value {
                    Some(v) => {
                        merged.insert(key.clone(), v.clone());
                    }
                    None => {
                        merged.remove(key);
                    }
                }
            }
        }
        Ok(match order {
            Order::Ascending => merged.into_iter().collect(),
            Order::Descending => merged.into_iter().rev().collect(),
        })
    }

    /// Pairs whose key starts with `prefix`, as seen from `scope`.
    pub fn prefix_range(
        &self,
        scope: ScopeId,
        prefix: &[u8],
        order: Order,
    ) -> Result<Vec<KvPair>, StoreError> {
        let end = prefix_end(prefix);
        self.range(scope, Some(prefix), end.as_deref(), order)
    }

    fn chain(&self, scope: ScopeId) -> Result<Vec<ScopeId>, StoreError> {
        let mut ids = Vec::new();
        let mut next = Some(scope);
        while let Some(id) = next {
            ids.push(id);
            next = self.overlay(id)?.parent;
        }
        Ok(ids)
    }

    fn close(&mut self, scope: ScopeId) -> Result<Overlay, StoreError> {
        if scope == ROOT_SCOPE {
            return Err(StoreError::RootScope);
        }
        let children = self.overlay(scope)?.children;
        if children > 0 {
            return Err(StoreError::OpenChildren(scope));
        }
        let overlay = self
            .scopes
            .get_mut(scope)
            .and_then(Option::take)
            .ok_or(StoreError::UnknownScope(scope))?;
        // closed slots at the tail are released so ids are handed out again
        while self.scopes.len() > 1 && matches!(self.scopes.last(), Some(None)) {
            self.scopes.pop();
        }
        Ok(overlay)
    }

    fn overlay(&self, scope: ScopeId) -> Result<&Overlay, StoreError> {
        self.scopes
            .get(scope)
            .and_then(Option::as_ref)
            .ok_or(StoreError::UnknownScope(scope))
    }

    fn overlay_mut(&mut self, scope: ScopeId) -> Result<&mut Overlay, StoreError> {
        self.scopes
            .get_mut(scope)
            .and_then(Option::as_mut)
            .ok_or(StoreError::UnknownScope(scope))
    }
}

/// Smallest key greater than every key starting with `prefix`.
///
/// `None` when no such key exists (empty or all `0xff`).
#[must_use]
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::kv::MemStore;

    fn arena() -> StateArena {
        let mut base = MemStore::new();
        base.set(b"k1", b"base").unwrap();
        base.set(b"k2", b"base").unwrap();
        StateArena::new(Box::new(base))
    }

    #[test]
    fn test_discard_drops_writes() {
        let mut arena = arena();
        let scope = arena.open_scope(ROOT_SCOPE).unwrap();
        arena.set(scope, b"k1", b"child").unwrap();
        assert_eq!(arena.get(scope, b"k1").unwrap(), Some(b"child".to_vec()));
        arena.discard(scope).unwrap();
        assert_eq!(arena.get(ROOT_SCOPE, b"k1").unwrap(), Some(b"base".to_vec()));
        assert_eq!(arena.live_scopes(), 1);
    }

    #[test]
    fn test_commit_merges_into_parent() {
        let mut arena = arena();
        let outer = arena.open_scope(ROOT_SCOPE).unwrap();
        let inner = arena.open_scope(outer).unwrap();
        arena.delete(inner, b"k2").unwrap();
        arena.set(inner, b"k3", b"new").unwrap();
        arena.commit(inner).unwrap();
        assert_eq!(arena.get(outer, b"k2").unwrap(), None);
        assert_eq!(arena.get(ROOT_SCOPE, b"k2").unwrap(), Some(b"base".to_vec()));
        arena.commit(outer).unwrap();
        assert_eq!(arena.get(ROOT_SCOPE, b"k3").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn test_sibling_writes_invisible() {
        let mut arena = arena();
        let a = arena.open_scope(ROOT_SCOPE).unwrap();
        arena.set(a, b"x", b"a").unwrap();
        arena.discard(a).unwrap();
        let b = arena.open_scope(ROOT_SCOPE).unwrap();
        assert_eq!(arena.get(b, b"x").unwrap(), None);
    }

    #[test]
    fn test_closed_scopes_release_their_slots() {
        let mut arena = arena();
        for i in 0..1_000u32 {
            let outer = arena.open_scope(ROOT_SCOPE).unwrap();
            let inner = arena.open_scope(outer).unwrap();
            arena.set(inner, &i.to_be_bytes(), b"v").unwrap();
            arena.commit(inner).unwrap();
            if i % 2 == 0 {
                arena.commit(outer).unwrap();
            } else {
                arena.discard(outer).unwrap();
            }
        }
        assert_eq!(arena.scopes.len(), 1);
        assert_eq!(arena.live_scopes(), 1);
        assert_eq!(arena.prefix_range(ROOT_SCOPE, &[0, 0], Order::Ascending).unwrap().len(), 500);
    }

    #[test]
    fn test_out_of_order_close_keeps_open_scopes() {
        let mut arena = arena();
        let a = arena.open_scope(ROOT_SCOPE).unwrap();
        let b = arena.open_scope(ROOT_SCOPE).unwrap();
        arena.set(a, b"kept", b"a").unwrap();
        arena.discard(b).unwrap();
        arena.commit(a).unwrap();
        assert_eq!(arena.get(ROOT_SCOPE, b"kept").unwrap(), Some(b"a".to_vec()));
        assert_eq!(arena.scopes.len(), 1);
    }

    #[test]
    fn test_close_rules() {
        let mut arena = arena();
        assert_eq!(arena.commit(ROOT_SCOPE), Err(StoreError::RootScope));
        let outer = arena.open_scope(ROOT_SCOPE).unwrap();
        let _inner = arena.open_scope(outer).unwrap();
        assert_eq!(arena.commit(outer), Err(StoreError::OpenChildren(outer)));
        assert!(arena.flush().is_err());
        assert_eq!(arena.discard(99), Err(StoreError::UnknownScope(99)));
    }

    #[test]
    fn test_range_merges_layers() {
        let mut arena = arena();
        arena.set(ROOT_SCOPE, b"k0", b"root").unwrap();
        let scope = arena.open_scope(ROOT_SCOPE).unwrap();
        arena.delete(scope, b"k1").unwrap();
        arena.set(scope, b"k2", b"child").unwrap();

        let pairs = arena.prefix_range(scope, b"k", Order::Ascending).unwrap();
        assert_eq!(
            pairs,
            vec![
                (b"k0".to_vec(), b"root".to_vec()),
                (b"k2".to_vec(), b"child".to_vec())
            ]
        );
        let rev = arena.prefix_range(scope, b"k", Order::Descending).unwrap();
        assert_eq!(rev[0].0, b"k2".to_vec());
    }

    #[test]
    fn test_flush_writes_base() {
        let mut arena = arena();
        arena.set(ROOT_SCOPE, b"k9", b"v").unwrap();
        arena.delete(ROOT_SCOPE, b"k1").unwrap();
        arena.flush().unwrap();
        let fresh = arena.prefix_range(ROOT_SCOPE, b"k", Order::Ascending).unwrap();
        assert_eq!(fresh.len(), 2);
    }

    #[test]
    fn test_prefix_end() {
        assert_eq!(prefix_end(&[1, 2]), Some(vec![1, 3]));
        assert_eq!(prefix_end(&[1, 0xff]), Some(vec![2]));
        assert_eq!(prefix_end(&[0xff]), None);
    }
}
