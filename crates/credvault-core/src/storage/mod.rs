//! The external key-value store contract.
//!
//! The durable backend is a collaborator, not part of this crate: an
//! ordered, string-keyed store with no transactional guarantees. The
//! session store talks to it exclusively through [`KeyValueStore`].
//! [`MemoryStore`] is the in-process reference implementation, used in
//! tests and as the session's ephemeral scratch store.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use thiserror::Error;

/// Errors surfaced by a storage backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("Storage backend failure: {0}")]
    Backend(String),
}

/// Contract for the persistent key-value backend.
///
/// Mirrors a browser-storage-like surface: get/set/remove plus indexed
/// key enumeration over an ordered key space. Implementations make no
/// atomicity guarantees across calls.
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    /// Fetch the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Number of keys currently stored.
    fn len(&self) -> usize;

    /// The key at position `index` in the store's ordering, or `None`
    /// past the end.
    fn key_at(&self, index: usize) -> Option<String>;

    /// Whether the store holds no keys.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory [`KeyValueStore`] backed by an ordered map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().expect("store mutex poisoned");
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("store mutex poisoned");
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("store mutex poisoned");
        entries.remove(key);
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.lock().expect("store mutex poisoned").len()
    }

    fn key_at(&self, index: usize) -> Option<String> {
        let entries = self.entries.lock().expect("store mutex poisoned");
        entries.keys().nth(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn set_overwrites() {
        let store = MemoryStore::new();
        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_absent_key_is_ok() {
        let store = MemoryStore::new();
        assert!(store.remove("missing").is_ok());
    }

    #[test]
    fn key_enumeration_is_ordered() {
        let store = MemoryStore::new();
        store.set("b", "2").unwrap();
        store.set("a", "1").unwrap();
        store.set("c", "3").unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.key_at(0).as_deref(), Some("a"));
        assert_eq!(store.key_at(1).as_deref(), Some("b"));
        assert_eq!(store.key_at(2).as_deref(), Some("c"));
        assert_eq!(store.key_at(3), None);
    }

    #[test]
    fn empty_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.key_at(0), None);
    }
}
