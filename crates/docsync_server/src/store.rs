//! Persisted documents.

use parking_lot::RwLock;
use std::collections::BTreeMap;

/// A document as persisted by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResource {
    /// Document text.
    pub text: String,
    /// Whether the persisted text has unsaved changes.
    pub dirty: bool,
}

/// Server-side resource store.
///
/// Loading reads from here; sessions start from a copy and never write
/// back.
#[derive(Debug, Default)]
pub struct ResourceStore {
    resources: RwLock<BTreeMap<String, StoredResource>>,
}

impl ResourceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a clean document, replacing any previous one.
    pub fn insert(&self, resource: impl Into<String>, text: impl Into<String>) {
        self.put(
            resource,
            StoredResource {
                text: text.into(),
                dirty: false,
            },
        );
    }

    /// Stores a document.
    pub fn put(&self, resource: impl Into<String>, stored: StoredResource) {
        self.resources.write().insert(resource.into(), stored);
    }

    /// Returns a copy of a document.
    pub fn get(&self, resource: &str) -> Option<StoredResource> {
        self.resources.read().get(resource).cloned()
    }

    /// Returns true if the document exists.
    pub fn contains(&self, resource: &str) -> bool {
        self.resources.read().contains_key(resource)
    }

    /// Removes a document.
    pub fn remove(&self, resource: &str) -> Option<StoredResource> {
        self.resources.write().remove(resource)
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let store = ResourceStore::new();
        assert!(store.is_empty());

        store.insert("a.sm", "state idle end");
        store.put(
            "b.sm",
            StoredResource {
                text: String::new(),
                dirty: true,
            },
        );

        assert_eq!(store.len(), 2);
        assert!(store.contains("a.sm"));
        assert_eq!(store.get("a.sm").map(|r| r.dirty), Some(false));
        assert_eq!(store.get("b.sm").map(|r| r.dirty), Some(true));
        assert_eq!(store.get("c.sm"), None);
    }

    #[test]
    fn insert_replaces() {
        let store = ResourceStore::new();
        store.insert("a.sm", "one");
        store.insert("a.sm", "two");
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a.sm").unwrap().text, "two");

        assert!(store.remove("a.sm").is_some());
        assert!(!store.contains("a.sm"));
    }
}
