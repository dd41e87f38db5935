//! Identity registry: maps documents to stable integer ids and back.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::data::Document;
use crate::error::{QueryError, Result};
use crate::idset::IdSet;

/// Resolves documents to ids and ids to documents.
pub trait IdentityRegistry: Send + Sync + fmt::Debug {
    /// The id registered for `document`.
    fn id_of(&self, document: &Document) -> Result<u64>;

    /// The document registered under `id`; `NotFound` for unknown ids.
    fn object_of(&self, id: u64) -> Result<Document>;

    /// Every registered id.
    fn all_ids(&self) -> Result<IdSet>;
}

/// An in-memory registry keyed by the documents' external ids.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    entries: RwLock<BTreeMap<u64, Document>>,
    external_id_to_doc_id: RwLock<HashMap<String, u64>>,
    next_id: AtomicU64,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `document` and return its id.
    ///
    /// Registering a document whose external id is already known returns the
    /// existing id and replaces the stored document.
    pub fn register(&self, document: Document) -> Result<u64> {
        let external_id = document
            .id
            .clone()
            .ok_or_else(|| QueryError::invalid_argument("document has no external id"))?;

        let mut ids = self.external_id_to_doc_id.write();
        let doc_id = match ids.get(&external_id) {
            Some(&doc_id) => doc_id,
            None => {
                let doc_id = self.next_id.fetch_add(1, Ordering::SeqCst);
                ids.insert(external_id, doc_id);
                doc_id
            }
        };
        self.entries.write().insert(doc_id, document);
        Ok(doc_id)
    }

    /// Forget the document registered under `doc_id`.
    pub fn unregister(&self, doc_id: u64) -> Result<Document> {
        let document = self
            .entries
            .write()
            .remove(&doc_id)
            .ok_or_else(|| QueryError::not_found(format!("id {doc_id} is not registered")))?;
        if let Some(external_id) = &document.id {
            self.external_id_to_doc_id.write().remove(external_id);
        }
        Ok(document)
    }

    /// Number of registered documents.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl IdentityRegistry for MemoryRegistry {
    fn id_of(&self, document: &Document) -> Result<u64> {
        let external_id = document
            .id
            .as_deref()
            .ok_or_else(|| QueryError::invalid_argument("document has no external id"))?;
        self.external_id_to_doc_id
            .read()
            .get(external_id)
            .copied()
            .ok_or_else(|| {
                QueryError::not_found(format!("document '{external_id}' is not registered"))
            })
    }

    fn object_of(&self, id: u64) -> Result<Document> {
        self.entries
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| QueryError::not_found(format!("id {id} is not registered")))
    }

    fn all_ids(&self) -> Result<IdSet> {
        let entries = self.entries.read();
        Ok(IdSet::from_sorted(entries.keys().copied().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let registry = MemoryRegistry::new();
        let a = registry.register(Document::new_with_id("a")).unwrap();
        let b = registry.register(Document::new_with_id("b")).unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.id_of(&Document::new_with_id("b")).unwrap(), b);
        assert_eq!(registry.object_of(a).unwrap().id.as_deref(), Some("a"));
        assert_eq!(registry.all_ids().unwrap().as_slice(), &[a, b]);
    }

    #[test]
    fn test_reregister_keeps_id() {
        let registry = MemoryRegistry::new();
        let a = registry.register(Document::new_with_id("a")).unwrap();
        let again = registry
            .register(Document::new_with_id("a").add_field("f1", "x"))
            .unwrap();
        assert_eq!(a, again);
        assert!(registry.object_of(a).unwrap().has_field("f1"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = MemoryRegistry::new();
        let a = registry.register(Document::new_with_id("a")).unwrap();
        registry.unregister(a).unwrap();
        assert!(matches!(
            registry.object_of(a),
            Err(QueryError::NotFound(_))
        ));
        assert!(registry.id_of(&Document::new_with_id("a")).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_document_without_id_rejected() {
        let registry = MemoryRegistry::new();
        assert!(matches!(
            registry.register(Document::new()),
            Err(QueryError::InvalidArgument(_))
        ));
    }
}
