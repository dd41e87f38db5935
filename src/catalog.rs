//! Named catalogs of indexes and the explicit lookup context terms evaluate in.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::error::{QueryError, Result};
use crate::index::{Index, IndexRef};
use crate::registry::IdentityRegistry;

/// Resolves indexes and the identity registry for a scope.
pub trait ServiceLocator: Send + Sync + fmt::Debug {
    /// The index bound under `index_ref`; `NotFound` when absent.
    fn index(&self, index_ref: &IndexRef) -> Result<Arc<dyn Index>>;

    /// The identity registry of this scope.
    fn registry(&self) -> Arc<dyn IdentityRegistry>;
}

/// A named collection of indexes.
#[derive(Debug, Default)]
pub struct Catalog {
    indexes: RwLock<AHashMap<String, Arc<dyn Index>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `index` under its own name, replacing any index of that name.
    pub fn add_index(&self, index: Arc<dyn Index>) {
        self.indexes.write().insert(index.name().to_string(), index);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Index>> {
        self.indexes.read().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn Index>> {
        self.indexes.write().remove(name)
    }

    /// Names of the bound indexes, sorted.
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// A locator over named catalogs sharing one identity registry.
#[derive(Debug)]
pub struct CatalogLocator {
    catalogs: RwLock<AHashMap<String, Arc<Catalog>>>,
    registry: Arc<dyn IdentityRegistry>,
}

impl CatalogLocator {
    pub fn new(registry: Arc<dyn IdentityRegistry>) -> Self {
        CatalogLocator {
            catalogs: RwLock::new(AHashMap::new()),
            registry,
        }
    }

    /// Register `catalog` under `name`, replacing any catalog of that name.
    pub fn add_catalog(&self, name: impl Into<String>, catalog: Arc<Catalog>) {
        self.catalogs.write().insert(name.into(), catalog);
    }

    pub fn catalog(&self, name: &str) -> Option<Arc<Catalog>> {
        self.catalogs.read().get(name).cloned()
    }
}

impl ServiceLocator for CatalogLocator {
    fn index(&self, index_ref: &IndexRef) -> Result<Arc<dyn Index>> {
        let catalog = self.catalog(&index_ref.catalog).ok_or_else(|| {
            QueryError::not_found(format!("catalog '{}' not found", index_ref.catalog))
        })?;
        catalog.get(&index_ref.index).ok_or_else(|| {
            QueryError::not_found(format!(
                "index '{}' not found in catalog '{}'",
                index_ref.index, index_ref.catalog
            ))
        })
    }

    fn registry(&self) -> Arc<dyn IdentityRegistry> {
        self.registry.clone()
    }
}

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// The lookup root a query is evaluated against.
///
/// Each context gets a process-unique id at construction; clones share it.
/// Caches compare ids to detect a context switch, since the same term key
/// may resolve to a different index under another context.
#[derive(Debug, Clone)]
pub struct Context {
    id: u64,
    locator: Arc<dyn ServiceLocator>,
}

impl Context {
    pub fn new(locator: Arc<dyn ServiceLocator>) -> Self {
        Context {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            locator,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resolve the index bound under `index_ref`.
    pub fn index(&self, index_ref: &IndexRef) -> Result<Arc<dyn Index>> {
        self.locator.index(index_ref)
    }

    pub fn registry(&self) -> Arc<dyn IdentityRegistry> {
        self.locator.registry()
    }

    pub fn locator(&self) -> &Arc<dyn ServiceLocator> {
        &self.locator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryFieldIndex;
    use crate::registry::MemoryRegistry;

    fn locator() -> Arc<CatalogLocator> {
        let catalog = Arc::new(Catalog::new());
        catalog.add_index(Arc::new(MemoryFieldIndex::new("f1")));
        let locator = Arc::new(CatalogLocator::new(Arc::new(MemoryRegistry::new())));
        locator.add_catalog("catalog1", catalog);
        locator
    }

    #[test]
    fn test_index_lookup() {
        let ctx = Context::new(locator());
        let index = ctx.index(&IndexRef::new("catalog1", "f1")).unwrap();
        assert_eq!(index.name(), "f1");
    }

    #[test]
    fn test_missing_catalog_and_index() {
        let ctx = Context::new(locator());
        assert!(matches!(
            ctx.index(&IndexRef::new("nope", "f1")),
            Err(QueryError::NotFound(_))
        ));
        assert!(matches!(
            ctx.index(&IndexRef::new("catalog1", "nope")),
            Err(QueryError::NotFound(_))
        ));
    }

    #[test]
    fn test_context_identity() {
        let locator = locator();
        let a = Context::new(locator.clone());
        let b = Context::new(locator);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_catalog_index_names() {
        let catalog = Catalog::new();
        catalog.add_index(Arc::new(MemoryFieldIndex::new("b")));
        catalog.add_index(Arc::new(MemoryFieldIndex::new("a")));
        assert_eq!(catalog.index_names(), vec!["a", "b"]);
        assert!(catalog.remove("a").is_some());
        assert!(catalog.get("a").is_none());
    }
}
