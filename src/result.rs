//! The windowed view a search returns.

use std::fmt;
use std::sync::Arc;

use crate::data::Document;
use crate::error::{QueryError, Result};
use crate::idset::IdSet;
use crate::registry::IdentityRegistry;

/// Which ids of `all` a view exposes, and in what order.
#[derive(Debug, Clone)]
pub(crate) enum Selection {
    /// All matches in ascending id order, never copied.
    All,
    /// An explicit ordered window.
    Ordered(Vec<u64>),
}

/// Search results: every match plus the ordered, windowed selection.
///
/// Documents are resolved through the identity registry on each access, so
/// a view can be iterated any number of times.
#[derive(Clone)]
pub struct ResultView {
    all: IdSet,
    selected: Selection,
    registry: Arc<dyn IdentityRegistry>,
}

impl ResultView {
    pub(crate) fn new(
        all: IdSet,
        selected: Selection,
        registry: Arc<dyn IdentityRegistry>,
    ) -> Self {
        ResultView {
            all,
            selected,
            registry,
        }
    }

    /// Number of matches before windowing.
    pub fn total(&self) -> usize {
        self.all.len()
    }

    /// Number of ids in the selection.
    pub fn count(&self) -> usize {
        match &self.selected {
            Selection::All => self.all.len(),
            Selection::Ordered(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Every match, unwindowed.
    pub fn all(&self) -> &IdSet {
        &self.all
    }

    /// The selected ids in result order.
    pub fn ids(&self) -> &[u64] {
        match &self.selected {
            Selection::All => self.all.as_slice(),
            Selection::Ordered(ids) => ids,
        }
    }

    /// The first selected document, or `None` when the selection is empty.
    pub fn first(&self) -> Result<Option<Document>> {
        self.ids().first().map(|&id| self.resolve(id)).transpose()
    }

    /// Resolve the selected documents in order.
    ///
    /// An id the registry does not know yields [`QueryError::Inconsistent`]
    /// for that element.
    pub fn iter(&self) -> impl Iterator<Item = Result<Document>> + '_ {
        self.ids().iter().map(move |&id| self.resolve(id))
    }

    /// Resolve every selected document, failing on the first dangling id.
    pub fn documents(&self) -> Result<Vec<Document>> {
        self.iter().collect()
    }

    fn resolve(&self, id: u64) -> Result<Document> {
        self.registry.object_of(id).map_err(|err| match err {
            QueryError::NotFound(_) => QueryError::inconsistent(format!(
                "id {id} was matched by an index but is not registered"
            )),
            other => other,
        })
    }
}

impl fmt::Debug for ResultView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultView")
            .field("total", &self.total())
            .field("selected", &self.ids())
            .finish()
    }
}
