//! In-memory index over multi-valued fields (tags, keywords, categories).

use std::collections::BTreeSet;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::data::DataValue;
use crate::error::{QueryError, Result};
use crate::idset::{self, IdSet};
use crate::index::postings::Postings;
use crate::index::{Index, SetIndex, ValueQuery};

#[derive(Debug, Default)]
struct SetData {
    postings: Postings,
    docs: AHashMap<u64, BTreeSet<DataValue>>,
}

/// Maps every document to a set of values.
#[derive(Debug)]
pub struct MemorySetIndex {
    name: String,
    data: RwLock<SetData>,
}

impl MemorySetIndex {
    pub fn new(name: impl Into<String>) -> Self {
        MemorySetIndex {
            name: name.into(),
            data: RwLock::new(SetData::default()),
        }
    }

    /// Index `values` for `doc_id`, replacing any previous values.
    ///
    /// `Null` is not a valid member; an empty list unindexes the document.
    pub fn index_doc<I, V>(&self, doc_id: u64, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<DataValue>,
    {
        let values: BTreeSet<DataValue> = values.into_iter().map(Into::into).collect();
        if values.iter().any(DataValue::is_null) {
            return Err(QueryError::invalid_argument(format!(
                "cannot index null in set index '{}'",
                self.name
            )));
        }
        let mut data = self.data.write();
        Self::remove_locked(&mut data, doc_id);
        if values.is_empty() {
            return Ok(());
        }
        for value in &values {
            data.postings.insert(value.clone(), doc_id);
        }
        data.docs.insert(doc_id, values);
        Ok(())
    }

    /// Remove `doc_id` from the index.
    pub fn unindex_doc(&self, doc_id: u64) {
        let mut data = self.data.write();
        Self::remove_locked(&mut data, doc_id);
    }

    fn remove_locked(data: &mut SetData, doc_id: u64) {
        if let Some(values) = data.docs.remove(&doc_id) {
            for value in &values {
                data.postings.remove(value, doc_id);
            }
        }
    }

    fn indexed_ids(data: &SetData) -> IdSet {
        data.docs.keys().copied().collect()
    }
}

impl SetIndex for MemorySetIndex {
    fn apply_set(&self, query: &ValueQuery) -> Result<IdSet> {
        let data = self.data.read();
        let result = match query {
            ValueQuery::AnyOf(values) => data.postings.any_of(values),
            ValueQuery::AllOf(values) => data.postings.all_of(values),
            ValueQuery::Between(range) => data.postings.between(range),
            ValueQuery::Any(extent) => idset::intersection(extent, &Self::indexed_ids(&data)),
            ValueQuery::None(extent) => idset::difference(extent, &Self::indexed_ids(&data)),
        };
        Ok(result)
    }
}

impl Index for MemorySetIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_set(&self) -> Option<&dyn SetIndex> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ValueRange;

    fn index() -> MemorySetIndex {
        let index = MemorySetIndex::new("tags");
        index.index_doc(1, ["red", "green"]).unwrap();
        index.index_doc(2, ["green"]).unwrap();
        index.index_doc(3, ["blue", "red"]).unwrap();
        index
    }

    fn values(vs: &[&str]) -> Vec<DataValue> {
        vs.iter().map(|v| DataValue::from(*v)).collect()
    }

    #[test]
    fn test_any_of_and_all_of() {
        let index = index();
        let any = index
            .apply_set(&ValueQuery::AnyOf(values(&["red", "blue"])))
            .unwrap();
        assert_eq!(any.as_slice(), &[1, 3]);

        let all = index
            .apply_set(&ValueQuery::AllOf(values(&["red", "green"])))
            .unwrap();
        assert_eq!(all.as_slice(), &[1]);

        assert!(index.apply_set(&ValueQuery::AllOf(vec![])).unwrap().is_empty());
    }

    #[test]
    fn test_between() {
        let index = index();
        let range = ValueRange {
            min: Some("blue".into()),
            max: Some("green".into()),
            exclude_min: true,
            exclude_max: false,
        };
        let result = index.apply_set(&ValueQuery::Between(range)).unwrap();
        assert_eq!(result.as_slice(), &[1, 2]);
    }

    #[test]
    fn test_extents() {
        let index = index();
        let extent: IdSet = [2, 3, 4, 5].into_iter().collect();
        let any = index.apply_set(&ValueQuery::Any(extent.clone())).unwrap();
        assert_eq!(any.as_slice(), &[2, 3]);
        let none = index.apply_set(&ValueQuery::None(extent)).unwrap();
        assert_eq!(none.as_slice(), &[4, 5]);
    }

    #[test]
    fn test_null_member_rejected() {
        let index = index();
        let err = index.index_doc(9, [DataValue::Null]).unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));
    }
}
