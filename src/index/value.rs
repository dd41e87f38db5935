//! In-memory index over a discrete, single-valued domain.

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::data::DataValue;
use crate::error::Result;
use crate::idset::{self, IdSet};
use crate::index::postings::Postings;
use crate::index::{Index, ValueIndex, ValueQuery};

#[derive(Debug, Default)]
struct ValueData {
    postings: Postings,
    docs: AHashMap<u64, DataValue>,
}

/// Maps every document to exactly one value.
#[derive(Debug)]
pub struct MemoryValueIndex {
    name: String,
    data: RwLock<ValueData>,
}

impl MemoryValueIndex {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryValueIndex {
            name: name.into(),
            data: RwLock::new(ValueData::default()),
        }
    }

    /// Index `value` for `doc_id`; `Null` unindexes the document.
    pub fn index_doc(&self, doc_id: u64, value: impl Into<DataValue>) {
        let value = value.into();
        let mut data = self.data.write();
        if let Some(old) = data.docs.remove(&doc_id) {
            data.postings.remove(&old, doc_id);
        }
        if value.is_null() {
            return;
        }
        data.postings.insert(value.clone(), doc_id);
        data.docs.insert(doc_id, value);
    }
}

impl ValueIndex for MemoryValueIndex {
    fn apply_value(&self, query: &ValueQuery) -> Result<IdSet> {
        let data = self.data.read();
        let result = match query {
            ValueQuery::AnyOf(values) => data.postings.any_of(values),
            // A single-valued document can only hold every listed value
            // when the list names one distinct value.
            ValueQuery::AllOf(values) => match values.split_first() {
                Some((first, rest)) if rest.iter().all(|v| v == first) => {
                    data.postings.get(first)
                }
                _ => IdSet::new(),
            },
            ValueQuery::Between(range) => data.postings.between(range),
            ValueQuery::Any(extent) => extent
                .iter()
                .filter(|id| data.docs.contains_key(id))
                .collect(),
            ValueQuery::None(extent) => {
                let indexed: IdSet = extent
                    .iter()
                    .filter(|id| data.docs.contains_key(id))
                    .collect();
                idset::difference(extent, &indexed)
            }
        };
        Ok(result)
    }

    fn values(&self) -> Result<Vec<DataValue>> {
        Ok(self.data.read().postings.values())
    }
}

impl Index for MemoryValueIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_value(&self) -> Option<&dyn ValueIndex> {
        Some(self)
    }
}
