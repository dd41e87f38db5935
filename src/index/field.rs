//! In-memory ordered field index.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::data::DataValue;
use crate::error::Result;
use crate::idset::IdSet;
use crate::index::{FieldIndex, Index, SortIndex};

#[derive(Debug, Default)]
struct FieldData {
    forward: BTreeMap<DataValue, BTreeSet<u64>>,
    reverse: AHashMap<u64, DataValue>,
}

/// An ordered value → ids index supporting equality, range and sort.
#[derive(Debug)]
pub struct MemoryFieldIndex {
    name: String,
    data: RwLock<FieldData>,
}

impl MemoryFieldIndex {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryFieldIndex {
            name: name.into(),
            data: RwLock::new(FieldData::default()),
        }
    }

    /// Index `value` for `doc_id`, replacing any previous value.
    ///
    /// A `Null` value unindexes the document.
    pub fn index_doc(&self, doc_id: u64, value: impl Into<DataValue>) {
        let value = value.into();
        let mut data = self.data.write();
        Self::remove_locked(&mut data, doc_id);
        if value.is_null() {
            return;
        }
        data.forward.entry(value.clone()).or_default().insert(doc_id);
        data.reverse.insert(doc_id, value);
    }

    /// Remove `doc_id` from the index.
    pub fn unindex_doc(&self, doc_id: u64) {
        let mut data = self.data.write();
        Self::remove_locked(&mut data, doc_id);
    }

    fn remove_locked(data: &mut FieldData, doc_id: u64) {
        if let Some(old) = data.reverse.remove(&doc_id)
            && let Some(ids) = data.forward.get_mut(&old)
        {
            ids.remove(&doc_id);
            if ids.is_empty() {
                data.forward.remove(&old);
            }
        }
    }

    /// Number of indexed documents.
    pub fn doc_count(&self) -> usize {
        self.data.read().reverse.len()
    }

    /// The value indexed for `doc_id`.
    pub fn value_of(&self, doc_id: u64) -> Option<DataValue> {
        self.data.read().reverse.get(&doc_id).cloned()
    }
}

impl FieldIndex for MemoryFieldIndex {
    fn apply_range(&self, min: Option<&DataValue>, max: Option<&DataValue>) -> Result<IdSet> {
        if let (Some(lo), Some(hi)) = (min, max)
            && lo > hi
        {
            return Ok(IdSet::new());
        }
        let lower = min.map_or(Bound::Unbounded, Bound::Included);
        let upper = max.map_or(Bound::Unbounded, Bound::Included);

        let data = self.data.read();
        let ids: Vec<u64> = data
            .forward
            .range::<DataValue, _>((lower, upper))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect();
        Ok(IdSet::from_unsorted(ids))
    }
}

impl SortIndex for MemoryFieldIndex {
    fn sort(&self, ids: &IdSet, limit: Option<usize>, reverse: bool) -> Result<Vec<u64>> {
        let limit = limit.unwrap_or(usize::MAX);
        if limit == 0 || ids.is_empty() {
            return Ok(Vec::new());
        }
        let data = self.data.read();

        // Few candidates: look each one up. Many: walk the value order.
        if ids.len() < data.forward.len() {
            let mut keyed: Vec<(&DataValue, u64)> = ids
                .iter()
                .filter_map(|id| data.reverse.get(&id).map(|v| (v, id)))
                .collect();
            keyed.sort();
            if reverse {
                keyed.reverse();
            }
            return Ok(keyed.into_iter().take(limit).map(|(_, id)| id).collect());
        }

        let mut out = Vec::new();
        let buckets: Box<dyn Iterator<Item = &BTreeSet<u64>>> = if reverse {
            Box::new(data.forward.values().rev())
        } else {
            Box::new(data.forward.values())
        };
        for bucket in buckets {
            let members: Box<dyn Iterator<Item = &u64>> = if reverse {
                Box::new(bucket.iter().rev())
            } else {
                Box::new(bucket.iter())
            };
            for &id in members {
                if ids.contains(id) {
                    out.push(id);
                    if out.len() >= limit {
                        return Ok(out);
                    }
                }
            }
        }
        Ok(out)
    }
}

impl Index for MemoryFieldIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_field(&self) -> Option<&dyn FieldIndex> {
        Some(self)
    }

    fn as_sort(&self) -> Option<&dyn SortIndex> {
        Some(self)
    }
}
