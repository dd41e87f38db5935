//! Value → ids postings shared by the set and value indexes.

use std::collections::{BTreeMap, BTreeSet};

use crate::data::DataValue;
use crate::idset::{self, IdSet};
use crate::index::ValueRange;

#[derive(Debug, Default)]
pub(crate) struct Postings {
    forward: BTreeMap<DataValue, BTreeSet<u64>>,
}

impl Postings {
    pub(crate) fn insert(&mut self, value: DataValue, doc_id: u64) {
        self.forward.entry(value).or_default().insert(doc_id);
    }

    pub(crate) fn remove(&mut self, value: &DataValue, doc_id: u64) {
        if let Some(ids) = self.forward.get_mut(value) {
            ids.remove(&doc_id);
            if ids.is_empty() {
                self.forward.remove(value);
            }
        }
    }

    pub(crate) fn get(&self, value: &DataValue) -> IdSet {
        self.forward
            .get(value)
            .map(|ids| IdSet::from_sorted(ids.iter().copied().collect()))
            .unwrap_or_default()
    }

    pub(crate) fn values(&self) -> Vec<DataValue> {
        self.forward.keys().cloned().collect()
    }

    pub(crate) fn any_of(&self, values: &[DataValue]) -> IdSet {
        let sets: Vec<IdSet> = values.iter().map(|v| self.get(v)).collect();
        idset::multiunion(&sets)
    }

    pub(crate) fn all_of(&self, values: &[DataValue]) -> IdSet {
        let Some((first, rest)) = values.split_first() else {
            return IdSet::new();
        };
        let mut result = self.get(first);
        for value in rest {
            if result.is_empty() {
                break;
            }
            result = idset::intersection(&result, &self.get(value));
        }
        result
    }

    pub(crate) fn between(&self, range: &ValueRange) -> IdSet {
        let Some(bounds) = range.bounds() else {
            return IdSet::new();
        };
        let ids: Vec<u64> = self
            .forward
            .range::<DataValue, _>(bounds)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect();
        IdSet::from_unsorted(ids)
    }
}
