//! Index capability contracts.
//!
//! Terms never look inside an index. They resolve an [`Index`] through the
//! [`Context`](crate::catalog::Context) and probe it for the capability they
//! need; a missing capability is a configuration error raised at bind time.
//!
//! # Module Structure
//!
//! - `field`: ordered equality/range index with sort support
//! - `text`: word index with a small boolean query syntax
//! - `set`: multi-valued membership index
//! - `value`: single-valued discrete domain index

pub mod field;
mod postings;
pub mod set;
pub mod text;
pub mod value;

use std::fmt;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::data::DataValue;
use crate::error::{Capability, QueryError, Result};
use crate::idset::IdSet;

pub use field::MemoryFieldIndex;
pub use set::MemorySetIndex;
pub use text::MemoryTextIndex;
pub use value::MemoryValueIndex;

/// Names an index inside a named catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexRef {
    pub catalog: String,
    pub index: String,
}

impl IndexRef {
    pub fn new(catalog: impl Into<String>, index: impl Into<String>) -> Self {
        IndexRef {
            catalog: catalog.into(),
            index: index.into(),
        }
    }
}

impl fmt::Display for IndexRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.catalog, self.index)
    }
}

/// A value range with optional, individually exclusive bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: Option<DataValue>,
    pub max: Option<DataValue>,
    pub exclude_min: bool,
    pub exclude_max: bool,
}

impl ValueRange {
    /// An inclusive range; either bound may be omitted.
    pub fn inclusive(min: Option<DataValue>, max: Option<DataValue>) -> Self {
        ValueRange {
            min,
            max,
            exclude_min: false,
            exclude_max: false,
        }
    }

    /// Check whether `value` falls inside the range.
    pub fn contains(&self, value: &DataValue) -> bool {
        let above_min = match &self.min {
            None => true,
            Some(min) if self.exclude_min => value > min,
            Some(min) => value >= min,
        };
        let below_max = match &self.max {
            None => true,
            Some(max) if self.exclude_max => value < max,
            Some(max) => value <= max,
        };
        above_min && below_max
    }

    /// Bounds suitable for `BTreeMap::range`, or `None` when the range is
    /// empty (inverted, or a single point with an excluded end).
    pub(crate) fn bounds(&self) -> Option<(Bound<&DataValue>, Bound<&DataValue>)> {
        if let (Some(lo), Some(hi)) = (&self.min, &self.max)
            && (lo > hi || (lo == hi && (self.exclude_min || self.exclude_max)))
        {
            return None;
        }
        let lower = match &self.min {
            None => Bound::Unbounded,
            Some(v) if self.exclude_min => Bound::Excluded(v),
            Some(v) => Bound::Included(v),
        };
        let upper = match &self.max {
            None => Bound::Unbounded,
            Some(v) if self.exclude_max => Bound::Excluded(v),
            Some(v) => Bound::Included(v),
        };
        Some((lower, upper))
    }
}

/// Query shapes understood by set and value indexes.
#[derive(Debug, Clone)]
pub enum ValueQuery {
    /// Documents with at least one of the values.
    AnyOf(Vec<DataValue>),
    /// Documents with all of the values.
    AllOf(Vec<DataValue>),
    /// Documents with a value inside the range.
    Between(ValueRange),
    /// Ids of the extent that the index has a value for.
    Any(IdSet),
    /// Ids of the extent that the index has no value for.
    None(IdSet),
}

/// Equality and range lookups over an ordered field.
pub trait FieldIndex: Send + Sync {
    /// Ids whose value lies in `[min, max]`; an omitted bound is open.
    fn apply_range(&self, min: Option<&DataValue>, max: Option<&DataValue>) -> Result<IdSet>;

    /// Ids whose value equals `value`.
    fn apply_eq(&self, value: &DataValue) -> Result<IdSet> {
        self.apply_range(Some(value), Some(value))
    }
}

/// Free-text search.
pub trait TextIndex: Send + Sync {
    /// Ids matching the query string.
    ///
    /// Malformed input is reported as [`QueryError::QueryParse`] so that
    /// callers can degrade it to an empty result.
    fn apply_text(&self, query: &str) -> Result<IdSet>;
}

/// Membership lookups over multi-valued fields.
pub trait SetIndex: Send + Sync {
    fn apply_set(&self, query: &ValueQuery) -> Result<IdSet>;
}

/// Lookups over a discrete value domain.
pub trait ValueIndex: Send + Sync {
    fn apply_value(&self, query: &ValueQuery) -> Result<IdSet>;

    /// Every distinct value the index holds, in order.
    fn values(&self) -> Result<Vec<DataValue>>;
}

/// Ordered iteration over a given id set.
pub trait SortIndex: Send + Sync {
    /// Ids of `ids` ordered by indexed value, at most `limit` of them.
    fn sort(&self, ids: &IdSet, limit: Option<usize>, reverse: bool) -> Result<Vec<u64>>;
}

/// An index bound into a catalog.
///
/// Each `as_*` probe returns the capability if the index provides it.
pub trait Index: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn as_field(&self) -> Option<&dyn FieldIndex> {
        None
    }

    fn as_text(&self) -> Option<&dyn TextIndex> {
        None
    }

    fn as_set(&self) -> Option<&dyn SetIndex> {
        None
    }

    fn as_value(&self) -> Option<&dyn ValueIndex> {
        None
    }

    fn as_sort(&self) -> Option<&dyn SortIndex> {
        None
    }
}

impl dyn Index {
    /// Require the field capability.
    pub fn field(&self) -> Result<&dyn FieldIndex> {
        self.as_field()
            .ok_or_else(|| QueryError::missing_capability(self.name(), Capability::Field))
    }

    /// Require the text capability.
    pub fn text(&self) -> Result<&dyn TextIndex> {
        self.as_text()
            .ok_or_else(|| QueryError::missing_capability(self.name(), Capability::Text))
    }

    /// Require the set capability.
    pub fn set(&self) -> Result<&dyn SetIndex> {
        self.as_set()
            .ok_or_else(|| QueryError::missing_capability(self.name(), Capability::Set))
    }

    /// Require the value capability.
    pub fn value(&self) -> Result<&dyn ValueIndex> {
        self.as_value()
            .ok_or_else(|| QueryError::missing_capability(self.name(), Capability::Value))
    }

    /// Require the sort capability.
    pub fn sorter(&self) -> Result<&dyn SortIndex> {
        self.as_sort()
            .ok_or_else(|| QueryError::missing_capability(self.name(), Capability::Sort))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_range_contains() {
        let range = ValueRange::inclusive(Some(2.into()), Some(4.into()));
        assert!(range.contains(&2.into()));
        assert!(range.contains(&4.into()));
        assert!(!range.contains(&5.into()));

        let open_max = ValueRange {
            min: Some(2.into()),
            max: None,
            exclude_min: true,
            exclude_max: false,
        };
        assert!(!open_max.contains(&2.into()));
        assert!(open_max.contains(&100.into()));
    }

    #[test]
    fn test_index_ref_display() {
        assert_eq!(IndexRef::new("catalog1", "f1").to_string(), "catalog1.f1");
    }
}
