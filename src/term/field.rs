//! Terms over field and text indexes, and explicit document lists.

use log::warn;

use crate::cache::{CacheKey, TermCache};
use crate::catalog::Context;
use crate::data::{DataValue, Document};
use crate::error::{QueryError, Result};
use crate::idset::{self, IdSet};
use crate::index::IndexRef;
use crate::term::Term;

fn reject_null(value: &DataValue, term: &str) -> Result<()> {
    if value.is_null() {
        return Err(QueryError::invalid_argument(format!(
            "{term} does not accept a null value"
        )));
    }
    Ok(())
}

/// Ids whose indexed value equals `value`.
#[derive(Debug, Clone)]
pub struct Eq {
    index: IndexRef,
    value: DataValue,
}

impl Eq {
    /// Create an equality term. A null value is rejected.
    pub fn new(index: IndexRef, value: impl Into<DataValue>) -> Result<Self> {
        let value = value.into();
        reject_null(&value, "Eq")?;
        Ok(Eq { index, value })
    }

    pub fn index(&self) -> &IndexRef {
        &self.index
    }

    pub fn value(&self) -> &DataValue {
        &self.value
    }
}

impl Term for Eq {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        let index = ctx.index(&self.index)?;
        index.field()?.apply_eq(&self.value)
    }

    fn key(&self, _ctx: &Context) -> Result<CacheKey> {
        Ok(CacheKey::new("eq")
            .with_index(&self.index)
            .with_value(self.value.clone()))
    }

    fn description(&self) -> String {
        format!("Eq({} == {})", self.index, self.value)
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Ids that have a value in the index, other than `value`.
#[derive(Debug, Clone)]
pub struct NotEq {
    index: IndexRef,
    value: DataValue,
}

impl NotEq {
    pub fn new(index: IndexRef, value: impl Into<DataValue>) -> Self {
        NotEq {
            index,
            value: value.into(),
        }
    }
}

impl Term for NotEq {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        let index = ctx.index(&self.index)?;
        let field = index.field()?;
        let all = field.apply_range(None, None)?;
        if all.is_empty() {
            return Ok(all);
        }
        let equal = field.apply_eq(&self.value)?;
        Ok(idset::difference(&all, &equal))
    }

    fn key(&self, _ctx: &Context) -> Result<CacheKey> {
        Ok(CacheKey::new("not_eq")
            .with_index(&self.index)
            .with_value(self.value.clone()))
    }

    fn description(&self) -> String {
        format!("NotEq({} != {})", self.index, self.value)
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Every id the index holds a value for.
#[derive(Debug, Clone)]
pub struct All {
    index: IndexRef,
}

impl All {
    pub fn new(index: IndexRef) -> Self {
        All { index }
    }
}

impl Term for All {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        let index = ctx.index(&self.index)?;
        index.field()?.apply_range(None, None)
    }

    fn key(&self, _ctx: &Context) -> Result<CacheKey> {
        Ok(CacheKey::new("all").with_index(&self.index))
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Ids whose value lies in `[min, max]`. An omitted bound is open.
#[derive(Debug, Clone)]
pub struct Between {
    index: IndexRef,
    min: Option<DataValue>,
    max: Option<DataValue>,
}

impl Between {
    pub fn new(index: IndexRef, min: Option<DataValue>, max: Option<DataValue>) -> Self {
        Between { index, min, max }
    }

    pub fn min(&self) -> Option<&DataValue> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&DataValue> {
        self.max.as_ref()
    }
}

impl Term for Between {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        let index = ctx.index(&self.index)?;
        index
            .field()?
            .apply_range(self.min.as_ref(), self.max.as_ref())
    }

    fn key(&self, _ctx: &Context) -> Result<CacheKey> {
        Ok(CacheKey::new("between")
            .with_index(&self.index)
            .with_optional(self.min.clone())
            .with_optional(self.max.clone()))
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Ids whose value is at least `min`.
///
/// Shares its cache key with the equivalent [`Between`].
#[derive(Debug, Clone)]
pub struct Ge(Between);

impl Ge {
    pub fn new(index: IndexRef, min: impl Into<DataValue>) -> Self {
        Ge(Between::new(index, Some(min.into()), None))
    }
}

impl Term for Ge {
    fn apply(&self, cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        self.0.apply(cache, ctx)
    }

    fn key(&self, ctx: &Context) -> Result<CacheKey> {
        self.0.key(ctx)
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Ids whose value is at most `max`.
#[derive(Debug, Clone)]
pub struct Le(Between);

impl Le {
    pub fn new(index: IndexRef, max: impl Into<DataValue>) -> Self {
        Le(Between::new(index, None, Some(max.into())))
    }
}

impl Term for Le {
    fn apply(&self, cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        self.0.apply(cache, ctx)
    }

    fn key(&self, ctx: &Context) -> Result<CacheKey> {
        self.0.key(ctx)
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Ids whose value equals any of `values`.
#[derive(Debug, Clone)]
pub struct In {
    index: IndexRef,
    values: Vec<DataValue>,
}

impl In {
    /// Create a membership term. A null anywhere in `values` is rejected.
    pub fn new(index: IndexRef, values: Vec<DataValue>) -> Result<Self> {
        for value in &values {
            reject_null(value, "In")?;
        }
        Ok(In { index, values })
    }

    pub fn values(&self) -> &[DataValue] {
        &self.values
    }
}

impl Term for In {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        let index = ctx.index(&self.index)?;
        let field = index.field()?;
        let results = self
            .values
            .iter()
            .map(|value| field.apply_eq(value))
            .collect::<Result<Vec<_>>>()?;
        Ok(idset::multiunion(&results))
    }

    fn key(&self, _ctx: &Context) -> Result<CacheKey> {
        Ok(CacheKey::new("in")
            .with_index(&self.index)
            .with_values(self.values.clone()))
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Free-text match against a text index.
///
/// A query string the index cannot parse matches nothing; the parse error
/// is logged and not propagated.
#[derive(Debug, Clone)]
pub struct Text {
    index: IndexRef,
    text: String,
}

impl Text {
    pub fn new(index: IndexRef, text: impl Into<String>) -> Self {
        Text {
            index,
            text: text.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Term for Text {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        let index = ctx.index(&self.index)?;
        match index.text()?.apply_text(&self.text) {
            Err(QueryError::QueryParse(reason)) => {
                warn!(
                    "ignoring malformed text query {:?} on {}: {reason}",
                    self.text, self.index
                );
                Ok(IdSet::new())
            }
            other => other,
        }
    }

    fn key(&self, _ctx: &Context) -> Result<CacheKey> {
        Ok(CacheKey::new("text")
            .with_index(&self.index)
            .with_str(self.text.clone()))
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Exactly the given documents, resolved through the identity registry.
///
/// Has no cache key: documents carry no structural identity.
#[derive(Debug, Clone)]
pub struct Objects {
    documents: Vec<Document>,
}

impl Objects {
    pub fn new(documents: Vec<Document>) -> Self {
        Objects { documents }
    }
}

impl Term for Objects {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        let registry = ctx.registry();
        let ids = self
            .documents
            .iter()
            .map(|document| registry.id_of(document))
            .collect::<Result<Vec<u64>>>()?;
        Ok(IdSet::from_unsorted(ids))
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

crate::impl_term_ops!(Eq, NotEq, All, Between, Ge, Le, In, Text, Objects);
