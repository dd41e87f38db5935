//! Terms over single-valued, discrete value indexes.

use crate::cache::{CacheKey, TermCache};
use crate::catalog::Context;
use crate::data::DataValue;
use crate::error::Result;
use crate::idset::IdSet;
use crate::index::{IndexRef, ValueQuery, ValueRange};
use crate::term::Term;
use crate::term::set::reject_null_members;

fn apply_value(index_ref: &IndexRef, ctx: &Context, query: &ValueQuery) -> Result<IdSet> {
    let index = ctx.index(index_ref)?;
    index.value()?.apply_value(query)
}

/// Documents whose value is `value`.
#[derive(Debug, Clone)]
pub struct ValueEq {
    index: IndexRef,
    value: DataValue,
}

impl ValueEq {
    pub fn new(index: IndexRef, value: impl Into<DataValue>) -> Result<Self> {
        let value = value.into();
        reject_null_members(std::slice::from_ref(&value), "ValueEq")?;
        Ok(ValueEq { index, value })
    }
}

impl Term for ValueEq {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        apply_value(
            &self.index,
            ctx,
            &ValueQuery::AnyOf(vec![self.value.clone()]),
        )
    }

    fn key(&self, _ctx: &Context) -> Result<CacheKey> {
        Ok(CacheKey::new("value_eq")
            .with_index(&self.index)
            .with_value(self.value.clone()))
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Documents whose value is any known value other than `value`.
#[derive(Debug, Clone)]
pub struct ValueNotEq {
    index: IndexRef,
    value: DataValue,
}

impl ValueNotEq {
    pub fn new(index: IndexRef, value: impl Into<DataValue>) -> Self {
        ValueNotEq {
            index,
            value: value.into(),
        }
    }
}

impl Term for ValueNotEq {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        let index = ctx.index(&self.index)?;
        let values = index.value()?;
        let others: Vec<DataValue> = values
            .values()?
            .into_iter()
            .filter(|v| *v != self.value)
            .collect();
        values.apply_value(&ValueQuery::AnyOf(others))
    }

    fn key(&self, _ctx: &Context) -> Result<CacheKey> {
        Ok(CacheKey::new("value_not_eq")
            .with_index(&self.index)
            .with_value(self.value.clone()))
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Documents whose value lies in the range. Bounds are inclusive unless
/// excluded.
#[derive(Debug, Clone)]
pub struct ValueBetween {
    index: IndexRef,
    range: ValueRange,
}

impl ValueBetween {
    pub fn new(index: IndexRef, min: Option<DataValue>, max: Option<DataValue>) -> Self {
        ValueBetween {
            index,
            range: ValueRange::inclusive(min, max),
        }
    }

    pub fn exclude_min(mut self, exclude: bool) -> Self {
        self.range.exclude_min = exclude;
        self
    }

    pub fn exclude_max(mut self, exclude: bool) -> Self {
        self.range.exclude_max = exclude;
        self
    }
}

impl Term for ValueBetween {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        apply_value(&self.index, ctx, &ValueQuery::Between(self.range.clone()))
    }

    fn key(&self, _ctx: &Context) -> Result<CacheKey> {
        Ok(CacheKey::new("value_between")
            .with_index(&self.index)
            .with_optional(self.range.min.clone())
            .with_optional(self.range.max.clone())
            .with_flag(self.range.exclude_min)
            .with_flag(self.range.exclude_max))
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Documents whose value is at least (or, excluded, above) `min`.
#[derive(Debug, Clone)]
pub struct ValueGe(ValueBetween);

impl ValueGe {
    pub fn new(index: IndexRef, min: impl Into<DataValue>, exclude_min: bool) -> Self {
        ValueGe(ValueBetween::new(index, Some(min.into()), None).exclude_min(exclude_min))
    }
}

impl Term for ValueGe {
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

/// Documents whose value is at most (or, excluded, below) `max`.
#[derive(Debug, Clone)]
pub struct ValueLe(ValueBetween);

impl ValueLe {
    pub fn new(index: IndexRef, max: impl Into<DataValue>, exclude_max: bool) -> Self {
        ValueLe(ValueBetween::new(index, None, Some(max.into())).exclude_max(exclude_max))
    }
}

impl Term for ValueLe {
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

/// Documents whose value is one of `values`.
#[derive(Debug, Clone)]
pub struct ValueIn {
    index: IndexRef,
    values: Vec<DataValue>,
}

impl ValueIn {
    pub fn new(index: IndexRef, values: Vec<DataValue>) -> Result<Self> {
        reject_null_members(&values, "ValueIn")?;
        Ok(ValueIn { index, values })
    }
}

impl Term for ValueIn {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        apply_value(&self.index, ctx, &ValueQuery::AnyOf(self.values.clone()))
    }

    fn key(&self, _ctx: &Context) -> Result<CacheKey> {
        Ok(CacheKey::new("value_in")
            .with_index(&self.index)
            .with_values(self.values.clone()))
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Ids of `extent` that have a value. Not cached.
#[derive(Debug, Clone)]
pub struct ValueExtentAny {
    index: IndexRef,
    extent: IdSet,
}

impl ValueExtentAny {
    pub fn new(index: IndexRef, extent: IdSet) -> Self {
        ValueExtentAny { index, extent }
    }
}

impl Term for ValueExtentAny {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        apply_value(&self.index, ctx, &ValueQuery::Any(self.extent.clone()))
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Ids of `extent` without a value. Not cached.
#[derive(Debug, Clone)]
pub struct ValueExtentNone {
    index: IndexRef,
    extent: IdSet,
}

impl ValueExtentNone {
    pub fn new(index: IndexRef, extent: IdSet) -> Self {
        ValueExtentNone { index, extent }
    }
}

impl Term for ValueExtentNone {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        apply_value(&self.index, ctx, &ValueQuery::None(self.extent.clone()))
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

crate::impl_term_ops!(
    ValueEq,
    ValueNotEq,
    ValueBetween,
    ValueGe,
    ValueLe,
    ValueIn,
    ValueExtentAny,
    ValueExtentNone,
);
