//! Terms over multi-valued set indexes.

use crate::cache::{CacheKey, TermCache};
use crate::catalog::Context;
use crate::data::DataValue;
use crate::error::{QueryError, Result};
use crate::idset::IdSet;
use crate::index::{IndexRef, ValueQuery, ValueRange};
use crate::term::Term;

pub(crate) fn reject_null_members(values: &[DataValue], term: &str) -> Result<()> {
    if values.iter().any(DataValue::is_null) {
        return Err(QueryError::invalid_argument(format!(
            "{term} does not accept null members"
        )));
    }
    Ok(())
}

fn apply_set(index_ref: &IndexRef, ctx: &Context, query: &ValueQuery) -> Result<IdSet> {
    let index = ctx.index(index_ref)?;
    index.set()?.apply_set(query)
}

/// Documents holding at least one of `values`.
#[derive(Debug, Clone)]
pub struct AnyOf {
    index: IndexRef,
    values: Vec<DataValue>,
}

impl AnyOf {
    pub fn new(index: IndexRef, values: Vec<DataValue>) -> Result<Self> {
        reject_null_members(&values, "AnyOf")?;
        Ok(AnyOf { index, values })
    }
}

impl Term for AnyOf {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        apply_set(&self.index, ctx, &ValueQuery::AnyOf(self.values.clone()))
    }

    fn key(&self, _ctx: &Context) -> Result<CacheKey> {
        Ok(CacheKey::new("set_any_of")
            .with_index(&self.index)
            .with_values(self.values.clone()))
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Documents holding every one of `values`.
#[derive(Debug, Clone)]
pub struct AllOf {
    index: IndexRef,
    values: Vec<DataValue>,
}

impl AllOf {
    pub fn new(index: IndexRef, values: Vec<DataValue>) -> Result<Self> {
        reject_null_members(&values, "AllOf")?;
        Ok(AllOf { index, values })
    }
}

impl Term for AllOf {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        apply_set(&self.index, ctx, &ValueQuery::AllOf(self.values.clone()))
    }

    fn key(&self, _ctx: &Context) -> Result<CacheKey> {
        Ok(CacheKey::new("set_all_of")
            .with_index(&self.index)
            .with_values(self.values.clone()))
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Documents holding a member inside the range. Bounds are inclusive unless
/// turned off with [`SetBetween::include_min`] / [`SetBetween::include_max`].
#[derive(Debug, Clone)]
pub struct SetBetween {
    index: IndexRef,
    min: Option<DataValue>,
    max: Option<DataValue>,
    include_min: bool,
    include_max: bool,
}

impl SetBetween {
    pub fn new(index: IndexRef, min: Option<DataValue>, max: Option<DataValue>) -> Self {
        SetBetween {
            index,
            min,
            max,
            include_min: true,
            include_max: true,
        }
    }

    pub fn include_min(mut self, include: bool) -> Self {
        self.include_min = include;
        self
    }

    pub fn include_max(mut self, include: bool) -> Self {
        self.include_max = include;
        self
    }

    fn range(&self) -> ValueRange {
        ValueRange {
            min: self.min.clone(),
            max: self.max.clone(),
            exclude_min: !self.include_min,
            exclude_max: !self.include_max,
        }
    }
}

impl Term for SetBetween {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        apply_set(&self.index, ctx, &ValueQuery::Between(self.range()))
    }

    fn key(&self, _ctx: &Context) -> Result<CacheKey> {
        Ok(CacheKey::new("set_between")
            .with_index(&self.index)
            .with_optional(self.min.clone())
            .with_optional(self.max.clone())
            .with_flag(self.include_min)
            .with_flag(self.include_max))
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Ids of `extent` that hold any member in the index. Not cached.
#[derive(Debug, Clone)]
pub struct ExtentAny {
    index: IndexRef,
    extent: IdSet,
}

impl ExtentAny {
    pub fn new(index: IndexRef, extent: IdSet) -> Self {
        ExtentAny { index, extent }
    }
}

impl Term for ExtentAny {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        apply_set(&self.index, ctx, &ValueQuery::Any(self.extent.clone()))
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Ids of `extent` that hold no member in the index. Not cached.
#[derive(Debug, Clone)]
pub struct ExtentNone {
    index: IndexRef,
    extent: IdSet,
}

impl ExtentNone {
    pub fn new(index: IndexRef, extent: IdSet) -> Self {
        ExtentNone { index, extent }
    }
}

impl Term for ExtentNone {
    fn apply(&self, _cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        apply_set(&self.index, ctx, &ValueQuery::None(self.extent.clone()))
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

crate::impl_term_ops!(AnyOf, AllOf, SetBetween, ExtentAny, ExtentNone);
