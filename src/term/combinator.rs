//! Terms combining the results of child terms.
//!
//! Children are always evaluated through [`Term::cached_apply`], so caching
//! composes through the whole tree. A combinator's key is its kind followed
//! by its children's keys in order; if any child has no key, neither does
//! the combinator.

use log::warn;

use crate::cache::{CacheKey, TermCache};
use crate::catalog::Context;
use crate::error::Result;
use crate::idset::{self, IdSet};
use crate::term::Term;

fn combined_key(kind: &'static str, terms: &[Box<dyn Term>], ctx: &Context) -> Result<CacheKey> {
    terms
        .iter()
        .try_fold(CacheKey::new(kind), |key, term| Ok(key.with_key(term.key(ctx)?)))
}

fn describe(name: &str, terms: &[Box<dyn Term>]) -> String {
    let children: Vec<String> = terms.iter().map(|t| t.description()).collect();
    format!("{name}({})", children.join(", "))
}

/// Intersection of the children's results.
///
/// Evaluation stops at the first child yielding nothing. The remaining
/// results are intersected smallest first.
#[derive(Debug, Clone)]
pub struct And {
    terms: Vec<Box<dyn Term>>,
    weighted: bool,
}

impl And {
    pub fn new(terms: Vec<Box<dyn Term>>) -> Self {
        And {
            terms,
            weighted: false,
        }
    }

    /// Use weighted intersection for every fold step.
    pub fn weighted(mut self, weighted: bool) -> Self {
        self.weighted = weighted;
        self
    }

    pub fn is_weighted(&self) -> bool {
        self.weighted
    }

    pub fn terms(&self) -> &[Box<dyn Term>] {
        &self.terms
    }
}

impl Term for And {
    fn apply(&self, cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        let mut results = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            let result = term.cached_apply(cache, ctx)?;
            if result.is_empty() {
                return Ok(result);
            }
            results.push(result);
        }
        results.sort_by_key(IdSet::len);

        let mut results = results.into_iter();
        let Some(mut acc) = results.next() else {
            return Ok(IdSet::new());
        };
        for result in results {
            acc = if self.weighted {
                idset::weighted_intersection(&acc, &result).1
            } else {
                idset::intersection(&acc, &result)
            };
            if acc.is_empty() {
                break;
            }
        }
        Ok(acc)
    }

    fn key(&self, ctx: &Context) -> Result<CacheKey> {
        let kind = if self.weighted { "weighted_and" } else { "and" };
        combined_key(kind, &self.terms, ctx)
    }

    fn description(&self) -> String {
        describe("And", &self.terms)
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Union of the children's results.
#[derive(Debug, Clone)]
pub struct Or {
    terms: Vec<Box<dyn Term>>,
}

impl Or {
    pub fn new(terms: Vec<Box<dyn Term>>) -> Self {
        Or { terms }
    }

    pub fn terms(&self) -> &[Box<dyn Term>] {
        &self.terms
    }
}

impl Term for Or {
    fn apply(&self, cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        let mut results = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            let result = term.cached_apply(cache, ctx)?;
            if !result.is_empty() {
                results.push(result);
            }
        }
        match results.len() {
            0 => Ok(IdSet::new()),
            1 => Ok(results.swap_remove(0)),
            _ => Ok(idset::multiunion(&results)),
        }
    }

    fn key(&self, ctx: &Context) -> Result<CacheKey> {
        combined_key("or", &self.terms, ctx)
    }

    fn description(&self) -> String {
        describe("Or", &self.terms)
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// The first child's result minus each following child's result.
#[derive(Debug, Clone)]
pub struct Difference {
    terms: Vec<Box<dyn Term>>,
}

impl Difference {
    pub fn new(terms: Vec<Box<dyn Term>>) -> Self {
        Difference { terms }
    }

    pub fn terms(&self) -> &[Box<dyn Term>] {
        &self.terms
    }
}

impl Term for Difference {
    fn apply(&self, cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        let Some((first, rest)) = self.terms.split_first() else {
            return Ok(IdSet::new());
        };
        let mut result = first.cached_apply(cache, ctx)?;
        for term in rest {
            if result.is_empty() {
                break;
            }
            let other = term.cached_apply(cache, ctx)?;
            result = idset::difference(&result, &other);
        }
        Ok(result)
    }

    fn key(&self, ctx: &Context) -> Result<CacheKey> {
        combined_key("difference", &self.terms, ctx)
    }

    fn description(&self) -> String {
        describe("Difference", &self.terms)
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

/// Every registered id not matched by the child.
///
/// Enumerates the whole identity registry on each evaluation. Prefer a
/// [`Difference`] against a narrower term where one exists.
#[derive(Debug, Clone)]
pub struct Not {
    term: Box<dyn Term>,
}

impl Not {
    pub fn new(term: Box<dyn Term>) -> Self {
        Not { term }
    }

    pub fn term(&self) -> &dyn Term {
        self.term.as_ref()
    }
}

impl Term for Not {
    fn apply(&self, cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        let description = self.description();
        warn!("evaluating {description} enumerates every registered id");
        let all = ctx.registry().all_ids()?;
        if all.is_empty() {
            return Ok(all);
        }
        let excluded = self.term.cached_apply(cache, ctx)?;
        Ok(idset::difference(&all, &excluded))
    }

    fn key(&self, ctx: &Context) -> Result<CacheKey> {
        Ok(CacheKey::new("not").with_key(self.term.key(ctx)?))
    }

    fn description(&self) -> String {
        format!("Not({})", self.term.description())
    }

    fn clone_box(&self) -> Box<dyn Term> {
        Box::new(self.clone())
    }
}

crate::impl_term_ops!(And, Or, Difference, Not);
