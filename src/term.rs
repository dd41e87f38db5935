//! The query term algebra.
//!
//! A query is a tree of [`Term`]s. Leaf terms consult one index; combinator
//! terms combine the results of their children. Terms are immutable
//! descriptions: evaluating one never changes it, so a tree can be reused
//! across evaluations and threads as long as each evaluation brings its own
//! cache.
//!
//! Trees are built with explicit constructors:
//!
//! ```
//! use catalog_query::IndexRef;
//! use catalog_query::term::{self, Eq, In};
//!
//! let f1 = IndexRef::new("catalog1", "f1");
//! let q = term::and(vec![
//!     Eq::new(f1.clone(), "a").unwrap().into(),
//!     term::not(In::new(f1, vec!["X".into()]).unwrap()).into(),
//! ]);
//! assert_eq!(q.terms().len(), 2);
//! ```
//!
//! or with the equivalent operator sugar `a & b`, `a | b` and `!a`.
//!
//! # Module Structure
//!
//! - `field`: terms over field, text indexes and explicit documents
//! - `set`: terms over set indexes
//! - `value`: terms over value indexes
//! - `combinator`: `And`, `Or`, `Difference`, `Not`

pub mod combinator;
pub mod field;
pub mod set;
pub mod value;

use std::fmt;

use log::trace;

use crate::cache::{CacheKey, TermCache};
use crate::catalog::Context;
use crate::error::{QueryError, Result};
use crate::idset::IdSet;

pub use combinator::{And, Difference, Not, Or};
pub use field::{All, Between, Eq, Ge, In, Le, NotEq, Objects, Text};
pub use set::{AllOf, AnyOf, ExtentAny, ExtentNone, SetBetween};
pub use value::{
    ValueBetween, ValueEq, ValueExtentAny, ValueExtentNone, ValueGe, ValueIn, ValueLe, ValueNotEq,
};

/// A node of a query tree.
pub trait Term: fmt::Debug + Send + Sync {
    /// Compute the ids matching this term.
    ///
    /// Combinators must evaluate their children through
    /// [`cached_apply`](Term::cached_apply), never through `apply`.
    fn apply(&self, cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        let _ = (cache, ctx);
        Err(QueryError::unsupported(format!(
            "{} cannot be evaluated",
            self.description()
        )))
    }

    /// Structural identity used as cache key.
    ///
    /// Terms without a stable identity keep the default, which makes
    /// [`cached_apply`](Term::cached_apply) evaluate them directly.
    fn key(&self, ctx: &Context) -> Result<CacheKey> {
        let _ = ctx;
        Err(QueryError::unsupported(format!(
            "{} has no cache key",
            self.description()
        )))
    }

    /// Evaluate through `cache`: look the key up, compute and store on a
    /// miss. Terms without a key bypass the cache.
    fn cached_apply(&self, cache: &mut dyn TermCache, ctx: &Context) -> Result<IdSet> {
        let key = match self.key(ctx) {
            Ok(key) => key,
            Err(err) if err.is_unsupported() => return self.apply(cache, ctx),
            Err(err) => return Err(err),
        };
        if let Some(hit) = cache.get(&key) {
            trace!("cache hit for {key}");
            return Ok(hit);
        }
        trace!("cache miss for {key}");
        let result = self.apply(cache, ctx)?;
        cache.set(key, result.clone());
        Ok(result)
    }

    /// Human-readable description of the term.
    fn description(&self) -> String {
        format!("{self:?}")
    }

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Term>;
}

impl Clone for Box<dyn Term> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Conversion into a boxed term, used by constructors and operator sugar.
pub trait IntoTerm {
    fn into_term(self) -> Box<dyn Term>;
}

impl IntoTerm for Box<dyn Term> {
    fn into_term(self) -> Box<dyn Term> {
        self
    }
}

/// Implements [`IntoTerm`], `From<T> for Box<dyn Term>` and the `&`, `|`, `!`
/// operators for term types.
#[macro_export]
macro_rules! impl_term_ops {
    ($($ty:ty),* $(,)?) => {$(
        impl $crate::term::IntoTerm for $ty {
            fn into_term(self) -> Box<dyn $crate::term::Term> {
                Box::new(self)
            }
        }

        impl From<$ty> for Box<dyn $crate::term::Term> {
            fn from(term: $ty) -> Self {
                Box::new(term)
            }
        }

        impl<R: $crate::term::IntoTerm> std::ops::BitAnd<R> for $ty {
            type Output = $crate::term::And;

            fn bitand(self, rhs: R) -> Self::Output {
                $crate::term::and(vec![
                    $crate::term::IntoTerm::into_term(self),
                    rhs.into_term(),
                ])
            }
        }

        impl<R: $crate::term::IntoTerm> std::ops::BitOr<R> for $ty {
            type Output = $crate::term::Or;

            fn bitor(self, rhs: R) -> Self::Output {
                $crate::term::or(vec![
                    $crate::term::IntoTerm::into_term(self),
                    rhs.into_term(),
                ])
            }
        }

        impl std::ops::Not for $ty {
            type Output = $crate::term::Not;

            fn not(self) -> Self::Output {
                $crate::term::not(self)
            }
        }
    )*};
}

impl<R: IntoTerm> std::ops::BitAnd<R> for Box<dyn Term> {
    type Output = And;

    fn bitand(self, rhs: R) -> And {
        and(vec![self, rhs.into_term()])
    }
}

impl<R: IntoTerm> std::ops::BitOr<R> for Box<dyn Term> {
    type Output = Or;

    fn bitor(self, rhs: R) -> Or {
        or(vec![self, rhs.into_term()])
    }
}

impl std::ops::Not for Box<dyn Term> {
    type Output = Not;

    fn not(self) -> Not {
        not(self)
    }
}

/// Build a `Vec<Box<dyn Term>>` from term values of mixed types.
#[macro_export]
macro_rules! terms {
    ($($term:expr),* $(,)?) => {
        vec![$($crate::term::IntoTerm::into_term($term)),*]
    };
}

/// Intersection of `terms`.
pub fn and(terms: Vec<Box<dyn Term>>) -> And {
    And::new(terms)
}

/// Union of `terms`.
pub fn or(terms: Vec<Box<dyn Term>>) -> Or {
    Or::new(terms)
}

/// Complement of `term` against every registered id.
pub fn not(term: impl IntoTerm) -> Not {
    Not::new(term.into_term())
}

/// The first of `terms` minus each of the others.
pub fn difference(terms: Vec<Box<dyn Term>>) -> Difference {
    Difference::new(terms)
}
