//! # catalog-query
//!
//! A boolean query algebra over catalogs of indexes.
//!
//! Elementary index lookups (equality, range, set membership, free text,
//! explicit document lists) are composed into query trees, evaluated over a
//! shared universe of `u64` document ids, cached per unit of work, then
//! sorted and windowed before ids are resolved back to documents.
//!
//! ## Features
//!
//! - Merge-based id set algebra with k-way union
//! - Field, text, set and value index terms behind capability traits
//! - Structural cache keys with per-call, scoped or caller-managed caching
//! - Nested evaluation timing reports
//! - Sort, reverse, offset and limit windowing

pub mod cache;
pub mod catalog;
pub mod config;
mod data;
mod error;
pub mod executor;
pub mod idset;
pub mod index;
pub mod registry;
pub mod result;
pub mod term;
pub mod timing;

// Re-exports for the public API
pub use cache::{CacheKey, CacheMode, EvaluationCache, MemoryCache, TermCache, WorkOutcome};
pub use catalog::{Catalog, CatalogLocator, Context, ServiceLocator};
pub use config::ExecutorConfig;
pub use data::{DataValue, Document};
pub use error::{Capability, QueryError, Result};
pub use executor::{QueryExecutor, SearchRequest, SearchRequestBuilder};
pub use idset::IdSet;
pub use index::{Index, IndexRef, ValueQuery, ValueRange};
pub use registry::{IdentityRegistry, MemoryRegistry};
pub use result::ResultView;
pub use term::{IntoTerm, Term};
pub use timing::TimingCache;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
