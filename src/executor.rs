//! Evaluation of a query tree followed by ordering and windowing.

use log::debug;

use crate::cache::{CacheMode, TermCache};
use crate::catalog::Context;
use crate::config::{self, ExecutorConfig};
use crate::error::Result;
use crate::idset::IdSet;
use crate::index::IndexRef;
use crate::result::{ResultView, Selection};
use crate::term::Term;
use crate::timing::TimingCache;

/// Per-call search options.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// Order results by this index, which must support sorting.
    pub sort_index: Option<IndexRef>,

    /// Maximum number of results to select.
    pub limit: Option<usize>,

    /// Reverse the result order.
    pub reverse: bool,

    /// Number of leading results to skip.
    pub start: usize,

    /// Overrides [`ExecutorConfig::timing_threshold`] for this call.
    pub timing_threshold: Option<f64>,
}

impl SearchRequest {
    pub fn builder() -> SearchRequestBuilder {
        SearchRequestBuilder::new()
    }

    fn is_windowed(&self) -> bool {
        self.reverse || self.start > 0 || self.limit.is_some()
    }
}

#[derive(Debug, Default)]
pub struct SearchRequestBuilder {
    request: SearchRequest,
}

impl SearchRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort_index(mut self, index: IndexRef) -> Self {
        self.request.sort_index = Some(index);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.request.limit = Some(limit);
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.request.reverse = reverse;
        self
    }

    pub fn start(mut self, start: usize) -> Self {
        self.request.start = start;
        self
    }

    /// Report timings when the search takes at least `seconds`, which must be
    /// finite and non-negative.
    pub fn timing(mut self, seconds: f64) -> Self {
        self.request.timing_threshold = Some(seconds);
        self
    }

    pub fn build(self) -> SearchRequest {
        self.request
    }
}

/// Runs searches: evaluates a term tree through a cache, then sorts and
/// windows the matches into a [`ResultView`].
#[derive(Debug, Clone, Default)]
pub struct QueryExecutor {
    config: ExecutorConfig,
}

impl QueryExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        QueryExecutor { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Search with a fresh cache for this call only.
    pub fn search(
        &self,
        term: &dyn Term,
        ctx: &Context,
        request: &SearchRequest,
    ) -> Result<ResultView> {
        self.search_results(term, ctx, request, CacheMode::Off)
    }

    /// Evaluate `term` under `ctx` and window the matches per `request`.
    ///
    /// With a sort index, the index orders the matches and is asked for no
    /// more than `start + limit` of them. Without one, matches keep ascending
    /// id order; only a reverse or window makes the selection a copy.
    pub fn search_results(
        &self,
        term: &dyn Term,
        ctx: &Context,
        request: &SearchRequest,
        cache: CacheMode<'_>,
    ) -> Result<ResultView> {
        let threshold = request.timing_threshold.or(self.config.timing_threshold);
        if let Some(threshold) = threshold {
            config::validate_threshold(threshold)?;
        }

        let mut active = cache.activate(ctx);
        match threshold {
            Some(threshold) => {
                let mut timing =
                    TimingCache::new(active.as_dyn()).with_indent(self.config.timing_indent);
                let all = term.cached_apply(&mut timing, ctx)?;
                timing.start_post();
                let view = self.select(all, ctx, request)?;
                timing.end_post()?;
                timing.report(Some(threshold));
                Ok(view)
            }
            None => {
                let cache: &mut dyn TermCache = active.as_dyn();
                let all = term.cached_apply(cache, ctx)?;
                self.select(all, ctx, request)
            }
        }
    }

    fn select(&self, all: IdSet, ctx: &Context, request: &SearchRequest) -> Result<ResultView> {
        let registry = ctx.registry();
        debug!("query matched {} ids", all.len());
        if all.is_empty() {
            return Ok(ResultView::new(all, Selection::All, registry));
        }

        if let Some(sort_index) = &request.sort_index {
            let index = ctx.index(sort_index)?;
            let limit = request
                .limit
                .map(|limit| request.start.saturating_add(limit));
            let sorted = index.sorter()?.sort(&all, limit, request.reverse)?;
            let selected = sorted.into_iter().skip(request.start).collect();
            return Ok(ResultView::new(all, Selection::Ordered(selected), registry));
        }

        if !request.is_windowed() {
            return Ok(ResultView::new(all, Selection::All, registry));
        }

        let limit = request.limit.unwrap_or(usize::MAX);
        let selected: Vec<u64> = if request.reverse {
            all.as_slice()
                .iter()
                .rev()
                .skip(request.start)
                .take(limit)
                .copied()
                .collect()
        } else {
            all.as_slice()
                .iter()
                .skip(request.start)
                .take(limit)
                .copied()
                .collect()
        };
        Ok(ResultView::new(all, Selection::Ordered(selected), registry))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{Catalog, CatalogLocator};
    use crate::data::Document;
    use crate::index::{MemoryFieldIndex, MemoryTextIndex};
    use crate::registry::MemoryRegistry;
    use crate::term::All;

    fn context() -> Context {
        let registry = Arc::new(MemoryRegistry::new());
        let field = MemoryFieldIndex::new("f1");
        for (i, value) in [5, 3, 9, 1].into_iter().enumerate() {
            let id = registry
                .register(Document::new_with_id(i.to_string()))
                .unwrap();
            field.index_doc(id, value);
        }
        let catalog = Arc::new(Catalog::new());
        catalog.add_index(Arc::new(field));
        catalog.add_index(Arc::new(MemoryTextIndex::new("body")));
        let locator = Arc::new(CatalogLocator::new(registry));
        locator.add_catalog("catalog1", catalog);
        Context::new(locator)
    }

    fn all() -> All {
        All::new(IndexRef::new("catalog1", "f1"))
    }

    #[test]
    fn test_builder() {
        let request = SearchRequest::builder()
            .limit(2)
            .start(1)
            .reverse(true)
            .build();
        assert_eq!(request.limit, Some(2));
        assert_eq!(request.start, 1);
        assert!(request.reverse);
        assert!(request.sort_index.is_none());
    }

    #[test]
    fn test_unwindowed_selection_is_all() {
        let ctx = context();
        let view = QueryExecutor::default()
            .search(&all(), &ctx, &SearchRequest::default())
            .unwrap();
        assert_eq!(view.ids(), view.all().as_slice());
        assert_eq!(view.count(), 4);
    }

    #[test]
    fn test_sorted_window() {
        let ctx = context();
        let request = SearchRequest::builder()
            .sort_index(IndexRef::new("catalog1", "f1"))
            .start(1)
            .limit(2)
            .build();
        let view = QueryExecutor::default().search(&all(), &ctx, &request).unwrap();
        // values 5, 3, 9, 1 for ids 0..4; ascending order is 3, 1, 0, 2
        assert_eq!(view.ids(), &[1, 0]);
        assert_eq!(view.total(), 4);
    }

    #[test]
    fn test_sort_requires_capability() {
        let ctx = context();
        let request = SearchRequest::builder()
            .sort_index(IndexRef::new("catalog1", "body"))
            .build();
        let err = QueryExecutor::default()
            .search(&all(), &ctx, &request)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::QueryError::MissingCapability { .. }
        ));
    }

    #[test]
    fn test_invalid_request_threshold_rejected() {
        let ctx = context();
        for threshold in [f64::NAN, -1.0, f64::INFINITY] {
            let request = SearchRequest::builder().timing(threshold).build();
            let err = QueryExecutor::default()
                .search(&all(), &ctx, &request)
                .unwrap_err();
            assert!(
                matches!(err, crate::error::QueryError::InvalidConfig(_)),
                "{threshold}: {err}"
            );
        }
    }

    #[test]
    fn test_timing_does_not_change_results() {
        let ctx = context();
        let request = SearchRequest::builder().timing(0.0).limit(3).build();
        let timed = QueryExecutor::default().search(&all(), &ctx, &request).unwrap();
        let plain = QueryExecutor::default()
            .search(&all(), &ctx, &SearchRequest::builder().limit(3).build())
            .unwrap();
        assert_eq!(timed.ids(), plain.ids());
    }
}
