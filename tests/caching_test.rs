mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use catalog_query::cache::{CacheState, DisabledCache};
use catalog_query::index::{FieldIndex, MemoryFieldIndex};
use catalog_query::term::{self, All, Eq};
use catalog_query::{
    CacheKey, CacheMode, Catalog, CatalogLocator, Context, DataValue, EvaluationCache,
    ExecutorConfig, IdSet, Index, IndexRef, MemoryCache, QueryExecutor, Result, SearchRequest,
    Term, TermCache, TimingCache, WorkOutcome, terms,
};

use common::{Fixture, capture_timing_report, display, f1};

/// Caller-managed cache counting its calls.
#[derive(Default)]
struct MockCache {
    entries: MemoryCache,
    gets: usize,
    sets: usize,
}

impl TermCache for MockCache {
    fn get(&mut self, key: &CacheKey) -> Option<IdSet> {
        self.gets += 1;
        self.entries.get(key)
    }

    fn set(&mut self, key: CacheKey, value: IdSet) {
        self.sets += 1;
        self.entries.set(key, value);
    }
}

/// A field index counting range lookups.
#[derive(Debug)]
struct CountingIndex {
    inner: MemoryFieldIndex,
    lookups: AtomicUsize,
}

impl CountingIndex {
    fn new(name: &str, values: &[&str]) -> Self {
        let inner = MemoryFieldIndex::new(name);
        for (id, value) in values.iter().enumerate() {
            inner.index_doc(id as u64, *value);
        }
        CountingIndex {
            inner,
            lookups: AtomicUsize::new(0),
        }
    }

    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl FieldIndex for CountingIndex {
    fn apply_range(&self, min: Option<&DataValue>, max: Option<&DataValue>) -> Result<IdSet> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.apply_range(min, max)
    }
}

impl Index for CountingIndex {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn as_field(&self) -> Option<&dyn FieldIndex> {
        Some(self)
    }
}

fn counting_context(values: &[&str]) -> (Context, Arc<CountingIndex>) {
    let index = Arc::new(CountingIndex::new("f1", values));
    let catalog = Arc::new(Catalog::new());
    catalog.add_index(index.clone());
    let locator = Arc::new(CatalogLocator::new(Arc::new(
        catalog_query::MemoryRegistry::new(),
    )));
    locator.add_catalog("catalog1", catalog);
    (Context::new(locator), index)
}

#[test]
fn test_injected_cache_call_counts() -> Result<()> {
    let fixture = Fixture::new();
    let ctx = fixture.context();
    let executor = QueryExecutor::default();
    let query = term::and(terms![All::new(f1())]);
    let mut cache = MockCache::default();

    executor.search_results(
        &query,
        &ctx,
        &SearchRequest::default(),
        CacheMode::External(&mut cache),
    )?;
    assert_eq!((cache.gets, cache.sets), (2, 2));

    let mut keys: Vec<String> = cache.entries.keys().map(ToString::to_string).collect();
    keys.sort();
    assert_eq!(
        keys,
        vec![
            "('all', 'catalog1', 'f1')",
            "('and', ('all', 'catalog1', 'f1'))",
        ]
    );

    executor.search_results(
        &query,
        &ctx,
        &SearchRequest::default(),
        CacheMode::External(&mut cache),
    )?;
    assert_eq!((cache.gets, cache.sets), (3, 2));
    Ok(())
}

#[test]
fn test_repeated_subterms_hit_index_once() -> Result<()> {
    let (ctx, index) = counting_context(&["a", "a", "X"]);
    let eq = Eq::new(f1(), "a")?;
    let query = term::or(terms![eq.clone(), term::and(terms![eq.clone(), All::new(f1())])]);

    let result = query.cached_apply(&mut MemoryCache::new(), &ctx)?;
    assert_eq!(result.as_slice(), &[0, 1]);
    assert_eq!(index.lookups(), 2);
    Ok(())
}

#[test]
fn test_scoped_cache_reuses_results_within_unit_of_work() -> Result<()> {
    let (ctx, index) = counting_context(&["a", "b"]);
    let executor = QueryExecutor::default();
    let query = All::new(f1());
    let mut scope = EvaluationCache::new();
    assert_eq!(scope.state(), CacheState::Unused);

    let first = executor.search_results(
        &query,
        &ctx,
        &SearchRequest::default(),
        CacheMode::Scoped(&mut scope),
    )?;
    let second = executor.search_results(
        &query,
        &ctx,
        &SearchRequest::default(),
        CacheMode::Scoped(&mut scope),
    )?;
    assert_eq!(first.ids(), second.ids());
    assert_eq!(index.lookups(), 1);
    assert!(scope.is_joined());

    scope.complete(WorkOutcome::Committed);
    assert_eq!(scope.state(), CacheState::Reset);
    assert!(scope.is_empty());

    executor.search_results(
        &query,
        &ctx,
        &SearchRequest::default(),
        CacheMode::Scoped(&mut scope),
    )?;
    assert_eq!(index.lookups(), 2);
    Ok(())
}

#[test]
fn test_aborted_unit_of_work_also_resets() -> Result<()> {
    let (ctx, _) = counting_context(&["a"]);
    let mut scope = EvaluationCache::new();
    QueryExecutor::default().search_results(
        &All::new(f1()),
        &ctx,
        &SearchRequest::default(),
        CacheMode::Scoped(&mut scope),
    )?;
    assert!(!scope.is_empty());
    scope.complete(WorkOutcome::Aborted);
    assert!(scope.is_empty());
    assert!(!scope.is_joined());
    Ok(())
}

#[test]
fn test_context_switch_invalidates_scoped_cache() -> Result<()> {
    let (ctx1, index1) = counting_context(&["a", "a"]);
    let (ctx2, index2) = counting_context(&["a", "b", "a", "a"]);
    let executor = QueryExecutor::default();
    let query = Eq::new(f1(), "a")?;
    let mut scope = EvaluationCache::new();

    let first = executor.search_results(
        &query,
        &ctx1,
        &SearchRequest::default(),
        CacheMode::Scoped(&mut scope),
    )?;
    let second = executor.search_results(
        &query,
        &ctx2,
        &SearchRequest::default(),
        CacheMode::Scoped(&mut scope),
    )?;
    assert_eq!(first.all().as_slice(), &[0, 1]);
    assert_eq!(second.all().as_slice(), &[0, 2, 3]);
    assert_eq!((index1.lookups(), index2.lookups()), (1, 1));
    Ok(())
}

#[test]
fn test_default_mode_does_not_persist() -> Result<()> {
    let (ctx, index) = counting_context(&["a"]);
    let executor = QueryExecutor::default();
    let query = term::and(terms![All::new(f1()), All::new(f1())]);
    executor.search(&query, &ctx, &SearchRequest::default())?;
    // the second child hits the per-call cache
    assert_eq!(index.lookups(), 1);
    executor.search(&query, &ctx, &SearchRequest::default())?;
    assert_eq!(index.lookups(), 2);
    Ok(())
}

#[test]
fn test_disabled_mode_never_hits() -> Result<()> {
    let (ctx, index) = counting_context(&["a"]);
    let query = term::and(terms![All::new(f1()), All::new(f1())]);
    QueryExecutor::default().search_results(
        &query,
        &ctx,
        &SearchRequest::default(),
        CacheMode::Disabled,
    )?;
    assert_eq!(index.lookups(), 2);

    let mut disabled = DisabledCache;
    disabled.set(All::new(f1()).key(&ctx)?, IdSet::from(vec![1]));
    assert!(disabled.get(&All::new(f1()).key(&ctx)?).is_none());
    Ok(())
}

#[test]
fn test_timing_report_names_nested_keys() -> Result<()> {
    let fixture = Fixture::new();
    let ctx = fixture.context();
    let mut inner = MemoryCache::new();
    let mut timing = TimingCache::new(&mut inner);
    let query = term::and(terms![All::new(f1())]);
    query.cached_apply(&mut timing, &ctx)?;

    let lines = timing.report_lines(Some(0.0));
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("('and', ('all', 'catalog1', 'f1'))"));
    assert!(lines[2].contains("('all', 'catalog1', 'f1')"));
    assert!(timing.report_lines(Some(5.0)).is_empty());
    Ok(())
}

#[test]
fn test_timing_on_empty_result() -> Result<()> {
    let fixture = Fixture::new();
    let ctx = fixture.context();
    let request = SearchRequest::builder().timing(0.0).build();
    let query = term::and(terms![Eq::new(f1(), "foo")?]);
    let (view, lines) =
        capture_timing_report(|| QueryExecutor::default().search(&query, &ctx, &request));
    assert!(display(&view?).is_empty());

    assert_eq!(lines.len(), 3, "{lines:#?}");
    assert!(lines[0].starts_with("Catalog query took "));
    assert!(lines[1].starts_with("    ") && !lines[1].starts_with("     "));
    assert!(lines[1].ends_with(": ('and', ('eq', 'catalog1', 'f1', 'foo'))."));
    assert!(lines[2].starts_with("        "));
    assert!(lines[2].ends_with(": ('eq', 'catalog1', 'f1', 'foo')."));
    Ok(())
}

#[test]
fn test_timing_enabled_by_config() -> Result<()> {
    let fixture = Fixture::new();
    let ctx = fixture.context();
    let config = ExecutorConfig::from_json(r#"{"timing_threshold": 0.0, "timing_indent": 2}"#)?;
    let executor = QueryExecutor::new(config);
    let query = term::and(terms![All::new(f1())]);

    let (view, lines) =
        capture_timing_report(|| executor.search(&query, &ctx, &SearchRequest::default()));
    assert_eq!(display(&view?), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(lines.len(), 3, "{lines:#?}");
    assert!(lines[0].starts_with("Catalog query took "));
    assert!(lines[0].ends_with("s to finish."));
    assert!(lines[1].starts_with("  ") && !lines[1].starts_with("   "));
    assert!(lines[1].ends_with(": ('and', ('all', 'catalog1', 'f1'))."));
    assert!(lines[2].starts_with("    "));
    assert!(!lines[2].starts_with("     "));
    assert!(lines[2].ends_with(": ('all', 'catalog1', 'f1')."));
    Ok(())
}

#[test]
fn test_timing_threshold_suppresses_report() -> Result<()> {
    let fixture = Fixture::new();
    let ctx = fixture.context();
    let config = ExecutorConfig {
        timing_threshold: Some(1000.0),
        ..ExecutorConfig::default()
    };
    let executor = QueryExecutor::new(config);
    let query = term::and(terms![All::new(f1())]);

    let (view, lines) =
        capture_timing_report(|| executor.search(&query, &ctx, &SearchRequest::default()));
    view?;
    assert!(lines.is_empty(), "{lines:#?}");

    // a request threshold takes precedence over the configured one
    let request = SearchRequest::builder().timing(0.0).build();
    let (view, lines) = capture_timing_report(|| executor.search(&query, &ctx, &request));
    view?;
    assert_eq!(lines.len(), 3, "{lines:#?}");

    let (view, lines) = capture_timing_report(|| {
        QueryExecutor::default().search(&query, &ctx, &SearchRequest::default())
    });
    view?;
    assert!(lines.is_empty());
    Ok(())
}

#[test]
fn test_terms_are_reusable_across_contexts() -> Result<()> {
    let fixture = Fixture::new();
    let query = Eq::new(IndexRef::new("catalog1", "f1"), "X")?;
    let a = query.cached_apply(&mut MemoryCache::new(), &fixture.context())?;
    let b = query.cached_apply(&mut MemoryCache::new(), &fixture.context())?;
    assert_eq!(a, b);
    Ok(())
}
