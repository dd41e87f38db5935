//! A cache decorator that records how long each term takes to evaluate.
//!
//! [`TimingCache`] relies on the shape of [`Term::cached_apply`]: a miss is
//! followed by evaluation and then a store under the same key, so the time
//! between the two is the cost of the term including its children. A global
//! event counter orders misses and stores; a timing that starts while
//! another is still open is nested inside it.
//!
//! Timing never changes results. Hits are passed through untimed.
//!
//! [`Term::cached_apply`]: crate::term::Term::cached_apply

use std::time::{Duration, Instant};

use ahash::AHashMap;
use log::info;

use crate::cache::{CacheKey, TermCache};
use crate::error::{QueryError, Result};
use crate::idset::IdSet;

/// Default number of spaces per nesting level in the report.
pub const DEFAULT_INDENT: usize = 4;

/// Start and end of one evaluation.
#[derive(Debug, Clone)]
pub struct Timing {
    pub key: CacheKey,
    pub start: Instant,
    pub start_order: u64,
    pub end: Option<Instant>,
    pub end_order: Option<u64>,
}

impl Timing {
    pub fn new(key: CacheKey, start_order: u64) -> Self {
        Timing {
            key,
            start: Instant::now(),
            start_order,
            end: None,
            end_order: None,
        }
    }

    /// Mark the evaluation finished at event `end_order`.
    pub fn done(&mut self, end_order: u64) {
        self.end = Some(Instant::now());
        self.end_order = Some(end_order);
    }

    /// Elapsed time, or `None` while unfinished.
    pub fn total(&self) -> Option<Duration> {
        self.end.map(|end| end.duration_since(self.start))
    }

    pub fn is_done(&self) -> bool {
        self.end.is_some()
    }

    /// Whether `other` started while this timing was open.
    fn encloses(&self, other: &Timing) -> bool {
        self.start_order < other.start_order
            && self.end_order.is_none_or(|end| other.start_order < end)
    }
}

/// Wraps a cache and times every miss until the matching store.
pub struct TimingCache<'a> {
    inner: &'a mut dyn TermCache,
    timings: Vec<Timing>,
    by_key: AHashMap<CacheKey, usize>,
    count: u64,
    post: Option<Timing>,
    indent: usize,
}

impl<'a> TimingCache<'a> {
    pub fn new(inner: &'a mut dyn TermCache) -> Self {
        TimingCache {
            inner,
            timings: Vec::new(),
            by_key: AHashMap::new(),
            count: 0,
            post: None,
            indent: DEFAULT_INDENT,
        }
    }

    /// Spaces per nesting level in the report.
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Number of timed events so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn timing(&self, key: &CacheKey) -> Option<&Timing> {
        self.by_key.get(key).map(|&i| &self.timings[i])
    }

    pub fn timings(&self) -> &[Timing] {
        &self.timings
    }

    pub fn post(&self) -> Option<&Timing> {
        self.post.as_ref()
    }

    /// Start timing the post-processing phase.
    pub fn start_post(&mut self) {
        self.post = Some(Timing::new(CacheKey::new("post"), 0));
    }

    /// Finish timing the post-processing phase.
    pub fn end_post(&mut self) -> Result<()> {
        let post = self
            .post
            .as_mut()
            .ok_or_else(|| QueryError::internal("post-processing timing was never started"))?;
        post.done(0);
        Ok(())
    }

    fn depth(&self, timing: &Timing) -> usize {
        self.timings.iter().filter(|t| t.encloses(timing)).count()
    }

    /// The report as lines: a summary followed by one line per timed key,
    /// ordered by start and indented by nesting.
    ///
    /// Nothing is reported when no key was timed, or when the total is under
    /// `threshold` seconds.
    pub fn report_lines(&self, threshold: Option<f64>) -> Vec<String> {
        if self.timings.is_empty() {
            return Vec::new();
        }

        let terms: f64 = self
            .timings
            .iter()
            .filter(|t| self.depth(t) == 0)
            .filter_map(Timing::total)
            .map(|d| d.as_secs_f64())
            .sum();
        let post = self
            .post
            .as_ref()
            .and_then(Timing::total)
            .map_or(0.0, |d| d.as_secs_f64());
        let total = terms + post;
        if let Some(threshold) = threshold
            && total < threshold
        {
            return Vec::new();
        }

        let mut ordered: Vec<&Timing> = self.timings.iter().collect();
        ordered.sort_by_key(|t| t.start_order);

        let mut lines = Vec::with_capacity(ordered.len() + 1);
        lines.push(format!(
            "Catalog query took {total:.6}s: {terms:.6}s for terms, {post:.6}s to finish."
        ));
        for timing in ordered {
            let pad = " ".repeat(self.indent * (self.depth(timing) + 1));
            let line = match timing.total() {
                Some(d) => format!("{pad}{:.6}s: {}.", d.as_secs_f64(), timing.key),
                None => format!("{pad}?: {}.", timing.key),
            };
            lines.push(line);
        }
        lines
    }

    /// Log the report at info level.
    pub fn report(&self, threshold: Option<f64>) {
        for line in self.report_lines(threshold) {
            info!("{line}");
        }
    }
}

impl TermCache for TimingCache<'_> {
    fn get(&mut self, key: &CacheKey) -> Option<IdSet> {
        let hit = self.inner.get(key);
        if hit.is_none() {
            self.count += 1;
            let timing = Timing::new(key.clone(), self.count);
            match self.by_key.get(key) {
                Some(&i) => self.timings[i] = timing,
                None => {
                    self.by_key.insert(key.clone(), self.timings.len());
                    self.timings.push(timing);
                }
            }
        }
        hit
    }

    fn set(&mut self, key: CacheKey, value: IdSet) {
        if let Some(&i) = self.by_key.get(&key)
            && !self.timings[i].is_done()
        {
            self.count += 1;
            self.timings[i].done(self.count);
        }
        self.inner.set(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn key(name: &str) -> CacheKey {
        CacheKey::new("test").with_str(name)
    }

    fn indent_of(line: &str) -> usize {
        line.len() - line.trim_start_matches(' ').len()
    }

    #[test]
    fn test_timing_total() {
        let mut timing = Timing::new(key("foo"), 1);
        assert_eq!(timing.start_order, 1);
        assert!(timing.total().is_none());
        timing.done(2);
        assert_eq!(timing.end_order, Some(2));
        assert!(timing.total().is_some());
    }

    #[test]
    fn test_miss_then_store_is_timed() {
        let mut inner = MemoryCache::new();
        let mut cache = TimingCache::new(&mut inner);
        assert!(cache.get(&key("foo")).is_none());
        assert_eq!(cache.count(), 1);
        assert!(!cache.timing(&key("foo")).unwrap().is_done());
        cache.set(key("foo"), IdSet::from(vec![1]));
        assert_eq!(cache.count(), 2);
        assert!(cache.timing(&key("foo")).unwrap().is_done());
        drop(cache);
        assert!(inner.contains(&key("foo")));
    }

    #[test]
    fn test_hits_and_untimed_stores_are_not_counted() {
        let mut inner = MemoryCache::new();
        inner.set(key("foo"), IdSet::from(vec![1]));
        let mut cache = TimingCache::new(&mut inner);
        assert!(cache.get(&key("foo")).is_some());
        cache.set(key("bar"), IdSet::new());
        assert_eq!(cache.count(), 0);
        assert!(cache.timings().is_empty());
    }

    #[test]
    fn test_empty_report() {
        let mut inner = MemoryCache::new();
        let cache = TimingCache::new(&mut inner);
        assert!(cache.report_lines(None).is_empty());
    }

    #[test]
    fn test_report_header_and_threshold() {
        let mut inner = MemoryCache::new();
        let mut cache = TimingCache::new(&mut inner);
        cache.start_post();
        cache.get(&key("foo"));
        cache.set(key("foo"), IdSet::new());
        cache.end_post().unwrap();

        let lines = cache.report_lines(None);
        assert!(lines[0].contains("s for terms"));
        assert!(lines[0].contains("s to finish"));
        assert!(lines[1].ends_with("s: ('test', 'foo')."));
        assert!(cache.report_lines(Some(60.0)).is_empty());
    }

    #[test]
    fn test_end_post_requires_start() {
        let mut inner = MemoryCache::new();
        let mut cache = TimingCache::new(&mut inner);
        assert!(cache.end_post().is_err());
    }

    #[test]
    fn test_report_nesting() {
        let mut inner = MemoryCache::new();
        let mut cache = TimingCache::new(&mut inner).with_indent(2);
        cache.get(&key("foobar"));
        cache.set(key("foobar"), IdSet::new());
        cache.get(&key("foo"));
        cache.get(&key("bar"));
        cache.set(key("bar"), IdSet::new());
        cache.set(key("foo"), IdSet::new());
        cache.get(&key("baz"));
        cache.set(key("baz"), IdSet::new());

        let lines = cache.report_lines(None);
        assert_eq!(lines.len(), 5);
        assert_eq!(indent_of(&lines[1]), 2);
        assert_eq!(indent_of(&lines[2]), 2);
        assert_eq!(indent_of(&lines[3]), 4);
        assert_eq!(indent_of(&lines[4]), 2);
    }

    #[test]
    fn test_unfinished_key_reported() {
        let mut inner = MemoryCache::new();
        let mut cache = TimingCache::new(&mut inner);
        cache.get(&key("foo"));
        cache.get(&key("foobar"));
        cache.set(key("foo"), IdSet::new());
        let lines = cache.report_lines(None);
        assert!(lines[2].ends_with("?: ('test', 'foobar')."));
    }
}
