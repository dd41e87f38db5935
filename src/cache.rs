//! Caching of term results within a unit of work.
//!
//! Every term that can describe itself structurally produces a [`CacheKey`].
//! Results are stored under that key in a [`TermCache`], so repeated
//! sub-terms of one query, or of several queries evaluated in the same unit
//! of work, hit the indexes once.
//!
//! Keys are not qualified by [`Context`]: the same key under another context
//! may name a different index. [`EvaluationCache`] therefore drops its
//! entries whenever it is used with a different context.

use std::fmt;

use ahash::AHashMap;
use log::debug;

use crate::catalog::Context;
use crate::data::DataValue;
use crate::idset::IdSet;
use crate::index::IndexRef;

/// One component of a [`CacheKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Str(String),
    Value(DataValue),
    Values(Vec<DataValue>),
    Optional(Option<DataValue>),
    Flag(bool),
    Key(CacheKey),
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Str(s) => write!(f, "'{s}'"),
            KeyPart::Value(v) => write!(f, "{v}"),
            KeyPart::Values(vs) => {
                f.write_str("[")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            KeyPart::Optional(Some(v)) => write!(f, "{v}"),
            KeyPart::Optional(None) => f.write_str("None"),
            KeyPart::Flag(b) => write!(f, "{b}"),
            KeyPart::Key(k) => write!(f, "{k}"),
        }
    }
}

/// Structural identity of a term: its kind followed by its parameters and,
/// for combinators, the keys of its children in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: &'static str,
    parts: Vec<KeyPart>,
}

impl CacheKey {
    pub fn new(kind: &'static str) -> Self {
        CacheKey {
            kind,
            parts: Vec::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    pub fn with_str(mut self, s: impl Into<String>) -> Self {
        self.parts.push(KeyPart::Str(s.into()));
        self
    }

    /// Append the catalog and index names.
    pub fn with_index(self, index: &IndexRef) -> Self {
        self.with_str(index.catalog.clone())
            .with_str(index.index.clone())
    }

    pub fn with_value(mut self, value: DataValue) -> Self {
        self.parts.push(KeyPart::Value(value));
        self
    }

    pub fn with_values(mut self, values: Vec<DataValue>) -> Self {
        self.parts.push(KeyPart::Values(values));
        self
    }

    pub fn with_optional(mut self, value: Option<DataValue>) -> Self {
        self.parts.push(KeyPart::Optional(value));
        self
    }

    pub fn with_flag(mut self, flag: bool) -> Self {
        self.parts.push(KeyPart::Flag(flag));
        self
    }

    pub fn with_key(mut self, key: CacheKey) -> Self {
        self.parts.push(KeyPart::Key(key));
        self
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "('{}'", self.kind)?;
        for part in &self.parts {
            write!(f, ", {part}")?;
        }
        f.write_str(")")
    }
}

/// A key → result store.
///
/// This is also the contract for caches injected by callers: `get` returns
/// a stored result or `None`, `set` stores one.
pub trait TermCache {
    fn get(&mut self, key: &CacheKey) -> Option<IdSet>;

    fn set(&mut self, key: CacheKey, value: IdSet);
}

/// A plain in-memory cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: AHashMap<CacheKey, IdSet>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries.keys()
    }
}

impl TermCache for MemoryCache {
    fn get(&mut self, key: &CacheKey) -> Option<IdSet> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: CacheKey, value: IdSet) {
        self.entries.insert(key, value);
    }
}

/// A cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCache;

impl TermCache for DisabledCache {
    fn get(&mut self, _key: &CacheKey) -> Option<IdSet> {
        None
    }

    fn set(&mut self, _key: CacheKey, _value: IdSet) {}
}

/// Lifecycle state of an [`EvaluationCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Never used.
    Unused,
    /// Attached to the active unit of work.
    Joined,
    /// Cleared at the end of a unit of work and detached.
    Reset,
}

/// How a unit of work ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    Committed,
    Aborted,
}

/// A cache scoped to one unit of work.
///
/// Whoever orchestrates the unit of work owns the cache and drives its
/// lifecycle: the executor calls [`join`](Self::join) on first use, the
/// orchestrator calls [`complete`](Self::complete) when the unit of work
/// ends, whatever the outcome. Each concurrent unit of work owns its own
/// instance; nothing is shared or locked.
#[derive(Debug)]
pub struct EvaluationCache {
    state: CacheState,
    context_id: Option<u64>,
    entries: MemoryCache,
}

impl EvaluationCache {
    pub fn new() -> Self {
        EvaluationCache {
            state: CacheState::Unused,
            context_id: None,
            entries: MemoryCache::new(),
        }
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn is_joined(&self) -> bool {
        self.state == CacheState::Joined
    }

    /// Attach to the active unit of work. Returns `true` if this call
    /// joined, `false` if the cache was already joined.
    pub fn join(&mut self) -> bool {
        if self.is_joined() {
            return false;
        }
        debug!("evaluation cache joined unit of work");
        self.state = CacheState::Joined;
        true
    }

    /// End of the unit of work: drop every entry and detach.
    pub fn complete(&mut self, outcome: WorkOutcome) {
        debug!(
            "evaluation cache reset after {:?} unit of work ({} entries dropped)",
            outcome,
            self.entries.len()
        );
        self.entries.clear();
        self.context_id = None;
        self.state = CacheState::Reset;
    }

    /// Use the cache under `ctx`, dropping all entries if it was last used
    /// under another context.
    pub fn bind_context(&mut self, ctx: &Context) {
        match self.context_id {
            Some(id) if id == ctx.id() => {}
            Some(id) => {
                debug!(
                    "context switched from {} to {}, invalidating {} cached results",
                    id,
                    ctx.id(),
                    self.entries.len()
                );
                self.entries.clear();
                self.context_id = Some(ctx.id());
            }
            None => self.context_id = Some(ctx.id()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains(key)
    }
}

impl Default for EvaluationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TermCache for EvaluationCache {
    fn get(&mut self, key: &CacheKey) -> Option<IdSet> {
        self.entries.get(key)
    }

    fn set(&mut self, key: CacheKey, value: IdSet) {
        self.entries.set(key, value);
    }
}

/// Which cache a search call evaluates with.
#[derive(Default)]
pub enum CacheMode<'a> {
    /// A fresh cache for this call only.
    #[default]
    Off,
    /// No caching at all, not even within the call.
    Disabled,
    /// The unit-of-work cache, shared across calls until it completes.
    Scoped(&'a mut EvaluationCache),
    /// A caller-managed cache.
    External(&'a mut dyn TermCache),
}

impl<'a> CacheMode<'a> {
    /// Resolve the mode into the cache a call evaluates with.
    pub fn activate(self, ctx: &Context) -> ActiveCache<'a> {
        match self {
            CacheMode::Off => ActiveCache::Owned(MemoryCache::new()),
            CacheMode::Disabled => ActiveCache::Disabled(DisabledCache),
            CacheMode::Scoped(cache) => {
                cache.join();
                cache.bind_context(ctx);
                ActiveCache::Borrowed(cache)
            }
            CacheMode::External(cache) => ActiveCache::Borrowed(cache),
        }
    }
}

impl fmt::Debug for CacheMode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheMode::Off => "Off",
            CacheMode::Disabled => "Disabled",
            CacheMode::Scoped(_) => "Scoped",
            CacheMode::External(_) => "External",
        };
        f.write_str(name)
    }
}

/// The cache a single call evaluates with.
pub enum ActiveCache<'a> {
    Owned(MemoryCache),
    Disabled(DisabledCache),
    Borrowed(&'a mut dyn TermCache),
}

impl ActiveCache<'_> {
    pub fn as_dyn(&mut self) -> &mut dyn TermCache {
        match self {
            ActiveCache::Owned(cache) => cache,
            ActiveCache::Disabled(cache) => cache,
            ActiveCache::Borrowed(cache) => &mut **cache,
        }
    }
}
