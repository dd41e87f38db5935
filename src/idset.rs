//! Ordered sets of document ids and the merge operations over them.
//!
//! An [`IdSet`] is immutable once built and shares its buffer between clones,
//! so handing the same result to a cache and to a caller costs a pointer copy.
//! All binary operations walk both inputs once (O(n + m)).

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;

/// Weight assumed for ids of an unweighted set.
pub const DEFAULT_WEIGHT: i64 = 1;

/// An ordered, unique collection of document ids with optional per-id weights.
#[derive(Clone)]
pub struct IdSet {
    ids: Arc<[u64]>,
    weights: Option<Arc<[i64]>>,
}

impl IdSet {
    /// Create an empty set.
    pub fn new() -> Self {
        IdSet {
            ids: Arc::from(Vec::new()),
            weights: None,
        }
    }

    /// Build a set from ids that are already strictly ascending.
    pub fn from_sorted(ids: Vec<u64>) -> Self {
        debug_assert!(ids.windows(2).all(|w| w[0] < w[1]));
        IdSet {
            ids: Arc::from(ids),
            weights: None,
        }
    }

    /// Build a set from arbitrary ids, sorting and removing duplicates.
    pub fn from_unsorted(mut ids: Vec<u64>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        Self::from_sorted(ids)
    }

    fn from_weighted(ids: Vec<u64>, weights: Vec<i64>) -> Self {
        debug_assert_eq!(ids.len(), weights.len());
        IdSet {
            ids: Arc::from(ids),
            weights: Some(Arc::from(weights)),
        }
    }

    /// Number of ids in the set.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Check whether `id` is a member of the set.
    pub fn contains(&self, id: u64) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// The smallest id, if any.
    pub fn first(&self) -> Option<u64> {
        self.ids.first().copied()
    }

    /// The ids in ascending order.
    pub fn as_slice(&self) -> &[u64] {
        &self.ids
    }

    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, u64>> {
        self.ids.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<u64> {
        self.ids.to_vec()
    }

    /// Whether this set carries per-id weights.
    pub fn is_weighted(&self) -> bool {
        self.weights.is_some()
    }

    /// The weight of `id`, or `None` if it is not a member.
    ///
    /// Members of unweighted sets report [`DEFAULT_WEIGHT`].
    pub fn weight(&self, id: u64) -> Option<i64> {
        let pos = self.ids.binary_search(&id).ok()?;
        Some(self.weight_at(pos))
    }

    fn weight_at(&self, pos: usize) -> i64 {
        match &self.weights {
            Some(w) => w[pos],
            None => DEFAULT_WEIGHT,
        }
    }

    /// Check whether the two sets share the same buffer.
    pub fn ptr_eq(&self, other: &IdSet) -> bool {
        Arc::ptr_eq(&self.ids, &other.ids)
    }
}

impl Default for IdSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for IdSet {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids
    }
}

impl Eq for IdSet {}

impl fmt::Debug for IdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ids.iter()).finish()
    }
}

impl FromIterator<u64> for IdSet {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        IdSet::from_unsorted(iter.into_iter().collect())
    }
}

impl From<Vec<u64>> for IdSet {
    fn from(ids: Vec<u64>) -> Self {
        IdSet::from_unsorted(ids)
    }
}

impl<'a> IntoIterator for &'a IdSet {
    type Item = u64;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, u64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ids present in both `a` and `b`.
pub fn intersection(a: &IdSet, b: &IdSet) -> IdSet {
    if a.is_empty() || b.is_empty() {
        return IdSet::new();
    }
    let (x, y) = (a.as_slice(), b.as_slice());
    let mut out = Vec::with_capacity(x.len().min(y.len()));
    let (mut i, mut j) = (0, 0);
    while i < x.len() && j < y.len() {
        match x[i].cmp(&y[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out.push(x[i]);
                i += 1;
                j += 1;
            }
        }
    }
    IdSet::from_sorted(out)
}

/// Intersection that also merges weights.
///
/// Each member of the result carries the sum of its weights in `a` and `b`
/// (unweighted inputs count [`DEFAULT_WEIGHT`]). The returned scalar is the
/// combined weight of the operation and is always [`DEFAULT_WEIGHT`]; it is
/// kept for callers that scale results.
pub fn weighted_intersection(a: &IdSet, b: &IdSet) -> (i64, IdSet) {
    if a.is_empty() || b.is_empty() {
        return (DEFAULT_WEIGHT, IdSet::new());
    }
    let (x, y) = (a.as_slice(), b.as_slice());
    let cap = x.len().min(y.len());
    let mut ids = Vec::with_capacity(cap);
    let mut weights = Vec::with_capacity(cap);
    let (mut i, mut j) = (0, 0);
    while i < x.len() && j < y.len() {
        match x[i].cmp(&y[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                ids.push(x[i]);
                weights.push(a.weight_at(i) + b.weight_at(j));
                i += 1;
                j += 1;
            }
        }
    }
    (DEFAULT_WEIGHT, IdSet::from_weighted(ids, weights))
}

/// Ids present in `a` or `b`.
pub fn union(a: &IdSet, b: &IdSet) -> IdSet {
    if a.is_empty() {
        return b.clone();
    }
    if b.is_empty() {
        return a.clone();
    }
    let (x, y) = (a.as_slice(), b.as_slice());
    let mut out = Vec::with_capacity(x.len() + y.len());
    let (mut i, mut j) = (0, 0);
    while i < x.len() && j < y.len() {
        match x[i].cmp(&y[j]) {
            Ordering::Less => {
                out.push(x[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(y[j]);
                j += 1;
            }
            Ordering::Equal => {
                out.push(x[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&x[i..]);
    out.extend_from_slice(&y[j..]);
    IdSet::from_sorted(out)
}

/// Union of any number of sets in a single k-way merge.
///
/// Every input id is pushed through a heap of size k once, so the cost is
/// O(N log k) rather than the O(N k) of folding pairwise unions.
pub fn multiunion(sets: &[IdSet]) -> IdSet {
    let non_empty: Vec<&IdSet> = sets.iter().filter(|s| !s.is_empty()).collect();
    match non_empty.len() {
        0 => return IdSet::new(),
        1 => return non_empty[0].clone(),
        2 => return union(non_empty[0], non_empty[1]),
        _ => {}
    }

    let total: usize = non_empty.iter().map(|s| s.len()).sum();
    let mut out: Vec<u64> = Vec::with_capacity(total);
    let mut heap = BinaryHeap::with_capacity(non_empty.len());
    for (set_idx, set) in non_empty.iter().enumerate() {
        heap.push(Reverse((set.as_slice()[0], set_idx, 0usize)));
    }

    while let Some(Reverse((id, set_idx, pos))) = heap.pop() {
        if out.last() != Some(&id) {
            out.push(id);
        }
        let next = pos + 1;
        let slice = non_empty[set_idx].as_slice();
        if next < slice.len() {
            heap.push(Reverse((slice[next], set_idx, next)));
        }
    }

    IdSet::from_sorted(out)
}

/// Ids in `a` that are not in `b`. Weights of `a` are preserved.
pub fn difference(a: &IdSet, b: &IdSet) -> IdSet {
    if a.is_empty() {
        return IdSet::new();
    }
    if b.is_empty() {
        return a.clone();
    }
    let (x, y) = (a.as_slice(), b.as_slice());
    let mut ids = Vec::with_capacity(x.len());
    let mut weights = a.weights.as_ref().map(|_| Vec::with_capacity(x.len()));
    let (mut i, mut j) = (0, 0);
    while i < x.len() {
        if j < y.len() {
            match x[i].cmp(&y[j]) {
                Ordering::Greater => {
                    j += 1;
                    continue;
                }
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                    continue;
                }
                Ordering::Less => {}
            }
        }
        ids.push(x[i]);
        if let Some(w) = weights.as_mut() {
            w.push(a.weight_at(i));
        }
        i += 1;
    }
    match weights {
        Some(w) => IdSet::from_weighted(ids, w),
        None => IdSet::from_sorted(ids),
    }
}
