//! Result cache keyed by the ranges a computation read.

use rustc_hash::FxHashMap;

use cellgrid_common::RangeRef;

/// Structural cache key: the exact set of ranges a result depends on
/// plus the rule that produced it. Hashed as data, never as a
/// concatenated string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    ranges: Vec<RangeRef>,
    rule: String,
}

/// Cache for computations whose inputs are cell ranges, invalidated
/// by geometric intersection with a mutated range. Owned by the host
/// per sheet and passed around `&mut`.
#[derive(Debug, Default)]
pub struct RangeResultCache<V> {
    map: FxHashMap<CacheKey, V>,
}

impl<V> RangeResultCache<V> {
    pub fn new() -> Self {
        Self {
            map: FxHashMap::default(),
        }
    }

    pub fn insert(&mut self, ranges: &[RangeRef], rule: &str, value: V) {
        self.map.insert(
            CacheKey {
                ranges: ranges.to_vec(),
                rule: rule.to_string(),
            },
            value,
        );
    }

    pub fn get(&self, ranges: &[RangeRef], rule: &str) -> Option<&V> {
        let key = CacheKey {
            ranges: ranges.to_vec(),
            rule: rule.to_string(),
        };
        self.map.get(&key)
    }

    /// Drop every entry whose key ranges intersect `changed`. Eager
    /// full scan; entry counts are small (one per rendered rule).
    pub fn invalidate(&mut self, changed: &RangeRef) {
        self.map
            .retain(|key, _| !key.ranges.iter().any(|r| r.intersects(changed)));
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
