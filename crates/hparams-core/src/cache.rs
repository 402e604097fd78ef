//! Aggregated-group cache.
//!
//! Grouping and aggregation depend only on the snapshot content, the
//! aggregation spec and the status allow-list, so their output is shared
//! across requests that differ only in columns, filters, sorting or paging.
//! Entries for superseded snapshots are dropped with
//! [`AggregationCache::invalidate_except`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::session::SessionStatus;
use crate::obs::emit_cache_lookup;
use crate::metrics::METRICS;
use crate::query::aggregator::AggregationSpec;
use crate::query::response::SessionGroup;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub snapshot_digest: String,
    pub aggregation: AggregationSpec,
    /// Sorted and deduplicated.
    pub allowed_statuses: Vec<SessionStatus>,
}

impl CacheKey {
    pub fn new(
        snapshot_digest: impl Into<String>,
        aggregation: AggregationSpec,
        allowed_statuses: Vec<SessionStatus>,
    ) -> Self {
        Self {
            snapshot_digest: snapshot_digest.into(),
            aggregation,
            allowed_statuses,
        }
    }
}

pub type CachedGroups = Arc<Vec<SessionGroup>>;

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CachedGroups>,
    order: VecDeque<CacheKey>,
}

/// Bounded FIFO cache of aggregated session groups.
pub struct AggregationCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl AggregationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // Entries are immutable once inserted, so a poisoned lock still guards
    // consistent data.
    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedGroups> {
        let state = self.state();
        let found = state.entries.get(key).cloned();
        if found.is_some() {
            METRICS.inc_cache_hits();
        } else {
            METRICS.inc_cache_misses();
        }
        emit_cache_lookup(found.is_some(), state.entries.len());
        found
    }

    /// Store `groups`, evicting the oldest entry when full. Returns the
    /// cached value, which is the existing one if another query raced us.
    pub fn insert(&self, key: CacheKey, groups: CachedGroups) -> CachedGroups {
        if self.capacity == 0 {
            return groups;
        }
        let mut state = self.state();
        if let Some(existing) = state.entries.get(&key) {
            return Arc::clone(existing);
        }
        while state.entries.len() >= self.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }
        state.order.push_back(key.clone());
        state.entries.insert(key, Arc::clone(&groups));
        groups
    }

    /// Drop every entry not computed from the snapshot with `digest`.
    /// Returns the number of entries removed.
    pub fn invalidate_except(&self, digest: &str) -> usize {
        let mut state = self.state();
        let before = state.entries.len();
        state.entries.retain(|key, _| key.snapshot_digest == digest);
        state.order.retain(|key| key.snapshot_digest == digest);
        before - state.entries.len()
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state();
        state.entries.clear();
        state.order.clear();
    }
}

impl std::fmt::Debug for AggregationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
