//! Process-wide counters for the query engine.
//!
//! Counters are bumped silently at the call site. [`Metrics::flush`] emits
//! the current values as one `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    queries_executed: AtomicU64,
    queries_rejected: AtomicU64,
    queries_cancelled: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    undeclared_fields: AtomicU64,
    inconsistent_values: AtomicU64,
    snapshots_published: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! counter {
    ($inc:ident, $get:ident, $field:ident) => {
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(metric = stringify!($field), "counter incremented");
        }

        pub fn $get(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            queries_executed: AtomicU64::new(0),
            queries_rejected: AtomicU64::new(0),
            queries_cancelled: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            undeclared_fields: AtomicU64::new(0),
            inconsistent_values: AtomicU64::new(0),
            snapshots_published: AtomicU64::new(0),
        }
    }

    counter!(inc_queries_executed, queries_executed, queries_executed);
    counter!(inc_queries_rejected, queries_rejected, queries_rejected);
    counter!(inc_queries_cancelled, queries_cancelled, queries_cancelled);
    counter!(inc_cache_hits, cache_hits, cache_hits);
    counter!(inc_cache_misses, cache_misses, cache_misses);
    counter!(inc_undeclared_fields, undeclared_fields, undeclared_fields);
    counter!(inc_inconsistent_values, inconsistent_values, inconsistent_values);
    counter!(inc_snapshots_published, snapshots_published, snapshots_published);

    /// Emit all counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            queries_executed = self.queries_executed(),
            queries_rejected = self.queries_rejected(),
            queries_cancelled = self.queries_cancelled(),
            cache_hits = self.cache_hits(),
            cache_misses = self.cache_misses(),
            undeclared_fields = self.undeclared_fields(),
            inconsistent_values = self.inconsistent_values(),
            snapshots_published = self.snapshots_published(),
        );
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.queries_executed,
            &self.queries_rejected,
            &self.queries_cancelled,
            &self.cache_hits,
            &self.cache_misses,
            &self.undeclared_fields,
            &self.inconsistent_values,
            &self.snapshots_published,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
