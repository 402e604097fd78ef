//! Structured observability hooks for query lifecycle events.
//!
//! - [`QuerySpan`] scopes every event of one query to its snapshot
//! - `emit_*` functions cover start, stage completion, finish, rejection,
//!   cancellation, data-quality warnings and snapshot publication
//!
//! Lifecycle events are `info!`, per-stage detail is `debug!`, and anything a
//! caller should look at is `warn!`. Filter with `RUST_LOG`.

use tracing::{debug, info, warn};

use crate::domain::experiment::DataType;

/// RAII guard that enters a query-scoped tracing span.
///
/// ```ignore
/// let _span = QuerySpan::enter(snapshot.version(), snapshot.short_digest());
/// ```
pub struct QuerySpan {
    _span: tracing::span::EnteredSpan,
}

impl QuerySpan {
    pub fn enter(snapshot_version: u64, snapshot_digest: &str) -> Self {
        let span = tracing::info_span!(
            "hparams.query",
            snapshot_version = snapshot_version,
            snapshot = %snapshot_digest,
        );
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_query_started(sessions: usize, columns: usize, aggregation: &str) {
    info!(
        event = "query.started",
        sessions = sessions,
        columns = columns,
        aggregation = %aggregation,
    );
}

/// A pipeline stage finished; `rows` is its output size.
pub fn emit_stage_completed(stage: &str, rows: usize) {
    debug!(event = "query.stage_completed", stage = %stage, rows = rows);
}

pub fn emit_query_finished(duration_ms: u64, total_size: usize, returned: usize, cache_hit: bool) {
    info!(
        event = "query.finished",
        duration_ms = duration_ms,
        total_size = total_size,
        returned = returned,
        cache_hit = cache_hit,
    );
}

pub fn emit_query_rejected(field: Option<&str>, error: &dyn std::fmt::Display) {
    warn!(
        event = "query.rejected",
        field = field.unwrap_or("-"),
        error = %error,
    );
}

pub fn emit_query_cancelled(stage: &str, deadline_exceeded: bool) {
    warn!(
        event = "query.cancelled",
        stage = %stage,
        deadline_exceeded = deadline_exceeded,
    );
}

/// A session reported an hparam or metric the experiment does not declare.
pub fn emit_undeclared_field(kind: &str, id: &str) {
    warn!(event = "catalog.undeclared_field", kind = %kind, id = %id);
}

/// A session's hparam value disagrees with the column's declared type.
pub fn emit_inconsistent_value(session: &str, hparam: &str, expected: DataType, actual: DataType) {
    warn!(
        event = "catalog.inconsistent_value",
        session = %session,
        hparam = %hparam,
        expected = %expected,
        actual = %actual,
    );
}

pub fn emit_snapshot_published(version: u64, digest: &str, sessions: usize) {
    info!(
        event = "snapshot.published",
        version = version,
        digest = %digest,
        sessions = sessions,
    );
}

pub fn emit_cache_lookup(hit: bool, entries: usize) {
    debug!(event = "cache.lookup", hit = hit, entries = entries);
}
