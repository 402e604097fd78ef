//! The session-group query pipeline.
//!
//! ```text
//! validate ─► group ─► aggregate ─► resolve ─► filter ─► sort ─► paginate
//!             └──── cached per (snapshot, aggregation, statuses) ────┘
//! ```
//!
//! Every stage is a pure function of the snapshot and the validated request.
//! The cancellation token is checked before each stage; a cancelled query
//! returns an error, never a partial page.

use std::sync::Arc;
use std::time::Instant;

use crate::cache::{AggregationCache, CacheKey, CachedGroups};
use crate::config::EngineConfig;
use crate::domain::snapshot::Snapshot;
use crate::metrics::METRICS;
use crate::obs::{
    emit_query_cancelled, emit_query_finished, emit_query_rejected, emit_query_started,
    emit_stage_completed, QuerySpan,
};
use crate::query::aggregator::aggregate;
use crate::query::cancel::CancellationToken;
use crate::query::error::{QueryError, QueryResult};
use crate::query::filter::filter_rows;
use crate::query::grouper::group_sessions;
use crate::query::paginate::paginate;
use crate::query::request::ListSessionGroupsRequest;
use crate::query::resolver::{resolve_rows, ColumnCatalog};
use crate::query::response::{ListSessionGroupsResponse, SessionGroup};
use crate::query::sort::sort_rows;
use crate::query::validate::{validate, ValidatedQuery};

/// Runs list-session-groups queries against snapshots.
///
/// Holds no per-query state. The only thing shared between queries is the
/// aggregation cache, whose entries are immutable.
#[derive(Debug)]
pub struct QueryEngine {
    config: EngineConfig,
    cache: Option<Arc<AggregationCache>>,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl QueryEngine {
    /// Engine with its own cache sized by `config.cache_capacity`.
    pub fn new(config: EngineConfig) -> Self {
        let cache = (config.cache_capacity > 0)
            .then(|| Arc::new(AggregationCache::new(config.cache_capacity)));
        Self { config, cache }
    }

    /// Engine sharing an existing cache.
    pub fn with_cache(config: EngineConfig, cache: Arc<AggregationCache>) -> Self {
        Self {
            config,
            cache: Some(cache),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&Arc<AggregationCache>> {
        self.cache.as_ref()
    }

    /// Drop cached aggregations of every snapshot but `current_digest`.
    pub fn invalidate_stale(&self, current_digest: &str) -> usize {
        self.cache
            .as_ref()
            .map_or(0, |cache| cache.invalidate_except(current_digest))
    }

    /// List the session groups of `snapshot` matching `request`.
    pub fn list_session_groups(
        &self,
        snapshot: &Snapshot,
        request: &ListSessionGroupsRequest,
        cancel: &CancellationToken,
    ) -> QueryResult<ListSessionGroupsResponse> {
        let started = Instant::now();
        let _span = QuerySpan::enter(snapshot.version(), snapshot.short_digest());

        let cancel = match (cancel.deadline(), self.config.default_deadline) {
            (None, Some(timeout)) => cancel.clone().with_deadline(started + timeout),
            _ => cancel.clone(),
        };

        let catalog = ColumnCatalog::build(snapshot.experiment(), snapshot.sessions());
        let query = validate(request, &catalog, &self.config).map_err(|err| {
            METRICS.inc_queries_rejected();
            emit_query_rejected(err.field(), &err);
            err
        })?;

        emit_query_started(
            snapshot.sessions().len(),
            query.columns.len(),
            &query.aggregation.aggregation_type.to_string(),
        );

        match self.execute(snapshot, &catalog, &query, &cancel) {
            Ok((response, cache_hit)) => {
                METRICS.inc_queries_executed();
                emit_query_finished(
                    started.elapsed().as_millis() as u64,
                    response.total_size,
                    response.session_groups.len(),
                    cache_hit,
                );
                Ok(response)
            }
            Err(err) => {
                match &err {
                    QueryError::Cancelled { stage } => {
                        METRICS.inc_queries_cancelled();
                        emit_query_cancelled(stage, false);
                    }
                    QueryError::DeadlineExceeded { stage } => {
                        METRICS.inc_queries_cancelled();
                        emit_query_cancelled(stage, true);
                    }
                    _ => {}
                }
                Err(err)
            }
        }
    }

    fn execute(
        &self,
        snapshot: &Snapshot,
        catalog: &ColumnCatalog,
        query: &ValidatedQuery,
        cancel: &CancellationToken,
    ) -> QueryResult<(ListSessionGroupsResponse, bool)> {
        cancel.check("group")?;
        let (groups, cache_hit) = self.aggregated_groups(snapshot, catalog, query, cancel)?;

        cancel.check("resolve")?;
        let columns = query.column_refs();
        let rows = resolve_rows(&columns, &groups);
        emit_stage_completed("resolve", rows.len());

        cancel.check("filter")?;
        let mut rows = filter_rows(rows, &query.columns);
        emit_stage_completed("filter", rows.len());

        cancel.check("sort")?;
        sort_rows(&mut rows, &query.columns);
        emit_stage_completed("sort", rows.len());

        cancel.check("paginate")?;
        let page = paginate(rows, query.start_index, query.slice_size);
        emit_stage_completed("paginate", page.items.len());

        let session_groups = page.items.into_iter().map(|row| row.group.clone()).collect();
        Ok((
            ListSessionGroupsResponse {
                session_groups,
                total_size: page.total_size,
            },
            cache_hit,
        ))
    }

    /// Grouper and Aggregator output, served from the cache when possible.
    fn aggregated_groups(
        &self,
        snapshot: &Snapshot,
        catalog: &ColumnCatalog,
        query: &ValidatedQuery,
        cancel: &CancellationToken,
    ) -> QueryResult<(CachedGroups, bool)> {
        let Some(cache) = &self.cache else {
            let groups = group_and_aggregate(snapshot, catalog, query, cancel)?;
            return Ok((Arc::new(groups), false));
        };

        let key = CacheKey::new(
            snapshot.digest(),
            query.aggregation.clone(),
            query.allowed_statuses.clone(),
        );
        if let Some(groups) = cache.get(&key) {
            emit_stage_completed("aggregate", groups.len());
            return Ok((groups, true));
        }

        let groups = group_and_aggregate(snapshot, catalog, query, cancel)?;
        Ok((cache.insert(key, Arc::new(groups)), false))
    }
}

fn group_and_aggregate(
    snapshot: &Snapshot,
    catalog: &ColumnCatalog,
    query: &ValidatedQuery,
    cancel: &CancellationToken,
) -> QueryResult<Vec<SessionGroup>> {
    let admitted = snapshot
        .sessions()
        .iter()
        .filter(|session| query.admits_status(session.status));
    let buckets = group_sessions(admitted, catalog.hparams());
    emit_stage_completed("group", buckets.len());

    cancel.check("aggregate")?;
    let groups: Vec<SessionGroup> = buckets
        .into_iter()
        .map(|bucket| aggregate(bucket, &query.aggregation))
        .collect();
    emit_stage_completed("aggregate", groups.len());
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::{DataType, ExperimentInfo, HParamInfo, MetricInfo, MetricName};
    use crate::domain::session::{Session, SessionStatus};
    use crate::query::request::{Column, ColumnSpec};
    use chrono::{TimeZone, Utc};

    fn snapshot() -> Snapshot {
        let t = Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid timestamp");
        let acc = MetricName::tag("accuracy");
        let experiment = ExperimentInfo::new("exp")
            .with_hparam(HParamInfo::new("lr", DataType::Float64))
            .with_metric(MetricInfo::new(acc.clone()));
        let sessions = vec![
            Session::new("s1", t)
                .with_status(SessionStatus::Success)
                .with_hparam("lr", 0.1)
                .record(acc.clone(), 0.9, 1, t),
            Session::new("s2", t)
                .with_status(SessionStatus::Failure)
                .with_hparam("lr", 0.1)
                .record(acc.clone(), 0.8, 1, t),
            Session::new("s3", t)
                .with_status(SessionStatus::Success)
                .with_hparam("lr", 0.2)
                .record(acc, 0.95, 1, t),
        ];
        Snapshot::new(experiment, sessions).expect("snapshot")
    }

    fn by_accuracy() -> ListSessionGroupsRequest {
        ListSessionGroupsRequest::new(10)
            .with_column(ColumnSpec::new(Column::metric("accuracy")).descending())
    }

    #[test]
    fn test_groups_sorted_by_average() {
        let engine = QueryEngine::default();
        let response = engine
            .list_session_groups(&snapshot(), &by_accuracy(), &CancellationToken::new())
            .expect("query");
        assert_eq!(response.total_size, 2);
        assert_eq!(response.group_names(), vec!["s3", "s1"]);
    }

    #[test]
    fn test_status_filter_applies_before_grouping() {
        let engine = QueryEngine::default();
        let request = by_accuracy().with_statuses(vec![SessionStatus::Success]);
        let response = engine
            .list_session_groups(&snapshot(), &request, &CancellationToken::new())
            .expect("query");
        let lr01 = &response.session_groups[1];
        assert_eq!(lr01.session_names(), vec!["s1"]);
        let acc = lr01
            .metric_value(&MetricName::tag("accuracy"))
            .expect("accuracy");
        assert_eq!(acc.value, 0.9);
    }

    #[test]
    fn test_second_query_hits_cache() {
        let engine = QueryEngine::default();
        let snap = snapshot();
        let cancel = CancellationToken::new();
        engine
            .list_session_groups(&snap, &by_accuracy(), &cancel)
            .expect("first");
        let cache = engine.cache().expect("cache enabled");
        assert_eq!(cache.len(), 1);

        let reordered = ListSessionGroupsRequest::new(1)
            .with_column(ColumnSpec::new(Column::hparam("lr")).ascending());
        let response = engine
            .list_session_groups(&snap, &reordered, &cancel)
            .expect("second");
        assert_eq!(cache.len(), 1);
        assert_eq!(response.group_names(), vec!["s1"]);
        assert_eq!(response.total_size, 2);
    }

    #[test]
    fn test_cache_disabled_with_zero_capacity() {
        let engine = QueryEngine::new(EngineConfig::default().with_cache_capacity(0));
        assert!(engine.cache().is_none());
        let response = engine
            .list_session_groups(&snapshot(), &by_accuracy(), &CancellationToken::new())
            .expect("query");
        assert_eq!(response.total_size, 2);
        assert_eq!(engine.invalidate_stale("anything"), 0);
    }

    #[test]
    fn test_cancelled_before_first_stage() {
        let engine = QueryEngine::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = engine
            .list_session_groups(&snapshot(), &by_accuracy(), &cancel)
            .unwrap_err();
        assert!(matches!(err, QueryError::Cancelled { ref stage } if stage == "group"));
    }

    #[test]
    fn test_elapsed_deadline() {
        let engine = QueryEngine::default();
        let cancel = CancellationToken::new().with_deadline(Instant::now());
        let err = engine
            .list_session_groups(&snapshot(), &by_accuracy(), &cancel)
            .unwrap_err();
        assert!(matches!(err, QueryError::DeadlineExceeded { .. }));
    }

    #[test]
    fn test_invalid_request_rejected_before_cancel_check() {
        let engine = QueryEngine::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = engine
            .list_session_groups(
                &snapshot(),
                &ListSessionGroupsRequest::new(10).starting_at(-3),
                &cancel,
            )
            .unwrap_err();
        assert!(err.is_configuration_error());
    }
}
