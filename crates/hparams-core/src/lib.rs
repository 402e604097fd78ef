//! Hyperparameter tuning query engine.
//!
//! Groups training sessions that share a hyperparameter assignment,
//! aggregates their metrics, then filters, sorts and pages the groups for a
//! viewer polling the same experiment.

pub mod cache;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod obs;
pub mod query;
pub mod service;
pub mod telemetry;

pub use cache::{AggregationCache, CacheKey};
pub use config::EngineConfig;

pub use domain::{
    infer_experiment_info, DataType, DatasetType, Domain, ExperimentInfo, HParamInfo,
    HParamValue, HParamsError, MetricEval, MetricInfo, MetricName, MetricObservation, Result,
    Session, SessionStatus, Snapshot,
};

pub use query::{
    list_metric_evals, AggregationSpec, AggregationType, CancellationToken, Column, ColumnSpec,
    Filter, ListMetricEvalsRequest, ListSessionGroupsRequest, ListSessionGroupsResponse,
    MetricValue, MissingValuesOrder, QueryEngine, QueryError, QueryResult, SessionGroup,
    SortOrder,
};

pub use metrics::METRICS;
pub use obs::{
    emit_cache_lookup, emit_inconsistent_value, emit_query_cancelled, emit_query_finished,
    emit_query_rejected, emit_query_started, emit_snapshot_published, emit_stage_completed,
    emit_undeclared_field, QuerySpan,
};
pub use service::{SessionGroupService, SessionSource, SnapshotStore};
pub use telemetry::init_tracing;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
