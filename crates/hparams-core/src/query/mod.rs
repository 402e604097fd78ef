//! The session-group query engine.
//!
//! Stages, in pipeline order:
//! - [`grouper`]: partition sessions by canonical hyperparameter tuple
//! - [`aggregator`]: one current value per metric per group
//! - [`resolver`]: resolve requested columns to a value or the missing sentinel
//! - [`filter`]: per-column predicates, combined with AND
//! - [`sort`]: prioritized comparator chain ending in the group name
//! - [`paginate`]: the requested window plus the pre-slice total
//!
//! [`engine::QueryEngine`] composes them; [`validate`] rejects malformed
//! requests before any stage runs.

pub mod aggregator;
pub mod cancel;
pub mod engine;
pub mod error;
pub mod filter;
pub mod grouper;
pub mod metric_evals;
pub mod paginate;
pub mod request;
pub mod resolver;
pub mod response;
pub mod sort;
pub mod validate;

pub use aggregator::{aggregate, AggregationSpec};
pub use cancel::CancellationToken;
pub use engine::QueryEngine;
pub use error::{QueryError, QueryResult};
pub use filter::Predicate;
pub use grouper::{group_sessions, SessionBucket};
pub use metric_evals::list_metric_evals;
pub use paginate::{paginate, Page};
pub use request::{
    AggregationType, Column, ColumnSpec, Filter, ListMetricEvalsRequest,
    ListSessionGroupsRequest, MissingValuesOrder, SortOrder,
};
pub use resolver::{ColumnCatalog, ColumnValue, HParamColumn, Scalar};
pub use response::{ListSessionGroupsResponse, MetricValue, SessionGroup};
pub use validate::{validate, ValidatedColumn, ValidatedQuery};
