//! Error types for request validation and query execution.

use thiserror::Error;

use crate::domain::experiment::DataType;

/// Errors produced by the session-group query engine.
///
/// Every configuration error names the offending request field so callers
/// can point at it.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A pagination index was negative.
    #[error("{field} must be non-negative, got {value}")]
    NegativeIndex { field: String, value: i64 },

    /// The requested slice exceeds the configured maximum.
    #[error("{field} {value} exceeds the maximum of {max}")]
    SliceTooLarge { field: String, value: usize, max: usize },

    /// MIN/MAX/MEDIAN aggregation without an aggregation metric.
    #[error("{field} is required for {aggregation} aggregation")]
    MissingAggregationMetric { field: String, aggregation: String },

    /// The aggregation metric is neither declared nor observed.
    #[error("{field} references unknown metric '{metric}'")]
    UnknownAggregationMetric { field: String, metric: String },

    /// A column references an hparam or metric that is neither declared nor observed.
    #[error("{field} references unknown column '{column}'")]
    UnknownColumn { field: String, column: String },

    /// The same column appears twice in the request.
    #[error("{field} duplicates column '{column}'")]
    DuplicateColumn { field: String, column: String },

    /// The filter kind cannot apply to the column's declared type.
    #[error("{field}: {filter} filter cannot apply to {data_type} column '{column}'")]
    FilterTypeMismatch {
        field: String,
        column: String,
        filter: String,
        data_type: DataType,
    },

    /// A discrete filter value has a different type than its column.
    #[error("{field}: discrete value '{value}' is not of type {data_type}")]
    DiscreteValueTypeMismatch {
        field: String,
        value: String,
        data_type: DataType,
    },

    /// A regexp filter failed to compile.
    #[error("{field}: invalid regexp: {source}")]
    InvalidRegexp {
        field: String,
        #[source]
        source: regex::Error,
    },

    /// An interval filter with inverted or NaN bounds.
    #[error("{field}: invalid interval [{min_value}, {max_value}]")]
    InvalidInterval {
        field: String,
        min_value: f64,
        max_value: f64,
    },

    /// The caller cancelled the query.
    #[error("query cancelled before {stage}")]
    Cancelled { stage: String },

    /// The query deadline elapsed.
    #[error("query deadline exceeded before {stage}")]
    DeadlineExceeded { stage: String },
}

impl QueryError {
    /// Path of the request field that caused a configuration error.
    pub fn field(&self) -> Option<&str> {
        match self {
            QueryError::NegativeIndex { field, .. }
            | QueryError::SliceTooLarge { field, .. }
            | QueryError::MissingAggregationMetric { field, .. }
            | QueryError::UnknownAggregationMetric { field, .. }
            | QueryError::UnknownColumn { field, .. }
            | QueryError::DuplicateColumn { field, .. }
            | QueryError::FilterTypeMismatch { field, .. }
            | QueryError::DiscreteValueTypeMismatch { field, .. }
            | QueryError::InvalidRegexp { field, .. }
            | QueryError::InvalidInterval { field, .. } => Some(field),
            QueryError::Cancelled { .. } | QueryError::DeadlineExceeded { .. } => None,
        }
    }

    /// Whether this error was raised by request validation.
    pub fn is_configuration_error(&self) -> bool {
        self.field().is_some()
    }
}

/// Convenience result alias.
pub type QueryResult<T> = std::result::Result<T, QueryError>;
