//! Request shapes consumed by the query engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::experiment::{HParamValue, MetricName};
use crate::domain::session::SessionStatus;

/// A column is either a metric or a hyperparameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Metric(MetricName),
    Hparam(String),
}

impl Column {
    pub fn metric(tag: impl Into<String>) -> Self {
        Column::Metric(MetricName::tag(tag))
    }

    pub fn hparam(name: impl Into<String>) -> Self {
        Column::Hparam(name.into())
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Column::Metric(name) => write!(f, "metric:{name}"),
            Column::Hparam(name) => write!(f, "hparam:{name}"),
        }
    }
}

/// Sort direction for a column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    #[default]
    Unspecified,
    Ascending,
    Descending,
}

/// Where missing values sort, regardless of direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissingValuesOrder {
    First,
    #[default]
    Last,
}

/// Per-column filter predicate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// Unanchored regular expression over STRING values.
    Regexp { pattern: String },
    /// Closed interval `[min_value, max_value]` over FLOAT64 values.
    Interval { min_value: f64, max_value: f64 },
    /// Explicit allow-set; any type.
    Discrete { values: Vec<HParamValue> },
}

/// Display, sort and filter parameters of one column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnSpec {
    pub column: Column,

    #[serde(default)]
    pub order: SortOrder,

    #[serde(default)]
    pub missing_values: MissingValuesOrder,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,

    /// Drop groups whose value for this column is missing.
    #[serde(default)]
    pub exclude_missing_values: bool,
}

impl ColumnSpec {
    pub fn new(column: Column) -> Self {
        Self {
            column,
            order: SortOrder::Unspecified,
            missing_values: MissingValuesOrder::Last,
            filter: None,
            exclude_missing_values: false,
        }
    }

    pub fn ascending(mut self) -> Self {
        self.order = SortOrder::Ascending;
        self
    }

    pub fn descending(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    pub fn missing_first(mut self) -> Self {
        self.missing_values = MissingValuesOrder::First;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn exclude_missing(mut self) -> Self {
        self.exclude_missing_values = true;
        self
    }
}

/// How a group's metric values are derived from its member sessions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregationType {
    #[default]
    Avg,
    Min,
    Max,
    Median,
}

impl AggregationType {
    /// Whether this mode picks a representative session.
    pub fn needs_metric(self) -> bool {
        !matches!(self, AggregationType::Avg)
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregationType::Avg => "AVG",
            AggregationType::Min => "MIN",
            AggregationType::Max => "MAX",
            AggregationType::Median => "MEDIAN",
        };
        f.write_str(name)
    }
}

/// Request to list session groups.
///
/// Indices are signed so that negative values coming off the wire can be
/// rejected with a field-level error instead of failing to deserialize.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListSessionGroupsRequest {
    #[serde(default)]
    pub col_params: Vec<ColumnSpec>,

    #[serde(default)]
    pub aggregation_type: AggregationType,

    /// Required for MIN, MAX and MEDIAN; ignored for AVG.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_metric: Option<MetricName>,

    /// Session statuses admitted before grouping; empty admits all.
    #[serde(default)]
    pub allowed_statuses: Vec<SessionStatus>,

    #[serde(default)]
    pub start_index: i64,

    pub slice_size: i64,
}

impl ListSessionGroupsRequest {
    pub fn new(slice_size: i64) -> Self {
        Self {
            col_params: Vec::new(),
            aggregation_type: AggregationType::Avg,
            aggregation_metric: None,
            allowed_statuses: Vec::new(),
            start_index: 0,
            slice_size,
        }
    }

    pub fn with_column(mut self, spec: ColumnSpec) -> Self {
        self.col_params.push(spec);
        self
    }

    pub fn with_aggregation(mut self, aggregation: AggregationType, metric: Option<MetricName>) -> Self {
        self.aggregation_type = aggregation;
        self.aggregation_metric = metric;
        self
    }

    pub fn with_statuses(mut self, statuses: Vec<SessionStatus>) -> Self {
        self.allowed_statuses = statuses;
        self
    }

    pub fn starting_at(mut self, start_index: i64) -> Self {
        self.start_index = start_index;
        self
    }
}

/// Request for the full time series of one metric in one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListMetricEvalsRequest {
    pub session_name: String,
    pub metric_name: MetricName,
}
