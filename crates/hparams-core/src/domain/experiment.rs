//! Experiment description: hyperparameter and metric declarations.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Declared data type of a hyperparameter column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    String,
    Bool,
    Float64,
}

impl DataType {
    /// Type of a concrete hyperparameter value.
    pub fn of(value: &HParamValue) -> Self {
        match value {
            HParamValue::Bool(_) => DataType::Bool,
            HParamValue::Number(_) => DataType::Float64,
            HParamValue::String(_) => DataType::String,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::String => "STRING",
            DataType::Bool => "BOOL",
            DataType::Float64 => "FLOAT64",
        };
        f.write_str(name)
    }
}

/// A scalar hyperparameter value.
///
/// Serialized untagged so that JSON `true`, `0.1` and `"adam"` map onto the
/// natural variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum HParamValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl HParamValue {
    pub fn data_type(&self) -> DataType {
        DataType::of(self)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Total order over values: BOOL < FLOAT64 < STRING across types,
    /// `false < true`, IEEE total order for numbers, lexicographic for strings.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (HParamValue::Bool(a), HParamValue::Bool(b)) => a.cmp(b),
            (HParamValue::Number(a), HParamValue::Number(b)) => a.total_cmp(b),
            (HParamValue::String(a), HParamValue::String(b)) => a.cmp(b),
            _ => type_rank(self).cmp(&type_rank(other)),
        }
    }
}

fn type_rank(value: &HParamValue) -> u8 {
    match value {
        HParamValue::Bool(_) => 0,
        HParamValue::Number(_) => 1,
        HParamValue::String(_) => 2,
    }
}

impl fmt::Display for HParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HParamValue::Bool(b) => write!(f, "{b}"),
            HParamValue::Number(n) => write!(f, "{n}"),
            HParamValue::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for HParamValue {
    fn from(value: f64) -> Self {
        HParamValue::Number(value)
    }
}

impl From<bool> for HParamValue {
    fn from(value: bool) -> Self {
        HParamValue::Bool(value)
    }
}

impl From<&str> for HParamValue {
    fn from(value: &str) -> Self {
        HParamValue::String(value.to_string())
    }
}

impl From<String> for HParamValue {
    fn from(value: String) -> Self {
        HParamValue::String(value)
    }
}

/// Set of admissible values for a hyperparameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Domain {
    /// Explicit set of allowed values.
    Discrete { values: Vec<HParamValue> },
    /// Closed real interval; only valid for FLOAT64 hyperparameters.
    Interval { min_value: f64, max_value: f64 },
}

/// Declaration of a single hyperparameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HParamInfo {
    /// Identifier used as the key in `Session::hparams`.
    pub name: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "type")]
    pub data_type: DataType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
}

impl HParamInfo {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            display_name: String::new(),
            description: String::new(),
            data_type,
            domain: None,
        }
    }

    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }
}

/// Composite metric key. Equality is structural over both components.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricName {
    /// Usually the run-relative directory the metric was logged from.
    #[serde(default)]
    pub group: String,
    pub tag: String,
}

impl MetricName {
    pub fn new(group: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            tag: tag.into(),
        }
    }

    /// A metric logged at the session root.
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::new("", tag)
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.tag)
        } else {
            write!(f, "{}/{}", self.group, self.tag)
        }
    }
}

/// Which dataset a metric was evaluated on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetType {
    #[default]
    Unknown,
    Training,
    Validation,
}

/// Declaration of a single metric.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricInfo {
    pub name: MetricName,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub dataset_type: DatasetType,
}

impl MetricInfo {
    pub fn new(name: MetricName) -> Self {
        Self {
            name,
            display_name: String::new(),
            description: String::new(),
            dataset_type: DatasetType::Unknown,
        }
    }
}

/// Description of a hyperparameter tuning experiment.
///
/// Immutable once handed to a query: the declaration order of
/// `hparam_infos` fixes the component order of canonical grouping keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ExperimentInfo {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub user: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_created: Option<DateTime<Utc>>,

    #[serde(default)]
    pub hparam_infos: Vec<HParamInfo>,

    #[serde(default)]
    pub metric_infos: Vec<MetricInfo>,
}

impl ExperimentInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_hparam(mut self, info: HParamInfo) -> Self {
        self.hparam_infos.push(info);
        self
    }

    pub fn with_metric(mut self, info: MetricInfo) -> Self {
        self.metric_infos.push(info);
        self
    }

    pub fn hparam_info(&self, name: &str) -> Option<&HParamInfo> {
        self.hparam_infos.iter().find(|h| h.name == name)
    }

    pub fn metric_info(&self, name: &MetricName) -> Option<&MetricInfo> {
        self.metric_infos.iter().find(|m| &m.name == name)
    }
}
