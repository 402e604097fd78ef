//! Session groups and the list response.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::experiment::{HParamValue, MetricName};
use crate::domain::session::Session;

/// Aggregated current value of one metric for a group.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricValue {
    pub name: MetricName,
    pub value: f64,
    pub training_step: i64,
    pub wall_time: DateTime<Utc>,
}

/// Sessions sharing an identical hyperparameter assignment.
///
/// Derived per query and discarded with the response; `name` is not a
/// persistent identifier across snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct SessionGroup {
    /// Smallest member session name.
    pub name: String,

    /// Hyperparameters set on the group's sessions.
    pub hparams: BTreeMap<String, HParamValue>,

    /// One entry per metric with a value, sorted by metric name.
    pub metric_values: Vec<MetricValue>,

    /// Session whose values stand in for the group under MIN/MAX/MEDIAN.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub representative_session: Option<String>,

    /// Member sessions sorted by name, shared with the snapshot.
    pub sessions: Vec<Arc<Session>>,
}

impl SessionGroup {
    pub fn metric_value(&self, name: &MetricName) -> Option<&MetricValue> {
        self.metric_values
            .binary_search_by(|mv| mv.name.cmp(name))
            .ok()
            .map(|idx| &self.metric_values[idx])
    }

    pub fn session_names(&self) -> Vec<&str> {
        self.sessions.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Response to a list-session-groups request.
#[derive(Debug, Clone, Serialize)]
pub struct ListSessionGroupsResponse {
    /// The requested window of filtered, sorted groups.
    pub session_groups: Vec<SessionGroup>,

    /// Number of groups that passed filtering, before slicing.
    pub total_size: usize,
}

impl ListSessionGroupsResponse {
    pub fn group_names(&self) -> Vec<&str> {
        self.session_groups.iter().map(|g| g.name.as_str()).collect()
    }
}
