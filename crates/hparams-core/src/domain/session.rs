//! Training sessions and their metric observations.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::experiment::{HParamValue, MetricName};

/// Status of a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    #[default]
    Unknown,
    Success,
    Failure,
    Running,
}

/// A single metric value reported by a session at a training step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricObservation {
    pub name: MetricName,
    pub value: f64,
    pub training_step: i64,
    pub wall_time: DateTime<Utc>,
}

/// One point of a metric time series, as returned by metric-eval lookups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricEval {
    pub training_step: i64,
    pub wall_time: DateTime<Utc>,
    pub value: f64,
}

/// One training/evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Unique within the experiment.
    pub name: String,

    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub status: SessionStatus,

    /// Hyperparameter id → assigned value.
    #[serde(default)]
    pub hparams: BTreeMap<String, HParamValue>,

    /// Observations in arrival order.
    #[serde(default)]
    pub metrics: Vec<MetricObservation>,
}

impl Session {
    pub fn new(name: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            started_at,
            ended_at: None,
            status: SessionStatus::Unknown,
            hparams: BTreeMap::new(),
            metrics: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_hparam(mut self, name: impl Into<String>, value: impl Into<HParamValue>) -> Self {
        self.hparams.insert(name.into(), value.into());
        self
    }

    /// Append an observation. Observations are kept in arrival order.
    pub fn record(
        mut self,
        name: MetricName,
        value: f64,
        training_step: i64,
        wall_time: DateTime<Utc>,
    ) -> Self {
        self.metrics.push(MetricObservation {
            name,
            value,
            training_step,
            wall_time,
        });
        self
    }

    /// Latest observation of every metric this session reported.
    ///
    /// "Latest" is the highest training step; for duplicate steps the last
    /// observation by arrival wins.
    pub fn latest_observations(&self) -> HashMap<&MetricName, &MetricObservation> {
        let mut latest: HashMap<&MetricName, &MetricObservation> = HashMap::new();
        for obs in &self.metrics {
            match latest.get(&obs.name) {
                Some(current) if obs.training_step < current.training_step => {}
                _ => {
                    latest.insert(&obs.name, obs);
                }
            }
        }
        latest
    }

    /// Latest observation of a single metric.
    pub fn latest_observation(&self, name: &MetricName) -> Option<&MetricObservation> {
        self.metrics
            .iter()
            .filter(|obs| &obs.name == name)
            .fold(None, |best: Option<&MetricObservation>, obs| match best {
                Some(current) if obs.training_step < current.training_step => Some(current),
                _ => Some(obs),
            })
    }

    /// Full time series of a metric ordered by training step, duplicate steps
    /// collapsed last-by-arrival.
    pub fn metric_series(&self, name: &MetricName) -> Vec<MetricEval> {
        let mut by_step: BTreeMap<i64, &MetricObservation> = BTreeMap::new();
        for obs in self.metrics.iter().filter(|obs| &obs.name == name) {
            by_step.insert(obs.training_step, obs);
        }
        by_step
            .into_values()
            .map(|obs| MetricEval {
                training_step: obs.training_step,
                wall_time: obs.wall_time,
                value: obs.value,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    fn acc() -> MetricName {
        MetricName::tag("accuracy")
    }

    #[test]
    fn test_latest_prefers_highest_step() {
        let session = Session::new("s1", at(0))
            .record(acc(), 0.5, 10, at(10))
            .record(acc(), 0.7, 20, at(20))
            .record(acc(), 0.6, 15, at(30));

        let latest = session.latest_observation(&acc()).expect("latest");
        assert_eq!(latest.training_step, 20);
        assert_eq!(latest.value, 0.7);
        assert_eq!(session.latest_observations()[&acc()].value, 0.7);
    }

    #[test]
    fn test_duplicate_step_last_arrival_wins() {
        let session = Session::new("s1", at(0))
            .record(acc(), 0.5, 10, at(50))
            .record(acc(), 0.9, 10, at(40));

        let latest = session.latest_observation(&acc()).expect("latest");
        assert_eq!(latest.value, 0.9);
        assert_eq!(session.latest_observations()[&acc()].value, 0.9);
    }

    #[test]
    fn test_metric_series_sorted_and_deduplicated() {
        let session = Session::new("s1", at(0))
            .record(acc(), 0.3, 3, at(3))
            .record(acc(), 0.1, 1, at(1))
            .record(acc(), 0.2, 3, at(4))
            .record(MetricName::tag("loss"), 1.0, 1, at(1));

        let series = session.metric_series(&acc());
        let steps: Vec<i64> = series.iter().map(|e| e.training_step).collect();
        assert_eq!(steps, vec![1, 3]);
        assert_eq!(series[1].value, 0.2);
    }

    #[test]
    fn test_unreported_metric_has_no_latest() {
        let session = Session::new("s1", at(0)).record(acc(), 0.3, 3, at(3));
        assert!(session.latest_observation(&MetricName::tag("loss")).is_none());
        assert!(session.metric_series(&MetricName::tag("loss")).is_empty());
    }

    #[test]
    fn test_status_serde_uppercase() {
        let json = serde_json::to_string(&SessionStatus::Success).expect("serialize");
        assert_eq!(json, r#""SUCCESS""#);
    }
}
