//! Per-group metric aggregation.
//!
//! AVG synthesizes each metric as the mean of every member session's latest
//! value. MIN, MAX and MEDIAN instead pick a representative session by its
//! latest value of the aggregation metric and report that session's latest
//! values for every metric.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::experiment::MetricName;
use crate::domain::session::Session;
use crate::query::grouper::SessionBucket;
use crate::query::request::AggregationType;
use crate::query::response::{MetricValue, SessionGroup};

/// Aggregation mode plus the metric that ranks representatives.
///
/// The metric is always `None` for AVG so that equivalent requests share a
/// cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregationSpec {
    pub aggregation_type: AggregationType,
    pub metric: Option<MetricName>,
}

impl AggregationSpec {
    pub fn new(aggregation_type: AggregationType, metric: Option<MetricName>) -> Self {
        let metric = if aggregation_type.needs_metric() {
            metric
        } else {
            None
        };
        Self {
            aggregation_type,
            metric,
        }
    }

    pub fn avg() -> Self {
        Self::new(AggregationType::Avg, None)
    }
}

/// Turn a bucket of sessions into a session group.
pub fn aggregate(bucket: SessionBucket, spec: &AggregationSpec) -> SessionGroup {
    let mut sessions = bucket.sessions;
    sessions.sort_by(|a, b| a.name.cmp(&b.name));
    let name = sessions.first().map(|s| s.name.clone()).unwrap_or_default();

    let (metric_values, representative_session) = match (spec.aggregation_type, &spec.metric) {
        (AggregationType::Avg, _) | (_, None) => (average_latest(&sessions), None),
        (mode, Some(metric)) => match pick_representative(&sessions, mode, metric) {
            Some(rep) => (latest_values(rep), Some(rep.name.clone())),
            None => (Vec::new(), None),
        },
    };

    SessionGroup {
        name,
        hparams: bucket.hparams,
        metric_values,
        representative_session,
        sessions,
    }
}

struct Accumulator {
    sum: f64,
    count: usize,
    training_step: i64,
    wall_time: DateTime<Utc>,
}

/// Mean of each session's latest value, per metric. Reported step and wall
/// time are the maxima over the contributing observations.
fn average_latest(sessions: &[Arc<Session>]) -> Vec<MetricValue> {
    let mut acc: BTreeMap<MetricName, Accumulator> = BTreeMap::new();
    for session in sessions {
        for (name, obs) in session.latest_observations() {
            acc.entry(name.clone())
                .and_modify(|a| {
                    a.sum += obs.value;
                    a.count += 1;
                    a.training_step = a.training_step.max(obs.training_step);
                    a.wall_time = a.wall_time.max(obs.wall_time);
                })
                .or_insert(Accumulator {
                    sum: obs.value,
                    count: 1,
                    training_step: obs.training_step,
                    wall_time: obs.wall_time,
                });
        }
    }

    acc.into_iter()
        .map(|(name, a)| MetricValue {
            name,
            value: a.sum / a.count as f64,
            training_step: a.training_step,
            wall_time: a.wall_time,
        })
        .collect()
}

/// Rank sessions reporting `metric` by (latest value, name) and pick one.
///
/// Sessions without the metric are excluded first; `None` when all are.
/// MEDIAN takes the lower of the two central ranks for even counts.
///
/// Values use IEEE total order: a positive NaN ranks above +inf, so MAX
/// picks a NaN-reporting session over every finite one and MIN never does.
fn pick_representative<'s>(
    sessions: &'s [Arc<Session>],
    mode: AggregationType,
    metric: &MetricName,
) -> Option<&'s Session> {
    let mut ranked: Vec<(f64, &Session)> = sessions
        .iter()
        .filter_map(|s| s.latest_observation(metric).map(|obs| (obs.value, s.as_ref())))
        .collect();
    if ranked.is_empty() {
        return None;
    }
    ranked.sort_by(|(va, sa), (vb, sb)| va.total_cmp(vb).then_with(|| sa.name.cmp(&sb.name)));

    let idx = match mode {
        AggregationType::Min => 0,
        AggregationType::Max => ranked.len() - 1,
        AggregationType::Median => (ranked.len() - 1) / 2,
        AggregationType::Avg => return None,
    };
    Some(ranked[idx].1)
}

fn latest_values(session: &Session) -> Vec<MetricValue> {
    let mut values: Vec<MetricValue> = session
        .latest_observations()
        .into_values()
        .map(|obs| MetricValue {
            name: obs.name.clone(),
            value: obs.value,
            training_step: obs.training_step,
            wall_time: obs.wall_time,
        })
        .collect();
    values.sort_by(|a, b| a.name.cmp(&b.name));
    values
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

    fn loss() -> MetricName {
        MetricName::tag("loss")
    }

    fn bucket(sessions: Vec<Session>) -> SessionBucket {
        SessionBucket {
            hparams: BTreeMap::new(),
            sessions: sessions.into_iter().map(Arc::new).collect(),
        }
    }

    fn ranked_sessions() -> Vec<Session> {
        vec![
            Session::new("d", at(0)).record(acc(), 40.0, 1, at(1)).record(loss(), 4.0, 1, at(1)),
            Session::new("b", at(0)).record(acc(), 20.0, 1, at(1)).record(loss(), 2.0, 1, at(1)),
            Session::new("a", at(0)).record(acc(), 10.0, 1, at(1)).record(loss(), 1.0, 1, at(1)),
            Session::new("c", at(0)).record(acc(), 30.0, 1, at(1)).record(loss(), 3.0, 1, at(1)),
        ]
    }

    #[test]
    fn test_avg_uses_latest_per_session() {
        let group = aggregate(
            bucket(vec![
                Session::new("s1", at(0))
                    .record(acc(), 0.1, 1, at(1))
                    .record(acc(), 0.9, 5, at(5)),
                Session::new("s2", at(0)).record(acc(), 0.8, 3, at(9)),
            ]),
            &AggregationSpec::avg(),
        );
        let mv = group.metric_value(&acc()).expect("accuracy");
        assert!((mv.value - 0.85).abs() < 1e-12);
        assert_eq!(mv.training_step, 5);
        assert_eq!(mv.wall_time, at(9));
        assert_eq!(group.name, "s1");
        assert!(group.representative_session.is_none());
    }

    #[test]
    fn test_avg_skips_sessions_without_metric() {
        let group = aggregate(
            bucket(vec![
                Session::new("s1", at(0)).record(acc(), 0.6, 1, at(1)),
                Session::new("s2", at(0)),
            ]),
            &AggregationSpec::avg(),
        );
        assert_eq!(group.metric_value(&acc()).expect("accuracy").value, 0.6);
        assert!(group.metric_value(&loss()).is_none());
    }

    #[test]
    fn test_median_even_count_picks_lower_central() {
        let spec = AggregationSpec::new(AggregationType::Median, Some(acc()));
        let group = aggregate(bucket(ranked_sessions()), &spec);
        assert_eq!(group.representative_session.as_deref(), Some("b"));
        assert_eq!(group.metric_value(&acc()).expect("acc").value, 20.0);
        assert_eq!(group.metric_value(&loss()).expect("loss").value, 2.0);
    }

    #[test]
    fn test_min_and_max_pick_extremes() {
        let min = aggregate(
            bucket(ranked_sessions()),
            &AggregationSpec::new(AggregationType::Min, Some(acc())),
        );
        let max = aggregate(
            bucket(ranked_sessions()),
            &AggregationSpec::new(AggregationType::Max, Some(acc())),
        );
        assert_eq!(min.representative_session.as_deref(), Some("a"));
        assert_eq!(max.representative_session.as_deref(), Some("d"));
        assert_eq!(max.metric_value(&loss()).expect("loss").value, 4.0);
    }

    #[test]
    fn test_sessions_without_aggregation_metric_are_excluded() {
        let spec = AggregationSpec::new(AggregationType::Min, Some(acc()));
        let group = aggregate(
            bucket(vec![
                Session::new("a", at(0)).record(loss(), 0.1, 1, at(1)),
                Session::new("b", at(0)).record(acc(), 0.7, 1, at(1)),
            ]),
            &spec,
        );
        assert_eq!(group.representative_session.as_deref(), Some("b"));
    }

    #[test]
    fn test_no_representative_when_metric_absent_everywhere() {
        let spec = AggregationSpec::new(AggregationType::Max, Some(acc()));
        let group = aggregate(
            bucket(vec![Session::new("a", at(0)).record(loss(), 0.1, 1, at(1))]),
            &spec,
        );
        assert!(group.representative_session.is_none());
        assert!(group.metric_values.is_empty());
    }

    #[test]
    fn test_avg_spec_drops_metric() {
        let spec = AggregationSpec::new(AggregationType::Avg, Some(acc()));
        assert_eq!(spec, AggregationSpec::avg());
    }

    #[test]
    fn test_equal_values_tie_break_by_name() {
        let spec = AggregationSpec::new(AggregationType::Min, Some(acc()));
        let group = aggregate(
            bucket(vec![
                Session::new("z", at(0)).record(acc(), 0.5, 1, at(1)),
                Session::new("m", at(0)).record(acc(), 0.5, 1, at(1)),
            ]),
            &spec,
        );
        assert_eq!(group.representative_session.as_deref(), Some("m"));
    }

    #[test]
    fn test_nan_ranks_above_every_finite_value() {
        let sessions = || {
            bucket(vec![
                Session::new("diverged", at(0)).record(acc(), f64::NAN, 1, at(1)),
                Session::new("best", at(0)).record(acc(), 0.99, 1, at(1)),
                Session::new("worst", at(0)).record(acc(), 0.1, 1, at(1)),
            ])
        };
        let max = aggregate(sessions(), &AggregationSpec::new(AggregationType::Max, Some(acc())));
        let min = aggregate(sessions(), &AggregationSpec::new(AggregationType::Min, Some(acc())));
        let median =
            aggregate(sessions(), &AggregationSpec::new(AggregationType::Median, Some(acc())));

        assert_eq!(max.representative_session.as_deref(), Some("diverged"));
        assert!(max.metric_value(&acc()).expect("acc").value.is_nan());
        assert_eq!(min.representative_session.as_deref(), Some("worst"));
        assert_eq!(median.representative_session.as_deref(), Some("best"));
    }
}
