//! Experiment-info inference for snapshots ingested without a declaration.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::experiment::{
    DataType, Domain, ExperimentInfo, HParamInfo, HParamValue, MetricInfo, MetricName,
};
use crate::domain::session::Session;

/// Derive an [`ExperimentInfo`] from the sessions themselves.
///
/// Hyperparameter types come from the observed values: all-bool is BOOL,
/// all-number is FLOAT64, anything else is STRING. Each hyperparameter gets
/// a discrete domain of its distinct observed values (for STRING, the values
/// rendered as strings). Metrics are every distinct name observed.
pub fn infer_experiment_info<'a, I>(name: impl Into<String>, sessions: I) -> ExperimentInfo
where
    I: IntoIterator<Item = &'a Session>,
{
    let mut observed: BTreeMap<&str, Vec<&HParamValue>> = BTreeMap::new();
    let mut metrics: BTreeSet<&MetricName> = BTreeSet::new();

    for session in sessions {
        for (id, value) in &session.hparams {
            observed.entry(id.as_str()).or_default().push(value);
        }
        for obs in &session.metrics {
            metrics.insert(&obs.name);
        }
    }

    let hparam_infos = observed
        .into_iter()
        .map(|(id, values)| infer_hparam(id, &values))
        .collect();
    let metric_infos = metrics
        .into_iter()
        .map(|m| MetricInfo::new(m.clone()))
        .collect();

    ExperimentInfo {
        name: name.into(),
        hparam_infos,
        metric_infos,
        ..ExperimentInfo::default()
    }
}

fn infer_hparam(id: &str, values: &[&HParamValue]) -> HParamInfo {
    let data_type = if values.iter().all(|v| matches!(v, HParamValue::Bool(_))) {
        DataType::Bool
    } else if values.iter().all(|v| matches!(v, HParamValue::Number(_))) {
        DataType::Float64
    } else {
        DataType::String
    };

    let mut distinct: Vec<HParamValue> = values
        .iter()
        .map(|v| match data_type {
            DataType::String => HParamValue::String(v.to_string()),
            _ => (*v).clone(),
        })
        .collect();
    distinct.sort_by(|a, b| a.total_cmp(b));
    distinct.dedup_by(|a, b| a.total_cmp(b).is_eq());

    HParamInfo::new(id, data_type).with_domain(Domain::Discrete { values: distinct })
}
