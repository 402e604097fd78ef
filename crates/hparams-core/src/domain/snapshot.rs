//! Immutable dataset snapshots handed to query invocations.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::digest::compute_digest;
use crate::domain::error::{HParamsError, Result};
use crate::domain::experiment::{Domain, ExperimentInfo, HParamValue};
use crate::domain::session::Session;

/// A read-only view of one experiment's sessions.
///
/// Sessions are shared (`Arc`) so session groups can reference them without
/// copying. The content digest is computed once at construction and keys
/// the aggregation cache.
#[derive(Debug, Clone)]
pub struct Snapshot {
    version: u64,
    digest: String,
    experiment: ExperimentInfo,
    sessions: Vec<Arc<Session>>,
}

#[derive(Serialize)]
struct DigestInput<'a> {
    experiment: &'a ExperimentInfo,
    sessions: &'a [Arc<Session>],
    lossy_floats: Vec<LossyFloat>,
}

/// A float whose JSON form loses information: JSON has no NaN or
/// infinities (serde writes `null`) and canonical numbers drop the sign of
/// zero. The raw bits are hashed alongside the JSON at the value's path.
#[derive(Serialize)]
struct LossyFloat {
    path: String,
    bits: String,
}

fn lossy_float(path: impl FnOnce() -> String, value: f64, out: &mut Vec<LossyFloat>) {
    if !value.is_finite() || (value == 0.0 && value.is_sign_negative()) {
        out.push(LossyFloat {
            path: path(),
            bits: format!("{:016x}", value.to_bits()),
        });
    }
}

fn lossy_hparam(path: impl FnOnce() -> String, value: &HParamValue, out: &mut Vec<LossyFloat>) {
    if let HParamValue::Number(n) = value {
        lossy_float(path, *n, out);
    }
}

fn lossy_floats(experiment: &ExperimentInfo, sessions: &[Arc<Session>]) -> Vec<LossyFloat> {
    let mut out = Vec::new();
    for (i, info) in experiment.hparam_infos.iter().enumerate() {
        match &info.domain {
            Some(Domain::Interval {
                min_value,
                max_value,
            }) => {
                let at = |field: &str| format!("experiment.hparam_infos[{i}].{field}");
                lossy_float(|| at("min_value"), *min_value, &mut out);
                lossy_float(|| at("max_value"), *max_value, &mut out);
            }
            Some(Domain::Discrete { values }) => {
                for (j, value) in values.iter().enumerate() {
                    let path = || format!("experiment.hparam_infos[{i}].values[{j}]");
                    lossy_hparam(path, value, &mut out);
                }
            }
            None => {}
        }
    }
    for (i, session) in sessions.iter().enumerate() {
        for (name, value) in &session.hparams {
            lossy_hparam(|| format!("sessions[{i}].hparams.{name}"), value, &mut out);
        }
        for (j, metric) in session.metrics.iter().enumerate() {
            let path = || format!("sessions[{i}].metrics[{j}].value");
            lossy_float(path, metric.value, &mut out);
        }
    }
    out
}

impl Snapshot {
    /// Build a snapshot. Session names must be unique.
    pub fn new(experiment: ExperimentInfo, sessions: Vec<Session>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(sessions.len());
        for session in &sessions {
            if !seen.insert(session.name.as_str()) {
                return Err(HParamsError::DuplicateSession(session.name.clone()));
            }
        }

        let sessions: Vec<Arc<Session>> = sessions.into_iter().map(Arc::new).collect();
        let digest = compute_digest(&serde_json::to_value(DigestInput {
            experiment: &experiment,
            sessions: &sessions,
            lossy_floats: lossy_floats(&experiment, &sessions),
        })?)?;

        Ok(Self {
            version: 0,
            digest,
            experiment,
            sessions,
        })
    }

    /// Tag the snapshot with a publication version.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// SHA-256 hex digest of the snapshot content.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// First 12 hex chars of the digest.
    pub fn short_digest(&self) -> &str {
        &self.digest[..12.min(self.digest.len())]
    }

    pub fn experiment(&self) -> &ExperimentInfo {
        &self.experiment
    }

    pub fn sessions(&self) -> &[Arc<Session>] {
        &self.sessions
    }

    pub fn session(&self, name: &str) -> Option<&Arc<Session>> {
        self.sessions.iter().find(|s| s.name == name)
    }
}
