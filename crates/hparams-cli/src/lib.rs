//! Snapshot file loading for the `hparams` CLI.
//!
//! A snapshot file holds an optional experiment declaration and the session
//! list:
//!
//! ```json
//! { "experiment": { "name": "lr-sweep", "hparam_infos": [...] }, "sessions": [...] }
//! ```
//!
//! When `experiment` is absent it is inferred from the sessions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hparams_core::{infer_experiment_info, ExperimentInfo, Session, SessionSource, Snapshot};
use serde::{Deserialize, Serialize};

/// On-disk snapshot layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment: Option<ExperimentInfo>,
    pub sessions: Vec<Session>,
}

impl SnapshotFile {
    /// Experiment declaration, inferred when the file carries none.
    ///
    /// `fallback_name` names an inferred experiment.
    pub fn experiment_info(&self, fallback_name: &str) -> ExperimentInfo {
        match &self.experiment {
            Some(experiment) => experiment.clone(),
            None => infer_experiment_info(fallback_name, &self.sessions),
        }
    }

    pub fn into_snapshot(self, fallback_name: &str) -> hparams_core::Result<Snapshot> {
        let experiment = self.experiment_info(fallback_name);
        Snapshot::new(experiment, self.sessions)
    }
}

/// Read and parse a JSON file.
pub fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))
}

/// Load a snapshot file, inferring the experiment from the file stem if
/// needed.
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let file: SnapshotFile = read_json_file(path)?;
    file.into_snapshot(&experiment_name(path))
        .with_context(|| format!("Invalid snapshot in {:?}", path))
}

/// Experiment name used when a snapshot file declares none: the file stem.
pub fn experiment_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Session source re-reading a snapshot file on every request.
pub struct FileSessionSource {
    path: PathBuf,
}

impl FileSessionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionSource for FileSessionSource {
    async fn snapshot(&self) -> hparams_core::Result<Arc<Snapshot>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let file: SnapshotFile = serde_json::from_str(&content)?;
        tracing::debug!(
            event = "snapshot.loaded",
            path = %self.path.display(),
            sessions = file.sessions.len(),
        );
        Ok(Arc::new(file.into_snapshot(&experiment_name(&self.path))?))
    }
}
