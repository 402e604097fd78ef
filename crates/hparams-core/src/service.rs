//! Async seam between the ingestion side and the synchronous engine.
//!
//! Ingestion publishes whole snapshots through a [`SessionSource`]; queries
//! never observe a snapshot being mutated. [`SnapshotStore`] is the
//! in-memory swap-on-write source. [`SessionGroupService`] fetches the
//! current snapshot and runs the CPU-bound pipeline on the blocking pool.

use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use crate::domain::error::{HParamsError, Result};
use crate::domain::experiment::ExperimentInfo;
use crate::domain::session::{MetricEval, Session};
use crate::domain::snapshot::Snapshot;
use crate::metrics::METRICS;
use crate::obs::emit_snapshot_published;
use crate::query::cancel::CancellationToken;
use crate::query::engine::QueryEngine;
use crate::query::metric_evals::list_metric_evals;
use crate::query::request::{ListMetricEvalsRequest, ListSessionGroupsRequest};
use crate::query::response::ListSessionGroupsResponse;

/// Provides the snapshot a query should run against.
///
/// Implement this to plug in a real ingestion pipeline, a file watcher, or
/// a test stub.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn snapshot(&self) -> Result<Arc<Snapshot>>;
}

/// In-memory snapshot holder with atomic swap on publish.
///
/// Versions are assigned under the write lock, so the installed snapshot
/// always carries the highest version handed out.
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new(initial: Snapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Build and publish a new snapshot, replacing the current one.
    ///
    /// The digest is computed before the lock is taken. In-flight queries
    /// keep the snapshot they started with.
    pub fn publish(&self, experiment: ExperimentInfo, sessions: Vec<Session>) -> Result<Arc<Snapshot>> {
        let snapshot = Snapshot::new(experiment, sessions)?;
        Ok(self.install(snapshot))
    }

    /// Install an already built snapshot as the next version.
    pub fn install(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let snapshot = Arc::new(snapshot.with_version(current.version() + 1));
        *current = Arc::clone(&snapshot);
        drop(current);

        METRICS.inc_snapshots_published();
        emit_snapshot_published(
            snapshot.version(),
            snapshot.short_digest(),
            snapshot.sessions().len(),
        );
        snapshot
    }

    pub fn current(&self) -> Arc<Snapshot> {
        let current = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&current)
    }
}

#[async_trait]
impl SessionSource for SnapshotStore {
    async fn snapshot(&self) -> Result<Arc<Snapshot>> {
        Ok(self.current())
    }
}

/// Runs queries against whatever snapshot the source currently serves.
///
/// When the source's digest changes, cache entries for older snapshots are
/// dropped.
pub struct SessionGroupService {
    source: Arc<dyn SessionSource>,
    engine: Arc<QueryEngine>,
    last_digest: Mutex<Option<String>>,
}

impl SessionGroupService {
    pub fn new(source: Arc<dyn SessionSource>, engine: Arc<QueryEngine>) -> Self {
        Self {
            source,
            engine,
            last_digest: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &Arc<QueryEngine> {
        &self.engine
    }

    pub async fn list_session_groups(
        &self,
        request: ListSessionGroupsRequest,
        cancel: CancellationToken,
    ) -> Result<ListSessionGroupsResponse> {
        let snapshot = self.current_snapshot().await?;
        let engine = Arc::clone(&self.engine);
        let response = tokio::task::spawn_blocking(move || {
            engine.list_session_groups(&snapshot, &request, &cancel)
        })
        .await
        .map_err(|e| HParamsError::TaskFailed(e.to_string()))??;
        Ok(response)
    }

    pub async fn list_metric_evals(&self, request: &ListMetricEvalsRequest) -> Result<Vec<MetricEval>> {
        let snapshot = self.current_snapshot().await?;
        list_metric_evals(&snapshot, request)
    }

    async fn current_snapshot(&self) -> Result<Arc<Snapshot>> {
        let snapshot = self.source.snapshot().await?;
        let mut last = self
            .last_digest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if last.as_deref() != Some(snapshot.digest()) {
            let dropped = self.engine.invalidate_stale(snapshot.digest());
            if dropped > 0 {
                tracing::debug!(event = "cache.invalidated", dropped = dropped);
            }
            *last = Some(snapshot.digest().to_string());
        }
        Ok(snapshot)
    }
}
