//! Raw metric time series for a single session.

use crate::domain::error::{HParamsError, Result};
use crate::domain::session::MetricEval;
use crate::domain::snapshot::Snapshot;
use crate::query::request::ListMetricEvalsRequest;

/// Every evaluation of one metric in one session, ordered by training step.
///
/// Grouping and aggregation play no part here. A metric the session never
/// reported yields an empty series.
pub fn list_metric_evals(
    snapshot: &Snapshot,
    request: &ListMetricEvalsRequest,
) -> Result<Vec<MetricEval>> {
    let session = snapshot
        .session(&request.session_name)
        .ok_or_else(|| HParamsError::SessionNotFound(request.session_name.clone()))?;
    Ok(session.metric_series(&request.metric_name))
}
