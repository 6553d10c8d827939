//! Model endpoint handlers

use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
};
use tracing::{debug, info};

use crate::api::state::AppState;
use crate::api::types::{ApiError, RunsQueryParams, TrainResponse};
use crate::domain::retrain::{ModelMetricsEntry, RunId, RunRecord};

/// GET /model/metrics
pub async fn list_model_metrics(
    State(state): State<AppState>,
) -> Result<Json<Vec<ModelMetricsEntry>>, ApiError> {
    let entries = state.metrics_aggregator.list_models().await?;
    debug!(count = entries.len(), "Listed model metrics");

    Ok(Json(entries))
}

/// PUT /model
///
/// Queues a retrain and returns before it starts.
pub async fn trigger_retrain(
    State(state): State<AppState>,
) -> Result<Json<TrainResponse>, ApiError> {
    let run_id = state.retrain_queue.submit().await?;
    info!(run_id = %run_id, "Retrain requested");

    Ok(Json(TrainResponse::accepted(run_id)))
}

/// GET /model/runs
pub async fn list_runs(
    State(state): State<AppState>,
    query: Result<Query<RunsQueryParams>, QueryRejection>,
) -> Result<Json<Vec<RunRecord>>, ApiError> {
    let Query(params) = query?;
    let runs = state.run_history.list_recent(params.limit()).await?;

    Ok(Json(runs))
}

/// GET /model/runs/{run_id}
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunRecord>, ApiError> {
    let run_id = RunId::new(run_id)?;

    let record = state
        .run_history
        .get(&run_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Run '{}' not found", run_id)))?;

    Ok(Json(record))
}
