//! Manual lifecycle control.
//!
//! Mounted only with `ADMIN_ROUTES_ENABLED=true`. These run the same
//! operations as the lifecycle clock and are safe to repeat.

use axum::{Json, extract::State};
use chrono::Utc;
use daily_tournament::tournament::{EndOutcome, StartOutcome};
use serde::Serialize;

use super::{ApiError, AppState, request_id::RequestId, tournament_error};
use crate::metrics;

#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    pub groups_rebuilt: usize,
}

/// Start a new tournament now, ending any active one first.
pub async fn start_tournament(
    State(state): State<AppState>,
    request_id: RequestId,
) -> Result<Json<StartOutcome>, ApiError> {
    let outcome = state
        .service
        .lifecycle()
        .start(Utc::now())
        .await
        .map_err(|e| tournament_error(e, "start_tournament", &request_id))?;

    metrics::record_start(&outcome);
    tracing::info!(
        request_id = request_id.as_str(),
        tournament_id = outcome.tournament().id,
        "Manual start"
    );
    Ok(Json(outcome))
}

/// End the active tournament now, or finish an interrupted End.
pub async fn end_tournament(
    State(state): State<AppState>,
    request_id: RequestId,
) -> Result<Json<EndOutcome>, ApiError> {
    let outcome = state
        .service
        .lifecycle()
        .end(Utc::now())
        .await
        .map_err(|e| tournament_error(e, "end_tournament", &request_id))?;

    metrics::record_end(&outcome);
    tracing::info!(request_id = request_id.as_str(), "Manual end: {:?}", outcome);
    Ok(Json(outcome))
}

/// Rebuild the active tournament's leaderboards from durable scores.
///
/// # Errors
///
/// - `400 Bad Request`: No active tournament
pub async fn rebuild_leaderboards(
    State(state): State<AppState>,
    request_id: RequestId,
) -> Result<Json<RebuildResponse>, ApiError> {
    let groups_rebuilt = state
        .service
        .rebuild_leaderboards()
        .await
        .map_err(|e| tournament_error(e, "rebuild_leaderboards", &request_id))?;

    Ok(Json(RebuildResponse { groups_rebuilt }))
}
