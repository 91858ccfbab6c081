//! Tournament API handlers.
//!
//! Enter the active tournament:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/tournaments/enter \
//!   -H "Content-Type: application/json" -d '{"user_id": 1}'
//! ```

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use daily_tournament::{
    ErrorKind, Tournament, TournamentError,
    domain::{GroupId, UserId},
    tournament::{CountryStanding, GroupEntry, GroupStanding},
};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState, request_id::RequestId, tournament_error};
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct EnterTournamentRequest {
    pub user_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct ActiveTournamentResponse {
    pub active: bool,
    pub tournament: Option<Tournament>,
    /// Next scheduled Start or End
    pub next_transition: DateTime<Utc>,
}

/// Enter the active tournament.
///
/// Pays the entry fee and places the user in a group with no other member
/// of their country.
///
/// # Response
///
/// Returns `200 OK` with the group and its members:
/// ```json
/// {
///   "group": { "id": 3, "tournament_id": 1, "status": "waiting", ... },
///   "members": [ { "id": 7, "country": "Germany", ... } ]
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Unclaimed reward, already grouped, ineligible or no active tournament
/// - `404 Not Found`: User doesn't exist
/// - `409 Conflict`: Too many concurrent joins, retry
pub async fn enter_tournament(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<EnterTournamentRequest>,
) -> Result<Json<GroupEntry>, ApiError> {
    match state.service.enter_tournament(request.user_id).await {
        Ok(entry) => {
            metrics::tournament_joins_total("joined");
            tracing::info!(
                request_id = request_id.as_str(),
                user_id = request.user_id,
                group_id = entry.group.id,
                occupancy = entry.members.len(),
                "User entered tournament"
            );
            Ok(Json(entry))
        }
        Err(e) => {
            metrics::tournament_joins_total(join_outcome(&e));
            Err(tournament_error(e, "enter_tournament", &request_id))
        }
    }
}

fn join_outcome(e: &TournamentError) -> &'static str {
    match e.kind() {
        ErrorKind::Validation => "rejected",
        ErrorKind::Contention => "contention",
        ErrorKind::Internal => "error",
    }
}

/// The active tournament, if any, and when the schedule next changes state.
pub async fn active_tournament(
    State(state): State<AppState>,
    request_id: RequestId,
) -> Result<Json<ActiveTournamentResponse>, ApiError> {
    let tournament = state
        .service
        .active_tournament()
        .await
        .map_err(|e| tournament_error(e, "active_tournament", &request_id))?;

    Ok(Json(ActiveTournamentResponse {
        active: tournament.is_some(),
        tournament,
        next_transition: state
            .service
            .lifecycle()
            .schedule()
            .next_transition(Utc::now()),
    }))
}

/// Scores of one group, highest first.
///
/// # Errors
///
/// - `404 Not Found`: Group doesn't exist
pub async fn group_leaderboard(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(group_id): Path<GroupId>,
) -> Result<Json<Vec<GroupStanding>>, ApiError> {
    state
        .service
        .group_leaderboard(group_id)
        .await
        .map(Json)
        .map_err(|e| tournament_error(e, "group_leaderboard", &request_id))
}

/// Aggregate score of every catalog country, highest first.
pub async fn country_leaderboard(
    State(state): State<AppState>,
    request_id: RequestId,
) -> Result<Json<Vec<CountryStanding>>, ApiError> {
    state
        .service
        .country_leaderboard()
        .await
        .map(Json)
        .map_err(|e| tournament_error(e, "country_leaderboard", &request_id))
}
