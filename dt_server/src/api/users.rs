//! User account API handlers.
//!
//! # Examples
//!
//! Create a user with a random country:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/users \
//!   -H "Content-Type: application/json" -d '{}'
//! ```
//!
//! Level up:
//! ```bash
//! curl -X PUT http://localhost:8080/api/v1/users/1/level
//! ```

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use daily_tournament::{
    Country, User,
    domain::UserId,
    tournament::GroupRank,
    users::ClaimedReward,
};
use serde::Deserialize;

use super::{ApiError, AppState, request_id::RequestId, tournament_error, user_error};

#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    /// Random catalog country when absent
    #[serde(default)]
    pub country: Option<Country>,
}

/// Create a user at level 1 with 5000 coins.
///
/// # Request Body
///
/// ```json
/// { "country": "Turkey" }
/// ```
///
/// # Response
///
/// Returns `201 Created` with the new user.
pub async fn create_user(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state
        .users
        .create_user(request.country)
        .await
        .map_err(|e| user_error(e, "create_user", &request_id))?;

    tracing::info!(
        request_id = request_id.as_str(),
        user_id = user.id,
        country = %user.country,
        "User created"
    );
    Ok((StatusCode::CREATED, Json(user)))
}

/// Get a user.
///
/// # Errors
///
/// - `404 Not Found`: User doesn't exist
pub async fn get_user(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(user_id): Path<UserId>,
) -> Result<Json<User>, ApiError> {
    state
        .users
        .get_user(user_id)
        .await
        .map(Json)
        .map_err(|e| user_error(e, "get_user", &request_id))
}

/// Level a user up.
///
/// Grants 25 coins, and one tournament point while the user's group is
/// active.
///
/// # Errors
///
/// - `404 Not Found`: User doesn't exist
/// - `409 Conflict`: Too many concurrent updates, retry
pub async fn level_up(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(user_id): Path<UserId>,
) -> Result<Json<User>, ApiError> {
    state
        .users
        .level_up(user_id)
        .await
        .map(Json)
        .map_err(|e| user_error(e, "level_up", &request_id))
}

/// Credit the user's pending tournament reward.
///
/// # Response
///
/// ```json
/// { "user": { "id": 1, "coins": 14000, ... }, "credited": 10000 }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Nothing to claim
/// - `404 Not Found`: User doesn't exist
pub async fn claim_reward(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(user_id): Path<UserId>,
) -> Result<Json<ClaimedReward>, ApiError> {
    let claimed = state
        .users
        .claim_reward(user_id)
        .await
        .map_err(|e| user_error(e, "claim_reward", &request_id))?;

    tracing::info!(
        request_id = request_id.as_str(),
        user_id = user_id,
        credited = claimed.credited,
        "Reward claimed"
    );
    Ok(Json(claimed))
}

/// 1-based rank of the user inside their current group.
///
/// # Errors
///
/// - `400 Bad Request`: User is not in a group
/// - `404 Not Found`: User doesn't exist
pub async fn group_rank(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(user_id): Path<UserId>,
) -> Result<Json<GroupRank>, ApiError> {
    state
        .service
        .group_rank(user_id)
        .await
        .map(Json)
        .map_err(|e| tournament_error(e, "group_rank", &request_id))
}
