//! HTTP API for the tournament server.
//!
//! # Modules
//!
//! - [`users`]: User accounts (create, level up, claim reward, group rank)
//! - [`tournaments`]: Entering the active tournament and leaderboard reads
//! - [`admin`]: Manual lifecycle control, mounted only when enabled
//! - [`request_id`]: Request correlation middleware
//!
//! # Errors
//!
//! Every failure is a JSON body `{"error": "..."}`. The status follows the
//! error kind: validation errors are `404` for missing users or groups and
//! `400` otherwise, exhausted retries are `409` and store failures are `500`
//! with a sanitized message.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use daily_tournament::{db::Repositories, leaderboard::InMemoryLeaderboardStore};
//! use dt_server::api::{AppState, create_router};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repos = Repositories::in_memory();
//! let state = AppState::new(&repos, Arc::new(InMemoryLeaderboardStore::new()), None);
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod request_id;
pub mod tournaments;
pub mod users;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post, put},
};
use daily_tournament::{
    ErrorKind, TournamentError, TournamentService, UserError, UserManager,
    db::{Database, Repositories},
    leaderboard::RankedLeaderboardStore,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use self::request_id::RequestId;
use crate::metrics;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request (cheap due to Arc wrappers).
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TournamentService>,
    pub users: Arc<UserManager>,
    /// Present for the postgres backend, checked by `/health`
    pub database: Option<Database>,
    pub admin_enabled: bool,
}

impl AppState {
    /// Build the services over one set of repositories
    ///
    /// # Arguments
    ///
    /// * `repos` - Durable repositories
    /// * `store` - Ranked store backing the leaderboards
    /// * `database` - Pool to health-check, if the repositories use one
    pub fn new(
        repos: &Repositories,
        store: Arc<dyn RankedLeaderboardStore>,
        database: Option<Database>,
    ) -> Self {
        let service = TournamentService::new(repos, store);
        let users = UserManager::new(repos, service.projection().clone());
        Self {
            service: Arc::new(service),
            users: Arc::new(users),
            database,
            admin_enabled: false,
        }
    }

    /// Set the CAS attempt budget of joins and user updates
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            service: Arc::new((*self.service).clone().with_max_attempts(max_attempts)),
            users: Arc::new((*self.users).clone().with_max_attempts(max_attempts)),
            ..self
        }
    }

    /// Mount the admin routes
    pub fn with_admin_routes(mut self, enabled: bool) -> Self {
        self.admin_enabled = enabled;
        self
    }
}

/// Error body of every failed request
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler error type
pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_status(kind: ErrorKind, not_found: bool) -> StatusCode {
    match kind {
        ErrorKind::Validation if not_found => StatusCode::NOT_FOUND,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Contention => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(
    kind: ErrorKind,
    not_found: bool,
    message: String,
    detail: &dyn std::fmt::Display,
    operation: &'static str,
    request_id: &RequestId,
) -> ApiError {
    match kind {
        ErrorKind::Internal => tracing::error!(
            request_id = request_id.as_str(),
            operation = operation,
            "Request failed: {}",
            detail
        ),
        ErrorKind::Contention => {
            metrics::contention_exhausted_total(operation);
            tracing::warn!(
                request_id = request_id.as_str(),
                operation = operation,
                "{}",
                detail
            );
        }
        ErrorKind::Validation => {}
    }

    (
        error_status(kind, not_found),
        Json(ErrorResponse { error: message }),
    )
}

/// Map a tournament error to its HTTP response
pub(crate) fn tournament_error(
    e: TournamentError,
    operation: &'static str,
    request_id: &RequestId,
) -> ApiError {
    let not_found = matches!(
        e,
        TournamentError::UserNotFound(_) | TournamentError::GroupNotFound(_)
    );
    api_error(
        e.kind(),
        not_found,
        e.client_message(),
        &e,
        operation,
        request_id,
    )
}

/// Map a user error to its HTTP response
pub(crate) fn user_error(e: UserError, operation: &'static str, request_id: &RequestId) -> ApiError {
    let not_found = matches!(e, UserError::UserNotFound(_));
    api_error(
        e.kind(),
        not_found,
        e.client_message(),
        &e,
        operation,
        request_id,
    )
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Endpoint Summary
///
/// ```text
/// GET  /health
/// POST /api/v1/users
/// GET  /api/v1/users/{user_id}
/// PUT  /api/v1/users/{user_id}/level
/// POST /api/v1/users/{user_id}/claim-reward
/// GET  /api/v1/users/{user_id}/group-rank
/// POST /api/v1/tournaments/enter
/// GET  /api/v1/tournaments/active
/// GET  /api/v1/tournaments/groups/{group_id}/leaderboard
/// GET  /api/v1/tournaments/countries/leaderboard
/// POST /api/v1/admin/tournaments/start      (admin routes only)
/// POST /api/v1/admin/tournaments/end        (admin routes only)
/// POST /api/v1/admin/leaderboards/rebuild   (admin routes only)
/// ```
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router(state.admin_enabled);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", v1_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router(admin_enabled: bool) -> Router<AppState> {
    let user_routes = Router::new()
        .route("/users", post(users::create_user))
        .route("/users/{user_id}", get(users::get_user))
        .route("/users/{user_id}/level", put(users::level_up))
        .route("/users/{user_id}/claim-reward", post(users::claim_reward))
        .route("/users/{user_id}/group-rank", get(users::group_rank));

    let tournament_routes = Router::new()
        .route("/tournaments/enter", post(tournaments::enter_tournament))
        .route("/tournaments/active", get(tournaments::active_tournament))
        .route(
            "/tournaments/groups/{group_id}/leaderboard",
            get(tournaments::group_leaderboard),
        )
        .route(
            "/tournaments/countries/leaderboard",
            get(tournaments::country_leaderboard),
        );

    let router = Router::new().merge(user_routes).merge(tournament_routes);

    if admin_enabled {
        router.merge(
            Router::new()
                .route("/admin/tournaments/start", post(admin::start_tournament))
                .route("/admin/tournaments/end", post(admin::end_tournament))
                .route("/admin/leaderboards/rebuild", post(admin::rebuild_leaderboards)),
        )
    } else {
        router
    }
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` if storage is reachable, or `503 Service Unavailable`
/// otherwise.
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","storage":true,"tournament_active":true,"timestamp":"2026-10-19T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database_healthy = match &state.database {
        Some(db) => db.health_check().await.is_ok(),
        None => true,
    };

    // Also exercises the repositories of the memory backend
    let tournament_active = state.service.is_tournament_active().await;
    let storage_healthy = database_healthy && tournament_active.is_ok();

    let status_code = if storage_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if storage_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "storage": storage_healthy,
        "tournament_active": tournament_active.unwrap_or(false),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status() {
        assert_eq!(
            error_status(ErrorKind::Validation, true),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_status(ErrorKind::Validation, false),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_status(ErrorKind::Contention, false),
            StatusCode::CONFLICT
        );
        assert_eq!(
            error_status(ErrorKind::Internal, false),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_errors_are_sanitized() {
        use daily_tournament::db::StoreError;
        use std::time::Duration;

        let request_id = RequestId("test".to_string());
        let (status, Json(body)) = tournament_error(
            TournamentError::Store(StoreError::Timeout(Duration::from_secs(5))),
            "test",
            &request_id,
        );
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
    }
}
