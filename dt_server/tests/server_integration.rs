//! Integration tests for the HTTP API.
//!
//! The router is driven in-process over the in-memory backend.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use daily_tournament::{
    Country, PendingReward, User,
    db::{MemoryStore, Repositories},
    domain::UserId,
    leaderboard::InMemoryLeaderboardStore,
};
use dt_server::api::{AppState, create_router, request_id::REQUEST_ID_HEADER};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // For `oneshot` method

struct TestServer {
    app: axum::Router,
    store: Arc<MemoryStore>,
}

fn create_test_server(admin: bool) -> TestServer {
    let store = Arc::new(MemoryStore::new());
    let repos = Repositories::from_store(store.clone());
    let state = AppState::new(&repos, Arc::new(InMemoryLeaderboardStore::new()), None)
        .with_admin_routes(admin);

    TestServer {
        app: create_router(state),
        store,
    }
}

/// Insert a user who meets the entry thresholds
async fn eligible_user(store: &MemoryStore, id: UserId, country: Country) -> User {
    store
        .insert_user(User {
            id,
            coins: 2_000,
            level: 25,
            country,
            score: 0,
            group_id: None,
            pending_reward: PendingReward::None,
            version: 0,
        })
        .await
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let server = create_test_server(false);

    let (status, body) = send(&server.app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["tournament_active"], false);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = create_test_server(false);

    let request = Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, "trace-42")
        .body(Body::empty())
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "trace-42");
}

// ============================================================================
// User Tests
// ============================================================================

#[tokio::test]
async fn test_create_and_get_user() {
    let server = create_test_server(false);

    let (status, created) = send(
        &server.app,
        "POST",
        "/api/v1/users",
        Some(json!({ "country": "USA" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["level"], 1);
    assert_eq!(created["coins"], 5000);
    assert_eq!(created["country"], "USA");

    let uri = format!("/api/v1/users/{}", created["id"]);
    let (status, fetched) = send(&server.app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_create_user_without_country_picks_one() {
    let server = create_test_server(false);

    let (status, created) = send(&server.app, "POST", "/api/v1/users", Some(json!({}))).await;

    assert_eq!(status, StatusCode::CREATED);
    let country: Country = serde_json::from_value(created["country"].clone()).unwrap();
    assert!(daily_tournament::domain::CATALOG.contains(&country));
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let server = create_test_server(false);

    let (status, body) = send(&server.app, "GET", "/api/v1/users/999", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");
}

#[tokio::test]
async fn test_level_up_grants_coins() {
    let server = create_test_server(false);
    let (_, created) = send(&server.app, "POST", "/api/v1/users", Some(json!({}))).await;

    let uri = format!("/api/v1/users/{}/level", created["id"]);
    let (status, user) = send(&server.app, "PUT", &uri, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["level"], 2);
    assert_eq!(user["coins"], 5025);
    assert_eq!(user["score"], 0);
}

#[tokio::test]
async fn test_claim_without_reward_is_bad_request() {
    let server = create_test_server(false);
    let (_, created) = send(&server.app, "POST", "/api/v1/users", Some(json!({}))).await;

    let uri = format!("/api/v1/users/{}/claim-reward", created["id"]);
    let (status, body) = send(&server.app, "POST", &uri, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No reward to claim");
}

// ============================================================================
// Tournament Tests
// ============================================================================

#[tokio::test]
async fn test_enter_without_active_tournament() {
    let server = create_test_server(true);
    eligible_user(&server.store, 1, Country::Turkey).await;

    let (status, body) = send(
        &server.app,
        "POST",
        "/api/v1/tournaments/enter",
        Some(json!({ "user_id": 1 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No active tournament");
}

#[tokio::test]
async fn test_ineligible_user_is_rejected() {
    let server = create_test_server(true);
    send(&server.app, "POST", "/api/v1/admin/tournaments/start", None).await;
    let (_, created) = send(&server.app, "POST", "/api/v1/users", Some(json!({}))).await;

    let (status, body) = send(
        &server.app,
        "POST",
        "/api/v1/tournaments/enter",
        Some(json!({ "user_id": created["id"] })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User is not eligible to join the tournament");
}

#[tokio::test]
async fn test_full_tournament_flow() {
    let server = create_test_server(true);

    let (status, started) = send(&server.app, "POST", "/api/v1/admin/tournaments/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["outcome"], "started");

    let (_, active) = send(&server.app, "GET", "/api/v1/tournaments/active", None).await;
    assert_eq!(active["active"], true);

    let countries = [
        Country::Turkey,
        Country::Germany,
        Country::Usa,
        Country::France,
        Country::UnitedKingdom,
    ];
    let mut group_id = Value::Null;
    for (i, country) in countries.into_iter().enumerate() {
        let id = i as UserId + 1;
        eligible_user(&server.store, id, country).await;

        let (status, entry) = send(
            &server.app,
            "POST",
            "/api/v1/tournaments/enter",
            Some(json!({ "user_id": id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(entry["members"].as_array().unwrap().len(), i + 1);
        group_id = entry["group"]["id"].clone();
    }

    // Already grouped
    let (status, _) = send(
        &server.app,
        "POST",
        "/api/v1/tournaments/enter",
        Some(json!({ "user_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // User 3 scores twice in the now active group
    for _ in 0..2 {
        send(&server.app, "PUT", "/api/v1/users/3/level", None).await;
    }

    let uri = format!("/api/v1/tournaments/groups/{}/leaderboard", group_id);
    let (status, board) = send(&server.app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board[0], json!({ "user_id": 3, "score": 2 }));
    assert_eq!(board.as_array().unwrap().len(), 5);

    let (_, rank) = send(&server.app, "GET", "/api/v1/users/3/group-rank", None).await;
    assert_eq!(rank["rank"], 1);

    let (_, countries) = send(
        &server.app,
        "GET",
        "/api/v1/tournaments/countries/leaderboard",
        None,
    )
    .await;
    assert_eq!(countries[0], json!({ "country": "USA", "score": 2 }));

    let (status, ended) = send(&server.app, "POST", "/api/v1/admin/tournaments/end", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ended["outcome"], "ended");
    assert_eq!(ended["rewards_granted"], 2);

    // Ties at 0 rank by ascending ID, so user 1 is second
    let (status, claimed) = send(&server.app, "POST", "/api/v1/users/1/claim-reward", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(claimed["credited"], 5000);

    let (status, claimed) = send(&server.app, "POST", "/api/v1/users/3/claim-reward", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(claimed["credited"], 10000);
}

#[tokio::test]
async fn test_unknown_group_is_not_found() {
    let server = create_test_server(false);

    let (status, _) = send(
        &server.app,
        "GET",
        "/api/v1/tournaments/groups/42/leaderboard",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_group_rank_outside_group() {
    let server = create_test_server(false);
    eligible_user(&server.store, 1, Country::France).await;

    let (status, body) = send(&server.app, "GET", "/api/v1/users/1/group-rank", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User is not in a group");
}

// ============================================================================
// Admin Route Tests
// ============================================================================

#[tokio::test]
async fn test_admin_routes_hidden_by_default() {
    let server = create_test_server(false);

    let (status, _) = send(&server.app, "POST", "/api/v1/admin/tournaments/start", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_end_without_tournament_is_noop() {
    let server = create_test_server(true);

    let (status, body) = send(&server.app, "POST", "/api/v1/admin/tournaments/end", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "nothing_to_end");
}

#[tokio::test]
async fn test_rebuild_requires_active_tournament() {
    let server = create_test_server(true);

    let (status, _) = send(&server.app, "POST", "/api/v1/admin/leaderboards/rebuild", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    send(&server.app, "POST", "/api/v1/admin/tournaments/start", None).await;
    let (status, body) = send(&server.app, "POST", "/api/v1/admin/leaderboards/rebuild", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["groups_rebuilt"], 0);
}
