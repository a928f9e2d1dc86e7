//! API integration tests for the ChargeSquare server
//!
//! Requests go through the full router (`api::create_router`) with an
//! in-memory station store.
//!
//! Coverage includes:
//! - Station create, get and list
//! - Validation failures and malformed bodies (400)
//! - Missing stations and unknown routes (404)
//! - Health reporting

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use chargesquare_server::api::{create_router, AppState};
use chargesquare_server::db::{
    DbError, DbResult, InMemoryStationRepository, StationRepository,
};
use chargesquare_server::models::{NewStation, Station};

// ============================================================================
// Helper Functions
// ============================================================================

fn create_test_app() -> (Router, Arc<InMemoryStationRepository>) {
    let repository = Arc::new(InMemoryStationRepository::new());
    let app = create_router(AppState {
        stations: repository.clone(),
    });
    (app, repository)
}

/// Helper to send a GET request
async fn get_request(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    read_response(response).await
}

/// Helper to send a POST request with a raw body
async fn post_raw(app: &Router, uri: &str, body: String) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .method("POST")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    read_response(response).await
}

async fn post_request(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    post_raw(app, uri, body.to_string()).await
}

async fn read_response(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };

    (status, value)
}

fn downtown() -> Value {
    json!({
        "name": "Downtown",
        "location": "Main St",
        "status": "AVAILABLE",
        "powerOutput": 22.0,
        "connectorType": "Type2"
    })
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_station_returns_201() {
    let (app, repository) = create_test_app();

    let (status, body) = post_request(&app, "/stations", downtown()).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Downtown");
    assert_eq!(body["location"], "Main St");
    assert_eq!(body["status"], "AVAILABLE");
    assert_eq!(body["powerOutput"], 22.0);
    assert_eq!(body["connectorType"], "Type2");
    assert!(body["id"].as_i64().unwrap() > 0);
    assert!(body["createdAt"].is_string());
    assert_eq!(repository.len().await, 1);
}

#[tokio::test]
async fn test_create_then_get_round_trip() {
    let (app, _) = create_test_app();

    let (_, created) = post_request(&app, "/stations", downtown()).await;
    let id = created["id"].as_i64().unwrap();

    let (status, fetched) = get_request(&app, &format!("/stations/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_create_with_explicit_id() {
    let (app, _) = create_test_app();

    let mut body = downtown();
    body["id"] = json!(42);
    let (status, created) = post_request(&app, "/stations", body).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["id"], 42);

    let (status, _) = get_request(&app, "/stations/42").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_create_missing_name_returns_400_and_stores_nothing() {
    let (app, repository) = create_test_app();

    let mut body = downtown();
    body.as_object_mut().unwrap().remove("name");
    let (status, error) = post_request(&app, "/stations", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["success"], false);
    assert_eq!(error["error"]["code"], "VALIDATION_ERROR");
    assert!(error["error"]["message"].as_str().unwrap().contains("name"));
    assert!(repository.is_empty().await);
}

#[tokio::test]
async fn test_create_rejects_invalid_fields() {
    let (app, repository) = create_test_app();

    let cases = [
        ("name", json!("   ")),
        ("name", json!("x".repeat(101))),
        ("location", json!("")),
        ("status", Value::Null),
        ("powerOutput", json!(0)),
        ("powerOutput", json!(-7.5)),
        ("connectorType", json!("c".repeat(51))),
        ("id", json!(0)),
    ];

    for (field, value) in cases {
        let mut body = downtown();
        body[field] = value.clone();
        let (status, error) = post_request(&app, "/stations", body).await;
        assert_eq!(
            status,
            StatusCode::BAD_REQUEST,
            "{} = {} should be rejected",
            field,
            value
        );
        assert_eq!(error["error"]["code"], "VALIDATION_ERROR");
    }

    assert!(repository.is_empty().await);
}

#[tokio::test]
async fn test_create_accepts_limits() {
    let (app, _) = create_test_app();

    let mut body = downtown();
    body["name"] = json!("n".repeat(100));
    body["connectorType"] = json!("c".repeat(50));
    let (status, _) = post_request(&app, "/stations", body).await;

    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_create_malformed_json_returns_400() {
    let (app, repository) = create_test_app();

    let (status, error) = post_raw(&app, "/stations", "{\"name\": ".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["success"], false);

    let mut body = downtown();
    body["status"] = json!("ON_FIRE");
    let (status, _) = post_request(&app, "/stations", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(repository.is_empty().await);
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_get_missing_station_returns_404() {
    let (app, _) = create_test_app();

    let (status, error) = get_request(&app, "/stations/999").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_get_with_non_numeric_id_returns_400() {
    let (app, _) = create_test_app();

    let (status, _) = get_request(&app, "/stations/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_stations() {
    let (app, _) = create_test_app();

    let (status, body) = get_request(&app, "/stations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    for name in ["First", "Second"] {
        let mut station = downtown();
        station["name"] = json!(name);
        post_request(&app, "/stations", station).await;
    }

    let (status, body) = get_request(&app, "/stations").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["First", "Second"]);
}

// ============================================================================
// Health and fallback
// ============================================================================

struct UnreachableRepository;

#[async_trait]
impl StationRepository for UnreachableRepository {
    async fn save(&self, _station: NewStation) -> DbResult<Station> {
        Err(DbError::config("connection refused"))
    }

    async fn find_by_id(&self, _id: i64) -> DbResult<Option<Station>> {
        Err(DbError::config("connection refused"))
    }

    async fn find_all(&self) -> DbResult<Vec<Station>> {
        Err(DbError::config("connection refused"))
    }

    async fn ping(&self) -> DbResult<()> {
        Err(DbError::config("connection refused"))
    }
}

#[tokio::test]
async fn test_health_reports_storage() {
    let (app, _) = create_test_app();

    let (status, body) = get_request(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "connected");
}

#[tokio::test]
async fn test_unreachable_storage() {
    let app = create_router(AppState {
        stations: Arc::new(UnreachableRepository),
    });

    let (status, body) = get_request(&app, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");

    let (status, body) = get_request(&app, "/stations").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["message"], "A database error occurred");

    let (status, _) = post_request(&app, "/stations", downtown()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let (app, _) = create_test_app();

    let (status, body) = get_request(&app, "/chargers").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
