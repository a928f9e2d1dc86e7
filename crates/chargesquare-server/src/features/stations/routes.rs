//! Station API routes
//!
//! # Route Structure
//!
//! - `GET /stations` - List all stations
//! - `GET /stations/:id` - Get a single station
//! - `POST /stations` - Create a station
//!
//! Successful responses carry the bare station JSON. Errors use
//! [`ErrorResponse`].

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use super::{
    commands::{CreateStationCommand, CreateStationError},
    queries::{GetStationError, GetStationQuery, ListStationsError, ListStationsQuery},
};
use crate::api::response::ErrorResponse;
use crate::db::{DbError, StationRepository};

pub type StationsState = Arc<dyn StationRepository>;

// ============================================================================
// Router Configuration
// ============================================================================

pub fn stations_routes() -> Router<StationsState> {
    Router::new()
        .route("/", get(list_stations).post(create_station))
        .route("/:id", get(get_station))
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

/// Create a new station
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Downtown",
///   "location": "Main St",
///   "status": "AVAILABLE",
///   "powerOutput": 22.0,
///   "connectorType": "Type2"
/// }
/// ```
///
/// # Response
///
/// - `201 Created` - Station created successfully
/// - `400 Bad Request` - Malformed body or validation error
/// - `500 Internal Server Error` - Database error
#[tracing::instrument(skip(repository, payload))]
async fn create_station(
    State(repository): State<StationsState>,
    payload: Result<Json<CreateStationCommand>, JsonRejection>,
) -> Result<Response, StationApiError> {
    let Json(command) = payload?;
    let station = super::commands::create::handle(repository, command).await?;

    tracing::info!(station_id = station.id, "Station created via API");

    Ok((StatusCode::CREATED, Json(station)).into_response())
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

#[tracing::instrument(skip(repository))]
async fn get_station(
    State(repository): State<StationsState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, StationApiError> {
    let Path(id) = id?;
    let station = super::queries::get::handle(repository, GetStationQuery { id }).await?;
    Ok(Json(station).into_response())
}

#[tracing::instrument(skip(repository))]
async fn list_stations(
    State(repository): State<StationsState>,
) -> Result<Response, StationApiError> {
    let stations = super::queries::list::handle(repository, ListStationsQuery::default()).await?;
    Ok(Json(stations).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Unified error type for station API endpoints
#[derive(Debug)]
enum StationApiError {
    Body(JsonRejection),
    Path(PathRejection),
    Create(CreateStationError),
    Get(GetStationError),
    List(ListStationsError),
}

impl From<JsonRejection> for StationApiError {
    fn from(err: JsonRejection) -> Self {
        Self::Body(err)
    }
}

impl From<PathRejection> for StationApiError {
    fn from(err: PathRejection) -> Self {
        Self::Path(err)
    }
}

impl From<CreateStationError> for StationApiError {
    fn from(err: CreateStationError) -> Self {
        Self::Create(err)
    }
}

impl From<GetStationError> for StationApiError {
    fn from(err: GetStationError) -> Self {
        Self::Get(err)
    }
}

impl From<ListStationsError> for StationApiError {
    fn from(err: ListStationsError) -> Self {
        Self::List(err)
    }
}

fn internal_error(context: &str, err: &dyn std::fmt::Display) -> Response {
    tracing::error!(error = %err, "Database error during {}", context);
    let error = ErrorResponse::new("INTERNAL_ERROR", "A database error occurred");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
}

fn bad_request(code: &str, message: String) -> Response {
    let error = ErrorResponse::new(code, message);
    (StatusCode::BAD_REQUEST, Json(error)).into_response()
}

impl IntoResponse for StationApiError {
    fn into_response(self) -> Response {
        match self {
            StationApiError::Body(rejection) => bad_request("BAD_REQUEST", rejection.body_text()),
            StationApiError::Path(rejection) => bad_request("BAD_REQUEST", rejection.body_text()),

            StationApiError::Create(CreateStationError::Validation(err)) => {
                bad_request("VALIDATION_ERROR", err.to_string())
            },
            StationApiError::Create(err @ CreateStationError::InvalidId) => {
                bad_request("VALIDATION_ERROR", err.to_string())
            },
            StationApiError::Create(CreateStationError::Database(DbError::Invalid(msg))) => {
                bad_request("VALIDATION_ERROR", msg)
            },
            StationApiError::Create(CreateStationError::Database(err)) => {
                internal_error("station creation", &err)
            },

            StationApiError::Get(GetStationError::NotFound(id)) => {
                let error = ErrorResponse::new("NOT_FOUND", format!("Station {} not found", id));
                (StatusCode::NOT_FOUND, Json(error)).into_response()
            },
            StationApiError::Get(GetStationError::Database(err)) => {
                internal_error("station lookup", &err)
            },

            StationApiError::List(ListStationsError::Database(err)) => {
                internal_error("station listing", &err)
            },
        }
    }
}
