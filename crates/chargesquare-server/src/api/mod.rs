pub mod response;

use axum::{extract::State, http::Uri, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::sync::Arc;

use crate::db::StationRepository;
use crate::error::{ApiResult, AppError};
use crate::features;
use crate::middleware;

#[derive(Clone)]
pub struct AppState {
    pub stations: Arc<dyn StationRepository>,
}

/// Build the HTTP router: station routes, `/health` and request tracing.
///
/// CORS is left to the caller since it depends on deployment config.
pub fn create_router(state: AppState) -> Router {
    let feature_state = features::FeatureState {
        stations: Arc::clone(&state.stations),
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(state)
        .merge(features::router(feature_state))
        .fallback(not_found)
        .layer(middleware::tracing_layer())
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "ChargeSquare",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    if let Err(e) = state.stations.ping().await {
        tracing::error!(error = %e, "Storage health check failed");
        return Err(AppError::Unavailable("Station storage is unreachable".to_string()));
    }

    Ok(Json(json!({
        "status": "healthy",
        "storage": "connected"
    })))
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}
