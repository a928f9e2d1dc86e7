//! Feature modules implementing the ChargeSquare API
//!
//! Each feature is a vertical slice following the CQRS (Command Query
//! Responsibility Segregation) pattern:
//! - `commands/` - Write operations
//! - `queries/` - Read operations
//! - `routes.rs` - HTTP route definitions

pub mod shared;
pub mod stations;

use axum::Router;
use std::sync::Arc;

use crate::db::StationRepository;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    pub stations: Arc<dyn StationRepository>,
}

/// Creates the router with all feature routes mounted
///
/// - `/stations` - Charging station management
pub fn router(state: FeatureState) -> Router<()> {
    Router::new().nest(
        "/stations",
        stations::stations_routes().with_state(state.stations),
    )
}
