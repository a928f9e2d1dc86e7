//! Charging station feature
//!
//! - `commands::create` - validate and store a station
//! - `queries::get` - one station by id
//! - `queries::list` - all stations

pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::{stations_routes, StationsState};
