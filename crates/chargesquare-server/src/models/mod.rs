//! Domain models shared by the HTTP surface, the store and the ingest pipeline

pub mod envelope;
pub mod station;

pub use envelope::{Operation, StationMessage, OPEN_CHARGE_MAP_SOURCE};
pub use station::{NewStation, Station, StationStatus, UNKNOWN_CONNECTOR_TYPE};
