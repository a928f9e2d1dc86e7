//! Charging station records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Connector type used when the source does not report one.
pub const UNKNOWN_CONNECTOR_TYPE: &str = "Unknown";

/// Operational state of a station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StationStatus {
    Available,
    Occupied,
    Maintenance,
}

impl StationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StationStatus::Available => "AVAILABLE",
            StationStatus::Occupied => "OCCUPIED",
            StationStatus::Maintenance => "MAINTENANCE",
        }
    }
}

impl fmt::Display for StationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown station status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for StationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AVAILABLE" => Ok(StationStatus::Available),
            "OCCUPIED" => Ok(StationStatus::Occupied),
            "MAINTENANCE" => Ok(StationStatus::Maintenance),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// A station that has not been persisted yet
///
/// Produced by the ingest normalizer (with an external id) and by the HTTP
/// create command (id optional). The store assigns the timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub location: String,
    pub status: StationStatus,
    pub power_output: f64,
    pub connector_type: String,
}

/// A persisted station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub status: StationStatus,
    pub power_output: f64,
    pub connector_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Station {
    /// Build the persisted form of `new` under `id`.
    ///
    /// `created_at` is kept from `existing` when the row is being updated.
    pub fn from_new(
        id: i64,
        new: NewStation,
        existing: Option<&Station>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: new.name,
            location: new.location,
            status: new.status,
            power_output: new.power_output,
            connector_type: new.connector_type,
            created_at: existing.map(|s| s.created_at).unwrap_or(now),
            updated_at: now,
        }
    }
}
