//! Message envelope carried on the stations topic

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::station::NewStation;

/// Source tag stamped on envelopes produced by the Open Charge Map poller.
pub const OPEN_CHARGE_MAP_SOURCE: &str = "OPEN_CHARGE_MAP";

/// What the consumer is asked to do with the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Envelope wrapping one station on its way through the topic
///
/// `message_id` is a UUID v7, so ids sort by creation time and are unique
/// without coordination. `timestamp` is the capture time, not the publish time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationMessage {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub operation: Operation,
    pub payload: NewStation,
}

impl StationMessage {
    /// Wrap a normalized station fetched from Open Charge Map
    pub fn new(payload: NewStation) -> Self {
        Self::with_tags(payload, OPEN_CHARGE_MAP_SOURCE, Operation::Create)
    }

    pub fn with_tags(payload: NewStation, source: impl Into<String>, operation: Operation) -> Self {
        Self {
            message_id: Uuid::now_v7().to_string(),
            timestamp: Utc::now(),
            source: source.into(),
            operation,
            payload,
        }
    }

    /// The record key used for partitioning
    pub fn key(&self) -> &str {
        &self.message_id
    }
}
