//! Station ingestion from Open Charge Map
//!
//! A [`poller::StationPoller`] runs one cycle per tick:
//!
//! 1. [`client::OpenChargeMapClient`] fetches a page of raw POI records
//! 2. [`normalizer`] turns each record into a [`crate::models::NewStation`]
//! 3. each station is wrapped in a [`crate::models::StationMessage`]
//! 4. [`crate::messaging::StationPublisher`] sends the envelopes to the topic
//!
//! Persisting is left to the topic listener, so ingestion never touches the
//! database directly.

pub mod client;
pub mod config;
pub mod models;
pub mod normalizer;
pub mod poller;

use thiserror::Error;

pub use client::OpenChargeMapClient;
pub use config::{IngestConfig, OpenChargeMapConfig};
pub use normalizer::{normalize, NormalizeError};
pub use poller::{CycleStats, StationPoller};

/// Failures that abandon a whole fetch cycle
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to fetch stations: {0}")]
    Fetch(String),

    #[error("Failed to decode station directory response: {0}")]
    Decode(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

pub type IngestResult<T> = Result<T, IngestError>;
