//! ChargeSquare Server Library
//!
//! Collects EV charging station records from Open Charge Map and serves them
//! over HTTP.
//!
//! # Overview
//!
//! - **Ingestion**: a ticker fetches one page of points of interest per
//!   interval, normalizes each record and publishes it as a
//!   [`models::StationMessage`]
//! - **Messaging**: a three-partition topic (Kafka through `rskafka`, or an
//!   in-memory topic) keyed by message id
//! - **Consumption**: a listener upserts every received station and commits
//!   offsets only after the write succeeds
//! - **API Endpoints**: `GET /stations`, `GET /stations/:id`, `POST /stations`
//!   and `/health`
//!
//! # Architecture
//!
//! The HTTP side follows a **CQRS (Command Query Responsibility Segregation)**
//! layout under [`features`]:
//!
//! - **Commands** (Write Operations): `POST /stations` validates and stores a
//!   station
//! - **Queries** (Read Operations): station lookup and listing
//!
//! ## Framework Stack
//!
//! - **Axum**: HTTP routing and extractors
//! - **SQLx**: Postgres access with embedded migrations
//! - **rskafka**: pure-Rust Kafka client
//! - **Tower**: Middleware and service abstractions
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chargesquare_server::{api, db::InMemoryStationRepository};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let state = api::AppState {
//!         stations: Arc::new(InMemoryStationRepository::new()),
//!     };
//!     let app = api::create_router(state);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod messaging;
pub mod middleware;
pub mod models;

// Re-export commonly used types
pub use error::{ApiResult, AppError};
