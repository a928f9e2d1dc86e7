//! ChargeSquare Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared plumbing for the ChargeSquare workspace members.
//!
//! - **Error Handling**: [`CommonError`] and the crate-wide [`Result`] alias
//! - **Logging**: tracing subscriber setup driven by `LOG_*` environment variables
//! - **Environment**: small helpers for reading typed settings from the environment
//!
//! # Example
//!
//! ```no_run
//! use chargesquare_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("station service starting");
//!     Ok(())
//! }
//! ```

pub mod env;
pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
