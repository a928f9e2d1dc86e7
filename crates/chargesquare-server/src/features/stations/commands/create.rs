//! Create station command
//!
//! Every field of the request body is optional at the type level so that a
//! missing field is reported as a validation error rather than a body
//! rejection.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::stations::{MAX_CONNECTOR_TYPE_LEN, MAX_NAME_LEN};
use crate::db::{DbError, StationRepository};
use crate::features::shared::validation::{
    require, validate_positive, validate_text, FieldValidationError,
};
use crate::models::{NewStation, Station, StationStatus};

/// Command to create (or overwrite, when `id` is given) a station
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStationCommand {
    /// Externally supplied id; assigned by the store when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: Option<StationStatus>,
    #[serde(default)]
    pub power_output: Option<f64>,
    #[serde(default)]
    pub connector_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateStationError {
    #[error("{0}")]
    Validation(#[from] FieldValidationError),

    #[error("id must be a positive number")]
    InvalidId,

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl CreateStationCommand {
    /// Validates the command and produces the station to store
    ///
    /// # Errors
    ///
    /// - name is missing, blank or longer than 100 characters
    /// - location is missing or blank
    /// - status is missing
    /// - powerOutput is missing or not greater than 0
    /// - connectorType is missing, blank or longer than 50 characters
    #[tracing::instrument(skip(self), fields(station_id = ?self.id))]
    pub fn validate(self) -> Result<NewStation, CreateStationError> {
        if matches!(self.id, Some(id) if id <= 0) {
            return Err(CreateStationError::InvalidId);
        }

        validate_text(self.name.as_deref(), "name", Some(MAX_NAME_LEN))?;
        validate_text(self.location.as_deref(), "location", None)?;
        let status = require(self.status, "status")?;
        let power_output = validate_positive(self.power_output, "powerOutput")?;
        validate_text(
            self.connector_type.as_deref(),
            "connectorType",
            Some(MAX_CONNECTOR_TYPE_LEN),
        )?;

        tracing::debug!("Command validation passed");

        Ok(NewStation {
            id: self.id,
            name: self.name.unwrap_or_default(),
            location: self.location.unwrap_or_default(),
            status,
            power_output,
            connector_type: self.connector_type.unwrap_or_default(),
        })
    }
}

#[tracing::instrument(skip(repository, command))]
pub async fn handle(
    repository: Arc<dyn StationRepository>,
    command: CreateStationCommand,
) -> Result<Station, CreateStationError> {
    let station = command.validate()?;
    let saved = repository.save(station).await?;

    tracing::info!(station_id = saved.id, name = %saved.name, "Station created");

    Ok(saved)
}
