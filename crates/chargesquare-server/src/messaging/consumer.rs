//! Applies station messages to the store

use std::sync::Arc;
use thiserror::Error;

use crate::db::{DbError, StationRepository};
use crate::models::{Operation, Station, StationMessage};

#[derive(Error, Debug)]
pub enum ConsumeError {
    #[error("Undecodable station message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Operation {0} is not supported by the station consumer")]
    UnsupportedOperation(Operation),

    #[error("Failed to persist station: {0}")]
    Persist(#[from] DbError),
}

impl ConsumeError {
    /// Whether delivering the same message again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConsumeError::Decode(_) | ConsumeError::UnsupportedOperation(_) => false,
            ConsumeError::Persist(DbError::Invalid(_)) => false,
            ConsumeError::Persist(_) => true,
        }
    }
}

#[derive(Clone)]
pub struct StationMessageHandler {
    repository: Arc<dyn StationRepository>,
}

impl StationMessageHandler {
    pub fn new(repository: Arc<dyn StationRepository>) -> Self {
        Self { repository }
    }

    pub fn decode(value: &[u8]) -> Result<StationMessage, ConsumeError> {
        Ok(serde_json::from_slice(value)?)
    }

    /// Persist the message payload.
    ///
    /// Errors are returned to the caller unchanged; redelivery is up to the
    /// listener.
    #[tracing::instrument(
        skip(self, message),
        fields(message_id = %message.message_id, station_id = ?message.payload.id)
    )]
    pub async fn handle(&self, message: StationMessage) -> Result<Station, ConsumeError> {
        match message.operation {
            Operation::Create | Operation::Update => {},
            other => return Err(ConsumeError::UnsupportedOperation(other)),
        }

        let station = self.repository.save(message.payload).await?;

        tracing::info!(
            station_id = station.id,
            source = %message.source,
            "Station persisted from message"
        );

        Ok(station)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStationRepository;
    use crate::models::{NewStation, StationStatus};

    fn message(id: i64, name: &str) -> StationMessage {
        StationMessage::new(NewStation {
            id: Some(id),
            name: name.to_string(),
            location: "Main St".to_string(),
            status: StationStatus::Available,
            power_output: 22.0,
            connector_type: "Type2".to_string(),
        })
    }

    #[tokio::test]
    async fn test_redelivery_converges_to_one_row() {
        let repo = Arc::new(InMemoryStationRepository::new());
        let handler = StationMessageHandler::new(repo.clone());

        let first = message(42, "Downtown");
        handler.handle(first.clone()).await.unwrap();
        handler.handle(first).await.unwrap();
        handler.handle(message(42, "Downtown Hub")).await.unwrap();

        let all = repo.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Downtown Hub");
    }

    #[tokio::test]
    async fn test_delete_is_rejected_without_retry() {
        let repo = Arc::new(InMemoryStationRepository::new());
        let handler = StationMessageHandler::new(repo.clone());

        let mut delete = message(42, "Downtown");
        delete.operation = Operation::Delete;

        let err = handler.handle(delete).await.unwrap_err();
        assert!(matches!(err, ConsumeError::UnsupportedOperation(Operation::Delete)));
        assert!(!err.is_retryable());
        assert!(repo.is_empty().await);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = StationMessageHandler::decode(b"not json").unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retry_classification() {
        assert!(!ConsumeError::Persist(DbError::invalid("bad")).is_retryable());
        assert!(ConsumeError::Persist(DbError::IdExhausted("full".to_string())).is_retryable());
        assert!(ConsumeError::Persist(DbError::Sqlx(sqlx::Error::PoolTimedOut)).is_retryable());
    }
}
