use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{DbError, StationRepository};
use crate::models::Station;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetStationQuery {
    pub id: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum GetStationError {
    #[error("Station {0} not found")]
    NotFound(i64),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

#[tracing::instrument(skip(repository))]
pub async fn handle(
    repository: Arc<dyn StationRepository>,
    query: GetStationQuery,
) -> Result<Station, GetStationError> {
    repository
        .find_by_id(query.id)
        .await?
        .ok_or(GetStationError::NotFound(query.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStationRepository;
    use crate::models::{NewStation, StationStatus};

    #[tokio::test]
    async fn test_get_existing() {
        let repo = Arc::new(InMemoryStationRepository::new());
        let saved = repo
            .save(NewStation {
                id: Some(7),
                name: "Harbour".to_string(),
                location: "Pier 4".to_string(),
                status: StationStatus::Available,
                power_output: 50.0,
                connector_type: "CCS".to_string(),
            })
            .await
            .unwrap();

        let found = handle(repo, GetStationQuery { id: 7 }).await.unwrap();
        assert_eq!(found, saved);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let repo = Arc::new(InMemoryStationRepository::new());
        let err = handle(repo, GetStationQuery { id: 999 }).await.unwrap_err();
        assert!(matches!(err, GetStationError::NotFound(999)));
    }
}
