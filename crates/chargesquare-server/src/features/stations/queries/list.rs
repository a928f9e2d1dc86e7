use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{DbError, StationRepository};
use crate::models::Station;

/// Lists every station in creation order; there is no pagination
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListStationsQuery {}

#[derive(Debug, thiserror::Error)]
pub enum ListStationsError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

#[tracing::instrument(skip(repository))]
pub async fn handle(
    repository: Arc<dyn StationRepository>,
    _query: ListStationsQuery,
) -> Result<Vec<Station>, ListStationsError> {
    let stations = repository.find_all().await?;
    tracing::debug!(count = stations.len(), "Listed stations");
    Ok(stations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStationRepository;
    use crate::models::{NewStation, StationStatus};

    #[tokio::test]
    async fn test_list_empty() {
        let repo = Arc::new(InMemoryStationRepository::new());
        let stations = handle(repo, ListStationsQuery::default()).await.unwrap();
        assert!(stations.is_empty());
    }

    #[tokio::test]
    async fn test_list_in_creation_order() {
        let repo = Arc::new(InMemoryStationRepository::new());
        for (id, name) in [(5, "Five"), (2, "Two")] {
            repo.save(NewStation {
                id: Some(id),
                name: name.to_string(),
                location: "Somewhere".to_string(),
                status: StationStatus::Maintenance,
                power_output: 0.0,
                connector_type: "Unknown".to_string(),
            })
            .await
            .unwrap();
        }

        let stations = handle(repo, ListStationsQuery::default()).await.unwrap();
        let names: Vec<&str> = stations.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Five", "Two"]);
    }
}
