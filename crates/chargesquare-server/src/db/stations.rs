//! Station storage
//!
//! [`StationRepository`] is the system of record for stations. `save` is an
//! upsert keyed by id, which is what makes redelivered messages converge to a
//! single row. Two implementations exist:
//!
//! - [`PgStationRepository`] stores rows in `charging_stations`, one
//!   transaction per save
//! - [`InMemoryStationRepository`] keeps rows in insertion order behind an
//!   `RwLock`, for tests and runs without Postgres

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;

use super::{DbError, DbResult};
use crate::models::{NewStation, Station, StationStatus};

/// Maximum length of a station name, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Maximum length of a connector type, in characters.
pub const MAX_CONNECTOR_TYPE_LEN: usize = 50;

/// Attempts at allocating a generated id before giving up.
const MAX_ID_ATTEMPTS: usize = 4;

#[async_trait]
pub trait StationRepository: Send + Sync {
    /// Insert or update a station.
    ///
    /// With an id, that row is inserted or overwritten. Without one, the store
    /// assigns a fresh id. `created_at` is set once and never changed.
    async fn save(&self, station: NewStation) -> DbResult<Station>;

    async fn find_by_id(&self, id: i64) -> DbResult<Option<Station>>;

    /// All stations in creation order.
    async fn find_all(&self) -> DbResult<Vec<Station>>;

    /// Checks that the backing store is reachable.
    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }
}

/// Enforce the column constraints before touching storage.
pub fn check_storable(station: &NewStation) -> DbResult<()> {
    if station.name.trim().is_empty() {
        return Err(DbError::invalid("name must not be blank"));
    }
    if station.name.chars().count() > MAX_NAME_LEN {
        return Err(DbError::invalid(format!(
            "name exceeds {} characters",
            MAX_NAME_LEN
        )));
    }
    if station.location.trim().is_empty() {
        return Err(DbError::invalid("location must not be blank"));
    }
    if !station.power_output.is_finite() || station.power_output < 0.0 {
        return Err(DbError::invalid(format!(
            "power output {} must be a non-negative number",
            station.power_output
        )));
    }
    if station.connector_type.trim().is_empty() {
        return Err(DbError::invalid("connector type must not be blank"));
    }
    if station.connector_type.chars().count() > MAX_CONNECTOR_TYPE_LEN {
        return Err(DbError::invalid(format!(
            "connector type exceeds {} characters",
            MAX_CONNECTOR_TYPE_LEN
        )));
    }
    Ok(())
}

// ============================================================================
// Postgres
// ============================================================================

#[derive(Debug, Clone)]
pub struct PgStationRepository {
    pool: PgPool,
}

impl PgStationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StationRow {
    id: i64,
    name: String,
    location: String,
    status: String,
    power_output: f64,
    connector_type: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StationRow> for Station {
    type Error = DbError;

    fn try_from(row: StationRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<StationStatus>()
            .map_err(|e| DbError::invalid(format!("station {}: {}", row.id, e)))?;

        Ok(Station {
            id: row.id,
            name: row.name,
            location: row.location,
            status,
            power_output: row.power_output,
            connector_type: row.connector_type,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const UPSERT_STATION: &str = r#"
    INSERT INTO charging_stations
        (id, name, location, status, power_output, connector_type, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
    ON CONFLICT (id) DO UPDATE SET
        name = EXCLUDED.name,
        location = EXCLUDED.location,
        status = EXCLUDED.status,
        power_output = EXCLUDED.power_output,
        connector_type = EXCLUDED.connector_type,
        updated_at = NOW()
    RETURNING id, name, location, status, power_output, connector_type, created_at, updated_at
"#;

const INSERT_GENERATED: &str = r#"
    INSERT INTO charging_stations
        (name, location, status, power_output, connector_type, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
    ON CONFLICT (id) DO NOTHING
    RETURNING id, name, location, status, power_output, connector_type, created_at, updated_at
"#;

// Externally supplied ids can sit ahead of the identity sequence.
const ADVANCE_ID_SEQUENCE: &str = r#"
    SELECT setval(
        pg_get_serial_sequence('charging_stations', 'id'),
        (SELECT MAX(id) FROM charging_stations)
    )
"#;

#[async_trait]
impl StationRepository for PgStationRepository {
    #[tracing::instrument(skip(self, station), fields(station_id = ?station.id))]
    async fn save(&self, station: NewStation) -> DbResult<Station> {
        check_storable(&station)?;

        let mut tx = self.pool.begin().await?;

        let row = match station.id {
            Some(id) => {
                sqlx::query_as::<_, StationRow>(UPSERT_STATION)
                    .bind(id)
                    .bind(&station.name)
                    .bind(&station.location)
                    .bind(station.status.as_str())
                    .bind(station.power_output)
                    .bind(&station.connector_type)
                    .fetch_one(&mut *tx)
                    .await?
            },
            None => {
                let mut inserted = None;
                for attempt in 1..=MAX_ID_ATTEMPTS {
                    inserted = sqlx::query_as::<_, StationRow>(INSERT_GENERATED)
                        .bind(&station.name)
                        .bind(&station.location)
                        .bind(station.status.as_str())
                        .bind(station.power_output)
                        .bind(&station.connector_type)
                        .fetch_optional(&mut *tx)
                        .await?;

                    if inserted.is_some() {
                        break;
                    }

                    tracing::debug!(attempt, "Generated station id already taken, advancing sequence");
                    sqlx::query(ADVANCE_ID_SEQUENCE).execute(&mut *tx).await?;
                }
                inserted.ok_or_else(|| {
                    DbError::IdExhausted(format!(
                        "No free station id after {} attempts",
                        MAX_ID_ATTEMPTS
                    ))
                })?
            },
        };

        tx.commit().await?;

        let saved = Station::try_from(row)?;
        tracing::debug!(station_id = saved.id, "Station saved");
        Ok(saved)
    }

    async fn find_by_id(&self, id: i64) -> DbResult<Option<Station>> {
        let row = sqlx::query_as::<_, StationRow>(
            r#"
            SELECT id, name, location, status, power_output, connector_type, created_at, updated_at
            FROM charging_stations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Station::try_from).transpose()
    }

    async fn find_all(&self) -> DbResult<Vec<Station>> {
        let rows = sqlx::query_as::<_, StationRow>(
            r#"
            SELECT id, name, location, status, power_output, connector_type, created_at, updated_at
            FROM charging_stations
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Station::try_from).collect()
    }

    async fn ping(&self) -> DbResult<()> {
        super::health_check(&self.pool).await
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryStationRepository {
    stations: RwLock<Vec<Station>>,
}

impl InMemoryStationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.stations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.stations.read().await.is_empty()
    }
}

#[async_trait]
impl StationRepository for InMemoryStationRepository {
    async fn save(&self, station: NewStation) -> DbResult<Station> {
        check_storable(&station)?;

        let mut stations = self.stations.write().await;
        let now = Utc::now();

        let id = match station.id {
            Some(id) => id,
            None => {
                let highest = stations.iter().map(|s| s.id).max().unwrap_or(0);
                highest.checked_add(1).ok_or_else(|| {
                    DbError::IdExhausted(format!("No station id above {}", highest))
                })?
            },
        };

        match stations.iter_mut().find(|s| s.id == id) {
            Some(existing) => {
                let updated = Station::from_new(id, station, Some(existing), now);
                *existing = updated.clone();
                Ok(updated)
            },
            None => {
                let created = Station::from_new(id, station, None, now);
                stations.push(created.clone());
                Ok(created)
            },
        }
    }

    async fn find_by_id(&self, id: i64) -> DbResult<Option<Station>> {
        Ok(self.stations.read().await.iter().find(|s| s.id == id).cloned())
    }

    async fn find_all(&self) -> DbResult<Vec<Station>> {
        Ok(self.stations.read().await.clone())
    }
}
