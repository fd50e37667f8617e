//! PostgreSQL vessel store

mod models;

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use tracing::{debug, info};

use crate::{
    config::DatabaseConfig,
    errors::TrackerError,
    models::{VesselId, VesselState, VesselUpdate},
    store::{VesselStore, WriteOutcome},
};

use models::VesselRow;

const SELECT_VESSEL: &str = "SELECT id, name, latitude, longitude, region, speed, weather,
        progress, source_latitude, source_longitude, destination_latitude,
        destination_longitude, departed_at, estimated_arrival, last_sample_at
    FROM vessels WHERE id = $1";

#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Postgres>,
}

impl Database {
    /// Wrap an existing pool, running migrations
    pub async fn new(pool: Pool<Postgres>) -> Result<Self, TrackerError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, TrackerError> {
        info!(
            "Connecting to database, max_connections={}",
            config.max_connections
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.url)
            .await?;

        Self::new(pool).await
    }

    /// Register a vessel at the start of its voyage
    pub async fn insert_vessel(&self, state: &VesselState) -> Result<(), TrackerError> {
        sqlx::query(
            "INSERT INTO vessels (
                id, name, latitude, longitude, region, speed, weather, progress,
                source_latitude, source_longitude, destination_latitude,
                destination_longitude, departed_at, estimated_arrival, last_sample_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(state.id.as_str())
        .bind(&state.name)
        .bind(state.location.latitude())
        .bind(state.location.longitude())
        .bind(&state.region)
        .bind(state.speed)
        .bind(state.weather.as_str())
        .bind(state.progress)
        .bind(state.source.latitude())
        .bind(state.source.longitude())
        .bind(state.destination.latitude())
        .bind(state.destination.longitude())
        .bind(state.departed_at)
        .bind(state.estimated_arrival)
        .bind(state.last_sample_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn exists(&self, id: &VesselId) -> Result<bool, TrackerError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM vessels WHERE id = $1)")
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

impl VesselStore for Database {
    async fn get(&self, id: &VesselId) -> Result<Option<VesselState>, TrackerError> {
        let row: Option<VesselRow> = sqlx::query_as(SELECT_VESSEL)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(VesselState::try_from).transpose()
    }

    /// Single conditional UPDATE, so the fence holds across processes
    async fn update_position(
        &self,
        id: &VesselId,
        update: &VesselUpdate,
    ) -> Result<WriteOutcome, TrackerError> {
        let result = sqlx::query(
            "UPDATE vessels SET
                latitude = $2,
                longitude = $3,
                region = $4,
                speed = $5,
                weather = $6,
                progress = $7,
                estimated_arrival = $8,
                last_sample_at = $9,
                updated_at = now()
            WHERE id = $1 AND (last_sample_at IS NULL OR last_sample_at < $9)",
        )
        .bind(id.as_str())
        .bind(update.location.latitude())
        .bind(update.location.longitude())
        .bind(&update.region)
        .bind(update.speed)
        .bind(update.weather.as_str())
        .bind(update.progress)
        .bind(update.estimated_arrival)
        .bind(update.sample_time)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(WriteOutcome::Applied);
        }

        let outcome = if self.exists(id).await? {
            WriteOutcome::Stale
        } else {
            WriteOutcome::Missing
        };
        debug!("Position for {} not applied: {:?}", id, outcome);
        Ok(outcome)
    }
}
