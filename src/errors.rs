//! Errors for the vessel tracker
use thiserror::Error;

use crate::models::VesselId;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("Elapsed time between samples must be positive")]
    NonPositiveElapsedTime,

    #[error("Cannot estimate arrival with speed {0}")]
    DivisionByZeroSpeed(f64),

    #[error("Vessel not found: {0}")]
    VesselNotFound(VesselId),

    #[error("Stale sample for vessel {0}")]
    StaleSample(VesselId),

    #[error("Sample timestamp {0} is before the epoch or ahead of receipt time")]
    InvalidTimestamp(chrono::DateTime<chrono::Utc>),

    #[error("Sample queue for vessel {0} is full")]
    QueueFull(VesselId),

    #[error("Invalid vessel id: {0:?}")]
    InvalidVesselId(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Weather lookup failed: {0}")]
    WeatherLookupFailure(String),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("MQTT client error")]
    MqttClientError(#[from] rumqttc::ClientError),

    #[error("Serialization error")]
    SerdeError(#[from] serde_json::Error),

    #[error("Configuration error")]
    ConfigError(#[from] config::ConfigError),

    #[error("Database migration error")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("HTTP error")]
    HttpError(#[from] reqwest::Error),
}

impl TrackerError {
    /// Whether the same sample may succeed when retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TrackerError::PersistenceFailure(_)
                | TrackerError::QueueFull(_)
                | TrackerError::DatabaseError(_)
                | TrackerError::WeatherLookupFailure(_)
                | TrackerError::HttpError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_failures_are_transient() {
        assert!(TrackerError::PersistenceFailure("timeout".to_string()).is_transient());
        assert!(TrackerError::QueueFull(VesselId::try_from("v-1").unwrap()).is_transient());
        assert!(!TrackerError::NonPositiveElapsedTime.is_transient());
        assert!(!TrackerError::VesselNotFound(VesselId::try_from("v-1").unwrap()).is_transient());
    }
}
