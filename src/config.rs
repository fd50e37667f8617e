//! Application configuration

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;

use crate::errors::TrackerError;

const ENV_PREFIX: &str = "PORTLINK";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub mqtt: MqttConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    pub client_id: String,
    /// Connect over secure websockets instead of plain TCP
    #[serde(default)]
    pub websocket: bool,
    /// Topic filter on which reporting agents publish position samples
    #[serde(default = "default_sample_topic")]
    pub sample_topic: String,
    /// Enriched positions go to `<prefix>/<vessel id>/location-broadcast`
    #[serde(default = "default_broadcast_prefix")]
    pub broadcast_prefix: String,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_keep_alive")]
    pub keep_alive: Duration,
    /// How far ahead of receipt a reporter timestamp may be
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_max_clock_skew")]
    pub max_clock_skew: Duration,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherBackend {
    #[default]
    Mock,
    OpenMeteo,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    #[serde(default)]
    pub backend: WeatherBackend,
    #[serde(default = "default_weather_url")]
    pub base_url: String,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_weather_timeout")]
    pub timeout: Duration,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct TrackerConfig {
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_persist_timeout")]
    pub persist_timeout: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_weather_timeout")]
    pub weather_timeout: Duration,
    /// Per-observer buffer; slower observers skip samples
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    /// How long a per-vessel worker waits for samples before exiting
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_idle_worker_timeout")]
    pub idle_worker_timeout: Duration,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_sample_topic() -> String {
    "portlink/position-update".to_string()
}

fn default_broadcast_prefix() -> String {
    "portlink/vessels".to_string()
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(5)
}

fn default_max_clock_skew() -> Duration {
    Duration::from_secs(30)
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_weather_url() -> String {
    "https://api.open-meteo.com".to_string()
}

fn default_weather_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_persist_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_broadcast_capacity() -> usize {
    64
}

fn default_idle_worker_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            backend: WeatherBackend::default(),
            base_url: default_weather_url(),
            timeout: default_weather_timeout(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            persist_timeout: default_persist_timeout(),
            weather_timeout: default_weather_timeout(),
            broadcast_capacity: default_broadcast_capacity(),
            idle_worker_timeout: default_idle_worker_timeout(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config/default", ENV_PREFIX)
    }

    /// Load from an optional config file, overridden by `<prefix>__SECTION__KEY`
    /// environment variables
    pub fn load_from(file: &str, env_prefix: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<(), TrackerError> {
        self.mqtt.validate()?;
        self.database.validate()?;
        self.weather.validate()?;
        self.tracker.validate()?;
        Ok(())
    }
}

fn invalid(message: &str) -> TrackerError {
    TrackerError::ConfigurationError {
        message: message.to_string(),
    }
}

impl MqttConfig {
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.host.trim().is_empty() {
            return Err(invalid("MQTT host cannot be empty"));
        }
        if self.client_id.trim().is_empty() {
            return Err(invalid("MQTT client id cannot be empty"));
        }
        if self.sample_topic.trim().is_empty() {
            return Err(invalid("Sample topic cannot be empty"));
        }
        if self.broadcast_prefix.trim().is_empty()
            || self.broadcast_prefix.contains(|c: char| c == '+' || c == '#')
        {
            return Err(invalid(
                "Broadcast prefix must be a non-empty topic without wildcards",
            ));
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), TrackerError> {
        if !(self.url.starts_with("postgres://") || self.url.starts_with("postgresql://")) {
            return Err(invalid("Database URL must be a postgres:// URL"));
        }
        if self.max_connections == 0 {
            return Err(invalid("Database pool needs at least one connection"));
        }
        if self.connect_timeout.is_zero() {
            return Err(invalid("Database connect timeout must be greater than zero"));
        }
        Ok(())
    }
}

impl WeatherConfig {
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.backend == WeatherBackend::OpenMeteo && self.base_url.trim().is_empty() {
            return Err(invalid("Weather base URL cannot be empty"));
        }
        if self.timeout.is_zero() {
            return Err(invalid("Weather timeout must be greater than zero"));
        }
        Ok(())
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.persist_timeout.is_zero() || self.weather_timeout.is_zero() {
            return Err(invalid("Tracker timeouts must be greater than zero"));
        }
        if self.broadcast_capacity == 0 {
            return Err(invalid("Broadcast capacity must be greater than zero"));
        }
        if self.idle_worker_timeout.is_zero() {
            return Err(invalid("Idle worker timeout must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Write;

    #[test]
    fn test_load_config_from_env() {
        env::set_var("PLTEST1__MQTT__HOST", "localhost");
        env::set_var("PLTEST1__MQTT__PORT", "1884");
        env::set_var("PLTEST1__MQTT__CLIENT_ID", "test_client");
        env::set_var("PLTEST1__DATABASE__URL", "postgres://localhost/portlink");
        env::set_var("PLTEST1__TRACKER__PERSIST_TIMEOUT", "2");
        env::set_var("PLTEST1__WEATHER__BACKEND", "open_meteo");

        let config = AppConfig::load_from("does/not/exist", "PLTEST1").unwrap();
        assert_eq!(config.mqtt.host, "localhost");
        assert_eq!(config.mqtt.port, 1884);
        assert_eq!(config.mqtt.client_id, "test_client");
        assert!(!config.mqtt.websocket);
        assert_eq!(config.mqtt.sample_topic, "portlink/position-update");
        assert_eq!(config.mqtt.max_clock_skew, Duration::from_secs(30));
        assert_eq!(config.database.url, "postgres://localhost/portlink");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.tracker.persist_timeout, Duration::from_secs(2));
        assert_eq!(config.tracker.weather_timeout, Duration::from_secs(3));
        assert_eq!(config.weather.backend, WeatherBackend::OpenMeteo);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portlink.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[mqtt]
host = "broker.example.com"
client_id = "tracker-1"
websocket = true
broadcast_prefix = "fleet"

[database]
url = "postgresql://db/portlink"
max_connections = 8
"#
        )
        .unwrap();

        let config = AppConfig::load_from(path.to_str().unwrap(), "PLTEST2").unwrap();
        assert_eq!(config.mqtt.host, "broker.example.com");
        assert!(config.mqtt.websocket);
        assert_eq!(config.mqtt.broadcast_prefix, "fleet");
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.weather.backend, WeatherBackend::Mock);
        assert_eq!(config.tracker.broadcast_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_required_section() {
        env::set_var("PLTEST3__MQTT__HOST", "localhost");
        env::set_var("PLTEST3__MQTT__CLIENT_ID", "test_client");

        assert!(AppConfig::load_from("does/not/exist", "PLTEST3").is_err());
    }

    #[test]
    fn test_database_config_validate() {
        let mut config = DatabaseConfig {
            url: "postgres://localhost/portlink".to_string(),
            max_connections: 5,
            connect_timeout: Duration::from_secs(10),
        };
        assert!(config.validate().is_ok());

        config.url = "sqlite://portlink.db".to_string();
        assert!(config.validate().is_err());

        config.url = "postgres://localhost/portlink".to_string();
        config.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mqtt_config_rejects_wildcard_prefix() {
        let config = MqttConfig {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "test_client".to_string(),
            websocket: false,
            sample_topic: default_sample_topic(),
            broadcast_prefix: "fleet/#".to_string(),
            keep_alive: default_keep_alive(),
            max_clock_skew: default_max_clock_skew(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tracker_config_validate() {
        assert!(TrackerConfig::default().validate().is_ok());

        let config = TrackerConfig {
            weather_timeout: Duration::ZERO,
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TrackerConfig {
            broadcast_capacity: 0,
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
