//! Weather annotation for vessel positions.
//!
//! Lookups are best-effort. The tracker treats any error from a
//! [`WeatherService`] as [`Weather::Unknown`].

use std::future::Future;
use std::time::Duration;

use rand::seq::IndexedRandom;
use serde::Deserialize;
use tracing::debug;

use crate::{
    config::{WeatherBackend, WeatherConfig},
    errors::TrackerError,
    geo::Coordinate,
    models::Weather,
};

/// Source of weather descriptors for a position
pub trait WeatherService: Send + Sync {
    fn current_weather(
        &self,
        position: Coordinate,
    ) -> impl Future<Output = Result<Weather, TrackerError>> + Send;
}

/// Random weather from a fixed set, for demos and development
#[derive(Debug, Clone, Default)]
pub struct MockWeather;

const MOCK_CHOICES: [Weather; 4] = [
    Weather::Sunny,
    Weather::Cloudy,
    Weather::Rainy,
    Weather::Stormy,
];

impl WeatherService for MockWeather {
    async fn current_weather(&self, _position: Coordinate) -> Result<Weather, TrackerError> {
        Ok(MOCK_CHOICES
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or_default())
    }
}

/// Current conditions from an Open-Meteo compatible forecast API
#[derive(Debug, Clone)]
pub struct HttpWeather {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    weather_code: u8,
}

impl HttpWeather {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TrackerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl WeatherService for HttpWeather {
    async fn current_weather(&self, position: Coordinate) -> Result<Weather, TrackerError> {
        let url = format!("{}/v1/forecast", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", position.latitude().to_string()),
                ("longitude", position.longitude().to_string()),
                ("current", "weather_code".to_string()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| TrackerError::WeatherLookupFailure(e.to_string()))?;

        let forecast: ForecastResponse = response
            .json()
            .await
            .map_err(|e| TrackerError::WeatherLookupFailure(e.to_string()))?;

        debug!(
            "Weather code {} at {:?}",
            forecast.current.weather_code, position
        );
        Ok(from_wmo_code(forecast.current.weather_code))
    }
}

/// Map a WMO weather interpretation code to a descriptor
pub fn from_wmo_code(code: u8) -> Weather {
    match code {
        0 | 1 => Weather::Sunny,
        2 | 3 => Weather::Cloudy,
        45 | 48 => Weather::Foggy,
        51..=67 | 80..=82 => Weather::Rainy,
        71..=77 | 85 | 86 => Weather::Snowy,
        95..=99 => Weather::Stormy,
        _ => Weather::Unknown,
    }
}

/// Weather backend selected by configuration
#[derive(Debug, Clone)]
pub enum ConfiguredWeather {
    Mock(MockWeather),
    Http(HttpWeather),
}

impl ConfiguredWeather {
    pub fn from_config(config: &WeatherConfig) -> Result<Self, TrackerError> {
        match config.backend {
            WeatherBackend::Mock => Ok(Self::Mock(MockWeather)),
            WeatherBackend::OpenMeteo => Ok(Self::Http(HttpWeather::new(
                &config.base_url,
                config.timeout,
            )?)),
        }
    }
}

impl WeatherService for ConfiguredWeather {
    async fn current_weather(&self, position: Coordinate) -> Result<Weather, TrackerError> {
        match self {
            Self::Mock(mock) => mock.current_weather(position).await,
            Self::Http(http) => http.current_weather(position).await,
        }
    }
}
