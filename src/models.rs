//! Data models.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::TrackerError;
use crate::geo::Coordinate;

/// Maximum accepted length of a vessel identifier
const MAX_VESSEL_ID_LEN: usize = 64;

/// Vessel identifier
///
/// Opaque, non-empty string of at most 64 characters without whitespace or
/// MQTT topic separators, so it can be embedded in a topic level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VesselId(String);

impl TryFrom<&str> for VesselId {
    type Error = TrackerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let valid = !value.is_empty()
            && value.len() <= MAX_VESSEL_ID_LEN
            && !value
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '/' | '+' | '#'));
        if !valid {
            return Err(TrackerError::InvalidVesselId(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}

impl TryFrom<String> for VesselId {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<VesselId> for String {
    fn from(id: VesselId) -> Self {
        id.0
    }
}

impl VesselId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VesselId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Weather descriptor attached to a vessel position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Weather {
    Sunny,
    Cloudy,
    Rainy,
    Stormy,
    Foggy,
    Snowy,
    /// Lookup failed, timed out or was never attempted
    #[default]
    Unknown,
}

impl Weather {
    pub fn as_str(&self) -> &'static str {
        match self {
            Weather::Sunny => "Sunny",
            Weather::Cloudy => "Cloudy",
            Weather::Rainy => "Rainy",
            Weather::Stormy => "Stormy",
            Weather::Foggy => "Foggy",
            Weather::Snowy => "Snowy",
            Weather::Unknown => "Unknown",
        }
    }

    /// Parse a stored descriptor; anything unrecognised is `Unknown`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "sunny" | "clear" => Weather::Sunny,
            "cloudy" => Weather::Cloudy,
            "rainy" => Weather::Rainy,
            "stormy" => Weather::Stormy,
            "foggy" => Weather::Foggy,
            "snowy" => Weather::Snowy,
            _ => Weather::Unknown,
        }
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position report as sent by a reporting agent
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionReport {
    pub vessel_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Reporter timestamp in seconds from Unix epoch, receipt time if absent.
    /// Must not be ahead of the receipt time by more than the allowed skew.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Validated position sample, consumed once by the tracker
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSample {
    pub vessel_id: VesselId,
    pub position: Coordinate,
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    pub fn new(vessel_id: VesselId, position: Coordinate, timestamp: DateTime<Utc>) -> Self {
        Self {
            vessel_id,
            position,
            timestamp,
        }
    }

    /// Validate a raw report, stamping it with `received_at` when it carries
    /// no timestamp of its own.
    ///
    /// A reporter timestamp before the Unix epoch, or more than `max_skew`
    /// ahead of `received_at`, fails with `InvalidTimestamp`. Accepting it
    /// would fence out every later sample of the vessel.
    pub fn from_report(
        report: PositionReport,
        received_at: DateTime<Utc>,
        max_skew: Duration,
    ) -> Result<Self, TrackerError> {
        let vessel_id = VesselId::try_from(report.vessel_id)?;
        let position = Coordinate::new(report.latitude, report.longitude)?;
        let timestamp = match report.timestamp {
            Some(ts) if ts.timestamp() < 0 || ts - received_at > max_skew => {
                return Err(TrackerError::InvalidTimestamp(ts));
            }
            Some(ts) => ts,
            None => received_at,
        };
        Ok(Self {
            vessel_id,
            position,
            timestamp,
        })
    }
}

/// Persisted tracking state of a vessel on a voyage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VesselState {
    pub id: VesselId,
    pub name: Option<String>,
    pub location: Coordinate,
    /// Free-text label of the sea area the vessel is in
    pub region: String,
    /// Speed in knots
    pub speed: f64,
    pub weather: Weather,
    /// Voyage progress in percent, 0 - 100
    pub progress: f64,
    pub source: Coordinate,
    pub destination: Coordinate,
    pub departed_at: DateTime<Utc>,
    /// None while the vessel is stationary or no estimate exists yet
    pub estimated_arrival: Option<DateTime<Utc>>,
    /// Timestamp of the last applied position sample, used for ordering
    pub last_sample_at: Option<DateTime<Utc>>,
}

impl VesselState {
    /// State of a vessel that has just left `source`
    pub fn departing(
        id: VesselId,
        source: Coordinate,
        destination: Coordinate,
        departed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: None,
            location: source,
            region: String::new(),
            speed: 0.0,
            weather: Weather::Unknown,
            progress: 0.0,
            source,
            destination,
            departed_at,
            estimated_arrival: None,
            last_sample_at: None,
        }
    }

    /// Time of the most recent known position
    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_sample_at.unwrap_or(self.departed_at)
    }

    /// Apply tracking fields in place
    pub fn apply(&mut self, update: &VesselUpdate) {
        self.location = update.location;
        self.region = update.region.clone();
        self.speed = update.speed;
        self.weather = update.weather;
        self.progress = update.progress;
        self.estimated_arrival = update.estimated_arrival;
        self.last_sample_at = Some(update.sample_time);
    }
}

/// Tracking fields derived from one position sample, written atomically
#[derive(Debug, Clone, PartialEq)]
pub struct VesselUpdate {
    pub location: Coordinate,
    pub region: String,
    pub speed: f64,
    pub weather: Weather,
    pub progress: f64,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub sample_time: DateTime<Utc>,
}

/// Enriched position published to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionBroadcast {
    pub vessel_id: VesselId,
    pub latitude: f64,
    pub longitude: f64,
    pub region: String,
    pub speed: f64,
    pub weather_status: Weather,
    pub progress: f64,
    pub estimated_arrival: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
}

impl PositionBroadcast {
    pub fn new(vessel_id: VesselId, update: &VesselUpdate) -> Self {
        Self {
            vessel_id,
            latitude: update.location.latitude(),
            longitude: update.location.longitude(),
            region: update.region.clone(),
            speed: update.speed,
            weather_status: update.weather,
            progress: update.progress,
            estimated_arrival: update.estimated_arrival,
            timestamp: update.sample_time,
        }
    }
}

/// Rejection notice returned to the sender of a sample
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRejection {
    pub vessel_id: String,
    pub error: String,
    /// Whether resending the same sample may succeed
    pub retryable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skew() -> Duration {
        Duration::seconds(30)
    }

    #[test]
    fn parse_position_report() {
        let s = r#"{
            "vesselId": "ship-42",
            "latitude": 22.3072,
            "longitude": 73.1812,
            "timestamp": 1734361116
        }"#;
        let report: PositionReport = serde_json::from_str(s).unwrap();
        let received = DateTime::from_timestamp(1734361200, 0).unwrap();
        let sample = PositionSample::from_report(report, received, skew()).unwrap();

        assert_eq!(sample.vessel_id.as_str(), "ship-42");
        assert_eq!(sample.position, Coordinate::new(22.3072, 73.1812).unwrap());
        assert_eq!(
            sample.timestamp,
            DateTime::from_timestamp(1734361116, 0).unwrap()
        );
    }

    #[test]
    fn report_without_timestamp_uses_receipt_time() {
        let s = r#"{"vesselId":"ship-42","latitude":1.0,"longitude":2.0}"#;
        let report: PositionReport = serde_json::from_str(s).unwrap();
        let received = DateTime::from_timestamp(1734361200, 0).unwrap();
        let sample = PositionSample::from_report(report, received, skew()).unwrap();

        assert_eq!(sample.timestamp, received);
    }

    #[test]
    fn report_with_invalid_coordinate_is_rejected() {
        let s = r#"{"vesselId":"ship-42","latitude":123.0,"longitude":2.0}"#;
        let report: PositionReport = serde_json::from_str(s).unwrap();
        let result = PositionSample::from_report(report, Utc::now(), skew());

        assert!(matches!(
            result,
            Err(TrackerError::InvalidCoordinate { latitude, .. }) if latitude == 123.0
        ));
    }

    #[test]
    fn report_from_the_future_is_rejected() {
        let received = DateTime::from_timestamp(1734361200, 0).unwrap();
        let report = |timestamp: i64| PositionReport {
            vessel_id: "ship-42".to_string(),
            latitude: 1.0,
            longitude: 2.0,
            timestamp: DateTime::from_timestamp(timestamp, 0),
        };

        // Year 2100
        assert!(matches!(
            PositionSample::from_report(report(4102444800), received, skew()),
            Err(TrackerError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            PositionSample::from_report(report(-60), received, skew()),
            Err(TrackerError::InvalidTimestamp(_))
        ));

        // Small clock drift is tolerated
        let sample = PositionSample::from_report(report(1734361220), received, skew()).unwrap();
        assert_eq!(sample.timestamp, received + Duration::seconds(20));
    }

    #[test]
    fn vessel_id_validation() {
        assert!(VesselId::try_from("65f1c0a9e4b0").is_ok());
        assert!(VesselId::try_from("").is_err());
        assert!(VesselId::try_from("a/b").is_err());
        assert!(VesselId::try_from("a b").is_err());
        assert!(VesselId::try_from("#").is_err());
        assert!(VesselId::try_from("x".repeat(65).as_str()).is_err());
    }

    #[test]
    fn broadcast_serializes_camel_case() {
        let update = VesselUpdate {
            location: Coordinate::new(12.5, 45.0).unwrap(),
            region: "Gulf of Aden".to_string(),
            speed: 14.2,
            weather: Weather::Cloudy,
            progress: 37.5,
            estimated_arrival: None,
            sample_time: DateTime::from_timestamp(1734361116, 0).unwrap(),
        };
        let broadcast = PositionBroadcast::new(VesselId::try_from("ship-42").unwrap(), &update);
        let json = serde_json::to_value(&broadcast).unwrap();

        assert_eq!(json["vesselId"], "ship-42");
        assert_eq!(json["latitude"], 12.5);
        assert_eq!(json["region"], "Gulf of Aden");
        assert_eq!(json["weatherStatus"], "Cloudy");
        assert_eq!(json["timestamp"], 1734361116);
        assert!(json["estimatedArrival"].is_null());
    }

    #[test]
    fn weather_parse_round_trips_display() {
        for weather in [
            Weather::Sunny,
            Weather::Cloudy,
            Weather::Rainy,
            Weather::Stormy,
            Weather::Foggy,
            Weather::Snowy,
            Weather::Unknown,
        ] {
            assert_eq!(Weather::parse(&weather.to_string()), weather);
        }
        assert_eq!(Weather::parse("hail"), Weather::Unknown);
    }
}
