use chrono::{DateTime, Utc};

use crate::{
    errors::TrackerError,
    geo::Coordinate,
    models::{VesselId, VesselState, Weather},
};

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct VesselRow {
    id: String,
    name: Option<String>,
    latitude: f64,
    longitude: f64,
    region: String,
    speed: f64,
    weather: String, // Stored as descriptor text
    progress: f64,
    source_latitude: f64,
    source_longitude: f64,
    destination_latitude: f64,
    destination_longitude: f64,
    departed_at: DateTime<Utc>,
    estimated_arrival: Option<DateTime<Utc>>,
    last_sample_at: Option<DateTime<Utc>>,
}

impl TryFrom<VesselRow> for VesselState {
    type Error = TrackerError;

    fn try_from(row: VesselRow) -> Result<Self, Self::Error> {
        Ok(VesselState {
            id: VesselId::try_from(row.id)?,
            name: row.name,
            location: Coordinate::new(row.latitude, row.longitude)?,
            region: row.region,
            speed: row.speed.max(0.0),
            weather: Weather::parse(&row.weather),
            progress: row.progress.clamp(0.0, 100.0),
            source: Coordinate::new(row.source_latitude, row.source_longitude)?,
            destination: Coordinate::new(row.destination_latitude, row.destination_longitude)?,
            departed_at: row.departed_at,
            estimated_arrival: row.estimated_arrival,
            last_sample_at: row.last_sample_at,
        })
    }
}
