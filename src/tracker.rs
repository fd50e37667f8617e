//! Location update handling.
//!
//! [`Tracker::handle_sample`] turns one position sample into an enriched,
//! persisted and broadcast vessel position. Samples for the same vessel are
//! serialized by a per-vessel lock and fenced on the sample timestamp, so a
//! late-arriving older sample can never overwrite newer state. Samples for
//! different vessels proceed concurrently.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    broadcast::ObserverHub,
    config::TrackerConfig,
    errors::TrackerError,
    geo::{distance, Coordinate},
    models::{PositionBroadcast, PositionSample, VesselId, VesselUpdate, Weather},
    region::RegionLookup,
    store::{VesselStore, WriteOutcome},
    voyage::{compute_progress, estimate_eta, estimate_speed},
    weather::WeatherService,
};

pub struct Tracker<S, W> {
    store: S,
    weather: W,
    hub: Arc<ObserverHub>,
    regions: RegionLookup,
    locks: Mutex<HashMap<VesselId, Arc<Mutex<()>>>>,
    persist_timeout: Duration,
    weather_timeout: Duration,
}

impl<S: VesselStore, W: WeatherService> Tracker<S, W> {
    pub fn new(store: S, weather: W, hub: Arc<ObserverHub>, config: &TrackerConfig) -> Self {
        Self {
            store,
            weather,
            hub,
            regions: RegionLookup::new(),
            locks: Mutex::new(HashMap::new()),
            persist_timeout: config.persist_timeout,
            weather_timeout: config.weather_timeout,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn hub(&self) -> &Arc<ObserverHub> {
        &self.hub
    }

    /// Process one position sample.
    ///
    /// On success the returned broadcast has been persisted and published.
    /// `VesselNotFound` and `StaleSample` leave the store untouched and
    /// publish nothing.
    pub async fn handle_sample(
        &self,
        sample: PositionSample,
    ) -> Result<PositionBroadcast, TrackerError> {
        let id = sample.vessel_id.clone();
        let vessel_lock = self.vessel_lock(&id).await;

        let result = {
            let _guard = vessel_lock.lock().await;
            self.apply_sample(sample).await
        };

        self.release_lock(&id, vessel_lock).await;
        result
    }

    async fn apply_sample(&self, sample: PositionSample) -> Result<PositionBroadcast, TrackerError> {
        let PositionSample {
            vessel_id,
            position,
            timestamp,
        } = sample;

        let state = self
            .persistence("lookup", self.store.get(&vessel_id))
            .await?
            .ok_or_else(|| TrackerError::VesselNotFound(vessel_id.clone()))?;

        if state.last_sample_at.is_some_and(|last| timestamp <= last) {
            warn!(
                "Ignoring sample for {} at {}, already at {:?}",
                vessel_id, timestamp, state.last_sample_at
            );
            return Err(TrackerError::StaleSample(vessel_id));
        }

        let speed = match estimate_speed(state.location, state.last_seen(), position, timestamp) {
            Ok(speed) => speed,
            Err(e) => {
                debug!("Speed of {} unknown: {}", vessel_id, e);
                0.0
            }
        };

        let progress = compute_progress(state.source, state.destination, position);
        let remaining = distance(position, state.destination);
        let estimated_arrival = match estimate_eta(remaining, speed, timestamp) {
            Ok(eta) => Some(eta),
            Err(e) => {
                debug!("Arrival of {} unknown: {}", vessel_id, e);
                None
            }
        };

        let update = VesselUpdate {
            location: position,
            region: self.regions.region(position),
            speed,
            weather: self.lookup_weather(&vessel_id, position).await,
            progress,
            estimated_arrival,
            sample_time: timestamp,
        };

        match self
            .persistence("update", self.store.update_position(&vessel_id, &update))
            .await?
        {
            WriteOutcome::Applied => {}
            WriteOutcome::Stale => return Err(TrackerError::StaleSample(vessel_id)),
            WriteOutcome::Missing => return Err(TrackerError::VesselNotFound(vessel_id)),
        }

        info!(
            "Vessel {} at ({:.4}, {:.4}) in {}, {:.1} kn, {:.1}% complete",
            vessel_id,
            position.latitude(),
            position.longitude(),
            update.region,
            update.speed,
            update.progress
        );

        let broadcast = PositionBroadcast::new(vessel_id, &update);
        self.hub.publish(broadcast.clone()).await;
        Ok(broadcast)
    }

    /// Best-effort weather; any failure or timeout is `Unknown`
    async fn lookup_weather(&self, id: &VesselId, position: Coordinate) -> Weather {
        match timeout(self.weather_timeout, self.weather.current_weather(position)).await {
            Ok(Ok(weather)) => weather,
            Ok(Err(e)) => {
                warn!("Weather lookup for {} failed: {}", id, e);
                Weather::Unknown
            }
            Err(_) => {
                warn!(
                    "Weather lookup for {} timed out after {:?}",
                    id, self.weather_timeout
                );
                Weather::Unknown
            }
        }
    }

    /// Await a store call, mapping errors and timeouts to `PersistenceFailure`
    async fn persistence<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, TrackerError>>,
    ) -> Result<T, TrackerError> {
        match timeout(self.persist_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e @ TrackerError::PersistenceFailure(_))) => Err(e),
            Ok(Err(e)) => Err(TrackerError::PersistenceFailure(format!(
                "{} failed: {}",
                operation, e
            ))),
            Err(_) => Err(TrackerError::PersistenceFailure(format!(
                "{} timed out after {:?}",
                operation, self.persist_timeout
            ))),
        }
    }

    async fn vessel_lock(&self, id: &VesselId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(id.clone()).or_default().clone()
    }

    /// Drop the per-vessel lock once nobody else holds or waits for it
    async fn release_lock(&self, id: &VesselId, vessel_lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // One reference in the map, one here
        if Arc::strong_count(&vessel_lock) == 2 {
            locks.remove(id);
        }
    }
}
