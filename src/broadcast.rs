//! Observer fan-out for enriched vessel positions.
//!
//! Delivery is fire-and-forget: every observer holds its own bounded
//! `broadcast` receiver, a slow observer skips samples (it sees `Lagged`) and
//! a dropped receiver simply stops counting. Neither affects other observers.

use std::collections::HashMap;

use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use crate::models::{PositionBroadcast, VesselId};

pub struct ObserverHub {
    capacity: usize,
    vessels: Mutex<HashMap<VesselId, broadcast::Sender<PositionBroadcast>>>,
    all: broadcast::Sender<PositionBroadcast>,
}

impl ObserverHub {
    pub fn new(capacity: usize) -> Self {
        let (all, _rx) = broadcast::channel(capacity.max(1));
        Self {
            capacity: capacity.max(1),
            vessels: Mutex::new(HashMap::new()),
            all,
        }
    }

    /// Observe positions of one vessel
    pub async fn subscribe(&self, id: &VesselId) -> broadcast::Receiver<PositionBroadcast> {
        let mut vessels = self.vessels.lock().await;
        vessels
            .entry(id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Observe positions of every vessel
    pub fn subscribe_all(&self) -> broadcast::Receiver<PositionBroadcast> {
        self.all.subscribe()
    }

    /// Publish to current observers, returning how many received it
    pub async fn publish(&self, position: PositionBroadcast) -> usize {
        let mut delivered = 0;

        {
            let mut vessels = self.vessels.lock().await;
            if let Some(tx) = vessels.get(&position.vessel_id) {
                match tx.send(position.clone()) {
                    Ok(n) => delivered += n,
                    Err(_) => {
                        // Every observer of this vessel has gone away
                        vessels.remove(&position.vessel_id);
                    }
                }
            }
        }

        if let Ok(n) = self.all.send(position) {
            delivered += n;
        }

        debug!("Broadcast delivered to {} observers", delivered);
        delivered
    }

    /// Number of observers subscribed to one vessel
    pub async fn observer_count(&self, id: &VesselId) -> usize {
        self.vessels
            .lock()
            .await
            .get(id)
            .map_or(0, |tx| tx.receiver_count())
    }
}
