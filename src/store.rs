//! Vessel state persistence.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    errors::TrackerError,
    models::{VesselId, VesselState, VesselUpdate},
};

/// Result of a fenced position write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The stored state already reflects a sample at least as new
    Stale,
    /// The vessel record no longer exists
    Missing,
}

/// Persistence for vessel tracking state.
///
/// `update_position` must be atomic for the one record and only apply when
/// `update.sample_time` is newer than the stored `last_sample_at`.
pub trait VesselStore: Send + Sync {
    fn get(
        &self,
        id: &VesselId,
    ) -> impl Future<Output = Result<Option<VesselState>, TrackerError>> + Send;

    fn update_position(
        &self,
        id: &VesselId,
        update: &VesselUpdate,
    ) -> impl Future<Output = Result<WriteOutcome, TrackerError>> + Send;
}

/// In-process store, for tests and running without a database
#[derive(Debug, Clone, Default)]
pub struct MemoryVesselStore {
    vessels: Arc<RwLock<HashMap<VesselId, VesselState>>>,
}

impl MemoryVesselStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vessel, replacing any previous record with the same id
    pub async fn insert(&self, state: VesselState) {
        self.vessels.write().await.insert(state.id.clone(), state);
    }
}

impl VesselStore for MemoryVesselStore {
    async fn get(&self, id: &VesselId) -> Result<Option<VesselState>, TrackerError> {
        Ok(self.vessels.read().await.get(id).cloned())
    }

    async fn update_position(
        &self,
        id: &VesselId,
        update: &VesselUpdate,
    ) -> Result<WriteOutcome, TrackerError> {
        let mut vessels = self.vessels.write().await;
        let Some(state) = vessels.get_mut(id) else {
            return Ok(WriteOutcome::Missing);
        };

        if state
            .last_sample_at
            .is_some_and(|last| last >= update.sample_time)
        {
            return Ok(WriteOutcome::Stale);
        }

        state.apply(update);
        Ok(WriteOutcome::Applied)
    }
}
