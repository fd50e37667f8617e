//! Per-vessel sample queues.
//!
//! Each vessel with pending samples gets its own worker task fed through an
//! mpsc queue, so samples for one vessel are handled in arrival order while
//! different vessels are handled concurrently. Idle workers exit and are
//! respawned on the next sample. Dispatching never waits: a sample for a
//! vessel whose queue is full is rejected as retryable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::{
    errors::TrackerError,
    models::{PositionSample, SampleRejection, VesselId},
    store::VesselStore,
    tracker::Tracker,
    weather::WeatherService,
};

const VESSEL_QUEUE_CAPACITY: usize = 32;
const REJECTION_QUEUE_CAPACITY: usize = 100;

struct Worker {
    queue: mpsc::Sender<PositionSample>,
    handle: JoinHandle<()>,
}

pub struct Dispatcher<S, W> {
    tracker: Arc<Tracker<S, W>>,
    workers: HashMap<VesselId, Worker>,
    rejections: mpsc::Sender<SampleRejection>,
    idle_timeout: Duration,
}

impl<S, W> Dispatcher<S, W>
where
    S: VesselStore + 'static,
    W: WeatherService + 'static,
{
    /// Create a dispatcher and the receiving end of its rejection feed
    pub fn new(
        tracker: Arc<Tracker<S, W>>,
        idle_timeout: Duration,
    ) -> (Self, mpsc::Receiver<SampleRejection>) {
        let (rejections, rx) = mpsc::channel(REJECTION_QUEUE_CAPACITY);
        let dispatcher = Self {
            tracker,
            workers: HashMap::new(),
            rejections,
            idle_timeout,
        };
        (dispatcher, rx)
    }

    /// Queue a sample behind earlier samples of the same vessel
    pub fn dispatch(&mut self, sample: PositionSample) {
        let id = sample.vessel_id.clone();
        let mut sample = sample;

        // A worker may stop accepting between lookup and send; respawn once if so
        for _ in 0..2 {
            let live = self
                .workers
                .get(&id)
                .filter(|worker| !worker.queue.is_closed())
                .map(|worker| worker.queue.clone());
            let queue = match live {
                Some(queue) => queue,
                None => self.spawn_worker(&id),
            };
            match queue.try_send(sample) {
                Ok(()) => return,
                Err(TrySendError::Full(_)) => {
                    warn!("Sample queue for {} is full", id);
                    reject(
                        &self.rejections,
                        id.as_str(),
                        &TrackerError::QueueFull(id.clone()),
                    );
                    return;
                }
                Err(TrySendError::Closed(returned)) => sample = returned,
            }
        }
        error!("Could not queue sample for {}", id);
    }

    /// Number of vessels with a running worker
    pub fn active_workers(&mut self) -> usize {
        self.workers.retain(|_, worker| !worker.handle.is_finished());
        self.workers.len()
    }

    /// Start a worker for `id`. A previous worker that is still draining its
    /// queue is awaited first, so its samples are applied before new ones.
    fn spawn_worker(&mut self, id: &VesselId) -> mpsc::Sender<PositionSample> {
        debug!("Starting worker for {}", id);
        let previous = self.workers.remove(id).map(|worker| worker.handle);
        let (queue, rx) = mpsc::channel(VESSEL_QUEUE_CAPACITY);
        let handle = tokio::spawn(run_worker(
            self.tracker.clone(),
            rx,
            self.rejections.clone(),
            self.idle_timeout,
            previous,
        ));
        self.workers.insert(
            id.clone(),
            Worker {
                queue: queue.clone(),
                handle,
            },
        );
        queue
    }
}

async fn run_worker<S, W>(
    tracker: Arc<Tracker<S, W>>,
    mut rx: mpsc::Receiver<PositionSample>,
    rejections: mpsc::Sender<SampleRejection>,
    idle_timeout: Duration,
    previous: Option<JoinHandle<()>>,
) where
    S: VesselStore,
    W: WeatherService,
{
    if let Some(previous) = previous {
        if let Err(e) = previous.await {
            error!("Previous worker failed: {}", e);
        }
    }

    loop {
        match timeout(idle_timeout, rx.recv()).await {
            Ok(Some(sample)) => handle(&tracker, sample, &rejections).await,
            Ok(None) => break,
            Err(_) => {
                // Stop accepting, then finish whatever was already queued
                rx.close();
                while let Some(sample) = rx.recv().await {
                    handle(&tracker, sample, &rejections).await;
                }
                break;
            }
        }
    }
}

async fn handle<S, W>(
    tracker: &Tracker<S, W>,
    sample: PositionSample,
    rejections: &mpsc::Sender<SampleRejection>,
) where
    S: VesselStore,
    W: WeatherService,
{
    let id = sample.vessel_id.clone();
    if let Err(e) = tracker.handle_sample(sample).await {
        match &e {
            TrackerError::StaleSample(_) => debug!("{}", e),
            _ if e.is_transient() => error!("Sample for {} failed: {}", id, e),
            _ => warn!("Sample for {} rejected: {}", id, e),
        }
        reject(rejections, id.as_str(), &e);
    }
}

/// Queue a rejection notice for the sender, dropping it if the feed is full
pub fn reject(rejections: &mpsc::Sender<SampleRejection>, vessel_id: &str, e: &TrackerError) {
    let rejection = SampleRejection {
        vessel_id: vessel_id.to_string(),
        error: e.to_string(),
        retryable: e.is_transient(),
    };
    if rejections.try_send(rejection).is_err() {
        warn!("Rejection feed full, dropping notice for {}", vessel_id);
    }
}
