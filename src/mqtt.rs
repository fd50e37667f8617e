//! MQTT client implementation

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};

use crate::{
    config::MqttConfig,
    errors::TrackerError,
    models::{PositionBroadcast, PositionReport, PositionSample, SampleRejection},
};

/// MQTT client for receiving position samples
pub struct MqttClientBuilder {
    client: AsyncClient,
    event_loop: EventLoop,
    broadcast_prefix: String,
    max_clock_skew: Duration,
    tx: mpsc::Sender<PositionSample>,
    rx: mpsc::Receiver<PositionSample>,
}

pub struct MqttClient {
    client: AsyncClient,
    rx: mpsc::Receiver<PositionSample>,
    broadcast_prefix: String,
    _handle: tokio::task::JoinHandle<Result<(), TrackerError>>,
}

/// Publishes enriched positions and rejection notices
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    broadcast_prefix: String,
}

impl MqttClientBuilder {
    /// Create a new MQTT client
    pub fn new(config: &MqttConfig) -> Result<Self, TrackerError> {
        config.validate()?;

        let mut mqtt_options = MqttOptions::new(&config.client_id, &config.host, config.port);
        if config.websocket {
            mqtt_options.set_transport(Transport::wss_with_default_config());
        }
        mqtt_options.set_keep_alive(config.keep_alive);

        let (client, event_loop) = AsyncClient::new(mqtt_options, 100);
        let max_clock_skew = Duration::from_std(config.max_clock_skew).map_err(|_| {
            TrackerError::ConfigurationError {
                message: "Maximum clock skew is out of range".to_string(),
            }
        })?;

        // Create a channel for message passing
        let (tx, rx) = mpsc::channel(100);

        Ok(Self {
            client,
            event_loop,
            broadcast_prefix: config.broadcast_prefix.clone(),
            max_clock_skew,
            tx,
            rx,
        })
    }

    /// Start the event loop, subscribing to `sample_topic`
    ///
    /// Note: Initial subscription needs not be done here, as it is done
    /// in the event loop.
    pub async fn connect(self, sample_topic: &str) -> Result<MqttClient, TrackerError> {
        let publisher = MqttPublisher {
            client: self.client.clone(),
            broadcast_prefix: self.broadcast_prefix.clone(),
        };

        let _handle = tokio::spawn(Self::process_events(
            self.tx,
            self.event_loop,
            publisher,
            sample_topic.to_string(),
            self.max_clock_skew,
        ));

        Ok(MqttClient {
            client: self.client,
            rx: self.rx,
            broadcast_prefix: self.broadcast_prefix,
            _handle,
        })
    }

    /// Process MQTT events
    ///
    /// `rumqttc` reconnects automatically when the connection is lost, but
    /// the subscription has to be re-established on every `ConnAck`, so it
    /// is handled here.
    ///
    /// NOTE: If topic subscription fails, the loop will break and return an error.
    async fn process_events(
        tx: mpsc::Sender<PositionSample>,
        mut event_loop: EventLoop,
        publisher: MqttPublisher,
        sample_topic: String,
        max_clock_skew: Duration,
    ) -> Result<(), TrackerError> {
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to MQTT broker, subscribing to {}", sample_topic);
                    if let Err(e) = publisher
                        .client
                        .subscribe(&sample_topic, QoS::AtLeastOnce)
                        .await
                    {
                        error!("Failed to subscribe: {}", e);
                        break Err(e.into());
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match Self::parse_message(&publish.payload, Utc::now(), max_clock_skew) {
                        Ok(sample) => {
                            if let Err(e) = tx.send(sample).await {
                                error!("Failed to forward sample: {}", e);
                                break Ok(());
                            }
                        }
                        Err(e) => {
                            warn!("Rejected sample on {}: {}", publish.topic, e);
                            if let Some(vessel_id) = Self::sender_vessel_id(&publish.payload) {
                                publisher.reject(&SampleRejection {
                                    vessel_id,
                                    error: e.to_string(),
                                    retryable: false,
                                });
                            }
                        }
                    }
                }
                Err(e) => {
                    error!("MQTT Error: {}", e);
                    continue;
                }
                _ => continue,
            }
        }
    }

    /// Parse and validate a position report
    fn parse_message(
        payload: &[u8],
        received_at: DateTime<Utc>,
        max_clock_skew: Duration,
    ) -> Result<PositionSample, TrackerError> {
        let report: PositionReport = serde_json::from_slice(payload)?;
        PositionSample::from_report(report, received_at, max_clock_skew)
    }

    /// Best-effort vessel id of a payload that failed to parse
    fn sender_vessel_id(payload: &[u8]) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
        value
            .get("vesselId")?
            .as_str()
            .map(str::to_string)
            .filter(|id| crate::models::VesselId::try_from(id.as_str()).is_ok())
    }
}

impl MqttClient {
    /// Receive next sample
    pub async fn recv(&mut self) -> Option<PositionSample> {
        self.rx.recv().await
    }

    pub fn publisher(&self) -> MqttPublisher {
        MqttPublisher {
            client: self.client.clone(),
            broadcast_prefix: self.broadcast_prefix.clone(),
        }
    }
}

impl MqttPublisher {
    fn topic(&self, vessel_id: &str, kind: &str) -> String {
        format!("{}/{}/{}", self.broadcast_prefix, vessel_id, kind)
    }

    /// Publish one enriched position, at most once
    pub fn publish_position(&self, position: &PositionBroadcast) -> Result<(), TrackerError> {
        let payload = serde_json::to_vec(position)?;
        self.client.try_publish(
            self.topic(position.vessel_id.as_str(), "location-broadcast"),
            QoS::AtMostOnce,
            false,
            payload,
        )?;
        Ok(())
    }

    /// Tell a sender why its sample was not applied
    pub fn reject(&self, rejection: &SampleRejection) {
        let result = serde_json::to_vec(rejection)
            .map_err(TrackerError::from)
            .and_then(|payload| {
                self.client
                    .try_publish(
                        self.topic(&rejection.vessel_id, "rejected"),
                        QoS::AtMostOnce,
                        false,
                        payload,
                    )
                    .map_err(TrackerError::from)
            });
        if let Err(e) = result {
            warn!(
                "Failed to publish rejection for {}: {}",
                rejection.vessel_id, e
            );
        }
    }

    /// Republish every observed position until the hub goes away
    pub async fn forward_positions(self, mut rx: broadcast::Receiver<PositionBroadcast>) {
        loop {
            match rx.recv().await {
                Ok(position) => {
                    if let Err(e) = self.publish_position(&position) {
                        warn!("Failed to publish position of {}: {}", position.vessel_id, e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("MQTT bridge skipped {} positions", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Publish rejection notices until the feed closes
    pub async fn forward_rejections(self, mut rx: mpsc::Receiver<SampleRejection>) {
        while let Some(rejection) = rx.recv().await {
            self.reject(&rejection);
        }
    }
}
