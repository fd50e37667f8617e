//! PortLink vessel tracker

use std::sync::Arc;

use portlink_tracker::{
    broadcast::ObserverHub,
    config::AppConfig,
    database::Database,
    dispatch::Dispatcher,
    errors::TrackerError,
    mqtt::{MqttClient, MqttClientBuilder},
    store::VesselStore,
    tracker::Tracker,
    weather::{ConfiguredWeather, WeatherService},
};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), TrackerError> {
    #[cfg(feature = "dotenv")]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration, preferring environment variables and config files
    let config = AppConfig::load()?;
    config.validate()?;

    let db = Database::connect(&config.database).await?;
    let weather = ConfiguredWeather::from_config(&config.weather)?;
    let hub = Arc::new(ObserverHub::new(config.tracker.broadcast_capacity));
    let tracker = Arc::new(Tracker::new(db, weather, hub.clone(), &config.tracker));

    let mqtt_client = MqttClientBuilder::new(&config.mqtt)?
        .connect(&config.mqtt.sample_topic)
        .await?;

    let (dispatcher, rejections) = Dispatcher::new(tracker, config.tracker.idle_worker_timeout);

    let publisher = mqtt_client.publisher();
    tokio::spawn(publisher.clone().forward_positions(hub.subscribe_all()));
    tokio::spawn(publisher.forward_rejections(rejections));

    // Setup signal handling for graceful shutdown
    let shutdown_signal = signal::ctrl_c();

    tokio::select! {
        _ = run_tracker(mqtt_client, dispatcher) => {
            error!("Position channel closed");
        }
        _ = shutdown_signal => {
            info!("Received shutdown signal");
        }
    }

    Ok(())
}

async fn run_tracker<S, W>(mut mqtt_client: MqttClient, mut dispatcher: Dispatcher<S, W>)
where
    S: VesselStore + 'static,
    W: WeatherService + 'static,
{
    info!("Waiting for position samples");
    while let Some(sample) = mqtt_client.recv().await {
        dispatcher.dispatch(sample);
    }
}
