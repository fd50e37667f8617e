//! Live vessel position tracking for PortLink.
//!
//! Position samples arrive over MQTT, are enriched with speed, progress,
//! arrival estimate, sea area and weather, persisted with per-vessel
//! ordering, and fanned out to observers.

pub mod broadcast;
pub mod config;
pub mod database;
pub mod dispatch;
pub mod errors;
pub mod geo;
pub mod models;
pub mod mqtt;
pub mod region;
pub mod store;
pub mod tracker;
pub mod voyage;
pub mod weather;
