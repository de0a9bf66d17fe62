//! MQTT to Prometheus bridge.
//!
//! Subscribes to every topic on an MQTT broker, maps device reports and
//! environmental readings to Prometheus gauges, and serves them on an HTTP
//! `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   MQTT Broker   │────>│     Router      │────>│   HTTP Server   │
//! │      (#)        │     │ (rules, gauges) │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Topic conventions
//!
//! | Topic                      | Families                                     |
//! |----------------------------|----------------------------------------------|
//! | `temperature/<loc>/<place>`| `environmental_SENSOR_Temperature`           |
//! | `humidity/<loc>/<place>`   | `environmental_SENSOR_Humidity`              |
//! | `<prefix>/<device>/STATE`  | `Sonoff_STATE_VCC`, `_RSSI`, `_Power`        |
//! | `<prefix>/<device>/SENSOR` | `Sonoff_SENSOR_Current`, `_Voltage`, `_Total`, `Sonoff_STATE_Power` |
//!
//! # Usage
//!
//! ```bash
//! mqtt2prom --config config.json5
//! ```
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod collector;
pub mod config;
pub mod family;
pub mod http;
pub mod router;
pub mod rules;
pub mod subscriber;

pub use collector::{GaugeRegistry, MetricSink, SharedRegistry};
pub use config::ExporterConfig;
pub use family::GaugeFamily;
pub use http::HttpServer;
pub use router::{IngestSnapshot, RouteOutcome, Router, SharedRouter};
pub use subscriber::{MqttSubscriber, join_subscriber};
