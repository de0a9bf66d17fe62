//! mqtt2prom Common Library
//!
//! This crate provides the broker-facing half of the MQTT to Prometheus bridge:
//!
//! - [`topic`] - Three-segment topic parsing and classification
//! - [`payload`] - Lenient decoding of device reports and scalar readings
//! - [`session`] - Broker session and the fixed-interval connection supervisor
//! - [`config`] - Configuration loading (JSON5 format)
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod payload;
pub mod session;
pub mod topic;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, MqttConfig};
pub use error::{Error, Result};
pub use payload::{
    DeviceState, Energy, EnergyReading, PowerChannel, Wifi, decode_report, parse_scalar,
};
pub use session::{ConnectionState, Establish, MqttSession, Supervisor, connect};
pub use topic::{ALL_TOPICS, Topic, TopicKind};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
