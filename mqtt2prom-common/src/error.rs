use thiserror::Error;

/// Common error type for mqtt2prom components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("MQTT connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("Subscription rejected: {0}")]
    Subscription(String),

    #[error("Invalid payload: {0}")]
    Payload(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using mqtt2prom's Error.
pub type Result<T> = std::result::Result<T, Error>;
