use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// MQTT broker connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host name or IP address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Broker TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Client identifier presented to the broker.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// MQTT keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Fixed delay between connection attempts in seconds.
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,
}

fn default_host() -> String {
    "ubuntu".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "mqtt2prom".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

fn default_retry_interval() -> u64 {
    30
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive(),
            retry_interval_secs: default_retry_interval(),
        }
    }
}

impl MqttConfig {
    /// Broker address in `host:port` form.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Delay between connection attempts.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    /// Keep-alive interval.
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Override host and port from a `host:port` string.
    pub fn set_address(&mut self, address: &str) -> Result<()> {
        let (host, port) = address.rsplit_once(':').ok_or_else(|| {
            Error::Config(format!(
                "Invalid broker address '{}': expected host:port",
                address
            ))
        })?;

        let port = port.parse::<u16>().map_err(|e| {
            Error::Config(format!("Invalid broker port in '{}': {}", address, e))
        })?;

        self.host = host.to_string();
        self.port = port;
        Ok(())
    }

    /// Validate the broker settings.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::Config("mqtt.host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config("mqtt.port must be > 0".to_string()));
        }
        if self.client_id.is_empty() {
            return Err(Error::Config("mqtt.client_id must not be empty".to_string()));
        }
        if self.keep_alive_secs == 0 {
            return Err(Error::Config("mqtt.keep_alive_secs must be > 0".to_string()));
        }
        if self.retry_interval_secs == 0 {
            return Err(Error::Config(
                "mqtt.retry_interval_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mqtt_config() {
        let content = r#"
        {
            host: "broker.local",
            port: 8883,
            client_id: "bridge-01",
            retry_interval_secs: 5,
        }
        "#;

        let config: MqttConfig = json5::from_str(content).unwrap();

        assert_eq!(config.host, "broker.local");
        assert_eq!(config.port, 8883);
        assert_eq!(config.client_id, "bridge-01");
        assert_eq!(config.retry_interval(), Duration::from_secs(5));
        assert_eq!(config.keep_alive_secs, 60);
    }

    #[test]
    fn test_default_config() {
        let config: MqttConfig = json5::from_str("{}").unwrap();

        assert_eq!(config.address(), "ubuntu:1883");
        assert_eq!(config.client_id, "mqtt2prom");
        assert_eq!(config.retry_interval(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_set_address() {
        let mut config = MqttConfig::default();
        config.set_address("10.0.0.5:1884").unwrap();

        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, 1884);

        assert!(config.set_address("no-port").is_err());
        assert!(config.set_address("host:notaport").is_err());
    }

    #[test]
    fn test_validate_rejects_zero_retry() {
        let config = MqttConfig {
            retry_interval_secs: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retry_interval_secs"));
    }

    #[test]
    fn test_json_logging_format() {
        let content = r#"{ level: "debug", format: "json" }"#;

        let config: LoggingConfig = json5::from_str(content).unwrap();

        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
    }
}
