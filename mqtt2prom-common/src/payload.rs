//! Payload decoders for device reports.
//!
//! Decoding is deliberately forgiving. Every field falls back to its zero
//! value when it is missing, `null`, or of the wrong JSON type, so one bad
//! field never discards the rest of a report. A key that appears more than
//! once takes its last value.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Power-state string for a channel that is switched on.
pub const POWER_ON: &str = "ON";

/// Power-state string for a channel that is switched off.
pub const POWER_OFF: &str = "OFF";

/// Device-state report published on `<prefix>/<device>/STATE`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeviceState {
    #[serde(rename = "Time", deserialize_with = "lenient")]
    pub time: String,
    #[serde(rename = "Uptime", deserialize_with = "lenient")]
    pub uptime: i64,
    #[serde(rename = "UptimeSec", deserialize_with = "lenient")]
    pub uptime_sec: i64,
    #[serde(rename = "Heap", deserialize_with = "lenient")]
    pub heap: i64,
    #[serde(rename = "SleepMode", deserialize_with = "lenient")]
    pub sleep_mode: String,
    #[serde(rename = "Sleep", deserialize_with = "lenient")]
    pub sleep: i64,
    #[serde(rename = "LoadAvg", deserialize_with = "lenient")]
    pub load_avg: i64,
    #[serde(rename = "MqttCount", deserialize_with = "lenient")]
    pub mqtt_count: i64,
    /// Supply voltage in volts.
    #[serde(rename = "Vcc", deserialize_with = "lenient")]
    pub vcc: f64,
    #[serde(rename = "POWER", deserialize_with = "lenient")]
    pub power: String,
    #[serde(rename = "POWER1", deserialize_with = "lenient")]
    pub power1: String,
    #[serde(rename = "POWER2", deserialize_with = "lenient")]
    pub power2: String,
    #[serde(rename = "POWER3", deserialize_with = "lenient")]
    pub power3: String,
    #[serde(rename = "POWER4", deserialize_with = "lenient")]
    pub power4: String,
    #[serde(rename = "Wifi", deserialize_with = "lenient")]
    pub wifi: Wifi,
}

/// Wifi block of a device-state report.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Wifi {
    #[serde(rename = "AP", deserialize_with = "lenient")]
    pub ap: i64,
    #[serde(rename = "SSId", deserialize_with = "lenient")]
    pub ssid: String,
    #[serde(rename = "BSSId", deserialize_with = "lenient")]
    pub bssid: String,
    #[serde(rename = "Channel", deserialize_with = "lenient")]
    pub channel: i64,
    #[serde(rename = "RSSI", deserialize_with = "lenient")]
    pub rssi: i64,
    #[serde(rename = "Signal", deserialize_with = "lenient")]
    pub signal: i64,
    #[serde(rename = "LinkCount", deserialize_with = "lenient")]
    pub link_count: i64,
    #[serde(rename = "Downtime", deserialize_with = "lenient")]
    pub downtime: String,
}

/// One relay channel of a device-state report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerChannel<'a> {
    /// Appended to the device id to name the channel ("" for the primary one).
    pub suffix: &'static str,
    /// Raw state string as reported.
    pub state: &'a str,
}

impl PowerChannel<'_> {
    /// Numeric gauge value for the channel: `ON` is 1, `OFF` is 0.
    ///
    /// Any other state, including an empty or absent one, has no value.
    pub fn value(&self) -> Option<f64> {
        match self.state {
            POWER_ON => Some(1.0),
            POWER_OFF => Some(0.0),
            _ => None,
        }
    }
}

impl DeviceState {
    /// The primary channel followed by the indexed channels 1 to 4.
    pub fn power_channels(&self) -> [PowerChannel<'_>; 5] {
        [
            PowerChannel {
                suffix: "",
                state: &self.power,
            },
            PowerChannel {
                suffix: "1",
                state: &self.power1,
            },
            PowerChannel {
                suffix: "2",
                state: &self.power2,
            },
            PowerChannel {
                suffix: "3",
                state: &self.power3,
            },
            PowerChannel {
                suffix: "4",
                state: &self.power4,
            },
        ]
    }
}

/// Energy-sensor report published on `<prefix>/<device>/SENSOR`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnergyReading {
    #[serde(rename = "Time", deserialize_with = "lenient")]
    pub time: String,
    #[serde(rename = "ENERGY", deserialize_with = "lenient")]
    pub energy: Energy,
}

/// `ENERGY` block of a sensor report.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Energy {
    /// All-time cumulative energy.
    #[serde(rename = "Total", deserialize_with = "lenient")]
    pub total: f64,
    #[serde(rename = "Yesterday", deserialize_with = "lenient")]
    pub yesterday: f64,
    /// Cumulative energy since midnight.
    #[serde(rename = "Today", deserialize_with = "lenient")]
    pub today: f64,
    #[serde(rename = "Period", deserialize_with = "lenient")]
    pub period: i64,
    /// Active power in watts.
    #[serde(rename = "Power", deserialize_with = "lenient")]
    pub power: i64,
    #[serde(rename = "Factor", deserialize_with = "lenient")]
    pub factor: f64,
    /// Line voltage in volts.
    #[serde(rename = "Voltage", deserialize_with = "lenient")]
    pub voltage: i64,
    /// Current in amps.
    #[serde(rename = "Current", deserialize_with = "lenient")]
    pub current: f64,
}

/// Deserialize a field, falling back to its default on a type mismatch.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Decode a JSON device report.
///
/// Fails only when the payload is not a JSON object at all; field-level
/// problems are absorbed into zero values.
pub fn decode_report<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    // Parsed through a map so duplicate keys collapse instead of failing
    let document: serde_json::Value = serde_json::from_slice(payload)?;
    T::deserialize(document).map_err(Error::from)
}

/// Parse a bare decimal reading such as `23.5`.
pub fn parse_scalar(payload: &[u8]) -> Result<f64> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| Error::Payload(format!("reading is not UTF-8: {}", e)))?;

    text.parse::<f64>()
        .map_err(|e| Error::Payload(format!("'{}' is not a number: {}", text, e)))
}
