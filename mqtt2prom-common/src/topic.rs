//! Topic parsing and classification.
//!
//! Device reports arrive on three-segment topics:
//!
//! ```text
//! temperature/<location>/<place>     bare decimal reading
//! humidity/<location>/<place>        bare decimal reading
//! <prefix>/<device>/STATE            JSON device-state report
//! <prefix>/<device>/SENSOR           JSON energy report
//! ```
//!
//! Anything else is not a report and is ignored by the router.

use std::fmt;

/// Topic filter matching every topic on the broker.
pub const ALL_TOPICS: &str = "#";

/// Category keyword for temperature readings (first segment).
pub const TEMPERATURE: &str = "temperature";

/// Category keyword for humidity readings (first segment).
pub const HUMIDITY: &str = "humidity";

/// Report kind for device-state reports (last segment).
pub const STATE: &str = "STATE";

/// Report kind for energy-sensor reports (last segment).
pub const SENSOR: &str = "SENSOR";

/// A topic split into its three positional labels.
///
/// # Example
/// ```
/// use mqtt2prom_common::topic::Topic;
///
/// let topic = Topic::parse("tele/sonoff01/STATE").unwrap();
/// assert_eq!(topic.label1, "tele");
/// assert_eq!(topic.label2, "sonoff01");
/// assert_eq!(topic.label3, "STATE");
///
/// assert!(Topic::parse("tele/sonoff01").is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topic<'a> {
    /// Measurement category or report prefix.
    pub label1: &'a str,
    /// Device identifier or location.
    pub label2: &'a str,
    /// Place, or report kind keyword.
    pub label3: &'a str,
}

impl<'a> Topic<'a> {
    /// Split a topic into exactly three non-empty segments.
    ///
    /// Returns `None` for any other shape.
    pub fn parse(topic: &'a str) -> Option<Self> {
        let mut parts = topic.split('/');

        let label1 = parts.next().filter(|s| !s.is_empty())?;
        let label2 = parts.next().filter(|s| !s.is_empty())?;
        let label3 = parts.next().filter(|s| !s.is_empty())?;

        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            label1,
            label2,
            label3,
        })
    }

    /// Classify the topic into the report kind it carries.
    ///
    /// Categories are checked in priority order (temperature, humidity,
    /// STATE, SENSOR), so a topic never maps to more than one kind.
    pub fn kind(&self) -> Option<TopicKind> {
        if self.label1 == TEMPERATURE {
            Some(TopicKind::Temperature)
        } else if self.label1 == HUMIDITY {
            Some(TopicKind::Humidity)
        } else if self.label3 == STATE {
            Some(TopicKind::State)
        } else if self.label3 == SENSOR {
            Some(TopicKind::Sensor)
        } else {
            None
        }
    }
}

impl fmt::Display for Topic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.label1, self.label2, self.label3)
    }
}

/// The update category a topic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    Temperature,
    Humidity,
    State,
    Sensor,
}

impl TopicKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicKind::Temperature => "temperature",
            TopicKind::Humidity => "humidity",
            TopicKind::State => "state",
            TopicKind::Sensor => "sensor",
        }
    }
}

impl fmt::Display for TopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
