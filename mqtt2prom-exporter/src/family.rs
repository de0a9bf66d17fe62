//! Gauge families exported to Prometheus.
//!
//! Each family is a fully-qualified gauge name plus a pair of label names.
//! Names are built as `{namespace}_{subsystem}_{name}` so the exposed series
//! keep the names dashboards already query (`Sonoff_STATE_VCC`, ...).

use std::fmt;

/// Label names for device families: device id, then report prefix.
pub const DEVICE_LABELS: [&str; 2] = ["name", "label"];

/// Label names for environmental families: location, then place.
pub const ENVIRONMENT_LABELS: [&str; 2] = ["location", "place"];

/// Build a fully-qualified metric name, skipping empty components.
///
/// # Example
/// ```
/// use mqtt2prom_exporter::family::build_metric_name;
///
/// assert_eq!(build_metric_name("Sonoff", "STATE", "VCC"), "Sonoff_STATE_VCC");
/// assert_eq!(build_metric_name("", "STATE", "VCC"), "STATE_VCC");
/// ```
pub fn build_metric_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// One of the gauge families maintained by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GaugeFamily {
    Vcc,
    Rssi,
    Power,
    Voltage,
    Current,
    Total,
    Temperature,
    Humidity,
}

impl GaugeFamily {
    /// Every family, in declaration order.
    pub const ALL: [GaugeFamily; 8] = [
        GaugeFamily::Vcc,
        GaugeFamily::Rssi,
        GaugeFamily::Power,
        GaugeFamily::Voltage,
        GaugeFamily::Current,
        GaugeFamily::Total,
        GaugeFamily::Temperature,
        GaugeFamily::Humidity,
    ];

    pub fn namespace(&self) -> &'static str {
        match self {
            GaugeFamily::Temperature | GaugeFamily::Humidity => "environmental",
            _ => "Sonoff",
        }
    }

    pub fn subsystem(&self) -> &'static str {
        match self {
            GaugeFamily::Vcc | GaugeFamily::Rssi | GaugeFamily::Power => "STATE",
            _ => "SENSOR",
        }
    }

    /// Short name within the subsystem.
    pub fn name(&self) -> &'static str {
        match self {
            GaugeFamily::Vcc => "VCC",
            GaugeFamily::Rssi => "RSSI",
            GaugeFamily::Power => "Power",
            GaugeFamily::Voltage => "Voltage",
            GaugeFamily::Current => "Current",
            GaugeFamily::Total => "Total",
            GaugeFamily::Temperature => "Temperature",
            GaugeFamily::Humidity => "Humidity",
        }
    }

    /// HELP text for the exposition format.
    pub fn help(&self) -> &'static str {
        match self {
            GaugeFamily::Vcc => "Sonoff VCC Values",
            GaugeFamily::Rssi => "Sonoff RSSI Values",
            GaugeFamily::Power => "Sonoff Power Values",
            GaugeFamily::Voltage => "Sonoff Voltage Values",
            GaugeFamily::Current => "Sonoff Current Values",
            GaugeFamily::Total => "Sonoff Total Values",
            GaugeFamily::Temperature => "Temperature",
            GaugeFamily::Humidity => "Humidity",
        }
    }

    /// Names of the two labels identifying a series of this family.
    pub fn label_names(&self) -> [&'static str; 2] {
        match self {
            GaugeFamily::Temperature | GaugeFamily::Humidity => ENVIRONMENT_LABELS,
            _ => DEVICE_LABELS,
        }
    }

    /// Fully-qualified Prometheus metric name.
    pub fn metric_name(&self) -> String {
        build_metric_name(self.namespace(), self.subsystem(), self.name())
    }
}

impl fmt::Display for GaugeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.metric_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        let names: Vec<String> = GaugeFamily::ALL.iter().map(|f| f.metric_name()).collect();

        assert_eq!(
            names,
            vec![
                "Sonoff_STATE_VCC",
                "Sonoff_STATE_RSSI",
                "Sonoff_STATE_Power",
                "Sonoff_SENSOR_Voltage",
                "Sonoff_SENSOR_Current",
                "Sonoff_SENSOR_Total",
                "environmental_SENSOR_Temperature",
                "environmental_SENSOR_Humidity",
            ]
        );
    }

    #[test]
    fn test_label_names() {
        assert_eq!(GaugeFamily::Vcc.label_names(), ["name", "label"]);
        assert_eq!(GaugeFamily::Power.label_names(), ["name", "label"]);
        assert_eq!(GaugeFamily::Total.label_names(), ["name", "label"]);
        assert_eq!(GaugeFamily::Temperature.label_names(), ["location", "place"]);
        assert_eq!(GaugeFamily::Humidity.label_names(), ["location", "place"]);
    }

    #[test]
    fn test_build_metric_name() {
        assert_eq!(build_metric_name("a", "b", "c"), "a_b_c");
        assert_eq!(build_metric_name("a", "", "c"), "a_c");
        assert_eq!(build_metric_name("", "", "c"), "c");
    }

    #[test]
    fn test_help_text() {
        assert_eq!(GaugeFamily::Vcc.help(), "Sonoff VCC Values");
        assert_eq!(GaugeFamily::Humidity.help(), "Humidity");
    }
}
