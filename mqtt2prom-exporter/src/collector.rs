//! Gauge registry that stores the last value of every series.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::family::GaugeFamily;
use crate::router::IngestSnapshot;

/// Destination for gauge updates.
///
/// Implementations must tolerate concurrent calls. Every call is a full
/// overwrite of one series: the last write wins.
pub trait MetricSink: Send + Sync {
    /// Set the gauge of `family` identified by `labels` to `value`.
    fn set_gauge(&self, family: GaugeFamily, labels: (&str, &str), value: f64);
}

impl<S: MetricSink + ?Sized> MetricSink for Arc<S> {
    fn set_gauge(&self, family: GaugeFamily, labels: (&str, &str), value: f64) {
        (**self).set_gauge(family, labels, value)
    }
}

/// A unique identifier for a gauge series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    /// The family the series belongs to.
    pub family: GaugeFamily,
    /// Label values, in the order given by [`GaugeFamily::label_names`].
    pub labels: (String, String),
}

impl SeriesKey {
    pub fn new(family: GaugeFamily, labels: (&str, &str)) -> Self {
        Self {
            family,
            labels: (labels.0.to_string(), labels.1.to_string()),
        }
    }

    /// Format labels for Prometheus exposition format, sorted by label name.
    pub fn format_labels(&self) -> String {
        let [first, second] = self.family.label_names();
        let mut pairs = [(first, &self.labels.0), (second, &self.labels.1)];
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        let parts: Vec<String> = pairs
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
            .collect();

        format!("{{{}}}", parts.join(","))
    }
}

/// Thread-safe gauge registry.
///
/// Series are created on first update and never removed.
#[derive(Default)]
pub struct GaugeRegistry {
    series: RwLock<HashMap<SeriesKey, f64>>,
}

impl GaugeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a series, if it has ever been set.
    pub fn get(&self, family: GaugeFamily, labels: (&str, &str)) -> Option<f64> {
        self.series
            .read()
            .get(&SeriesKey::new(family, labels))
            .copied()
    }

    /// Get the current number of stored series.
    pub fn series_count(&self) -> usize {
        self.series.read().len()
    }

    /// Number of series stored for one family.
    pub fn family_count(&self, family: GaugeFamily) -> usize {
        self.series
            .read()
            .keys()
            .filter(|k| k.family == family)
            .count()
    }

    /// Render all gauges in Prometheus exposition format.
    ///
    /// Families are sorted by metric name and series by labels. Families that
    /// have never been set are omitted.
    pub fn render(&self) -> String {
        let series = self.series.read();
        let mut output = String::with_capacity(series.len() * 80);

        let mut by_family: BTreeMap<String, (GaugeFamily, Vec<(String, f64)>)> = BTreeMap::new();
        for (key, value) in series.iter() {
            by_family
                .entry(key.family.metric_name())
                .or_insert_with(|| (key.family, Vec::new()))
                .1
                .push((key.format_labels(), *value));
        }

        for (name, (family, mut lines)) in by_family {
            lines.sort_by(|a, b| a.0.cmp(&b.0));

            writeln!(output, "# HELP {} {}", name, family.help()).ok();
            writeln!(output, "# TYPE {} gauge", name).ok();
            for (labels, value) in lines {
                writeln!(output, "{}{} {}", name, labels, format_value(value)).ok();
            }
        }

        output
    }
}

impl MetricSink for GaugeRegistry {
    fn set_gauge(&self, family: GaugeFamily, labels: (&str, &str), value: f64) {
        trace!(
            metric = %family,
            first = labels.0,
            second = labels.1,
            value,
            "Set gauge"
        );
        self.series
            .write()
            .insert(SeriesKey::new(family, labels), value);
    }
}

/// Create a shareable registry handle.
pub type SharedRegistry = Arc<GaugeRegistry>;

/// Render the exporter's own ingest statistics.
pub fn render_exporter_metrics(
    prefix: &str,
    stats: &IngestSnapshot,
    series_count: usize,
    connected: bool,
) -> String {
    let mut output = String::new();

    let mut gauge = |name: &str, help: &str, value: u64| {
        writeln!(output, "# HELP {}_{} {}", prefix, name, help).ok();
        writeln!(output, "# TYPE {}_{} gauge", prefix, name).ok();
        writeln!(output, "{}_{} {}", prefix, name, value).ok();
    };
    gauge(
        "broker_connected",
        "Whether the MQTT session is connected",
        u64::from(connected),
    );
    gauge("series", "Number of gauge series held", series_count as u64);

    let mut counter = |name: &str, help: &str, value: u64| {
        writeln!(output, "# HELP {}_{}_total {}", prefix, name, help).ok();
        writeln!(output, "# TYPE {}_{}_total counter", prefix, name).ok();
        writeln!(output, "{}_{}_total {}", prefix, name, value).ok();
    };
    counter(
        "messages_received",
        "MQTT messages received",
        stats.messages_received,
    );
    counter(
        "messages_routed",
        "Messages matching a known topic convention",
        stats.messages_routed,
    );
    counter(
        "messages_ignored",
        "Messages on topics with no mapping",
        stats.messages_ignored,
    );
    counter(
        "payload_fallbacks",
        "Payloads that failed to decode and were read as zero",
        stats.payload_fallbacks,
    );
    counter("gauge_updates", "Gauge updates issued", stats.gauge_updates);

    output
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}
