//! Topic router: turns `(topic, payload)` pairs into gauge updates.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use mqtt2prom_common::{
    DeviceState, EnergyReading, Result, Topic, TopicKind, decode_report, parse_scalar,
};
use tracing::{debug, trace};

use crate::collector::{GaugeRegistry, MetricSink};
use crate::family::GaugeFamily;
use crate::rules;

/// What the router did with one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The topic is malformed or follows no known convention.
    Ignored,
    /// The message was mapped to gauge updates.
    Applied {
        kind: TopicKind,
        updates: usize,
        /// The payload could not be decoded and zero values were used.
        fallback: bool,
    },
}

/// Ingest counters, updated lock-free from any task.
#[derive(Debug, Default)]
pub struct IngestStats {
    messages_received: AtomicU64,
    messages_routed: AtomicU64,
    messages_ignored: AtomicU64,
    payload_fallbacks: AtomicU64,
    gauge_updates: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSnapshot {
    pub messages_received: u64,
    pub messages_routed: u64,
    pub messages_ignored: u64,
    pub payload_fallbacks: u64,
    pub gauge_updates: u64,
}

impl IngestStats {
    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_routed: self.messages_routed.load(Ordering::Relaxed),
            messages_ignored: self.messages_ignored.load(Ordering::Relaxed),
            payload_fallbacks: self.payload_fallbacks.load(Ordering::Relaxed),
            gauge_updates: self.gauge_updates.load(Ordering::Relaxed),
        }
    }
}

/// Routes inbound messages to the mapping rules.
///
/// Malformed payloads never fail a message: they are read as zero values so
/// ingestion of later messages is unaffected.
pub struct Router<S> {
    sink: Arc<S>,
    stats: IngestStats,
}

impl<S: MetricSink> Router<S> {
    pub fn new(sink: Arc<S>) -> Self {
        Self {
            sink,
            stats: IngestStats::default(),
        }
    }

    /// The sink receiving gauge updates.
    pub fn sink(&self) -> &Arc<S> {
        &self.sink
    }

    pub fn stats(&self) -> IngestSnapshot {
        self.stats.snapshot()
    }

    /// Route one message.
    pub fn route(&self, topic: &str, payload: &[u8]) -> RouteOutcome {
        self.stats.messages_received.fetch_add(1, Ordering::Relaxed);

        let Some((parsed, kind)) = Topic::parse(topic).and_then(|t| t.kind().map(|k| (t, k)))
        else {
            self.stats.messages_ignored.fetch_add(1, Ordering::Relaxed);
            trace!(topic, "No mapping for topic");
            return RouteOutcome::Ignored;
        };

        let sink = self.sink.as_ref();
        let (updates, fallback) = match kind {
            TopicKind::Temperature | TopicKind::Humidity => {
                let family = if kind == TopicKind::Temperature {
                    GaugeFamily::Temperature
                } else {
                    GaugeFamily::Humidity
                };
                let (value, fallback) = self.or_zero(topic, parse_scalar(payload));
                let updates =
                    rules::apply_scalar(sink, family, parsed.label2, parsed.label3, value);
                (updates, fallback)
            }
            TopicKind::State => {
                let (state, fallback) =
                    self.or_zero(topic, decode_report::<DeviceState>(payload));
                trace!(topic, ?state, "Device state report");
                let updates = rules::apply_state(sink, &state, parsed.label2, parsed.label1);
                (updates, fallback)
            }
            TopicKind::Sensor => {
                let (reading, fallback) =
                    self.or_zero(topic, decode_report::<EnergyReading>(payload));
                trace!(topic, ?reading, "Energy sensor report");
                let updates = rules::apply_sensor(sink, &reading, parsed.label2, parsed.label1);
                (updates, fallback)
            }
        };

        self.stats.messages_routed.fetch_add(1, Ordering::Relaxed);
        self.stats
            .gauge_updates
            .fetch_add(updates as u64, Ordering::Relaxed);

        RouteOutcome::Applied {
            kind,
            updates,
            fallback,
        }
    }

    /// Unwrap a decoded payload, substituting the zero value on failure.
    fn or_zero<T: Default>(&self, topic: &str, decoded: Result<T>) -> (T, bool) {
        match decoded {
            Ok(value) => (value, false),
            Err(e) => {
                self.stats.payload_fallbacks.fetch_add(1, Ordering::Relaxed);
                debug!(topic, error = %e, "Undecodable payload, using zero values");
                (T::default(), true)
            }
        }
    }
}

/// Create a shareable router handle.
pub type SharedRouter = Arc<Router<GaugeRegistry>>;

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    type Update = (GaugeFamily, String, String, f64);

    /// Sink that records every update in call order.
    #[derive(Default)]
    struct RecordingSink {
        updates: Mutex<Vec<Update>>,
    }

    impl RecordingSink {
        fn take(&self) -> Vec<Update> {
            std::mem::take(&mut *self.updates.lock())
        }
    }

    impl MetricSink for RecordingSink {
        fn set_gauge(&self, family: GaugeFamily, labels: (&str, &str), value: f64) {
            self.updates
                .lock()
                .push((family, labels.0.to_string(), labels.1.to_string(), value));
        }
    }

    fn update(family: GaugeFamily, first: &str, second: &str, value: f64) -> Update {
        (family, first.to_string(), second.to_string(), value)
    }

    fn router() -> Router<RecordingSink> {
        Router::new(Arc::new(RecordingSink::default()))
    }

    #[test]
    fn test_route_temperature() {
        let router = router();

        let outcome = router.route("temperature/livingroom/ceiling", b"23.5");

        assert_eq!(
            outcome,
            RouteOutcome::Applied {
                kind: TopicKind::Temperature,
                updates: 1,
                fallback: false,
            }
        );
        assert_eq!(
            router.sink().take(),
            vec![update(GaugeFamily::Temperature, "livingroom", "ceiling", 23.5)]
        );
    }

    #[test]
    fn test_route_humidity() {
        let router = router();

        router.route("humidity/bathroom/mirror", b"71");

        assert_eq!(
            router.sink().take(),
            vec![update(GaugeFamily::Humidity, "bathroom", "mirror", 71.0)]
        );
    }

    #[test]
    fn test_route_unparsable_scalar_reads_as_zero() {
        let router = router();

        let outcome = router.route("temperature/garage/floor", b"n/a");

        assert_eq!(
            outcome,
            RouteOutcome::Applied {
                kind: TopicKind::Temperature,
                updates: 1,
                fallback: true,
            }
        );
        assert_eq!(
            router.sink().take(),
            vec![update(GaugeFamily::Temperature, "garage", "floor", 0.0)]
        );
        assert_eq!(router.stats().payload_fallbacks, 1);
    }

    #[test]
    fn test_route_state() {
        let router = router();

        router.route(
            "tele/sonoffA/STATE",
            br#"{"Vcc":3.3,"Wifi":{"RSSI":-60},"POWER":"ON","POWER1":"OFF"}"#,
        );

        assert_eq!(
            router.sink().take(),
            vec![
                update(GaugeFamily::Vcc, "sonoffA", "tele", 3.3),
                update(GaugeFamily::Rssi, "sonoffA", "tele", -60.0),
                update(GaugeFamily::Power, "sonoffA", "tele", 1.0),
                update(GaugeFamily::Power, "sonoffA1", "tele", 0.0),
            ]
        );
    }

    #[test]
    fn test_route_sensor() {
        let router = router();

        router.route(
            "tele/sonoffB/SENSOR",
            br#"{"ENERGY":{"Current":0.5,"Voltage":230,"Power":115,"Today":1.2}}"#,
        );

        assert_eq!(
            router.sink().take(),
            vec![
                update(GaugeFamily::Current, "sonoffB", "tele", 0.5),
                update(GaugeFamily::Voltage, "sonoffB", "tele", 230.0),
                update(GaugeFamily::Power, "sonoffB", "tele", 115.0),
                update(GaugeFamily::Total, "sonoffB", "tele", 1.2),
            ]
        );
    }

    #[test]
    fn test_route_malformed_report_uses_zero_values() {
        let router = router();

        let outcome = router.route("tele/plug/SENSOR", b"{not json");

        assert_eq!(
            outcome,
            RouteOutcome::Applied {
                kind: TopicKind::Sensor,
                updates: 4,
                fallback: true,
            }
        );
        assert_eq!(
            router.sink().take(),
            vec![
                update(GaugeFamily::Current, "plug", "tele", 0.0),
                update(GaugeFamily::Voltage, "plug", "tele", 0.0),
                update(GaugeFamily::Power, "plug", "tele", 0.0),
                update(GaugeFamily::Total, "plug", "tele", 0.0),
            ]
        );
    }

    #[test]
    fn test_route_wrong_segment_count_never_touches_sink() {
        let router = router();

        for topic in [
            "",
            "temperature",
            "temperature/livingroom",
            "temperature/livingroom/ceiling/extra",
            "tele/sonoffA/STATE/x",
            "tele//STATE",
            "/sonoffA/STATE",
        ] {
            assert_eq!(router.route(topic, b"23.5"), RouteOutcome::Ignored, "{topic}");
        }

        assert!(router.sink().take().is_empty());
        assert_eq!(router.stats().messages_ignored, 7);
    }

    #[test]
    fn test_route_unknown_convention_is_ignored() {
        let router = router();

        assert_eq!(router.route("tele/sonoffA/LWT", b"Online"), RouteOutcome::Ignored);
        assert_eq!(router.route("cmnd/sonoffA/POWER", b"ON"), RouteOutcome::Ignored);
        assert_eq!(router.route("pressure/attic/beam", b"1013"), RouteOutcome::Ignored);

        assert!(router.sink().take().is_empty());
    }

    #[test]
    fn test_route_dispatches_one_branch_only() {
        let router = router();

        // Matches both the temperature prefix and the STATE keyword
        let outcome = router.route("temperature/sonoffA/STATE", b"19.5");

        assert!(matches!(
            outcome,
            RouteOutcome::Applied {
                kind: TopicKind::Temperature,
                ..
            }
        ));
        assert_eq!(
            router.sink().take(),
            vec![update(GaugeFamily::Temperature, "sonoffA", "STATE", 19.5)]
        );
    }

    #[test]
    fn test_malformed_payload_does_not_stall_next_message() {
        let router = router();

        router.route("tele/plug/STATE", b"\xff\xfe garbage");
        router.sink().take();

        router.route("temperature/kitchen/wall", b"21.25");

        assert_eq!(
            router.sink().take(),
            vec![update(GaugeFamily::Temperature, "kitchen", "wall", 21.25)]
        );
    }

    #[test]
    fn test_stats() {
        let router = router();

        router.route("temperature/kitchen/wall", b"21");
        router.route("tele/plug/STATE", br#"{"POWER":"ON"}"#);
        router.route("tele/plug/LWT", b"Online");
        router.route("humidity/kitchen/wall", b"?");

        let stats = router.stats();
        assert_eq!(stats.messages_received, 4);
        assert_eq!(stats.messages_routed, 3);
        assert_eq!(stats.messages_ignored, 1);
        assert_eq!(stats.payload_fallbacks, 1);
        assert_eq!(stats.gauge_updates, 1 + 3 + 1);
    }

    #[test]
    fn test_route_into_registry_overwrites() {
        let registry = Arc::new(GaugeRegistry::new());
        let router = Router::new(registry.clone());

        router.route("temperature/kitchen/wall", b"21");
        router.route("temperature/kitchen/wall", b"22.5");

        assert_eq!(
            registry.get(GaugeFamily::Temperature, ("kitchen", "wall")),
            Some(22.5)
        );
        assert_eq!(registry.series_count(), 1);
    }
}
