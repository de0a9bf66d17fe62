//! MQTT to Prometheus bridge.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use mqtt2prom_common::{ConnectionState, init_tracing};
use mqtt2prom_exporter::{
    ExporterConfig, GaugeRegistry, HttpServer, MqttSubscriber, Router, join_subscriber,
};

/// Upper bound for tasks to finish after shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Export MQTT device telemetry as Prometheus metrics.
#[derive(Parser, Debug)]
#[command(name = "mqtt2prom")]
#[command(about = "Export MQTT device telemetry as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// MQTT broker address as host:port (overrides config).
    #[arg(short, long)]
    broker: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error). Overrides config.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ExporterConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => ExporterConfig::default(),
    };

    if let Some(broker) = &args.broker {
        config.mqtt.set_address(broker)?;
    }
    if let Some(listen) = args.listen {
        config.prometheus.listen = listen;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_tracing(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        broker = %config.mqtt.address(),
        "Starting mqtt2prom"
    );

    let listen_addr: SocketAddr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

    let router = Arc::new(Router::new(Arc::new(GaugeRegistry::new())));

    let subscriber = MqttSubscriber::new(router.clone(), config.mqtt.clone(), state_tx);
    let http_server = HttpServer::new(
        router.clone(),
        state_rx,
        listen_addr,
        config.prometheus.path.clone(),
        config.prometheus.prefix.clone(),
    );

    let mut subscriber_task = tokio::spawn(subscriber.run(shutdown_rx.clone()));
    let mut http_task = tokio::spawn(http_server.run(shutdown_rx));

    let outcome = tokio::select! {
        signal = shutdown_signal() => {
            let signal = signal?;
            info!(signal, "Shutting down");
            shutdown_tx.send_replace(true);

            let (subscriber, http) = tokio::join!(
                join_subscriber(subscriber_task, SHUTDOWN_GRACE),
                tokio::time::timeout(SHUTDOWN_GRACE, http_task),
            );
            if http.is_err() {
                warn!("HTTP server did not stop within the grace period");
            }
            subscriber
        }
        joined = &mut subscriber_task => {
            shutdown_tx.send_replace(true);
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, http_task).await;
            joined.context("Subscriber task panicked").and_then(|result| result)
        }
        joined = &mut http_task => {
            shutdown_tx.send_replace(true);
            let http = joined.context("HTTP server task panicked").and_then(|result| result);
            let subscriber = join_subscriber(subscriber_task, SHUTDOWN_GRACE).await;

            if let (Err(_), Err(e)) = (&http, &subscriber) {
                error!(error = %e, "Subscriber failed during shutdown");
            }
            http.and(subscriber)
        }
    };

    let stats = router.stats();
    info!(
        messages_received = stats.messages_received,
        messages_routed = stats.messages_routed,
        messages_ignored = stats.messages_ignored,
        payload_fallbacks = stats.payload_fallbacks,
        series_count = router.sink().series_count(),
        "Final statistics"
    );

    if let Err(e) = &outcome {
        error!(error = %e, "mqtt2prom stopped with an error");
    } else {
        info!("mqtt2prom stopped");
    }
    outcome
}

/// Wait for Ctrl+C or SIGTERM, returning the signal name.
async fn shutdown_signal() -> anyhow::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                Ok("SIGINT")
            }
            _ = sigterm.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("Ctrl+C")
    }
}
