//! HTTP server for Prometheus metrics endpoint.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use mqtt2prom_common::ConnectionState;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::collector::render_exporter_metrics;
use crate::router::SharedRouter;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    router: SharedRouter,
    prefix: String,
    connection: watch::Receiver<ConnectionState>,
}

/// Create the HTTP router.
fn create_router(
    router: SharedRouter,
    connection: watch::Receiver<ConnectionState>,
    metrics_path: &str,
    prefix: &str,
) -> Router {
    let state = AppState {
        router,
        prefix: prefix.to_string(),
        connection,
    };

    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the metrics endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let registry = state.router.sink();
    let connected = state.connection.borrow().is_connected();

    let mut body = registry.render();
    body.push_str(&render_exporter_metrics(
        &state.prefix,
        &state.router.stats(),
        registry.series_count(),
        connected,
    ));

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// Handler for the /ready endpoint.
async fn ready_handler(State(state): State<AppState>) -> Response {
    let connection = *state.connection.borrow();

    if connection.is_connected() {
        (StatusCode::OK, "ready\n").into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("not ready - broker {}\n", connection.as_str()),
        )
            .into_response()
    }
}

/// HTTP server configuration.
pub struct HttpServer {
    router: SharedRouter,
    connection: watch::Receiver<ConnectionState>,
    listen_addr: SocketAddr,
    metrics_path: String,
    prefix: String,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(
        router: SharedRouter,
        connection: watch::Receiver<ConnectionState>,
        listen_addr: SocketAddr,
        metrics_path: String,
        prefix: String,
    ) -> Self {
        Self {
            router,
            connection,
            listen_addr,
            metrics_path,
            prefix,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let app = create_router(
            self.router,
            self.connection,
            &self.metrics_path,
            &self.prefix,
        );

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(
            addr = %self.listen_addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
