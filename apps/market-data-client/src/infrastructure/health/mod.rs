//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint reporting the data client's connection state, its active
//! subscriptions and Prometheus metrics.
//!
//! # Endpoints
//!
//! - `GET /health` - JSON health status
//! - `GET /healthz` - liveness probe (simple OK)
//! - `GET /readyz` - readiness probe (every channel connected)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::ports::DataClient;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Crate version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Client name.
    pub client: String,
    /// Whether every channel is connected.
    pub connected: bool,
    /// Keys with handlers, per channel.
    pub subscriptions: SubscriptionCounts,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Connected with a working dispatch loop.
    Healthy,
    /// Connected, but subscriptions could not be read.
    Degraded,
    /// Not connected.
    Unhealthy,
}

/// Number of subscribed keys per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubscriptionCounts {
    /// Symbols with tick handlers.
    pub ticks: usize,
    /// Bar types with bar handlers.
    pub bars: usize,
    /// Symbols with instrument handlers.
    pub instruments: usize,
}

// =============================================================================
// Health Server
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    client: Arc<dyn DataClient>,
}

impl HealthServerState {
    /// Create health state for a client.
    #[must_use]
    pub fn new(version: String, client: Arc<dyn DataClient>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            client,
        }
    }
}

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state).await;
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.client.is_connected() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

async fn subscription_counts(client: &dyn DataClient) -> Option<SubscriptionCounts> {
    Some(SubscriptionCounts {
        ticks: client.subscribed_ticks().await.ok()?.len(),
        bars: client.subscribed_bars().await.ok()?.len(),
        instruments: client.subscribed_instruments().await.ok()?.len(),
    })
}

async fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let connected = state.client.is_connected();
    let subscriptions = subscription_counts(state.client.as_ref()).await;

    HealthResponse {
        status: determine_health_status(connected, subscriptions.is_some()),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        client: state.client.name().to_string(),
        connected,
        subscriptions: subscriptions.unwrap_or_default(),
    }
}

const fn determine_health_status(connected: bool, dispatching: bool) -> HealthStatus {
    match (connected, dispatching) {
        (true, true) => HealthStatus::Healthy,
        (true, false) => HealthStatus::Degraded,
        (false, _) => HealthStatus::Unhealthy,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test]
    fn status_follows_connection_and_dispatch() {
        assert_eq!(determine_health_status(true, true), HealthStatus::Healthy);
        assert_eq!(determine_health_status(true, false), HealthStatus::Degraded);
        assert_eq!(determine_health_status(false, true), HealthStatus::Unhealthy);
    }

    #[test]
    fn counts_serialize_per_channel() {
        let counts = SubscriptionCounts {
            ticks: 2,
            bars: 1,
            instruments: 0,
        };
        assert_eq!(
            serde_json::to_string(&counts).unwrap(),
            r#"{"ticks":2,"bars":1,"instruments":0}"#
        );
    }
}
