//! Health Check, Metrics and Snapshot Endpoint
//!
//! HTTP endpoint for health checks, broker connection reporting, Prometheus
//! metrics and the read-only farm snapshot.
//!
//! # Endpoints
//!
//! - `GET /health` - JSON health status
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /readyz` - Readiness probe (503 while the broker is disconnected)
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /api/snapshot` - Current farm snapshot as camelCase JSON

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::{ConnectionStatus, WindFarmService};
use crate::domain::farm::TurbineStatus;
use crate::domain::state::FarmSnapshot;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Broker connection.
    pub broker: ConnectionStatus,
    /// Farm state summary.
    pub farm: FarmSummary,
    /// Total broadcast receivers.
    pub broadcast_receivers: usize,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Broker connected.
    Healthy,
    /// Serving the last known snapshot without a broker connection.
    Degraded,
}

/// Farm state summary.
#[derive(Debug, Clone, Serialize)]
pub struct FarmSummary {
    /// Turbines tracked.
    pub turbines: usize,
    /// Turbines currently operational.
    pub operational: usize,
    /// Turbines currently in fault.
    pub faulted: usize,
    /// Installed capacity in MW.
    pub installed_capacity_mw: f64,
    /// Alerts retained.
    pub alerts: usize,
    /// Unresolved alerts.
    pub active_alerts: usize,
    /// Alerts not yet acknowledged.
    pub unacknowledged_alerts: usize,
    /// Last telemetry or statistics update.
    pub last_update: Option<DateTime<Utc>>,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    service: Arc<WindFarmService>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(version: String, service: Arc<WindFarmService>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            service,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

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
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

/// Routes served by the health server.
pub fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/snapshot", get(snapshot_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(build_health_response(&state)))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.service.is_connected() {
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
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

async fn snapshot_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    Json(FarmSnapshot::clone(&state.service.snapshot()))
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let broker = state.service.connection_status();
    let snapshot = state.service.snapshot();

    HealthResponse {
        status: determine_health_status(&broker),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        broker,
        farm: FarmSummary {
            turbines: snapshot.turbines.len(),
            operational: snapshot.count_by_status(TurbineStatus::Operational),
            faulted: snapshot.count_by_status(TurbineStatus::Fault),
            installed_capacity_mw: snapshot.installed_capacity(),
            alerts: snapshot.alerts.len(),
            active_alerts: snapshot.active_alerts().count(),
            unacknowledged_alerts: snapshot.unacknowledged_count(),
            last_update: snapshot.last_update,
        },
        broadcast_receivers: state.service.hub().stats().total_receivers(),
    }
}

const fn determine_health_status(broker: &ConnectionStatus) -> HealthStatus {
    if broker.connected {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
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
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::application::ports::{
        BrokerSession, BrokerTransport, MockHistoryPort, TransportError,
    };
    use crate::infrastructure::broadcast::BroadcastHub;
    use crate::infrastructure::mqtt::ReconnectConfig;

    struct RefusingTransport;

    #[async_trait]
    impl BrokerTransport for RefusingTransport {
        async fn open(&self) -> Result<Box<dyn BrokerSession>, TransportError> {
            Err(TransportError::Connect("connection refused".to_string()))
        }
    }

    fn test_state() -> Arc<HealthServerState> {
        let service = WindFarmService::new(
            Arc::new(RefusingTransport),
            ReconnectConfig::default(),
            Arc::new(MockHistoryPort::new()),
            Arc::new(BroadcastHub::with_defaults()),
        );
        Arc::new(HealthServerState::new("0.1.0".to_string(), Arc::new(service)))
    }

    async fn get_body(state: Arc<HealthServerState>, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
    }

    #[test]
    fn connected_broker_is_healthy() {
        let status = ConnectionStatus {
            connected: true,
            ..ConnectionStatus::default()
        };
        assert_eq!(determine_health_status(&status), HealthStatus::Healthy);
        assert_eq!(
            determine_health_status(&ConnectionStatus::default()),
            HealthStatus::Degraded
        );
    }

    #[tokio::test]
    async fn liveness_is_always_ok() {
        let (status, body) = get_body(test_state(), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }

    #[tokio::test]
    async fn readiness_fails_while_disconnected() {
        let (status, _) = get_body(test_state(), "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn health_reports_degraded_farm_summary() {
        let (status, body) = get_body(test_state(), "/health").await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["version"], "0.1.0");
        assert_eq!(json["broker"]["connected"], false);
        assert_eq!(json["farm"]["turbines"], 0);
    }

    #[tokio::test]
    async fn snapshot_is_served_as_camel_case_json() {
        let (status, body) = get_body(test_state(), "/api/snapshot").await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert!(json["turbines"].as_object().unwrap().is_empty());
        assert!(json["alerts"].as_array().unwrap().is_empty());
        assert!(json.get("lastUpdate").is_some());
    }
}
