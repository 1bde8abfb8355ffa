//! Wind Farm Monitor Binary
//!
//! Starts the telemetry ingestion service.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin windfarm-monitor
//! ```
//!
//! # Environment Variables
//!
//! - `MQTT_BROKER_URL`: Broker endpoint (default: `ws://localhost:8083/mqtt`)
//! - `MQTT_USERNAME` / `MQTT_PASSWORD`: Optional broker credentials
//! - `MQTT_CLIENT_ID`: Client identifier (default: generated)
//! - `MQTT_RECONNECT_DELAY_MS`: Delay before each reconnect (default: 5000)
//! - `MQTT_MAX_RECONNECT_ATTEMPTS`: Reconnect bound (default: 5)
//! - `MQTT_RECONNECT_MULTIPLIER`: Delay growth per attempt (default: 1.0, fixed)
//! - `MQTT_RECONNECT_MAX_DELAY_MS`: Delay cap (default: the reconnect delay)
//! - `MQTT_RECONNECT_JITTER`: Delay spread in `[0, 1]` (default: 0)
//! - `HISTORY_API_BASE_URL`: History API (default: <http://localhost:5000/api>)
//! - `HISTORY_API_KEY`: Optional bearer token
//! - `MONITOR_HTTP_PORT`: Health and snapshot HTTP port (default: 8090)
//! - `MONITOR_AUTO_CONNECT`: Connect at startup (default: true)
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use windfarm_monitor::infrastructure::broadcast::BroadcastHub;
use windfarm_monitor::infrastructure::health::{HealthServer, HealthServerState};
use windfarm_monitor::infrastructure::history::HistoryClient;
use windfarm_monitor::infrastructure::mqtt::{ReconnectConfig, RumqttTransport};
use windfarm_monitor::infrastructure::telemetry;
use windfarm_monitor::{MonitorConfig, WindFarmService, init_metrics};

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting wind farm monitor");

    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder not installed");
    }

    let config = MonitorConfig::from_env().context("invalid monitor configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let broadcast_hub = Arc::new(BroadcastHub::new(&config.broadcast));
    let history =
        Arc::new(HistoryClient::new(&config.history).context("history API client setup failed")?);
    let transport = Arc::new(RumqttTransport::new(config.mqtt.clone()));

    let service = Arc::new(WindFarmService::new(
        transport,
        ReconnectConfig::from_mqtt_settings(&config.mqtt),
        history,
        broadcast_hub,
    ));
    service.start();

    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&service),
    ));
    let health_server = HealthServer::new(
        config.server.http_port,
        health_state,
        shutdown_token.clone(),
    );
    let health_handle = tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    if config.auto_connect {
        // Startup failures are not retried; the service stays up and
        // reports the error until a later connect succeeds.
        if let Err(e) = service.connect().await {
            tracing::error!(error = %e, "Initial broker connection failed");
        }
    } else {
        tracing::info!("Auto-connect disabled");
    }

    tracing::info!("Wind farm monitor ready");

    await_shutdown(shutdown_token).await;

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        service.shutdown().await;
        let _ = health_handle.await;
    })
    .await;
    if drained.is_err() {
        tracing::warn!("Shutdown timed out");
    }

    tracing::info!("Wind farm monitor stopped");
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &MonitorConfig) {
    tracing::info!(
        broker = %config.mqtt.endpoint.url,
        client_id = %config.mqtt.client_id,
        http_port = config.server.http_port,
        auto_connect = config.auto_connect,
        "Configuration loaded"
    );
    tracing::debug!(
        history_api = %config.history.base_url,
        max_reconnect_attempts = config.mqtt.max_reconnect_attempts,
        reconnect_delay_ms = config.mqtt.reconnect_delay.as_millis(),
        "Collaborator endpoints"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
