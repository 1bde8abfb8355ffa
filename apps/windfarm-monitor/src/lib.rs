#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Wind Farm Monitor - Telemetry Ingestion Service
//!
//! Keeps a single MQTT connection to the wind farm broker, decodes turbine
//! telemetry, alerts and farm statistics, and folds them into an in-memory
//! farm snapshot that dashboard consumers read and subscribe to.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Farm model and reducer
//!   - `farm`: Turbines, alerts, statistics
//!   - `state`: Farm snapshot and the transitions applied to it
//!   - `history`: Historical query results
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Broker transport and history API interfaces
//!   - `services`: The `WindFarmService` façade
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `mqtt`: Wire messages, decoder, reconnection, `rumqttc` transport
//!   - `history`: REST client for the history API
//!   - `broadcast`: Channel-based event distribution
//!   - `config`: Environment configuration
//!   - `health`: Health, metrics and snapshot HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//!                  ┌──────────────┐     ┌─────────────┐     ┌─────────────┐
//! MQTT broker ────►│  Transport   │────►│  FarmStore  │────►│  Broadcast  │──► Consumer 1
//!                  │   Manager    │     │  (reducer)  │     │    Hub      │──► Consumer N
//!                  └──────────────┘     └─────────────┘     └─────────────┘
//! History API ◄──── WindFarmService (history queries, acknowledge, resolve)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Farm model and reducer with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::farm::{
    Alert, AlertSeverity, AlertType, FarmStatistics, TelemetryUpdate, Turbine, TurbineStatus,
};
pub use domain::state::{FarmSnapshot, FarmStore, MAX_PLACEHOLDER_TURBINES, MAX_RETAINED_ALERTS};

// Application
pub use application::ports::{HistoryError, HistoryPort, TransportError};
pub use application::services::{ConnectionStatus, WindFarmService};

// Infrastructure config
pub use infrastructure::config::{
    BroadcastSettings, ConfigError, HistorySettings, MonitorConfig, MqttSettings, ServerSettings,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Broadcast hub (for integration tests)
pub use infrastructure::broadcast::{BroadcastHub, BroadcastStats, SharedBroadcastHub};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
