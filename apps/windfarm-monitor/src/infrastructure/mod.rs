//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// MQTT broker adapters: wire types, decoding, reconnection, transport.
pub mod mqtt;

/// Farm history REST client.
pub mod history;

/// Broadcast channel adapters for event distribution.
pub mod broadcast;

/// Configuration loading.
pub mod config;

/// Health check, metrics and snapshot HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing.
pub mod telemetry;
