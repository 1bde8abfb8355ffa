//! Port Interfaces
//!
//! Contracts between the application layer and the outside world, following
//! the Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `BrokerTransport` / `BrokerSession`: one connection to the MQTT broker
//! - `BrokerPublisher`: outbound messages on a live session
//! - `HistoryPort`: the farm history REST API

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::history::{AlertHistoryPage, AlertHistoryQuery, HistoricalDataPoint, TurbineHistory};

// =============================================================================
// Broker
// =============================================================================

/// Something that happened on a live broker session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A message arrived on a subscribed topic.
    Message {
        /// Topic the message was published on.
        topic: String,
        /// Raw payload.
        payload: Vec<u8>,
    },
    /// The client lost contact with the broker but the session is not torn
    /// down yet. A `Closed` event follows.
    Offline,
    /// The session ended.
    Closed {
        /// Why the session ended.
        reason: String,
    },
}

/// Errors raised by the broker transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Handshake with the broker failed.
    #[error("failed to connect to broker: {0}")]
    Connect(String),

    /// Subscription request was rejected or could not be sent.
    #[error("failed to subscribe to {filter}: {reason}")]
    Subscribe {
        /// Topic filter.
        filter: String,
        /// Failure reason.
        reason: String,
    },

    /// Publish request could not be sent.
    #[error("failed to publish to {topic}: {reason}")]
    Publish {
        /// Target topic.
        topic: String,
        /// Failure reason.
        reason: String,
    },

    /// No live session.
    #[error("not connected to broker")]
    NotConnected,
}

/// Opens broker sessions.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Open a session and complete the handshake.
    async fn open(&self) -> Result<Box<dyn BrokerSession>, TransportError>;
}

/// One live broker session.
#[async_trait]
pub trait BrokerSession: Send {
    /// Subscribe to a topic filter at at-least-once delivery.
    async fn subscribe(&mut self, filter: &str) -> Result<(), TransportError>;

    /// Wait for the next session event.
    async fn next_event(&mut self) -> SessionEvent;

    /// Handle for publishing while the session is driven elsewhere.
    fn publisher(&self) -> Arc<dyn BrokerPublisher>;

    /// Close the session cleanly.
    async fn close(&mut self);
}

/// Publishes on a live session.
#[async_trait]
pub trait BrokerPublisher: Send + Sync {
    /// Publish `payload` on `topic` at at-least-once delivery.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;
}

// =============================================================================
// History
// =============================================================================

/// Errors raised by the history API.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// The API answered with a non-success status.
    #[error("history API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Server-provided message, or a generic one.
        message: String,
    },

    /// The request did not complete.
    #[error("history API request failed: {0}")]
    Network(String),

    /// The response body could not be decoded.
    #[error("invalid history API response: {0}")]
    Decode(String),

    /// The client could not be built.
    #[error("invalid history API configuration: {0}")]
    Config(String),
}

/// Farm history REST API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryPort: Send + Sync {
    /// Samples for one turbine between `from` and `to`.
    async fn turbine_history(
        &self,
        turbine_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<TurbineHistory, HistoryError>;

    /// Samples for all turbines between `from` and `to`.
    async fn all_turbines_history(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<HistoricalDataPoint>, HistoryError>;

    /// One page of stored alerts.
    async fn alerts_history(&self, query: AlertHistoryQuery) -> Result<AlertHistoryPage, HistoryError>;

    /// Record an acknowledgement.
    async fn acknowledge_alert(&self, alert_id: &str) -> Result<(), HistoryError>;

    /// Record a resolution.
    async fn resolve_alert(&self, alert_id: &str) -> Result<(), HistoryError>;
}
