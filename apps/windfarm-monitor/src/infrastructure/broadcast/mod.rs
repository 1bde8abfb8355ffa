//! Broadcast Channel Adapters
//!
//! Fan-out of applied farm events to any number of consumers using tokio
//! broadcast channels.
//!
//! # Architecture
//!
//! The `BroadcastHub` keeps one channel per event category:
//! - Turbine telemetry
//! - Alerts (as stored, with their generated ids)
//! - Farm statistics
//! - Broker connection state
//!
//! A consumer that falls behind sees `RecvError::Lagged` and skips ahead;
//! ingestion never waits on consumers.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::application::services::ConnectionStatus;
use crate::domain::farm::{Alert, FarmStatistics, TelemetryUpdate};
use crate::infrastructure::config::BroadcastSettings;

// =============================================================================
// Broadcast Messages
// =============================================================================

/// Telemetry broadcast message.
#[derive(Debug, Clone)]
pub struct TelemetryBroadcast {
    /// The applied telemetry.
    pub update: TelemetryUpdate,
}

/// Alert broadcast message.
#[derive(Debug, Clone)]
pub struct AlertBroadcast {
    /// The stored alert.
    pub alert: Alert,
}

/// Statistics broadcast message.
#[derive(Debug, Clone)]
pub struct StatisticsBroadcast {
    /// The applied statistics.
    pub statistics: Arc<FarmStatistics>,
}

/// Connection state broadcast message.
#[derive(Debug, Clone)]
pub struct ConnectionBroadcast {
    /// Connection status after the change.
    pub status: ConnectionStatus,
}

// =============================================================================
// Broadcast Hub
// =============================================================================

/// Central hub for all broadcast channels.
///
/// # Example
///
/// ```rust
/// use windfarm_monitor::infrastructure::broadcast::BroadcastHub;
///
/// let hub = BroadcastHub::with_defaults();
/// let mut alerts = hub.alerts_rx();
/// assert_eq!(hub.alerts_receiver_count(), 1);
/// ```
#[derive(Debug)]
#[allow(clippy::struct_field_names)]
pub struct BroadcastHub {
    telemetry_tx: broadcast::Sender<TelemetryBroadcast>,
    alerts_tx: broadcast::Sender<AlertBroadcast>,
    statistics_tx: broadcast::Sender<StatisticsBroadcast>,
    connection_tx: broadcast::Sender<ConnectionBroadcast>,
}

impl BroadcastHub {
    /// Create a hub with the given channel capacities.
    #[must_use]
    pub fn new(settings: &BroadcastSettings) -> Self {
        Self {
            telemetry_tx: broadcast::channel(settings.telemetry_capacity).0,
            alerts_tx: broadcast::channel(settings.alerts_capacity).0,
            statistics_tx: broadcast::channel(settings.statistics_capacity).0,
            connection_tx: broadcast::channel(settings.connection_capacity).0,
        }
    }

    /// Create a hub with default capacities.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(&BroadcastSettings::default())
    }

    // =========================================================================
    // Telemetry Channel
    // =========================================================================

    /// Send telemetry to all subscribers.
    ///
    /// Returns the number of receivers, or `None` if nobody is listening.
    #[must_use]
    pub fn send_telemetry(&self, update: TelemetryUpdate) -> Option<usize> {
        self.telemetry_tx.send(TelemetryBroadcast { update }).ok()
    }

    /// New telemetry receiver.
    #[must_use]
    pub fn telemetry_rx(&self) -> broadcast::Receiver<TelemetryBroadcast> {
        self.telemetry_tx.subscribe()
    }

    /// Active telemetry receivers.
    #[must_use]
    pub fn telemetry_receiver_count(&self) -> usize {
        self.telemetry_tx.receiver_count()
    }

    // =========================================================================
    // Alert Channel
    // =========================================================================

    /// Send a stored alert to all subscribers.
    #[must_use]
    pub fn send_alert(&self, alert: Alert) -> Option<usize> {
        self.alerts_tx.send(AlertBroadcast { alert }).ok()
    }

    /// New alert receiver.
    #[must_use]
    pub fn alerts_rx(&self) -> broadcast::Receiver<AlertBroadcast> {
        self.alerts_tx.subscribe()
    }

    /// Active alert receivers.
    #[must_use]
    pub fn alerts_receiver_count(&self) -> usize {
        self.alerts_tx.receiver_count()
    }

    // =========================================================================
    // Statistics Channel
    // =========================================================================

    /// Send farm statistics to all subscribers.
    #[must_use]
    pub fn send_statistics(&self, statistics: Arc<FarmStatistics>) -> Option<usize> {
        self.statistics_tx
            .send(StatisticsBroadcast { statistics })
            .ok()
    }

    /// New statistics receiver.
    #[must_use]
    pub fn statistics_rx(&self) -> broadcast::Receiver<StatisticsBroadcast> {
        self.statistics_tx.subscribe()
    }

    /// Active statistics receivers.
    #[must_use]
    pub fn statistics_receiver_count(&self) -> usize {
        self.statistics_tx.receiver_count()
    }

    // =========================================================================
    // Connection Channel
    // =========================================================================

    /// Send a connection state change to all subscribers.
    #[must_use]
    pub fn send_connection(&self, status: ConnectionStatus) -> Option<usize> {
        self.connection_tx.send(ConnectionBroadcast { status }).ok()
    }

    /// New connection state receiver.
    #[must_use]
    pub fn connection_rx(&self) -> broadcast::Receiver<ConnectionBroadcast> {
        self.connection_tx.subscribe()
    }

    /// Active connection state receivers.
    #[must_use]
    pub fn connection_receiver_count(&self) -> usize {
        self.connection_tx.receiver_count()
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Receiver counts for every channel.
    #[must_use]
    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            telemetry_receivers: self.telemetry_receiver_count(),
            alerts_receivers: self.alerts_receiver_count(),
            statistics_receivers: self.statistics_receiver_count(),
            connection_receivers: self.connection_receiver_count(),
        }
    }
}

/// Shared broadcast hub reference.
pub type SharedBroadcastHub = Arc<BroadcastHub>;

/// Receiver counts per channel.
#[derive(Debug, Clone, Default)]
pub struct BroadcastStats {
    /// Telemetry receivers.
    pub telemetry_receivers: usize,
    /// Alert receivers.
    pub alerts_receivers: usize,
    /// Statistics receivers.
    pub statistics_receivers: usize,
    /// Connection state receivers.
    pub connection_receivers: usize,
}

impl BroadcastStats {
    /// Receivers across all channels.
    #[must_use]
    pub const fn total_receivers(&self) -> usize {
        self.telemetry_receivers
            + self.alerts_receivers
            + self.statistics_receivers
            + self.connection_receivers
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::farm::{AlertSeverity, AlertType};
    use tokio::sync::broadcast::error::RecvError;

    fn make_alert(id: &str) -> Alert {
        Alert {
            id: id.to_string(),
            turbine_id: "3".to_string(),
            turbine_name: "Turbine 3".to_string(),
            alert_type: AlertType::Mechanical,
            severity: AlertSeverity::Critical,
            message: "Vibración excesiva".to_string(),
            timestamp: "2025-06-01T12:00:00Z".to_string(),
            acknowledged: false,
            resolved_at: None,
        }
    }

    #[test]
    fn receiver_counts_follow_subscriptions() {
        let hub = BroadcastHub::with_defaults();
        assert_eq!(hub.stats().total_receivers(), 0);

        let _telemetry = hub.telemetry_rx();
        {
            let _alerts = hub.alerts_rx();
            let _connection = hub.connection_rx();
            assert_eq!(hub.stats().total_receivers(), 3);
        }

        let stats = hub.stats();
        assert_eq!(stats.telemetry_receivers, 1);
        assert_eq!(stats.alerts_receivers, 0);
        assert_eq!(stats.total_receivers(), 1);
    }

    #[tokio::test]
    async fn every_subscriber_receives_the_alert() {
        let hub = BroadcastHub::with_defaults();
        let mut first = hub.alerts_rx();
        let mut second = hub.alerts_rx();

        assert_eq!(hub.send_alert(make_alert("a-1")), Some(2));

        assert_eq!(first.recv().await.unwrap().alert.id, "a-1");
        assert_eq!(second.recv().await.unwrap().alert.id, "a-1");
    }

    #[test]
    fn send_without_receivers_returns_none() {
        let hub = BroadcastHub::with_defaults();
        assert!(hub.send_alert(make_alert("a-1")).is_none());
        assert!(hub.send_connection(ConnectionStatus::default()).is_none());
    }

    #[tokio::test]
    async fn slow_consumer_lags_instead_of_blocking() {
        let hub = BroadcastHub::new(&BroadcastSettings {
            alerts_capacity: 2,
            ..BroadcastSettings::default()
        });
        let mut rx = hub.alerts_rx();

        for index in 0..5 {
            let _ = hub.send_alert(make_alert(&format!("a-{index}")));
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(rx.recv().await.unwrap().alert.id, "a-3");
    }
}
