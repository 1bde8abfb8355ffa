//! Application Services
//!
//! `WindFarmService` is the single entry point the presentation layer talks
//! to. It owns the broker transport manager, the farm state store and the
//! history collaborator, and republishes every applied event on the
//! broadcast hub.
//!
//! ```text
//! TransportManager ──mpsc──► event pump ──► FarmStore
//!                                  │
//!                                  └──────► BroadcastHub ──► consumers
//! ```

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{BrokerTransport, HistoryError, HistoryPort, TransportError};
use crate::domain::farm::FarmStatistics;
use crate::domain::history::{
    AlertHistoryPage, AlertHistoryQuery, HistoricalDataPoint, TurbineHistory,
};
use crate::domain::state::{FarmSnapshot, FarmStore, MAX_PLACEHOLDER_TURBINES};
use crate::infrastructure::broadcast::{
    AlertBroadcast, ConnectionBroadcast, SharedBroadcastHub, StatisticsBroadcast,
    TelemetryBroadcast,
};
use crate::infrastructure::metrics;
use crate::infrastructure::mqtt::{
    FeedEvent, MessageCategory, ReconnectConfig, ReconnectError, TransportManager,
};

/// Capacity of the ordered channel between the transport and the pump.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Error message shown after the broker connection drops unexpectedly.
pub const CONNECTION_LOST_MESSAGE: &str = "connection lost with the MQTT broker";

/// Broker connection state as seen by consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// A broker session is live.
    pub connected: bool,
    /// Last connection problem, cleared by a successful connect or an
    /// explicit disconnect.
    pub last_error: Option<String>,
    /// Current automatic reconnect attempt, 0 when none is pending.
    pub reconnect_attempt: u32,
}

/// Façade over the ingestion pipeline and the history collaborator.
pub struct WindFarmService {
    transport: TransportManager,
    store: Arc<FarmStore>,
    history: Arc<dyn HistoryPort>,
    hub: SharedBroadcastHub,
    status: Arc<RwLock<ConnectionStatus>>,
    events: Mutex<Option<mpsc::Receiver<FeedEvent>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl WindFarmService {
    /// Create the service. Call [`Self::start`] before connecting.
    #[must_use]
    pub fn new(
        transport: Arc<dyn BrokerTransport>,
        reconnect: ReconnectConfig,
        history: Arc<dyn HistoryPort>,
        hub: SharedBroadcastHub,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            transport: TransportManager::new(transport, reconnect, event_tx),
            store: Arc::new(FarmStore::new()),
            history,
            hub,
            status: Arc::new(RwLock::new(ConnectionStatus::default())),
            events: Mutex::new(Some(event_rx)),
            pump: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Spawn the event pump. Later calls do nothing.
    pub fn start(&self) {
        let Some(mut event_rx) = self.events.lock().take() else {
            tracing::debug!("Event pump already started");
            return;
        };

        let pump = EventPump {
            store: Arc::clone(&self.store),
            hub: Arc::clone(&self.hub),
            status: Arc::clone(&self.status),
        };
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    event = event_rx.recv() => match event {
                        Some(event) => pump.apply(event),
                        None => break,
                    },
                }
            }
            tracing::debug!("Event pump stopped");
        });
        *self.pump.lock() = Some(handle);
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to the broker and subscribe to the farm topics.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the handshake fails. The event pump
    /// records the same error as the connection's last error once it has
    /// applied every event queued before the failure.
    pub async fn connect(&self) -> Result<(), TransportError> {
        self.transport.connect().await
    }

    /// Disconnect from the broker and stop reconnecting.
    pub async fn disconnect(&self) {
        self.transport.disconnect().await;
    }

    /// Disconnect and stop the event pump.
    pub async fn shutdown(&self) {
        self.transport.disconnect().await;
        self.shutdown.cancel();

        let handle = self.pump.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "Event pump task failed");
        }
    }

    /// Current connection status.
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.status.read().clone()
    }

    /// Whether a broker session is live right now.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Publish a JSON command on the broker.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::NotConnected` without a live session.
    pub async fn publish_command(
        &self,
        topic: &str,
        payload: &serde_json::Value,
    ) -> Result<(), TransportError> {
        self.transport.publish(topic, payload).await
    }

    // =========================================================================
    // Farm State
    // =========================================================================

    /// Current farm snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<FarmSnapshot> {
        self.store.snapshot()
    }

    /// Acknowledge an alert upstream, then locally.
    ///
    /// Returns whether the alert was found in the local snapshot.
    ///
    /// # Errors
    ///
    /// Returns the collaborator's error; the local snapshot is left alone.
    pub async fn acknowledge_alert(&self, alert_id: &str) -> Result<bool, HistoryError> {
        self.history.acknowledge_alert(alert_id).await?;
        let found = self.store.apply_acknowledge(alert_id);
        if !found {
            tracing::debug!(alert_id, "Acknowledged alert not in snapshot");
        }
        Ok(found)
    }

    /// Resolve an alert upstream, then locally.
    ///
    /// Returns whether the alert was found in the local snapshot.
    ///
    /// # Errors
    ///
    /// Returns the collaborator's error; the local snapshot is left alone.
    pub async fn resolve_alert(&self, alert_id: &str) -> Result<bool, HistoryError> {
        self.history.resolve_alert(alert_id).await?;
        let found = self.store.apply_resolve(alert_id);
        if !found {
            tracing::debug!(alert_id, "Resolved alert not in snapshot");
        }
        Ok(found)
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Stored samples for one turbine.
    ///
    /// # Errors
    ///
    /// Returns the collaborator's error.
    pub async fn turbine_history(
        &self,
        turbine_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<TurbineHistory, HistoryError> {
        self.history.turbine_history(turbine_id, from, to).await
    }

    /// Stored samples for every turbine.
    ///
    /// # Errors
    ///
    /// Returns the collaborator's error.
    pub async fn all_turbines_history(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<HistoricalDataPoint>, HistoryError> {
        self.history.all_turbines_history(from, to).await
    }

    /// One page of stored alerts.
    ///
    /// # Errors
    ///
    /// Returns the collaborator's error.
    pub async fn alerts_history(
        &self,
        query: AlertHistoryQuery,
    ) -> Result<AlertHistoryPage, HistoryError> {
        self.history.alerts_history(query).await
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Broadcast hub the pump publishes on.
    #[must_use]
    pub fn hub(&self) -> &SharedBroadcastHub {
        &self.hub
    }

    /// Applied telemetry.
    #[must_use]
    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetryBroadcast> {
        self.hub.telemetry_rx()
    }

    /// Stored alerts.
    #[must_use]
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<AlertBroadcast> {
        self.hub.alerts_rx()
    }

    /// Applied farm statistics.
    #[must_use]
    pub fn subscribe_statistics(&self) -> broadcast::Receiver<StatisticsBroadcast> {
        self.hub.statistics_rx()
    }

    /// Connection state changes.
    #[must_use]
    pub fn subscribe_connection(&self) -> broadcast::Receiver<ConnectionBroadcast> {
        self.hub.connection_rx()
    }
}

impl std::fmt::Debug for WindFarmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindFarmService")
            .field("status", &*self.status.read())
            .field("hub", &self.hub.stats())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Event Pump
// =============================================================================

/// Applies transport events in delivery order.
struct EventPump {
    store: Arc<FarmStore>,
    hub: SharedBroadcastHub,
    status: Arc<RwLock<ConnectionStatus>>,
}

impl EventPump {
    fn apply(&self, event: FeedEvent) {
        match event {
            FeedEvent::Connected => self.update_status(|status| {
                status.connected = true;
                status.last_error = None;
                status.reconnect_attempt = 0;
            }),
            FeedEvent::Disconnected => self.update_status(|status| {
                status.connected = false;
                status.last_error = Some(CONNECTION_LOST_MESSAGE.to_string());
            }),
            FeedEvent::Stopped => self.update_status(|status| {
                status.connected = false;
                status.last_error = None;
                status.reconnect_attempt = 0;
            }),
            FeedEvent::ConnectFailed { reason } => self.update_status(|status| {
                status.connected = false;
                status.last_error = Some(reason);
                status.reconnect_attempt = 0;
            }),
            FeedEvent::Reconnecting { attempt, .. } => self.update_status(|status| {
                status.reconnect_attempt = attempt;
            }),
            FeedEvent::ReconnectExhausted { attempts } => self.update_status(|status| {
                status.connected = false;
                status.reconnect_attempt = 0;
                status.last_error = Some(ReconnectError::MaxAttemptsExceeded(attempts).to_string());
            }),
            FeedEvent::Telemetry(update) => {
                let started = Instant::now();
                self.store.apply_telemetry(update.clone());
                metrics::record_apply_duration(MessageCategory::Telemetry, started.elapsed());
                metrics::set_turbines_tracked(self.store.snapshot().turbines.len());
                let _ = self.hub.send_telemetry(update);
            }
            FeedEvent::Alert(event) => {
                let started = Instant::now();
                let alert = self.store.apply_alert(event);
                metrics::record_apply_duration(MessageCategory::Alert, started.elapsed());
                metrics::set_alerts_retained(self.store.snapshot().alerts.len());
                tracing::info!(
                    alert_id = %alert.id,
                    turbine_id = %alert.turbine_id,
                    severity = alert.severity.as_str(),
                    "Alert received"
                );
                let _ = self.hub.send_alert(alert);
            }
            FeedEvent::Statistics(statistics) => {
                let started = Instant::now();
                let statistics = Arc::new(*statistics);
                let total = statistics.turbine_counts.total;
                if total > MAX_PLACEHOLDER_TURBINES && self.store.snapshot().turbines.is_empty() {
                    tracing::warn!(
                        total,
                        limit = MAX_PLACEHOLDER_TURBINES,
                        "Turbine count over limit, placeholders not seeded"
                    );
                }
                self.store.apply_statistics(FarmStatistics::clone(&statistics));
                metrics::record_apply_duration(MessageCategory::Statistics, started.elapsed());
                metrics::set_turbines_tracked(self.store.snapshot().turbines.len());
                let _ = self.hub.send_statistics(statistics);
            }
        }
    }

    fn update_status(&self, change: impl FnOnce(&mut ConnectionStatus)) {
        let status = {
            let mut status = self.status.write();
            change(&mut status);
            status.clone()
        };
        let _ = self.hub.send_connection(status);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::timeout;

    use super::*;
    use crate::application::ports::{
        BrokerPublisher, BrokerSession, MockHistoryPort, SessionEvent,
    };
    use crate::domain::farm::{AlertEvent, AlertSeverity, AlertType};
    use crate::infrastructure::broadcast::BroadcastHub;

    const WAIT: Duration = Duration::from_secs(2);

    struct NullPublisher;

    #[async_trait]
    impl BrokerPublisher for NullPublisher {
        async fn publish(&self, _topic: &str, _payload: Vec<u8>) -> Result<(), TransportError> {
            Ok(())
        }
    }

    /// Session that replays scripted events, then stays idle.
    struct ScriptedSession {
        events: VecDeque<SessionEvent>,
    }

    #[async_trait]
    impl BrokerSession for ScriptedSession {
        async fn subscribe(&mut self, _filter: &str) -> Result<(), TransportError> {
            Ok(())
        }

        async fn next_event(&mut self) -> SessionEvent {
            match self.events.pop_front() {
                Some(event) => event,
                None => std::future::pending().await,
            }
        }

        fn publisher(&self) -> Arc<dyn BrokerPublisher> {
            Arc::new(NullPublisher)
        }

        async fn close(&mut self) {}
    }

    struct ScriptedTransport {
        script: Mutex<Option<Vec<SessionEvent>>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<SessionEvent>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(Some(script)),
            })
        }
    }

    #[async_trait]
    impl crate::application::ports::BrokerTransport for ScriptedTransport {
        async fn open(&self) -> Result<Box<dyn BrokerSession>, TransportError> {
            let events = self
                .script
                .lock()
                .take()
                .ok_or_else(|| TransportError::Connect("connection refused".to_string()))?;
            Ok(Box::new(ScriptedSession {
                events: events.into(),
            }))
        }
    }

    fn message(topic: &str, json: &str) -> SessionEvent {
        SessionEvent::Message {
            topic: topic.to_string(),
            payload: json.as_bytes().to_vec(),
        }
    }

    fn service(script: Vec<SessionEvent>, history: MockHistoryPort) -> WindFarmService {
        let service = WindFarmService::new(
            ScriptedTransport::new(script),
            ReconnectConfig::default(),
            Arc::new(history),
            Arc::new(BroadcastHub::with_defaults()),
        );
        service.start();
        service
    }

    fn alert_event(turbine_id: &str) -> AlertEvent {
        AlertEvent {
            turbine_id: turbine_id.to_string(),
            turbine_name: None,
            alert_type: AlertType::Electrical,
            severity: AlertSeverity::Warning,
            message: "Voltaje fuera de rango".to_string(),
            timestamp: "2025-06-01T12:00:00Z".to_string(),
            acknowledged: false,
            resolved: false,
        }
    }

    #[tokio::test]
    async fn telemetry_is_applied_then_broadcast() {
        let service = service(
            vec![message(
                "windfarm/turbines/7/clean_telemetry",
                r#"{"turbine_id": 7, "wind_speed_mps": 12.5, "active_power_kw": 2100, "operational_state": "running"}"#,
            )],
            MockHistoryPort::new(),
        );
        let mut telemetry = service.subscribe_telemetry();

        service.connect().await.unwrap();
        let received = timeout(WAIT, telemetry.recv()).await.unwrap().unwrap();

        assert_eq!(received.update.reading.turbine_id, "7");
        let snapshot = service.snapshot();
        let turbine = snapshot.turbine("7").unwrap();
        assert_eq!(turbine.name(), "Turbine 7");
        assert!((turbine.readings.electrical.active_power - 2100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn alerts_are_stored_with_generated_ids() {
        let service = service(
            vec![message(
                "windfarm/alerts",
                r#"{"turbine_id": "3", "alert_type": "Mecánica", "severity": "critical", "message": "Vibración excesiva"}"#,
            )],
            MockHistoryPort::new(),
        );
        let mut alerts = service.subscribe_alerts();

        service.connect().await.unwrap();
        let received = timeout(WAIT, alerts.recv()).await.unwrap().unwrap();

        assert!(received.alert.id.starts_with("alert-"));
        assert_eq!(received.alert.alert_type, AlertType::Mechanical);
        assert_eq!(service.snapshot().alerts[0].id, received.alert.id);
    }

    #[tokio::test]
    async fn connect_publishes_connected_status() {
        let service = service(Vec::new(), MockHistoryPort::new());
        let mut connection = service.subscribe_connection();

        service.connect().await.unwrap();
        let received = timeout(WAIT, connection.recv()).await.unwrap().unwrap();

        assert!(received.status.connected);
        assert!(received.status.last_error.is_none());
        assert!(service.is_connected());
    }

    #[tokio::test]
    async fn failed_reconnect_keeps_handshake_error() {
        let service = service(Vec::new(), MockHistoryPort::new());
        let mut connection = service.subscribe_connection();
        service.connect().await.unwrap();

        // The scripted transport only opens once.
        let err = service.connect().await.unwrap_err();

        let mut updates = Vec::new();
        for _ in 0..3 {
            updates.push(timeout(WAIT, connection.recv()).await.unwrap().unwrap().status);
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(updates[0].connected);
        assert!(!updates[1].connected);
        assert_eq!(updates[1].last_error, None);
        assert_eq!(updates[2].last_error, Some(err.to_string()));

        let status = service.connection_status();
        assert!(!status.connected);
        assert_eq!(status.last_error, Some(err.to_string()));
    }

    #[tokio::test]
    async fn failed_connect_after_disconnect_records_last_error() {
        let service = service(Vec::new(), MockHistoryPort::new());
        let mut connection = service.subscribe_connection();
        service.connect().await.unwrap();
        service.disconnect().await;
        for _ in 0..2 {
            timeout(WAIT, connection.recv()).await.unwrap().unwrap();
        }

        let err = service.connect().await.unwrap_err();
        let failed = timeout(WAIT, connection.recv()).await.unwrap().unwrap();

        assert!(!failed.status.connected);
        assert_eq!(failed.status.last_error, Some(err.to_string()));
    }

    #[tokio::test]
    async fn explicit_disconnect_is_not_reported_as_lost() {
        let service = service(Vec::new(), MockHistoryPort::new());
        let mut connection = service.subscribe_connection();

        service.connect().await.unwrap();
        service.disconnect().await;
        let connected = timeout(WAIT, connection.recv()).await.unwrap().unwrap();
        let stopped = timeout(WAIT, connection.recv()).await.unwrap().unwrap();

        assert!(connected.status.connected);
        assert!(!stopped.status.connected);
        assert_eq!(stopped.status.last_error, None);
        assert_eq!(service.connection_status().last_error, None);
    }

    #[tokio::test]
    async fn closed_session_reports_connection_lost() {
        let service = service(
            vec![SessionEvent::Closed {
                reason: "broker went away".to_string(),
            }],
            MockHistoryPort::new(),
        );
        let mut connection = service.subscribe_connection();

        service.connect().await.unwrap();
        let connected = timeout(WAIT, connection.recv()).await.unwrap().unwrap();
        let lost = timeout(WAIT, connection.recv()).await.unwrap().unwrap();
        service.shutdown().await;

        assert!(connected.status.connected);
        assert!(!lost.status.connected);
        assert_eq!(lost.status.last_error.as_deref(), Some(CONNECTION_LOST_MESSAGE));
    }

    #[tokio::test]
    async fn acknowledge_updates_snapshot_after_collaborator_succeeds() {
        let mut history = MockHistoryPort::new();
        history
            .expect_acknowledge_alert()
            .times(1)
            .returning(|_| Ok(()));
        let service = service(Vec::new(), history);
        let alert = service.store.apply_alert(alert_event("2"));

        assert!(service.acknowledge_alert(&alert.id).await.unwrap());
        assert!(service.snapshot().alert(&alert.id).unwrap().acknowledged);
    }

    #[tokio::test]
    async fn acknowledge_failure_leaves_snapshot_untouched() {
        let mut history = MockHistoryPort::new();
        history
            .expect_acknowledge_alert()
            .returning(|_| Err(HistoryError::Network("connection refused".to_string())));
        let service = service(Vec::new(), history);
        let alert = service.store.apply_alert(alert_event("2"));

        let err = service.acknowledge_alert(&alert.id).await.unwrap_err();

        assert!(matches!(err, HistoryError::Network(_)));
        assert!(!service.snapshot().alert(&alert.id).unwrap().acknowledged);
    }

    #[tokio::test]
    async fn resolve_unknown_alert_is_not_an_error() {
        let mut history = MockHistoryPort::new();
        history
            .expect_resolve_alert()
            .withf(|id| id == "alert-missing")
            .returning(|_| Ok(()));
        let service = service(Vec::new(), history);
        let before = service.snapshot();

        assert!(!service.resolve_alert("alert-missing").await.unwrap());
        assert!(Arc::ptr_eq(&before, &service.snapshot()));
    }

    #[tokio::test]
    async fn resolve_sets_resolution_time() {
        let mut history = MockHistoryPort::new();
        history.expect_resolve_alert().returning(|_| Ok(()));
        let service = service(Vec::new(), history);
        let alert = service.store.apply_alert(alert_event("4"));

        assert!(service.resolve_alert(&alert.id).await.unwrap());
        let snapshot = service.snapshot();
        assert!(snapshot.alert(&alert.id).unwrap().resolved_at.is_some());
        assert_eq!(snapshot.active_alerts().count(), 0);
    }

    #[tokio::test]
    async fn history_queries_pass_through() {
        let mut history = MockHistoryPort::new();
        history.expect_alerts_history().returning(|query| {
            Ok(AlertHistoryPage {
                alerts: Vec::new(),
                total: 0,
                page: query.page,
                page_size: query.page_size,
            })
        });
        let service = service(Vec::new(), history);

        let page = service
            .alerts_history(AlertHistoryQuery {
                page: 3,
                ..AlertHistoryQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(page.page, 3);
    }

    #[tokio::test]
    async fn publish_command_requires_connection() {
        let service = service(Vec::new(), MockHistoryPort::new());
        let command = serde_json::json!({"turbine_id": "1", "command": "stop"});

        assert_eq!(
            service.publish_command("windfarm/commands", &command).await,
            Err(TransportError::NotConnected)
        );

        service.connect().await.unwrap();
        assert!(service.publish_command("windfarm/commands", &command).await.is_ok());
    }
}
