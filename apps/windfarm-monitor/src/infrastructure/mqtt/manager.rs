//! Broker Transport Manager
//!
//! Owns the single logical connection to the farm broker. An explicit
//! [`TransportManager::connect`] performs the handshake and subscribes to the
//! farm topics, then hands the session to a supervisor task that decodes
//! inbound messages and reconnects after unexpected loss.
//!
//! Everything the manager observes leaves through one ordered
//! `mpsc::Sender<FeedEvent>`.
//!
//! # Reconnection
//!
//! - Unexpected loss publishes `Disconnected` and schedules attempts through
//!   the [`ReconnectPolicy`]; each failed attempt consumes one.
//! - Exhausting the policy publishes `ReconnectExhausted` and leaves the
//!   manager disconnected until `connect()` is called again.
//! - `Offline` only publishes `Disconnected`; the reconnect is scheduled
//!   by the `Closed` that follows.
//! - `disconnect()` cancels the supervisor, including a pending wait, and
//!   publishes `Stopped` rather than `Disconnected`.
//! - A failed `connect()` publishes `ConnectFailed` after any `Stopped` for
//!   the session it replaced, so consumers see the handshake error last.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::codec::{DecodedMessage, FeedCodec};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::topics::{MessageCategory, SUBSCRIPTIONS};
use crate::application::ports::{
    BrokerPublisher, BrokerSession, BrokerTransport, SessionEvent, TransportError,
};
use crate::domain::farm::{AlertEvent, FarmStatistics, TelemetryUpdate};
use crate::infrastructure::metrics;

// =============================================================================
// Events
// =============================================================================

/// Events published by the transport manager.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Handshake completed and farm topics subscribed.
    Connected,
    /// Connection lost unexpectedly.
    Disconnected,
    /// Session closed by the caller.
    Stopped,
    /// An explicit connect failed its handshake.
    ConnectFailed {
        /// Transport error text.
        reason: String,
    },
    /// Waiting before an automatic reconnect.
    Reconnecting {
        /// Attempt number, starting at 1.
        attempt: u32,
        /// Wait before the attempt.
        delay: Duration,
    },
    /// Automatic reconnection gave up.
    ReconnectExhausted {
        /// Attempts made.
        attempts: u32,
    },
    /// Decoded turbine telemetry.
    Telemetry(TelemetryUpdate),
    /// Decoded alert.
    Alert(AlertEvent),
    /// Decoded farm statistics.
    Statistics(Box<FarmStatistics>),
}

impl From<DecodedMessage> for FeedEvent {
    fn from(message: DecodedMessage) -> Self {
        match message {
            DecodedMessage::Telemetry(update) => Self::Telemetry(update),
            DecodedMessage::Alert(event) => Self::Alert(event),
            DecodedMessage::Statistics(statistics) => Self::Statistics(statistics),
        }
    }
}

// =============================================================================
// Transport Manager
// =============================================================================

struct Shared {
    transport: Arc<dyn BrokerTransport>,
    codec: FeedCodec,
    event_tx: mpsc::Sender<FeedEvent>,
    policy: Mutex<ReconnectPolicy>,
    connected: AtomicBool,
    publisher: RwLock<Option<Arc<dyn BrokerPublisher>>>,
}

struct Supervisor {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Supervisor {
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Broker supervisor task failed");
        }
    }
}

/// Manages the broker connection lifecycle.
pub struct TransportManager {
    shared: Arc<Shared>,
    supervisor: tokio::sync::Mutex<Option<Supervisor>>,
}

impl TransportManager {
    /// Create a manager. Nothing connects until [`Self::connect`].
    #[must_use]
    pub fn new(
        transport: Arc<dyn BrokerTransport>,
        reconnect: ReconnectConfig,
        event_tx: mpsc::Sender<FeedEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                codec: FeedCodec::new(),
                event_tx,
                policy: Mutex::new(ReconnectPolicy::new(reconnect)),
                connected: AtomicBool::new(false),
                publisher: RwLock::new(None),
            }),
            supervisor: tokio::sync::Mutex::new(None),
        }
    }

    /// Connect to the broker.
    ///
    /// Replaces any existing session or pending reconnect and restores the
    /// full reconnect budget. A failed handshake is returned to the caller and
    /// is not retried.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Connect` if the handshake fails.
    pub async fn connect(&self) -> Result<(), TransportError> {
        let mut slot = self.supervisor.lock().await;
        if let Some(previous) = slot.take() {
            previous.stop().await;
            self.shared.mark_disconnected(FeedEvent::Stopped).await;
        }
        self.shared.policy.lock().reset();

        tracing::info!("Connecting to broker");
        let mut session = match self.shared.transport.open().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Broker connection failed");
                self.shared
                    .emit(FeedEvent::ConnectFailed {
                        reason: e.to_string(),
                    })
                    .await;
                return Err(e);
            }
        };
        self.shared.on_connected(session.as_mut()).await;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&self.shared).supervise(session, cancel.clone()));
        *slot = Some(Supervisor { cancel, handle });
        Ok(())
    }

    /// Disconnect from the broker and suppress automatic reconnection.
    pub async fn disconnect(&self) {
        let mut slot = self.supervisor.lock().await;
        if let Some(supervisor) = slot.take() {
            supervisor.stop().await;
        }
        self.shared.mark_disconnected(FeedEvent::Stopped).await;
        tracing::info!("Disconnected from broker");
    }

    /// Whether a session is currently live.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Automatic reconnect attempts consumed since the last successful connect.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.policy.lock().attempt_count()
    }

    /// Publish a JSON payload on the live session.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::NotConnected` without a live session, or
    /// `TransportError::Publish` if the payload cannot be serialized or sent.
    pub async fn publish<T: Serialize + Sync>(
        &self,
        topic: &str,
        payload: &T,
    ) -> Result<(), TransportError> {
        let publisher = self
            .shared
            .publisher
            .read()
            .clone()
            .ok_or(TransportError::NotConnected)?;
        let bytes = serde_json::to_vec(payload).map_err(|e| TransportError::Publish {
            topic: topic.to_string(),
            reason: e.to_string(),
        })?;
        publisher.publish(topic, bytes).await
    }
}

impl Shared {
    async fn emit(&self, event: FeedEvent) {
        let _ = self.event_tx.send(event).await;
    }

    async fn on_connected(&self, session: &mut dyn BrokerSession) {
        self.connected.store(true, Ordering::SeqCst);
        self.policy.lock().reset();
        *self.publisher.write() = Some(session.publisher());
        metrics::set_broker_connected(true);
        tracing::info!("Connected to broker");
        self.emit(FeedEvent::Connected).await;

        for filter in SUBSCRIPTIONS {
            match session.subscribe(filter).await {
                Ok(()) => tracing::debug!(filter, "Subscribed"),
                Err(e) => tracing::warn!(filter, error = %e, "Subscription failed"),
            }
        }
    }

    /// Drop the live session, publishing `event` if one was live.
    async fn mark_disconnected(&self, event: FeedEvent) {
        self.publisher.write().take();
        if self.connected.swap(false, Ordering::SeqCst) {
            metrics::set_broker_connected(false);
            self.emit(event).await;
        }
    }

    /// Drive a session until cancelled; reconnect after unexpected loss.
    async fn supervise(self: Arc<Self>, mut session: Box<dyn BrokerSession>, cancel: CancellationToken) {
        loop {
            let outcome = tokio::select! {
                () = cancel.cancelled() => None,
                reason = self.pump(session.as_mut()) => Some(reason),
            };

            let Some(reason) = outcome else {
                session.close().await;
                return;
            };

            tracing::warn!(reason = %reason, "Broker connection lost");
            self.mark_disconnected(FeedEvent::Disconnected).await;

            match self.reconnect(&cancel).await {
                Some(next) => session = next,
                None => return,
            }
        }
    }

    /// Process session events until the session closes.
    async fn pump(&self, session: &mut dyn BrokerSession) -> String {
        loop {
            match session.next_event().await {
                SessionEvent::Message { topic, payload } => self.dispatch(&topic, &payload).await,
                SessionEvent::Offline => {
                    tracing::info!("Broker client offline");
                    self.mark_disconnected(FeedEvent::Disconnected).await;
                }
                SessionEvent::Closed { reason } => return reason,
            }
        }
    }

    async fn dispatch(&self, topic: &str, payload: &[u8]) {
        let Some(category) = MessageCategory::from_topic(topic) else {
            tracing::trace!(topic, "Ignoring message on unhandled topic");
            return;
        };
        metrics::record_message_received(category);

        match self.codec.decode(category, payload) {
            Ok(message) => self.emit(message.into()).await,
            Err(e) => {
                metrics::record_decode_failure(category);
                tracing::warn!(topic, error = %e, "Dropping undecodable message");
            }
        }
    }

    /// Retry until a session opens, the policy is exhausted, or `cancel`
    /// fires.
    async fn reconnect(&self, cancel: &CancellationToken) -> Option<Box<dyn BrokerSession>> {
        loop {
            let (next, attempt) = {
                let mut policy = self.policy.lock();
                (policy.next_delay(), policy.attempt_count())
            };

            let Some(delay) = next else {
                tracing::warn!(attempts = attempt, "Maximum reconnection attempts reached");
                self.emit(FeedEvent::ReconnectExhausted { attempts: attempt }).await;
                return None;
            };

            tracing::info!(attempt, delay_ms = delay.as_millis(), "Reconnecting to broker");
            metrics::record_reconnect_attempt();
            self.emit(FeedEvent::Reconnecting { attempt, delay }).await;

            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("Pending reconnect cancelled");
                    return None;
                }
                () = tokio::time::sleep(delay) => {}
            }

            let opened = tokio::select! {
                () = cancel.cancelled() => return None,
                opened = self.transport.open() => opened,
            };

            match opened {
                Ok(mut session) => {
                    self.on_connected(session.as_mut()).await;
                    return Some(session);
                }
                Err(e) => tracing::warn!(attempt, error = %e, "Reconnect attempt failed"),
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
