//! `rumqttc` Broker Adapter
//!
//! Implements the broker ports on top of `rumqttc`'s `AsyncClient` and
//! `EventLoop`. Each `open` builds a fresh client with clean-session
//! semantics and polls the event loop until the broker acknowledges the
//! connection. `rumqttc` never reconnects on its own here: once `poll`
//! fails the session reports `Closed` and the manager decides what happens
//! next.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS, Transport,
};

use crate::application::ports::{
    BrokerPublisher, BrokerSession, BrokerTransport, SessionEvent, TransportError,
};
use crate::infrastructure::config::{BrokerScheme, MqttSettings};

/// Bound on queued outgoing requests per session.
const REQUEST_CAPACITY: usize = 64;

/// Time allowed for the disconnect packet to flush on close.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Broker transport backed by `rumqttc`.
#[derive(Debug, Clone)]
pub struct RumqttTransport {
    settings: MqttSettings,
}

impl RumqttTransport {
    /// Create a transport for the configured broker.
    #[must_use]
    pub const fn new(settings: MqttSettings) -> Self {
        Self { settings }
    }

    fn mqtt_options(&self) -> MqttOptions {
        let endpoint = &self.settings.endpoint;
        let mut options = match endpoint.scheme {
            BrokerScheme::Tcp => MqttOptions::new(
                self.settings.client_id.clone(),
                endpoint.host.clone(),
                endpoint.port,
            ),
            BrokerScheme::WebSocket => {
                let mut options = MqttOptions::new(
                    self.settings.client_id.clone(),
                    endpoint.url.clone(),
                    endpoint.port,
                );
                options.set_transport(Transport::Ws);
                options
            }
        };

        options.set_keep_alive(self.settings.keep_alive);
        options.set_clean_session(true);
        if let Some(credentials) = &self.settings.credentials {
            options.set_credentials(
                credentials.username(),
                credentials.password().unwrap_or_default(),
            );
        }
        options
    }
}

#[async_trait]
impl BrokerTransport for RumqttTransport {
    async fn open(&self) -> Result<Box<dyn BrokerSession>, TransportError> {
        tracing::debug!(
            url = %self.settings.endpoint.url,
            client_id = %self.settings.client_id,
            "Opening broker session"
        );
        let (client, mut eventloop) = AsyncClient::new(self.mqtt_options(), REQUEST_CAPACITY);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(TransportError::Connect(format!(
                            "broker refused connection: {:?}",
                            ack.code
                        )));
                    }
                    return Ok(Box::new(RumqttSession {
                        client,
                        eventloop,
                        pending_close: None,
                    }));
                }
                Ok(event) => tracing::trace!(?event, "Broker event before handshake"),
                Err(e) => return Err(TransportError::Connect(e.to_string())),
            }
        }
    }
}

struct RumqttSession {
    client: AsyncClient,
    eventloop: EventLoop,
    pending_close: Option<String>,
}

#[async_trait]
impl BrokerSession for RumqttSession {
    async fn subscribe(&mut self, filter: &str) -> Result<(), TransportError> {
        self.client
            .subscribe(filter, QoS::AtLeastOnce)
            .await
            .map_err(|e| TransportError::Subscribe {
                filter: filter.to_string(),
                reason: e.to_string(),
            })
    }

    async fn next_event(&mut self) -> SessionEvent {
        if let Some(reason) = self.pending_close.take() {
            return SessionEvent::Closed { reason };
        }

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return SessionEvent::Message {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    };
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    return SessionEvent::Closed {
                        reason: "broker sent disconnect".to_string(),
                    };
                }
                Ok(_) => {}
                Err(e @ (ConnectionError::NetworkTimeout | ConnectionError::FlushTimeout)) => {
                    self.pending_close = Some(e.to_string());
                    return SessionEvent::Offline;
                }
                Err(e) => return SessionEvent::Closed { reason: e.to_string() },
            }
        }
    }

    fn publisher(&self) -> Arc<dyn BrokerPublisher> {
        Arc::new(RumqttPublisher {
            client: self.client.clone(),
        })
    }

    async fn close(&mut self) {
        if let Err(e) = self.client.disconnect().await {
            tracing::debug!(error = %e, "Disconnect request not queued");
            return;
        }

        let flushed = tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;

        if flushed.is_err() {
            tracing::debug!("Timed out flushing disconnect");
        }
    }
}

struct RumqttPublisher {
    client: AsyncClient,
}

#[async_trait]
impl BrokerPublisher for RumqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| TransportError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }
}
