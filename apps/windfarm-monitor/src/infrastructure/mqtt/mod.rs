//! MQTT Broker Adapters
//!
//! Everything between the farm broker and the rest of the service:
//!
//! - **messages**: flat wire types published by field devices
//! - **codec**: decoding wire messages into the farm model
//! - **topics**: subscribed topics and topic routing
//! - **reconnect**: bounded retry schedule
//! - **manager**: connection lifecycle and event dispatch
//! - **transport**: `rumqttc` implementation of the broker ports

pub mod codec;
pub mod manager;
pub mod messages;
pub mod reconnect;
pub mod topics;
pub mod transport;

pub use codec::{DecodeError, DecodedMessage, FeedCodec, decode_alert, decode_statistics, decode_telemetry, power_factor};
pub use manager::{FeedEvent, TransportManager};
pub use messages::{FlatAlertMessage, FlatStatisticsMessage, FlatTelemetryMessage};
pub use reconnect::{ReconnectConfig, ReconnectError, ReconnectPolicy};
pub use topics::{ALERTS_TOPIC, MessageCategory, STATISTICS_TOPIC, SUBSCRIPTIONS, TELEMETRY_FILTER, telemetry_topic};
pub use transport::RumqttTransport;
