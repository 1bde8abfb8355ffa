//! Configuration Module
//!
//! Configuration loading for the monitor service.

mod settings;

pub use settings::{
    BroadcastSettings, BrokerCredentials, BrokerEndpoint, BrokerScheme, ConfigError,
    DEFAULT_BROKER_URL, DEFAULT_HISTORY_BASE_URL, HistorySettings, MonitorConfig, MqttSettings,
    ServerSettings, generate_client_id,
};
