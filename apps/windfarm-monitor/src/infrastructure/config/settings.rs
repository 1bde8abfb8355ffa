//! Monitor Configuration Settings
//!
//! Configuration types for the monitor, loaded from environment variables.

use std::time::Duration;

use rand::Rng;
use url::Url;

/// Default broker endpoint.
pub const DEFAULT_BROKER_URL: &str = "ws://localhost:8083/mqtt";

/// Default history API base URL.
pub const DEFAULT_HISTORY_BASE_URL: &str = "http://localhost:5000/api";

const CLIENT_ID_PREFIX: &str = "windfarm_client_";
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

/// How the broker is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerScheme {
    /// Plain MQTT over TCP (`mqtt://`, `tcp://`).
    Tcp,
    /// MQTT over WebSocket (`ws://`).
    WebSocket,
}

impl BrokerScheme {
    const fn default_port(self) -> u16 {
        match self {
            Self::Tcp => 1883,
            Self::WebSocket => 8083,
        }
    }
}

/// Parsed broker address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    /// Transport scheme.
    pub scheme: BrokerScheme,
    /// Host name or address.
    pub host: String,
    /// Port, defaulted from the scheme when the URL omits it.
    pub port: u16,
    /// Full URL, as the WebSocket transport needs it.
    pub url: String,
}

impl BrokerEndpoint {
    /// Parse a broker URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed, has no host, or uses a
    /// scheme other than `mqtt`, `tcp` or `ws`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw.trim())
            .map_err(|e| ConfigError::InvalidBrokerUrl(format!("{raw}: {e}")))?;

        let scheme = match url.scheme() {
            "mqtt" | "tcp" => BrokerScheme::Tcp,
            "ws" => BrokerScheme::WebSocket,
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        };

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ConfigError::InvalidBrokerUrl(format!("{raw}: missing host")))?
            .to_string();
        let port = url.port().unwrap_or_else(|| scheme.default_port());

        Ok(Self {
            scheme,
            host,
            port,
            url: url.to_string(),
        })
    }
}

/// Broker credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerCredentials {
    username: String,
    password: Option<String>,
}

impl BrokerCredentials {
    /// Create credentials.
    #[must_use]
    pub const fn new(username: String, password: Option<String>) -> Self {
        Self { username, password }
    }

    /// Username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password, if any.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl std::fmt::Debug for BrokerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerCredentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    /// Broker address.
    pub endpoint: BrokerEndpoint,
    /// Optional credentials.
    pub credentials: Option<BrokerCredentials>,
    /// Client identifier.
    pub client_id: String,
    /// Keep-alive interval.
    pub keep_alive: Duration,
    /// Wait before each automatic reconnect.
    pub reconnect_delay: Duration,
    /// Consecutive automatic reconnects before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Growth of the reconnect delay per attempt (`1.0` keeps it fixed).
    pub reconnect_multiplier: f64,
    /// Upper bound on the reconnect delay.
    pub reconnect_max_delay: Duration,
    /// Random spread applied to each delay, as a fraction in `[0, 1]`.
    pub reconnect_jitter: f64,
}

impl MqttSettings {
    /// Settings for a broker URL with every other value defaulted.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn for_url(url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: BrokerEndpoint::parse(url)?,
            credentials: None,
            client_id: generate_client_id(),
            keep_alive: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 5,
            reconnect_multiplier: 1.0,
            reconnect_max_delay: Duration::from_secs(5),
            reconnect_jitter: 0.0,
        })
    }
}

/// History API settings.
#[derive(Clone)]
pub struct HistorySettings {
    /// Base URL without trailing slash.
    pub base_url: String,
    /// Bearer token.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_HISTORY_BASE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl std::fmt::Debug for HistorySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistorySettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Broadcast channel settings.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Capacity of the telemetry channel.
    pub telemetry_capacity: usize,
    /// Capacity of the alert channel.
    pub alerts_capacity: usize,
    /// Capacity of the statistics channel.
    pub statistics_capacity: usize,
    /// Capacity of the connection state channel.
    pub connection_capacity: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            telemetry_capacity: 4096,
            alerts_capacity: 256,
            statistics_capacity: 64,
            connection_capacity: 64,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Status HTTP port.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 8090 }
    }
}

/// Complete monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Broker connection.
    pub mqtt: MqttSettings,
    /// History API.
    pub history: HistorySettings,
    /// HTTP server.
    pub server: ServerSettings,
    /// Broadcast channels.
    pub broadcast: BroadcastSettings,
    /// Connect to the broker at startup.
    pub auto_connect: bool,
}

impl MonitorConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker URL or credentials are invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker URL or credentials are invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let endpoint = BrokerEndpoint::parse(
            &env.string("MQTT_BROKER_URL")
                .unwrap_or_else(|| DEFAULT_BROKER_URL.to_string()),
        )?;

        let credentials = match (env.string("MQTT_USERNAME"), env.string("MQTT_PASSWORD")) {
            (Some(username), password) => Some(BrokerCredentials::new(username, password)),
            (None, Some(_)) => return Err(ConfigError::PasswordWithoutUsername),
            (None, None) => None,
        };

        let reconnect_delay = env.millis("MQTT_RECONNECT_DELAY_MS", Duration::from_secs(5));
        let mqtt = MqttSettings {
            endpoint,
            credentials,
            client_id: env
                .string("MQTT_CLIENT_ID")
                .unwrap_or_else(generate_client_id),
            keep_alive: env
                .secs("MQTT_KEEP_ALIVE_SECS", Duration::from_secs(30))
                .max(MIN_KEEP_ALIVE),
            reconnect_delay,
            max_reconnect_attempts: env.parse("MQTT_MAX_RECONNECT_ATTEMPTS", 5),
            reconnect_multiplier: env.fraction("MQTT_RECONNECT_MULTIPLIER", 1.0).max(1.0),
            reconnect_max_delay: env
                .millis("MQTT_RECONNECT_MAX_DELAY_MS", reconnect_delay)
                .max(reconnect_delay),
            reconnect_jitter: env.fraction("MQTT_RECONNECT_JITTER", 0.0).clamp(0.0, 1.0),
        };

        let history = HistorySettings {
            base_url: env
                .string("HISTORY_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_HISTORY_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: env.string("HISTORY_API_KEY"),
            timeout: env.secs("HISTORY_API_TIMEOUT_SECS", HistorySettings::default().timeout),
        };

        let server = ServerSettings {
            http_port: env.parse("MONITOR_HTTP_PORT", ServerSettings::default().http_port),
        };

        let defaults = BroadcastSettings::default();
        let broadcast = BroadcastSettings {
            telemetry_capacity: env.capacity("MONITOR_TELEMETRY_CAPACITY", defaults.telemetry_capacity),
            alerts_capacity: env.capacity("MONITOR_ALERTS_CAPACITY", defaults.alerts_capacity),
            statistics_capacity: env
                .capacity("MONITOR_STATISTICS_CAPACITY", defaults.statistics_capacity),
            connection_capacity: env
                .capacity("MONITOR_CONNECTION_CAPACITY", defaults.connection_capacity),
        };

        Ok(Self {
            mqtt,
            history,
            server,
            broadcast,
            auto_connect: env.flag("MONITOR_AUTO_CONNECT", true),
        })
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Broker URL cannot be parsed or has no host.
    #[error("invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    /// Broker URL scheme is not supported.
    #[error("unsupported broker URL scheme: {0}")]
    UnsupportedScheme(String),
    /// A password was configured without a username.
    #[error("MQTT_PASSWORD is set but MQTT_USERNAME is not")]
    PasswordWithoutUsername,
}

/// Generate a client id of the form `windfarm_client_<8 hex digits>`.
#[must_use]
pub fn generate_client_id() -> String {
    let suffix: u32 = rand::rng().random();
    format!("{CLIENT_ID_PREFIX}{suffix:08x}")
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.string(key)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }

    fn capacity(&self, key: &str, default: usize) -> usize {
        self.parse(key, default).max(1)
    }

    fn secs(&self, key: &str, default: Duration) -> Duration {
        self.string(key)
            .and_then(|value| value.parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn millis(&self, key: &str, default: Duration) -> Duration {
        self.string(key)
            .and_then(|value| value.parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }

    fn fraction(&self, key: &str, default: f64) -> f64 {
        Some(self.parse(key, default))
            .filter(|value: &f64| value.is_finite())
            .unwrap_or(default)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.string(key).map_or(default, |value| {
            !matches!(value.to_lowercase().as_str(), "false" | "0" | "no" | "off")
        })
    }
}
