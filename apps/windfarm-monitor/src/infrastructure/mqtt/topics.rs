//! Broker topics the service subscribes to and how inbound topics map to
//! message categories.

/// Per-turbine telemetry filter (single-level wildcard on the turbine id).
pub const TELEMETRY_FILTER: &str = "windfarm/turbines/+/clean_telemetry";

/// Farm-wide alerts topic.
pub const ALERTS_TOPIC: &str = "windfarm/alerts";

/// Farm-wide statistics topic.
pub const STATISTICS_TOPIC: &str = "windfarm/stats";

/// Filters subscribed on every successful connect.
pub const SUBSCRIPTIONS: [&str; 3] = [TELEMETRY_FILTER, ALERTS_TOPIC, STATISTICS_TOPIC];

const TELEMETRY_PREFIX: &str = "windfarm/turbines/";
const TELEMETRY_SUFFIX: &str = "/clean_telemetry";

/// Telemetry topic for one turbine.
#[must_use]
pub fn telemetry_topic(turbine_id: &str) -> String {
    format!("{TELEMETRY_PREFIX}{turbine_id}{TELEMETRY_SUFFIX}")
}

/// Message category selected by topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageCategory {
    /// Per-turbine telemetry.
    Telemetry,
    /// Alert.
    Alert,
    /// Farm statistics.
    Statistics,
}

impl MessageCategory {
    /// Category of an inbound topic, or `None` for topics the service does
    /// not handle.
    #[must_use]
    pub fn from_topic(topic: &str) -> Option<Self> {
        if topic == ALERTS_TOPIC {
            return Some(Self::Alert);
        }
        if topic == STATISTICS_TOPIC {
            return Some(Self::Statistics);
        }
        topic
            .strip_prefix(TELEMETRY_PREFIX)
            .and_then(|rest| rest.strip_suffix(TELEMETRY_SUFFIX))
            .filter(|turbine| !turbine.is_empty() && !turbine.contains('/'))
            .map(|_| Self::Telemetry)
    }

    /// Metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Telemetry => "telemetry",
            Self::Alert => "alert",
            Self::Statistics => "statistics",
        }
    }
}
