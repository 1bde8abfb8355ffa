//! Farm Data Model
//!
//! Structured entities the rest of the service works with: turbines and their
//! readings, alerts, and farm-wide statistics. Every entity is built through a
//! total constructor; defaults for fields the wire format does not carry are
//! applied once, by the decoder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Turbine identifier, stable across telemetry messages.
pub type TurbineId = String;

/// Rated capacity used when a turbine's capacity is not known.
pub const DEFAULT_CAPACITY_MW: f64 = 2.5;

/// Blade pitch reported by placeholder turbines (feathered).
pub const PLACEHOLDER_PITCH_DEG: f64 = 90.0;

/// Display name used when no name is known for a turbine.
#[must_use]
pub fn default_turbine_name(id: &str) -> String {
    format!("Turbine {id}")
}

// =============================================================================
// Enumerations
// =============================================================================

/// Operational status of a turbine.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TurbineStatus {
    /// Producing power.
    Operational,
    /// Stopped.
    Stopped,
    /// Faulted.
    Fault,
    /// Under maintenance.
    Maintenance,
    /// Idle, waiting for wind or dispatch.
    #[default]
    Standby,
}

impl TurbineStatus {
    /// All statuses in display order.
    pub const ALL: [Self; 5] = [
        Self::Operational,
        Self::Stopped,
        Self::Fault,
        Self::Maintenance,
        Self::Standby,
    ];

    /// Map a device status string, ignoring case. Unknown strings map to
    /// [`TurbineStatus::Standby`].
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "operational" | "running" => Self::Operational,
            "stopped" => Self::Stopped,
            "fault" | "error" => Self::Fault,
            "maintenance" => Self::Maintenance,
            _ => Self::Standby,
        }
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Operational => "operational",
            Self::Stopped => "stopped",
            Self::Fault => "fault",
            Self::Maintenance => "maintenance",
            Self::Standby => "standby",
        }
    }
}

/// Alert category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    /// Electrical subsystem.
    Electrical,
    /// Mechanical subsystem.
    Mechanical,
    /// Weather and site conditions.
    Environmental,
    /// Control system or anything unclassified.
    #[default]
    System,
}

impl AlertType {
    /// Map an English or Spanish category name, ignoring case. Unknown names
    /// map to [`AlertType::System`].
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "electrical" | "eléctrica" | "electrica" => Self::Electrical,
            "mechanical" | "mecánica" | "mecanica" => Self::Mechanical,
            "environmental" | "ambiental" => Self::Environmental,
            _ => Self::System,
        }
    }
}

/// Alert severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Needs immediate attention.
    Critical,
    /// Degraded but running.
    Warning,
    /// Informational.
    #[default]
    Info,
}

impl AlertSeverity {
    /// Map an English or Spanish severity name, ignoring case. Unknown names
    /// map to [`AlertSeverity::Info`].
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "critical" | "crítico" | "critico" => Self::Critical,
            "warning" | "advertencia" => Self::Warning,
            _ => Self::Info,
        }
    }

    /// Canonical lowercase name, as the history API expects it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

// =============================================================================
// Readings
// =============================================================================

/// Site conditions at the nacelle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentalReadings {
    /// Wind speed (m/s).
    pub wind_speed: f64,
    /// Wind direction (degrees, `[0, 360)`).
    pub wind_direction: f64,
}

/// Drive train and nacelle readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MechanicalReadings {
    /// Rotor speed (RPM).
    pub rotor_speed: f64,
    /// Blade pitch (degrees).
    pub pitch_angle: f64,
    /// Yaw position (degrees, `[0, 360)`).
    pub yaw_position: f64,
    /// Vibration (mm/s).
    pub vibration: f64,
    /// Gearbox temperature (°C).
    pub gearbox_temperature: f64,
    /// Main bearing temperature (°C).
    pub bearing_temperature: f64,
    /// Gearbox oil pressure (bar).
    pub oil_pressure: f64,
    /// Gearbox oil level (%).
    pub oil_level: f64,
}

/// Generator output readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectricalReadings {
    /// Output voltage (V).
    pub output_voltage: f64,
    /// Output current (A).
    pub output_current: f64,
    /// Active power (kW).
    pub active_power: f64,
    /// Reactive power (kVAR).
    pub reactive_power: f64,
    /// Power factor, `[-1, 1]`.
    pub power_factor: f64,
}

/// The part of a turbine that every telemetry message replaces wholesale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurbineReadings {
    /// Operational status.
    pub status: TurbineStatus,
    /// Site conditions.
    pub environmental: EnvironmentalReadings,
    /// Drive train readings.
    pub mechanical: MechanicalReadings,
    /// Generator readings.
    pub electrical: ElectricalReadings,
}

impl TurbineReadings {
    /// Readings of a turbine nothing has been heard from: standby, blades
    /// feathered, everything else zero.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            status: TurbineStatus::Standby,
            mechanical: MechanicalReadings {
                pitch_angle: PLACEHOLDER_PITCH_DEG,
                ..MechanicalReadings::default()
            },
            ..Self::default()
        }
    }
}

/// Maintenance bookkeeping. Telemetry never carries it, so it survives
/// every reading update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceInfo {
    /// Date of the last maintenance.
    pub last_maintenance: Option<String>,
    /// Date of the next scheduled maintenance.
    pub next_maintenance: Option<String>,
    /// Cumulative operating hours.
    pub operating_hours: f64,
}

// =============================================================================
// Turbine
// =============================================================================

/// Identity and rating of a turbine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurbineIdentity {
    /// Stable identifier.
    pub id: TurbineId,
    /// Display name.
    pub name: String,
    /// Rated power (MW).
    pub capacity: f64,
}

/// A turbine as held in the farm snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turbine {
    /// Identity and rating.
    #[serde(flatten)]
    pub identity: TurbineIdentity,
    /// Latest readings.
    #[serde(flatten)]
    pub readings: TurbineReadings,
    /// Maintenance bookkeeping.
    #[serde(flatten)]
    pub maintenance: MaintenanceInfo,
}

impl Turbine {
    /// Build a turbine from all of its parts.
    #[must_use]
    pub const fn new(
        identity: TurbineIdentity,
        readings: TurbineReadings,
        maintenance: MaintenanceInfo,
    ) -> Self {
        Self {
            identity,
            readings,
            maintenance,
        }
    }

    /// Placeholder for a turbine known only from the farm-wide count.
    #[must_use]
    pub fn placeholder(id: TurbineId) -> Self {
        let name = default_turbine_name(&id);
        Self::new(
            TurbineIdentity {
                id,
                name,
                capacity: DEFAULT_CAPACITY_MW,
            },
            TurbineReadings::idle(),
            MaintenanceInfo::default(),
        )
    }

    /// Identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.identity.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> TurbineStatus {
        self.readings.status
    }
}

// =============================================================================
// Structured Messages
// =============================================================================

/// One decoded telemetry message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryReading {
    /// Turbine the reading belongs to.
    pub turbine_id: TurbineId,
    /// Device timestamp, verbatim.
    pub timestamp: String,
    /// Readings to apply.
    #[serde(flatten)]
    pub readings: TurbineReadings,
}

/// Identity hints carried next to telemetry on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurbineMetadata {
    /// Display name, if the device sent one.
    pub name: Option<String>,
    /// Rated capacity (MW), if the device sent one.
    pub capacity: Option<f64>,
}

/// Telemetry as dispatched by the transport: the reading plus whatever
/// identity metadata the raw message carried.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryUpdate {
    /// Decoded reading.
    pub reading: TelemetryReading,
    /// Identity metadata.
    pub metadata: TurbineMetadata,
}

/// One decoded alert, before it is given an id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    /// Turbine that raised the alert.
    pub turbine_id: TurbineId,
    /// Turbine name if the device sent one.
    pub turbine_name: Option<String>,
    /// Category.
    pub alert_type: AlertType,
    /// Severity.
    pub severity: AlertSeverity,
    /// Human-readable text.
    pub message: String,
    /// Event time, verbatim.
    pub timestamp: String,
    /// Already acknowledged upstream.
    pub acknowledged: bool,
    /// Already resolved upstream.
    pub resolved: bool,
}

// =============================================================================
// Alert
// =============================================================================

/// An alert as held in the farm snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Identifier assigned at ingestion.
    pub id: String,
    /// Turbine that raised the alert.
    pub turbine_id: TurbineId,
    /// Turbine display name.
    pub turbine_name: String,
    /// Category.
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    /// Severity.
    pub severity: AlertSeverity,
    /// Human-readable text.
    pub message: String,
    /// Event time.
    pub timestamp: String,
    /// Acknowledged by an operator.
    #[serde(default)]
    pub acknowledged: bool,
    /// When the alert was resolved.
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Materialise an ingested alert event.
    ///
    /// An event that arrives already resolved is stamped with `ingested_at`.
    #[must_use]
    pub fn new(
        id: String,
        event: AlertEvent,
        turbine_name: String,
        ingested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            turbine_id: event.turbine_id,
            turbine_name,
            alert_type: event.alert_type,
            severity: event.severity,
            message: event.message,
            timestamp: event.timestamp,
            acknowledged: event.acknowledged,
            resolved_at: event.resolved.then_some(ingested_at),
        }
    }

    /// Whether the alert is still open.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.resolved_at.is_none()
    }
}

// =============================================================================
// Farm Statistics
// =============================================================================

/// One labelled point of a time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Period label.
    pub label: String,
    /// Value for the period.
    pub value: f64,
}

impl SeriesPoint {
    /// Build a point.
    #[must_use]
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Turbine count per status, as reported by the farm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurbineCounts {
    /// All turbines.
    pub total: u32,
    /// Operational turbines.
    pub operational: u32,
    /// Stopped turbines.
    pub stopped: u32,
    /// Turbines under maintenance.
    pub maintenance: u32,
    /// Faulted turbines.
    pub fault: u32,
}

/// Farm-wide wind figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindStatistics {
    /// Average speed (m/s).
    pub avg_speed: f64,
    /// Maximum speed (m/s).
    pub max_speed: f64,
    /// Minimum speed (m/s).
    pub min_speed: f64,
    /// Predominant direction (degrees).
    pub predominant_direction: f64,
}

/// Aggregate snapshot published by the farm. Replaced wholesale on every
/// statistics message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmStatistics {
    /// Farm identifier.
    pub farm_id: Option<String>,
    /// Farm name.
    pub farm_name: Option<String>,
    /// Time the aggregate was computed.
    pub timestamp: String,
    /// Total active power (kW).
    pub total_active_power: f64,
    /// Total reactive power (kVAR).
    pub total_reactive_power: f64,
    /// Turbine counts per status.
    pub turbine_counts: TurbineCounts,
    /// Wind figures.
    pub wind: WindStatistics,
    /// Average power factor.
    pub average_power_factor: f64,
    /// Average output voltage (V).
    pub average_voltage: f64,
    /// Production per hour over the last day (kWh).
    pub hourly_production: Vec<SeriesPoint>,
    /// Average wind speed per hour (m/s).
    pub hourly_wind_speed: Vec<SeriesPoint>,
    /// Average voltage per hour (V).
    pub hourly_voltage: Vec<SeriesPoint>,
    /// Production per day (kWh).
    pub daily_production: Vec<SeriesPoint>,
    /// Production per month (kWh).
    pub monthly_production: Vec<SeriesPoint>,
}

// =============================================================================
// Tests
// =============================================================================
