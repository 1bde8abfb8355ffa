//! Wind Farm MQTT Message Types
//!
//! Wire format types for the flat, single-level JSON messages field devices
//! publish on the farm broker. Field names follow the devices' `snake_case`
//! schema.
//!
//! # Message Types
//!
//! - `FlatTelemetryMessage`: one turbine's measurements
//!   (`windfarm/turbines/{id}/clean_telemetry`)
//! - `FlatAlertMessage`: one alert (`windfarm/alerts`)
//! - `FlatStatisticsMessage`: farm aggregates and history arrays
//!   (`windfarm/stats`)
//!
//! Devices are loose about types: identifiers arrive as numbers or strings,
//! numbers occasionally as strings, and absent values as `null`. The
//! [`lenient`] helpers absorb that here so the decoder works on clean values.

use serde::{Deserialize, Serialize};

// =============================================================================
// Telemetry
// =============================================================================

/// Flat per-turbine telemetry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatTelemetryMessage {
    /// Farm identifier.
    #[serde(default, deserialize_with = "lenient::optional_id")]
    pub farm_id: Option<String>,
    /// Farm name.
    #[serde(default)]
    pub farm_name: Option<String>,
    /// Turbine identifier (required).
    #[serde(deserialize_with = "lenient::id")]
    pub turbine_id: String,
    /// Turbine display name.
    #[serde(default)]
    pub turbine_name: Option<String>,
    /// Device timestamp.
    #[serde(default)]
    pub timestamp: Option<String>,

    /// Wind speed (m/s).
    #[serde(default, deserialize_with = "lenient::number")]
    pub wind_speed_mps: f64,
    /// Wind direction (degrees).
    #[serde(default, deserialize_with = "lenient::number")]
    pub wind_direction_deg: f64,

    /// Rotor speed (RPM).
    #[serde(default, deserialize_with = "lenient::number")]
    pub rotor_speed_rpm: f64,
    /// Blade pitch (degrees).
    #[serde(default, deserialize_with = "lenient::number")]
    pub blade_pitch_angle_deg: f64,
    /// Yaw position (degrees).
    #[serde(default, deserialize_with = "lenient::number")]
    pub yaw_position_deg: f64,
    /// Vibration (mm/s).
    #[serde(default, deserialize_with = "lenient::number")]
    pub vibrations_mms: f64,
    /// Gearbox temperature (°C).
    #[serde(default, deserialize_with = "lenient::number")]
    pub gear_temperature_c: f64,
    /// Bearing temperature (°C).
    #[serde(default, deserialize_with = "lenient::number")]
    pub bearing_temperature_c: f64,

    /// Output voltage (V).
    #[serde(default, deserialize_with = "lenient::number")]
    pub output_voltage_v: f64,
    /// Generated current (A).
    #[serde(default, deserialize_with = "lenient::number")]
    pub generated_current_a: f64,
    /// Active power (kW).
    #[serde(default, deserialize_with = "lenient::number")]
    pub active_power_kw: f64,
    /// Reactive power (kVAR).
    #[serde(default, deserialize_with = "lenient::number")]
    pub reactive_power_kvar: f64,

    /// Device status string.
    #[serde(default)]
    pub operational_state: Option<String>,
    /// Rated capacity (MW).
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub capacity_mw: Option<f64>,
}

// =============================================================================
// Alerts
// =============================================================================

/// Flat alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatAlertMessage {
    /// Device-side alert id. Not used as the stored id.
    #[serde(default, deserialize_with = "lenient::optional_id")]
    pub alert_id: Option<String>,
    /// Farm identifier.
    #[serde(default, deserialize_with = "lenient::optional_id")]
    pub farm_id: Option<String>,
    /// Turbine identifier (required).
    #[serde(deserialize_with = "lenient::id")]
    pub turbine_id: String,
    /// Turbine display name.
    #[serde(default)]
    pub turbine_name: Option<String>,
    /// Category, English or Spanish (required).
    pub alert_type: String,
    /// Severity, English or Spanish (required).
    pub severity: String,
    /// Human-readable text.
    #[serde(default)]
    pub message: Option<String>,
    /// Extra detail appended to the message.
    #[serde(default)]
    pub details: Option<String>,
    /// Event time.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Already acknowledged upstream.
    #[serde(default, deserialize_with = "lenient::flag")]
    pub acknowledged: bool,
    /// Already resolved upstream.
    #[serde(default, deserialize_with = "lenient::flag")]
    pub resolved: bool,
}

// =============================================================================
// Statistics
// =============================================================================

/// Flat farm statistics with parallel value and label arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatStatisticsMessage {
    /// Farm identifier.
    #[serde(default, deserialize_with = "lenient::optional_id")]
    pub farm_id: Option<String>,
    /// Farm name.
    #[serde(default)]
    pub farm_name: Option<String>,
    /// Aggregation time.
    #[serde(default)]
    pub timestamp: Option<String>,

    /// Total active power (kW).
    #[serde(default, deserialize_with = "lenient::number")]
    pub total_active_power_kw: f64,
    /// Total reactive power (kVAR).
    #[serde(default, deserialize_with = "lenient::number")]
    pub total_reactive_power_kvar: f64,

    /// Turbines in the farm.
    #[serde(default, deserialize_with = "lenient::count")]
    pub total_turbines: u32,
    /// Operational turbines.
    #[serde(default, deserialize_with = "lenient::count")]
    pub operational_turbines: u32,
    /// Stopped turbines.
    #[serde(default, deserialize_with = "lenient::count")]
    pub stopped_turbines: u32,
    /// Turbines under maintenance.
    #[serde(default, deserialize_with = "lenient::count")]
    pub maintenance_turbines: u32,
    /// Faulted turbines.
    #[serde(default, deserialize_with = "lenient::count")]
    pub fault_turbines: u32,

    /// Average wind speed (m/s).
    #[serde(default, deserialize_with = "lenient::number")]
    pub avg_wind_speed_mps: f64,
    /// Maximum wind speed (m/s).
    #[serde(default, deserialize_with = "lenient::number")]
    pub max_wind_speed_mps: f64,
    /// Minimum wind speed (m/s).
    #[serde(default, deserialize_with = "lenient::number")]
    pub min_wind_speed_mps: f64,
    /// Predominant wind direction (degrees).
    #[serde(default, deserialize_with = "lenient::number")]
    pub predominant_wind_direction_deg: f64,

    /// Average power factor.
    #[serde(default, deserialize_with = "lenient::number")]
    pub avg_power_factor: f64,
    /// Average output voltage (V).
    #[serde(default, deserialize_with = "lenient::number")]
    pub avg_voltage_v: f64,

    /// Production per hour, last 24 hours (kWh).
    #[serde(default, deserialize_with = "lenient::numbers")]
    pub hourly_production_kwh: Vec<f64>,
    /// Average wind speed per hour (m/s).
    #[serde(default, deserialize_with = "lenient::numbers")]
    pub hourly_avg_wind_speed: Vec<f64>,
    /// Average voltage per hour (V).
    #[serde(default, deserialize_with = "lenient::numbers")]
    pub hourly_avg_voltage: Vec<f64>,
    /// Labels for the hourly arrays.
    #[serde(default, deserialize_with = "lenient::labels")]
    pub hourly_timestamps: Vec<Option<String>>,
    /// Production per day (kWh).
    #[serde(default, deserialize_with = "lenient::numbers")]
    pub daily_production_kwh: Vec<f64>,
    /// Labels for the daily array.
    #[serde(default, deserialize_with = "lenient::labels")]
    pub daily_timestamps: Vec<Option<String>>,
    /// Production per month (kWh).
    #[serde(default, deserialize_with = "lenient::numbers")]
    pub monthly_production_kwh: Vec<f64>,
    /// Labels for the monthly array.
    #[serde(default, deserialize_with = "lenient::labels")]
    pub monthly_timestamps: Vec<Option<String>>,
}

// =============================================================================
// Lenient field decoding
// =============================================================================

/// Deserializers for loosely typed device fields.
pub mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Identifier given as a non-empty string or a number.
    pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        optional_id(deserializer)?.ok_or_else(|| D::Error::custom("identifier is null or empty"))
    }

    /// Optional identifier; `null` and blank strings are `None`.
    pub fn optional_id<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::String(text) => {
                let trimmed = text.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            Value::Number(number) => Ok(Some(number.to_string())),
            other => Err(D::Error::custom(format!("invalid identifier: {other}"))),
        }
    }

    /// Number given as a JSON number or numeric string; `null` is `0`.
    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(optional_number(deserializer)?.unwrap_or_default())
    }

    /// Optional number given as a JSON number or numeric string.
    pub fn optional_number<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<f64>, D::Error> {
        value_to_number(Value::deserialize(deserializer)?).map_err(D::Error::custom)
    }

    /// Non-negative count; fractional values are truncated.
    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let value = number(deserializer)?;
        if !value.is_finite() || value <= 0.0 {
            return Ok(0);
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = value.min(f64::from(u32::MAX)) as u32;
        Ok(count)
    }

    /// Boolean given as `true`/`false`, `0`/`1`, or `null`.
    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Bool(flag) => Ok(flag),
            Value::Null => Ok(false),
            Value::Number(number) => Ok(number.as_f64().is_some_and(|n| n != 0.0)),
            Value::String(text) => Ok(text.eq_ignore_ascii_case("true")),
            other => Err(D::Error::custom(format!("invalid flag: {other}"))),
        }
    }

    /// Array of numbers; `null` is an empty array, `null` elements are `0`.
    pub fn numbers<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items
                .into_iter()
                .map(|item| value_to_number(item).map(Option::unwrap_or_default))
                .collect::<Result<_, _>>()
                .map_err(D::Error::custom),
            other => Err(D::Error::custom(format!("expected an array, got {other}"))),
        }
    }

    /// Array of labels; `null`, blank and non-string elements are kept as
    /// `None` so positions stay aligned with the value arrays.
    pub fn labels<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Option<String>>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => Ok(items
                .into_iter()
                .map(|item| match item {
                    Value::String(text) if !text.trim().is_empty() => Some(text),
                    Value::Number(number) => Some(number.to_string()),
                    _ => None,
                })
                .collect()),
            other => Err(D::Error::custom(format!("expected an array, got {other}"))),
        }
    }

    fn value_to_number(value: Value) -> Result<Option<f64>, String> {
        match value {
            Value::Null => Ok(None),
            Value::Number(number) => Ok(number.as_f64()),
            Value::String(text) => text
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| format!("invalid number: {text:?}")),
            other => Err(format!("invalid number: {other}")),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
