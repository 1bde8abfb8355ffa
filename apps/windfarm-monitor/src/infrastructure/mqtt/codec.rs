//! Wire Message Decoder
//!
//! Pure translation from the flat device messages to the structured farm
//! model. One function per category plus [`FeedCodec`], which parses a raw
//! payload and picks the translation by category.
//!
//! # Synthetic values
//!
//! Devices do not report gearbox oil yet. Telemetry carries
//! [`DEFAULT_OIL_PRESSURE_BAR`] and [`DEFAULT_OIL_LEVEL_PERCENT`] in those
//! fields; they are placeholders, not measurements.

use crate::domain::farm::{
    AlertEvent, AlertSeverity, AlertType, ElectricalReadings, EnvironmentalReadings,
    FarmStatistics, MechanicalReadings, SeriesPoint, TelemetryReading, TelemetryUpdate,
    TurbineCounts, TurbineMetadata, TurbineReadings, TurbineStatus, WindStatistics,
};
use crate::infrastructure::mqtt::messages::{
    FlatAlertMessage, FlatStatisticsMessage, FlatTelemetryMessage,
};
use crate::infrastructure::mqtt::topics::MessageCategory;

/// Oil pressure reported until devices publish it (bar).
pub const DEFAULT_OIL_PRESSURE_BAR: f64 = 5.0;

/// Oil level reported until devices publish it (%).
pub const DEFAULT_OIL_LEVEL_PERCENT: f64 = 85.0;

/// Decoder errors.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Payload is not valid JSON or violates the message schema.
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload is not a JSON object.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    /// Turbine telemetry with identity metadata.
    Telemetry(TelemetryUpdate),
    /// Alert.
    Alert(AlertEvent),
    /// Farm statistics.
    Statistics(Box<FarmStatistics>),
}

/// Decoder for broker payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedCodec;

impl FeedCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a payload received on a topic of the given category.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a JSON object or does not
    /// match the category's schema.
    pub fn decode(
        &self,
        category: MessageCategory,
        payload: &[u8],
    ) -> Result<DecodedMessage, DecodeError> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| DecodeError::InvalidFormat(format!("payload is not UTF-8: {e}")))?;
        let trimmed = text.trim();
        if !trimmed.starts_with('{') {
            return Err(DecodeError::InvalidFormat(
                "expected a JSON object".to_string(),
            ));
        }

        let message = match category {
            MessageCategory::Telemetry => {
                DecodedMessage::Telemetry(decode_telemetry(serde_json::from_str(trimmed)?))
            }
            MessageCategory::Alert => {
                DecodedMessage::Alert(decode_alert(serde_json::from_str(trimmed)?))
            }
            MessageCategory::Statistics => DecodedMessage::Statistics(Box::new(
                decode_statistics(serde_json::from_str(trimmed)?),
            )),
        };
        Ok(message)
    }
}

// =============================================================================
// Telemetry
// =============================================================================

/// Power factor from active and reactive power; `0` when both are zero.
#[must_use]
pub fn power_factor(active_power: f64, reactive_power: f64) -> f64 {
    let apparent = active_power.hypot(reactive_power);
    if apparent > 0.0 {
        active_power / apparent
    } else {
        0.0
    }
}

/// Normalise an angle into `[0, 360)`.
#[must_use]
pub fn normalize_degrees(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Translate flat telemetry into a structured reading plus metadata.
#[must_use]
pub fn decode_telemetry(msg: FlatTelemetryMessage) -> TelemetryUpdate {
    let status = msg
        .operational_state
        .as_deref()
        .map_or(TurbineStatus::Standby, TurbineStatus::from_wire);

    let readings = TurbineReadings {
        status,
        environmental: EnvironmentalReadings {
            wind_speed: msg.wind_speed_mps,
            wind_direction: normalize_degrees(msg.wind_direction_deg),
        },
        mechanical: MechanicalReadings {
            rotor_speed: msg.rotor_speed_rpm,
            pitch_angle: msg.blade_pitch_angle_deg,
            yaw_position: normalize_degrees(msg.yaw_position_deg),
            vibration: msg.vibrations_mms,
            gearbox_temperature: msg.gear_temperature_c,
            bearing_temperature: msg.bearing_temperature_c,
            oil_pressure: DEFAULT_OIL_PRESSURE_BAR,
            oil_level: DEFAULT_OIL_LEVEL_PERCENT,
        },
        electrical: ElectricalReadings {
            output_voltage: msg.output_voltage_v,
            output_current: msg.generated_current_a,
            active_power: msg.active_power_kw,
            reactive_power: msg.reactive_power_kvar,
            power_factor: power_factor(msg.active_power_kw, msg.reactive_power_kvar),
        },
    };

    TelemetryUpdate {
        reading: TelemetryReading {
            turbine_id: msg.turbine_id,
            timestamp: msg.timestamp.unwrap_or_default(),
            readings,
        },
        metadata: TurbineMetadata {
            name: msg.turbine_name.filter(|name| !name.trim().is_empty()),
            capacity: msg.capacity_mw,
        },
    }
}

// =============================================================================
// Alerts
// =============================================================================

/// Translate a flat alert into a structured alert event.
#[must_use]
pub fn decode_alert(msg: FlatAlertMessage) -> AlertEvent {
    let base = msg.message.unwrap_or_default();
    let message = match msg.details.as_deref().map(str::trim) {
        Some(details) if !details.is_empty() => format!("{base} - {details}"),
        _ => base,
    };

    AlertEvent {
        turbine_id: msg.turbine_id,
        turbine_name: msg.turbine_name.filter(|name| !name.trim().is_empty()),
        alert_type: AlertType::from_wire(&msg.alert_type),
        severity: AlertSeverity::from_wire(&msg.severity),
        message,
        timestamp: msg.timestamp.unwrap_or_default(),
        acknowledged: msg.acknowledged,
        resolved: msg.resolved,
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Translate flat statistics into a structured aggregate.
#[must_use]
pub fn decode_statistics(msg: FlatStatisticsMessage) -> FarmStatistics {
    let hourly_label = |index: usize| format!("{index}:00");

    FarmStatistics {
        hourly_production: series(&msg.hourly_production_kwh, &msg.hourly_timestamps, hourly_label),
        hourly_wind_speed: series(&msg.hourly_avg_wind_speed, &msg.hourly_timestamps, hourly_label),
        hourly_voltage: series(&msg.hourly_avg_voltage, &msg.hourly_timestamps, hourly_label),
        daily_production: series(&msg.daily_production_kwh, &msg.daily_timestamps, |index| {
            format!("Day {}", index + 1)
        }),
        monthly_production: series(
            &msg.monthly_production_kwh,
            &msg.monthly_timestamps,
            |index| format!("Month {}", index + 1),
        ),
        farm_id: msg.farm_id,
        farm_name: msg.farm_name,
        timestamp: msg.timestamp.unwrap_or_default(),
        total_active_power: msg.total_active_power_kw,
        total_reactive_power: msg.total_reactive_power_kvar,
        turbine_counts: TurbineCounts {
            total: msg.total_turbines,
            operational: msg.operational_turbines,
            stopped: msg.stopped_turbines,
            maintenance: msg.maintenance_turbines,
            fault: msg.fault_turbines,
        },
        wind: WindStatistics {
            avg_speed: msg.avg_wind_speed_mps,
            max_speed: msg.max_wind_speed_mps,
            min_speed: msg.min_wind_speed_mps,
            predominant_direction: normalize_degrees(msg.predominant_wind_direction_deg),
        },
        average_power_factor: msg.avg_power_factor,
        average_voltage: msg.avg_voltage_v,
    }
}

/// Pair each value with the label at the same index, or a synthetic label
/// when that label is missing.
fn series(
    values: &[f64],
    labels: &[Option<String>],
    synthetic: impl Fn(usize) -> String,
) -> Vec<SeriesPoint> {
    values
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            let label = labels
                .get(index)
                .cloned()
                .flatten()
                .unwrap_or_else(|| synthetic(index));
            SeriesPoint::new(label, value)
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode(category: MessageCategory, json: &str) -> Result<DecodedMessage, DecodeError> {
        FeedCodec::new().decode(category, json.as_bytes())
    }

    #[test]
    fn running_turbine_scenario() {
        let json = r#"{
            "turbine_id": 7,
            "turbine_name": "Ridge 7",
            "operational_state": "running",
            "active_power_kw": 1200,
            "reactive_power_kvar": 400,
            "wind_speed_mps": 9.5,
            "capacity_mw": 3.0
        }"#;

        let Ok(DecodedMessage::Telemetry(update)) = decode(MessageCategory::Telemetry, json) else {
            panic!("expected telemetry");
        };

        let readings = update.reading.readings;
        assert_eq!(update.reading.turbine_id, "7");
        assert_eq!(readings.status, TurbineStatus::Operational);
        assert!((readings.electrical.power_factor - 0.948_683).abs() < 1e-4);
        assert!((readings.environmental.wind_speed - 9.5).abs() < f64::EPSILON);
        assert_eq!(update.metadata.name.as_deref(), Some("Ridge 7"));
        assert_eq!(update.metadata.capacity, Some(3.0));
    }

    #[test]
    fn telemetry_fills_synthetic_oil_values() {
        let update = decode_telemetry(FlatTelemetryMessage {
            turbine_id: "1".to_string(),
            ..FlatTelemetryMessage::default()
        });
        let mechanical = update.reading.readings.mechanical;
        assert!((mechanical.oil_pressure - DEFAULT_OIL_PRESSURE_BAR).abs() < f64::EPSILON);
        assert!((mechanical.oil_level - DEFAULT_OIL_LEVEL_PERCENT).abs() < f64::EPSILON);
        assert_eq!(update.reading.readings.status, TurbineStatus::Standby);
    }

    #[test]
    fn telemetry_normalizes_angles() {
        let update = decode_telemetry(FlatTelemetryMessage {
            turbine_id: "1".to_string(),
            wind_direction_deg: 360.0,
            yaw_position_deg: -90.0,
            ..FlatTelemetryMessage::default()
        });
        assert!(update.reading.readings.environmental.wind_direction.abs() < f64::EPSILON);
        assert!((update.reading.readings.mechanical.yaw_position - 270.0).abs() < f64::EPSILON);
    }

    #[test]
    fn spanish_alert_scenario() {
        let json = r#"{"turbine_id": 3, "alert_type": "mecánica", "severity": "crítico", "message": "Vibración excesiva"}"#;

        let Ok(DecodedMessage::Alert(event)) = decode(MessageCategory::Alert, json) else {
            panic!("expected alert");
        };

        assert_eq!(event.turbine_id, "3");
        assert_eq!(event.alert_type, AlertType::Mechanical);
        assert_eq!(event.severity, AlertSeverity::Critical);
        assert_eq!(event.message, "Vibración excesiva");
    }

    #[test]
    fn alert_appends_details() {
        let json = r#"{"turbine_id": "5", "alert_type": "electrical", "severity": "warning",
            "message": "Voltage sag", "details": "phase B at 0.91 pu"}"#;
        let Ok(DecodedMessage::Alert(event)) = decode(MessageCategory::Alert, json) else {
            panic!("expected alert");
        };
        assert_eq!(event.message, "Voltage sag - phase B at 0.91 pu");
    }

    #[test]
    fn alert_unknown_strings_fall_back() {
        let json = r#"{"turbine_id": "5", "alert_type": "hydraulic", "severity": "meh"}"#;
        let Ok(DecodedMessage::Alert(event)) = decode(MessageCategory::Alert, json) else {
            panic!("expected alert");
        };
        assert_eq!(event.alert_type, AlertType::System);
        assert_eq!(event.severity, AlertSeverity::Info);
        assert_eq!(event.message, "");
    }

    #[test]
    fn statistics_substitute_missing_labels() {
        let json = r#"{
            "total_turbines": 3,
            "operational_turbines": 2,
            "hourly_production_kwh": [100, 200, 300],
            "hourly_avg_wind_speed": [5.5],
            "hourly_timestamps": ["08:00"],
            "daily_production_kwh": [1000, 2000],
            "daily_timestamps": [null, "Tue"],
            "monthly_production_kwh": [9000]
        }"#;

        let Ok(DecodedMessage::Statistics(stats)) = decode(MessageCategory::Statistics, json) else {
            panic!("expected statistics");
        };

        let hourly: Vec<&str> = stats.hourly_production.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(hourly, ["08:00", "1:00", "2:00"]);
        assert_eq!(stats.hourly_wind_speed, vec![SeriesPoint::new("08:00", 5.5)]);
        assert!(stats.hourly_voltage.is_empty());
        assert_eq!(stats.daily_production[0].label, "Day 1");
        assert_eq!(stats.daily_production[1].label, "Tue");
        assert_eq!(stats.monthly_production[0].label, "Month 1");
        assert_eq!(stats.turbine_counts.total, 3);
        assert_eq!(stats.turbine_counts.operational, 2);
    }

    #[test]
    fn malformed_payloads_are_errors() {
        assert!(matches!(
            decode(MessageCategory::Telemetry, "not json"),
            Err(DecodeError::InvalidFormat(_))
        ));
        assert!(matches!(
            decode(MessageCategory::Telemetry, "[7, 1]"),
            Err(DecodeError::InvalidFormat(_))
        ));
        assert!(matches!(
            decode(MessageCategory::Telemetry, "{\"turbine_id\": "),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            decode(MessageCategory::Alert, r#"{"turbine_id": 1, "severity": "info"}"#),
            Err(DecodeError::Json(_))
        ));
        assert!(FeedCodec::new()
            .decode(MessageCategory::Statistics, &[0xff, 0xfe])
            .is_err());
    }

    #[test]
    fn zero_power_has_zero_power_factor() {
        assert!(power_factor(0.0, 0.0).abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn power_factor_matches_definition(p in -5000.0f64..5000.0, q in -5000.0f64..5000.0) {
            let pf = power_factor(p, q);
            let apparent_sq = p.mul_add(p, q * q);
            if apparent_sq > 0.0 {
                prop_assert!((pf - p / apparent_sq.sqrt()).abs() < 1e-9);
            }
            prop_assert!((-1.0..=1.0).contains(&pf));
        }

        #[test]
        fn normalized_degrees_stay_in_range(angle in -10_000.0f64..10_000.0) {
            let normalized = normalize_degrees(angle);
            prop_assert!((0.0..360.0).contains(&normalized));
        }
    }
}
