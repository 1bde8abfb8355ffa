//! Decoder and reducer working together on broker payloads.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use chrono::Utc;
use windfarm_monitor::domain::farm::{AlertSeverity, AlertType, TurbineStatus};
use windfarm_monitor::domain::state::{FarmSnapshot, generate_alert_id};
use windfarm_monitor::infrastructure::mqtt::{
    DecodeError, DecodedMessage, FeedCodec, MessageCategory,
};

fn decode(topic: &str, payload: &str) -> Result<DecodedMessage, DecodeError> {
    let category = MessageCategory::from_topic(topic).expect("farm topic");
    FeedCodec::new().decode(category, payload.as_bytes())
}

fn apply(snapshot: &mut FarmSnapshot, message: DecodedMessage) {
    let now = Utc::now();
    match message {
        DecodedMessage::Telemetry(update) => snapshot.apply_telemetry(update, now),
        DecodedMessage::Alert(event) => {
            snapshot.apply_alert(generate_alert_id(now), event, now);
        }
        DecodedMessage::Statistics(statistics) => snapshot.apply_statistics(*statistics, now),
    }
}

#[test]
fn running_turbine_is_operational_with_derived_power_factor() {
    let message = decode(
        "windfarm/turbines/7/clean_telemetry",
        r#"{
            "turbine_id": 7,
            "operational_state": "running",
            "active_power_kw": 1200,
            "reactive_power_kvar": 400,
            "wind_speed_mps": 9.5,
            "wind_direction_deg": 370
        }"#,
    )
    .unwrap();

    let mut snapshot = FarmSnapshot::default();
    apply(&mut snapshot, message);

    let turbine = snapshot.turbine("7").unwrap();
    assert_eq!(turbine.status(), TurbineStatus::Operational);
    assert!((turbine.readings.electrical.power_factor - 0.9487).abs() < 1e-4);
    assert!((turbine.readings.environmental.wind_direction - 10.0).abs() < 1e-9);
    assert_eq!(turbine.name(), "Turbine 7");
    assert!(snapshot.last_update.is_some());
}

#[test]
fn spanish_alert_names_map_to_canonical_values() {
    let message = decode(
        "windfarm/alerts",
        r#"{"turbine_id": 3, "alert_type": "mecánica", "severity": "crítico", "message": "Vibración excesiva"}"#,
    )
    .unwrap();

    let mut snapshot = FarmSnapshot::default();
    apply(&mut snapshot, message);

    let alert = &snapshot.alerts[0];
    assert_eq!(alert.alert_type, AlertType::Mechanical);
    assert_eq!(alert.severity, AlertSeverity::Critical);
    assert_eq!(alert.turbine_name, "Turbine 3");
    assert!(!alert.acknowledged);
}

#[test]
fn statistics_seed_placeholders_that_telemetry_then_fills() {
    let mut snapshot = FarmSnapshot::default();
    apply(
        &mut snapshot,
        decode(
            "windfarm/stats",
            r#"{"farm_id": 1, "total_turbines": 4, "total_active_power_kw": 5100, "hourly_production_kwh": [120, 130]}"#,
        )
        .unwrap(),
    );

    assert_eq!(
        snapshot.turbines.keys().cloned().collect::<Vec<_>>(),
        vec!["1", "2", "3", "4"]
    );
    assert_eq!(snapshot.count_by_status(TurbineStatus::Standby), 4);
    let statistics = snapshot.statistics.as_ref().unwrap();
    assert_eq!(statistics.hourly_production[1].label, "1:00");

    snapshot
        .turbines
        .get_mut("2")
        .unwrap()
        .maintenance
        .last_maintenance = Some("2025-03-14".to_string());

    apply(
        &mut snapshot,
        decode(
            "windfarm/turbines/2/clean_telemetry",
            r#"{"turbine_id": "2", "operational_state": "fault", "turbine_name": "North Ridge 2", "capacity_mw": 3.0}"#,
        )
        .unwrap(),
    );

    let turbine = snapshot.turbine("2").unwrap();
    assert_eq!(turbine.status(), TurbineStatus::Fault);
    assert_eq!(turbine.name(), "North Ridge 2");
    assert_eq!(
        turbine.maintenance.last_maintenance.as_deref(),
        Some("2025-03-14")
    );
    assert_eq!(snapshot.turbines.len(), 4);
}

#[test]
fn malformed_payloads_are_rejected_without_touching_state() {
    let snapshot = FarmSnapshot::default();

    assert!(decode("windfarm/alerts", "not json").is_err());
    assert!(decode("windfarm/alerts", r#"{"turbine_id": 3}"#).is_err());
    assert!(decode("windfarm/turbines/1/clean_telemetry", "[1, 2, 3]").is_err());

    assert_eq!(snapshot, FarmSnapshot::default());
}

#[test]
fn alert_list_keeps_the_newest_hundred() {
    let mut snapshot = FarmSnapshot::default();
    for index in 0..130 {
        let payload = format!(
            r#"{{"turbine_id": 1, "alert_type": "system", "severity": "info", "message": "event {index}"}}"#
        );
        apply(&mut snapshot, decode("windfarm/alerts", &payload).unwrap());
    }

    assert_eq!(snapshot.alerts.len(), 100);
    assert_eq!(snapshot.alerts[0].message, "event 129");
    assert_eq!(snapshot.alerts[99].message, "event 30");
}

#[test]
fn oversized_turbine_count_does_not_seed_placeholders() {
    let mut snapshot = FarmSnapshot::default();
    apply(
        &mut snapshot,
        decode("windfarm/stats", r#"{"farm_id": 1, "total_turbines": 1e12}"#).unwrap(),
    );

    assert!(snapshot.turbines.is_empty());
    assert!(snapshot.statistics.is_some());

    apply(
        &mut snapshot,
        decode(
            "windfarm/turbines/5/clean_telemetry",
            r#"{"turbine_id": 5, "operational_state": "running"}"#,
        )
        .unwrap(),
    );
    assert_eq!(snapshot.turbines.len(), 1);
}
