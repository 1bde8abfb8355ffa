//! Farm State Reducer
//!
//! Holds the authoritative in-memory snapshot of the farm and applies decoded
//! events to it. Readers receive an `Arc<FarmSnapshot>`; every apply runs under
//! the write lock and swaps in a fully updated snapshot, so a reader never sees
//! half of an update.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use super::farm::{
    Alert, AlertEvent, FarmStatistics, MaintenanceInfo, TelemetryUpdate, Turbine,
    TurbineIdentity, TurbineId, TurbineStatus, DEFAULT_CAPACITY_MW, default_turbine_name,
};

/// Number of alerts retained, newest first.
pub const MAX_RETAINED_ALERTS: usize = 100;

/// Largest turbine count that statistics may seed as placeholders.
pub const MAX_PLACEHOLDER_TURBINES: u32 = 1_000;

/// Build a unique alert id from the ingestion time and a random suffix.
#[must_use]
pub fn generate_alert_id(ingested_at: DateTime<Utc>) -> String {
    format!(
        "alert-{}-{}",
        ingested_at.timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

// =============================================================================
// Snapshot
// =============================================================================

/// Full state of the farm at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmSnapshot {
    /// Turbines keyed by id.
    pub turbines: BTreeMap<TurbineId, Turbine>,
    /// Retained alerts, newest first.
    pub alerts: Vec<Alert>,
    /// Latest farm-wide statistics.
    pub statistics: Option<FarmStatistics>,
    /// Wall-clock time of the last applied telemetry or statistics message.
    pub last_update: Option<DateTime<Utc>>,
}

impl FarmSnapshot {
    /// Apply a telemetry message.
    ///
    /// Unknown turbines are created from the metadata or the defaults. Known
    /// turbines take new readings wholesale, take name and capacity only when
    /// the metadata supplies them, and keep their maintenance record.
    pub fn apply_telemetry(&mut self, update: TelemetryUpdate, now: DateTime<Utc>) {
        let TelemetryUpdate { reading, metadata } = update;
        let id = reading.turbine_id;

        match self.turbines.get_mut(&id) {
            Some(turbine) => {
                if let Some(name) = metadata.name {
                    turbine.identity.name = name;
                }
                if let Some(capacity) = metadata.capacity {
                    turbine.identity.capacity = capacity;
                }
                turbine.readings = reading.readings;
            }
            None => {
                let identity = TurbineIdentity {
                    name: metadata.name.unwrap_or_else(|| default_turbine_name(&id)),
                    capacity: metadata.capacity.unwrap_or(DEFAULT_CAPACITY_MW),
                    id: id.clone(),
                };
                let turbine = Turbine::new(identity, reading.readings, MaintenanceInfo::default());
                self.turbines.insert(id, turbine);
            }
        }

        self.last_update = Some(now);
    }

    /// Apply an alert under the given id, returning the stored alert.
    pub fn apply_alert(&mut self, id: String, event: AlertEvent, now: DateTime<Utc>) -> Alert {
        let turbine_name = event
            .turbine_name
            .clone()
            .or_else(|| {
                self.turbines
                    .get(&event.turbine_id)
                    .map(|turbine| turbine.name().to_string())
            })
            .unwrap_or_else(|| default_turbine_name(&event.turbine_id));

        let alert = Alert::new(id, event, turbine_name, now);
        self.alerts.insert(0, alert.clone());
        self.alerts.truncate(MAX_RETAINED_ALERTS);
        alert
    }

    /// Apply farm statistics.
    ///
    /// An empty turbine collection is seeded with `1..=total` placeholders
    /// first, so the grid exists before per-turbine telemetry arrives. Counts
    /// above [`MAX_PLACEHOLDER_TURBINES`] seed nothing.
    pub fn apply_statistics(&mut self, statistics: FarmStatistics, now: DateTime<Utc>) {
        let total = statistics.turbine_counts.total;
        if self.turbines.is_empty() && (1..=MAX_PLACEHOLDER_TURBINES).contains(&total) {
            for index in 1..=total {
                let id = index.to_string();
                self.turbines.insert(id.clone(), Turbine::placeholder(id));
            }
        }

        self.statistics = Some(statistics);
        self.last_update = Some(now);
    }

    /// Mark an alert acknowledged. Returns `false` if the id is unknown.
    pub fn apply_acknowledge(&mut self, alert_id: &str) -> bool {
        let Some(alert) = self.alert_mut(alert_id) else {
            return false;
        };
        alert.acknowledged = true;
        true
    }

    /// Mark an alert resolved at `now`. Returns `false` if the id is unknown.
    pub fn apply_resolve(&mut self, alert_id: &str, now: DateTime<Utc>) -> bool {
        let Some(alert) = self.alert_mut(alert_id) else {
            return false;
        };
        alert.resolved_at = Some(now);
        true
    }

    fn alert_mut(&mut self, alert_id: &str) -> Option<&mut Alert> {
        self.alerts.iter_mut().find(|alert| alert.id == alert_id)
    }

    // -------------------------------------------------------------------------
    // Derived views
    // -------------------------------------------------------------------------

    /// Turbine by id.
    #[must_use]
    pub fn turbine(&self, id: &str) -> Option<&Turbine> {
        self.turbines.get(id)
    }

    /// Alert by id.
    #[must_use]
    pub fn alert(&self, id: &str) -> Option<&Alert> {
        self.alerts.iter().find(|alert| alert.id == id)
    }

    /// Alerts not yet resolved, newest first.
    pub fn active_alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter().filter(|alert| alert.is_active())
    }

    /// Number of alerts nobody has acknowledged yet.
    #[must_use]
    pub fn unacknowledged_count(&self) -> usize {
        self.alerts.iter().filter(|alert| !alert.acknowledged).count()
    }

    /// Number of turbines currently in `status`.
    #[must_use]
    pub fn count_by_status(&self, status: TurbineStatus) -> usize {
        self.turbines
            .values()
            .filter(|turbine| turbine.status() == status)
            .count()
    }

    /// Total rated capacity of all known turbines (MW).
    #[must_use]
    pub fn installed_capacity(&self) -> f64 {
        self.turbines
            .values()
            .map(|turbine| turbine.identity.capacity)
            .sum()
    }
}

// =============================================================================
// Store
// =============================================================================

/// Shared owner of the current [`FarmSnapshot`].
#[derive(Debug, Default)]
pub struct FarmStore {
    current: RwLock<Arc<FarmSnapshot>>,
}

impl FarmStore {
    /// Create a store holding an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot. Cheap; later applies never alter a returned snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<FarmSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Apply a telemetry message.
    pub fn apply_telemetry(&self, update: TelemetryUpdate) {
        self.update(|snapshot| snapshot.apply_telemetry(update, Utc::now()));
    }

    /// Apply an alert, returning the stored alert with its generated id.
    pub fn apply_alert(&self, event: AlertEvent) -> Alert {
        let now = Utc::now();
        self.update(|snapshot| snapshot.apply_alert(generate_alert_id(now), event, now))
    }

    /// Apply farm statistics.
    pub fn apply_statistics(&self, statistics: FarmStatistics) {
        self.update(|snapshot| snapshot.apply_statistics(statistics, Utc::now()));
    }

    /// Acknowledge an alert. Unknown ids leave the snapshot untouched and
    /// return `false`.
    pub fn apply_acknowledge(&self, alert_id: &str) -> bool {
        self.update_existing(alert_id, |snapshot| snapshot.apply_acknowledge(alert_id))
    }

    /// Resolve an alert. Unknown ids leave the snapshot untouched and return
    /// `false`.
    pub fn apply_resolve(&self, alert_id: &str) -> bool {
        self.update_existing(alert_id, |snapshot| {
            snapshot.apply_resolve(alert_id, Utc::now())
        })
    }

    fn update<R>(&self, apply: impl FnOnce(&mut FarmSnapshot) -> R) -> R {
        let mut current = self.current.write();
        apply(Arc::make_mut(&mut current))
    }

    fn update_existing(&self, alert_id: &str, apply: impl FnOnce(&mut FarmSnapshot) -> bool) -> bool {
        let mut current = self.current.write();
        if current.alert(alert_id).is_none() {
            return false;
        }
        apply(Arc::make_mut(&mut current))
    }
}

// =============================================================================
// Tests
// =============================================================================
