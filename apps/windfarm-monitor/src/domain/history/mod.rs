//! Historical query types returned by the farm history API.

use serde::{Deserialize, Serialize};

use super::farm::{Alert, AlertSeverity, TurbineId, TurbineStatus};

/// Default alert page size.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// One stored sample of a turbine's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalDataPoint {
    /// Sample time.
    pub timestamp: String,
    /// Turbine the sample belongs to.
    pub turbine_id: TurbineId,
    /// Active power (kW).
    #[serde(default)]
    pub active_power: f64,
    /// Wind speed (m/s).
    #[serde(default)]
    pub wind_speed: f64,
    /// Status at sample time.
    #[serde(default)]
    pub status: TurbineStatus,
}

/// Time series for one turbine over a requested window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurbineHistory {
    /// Turbine queried.
    pub turbine_id: TurbineId,
    /// Samples, oldest first.
    #[serde(default)]
    pub data: Vec<HistoricalDataPoint>,
    /// Window start.
    pub from: String,
    /// Window end.
    pub to: String,
}

/// Page of stored alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertHistoryPage {
    /// Alerts on this page.
    #[serde(default)]
    pub alerts: Vec<Alert>,
    /// Alerts matching the query across all pages.
    pub total: u64,
    /// Page number, starting at 1.
    pub page: u32,
    /// Page size.
    pub page_size: u32,
}

/// Alert history query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertHistoryQuery {
    /// Page number, starting at 1.
    pub page: u32,
    /// Page size.
    pub page_size: u32,
    /// Only alerts of this severity.
    pub severity: Option<AlertSeverity>,
}

impl Default for AlertHistoryQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            severity: None,
        }
    }
}
