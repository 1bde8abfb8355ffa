//! Farm History REST Client
//!
//! Implements `HistoryPort` against the farm history API:
//!
//! - `GET  {base}/turbines/{id}/history?from&to`
//! - `GET  {base}/turbines/history?from&to`
//! - `GET  {base}/alerts/history?page&size&severity`
//! - `POST {base}/alerts/{id}/acknowledge`
//! - `POST {base}/alerts/{id}/resolve`
//!
//! Every request carries `Authorization: Bearer <key>` when a key is
//! configured. Timestamps are sent as RFC 3339 with millisecond precision.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::application::ports::{HistoryError, HistoryPort};
use crate::domain::history::{
    AlertHistoryPage, AlertHistoryQuery, HistoricalDataPoint, TurbineHistory,
};
use crate::infrastructure::config::HistorySettings;

/// REST client for the farm history API.
#[derive(Debug, Clone)]
pub struct HistoryClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HistoryClient {
    /// Build a client for the configured API.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Config` if the base URL is invalid or the
    /// HTTP client cannot be built.
    pub fn new(settings: &HistorySettings) -> Result<Self, HistoryError> {
        let base_url = Url::parse(&settings.base_url)
            .map_err(|e| HistoryError::Config(format!("{}: {e}", settings.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(HistoryError::Config(format!(
                "{} cannot be used as a base URL",
                settings.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| HistoryError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, HistoryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| HistoryError::Config(format!("{} has no path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, HistoryError> {
        tracing::debug!(%url, "History API request");
        let response = self
            .authorize(self.client.get(url).query(query))
            .send()
            .await
            .map_err(|e| HistoryError::Network(e.to_string()))?;

        let response = check_status(response).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| HistoryError::Network(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| HistoryError::Decode(e.to_string()))
    }

    async fn post(&self, url: Url) -> Result<(), HistoryError> {
        tracing::debug!(%url, "History API action");
        let response = self
            .authorize(self.client.post(url))
            .send()
            .await
            .map_err(|e| HistoryError::Network(e.to_string()))?;

        check_status(response).await.map(drop)
    }
}

/// Server error body; either field may carry the message.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, HistoryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let message = serde_json::from_slice::<ErrorBody>(&body)
        .ok()
        .and_then(|body| body.message.or(body.error))
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("HTTP error: {}", status.as_u16()));

    Err(HistoryError::Api {
        status: status.as_u16(),
        message,
    })
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn window(from: DateTime<Utc>, to: DateTime<Utc>) -> [(&'static str, String); 2] {
    [("from", timestamp(from)), ("to", timestamp(to))]
}

#[async_trait]
impl HistoryPort for HistoryClient {
    async fn turbine_history(
        &self,
        turbine_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<TurbineHistory, HistoryError> {
        let url = self.endpoint(&["turbines", turbine_id, "history"])?;
        self.get_json(url, &window(from, to)).await
    }

    async fn all_turbines_history(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<HistoricalDataPoint>, HistoryError> {
        let url = self.endpoint(&["turbines", "history"])?;
        self.get_json(url, &window(from, to)).await
    }

    async fn alerts_history(
        &self,
        query: AlertHistoryQuery,
    ) -> Result<AlertHistoryPage, HistoryError> {
        let url = self.endpoint(&["alerts", "history"])?;
        let mut params = vec![
            ("page", query.page.to_string()),
            ("size", query.page_size.to_string()),
        ];
        if let Some(severity) = query.severity {
            params.push(("severity", severity.as_str().to_string()));
        }
        self.get_json(url, &params).await
    }

    async fn acknowledge_alert(&self, alert_id: &str) -> Result<(), HistoryError> {
        let url = self.endpoint(&["alerts", alert_id, "acknowledge"])?;
        self.post(url).await
    }

    async fn resolve_alert(&self, alert_id: &str) -> Result<(), HistoryError> {
        let url = self.endpoint(&["alerts", alert_id, "resolve"])?;
        self.post(url).await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::domain::farm::{AlertSeverity, TurbineStatus};

    fn client_for(server: &MockServer, api_key: Option<&str>) -> HistoryClient {
        HistoryClient::new(&HistorySettings {
            base_url: format!("{}/api", server.uri()),
            api_key: api_key.map(str::to_string),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn window_bounds() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = HistoryClient::new(&HistorySettings {
            base_url: "not a url".to_string(),
            ..HistorySettings::default()
        });
        assert!(matches!(result, Err(HistoryError::Config(_))));
    }

    #[test]
    fn endpoint_appends_segments_to_base_path() {
        let client = HistoryClient::new(&HistorySettings {
            base_url: "http://localhost:5000/api/".to_string(),
            ..HistorySettings::default()
        })
        .unwrap();

        let url = client.endpoint(&["turbines", "T 7", "history"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/turbines/T%207/history");
    }

    #[tokio::test]
    async fn turbine_history_sends_window_and_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/turbines/3/history"))
            .and(query_param("from", "2025-06-01T00:00:00.000Z"))
            .and(query_param("to", "2025-06-02T00:00:00.000Z"))
            .and(header("authorization", "Bearer farm-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "turbineId": "3",
                "data": [{
                    "timestamp": "2025-06-01T00:00:00.000Z",
                    "turbineId": "3",
                    "activePower": 1830.5,
                    "windSpeed": 11.2,
                    "status": "operational"
                }],
                "from": "2025-06-01T00:00:00.000Z",
                "to": "2025-06-02T00:00:00.000Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (from, to) = window_bounds();
        let history = client_for(&server, Some("farm-key"))
            .turbine_history("3", from, to)
            .await
            .unwrap();

        assert_eq!(history.turbine_id, "3");
        assert_eq!(history.data.len(), 1);
        assert_eq!(history.data[0].status, TurbineStatus::Operational);
    }

    #[tokio::test]
    async fn all_turbines_history_returns_flat_points() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/turbines/history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"timestamp": "2025-06-01T00:00:00Z", "turbineId": "1", "activePower": 900.0, "windSpeed": 7.5, "status": "operational"},
                {"timestamp": "2025-06-01T00:00:00Z", "turbineId": "2", "activePower": 0.0, "windSpeed": 7.5, "status": "maintenance"}
            ])))
            .mount(&server)
            .await;

        let (from, to) = window_bounds();
        let points = client_for(&server, None)
            .all_turbines_history(from, to)
            .await
            .unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[1].status, TurbineStatus::Maintenance);
    }

    #[tokio::test]
    async fn alerts_history_passes_paging_and_severity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/alerts/history"))
            .and(query_param("page", "2"))
            .and(query_param("size", "20"))
            .and(query_param("severity", "critical"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "alerts": [],
                "total": 21,
                "page": 2,
                "pageSize": 20
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client_for(&server, None)
            .alerts_history(AlertHistoryQuery {
                page: 2,
                page_size: 20,
                severity: Some(AlertSeverity::Critical),
            })
            .await
            .unwrap();

        assert_eq!(page.total, 21);
        assert!(page.alerts.is_empty());
    }

    #[tokio::test]
    async fn acknowledge_and_resolve_post_to_alert_actions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/alerts/alert-1/acknowledge"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/alerts/alert-1/resolve"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        client.acknowledge_alert("alert-1").await.unwrap();
        client.resolve_alert("alert-1").await.unwrap();
    }

    #[tokio::test]
    async fn error_status_carries_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/alerts/missing/acknowledge"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "Alert not found"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server, None)
            .acknowledge_alert("missing")
            .await
            .unwrap_err();

        match err {
            HistoryError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Alert not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_status_without_body_uses_generic_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/alerts/history"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server, None)
            .alerts_history(AlertHistoryQuery::default())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "history API error (503): HTTP error: 503");
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/turbines/history"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let (from, to) = window_bounds();
        let err = client_for(&server, None)
            .all_turbines_history(from, to)
            .await
            .unwrap_err();

        assert!(matches!(err, HistoryError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let client = HistoryClient::new(&HistorySettings {
            base_url: "http://127.0.0.1:9/api".to_string(),
            api_key: None,
            timeout: Duration::from_secs(2),
        })
        .unwrap();

        let err = client.resolve_alert("alert-1").await.unwrap_err();
        assert!(matches!(err, HistoryError::Network(_)));
    }
}
