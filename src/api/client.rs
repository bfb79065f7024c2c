use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// HTTP collaborator failures.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// HTTP status when the server answered, otherwise `None`.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(super) fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Connection(error.to_string())
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Server-supplied reason from an error body, `details` before `error`.
pub(super) fn error_message(body: &Value) -> Option<String> {
    ["details", "error"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(|value| match value {
            Value::String(text) if !text.is_empty() => Some(text.clone()),
            Value::Null | Value::String(_) => None,
            other => Some(other.to_string()),
        })
}

/// Maps non-success statuses to [`ApiError::Status`] and decodes the body.
pub(super) async fn read_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| error_message(&value))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_owned());
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|error| ApiError::InvalidResponse(error.to_string()))
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct TimeRange {
    pub start_time: String,
    pub end_time: String,
}

/// Raw sensor rows plus the rows flagged as anomalous for the same window.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct SensorPayload {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub anomaly_data: Vec<Value>,
}

/// Client for the data service that serves sensor readings, anomaly rows and
/// the anomaly taxonomy.
#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> ApiResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("edgescope/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| ApiError::Client(error.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<T> {
        debug!(path, "GET");
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(ApiError::from_transport)?;
        read_json(response).await
    }

    pub async fn time_range(&self) -> ApiResult<TimeRange> {
        self.get("get_time_range", &[]).await
    }

    pub async fn data(&self, start_time: &str, end_time: &str) -> ApiResult<SensorPayload> {
        self.get(
            "get_data",
            &[("start_time", start_time), ("end_time", end_time)],
        )
        .await
    }

    /// Raw anomaly list body; see [`crate::taxonomy::rows_from_payload`].
    pub async fn anomaly_list(&self) -> ApiResult<Value> {
        self.get("get_anomaly_list", &[]).await
    }

    pub async fn dynamic_tree(&self) -> ApiResult<Value> {
        self.get("get_dynamic_tree", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn error_message_prefers_details() {
        let body = json!({ "error": "generic", "details": "Username already taken" });
        assert_eq!(error_message(&body).as_deref(), Some("Username already taken"));
    }

    #[test]
    fn error_message_skips_empty_and_null_fields() {
        assert_eq!(
            error_message(&json!({ "details": "", "error": "bad request" })).as_deref(),
            Some("bad request")
        );
        assert_eq!(error_message(&json!({ "details": null })), None);
        assert_eq!(error_message(&json!({})), None);
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let client = ApiClient::new("http://localhost:8000/").expect("client");
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("get_data"), "http://localhost:8000/get_data");
    }

    #[test]
    fn sensor_payload_tolerates_missing_lists() {
        let payload: SensorPayload =
            serde_json::from_value(json!({ "data": [{ "ts": "t" }] })).expect("decode");
        assert_eq!(payload.data.len(), 1);
        assert!(payload.anomaly_data.is_empty());
    }

    #[test]
    fn status_is_only_known_for_server_answers() {
        let error = ApiError::Status {
            status: 401,
            message: "Unauthorized".to_owned(),
        };
        assert_eq!(error.status(), Some(401));
        assert_eq!(ApiError::Timeout.status(), None);
    }
}
