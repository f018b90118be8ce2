//! HTTP client for the booth backend's `/api/v1` surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::BoothConfig;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned HTTP {status}: {}", detail.as_deref().unwrap_or("no detail"))]
    Status { status: u16, detail: Option<String> },
}

impl ApiError {
    /// The `detail` string from an error response body, if the server sent one.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => detail.as_deref(),
            Self::Http(_) => None,
        }
    }

    /// HTTP status for rejected requests.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(error) => error.status().map(|status| status.as_u16()),
        }
    }
}

/// Response of `POST /sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub id: String,
    #[serde(default)]
    pub qr_code_url: Option<String>,
    #[serde(default)]
    pub gallery_url: Option<String>,
    #[serde(default)]
    pub wifi_qr_url: Option<String>,
}

/// Response of `GET /sessions/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub photo_count: u32,
    #[serde(default)]
    pub kiosk_connected: bool,
    #[serde(default)]
    pub phone_connected: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// HTTP client for the booth API. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    config: BoothConfig,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] if the underlying client cannot be built.
    pub fn new(config: &BoothConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config: config.clone() })
    }

    #[must_use]
    pub fn config(&self) -> &BoothConfig {
        &self.config
    }

    /// Create a new photo session. The backend ends any other active session.
    ///
    /// # Errors
    ///
    /// Returns transport errors or [`ApiError::Status`] for non-2xx responses.
    pub async fn create_session(&self) -> Result<CreatedSession, ApiError> {
        let url = self.config.api_url("/sessions");
        info!(%url, "creating session");

        let response = check(self.client.post(&url).send().await?).await?;
        let session = response.json::<CreatedSession>().await?;
        info!(session_id = %session.id, "session created");
        Ok(session)
    }

    /// Trigger a capture sequence.
    ///
    /// The backend answers only after the whole sequence has finished; the
    /// progress itself arrives as WebSocket events.
    ///
    /// # Errors
    ///
    /// Returns transport errors or [`ApiError::Status`] (e.g. 409 while the
    /// camera is busy).
    pub async fn capture(&self, session_id: &str) -> Result<(), ApiError> {
        let url = self.config.api_url(&format!("/sessions/{session_id}/capture"));
        info!(%session_id, "starting capture");

        let response = check(self.client.post(&url).send().await?).await?;
        // Body is the gallery; photos already arrived over the socket.
        let _ = response.bytes().await;
        info!(%session_id, "capture request finished");
        Ok(())
    }

    /// End a session.
    ///
    /// # Errors
    ///
    /// Returns transport errors or [`ApiError::Status`] for non-2xx responses.
    pub async fn end_session(&self, session_id: &str) -> Result<(), ApiError> {
        let url = self.config.api_url(&format!("/sessions/{session_id}/end"));
        info!(%session_id, "ending session");

        let response = check(self.client.post(&url).send().await?).await?;
        let _ = response.bytes().await;
        Ok(())
    }

    /// Fetch a session's status summary.
    ///
    /// # Errors
    ///
    /// Returns transport errors or [`ApiError::Status`] (404 for unknown ids).
    pub async fn session(&self, session_id: &str) -> Result<SessionSummary, ApiError> {
        let url = self.config.api_url(&format!("/sessions/{session_id}"));
        let response = check(self.client.get(&url).send().await?).await?;
        Ok(response.json::<SessionSummary>().await?)
    }

    /// PNG of the QR code that opens the session gallery on a phone.
    ///
    /// # Errors
    ///
    /// Returns transport errors or [`ApiError::Status`] for non-2xx responses.
    pub async fn session_qr(&self, session_id: &str, size: u32) -> Result<Vec<u8>, ApiError> {
        let url = self
            .config
            .api_url(&format!("/sessions/{session_id}/qr?size={size}"));
        self.fetch_image(&url).await
    }

    /// PNG of the QR code that joins the booth's WiFi network.
    ///
    /// # Errors
    ///
    /// Returns transport errors or [`ApiError::Status`] for non-2xx responses.
    pub async fn wifi_qr(&self, size: u32) -> Result<Vec<u8>, ApiError> {
        let url = self.config.api_url(&format!("/sessions/wifi-qr?size={size}"));
        self.fetch_image(&url).await
    }

    /// Fetch image bytes. Relative paths are resolved against the base URL.
    ///
    /// # Errors
    ///
    /// Returns transport errors or [`ApiError::Status`] for non-2xx responses.
    pub async fn fetch_image(&self, url_or_path: &str) -> Result<Vec<u8>, ApiError> {
        let url = self.config.resolve(url_or_path);
        debug!(%url, "fetching image");

        let response = check(self.client.get(&url).send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// URL of the MJPEG camera preview stream.
    #[must_use]
    pub fn preview_url(&self) -> String {
        self.config.api_url("/camera/preview")
    }

    /// Liveness probe against `/health`.
    ///
    /// # Errors
    ///
    /// Returns transport errors or [`ApiError::Status`] when the backend is unhealthy.
    pub async fn health(&self) -> Result<(), ApiError> {
        let url = format!("{}/health", self.config.base_url());
        check(self.client.get(&url).send().await?).await?;
        Ok(())
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status { status: status.as_u16(), detail: detail_from_body(&body) })
}

/// Extract `{"detail": "..."}` from an error body.
///
/// Validation errors carry a list instead of a string; those yield `None`.
fn detail_from_body(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    value
        .get("detail")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|detail| !detail.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
