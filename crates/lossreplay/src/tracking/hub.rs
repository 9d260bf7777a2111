//! Hugging Face Hub API client.

use super::error::{TrackingError, TrackingResult};
use super::SpaceDirectory;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

/// Reader for Space metadata on the Hub.
pub struct HubClient {
    /// HTTP client for making requests.
    client: Client,

    /// Hub endpoint (e.g., "https://huggingface.co").
    endpoint: String,

    /// Token for private Spaces.
    token: Option<String>,
}

impl HubClient {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self { client: Client::new(), endpoint: endpoint.into().trim_end_matches('/').to_string(), token }
    }

    /// Fetches `GET /api/spaces/{space_id}`; `None` when the Space does not exist.
    pub async fn space_info(&self, space_id: &str) -> TrackingResult<Option<Value>> {
        let api_url = format!("{}/api/spaces/{}", self.endpoint, space_id);

        let mut request = self.client.get(&api_url).header("Accept", "application/json");
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(TrackingError::Unauthorized(format!(
                "Hub refused access to {space_id}. Check HF_TOKEN."
            )));
        }
        if !status.is_success() {
            return Err(TrackingError::Remote(format!("Hub API returned error: HTTP {}", status.as_u16())));
        }

        Ok(Some(response.json().await?))
    }
}

#[async_trait]
impl SpaceDirectory for HubClient {
    async fn space_exists(&self, space_id: &str) -> TrackingResult<bool> {
        Ok(self.space_info(space_id).await?.is_some())
    }
}
