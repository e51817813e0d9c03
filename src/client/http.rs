//! reqwest implementation of [`DebugBackend`] against the management REST API.
//!
//! ## Endpoints
//! - v2 APIs: `POST {base}/apis/{id}/_debug`, body `{"request": <DebugRequest>}`
//! - v4 APIs: `POST {base}/apis/{id}/debug`, body `<DebugRequest>`
//! - `GET {base}/apis/{id}/events/{eventId}`
//! - `GET {base}/policies?expand=icon&withResource=false`

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::client::{DebugBackend, DebugRequest};
use crate::core::config::{ApiVersion, ManagementConfig};
use crate::core::error::{DebugError, DebugResult};
use crate::debug::event::{EventRecord, PolicyListItem};

#[derive(Debug, Deserialize)]
struct SubmittedEvent {
    id: String,
}

/// HTTP client for the management API
#[derive(Debug, Clone)]
pub struct ManagementClient {
    client: Client,
    base_url: String,
    api_version: ApiVersion,
    token: Option<String>,
}

impl ManagementClient {
    pub fn new(config: &ManagementConfig) -> DebugResult<Self> {
        url::Url::parse(&config.base_url).map_err(|e| {
            DebugError::config(format!("Invalid management base URL {}: {}", config.base_url, e))
        })?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DebugError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version,
            token: config.token.clone(),
        })
    }

    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    /// Join encoded path segments onto the base URL
    fn url(&self, segments: &[&str]) -> String {
        let path: Vec<String> = segments
            .iter()
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.base_url, path.join("/"))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> DebugResult<Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %body, "Management API call failed");
        Err(DebugError::backend(status.as_u16(), body))
    }
}

#[async_trait]
impl DebugBackend for ManagementClient {
    async fn submit_debug(&self, api_id: &str, request: &DebugRequest) -> DebugResult<String> {
        let (url, body) = match self.api_version {
            ApiVersion::V2 => (self.url(&["apis", api_id, "_debug"]), json!({ "request": request })),
            ApiVersion::V4 => (self.url(&["apis", api_id, "debug"]), serde_json::to_value(request)?),
        };
        debug!(%url, api_id, "Submitting debug request");

        let response = self.send(self.client.post(&url).json(&body)).await?;
        let submitted: SubmittedEvent = response.json().await.map_err(|e| {
            DebugError::invalid_payload(format!("Unexpected debug submission response: {}", e))
        })?;
        Ok(submitted.id)
    }

    async fn fetch_event(&self, api_id: &str, event_id: &str) -> DebugResult<EventRecord> {
        let url = self.url(&["apis", api_id, "events", event_id]);
        let response = self.send(self.client.get(&url)).await?;
        response
            .json()
            .await
            .map_err(|e| DebugError::invalid_payload(format!("Unexpected event response: {}", e)))
    }

    async fn list_policies(&self) -> DebugResult<Vec<PolicyListItem>> {
        let url = self.url(&["policies"]);
        let request = self
            .client
            .get(&url)
            .query(&[("expand", "icon"), ("withResource", "false")]);
        let response = self.send(request).await?;
        response
            .json()
            .await
            .map_err(|e| DebugError::invalid_payload(format!("Unexpected policy list: {}", e)))
    }
}
