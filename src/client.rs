//! HTTP client for the OpsDesk API
//!
//! Used by front-ends and scripts. Identical GET requests are coalesced
//! through [`RequestCache`], and any write drops the cached reads of the
//! resource it touched. Status changes are checked against the asset
//! lifecycle before anything is sent.

use std::time::Duration;

use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    api::health::HealthResponse,
    cache::{Clock, RequestCache, SystemClock},
    models::{
        asset::{
            Asset, AssetAssignment, AssetDetails, AssetPage, AssetTransitions, CreateAsset,
            CreateAssignment, ReturnAsset, UpdateAsset,
        },
        enums::AssetStatus,
        ticket::{
            CreateComment, CreateTicket, TicketComment, TicketDetails, TicketPage, TicketPriority,
            UpdateTicket,
        },
    },
    rules::asset_lifecycle,
};

/// Default freshness window for deduplicated reads
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30);

/// Errors surfaced to API client callers
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Server answered with a non-2xx status
    #[error("{message} (HTTP {status})")]
    Http { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Rejected locally before any request was made
    #[error("{0}")]
    Transition(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Message for a failed response: the server's `message` field when the
/// body carries one, otherwise the status reason.
pub fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        })
}

/// Cache prefix covering every read of the resource an endpoint belongs to
/// ("/assets/3/return" -> "/assets")
fn resource_prefix(endpoint: &str) -> &str {
    let trimmed = endpoint.trim_start_matches('/');
    let end = trimmed
        .find(|c| c == '/' || c == '?')
        .unwrap_or(trimmed.len());
    &endpoint[..endpoint.len() - trimmed.len() + end]
}

/// OpsDesk API client
pub struct ApiClient<C: Clock = SystemClock> {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    reads: RequestCache<Value, C>,
}

impl ApiClient<SystemClock> {
    /// `base_url` is the API root, e.g. `http://localhost:8080/api/v1`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_clock(base_url, DEFAULT_MAX_AGE, SystemClock)
    }
}

impl<C: Clock> ApiClient<C> {
    pub fn with_clock(base_url: impl Into<String>, max_age: Duration, clock: C) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            reads: RequestCache::with_clock(max_age, clock),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    // ---- health ----

    /// Liveness; never cached
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let value = self.request::<()>(Method::GET, "/health", None).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Readiness; a 503 surfaces as `ClientError::Http`
    pub async fn ready(&self) -> Result<HealthResponse, ClientError> {
        let value = self.request::<()>(Method::GET, "/ready", None).await?;
        Ok(serde_json::from_value(value)?)
    }

    // ---- assets ----

    pub async fn list_assets(&self, page: i64, per_page: i64) -> Result<AssetPage, ClientError> {
        self.get(&format!("/assets?page={}&per_page={}", page, per_page)).await
    }

    pub async fn get_asset(&self, id: i32) -> Result<AssetDetails, ClientError> {
        self.get(&format!("/assets/{}", id)).await
    }

    pub async fn asset_transitions(&self, id: i32) -> Result<AssetTransitions, ClientError> {
        self.get(&format!("/assets/{}/transitions", id)).await
    }

    pub async fn create_asset(&self, data: &CreateAsset) -> Result<Asset, ClientError> {
        self.send(Method::POST, "/assets", Some(data)).await
    }

    pub async fn update_asset(&self, id: i32, data: &UpdateAsset) -> Result<AssetDetails, ClientError> {
        self.send(Method::PUT, &format!("/assets/{}", id), Some(data)).await
    }

    /// Move an asset to `to`, refusing locally when the lifecycle does not
    /// allow it from `current`.
    pub async fn change_status(
        &self,
        id: i32,
        current: AssetStatus,
        to: AssetStatus,
    ) -> Result<AssetDetails, ClientError> {
        if current != to && !asset_lifecycle::is_status_transition_allowed(current, to) {
            return Err(ClientError::Transition(asset_lifecycle::transition_error_message(
                current, to,
            )));
        }
        let data = UpdateAsset {
            status: Some(to),
            ..Default::default()
        };
        self.update_asset(id, &data).await
    }

    pub async fn assign_asset(&self, data: &CreateAssignment) -> Result<AssetAssignment, ClientError> {
        self.send(Method::POST, "/assets/assignments", Some(data)).await
    }

    pub async fn return_asset(&self, id: i32, notes: Option<String>) -> Result<AssetAssignment, ClientError> {
        let body = ReturnAsset { notes };
        self.send(Method::POST, &format!("/assets/{}/return", id), Some(&body))
            .await
    }

    pub async fn asset_assignments(&self, id: i32) -> Result<Vec<AssetAssignment>, ClientError> {
        self.get(&format!("/assets/{}/assignments", id)).await
    }

    // ---- tickets ----

    pub async fn list_tickets(&self, page: i64, per_page: i64) -> Result<TicketPage, ClientError> {
        self.get(&format!("/tickets?page={}&per_page={}", page, per_page)).await
    }

    pub async fn get_ticket(&self, id: i32) -> Result<TicketDetails, ClientError> {
        self.get(&format!("/tickets/{}", id)).await
    }

    pub async fn create_ticket(&self, data: &CreateTicket) -> Result<TicketDetails, ClientError> {
        self.send(Method::POST, "/tickets", Some(data)).await
    }

    pub async fn update_ticket(&self, id: i32, data: &UpdateTicket) -> Result<TicketDetails, ClientError> {
        self.send(Method::PUT, &format!("/tickets/{}", id), Some(data)).await
    }

    pub async fn ticket_comments(&self, id: i32) -> Result<Vec<TicketComment>, ClientError> {
        self.get(&format!("/tickets/{}/comments", id)).await
    }

    pub async fn add_comment(&self, id: i32, body: impl Into<String>) -> Result<TicketComment, ClientError> {
        let data = CreateComment { body: body.into() };
        self.send(Method::POST, &format!("/tickets/{}/comments", id), Some(&data))
            .await
    }

    pub async fn priorities(&self) -> Result<Vec<TicketPriority>, ClientError> {
        self.get("/tickets/priorities").await
    }

    // ---- plumbing ----

    /// Deduplicated GET
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ClientError> {
        let value = self
            .reads
            .get_or_fetch(endpoint, || self.request::<()>(Method::GET, endpoint, None))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Uncached request that invalidates reads of the same resource
    pub async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError> {
        let result = self.request(method, endpoint, body).await;
        self.invalidate_resource(endpoint).await;
        Ok(serde_json::from_value(result?)?)
    }

    /// Forget cached reads of the resource `endpoint` belongs to
    async fn invalidate_resource(&self, endpoint: &str) {
        self.reads.invalidate_prefix(resource_prefix(endpoint)).await;
    }

    async fn request<B: Serialize>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<Value, ClientError> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!("{} {}", method, url);

        let mut builder = self.http.request(method, &url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }
        if text.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}
