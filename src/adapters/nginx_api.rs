//! NGINX Plus REST API client (`/api/<version>/...`).
//!
//! Only the read-only status resources the adapter consumes are wrapped. One
//! `reqwest::Client` is reused for every request of an invocation.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::NginxConfig;
use crate::domain::{GroupKind, PeerGroup, RequestCounters};
use crate::error::{Result, StatusError};

const REQUESTS_RESOURCE: &str = "http/requests";

/// Source of status documents. Implemented by [`NginxApiClient`]; mocked in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// `http/upstreams`, groups in document order
    async fn http_upstreams(&self) -> Result<Vec<PeerGroup>>;

    /// `stream/upstreams`, groups in document order
    async fn stream_upstreams(&self) -> Result<Vec<PeerGroup>>;

    /// `http/requests`
    async fn http_requests(&self) -> Result<RequestCounters>;
}

#[derive(Clone)]
pub struct NginxApiClient {
    http: Client,
    /// Parsed per request so a malformed host fails the check, not startup
    base_url: String,
    api_version: u32,
    user: Option<String>,
    password: Option<String>,
}

impl NginxApiClient {
    pub fn new(cfg: &NginxConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("nginx-status/", env!("CARGO_PKG_VERSION")))
            .timeout(cfg.timeout())
            .build()
            .map_err(|e| StatusError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: cfg.base_url(),
            api_version: cfg.api_version,
            user: cfg.user.clone(),
            password: cfg.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `api/<version>/<resource>` relative to the base URL
    pub fn resource_path(&self, resource: &str) -> String {
        format!("api/{}/{}", self.api_version, resource)
    }

    async fn get_json(&self, resource: &str) -> Result<Value> {
        let path = self.resource_path(resource);
        let url = Url::parse(&self.base_url)?.join(&path)?;

        let mut req = self.http.get(url);
        if let Some(user) = &self.user {
            req = req.basic_auth(user, self.password.as_ref());
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        debug!("GET {} -> {} ({} bytes)", path, status, text.len());

        let body: Option<Value> = serde_json::from_str(&text).ok();

        if let Some(message) = body
            .as_ref()
            .and_then(|b| api_error_text(b, status.is_success()))
        {
            return Err(StatusError::Api {
                path,
                status: status.as_u16(),
                text: message,
            });
        }

        if !status.is_success() {
            return Err(StatusError::Api {
                path,
                status: status.as_u16(),
                text: status_text(status, &text),
            });
        }

        match body {
            Some(value) => Ok(value),
            // Re-parse to surface the decoder's message
            None => Ok(serde_json::from_str(&text)?),
        }
    }
}

/// Message of an NGINX Plus error document:
/// `{"error":{"status":404,"text":"...","code":"..."},"request_id":"..."}`
///
/// An upstreams document may hold a group named `error`, so the `error` entry
/// only counts when it is shaped like an error object and the response either
/// failed or carries a `request_id`.
fn api_error_text(body: &Value, success: bool) -> Option<String> {
    let doc = body.as_object()?;
    let error = doc.get("error")?.as_object()?;

    let shaped = !error.contains_key("peers")
        && ["status", "text", "code"].iter().any(|k| error.contains_key(*k));
    if !shaped || (success && !doc.contains_key("request_id")) {
        return None;
    }

    let message = error
        .get("text")
        .and_then(Value::as_str)
        .or_else(|| error.get("code").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| Value::Object(error.clone()).to_string());
    Some(message)
}

fn status_text(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        status.canonical_reason().unwrap_or("").to_string()
    } else {
        body.to_string()
    }
}

#[async_trait]
impl StatusSource for NginxApiClient {
    async fn http_upstreams(&self) -> Result<Vec<PeerGroup>> {
        let doc = self.get_json(GroupKind::Upstream.resource()).await?;
        PeerGroup::parse_document(GroupKind::Upstream, doc)
    }

    async fn stream_upstreams(&self) -> Result<Vec<PeerGroup>> {
        let doc = self.get_json(GroupKind::Stream.resource()).await?;
        PeerGroup::parse_document(GroupKind::Stream, doc)
    }

    async fn http_requests(&self) -> Result<RequestCounters> {
        let doc = self.get_json(REQUESTS_RESOURCE).await?;
        RequestCounters::parse_document(doc)
    }
}
