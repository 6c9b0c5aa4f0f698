//! # REST Transport
//!
//! Thin wrapper over `reqwest` shared by the DAS, control-plane and
//! object-storage clients: bearer authentication, status mapping and metrics.

use super::{ClientError, ClientResult};
use crate::observability::metrics;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Default timeout for a single external call
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
enum Auth {
    None,
    Bearer(String),
    Basic { user: String, password: String },
}

#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    auth: Auth,
    /// Label used in metrics and logs (`das`, `ocp`, `s3`)
    api: &'static str,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("api", &self.api)
            .field("base_url", &self.base_url)
            .field("auth", &"***")
            .finish()
    }
}

impl RestClient {
    /// Client authenticating with a bearer token (none when empty)
    pub fn new(api: &'static str, base_url: &str, token: &str) -> anyhow::Result<Self> {
        let auth = if token.is_empty() {
            Auth::None
        } else {
            Auth::Bearer(token.to_string())
        };
        Self::build(api, base_url, auth)
    }

    /// Client authenticating with HTTP basic auth
    pub fn with_basic_auth(
        api: &'static str,
        base_url: &str,
        user: &str,
        password: &str,
    ) -> anyhow::Result<Self> {
        Self::build(
            api,
            base_url,
            Auth::Basic {
                user: user.to_string(),
                password: password.to_string(),
            },
        )
    }

    fn build(api: &'static str, base_url: &str, auth: Auth) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client for {api}: {e}"))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            api,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an authenticated request against `path` (relative to the base URL)
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let request = self.http.request(method, url);
        match &self.auth {
            Auth::None => request,
            Auth::Bearer(token) => {
                // Tokens copied from the UI sometimes already carry the scheme
                let auth_header = if token.starts_with("Bearer ") {
                    token.clone()
                } else {
                    format!("Bearer {token}")
                };
                request.header(reqwest::header::AUTHORIZATION, auth_header)
            }
            Auth::Basic { user, password } => request.basic_auth(user, Some(password)),
        }
    }

    /// Send a request and map any non-2xx answer to [`ClientError::Http`]
    pub async fn send(&self, operation: &str, request: RequestBuilder) -> ClientResult<Response> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(source) => {
                metrics::record_external_request(self.api, operation, "transport_error");
                return Err(ClientError::Transport {
                    operation: operation.to_string(),
                    source,
                });
            }
        };

        let status = response.status();
        if status.is_success() {
            metrics::record_external_request(self.api, operation, "success");
            debug!(api = self.api, operation, status = status.as_u16(), "external request succeeded");
            return Ok(response);
        }

        metrics::record_external_request(self.api, operation, status.as_str());
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::http(operation, status.as_u16(), body))
    }

    /// Send a request and decode the JSON answer
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> ClientResult<T> {
        let response = self.send(operation, request).await?;
        let bytes = response.bytes().await.map_err(|source| ClientError::Transport {
            operation: operation.to_string(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode {
            operation: operation.to_string(),
            message: e.to_string(),
        })
    }

    /// Send a request and discard the body
    pub async fn send_empty(&self, operation: &str, request: RequestBuilder) -> ClientResult<()> {
        self.send(operation, request).await.map(|_| ())
    }
}
