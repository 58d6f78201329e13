//! HTTP persistence client for draftkeeper
//!
//! Sends save bodies to a WordPress-style REST API:
//! - `POST {rest_url}wp/v2/{rest_base}[/{id}]` with a JSON body
//! - `X-WP-Nonce` header for cookie-authenticated sessions
//! - Non-2xx replies become [`PersistError::Rejected`] carrying the body's
//!   `message` field, or `API error: {status}` when there is none

use async_trait::async_trait;
use draftkeeper_core::{PersistError, PersistedFields, PersistenceClient, RouteTarget, SaveBody};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Header carrying the REST nonce
pub const NONCE_HEADER: &str = "X-WP-Nonce";

/// REST endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestConfig {
    /// Base URL the route is appended to, always ending in `/`
    pub rest_url: String,
    /// Nonce sent with every request
    pub nonce: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl RestConfig {
    /// Create config for `rest_url`, adding the trailing slash if missing
    #[must_use]
    pub fn new(rest_url: impl Into<String>, nonce: impl Into<String>) -> Self {
        Self {
            rest_url: normalize_base(rest_url.into()),
            nonce: nonce.into(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Full URL for a route
    #[must_use]
    pub fn url_for(&self, target: &RouteTarget) -> String {
        format!("{}{}", normalize_base(self.rest_url.clone()), target.endpoint())
    }
}

fn normalize_base(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// Error body shape returned by the API
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// [`PersistenceClient`] over HTTP
#[derive(Debug, Clone)]
pub struct RestPersistenceClient {
    http: reqwest::Client,
    config: RestConfig,
}

impl RestPersistenceClient {
    /// Create client from config
    ///
    /// # Errors
    /// `PersistError::Transport` if the HTTP client cannot be built
    pub fn new(config: RestConfig) -> Result<Self, PersistError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PersistError::Transport(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RestConfig {
        &self.config
    }
}

#[async_trait]
impl PersistenceClient for RestPersistenceClient {
    async fn persist(
        &self,
        target: &RouteTarget,
        body: &SaveBody,
    ) -> Result<PersistedFields, PersistError> {
        let url = self.config.url_for(target);
        tracing::debug!(%url, rest_base = %target.rest_base, "POST save body");

        let response = self
            .http
            .post(&url)
            .header(NONCE_HEADER, &self.config.nonce)
            .json(body)
            .send()
            .await
            .map_err(|e| PersistError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let code = status.as_u16();
            let message = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|b| b.message)
                .filter(|m| !m.is_empty());

            tracing::warn!(%url, status = code, "store rejected save");
            return Err(match message {
                Some(message) => PersistError::Rejected {
                    status: code,
                    message,
                },
                None => PersistError::rejected(code),
            });
        }

        response
            .json::<PersistedFields>()
            .await
            .map_err(|e| PersistError::Decode(e.to_string()))
    }
}
