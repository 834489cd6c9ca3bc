//! `reqwest` implementation of the backend traits.
//!
//! Talks to a hosted backend-as-a-service over its three HTTP surfaces:
//! - `/auth/v1/*`: password sign-in, sign-up, refresh, recovery
//! - `/rest/v1/*`: row API with `column=op.value` filters and `rpc/` calls
//! - `/functions/v1/*`: serverless functions
//!
//! Every request carries the project's anon key as `apikey`. Row and
//! function calls authenticate with the bearer of the last session this
//! client issued or validated, falling back to the anon key.

mod auth;
mod tables;

use std::sync::{PoisonError, RwLock};

use reqwest::Method;
use serde::de::DeserializeOwned;

use portico_config::{BackendConfig, ConfigError};

use crate::error::BackendError;
use crate::events::EventBus;

/// Which HTTP surface a request targets. Decides how 4xx responses classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Surface {
    Auth,
    Rows,
}

/// HTTP client for the portal's backend.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    bearer: RwLock<Option<String>>,
    events: EventBus,
}

impl RestClient {
    #[must_use]
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            bearer: RwLock::new(None),
            events: EventBus::new(),
        }
    }

    /// Build a client from the `[backend]` config section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the section is missing its URL or anon key.
    pub fn from_config(config: &BackendConfig) -> Result<Self, ConfigError> {
        let config = config.require()?;
        Ok(Self::new(config.base_url(), &config.anon_key))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether row calls currently run as a signed-in user.
    #[must_use]
    pub fn has_user_bearer(&self) -> bool {
        self.bearer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn set_bearer(&self, token: Option<&str>) {
        *self.bearer.write().unwrap_or_else(PoisonError::into_inner) = token.map(str::to_string);
    }

    fn current_bearer(&self) -> String {
        self.bearer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| self.anon_key.clone())
    }

    /// Request authenticated with the current bearer.
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let bearer = self.current_bearer();
        self.request_as(method, path, &bearer)
    }

    /// Request authenticated with an explicit access token.
    fn request_as(&self, method: Method, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {token}"))
    }

    async fn send(
        &self,
        op: &str,
        surface: Surface,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Transient(format!("{op}: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = classify(op, surface, status.as_u16(), &body);
        tracing::debug!(op, status = status.as_u16(), %error, "backend call failed");
        Err(error)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        op: &str,
        surface: Surface,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = self.send(op, surface, request).await?;
        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(format!("{op}: {e}")))
    }

    /// Like [`Self::send_json`] but an empty body decodes as `null`.
    async fn send_value(
        &self,
        op: &str,
        surface: Surface,
        request: reqwest::RequestBuilder,
    ) -> Result<serde_json::Value, BackendError> {
        let response = self.send(op, surface, request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transient(format!("{op}: {e}")))?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| BackendError::Decode(format!("{op}: {e}")))
    }
}

/// Map a non-success HTTP status to a [`BackendError`].
fn classify(op: &str, surface: Surface, status: u16, body: &str) -> BackendError {
    let message = error_message(body);
    match (surface, status) {
        (_, 429 | 500..=599) => {
            BackendError::Transient(format!("{op}: HTTP {status}: {message}"))
        }
        (Surface::Auth, 400 | 401 | 403 | 422) => BackendError::Auth(message),
        (Surface::Rows, 401 | 403) => BackendError::Unauthorized(format!("{op}: {message}")),
        _ => BackendError::Rejected {
            status,
            message: format!("{op}: {message}"),
        },
    }
}

const MAX_MESSAGE_LEN: usize = 200;

/// Pull a human-readable message out of an error body.
///
/// Auth endpoints answer `{"error_description": …}` or `{"msg": …}`, the row
/// API answers `{"message": …}`.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["error_description", "msg", "message", "error"] {
            if let Some(text) = value.get(field).and_then(serde_json::Value::as_str) {
                return text.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no response body".into();
    }
    trimmed.chars().take(MAX_MESSAGE_LEN).collect()
}
