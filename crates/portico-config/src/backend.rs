//! Backend-as-a-service connection configuration.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://abcd.supabase.co`.
    #[serde(default)]
    pub url: String,

    /// Public (anon) API key sent as `apikey` on every request.
    #[serde(default)]
    pub anon_key: String,

    /// Public URL of the portal itself. Used to build the redirect target of
    /// password-reset and invitation emails.
    #[serde(default)]
    pub site_url: String,
}

impl BackendConfig {
    /// Check if the backend config has the minimum required fields.
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.anon_key.is_empty()
    }

    /// `url` without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Fail with [`ConfigError::NotConfigured`] unless the section is usable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` when `url` or `anon_key` is empty,
    /// or `ConfigError::InvalidValue` when `url` is not an http(s) URL.
    pub fn require(&self) -> Result<&Self, ConfigError> {
        if !self.is_configured() {
            return Err(ConfigError::NotConfigured {
                section: "backend".into(),
            });
        }
        if !(self.url.starts_with("https://") || self.url.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                field: "backend.url".into(),
                reason: format!("'{}' is not an http(s) URL", self.url),
            });
        }
        Ok(self)
    }

    /// Redirect target for emailed links, e.g. `{site_url}/reset-password`.
    pub fn redirect_to(&self, path: &str) -> Option<String> {
        if self.site_url.is_empty() {
            return None;
        }
        Some(format!(
            "{}/{}",
            self.site_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        ))
    }
}
