//! Session persistence configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const fn default_true() -> bool {
    true
}

fn default_storage_key() -> String {
    "portico-auth-token".to_string()
}

fn default_keyring_service() -> String {
    "portico-cli".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Storage slot the session tokens are persisted under.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Keyring service name. Override (e.g. `portico-cli-test`) to keep test
    /// runs away from real credentials.
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,

    /// Try the OS keychain before the credentials file.
    #[serde(default = "default_true")]
    pub use_keyring: bool,

    /// Directory for the credentials file fallback. Defaults to `~/.portico`.
    #[serde(default)]
    pub credentials_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            keyring_service: default_keyring_service(),
            use_keyring: true,
            credentials_dir: None,
        }
    }
}

impl SessionConfig {
    /// Resolved credentials directory: the configured one, else `~/.portico`.
    pub fn credentials_dir(&self) -> Option<PathBuf> {
        self.credentials_dir
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".portico")))
    }
}
