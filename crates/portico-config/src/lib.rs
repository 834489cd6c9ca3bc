//! # portico-config
//!
//! Layered configuration loading for Portico using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`PORTICO_*` prefix, `__` as separator)
//! 2. Project-level `.portico/config.toml`
//! 3. User-level `~/.config/portico/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `PORTICO_BACKEND__URL` -> `backend.url`,
//! `PORTICO_GENERAL__APP_NAME` -> `general.app_name`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use portico_config::PorticoConfig;
//!
//! let config = PorticoConfig::load_with_dotenv().expect("config");
//! if config.backend.is_configured() {
//!     println!("Backend: {}", config.backend.url);
//! }
//! ```

mod backend;
mod error;
mod general;
mod session;

pub use backend::BackendConfig;
pub use error::ConfigError;
pub use general::{DEFAULT_APP_NAME, GeneralConfig};
pub use session::SessionConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PorticoConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl PorticoConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy`; use [`Self::load_with_dotenv`] for `.env` support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Figment` if a source cannot be parsed or a value
    /// has the wrong type.
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment().extract().map_err(ConfigError::from)
    }

    /// Load configuration with `.env` file support.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment or layer extra providers.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(global_path));
        }

        let local_path = PathBuf::from(".portico/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed("PORTICO_").split("__"))
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("portico").join("config.toml"))
    }
}
