use std::path::PathBuf;

use serde::Serialize;

use portico_config::PorticoConfig;

use crate::cli::GlobalFlags;
use crate::output::output;

#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub backend_url: String,
    pub backend_configured: bool,
    /// `"set"` or `"missing"`; the key itself is never printed.
    pub anon_key: &'static str,
    pub site_url: String,
    pub app_name: String,
    pub storage_key: String,
    pub keyring_service: String,
    pub use_keyring: bool,
    pub credentials_dir: Option<PathBuf>,
}

impl From<&PorticoConfig> for ConfigReport {
    fn from(config: &PorticoConfig) -> Self {
        Self {
            backend_url: config.backend.url.clone(),
            backend_configured: config.backend.is_configured(),
            anon_key: if config.backend.anon_key.is_empty() {
                "missing"
            } else {
                "set"
            },
            site_url: config.backend.site_url.clone(),
            app_name: config.general.fallback_app_name().to_string(),
            storage_key: config.session.storage_key.clone(),
            keyring_service: config.session.keyring_service.clone(),
            use_keyring: config.session.use_keyring,
            credentials_dir: config.session.credentials_dir(),
        }
    }
}

/// Handle `portico config`.
pub fn handle(config: &PorticoConfig, flags: &GlobalFlags) -> anyhow::Result<()> {
    output(&ConfigReport::from(config), flags.format)
}
