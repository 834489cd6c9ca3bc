//! General application configuration.

use serde::{Deserialize, Serialize};

/// Display name used when neither an organization nor a global setting exists.
pub const DEFAULT_APP_NAME: &str = "Admin Portal";

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Fallback application name.
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
        }
    }
}

impl GeneralConfig {
    /// The configured name, or [`DEFAULT_APP_NAME`] when it is blank.
    pub fn fallback_app_name(&self) -> &str {
        if self.app_name.trim().is_empty() {
            DEFAULT_APP_NAME
        } else {
            &self.app_name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = GeneralConfig::default();
        assert_eq!(config.app_name, "Admin Portal");
    }

    #[test]
    fn blank_name_falls_back_to_default() {
        let config = GeneralConfig {
            app_name: "  ".into(),
        };
        assert_eq!(config.fallback_app_name(), DEFAULT_APP_NAME);
    }
}
