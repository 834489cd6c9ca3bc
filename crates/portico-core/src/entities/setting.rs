use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A row of the `app_settings` table.
///
/// Keyed by `(key, organization_id)`; `organization_id = None` is the global
/// entry for the key.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct SettingEntry {
    pub key: String,
    pub organization_id: Option<String>,
    pub value: String,
}

impl SettingEntry {
    #[must_use]
    pub fn new(key: impl Into<String>, organization_id: Option<&str>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            organization_id: organization_id.map(str::to_string),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        self.organization_id.is_none()
    }
}
