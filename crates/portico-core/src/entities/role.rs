use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A named permission bundle.
///
/// `organization_id = None` marks a system-wide role.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    pub is_system_role: bool,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    #[must_use]
    pub fn is_system_wide(&self) -> bool {
        self.organization_id.is_none()
    }

    #[must_use]
    pub fn grants(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Insert payload for a new `roles` row. Roles created through the portal
/// are never system roles.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct NewRole {
    pub name: String,
    pub organization_id: Option<String>,
    pub is_system_role: bool,
    pub permissions: BTreeSet<String>,
}

impl NewRole {
    #[must_use]
    pub fn custom(
        name: impl Into<String>,
        organization_id: Option<String>,
        permissions: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            name: name.into(),
            organization_id,
            is_system_role: false,
            permissions: permissions.into_iter().collect(),
        }
    }
}
