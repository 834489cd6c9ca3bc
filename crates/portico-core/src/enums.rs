//! Role enum for portal users.
//!
//! Serialized as `snake_case`, matching the `role` column of the `users` table.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CoreError;

/// Role of a portal user.
///
/// ```text
/// user < org_admin < super_admin
/// ```
///
/// Route guards compare roles for equality only; the ordering is used when
/// deciding who may grant which role to whom.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    OrgAdmin,
    SuperAdmin,
}

impl UserRole {
    /// Every role, lowest privilege first.
    pub const ALL: [Self; 3] = [Self::User, Self::OrgAdmin, Self::SuperAdmin];

    /// Return the string representation used in the `users` table.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::OrgAdmin => "org_admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Whether profiles with this role must belong to an organization.
    #[must_use]
    pub const fn requires_organization(self) -> bool {
        !matches!(self, Self::SuperAdmin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("unknown role '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(UserRole::User, "user")]
    #[case(UserRole::OrgAdmin, "org_admin")]
    #[case(UserRole::SuperAdmin, "super_admin")]
    fn as_str_matches_serde(#[case] role: UserRole, #[case] expected: &str) {
        assert_eq!(role.as_str(), expected);
        assert_eq!(
            serde_json::to_value(role).unwrap(),
            serde_json::Value::String(expected.into())
        );
        assert_eq!(expected.parse::<UserRole>().unwrap(), role);
    }

    #[test]
    fn unknown_role_is_a_validation_error() {
        let err = "owner".parse::<UserRole>().unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(err.to_string().contains("owner"));
    }

    #[test]
    fn only_super_admin_may_lack_organization() {
        assert!(UserRole::User.requires_organization());
        assert!(UserRole::OrgAdmin.requires_organization());
        assert!(!UserRole::SuperAdmin.requires_organization());
    }

    #[test]
    fn roles_order_by_privilege() {
        assert!(UserRole::User < UserRole::OrgAdmin);
        assert!(UserRole::OrgAdmin < UserRole::SuperAdmin);
    }
}
