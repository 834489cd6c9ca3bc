//! Access policy. Pure, synchronous predicates over a user snapshot.

use std::fmt;

use serde::Serialize;

use portico_backend::BackendError;
use portico_core::entities::UserProfile;
use portico_core::enums::UserRole;

use crate::routes::Route;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    Allow,
    DenyUnauthenticated,
    DenyForbidden,
}

impl AccessDecision {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Where a guard sends the caller after this decision.
    #[must_use]
    pub const fn redirect(self) -> Option<Route> {
        match self {
            Self::Allow => None,
            Self::DenyUnauthenticated => Some(Route::Login),
            Self::DenyForbidden => Some(Route::Unauthorized),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::DenyUnauthenticated => "deny_unauthenticated",
            Self::DenyForbidden => "deny_forbidden",
        }
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed in, and holding `required_role` exactly when one is given.
#[must_use]
pub fn can_access(user: Option<&UserProfile>, required_role: Option<UserRole>) -> AccessDecision {
    match (user, required_role) {
        (None, _) => AccessDecision::DenyUnauthenticated,
        (Some(user), Some(required)) if user.role != required => AccessDecision::DenyForbidden,
        (Some(_), _) => AccessDecision::Allow,
    }
}

/// Super admins only. An absent user is forbidden, not unauthenticated;
/// compose after [`can_access`] to tell the two apart.
#[must_use]
pub fn require_super_admin(user: Option<&UserProfile>) -> AccessDecision {
    if user.is_some_and(UserProfile::is_super_admin) {
        AccessDecision::Allow
    } else {
        AccessDecision::DenyForbidden
    }
}

/// Outcome of the setup guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupDecision {
    Allow,
    /// A super admin exists; setup is closed.
    AlreadyInitialized,
}

impl SetupDecision {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    #[must_use]
    pub const fn redirect(self) -> Option<Route> {
        match self {
            Self::Allow => None,
            Self::AlreadyInitialized => Some(Route::Login),
        }
    }
}

/// Interpret a super-admin existence check. Errors fail open.
#[must_use]
pub fn setup_decision(exists_super_admin: Result<bool, BackendError>) -> SetupDecision {
    match exists_super_admin {
        Ok(true) => SetupDecision::AlreadyInitialized,
        Ok(false) => SetupDecision::Allow,
        Err(error) => {
            tracing::warn!(%error, "super admin check failed; allowing setup");
            SetupDecision::Allow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    fn user(role: UserRole) -> UserProfile {
        UserProfile {
            id: "u-1".into(),
            email: "ada@example.com".into(),
            first_name: None,
            last_name: None,
            role,
            organization_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[rstest]
    fn anonymous_is_unauthenticated(
        #[values(None, Some(UserRole::User), Some(UserRole::OrgAdmin), Some(UserRole::SuperAdmin))]
        required: Option<UserRole>,
    ) {
        assert_eq!(can_access(None, required), AccessDecision::DenyUnauthenticated);
    }

    #[rstest]
    #[case(UserRole::User, None, AccessDecision::Allow)]
    #[case(UserRole::User, Some(UserRole::User), AccessDecision::Allow)]
    #[case(UserRole::OrgAdmin, Some(UserRole::OrgAdmin), AccessDecision::Allow)]
    #[case(UserRole::User, Some(UserRole::OrgAdmin), AccessDecision::DenyForbidden)]
    #[case(UserRole::SuperAdmin, Some(UserRole::OrgAdmin), AccessDecision::DenyForbidden)]
    #[case(UserRole::OrgAdmin, Some(UserRole::SuperAdmin), AccessDecision::DenyForbidden)]
    fn role_must_match_exactly(
        #[case] role: UserRole,
        #[case] required: Option<UserRole>,
        #[case] expected: AccessDecision,
    ) {
        assert_eq!(can_access(Some(&user(role)), required), expected);
    }

    #[rstest]
    #[case(None, AccessDecision::DenyForbidden)]
    #[case(Some(UserRole::User), AccessDecision::DenyForbidden)]
    #[case(Some(UserRole::OrgAdmin), AccessDecision::DenyForbidden)]
    #[case(Some(UserRole::SuperAdmin), AccessDecision::Allow)]
    fn super_admin_only(#[case] role: Option<UserRole>, #[case] expected: AccessDecision) {
        let profile = role.map(user);
        assert_eq!(require_super_admin(profile.as_ref()), expected);
    }

    #[test]
    fn denials_redirect() {
        assert_eq!(AccessDecision::Allow.redirect(), None);
        assert_eq!(AccessDecision::DenyUnauthenticated.redirect(), Some(Route::Login));
        assert_eq!(AccessDecision::DenyForbidden.redirect(), Some(Route::Unauthorized));
    }

    #[test]
    fn setup_guard_fails_open() {
        assert_eq!(setup_decision(Ok(false)), SetupDecision::Allow);
        assert_eq!(setup_decision(Ok(true)), SetupDecision::AlreadyInitialized);
        assert_eq!(
            setup_decision(Err(BackendError::Transient("timeout".into()))),
            SetupDecision::Allow
        );
        assert_eq!(
            setup_decision(Err(BackendError::Unauthorized("rpc denied".into()))),
            SetupDecision::Allow
        );
    }
}
