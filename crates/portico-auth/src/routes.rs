//! Portal routes and the guards in front of them.
//!
//! The [`Router`] takes one snapshot of the current user per navigation and
//! runs the route's guard against it; denials become redirects.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use portico_backend::SetupCheck;
use portico_core::entities::UserProfile;

use crate::policy::{self, AccessDecision, SetupDecision};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    Login,
    Setup,
    ResetPassword,
    Dashboard,
    Organizations,
    OrganizationSettings,
    Unauthorized,
}

/// What stands in front of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Public,
    /// Open only while no super admin exists.
    Setup,
    Authenticated,
    SuperAdmin,
}

impl Route {
    pub const ALL: [Self; 7] = [
        Self::Login,
        Self::Setup,
        Self::ResetPassword,
        Self::Dashboard,
        Self::Organizations,
        Self::OrganizationSettings,
        Self::Unauthorized,
    ];

    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Setup => "setup",
            Self::ResetPassword => "reset-password",
            Self::Dashboard => "dashboard",
            Self::Organizations => "organizations",
            Self::OrganizationSettings => "organization-settings",
            Self::Unauthorized => "unauthorized",
        }
    }

    #[must_use]
    pub const fn guard(self) -> Guard {
        match self {
            Self::Login | Self::ResetPassword | Self::Unauthorized => Guard::Public,
            Self::Setup => Guard::Setup,
            Self::Dashboard | Self::OrganizationSettings => Guard::Authenticated,
            Self::Organizations => Guard::SuperAdmin,
        }
    }

    /// Match a path, ignoring surrounding slashes, a query string and a
    /// fragment. `None` for the empty path and unknown paths.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = path.trim().trim_matches('/');
        Self::ALL.into_iter().find(|route| route.path() == path)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.path())
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown route '{s}'"))
    }
}

/// Result of a navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "route", rename_all = "snake_case")]
pub enum Navigation {
    Proceed(Route),
    Redirect(Route),
}

impl Navigation {
    /// Where the caller ends up.
    #[must_use]
    pub const fn destination(self) -> Route {
        match self {
            Self::Proceed(route) | Self::Redirect(route) => route,
        }
    }

    #[must_use]
    pub const fn is_redirect(self) -> bool {
        matches!(self, Self::Redirect(_))
    }
}

/// Guard decision for a user-gated route.
#[must_use]
pub fn authorize(route: Route, user: Option<&UserProfile>) -> AccessDecision {
    match route.guard() {
        Guard::Public | Guard::Setup => AccessDecision::Allow,
        Guard::Authenticated => policy::can_access(user, None),
        Guard::SuperAdmin => match policy::can_access(user, None) {
            AccessDecision::Allow => policy::require_super_admin(user),
            denied => denied,
        },
    }
}

/// Setup guard: asks the backend whether a super admin exists.
pub struct SetupGuard<P> {
    check: Arc<P>,
}

impl<P: SetupCheck> SetupGuard<P> {
    pub const fn new(check: Arc<P>) -> Self {
        Self { check }
    }

    pub async fn check(&self) -> SetupDecision {
        policy::setup_decision(self.check.exists_super_admin().await)
    }
}

pub struct Router<P> {
    current_user: watch::Receiver<Option<UserProfile>>,
    setup: SetupGuard<P>,
}

impl<P: SetupCheck> Router<P> {
    pub const fn new(current_user: watch::Receiver<Option<UserProfile>>, setup: SetupGuard<P>) -> Self {
        Self {
            current_user,
            setup,
        }
    }

    /// Resolve a navigation to `path`.
    pub async fn navigate(&self, path: &str) -> Navigation {
        let Some(route) = Route::parse(path) else {
            tracing::debug!(path, "unknown route; redirecting to login");
            return Navigation::Redirect(Route::Login);
        };

        if route.guard() == Guard::Setup {
            return match self.setup.check().await.redirect() {
                Some(target) => Navigation::Redirect(target),
                None => Navigation::Proceed(route),
            };
        }

        let user = self.current_user.borrow().clone();
        let decision = authorize(route, user.as_ref());
        tracing::debug!(%route, %decision, "route guard");
        match decision.redirect() {
            Some(target) => Navigation::Redirect(target),
            None => Navigation::Proceed(route),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use portico_backend::memory::MemoryBackend;
    use portico_core::enums::UserRole;
    use rstest::rstest;

    fn user(role: UserRole) -> UserProfile {
        UserProfile {
            id: "u-1".into(),
            email: "ada@example.com".into(),
            first_name: None,
            last_name: None,
            role,
            organization_id: Some("org-1".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[rstest]
    #[case("login", Some(Route::Login))]
    #[case("/organizations", Some(Route::Organizations))]
    #[case("reset-password?token_hash=abc&type=recovery", Some(Route::ResetPassword))]
    #[case("/organization-settings/", Some(Route::OrganizationSettings))]
    #[case("", None)]
    #[case("/", None)]
    #[case("admin", None)]
    fn parse_paths(#[case] path: &str, #[case] expected: Option<Route>) {
        assert_eq!(Route::parse(path), expected);
    }

    #[rstest]
    #[case(Route::Dashboard, None, AccessDecision::DenyUnauthenticated)]
    #[case(Route::Dashboard, Some(UserRole::User), AccessDecision::Allow)]
    #[case(Route::Organizations, None, AccessDecision::DenyUnauthenticated)]
    #[case(Route::Organizations, Some(UserRole::OrgAdmin), AccessDecision::DenyForbidden)]
    #[case(Route::Organizations, Some(UserRole::SuperAdmin), AccessDecision::Allow)]
    #[case(Route::OrganizationSettings, Some(UserRole::User), AccessDecision::Allow)]
    #[case(Route::Login, None, AccessDecision::Allow)]
    fn route_guards(
        #[case] route: Route,
        #[case] role: Option<UserRole>,
        #[case] expected: AccessDecision,
    ) {
        let profile = role.map(user);
        assert_eq!(authorize(route, profile.as_ref()), expected);
    }

    #[tokio::test]
    async fn router_redirects_unknown_and_denied() {
        let backend = Arc::new(MemoryBackend::new());
        let (tx, rx) = watch::channel(None);
        let router = Router::new(rx, SetupGuard::new(Arc::clone(&backend)));

        assert_eq!(router.navigate("").await, Navigation::Redirect(Route::Login));
        assert_eq!(router.navigate("nowhere").await, Navigation::Redirect(Route::Login));
        assert_eq!(router.navigate("dashboard").await, Navigation::Redirect(Route::Login));

        tx.send_replace(Some(user(UserRole::User)));
        assert_eq!(router.navigate("dashboard").await, Navigation::Proceed(Route::Dashboard));
        assert_eq!(
            router.navigate("organizations").await,
            Navigation::Redirect(Route::Unauthorized)
        );
    }

    #[tokio::test]
    async fn setup_route_closes_once_super_admin_exists() {
        let backend = Arc::new(MemoryBackend::new());
        let (_tx, rx) = watch::channel(None);
        let router = Router::new(rx, SetupGuard::new(Arc::clone(&backend)));

        assert_eq!(router.navigate("setup").await, Navigation::Proceed(Route::Setup));
        backend.add_user("root@example.com", "pw-123456", UserRole::SuperAdmin, None);
        assert_eq!(router.navigate("setup").await, Navigation::Redirect(Route::Login));
    }
}
