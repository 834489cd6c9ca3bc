//! Backend trait seams.
//!
//! The portal never talks to the backend directly; every remote operation
//! goes through one of these traits. Narrow traits (`ProfileSource`,
//! `SetupCheck`, `SettingsStore`) let each resolver depend only on what it
//! calls; `Directory` bundles the full row/RPC surface for admin operations.

use std::future::Future;

use portico_core::entities::{
    NewOrganization, NewRole, NewUserProfile, Organization, Role, SettingEntry, UserProfile,
};
use portico_core::identity::AuthSession;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::BackendError;
use crate::events::ProviderEvent;

/// Outcome of a sign-up. `session` is `None` when the provider requires
/// email confirmation before the first sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUp {
    pub subject_id: String,
    pub session: Option<AuthSession>,
}

/// Parameters of the `create_initial_setup` RPC.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InitialSetup {
    pub org_name: String,
    pub org_shortname: String,
    pub user_email: String,
    pub user_first_name: String,
    pub user_last_name: String,
    pub user_id: String,
}

/// The auth provider: credentials in, sessions out.
///
/// Implementations are stateful the way hosted auth clients are: a session
/// they issue or validate becomes the bearer for subsequent row calls, and
/// `sign_out` drops it.
pub trait AuthProvider: Send + Sync {
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<AuthSession, BackendError>> + Send;

    fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: Option<&str>,
    ) -> impl Future<Output = Result<SignUp, BackendError>> + Send;

    /// Revoke `session` remotely. Already-revoked sessions succeed.
    fn sign_out(
        &self,
        session: &AuthSession,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Validate a persisted session and return it with fresh user data.
    fn get_session(
        &self,
        session: &AuthSession,
    ) -> impl Future<Output = Result<AuthSession, BackendError>> + Send;

    fn refresh_session(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<AuthSession, BackendError>> + Send;

    fn send_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Exchange an emailed recovery token for a session.
    fn verify_recovery(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = Result<AuthSession, BackendError>> + Send;

    fn update_password(
        &self,
        session: &AuthSession,
        new_password: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Subscribe to the provider's event stream.
    fn events(&self) -> broadcast::Receiver<ProviderEvent>;
}

/// Lookup of the `users` row for an auth subject.
pub trait ProfileSource: Send + Sync {
    /// # Errors
    ///
    /// `BackendError::NotFound` when no row exists for `subject_id`.
    fn fetch_profile(
        &self,
        subject_id: &str,
    ) -> impl Future<Output = Result<UserProfile, BackendError>> + Send;
}

/// Side-effect-free lookup used by the setup guard.
pub trait SetupCheck: Send + Sync {
    fn exists_super_admin(&self) -> impl Future<Output = Result<bool, BackendError>> + Send;
}

/// Access to the `app_settings` table.
pub trait SettingsStore: Send + Sync {
    /// Exact lookup of `(key, organization_id)`; `None` targets the global row.
    ///
    /// # Errors
    ///
    /// `BackendError::NotFound` when the row does not exist.
    fn get_setting(
        &self,
        key: &str,
        organization_id: Option<&str>,
    ) -> impl Future<Output = Result<SettingEntry, BackendError>> + Send;

    /// Insert or replace the row keyed by `(entry.key, entry.organization_id)`.
    fn upsert_setting(
        &self,
        entry: &SettingEntry,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// The remaining row, RPC and function surface used by admin operations.
pub trait Directory: ProfileSource + SetupCheck + SettingsStore {
    fn list_organizations(
        &self,
    ) -> impl Future<Output = Result<Vec<Organization>, BackendError>> + Send;

    fn create_organization(
        &self,
        input: &NewOrganization,
    ) -> impl Future<Output = Result<Organization, BackendError>> + Send;

    fn list_users(
        &self,
        organization_id: &str,
    ) -> impl Future<Output = Result<Vec<UserProfile>, BackendError>> + Send;

    fn insert_profile(
        &self,
        input: &NewUserProfile,
    ) -> impl Future<Output = Result<UserProfile, BackendError>> + Send;

    /// System-wide roles plus, when given, the organization's own roles.
    fn list_roles(
        &self,
        organization_id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Role>, BackendError>> + Send;

    fn create_role(
        &self,
        input: &NewRole,
    ) -> impl Future<Output = Result<Role, BackendError>> + Send;

    /// Create the first organization and super admin profile in one
    /// server-side transaction.
    fn create_initial_setup(
        &self,
        input: &InitialSetup,
    ) -> impl Future<Output = Result<serde_json::Value, BackendError>> + Send;

    /// Invoke a serverless function by name.
    fn invoke_function(
        &self,
        name: &str,
        body: serde_json::Value,
    ) -> impl Future<Output = Result<serde_json::Value, BackendError>> + Send;
}
