//! In-memory backend for tests.
//!
//! Implements every backend trait over plain maps so the session, profile
//! and settings layers can be exercised without a network. Failures are
//! injected per operation with [`MemoryBackend::fail`] and call counts are
//! observable with [`MemoryBackend::calls`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::broadcast;

use portico_core::entities::{
    NewOrganization, NewRole, NewUserProfile, Organization, Role, SettingEntry, UserProfile,
};
use portico_core::enums::UserRole;
use portico_core::identity::AuthSession;

use crate::error::BackendError;
use crate::events::{AuthEventKind, EventBus, ProviderEvent};
use crate::provider::{
    AuthProvider, Directory, InitialSetup, ProfileSource, SettingsStore, SetupCheck, SignUp,
};

/// Operation names accepted by [`MemoryBackend::fail`] and [`MemoryBackend::calls`].
pub mod ops {
    pub const SIGN_IN: &str = "sign_in";
    pub const SIGN_UP: &str = "sign_up";
    pub const SIGN_OUT: &str = "sign_out";
    pub const GET_SESSION: &str = "get_session";
    pub const REFRESH_SESSION: &str = "refresh_session";
    pub const SEND_PASSWORD_RESET: &str = "send_password_reset";
    pub const VERIFY_RECOVERY: &str = "verify_recovery";
    pub const UPDATE_PASSWORD: &str = "update_password";
    pub const FETCH_PROFILE: &str = "fetch_profile";
    pub const EXISTS_SUPER_ADMIN: &str = "exists_super_admin";
    pub const GET_SETTING: &str = "get_setting";
    pub const UPSERT_SETTING: &str = "upsert_setting";
    pub const LIST_ORGANIZATIONS: &str = "list_organizations";
    pub const CREATE_ORGANIZATION: &str = "create_organization";
    pub const LIST_USERS: &str = "list_users";
    pub const INSERT_PROFILE: &str = "insert_profile";
    pub const LIST_ROLES: &str = "list_roles";
    pub const CREATE_ROLE: &str = "create_role";
    pub const INITIAL_SETUP: &str = "create_initial_setup";
    pub const INVOKE_FUNCTION: &str = "invoke_function";
}

#[derive(Debug, Clone)]
struct Account {
    subject_id: String,
    password: String,
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    accounts: HashMap<String, Account>,
    /// access token -> subject
    access_tokens: HashMap<String, String>,
    /// refresh token -> subject
    refresh_tokens: HashMap<String, String>,
    recovery_tokens: HashMap<String, String>,
    profiles: HashMap<String, UserProfile>,
    organizations: Vec<Organization>,
    roles: Vec<Role>,
    settings: HashMap<(String, Option<String>), String>,
    functions: HashMap<String, serde_json::Value>,
    function_calls: Vec<(String, serde_json::Value)>,
    password_resets: Vec<String>,
    failures: HashMap<&'static str, BackendError>,
    calls: HashMap<&'static str, usize>,
}

impl MemoryState {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn issue_session(&mut self, subject_id: &str) -> AuthSession {
        let access_token = self.next("access");
        let refresh_token = self.next("refresh");
        self.access_tokens
            .insert(access_token.clone(), subject_id.to_string());
        self.refresh_tokens
            .insert(refresh_token.clone(), subject_id.to_string());
        let email = self
            .accounts
            .iter()
            .find(|(_, account)| account.subject_id == subject_id)
            .map(|(email, _)| email.clone());
        AuthSession {
            subject_id: subject_id.to_string(),
            email,
            access_token,
            refresh_token,
            expires_at: Some(Utc::now() + chrono::TimeDelta::hours(1)),
        }
    }
}

/// Thread-safe in-memory stand-in for the hosted backend.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    events: EventBus,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and return the injected failure for `op`, if any.
    fn enter(&self, op: &'static str) -> Result<MutexGuard<'_, MemoryState>, BackendError> {
        let mut state = self.lock();
        *state.calls.entry(op).or_default() += 1;
        if let Some(error) = state.failures.get(op).cloned() {
            return Err(error);
        }
        Ok(state)
    }

    /// Register a password account and return its subject id.
    pub fn add_account(&self, email: &str, password: &str) -> String {
        let mut state = self.lock();
        let subject_id = state.next("sub");
        state.accounts.insert(
            email.to_string(),
            Account {
                subject_id: subject_id.clone(),
                password: password.to_string(),
            },
        );
        subject_id
    }

    /// Register an account together with its `users` row.
    pub fn add_user(
        &self,
        email: &str,
        password: &str,
        role: UserRole,
        organization_id: Option<&str>,
    ) -> UserProfile {
        let subject_id = self.add_account(email, password);
        let profile = UserProfile {
            id: subject_id,
            email: email.to_string(),
            first_name: None,
            last_name: None,
            role,
            organization_id: organization_id.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.put_profile(profile.clone());
        profile
    }

    pub fn put_profile(&self, profile: UserProfile) {
        self.lock().profiles.insert(profile.id.clone(), profile);
    }

    pub fn remove_profile(&self, subject_id: &str) {
        self.lock().profiles.remove(subject_id);
    }

    pub fn put_setting(&self, key: &str, organization_id: Option<&str>, value: &str) {
        self.lock().settings.insert(
            (key.to_string(), organization_id.map(str::to_string)),
            value.to_string(),
        );
    }

    #[must_use]
    pub fn setting(&self, key: &str, organization_id: Option<&str>) -> Option<String> {
        self.lock()
            .settings
            .get(&(key.to_string(), organization_id.map(str::to_string)))
            .cloned()
    }

    #[must_use]
    pub fn settings_len(&self) -> usize {
        self.lock().settings.len()
    }

    /// Canned response for a serverless function.
    pub fn put_function(&self, name: &str, response: serde_json::Value) {
        self.lock().functions.insert(name.to_string(), response);
    }

    #[must_use]
    pub fn function_calls(&self) -> Vec<(String, serde_json::Value)> {
        self.lock().function_calls.clone()
    }

    /// Emails a password reset was requested for.
    #[must_use]
    pub fn password_resets(&self) -> Vec<String> {
        self.lock().password_resets.clone()
    }

    /// Issue a recovery token for `email`, as the reset email would carry.
    #[must_use]
    pub fn recovery_token(&self, email: &str) -> Option<String> {
        let mut state = self.lock();
        let subject_id = state.accounts.get(email)?.subject_id.clone();
        let token = state.next("recovery");
        state.recovery_tokens.insert(token.clone(), subject_id);
        Some(token)
    }

    /// Issue a session directly, bypassing credentials (impersonation tokens).
    pub fn mint_session(&self, subject_id: &str) -> AuthSession {
        self.lock().issue_session(subject_id)
    }

    /// Accept an externally minted access token for `subject_id`.
    pub fn accept_token(&self, access_token: &str, subject_id: &str) {
        self.lock()
            .access_tokens
            .insert(access_token.to_string(), subject_id.to_string());
    }

    /// Invalidate every outstanding access token (refresh tokens survive).
    pub fn expire_access_tokens(&self) {
        self.lock().access_tokens.clear();
    }

    #[must_use]
    pub fn password_of(&self, email: &str) -> Option<String> {
        self.lock()
            .accounts
            .get(email)
            .map(|account| account.password.clone())
    }

    /// Make every call to `op` fail with `error` until [`Self::heal`].
    pub fn fail(&self, op: &'static str, error: BackendError) {
        self.lock().failures.insert(op, error);
    }

    pub fn heal(&self, op: &'static str) {
        self.lock().failures.remove(op);
    }

    #[must_use]
    pub fn calls(&self, op: &'static str) -> usize {
        self.lock().calls.get(op).copied().unwrap_or(0)
    }

    /// Emit a provider event as if it happened out of band.
    pub fn emit(&self, event: ProviderEvent) {
        self.events.publish(event);
    }
}

impl AuthProvider for MemoryBackend {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError> {
        let session = {
            let mut state = self.enter(ops::SIGN_IN)?;
            let subject_id = match state.accounts.get(email) {
                Some(account) if account.password == password => account.subject_id.clone(),
                _ => return Err(BackendError::Auth("Invalid login credentials".into())),
            };
            state.issue_session(&subject_id)
        };
        self.events.publish(ProviderEvent::new(
            AuthEventKind::SignedIn,
            Some(session.clone()),
        ));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _redirect_to: Option<&str>,
    ) -> Result<SignUp, BackendError> {
        drop(self.enter(ops::SIGN_UP)?);
        if self.lock().accounts.contains_key(email) {
            return Err(BackendError::Auth("User already registered".into()));
        }
        let subject_id = self.add_account(email, password);
        let session = self.lock().issue_session(&subject_id);
        Ok(SignUp {
            subject_id,
            session: Some(session),
        })
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<(), BackendError> {
        {
            let mut state = self.enter(ops::SIGN_OUT)?;
            state.access_tokens.remove(&session.access_token);
            state.refresh_tokens.remove(&session.refresh_token);
        }
        self.events
            .publish(ProviderEvent::new(AuthEventKind::SignedOut, None));
        Ok(())
    }

    async fn get_session(&self, session: &AuthSession) -> Result<AuthSession, BackendError> {
        let state = self.enter(ops::GET_SESSION)?;
        match state.access_tokens.get(&session.access_token) {
            Some(subject_id) if *subject_id == session.subject_id => Ok(session.clone()),
            Some(_) => Err(BackendError::Auth("session subject mismatch".into())),
            None => Err(BackendError::Auth("invalid JWT: token is expired".into())),
        }
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, BackendError> {
        let session = {
            let mut state = self.enter(ops::REFRESH_SESSION)?;
            let subject_id = state
                .refresh_tokens
                .remove(refresh_token)
                .ok_or_else(|| BackendError::Auth("Invalid Refresh Token".into()))?;
            state.issue_session(&subject_id)
        };
        self.events.publish(ProviderEvent::new(
            AuthEventKind::TokenRefreshed,
            Some(session.clone()),
        ));
        Ok(session)
    }

    async fn send_password_reset(
        &self,
        email: &str,
        _redirect_to: Option<&str>,
    ) -> Result<(), BackendError> {
        self.enter(ops::SEND_PASSWORD_RESET)?
            .password_resets
            .push(email.to_string());
        Ok(())
    }

    async fn verify_recovery(&self, token_hash: &str) -> Result<AuthSession, BackendError> {
        let session = {
            let mut state = self.enter(ops::VERIFY_RECOVERY)?;
            let subject_id = state
                .recovery_tokens
                .remove(token_hash)
                .ok_or_else(|| BackendError::Auth("Token has expired or is invalid".into()))?;
            state.issue_session(&subject_id)
        };
        self.events.publish(ProviderEvent::new(
            AuthEventKind::PasswordRecovery,
            Some(session.clone()),
        ));
        Ok(session)
    }

    async fn update_password(
        &self,
        session: &AuthSession,
        new_password: &str,
    ) -> Result<(), BackendError> {
        {
            let mut state = self.enter(ops::UPDATE_PASSWORD)?;
            if !state.access_tokens.contains_key(&session.access_token) {
                return Err(BackendError::Auth("invalid JWT".into()));
            }
            let account = state
                .accounts
                .values_mut()
                .find(|account| account.subject_id == session.subject_id)
                .ok_or_else(|| BackendError::not_found("account", session.subject_id.clone()))?;
            account.password = new_password.to_string();
        }
        self.events.publish(ProviderEvent::new(
            AuthEventKind::UserUpdated,
            Some(session.clone()),
        ));
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

impl ProfileSource for MemoryBackend {
    async fn fetch_profile(&self, subject_id: &str) -> Result<UserProfile, BackendError> {
        self.enter(ops::FETCH_PROFILE)?
            .profiles
            .get(subject_id)
            .cloned()
            .ok_or_else(|| BackendError::not_found("user", subject_id))
    }
}

impl SetupCheck for MemoryBackend {
    async fn exists_super_admin(&self) -> Result<bool, BackendError> {
        Ok(self
            .enter(ops::EXISTS_SUPER_ADMIN)?
            .profiles
            .values()
            .any(UserProfile::is_super_admin))
    }
}

impl SettingsStore for MemoryBackend {
    async fn get_setting(
        &self,
        key: &str,
        organization_id: Option<&str>,
    ) -> Result<SettingEntry, BackendError> {
        let state = self.enter(ops::GET_SETTING)?;
        state
            .settings
            .get(&(key.to_string(), organization_id.map(str::to_string)))
            .map(|value| SettingEntry::new(key, organization_id, value.clone()))
            .ok_or_else(|| {
                BackendError::not_found(
                    "setting",
                    format!("{key}@{}", organization_id.unwrap_or("global")),
                )
            })
    }

    async fn upsert_setting(&self, entry: &SettingEntry) -> Result<(), BackendError> {
        self.enter(ops::UPSERT_SETTING)?.settings.insert(
            (entry.key.clone(), entry.organization_id.clone()),
            entry.value.clone(),
        );
        Ok(())
    }
}

impl Directory for MemoryBackend {
    async fn list_organizations(&self) -> Result<Vec<Organization>, BackendError> {
        let mut organizations = self.enter(ops::LIST_ORGANIZATIONS)?.organizations.clone();
        organizations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(organizations)
    }

    async fn create_organization(
        &self,
        input: &NewOrganization,
    ) -> Result<Organization, BackendError> {
        let mut state = self.enter(ops::CREATE_ORGANIZATION)?;
        if state
            .organizations
            .iter()
            .any(|org| org.shortname == input.shortname)
        {
            return Err(BackendError::Rejected {
                status: 409,
                message: format!(
                    "duplicate key value violates unique constraint \"organizations_shortname_key\" ({})",
                    input.shortname
                ),
            });
        }
        let organization = Organization {
            id: state.next("org"),
            name: input.name.clone(),
            shortname: input.shortname.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.organizations.push(organization.clone());
        Ok(organization)
    }

    async fn list_users(&self, organization_id: &str) -> Result<Vec<UserProfile>, BackendError> {
        let mut users: Vec<_> = self
            .enter(ops::LIST_USERS)?
            .profiles
            .values()
            .filter(|profile| profile.belongs_to(organization_id))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn insert_profile(&self, input: &NewUserProfile) -> Result<UserProfile, BackendError> {
        let mut state = self.enter(ops::INSERT_PROFILE)?;
        if state.profiles.contains_key(&input.id) {
            return Err(BackendError::Rejected {
                status: 409,
                message: format!("duplicate key value violates unique constraint \"users_pkey\" ({})", input.id),
            });
        }
        let profile = UserProfile {
            id: input.id.clone(),
            email: input.email.clone(),
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            role: input.role,
            organization_id: input.organization_id.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.profiles.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    async fn list_roles(&self, organization_id: Option<&str>) -> Result<Vec<Role>, BackendError> {
        let mut roles: Vec<_> = self
            .enter(ops::LIST_ROLES)?
            .roles
            .iter()
            .filter(|role| {
                role.organization_id.is_none() || role.organization_id.as_deref() == organization_id
            })
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn create_role(&self, input: &NewRole) -> Result<Role, BackendError> {
        let mut state = self.enter(ops::CREATE_ROLE)?;
        let role = Role {
            id: state.next("role"),
            name: input.name.clone(),
            organization_id: input.organization_id.clone(),
            is_system_role: input.is_system_role,
            permissions: input.permissions.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.roles.push(role.clone());
        Ok(role)
    }

    async fn create_initial_setup(
        &self,
        input: &InitialSetup,
    ) -> Result<serde_json::Value, BackendError> {
        let mut state = self.enter(ops::INITIAL_SETUP)?;
        if state.profiles.values().any(UserProfile::is_super_admin) {
            return Err(BackendError::Rejected {
                status: 400,
                message: "initial setup already completed".into(),
            });
        }
        let organization = Organization {
            id: state.next("org"),
            name: input.org_name.clone(),
            shortname: input.org_shortname.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let profile = UserProfile {
            id: input.user_id.clone(),
            email: input.user_email.clone(),
            first_name: Some(input.user_first_name.clone()),
            last_name: Some(input.user_last_name.clone()),
            role: UserRole::SuperAdmin,
            organization_id: Some(organization.id.clone()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.organizations.push(organization.clone());
        state.profiles.insert(profile.id.clone(), profile);
        Ok(serde_json::json!({
            "organization_id": organization.id,
            "user_id": input.user_id,
        }))
    }

    async fn invoke_function(
        &self,
        name: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, BackendError> {
        let mut state = self.enter(ops::INVOKE_FUNCTION)?;
        state.function_calls.push((name.to_string(), body));
        state
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::Rejected {
                status: 404,
                message: format!("function '{name}' not found"),
            })
    }
}
