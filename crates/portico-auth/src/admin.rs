//! Administrative operations.
//!
//! Thin, locally validated wrappers over the backend directory. Each checks
//! the caller's role against the current user snapshot before any remote
//! call; row-level security on the backend remains the final authority.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use portico_backend::{AuthProvider, Directory, InitialSetup};
use portico_core::entities::{NewOrganization, NewRole, NewUserProfile, Organization, Role, UserProfile};
use portico_core::enums::UserRole;
use portico_core::identity::AuthSession;
use portico_core::validation;

use crate::claims;
use crate::error::AuthError;
use crate::policy::{self, AccessDecision};
use crate::profile::ProfileResolver;
use crate::routes::SetupGuard;
use crate::session::SessionStore;

/// Function invoked to mint a session for another user.
pub const IMPERSONATE_FUNCTION: &str = "impersonate-user";
/// Function that mirrors portal data into the external database.
pub const SYNC_FUNCTION: &str = "sync-external-db";

const TEMP_PASSWORD_LEN: usize = 12;
const TEMP_PASSWORD_ALPHABET: &[u8] = b"abcdefghijkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Absolute links embedded in emails the backend sends.
#[derive(Debug, Clone, Default)]
pub struct RedirectLinks {
    /// Where an invited user lands to choose a password.
    pub invite: Option<String>,
    /// Where a password reset email points.
    pub password_reset: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InviteUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub organization_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvitedUser {
    pub profile: UserProfile,
    /// Random password the account was created with. The invitee replaces
    /// it through the emailed link.
    pub temporary_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetupForm {
    pub org_name: String,
    pub org_shortname: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetupOutcome {
    pub user_id: String,
    /// Whether the new account was signed in (projects without email
    /// confirmation).
    pub signed_in: bool,
    pub setup: serde_json::Value,
}

#[derive(Deserialize)]
struct IssuedTokens {
    access_token: String,
    refresh_token: String,
}

/// Random password for invited accounts, from the OS RNG.
///
/// # Errors
///
/// Returns `AuthError::Storage` if the OS RNG is unavailable.
pub fn temporary_password() -> Result<String, AuthError> {
    let mut bytes = [0u8; TEMP_PASSWORD_LEN];
    getrandom::fill(&mut bytes)
        .map_err(|e| AuthError::Storage(format!("failed to generate password: {e}")))?;
    Ok(bytes
        .iter()
        .map(|b| char::from(TEMP_PASSWORD_ALPHABET[usize::from(*b) % TEMP_PASSWORD_ALPHABET.len()]))
        .collect())
}

fn denied(decision: AccessDecision, action: &str) -> AuthError {
    match decision {
        AccessDecision::DenyUnauthenticated => AuthError::NotAuthenticated,
        AccessDecision::Allow | AccessDecision::DenyForbidden => {
            AuthError::forbidden(format!("not allowed to {action}"))
        }
    }
}

pub struct Admin<B> {
    backend: Arc<B>,
    session: Arc<SessionStore<B>>,
    profiles: Arc<ProfileResolver<B>>,
    setup: SetupGuard<B>,
    links: RedirectLinks,
}

impl<B: AuthProvider + Directory + 'static> Admin<B> {
    pub fn new(
        backend: Arc<B>,
        session: Arc<SessionStore<B>>,
        profiles: Arc<ProfileResolver<B>>,
        links: RedirectLinks,
    ) -> Self {
        Self {
            setup: SetupGuard::new(Arc::clone(&backend)),
            backend,
            session,
            profiles,
            links,
        }
    }

    /// The signed-in user's profile.
    fn actor(&self) -> Result<UserProfile, AuthError> {
        self.profiles.current().ok_or(AuthError::NotAuthenticated)
    }

    fn super_admin(&self, action: &str) -> Result<UserProfile, AuthError> {
        let actor = self.profiles.current();
        match policy::can_access(actor.as_ref(), None) {
            AccessDecision::Allow => {}
            decision => return Err(denied(decision, action)),
        }
        match policy::require_super_admin(actor.as_ref()) {
            AccessDecision::Allow => self.actor(),
            decision => Err(denied(decision, action)),
        }
    }

    /// Super admins act anywhere; org admins only inside their organization.
    fn organization_admin(&self, organization_id: Option<&str>, action: &str) -> Result<UserProfile, AuthError> {
        let actor = self.actor()?;
        let allowed = match actor.role {
            UserRole::SuperAdmin => true,
            UserRole::OrgAdmin => organization_id.is_some_and(|id| actor.belongs_to(id)),
            UserRole::User => false,
        };
        if allowed {
            Ok(actor)
        } else {
            Err(denied(AccessDecision::DenyForbidden, action))
        }
    }

    /// # Errors
    ///
    /// `Forbidden` unless the caller is a super admin, `Validation` for a
    /// blank name or malformed shortname, otherwise the backend's error.
    pub async fn create_organization(&self, name: &str, shortname: &str) -> Result<Organization, AuthError> {
        self.super_admin("create organizations")?;
        validation::non_empty("name", name)?;
        validation::shortname(shortname)?;

        let organization = self
            .backend
            .create_organization(&NewOrganization {
                name: name.trim().to_string(),
                shortname: shortname.trim().to_string(),
            })
            .await?;
        tracing::info!(organization_id = %organization.id, shortname = %organization.shortname, "organization created");
        Ok(organization)
    }

    /// # Errors
    ///
    /// `NotAuthenticated` without a current user, otherwise the backend's error.
    pub async fn list_organizations(&self) -> Result<Vec<Organization>, AuthError> {
        self.actor()?;
        Ok(self.backend.list_organizations().await?)
    }

    /// Users of one organization. Non super admins may only list their own.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated`, `Forbidden` for another organization, or the
    /// backend's error.
    pub async fn list_users(&self, organization_id: &str) -> Result<Vec<UserProfile>, AuthError> {
        let actor = self.actor()?;
        if !actor.is_super_admin() && !actor.belongs_to(organization_id) {
            return Err(AuthError::forbidden("not allowed to list users of another organization"));
        }
        Ok(self.backend.list_users(organization_id).await?)
    }

    /// # Errors
    ///
    /// `NotAuthenticated` without a current user, otherwise the backend's error.
    pub async fn list_roles(&self, organization_id: Option<&str>) -> Result<Vec<Role>, AuthError> {
        self.actor()?;
        Ok(self.backend.list_roles(organization_id).await?)
    }

    /// Create an account with a random password and attach its profile.
    ///
    /// Every role except `super_admin` must name an organization.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed input or a missing organization,
    /// `Forbidden` when the caller may not invite into that organization or
    /// with that role, otherwise the backend's error.
    pub async fn invite_user(&self, invite: &InviteUser) -> Result<InvitedUser, AuthError> {
        validation::email(&invite.email)?;
        validation::non_empty("first name", &invite.first_name)?;
        validation::non_empty("last name", &invite.last_name)?;
        let organization_id = invite
            .organization_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        if invite.role.requires_organization() && organization_id.is_none() {
            return Err(AuthError::Validation(format!(
                "role {} requires an organization",
                invite.role
            )));
        }

        let actor = self.organization_admin(organization_id, "invite users into this organization")?;
        if invite.role == UserRole::SuperAdmin && !actor.is_super_admin() {
            return Err(AuthError::forbidden("only a super admin can invite super admins"));
        }

        let temporary_password = temporary_password()?;
        let email = invite.email.trim();
        let sign_up = self
            .backend
            .sign_up(email, &temporary_password, self.links.invite.as_deref())
            .await?;

        let profile = self
            .backend
            .insert_profile(&NewUserProfile {
                id: sign_up.subject_id,
                email: email.to_string(),
                first_name: Some(invite.first_name.trim().to_string()),
                last_name: Some(invite.last_name.trim().to_string()),
                role: invite.role,
                organization_id: organization_id.map(str::to_string),
            })
            .await?;
        tracing::info!(user_id = %profile.id, role = %profile.role, invited_by = %actor.id, "user invited");

        Ok(InvitedUser {
            profile,
            temporary_password,
        })
    }

    /// Create a custom (never system) role.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank name, `Forbidden` unless the caller is a
    /// super admin or an org admin of `organization_id`, otherwise the
    /// backend's error.
    pub async fn create_role(
        &self,
        name: &str,
        organization_id: Option<&str>,
        permissions: impl IntoIterator<Item = String>,
    ) -> Result<Role, AuthError> {
        validation::non_empty("name", name)?;
        self.organization_admin(organization_id, "create roles for this organization")?;

        let permissions: BTreeSet<String> = permissions
            .into_iter()
            .map(|permission| permission.trim().to_string())
            .filter(|permission| !permission.is_empty())
            .collect();
        let role = self
            .backend
            .create_role(&NewRole::custom(
                name.trim(),
                organization_id.map(str::to_string),
                permissions,
            ))
            .await?;
        tracing::info!(role_id = %role.id, name = %role.name, "role created");
        Ok(role)
    }

    /// Bootstrap the first organization and super admin.
    ///
    /// # Errors
    ///
    /// `Forbidden` once a super admin exists, `Validation` for an invalid
    /// form, otherwise the backend's error.
    pub async fn initial_setup(&self, form: &SetupForm) -> Result<SetupOutcome, AuthError> {
        if !self.setup.check().await.is_allowed() {
            return Err(AuthError::forbidden("the portal is already set up"));
        }
        validation::non_empty("organization name", &form.org_name)?;
        validation::shortname(&form.org_shortname)?;
        validation::email(&form.email)?;
        validation::non_empty("first name", &form.first_name)?;
        validation::non_empty("last name", &form.last_name)?;
        validation::password_confirmation(&form.password, &form.password_confirmation)?;

        let email = form.email.trim();
        let sign_up = self.backend.sign_up(email, &form.password, None).await?;
        let setup = self
            .backend
            .create_initial_setup(&InitialSetup {
                org_name: form.org_name.trim().to_string(),
                org_shortname: form.org_shortname.trim().to_string(),
                user_email: email.to_string(),
                user_first_name: form.first_name.trim().to_string(),
                user_last_name: form.last_name.trim().to_string(),
                user_id: sign_up.subject_id.clone(),
            })
            .await?;
        tracing::info!(user_id = %sign_up.subject_id, "initial setup complete");

        let signed_in = match sign_up.session {
            Some(session) => {
                self.session.adopt_session(session).await?;
                true
            }
            None => false,
        };
        Ok(SetupOutcome {
            user_id: sign_up.subject_id,
            signed_in,
            setup,
        })
    }

    /// # Errors
    ///
    /// `Validation` for a malformed email, otherwise the backend's error.
    pub async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        validation::email(email)?;
        self.backend
            .send_password_reset(email.trim(), self.links.password_reset.as_deref())
            .await?;
        tracing::info!("password reset email requested");
        Ok(())
    }

    /// Finish a reset from an emailed link: exchange the token, then set the
    /// new password. The user stays signed in afterwards.
    ///
    /// # Errors
    ///
    /// `Validation` when the passwords are short or differ (checked before
    /// the token is spent), `InvalidCredentials` for a stale token.
    pub async fn complete_password_reset(
        &self,
        token_hash: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<AuthSession, AuthError> {
        validation::password_confirmation(password, confirmation)?;
        let session = self.session.verify_recovery(token_hash).await?;
        self.session.update_password(password).await?;
        Ok(session)
    }

    /// Switch the session to another user.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the caller is a super admin, `Validation` if the
    /// function returns unusable tokens, otherwise the backend's error.
    pub async fn impersonate(&self, user_id: &str) -> Result<AuthSession, AuthError> {
        let actor = self.super_admin("impersonate users")?;
        validation::non_empty("user id", user_id)?;

        let response = self
            .backend
            .invoke_function(IMPERSONATE_FUNCTION, serde_json::json!({ "user_id": user_id }))
            .await?;
        let tokens: IssuedTokens = serde_json::from_value(response)
            .map_err(|e| AuthError::Validation(format!("impersonation response: {e}")))?;
        let session = claims::session_from_tokens(&tokens.access_token, &tokens.refresh_token)?;
        if session.subject_id != user_id {
            return Err(AuthError::Validation(format!(
                "impersonation returned a session for {} instead of {user_id}",
                session.subject_id
            )));
        }

        let session = self.session.adopt_session(session).await?;
        tracing::warn!(actor = %actor.id, user_id, "impersonating user");
        Ok(session)
    }

    /// # Errors
    ///
    /// `Forbidden` unless the caller is a super admin, otherwise the
    /// backend's error.
    pub async fn sync_external_database(&self) -> Result<serde_json::Value, AuthError> {
        self.super_admin("sync the external database")?;
        let result = self
            .backend
            .invoke_function(SYNC_FUNCTION, serde_json::json!({}))
            .await?;
        tracing::info!("external database sync requested");
        Ok(result)
    }
}
