use chrono::{DateTime, Utc};
use serde::Serialize;

use portico_auth::session::REFRESH_BUFFER_SECS;
use portico_auth::{AuthError, Portal};
use portico_core::entities::UserProfile;
use portico_core::enums::UserRole;
use portico_core::identity::AuthSession;
use portico_core::validation;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::AuthCommands;
use crate::commands::{Backend, read_password};
use crate::output::output;

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub subject_id: String,
    pub email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&AuthSession> for SessionSummary {
    fn from(session: &AuthSession) -> Self {
        Self {
            subject_id: session.subject_id.clone(),
            email: session.email.clone(),
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: &'static str,
    #[serde(flatten)]
    pub session: Option<SessionSummary>,
    pub near_expiry: bool,
    pub role: Option<UserRole>,
    pub organization_id: Option<String>,
    pub app_name: String,
    /// Where the session tokens are kept.
    pub storage: &'static str,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    #[serde(flatten)]
    session: SessionSummary,
    profile: Option<UserProfile>,
}

#[derive(Serialize)]
struct DoneResponse {
    ok: bool,
    action: &'static str,
}

/// Handle `portico auth <subcommand>`.
pub async fn handle<B: Backend>(
    action: &AuthCommands,
    portal: &Portal<B>,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match action {
        AuthCommands::Login(args) => {
            let password = read_password(&args.password)?;
            let profile = portal.sign_in(&args.email, &password).await?;
            let session = portal.session().require_session()?;
            if profile.is_none() {
                tracing::warn!(subject_id = %session.subject_id, "signed in, but no user profile exists");
            }
            output(
                &LoginResponse {
                    session: SessionSummary::from(&session),
                    profile,
                },
                flags.format,
            )
        }
        AuthCommands::Logout => {
            portal.sign_out().await;
            output(
                &DoneResponse {
                    ok: true,
                    action: "signed_out",
                },
                flags.format,
            )
        }
        AuthCommands::Status => output(&status(portal), flags.format),
        AuthCommands::Refresh => {
            let session = portal.session().refresh_session().await?;
            output(&SessionSummary::from(&session), flags.format)
        }
        AuthCommands::ResetPassword(args) => {
            portal.admin().send_password_reset(&args.email).await?;
            output(
                &DoneResponse {
                    ok: true,
                    action: "password_reset_sent",
                },
                flags.format,
            )
        }
        AuthCommands::Recover(args) => {
            let password = read_password(&args.password)?;
            let confirm = args.confirm.as_deref().unwrap_or(&password);
            let session = portal
                .admin()
                .complete_password_reset(&args.token, &password, confirm)
                .await?;
            output(&SessionSummary::from(&session), flags.format)
        }
        AuthCommands::UpdatePassword(args) => {
            let password = read_password(&args.password)?;
            let confirm = args.confirm.as_deref().unwrap_or(&password);
            validation::password_confirmation(&password, confirm)?;
            portal.session().update_password(&password).await?;
            output(
                &DoneResponse {
                    ok: true,
                    action: "password_updated",
                },
                flags.format,
            )
        }
    }
}

/// Handle `portico whoami`.
pub fn whoami<B: Backend>(portal: &Portal<B>, flags: &GlobalFlags) -> anyhow::Result<()> {
    let user = portal.current_user().ok_or(AuthError::NotAuthenticated)?;
    output(&user, flags.format)
}

pub fn status<B: Backend>(portal: &Portal<B>) -> StatusResponse {
    let session = portal.session().session();
    let user = portal.current_user();
    StatusResponse {
        state: if session.is_some() {
            "authenticated"
        } else {
            "anonymous"
        },
        near_expiry: session
            .as_ref()
            .is_some_and(|session| session.is_near_expiry(REFRESH_BUFFER_SECS)),
        session: session.as_ref().map(SessionSummary::from),
        role: user.as_ref().map(|user| user.role),
        organization_id: user.and_then(|user| user.organization_id),
        app_name: portal.settings().current_value(),
        storage: portal.session().storage().backend_name(),
    }
}
