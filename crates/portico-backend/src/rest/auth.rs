//! Auth surface (`/auth/v1`).

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Method;
use serde::Deserialize;
use tokio::sync::broadcast;

use portico_core::identity::AuthSession;

use super::{RestClient, Surface};
use crate::error::BackendError;
use crate::events::{AuthEventKind, ProviderEvent};
use crate::provider::{AuthProvider, SignUp};

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserRecord,
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| {
                self.expires_in
                    .map(|secs| Utc::now() + TimeDelta::seconds(secs))
            });
        AuthSession {
            subject_id: self.user.id,
            email: self.user.email,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

/// Sign-up answers with a full token response when the project auto-confirms
/// accounts, and with the bare user object (sometimes wrapped in `user`)
/// when confirmation is pending.
fn parse_sign_up(value: serde_json::Value) -> Result<SignUp, BackendError> {
    if value.get("access_token").is_some() {
        let session = serde_json::from_value::<TokenResponse>(value)
            .map_err(|e| BackendError::Decode(format!("sign up: {e}")))?
            .into_session();
        return Ok(SignUp {
            subject_id: session.subject_id.clone(),
            session: Some(session),
        });
    }

    let user = value.get("user").unwrap_or(&value);
    let subject_id = user
        .get("id")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| BackendError::Decode("sign up: response missing user id".into()))?;
    Ok(SignUp {
        subject_id: subject_id.to_string(),
        session: None,
    })
}

fn with_redirect(path: &str, redirect_to: Option<&str>) -> String {
    match redirect_to {
        Some(target) => format!("{path}?redirect_to={}", urlencoding::encode(target)),
        None => path.to_string(),
    }
}

impl RestClient {
    /// Adopt `session` as the bearer and announce it.
    fn issue(&self, kind: AuthEventKind, session: &AuthSession) {
        self.set_bearer(Some(&session.access_token));
        self.events
            .publish(ProviderEvent::new(kind, Some(session.clone())));
    }
}

impl AuthProvider for RestClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError> {
        let request = self
            .request(Method::POST, "/auth/v1/token?grant_type=password")
            .json(&serde_json::json!({ "email": email, "password": password }));
        let session = self
            .send_json::<TokenResponse>("sign in", Surface::Auth, request)
            .await?
            .into_session();

        tracing::info!(subject = %session.subject_id, "signed in");
        self.issue(AuthEventKind::SignedIn, &session);
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: Option<&str>,
    ) -> Result<SignUp, BackendError> {
        let request = self
            .request(Method::POST, &with_redirect("/auth/v1/signup", redirect_to))
            .json(&serde_json::json!({ "email": email, "password": password }));
        let value = self.send_value("sign up", Surface::Auth, request).await?;
        let sign_up = parse_sign_up(value)?;
        tracing::info!(
            subject = %sign_up.subject_id,
            confirmed = sign_up.session.is_some(),
            "account created"
        );
        Ok(sign_up)
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<(), BackendError> {
        let request = self.request_as(Method::POST, "/auth/v1/logout", &session.access_token);
        let result = self.send("sign out", Surface::Auth, request).await;

        // The local bearer goes regardless of what the server said.
        self.set_bearer(None);
        self.events
            .publish(ProviderEvent::new(AuthEventKind::SignedOut, None));

        match result {
            Ok(_) | Err(BackendError::Auth(_)) => Ok(()),
            Err(error) => Err(error),
        }
    }

    async fn get_session(&self, session: &AuthSession) -> Result<AuthSession, BackendError> {
        let request = self.request_as(Method::GET, "/auth/v1/user", &session.access_token);
        let user = self
            .send_json::<UserRecord>("get session", Surface::Auth, request)
            .await?;

        if user.id != session.subject_id {
            return Err(BackendError::Auth(format!(
                "session subject mismatch: stored {}, token {}",
                session.subject_id, user.id
            )));
        }

        self.set_bearer(Some(&session.access_token));
        Ok(AuthSession {
            email: user.email.or_else(|| session.email.clone()),
            ..session.clone()
        })
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, BackendError> {
        let request = self
            .request(Method::POST, "/auth/v1/token?grant_type=refresh_token")
            .json(&serde_json::json!({ "refresh_token": refresh_token }));
        let session = self
            .send_json::<TokenResponse>("refresh session", Surface::Auth, request)
            .await?
            .into_session();

        tracing::debug!(subject = %session.subject_id, "session refreshed");
        self.issue(AuthEventKind::TokenRefreshed, &session);
        Ok(session)
    }

    async fn send_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), BackendError> {
        let request = self
            .request(Method::POST, &with_redirect("/auth/v1/recover", redirect_to))
            .json(&serde_json::json!({ "email": email }));
        self.send("send password reset", Surface::Auth, request)
            .await?;
        Ok(())
    }

    async fn verify_recovery(&self, token_hash: &str) -> Result<AuthSession, BackendError> {
        let request = self
            .request(Method::POST, "/auth/v1/verify")
            .json(&serde_json::json!({ "type": "recovery", "token_hash": token_hash }));
        let session = self
            .send_json::<TokenResponse>("verify recovery", Surface::Auth, request)
            .await?
            .into_session();

        self.issue(AuthEventKind::PasswordRecovery, &session);
        Ok(session)
    }

    async fn update_password(
        &self,
        session: &AuthSession,
        new_password: &str,
    ) -> Result<(), BackendError> {
        let request = self
            .request_as(Method::PUT, "/auth/v1/user", &session.access_token)
            .json(&serde_json::json!({ "password": new_password }));
        self.send_json::<UserRecord>("update password", Surface::Auth, request)
            .await?;

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
