//! Session store: the single owner of the current identity.
//!
//! Identity is published as a [`SessionTransition`] through an
//! [`Observable`], so every change notifies listeners synchronously and in
//! order. Tokens are persisted through a [`GuardedStorage`] slot; nothing
//! about persistence can fail a session operation.
//!
//! Provider events are folded in by [`SessionStore::handle_event`]. Sign-in
//! and refresh events carrying the tokens already held are dropped. Recovery
//! and user-updated events always publish, except the one echo the provider
//! sends back for the store's own `verify_recovery` or `update_password`.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use portico_backend::{AuthEventKind, AuthProvider, BackendError, ProviderEvent};
use portico_core::identity::AuthSession;
use portico_core::validation;

use crate::claims;
use crate::error::AuthError;
use crate::state::{ListenerId, Observable};
use crate::token_store::GuardedStorage;

/// Refresh stored sessions whose access token expires within this window.
pub const REFRESH_BUFFER_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Start-up, before [`SessionStore::restore_session`] has finished.
    Unknown,
    Anonymous,
    Authenticated(AuthSession),
}

impl SessionState {
    #[must_use]
    pub const fn session(&self) -> Option<&AuthSession> {
        match self {
            Self::Authenticated(session) => Some(session),
            Self::Unknown | Self::Anonymous => None,
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub fn subject_id(&self) -> Option<&str> {
        self.session().map(|session| session.subject_id.as_str())
    }
}

/// Why the session state last changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    Startup,
    Restored,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    PasswordRecovery,
    UserUpdated,
}

impl TransitionReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Restored => "restored",
            Self::SignedIn => "signed_in",
            Self::SignedOut => "signed_out",
            Self::TokenRefreshed => "token_refreshed",
            Self::PasswordRecovery => "password_recovery",
            Self::UserUpdated => "user_updated",
        }
    }
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<AuthEventKind> for TransitionReason {
    fn from(kind: AuthEventKind) -> Self {
        match kind {
            AuthEventKind::SignedIn => Self::SignedIn,
            AuthEventKind::SignedOut => Self::SignedOut,
            AuthEventKind::TokenRefreshed => Self::TokenRefreshed,
            AuthEventKind::PasswordRecovery => Self::PasswordRecovery,
            AuthEventKind::UserUpdated => Self::UserUpdated,
        }
    }
}

/// A published session value together with its cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTransition {
    pub state: SessionState,
    pub reason: TransitionReason,
}

impl SessionTransition {
    #[must_use]
    pub const fn startup() -> Self {
        Self {
            state: SessionState::Unknown,
            reason: TransitionReason::Startup,
        }
    }
}

/// Provider event expected back for an operation the store already published.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingEcho {
    kind: AuthEventKind,
    /// `None` until the subject is known (recovery).
    subject_id: Option<String>,
}

impl PendingEcho {
    fn matches(&self, kind: AuthEventKind, subject_id: &str) -> bool {
        self.kind == kind && self.subject_id.as_deref().is_none_or(|expected| expected == subject_id)
    }
}

pub struct SessionStore<A> {
    provider: Arc<A>,
    storage: GuardedStorage,
    state: Observable<SessionTransition>,
    echoes: Mutex<Vec<PendingEcho>>,
}

impl<A: AuthProvider + 'static> SessionStore<A> {
    pub fn new(provider: Arc<A>, storage: GuardedStorage) -> Self {
        Self {
            provider,
            storage,
            state: Observable::new(SessionTransition::startup()),
            echoes: Mutex::new(Vec::new()),
        }
    }

    pub fn provider(&self) -> &Arc<A> {
        &self.provider
    }

    pub fn storage(&self) -> &GuardedStorage {
        &self.storage
    }

    pub fn current(&self) -> SessionTransition {
        self.state.get()
    }

    pub fn state(&self) -> SessionState {
        self.state.with(|current| current.state.clone())
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.state.with(|current| current.state.session().cloned())
    }

    /// The current session, or `NotAuthenticated`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` when no session is held.
    pub fn require_session(&self) -> Result<AuthSession, AuthError> {
        self.session().ok_or(AuthError::NotAuthenticated)
    }

    pub fn listen(
        &self,
        listener: impl Fn(&SessionTransition) + Send + Sync + 'static,
    ) -> ListenerId {
        self.state.listen(listener)
    }

    pub fn unlisten(&self, id: ListenerId) {
        self.state.unlisten(id);
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionTransition> {
        self.state.subscribe()
    }

    fn publish(&self, state: SessionState, reason: TransitionReason) {
        tracing::debug!(
            %reason,
            subject_id = state.subject_id().unwrap_or("-"),
            "session transition"
        );
        self.state.set(SessionTransition { state, reason });
    }

    fn persist(&self, session: &AuthSession) {
        match serde_json::to_string(session) {
            Ok(json) => self.storage.set(&json),
            Err(error) => tracing::warn!(%error, "failed to serialize session; not persisted"),
        }
    }

    fn load_persisted(&self) -> Option<AuthSession> {
        let raw = self.storage.get()?;
        match serde_json::from_str::<AuthSession>(&raw) {
            Ok(session) => Some(session),
            Err(error) => {
                tracing::warn!(%error, "discarding corrupt persisted session");
                self.storage.remove();
                None
            }
        }
    }

    /// Persist and publish `session`. Sign-in and refresh are skipped when
    /// the same tokens are already current; recovery and user updates always
    /// publish so listeners re-fetch the profile.
    fn authenticate(&self, session: AuthSession, reason: TransitionReason) {
        self.persist(&session);
        let repeated = matches!(reason, TransitionReason::SignedIn | TransitionReason::TokenRefreshed)
            && self.state.with(|current| {
                current.reason == reason
                    && current
                        .state
                        .session()
                        .is_some_and(|held| held.same_tokens(&session))
            });
        if !repeated {
            self.publish(SessionState::Authenticated(session), reason);
        }
    }

    fn expect_echo(&self, kind: AuthEventKind, subject_id: Option<&str>) -> PendingEcho {
        let echo = PendingEcho {
            kind,
            subject_id: subject_id.map(str::to_string),
        };
        self.echoes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(echo.clone());
        echo
    }

    /// Forget an echo whose operation failed.
    fn cancel_echo(&self, echo: &PendingEcho) {
        let mut echoes = self.echoes.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = echoes.iter().rposition(|pending| pending == echo) {
            echoes.remove(index);
        }
    }

    /// Consume the oldest pending echo this event answers.
    fn take_echo(&self, kind: AuthEventKind, subject_id: &str) -> bool {
        let mut echoes = self.echoes.lock().unwrap_or_else(PoisonError::into_inner);
        match echoes.iter().position(|pending| pending.matches(kind, subject_id)) {
            Some(index) => {
                echoes.remove(index);
                true
            }
            None => false,
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for malformed input and
    /// `AuthError::InvalidCredentials` when the provider rejects the
    /// credentials. The session state is left as it was (an undecided store
    /// becomes `Anonymous`).
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        validation::email(email)?;
        validation::non_empty("password", password)?;

        let session = match self.provider.sign_in_with_password(email.trim(), password).await {
            Ok(session) => claims::with_token_expiry(session),
            Err(error) => {
                tracing::info!(%error, "sign-in rejected");
                if self.state.with(|current| current.state == SessionState::Unknown) {
                    self.publish(SessionState::Anonymous, TransitionReason::SignedOut);
                }
                return Err(error.into());
            }
        };

        tracing::info!(subject_id = %session.subject_id, "signed in");
        self.authenticate(session.clone(), TransitionReason::SignedIn);
        Ok(session)
    }

    /// End the session. Always ends `Anonymous`; calling it again is a no-op.
    ///
    /// A failed remote sign-out is logged, never returned.
    pub async fn sign_out(&self) {
        if let Some(session) = self.session()
            && let Err(error) = self.provider.sign_out(&session).await
        {
            tracing::warn!(%error, "remote sign-out failed; clearing local session anyway");
        }

        self.storage.remove();
        if !self.state.with(|current| current.state == SessionState::Anonymous) {
            self.publish(SessionState::Anonymous, TransitionReason::SignedOut);
            tracing::info!("signed out");
        }
    }

    /// Restore the persisted session, once, at start-up.
    ///
    /// Always ends in a terminal state. Rejected tokens clear the slot;
    /// transient failures leave it for the next run.
    pub async fn restore_session(&self) -> SessionState {
        let state = match self.load_persisted() {
            Some(stored) => self.validate_stored(stored).await,
            None => {
                tracing::debug!("no persisted session");
                SessionState::Anonymous
            }
        };
        self.publish(state.clone(), TransitionReason::Restored);
        state
    }

    async fn validate_stored(&self, stored: AuthSession) -> SessionState {
        let stored = claims::with_token_expiry(stored);
        let mut refreshed = false;
        let candidate = if stored.is_near_expiry(REFRESH_BUFFER_SECS) {
            let Some(session) = self.refresh_stored(&stored).await else {
                return SessionState::Anonymous;
            };
            refreshed = true;
            session
        } else {
            stored
        };

        match self.provider.get_session(&candidate).await {
            Ok(valid) => {
                self.persist(&valid);
                tracing::info!(subject_id = %valid.subject_id, "session restored");
                SessionState::Authenticated(valid)
            }
            Err(BackendError::Auth(reason)) if !refreshed => {
                tracing::info!(%reason, "stored access token rejected; refreshing");
                self.refresh_stored(&candidate)
                    .await
                    .map_or(SessionState::Anonymous, SessionState::Authenticated)
            }
            Err(BackendError::Auth(reason)) => {
                tracing::info!(%reason, "refreshed session rejected; clearing");
                self.storage.remove();
                SessionState::Anonymous
            }
            Err(error) => {
                tracing::warn!(%error, "could not validate stored session");
                SessionState::Anonymous
            }
        }
    }

    async fn refresh_stored(&self, stored: &AuthSession) -> Option<AuthSession> {
        if stored.refresh_token.is_empty() {
            tracing::info!("stored session expired and has no refresh token");
            self.storage.remove();
            return None;
        }
        match self.provider.refresh_session(&stored.refresh_token).await {
            Ok(session) => {
                let session = claims::with_token_expiry(session);
                self.persist(&session);
                Some(session)
            }
            Err(BackendError::Auth(reason)) => {
                tracing::info!(%reason, "stored refresh token rejected; clearing");
                self.storage.remove();
                None
            }
            Err(error) => {
                tracing::warn!(%error, "session refresh failed");
                None
            }
        }
    }

    /// Install a session obtained out of band (first account created during
    /// setup, impersonation) after checking it with the provider.
    ///
    /// # Errors
    ///
    /// Returns the provider's rejection; the current session is kept.
    pub async fn adopt_session(&self, session: AuthSession) -> Result<AuthSession, AuthError> {
        let valid = self.provider.get_session(&session).await?;
        let valid = claims::with_token_expiry(valid);
        tracing::info!(subject_id = %valid.subject_id, "session adopted");
        self.authenticate(valid.clone(), TransitionReason::SignedIn);
        Ok(valid)
    }

    /// Exchange the refresh token for a new session.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated` without a session, otherwise the provider's error.
    pub async fn refresh_session(&self) -> Result<AuthSession, AuthError> {
        let current = self.require_session()?;
        let session = self.provider.refresh_session(&current.refresh_token).await?;
        let session = claims::with_token_expiry(session);
        self.authenticate(session.clone(), TransitionReason::TokenRefreshed);
        Ok(session)
    }

    /// Exchange a recovery link's token hash for a session.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` if the token is expired or unknown.
    pub async fn verify_recovery(&self, token_hash: &str) -> Result<AuthSession, AuthError> {
        validation::non_empty("recovery token", token_hash)?;
        let echo = self.expect_echo(AuthEventKind::PasswordRecovery, None);
        let session = match self.provider.verify_recovery(token_hash.trim()).await {
            Ok(session) => claims::with_token_expiry(session),
            Err(error) => {
                self.cancel_echo(&echo);
                return Err(error.into());
            }
        };
        self.authenticate(session.clone(), TransitionReason::PasswordRecovery);
        Ok(session)
    }

    /// Change the signed-in user's password.
    ///
    /// # Errors
    ///
    /// `NotAuthenticated`, `Validation` for a short password, or the
    /// provider's error.
    pub async fn update_password(&self, new_password: &str) -> Result<(), AuthError> {
        let session = self.require_session()?;
        validation::password(new_password)?;
        let echo = self.expect_echo(AuthEventKind::UserUpdated, Some(&session.subject_id));
        if let Err(error) = self.provider.update_password(&session, new_password).await {
            self.cancel_echo(&echo);
            return Err(error.into());
        }
        tracing::info!(subject_id = %session.subject_id, "password updated");
        self.authenticate(session, TransitionReason::UserUpdated);
        Ok(())
    }

    /// Fold a provider event into the session state.
    ///
    /// Events arriving before the store has restored are dropped; restore
    /// establishes the baseline itself.
    pub fn handle_event(&self, event: ProviderEvent) {
        let current = self.current();
        if current.state == SessionState::Unknown {
            tracing::debug!(event = %event.kind, "provider event before restore; ignored");
            return;
        }
        let reason = TransitionReason::from(event.kind);

        match event.kind {
            AuthEventKind::SignedOut => {
                if current.state != SessionState::Anonymous {
                    self.storage.remove();
                    self.publish(SessionState::Anonymous, reason);
                }
            }
            AuthEventKind::SignedIn | AuthEventKind::TokenRefreshed => {
                let Some(session) = event.session else {
                    tracing::debug!(event = %event.kind, "provider event without session; ignored");
                    return;
                };
                let duplicate = current
                    .state
                    .session()
                    .is_some_and(|held| held.same_tokens(&session));
                if !duplicate {
                    self.authenticate(claims::with_token_expiry(session), reason);
                }
            }
            AuthEventKind::PasswordRecovery | AuthEventKind::UserUpdated => {
                let Some(session) = event.session.or_else(|| current.state.session().cloned())
                else {
                    tracing::debug!(event = %event.kind, "provider event while anonymous; ignored");
                    return;
                };
                if self.take_echo(event.kind, &session.subject_id) {
                    tracing::debug!(event = %event.kind, "echo of own operation; already published");
                    return;
                }
                self.authenticate(claims::with_token_expiry(session), reason);
            }
        }
    }

    /// Consume the provider's event stream until it closes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_event_pump(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let mut events = self.provider.events();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => store.handle_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "session store lagged behind provider events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
