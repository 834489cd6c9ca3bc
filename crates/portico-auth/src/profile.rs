//! Profile resolver: session identity in, current user profile out.
//!
//! Every transition into an authenticated state issues a fetch ticket; only
//! the latest ticket may publish. A token refresh for the subject already
//! loaded keeps the current profile without a fetch. Becoming anonymous
//! publishes `None` at once and invalidates whatever fetch is in flight.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use portico_backend::ProfileSource;
use portico_core::entities::UserProfile;

use crate::session::{SessionState, SessionTransition, TransitionReason};
use crate::state::{Generation, ListenerId, Observable, Ticket};

/// A profile fetch that [`ProfileResolver::track`] decided to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub ticket: Ticket,
    pub subject_id: String,
}

pub struct ProfileResolver<P> {
    source: Arc<P>,
    current: Observable<Option<UserProfile>>,
    generation: Generation,
    /// Subject of the latest issued fetch.
    requested: Mutex<Option<String>>,
}

impl<P: ProfileSource + 'static> ProfileResolver<P> {
    pub fn new(source: Arc<P>) -> Self {
        Self {
            source,
            current: Observable::new(None),
            generation: Generation::new(),
            requested: Mutex::new(None),
        }
    }

    /// The current user, without a remote call.
    pub fn current(&self) -> Option<UserProfile> {
        self.current.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<UserProfile>> {
        self.current.subscribe()
    }

    pub fn listen(
        &self,
        listener: impl Fn(&Option<UserProfile>) + Send + Sync + 'static,
    ) -> ListenerId {
        self.current.listen(listener)
    }

    /// Decide what a session transition means for the current user.
    ///
    /// Returns the fetch to run, if any. Anonymous transitions publish
    /// `None` before returning.
    pub fn track(&self, transition: &SessionTransition) -> Option<FetchTicket> {
        let mut requested = self.requested.lock().unwrap_or_else(PoisonError::into_inner);
        match &transition.state {
            SessionState::Unknown => None,
            SessionState::Anonymous => {
                let ticket = self.generation.issue();
                *requested = None;
                drop(requested);
                if self.current.with(Option::is_some) {
                    self.current.set(None);
                }
                self.generation.settle(ticket);
                None
            }
            SessionState::Authenticated(session) => {
                if transition.reason == TransitionReason::TokenRefreshed
                    && requested.as_deref() == Some(session.subject_id.as_str())
                {
                    return None;
                }
                *requested = Some(session.subject_id.clone());
                Some(FetchTicket {
                    ticket: self.generation.issue(),
                    subject_id: session.subject_id.clone(),
                })
            }
        }
    }

    /// Run a fetch issued by [`Self::track`] and publish its result if it is
    /// still the latest. Failures publish `None`; nothing is retried.
    pub async fn complete(&self, fetch: FetchTicket) {
        let result = self.source.fetch_profile(&fetch.subject_id).await;

        if !self.generation.is_current(fetch.ticket) {
            tracing::debug!(subject_id = %fetch.subject_id, "discarding superseded profile fetch");
            self.generation.settle(fetch.ticket);
            return;
        }

        match result {
            Ok(profile) => {
                tracing::debug!(subject_id = %profile.id, role = %profile.role, "current user loaded");
                self.current.set(Some(profile));
            }
            Err(error) => {
                tracing::warn!(%error, subject_id = %fetch.subject_id, "failed to load user profile");
                self.current.set(None);
            }
        }
        self.generation.settle(fetch.ticket);
    }

    /// Session listener: track the transition and run the fetch on the
    /// ambient tokio runtime.
    pub fn on_session_change(self: &Arc<Self>, transition: &SessionTransition) {
        let Some(fetch) = self.track(transition) else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let resolver = Arc::clone(self);
                runtime.spawn(async move { resolver.complete(fetch).await });
            }
            Err(error) => {
                tracing::warn!(%error, "no async runtime; profile fetch skipped");
                self.generation.settle(fetch.ticket);
            }
        }
    }

    /// Wait until the latest requested fetch has published.
    pub async fn settled(&self) {
        self.generation.idle().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_backend::memory::{MemoryBackend, ops};
    use portico_core::enums::UserRole;
    use portico_core::identity::AuthSession;

    fn authenticated(subject_id: &str, reason: TransitionReason) -> SessionTransition {
        SessionTransition {
            state: SessionState::Authenticated(AuthSession {
                subject_id: subject_id.into(),
                email: None,
                access_token: format!("at-{subject_id}"),
                refresh_token: format!("rt-{subject_id}"),
                expires_at: None,
            }),
            reason,
        }
    }

    fn anonymous() -> SessionTransition {
        SessionTransition {
            state: SessionState::Anonymous,
            reason: TransitionReason::SignedOut,
        }
    }

    #[tokio::test]
    async fn fetches_once_per_authenticated_transition() {
        let backend = Arc::new(MemoryBackend::new());
        let profile = backend.add_user("ada@example.com", "pw-123456", UserRole::User, Some("org-1"));
        let resolver = ProfileResolver::new(Arc::clone(&backend));

        let fetch = resolver
            .track(&authenticated(&profile.id, TransitionReason::SignedIn))
            .unwrap();
        resolver.complete(fetch).await;

        assert_eq!(resolver.current(), Some(profile));
        assert_eq!(backend.calls(ops::FETCH_PROFILE), 1);
    }

    #[tokio::test]
    async fn token_refresh_for_loaded_subject_skips_fetch() {
        let backend = Arc::new(MemoryBackend::new());
        let profile = backend.add_user("ada@example.com", "pw-123456", UserRole::User, Some("org-1"));
        let resolver = ProfileResolver::new(Arc::clone(&backend));

        let fetch = resolver
            .track(&authenticated(&profile.id, TransitionReason::SignedIn))
            .unwrap();
        resolver.complete(fetch).await;

        assert!(
            resolver
                .track(&authenticated(&profile.id, TransitionReason::TokenRefreshed))
                .is_none()
        );
        assert!(
            resolver
                .track(&authenticated(&profile.id, TransitionReason::UserUpdated))
                .is_some()
        );
    }

    #[tokio::test]
    async fn anonymous_clears_without_fetch() {
        let backend = Arc::new(MemoryBackend::new());
        let profile = backend.add_user("ada@example.com", "pw-123456", UserRole::User, Some("org-1"));
        let resolver = ProfileResolver::new(Arc::clone(&backend));
        let fetch = resolver
            .track(&authenticated(&profile.id, TransitionReason::SignedIn))
            .unwrap();
        resolver.complete(fetch).await;

        assert!(resolver.track(&anonymous()).is_none());
        assert_eq!(resolver.current(), None);
        assert_eq!(backend.calls(ops::FETCH_PROFILE), 1);
        resolver.settled().await;
    }

    #[tokio::test]
    async fn sign_out_during_fetch_discards_result() {
        let backend = Arc::new(MemoryBackend::new());
        let profile = backend.add_user("ada@example.com", "pw-123456", UserRole::User, Some("org-1"));
        let resolver = ProfileResolver::new(Arc::clone(&backend));

        let fetch = resolver
            .track(&authenticated(&profile.id, TransitionReason::SignedIn))
            .unwrap();
        resolver.track(&anonymous());
        resolver.complete(fetch).await;

        assert_eq!(resolver.current(), None);
    }

    #[tokio::test]
    async fn missing_profile_publishes_none() {
        let backend = Arc::new(MemoryBackend::new());
        let resolver = ProfileResolver::new(Arc::clone(&backend));

        let fetch = resolver
            .track(&authenticated("ghost", TransitionReason::SignedIn))
            .unwrap();
        resolver.complete(fetch).await;

        assert_eq!(resolver.current(), None);
        resolver.settled().await;
    }
}
