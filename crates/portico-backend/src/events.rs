//! Auth provider event stream.
//!
//! The provider announces session changes it performs or observes as
//! discrete named events. Consumers translate them into their own state;
//! nothing outside the session layer sees this vocabulary.

use std::fmt;

use portico_core::identity::AuthSession;
use tokio::sync::broadcast;

/// Name of a provider event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    PasswordRecovery,
    UserUpdated,
}

impl AuthEventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SignedIn => "signed_in",
            Self::SignedOut => "signed_out",
            Self::TokenRefreshed => "token_refreshed",
            Self::PasswordRecovery => "password_recovery",
            Self::UserUpdated => "user_updated",
        }
    }
}

impl fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider event with its optional session payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
    pub kind: AuthEventKind,
    pub session: Option<AuthSession>,
}

impl ProviderEvent {
    #[must_use]
    pub const fn new(kind: AuthEventKind, session: Option<AuthSession>) -> Self {
        Self { kind, session }
    }
}

const EVENT_CAPACITY: usize = 64;

/// Broadcast fan-out for provider events.
///
/// If a subscriber falls behind it receives `RecvError::Lagged` and should
/// re-read the provider's session rather than replay.
pub struct EventBus {
    tx: broadcast::Sender<ProviderEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Dropped silently when nobody is subscribed.
    pub fn publish(&self, event: ProviderEvent) {
        tracing::debug!(event = %event.kind, "auth provider event");
        let _ = self.tx.send(event);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
