//! The wired-up portal: session store → profile resolver → settings
//! resolver, plus router and admin operations over one backend.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;

use portico_backend::{AuthProvider, Directory};
use portico_config::PorticoConfig;
use portico_core::entities::UserProfile;

use crate::admin::{Admin, RedirectLinks};
use crate::error::AuthError;
use crate::profile::ProfileResolver;
use crate::routes::{Navigation, Router, SetupGuard};
use crate::session::{SessionState, SessionStore};
use crate::settings::SettingsResolver;
use crate::token_store::GuardedStorage;

/// Where an invited user sets their password.
const INVITE_REDIRECT_PATH: &str = "reset-password?type=signup";
const RESET_REDIRECT_PATH: &str = "reset-password";

#[derive(Debug, Clone)]
pub struct PortalOptions {
    pub app_name_fallback: String,
    pub links: RedirectLinks,
}

impl PortalOptions {
    pub fn from_config(config: &PorticoConfig) -> Self {
        Self {
            app_name_fallback: config.general.fallback_app_name().to_string(),
            links: RedirectLinks {
                invite: config.backend.redirect_to(INVITE_REDIRECT_PATH),
                password_reset: config.backend.redirect_to(RESET_REDIRECT_PATH),
            },
        }
    }
}

impl Default for PortalOptions {
    fn default() -> Self {
        Self::from_config(&PorticoConfig::default())
    }
}

pub struct Portal<B> {
    backend: Arc<B>,
    session: Arc<SessionStore<B>>,
    profiles: Arc<ProfileResolver<B>>,
    settings: Arc<SettingsResolver<B>>,
    router: Router<B>,
    admin: Admin<B>,
    event_pump: Mutex<Option<JoinHandle<()>>>,
}

impl<B: AuthProvider + Directory + 'static> Portal<B> {
    pub fn new(backend: Arc<B>, storage: GuardedStorage, options: PortalOptions) -> Self {
        let session = Arc::new(SessionStore::new(Arc::clone(&backend), storage));
        let profiles = Arc::new(ProfileResolver::new(Arc::clone(&backend)));
        let settings = Arc::new(SettingsResolver::new(
            Arc::clone(&backend),
            &options.app_name_fallback,
        ));

        let resolver = Arc::clone(&profiles);
        session.listen(move |transition| resolver.on_session_change(transition));
        let resolver = Arc::clone(&settings);
        profiles.listen(move |user| resolver.on_user_change(user.as_ref()));

        let router = Router::new(profiles.subscribe(), SetupGuard::new(Arc::clone(&backend)));
        let admin = Admin::new(
            Arc::clone(&backend),
            Arc::clone(&session),
            Arc::clone(&profiles),
            options.links,
        );

        Self {
            backend,
            session,
            profiles,
            settings,
            router,
            admin,
            event_pump: Mutex::new(None),
        }
    }

    /// Start consuming provider events, restore the persisted session and
    /// wait for the current user and settings to resolve.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(&self) -> SessionState {
        {
            let mut pump = self.event_pump.lock().unwrap_or_else(PoisonError::into_inner);
            if pump.is_none() {
                *pump = Some(self.session.spawn_event_pump());
            }
        }
        let state = self.session.restore_session().await;
        self.settled().await;
        state
    }

    /// Wait until every fetch triggered so far has published.
    pub async fn settled(&self) {
        self.profiles.settled().await;
        self.settings.settled().await;
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn session(&self) -> &Arc<SessionStore<B>> {
        &self.session
    }

    pub fn profiles(&self) -> &Arc<ProfileResolver<B>> {
        &self.profiles
    }

    pub fn settings(&self) -> &Arc<SettingsResolver<B>> {
        &self.settings
    }

    pub const fn admin(&self) -> &Admin<B> {
        &self.admin
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.profiles.current()
    }

    /// Sign in and wait for the profile to load.
    ///
    /// # Errors
    ///
    /// See [`SessionStore::sign_in`].
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Option<UserProfile>, AuthError> {
        self.session.sign_in(email, password).await?;
        self.settled().await;
        Ok(self.current_user())
    }

    pub async fn sign_out(&self) {
        self.session.sign_out().await;
        self.settled().await;
    }

    /// Navigate with the current user snapshot.
    pub async fn navigate(&self, path: &str) -> Navigation {
        self.router.navigate(path).await
    }
}

impl<B> Drop for Portal<B> {
    fn drop(&mut self) {
        if let Some(pump) = self
            .event_pump
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pump.abort();
        }
    }
}
