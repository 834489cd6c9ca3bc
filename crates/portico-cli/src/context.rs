use std::sync::Arc;

use anyhow::Context;

use portico_auth::token_store::{self, GuardedStorage};
use portico_auth::{Portal, PortalOptions, SessionState};
use portico_backend::RestClient;
use portico_config::PorticoConfig;

use crate::cli::GlobalFlags;
use crate::commands::Backend;

/// Loaded configuration plus a started portal.
pub struct AppContext<B = RestClient> {
    pub config: PorticoConfig,
    pub portal: Portal<B>,
}

impl AppContext<RestClient> {
    /// Connect to the configured backend and restore the stored session.
    pub async fn init(config: &PorticoConfig, flags: &GlobalFlags) -> anyhow::Result<Self> {
        let backend = RestClient::from_config(&config.backend).context(
            "backend not configured; set PORTICO_BACKEND__URL and PORTICO_BACKEND__ANON_KEY",
        )?;
        let storage = if flags.ephemeral {
            GuardedStorage::memory(&config.session.storage_key)
        } else {
            let tiers = token_store::from_config(&config.session)
                .context("failed to open session storage")?;
            GuardedStorage::new(tiers, config.session.storage_key.clone())
        };
        Self::start(config.clone(), Arc::new(backend), storage).await
    }
}

impl<B: Backend> AppContext<B> {
    pub async fn start(
        config: PorticoConfig,
        backend: Arc<B>,
        storage: GuardedStorage,
    ) -> anyhow::Result<Self> {
        let storage_name = storage.backend_name();
        let portal = Portal::new(backend, storage, PortalOptions::from_config(&config));
        let state = portal.start().await;
        match &state {
            SessionState::Authenticated(session) => {
                tracing::debug!(subject_id = %session.subject_id, storage = storage_name, "session restored");
            }
            SessionState::Anonymous | SessionState::Unknown => {
                tracing::debug!(storage = storage_name, "no stored session");
            }
        }
        Ok(Self { config, portal })
    }
}
