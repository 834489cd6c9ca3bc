//! Settings resolver: organization override, then global, then fallback.
//!
//! One key (`app_name`) is tracked reactively for the current user's
//! organization; any key can be resolved on demand. Remote failures at a
//! lookup step count as a miss for that step, so resolution always yields a
//! value.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::watch;

use portico_backend::SettingsStore;
use portico_core::entities::{SettingEntry, UserProfile};
use portico_core::validation;

use crate::error::AuthError;
use crate::state::{Generation, ListenerId, Observable, Ticket};

/// Key of the application display name.
pub const APP_NAME_KEY: &str = "app_name";

/// Which step of the lookup produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingSource {
    Organization,
    Global,
    Fallback,
}

impl fmt::Display for SettingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Organization => "organization",
            Self::Global => "global",
            Self::Fallback => "fallback",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSetting {
    pub key: String,
    pub value: String,
    pub source: SettingSource,
    /// Organization the value was resolved for.
    pub organization_id: Option<String>,
}

/// A re-resolution of the tracked key issued by [`SettingsResolver::track`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveTicket {
    pub ticket: Ticket,
    pub organization_id: Option<String>,
}

pub struct SettingsResolver<S> {
    store: Arc<S>,
    fallbacks: HashMap<String, String>,
    current: Observable<ResolvedSetting>,
    generation: Generation,
    /// Latest user snapshot, used to authorize global writes.
    user: Mutex<Option<UserProfile>>,
}

impl<S: SettingsStore + 'static> SettingsResolver<S> {
    /// `app_name_fallback` is what `app_name` resolves to when no row exists.
    pub fn new(store: Arc<S>, app_name_fallback: &str) -> Self {
        let mut fallbacks = HashMap::new();
        fallbacks.insert(APP_NAME_KEY.to_string(), app_name_fallback.to_string());
        let initial = ResolvedSetting {
            key: APP_NAME_KEY.to_string(),
            value: app_name_fallback.to_string(),
            source: SettingSource::Fallback,
            organization_id: None,
        };
        Self {
            store,
            fallbacks,
            current: Observable::new(initial),
            generation: Generation::new(),
            user: Mutex::new(None),
        }
    }

    /// Register the fallback for another key. Unknown keys fall back to "".
    #[must_use]
    pub fn with_fallback(mut self, key: &str, value: &str) -> Self {
        self.fallbacks.insert(key.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn fallback(&self, key: &str) -> String {
        self.fallbacks.get(key).cloned().unwrap_or_default()
    }

    /// Published `app_name` resolution, without a remote call.
    pub fn current(&self) -> ResolvedSetting {
        self.current.get()
    }

    pub fn current_value(&self) -> String {
        self.current.with(|current| current.value.clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<ResolvedSetting> {
        self.current.subscribe()
    }

    pub fn listen(&self, listener: impl Fn(&ResolvedSetting) + Send + Sync + 'static) -> ListenerId {
        self.current.listen(listener)
    }

    async fn lookup(&self, key: &str, organization_id: Option<&str>) -> Option<String> {
        match self.store.get_setting(key, organization_id).await {
            Ok(entry) => Some(entry.value),
            Err(error) if error.is_not_found() => None,
            Err(error) => {
                tracing::warn!(
                    %error,
                    key,
                    organization_id = organization_id.unwrap_or("global"),
                    "setting lookup failed; treating as missing"
                );
                None
            }
        }
    }

    /// Resolve `key` for `organization_id`, reporting where the value came from.
    pub async fn resolve_entry(&self, key: &str, organization_id: Option<&str>) -> ResolvedSetting {
        let resolved = |value: String, source: SettingSource| ResolvedSetting {
            key: key.to_string(),
            value,
            source,
            organization_id: organization_id.map(str::to_string),
        };

        if let Some(organization_id) = organization_id
            && let Some(value) = self.lookup(key, Some(organization_id)).await
        {
            return resolved(value, SettingSource::Organization);
        }
        if let Some(value) = self.lookup(key, None).await {
            return resolved(value, SettingSource::Global);
        }
        resolved(self.fallback(key), SettingSource::Fallback)
    }

    /// Resolve `key` for `organization_id`. Never fails.
    pub async fn resolve(&self, key: &str, organization_id: Option<&str>) -> String {
        self.resolve_entry(key, organization_id).await.value
    }

    /// Write a setting. `organization_id = None` writes the global row and
    /// requires the current user to be a super admin.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank key or an out-of-range application name,
    /// `Forbidden` for a global write by anyone else than a super admin,
    /// otherwise the backend's error.
    pub async fn update(
        &self,
        key: &str,
        value: &str,
        organization_id: Option<&str>,
    ) -> Result<(), AuthError> {
        validation::non_empty("key", key)?;
        if key == APP_NAME_KEY {
            validation::app_name(value)?;
        }
        if organization_id.is_none() {
            let allowed = self
                .user
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .is_some_and(UserProfile::is_super_admin);
            if !allowed {
                return Err(AuthError::forbidden("global settings can only be changed by a super admin"));
            }
        }

        let entry = SettingEntry::new(key, organization_id, value.trim());
        self.store.upsert_setting(&entry).await?;
        tracing::info!(
            key,
            organization_id = organization_id.unwrap_or("global"),
            "setting updated"
        );

        if key == APP_NAME_KEY {
            self.apply_write(&entry);
        }
        Ok(())
    }

    /// Publish a successful write of the tracked key when it targets the
    /// tracked user's organization, or is a global write that the value
    /// already resolved for that user would not shadow. A re-resolution in
    /// flight for another organization is left alone.
    fn apply_write(&self, entry: &SettingEntry) {
        let tracked = {
            let user = self.user.lock().unwrap_or_else(PoisonError::into_inner);
            match user.as_ref() {
                Some(user) => user.organization_id.clone(),
                None => return,
            }
        };
        let current = self.current.get();
        let source = match entry.organization_id.as_deref() {
            Some(written) if tracked.as_deref() == Some(written) => SettingSource::Organization,
            None if current.organization_id == tracked && current.source != SettingSource::Organization => {
                SettingSource::Global
            }
            _ => return,
        };
        // The write now wins over a re-resolution for the same organization.
        let ticket = self.generation.issue();
        self.current.set(ResolvedSetting {
            key: APP_NAME_KEY.to_string(),
            value: entry.value.clone(),
            source,
            organization_id: tracked,
        });
        self.generation.settle(ticket);
    }

    /// Follow a change of the current user. Anonymous publishes the
    /// fallback at once; a signed-in user yields a re-resolution to run.
    pub fn track(&self, user: Option<&UserProfile>) -> Option<ResolveTicket> {
        *self.user.lock().unwrap_or_else(PoisonError::into_inner) = user.cloned();

        let ticket = self.generation.issue();
        let Some(user) = user else {
            self.current.set(ResolvedSetting {
                key: APP_NAME_KEY.to_string(),
                value: self.fallback(APP_NAME_KEY),
                source: SettingSource::Fallback,
                organization_id: None,
            });
            self.generation.settle(ticket);
            return None;
        };
        Some(ResolveTicket {
            ticket,
            organization_id: user.organization_id.clone(),
        })
    }

    /// Run a re-resolution and publish it if no newer one was issued.
    pub async fn complete(&self, request: ResolveTicket) {
        let resolved = self
            .resolve_entry(APP_NAME_KEY, request.organization_id.as_deref())
            .await;
        if self.generation.is_current(request.ticket) {
            tracing::debug!(value = %resolved.value, source = %resolved.source, "application name resolved");
            self.current.set(resolved);
        }
        self.generation.settle(request.ticket);
    }

    /// Current-user listener: track and re-resolve on the ambient runtime.
    pub fn on_user_change(self: &Arc<Self>, user: Option<&UserProfile>) {
        let Some(request) = self.track(user) else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let resolver = Arc::clone(self);
                runtime.spawn(async move { resolver.complete(request).await });
            }
            Err(error) => {
                tracing::warn!(%error, "no async runtime; settings re-resolution skipped");
                self.generation.settle(request.ticket);
            }
        }
    }

    /// Wait until the latest re-resolution has published.
    pub async fn settled(&self) {
        self.generation.idle().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use portico_backend::BackendError;
    use portico_backend::memory::{MemoryBackend, ops};
    use portico_core::enums::UserRole;

    fn user(role: UserRole, organization_id: Option<&str>) -> UserProfile {
        UserProfile {
            id: "u-1".into(),
            email: "ada@example.com".into(),
            first_name: None,
            last_name: None,
            role,
            organization_id: organization_id.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn unknown_keys_fall_back_to_empty() {
        let backend = Arc::new(MemoryBackend::new());
        let resolver = SettingsResolver::new(backend, "Admin Portal");
        assert_eq!(resolver.resolve("theme", Some("org-1")).await, "");
        assert_eq!(resolver.resolve(APP_NAME_KEY, None).await, "Admin Portal");
    }

    #[tokio::test]
    async fn registered_fallback_is_used() {
        let backend = Arc::new(MemoryBackend::new());
        let resolver = SettingsResolver::new(backend, "Admin Portal").with_fallback("theme", "light");
        let resolved = resolver.resolve_entry("theme", None).await;
        assert_eq!(resolved.value, "light");
        assert_eq!(resolved.source, SettingSource::Fallback);
    }

    #[tokio::test]
    async fn remote_failure_counts_as_miss() {
        let backend = Arc::new(MemoryBackend::new());
        backend.put_setting(APP_NAME_KEY, Some("org-1"), "Org Portal");
        backend.fail(ops::GET_SETTING, BackendError::Transient("connection reset".into()));
        let resolver = SettingsResolver::new(Arc::clone(&backend), "Admin Portal");

        let resolved = resolver.resolve_entry(APP_NAME_KEY, Some("org-1")).await;
        assert_eq!(resolved.value, "Admin Portal");
        assert_eq!(resolved.source, SettingSource::Fallback);
        assert_eq!(backend.calls(ops::GET_SETTING), 2);
    }

    #[tokio::test]
    async fn invalid_app_name_is_rejected_before_write() {
        let backend = Arc::new(MemoryBackend::new());
        let resolver = SettingsResolver::new(Arc::clone(&backend), "Admin Portal");
        let err = resolver.update(APP_NAME_KEY, "ab", Some("org-1")).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        assert_eq!(backend.calls(ops::UPSERT_SETTING), 0);
    }

    #[tokio::test]
    async fn global_write_by_super_admin_updates_published_value() {
        let backend = Arc::new(MemoryBackend::new());
        let resolver = SettingsResolver::new(Arc::clone(&backend), "Admin Portal");
        let request = resolver.track(Some(&user(UserRole::SuperAdmin, None))).unwrap();
        resolver.complete(request).await;
        assert_eq!(resolver.current().source, SettingSource::Fallback);

        resolver.update(APP_NAME_KEY, "Root Portal", None).await.unwrap();
        let current = resolver.current();
        assert_eq!(current.value, "Root Portal");
        assert_eq!(current.source, SettingSource::Global);
        assert_eq!(backend.setting(APP_NAME_KEY, None).as_deref(), Some("Root Portal"));
    }

    #[tokio::test]
    async fn global_write_does_not_override_organization_value() {
        let backend = Arc::new(MemoryBackend::new());
        backend.put_setting(APP_NAME_KEY, Some("org-1"), "Org Portal");
        let resolver = SettingsResolver::new(Arc::clone(&backend), "Admin Portal");
        let request = resolver.track(Some(&user(UserRole::SuperAdmin, Some("org-1")))).unwrap();
        resolver.complete(request).await;

        resolver.update(APP_NAME_KEY, "Root Portal", None).await.unwrap();
        assert_eq!(resolver.current_value(), "Org Portal");
    }

    #[tokio::test]
    async fn write_for_other_organization_leaves_published_value() {
        let backend = Arc::new(MemoryBackend::new());
        let resolver = SettingsResolver::new(Arc::clone(&backend), "Admin Portal");
        let request = resolver.track(Some(&user(UserRole::OrgAdmin, Some("org-1")))).unwrap();
        resolver.complete(request).await;

        resolver.update(APP_NAME_KEY, "Elsewhere", Some("org-2")).await.unwrap();
        assert_eq!(resolver.current_value(), "Admin Portal");

        resolver.update(APP_NAME_KEY, "Mine", Some("org-1")).await.unwrap();
        assert_eq!(resolver.current().source, SettingSource::Organization);
        assert_eq!(resolver.current_value(), "Mine");
    }

    #[tokio::test]
    async fn write_for_previous_organization_keeps_pending_resolution() {
        let backend = Arc::new(MemoryBackend::new());
        backend.put_setting(APP_NAME_KEY, Some("org-1"), "Old Name");
        backend.put_setting(APP_NAME_KEY, Some("org-2"), "Second Org");
        let resolver = SettingsResolver::new(Arc::clone(&backend), "Admin Portal");
        let request = resolver.track(Some(&user(UserRole::OrgAdmin, Some("org-1")))).unwrap();
        resolver.complete(request).await;

        let pending = resolver.track(Some(&user(UserRole::OrgAdmin, Some("org-2")))).unwrap();
        resolver.update(APP_NAME_KEY, "First Org", Some("org-1")).await.unwrap();
        resolver.complete(pending).await;

        let current = resolver.current();
        assert_eq!(current.value, "Second Org");
        assert_eq!(current.source, SettingSource::Organization);
        assert_eq!(current.organization_id.as_deref(), Some("org-2"));
        assert_eq!(backend.setting(APP_NAME_KEY, Some("org-1")).as_deref(), Some("First Org"));
        resolver.settled().await;
    }

    #[tokio::test]
    async fn global_write_waits_for_pending_resolution_of_new_user() {
        let backend = Arc::new(MemoryBackend::new());
        backend.put_setting(APP_NAME_KEY, Some("org-1"), "First Org");
        let resolver = SettingsResolver::new(Arc::clone(&backend), "Admin Portal");
        let request = resolver.track(Some(&user(UserRole::SuperAdmin, Some("org-1")))).unwrap();
        resolver.complete(request).await;

        let pending = resolver.track(Some(&user(UserRole::SuperAdmin, Some("org-2")))).unwrap();
        resolver.update(APP_NAME_KEY, "Root Portal", None).await.unwrap();
        assert_eq!(resolver.current_value(), "First Org");

        resolver.complete(pending).await;
        let current = resolver.current();
        assert_eq!(current.value, "Root Portal");
        assert_eq!(current.source, SettingSource::Global);
        assert_eq!(current.organization_id.as_deref(), Some("org-2"));
    }

    #[tokio::test]
    async fn stale_resolution_is_discarded() {
        let backend = Arc::new(MemoryBackend::new());
        backend.put_setting(APP_NAME_KEY, Some("org-1"), "First Org");
        backend.put_setting(APP_NAME_KEY, Some("org-2"), "Second Org");
        let resolver = SettingsResolver::new(Arc::clone(&backend), "Admin Portal");

        let first = resolver.track(Some(&user(UserRole::User, Some("org-1")))).unwrap();
        let second = resolver.track(Some(&user(UserRole::User, Some("org-2")))).unwrap();
        resolver.complete(second).await;
        resolver.complete(first).await;

        assert_eq!(resolver.current_value(), "Second Org");
        resolver.settled().await;
    }
}
