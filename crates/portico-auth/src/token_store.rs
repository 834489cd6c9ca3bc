//! Session token persistence.
//!
//! [`SessionStorage`] is a key/value slot store with three backends: the OS
//! keychain, a `0600` credentials file, and memory. [`TieredStorage`] tries
//! the keychain and falls back to the file. [`GuardedStorage`] is what the
//! session store actually holds: it serializes access to its slot and turns
//! every failure into a logged "not found".

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use portico_config::SessionConfig;

use crate::error::AuthError;

pub trait SessionStorage: Send + Sync {
    /// Short backend name for status output.
    fn name(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, AuthError>;

    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;

    /// Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), AuthError>;
}

/// OS keychain entry per key, under one service name.
#[derive(Debug, Clone)]
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, AuthError> {
        keyring::Entry::new(&self.service, key)
            .map_err(|e| AuthError::Storage(format!("keyring unavailable: {e}")))
    }
}

impl SessionStorage for KeyringStorage {
    fn name(&self) -> &'static str {
        "keyring"
    }

    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        match self.entry(key)?.get_password() {
            Ok(value) if value.is_empty() => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AuthError::Storage(format!("keyring read: {e}"))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| AuthError::Storage(format!("keyring write: {e}")))
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AuthError::Storage(format!("keyring delete: {e}"))),
        }
    }
}

/// One file per key inside a private directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

fn restrict_dir(dir: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(error) = fs::set_permissions(dir, fs::Permissions::from_mode(0o700)) {
            tracing::warn!(%error, dir = %dir.display(), "failed to chmod 0700");
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}

impl SessionStorage for FileStorage {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        let path = self.path(key);
        match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Ok(None),
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AuthError::Storage(format!("read {}: {e}", path.display()))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| AuthError::Storage(format!("mkdir {}: {e}", self.dir.display())))?;
        restrict_dir(&self.dir);

        let path = self.path(key);
        fs::write(&path, value)
            .map_err(|e| AuthError::Storage(format!("write {}: {e}", path.display())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
                .map_err(|e| AuthError::Storage(format!("chmod {}: {e}", path.display())))?;
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        let path = self.path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Storage(format!(
                "failed to delete {}: {e}",
                path.display()
            ))),
        }
    }
}

/// Process-local storage, for tests and `--ephemeral` runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Keychain first, credentials file as fallback.
///
/// Reads prefer the keychain; writes fall back to the file when the
/// keychain refuses; removes clear both tiers.
pub struct TieredStorage {
    keyring: Option<KeyringStorage>,
    file: FileStorage,
}

impl TieredStorage {
    pub const fn new(keyring: Option<KeyringStorage>, file: FileStorage) -> Self {
        Self { keyring, file }
    }

    /// Which tier currently holds `key`, for status display.
    pub fn source_of(&self, key: &str) -> Option<&'static str> {
        if let Some(keyring) = &self.keyring
            && keyring.get(key).is_ok_and(|value| value.is_some())
        {
            return Some(keyring.name());
        }
        self.file
            .get(key)
            .is_ok_and(|value| value.is_some())
            .then(|| self.file.name())
    }
}

impl SessionStorage for TieredStorage {
    fn name(&self) -> &'static str {
        if self.keyring.is_some() {
            "keyring+file"
        } else {
            "file"
        }
    }

    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        if let Some(keyring) = &self.keyring {
            match keyring.get(key) {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => {}
                Err(error) => tracing::debug!(%error, "keyring read failed; trying file"),
            }
        }
        self.file.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        if let Some(keyring) = &self.keyring {
            match keyring.set(key, value) {
                Ok(()) => {
                    // A stale file copy would shadow a later keychain delete.
                    if let Err(error) = self.file.remove(key) {
                        tracing::debug!(%error, "stale credentials file not removed");
                    }
                    return Ok(());
                }
                Err(error) => tracing::warn!(%error, "keyring store failed; falling back to file"),
            }
        }
        self.file.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        if let Some(keyring) = &self.keyring
            && let Err(error) = keyring.remove(key)
        {
            tracing::debug!(%error, "keyring delete failed");
        }
        self.file.remove(key)
    }
}

/// Build the storage described by the `[session]` config section.
///
/// # Errors
///
/// Returns `AuthError::Storage` if no credentials directory can be resolved.
pub fn from_config(config: &SessionConfig) -> Result<TieredStorage, AuthError> {
    let dir = config.credentials_dir().ok_or_else(|| {
        AuthError::Storage("home directory not found, cannot store credentials".into())
    })?;
    let keyring = config
        .use_keyring
        .then(|| KeyringStorage::new(config.keyring_service.clone()));
    Ok(TieredStorage::new(keyring, FileStorage::new(dir)))
}

/// Single-slot, fault-tolerant view over a [`SessionStorage`].
///
/// Every access takes the slot lock. Failures are logged and reported as
/// "no value"; nothing here returns an error.
pub struct GuardedStorage {
    inner: Box<dyn SessionStorage>,
    key: String,
    lock: Mutex<()>,
}

impl GuardedStorage {
    pub fn new(inner: impl SessionStorage + 'static, key: impl Into<String>) -> Self {
        Self {
            inner: Box::new(inner),
            key: key.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn memory(key: &str) -> Self {
        Self::new(MemoryStorage::new(), key)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.name()
    }

    pub fn get(&self) -> Option<String> {
        let _slot = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match self.inner.get(&self.key) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(%error, key = %self.key, "session storage read failed");
                None
            }
        }
    }

    pub fn set(&self, value: &str) {
        let _slot = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(error) = self.inner.set(&self.key, value) {
            tracing::warn!(%error, key = %self.key, "session storage write failed");
        }
    }

    pub fn remove(&self) {
        let _slot = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(error) = self.inner.remove(&self.key) {
            tracing::warn!(%error, key = %self.key, "session storage delete failed");
        }
    }
}
