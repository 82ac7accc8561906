//! Persistent credential storage.
//!
//! The platform's mobile clients keep the session beside the app data in an
//! async string key-value store. This module provides that contract
//! (`KeyValueStore`), a file-backed implementation for desktop/CLI hosts and
//! an in-memory one for tests, plus the `CredentialStore` that persists the
//! composed session.
//!
//! Persistence is best-effort throughout: the in-memory session stays
//! authoritative for the running process, so storage failures are logged and
//! swallowed rather than surfaced. Only a restart loses anything.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::models::{AccountType, UserProfile};

/// Storage key for the bearer token.
pub const KEY_ACCESS_TOKEN: &str = "access_token";
/// Storage key for the account type string.
pub const KEY_ACCOUNT_TYPE: &str = "account_type";
/// Storage key for the JSON-serialized user profile.
pub const KEY_USER_INFO: &str = "user_info";
/// Storage key for the identity-provider session id.
pub const KEY_IDENTITY_SESSION: &str = "identity_session";

/// Async string key-value storage, the shape of device-local persistence.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// File-backed store: one file per key under a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("Failed to read stored entry: {}", key)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .context("Failed to create credential directory")?;
        tokio::fs::write(self.path_for(key), value)
            .await
            .with_context(|| format!("Failed to write stored entry: {}", key))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("Failed to remove stored entry: {}", key)),
        }
    }
}

/// In-memory store for tests and ephemeral (never-persisted) sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// A session as it came back from storage. Entries are independent; any of
/// them may be missing or have failed to parse.
#[derive(Debug, Default)]
pub struct StoredSession {
    pub token: Option<String>,
    pub account_type: Option<AccountType>,
    pub user: Option<UserProfile>,
}

/// Persists and restores the composed session.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> Arc<dyn KeyValueStore> {
        self.backend.clone()
    }

    /// Persist all three session entries. Failures are logged, never raised.
    pub async fn save(&self, token: &str, account_type: AccountType, user: &UserProfile) {
        let user_json = match serde_json::to_string(user) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "Could not serialize user profile for storage");
                String::new()
            }
        };

        let (token_res, type_res, user_res) = futures::join!(
            self.backend.set(KEY_ACCESS_TOKEN, token),
            self.backend.set(KEY_ACCOUNT_TYPE, account_type.as_str()),
            self.backend.set(KEY_USER_INFO, &user_json),
        );
        for (key, result) in [
            (KEY_ACCESS_TOKEN, token_res),
            (KEY_ACCOUNT_TYPE, type_res),
            (KEY_USER_INFO, user_res),
        ] {
            if let Err(err) = result {
                warn!(key, error = %err, "Failed to persist session entry");
            }
        }
    }

    /// Persist just the token, as done on every refresh.
    pub async fn save_token(&self, token: &str) {
        if let Err(err) = self.backend.set(KEY_ACCESS_TOKEN, token).await {
            warn!(error = %err, "Failed to persist refreshed token");
        }
    }

    /// Read the persisted session. Missing or corrupt entries come back
    /// absent rather than erroring.
    pub async fn restore(&self) -> StoredSession {
        let (token, account_type, user_json) = futures::join!(
            self.backend.get(KEY_ACCESS_TOKEN),
            self.backend.get(KEY_ACCOUNT_TYPE),
            self.backend.get(KEY_USER_INFO),
        );

        let token = token.unwrap_or_else(|err| {
            warn!(error = %err, "Failed to read stored token");
            None
        });
        let account_type = account_type
            .unwrap_or_else(|err| {
                warn!(error = %err, "Failed to read stored account type");
                None
            })
            .map(|s| AccountType::parse(&s));
        let user = user_json
            .unwrap_or_else(|err| {
                warn!(error = %err, "Failed to read stored user profile");
                None
            })
            .and_then(|json| match serde_json::from_str(&json) {
                Ok(user) => Some(user),
                Err(err) => {
                    warn!(error = %err, "Stored user profile is corrupt, ignoring");
                    None
                }
            });

        debug!(
            has_token = token.is_some(),
            has_user = user.is_some(),
            "Restored stored session"
        );
        StoredSession { token, account_type, user }
    }

    /// Remove all session entries, best-effort.
    pub async fn clear(&self) {
        let (token_res, type_res, user_res) = futures::join!(
            self.backend.remove(KEY_ACCESS_TOKEN),
            self.backend.remove(KEY_ACCOUNT_TYPE),
            self.backend.remove(KEY_USER_INFO),
        );
        for (key, result) in [
            (KEY_ACCESS_TOKEN, token_res),
            (KEY_ACCOUNT_TYPE, type_res),
            (KEY_USER_INFO, user_res),
        ] {
            if let Err(err) = result {
                warn!(key, error = %err, "Failed to clear session entry");
            }
        }
    }
}
