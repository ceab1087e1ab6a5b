//! Credential Storage using the OS Keychain

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::CredentialStore,
};
use keyring::Entry;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::{debug, error};

const DEFAULT_SERVICE: &str = "listening-stats-core";
const DEFAULT_ACCOUNT: &str = "session";

type Document = BTreeMap<String, String>;

/// Keyring-backed credential store
///
/// Uses platform-specific secure storage:
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service (libsecret)
///
/// All keys live in one JSON document stored under a single keychain entry,
/// so every batch operation is one keychain write. An in-process mutex
/// serializes read-modify-write cycles.
pub struct KeyringCredentialStore {
    service_name: String,
    account: String,
    lock: Mutex<()>,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::with_service_name(DEFAULT_SERVICE)
    }

    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account: DEFAULT_ACCOUNT.to_string(),
            lock: Mutex::new(()),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service_name, &self.account).map_err(Self::map_keyring_error)
    }

    fn map_keyring_error(e: keyring::Error) -> BridgeError {
        BridgeError::OperationFailed(format!("Keyring error: {}", e))
    }

    fn load(&self, entry: &Entry) -> Result<Document> {
        match entry.get_password() {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                error!(service = %self.service_name, error = %e, "Credential document is corrupted");
                BridgeError::OperationFailed(format!("Corrupted credential document: {}", e))
            }),
            Err(keyring::Error::NoEntry) => Ok(Document::new()),
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }

    fn save(&self, entry: &Entry, document: &Document) -> Result<()> {
        if document.is_empty() {
            return match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(Self::map_keyring_error(e)),
            };
        }

        let raw = serde_json::to_string(document).map_err(|e| {
            BridgeError::OperationFailed(format!("Failed to encode credentials: {}", e))
        })?;
        entry.set_password(&raw).map_err(Self::map_keyring_error)
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        let entry = self.entry()?;
        Ok(self.load(&entry)?.remove(key))
    }

    async fn multi_get(&self, keys: &[&str]) -> Result<Vec<(String, Option<String>)>> {
        let _guard = self.lock.lock().await;
        let entry = self.entry()?;
        let document = self.load(&entry)?;

        Ok(keys
            .iter()
            .map(|key| (key.to_string(), document.get(*key).cloned()))
            .collect())
    }

    async fn multi_set(&self, pairs: &[(&str, &str)]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let entry = self.entry()?;
        let mut document = self.load(&entry)?;

        for (key, value) in pairs {
            document.insert(key.to_string(), value.to_string());
        }

        self.save(&entry, &document)?;
        debug!(count = pairs.len(), "Stored credentials in keyring");
        Ok(())
    }

    async fn multi_remove(&self, keys: &[&str]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let entry = self.entry()?;
        let mut document = self.load(&entry)?;

        let before = document.len();
        for key in keys {
            document.remove(*key);
        }
        if document.len() == before {
            debug!("No stored credentials to remove");
            return Ok(());
        }

        self.save(&entry, &document)?;
        debug!(count = before - document.len(), "Removed credentials from keyring");
        Ok(())
    }
}
