//! Credential Storage Abstraction
//!
//! Key-value persistence for session credentials. Hosts back this with
//! whatever the platform offers (Keychain, Keystore, AsyncStorage, libsecret).

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::Result;

/// Persistent key-value store for session credentials.
///
/// # Atomicity
///
/// `multi_set` and `multi_remove` are all-or-nothing: after the call either
/// every pair was written (or removed) or none was. `multi_get` observes a
/// single consistent snapshot.
///
/// # Security Requirements
///
/// Implementations MUST:
/// - Use platform-provided secure storage when available
/// - Never log or expose stored values
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::CredentialStore;
///
/// async fn sign_out(store: &dyn CredentialStore) -> Result<()> {
///     store.multi_remove(&["token", "refreshToken", "expirationDate"]).await
/// }
/// ```
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read a single value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Read several keys at once.
    ///
    /// The result has one entry per requested key, in request order.
    async fn multi_get(&self, keys: &[&str]) -> Result<Vec<(String, Option<String>)>>;

    /// Write several pairs atomically.
    async fn multi_set(&self, pairs: &[(&str, &str)]) -> Result<()>;

    /// Remove several keys atomically. Missing keys are ignored.
    async fn multi_remove(&self, keys: &[&str]) -> Result<()>;
}

/// In-memory credential store.
///
/// Suitable for tests and for hosts that deliberately keep sessions ephemeral.
/// A single mutex guards the map, so batch operations are atomic.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `pairs`.
    pub fn with_entries<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.entries.lock().await.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn multi_get(&self, keys: &[&str]) -> Result<Vec<(String, Option<String>)>> {
        let entries = self.entries.lock().await;
        Ok(keys
            .iter()
            .map(|key| (key.to_string(), entries.get(*key).cloned()))
            .collect())
    }

    async fn multi_set(&self, pairs: &[(&str, &str)]) -> Result<()> {
        let mut entries = self.entries.lock().await;
        for (key, value) in pairs {
            entries.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn multi_remove(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_multi_get_preserves_request_order() {
        let store = MemoryCredentialStore::with_entries([("b", "2"), ("a", "1")]);

        let values = store.multi_get(&["a", "missing", "b"]).await.unwrap();

        assert_eq!(
            values,
            vec![
                ("a".to_string(), Some("1".to_string())),
                ("missing".to_string(), None),
                ("b".to_string(), Some("2".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_multi_set_and_remove() {
        let store = MemoryCredentialStore::new();
        store.multi_set(&[("a", "1"), ("b", "2")]).await.unwrap();
        assert_eq!(store.get("b").await.unwrap(), Some("2".to_string()));

        store.multi_remove(&["a", "b", "never-set"]).await.unwrap();
        assert!(store.is_empty().await);
    }
}
