//! Session Persistence
//!
//! Typed access to the session triple inside a [`CredentialStore`]. Every
//! operation maps to exactly one store call, so reads are consistent
//! snapshots and writes are all-or-nothing.
//!
//! Token values never appear in logs or error messages.

use crate::error::{AuthError, Result};
use crate::types::{
    decode_expiry, encode_expiry, Session, ACCESS_TOKEN_KEY, EXPIRES_AT_KEY, REFRESH_TOKEN_KEY,
    SESSION_KEYS,
};
use bridge_traits::storage::CredentialStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn CredentialStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Read the whole triple with a single `multi_get`.
    ///
    /// Empty strings count as absent. An expiry that does not parse is
    /// reported as already expired so the token cannot be trusted forever.
    pub async fn read(&self) -> Result<Session> {
        let values = self.store.multi_get(&SESSION_KEYS).await.map_err(|e| {
            warn!(error = %e, "Failed to read session from credential store");
            AuthError::Storage(e.to_string())
        })?;

        let mut session = Session::default();
        for (key, value) in values {
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };

            match key.as_str() {
                ACCESS_TOKEN_KEY => session.access_token = Some(value),
                REFRESH_TOKEN_KEY => session.refresh_token = Some(value),
                EXPIRES_AT_KEY => {
                    session.expires_at = Some(decode_expiry(&value).unwrap_or_else(|| {
                        warn!("Stored expiry is not a millisecond timestamp, treating token as expired");
                        DateTime::<Utc>::MIN_UTC
                    }));
                }
                _ => {}
            }
        }

        debug!(
            has_access_token = session.access_token.is_some(),
            has_refresh_token = session.refresh_token.is_some(),
            "Loaded session"
        );
        Ok(session)
    }

    /// Write a complete session as produced by the login flow.
    ///
    /// A missing refresh token is stored as an empty string, which `read`
    /// turns back into `None`.
    pub async fn write_login(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let expires = encode_expiry(expires_at);
        let pairs = [
            (ACCESS_TOKEN_KEY, access_token),
            (REFRESH_TOKEN_KEY, refresh_token.unwrap_or("")),
            (EXPIRES_AT_KEY, expires.as_str()),
        ];

        self.store.multi_set(&pairs).await.map_err(|e| {
            warn!(error = %e, "Failed to persist new session");
            AuthError::Storage(e.to_string())
        })?;

        info!(expires_at = %expires_at, "Stored new session");
        Ok(())
    }

    /// Persist the result of a refresh in one batch.
    ///
    /// The stored refresh token is only replaced when `refresh_token` is
    /// `Some`.
    pub async fn write_refreshed(
        &self,
        access_token: &str,
        expires_at: DateTime<Utc>,
        refresh_token: Option<&str>,
    ) -> Result<()> {
        let expires = encode_expiry(expires_at);
        let mut pairs = vec![
            (ACCESS_TOKEN_KEY, access_token),
            (EXPIRES_AT_KEY, expires.as_str()),
        ];
        if let Some(refresh_token) = refresh_token {
            pairs.push((REFRESH_TOKEN_KEY, refresh_token));
        }

        self.store.multi_set(&pairs).await.map_err(|e| {
            warn!(error = %e, "Failed to persist refreshed tokens");
            AuthError::Storage(e.to_string())
        })?;

        debug!(
            rotated_refresh_token = refresh_token.is_some(),
            expires_at = %expires_at,
            "Stored refreshed tokens"
        );
        Ok(())
    }

    /// Remove all three keys in one batch.
    pub async fn purge(&self) -> Result<()> {
        self.store.multi_remove(&SESSION_KEYS).await.map_err(|e| {
            warn!(error = %e, "Failed to purge session");
            AuthError::Storage(e.to_string())
        })?;

        info!("Session purged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::MemoryCredentialStore;
    use chrono::TimeZone;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[tokio::test]
    async fn test_read_empty_store() {
        let store = SessionStore::new(Arc::new(MemoryCredentialStore::new()));
        let session = store.read().await.unwrap();
        assert!(session.is_empty());
    }

    #[tokio::test]
    async fn test_login_write_and_read() {
        let backing = Arc::new(MemoryCredentialStore::new());
        let store = SessionStore::new(backing.clone());

        store
            .write_login("A1", Some("R1"), at(1_700_000_000_000))
            .await
            .unwrap();

        let raw = backing.snapshot().await;
        assert_eq!(raw.get("token").map(String::as_str), Some("A1"));
        assert_eq!(raw.get("refreshToken").map(String::as_str), Some("R1"));
        assert_eq!(
            raw.get("expirationDate").map(String::as_str),
            Some("1700000000000")
        );

        let session = store.read().await.unwrap();
        assert_eq!(session.access_token.as_deref(), Some("A1"));
        assert_eq!(session.refresh_token.as_deref(), Some("R1"));
        assert_eq!(session.expires_at, Some(at(1_700_000_000_000)));
    }

    #[tokio::test]
    async fn test_login_without_refresh_token_reads_back_as_none() {
        let backing = Arc::new(MemoryCredentialStore::new());
        let store = SessionStore::new(backing.clone());

        store.write_login("A1", None, at(5_000)).await.unwrap();

        assert_eq!(
            backing.get("refreshToken").await.unwrap().as_deref(),
            Some("")
        );
        assert_eq!(store.read().await.unwrap().refresh_token, None);
    }

    #[tokio::test]
    async fn test_write_refreshed_keeps_old_refresh_token() {
        let backing = Arc::new(MemoryCredentialStore::with_entries([
            ("token", "A1"),
            ("refreshToken", "R1"),
            ("expirationDate", "1000"),
        ]));
        let store = SessionStore::new(backing);

        store.write_refreshed("A2", at(9_000), None).await.unwrap();

        let session = store.read().await.unwrap();
        assert_eq!(session.access_token.as_deref(), Some("A2"));
        assert_eq!(session.refresh_token.as_deref(), Some("R1"));
        assert_eq!(session.expires_at, Some(at(9_000)));
    }

    #[tokio::test]
    async fn test_write_refreshed_rotates_refresh_token() {
        let backing = Arc::new(MemoryCredentialStore::with_entries([
            ("token", "A1"),
            ("refreshToken", "R1"),
        ]));
        let store = SessionStore::new(backing);

        store
            .write_refreshed("A2", at(9_000), Some("R2"))
            .await
            .unwrap();

        assert_eq!(
            store.read().await.unwrap().refresh_token.as_deref(),
            Some("R2")
        );
    }

    #[tokio::test]
    async fn test_corrupted_expiry_reads_as_expired() {
        let store = SessionStore::new(Arc::new(MemoryCredentialStore::with_entries([
            ("token", "A1"),
            ("expirationDate", "Tue Oct 13 2026"),
        ])));

        let session = store.read().await.unwrap();
        assert_eq!(session.expires_at, Some(DateTime::<Utc>::MIN_UTC));
    }

    #[tokio::test]
    async fn test_purge_removes_only_session_keys() {
        let backing = Arc::new(MemoryCredentialStore::with_entries([
            ("token", "A1"),
            ("refreshToken", "R1"),
            ("expirationDate", "1000"),
            ("theme", "dark"),
        ]));
        let store = SessionStore::new(backing.clone());

        store.purge().await.unwrap();

        let remaining = backing.snapshot().await;
        assert_eq!(remaining.len(), 1);
        assert!(remaining.contains_key("theme"));
    }

    struct UnavailableStore;

    #[async_trait]
    impl CredentialStore for UnavailableStore {
        async fn get(&self, _key: &str) -> BridgeResult<Option<String>> {
            Err(BridgeError::NotAvailable("locked".to_string()))
        }

        async fn multi_get(&self, _keys: &[&str]) -> BridgeResult<Vec<(String, Option<String>)>> {
            Err(BridgeError::NotAvailable("locked".to_string()))
        }

        async fn multi_set(&self, _pairs: &[(&str, &str)]) -> BridgeResult<()> {
            Err(BridgeError::NotAvailable("locked".to_string()))
        }

        async fn multi_remove(&self, _keys: &[&str]) -> BridgeResult<()> {
            Err(BridgeError::NotAvailable("locked".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failures_map_to_storage_error() {
        let store = SessionStore::new(Arc::new(UnavailableStore));

        assert!(matches!(store.read().await, Err(AuthError::Storage(_))));
        assert!(matches!(
            store.write_login("A1", None, at(0)).await,
            Err(AuthError::Storage(_))
        ));
        assert!(matches!(store.purge().await, Err(AuthError::Storage(_))));
    }
}
