//! Refresh-token exchange.
//!
//! Posts `grant_type=refresh_token` to the token endpoint, persists the
//! result in one batch and, on any failure, discards the stored session.

use crate::error::{AuthError, Result};
use crate::session_store::SessionStore;
use crate::types::{expiry_after, DEFAULT_EXPIRES_IN_SECS};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Upper bound on how much of an error body ends up in messages.
pub(crate) const ERROR_BODY_LIMIT: usize = 256;

#[derive(Debug, Serialize)]
struct RefreshForm<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
    client_id: &'a str,
}

/// Token endpoint response. Only the fields the session needs.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

fn default_expires_in() -> i64 {
    DEFAULT_EXPIRES_IN_SECS
}

/// A freshly issued access token.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for RefreshedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshedToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

pub struct RefreshExecutor {
    http_client: Arc<dyn HttpClient>,
    store: SessionStore,
    clock: Arc<dyn Clock>,
    token_url: String,
    client_id: String,
    request_timeout: Duration,
}

impl RefreshExecutor {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        store: SessionStore,
        clock: Arc<dyn Clock>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            store,
            clock,
            token_url: token_url.into(),
            client_id: client_id.into(),
            request_timeout,
        }
    }

    /// Exchange `refresh_token` for a new access token.
    ///
    /// On success the new access token, its expiry and (if the provider
    /// rotated it) the new refresh token are written in one `multi_set`.
    /// On failure all session keys are removed and
    /// [`AuthError::RefreshFailed`] is returned with the cause.
    #[instrument(skip(self, refresh_token), fields(token_url = %self.token_url))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken> {
        match self.exchange_and_store(refresh_token).await {
            Ok(refreshed) => Ok(refreshed),
            Err(e) => {
                if let Err(purge_error) = self.store.purge().await {
                    error!(error = %purge_error, "Failed to purge session after refresh failure");
                }
                Err(e)
            }
        }
    }

    async fn exchange_and_store(&self, refresh_token: &str) -> Result<RefreshedToken> {
        let form = RefreshForm {
            grant_type: "refresh_token",
            refresh_token,
            client_id: &self.client_id,
        };
        let body = serde_urlencoded::to_string(&form).map_err(|e| AuthError::RefreshFailed {
            status: None,
            reason: format!("Failed to encode token request: {}", e),
        })?;

        let request = HttpRequest::new(HttpMethod::Post, self.token_url.clone())
            .header("Accept", "application/json")
            .form_encoded(body)
            .timeout(self.request_timeout);

        let response = self.http_client.execute(request).await.map_err(|e| {
            warn!(error = %e, "Token endpoint unreachable");
            AuthError::RefreshFailed {
                status: None,
                reason: format!("Token endpoint unreachable: {}", e),
            }
        })?;

        if !response.is_success() {
            let status = response.status;
            let body = response
                .text()
                .map(|text| truncate(&text, ERROR_BODY_LIMIT))
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            warn!(status, error = %body, "Token endpoint rejected refresh");
            return Err(AuthError::RefreshFailed {
                status: Some(status),
                reason: format!("Token endpoint returned {}: {}", status, body),
            });
        }

        let token_response: TokenResponse = response.json().map_err(|e| {
            warn!(error = %e, "Token endpoint returned an unreadable body");
            AuthError::RefreshFailed {
                status: Some(response.status),
                reason: format!("Failed to parse token response: {}", e),
            }
        })?;

        if token_response.access_token.is_empty() {
            return Err(AuthError::RefreshFailed {
                status: Some(response.status),
                reason: "Token response carried an empty access token".to_string(),
            });
        }

        let expires_at = expiry_after(self.clock.now(), token_response.expires_in);
        let rotated = token_response
            .refresh_token
            .as_deref()
            .filter(|token| !token.is_empty());

        self.store
            .write_refreshed(&token_response.access_token, expires_at, rotated)
            .await
            .map_err(|e| AuthError::RefreshFailed {
                status: None,
                reason: format!("Refreshed tokens could not be stored: {}", e),
            })?;

        info!(
            expires_in = token_response.expires_in,
            rotated_refresh_token = rotated.is_some(),
            "Access token refreshed"
        );

        Ok(RefreshedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }
}

pub(crate) fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpResponse;
    use bridge_traits::storage::CredentialStore;
    use bridge_traits::MemoryCredentialStore;
    use chrono::TimeZone;
    use mockall::mock;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    fn seeded_store() -> Arc<MemoryCredentialStore> {
        Arc::new(MemoryCredentialStore::with_entries([
            ("token", "A1"),
            ("refreshToken", "R1"),
            ("expirationDate", "1699999999000"),
        ]))
    }

    fn executor(http: MockHttpClient, backing: Arc<MemoryCredentialStore>) -> RefreshExecutor {
        RefreshExecutor::new(
            Arc::new(http),
            SessionStore::new(backing),
            Arc::new(FixedClock(now())),
            "https://accounts.example.com/api/token",
            "client-123",
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn test_refresh_posts_form_and_persists() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| {
                request.method == HttpMethod::Post
                    && request.url == "https://accounts.example.com/api/token"
                    && request.header_value("content-type")
                        == Some("application/x-www-form-urlencoded")
                    && request.body.as_deref()
                        == Some(
                            &b"grant_type=refresh_token&refresh_token=R1&client_id=client-123"[..],
                        )
            })
            .times(1)
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"access_token":"A2","token_type":"Bearer","expires_in":3600}"#,
                ))
            });

        let backing = seeded_store();
        let refreshed = executor(http, backing.clone()).refresh("R1").await.unwrap();

        assert_eq!(refreshed.access_token, "A2");
        assert_eq!(refreshed.expires_at, now() + chrono::Duration::seconds(3600));

        let raw = backing.snapshot().await;
        assert_eq!(raw.get("token").map(String::as_str), Some("A2"));
        assert_eq!(raw.get("refreshToken").map(String::as_str), Some("R1"));
        assert_eq!(
            raw.get("expirationDate").map(String::as_str),
            Some("1700003600000")
        );
    }

    #[tokio::test]
    async fn test_refresh_stores_rotated_refresh_token() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse::new(
                200,
                r#"{"access_token":"A2","expires_in":60,"refresh_token":"R2"}"#,
            ))
        });

        let backing = seeded_store();
        executor(http, backing.clone()).refresh("R1").await.unwrap();

        assert_eq!(
            backing.get("refreshToken").await.unwrap().as_deref(),
            Some("R2")
        );
    }

    #[tokio::test]
    async fn test_missing_expires_in_uses_provider_default() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, r#"{"access_token":"A2"}"#)));

        let refreshed = executor(http, seeded_store()).refresh("R1").await.unwrap();
        assert_eq!(
            refreshed.expires_at,
            now() + chrono::Duration::seconds(DEFAULT_EXPIRES_IN_SECS)
        );
    }

    #[tokio::test]
    async fn test_rejected_refresh_purges_session() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse::new(
                400,
                r#"{"error":"invalid_grant","error_description":"Refresh token revoked"}"#,
            ))
        });

        let backing = seeded_store();
        let err = executor(http, backing.clone())
            .refresh("R1")
            .await
            .unwrap_err();

        match err {
            AuthError::RefreshFailed { status, reason } => {
                assert_eq!(status, Some(400));
                assert!(reason.contains("invalid_grant"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(backing.is_empty().await);
    }

    #[tokio::test]
    async fn test_transport_failure_purges_session() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Transport("connection reset".to_string())));

        let backing = seeded_store();
        let err = executor(http, backing.clone())
            .refresh("R1")
            .await
            .unwrap_err();

        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("connection reset"));
        assert!(backing.is_empty().await);
    }

    #[tokio::test]
    async fn test_unparseable_success_body_is_a_failure() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "<html>maintenance</html>")));

        let backing = seeded_store();
        let err = executor(http, backing.clone())
            .refresh("R1")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::RefreshFailed { status: Some(200), .. }));
        assert!(backing.is_empty().await);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }
}
