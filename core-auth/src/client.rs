//! # Authenticated Request Wrapper
//!
//! Single entry point for calls to the resource API. Every call:
//!
//! 1. obtains a valid access token from the [`TokenLifecycleManager`],
//! 2. sends the request with `Authorization: Bearer <token>`,
//! 3. classifies the outcome.
//!
//! | Outcome                      | Result                         | Session        |
//! |------------------------------|--------------------------------|----------------|
//! | 2xx                          | parsed JSON body               | untouched      |
//! | 401                          | [`ApiError::AuthExpired`]      | purged, hook   |
//! | token could not be obtained  | [`ApiError::AuthExpired`]      | purged, hook   |
//! | anything else                | [`ApiError::Remote`]           | untouched      |
//!
//! A 401 is never retried. Transient failures (no response, 429, 5xx) are
//! retried with exponential backoff per the configured [`RetryPolicy`].

use crate::error::{ApiError, ApiResult, AuthError};
use crate::invalidation::{SessionInvalidationHook, SessionInvalidator};
use crate::manager::TokenLifecycleManager;
use crate::refresh::{truncate, RefreshExecutor, ERROR_BODY_LIMIT};
use crate::session_store::SessionStore;
use crate::types::{InvalidationReason, LoginTokens, ResponseClass, SessionStatus};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, RetryPolicy};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_runtime::config::CoreConfig;
use core_runtime::events::{ApiEvent, CoreEvent, EventBus};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

const AUTHORIZATION: &str = "Authorization";

/// Per-call request options. Defaults to a bare `GET`.
///
/// An `Authorization` header in `headers` is ignored.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub method: HttpMethod,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            method: HttpMethod::Get,
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
        }
    }
}

impl CallOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

pub struct AuthenticatedClient {
    manager: TokenLifecycleManager,
    invalidator: SessionInvalidator,
    http_client: Arc<dyn HttpClient>,
    base_url: Url,
    retry_policy: RetryPolicy,
    request_timeout: Duration,
    event_bus: EventBus,
}

impl AuthenticatedClient {
    /// Wire the session core from a validated configuration.
    pub fn new(
        config: &CoreConfig,
        event_bus: EventBus,
        hook: Option<Arc<dyn SessionInvalidationHook>>,
    ) -> Self {
        let store = SessionStore::new(Arc::clone(&config.credential_store));
        let executor = Arc::new(RefreshExecutor::new(
            Arc::clone(&config.http_client),
            store.clone(),
            Arc::clone(&config.clock),
            config.token_url.clone(),
            config.client_id.clone(),
            config.request_timeout,
        ));
        let manager = TokenLifecycleManager::new(
            store.clone(),
            executor,
            Arc::clone(&config.clock),
            event_bus.clone(),
        );
        let invalidator = SessionInvalidator::new(store, hook, event_bus.clone());

        Self {
            manager,
            invalidator,
            http_client: Arc::clone(&config.http_client),
            base_url: config.api_base_url.clone(),
            retry_policy: config.retry_policy.clone(),
            request_timeout: config.request_timeout,
            event_bus,
        }
    }

    /// Perform an authenticated call and return the parsed JSON body.
    ///
    /// `endpoint` is either relative to the API base (`/me/top/tracks`) or
    /// an absolute http(s) URL, such as a pagination `next` link.
    ///
    /// An empty 2xx body yields [`Value::Null`].
    #[instrument(skip(self, options), fields(method = options.method.as_str()))]
    pub async fn call(&self, endpoint: &str, options: CallOptions) -> ApiResult<Value> {
        let url = self.resolve(endpoint, &options.query)?;
        let body = match &options.body {
            Some(value) => Some(Bytes::from(serde_json::to_vec(value).map_err(|e| {
                ApiError::InvalidEndpoint {
                    endpoint: endpoint.to_string(),
                    message: format!("Request body could not be encoded: {}", e),
                }
            })?)),
            None => None,
        };

        let epoch = self.invalidator.epoch();
        let mut attempt = 1;

        loop {
            let token = self.token_or_expire(epoch).await?;

            match self.send_once(&url, &token, &options, body.clone()).await {
                Ok(value) => return Ok(value),
                Err(ApiError::AuthExpired { reason, source }) => {
                    self.invalidator.invalidate(reason, epoch).await;
                    return Err(ApiError::AuthExpired { reason, source });
                }
                Err(e) if e.is_retryable() && attempt < self.retry_policy.max_attempts => {
                    let delay = self.retry_policy.delay_for_attempt(attempt);
                    warn!(
                        endpoint,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    let _ = self.event_bus.emit(CoreEvent::Api(ApiEvent::RequestRetrying {
                        endpoint: endpoint.to_string(),
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                    }));
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(endpoint, attempt, error = %e, "Request failed");
                    let _ = self.event_bus.emit(CoreEvent::Api(ApiEvent::RequestFailed {
                        endpoint: endpoint.to_string(),
                        status: e.status(),
                        attempts: attempt,
                    }));
                    return Err(e);
                }
            }
        }
    }

    /// Convenience for `call(endpoint, CallOptions::get())`.
    pub async fn get(&self, endpoint: &str) -> ApiResult<Value> {
        self.call(endpoint, CallOptions::get()).await
    }

    /// Store the tokens produced by the login flow.
    ///
    /// Starts a new session epoch: calls still in flight for the previous
    /// session can no longer invalidate this one.
    pub async fn establish_session(
        &self,
        tokens: &LoginTokens,
    ) -> crate::error::Result<DateTime<Utc>> {
        self.invalidator
            .begin_session(self.manager.establish_session(tokens))
            .await
    }

    pub async fn session_status(&self) -> crate::error::Result<SessionStatus> {
        self.manager.session_status().await
    }

    /// A valid access token, refreshing if needed. Does not invalidate.
    pub async fn access_token(&self) -> crate::error::Result<String> {
        self.manager.get_valid_token().await
    }

    /// Discard the session without notifying the invalidation hook.
    pub async fn sign_out(&self) -> crate::error::Result<()> {
        info!("Signing out");
        self.manager.clear_in_flight().await;
        self.invalidator.sign_out().await
    }

    async fn token_or_expire(&self, epoch: u64) -> ApiResult<String> {
        match self.manager.get_valid_token().await {
            Ok(token) => Ok(token),
            Err(e) => {
                let reason = e.invalidation_reason();
                warn!(error = %e, reason = %reason, "No usable access token");
                self.invalidator.invalidate(reason, epoch).await;
                Err(ApiError::from(e))
            }
        }
    }

    async fn send_once(
        &self,
        url: &Url,
        token: &str,
        options: &CallOptions,
        body: Option<Bytes>,
    ) -> ApiResult<Value> {
        let mut request = HttpRequest::new(options.method, url.as_str())
            .header("Accept", "application/json")
            .timeout(self.request_timeout);
        for (key, value) in &options.headers {
            if key.eq_ignore_ascii_case(AUTHORIZATION) {
                debug!("Ignoring caller-supplied Authorization header");
                continue;
            }
            request = request.header(key.clone(), value.clone());
        }
        if let Some(body) = body {
            request = request
                .header("Content-Type", "application/json")
                .body(body);
        }
        // Always last: the session token is the only credential sent.
        let request = request.bearer_token(token);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(ApiError::transport)?;

        match ResponseClass::from_status(response.status) {
            ResponseClass::Success => {
                debug!(status = response.status, "Request succeeded");
                if response.body.iter().all(u8::is_ascii_whitespace) {
                    return Ok(Value::Null);
                }
                response.json::<Value>().map_err(|e| {
                    ApiError::remote_status(
                        response.status,
                        format!("Response body is not valid JSON: {}", e),
                    )
                })
            }
            ResponseClass::Unauthorized => {
                warn!("Access token rejected by the API");
                Err(ApiError::AuthExpired {
                    reason: InvalidationReason::Unauthorized,
                    source: None,
                })
            }
            ResponseClass::OtherError => {
                let message = response
                    .text()
                    .map(|text| truncate(&text, ERROR_BODY_LIMIT))
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                Err(ApiError::remote_status(response.status, message))
            }
        }
    }

    fn resolve(&self, endpoint: &str, query: &[(String, String)]) -> ApiResult<Url> {
        resolve_endpoint(&self.base_url, endpoint, query)
    }
}

fn resolve_endpoint(base: &Url, endpoint: &str, query: &[(String, String)]) -> ApiResult<Url> {
    let invalid = |message: String| ApiError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message,
    };

    let mut url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?
    } else {
        let relative = endpoint.trim_start_matches('/');
        if relative.is_empty() {
            return Err(invalid("Endpoint path is empty".to_string()));
        }
        base.join(relative).map_err(|e| invalid(e.to_string()))?
    };

    if !query.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    Ok(url)
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::AuthExpired {
            reason: e.invalidation_reason(),
            source: Some(e),
        }
    }
}
