//! # Core Configuration Module
//!
//! Builder-based configuration for the session core.
//!
//! ## Required Dependencies
//!
//! - `client_id` - OAuth client identifier registered with the provider
//! - `CredentialStore` - Session persistence (desktop default: OS keychain)
//! - `HttpClient` - Token and API requests (desktop default: reqwest)
//!
//! ## Optional Settings (with defaults)
//!
//! - `Clock` - `SystemClock`
//! - token endpoint and API base URL - Spotify production endpoints
//! - retry policy - 3 attempts, 200 ms base delay
//! - request timeout - 30 seconds
//!
//! When the `desktop-shims` feature is enabled, desktop adapters are injected
//! for any missing bridge.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use bridge_traits::MemoryCredentialStore;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .client_id("602ac32e57a3499bbc9d6cebd5418250")
//!     .credential_store(Arc::new(MemoryCredentialStore::new()))
//!     .http_client(Arc::new(MyHttpClient))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! `build()` fails fast with [`Error::CapabilityMissing`] when a bridge is
//! missing and [`Error::Config`] when a setting is invalid.

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, CredentialStore, HttpClient, RetryPolicy, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Spotify accounts service token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Spotify Web API base. The trailing slash matters for relative joins.
pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1/";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Core configuration for the session core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// OAuth client identifier sent with refresh requests
    pub client_id: String,

    /// Token endpoint used for refresh-token exchanges
    pub token_url: String,

    /// Base URL that relative API endpoints are joined onto
    pub api_base_url: Url,

    /// Session persistence (required)
    pub credential_store: Arc<dyn CredentialStore>,

    /// Outbound HTTP (required)
    pub http_client: Arc<dyn HttpClient>,

    /// Time source for expiry decisions
    pub clock: Arc<dyn Clock>,

    /// Retry policy for transient API failures
    pub retry_policy: RetryPolicy,

    /// Per-request timeout passed to the transport
    pub request_timeout: Duration,

    /// Event bus buffer per subscriber
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("client_id", &self.client_id)
            .field("token_url", &self.token_url)
            .field("api_base_url", &self.api_base_url.as_str())
            .field("credential_store", &"CredentialStore { ... }")
            .field("http_client", &"HttpClient { ... }")
            .field("retry_policy", &self.retry_policy)
            .field("request_timeout", &self.request_timeout)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - Client id is not blank
    /// - Token endpoint and API base are absolute http(s) URLs
    /// - Retry policy performs at least one attempt
    /// - Timeout and event buffer are non-zero
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config("Client id cannot be empty".to_string()));
        }

        let token_url = parse_http_url("token_url", &self.token_url)?;
        if token_url.query().is_some() {
            return Err(Error::Config(
                "token_url must not carry a query string".to_string(),
            ));
        }

        check_scheme("api_base_url", &self.api_base_url)?;

        if self.retry_policy.max_attempts == 0 {
            return Err(Error::Config(
                "Retry policy must allow at least one attempt".to_string(),
            ));
        }

        if self.retry_policy.base_delay > self.retry_policy.max_delay {
            return Err(Error::Config(
                "Retry base delay cannot exceed the maximum delay".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_http_url(field: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value)
        .map_err(|e| Error::Config(format!("{} is not a valid URL ({}): {}", field, value, e)))?;
    check_scheme(field, &url)?;
    Ok(url)
}

fn check_scheme(field: &str, url: &Url) -> Result<()> {
    match url.scheme() {
        "https" | "http" => Ok(()),
        other => Err(Error::Config(format!(
            "{} must use http or https, got '{}'",
            field, other
        ))),
    }
}

/// Ensure the base ends in `/` so `Url::join` appends instead of replacing
/// the last path segment.
fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(not(feature = "desktop-shims"))]
fn credential_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "CredentialStore".to_string(),
        message: "CredentialStore implementation is required for session persistence. \
                 Desktop: enable the 'desktop-shims' feature to use the keychain-backed store. \
                 Mobile: inject the platform store (Keychain/Keystore/AsyncStorage)."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for token refresh and API calls. \
                 Desktop: enable the 'desktop-shims' feature to use the reqwest client. \
                 Mobile: inject the platform-native adapter."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_credential_store() -> Result<Arc<dyn CredentialStore>> {
    use bridge_desktop::KeyringCredentialStore;

    let store: Arc<dyn CredentialStore> = Arc::new(KeyringCredentialStore::new());
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_credential_store() -> Result<Arc<dyn CredentialStore>> {
    Err(credential_store_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout).map_err(|e| Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: format!("Failed to create the default reqwest client: {}", e),
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    client_id: Option<String>,
    token_url: Option<String>,
    api_base_url: Option<String>,
    credential_store: Option<Arc<dyn CredentialStore>>,
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    retry_policy: Option<RetryPolicy>,
    request_timeout: Option<Duration>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the OAuth client id (required).
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Overrides the token endpoint.
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Overrides the API base URL.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Sets the credential store implementation (required).
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credential_store = Some(store);
        self
    }

    /// Sets the HTTP client implementation (required).
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when the client id is missing or a setting is invalid
    /// - [`Error::CapabilityMissing`] when a required bridge is absent and no
    ///   desktop default is compiled in
    pub fn build(self) -> Result<CoreConfig> {
        let client_id = self.client_id.ok_or_else(|| {
            Error::Config("Client id is required. Use .client_id() to set it.".to_string())
        })?;

        let api_base_url = parse_http_url(
            "api_base_url",
            self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL),
        )
        .map(normalize_base)?;

        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let credential_store = match self.credential_store {
            Some(store) => store,
            None => provide_default_credential_store()?,
        };

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let config = CoreConfig {
            client_id,
            token_url: self
                .token_url
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            api_base_url,
            credential_store,
            http_client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            retry_policy: self.retry_policy.unwrap_or_default(),
            request_timeout,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
