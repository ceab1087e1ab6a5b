//! Core service façade and bootstrap helpers.
//!
//! This crate wires the host-provided bridges (HTTP, credential storage,
//! clock) into the session core and exposes the calls the client screens
//! make. Desktop apps typically enable the `desktop-shims` feature, which
//! supplies the keychain store and the reqwest client.

pub mod endpoints;
pub mod error;
pub mod loaders;

pub use endpoints::{scope_string, EndpointRequest, SpotifyEndpoint, SPOTIFY_CLIENT_ID, SPOTIFY_SCOPES};
pub use error::{CoreError, Result};
pub use loaders::{Dashboard, Profile};

use std::sync::Arc;

use core_auth::{
    AuthenticatedClient, CallOptions, LoginTokens, SessionInvalidationHook, SessionStatus,
    TimeRange,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus};
use serde_json::Value;
use tokio::sync::broadcast::Receiver;
use tracing::info;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    client: Arc<AuthenticatedClient>,
    event_bus: EventBus,
}

impl CoreService {
    /// Create a service from a validated configuration.
    ///
    /// `hook` is called when the session ends involuntarily (revoked token,
    /// failed refresh).
    pub fn new(config: CoreConfig, hook: Option<Arc<dyn SessionInvalidationHook>>) -> Self {
        let event_bus = EventBus::new(config.event_buffer_size);
        let client = Arc::new(AuthenticatedClient::new(&config, event_bus.clone(), hook));

        info!(
            api_base_url = %config.api_base_url,
            max_attempts = config.retry_policy.max_attempts,
            "Core service initialized"
        );

        Self { client, event_bus }
    }

    /// Subscribe to auth and API events.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn client(&self) -> Arc<AuthenticatedClient> {
        Arc::clone(&self.client)
    }

    /// Persist tokens from a completed login.
    pub async fn sign_in(&self, tokens: LoginTokens) -> Result<()> {
        self.client.establish_session(&tokens).await?;
        Ok(())
    }

    pub async fn sign_out(&self) -> Result<()> {
        Ok(self.client.sign_out().await?)
    }

    /// Cached-session check for silent login on startup. No network I/O.
    pub async fn session_status(&self) -> Result<SessionStatus> {
        Ok(self.client.session_status().await?)
    }

    /// Authenticated call against any endpoint.
    pub async fn call(&self, endpoint: &str, options: CallOptions) -> Result<Value> {
        Ok(self.client.call(endpoint, options).await?)
    }

    /// Top tracks, top artists and recently played for the home screen.
    pub async fn load_dashboard(&self, range: TimeRange) -> Result<Dashboard> {
        loaders::load_dashboard(&self.client, &self.event_bus, range).await
    }

    /// Profile plus library counters for the profile screen.
    pub async fn load_profile(&self) -> Result<Profile> {
        loaders::load_profile(&self.client, &self.event_bus).await
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// Uses the OS keychain for the session and reqwest for HTTP.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # async fn example() -> core_service::Result<()> {
/// use core_service::bootstrap_desktop;
///
/// let core = bootstrap_desktop(None)?;
/// let status = core.session_status().await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(hook: Option<Arc<dyn SessionInvalidationHook>>) -> Result<CoreService> {
    let config = CoreConfig::builder().client_id(SPOTIFY_CLIENT_ID).build()?;
    Ok(CoreService::new(config, hook))
}
