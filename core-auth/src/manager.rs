//! # Token Lifecycle Manager
//!
//! Decides whether the stored access token is usable and, when it is not,
//! drives a single shared refresh.
//!
//! ## Decision order
//!
//! 1. One `multi_get` of the session triple.
//! 2. No access token: [`AuthError::NoSession`].
//! 3. No expiry, or `now < expires_at`: the cached token, without network I/O.
//! 4. Expired without refresh token: [`AuthError::RefreshFailed`], without
//!    network I/O.
//! 5. Otherwise the refresh executor runs and its result is returned.
//!
//! ## Single flight
//!
//! At most one refresh is in flight. The first expired caller installs a
//! shared future; concurrent callers await the same future and observe the
//! same outcome. Every caller re-reads the session under the guard, so one
//! that raced a completed refresh reuses its token instead of replaying a
//! possibly rotated refresh token.
//!
//! The in-flight slot is tagged with the refresh token it exchanges. A slot
//! left behind by a cancelled caller is only joined while the stored refresh
//! token still matches; after a new login it is replaced. Signing in and
//! signing out also clear the slot.
//!
//! Unexpired reads never touch the guard.

use crate::error::{AuthError, Result};
use crate::refresh::RefreshExecutor;
use crate::session_store::SessionStore;
use crate::types::{expiry_after, LoginTokens, SessionStatus};
use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

type SharedRefresh = Shared<BoxFuture<'static, Result<String>>>;

struct InFlight {
    refresh_token: String,
    refresh: SharedRefresh,
}

pub struct TokenLifecycleManager {
    store: SessionStore,
    executor: Arc<RefreshExecutor>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    in_flight: Mutex<Option<InFlight>>,
}

/// What a session snapshot allows the caller to do next.
enum Next {
    Use(String),
    Refresh(String),
}

impl TokenLifecycleManager {
    pub fn new(
        store: SessionStore,
        executor: Arc<RefreshExecutor>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            executor,
            clock,
            event_bus,
            in_flight: Mutex::new(None),
        }
    }

    /// Return an access token that is valid right now, refreshing if needed.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NoSession`] if no access token is stored
    /// - [`AuthError::RefreshFailed`] if the token is expired and no refresh
    ///   token exists, or the exchange failed (the session is purged)
    /// - [`AuthError::Storage`] if the credential store cannot be read
    #[instrument(skip(self))]
    pub async fn get_valid_token(&self) -> Result<String> {
        match self.next_step().await? {
            Next::Use(token) => {
                debug!("Cached access token is valid");
                Ok(token)
            }
            Next::Refresh(_) => self.refresh_single_flight().await,
        }
    }

    /// Current lifecycle state without any network I/O.
    pub async fn session_status(&self) -> Result<SessionStatus> {
        let session = self.store.read().await?;
        Ok(session.status_at(self.clock.now()))
    }

    /// Persist the tokens issued by the login flow.
    ///
    /// Returns the computed expiry.
    #[instrument(skip(self, tokens))]
    pub async fn establish_session(&self, tokens: &LoginTokens) -> Result<DateTime<Utc>> {
        if tokens.access_token.is_empty() {
            return Err(AuthError::NoSession);
        }

        let expires_at = expiry_after(self.clock.now(), tokens.expires_in);
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .filter(|token| !token.is_empty());

        self.clear_in_flight().await;
        self.store
            .write_login(&tokens.access_token, refresh_token, expires_at)
            .await?;

        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedIn {
            expires_at: expires_at.timestamp_millis(),
        }));

        Ok(expires_at)
    }

    /// Drop any in-flight refresh so the next expired caller starts over.
    pub async fn clear_in_flight(&self) {
        if self.in_flight.lock().await.take().is_some() {
            debug!("Discarded in-flight token refresh");
        }
    }

    async fn next_step(&self) -> Result<Next> {
        let session = self.store.read().await?;
        let now = self.clock.now();

        match session.status_at(now) {
            SessionStatus::NoSession => Err(AuthError::NoSession),
            SessionStatus::Valid { .. } => session
                .access_token
                .map(Next::Use)
                .ok_or(AuthError::NoSession),
            SessionStatus::Expired { refreshable: false } => {
                warn!("Access token expired and no refresh token is stored");
                let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::AuthError {
                    message: "Access token expired and no refresh token is stored".to_string(),
                    recoverable: false,
                }));
                Err(AuthError::RefreshFailed {
                    status: None,
                    reason: "Access token expired and no refresh token is stored".to_string(),
                })
            }
            SessionStatus::Expired { refreshable: true } => session
                .refresh_token
                .map(Next::Refresh)
                .ok_or(AuthError::NoSession),
        }
    }

    async fn refresh_single_flight(&self) -> Result<String> {
        let refresh = {
            let mut in_flight = self.in_flight.lock().await;

            // Re-check under the guard: a refresh may have landed since our read.
            let refresh_token = match self.next_step().await? {
                Next::Use(token) => return Ok(token),
                Next::Refresh(refresh_token) => refresh_token,
            };

            let joinable = in_flight
                .as_ref()
                .filter(|existing| existing.refresh_token == refresh_token)
                .map(|existing| existing.refresh.clone());

            match joinable {
                Some(existing) => {
                    debug!("Joining in-flight token refresh");
                    existing
                }
                None => {
                    if in_flight.is_some() {
                        debug!("Replacing in-flight refresh for a previous session");
                    }
                    let refresh = self.start_refresh(refresh_token.clone());
                    *in_flight = Some(InFlight {
                        refresh_token,
                        refresh: refresh.clone(),
                    });
                    refresh
                }
            }
        };

        let result = refresh.clone().await;

        let mut in_flight = self.in_flight.lock().await;
        if in_flight
            .as_ref()
            .is_some_and(|current| current.refresh.ptr_eq(&refresh))
        {
            *in_flight = None;
        }

        result
    }

    fn start_refresh(&self, refresh_token: String) -> SharedRefresh {
        let executor = Arc::clone(&self.executor);
        let event_bus = self.event_bus.clone();

        async move {
            info!("Access token expired, refreshing");
            let _ = event_bus.emit(CoreEvent::Auth(AuthEvent::TokenRefreshing));

            match executor.refresh(&refresh_token).await {
                Ok(refreshed) => {
                    let _ = event_bus.emit(CoreEvent::Auth(AuthEvent::TokenRefreshed {
                        expires_at: refreshed.expires_at.timestamp_millis(),
                    }));
                    Ok(refreshed.access_token)
                }
                Err(e) => {
                    warn!(error = %e, "Token refresh failed");
                    let _ = event_bus.emit(CoreEvent::Auth(AuthEvent::AuthError {
                        message: e.to_string(),
                        recoverable: false,
                    }));
                    Err(e)
                }
            }
        }
        .boxed()
        .shared()
    }
}
