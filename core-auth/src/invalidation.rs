//! Session invalidation.
//!
//! Discards the stored session and tells the application, exactly once per
//! session, that the user has to sign in again.
//!
//! Each call site records the session epoch it started under. Only the first
//! invalidation for a given epoch purges and notifies; later callers that
//! observed the same epoch are no-ops. The epoch advances on every
//! invalidation, sign-out and login.

use crate::session_store::SessionStore;
use crate::types::InvalidationReason;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

/// Application callback fired when a session ends involuntarily.
///
/// Typically routes the UI back to the login screen. The cause is published
/// as [`AuthEvent::SessionInvalidated`].
pub trait SessionInvalidationHook: Send + Sync {
    fn on_session_invalidated(&self);
}

impl<F> SessionInvalidationHook for F
where
    F: Fn() + Send + Sync,
{
    fn on_session_invalidated(&self) {
        self()
    }
}

pub struct SessionInvalidator {
    store: SessionStore,
    hook: Option<Arc<dyn SessionInvalidationHook>>,
    event_bus: EventBus,
    gate: Mutex<()>,
    epoch: AtomicU64,
}

impl SessionInvalidator {
    pub fn new(
        store: SessionStore,
        hook: Option<Arc<dyn SessionInvalidationHook>>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            hook,
            event_bus,
            gate: Mutex::new(()),
            epoch: AtomicU64::new(0),
        }
    }

    /// Current session epoch. Capture before a call, pass to [`invalidate`].
    ///
    /// [`invalidate`]: SessionInvalidator::invalidate
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Purge the session and notify, unless the session seen at
    /// `observed_epoch` was already invalidated.
    ///
    /// Returns `true` when this call performed the invalidation. A purge
    /// failure is logged; the hook still runs.
    pub async fn invalidate(&self, reason: InvalidationReason, observed_epoch: u64) -> bool {
        let _gate = self.gate.lock().await;

        if self.epoch.load(Ordering::Acquire) != observed_epoch {
            debug!(reason = %reason, "Session already invalidated, skipping");
            return false;
        }

        warn!(reason = %reason, "Invalidating session");
        if let Err(e) = self.store.purge().await {
            error!(error = %e, "Failed to purge session during invalidation");
        }

        self.epoch.fetch_add(1, Ordering::AcqRel);

        if let Some(hook) = &self.hook {
            hook.on_session_invalidated();
        }
        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::SessionInvalidated {
                reason: reason.to_string(),
            }));

        true
    }

    /// Run `write` as the start of a new session.
    ///
    /// The epoch advances once `write` completes, under the same gate as
    /// [`invalidate`], so a late 401 from the previous session cannot purge
    /// the new one.
    ///
    /// [`invalidate`]: SessionInvalidator::invalidate
    pub async fn begin_session<F, T>(&self, write: F) -> T
    where
        F: Future<Output = T>,
    {
        let _gate = self.gate.lock().await;
        let result = write.await;
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(epoch, "Began new session epoch");
        result
    }

    /// Explicit sign-out. Purges and advances the epoch without calling the
    /// hook, since the user asked for it.
    pub async fn sign_out(&self) -> crate::error::Result<()> {
        let _gate = self.gate.lock().await;

        let result = self.store.purge().await;
        self.epoch.fetch_add(1, Ordering::AcqRel);
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedOut));

        result
    }
}
