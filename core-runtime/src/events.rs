//! # Event Bus System
//!
//! Broadcasts session and API lifecycle events to any number of subscribers
//! using `tokio::sync::broadcast`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   emit   ┌───────────┐  subscribe  ┌──────────────┐
//! │ Lifecycle manager├─────────>│           ├────────────>│ UI / host    │
//! └──────────────────┘          │ EventBus  │             └──────────────┘
//! ┌──────────────────┐   emit   │           │  subscribe  ┌──────────────┐
//! │ Request wrapper  ├─────────>│           ├────────────>│ Telemetry    │
//! └──────────────────┘          └───────────┘             └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus.emit(CoreEvent::Auth(AuthEvent::TokenRefreshing)).ok();
//! assert!(matches!(
//!     subscriber.try_recv(),
//!     Ok(CoreEvent::Auth(AuthEvent::TokenRefreshing))
//! ));
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: subscriber missed `n` events; it can keep reading.
//! - **`RecvError::Closed`**: all senders dropped; treat as shutdown.
//!
//! Emitting with no subscribers returns `Err`. Producers in this workspace
//! ignore that result: an event nobody listens to is not a failure.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session and token lifecycle
    Auth(AuthEvent),
    /// Outbound API call outcomes
    Api(ApiEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Api(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Auth(AuthEvent::SessionInvalidated { .. }) => EventSeverity::Warning,
            CoreEvent::Api(ApiEvent::RequestFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Api(ApiEvent::BatchDegraded { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SignedIn { .. }) => EventSeverity::Info,
            CoreEvent::Auth(AuthEvent::SignedOut) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events emitted as the stored session changes state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// A new session was stored by the login flow.
    SignedIn {
        /// Expiry of the first access token (Unix epoch milliseconds).
        expires_at: i64,
    },
    /// The user explicitly signed out.
    SignedOut,
    /// An expired access token is being exchanged.
    TokenRefreshing,
    /// Token refresh completed successfully.
    TokenRefreshed {
        /// Expiry of the new access token (Unix epoch milliseconds).
        expires_at: i64,
    },
    /// The stored session was discarded and the user must sign in again.
    SessionInvalidated {
        /// Short machine-readable cause (`unauthorized`, `refresh_failed`, ...).
        reason: String,
    },
    /// Authentication error occurred.
    AuthError {
        message: String,
        /// Whether the error is recoverable without a new login.
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SignedIn { .. } => "Session established",
            AuthEvent::SignedOut => "User signed out",
            AuthEvent::TokenRefreshing => "Refreshing access token",
            AuthEvent::TokenRefreshed { .. } => "Token refreshed successfully",
            AuthEvent::SessionInvalidated { .. } => "Session invalidated",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// API Events
// ============================================================================

/// Events describing authenticated API calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ApiEvent {
    /// A transient failure is being retried.
    RequestRetrying {
        endpoint: String,
        /// Attempt that just failed (1-based).
        attempt: u32,
        delay_ms: u64,
    },
    /// A call failed for a reason unrelated to authentication.
    RequestFailed {
        endpoint: String,
        status: Option<u16>,
        attempts: u32,
    },
    /// A multi-call view loaded with some endpoints missing.
    BatchDegraded { failed: usize, total: usize },
}

impl ApiEvent {
    fn description(&self) -> &str {
        match self {
            ApiEvent::RequestRetrying { .. } => "Retrying request",
            ApiEvent::RequestFailed { .. } => "Request failed",
            ApiEvent::BatchDegraded { .. } => "Partial data loaded",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for [`CoreEvent`]s.
///
/// Cloning the bus is cheap; clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    ///
    /// `capacity` is the number of events buffered per subscriber before it
    /// starts receiving `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let auth_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Auth(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. Returns `None` when no matching event is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
