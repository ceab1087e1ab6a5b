//! # Session Core
//!
//! Authenticated access to the listening-stats API.
//!
//! ## Overview
//!
//! This crate owns the stored OAuth session: it decides whether the access
//! token can be used as-is, refreshes it when it has expired, and discards it
//! when the provider rejects it. Every API call goes through
//! [`AuthenticatedClient::call`], which maps outcomes to a small error
//! taxonomy the UI can act on.
//!
//! ## Features
//!
//! - Expiry check with at most one refresh in flight
//! - Atomic persistence of the token triple through a `CredentialStore`
//! - Session purge plus one-shot login-required notification on 401
//! - Backoff retry for transient failures
//! - Settle-all aggregation for views that combine several endpoints

pub mod aggregate;
pub mod client;
pub mod error;
pub mod invalidation;
pub mod manager;
pub mod refresh;
pub mod session_store;
pub mod types;

pub use aggregate::{settle_all, AggregateError, Settled};
pub use client::{AuthenticatedClient, CallOptions};
pub use error::{ApiError, ApiResult, AuthError, ErrorKind, Result};
pub use invalidation::{SessionInvalidationHook, SessionInvalidator};
pub use manager::TokenLifecycleManager;
pub use refresh::{RefreshExecutor, RefreshedToken};
pub use session_store::SessionStore;
pub use types::{
    InvalidationReason, LoginTokens, ResponseClass, Session, SessionStatus, TimeRange,
};
