//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Traits
//!
//! - [`CredentialStore`](storage::CredentialStore) - Session credential persistence
//!   with atomic batch writes
//! - [`HttpClient`](http::HttpClient) - Single-attempt async HTTP
//! - [`Clock`](time::Clock) - Time source for deterministic expiry checks
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate |
//! |----------|---------------------|
//! | Desktop  | `bridge-desktop`    |
//! | Mobile   | injected by the host app |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors to it and keep messages actionable without
//! including secret values.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single instance can be shared
//! across tasks behind an `Arc`.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::{CredentialStore, MemoryCredentialStore};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
