//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the session core:
//! - Logging and tracing setup
//! - Configuration and bridge wiring
//! - Event bus for session and API lifecycle events

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{ApiEvent, AuthEvent, CoreEvent, EventBus};
