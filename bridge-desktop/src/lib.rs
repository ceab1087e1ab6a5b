//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux):
//! - `HttpClient` using `reqwest` (rustls)
//! - `CredentialStore` using the `keyring` crate
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{KeyringCredentialStore, ReqwestHttpClient};
//!
//! let http_client = ReqwestHttpClient::new()?;
//! let store = KeyringCredentialStore::new();
//! ```

mod http;

#[cfg(feature = "secure-store")]
mod credential_store;

pub use http::ReqwestHttpClient;

#[cfg(feature = "secure-store")]
pub use credential_store::KeyringCredentialStore;
