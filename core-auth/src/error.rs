use crate::types::InvalidationReason;
use bridge_traits::BridgeError;
use thiserror::Error;

/// Coarse error category shared by [`AuthError`] and [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoSession,
    RefreshFailed,
    AuthExpired,
    Remote,
    Storage,
    InvalidEndpoint,
}

/// Failures of the token lifecycle (manager and refresh executor).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("No session stored; sign in first")]
    NoSession,

    #[error("Token refresh failed: {reason}")]
    RefreshFailed {
        /// Token endpoint status, when a response was received.
        status: Option<u16>,
        reason: String,
    },

    #[error("Credential store unavailable: {0}")]
    Storage(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::NoSession => ErrorKind::NoSession,
            AuthError::RefreshFailed { .. } => ErrorKind::RefreshFailed,
            AuthError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::RefreshFailed { status, .. } => *status,
            _ => None,
        }
    }

    /// Invalidation reason recorded when this failure ends the session.
    pub fn invalidation_reason(&self) -> InvalidationReason {
        match self {
            AuthError::NoSession => InvalidationReason::NoSession,
            AuthError::RefreshFailed { .. } => InvalidationReason::RefreshFailed,
            AuthError::Storage(_) => InvalidationReason::Storage,
        }
    }
}

impl From<BridgeError> for AuthError {
    fn from(e: BridgeError) -> Self {
        AuthError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

/// Failures surfaced to callers of the authenticated request wrapper.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The session is gone; the user has to sign in again.
    #[error("Session expired ({reason}); sign in again")]
    AuthExpired {
        reason: InvalidationReason,
        #[source]
        source: Option<AuthError>,
    },

    /// A failure unrelated to authentication. The session is untouched.
    #[error("Remote call failed ({}): {message}", status_label(.status))]
    Remote {
        /// HTTP status, or `None` when no response arrived.
        status: Option<u16>,
        message: String,
        #[source]
        source: Option<BridgeError>,
    },

    #[error("Invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {}", code),
        None => "no response".to_string(),
    }
}

impl ApiError {
    pub(crate) fn remote_status(status: u16, message: impl Into<String>) -> Self {
        ApiError::Remote {
            status: Some(status),
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn transport(source: BridgeError) -> Self {
        ApiError::Remote {
            status: None,
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::AuthExpired { .. } => ErrorKind::AuthExpired,
            ApiError::Remote { .. } => ErrorKind::Remote,
            ApiError::InvalidEndpoint { .. } => ErrorKind::InvalidEndpoint,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::AuthExpired {
                reason: InvalidationReason::Unauthorized,
                ..
            } => Some(401),
            ApiError::AuthExpired { source, .. } => source.as_ref().and_then(AuthError::status),
            ApiError::Remote { status, .. } => *status,
            ApiError::InvalidEndpoint { .. } => None,
        }
    }

    /// True when the UI should route the user back to the login screen.
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::AuthExpired { .. })
    }

    /// Transient failures: no response, 429, or 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Remote { status: None, .. } => true,
            ApiError::Remote {
                status: Some(code), ..
            } => *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
