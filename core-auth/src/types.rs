//! Session model and classification types.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fmt;

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "token";
/// Storage key for the refresh token. An empty value means "none".
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Storage key for the expiry, Unix epoch milliseconds as a decimal string.
pub const EXPIRES_AT_KEY: &str = "expirationDate";

/// Every key that makes up a stored session, in read order.
pub const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, EXPIRES_AT_KEY];

/// Provider default when a token response omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Snapshot of the persisted session triple.
///
/// Any field may be absent; an empty snapshot means nobody is signed in.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.expires_at.is_none()
    }

    /// Where this snapshot sits in the session lifecycle at `now`.
    ///
    /// A missing expiry is treated as "never expires".
    pub fn status_at(&self, now: DateTime<Utc>) -> SessionStatus {
        if self.access_token.is_none() {
            return SessionStatus::NoSession;
        }

        match self.expires_at {
            Some(expires_at) if now >= expires_at => SessionStatus::Expired {
                refreshable: self.refresh_token.is_some(),
            },
            expires_at => SessionStatus::Valid { expires_at },
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Lifecycle state derived from a [`Session`] and the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No access token stored.
    NoSession,
    /// Access token usable without network I/O.
    Valid { expires_at: Option<DateTime<Utc>> },
    /// Access token past its expiry.
    Expired { refreshable: bool },
}

impl SessionStatus {
    /// True when a call could proceed, possibly after a refresh.
    pub fn is_signed_in(&self) -> bool {
        matches!(
            self,
            SessionStatus::Valid { .. } | SessionStatus::Expired { refreshable: true }
        )
    }
}

/// Tokens handed over by the interactive login flow.
#[derive(Clone)]
pub struct LoginTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
}

impl LoginTokens {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>, expires_in: i64) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_in,
        }
    }
}

impl fmt::Debug for LoginTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginTokens")
            .field("access_token", &"[REDACTED]")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Outcome class of a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    /// HTTP 401. The token was rejected and the session is no longer usable.
    Unauthorized,
    /// Any other failure: non-2xx status or no response at all.
    OtherError,
}

impl ResponseClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => ResponseClass::Success,
            401 => ResponseClass::Unauthorized,
            _ => ResponseClass::OtherError,
        }
    }
}

/// Why a session was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    /// A call was attempted with nothing stored.
    NoSession,
    /// The token exchange failed or no refresh token was available.
    RefreshFailed,
    /// The resource server answered 401.
    Unauthorized,
    /// The credential store could not be read.
    Storage,
    /// The user signed out.
    SignedOut,
}

impl InvalidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidationReason::NoSession => "no_session",
            InvalidationReason::RefreshFailed => "refresh_failed",
            InvalidationReason::Unauthorized => "unauthorized",
            InvalidationReason::Storage => "storage",
            InvalidationReason::SignedOut => "signed_out",
        }
    }
}

impl fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregation window for the top-items endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    /// Roughly the last four weeks.
    #[default]
    ShortTerm,
    /// Roughly the last six months.
    MediumTerm,
    /// Several years of history.
    LongTerm,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "short_term" => Ok(TimeRange::ShortTerm),
            "medium_term" => Ok(TimeRange::MediumTerm),
            "long_term" => Ok(TimeRange::LongTerm),
            other => Err(format!("Unknown time range: {}", other)),
        }
    }
}

/// `now + seconds`, saturating instead of overflowing on absurd inputs.
pub(crate) fn expiry_after(now: DateTime<Utc>, seconds: i64) -> DateTime<Utc> {
    Duration::try_seconds(seconds.max(0))
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub(crate) fn encode_expiry(expires_at: DateTime<Utc>) -> String {
    expires_at.timestamp_millis().to_string()
}

/// Parse a stored expiry. `None` means the value is unusable.
pub(crate) fn decode_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = raw.trim().parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}
