use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `one2track-api` crate.
///
/// Covers every failure mode of the portal login handshake and the device
/// poll. Hosts map these into user-facing diagnostics; the scheduler only
/// needs [`is_transient`](Self::is_transient) to decide whether the next tick
/// can be expected to succeed.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login page returned non-200, or carried no CSRF marker.
    #[error("Login page unavailable: {message}")]
    AuthPageUnavailable { message: String },

    /// Credential submission was rejected (no 302, or no fresh session cookie).
    #[error("Invalid username or password: {message}")]
    InvalidCredentials { message: String },

    /// The post-login redirect did not reveal an account identifier.
    #[error("Account resolution failed: {message}")]
    AccountResolutionFailed { message: String },

    /// Device fetch answered with a non-200 status. Session state has
    /// already been cleared; the next refresh logs in again.
    #[error("Session expired (HTTP {status}) -- re-authentication on next refresh")]
    SessionExpired { status: u16 },

    // ── Data ────────────────────────────────────────────────────────
    /// The device-list body was not the expected JSON shape.
    #[error("Malformed device data: {message}")]
    MalformedDeviceData { message: String, body: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Request timed out.
    #[error("Request timed out after {}", humantime::format_duration(*timeout))]
    Timeout { timeout: Duration },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying on the
    /// next scheduled tick.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. }
            | Self::AuthPageUnavailable { .. }
            | Self::SessionExpired { .. }
            | Self::MalformedDeviceData { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the portal rejected or dropped our session.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. } | Self::SessionExpired { .. }
        )
    }

    /// Returns `true` if only the user can fix this (wrong password,
    /// unusable account, broken configuration).
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. }
                | Self::AccountResolutionFailed { .. }
                | Self::InvalidUrl(_)
                | Self::ClientBuild(_)
        )
    }

    /// Map a `reqwest` failure, turning timeouts into [`Error::Timeout`] so
    /// callers never confuse a slow network with a lost session.
    pub(crate) fn from_request(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout }
        } else {
            Self::Transport(err)
        }
    }
}
