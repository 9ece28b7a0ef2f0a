//! CLI error types with miette diagnostics.
//!
//! Maps library and config errors into user-facing errors with actionable
//! help text and a distinct process exit code per failure class.

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use one2track_config::ConfigError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONFIG: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const DATA: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the One2Track portal at {url}")]
    #[diagnostic(
        code(one2track::connection_failed),
        help(
            "Check your network connection.\n\
             URL: {url}\n\
             Override the portal address with --base-url if you use a mirror."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("The portal login page is unavailable: {message}")]
    #[diagnostic(
        code(one2track::portal_unavailable),
        help("The portal may be down for maintenance or its login page has changed. Try again later.")
    )]
    PortalUnavailable { message: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(one2track::auth_failed),
        help(
            "Verify your username and password on https://www.one2trackgps.com.\n\
             Update the stored password with: one2track config set-password"
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(one2track::no_credentials),
        help(
            "Configure credentials with: one2track install\n\
             Or set ONE2TRACK_USERNAME and ONE2TRACK_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    #[error("Portal session was rejected (HTTP {status})")]
    #[diagnostic(
        code(one2track::session_expired),
        help("The session is discarded; the next request signs in again.")
    )]
    SessionExpired { status: u16 },

    // ── Account ──────────────────────────────────────────────────────

    #[error("Could not determine the account id: {message}")]
    #[diagnostic(
        code(one2track::account_unresolved),
        help("Run: one2track install\nOr pass --account-id / set ONE2TRACK_ACCOUNT_ID.")
    )]
    AccountUnresolved { message: String },

    #[error("Account id mismatch: profile has '{configured}', portal reports '{discovered}'")]
    #[diagnostic(
        code(one2track::account_mismatch),
        help("These credentials belong to a different account. Re-run: one2track install")
    )]
    AccountMismatch {
        configured: String,
        discovered: String,
    },

    // ── Data ─────────────────────────────────────────────────────────

    #[error("The portal returned an unreadable device list: {message}")]
    #[diagnostic(
        code(one2track::malformed_data),
        help("Re-run with -vv to log the response details.")
    )]
    MalformedData { message: String },

    #[error("No tracker matches '{identifier}'")]
    #[diagnostic(
        code(one2track::not_found),
        help("Run: one2track devices to see available trackers")
    )]
    TrackerNotFound { identifier: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(one2track::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(one2track::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: one2track install --profile {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(one2track::config))]
    Config { message: String },

    #[error("Keyring error: {message}")]
    #[diagnostic(
        code(one2track::keyring),
        help("Set ONE2TRACK_PASSWORD instead if no system keyring is available.")
    )]
    Keyring { message: String },

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out after {}", humantime::format_duration(*timeout))]
    #[diagnostic(
        code(one2track::timeout),
        help("Increase timeout with --timeout or try again later.")
    )]
    Timeout { timeout: Duration },

    // ── Other ────────────────────────────────────────────────────────

    #[error("Internal error: {message}")]
    #[diagnostic(code(one2track::internal))]
    Internal { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::PortalUnavailable { .. } => {
                exit_code::CONNECTION
            }
            Self::AuthFailed { .. } | Self::NoCredentials { .. } | Self::SessionExpired { .. } => {
                exit_code::AUTH
            }
            Self::AccountUnresolved { .. }
            | Self::AccountMismatch { .. }
            | Self::ProfileNotFound { .. }
            | Self::Config { .. }
            | Self::Keyring { .. } => exit_code::CONFIG,
            Self::MalformedData { .. } | Self::TrackerNotFound { .. } => exit_code::DATA,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Internal { .. } | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── Library error → CliError mapping ─────────────────────────────────

impl From<one2track_api::Error> for CliError {
    fn from(err: one2track_api::Error) -> Self {
        use one2track_api::Error;

        match err {
            Error::AuthPageUnavailable { message } => CliError::PortalUnavailable { message },

            Error::InvalidCredentials { message } => CliError::AuthFailed { message },

            Error::AccountResolutionFailed { message } => CliError::AccountUnresolved { message },

            Error::SessionExpired { status } => CliError::SessionExpired { status },

            Error::MalformedDeviceData { message, .. } => CliError::MalformedData { message },

            Error::Transport(e) => CliError::ConnectionFailed {
                url: e.url().map(ToString::to_string).unwrap_or_default(),
                source: Box::new(e),
            },

            Error::Timeout { timeout } => CliError::Timeout { timeout },

            Error::InvalidUrl(e) => CliError::Validation {
                field: "base_url".into(),
                reason: e.to_string(),
            },

            Error::ClientBuild(message) => CliError::Internal { message },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Keyring(e) => CliError::Keyring {
                message: e.to_string(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other @ (ConfigError::Serialization(_) | ConfigError::Figment(_)) => {
                CliError::Config {
                    message: other.to_string(),
                }
            }
        }
    }
}
