// Shared transport configuration for building the portal's reqwest::Client.
//
// The portal signals login success through a 302 and hands out the
// account identifier in a redirect `Location`, so the client never follows
// redirects on its own. Cookies are sent explicitly from session state;
// there is no cookie jar that could resurrect a cleared session.

use std::time::Duration;

use crate::error::Error;

/// Generous ceiling; the scheduler's own interval is much larger.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("one2track-rs/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a `reqwest::Client` from this config.
    ///
    /// Redirects are disabled: every caller inspects 3xx responses itself.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }
}
