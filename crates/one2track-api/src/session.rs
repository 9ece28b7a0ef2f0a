// Portal session authentication
//
// Three-step handshake: GET the login page for a CSRF token and a seed
// cookie, POST the credentials form, capture the session cookie from the
// 302. The portal redirects the root URL to the account's device page,
// which is how the account identifier is discovered during setup.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{COOKIE, HeaderMap, LOCATION, SET_COOKIE};
use secrecy::ExposeSecret;
use tracing::{debug, info, trace, warn};

use crate::auth::{CONSENT_COOKIE, Credentials, PortalEndpoints};
use crate::error::Error;
use crate::scrape;
use crate::transport::TransportConfig;

// ── Session state ────────────────────────────────────────────────────

/// Which cookie, if any, we currently hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum HeldCookie {
    #[default]
    Absent,
    /// Handed out by the login page; only good for the login POST.
    Seed(String),
    /// Handed out by a successful login response.
    Session(String),
}

/// Mutable session state, owned exclusively by [`SessionAuthenticator`].
///
/// Holding a [`Session`](HeldCookie::Session) cookie means a successful
/// login response was observed; anything else means "must (re)login".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    csrf_token: Option<String>,
    cookie: HeldCookie,
    account_id: Option<String>,
}

impl SessionState {
    fn with_account_id(account_id: Option<String>) -> Self {
        Self {
            account_id,
            ..Self::default()
        }
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    /// The cookie that will be sent on the next request (seed or session).
    pub fn cookie(&self) -> Option<&str> {
        match &self.cookie {
            HeldCookie::Absent => None,
            HeldCookie::Seed(value) | HeldCookie::Session(value) => Some(value),
        }
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    /// True only after a successful login and until the next `clear()`.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.cookie, HeldCookie::Session(_))
    }
}

// ── Authenticator ────────────────────────────────────────────────────

/// Owns the transport, the credentials and the [`SessionState`].
///
/// The one `reqwest::Client` built here is the client instance's only
/// connection pool; dropping the authenticator releases it.
pub struct SessionAuthenticator {
    http: reqwest::Client,
    endpoints: PortalEndpoints,
    credentials: Credentials,
    state: SessionState,
    timeout: Duration,
}

impl SessionAuthenticator {
    pub fn new(
        credentials: Credentials,
        endpoints: PortalEndpoints,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, credentials, endpoints, transport))
    }

    /// Create an authenticator around a pre-built `reqwest::Client`.
    ///
    /// The client must not follow redirects; the handshake relies on
    /// seeing the 302 responses.
    pub fn with_client(
        http: reqwest::Client,
        credentials: Credentials,
        endpoints: PortalEndpoints,
        transport: &TransportConfig,
    ) -> Self {
        let state = SessionState::with_account_id(credentials.account_id.clone());
        Self {
            http,
            endpoints,
            credentials,
            state,
            timeout: transport.timeout(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn endpoints(&self) -> &PortalEndpoints {
        &self.endpoints
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    pub fn account_id(&self) -> Option<&str> {
        self.state.account_id()
    }

    /// The underlying HTTP client (for the poller's device fetch).
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `Cookie` header value for the held cookie, if any.
    pub(crate) fn cookie_header(&self) -> Option<String> {
        self.state.cookie().map(|value| {
            format!(
                "{CONSENT_COOKIE}; {}={value}",
                self.endpoints.session_cookie
            )
        })
    }

    fn apply_cookie(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.cookie_header() {
            Some(cookie) => builder.header(COOKIE, cookie),
            None => builder,
        }
    }

    fn session_cookie_from(&self, headers: &HeaderMap) -> Option<String> {
        scrape::find_cookie(
            headers
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
            &self.endpoints.session_cookie,
        )
    }

    // ── Handshake ────────────────────────────────────────────────────

    /// Step 1: fetch the login page, store its CSRF token and seed cookie.
    ///
    /// A missing seed cookie is fine; a missing CSRF marker is not.
    pub async fn fetch_csrf_and_seed_cookie(&mut self) -> Result<(), Error> {
        let url = self.endpoints.login_url()?;
        debug!("fetching login page at {}", url);

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::from_request(e, self.timeout))?;

        let status = resp.status();
        if status != StatusCode::OK {
            warn!(%status, "login page unavailable");
            return Err(Error::AuthPageUnavailable {
                message: format!("login page returned HTTP {status}"),
            });
        }

        let seed = self.session_cookie_from(resp.headers());
        let html = resp
            .text()
            .await
            .map_err(|e| Error::from_request(e, self.timeout))?;

        let csrf = scrape::extract_csrf_token(&html).ok_or_else(|| {
            warn!("login page carried no CSRF token");
            Error::AuthPageUnavailable {
                message: "CSRF token not found on login page".into(),
            }
        })?;

        trace!(seed_cookie = seed.is_some(), "captured CSRF token");
        self.state.csrf_token = Some(csrf.to_owned());
        self.state.cookie = seed.map_or(HeldCookie::Absent, HeldCookie::Seed);
        Ok(())
    }

    /// Step 2: submit the credentials form.
    ///
    /// Success is a 302 carrying a fresh session cookie. Anything else is
    /// [`Error::InvalidCredentials`] and leaves the state untouched; do not
    /// retry automatically.
    pub async fn login(&mut self) -> Result<(), Error> {
        let url = self.endpoints.login_url()?;
        debug!(username = %self.credentials.username, "logging in at {}", url);

        let form = [
            (
                "authenticity_token",
                self.state.csrf_token.as_deref().unwrap_or_default(),
            ),
            ("user[login]", self.credentials.username.as_str()),
            (
                "user[password]",
                self.credentials.password.expose_secret(),
            ),
            ("gdpr", "1"),
            ("user[remember_me]", "1"),
        ];

        let builder = self.http.post(url).form(&form);
        let resp = self
            .apply_cookie(builder)
            .send()
            .await
            .map_err(|e| Error::from_request(e, self.timeout))?;

        let status = resp.status();
        if status != StatusCode::FOUND {
            warn!(%status, "login rejected");
            return Err(Error::InvalidCredentials {
                message: format!("expected HTTP 302 from login, got {status}"),
            });
        }

        let Some(cookie) = self.session_cookie_from(resp.headers()) else {
            warn!("login redirect carried no session cookie");
            return Err(Error::InvalidCredentials {
                message: "login redirect did not set a session cookie".into(),
            });
        };

        if let Some(location) = resp.headers().get(LOCATION).and_then(|v| v.to_str().ok()) {
            debug!(location, "login redirect");
        }

        self.state.cookie = HeldCookie::Session(cookie);
        info!("login successful");
        Ok(())
    }

    /// Discover the account identifier from the portal root's redirect.
    ///
    /// Stores the identifier for subsequent device fetches and returns it.
    pub async fn resolve_account_id(&mut self) -> Result<String, Error> {
        let url = self.endpoints.root_url().clone();
        debug!("resolving account id via {}", url);

        let resp = self
            .apply_cookie(self.http.get(url.clone()))
            .send()
            .await
            .map_err(|e| Error::from_request(e, self.timeout))?;

        let status = resp.status();
        if !status.is_redirection() {
            return Err(Error::AccountResolutionFailed {
                message: format!("expected a redirect from the portal root, got HTTP {status}"),
            });
        }

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::AccountResolutionFailed {
                message: "redirect carried no Location header".into(),
            })?;

        // Relative redirects are resolved first so the fixed segment
        // position applies to an absolute URL either way.
        let absolute = url.join(location).map_err(|e| Error::AccountResolutionFailed {
            message: format!("unparsable Location {location:?}: {e}"),
        })?;

        let account_id = scrape::account_id_from_location(absolute.as_str())
            .ok_or_else(|| Error::AccountResolutionFailed {
                message: format!("no account id in Location {location:?}"),
            })?
            .to_owned();

        info!(account_id = %account_id, "resolved account id");
        self.state.account_id = Some(account_id.clone());
        Ok(account_id)
    }

    /// Forget the CSRF token and cookie. The account id survives.
    pub fn clear(&mut self) {
        debug!("clearing session state");
        self.state.csrf_token = None;
        self.state.cookie = HeldCookie::Absent;
    }
}
