use secrecy::SecretString;
use url::Url;

use crate::error::Error;

/// Name of the portal's session cookie.
pub const SESSION_COOKIE: &str = "_iadmin";

/// Consent cookie the portal expects next to every session cookie.
pub const CONSENT_COOKIE: &str = "accepted_cookies=true";

const DEFAULT_BASE_URL: &str = "https://www.one2trackgps.com/";
const LOGIN_PATH: &str = "auth/users/sign_in";
const DEVICES_PATH_TEMPLATE: &str = "users/{account}/devices";

/// Credentials for logging in to the portal.
///
/// Immutable for the lifetime of a client. The account identifier is
/// optional: first-time setup discovers it via
/// [`DevicePoller::install`](crate::DevicePoller::install).
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
    pub account_id: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
            account_id: None,
        }
    }

    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }
}

/// Where the portal lives.
///
/// Defaults to the public One2Track host; tests and self-hosted mirrors
/// point `base_url` elsewhere. Paths are joined onto `base_url`, so it
/// should end with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalEndpoints {
    pub base_url: Url,
    pub session_cookie: String,
}

impl Default for PortalEndpoints {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default portal URL is valid"),
            session_cookie: SESSION_COOKIE.into(),
        }
    }
}

impl PortalEndpoints {
    /// Endpoints rooted at `base_url`. A missing trailing slash is added so
    /// relative joins keep any path prefix.
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            session_cookie: SESSION_COOKIE.into(),
        })
    }

    /// The portal root. A GET here redirects to the account's device page.
    pub fn root_url(&self) -> &Url {
        &self.base_url
    }

    /// Login page (GET) and credential submission (POST) share this URL.
    pub fn login_url(&self) -> Result<Url, Error> {
        Ok(self.base_url.join(LOGIN_PATH)?)
    }

    /// Device-list URL with the account identifier substituted.
    pub fn devices_url(&self, account_id: &str) -> Result<Url, Error> {
        let path = DEVICES_PATH_TEMPLATE.replace("{account}", account_id);
        Ok(self.base_url.join(&path)?)
    }
}
