// Device polling
//
// `refresh()` is the one operation a scheduler calls per tick. It makes
// sure a session exists, fetches the device list, and on any non-200
// answer drops the session so the following tick logs in from scratch.

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use tracing::{debug, info, warn};

use crate::auth::{Credentials, PortalEndpoints};
use crate::error::Error;
use crate::models::{TrackerDevice, parse_device_list};
use crate::session::{SessionAuthenticator, SessionState};
use crate::transport::TransportConfig;

const JSON: &str = "application/json";

/// Everything needed to construct a [`DevicePoller`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credentials: Credentials,
    pub endpoints: PortalEndpoints,
    pub transport: TransportConfig,
}

impl ClientConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            endpoints: PortalEndpoints::default(),
            transport: TransportConfig::default(),
        }
    }
}

/// Session-aware device-list client for one account.
///
/// Not internally synchronized: every operation takes `&mut self`, so a
/// second `refresh()` cannot start while one is in flight.
pub struct DevicePoller {
    auth: SessionAuthenticator,
}

impl DevicePoller {
    /// Build the transport and an empty, unauthenticated session.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let auth = SessionAuthenticator::new(config.credentials, config.endpoints, &config.transport)?;
        Ok(Self { auth })
    }

    /// Wrap an existing authenticator (e.g. one built with a custom client).
    pub fn from_authenticator(auth: SessionAuthenticator) -> Self {
        Self { auth }
    }

    pub fn session(&self) -> &SessionState {
        self.auth.state()
    }

    pub fn account_id(&self) -> Option<&str> {
        self.auth.account_id()
    }

    /// One poll cycle.
    ///
    /// Logs in first when no session is held. A non-200 device response
    /// clears the session and reports [`Error::SessionExpired`]; a body that
    /// does not parse reports [`Error::MalformedDeviceData`] and keeps it.
    pub async fn refresh(&mut self) -> Result<Vec<TrackerDevice>, Error> {
        if self.auth.is_authenticated() {
            debug!("session held, skipping login");
        } else {
            self.auth.fetch_csrf_and_seed_cookie().await?;
            self.auth.login().await?;
        }

        let devices = self.fetch_devices().await?;
        for device in &devices {
            debug!(uuid = %device.uuid, name = %device.name, "device found");
        }
        Ok(devices)
    }

    /// First-time setup: log in and discover the account identifier.
    ///
    /// Validates the credentials before the host persists them.
    pub async fn install(&mut self) -> Result<String, Error> {
        self.auth.fetch_csrf_and_seed_cookie().await?;
        self.auth.login().await?;
        let account_id = self.auth.resolve_account_id().await?;
        info!(account_id = %account_id, "install complete");
        Ok(account_id)
    }

    async fn fetch_devices(&mut self) -> Result<Vec<TrackerDevice>, Error> {
        let account_id = self
            .auth
            .account_id()
            .ok_or_else(|| Error::AccountResolutionFailed {
                message: "no account id configured; run install first".into(),
            })?;
        let url = self.auth.endpoints().devices_url(account_id)?;
        debug!("GET {}", url);

        let mut builder = self
            .auth
            .http()
            .get(url)
            .header(ACCEPT, JSON)
            .header(CONTENT_TYPE, JSON);
        if let Some(cookie) = self.auth.cookie_header() {
            builder = builder.header(COOKIE, cookie);
        }

        let timeout = self.auth.timeout();
        let resp = builder
            .send()
            .await
            .map_err(|e| Error::from_request(e, timeout))?;

        let status = resp.status();
        if status != StatusCode::OK {
            warn!(%status, "device fetch rejected, dropping session");
            self.auth.clear();
            return Err(Error::SessionExpired {
                status: status.as_u16(),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_request(e, timeout))?;

        parse_device_list(&body).map_err(|e| {
            let preview = body.chars().take(200).collect::<String>();
            warn!(error = %e, "device list did not parse");
            Error::MalformedDeviceData {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }

    /// Release the transport. Equivalent to dropping the poller; spelled
    /// out so hosts can make the end of the client's life explicit.
    pub fn shutdown(self) {
        debug!("releasing portal client");
    }
}
