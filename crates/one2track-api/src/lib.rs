// one2track-api: Async Rust client for the One2Track GPS tracker portal
//
// The portal has no public API. `SessionAuthenticator` scrapes the login
// form and keeps the session cookie; `DevicePoller` fetches the device list
// and re-authenticates on the next refresh after the session is lost.

pub mod auth;
pub mod error;
pub mod models;
pub mod poller;
pub mod scrape;
pub mod session;
pub mod transport;

pub use auth::{Credentials, PortalEndpoints, SESSION_COOKIE};
pub use error::Error;
pub use models::{Location, SimCard, TrackerDevice, parse_device_list};
pub use poller::{ClientConfig, DevicePoller};
pub use session::{SessionAuthenticator, SessionState};
pub use transport::{DEFAULT_TIMEOUT, TransportConfig};
