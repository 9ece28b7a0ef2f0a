//! CLI configuration: thin wrapper around `one2track_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--base-url, --username, --account-id, --timeout).

use std::time::Duration;

use one2track_api::{ClientConfig, Credentials, TransportConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use one2track_config::{
    Config, Defaults, Profile, config_path, load_config_or_default, save_config,
};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Look up the active profile.
///
/// An explicitly requested profile must exist; the implicit default may be
/// missing, in which case flags and environment supply everything.
pub fn active_profile(global: &GlobalOpts, config: &Config) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, config);
    match config.profiles.get(&name) {
        Some(profile) => Ok((name, profile.clone())),
        None if global.profile.is_some() => Err(CliError::ProfileNotFound {
            available: available_profiles(config),
            name,
        }),
        None => Ok((name, Profile::default())),
    }
}

pub fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        "(none)".into()
    } else {
        config.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Apply flag overrides on top of a stored profile.
pub fn apply_overrides(profile: &Profile, global: &GlobalOpts) -> Profile {
    let mut merged = profile.clone();
    if let Some(ref url) = global.base_url {
        merged.base_url = Some(url.clone());
    }
    if let Some(ref username) = global.username {
        merged.username = Some(username.clone());
    }
    if let Some(ref account_id) = global.account_id {
        merged.account_id = Some(account_id.clone());
    }
    if let Some(timeout) = global.timeout {
        merged.timeout = Some(timeout);
    }
    merged
}

/// Translate a `Profile` + global flags into a `ClientConfig`.
///
/// CLI flag overrides take priority over profile values.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    global: &GlobalOpts,
) -> Result<ClientConfig, CliError> {
    let merged = apply_overrides(profile, global);
    Ok(one2track_config::profile_to_client_config(
        &merged,
        profile_name,
        defaults,
    )?)
}

/// Build a `ClientConfig` from the config file, profile, and CLI overrides.
pub fn build_client_config(global: &GlobalOpts) -> Result<(ClientConfig, Duration), CliError> {
    let cfg = load_config_or_default();
    let (name, profile) = active_profile(global, &cfg)?;
    let client = resolve_profile(&profile, &name, &cfg.defaults, global)?;
    Ok((client, profile.interval(&cfg.defaults)))
}

/// Client config from already-known credentials (used by `install`).
pub fn client_config_for(
    profile: &Profile,
    defaults: &Defaults,
    credentials: Credentials,
) -> Result<ClientConfig, CliError> {
    let endpoints = one2track_config::parse_endpoints(profile.base_url.as_deref())?;
    let timeout = profile.timeout(defaults);
    if timeout.is_zero() {
        return Err(CliError::Validation {
            field: "timeout".into(),
            reason: "must be at least one second".into(),
        });
    }
    Ok(ClientConfig {
        credentials,
        endpoints,
        transport: TransportConfig::default().with_timeout(timeout),
    })
}
