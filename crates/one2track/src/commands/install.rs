//! `install`: verify credentials, discover the account id, save the profile.

use std::io::IsTerminal;
use std::time::Duration;

use dialoguer::{Input, Select};
use indicatif::ProgressBar;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use one2track_api::{Credentials, DevicePoller};

use crate::cli::{GlobalOpts, InstallArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct InstallSummary {
    profile: String,
    account_id: String,
    saved: bool,
}

fn summary_detail(s: &InstallSummary) -> String {
    let mut out = format!("✓ Signed in. Account id: {}", s.account_id);
    if s.saved {
        out.push_str(&format!(
            "\n  Profile '{}' written to {}",
            s.profile,
            config::config_path().display()
        ));
    }
    out
}

// ── Prompts ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_username() -> Result<String, CliError> {
    let user: String = Input::new()
        .with_prompt("One2Track login (e-mail)")
        .interact_text()
        .map_err(prompt_err)?;
    if user.is_empty() {
        return Err(CliError::Validation {
            field: "username".into(),
            reason: "username cannot be empty".into(),
        });
    }
    Ok(user)
}

fn prompt_password() -> Result<SecretString, CliError> {
    let pass = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
    if pass.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(SecretString::from(pass))
}

/// Where a freshly typed password should live.
enum PasswordStorage {
    Keyring,
    Plaintext,
    Nowhere,
}

fn prompt_password_storage() -> Result<PasswordStorage, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
        "Don't store it (set ONE2TRACK_PASSWORD instead)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    Ok(match selection {
        0 => PasswordStorage::Keyring,
        1 => PasswordStorage::Plaintext,
        _ => PasswordStorage::Nowhere,
    })
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_message("Signing in to One2Track...");
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: InstallArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load_config_or_default();
    let profile_name = config::active_profile_name(global, &cfg);
    let stored = cfg.profiles.get(&profile_name).cloned().unwrap_or_default();
    let mut profile = config::apply_overrides(&stored, global);
    let interactive = !args.non_interactive && std::io::stdin().is_terminal();

    // 1. Credentials: flags / env / keyring / config, prompting for the rest
    let username = match one2track_config::resolve_username(&profile, &profile_name) {
        Ok(user) => user,
        Err(_) if interactive => prompt_username()?,
        Err(e) => return Err(e.into()),
    };
    let (password, typed) = match one2track_config::resolve_password(&profile, &profile_name) {
        Ok(pw) => (pw, false),
        Err(_) if interactive => (prompt_password()?, true),
        Err(e) => return Err(e.into()),
    };
    let typed_password = typed.then(|| password.expose_secret().to_owned());

    // 2. Log in and discover the account id
    let client = config::client_config_for(
        &profile,
        &cfg.defaults,
        Credentials::new(username.clone(), password),
    )?;
    let mut poller = DevicePoller::new(client)?;
    let bar = spinner(global.quiet);
    let result = poller.install().await;
    bar.finish_and_clear();
    poller.shutdown();
    let account_id = result?;

    if let Some(previous) = profile.account_id.as_deref().filter(|p| *p != account_id) {
        tracing::warn!(previous, discovered = %account_id, "account id changed");
        eprintln!("   ! Profile had account id '{previous}', replacing with '{account_id}'");
    }

    // 3. Persist
    let saved = !args.no_save;
    if saved {
        profile.username = Some(username);
        profile.account_id = Some(account_id.clone());

        if let Some(secret) = typed_password {
            let storage = if interactive {
                prompt_password_storage()?
            } else {
                PasswordStorage::Nowhere
            };
            match storage {
                PasswordStorage::Keyring => {
                    one2track_config::store_password(&profile_name, &secret)?;
                    eprintln!("   ✓ Password stored in system keyring");
                }
                PasswordStorage::Plaintext => profile.password = Some(secret),
                PasswordStorage::Nowhere => {}
            }
        }

        cfg.profiles.insert(profile_name.clone(), profile);
        if cfg.default_profile.is_none() {
            cfg.default_profile = Some(profile_name.clone());
        }
        config::save_config(&cfg)?;
    }

    let summary = InstallSummary {
        profile: profile_name,
        account_id,
        saved,
    };
    let out = output::render_single(&global.output, &summary, summary_detail, |s| {
        s.account_id.clone()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
