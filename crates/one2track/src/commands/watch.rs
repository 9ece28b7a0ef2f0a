//! `watch`: the polling scheduler.
//!
//! Installs once, then refreshes on a fixed interval until interrupted.
//! A failed poll keeps the previous snapshot; the next tick tries again.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use one2track_api::{ClientConfig, DevicePoller, TrackerDevice};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::devices;

// ── Snapshot tracking ───────────────────────────────────────────────

/// Trackers that came or went between two snapshots, by uuid.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct SnapshotDiff {
    pub appeared: Vec<String>,
    pub vanished: Vec<String>,
}

/// Last-known device snapshot, correlated across polls by uuid.
#[derive(Debug, Default)]
pub(crate) struct SnapshotTracker {
    last: Vec<TrackerDevice>,
    taken_at: Option<DateTime<Local>>,
}

impl SnapshotTracker {
    /// Replace the snapshot wholesale and report membership changes.
    pub fn update(&mut self, devices: Vec<TrackerDevice>, now: DateTime<Local>) -> SnapshotDiff {
        let before: BTreeSet<&str> = self.last.iter().map(|d| d.uuid.as_str()).collect();
        let after: BTreeSet<&str> = devices.iter().map(|d| d.uuid.as_str()).collect();

        // The first snapshot establishes the baseline.
        let diff = if self.taken_at.is_none() {
            SnapshotDiff::default()
        } else {
            SnapshotDiff {
                appeared: after.difference(&before).map(|s| (*s).to_owned()).collect(),
                vanished: before.difference(&after).map(|s| (*s).to_owned()).collect(),
            }
        };

        self.last = devices;
        self.taken_at = Some(now);
        diff
    }

    pub fn current(&self) -> &[TrackerDevice] {
        &self.last
    }

    pub fn taken_at(&self) -> Option<DateTime<Local>> {
        self.taken_at
    }
}

// ── Shutdown ────────────────────────────────────────────────────────

/// Resolves on Ctrl+C (or SIGTERM on unix).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C, stopping"),
        () = terminate => info!("received SIGTERM, stopping"),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    args: WatchArgs,
    client: ClientConfig,
    profile_interval: Duration,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let interval = args.interval.unwrap_or(profile_interval);
    if interval.is_zero() {
        return Err(CliError::Validation {
            field: "interval".into(),
            reason: "must be greater than zero".into(),
        });
    }

    // 1. Install once and refuse to poll someone else's account
    let configured = client.credentials.account_id.clone();
    let mut poller = DevicePoller::new(client)?;
    let discovered = poller.install().await?;
    if let Some(configured) = configured.filter(|c| *c != discovered) {
        poller.shutdown();
        return Err(CliError::AccountMismatch {
            configured,
            discovered,
        });
    }

    info!(
        account_id = %discovered,
        interval = %humantime::format_duration(interval),
        "watching trackers"
    );

    let color = output::should_color(&global.color);
    let mut tracker = SnapshotTracker::default();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    // 2. Poll until interrupted
    let mut polls: u64 = 0;
    loop {
        tokio::select! {
            biased;
            () = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            () = &mut shutdown => break,
            result = poller.refresh() => result,
        };
        polls += 1;

        match result {
            Ok(snapshot) => {
                let now = Local::now();
                let diff = tracker.update(snapshot, now);
                report_diff(&diff, color, global.quiet);
                print_snapshot(&tracker, global, color);
            }
            Err(err) => {
                warn!(error = %err, transient = err.is_transient(), "update failed");
                if !global.quiet {
                    let kept = tracker.taken_at().map_or_else(
                        || "no snapshot yet".to_owned(),
                        |t| format!("keeping snapshot from {}", t.format("%H:%M:%S")),
                    );
                    eprintln!("{} {err} ({kept})", output::warning("update failed:", color));
                }
            }
        }

        if args.count.is_some_and(|n| polls >= n) {
            debug!(polls, "poll count reached");
            break;
        }
    }

    poller.shutdown();
    info!(polls, "watch stopped");
    Ok(())
}

fn report_diff(diff: &SnapshotDiff, color: bool, quiet: bool) {
    for uuid in &diff.appeared {
        info!(uuid = %uuid, "new tracker in data");
    }
    for uuid in &diff.vanished {
        warn!(uuid = %uuid, "tracker not found in new data");
        if !quiet {
            eprintln!(
                "{} tracker {uuid} is no longer reported",
                output::warning("warning:", color)
            );
        }
    }
}

fn print_snapshot(tracker: &SnapshotTracker, global: &GlobalOpts, color: bool) {
    let body = devices::render(tracker.current(), global);
    let out = match (&global.output, tracker.taken_at()) {
        (OutputFormat::Table, Some(at)) => format!(
            "{}\n{body}",
            output::heading(&at.format("%Y-%m-%d %H:%M:%S").to_string(), color)
        ),
        _ => body,
    };
    output::print_output(&out, global.quiet);
}
