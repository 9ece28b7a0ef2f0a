//! Device command handlers.

use tabled::Tabled;

use one2track_api::{ClientConfig, DevicePoller, TrackerDevice};

use crate::cli::{DevicesArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub(crate) struct DeviceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "UUID")]
    uuid: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Battery")]
    battery: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
}

impl From<&TrackerDevice> for DeviceRow {
    fn from(d: &TrackerDevice) -> Self {
        Self {
            name: d.name.clone(),
            uuid: d.uuid.clone(),
            status: d.status.clone().unwrap_or_default(),
            location: d.location_name().unwrap_or("-").to_owned(),
            battery: d
                .battery_level()
                .map_or_else(|| "-".into(), |b| format!("{b}%")),
            last_seen: d
                .last_location
                .as_ref()
                .and_then(|l| l.last_communication.clone())
                .unwrap_or_default(),
        }
    }
}

fn detail(d: &TrackerDevice) -> String {
    let location = d.last_location.clone().unwrap_or_default();
    let mut lines = vec![
        format!("Name:        {}", d.name),
        format!("UUID:        {}", d.uuid),
        format!("ID:          {}", d.id),
        format!("Serial:      {}", d.serial_number),
        format!("Phone:       {}", d.phone_number.as_deref().unwrap_or("-")),
        format!("Status:      {}", d.status.as_deref().unwrap_or("-")),
        format!("Location:    {}", d.location_name().unwrap_or("-")),
        format!(
            "Coordinates: {}",
            d.coordinates()
                .map_or_else(|| "-".into(), |(lat, lon)| format!("{lat:.6}, {lon:.6}"))
        ),
        format!(
            "Fix type:    {}",
            location.location_type.as_deref().unwrap_or("-")
        ),
        format!(
            "Battery:     {}",
            d.battery_level()
                .map_or_else(|| "-".into(), |b| format!("{b}%"))
        ),
    ];

    if let Some(speed) = location.speed {
        lines.push(format!("Speed:       {speed} km/h"));
    }
    if let Some(sats) = location.satellite_count {
        lines.push(format!("Satellites:  {sats}"));
    }
    if let Some(signal) = location.signal_strength {
        lines.push(format!("Signal:      {signal}"));
    }
    if let Some(ref seen) = location.last_communication {
        lines.push(format!("Last seen:   {seen}"));
    }
    if let Some(ref updated) = location.last_location_update {
        lines.push(format!("Last fix:    {updated}"));
    }
    if let Some(balance) = d.simcard.as_ref().and_then(|s| s.balance_cents) {
        lines.push(format!("SIM credit:  {:.2}", balance / 100.0));
    }

    lines.join("\n")
}

/// Render a device snapshot in the selected output format.
pub(crate) fn render(devices: &[TrackerDevice], global: &GlobalOpts) -> String {
    output::render_list(&global.output, devices, |d| DeviceRow::from(d), |d| d.uuid.clone())
}

/// Find a tracker by uuid, falling back to a case-insensitive name match.
fn find<'a>(devices: &'a [TrackerDevice], identifier: &str) -> Option<&'a TrackerDevice> {
    devices
        .iter()
        .find(|d| d.uuid == identifier)
        .or_else(|| {
            devices
                .iter()
                .find(|d| d.name.eq_ignore_ascii_case(identifier))
        })
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    args: DevicesArgs,
    client: ClientConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut poller = DevicePoller::new(client)?;
    let result = poller.refresh().await;
    poller.shutdown();
    let devices = result?;

    let out = match args.tracker {
        Some(ref identifier) => {
            let device = find(&devices, identifier).ok_or_else(|| CliError::TrackerNotFound {
                identifier: identifier.clone(),
            })?;
            output::render_single(&global.output, device, detail, |d| d.uuid.clone())
        }
        None => render(&devices, global),
    };

    output::print_output(&out, global.quiet);
    Ok(())
}
