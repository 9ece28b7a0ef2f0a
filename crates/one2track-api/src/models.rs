// Device-list response types
//
// The portal's device endpoint returns `[{"device": {...}}, ...]`. Fields
// use `Option` + `#[serde(default)]` liberally because the portal omits or
// nulls fields for trackers that have not reported yet, and it is loose
// about numbers (coordinates sometimes arrive as strings, counters as
// floats). Only the list shape, `uuid` and `id` are required; a quirky
// field value degrades to `None` instead of failing the whole poll.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Location type the portal reports for Wi-Fi based fixes.
pub const WIFI_LOCATION_TYPE: &str = "WIFI";

// ── Device ───────────────────────────────────────────────────────────

/// One tracker as reported by the device-list endpoint.
///
/// A snapshot value: produced fresh on every poll, never merged. `uuid` is
/// the only stable identity across snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerDevice {
    #[serde(deserialize_with = "integer_id")]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub serial_number: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub uuid: String,
    #[serde(default)]
    pub last_location: Option<Location>,
    #[serde(default)]
    pub simcard: Option<SimCard>,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Last reported fix, nested inside [`TrackerDevice`].
///
/// Timestamps are kept as the portal's opaque date strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, deserialize_with = "lenient_integer")]
    pub id: Option<i64>,
    #[serde(default)]
    pub last_communication: Option<String>,
    #[serde(default)]
    pub last_location_update: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_float")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_float")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_float")]
    pub altitude: Option<f64>,
    /// e.g. `GPS`, `WIFI`, `LBS`
    #[serde(default)]
    pub location_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub signal_strength: Option<i64>,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub satellite_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient_float")]
    pub speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub battery_percentage: Option<i64>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub port: Option<u16>,
}

/// SIM card details nested inside [`TrackerDevice`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimCard {
    #[serde(default, deserialize_with = "lenient_float")]
    pub balance_cents: Option<f64>,
    #[serde(default)]
    pub tariff_type: Option<String>,
}

impl TrackerDevice {
    /// `(latitude, longitude)` of the last fix, if the tracker has one.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let location = self.last_location.as_ref()?;
        Some((location.latitude?, location.longitude?))
    }

    pub fn battery_level(&self) -> Option<i64> {
        self.last_location.as_ref()?.battery_percentage
    }

    /// Whether the last fix came from Wi-Fi rather than GPS.
    pub fn is_wifi_fix(&self) -> bool {
        self.last_location
            .as_ref()
            .and_then(|l| l.location_type.as_deref())
            .is_some_and(|t| t.eq_ignore_ascii_case(WIFI_LOCATION_TYPE))
    }

    /// Human-readable place name.
    ///
    /// Trackers only join Wi-Fi networks they were configured for, so a
    /// Wi-Fi fix is reported as `home`; otherwise the portal's address.
    pub fn location_name(&self) -> Option<&str> {
        if self.is_wifi_fix() {
            return Some("home");
        }
        self.last_location.as_ref()?.address.as_deref()
    }
}

// ── Response envelope ────────────────────────────────────────────────

/// `{ "device": {...} }` wrapper around every list entry.
#[derive(Debug, Deserialize)]
struct DeviceEnvelope {
    device: TrackerDevice,
}

/// Parse a device-list body and unwrap every `device` entry.
///
/// All or nothing: a single bad entry fails the whole body.
pub fn parse_device_list(body: &str) -> Result<Vec<TrackerDevice>, serde_json::Error> {
    let envelopes: Vec<DeviceEnvelope> = serde_json::from_str(body)?;
    Ok(envelopes.into_iter().map(|e| e.device).collect())
}

// ── Lenient fields ───────────────────────────────────────────────────

fn number_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::float_cmp)]
fn number_as_i64(value: &Value) -> Option<i64> {
    if let Value::Number(n) = value {
        if let Some(i) = n.as_i64() {
            return Some(i);
        }
    }
    if let Value::String(text) = value {
        if let Ok(i) = text.trim().parse::<i64>() {
            return Some(i);
        }
    }
    // Integral floats only: `64.0` is 64, `64.5` is not a counter.
    number_as_f64(value)
        .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
        .map(|f| f as i64)
}

/// Accept `12.5`, `"12.5"` or `12`; anything else (`null`, `""`, `"n/a"`,
/// objects) reads as `None`.
fn lenient_float<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_as_f64))
}

/// Accept `64`, `64.0` or `"64"`; out-of-range or non-integral values read
/// as `None`.
fn lenient_integer<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(number_as_i64)
        .and_then(|n| T::try_from(n).ok()))
}

/// The numeric tracker id, as a number or a numeric string.
fn integer_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    number_as_i64(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid tracker id: {value}")))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn full_device() -> serde_json::Value {
        json!({
            "id": 1001,
            "serial_number": "SN-0001",
            "name": "Kid1",
            "phone_number": "+31600000000",
            "status": "GPS",
            "uuid": "u1",
            "last_location": {
                "id": 9,
                "last_communication": "2024-06-15T10:30:00.000+02:00",
                "last_location_update": "2024-06-15T10:29:00.000+02:00",
                "address": "Damrak 1, Amsterdam",
                "latitude": "52.3745",
                "longitude": 4.8979,
                "altitude": 3.0,
                "location_type": "GPS",
                "signal_strength": 80,
                "satellite_count": 7,
                "speed": 0.0,
                "battery_percentage": 64,
                "host": "47.90.1.1",
                "port": 8080
            },
            "simcard": { "balance_cents": 1250, "tariff_type": "prepaid" }
        })
    }

    #[test]
    fn parses_every_field() {
        let body = json!([{ "device": full_device() }]).to_string();
        let devices = parse_device_list(&body).unwrap();
        assert_eq!(devices.len(), 1);

        let device = &devices[0];
        assert_eq!(device.id, 1001);
        assert_eq!(device.serial_number, "SN-0001");
        assert_eq!(device.name, "Kid1");
        assert_eq!(device.phone_number.as_deref(), Some("+31600000000"));
        assert_eq!(device.status.as_deref(), Some("GPS"));
        assert_eq!(device.uuid, "u1");

        let loc = device.last_location.clone().unwrap();
        assert_eq!(loc.id, Some(9));
        assert_eq!(
            loc.last_communication.as_deref(),
            Some("2024-06-15T10:30:00.000+02:00")
        );
        assert_eq!(
            loc.last_location_update.as_deref(),
            Some("2024-06-15T10:29:00.000+02:00")
        );
        assert_eq!(loc.address.as_deref(), Some("Damrak 1, Amsterdam"));
        assert_eq!(loc.latitude, Some(52.3745));
        assert_eq!(loc.longitude, Some(4.8979));
        assert_eq!(loc.altitude, Some(3.0));
        assert_eq!(loc.location_type.as_deref(), Some("GPS"));
        assert_eq!(loc.signal_strength, Some(80));
        assert_eq!(loc.satellite_count, Some(7));
        assert_eq!(loc.speed, Some(0.0));
        assert_eq!(loc.battery_percentage, Some(64));
        assert_eq!(loc.host.as_deref(), Some("47.90.1.1"));
        assert_eq!(loc.port, Some(8080));

        let sim = device.simcard.clone().unwrap();
        assert_eq!(sim.balance_cents, Some(1250.0));
        assert_eq!(sim.tariff_type.as_deref(), Some("prepaid"));
        assert!(device.extra.is_empty());
    }

    #[test]
    fn n_wrappers_yield_n_devices_in_order() {
        let body = json!([
            { "device": { "id": 1, "uuid": "a" } },
            { "device": { "id": 2, "uuid": "b" } },
            { "device": { "id": 3, "uuid": "c" } }
        ])
        .to_string();
        let uuids: Vec<String> = parse_device_list(&body)
            .unwrap()
            .into_iter()
            .map(|d| d.uuid)
            .collect();
        assert_eq!(uuids, vec!["a", "b", "c"]);
    }

    #[test]
    fn empty_list_is_valid() {
        assert!(parse_device_list("[]").unwrap().is_empty());
    }

    #[test]
    fn tracker_without_fix_parses() {
        let body = json!([{ "device": {
            "id": 5, "uuid": "new", "name": "Fresh",
            "last_location": null, "simcard": null, "phone_number": null
        }}])
        .to_string();
        let devices = parse_device_list(&body).unwrap();
        assert_eq!(devices.len(), 1);
        assert!(devices[0].last_location.is_none());
        assert_eq!(devices[0].coordinates(), None);
        assert_eq!(devices[0].location_name(), None);
    }

    #[test]
    fn unknown_fields_land_in_extra() {
        let body = json!([{ "device": { "id": 5, "uuid": "x", "firmware": "1.2" } }]).to_string();
        let devices = parse_device_list(&body).unwrap();
        assert_eq!(devices[0].extra.get("firmware"), Some(&json!("1.2")));
    }

    #[test]
    fn structural_failures() {
        assert!(parse_device_list("<html>login</html>").is_err());
        assert!(parse_device_list(r#"{"device": {"id": 1, "uuid": "a"}}"#).is_err());
        assert!(parse_device_list(r#"[{"id": 1, "uuid": "a"}]"#).is_err());
        assert!(parse_device_list(r#"[{"device": {"id": 1}}]"#).is_err());
    }

    #[test]
    fn unreadable_numbers_degrade_to_none() {
        let body = json!([{ "device": {
            "id": 1, "uuid": "a", "last_location": {
                "latitude": "north", "longitude": "", "speed": { "kmh": 3 },
                "battery_percentage": 64.5, "port": 70000
            }
        }}])
        .to_string();
        let devices = parse_device_list(&body).unwrap();
        let loc = devices[0].last_location.clone().unwrap();
        assert_eq!(loc.latitude, None);
        assert_eq!(loc.longitude, None);
        assert_eq!(loc.speed, None);
        assert_eq!(loc.battery_percentage, None);
        assert_eq!(loc.port, None);
    }

    #[test]
    fn null_strings_and_float_counters_do_not_fail_the_list() {
        let body = json!([
            { "device": {
                "id": "1001", "uuid": "u1", "name": null, "serial_number": null,
                "last_location": {
                    "id": "9", "battery_percentage": 64.0,
                    "signal_strength": "80", "satellite_count": 7.0, "port": "8080"
                }
            }},
            { "device": { "id": 2.0, "uuid": "u2", "name": "Kid2" } }
        ])
        .to_string();
        let devices = parse_device_list(&body).unwrap();
        assert_eq!(devices.len(), 2);

        let first = &devices[0];
        assert_eq!(first.id, 1001);
        assert_eq!(first.name, "");
        assert_eq!(first.serial_number, "");
        let loc = first.last_location.clone().unwrap();
        assert_eq!(loc.id, Some(9));
        assert_eq!(loc.battery_percentage, Some(64));
        assert_eq!(loc.signal_strength, Some(80));
        assert_eq!(loc.satellite_count, Some(7));
        assert_eq!(loc.port, Some(8080));
        assert_eq!(first.battery_level(), Some(64));

        assert_eq!(devices[1].id, 2);
        assert_eq!(devices[1].name, "Kid2");
    }

    #[test]
    fn unusable_tracker_id_is_rejected() {
        let body = json!([{ "device": { "id": "abc", "uuid": "a" } }]).to_string();
        assert!(parse_device_list(&body).is_err());
    }

    #[test]
    fn wifi_fix_reports_home() {
        let mut device: TrackerDevice =
            serde_json::from_value(full_device()).unwrap();
        assert_eq!(device.location_name(), Some("Damrak 1, Amsterdam"));
        assert_eq!(device.coordinates(), Some((52.3745, 4.8979)));
        assert_eq!(device.battery_level(), Some(64));

        if let Some(loc) = device.last_location.as_mut() {
            loc.location_type = Some("WIFI".into());
        }
        assert!(device.is_wifi_fix());
        assert_eq!(device.location_name(), Some("home"));
    }
}
