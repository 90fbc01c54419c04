//! Shared helpers for command handlers.

use std::time::Duration;

use tabled::Tabled;

use homeworks_core::{Controller, Device};

use crate::error::CliError;
use crate::output;

// ── Device rendering ─────────────────────────────────────────────────

#[derive(Tabled)]
pub struct DeviceRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Fade")]
    fade: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
}

impl DeviceRow {
    pub fn new(device: &Device, color: bool) -> Self {
        Self {
            address: device.address.clone(),
            name: device.name.clone(),
            level: output::level(device.brightness, color),
            fade: format!("{}s", device.fade_time.as_secs_f64()),
            last_seen: device
                .last_seen
                .with_timezone(&chrono::Local)
                .format("%H:%M:%S")
                .to_string(),
        }
    }
}

/// Multi-line detail view for a single device.
pub fn detail(device: &Device, color: bool) -> String {
    [
        format!("Address:    {}", device.address),
        format!("Name:       {}", device.name),
        format!("Level:      {}", output::level(device.brightness, color)),
        format!("Fade:       {}s", device.fade_time.as_secs_f64()),
        format!("First seen: {}", device.first_seen.to_rfc3339()),
        format!("Last seen:  {}", device.last_seen.to_rfc3339()),
    ]
    .join("\n")
}

/// `address level` for scripts.
pub fn plain(device: &Device) -> String {
    format!("{} {}", device.address, device.brightness)
}

/// Owned copies of the current device table, sorted by address.
pub fn devices(controller: &Controller) -> Vec<Device> {
    controller
        .devices()
        .iter()
        .map(|d| Device::clone(d))
        .collect()
}

// ── Argument parsing ─────────────────────────────────────────────────

/// `--fade` seconds into a duration, rejecting negative and non-finite values.
pub fn fade(seconds: Option<f64>) -> Result<Option<Duration>, CliError> {
    seconds
        .map(|s| {
            Duration::try_from_secs_f64(s).map_err(|_| CliError::Validation {
                field: "--fade".into(),
                reason: format!("{s} is not a non-negative number of seconds"),
                path: "the command line".into(),
            })
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fade_accepts_fractions_and_rejects_negatives() {
        assert_eq!(fade(None).unwrap(), None);
        assert_eq!(fade(Some(0.5)).unwrap(), Some(Duration::from_millis(500)));
        assert!(matches!(
            fade(Some(-1.0)),
            Err(CliError::Validation { ref field, .. }) if field == "--fade"
        ));
        assert!(fade(Some(f64::NAN)).is_err());
    }
}
