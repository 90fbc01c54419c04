// ── Runtime controller configuration ──
//
// Everything the controller needs beyond the link itself: per-device
// overrides, discovery timing, reconnection. Never touches disk; the CLI
// builds one from `homeworks-config` and hands it in.

use std::time::Duration;

use homeworks_api::ConnectionConfig;

use crate::reconnect::ReconnectConfig;

pub const DEFAULT_FADE_TIME: Duration = Duration::from_secs(1);
pub const DEFAULT_DISCOVERY_DELAY: Duration = Duration::from_millis(100);

/// Name and fade time pinned to one device address.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceOverride {
    /// Bare `AA:BB:CC:DD:EE` address (brackets are stripped on load).
    pub address: String,
    pub name: Option<String>,
    pub fade_time: Option<Duration>,
}

/// Configuration for one controller instance.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub connection: ConnectionConfig,
    /// Fade used when neither the command nor the device specifies one.
    pub default_fade_time: Duration,
    /// Scan the address space once the connection is ready.
    pub discovery: bool,
    /// Pause between login completion and the first discovery write.
    pub discovery_delay: Duration,
    pub devices: Vec<DeviceOverride>,
    /// Addresses whose reports are dropped and which refuse commands.
    pub ignore_devices: Vec<String>,
    pub reconnect: ReconnectConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            default_fade_time: DEFAULT_FADE_TIME,
            discovery: true,
            discovery_delay: DEFAULT_DISCOVERY_DELAY,
            devices: Vec::new(),
            ignore_devices: Vec::new(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            ..Self::default()
        }
    }
}

/// Strip brackets and whitespace so `[01:04:01:01:05]` and `01:04:01:01:05`
/// name the same device.
pub fn normalize_address(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}
