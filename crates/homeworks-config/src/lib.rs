//! Configuration for homeworks tools.
//!
//! One TOML file in the platform config directory, merged over built-in
//! defaults and overridden by `HOMEWORKS_*` environment variables. The file
//! is translated into a [`ControllerConfig`] once, at startup; nothing below
//! this crate reads configuration from disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use homeworks_api::Command;
use homeworks_core::{
    ConnectionConfig, ControllerConfig, DeviceOverride, HandshakeMode, Pacing, ReconnectConfig,
    TransportKind,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Keyring service name for stored processor passwords.
pub const KEYRING_SERVICE: &str = "homeworks";

/// Overrides the config file location when set.
pub const CONFIG_PATH_ENV: &str = "HOMEWORKS_CONFIG";

/// Password override, checked before the keyring and the file.
pub const PASSWORD_ENV: &str = "HOMEWORKS_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {reason}")]
    Validation { field: String, reason: String },

    #[error("could not determine a config directory for this platform")]
    NoConfigDir,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to load config: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Schema ──────────────────────────────────────────────────────────

/// On-disk configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection_type: TransportKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_path: Option<String>,
    pub baud_rate: u32,
    pub login_required: bool,
    pub handshake: HandshakeMode,
    /// Zero waits forever.
    pub handshake_timeout_secs: u64,
    pub username: String,
    /// Plaintext fallback; the keyring and `HOMEWORKS_PASSWORD` win.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Seconds.
    pub default_fade_time: f64,
    pub discovery: bool,
    pub discovery_delay_ms: u64,
    /// Minimum gap between writes. Zero disables pacing.
    pub pacing_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignore_devices: Vec<String>,
    pub reconnect: ReconnectSettings,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<DeviceEntry>,
}

impl Default for Config {
    fn default() -> Self {
        let connection = ConnectionConfig::default();
        let controller = ControllerConfig::default();
        Self {
            connection_type: connection.kind,
            host: None,
            port: connection.port,
            serial_path: None,
            baud_rate: connection.baud_rate,
            login_required: connection.login_required,
            handshake: connection.handshake,
            handshake_timeout_secs: connection.handshake_timeout.map_or(0, |t| t.as_secs()),
            username: connection.username,
            password: None,
            default_fade_time: controller.default_fade_time.as_secs_f64(),
            discovery: controller.discovery,
            discovery_delay_ms: u64::try_from(controller.discovery_delay.as_millis())
                .unwrap_or(u64::MAX),
            pacing_ms: 0,
            reconnect: ReconnectSettings::default(),
            devices: Vec::new(),
            ignore_devices: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    pub enabled: bool,
    pub initial_delay_secs: u64,
    pub max_delay_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        let defaults = ReconnectConfig::default();
        Self {
            enabled: defaults.enabled,
            initial_delay_secs: defaults.initial_delay.as_secs(),
            max_delay_secs: defaults.max_delay.as_secs(),
            max_retries: defaults.max_retries,
        }
    }
}

/// Per-device name and fade time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_time: Option<f64>,
}

// ── Paths & loading ─────────────────────────────────────────────────

/// Location of `config.toml`: `HOMEWORKS_CONFIG` if set, else the platform
/// config directory.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }
    if let Some(dirs) = directories::ProjectDirs::from("com", "homeworks", "homeworks") {
        return Ok(dirs.config_dir().join("config.toml"));
    }
    std::env::var_os("HOME")
        .map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("homeworks")
                .join("config.toml")
        })
        .ok_or(ConfigError::NoConfigDir)
}

/// Load from the default path. A missing file yields the defaults.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path()?)
}

/// Defaults, then `path`, then `HOMEWORKS_*` variables. Nested keys use a
/// double underscore (`HOMEWORKS_RECONNECT__ENABLED=true`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HOMEWORKS_").split("__"))
        .extract()?;
    Ok(config)
}

/// Write `config` to `path` as pretty TOML, creating parent directories.
pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let rendered = toml::to_string_pretty(config)?;
    std::fs::write(path, rendered)?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    save_config_to(config, &config_path()?)
}

// ── Credentials ─────────────────────────────────────────────────────

/// Password for `config.username`: env, keyring, plaintext, protocol default.
pub fn resolve_password(config: &Config) -> SecretString {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return SecretString::from(password);
    }
    if let Some(password) = keyring_password(&config.username) {
        return SecretString::from(password);
    }
    if let Some(ref password) = config.password {
        return SecretString::from(password.clone());
    }
    SecretString::from(homeworks_api::config::DEFAULT_PASSWORD.to_string())
}

fn keyring_password(username: &str) -> Option<String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, username).ok()?;
    match entry.get_password() {
        Ok(password) => Some(password),
        Err(err) => {
            debug!(%username, error = %err, "no keyring password");
            None
        }
    }
}

/// Store `password` for `username` in the system keyring.
pub fn store_password(username: &str, password: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, username)?.set_password(password)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

fn seconds(field: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| invalid(field, format!("{value} is not a non-negative number of seconds")))
}

fn address(field: &str, raw: &str) -> Result<(), ConfigError> {
    Command::query(raw)
        .map(drop)
        .map_err(|_| invalid(field, format!("'{raw}' is not a device address")))
}

impl Config {
    /// Check everything that can be checked without opening a link.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.connection_type {
            TransportKind::Tcp if self.host.as_deref().is_none_or(str::is_empty) => {
                return Err(invalid("host", "required when connection_type is \"tcp\""));
            }
            TransportKind::Serial if self.serial_path.as_deref().is_none_or(str::is_empty) => {
                return Err(invalid(
                    "serial_path",
                    "required when connection_type is \"serial\"",
                ));
            }
            _ => {}
        }
        if self.baud_rate == 0 {
            return Err(invalid("baud_rate", "must be greater than zero"));
        }
        if self.login_required && self.username.trim().is_empty() {
            return Err(invalid("username", "required when login_required is set"));
        }
        seconds("default_fade_time", self.default_fade_time)?;
        if self.reconnect.initial_delay_secs > self.reconnect.max_delay_secs {
            return Err(invalid(
                "reconnect.initial_delay_secs",
                "must not exceed reconnect.max_delay_secs",
            ));
        }
        for (i, device) in self.devices.iter().enumerate() {
            address(&format!("devices[{i}].address"), &device.address)?;
            if let Some(fade) = device.fade_time {
                seconds(&format!("devices[{i}].fade_time"), fade)?;
            }
        }
        for (i, raw) in self.ignore_devices.iter().enumerate() {
            address(&format!("ignore_devices[{i}]"), raw)?;
        }
        Ok(())
    }

    /// Validate and build the runtime controller configuration.
    pub fn to_controller_config(
        &self,
        password: SecretString,
    ) -> Result<ControllerConfig, ConfigError> {
        self.validate()?;

        let connection = ConnectionConfig {
            kind: self.connection_type,
            serial_path: self.serial_path.clone(),
            baud_rate: self.baud_rate,
            host: self.host.clone(),
            port: self.port,
            login_required: self.login_required,
            username: self.username.clone(),
            password,
            handshake: self.handshake,
            handshake_timeout: (self.handshake_timeout_secs > 0)
                .then(|| Duration::from_secs(self.handshake_timeout_secs)),
            pacing: match self.pacing_ms {
                0 => Pacing::Unpaced,
                ms => Pacing::Interval(Duration::from_millis(ms)),
            },
            ..ConnectionConfig::default()
        };

        let devices = self
            .devices
            .iter()
            .map(|d| DeviceOverride {
                address: homeworks_core::normalize_address(&d.address),
                name: d.name.clone(),
                // validate() already rejected bad values
                fade_time: d.fade_time.and_then(|s| Duration::try_from_secs_f64(s).ok()),
            })
            .collect();

        Ok(ControllerConfig {
            connection,
            default_fade_time: seconds("default_fade_time", self.default_fade_time)?,
            discovery: self.discovery,
            discovery_delay: Duration::from_millis(self.discovery_delay_ms),
            devices,
            ignore_devices: self
                .ignore_devices
                .iter()
                .map(|a| homeworks_core::normalize_address(a))
                .collect(),
            reconnect: ReconnectConfig {
                enabled: self.reconnect.enabled,
                initial_delay: Duration::from_secs(self.reconnect.initial_delay_secs),
                max_delay: Duration::from_secs(self.reconnect.max_delay_secs),
                max_retries: self.reconnect.max_retries,
            },
        })
    }
}
