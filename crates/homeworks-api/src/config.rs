// ── Connection configuration ──
//
// Strongly-typed description of *how* to reach one Homeworks processor.
// Built once by the caller (usually from `homeworks-config`), validated at
// construction, and immutable for the lifetime of a connection attempt.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::writer::Pacing;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_PORT: u16 = 23;
pub const DEFAULT_USERNAME: &str = "lutron";
pub const DEFAULT_PASSWORD: &str = "integration";
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Which physical link to open.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TransportKind {
    /// RS-232 serial port.
    #[default]
    Serial,
    /// Telnet-style TCP stream.
    Tcp,
}

/// Which login exchange the processor expects.
///
/// Processors in the field disagree: some print a `LOGIN:` prompt and wait,
/// others accept credentials as soon as the link is up and never prompt.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HandshakeMode {
    /// Wait for a line containing `LOGIN:` before sending credentials.
    Prompt,
    /// Send credentials right after the transport opens.
    #[default]
    Immediate,
}

/// Configuration for a single connection attempt.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub kind: TransportKind,
    /// Serial device path (e.g. `/dev/ttyUSB0`). Required for [`TransportKind::Serial`].
    pub serial_path: Option<String>,
    pub baud_rate: u32,
    /// Processor host name or IP. Required for [`TransportKind::Tcp`].
    pub host: Option<String>,
    pub port: u16,
    pub login_required: bool,
    pub username: String,
    pub password: SecretString,
    pub handshake: HandshakeMode,
    /// Fail the attempt if login has not completed within this window.
    /// `None` waits forever.
    pub handshake_timeout: Option<Duration>,
    /// Maximum number of queued outbound writes before `write` waits.
    pub outbound_capacity: usize,
    /// Write pacing applied at the command writer.
    pub pacing: Pacing,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            serial_path: None,
            baud_rate: DEFAULT_BAUD_RATE,
            host: None,
            port: DEFAULT_PORT,
            login_required: false,
            username: DEFAULT_USERNAME.into(),
            password: SecretString::from(DEFAULT_PASSWORD.to_string()),
            handshake: HandshakeMode::default(),
            handshake_timeout: Some(DEFAULT_HANDSHAKE_TIMEOUT),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            pacing: Pacing::default(),
        }
    }
}

impl ConnectionConfig {
    /// TCP connection to `host` on the default Telnet port.
    pub fn tcp(host: impl Into<String>) -> Self {
        Self {
            kind: TransportKind::Tcp,
            host: Some(host.into()),
            ..Self::default()
        }
    }

    /// Serial connection on `path` at the default baud rate.
    pub fn serial(path: impl Into<String>) -> Self {
        Self {
            kind: TransportKind::Serial,
            serial_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Require a login with the given credentials.
    pub fn with_login(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.login_required = true;
        self.username = username.into();
        self.password = password;
        self
    }

    pub fn with_handshake(mut self, mode: HandshakeMode) -> Self {
        self.handshake = mode;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Check that the fields required by `kind` are present and sane.
    pub fn validate(&self) -> Result<(), Error> {
        match self.kind {
            TransportKind::Serial => {
                if self.serial_path.as_deref().is_none_or(str::is_empty) {
                    return Err(invalid("serial_path", "required for serial connections"));
                }
                if self.baud_rate == 0 {
                    return Err(invalid("baud_rate", "must be greater than zero"));
                }
            }
            TransportKind::Tcp => {
                if self.host.as_deref().is_none_or(str::is_empty) {
                    return Err(invalid("host", "required for tcp connections"));
                }
                if self.port == 0 {
                    return Err(invalid("port", "must be greater than zero"));
                }
            }
        }
        if self.outbound_capacity == 0 {
            return Err(invalid("outbound_capacity", "must be greater than zero"));
        }
        if self.login_required && self.username.is_empty() {
            return Err(invalid("username", "required when login is enabled"));
        }
        Ok(())
    }

    /// Human-readable link description for logs and error messages.
    pub fn target(&self) -> String {
        match self.kind {
            TransportKind::Serial => format!(
                "{}@{}",
                self.serial_path.as_deref().unwrap_or("<none>"),
                self.baud_rate
            ),
            TransportKind::Tcp => {
                format!("{}:{}", self.host.as_deref().unwrap_or("<none>"), self.port)
            }
        }
    }

    /// The credential line sent during login, carriage return included.
    pub(crate) fn login_line(&self) -> String {
        format!("{}, {}\r", self.username, self.password.expose_secret())
    }
}

fn invalid(field: &str, reason: &str) -> Error {
    Error::InvalidConfig {
        field: field.into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_processor_factory_settings() {
        let cfg = ConnectionConfig::default();
        assert_eq!(cfg.baud_rate, 115_200);
        assert_eq!(cfg.port, 23);
        assert_eq!(cfg.username, "lutron");
        assert_eq!(cfg.password.expose_secret(), "integration");
        assert!(!cfg.login_required);
        assert_eq!(cfg.handshake, HandshakeMode::Immediate);
    }

    #[test]
    fn tcp_requires_host() {
        let cfg = ConnectionConfig {
            kind: TransportKind::Tcp,
            ..ConnectionConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(Error::InvalidConfig { ref field, .. }) if field == "host"
        ));
        assert!(ConnectionConfig::tcp("10.0.0.5").validate().is_ok());
    }

    #[test]
    fn serial_requires_path() {
        assert!(ConnectionConfig::default().validate().is_err());
        assert!(ConnectionConfig::serial("/dev/ttyUSB0").validate().is_ok());
    }

    #[test]
    fn login_line_embeds_single_carriage_return() {
        let cfg = ConnectionConfig::tcp("h").with_login("lutron", "integration".to_string().into());
        assert_eq!(cfg.login_line(), "lutron, integration\r");
    }

    #[test]
    fn target_describes_link() {
        assert_eq!(ConnectionConfig::tcp("10.0.0.5").target(), "10.0.0.5:23");
        assert_eq!(
            ConnectionConfig::serial("/dev/ttyS0").with_baud_rate(9600).target(),
            "/dev/ttyS0@9600"
        );
    }

    #[test]
    fn kinds_parse_case_insensitively() {
        assert_eq!("TCP".parse::<TransportKind>().ok(), Some(TransportKind::Tcp));
        assert_eq!("prompt".parse::<HandshakeMode>().ok(), Some(HandshakeMode::Prompt));
    }
}
