// ── Outbound commands ──
//
// The subset of the Homeworks RS-232/Telnet grammar this crate speaks.
// `Display` renders the command body; the line terminator is added by the
// `CommandWriter`, which knows the handshake phase.

use std::fmt;
use std::time::Duration;

use crate::address::DeviceAddress;
use crate::error::Error;

/// A protocol command ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `DLMON` -- enable unsolicited dimmer level reports.
    MonitorEnable,
    /// `RDL, [address]` -- request the current level of one device.
    StatusQuery { address: String },
    /// `FADEDIM, level, fade, delay, [address]` -- fade a device to a level.
    FadeDim {
        level: u8,
        fade: Duration,
        delay: Duration,
        address: String,
    },
}

impl Command {
    /// Status query for an address in the discoverable space.
    pub fn status_query(address: DeviceAddress) -> Self {
        Self::StatusQuery {
            address: address.key(),
        }
    }

    /// Status query for an arbitrary address token (brackets optional).
    pub fn query(address: &str) -> Result<Self, Error> {
        Ok(Self::StatusQuery {
            address: address_token(address)?,
        })
    }

    /// Fade `address` to `level` percent over `fade`, starting immediately.
    pub fn fade_dim(address: &str, level: u8, fade: Duration) -> Result<Self, Error> {
        if level > 100 {
            return Err(Error::InvalidLevel(level));
        }
        Ok(Self::FadeDim {
            level,
            fade,
            delay: Duration::ZERO,
            address: address_token(address)?,
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MonitorEnable => f.write_str("DLMON"),
            Self::StatusQuery { address } => write!(f, "RDL, [{address}]"),
            Self::FadeDim {
                level,
                fade,
                delay,
                address,
            } => write!(
                f,
                "FADEDIM, {level}, {}, {}, [{address}]",
                fade.as_secs_f64(),
                delay.as_secs_f64()
            ),
        }
    }
}

/// Normalise a user-supplied address to its bare `AA:BB:...` form.
///
/// Addresses outside the discoverable space are allowed here (keypads and
/// other loads live elsewhere); only the token shape is checked.
fn address_token(raw: &str) -> Result<String, Error> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);
    let well_formed = !inner.is_empty()
        && inner
            .split(':')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    if well_formed {
        Ok(inner.to_string())
    } else {
        Err(Error::InvalidAddress(raw.to_string()))
    }
}
