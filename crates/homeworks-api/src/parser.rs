// ── Response parsing ──
//
// Best-effort extraction of level reports from forwarded lines. The wire
// protocol is chatty and partially undocumented, so anything that does not
// look like a `DL` report is dropped without complaint.

use serde::Serialize;
use tracing::trace;

const LEVEL_MARKER: &str = "DL, ";

/// A level report for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceUpdate {
    /// Bare address, brackets stripped (e.g. `01:04:01:01:05`).
    pub address: String,
    /// Brightness in percent, 0-100.
    pub brightness: u8,
}

/// Parse a `DL, [<address>], <level>` report.
///
/// Field 1 is the bracketed address, field 2 the level. The level is read
/// with leading-integer semantics, so `87%` and `87.5` both yield 87.
/// Returns `None` for any line that is not a well-formed report.
pub fn parse(line: &str) -> Option<DeviceUpdate> {
    if !line.contains(LEVEL_MARKER) {
        return None;
    }

    let mut fields = line.split(',');
    fields.next()?;
    let address = strip_brackets(fields.next()?.trim())?;
    let brightness = leading_integer(fields.next()?)?;
    if brightness > 100 {
        trace!(line, "level out of range, skipping");
        return None;
    }

    Some(DeviceUpdate {
        address: address.to_string(),
        brightness,
    })
}

fn strip_brackets(field: &str) -> Option<&str> {
    let inner = field.strip_prefix('[')?.strip_suffix(']')?.trim();
    if inner.is_empty() { None } else { Some(inner) }
}

fn leading_integer(field: &str) -> Option<u8> {
    let field = field.trim_start();
    let digits_end = field
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(field.len());
    field.get(..digits_end)?.parse().ok()
}
