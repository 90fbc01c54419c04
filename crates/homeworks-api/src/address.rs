// ── Device addressing ──
//
// Homeworks names every load with a five-field bracketed address, e.g.
// `[01:04:01:01:05]`. Discovery walks a fixed slice of that space.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::Error;

/// Per-field ranges of the discoverable address space, outermost first.
pub const FIELD_RANGES: [RangeInclusive<u8>; 5] = [1..=16, 4..=6, 1..=4, 1..=12, 1..=4];

/// Number of addresses in the discoverable space (16·3·4·12·4 = 9,216).
pub const ADDRESS_SPACE_LEN: usize = space_len();

#[allow(clippy::as_conversions)]
const fn space_len() -> usize {
    let mut len = 1;
    let mut i = 0;
    while i < FIELD_RANGES.len() {
        let range = &FIELD_RANGES[i];
        len *= (*range.end() - *range.start()) as usize + 1;
        i += 1;
    }
    len
}

/// A validated address inside the discoverable space.
///
/// `Display` renders the wire token (`[AA:BB:CC:DD:EE]`); [`key`](Self::key)
/// renders the bare form used to identify devices (`AA:BB:CC:DD:EE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceAddress([u8; 5]);

impl DeviceAddress {
    pub fn new(fields: [u8; 5]) -> Result<Self, Error> {
        let in_range = fields
            .iter()
            .zip(FIELD_RANGES.iter())
            .all(|(value, range)| range.contains(value));
        if in_range {
            Ok(Self(fields))
        } else {
            Err(Error::InvalidAddress(format_fields(&fields)))
        }
    }

    pub fn fields(self) -> [u8; 5] {
        self.0
    }

    /// Bare `AA:BB:CC:DD:EE` form, as carried in [`DeviceUpdate`](crate::DeviceUpdate).
    pub fn key(self) -> String {
        format_fields(&self.0)
    }

    /// Every discoverable address in scan order.
    pub fn all() -> AddressSpace {
        AddressSpace { next: 0 }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", format_fields(&self.0))
    }
}

impl FromStr for DeviceAddress {
    type Err = Error;

    /// Accepts `AA:BB:CC:DD:EE` with or without surrounding brackets.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || Error::InvalidAddress(s.to_string());
        let inner = s.trim();
        let inner = inner
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(inner);

        let mut fields = [0u8; 5];
        let mut parts = inner.split(':');
        for slot in &mut fields {
            *slot = parts
                .next()
                .and_then(|p| p.trim().parse().ok())
                .ok_or_else(bad)?;
        }
        if parts.next().is_some() {
            return Err(bad());
        }
        Self::new(fields).map_err(|_| bad())
    }
}

fn format_fields(fields: &[u8; 5]) -> String {
    let [a, b, c, d, e] = fields;
    format!("{a:02}:{b:02}:{c:02}:{d:02}:{e:02}")
}

/// Iterator over the discoverable address space in nested field order
/// (first field outermost, last field innermost).
#[derive(Debug, Clone)]
pub struct AddressSpace {
    next: usize,
}

impl Iterator for AddressSpace {
    type Item = DeviceAddress;

    fn next(&mut self) -> Option<DeviceAddress> {
        if self.next >= ADDRESS_SPACE_LEN {
            return None;
        }
        let mut rem = self.next;
        let mut fields = [0u8; 5];
        for (slot, range) in fields.iter_mut().zip(FIELD_RANGES.iter()).rev() {
            let width = usize::from(range.end() - range.start()) + 1;
            // `rem % width` is below 16, so the narrowing is lossless.
            *slot = range.start() + u8::try_from(rem % width).unwrap_or_default();
            rem /= width;
        }
        self.next += 1;
        Some(DeviceAddress(fields))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = ADDRESS_SPACE_LEN.saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for AddressSpace {}
