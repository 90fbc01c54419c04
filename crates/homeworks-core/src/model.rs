// ── Domain model ──

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// A lighting load the processor has reported at least once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    /// Bare `AA:BB:CC:DD:EE` address.
    pub address: String,
    /// Configured name, or the address when none is configured.
    pub name: String,
    #[serde(rename = "fade_time_secs", serialize_with = "serialize_secs")]
    pub fade_time: Duration,
    /// Last reported level, 0-100.
    pub brightness: u8,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Device {
    pub fn is_on(&self) -> bool {
        self.brightness > 0
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's signature
fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}
