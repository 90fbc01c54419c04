// ── Device registry ──
//
// Consumer side of the protocol engine's level reports. The engine only
// produces (address, brightness) pairs; naming, fade times, ignore lists and
// timestamps all live here.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use homeworks_api::DeviceUpdate;
use tokio::sync::watch;
use tracing::debug;

use crate::config::{ControllerConfig, DeviceOverride, normalize_address};
use crate::model::Device;

/// What a registry did with one update.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryOutcome {
    /// First sighting of this address.
    Added(Arc<Device>),
    /// Known address, state refreshed.
    Updated(Arc<Device>),
    /// Address is on the ignore list.
    Ignored,
}

/// Anything that consumes device level reports.
pub trait DeviceRegistry: Send + Sync {
    fn apply(&self, update: &DeviceUpdate) -> RegistryOutcome;
}

/// Concurrent device table with a `watch` snapshot for subscribers.
///
/// Every mutation rebuilds the snapshot, sorted by address, so readers
/// never lock the map.
pub struct DeviceStore {
    devices: DashMap<String, Arc<Device>>,
    overrides: HashMap<String, DeviceOverride>,
    ignored: HashSet<String>,
    default_fade_time: Duration,
    snapshot: watch::Sender<Arc<Vec<Arc<Device>>>>,
}

impl DeviceStore {
    pub fn new(default_fade_time: Duration) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            devices: DashMap::new(),
            overrides: HashMap::new(),
            ignored: HashSet::new(),
            default_fade_time,
            snapshot,
        }
    }

    /// Store seeded with the overrides and ignore list from `config`.
    pub fn from_config(config: &ControllerConfig) -> Self {
        let mut store = Self::new(config.default_fade_time);
        for device in &config.devices {
            let address = normalize_address(&device.address);
            store.overrides.insert(
                address.clone(),
                DeviceOverride {
                    address,
                    ..device.clone()
                },
            );
        }
        store.ignored = config
            .ignore_devices
            .iter()
            .map(|a| normalize_address(a))
            .collect();
        store
    }

    pub fn is_ignored(&self, address: &str) -> bool {
        self.ignored.contains(&normalize_address(address))
    }

    pub fn get(&self, address: &str) -> Option<Arc<Device>> {
        self.devices
            .get(&normalize_address(address))
            .map(|r| Arc::clone(r.value()))
    }

    /// Fade time to use for `address`: its override if one is configured,
    /// else the store default.
    pub fn fade_time_for(&self, address: &str) -> Duration {
        self.overrides
            .get(&normalize_address(address))
            .and_then(|o| o.fade_time)
            .unwrap_or(self.default_fade_time)
    }

    /// Display name for `address`, falling back to the address itself.
    pub fn name_for(&self, address: &str) -> String {
        let address = normalize_address(address);
        self.overrides
            .get(&address)
            .and_then(|o| o.name.clone())
            .unwrap_or(address)
    }

    /// All known devices, sorted by address (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<Device>>>> {
        self.snapshot.subscribe()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    fn rebuild_snapshot(&self) {
        let mut values: Vec<Arc<Device>> =
            self.devices.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by(|a, b| a.address.cmp(&b.address));
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

impl DeviceRegistry for DeviceStore {
    fn apply(&self, update: &DeviceUpdate) -> RegistryOutcome {
        let address = normalize_address(&update.address);
        if self.ignored.contains(&address) {
            debug!(%address, "ignoring report for ignored device");
            return RegistryOutcome::Ignored;
        }

        let now = Utc::now();
        let (device, added) = match self.devices.get(&address).map(|r| Arc::clone(r.value())) {
            Some(existing) => (
                Device {
                    brightness: update.brightness,
                    last_seen: now,
                    ..(*existing).clone()
                },
                false,
            ),
            None => (
                Device {
                    name: self.name_for(&address),
                    fade_time: self.fade_time_for(&address),
                    address: address.clone(),
                    brightness: update.brightness,
                    first_seen: now,
                    last_seen: now,
                },
                true,
            ),
        };

        let device = Arc::new(device);
        self.devices.insert(address, Arc::clone(&device));
        self.rebuild_snapshot();

        if added {
            debug!(address = %device.address, name = %device.name, level = device.brightness, "device added");
            RegistryOutcome::Added(device)
        } else {
            debug!(address = %device.address, level = device.brightness, "device updated");
            RegistryOutcome::Updated(device)
        }
    }
}
