//! Session layer between `homeworks-api` and user-facing front ends.
//!
//! - **[`Controller`]**: Central facade: [`connect()`](Controller::connect)
//!   opens the link and waits for login, then a background task feeds level
//!   reports into the store, runs discovery, and reconnects with backoff
//!   when enabled. Commands (`set_level`, `query`) go straight to the live
//!   connection.
//!
//! - **[`DeviceStore`]**: Concurrent device table (`DashMap` +
//!   `tokio::sync::watch` snapshot) implementing the [`DeviceRegistry`]
//!   seam. Applies per-device names, fade times and the ignore list.
//!
//! - **[`ControllerConfig`]**: Runtime configuration, built by the CLI from
//!   `homeworks-config`. Core never reads config files.

pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod reconnect;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ControllerConfig, DeviceOverride, normalize_address};
pub use controller::{ConnectionState, Controller, ControllerEvent, ScanProgress};
pub use error::CoreError;
pub use model::Device;
pub use reconnect::ReconnectConfig;
pub use store::{DeviceRegistry, DeviceStore, RegistryOutcome};

// Protocol types that appear in this crate's public API.
pub use homeworks_api::{ConnectionConfig, HandshakeMode, Pacing, ScanReport, TransportKind};
