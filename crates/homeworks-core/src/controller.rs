// ── Controller abstraction ──
//
// Full lifecycle management for a Homeworks processor connection.
// Handles login, discovery, command routing, optional reconnection, and
// feeds level reports into the DeviceStore.

use std::sync::Arc;
use std::time::Duration;

use homeworks_api::discovery::scan_with_progress;
use homeworks_api::{
    ADDRESS_SPACE_LEN, Command, Connection, ConnectionEvent, ConnectionEvents, DeviceUpdate,
    ScanReport,
};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ControllerConfig, normalize_address};
use crate::error::CoreError;
use crate::model::Device;
use crate::reconnect::calculate_backoff;
use crate::store::{DeviceRegistry, DeviceStore, RegistryOutcome};

const EVENT_CHANNEL_SIZE: usize = 256;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
}

// ── Events ───────────────────────────────────────────────────────

/// Broadcast to every subscriber of [`Controller::events`].
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// Login complete (or not required); commands may be sent.
    Ready,
    DeviceAdded(Arc<Device>),
    DeviceUpdated(Arc<Device>),
    /// A discovery scan wrote its last query (or was cancelled).
    DiscoveryFinished(ScanReport),
    /// The link dropped. Followed by reconnection if enabled.
    Disconnected,
    Error { message: String },
}

/// Progress of the running (or last) discovery scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    pub sent: usize,
    pub total: usize,
    pub running: bool,
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Owns at most one live
/// [`Connection`] at a time; reconnection replaces it with a fresh one.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    store: Arc<DeviceStore>,
    connection_state: watch::Sender<ConnectionState>,
    event_tx: broadcast::Sender<ControllerEvent>,
    scan_progress: watch::Sender<ScanProgress>,
    cancel: CancellationToken,
    /// Child token for the current session, replaced on every `connect`.
    cancel_child: Mutex<CancellationToken>,
    connection: Mutex<Option<Arc<Connection>>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    /// Create a new Controller from configuration. Does NOT connect --
    /// call [`connect()`](Self::connect) to log in and start background tasks.
    pub fn new(config: ControllerConfig) -> Self {
        let store = Arc::new(DeviceStore::from_config(&config));
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let (scan_progress, _) = watch::channel(ScanProgress::default());
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(ControllerInner {
                config,
                store,
                connection_state,
                event_tx,
                scan_progress,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                connection: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.inner.store
    }

    /// Current device table, sorted by address.
    pub fn devices(&self) -> Arc<Vec<Arc<Device>>> {
        self.inner.store.snapshot()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn scan_progress(&self) -> watch::Receiver<ScanProgress> {
        self.inner.scan_progress.subscribe()
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Connect and wait for the processor to accept the login.
    ///
    /// On success a background task keeps consuming level reports, runs
    /// discovery if enabled, and reconnects if the policy allows.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.set_state(ConnectionState::Connecting);

        let child = self.inner.cancel.child_token();
        self.inner.cancel_child.lock().await.clone_from(&child);

        let events = match self.establish().await {
            Ok(events) => events,
            Err(e) => {
                error!(error = %e, "connection failed");
                self.set_state(ConnectionState::Failed);
                return Err(e);
            }
        };
        self.set_state(ConnectionState::Connected);

        let this = self.clone();
        let handle = tokio::spawn(async move { this.supervise(events, child).await });
        self.inner.task_handles.lock().await.push(handle);
        Ok(())
    }

    /// Close the link and stop every background task.
    pub async fn disconnect(&self) {
        self.inner.cancel_child.lock().await.cancel();

        let connection = self.inner.connection.lock().await.take();
        if let Some(connection) = connection {
            connection.closed().await;
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            handle.abort();
        }

        self.set_state(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Fade `address` to `level` percent.
    ///
    /// The fade is `fade` if given, else the device's configured fade time,
    /// else the controller default.
    pub async fn set_level(
        &self,
        address: &str,
        level: u8,
        fade: Option<Duration>,
    ) -> Result<(), CoreError> {
        let address = normalize_address(address);
        if self.inner.store.is_ignored(&address) {
            return Err(CoreError::Validation {
                message: format!("device {address} is on the ignore list"),
            });
        }

        let fade = fade
            .or_else(|| self.inner.store.get(&address).map(|d| d.fade_time))
            .unwrap_or_else(|| self.inner.store.fade_time_for(&address));
        let command = Command::fade_dim(&address, level, fade)?;

        let connection = self.require_connection().await?;
        info!(%address, level, fade_secs = fade.as_secs_f64(), "setting level");
        connection.send(&command).await?;
        Ok(())
    }

    /// Ask the processor for the current level of one address. The reply
    /// arrives later as a device event.
    pub async fn query(&self, address: &str) -> Result<(), CoreError> {
        let command = Command::query(address)?;
        let connection = self.require_connection().await?;
        debug!(address, "querying level");
        connection.send(&command).await?;
        Ok(())
    }

    /// Query one address and wait up to `timeout` for its report.
    pub async fn query_and_wait(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<Arc<Device>, CoreError> {
        let wanted = normalize_address(address);
        let mut events = self.events();
        self.query(&wanted).await?;

        let wait = async {
            loop {
                match events.recv().await {
                    Ok(ControllerEvent::DeviceAdded(d) | ControllerEvent::DeviceUpdated(d))
                        if d.address == wanted =>
                    {
                        return Ok(d);
                    }
                    Ok(ControllerEvent::Disconnected) | Err(broadcast::error::RecvError::Closed) => {
                        return Err(CoreError::Disconnected);
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                }
            }
        };

        let outcome = tokio::time::timeout(timeout, wait).await;
        outcome.unwrap_or(Err(CoreError::DeviceNotFound { address: wanted }))
    }

    /// Run a full discovery scan now, publishing progress on
    /// [`scan_progress`](Self::scan_progress).
    pub async fn discover(&self) -> Result<ScanReport, CoreError> {
        let cancel = self.inner.cancel_child.lock().await.clone();
        self.discover_with(&cancel).await
    }

    // ── Internals ────────────────────────────────────────────────

    fn set_state(&self, state: ConnectionState) {
        self.inner.connection_state.send_replace(state);
    }

    fn publish(&self, event: ControllerEvent) {
        // Ignore send errors -- just means no active subscribers right now
        let _ = self.inner.event_tx.send(event);
    }

    async fn require_connection(&self) -> Result<Arc<Connection>, CoreError> {
        self.inner
            .connection
            .lock()
            .await
            .clone()
            .ok_or(CoreError::Disconnected)
    }

    fn route_update(&self, update: &DeviceUpdate) {
        let registry: &dyn DeviceRegistry = self.inner.store.as_ref();
        match registry.apply(update) {
            RegistryOutcome::Added(device) => {
                info!(address = %device.address, name = %device.name, level = device.brightness, "new device");
                self.publish(ControllerEvent::DeviceAdded(device));
            }
            RegistryOutcome::Updated(device) => {
                self.publish(ControllerEvent::DeviceUpdated(device));
            }
            RegistryOutcome::Ignored => {}
        }
    }

    /// Open a fresh connection, wait for the login verdict, and start
    /// discovery if enabled.
    async fn establish(&self) -> Result<ConnectionEvents, CoreError> {
        let (connection, mut events) = Connection::open(self.inner.config.connection.clone()).await?;
        info!(target = connection.target(), "link open, waiting for login");

        loop {
            match events.recv().await {
                Some(ConnectionEvent::Ready) => break,
                Some(ConnectionEvent::DeviceUpdate(update)) => self.route_update(&update),
                Some(ConnectionEvent::Error(e)) => return Err(e.into()),
                Some(ConnectionEvent::Closed) | None => return Err(CoreError::Disconnected),
            }
        }

        info!(target = connection.target(), "processor ready");
        *self.inner.connection.lock().await = Some(Arc::new(connection));
        self.publish(ControllerEvent::Ready);

        if self.inner.config.discovery {
            self.spawn_discovery().await;
        }
        Ok(events)
    }

    async fn spawn_discovery(&self) {
        let this = self.clone();
        let delay = self.inner.config.discovery_delay;
        let cancel = self.inner.cancel_child.lock().await.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            if let Err(e) = this.discover_with(&cancel).await {
                warn!(error = %e, "discovery did not finish");
            }
        });
        self.inner.task_handles.lock().await.push(handle);
    }

    async fn discover_with(&self, cancel: &CancellationToken) -> Result<ScanReport, CoreError> {
        let writer = self.require_connection().await?.writer();
        let progress = &self.inner.scan_progress;
        progress.send_replace(ScanProgress {
            sent: 0,
            total: ADDRESS_SPACE_LEN,
            running: true,
        });

        let result = scan_with_progress(&writer, cancel, |sent| {
            progress.send_modify(|p| p.sent = sent);
        })
        .await;
        progress.send_modify(|p| p.running = false);

        let report = result?;
        self.publish(ControllerEvent::DiscoveryFinished(report));
        Ok(report)
    }

    /// Consume events for the lifetime of the session, reconnecting when
    /// the policy allows.
    async fn supervise(self, mut events: ConnectionEvents, cancel: CancellationToken) {
        loop {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return,
                    event = events.recv() => match event {
                        Some(ConnectionEvent::DeviceUpdate(update)) => self.route_update(&update),
                        Some(ConnectionEvent::Error(e)) => {
                            warn!(error = %e, "connection error");
                            self.publish(ControllerEvent::Error { message: e.to_string() });
                        }
                        Some(ConnectionEvent::Ready) => {}
                        Some(ConnectionEvent::Closed) | None => break,
                    },
                }
            }

            self.inner.connection.lock().await.take();
            self.publish(ControllerEvent::Disconnected);

            if !self.inner.config.reconnect.enabled {
                info!("connection closed");
                self.set_state(ConnectionState::Disconnected);
                return;
            }

            match self.reconnect(&cancel).await {
                Some(next) => events = next,
                None => return,
            }
        }
    }

    async fn reconnect(&self, cancel: &CancellationToken) -> Option<ConnectionEvents> {
        let policy = &self.inner.config.reconnect;
        let mut attempt: u32 = 0;

        loop {
            if !policy.allows(attempt) {
                error!(max_retries = ?policy.max_retries, "reconnection limit reached, giving up");
                self.set_state(ConnectionState::Failed);
                return None;
            }

            let delay = calculate_backoff(attempt, policy);
            self.set_state(ConnectionState::Reconnecting {
                attempt: attempt + 1,
            });
            info!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                attempt,
                "waiting before reconnect"
            );

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                result = async {
                    tokio::time::sleep(delay).await;
                    self.establish().await
                } => result,
            };

            match result {
                Ok(events) => {
                    info!(attempt, "reconnected");
                    self.set_state(ConnectionState::Connected);
                    return Some(events);
                }
                Err(e) if !e.is_retryable() => {
                    error!(error = %e, "reconnect failed permanently");
                    self.publish(ControllerEvent::Error {
                        message: e.to_string(),
                    });
                    self.set_state(ConnectionState::Failed);
                    return None;
                }
                Err(e) => {
                    warn!(error = %e, attempt, "reconnect attempt failed");
                    attempt += 1;
                }
            }
        }
    }
}
