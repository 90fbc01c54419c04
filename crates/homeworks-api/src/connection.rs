//! One live session with a Homeworks processor.
//!
//! [`Connection::open`] opens the transport and spawns a single driver task
//! that owns the line framer and the login state machine. The driver turns
//! inbound bytes into [`ConnectionEvent`]s delivered over a bounded channel;
//! outbound traffic goes through the shared [`CommandWriter`].
//!
//! ```rust,ignore
//! use homeworks_api::{Connection, ConnectionConfig, ConnectionEvent};
//!
//! let (conn, mut events) = Connection::open(ConnectionConfig::tcp("10.0.0.5")).await?;
//! while let Some(event) = events.recv().await {
//!     if let ConnectionEvent::DeviceUpdate(update) = event {
//!         println!("{} -> {}%", update.address, update.brightness);
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::Command;
use crate::config::ConnectionConfig;
use crate::discovery::{self, ScanReport};
use crate::error::Error;
use crate::framing::LineFramer;
use crate::handshake::{Classification, HandshakeState, LoginHandshake};
use crate::parser::{self, DeviceUpdate};
use crate::transport::{StreamTransport, Transport, TransportEvent, TransportEvents};
use crate::writer::CommandWriter;

const EVENT_CHANNEL_SIZE: usize = 256;

// ── State & events ───────────────────────────────────────────────────

/// Lifecycle of a single connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Transport open, login not yet started.
    Connected,
    /// Credentials expected or sent, verdict outstanding.
    AwaitingLogin,
    /// Ready for traffic (either logged in or no login required).
    Authenticated,
    Closed,
    Failed,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// What the connection reports to its consumer.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A parsed level report.
    DeviceUpdate(DeviceUpdate),
    /// Traffic may flow. Sent exactly once per connection, never after a
    /// login failure.
    Ready,
    /// Handshake failure, handshake timeout, or I/O error. A `Closed` event
    /// always follows eventually.
    Error(Error),
    /// The link is gone. Always the last event.
    Closed,
}

pub type ConnectionEvents = mpsc::Receiver<ConnectionEvent>;

// ── Connection ───────────────────────────────────────────────────────

/// Handle to a live connection. Dropping it closes the link.
pub struct Connection {
    writer: Arc<CommandWriter<StreamTransport>>,
    state: watch::Receiver<ConnectionState>,
    handshake: watch::Receiver<HandshakeState>,
    drained: CancellationToken,
    target: String,
}

impl Connection {
    /// Open the transport and start the driver.
    ///
    /// Returns as soon as the link is up. Login progress, level reports and
    /// the eventual close arrive on the returned event receiver.
    pub async fn open(config: ConnectionConfig) -> Result<(Self, ConnectionEvents), Error> {
        let (transport, transport_events) = StreamTransport::open(&config).await?;
        let target = transport.target().to_string();
        let drained = transport.drained();

        let login = LoginHandshake::new(&config);
        let (handshake_tx, handshake_rx) = watch::channel(login.state());
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connected);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);

        let writer = Arc::new(CommandWriter::new(
            Arc::new(transport),
            handshake_rx.clone(),
            config.pacing,
        ));

        let driver = Driver {
            writer: Arc::clone(&writer),
            framer: LineFramer::new(),
            login,
            handshake_tx,
            state_tx,
            event_tx,
            handshake_timeout: config.handshake_timeout,
        };
        tokio::spawn(driver.run(transport_events));

        Ok((
            Self {
                writer,
                state: state_rx,
                handshake: handshake_rx,
                drained,
                target,
            },
            event_rx,
        ))
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch receiver for lifecycle changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn handshake_state(&self) -> HandshakeState {
        *self.handshake.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_open()
    }

    /// Shared writer, for callers that outlive a borrow of the connection
    /// (a discovery task, for instance).
    pub fn writer(&self) -> Arc<CommandWriter<StreamTransport>> {
        Arc::clone(&self.writer)
    }

    pub async fn send(&self, command: &Command) -> Result<(), Error> {
        self.writer.send(command).await
    }

    /// Scan the whole address space. Fails with `NotConnected` if the link
    /// closes mid-scan.
    pub async fn scan(&self, cancel: &CancellationToken) -> Result<ScanReport, Error> {
        discovery::scan(&self.writer, cancel).await
    }

    /// Close the link. The driver emits `Closed` and exits.
    pub fn close(&self) {
        self.writer.close();
    }

    /// Close the link and wait until commands already accepted have been
    /// written out.
    pub async fn closed(&self) {
        self.close();
        self.drained.cancelled().await;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.writer.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("target", &self.target)
            .field("state", &self.state())
            .field("handshake", &self.handshake_state())
            .finish_non_exhaustive()
    }
}

// ── Driver ───────────────────────────────────────────────────────────

/// Owns everything that must see inbound traffic in order.
struct Driver<T> {
    writer: Arc<CommandWriter<T>>,
    framer: LineFramer,
    login: LoginHandshake,
    handshake_tx: watch::Sender<HandshakeState>,
    state_tx: watch::Sender<ConnectionState>,
    event_tx: mpsc::Sender<ConnectionEvent>,
    handshake_timeout: Option<Duration>,
}

impl<T: Transport> Driver<T> {
    async fn run(mut self, mut events: TransportEvents) {
        self.start().await;

        let deadline = tokio::time::sleep_until(
            Instant::now() + self.handshake_timeout.unwrap_or(Duration::ZERO),
        );
        tokio::pin!(deadline);
        let mut timer_armed = self.handshake_timeout.is_some();

        loop {
            let awaiting = matches!(
                self.login.state(),
                HandshakeState::WaitingForPrompt | HandshakeState::Pending
            );

            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(TransportEvent::Data(bytes)) => self.on_data(&bytes).await,
                    Some(TransportEvent::Error(e)) => {
                        warn!(error = %e, "transport error");
                        self.emit(ConnectionEvent::Error(e)).await;
                    }
                    Some(TransportEvent::Closed) | None => break,
                },
                () = &mut deadline, if timer_armed && awaiting => {
                    timer_armed = false;
                    let timeout_secs = self.handshake_timeout.map_or(0, |t| t.as_secs());
                    error!(timeout_secs, "login handshake timed out");
                    self.state_tx.send_replace(ConnectionState::Failed);
                    self.emit(ConnectionEvent::Error(Error::HandshakeTimeout { timeout_secs })).await;
                    self.writer.close();
                }
            }
        }

        self.state_tx.send_if_modified(|state| {
            if *state == ConnectionState::Failed {
                false
            } else {
                *state = ConnectionState::Closed;
                true
            }
        });
        info!("connection closed");
        self.emit(ConnectionEvent::Closed).await;
    }

    /// Everything that happens between transport open and the first read.
    async fn start(&mut self) {
        if let Some(credentials) = self.login.on_connected() {
            self.handshake_tx.send_replace(self.login.state());
            self.state_tx.send_replace(ConnectionState::AwaitingLogin);
            info!("sending login");
            self.send_credentials(&credentials).await;
        } else if self.login.state() == HandshakeState::NotRequired {
            self.state_tx.send_replace(ConnectionState::Authenticated);
            info!("no login required, connection ready");
            self.emit(ConnectionEvent::Ready).await;
        } else {
            self.state_tx.send_replace(ConnectionState::AwaitingLogin);
            debug!("waiting for login prompt");
        }
    }

    async fn on_data(&mut self, bytes: &Bytes) {
        let lines: Vec<String> = self.framer.ingest(bytes).collect();
        for line in lines {
            debug!(%line, "line");
            let outcome = self.login.classify(&line);
            self.handshake_tx.send_if_modified(|published| {
                let current = self.login.state();
                let changed = *published != current;
                *published = current;
                changed
            });

            match outcome {
                Classification::Consumed => {}
                Classification::Login(credentials) => {
                    info!("sending login");
                    self.send_credentials(&credentials).await;
                }
                Classification::Forward(line) => {
                    if let Some(update) = parser::parse(&line) {
                        debug!(address = %update.address, level = update.brightness, "device update");
                        self.emit(ConnectionEvent::DeviceUpdate(update)).await;
                    }
                }
                Classification::Ready => {
                    self.state_tx.send_replace(ConnectionState::Authenticated);
                    self.emit(ConnectionEvent::Ready).await;
                }
                Classification::AuthFailed(e) => {
                    self.state_tx.send_replace(ConnectionState::Failed);
                    self.emit(ConnectionEvent::Error(e)).await;
                    self.writer.close();
                }
            }
        }
    }

    /// A login that cannot be written ends the attempt.
    async fn send_credentials(&self, credentials: &str) {
        if let Err(e) = self.writer.write(credentials).await {
            warn!(error = %e, "could not send login");
            self.state_tx.send_replace(ConnectionState::Failed);
            self.emit(ConnectionEvent::Error(e)).await;
            self.writer.close();
        }
    }

    async fn emit(&self, event: ConnectionEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.event_tx.send(event).await;
    }
}
