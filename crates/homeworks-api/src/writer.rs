// ── Command writer ──
//
// Single funnel for everything sent to the processor. The line terminator
// depends on the login phase, so the writer reads the published handshake
// state on every call rather than caching it.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tracing::trace;

use crate::command::Command;
use crate::error::Error;
use crate::handshake::HandshakeState;
use crate::transport::Transport;

const LINE_TERMINATOR: &str = "\r\n";

/// Rate policy applied before each write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Pacing {
    /// Write as fast as the outbound queue accepts.
    #[default]
    Unpaced,
    /// Leave at least this much time between consecutive writes.
    Interval(Duration),
    /// Send `size` writes back to back, then pause.
    Burst { size: usize, pause: Duration },
}

#[derive(Debug, Default)]
struct PaceState {
    last_write: Option<Instant>,
    in_burst: usize,
}

/// Serializes outbound commands onto a [`Transport`].
///
/// Writes are FIFO across all callers: the pacing lock is held through the
/// transport send, so two concurrent writes can never swap order.
#[derive(Debug)]
pub struct CommandWriter<T> {
    transport: Arc<T>,
    handshake: watch::Receiver<HandshakeState>,
    pacing: Pacing,
    pace: Mutex<PaceState>,
}

impl<T: Transport> CommandWriter<T> {
    pub fn new(transport: Arc<T>, handshake: watch::Receiver<HandshakeState>, pacing: Pacing) -> Self {
        Self {
            transport,
            handshake,
            pacing,
            pace: Mutex::new(PaceState::default()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Close the underlying transport. Later writes fail with `NotConnected`.
    pub fn close(&self) {
        self.transport.close();
    }

    /// Write one protocol command.
    pub async fn send(&self, command: &Command) -> Result<(), Error> {
        self.write(&command.to_string()).await
    }

    /// Write a raw line body.
    ///
    /// Appends `\r\n` unless the login is pending; credential lines carry
    /// their own carriage return and must go out untouched.
    pub async fn write(&self, body: &str) -> Result<(), Error> {
        if !self.transport.is_open() {
            return Err(Error::NotConnected);
        }

        let mut pace = self.pace.lock().await;
        self.wait_for_slot(&mut pace).await;

        let pending = *self.handshake.borrow() == HandshakeState::Pending;
        let line = if pending {
            body.to_string()
        } else {
            format!("{body}{LINE_TERMINATOR}")
        };
        trace!(line = body, terminated = !pending, "write");

        self.transport.send(Bytes::from(line)).await?;
        pace.last_write = Some(Instant::now());
        Ok(())
    }

    async fn wait_for_slot(&self, pace: &mut PaceState) {
        match self.pacing {
            Pacing::Unpaced => {}
            Pacing::Interval(gap) => {
                if let Some(last) = pace.last_write {
                    tokio::time::sleep_until(last + gap).await;
                }
            }
            Pacing::Burst { size, pause } => {
                if pace.in_burst >= size.max(1) {
                    tokio::time::sleep(pause).await;
                    pace.in_burst = 0;
                }
                pace.in_burst += 1;
            }
        }
    }
}
