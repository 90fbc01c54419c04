// ── Byte transport ──
//
// Owns exactly one physical link to the processor -- a TCP socket or a
// serial port -- and exposes it as an outbound write queue plus an inbound
// event channel. Both backends look identical to the rest of the crate.

use std::future::Future;
use std::io::{Read, Write};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::{ConnectionConfig, TransportKind};
use crate::error::Error;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const READ_BUFFER_SIZE: usize = 4096;
const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(100);
/// Upper bound on writing out commands that were queued before close.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

// ── Events ───────────────────────────────────────────────────────────

/// Something that happened on the link.
#[derive(Debug)]
pub enum TransportEvent {
    /// Raw bytes as they arrived; chunk boundaries carry no meaning.
    Data(Bytes),
    /// I/O failure after a successful open. Always followed by `Closed`.
    Error(Error),
    /// The link is gone. Sent exactly once, as the last event.
    Closed,
}

/// Receiving side of a transport's event stream.
pub type TransportEvents = mpsc::Receiver<TransportEvent>;

// ── Transport contract ───────────────────────────────────────────────

/// Byte-level send side of a link.
///
/// `send` on a closed transport must return [`Error::NotConnected`]; it is
/// never a silent no-op.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, bytes: Bytes) -> impl Future<Output = Result<(), Error>> + Send;
    fn close(&self);
    fn is_open(&self) -> bool;
}

/// A live link backed by background reader/writer workers.
///
/// Outbound bytes pass through a bounded FIFO queue, so a long burst of
/// writes waits for the link instead of buffering without limit.
#[derive(Debug)]
pub struct StreamTransport {
    outbound: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
    /// Cancelled by the writer worker once it has exited.
    drained: CancellationToken,
    target: String,
}

impl StreamTransport {
    /// Open the link described by `config`.
    ///
    /// Returns once the socket is connected or the port is open; failures are
    /// reported as [`Error::Connect`]. Subsequent traffic arrives on the
    /// returned event receiver.
    pub async fn open(config: &ConnectionConfig) -> Result<(Self, TransportEvents), Error> {
        config.validate()?;
        match config.kind {
            TransportKind::Tcp => open_tcp(config).await,
            TransportKind::Serial => open_serial(config),
        }
    }

    /// Human-readable link description.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Token cancelled when the link closes, for anything that needs to stop
    /// alongside it.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Token cancelled once queued writes have gone out (or been abandoned)
    /// after close.
    pub fn drained(&self) -> CancellationToken {
        self.drained.clone()
    }
}

impl Transport for StreamTransport {
    async fn send(&self, bytes: Bytes) -> Result<(), Error> {
        if !self.is_open() {
            return Err(Error::NotConnected);
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::NotConnected),
            sent = self.outbound.send(bytes) => sent.map_err(|_| Error::NotConnected),
        }
    }

    fn close(&self) {
        if !self.cancel.is_cancelled() {
            debug!(target = %self.target, "closing transport");
            self.cancel.cancel();
        }
    }

    fn is_open(&self) -> bool {
        !self.cancel.is_cancelled() && !self.outbound.is_closed()
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── TCP backend ──────────────────────────────────────────────────────

async fn open_tcp(config: &ConnectionConfig) -> Result<(StreamTransport, TransportEvents), Error> {
    let target = config.target();
    let host = config.host.as_deref().unwrap_or_default();
    info!(%target, "connecting over TCP");

    let stream = TcpStream::connect((host, config.port))
        .await
        .map_err(|e| Error::Connect {
            target: target.clone(),
            reason: e.to_string(),
        })?;
    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "could not disable Nagle");
    }
    info!(%target, "TCP connection established");

    let (read_half, write_half) = stream.into_split();
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity);
    let cancel = CancellationToken::new();
    let drained = CancellationToken::new();

    tokio::spawn(tcp_reader(read_half, event_tx.clone(), cancel.clone()));
    tokio::spawn(tcp_writer(
        write_half,
        outbound_rx,
        event_tx,
        cancel.clone(),
        drained.clone(),
    ));

    Ok((
        StreamTransport {
            outbound: outbound_tx,
            cancel,
            drained,
            target,
        },
        event_rx,
    ))
}

/// Read until EOF, error, or cancellation. Owns the single `Closed` event.
async fn tcp_reader(
    mut read_half: OwnedReadHalf,
    event_tx: mpsc::Sender<TransportEvent>,
    cancel: CancellationToken,
) {
    let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            read = read_half.read_buf(&mut buf) => match read {
                Ok(0) => {
                    warn!("TCP connection ended by peer");
                    break;
                }
                Ok(n) => {
                    trace!(bytes = n, "received");
                    let chunk = buf.split().freeze();
                    if event_tx.send(TransportEvent::Data(chunk)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "TCP read failed");
                    let _ = event_tx.send(TransportEvent::Error(e.into())).await;
                    break;
                }
            },
        }
    }

    cancel.cancel();
    let _ = event_tx.send(TransportEvent::Closed).await;
    debug!("TCP reader exiting");
}

async fn tcp_writer(
    mut write_half: OwnedWriteHalf,
    mut outbound_rx: mpsc::Receiver<Bytes>,
    event_tx: mpsc::Sender<TransportEvent>,
    cancel: CancellationToken,
    drained: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                flush_tcp(&mut write_half, &mut outbound_rx).await;
                break;
            }
            next = outbound_rx.recv() => {
                let Some(bytes) = next else { break };
                if let Err(e) = write_half.write_all(&bytes).await {
                    warn!(error = %e, "TCP write failed");
                    let _ = event_tx.send(TransportEvent::Error(e.into())).await;
                    break;
                }
            }
        }
    }

    cancel.cancel();
    let _ = write_half.shutdown().await;
    drained.cancel();
}

/// Write whatever was accepted before close, within [`FLUSH_TIMEOUT`].
async fn flush_tcp(write_half: &mut OwnedWriteHalf, outbound_rx: &mut mpsc::Receiver<Bytes>) {
    outbound_rx.close();
    let drain = async {
        while let Some(bytes) = outbound_rx.recv().await {
            if write_half.write_all(&bytes).await.is_err() {
                break;
            }
        }
    };
    if tokio::time::timeout(FLUSH_TIMEOUT, drain).await.is_err() {
        debug!("gave up flushing queued writes");
    }
}

// ── Serial backend ───────────────────────────────────────────────────

fn open_serial(config: &ConnectionConfig) -> Result<(StreamTransport, TransportEvents), Error> {
    let target = config.target();
    let path = config.serial_path.as_deref().unwrap_or_default();
    info!(%target, "opening serial port");

    let port = serialport::new(path, config.baud_rate)
        .timeout(SERIAL_READ_TIMEOUT)
        .open()
        .map_err(|e| Error::Connect {
            target: target.clone(),
            reason: e.to_string(),
        })?;
    let writer = port.try_clone()?;
    info!(%target, "serial port opened");

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity);
    let cancel = CancellationToken::new();
    let drained = CancellationToken::new();

    {
        let cancel = cancel.clone();
        let event_tx = event_tx.clone();
        std::thread::Builder::new()
            .name("homeworks-serial-rx".into())
            .spawn(move || serial_reader(port, &event_tx, &cancel))?;
    }
    tokio::spawn(serial_writer(
        writer,
        outbound_rx,
        event_tx,
        cancel.clone(),
        drained.clone(),
    ));

    Ok((
        StreamTransport {
            outbound: outbound_tx,
            cancel,
            drained,
            target,
        },
        event_rx,
    ))
}

/// Blocking read loop on a dedicated thread. The port's read timeout bounds
/// how long cancellation takes to notice.
fn serial_reader(
    mut port: Box<dyn serialport::SerialPort>,
    event_tx: &mpsc::Sender<TransportEvent>,
    cancel: &CancellationToken,
) {
    let mut buf = [0u8; READ_BUFFER_SIZE];

    while !cancel.is_cancelled() {
        match port.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                trace!(bytes = n, "received");
                let chunk = Bytes::copy_from_slice(buf.get(..n).unwrap_or_default());
                if event_tx.blocking_send(TransportEvent::Data(chunk)).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                warn!(error = %e, "serial read failed");
                let _ = event_tx.blocking_send(TransportEvent::Error(e.into()));
                break;
            }
        }
    }

    cancel.cancel();
    warn!("serial port closed");
    let _ = event_tx.blocking_send(TransportEvent::Closed);
}

async fn serial_writer(
    mut port: Box<dyn serialport::SerialPort>,
    mut outbound_rx: mpsc::Receiver<Bytes>,
    event_tx: mpsc::Sender<TransportEvent>,
    cancel: CancellationToken,
    drained: CancellationToken,
) {
    loop {
        let bytes = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                outbound_rx.close();
                match outbound_rx.try_recv() {
                    Ok(bytes) => bytes,
                    Err(_) => break,
                }
            }
            next = outbound_rx.recv() => match next {
                Some(bytes) => bytes,
                None => break,
            },
        };

        // Serial writes block; run each one off the async worker.
        let joined = tokio::task::spawn_blocking(move || {
            let result = port.write_all(&bytes).and_then(|()| port.flush());
            (port, result)
        })
        .await;

        match joined {
            Ok((returned, Ok(()))) => port = returned,
            Ok((_, Err(e))) => {
                warn!(error = %e, "serial write failed");
                let _ = event_tx.send(TransportEvent::Error(e.into())).await;
                break;
            }
            Err(e) => {
                warn!(error = %e, "serial write task aborted");
                break;
            }
        }
    }

    cancel.cancel();
    drained.cancel();
}
