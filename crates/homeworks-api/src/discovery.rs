// ── Discovery ──
//
// Brute-force scan: enable monitoring, then ask every address in the
// discoverable space for its level. Replies arrive asynchronously as `DL`
// reports on the normal event stream; the scan itself never waits for them.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::address::{ADDRESS_SPACE_LEN, DeviceAddress};
use crate::command::Command;
use crate::error::Error;
use crate::transport::Transport;
use crate::writer::CommandWriter;

/// Result of a scan that was not interrupted by the link going away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// `RDL` queries written. `DLMON` is not counted.
    pub queries_sent: usize,
    /// The scan was stopped by its cancellation token before the last address.
    pub cancelled: bool,
}

impl ScanReport {
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.queries_sent == ADDRESS_SPACE_LEN
    }
}

/// Run a full scan. See [`scan_with_progress`].
pub async fn scan<T: Transport>(
    writer: &CommandWriter<T>,
    cancel: &CancellationToken,
) -> Result<ScanReport, Error> {
    scan_with_progress(writer, cancel, |_| {}).await
}

/// Run a full scan, calling `progress` with the running query count after
/// each write.
///
/// Liveness is checked before every write, so a connection closed mid-scan
/// ends it with [`Error::NotConnected`] instead of queuing dead writes.
/// Cancellation returns a report with `cancelled` set.
pub async fn scan_with_progress<T, F>(
    writer: &CommandWriter<T>,
    cancel: &CancellationToken,
    mut progress: F,
) -> Result<ScanReport, Error>
where
    T: Transport,
    F: FnMut(usize) + Send,
{
    info!(addresses = ADDRESS_SPACE_LEN, "starting device discovery");
    writer.send(&Command::MonitorEnable).await?;

    let mut queries_sent = 0;
    for address in DeviceAddress::all() {
        if cancel.is_cancelled() {
            info!(queries_sent, "discovery cancelled");
            return Ok(ScanReport {
                queries_sent,
                cancelled: true,
            });
        }
        if let Err(e) = writer.send(&Command::status_query(address)).await {
            warn!(queries_sent, error = %e, "discovery stopped");
            return Err(e);
        }
        queries_sent += 1;
        progress(queries_sent);
    }

    debug!(queries_sent, "all status queries written");
    info!("discovery scan complete");
    Ok(ScanReport {
        queries_sent,
        cancelled: false,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use tokio::sync::watch;

    use super::*;
    use crate::handshake::HandshakeState;
    use crate::writer::Pacing;
    use crate::writer::testing::RecordingTransport;

    fn writer() -> (CommandWriter<RecordingTransport>, Arc<RecordingTransport>) {
        let transport = RecordingTransport::new();
        let (_tx, rx) = watch::channel(HandshakeState::Authenticated);
        (CommandWriter::new(Arc::clone(&transport), rx, Pacing::Unpaced), transport)
    }

    #[tokio::test]
    async fn scans_every_address_after_monitor_enable() {
        let (w, transport) = writer();
        let report = scan(&w, &CancellationToken::new()).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.queries_sent, 9_216);

        let sent = transport.sent();
        assert_eq!(sent.len(), 9_217);
        assert_eq!(sent.first().map(String::as_str), Some("DLMON\r\n"));
        assert_eq!(sent.get(1).map(String::as_str), Some("RDL, [01:04:01:01:01]\r\n"));
        assert_eq!(sent.last().map(String::as_str), Some("RDL, [16:06:04:12:04]\r\n"));

        let queries: HashSet<&str> = sent.iter().skip(1).map(String::as_str).collect();
        assert_eq!(queries.len(), 9_216);
        assert!(queries.iter().all(|q| q.starts_with("RDL, [") && q.ends_with("]\r\n")));
    }

    #[tokio::test]
    async fn stops_when_connection_closes() {
        let (w, transport) = writer();
        let mut seen = 0;
        let result = scan_with_progress(&w, &CancellationToken::new(), |n| {
            seen = n;
            if n == 10 {
                transport.close();
            }
        })
        .await;

        assert!(matches!(result, Err(Error::NotConnected)));
        assert_eq!(seen, 10);
        // DLMON plus ten queries; nothing reached the transport afterwards.
        assert_eq!(transport.calls(), 11);
    }

    #[tokio::test]
    async fn honours_cancellation() {
        let (w, transport) = writer();
        let cancel = CancellationToken::new();
        let report = scan_with_progress(&w, &cancel, |n| {
            if n == 100 {
                cancel.cancel();
            }
        })
        .await
        .unwrap();

        assert!(report.cancelled);
        assert!(!report.is_complete());
        assert_eq!(report.queries_sent, 100);
        assert_eq!(transport.sent().len(), 101);
    }

    #[tokio::test]
    async fn fails_fast_when_never_connected() {
        let (w, transport) = writer();
        w.close();
        assert!(matches!(
            scan(&w, &CancellationToken::new()).await,
            Err(Error::NotConnected)
        ));
        assert_eq!(transport.calls(), 0);
    }
}
