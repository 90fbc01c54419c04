#![allow(clippy::unwrap_used)]

// Protocol-level tests against a fake Homeworks processor on loopback TCP.

use std::collections::HashSet;
use std::time::Duration;

use homeworks_api::{
    Command, Connection, ConnectionConfig, ConnectionEvent, ConnectionEvents, ConnectionState,
    Error, HandshakeMode, HandshakeState,
};
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

const CREDENTIALS: &str = "lutron, integration\r";
const STEP: Duration = Duration::from_secs(5);

// ── Helpers ─────────────────────────────────────────────────────────

async fn processor() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn config(port: u16) -> ConnectionConfig {
    ConnectionConfig::tcp("127.0.0.1").with_port(port)
}

fn login_config(port: u16, mode: HandshakeMode) -> ConnectionConfig {
    config(port)
        .with_login("lutron", "integration".to_string().into())
        .with_handshake(mode)
}

async fn accept(listener: &TcpListener) -> TcpStream {
    tokio::time::timeout(STEP, listener.accept())
        .await
        .unwrap()
        .unwrap()
        .0
}

/// Read exactly `expected.len()` bytes and compare.
async fn expect_bytes(stream: &mut TcpStream, expected: &str) {
    let mut buf = vec![0u8; expected.len()];
    tokio::time::timeout(STEP, stream.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&buf), expected);
}

async fn next_event(events: &mut ConnectionEvents) -> ConnectionEvent {
    tokio::time::timeout(STEP, events.recv())
        .await
        .unwrap()
        .unwrap()
}

/// Drain events until `Closed`, returning everything before it.
async fn drain_until_closed(events: &mut ConnectionEvents) -> Vec<ConnectionEvent> {
    let mut seen = Vec::new();
    loop {
        match next_event(events).await {
            ConnectionEvent::Closed => return seen,
            other => seen.push(other),
        }
    }
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn immediate_login_then_level_reports() {
    let (listener, port) = processor().await;
    let (conn, mut events) = Connection::open(login_config(port, HandshakeMode::Immediate))
        .await
        .unwrap();
    let mut peer = accept(&listener).await;

    expect_bytes(&mut peer, CREDENTIALS).await;
    peer.write_all(b"login successful\r\nDL, [01:04:0").await.unwrap();
    peer.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    peer.write_all(b"1:01:05], 87%\r\n").await.unwrap();

    assert!(matches!(next_event(&mut events).await, ConnectionEvent::Ready));
    let ConnectionEvent::DeviceUpdate(update) = next_event(&mut events).await else {
        panic!("expected a device update");
    };
    assert_eq!(update.address, "01:04:01:01:05");
    assert_eq!(update.brightness, 87);

    assert_eq!(conn.state(), ConnectionState::Authenticated);
    assert_eq!(conn.handshake_state(), HandshakeState::Authenticated);

    // Credentials went out bare; ordinary commands get CRLF.
    conn.send(&Command::MonitorEnable).await.unwrap();
    expect_bytes(&mut peer, "DLMON\r\n").await;
}

#[tokio::test]
async fn prompt_login_raises_ready_once() {
    let (listener, port) = processor().await;
    let (_conn, mut events) = Connection::open(login_config(port, HandshakeMode::Prompt))
        .await
        .unwrap();
    let mut peer = accept(&listener).await;

    peer.write_all(b"Homeworks Interactive\r\nLOG").await.unwrap();
    peer.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    peer.write_all(b"IN: \r\n").await.unwrap();

    expect_bytes(&mut peer, CREDENTIALS).await;
    peer.write_all(b"Login Successful\r\nlogin successful\r\nDL, [02:05:03:04:01], 0\r\n")
        .await
        .unwrap();
    drop(peer);

    let seen = drain_until_closed(&mut events).await;
    let ready = seen
        .iter()
        .filter(|e| matches!(e, ConnectionEvent::Ready))
        .count();
    assert_eq!(ready, 1);
    assert!(matches!(seen.first(), Some(ConnectionEvent::Ready)));
    assert!(seen.iter().any(|e| matches!(
        e,
        ConnectionEvent::DeviceUpdate(u) if u.address == "02:05:03:04:01" && u.brightness == 0
    )));
}

#[tokio::test]
async fn rejected_login_fails_and_closes() {
    let (listener, port) = processor().await;
    let (conn, mut events) = Connection::open(login_config(port, HandshakeMode::Immediate))
        .await
        .unwrap();
    let mut peer = accept(&listener).await;

    expect_bytes(&mut peer, CREDENTIALS).await;
    peer.write_all(b"LOGIN INCORRECT\r\nDL, [01:04:01:01:01], 50\r\n")
        .await
        .unwrap();

    let seen = drain_until_closed(&mut events).await;
    assert_eq!(seen.len(), 1);
    assert!(matches!(
        seen.first(),
        Some(ConnectionEvent::Error(Error::Authentication { .. }))
    ));

    assert_eq!(conn.state(), ConnectionState::Failed);
    assert_eq!(conn.handshake_state(), HandshakeState::Failed);
    assert!(!conn.is_open());
    assert!(matches!(
        conn.send(&Command::MonitorEnable).await,
        Err(Error::NotConnected)
    ));
}

#[tokio::test]
async fn silent_processor_hits_handshake_timeout() {
    let (listener, port) = processor().await;
    let cfg = login_config(port, HandshakeMode::Prompt)
        .with_handshake_timeout(Some(Duration::from_millis(200)));
    let (conn, mut events) = Connection::open(cfg).await.unwrap();
    let _peer = accept(&listener).await;

    let seen = drain_until_closed(&mut events).await;
    assert!(matches!(
        seen.as_slice(),
        [ConnectionEvent::Error(Error::HandshakeTimeout { .. })]
    ));
    assert_eq!(conn.state(), ConnectionState::Failed);
}

// ── Traffic ─────────────────────────────────────────────────────────

#[tokio::test]
async fn no_login_is_ready_immediately() {
    let (listener, port) = processor().await;
    let (conn, mut events) = Connection::open(config(port)).await.unwrap();
    let mut peer = accept(&listener).await;

    assert!(matches!(next_event(&mut events).await, ConnectionEvent::Ready));
    peer.write_all(b"L232> \r\nDL, [16:06:04:12:04], 100\r\n")
        .await
        .unwrap();

    let ConnectionEvent::DeviceUpdate(update) = next_event(&mut events).await else {
        panic!("expected a device update");
    };
    assert_eq!(update.address, "16:06:04:12:04");
    assert_eq!(update.brightness, 100);
    assert_eq!(conn.state(), ConnectionState::Authenticated);
}

#[tokio::test]
async fn scan_writes_every_query_over_the_wire() {
    const MONITOR: &str = "DLMON\r\n";
    const QUERY_LEN: usize = "RDL, [01:04:01:01:01]\r\n".len();
    const QUERIES: usize = 16 * 3 * 4 * 12 * 4;

    let (listener, port) = processor().await;
    let (conn, _events) = Connection::open(config(port)).await.unwrap();
    let mut peer = accept(&listener).await;

    let reader = tokio::spawn(async move {
        let mut wire = vec![0u8; MONITOR.len() + QUERIES * QUERY_LEN];
        peer.read_exact(&mut wire).await.unwrap();
        String::from_utf8(wire).unwrap()
    });

    let report = conn.scan(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.queries_sent, QUERIES);
    assert!(report.is_complete());

    let wire = tokio::time::timeout(Duration::from_secs(30), reader)
        .await
        .unwrap()
        .unwrap();
    let commands: Vec<&str> = wire.split_inclusive("\r\n").collect();
    assert_eq!(commands.len(), QUERIES + 1);
    assert_eq!(commands.first().copied(), Some(MONITOR));
    assert_eq!(commands.get(1).copied(), Some("RDL, [01:04:01:01:01]\r\n"));
    assert_eq!(commands.last().copied(), Some("RDL, [16:06:04:12:04]\r\n"));

    let queries: HashSet<&str> = commands.iter().skip(1).copied().collect();
    assert_eq!(queries.len(), QUERIES);
    assert!(queries.iter().all(|q| q.len() == QUERY_LEN && q.starts_with("RDL, [")));
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn peer_hangup_closes_and_rejects_writes() {
    let (listener, port) = processor().await;
    let (conn, mut events) = Connection::open(config(port)).await.unwrap();
    let peer = accept(&listener).await;
    drop(peer);

    let seen = drain_until_closed(&mut events).await;
    assert!(matches!(seen.as_slice(), [ConnectionEvent::Ready]));
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(matches!(
        conn.send(&Command::MonitorEnable).await,
        Err(Error::NotConnected)
    ));
}

#[tokio::test]
async fn local_close_delivers_closed() {
    let (listener, port) = processor().await;
    let (conn, mut events) = Connection::open(config(port)).await.unwrap();
    let _peer = accept(&listener).await;

    conn.closed().await;
    assert!(!conn.is_open());
    let seen = drain_until_closed(&mut events).await;
    assert!(seen.iter().all(|e| matches!(e, ConnectionEvent::Ready)));
}

#[tokio::test]
async fn close_writes_out_accepted_commands() {
    let (listener, port) = processor().await;
    let (conn, _events) = Connection::open(config(port)).await.unwrap();
    let mut peer = accept(&listener).await;

    let level = Command::fade_dim("01:04:01:01:05", 50, Duration::from_secs(2)).unwrap();
    conn.send(&level).await.unwrap();
    conn.closed().await;

    expect_bytes(&mut peer, "FADEDIM, 50, 2, 0, [01:04:01:01:05]\r\n").await;
    let mut rest = Vec::new();
    tokio::time::timeout(STEP, peer.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn refused_connection_reports_target() {
    let (listener, port) = processor().await;
    drop(listener);

    let err = Connection::open(config(port)).await.unwrap_err();
    let Error::Connect { target, .. } = err else {
        panic!("expected a connect error");
    };
    assert_eq!(target, format!("127.0.0.1:{port}"));
}

#[tokio::test]
async fn invalid_config_is_rejected_before_io() {
    let cfg = ConnectionConfig {
        host: None,
        ..config(23)
    };
    assert!(matches!(
        Connection::open(cfg).await,
        Err(Error::InvalidConfig { .. })
    ));
}
