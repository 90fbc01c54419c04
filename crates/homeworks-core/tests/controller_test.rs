#![allow(clippy::unwrap_used)]

// Controller tests against a fake processor on loopback TCP.

use std::time::Duration;

use homeworks_core::{
    ConnectionConfig, ConnectionState, Controller, ControllerConfig, ControllerEvent, CoreError,
    DeviceOverride, ReconnectConfig,
};
use pretty_assertions::assert_eq;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

const STEP: Duration = Duration::from_secs(5);

// ── Fake processor ──────────────────────────────────────────────────

struct Peer {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Peer {
    fn new(stream: TcpStream) -> Self {
        let (rd, writer) = stream.into_split();
        Self {
            lines: BufReader::new(rd).lines(),
            writer,
        }
    }

    /// Next CRLF-terminated command, without the terminator.
    async fn command(&mut self) -> String {
        let line = tokio::time::timeout(STEP, self.lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        line.strip_suffix('\r').unwrap_or(&line).to_string()
    }

    async fn say(&mut self, text: &str) {
        self.writer.write_all(text.as_bytes()).await.unwrap();
    }
}

async fn processor() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

async fn accept(listener: &TcpListener) -> TcpStream {
    tokio::time::timeout(STEP, listener.accept())
        .await
        .unwrap()
        .unwrap()
        .0
}

fn config(port: u16) -> ControllerConfig {
    ControllerConfig {
        discovery: false,
        devices: vec![DeviceOverride {
            address: "01:04:01:01:05".into(),
            name: Some("Kitchen".into()),
            fade_time: Some(Duration::from_secs(3)),
        }],
        ignore_devices: vec!["01:04:01:01:06".into()],
        ..ControllerConfig::new(ConnectionConfig::tcp("127.0.0.1").with_port(port))
    }
}

async fn next_device_event(events: &mut broadcast::Receiver<ControllerEvent>) -> ControllerEvent {
    tokio::time::timeout(STEP, async {
        loop {
            match events.recv().await.unwrap() {
                e @ (ControllerEvent::DeviceAdded(_) | ControllerEvent::DeviceUpdated(_)) => {
                    return e;
                }
                _ => {}
            }
        }
    })
    .await
    .unwrap()
}

async fn wait_for_state(
    rx: &mut tokio::sync::watch::Receiver<ConnectionState>,
    wanted: ConnectionState,
) {
    tokio::time::timeout(STEP, rx.wait_for(|s| *s == wanted))
        .await
        .unwrap()
        .unwrap();
}

// ── Reports & commands ──────────────────────────────────────────────

#[tokio::test]
async fn reports_populate_store_and_set_level_uses_fade_time() {
    let (listener, port) = processor().await;
    let controller = Controller::new(config(port));
    let mut events = controller.events();

    controller.connect().await.unwrap();
    let mut peer = Peer::new(accept(&listener).await);
    peer.say("DL, [01:04:01:01:05], 40\r\n").await;

    let ControllerEvent::DeviceAdded(device) = next_device_event(&mut events).await else {
        panic!("expected a new device");
    };
    assert_eq!(device.name, "Kitchen");
    assert_eq!(device.brightness, 40);
    assert_eq!(controller.devices().len(), 1);

    controller.set_level("01:04:01:01:05", 75, None).await.unwrap();
    assert_eq!(peer.command().await, "FADEDIM, 75, 3, 0, [01:04:01:01:05]");

    controller
        .set_level("[01:04:01:01:05]", 10, Some(Duration::from_millis(500)))
        .await
        .unwrap();
    assert_eq!(peer.command().await, "FADEDIM, 10, 0.5, 0, [01:04:01:01:05]");

    // Unknown devices fall back to the default fade.
    controller.set_level("02:04:01:01:01", 0, None).await.unwrap();
    assert_eq!(peer.command().await, "FADEDIM, 0, 1, 0, [02:04:01:01:01]");

    controller.disconnect().await;
}

#[tokio::test]
async fn refuses_ignored_devices_and_bad_levels() {
    let (listener, port) = processor().await;
    let controller = Controller::new(config(port));
    controller.connect().await.unwrap();
    let _peer = accept(&listener).await;

    assert!(matches!(
        controller.set_level("01:04:01:01:06", 50, None).await,
        Err(CoreError::Validation { .. })
    ));
    assert!(matches!(
        controller.set_level("01:04:01:01:05", 101, None).await,
        Err(CoreError::Validation { .. })
    ));
    assert!(matches!(
        controller.query("not-an-address").await,
        Err(CoreError::Validation { .. })
    ));

    controller.disconnect().await;
}

#[tokio::test]
async fn query_and_wait_returns_the_reported_level() {
    let (listener, port) = processor().await;
    let controller = Controller::new(config(port));
    controller.connect().await.unwrap();
    let mut peer = Peer::new(accept(&listener).await);

    let processor = tokio::spawn(async move {
        let query = peer.command().await;
        peer.say("DL, [02:04:01:01:01], 33\r\n").await;
        (query, peer)
    });

    let device = controller
        .query_and_wait("02:04:01:01:01", STEP)
        .await
        .unwrap();
    assert_eq!(device.brightness, 33);
    assert_eq!(device.name, "02:04:01:01:01");

    let (query, _peer) = processor.await.unwrap();
    assert_eq!(query, "RDL, [02:04:01:01:01]");
    controller.disconnect().await;
}

#[tokio::test]
async fn query_without_reply_is_not_found() {
    let (listener, port) = processor().await;
    let controller = Controller::new(config(port));
    controller.connect().await.unwrap();
    let _peer = accept(&listener).await;

    let result = controller
        .query_and_wait("03:04:01:01:01", Duration::from_millis(200))
        .await;
    assert!(matches!(result, Err(CoreError::DeviceNotFound { ref address }) if address == "03:04:01:01:01"));
    controller.disconnect().await;
}

#[tokio::test]
async fn commands_before_connect_fail() {
    let controller = Controller::new(config(1));
    assert!(matches!(
        controller.set_level("01:04:01:01:05", 50, None).await,
        Err(CoreError::Disconnected)
    ));
    assert!(matches!(
        controller.query("01:04:01:01:05").await,
        Err(CoreError::Disconnected)
    ));
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn rejected_login_fails_connect() {
    let (listener, port) = processor().await;
    let mut cfg = config(port);
    cfg.connection = cfg
        .connection
        .with_login("lutron", "wrong".to_string().into());
    let controller = Controller::new(cfg);
    let state = controller.connection_state();

    let server = tokio::spawn(async move {
        let mut stream = accept(&listener).await;
        let mut creds = vec![0u8; "lutron, wrong\r".len()];
        stream.read_exact(&mut creds).await.unwrap();
        stream.write_all(b"login incorrect\r\n").await.unwrap();
        (String::from_utf8_lossy(&creds).into_owned(), stream)
    });

    let err = controller.connect().await.unwrap_err();
    assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
    assert_eq!(*state.borrow(), ConnectionState::Failed);

    let (creds, _stream) = server.await.unwrap();
    assert_eq!(creds, "lutron, wrong\r");
}

#[tokio::test]
async fn discovery_starts_after_ready() {
    let (listener, port) = processor().await;
    let cfg = ControllerConfig {
        discovery: true,
        discovery_delay: Duration::from_millis(10),
        ..config(port)
    };
    let controller = Controller::new(cfg);
    let progress = controller.scan_progress();

    controller.connect().await.unwrap();
    let mut peer = Peer::new(accept(&listener).await);

    assert_eq!(peer.command().await, "DLMON");
    assert_eq!(peer.command().await, "RDL, [01:04:01:01:01]");
    assert_eq!(peer.command().await, "RDL, [01:04:01:01:02]");
    assert_eq!(progress.borrow().total, 9_216);

    controller.disconnect().await;
    assert_eq!(*controller.connection_state().borrow(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn dropped_link_without_reconnect_ends_session() {
    let (listener, port) = processor().await;
    let controller = Controller::new(config(port));
    let mut state = controller.connection_state();

    controller.connect().await.unwrap();
    drop(accept(&listener).await);

    wait_for_state(&mut state, ConnectionState::Disconnected).await;
    assert!(matches!(
        controller.set_level("01:04:01:01:05", 50, None).await,
        Err(CoreError::Disconnected)
    ));
}

#[tokio::test]
async fn dropped_link_reconnects_with_backoff() {
    let (listener, port) = processor().await;
    let cfg = ControllerConfig {
        reconnect: ReconnectConfig {
            enabled: true,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(100),
            max_retries: Some(3),
        },
        ..config(port)
    };
    let controller = Controller::new(cfg);

    controller.connect().await.unwrap();
    let mut events = controller.events();
    drop(accept(&listener).await);

    let mut peer = Peer::new(accept(&listener).await);
    let mut seen = Vec::new();
    tokio::time::timeout(STEP, async {
        loop {
            match events.recv().await.unwrap() {
                ControllerEvent::Disconnected => seen.push("disconnected"),
                ControllerEvent::Ready => {
                    seen.push("ready");
                    break;
                }
                _ => {}
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(seen, vec!["disconnected", "ready"]);
    assert_eq!(*controller.connection_state().borrow(), ConnectionState::Connected);

    controller.set_level("01:04:01:01:05", 20, None).await.unwrap();
    assert_eq!(peer.command().await, "FADEDIM, 20, 3, 0, [01:04:01:01:05]");
    controller.disconnect().await;
}
