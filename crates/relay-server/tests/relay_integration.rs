//! End-to-end tests for the relay over real WebSocket connections.
//!
//! Each test binds a server on an ephemeral port, connects sources and
//! controllers with `tokio-tungstenite`, and checks what each peer observes.
//! Registry state is read through `RelayServer::service()` to wait for
//! handshakes to land before sending data frames.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use relay_core::Connection;
use relay_server::application::RelayService;
use relay_server::domain::RelayConfig;
use relay_server::infrastructure::RelayServer;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{protocol::frame::coding::CloseCode, Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const REPORT: &str = r#"{"thresholds":{"rain_threshold":30,"pm_25_threshold":25,"pm_10_threshold":50,"signature":null},"wifi":{"ssid":"home","strength":72},"is_closed":false,"is_raining":true,"pm_25_level":12,"pm_10_level":20}"#;
const UPDATE: &str = r#"{"rain_threshold":10,"pm_25_threshold":20,"pm_10_threshold":30,"signature":"c2ln"}"#;

// ── Harness ───────────────────────────────────────────────────────────────────

struct Relay {
    addr: SocketAddr,
    service: Arc<RelayService>,
    running: Arc<AtomicBool>,
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

fn test_config() -> RelayConfig {
    RelayConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        ping_interval: Duration::from_secs(30),
        idle_timeout: Duration::from_secs(60),
        ..RelayConfig::default()
    }
}

async fn start(config: RelayConfig) -> Relay {
    let server = RelayServer::bind(config).await.expect("bind relay");
    let addr = server.local_addr().expect("local addr");
    let service = server.service();
    let running = Arc::new(AtomicBool::new(true));
    tokio::spawn(server.run(Arc::clone(&running)));
    Relay {
        addr,
        service,
        running,
    }
}

async fn connect(relay: &Relay, path: &str) -> Client {
    let (ws, _) = connect_async(format!("ws://{}{path}", relay.addr))
        .await
        .expect("WebSocket connect");
    ws
}

async fn send(ws: &mut Client, text: &str) {
    ws.send(Message::Text(text.to_string()))
        .await
        .expect("send frame");
}

fn handshake(key: &str) -> String {
    format!(r#"{{"public_key":"{key}"}}"#)
}

/// Next non-control message, failing the test after 5 s.
async fn next_message(ws: &mut Client) -> Option<Result<Message, WsError>> {
    timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                other => return other,
            }
        }
    })
    .await
    .expect("timed out waiting for a message")
}

async fn next_text(ws: &mut Client) -> String {
    match next_message(ws).await {
        Some(Ok(Message::Text(text))) => text,
        other => panic!("expected a text frame, got {other:?}"),
    }
}

/// Asserts that no data frame arrives within `window`.
async fn assert_silent(ws: &mut Client, window: Duration) {
    let result = timeout(window, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                other => return other,
            }
        }
    })
    .await;
    assert!(result.is_err(), "expected silence, got {result:?}");
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        sleep(Duration::from_millis(10)).await;
    }
}

fn configured_sources(service: &RelayService) -> usize {
    service
        .sources()
        .snapshot()
        .iter()
        .filter(|s| s.is_configured())
        .count()
}

fn paired_controllers(service: &RelayService) -> usize {
    service
        .sources()
        .snapshot()
        .iter()
        .filter_map(|s| s.controllers().map(|d| d.len()))
        .sum()
}

async fn source(relay: &Relay, key: &str) -> Client {
    let before = configured_sources(&relay.service);
    let mut ws = connect(relay, "/ubiquitous").await;
    send(&mut ws, &handshake(key)).await;
    wait_until("source handshake", || {
        configured_sources(&relay.service) > before
    })
    .await;
    ws
}

async fn controller(relay: &Relay, key: &str) -> Client {
    let before = paired_controllers(&relay.service);
    let mut ws = connect(relay, "/mobile").await;
    send(&mut ws, &handshake(key)).await;
    wait_until("controller pairing", || {
        paired_controllers(&relay.service) > before
    })
    .await;
    ws
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_status_report_fans_out_to_connected_controllers() {
    // Arrange: A, B, C stay connected; D disconnects before the report
    let relay = start(test_config()).await;
    let mut src = source(&relay, "unit-1").await;
    let mut a = controller(&relay, "unit-1").await;
    let mut b = controller(&relay, "unit-1").await;
    let mut c = controller(&relay, "unit-1").await;
    let mut d = controller(&relay, "unit-1").await;
    d.close(None).await.expect("close D");
    wait_until("D cleanup", || paired_controllers(&relay.service) == 3).await;

    // Act
    send(&mut src, REPORT).await;

    // Assert
    for ws in [&mut a, &mut b, &mut c] {
        assert_eq!(next_text(ws).await, REPORT);
    }
    assert_eq!(relay.service.controllers().len(), 3);
}

#[tokio::test]
async fn test_threshold_update_reaches_only_its_source() {
    // Arrange
    let relay = start(test_config()).await;
    let mut src_a = source(&relay, "a").await;
    let mut src_b = source(&relay, "b").await;
    let mut ctl_a = controller(&relay, "a").await;
    let mut peer_a = controller(&relay, "a").await;

    // Act
    send(&mut ctl_a, UPDATE).await;

    // Assert
    assert_eq!(next_text(&mut src_a).await, UPDATE);
    assert_silent(&mut src_b, Duration::from_millis(200)).await;
    assert_silent(&mut peer_a, Duration::from_millis(200)).await;
    assert_silent(&mut ctl_a, Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_malformed_frame_is_dropped_and_session_survives() {
    let relay = start(test_config()).await;
    let mut src = source(&relay, "unit").await;
    let mut ctl = controller(&relay, "unit").await;

    send(&mut src, r#"{"wifi": 3}"#).await;
    send(&mut src, "definitely not json").await;
    send(&mut src, REPORT).await;

    // Only the valid report comes through, and it still does.
    assert_eq!(next_text(&mut ctl).await, REPORT);
    assert_silent(&mut ctl, Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_unknown_key_is_rejected_with_close_1003() {
    // Arrange
    let relay = start(test_config()).await;
    let _src = source(&relay, "known").await;
    let mut ctl = connect(&relay, "/mobile").await;

    // Act
    send(&mut ctl, &handshake("unknown")).await;

    // Assert
    match next_message(&mut ctl).await {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(frame.code, CloseCode::Unsupported);
            assert_eq!(u16::from(frame.code), 1003);
            assert_eq!(frame.reason, "no such telemetry source");
        }
        other => panic!("expected close frame, got {other:?}"),
    }
    wait_until("rejected controller cleanup", || {
        relay.service.controllers().is_empty()
    })
    .await;
    assert_eq!(paired_controllers(&relay.service), 0);
}

#[tokio::test]
async fn test_bad_handshake_closes_without_close_frame() {
    let relay = start(test_config()).await;
    let mut src = connect(&relay, "/ubiquitous").await;

    send(&mut src, r#"{"public_key":"k","admin":true}"#).await;

    let observed = next_message(&mut src).await;
    assert!(
        !matches!(observed, Some(Ok(Message::Close(_)))),
        "a failed handshake must not be answered with a close frame: {observed:?}"
    );
    wait_until("source cleanup", || relay.service.sources().is_empty()).await;
}

#[tokio::test]
async fn test_disconnected_controller_is_unpaired() {
    // Arrange
    let relay = start(test_config()).await;
    let mut src = source(&relay, "unit").await;
    let mut ctl = controller(&relay, "unit").await;

    // Act
    ctl.close(None).await.expect("close controller");
    wait_until("controller cleanup", || {
        paired_controllers(&relay.service) == 0 && relay.service.controllers().is_empty()
    })
    .await;

    // Assert: the source keeps working with nobody to deliver to
    send(&mut src, REPORT).await;
    assert_silent(&mut src, Duration::from_millis(100)).await;
    assert_eq!(relay.service.sources().len(), 1);
}

#[tokio::test]
async fn test_source_disconnect_leaves_controller_session_open() {
    let relay = start(test_config()).await;
    let mut src = source(&relay, "unit").await;
    let mut ctl = controller(&relay, "unit").await;

    src.close(None).await.expect("close source");
    wait_until("source cleanup", || relay.service.sources().is_empty()).await;
    send(&mut ctl, UPDATE).await;

    // The update is dropped; the controller is neither closed nor answered.
    assert_silent(&mut ctl, Duration::from_millis(200)).await;
    assert_eq!(relay.service.controllers().len(), 1);
}

#[tokio::test]
async fn test_unknown_path_is_refused_with_404() {
    let relay = start(test_config()).await;

    let result = connect_async(format!("ws://{}/elsewhere", relay.addr)).await;

    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 404),
        other => panic!("expected HTTP 404, got {other:?}"),
    }
    assert!(relay.service.sources().is_empty());
    assert!(relay.service.controllers().is_empty());
}

#[tokio::test]
async fn test_silent_peer_is_closed_after_idle_timeout() {
    // Arrange: a short idle timeout and no ping inside the test window, so
    // the only frame the client ever receives is the close
    let relay = start(RelayConfig {
        idle_timeout: Duration::from_millis(300),
        ..test_config()
    })
    .await;
    let mut src = source(&relay, "unit").await;

    // Act
    wait_until("idle cleanup", || relay.service.sources().is_empty()).await;

    // Assert
    match next_message(&mut src).await {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(u16::from(frame.code), 1001);
        }
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_shutdown_flag_stops_accepting() {
    let relay = start(test_config()).await;
    relay.running.store(false, Ordering::Relaxed);
    sleep(Duration::from_millis(400)).await;

    let result = timeout(
        Duration::from_secs(2),
        connect_async(format!("ws://{}/ubiquitous", relay.addr)),
    )
    .await;

    assert!(
        !matches!(result, Ok(Ok(_))),
        "no session should be accepted after shutdown"
    );
}
