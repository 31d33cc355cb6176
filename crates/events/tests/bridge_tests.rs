//! Integration tests for the push bridge against a local WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use cmdwatch_events::{EventBus, PushBridge, PushBridgeConfig};
use futures::SinkExt;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Accept one connection per entry of `sessions`, send that session's
/// frames, then close it.
async fn serve_sessions(sessions: Vec<Vec<&'static str>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for frames in sessions {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            for frame in frames {
                ws.send(Message::Text(frame.to_string())).await.unwrap();
            }
            let _ = ws.close(None).await;
        }
    });

    format!("ws://{addr}/ws/commands")
}

async fn serve_once(frames: Vec<&'static str>) -> String {
    serve_sessions(vec![frames]).await
}

fn quick_retry() -> PushBridgeConfig {
    PushBridgeConfig {
        retry_floor: Duration::from_millis(10),
        retry_ceiling: Duration::from_millis(50),
        retry_growth: 2.0,
    }
}

async fn next_id(rx: &mut tokio::sync::broadcast::Receiver<cmdwatch_events::CommandChanged>) -> String {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("notification in time")
        .unwrap()
        .correlation_id
        .to_string()
}

#[tokio::test]
async fn valid_frames_are_published_in_order() {
    let url = serve_once(vec![
        r#"{"type":"command_changed","id":"cmd1"}"#,
        r#"{"type":"heartbeat"}"#,
        "garbage",
        r#"{"type":"command_changed","id":"cmd2"}"#,
    ])
    .await;

    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let cancel = CancellationToken::new();

    let bridge_bus = Arc::clone(&bus);
    let bridge_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        PushBridge::new(url).run(&bridge_bus, bridge_cancel).await;
    });

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("first notification in time")
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("second notification in time")
        .unwrap();

    assert_eq!(first.correlation_id.as_str(), "cmd1");
    assert_eq!(second.correlation_id.as_str(), "cmd2");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("bridge stops after cancel")
        .unwrap();
}

#[tokio::test]
async fn connect_to_closed_port_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let bridge = PushBridge::new(format!("ws://{addr}/ws"));
    assert!(bridge.connect().await.is_err());
}

#[tokio::test]
async fn cancelled_bridge_never_publishes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let bus = EventBus::default();
    let mut rx = bus.subscribe();
    let cancel = CancellationToken::new();
    cancel.cancel();

    PushBridge::new(format!("ws://{addr}/ws")).run(&bus, cancel).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn resumes_publishing_after_server_drops_the_socket() {
    let url = serve_sessions(vec![
        vec![r#"{"type":"command_changed","id":"before-drop"}"#],
        vec![r#"{"type":"command_changed","id":"after-drop"}"#],
    ])
    .await;

    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let cancel = CancellationToken::new();

    let bridge_bus = Arc::clone(&bus);
    let bridge_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        PushBridge::with_config(url, quick_retry())
            .run(&bridge_bus, bridge_cancel)
            .await;
    });

    assert_eq!(next_id(&mut rx).await, "before-drop");
    assert_eq!(next_id(&mut rx).await, "after-drop");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("bridge stops after cancel")
        .unwrap();
}

#[tokio::test]
async fn keeps_retrying_until_the_socket_comes_up() {
    // Reserve a port, leave it closed for a while, then start serving on it.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let cancel = CancellationToken::new();

    let bridge_bus = Arc::clone(&bus);
    let bridge_cancel = cancel.clone();
    let url = format!("ws://{addr}/ws/commands");
    let task = tokio::spawn(async move {
        PushBridge::with_config(url, quick_retry())
            .run(&bridge_bus, bridge_cancel)
            .await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    let listener = TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.send(Message::Text(r#"{"type":"command_changed","id":"late"}"#.into()))
            .await
            .unwrap();
        let _ = ws.close(None).await;
    });

    assert_eq!(next_id(&mut rx).await, "late");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("bridge stops after cancel")
        .unwrap();
}

#[tokio::test]
async fn cancel_interrupts_a_long_retry_wait() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let bus = Arc::new(EventBus::default());
    let cancel = CancellationToken::new();
    let config = PushBridgeConfig {
        retry_floor: Duration::from_secs(3600),
        ..PushBridgeConfig::default()
    };

    let bridge_bus = Arc::clone(&bus);
    let bridge_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        PushBridge::with_config(format!("ws://{addr}/ws"), config)
            .run(&bridge_bus, bridge_cancel)
            .await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("bridge stops without waiting out the retry")
        .unwrap();
}
