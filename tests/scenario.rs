//! End-to-end relay scenario over real UDP sockets

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use frame_relay::backend::{RawEncoder, SyntheticBackend};
use frame_relay::{BackendError, BroadcastConfig, CaptureConfig, FrameRelay, RelayConfig};
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const BASE_PORT: u16 = 29600;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn relay() -> FrameRelay {
    let resolver =
        |id: &str| -> Result<String, BackendError> { Ok(format!("synthetic://{}", id)) };
    let config = RelayConfig::default()
        .capture(CaptureConfig::default().queue_capacity(4))
        .broadcast(
            BroadcastConfig::default()
                .bind_ip(LOCALHOST)
                .ports(BASE_PORT, 10)
                .control_recv_timeout(Duration::from_millis(20)),
        );
    FrameRelay::with_config(resolver, SyntheticBackend::new(32, 24, 100), RawEncoder, config)
}

async fn recv_payload(viewer: &UdpSocket, wait: Duration) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; 65536];
    match timeout(wait, viewer.recv(&mut buf)).await {
        Ok(Ok(len)) => Some(buf[..len].to_vec()),
        _ => None,
    }
}

/// Drain anything that was in flight when the viewer left
async fn drain(viewer: &UdpSocket) {
    while recv_payload(viewer, Duration::from_millis(100)).await.is_some() {}
}

#[tokio::test]
async fn capture_broadcast_connect_disconnect_stop() {
    init_tracing();
    let relay = relay();

    relay.start_capture("S1").await.unwrap();
    let port = relay.start_broadcast("S1").await.unwrap();
    assert!((BASE_PORT..BASE_PORT + 10).contains(&port));

    let server = SocketAddr::new(LOCALHOST, port);
    let viewer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    viewer.send_to(b"CONNECT", server).await.unwrap();

    // Frames arrive in capture order
    let mut last = None;
    for _ in 0..5 {
        let payload = recv_payload(&viewer, Duration::from_secs(2))
            .await
            .expect("frame delivered to viewer");
        assert_eq!(payload.len(), 16 + 32 * 24);

        let sequence = RawEncoder::sequence(&payload).unwrap();
        if let Some(prev) = last {
            assert!(sequence > prev);
        }
        last = Some(sequence);
    }

    viewer.send_to(b"DISCONNECT", server).await.unwrap();
    timeout(Duration::from_secs(2), async {
        while relay.get_broadcast("S1").await.unwrap().viewers > 0 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    drain(&viewer).await;
    assert!(recv_payload(&viewer, Duration::from_millis(200))
        .await
        .is_none());

    let stats = relay.broadcast().stats("S1").await.unwrap();
    assert!(stats.datagrams_sent >= 5);
    assert_eq!(stats.oversized_frames, 0);

    relay.stop_broadcast("S1").await.unwrap();
    let rebound = UdpSocket::bind(server).await.expect("port released on stop");
    drop(rebound);

    relay.close_all().await;
}

#[tokio::test]
async fn capture_stop_ends_bound_broadcast() {
    init_tracing();
    let resolver =
        |id: &str| -> Result<String, BackendError> { Ok(format!("synthetic://{}", id)) };
    let config = RelayConfig::default().broadcast(
        BroadcastConfig::default()
            .bind_ip(LOCALHOST)
            .ports(BASE_PORT + 20, 2)
            .control_recv_timeout(Duration::from_millis(20)),
    );
    let relay = FrameRelay::with_config(
        resolver,
        SyntheticBackend::new(16, 16, 200),
        RawEncoder,
        config,
    );

    let port = relay.start("S2").await.unwrap();
    assert_eq!(port, BASE_PORT + 20);

    relay.stop_capture("S2").await.unwrap();

    let ended = timeout(Duration::from_secs(2), async {
        while relay.get_broadcast("S2").await.unwrap().active {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(ended.is_ok(), "fan-out exits once the capture queue closes");

    relay.close_all().await;
}

#[tokio::test]
async fn independent_sources_get_distinct_ports() {
    init_tracing();
    let resolver =
        |id: &str| -> Result<String, BackendError> { Ok(format!("synthetic://{}", id)) };
    let config = RelayConfig::default().broadcast(
        BroadcastConfig::default()
            .bind_ip(LOCALHOST)
            .ports(BASE_PORT + 30, 3)
            .control_recv_timeout(Duration::from_millis(20)),
    );
    let relay = FrameRelay::with_config(
        resolver,
        SyntheticBackend::new(8, 8, 100),
        RawEncoder,
        config,
    );

    let a = relay.start("a").await.unwrap();
    let b = relay.start("b").await.unwrap();
    assert_ne!(a, b);

    // A viewer on one source sees nothing from the other
    let viewer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    viewer.send_to(b"CONNECT", (LOCALHOST, a)).await.unwrap();
    let mut buf = [0u8; 1024];
    let (_, from) = timeout(Duration::from_secs(2), viewer.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(from.port(), a);
    assert_eq!(relay.get_broadcast("b").await.unwrap().viewers, 0);

    relay.close_all().await;
}
