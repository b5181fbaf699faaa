//! Relay synthetic test-pattern sources over UDP
//!
//! Run with: cargo run --example synthetic_relay [BASE_PORT]
//!
//! Starts one capture and one broadcast per built-in source and prints the
//! port each one listens on. Subscribe from another terminal with:
//!
//!   echo -n CONNECT | nc -u 127.0.0.1 9000
//!
//! and leave with `DISCONNECT`. Every datagram is a 16-byte header
//! (sequence, width, height, big-endian) followed by raw grayscale pixels.
//!
//! Ctrl+C stops every session and waits for the ports to be released.

use std::time::Duration;

use frame_relay::backend::{RawEncoder, SyntheticBackend};
use frame_relay::{BackendError, BroadcastConfig, FrameRelay, RelayConfig};

const SOURCES: &[&str] = &["lobby", "parking", "dock"];

fn print_usage() {
    println!("Usage: synthetic_relay [BASE_PORT]");
    println!();
    println!("  BASE_PORT  first UDP port of the broadcast pool (default 9000)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let base_port: u16 = match args.get(1) {
        Some(port) => match port.parse() {
            Ok(port) => port,
            Err(e) => {
                eprintln!("Error: invalid port {:?}: {}", port, e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => 9000,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("frame_relay=info".parse()?)
                .add_directive("synthetic_relay=debug".parse()?),
        )
        .init();

    let resolver =
        |id: &str| -> Result<String, BackendError> { Ok(format!("synthetic://{}", id)) };
    let config = RelayConfig::default().broadcast(
        BroadcastConfig::default()
            .ports(base_port, 10)
            .viewer_timeout(Duration::from_secs(30)),
    );
    let relay = FrameRelay::with_config(
        resolver,
        SyntheticBackend::new(160, 120, 15),
        RawEncoder,
        config,
    );

    for source in SOURCES {
        match relay.start(source).await {
            Ok(port) => println!("{:<8} -> udp port {}", source, port),
            Err(e) => eprintln!("{:<8} -> failed: {}", source, e),
        }
    }
    println!();
    println!("Send CONNECT to a port to receive frames. Ctrl+C to stop.");

    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for source in SOURCES {
                    if let Some(stats) = relay.broadcast().stats(source).await {
                        tracing::info!(
                            source = %source,
                            viewers = stats.viewers,
                            sent = stats.datagrams_sent,
                            bitrate = stats.bitrate(),
                            "Broadcast stats"
                        );
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    relay.close_all().await;
    Ok(())
}
