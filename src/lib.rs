//! Multi-source video capture and UDP fan-out relay
//!
//! Each source, named by an opaque source-id, gets its own capture pipeline
//! and its own broadcast session with a dedicated UDP port and viewer list.
//! Viewers subscribe by sending `CONNECT` to the port and leave with
//! `DISCONNECT`; each captured frame is encoded and sent to every viewer as
//! one datagram.
//!
//! # Architecture
//!
//! ```text
//!                           FrameRelay
//!          ┌───────────────────┴────────────────────┐
//!          ▼                                        ▼
//!   SessionRegistry                         BroadcastRegistry
//!   source-id ─► CaptureSession             source-id ─► BroadcastSession
//!                    │                                     │       ▲
//!   resolve ─► open ─► decode loop ──FrameQueue──► fan-out │       │ CONNECT /
//!                    (reconnects)     (bounded)      │     │       │ DISCONNECT
//!                                                    ▼     ▼       │
//!                                                  UDP socket (one port)
//!                                                    │
//!                                                    ▼
//!                                                 viewers
//! ```
//!
//! Decoding and encoding are not part of the crate. Applications plug in a
//! [`SourceResolver`](backend::SourceResolver), a
//! [`VideoBackend`](backend::VideoBackend) and a
//! [`FrameEncoder`](backend::FrameEncoder).
//!
//! # Example
//!
//! ```no_run
//! use frame_relay::backend::{RawEncoder, SyntheticBackend};
//! use frame_relay::{BackendError, FrameRelay};
//!
//! # async fn run() -> frame_relay::Result<()> {
//! let resolver = |id: &str| -> Result<String, BackendError> { Ok(format!("synthetic://{}", id)) };
//! let relay = FrameRelay::new(resolver, SyntheticBackend::default(), RawEncoder);
//!
//! let port = relay.start("camera-1").await?;
//! println!("send CONNECT to udp port {}", port);
//!
//! relay.close_all().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod broadcast;
pub mod capture;
pub mod error;
pub mod relay;
pub mod stats;

pub use broadcast::{BroadcastConfig, BroadcastInfo, BroadcastRegistry};
pub use capture::{CaptureConfig, CaptureState, Frame, FrameQueue, SessionRegistry};
pub use error::{BackendError, BroadcastError, CaptureError, Error, Result};
pub use relay::{FrameRelay, RelayConfig};
