//! UDP fan-out of captured frames
//!
//! Each broadcast owns one port from a fixed pool. Viewers subscribe by
//! sending a `CONNECT` datagram to that port and unsubscribe with
//! `DISCONNECT`; every captured frame is encoded once and sent as a single
//! datagram to each subscribed viewer.
//!
//! ```text
//!   SessionRegistry ──FrameQueue──► BroadcastSession (port 9000) ──► viewers
//!                   ──FrameQueue──► BroadcastSession (port 9001) ──► viewers
//!                                          ▲
//!                              BroadcastRegistry (ports, cap)
//! ```
//!
//! Delivery is best-effort: no acks, no ordering guarantees across the
//! network, no fragmentation. A frame that encodes larger than
//! [`BroadcastConfig::max_datagram_size`] is dropped for every viewer.

pub mod config;
pub mod control;
pub mod port;
pub mod registry;
pub mod session;
pub mod viewer;

pub use config::BroadcastConfig;
pub use control::ControlMessage;
pub use port::PortPool;
pub use registry::BroadcastRegistry;
pub use session::{BroadcastInfo, BroadcastSession};
pub use viewer::{ViewerEndpoint, ViewerRegistry};
