//! Session statistics
//!
//! Runtime degradation (dropped frames, reconnects, failed sends) never
//! reaches a caller as an error. It is counted here and read through
//! snapshots.

pub mod metrics;

pub use metrics::{BroadcastCounters, BroadcastStats, CaptureCounters, CaptureStats};
