//! Source capture
//!
//! One [`CaptureSession`] per live source pulls decoded frames from the
//! video backend and pushes them onto a bounded [`FrameQueue`]. The
//! [`SessionRegistry`] owns every session keyed by source-id.
//!
//! ```text
//!   SourceResolver ──url──► VideoBackend::open
//!                                 │
//!                          ┌──────▼───────┐   Frame   ┌────────────┐
//!                          │ decode loop  ├──────────►│ FrameQueue │──► broadcast
//!                          │ (tokio task) │  (bounded)└────────────┘
//!                          └──────────────┘
//! ```
//!
//! # Backpressure
//!
//! A full queue blocks the decode loop until the consumer catches up or the
//! session is cancelled. Frames are never dropped on the producer side, so
//! a stalled consumer stalls ingestion for that one source.

pub mod config;
pub mod frame;
pub mod registry;
pub mod session;

pub use config::CaptureConfig;
pub use frame::{Frame, FrameQueue};
pub use registry::SessionRegistry;
pub use session::{CaptureSession, CaptureState, StreamSource};
