//! Relay facade
//!
//! [`FrameRelay`] owns one capture registry and one broadcast registry wired
//! to it, and is what an application usually holds.

use std::sync::Arc;

use crate::backend::{FrameEncoder, SourceResolver, VideoBackend};
use crate::broadcast::{BroadcastConfig, BroadcastInfo, BroadcastRegistry};
use crate::capture::{CaptureConfig, FrameQueue, SessionRegistry};
use crate::error::Result;

/// Combined relay configuration
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// Capture side
    pub capture: CaptureConfig,
    /// Broadcast side
    pub broadcast: BroadcastConfig,
}

impl RelayConfig {
    /// Set the capture configuration
    pub fn capture(mut self, config: CaptureConfig) -> Self {
        self.capture = config;
        self
    }

    /// Set the broadcast configuration
    pub fn broadcast(mut self, config: BroadcastConfig) -> Self {
        self.broadcast = config;
        self
    }
}

/// Capture-and-broadcast relay for many sources
pub struct FrameRelay {
    capture: Arc<SessionRegistry>,
    broadcast: BroadcastRegistry,
}

impl FrameRelay {
    /// Create a relay with default configuration
    pub fn new(
        resolver: impl SourceResolver,
        backend: impl VideoBackend,
        encoder: impl FrameEncoder,
    ) -> Self {
        Self::with_config(resolver, backend, encoder, RelayConfig::default())
    }

    /// Create a relay with custom configuration
    pub fn with_config(
        resolver: impl SourceResolver,
        backend: impl VideoBackend,
        encoder: impl FrameEncoder,
        config: RelayConfig,
    ) -> Self {
        let capture = Arc::new(SessionRegistry::with_config(
            resolver,
            backend,
            config.capture,
        ));
        let broadcast =
            BroadcastRegistry::with_config(Arc::clone(&capture), encoder, config.broadcast);

        Self { capture, broadcast }
    }

    /// The capture registry
    pub fn capture(&self) -> &Arc<SessionRegistry> {
        &self.capture
    }

    /// The broadcast registry
    pub fn broadcast(&self) -> &BroadcastRegistry {
        &self.broadcast
    }

    /// Start capturing a source
    pub async fn start_capture(&self, source_id: &str) -> Result<()> {
        Ok(self.capture.start(source_id).await?)
    }

    /// Stop capturing a source
    ///
    /// A broadcast bound to the source ends once it drains the queue.
    pub async fn stop_capture(&self, source_id: &str) -> Result<()> {
        Ok(self.capture.stop(source_id).await?)
    }

    /// Get the frame queue of a captured source
    pub async fn frame_queue(&self, source_id: &str) -> Result<FrameQueue> {
        Ok(self.capture.frame_queue(source_id).await?)
    }

    /// Start broadcasting a captured source, returning its port
    pub async fn start_broadcast(&self, source_id: &str) -> Result<u16> {
        Ok(self.broadcast.start(source_id).await?)
    }

    /// Stop broadcasting a source
    pub async fn stop_broadcast(&self, source_id: &str) -> Result<()> {
        Ok(self.broadcast.stop(source_id).await?)
    }

    /// Get a public view of a broadcast
    pub async fn get_broadcast(&self, source_id: &str) -> Result<BroadcastInfo> {
        Ok(self.broadcast.get(source_id).await?)
    }

    /// Cancel every broadcast without waiting
    pub async fn stop_all_broadcasts(&self) {
        self.broadcast.stop_all().await;
    }

    /// Capture and broadcast a source in one call
    ///
    /// If the broadcast cannot start, the capture session started here is
    /// stopped again.
    pub async fn start(&self, source_id: &str) -> Result<u16> {
        self.capture.start(source_id).await?;

        match self.broadcast.start(source_id).await {
            Ok(port) => Ok(port),
            Err(e) => {
                tracing::warn!(
                    source = %source_id,
                    error = %e,
                    "Broadcast failed to start, stopping capture"
                );
                if let Err(stop_err) = self.capture.stop(source_id).await {
                    tracing::debug!(source = %source_id, error = %stop_err, "Capture already gone");
                }
                Err(e.into())
            }
        }
    }

    /// Stop everything and wait for every task to exit
    ///
    /// Broadcasts go first so no fan-out loop is left reading a closing
    /// queue. Safe to call more than once.
    pub async fn close_all(&self) {
        self.broadcast.close().await;
        self.capture.shutdown().await;
        tracing::info!("Relay closed");
    }
}
