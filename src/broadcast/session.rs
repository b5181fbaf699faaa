//! Broadcast session
//!
//! Two tasks share one UDP socket:
//!
//! ```text
//!                      ┌──────────────────────┐
//!   viewer ──CONNECT──►│  control listener    │──write──► ViewerRegistry
//!          ◄─DISCONNECT│  (recv_from + timeout)│               │
//!                      └──────────────────────┘               │ snapshot
//!                      ┌──────────────────────┐               ▼
//!   FrameQueue ───────►│  fan-out             │──send_to──► each viewer
//!                      │  (encode, size check)│
//!                      └──────────────────────┘
//! ```
//!
//! The socket is held in an `Arc` and closes when the last task drops it.
//! When the frame queue closes, fan-out cancels the session so the control
//! listener exits too and the port is released.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::{run_blocking, FrameEncoder};
use crate::capture::{Frame, FrameQueue};
use crate::stats::{BroadcastCounters, BroadcastStats};

use super::config::BroadcastConfig;
use super::control::ControlMessage;
use super::viewer::{ViewerEndpoint, ViewerRegistry};

/// Largest control datagram worth reading; longer payloads are never valid
const CONTROL_BUFFER_LEN: usize = 64;

/// Public view of a broadcast session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastInfo {
    /// Source being broadcast
    pub source_id: String,
    /// UDP port viewers connect to
    pub port: u16,
    /// Number of subscribed viewers
    pub viewers: usize,
    /// False once the session's loops have stopped
    pub active: bool,
}

/// A running broadcast for one source
///
/// Dropping the session cancels both of its tasks.
pub struct BroadcastSession {
    source_id: Arc<str>,
    port: u16,
    viewers: Arc<ViewerRegistry>,
    stats: Arc<BroadcastCounters>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl BroadcastSession {
    /// Start fan-out and control listening on a bound socket
    pub(crate) fn spawn(
        source_id: &str,
        port: u16,
        socket: UdpSocket,
        queue: FrameQueue,
        encoder: Arc<dyn FrameEncoder>,
        config: &BroadcastConfig,
    ) -> Self {
        let source_id: Arc<str> = Arc::from(source_id);
        let socket = Arc::new(socket);
        let viewers = Arc::new(ViewerRegistry::new());
        let stats = Arc::new(BroadcastCounters::new());
        let cancel = CancellationToken::new();

        let fan_out = FanOut {
            source_id: Arc::clone(&source_id),
            socket: Arc::clone(&socket),
            queue,
            encoder,
            viewers: Arc::clone(&viewers),
            stats: Arc::clone(&stats),
            cancel: cancel.clone(),
            max_datagram_size: config.max_datagram_size,
        };

        let control = ControlListener {
            source_id: Arc::clone(&source_id),
            socket,
            viewers: Arc::clone(&viewers),
            cancel: cancel.clone(),
            recv_timeout: config.control_recv_timeout,
            viewer_timeout: config.viewer_timeout,
        };

        let tasks = vec![tokio::spawn(fan_out.run()), tokio::spawn(control.run())];

        Self {
            source_id,
            port,
            viewers,
            stats,
            cancel,
            tasks,
        }
    }

    /// Source being broadcast
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Bound UDP port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the session has been cancelled or its frame queue closed
    pub fn is_finished(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until the session is cancelled or its frame queue closes
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }

    /// Number of subscribed viewers
    pub async fn viewer_count(&self) -> usize {
        self.viewers.len().await
    }

    /// Subscribed viewers
    pub async fn viewers(&self) -> Vec<ViewerEndpoint> {
        self.viewers.endpoints().await
    }

    /// Counters snapshot
    pub async fn stats(&self) -> BroadcastStats {
        self.stats.snapshot(self.viewers.len().await)
    }

    /// Public view of the session
    pub async fn info(&self) -> BroadcastInfo {
        BroadcastInfo {
            source_id: self.source_id.to_string(),
            port: self.port,
            viewers: self.viewers.len().await,
            active: !self.is_finished(),
        }
    }

    /// Request both tasks to stop without waiting
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for both tasks to exit, releasing the port
    pub(crate) async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                tracing::error!(
                    source = %self.source_id,
                    error = %e,
                    "Broadcast task panicked"
                );
            }
        }
    }
}

impl Drop for BroadcastSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct FanOut {
    source_id: Arc<str>,
    socket: Arc<UdpSocket>,
    queue: FrameQueue,
    encoder: Arc<dyn FrameEncoder>,
    viewers: Arc<ViewerRegistry>,
    stats: Arc<BroadcastCounters>,
    cancel: CancellationToken,
    max_datagram_size: usize,
}

impl FanOut {
    async fn run(self) {
        loop {
            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                frame = self.queue.recv() => frame,
            };

            let Some(frame) = frame else {
                tracing::info!(
                    source = %self.source_id,
                    "Frame queue closed, ending broadcast"
                );
                self.cancel.cancel();
                break;
            };

            self.deliver(frame).await;
        }

        tracing::debug!(source = %self.source_id, "Fan-out loop exited");
    }

    /// Encode one frame and send it to every current viewer
    async fn deliver(&self, frame: Frame) {
        let viewers = self.viewers.snapshot().await;
        if viewers.is_empty() {
            tracing::trace!(
                source = %self.source_id,
                sequence = frame.sequence,
                "No viewers, dropping frame"
            );
            return;
        }

        let sequence = frame.sequence;
        let encoder = Arc::clone(&self.encoder);
        let payload = match run_blocking(move || encoder.encode(&frame)).await {
            Ok(payload) => payload,
            Err(e) => {
                self.stats.on_encode_failure();
                tracing::warn!(
                    source = %self.source_id,
                    sequence = sequence,
                    error = %e,
                    "Frame encode failed, skipping"
                );
                return;
            }
        };
        self.stats.on_encoded();

        if payload.len() > self.max_datagram_size {
            self.stats.on_oversized();
            tracing::warn!(
                source = %self.source_id,
                sequence = sequence,
                size = payload.len(),
                max = self.max_datagram_size,
                viewers = viewers.len(),
                "Encoded frame exceeds datagram limit, not sent"
            );
            return;
        }

        for addr in viewers {
            match self.socket.send_to(&payload, addr).await {
                Ok(sent) => self.stats.on_sent(sent),
                Err(e) => {
                    self.stats.on_send_failure();
                    tracing::debug!(
                        source = %self.source_id,
                        viewer = %addr,
                        error = %e,
                        "Send to viewer failed"
                    );
                }
            }
        }
    }
}

struct ControlListener {
    source_id: Arc<str>,
    socket: Arc<UdpSocket>,
    viewers: Arc<ViewerRegistry>,
    cancel: CancellationToken,
    recv_timeout: Duration,
    viewer_timeout: Option<Duration>,
}

impl ControlListener {
    async fn run(self) {
        let mut buf = [0u8; CONTROL_BUFFER_LEN];
        let mut last_prune = Instant::now();

        loop {
            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                r = tokio::time::timeout(self.recv_timeout, self.socket.recv_from(&mut buf)) => r,
            };

            match received {
                Ok(Ok((len, addr))) => self.handle(&buf[..len], addr).await,
                Ok(Err(e)) => {
                    tracing::debug!(
                        source = %self.source_id,
                        error = %e,
                        "Control receive failed"
                    );
                }
                Err(_) => {} // timeout
            }

            if let Some(max_age) = self.viewer_timeout {
                if last_prune.elapsed() >= self.recv_timeout {
                    last_prune = Instant::now();
                    for addr in self.viewers.prune(max_age).await {
                        tracing::info!(
                            source = %self.source_id,
                            viewer = %addr,
                            "Viewer timed out"
                        );
                    }
                }
            }
        }

        tracing::debug!(source = %self.source_id, "Control listener exited");
    }

    async fn handle(&self, payload: &[u8], addr: SocketAddr) {
        match ControlMessage::parse(payload) {
            Some(ControlMessage::Connect) => {
                if self.viewers.connect(addr).await {
                    let viewers = self.viewers.len().await;
                    tracing::info!(
                        source = %self.source_id,
                        viewer = %addr,
                        viewers = viewers,
                        "Viewer connected"
                    );
                } else {
                    tracing::trace!(source = %self.source_id, viewer = %addr, "Viewer refreshed");
                }
            }
            Some(ControlMessage::Disconnect) => {
                if self.viewers.disconnect(&addr).await {
                    let viewers = self.viewers.len().await;
                    tracing::info!(
                        source = %self.source_id,
                        viewer = %addr,
                        viewers = viewers,
                        "Viewer disconnected"
                    );
                } else {
                    tracing::debug!(
                        source = %self.source_id,
                        viewer = %addr,
                        "DISCONNECT from unknown viewer"
                    );
                }
            }
            None => {
                tracing::debug!(
                    source = %self.source_id,
                    peer = %addr,
                    len = payload.len(),
                    "Ignoring unrecognized control datagram"
                );
            }
        }
    }
}
