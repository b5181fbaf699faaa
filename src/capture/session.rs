//! Capture session and its decode loop
//!
//! The decode loop walks a small state machine:
//!
//! ```text
//!   Opening ──► Reading ◄──────┐
//!                  │  read err │ reopen ok
//!                  ▼           │
//!             Reconnecting ────┘
//!                  │ reopen err
//!                  ▼
//!               Failed          (cancel from any state ──► Closed)
//! ```
//!
//! Cancellation is checked before every read and while waiting for queue
//! space. A read already in flight on the blocking pool is allowed to finish.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::backend::{run_blocking, CaptureHandle, VideoBackend};
use crate::error::BackendError;
use crate::stats::{CaptureCounters, CaptureStats};

use super::frame::{Frame, FrameQueue};

/// Lifecycle state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Opening the source
    Opening,
    /// Pulling frames
    Reading,
    /// Reopening the source after a read failure
    Reconnecting,
    /// Stopped by cancellation
    Closed,
    /// Reopen failed; the loop has exited and no more frames will arrive
    Failed,
}

impl CaptureState {
    /// Whether the decode loop has exited
    pub fn is_finished(&self) -> bool {
        matches!(self, CaptureState::Closed | CaptureState::Failed)
    }
}

/// A resolved source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSource {
    /// Caller-supplied source reference
    pub source_id: String,
    /// Playable URL the reference resolved to
    pub url: String,
}

/// A running capture for one source
///
/// Dropping the session cancels its decode loop.
pub struct CaptureSession {
    source: Arc<StreamSource>,
    queue: FrameQueue,
    cancel: CancellationToken,
    state: watch::Receiver<CaptureState>,
    stats: Arc<CaptureCounters>,
}

impl CaptureSession {
    /// Start the decode loop for an already opened handle
    pub(crate) fn spawn(
        source: StreamSource,
        handle: Box<dyn CaptureHandle>,
        backend: Arc<dyn VideoBackend>,
        queue_capacity: usize,
        tasks: &TaskTracker,
    ) -> Self {
        let (tx, queue) = FrameQueue::channel(queue_capacity);
        let (state_tx, state_rx) = watch::channel(CaptureState::Opening);
        let source = Arc::new(source);
        let cancel = CancellationToken::new();
        let stats = Arc::new(CaptureCounters::new());

        let decode = DecodeLoop {
            source: Arc::clone(&source),
            backend,
            handle: Some(handle),
            tx,
            cancel: cancel.clone(),
            state: state_tx,
            stats: Arc::clone(&stats),
            sequence: 0,
        };
        tasks.spawn(decode.run());

        Self {
            source,
            queue,
            cancel,
            state: state_rx,
            stats,
        }
    }

    /// The resolved source
    pub fn source(&self) -> &StreamSource {
        &self.source
    }

    /// Handle to the frame queue
    pub fn queue(&self) -> FrameQueue {
        self.queue.clone()
    }

    /// Current state of the decode loop
    pub fn state(&self) -> CaptureState {
        *self.state.borrow()
    }

    /// Whether the decode loop has exited
    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    /// Counters snapshot
    pub fn stats(&self) -> CaptureStats {
        self.stats.snapshot()
    }

    /// Wait until the decode loop has exited and return its final state
    pub async fn finished(&self) -> CaptureState {
        wait_finished(self.state.clone()).await
    }

    /// Clone of the state channel, usable without holding the registry lock
    pub(crate) fn state_watch(&self) -> watch::Receiver<CaptureState> {
        self.state.clone()
    }

    /// Request the decode loop to stop
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct DecodeLoop {
    source: Arc<StreamSource>,
    backend: Arc<dyn VideoBackend>,
    handle: Option<Box<dyn CaptureHandle>>,
    tx: mpsc::Sender<Frame>,
    cancel: CancellationToken,
    state: watch::Sender<CaptureState>,
    stats: Arc<CaptureCounters>,
    sequence: u64,
}

impl DecodeLoop {
    async fn run(mut self) {
        self.state.send_replace(CaptureState::Reading);
        tracing::info!(
            source = %self.source.source_id,
            url = %self.source.url,
            "Capture started"
        );

        let end = self.read_loop().await;

        if let Some(mut handle) = self.handle.take() {
            let _ = tokio::task::spawn_blocking(move || handle.close()).await;
        }
        self.state.send_replace(end);

        let stats = self.stats.snapshot();
        tracing::info!(
            source = %self.source.source_id,
            state = ?end,
            frames = stats.frames_captured,
            reconnects = stats.reconnects,
            "Capture stopped"
        );
        // Dropping `self.tx` here closes the queue
    }

    async fn read_loop(&mut self) -> CaptureState {
        loop {
            if self.cancel.is_cancelled() {
                return CaptureState::Closed;
            }

            let Some(mut handle) = self.handle.take() else {
                return CaptureState::Failed;
            };

            let sequence = self.sequence;
            let read = tokio::task::spawn_blocking(move || {
                let result = read_next(&mut *handle, sequence);
                (handle, result)
            })
            .await;

            let result = match read {
                Ok((handle, result)) => {
                    self.handle = Some(handle);
                    result
                }
                Err(e) => {
                    tracing::error!(
                        source = %self.source.source_id,
                        error = %e,
                        "Decoder task panicked"
                    );
                    return CaptureState::Failed;
                }
            };

            match result {
                Ok(Some(frame)) => {
                    self.sequence += 1;
                    self.stats.on_frame();
                    tracing::trace!(
                        source = %self.source.source_id,
                        sequence = frame.sequence,
                        size = frame.size(),
                        "Frame captured"
                    );

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return CaptureState::Closed,
                        sent = self.tx.send(frame) => {
                            if sent.is_err() {
                                tracing::debug!(
                                    source = %self.source.source_id,
                                    "Frame queue dropped by all consumers"
                                );
                                return CaptureState::Closed;
                            }
                        }
                    }
                }
                Ok(None) => self.stats.on_empty_frame(),
                Err(e) => {
                    if let Some(end) = self.reconnect(e).await {
                        return end;
                    }
                }
            }
        }
    }

    /// Close the failed handle and open a fresh one on the same URL
    ///
    /// Returns the terminal state if the loop must exit.
    async fn reconnect(&mut self, cause: BackendError) -> Option<CaptureState> {
        tracing::warn!(
            source = %self.source.source_id,
            error = %cause,
            "Frame read failed, reconnecting"
        );
        self.state.send_replace(CaptureState::Reconnecting);

        if let Some(mut old) = self.handle.take() {
            let _ = tokio::task::spawn_blocking(move || old.close()).await;
        }

        if self.cancel.is_cancelled() {
            return Some(CaptureState::Closed);
        }

        let backend = Arc::clone(&self.backend);
        let url = self.source.url.clone();
        match run_blocking(move || backend.open(&url)).await {
            Ok(handle) => {
                self.handle = Some(handle);
                self.stats.on_reconnect();
                self.state.send_replace(CaptureState::Reading);
                tracing::info!(source = %self.source.source_id, "Reconnected");
                None
            }
            Err(e) => {
                tracing::error!(
                    source = %self.source.source_id,
                    error = %e,
                    "Reconnect failed, capture session is dead"
                );
                Some(CaptureState::Failed)
            }
        }
    }
}

/// Wait on a state channel until the decode loop has exited
pub(crate) async fn wait_finished(mut state: watch::Receiver<CaptureState>) -> CaptureState {
    if let Ok(s) = state.wait_for(CaptureState::is_finished).await {
        return *s;
    }
    // Sender dropped; the last value it sent is final
    let last = *state.borrow();
    last
}

/// Read one frame and copy it out of the decoder's buffer
///
/// Empty images yield `Ok(None)`.
fn read_next(
    handle: &mut dyn CaptureHandle,
    sequence: u64,
) -> Result<Option<Frame>, BackendError> {
    let raw = handle.read_frame()?;
    if raw.is_empty() {
        return Ok(None);
    }
    Ok(Some(Frame::from_raw(&raw, sequence)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finished_states() {
        assert!(!CaptureState::Opening.is_finished());
        assert!(!CaptureState::Reading.is_finished());
        assert!(!CaptureState::Reconnecting.is_finished());
        assert!(CaptureState::Closed.is_finished());
        assert!(CaptureState::Failed.is_finished());
    }

    #[tokio::test]
    async fn test_wait_finished() {
        let (tx, rx) = watch::channel(CaptureState::Reading);
        let mut waiter = tokio_test::task::spawn(wait_finished(rx));
        tokio_test::assert_pending!(waiter.poll());

        tx.send_replace(CaptureState::Reconnecting);
        tokio_test::assert_pending!(waiter.poll());

        tx.send_replace(CaptureState::Failed);
        drop(tx);
        assert!(waiter.is_woken());
        assert_eq!(tokio_test::assert_ready!(waiter.poll()), CaptureState::Failed);
    }

    #[tokio::test]
    async fn test_wait_finished_sender_gone() {
        let (tx, rx) = watch::channel(CaptureState::Reading);
        drop(tx);
        assert_eq!(wait_finished(rx).await, CaptureState::Reading);
    }
}
