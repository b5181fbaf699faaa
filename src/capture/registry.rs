//! Capture session registry
//!
//! Maps source-id to its [`CaptureSession`]. The map sits behind an async
//! `RwLock`: `start`, `stop` and `stop_all` take it exclusively, lookups
//! share it.
//!
//! Resolving and opening a source can take seconds, so `start` does both
//! without the map lock. The source-id is reserved in a pending set for the
//! duration; a concurrent `start` for the same id sees `AlreadyExists`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::RwLock;
use tokio_util::task::TaskTracker;

use crate::backend::{run_blocking, SourceResolver, VideoBackend};
use crate::error::CaptureError;
use crate::stats::CaptureStats;

use super::config::CaptureConfig;
use super::frame::FrameQueue;
use super::session::{wait_finished, CaptureSession, CaptureState, StreamSource};

/// Registry of live capture sessions
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, CaptureSession>>,
    /// Source-ids with a `start` in flight
    pending: Mutex<HashSet<String>>,
    resolver: Arc<dyn SourceResolver>,
    backend: Arc<dyn VideoBackend>,
    config: CaptureConfig,
    tasks: TaskTracker,
}

impl SessionRegistry {
    /// Create a registry with default configuration
    pub fn new(resolver: impl SourceResolver, backend: impl VideoBackend) -> Self {
        Self::with_config(resolver, backend, CaptureConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(
        resolver: impl SourceResolver,
        backend: impl VideoBackend,
        config: CaptureConfig,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashSet::new()),
            resolver: Arc::new(resolver),
            backend: Arc::new(backend),
            config,
            tasks: TaskTracker::new(),
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Resolve, open and start capturing a source
    ///
    /// Returns once the session is registered; frames are produced in the
    /// background. A session whose decode loop already exited is replaced.
    pub async fn start(&self, source_id: &str) -> Result<(), CaptureError> {
        let _reservation = self.reserve(source_id).await?;

        let resolver = Arc::clone(&self.resolver);
        let id = source_id.to_string();
        let url = run_blocking(move || resolver.resolve(&id))
            .await
            .map_err(|reason| CaptureError::ResolutionFailed {
                source_id: source_id.to_string(),
                reason,
            })?;

        tracing::debug!(source = %source_id, url = %url, "Source resolved");

        let backend = Arc::clone(&self.backend);
        let open_url = url.clone();
        let handle = run_blocking(move || backend.open(&open_url))
            .await
            .map_err(|reason| CaptureError::OpenFailed {
                source_id: source_id.to_string(),
                url: url.clone(),
                reason,
            })?;

        let source = StreamSource {
            source_id: source_id.to_string(),
            url,
        };

        let mut sessions = self.sessions.write().await;
        let session = CaptureSession::spawn(
            source,
            handle,
            Arc::clone(&self.backend),
            self.config.queue_capacity,
            &self.tasks,
        );
        sessions.insert(source_id.to_string(), session);

        tracing::info!(
            source = %source_id,
            sessions = sessions.len(),
            "Capture session registered"
        );

        Ok(())
    }

    /// Claim a source-id for an in-flight `start`
    ///
    /// Fails if a live session or another pending start holds the id. A
    /// finished session is left in place until the new one replaces it.
    async fn reserve(&self, source_id: &str) -> Result<Reservation<'_>, CaptureError> {
        let sessions = self.sessions.read().await;

        if let Some(existing) = sessions.get(source_id) {
            if !existing.is_finished() {
                return Err(CaptureError::AlreadyExists(source_id.to_string()));
            }
            tracing::info!(
                source = %source_id,
                state = ?existing.state(),
                "Replacing finished capture session"
            );
        }

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if !pending.insert(source_id.to_string()) {
            return Err(CaptureError::AlreadyExists(source_id.to_string()));
        }

        Ok(Reservation {
            pending: &self.pending,
            source_id: source_id.to_string(),
        })
    }

    /// Cancel and remove a capture session
    ///
    /// Returns without waiting for the decode loop to exit.
    pub async fn stop(&self, source_id: &str) -> Result<(), CaptureError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(source_id)
            .ok_or_else(|| CaptureError::NotFound(source_id.to_string()))?;

        session.cancel();
        tracing::info!(source = %source_id, "Capture session stopped");
        Ok(())
    }

    /// Get the frame queue of a live session
    pub async fn frame_queue(&self, source_id: &str) -> Result<FrameQueue, CaptureError> {
        self.sessions
            .read()
            .await
            .get(source_id)
            .map(CaptureSession::queue)
            .ok_or_else(|| CaptureError::NotFound(source_id.to_string()))
    }

    /// Get the resolved source of a session
    pub async fn source(&self, source_id: &str) -> Option<StreamSource> {
        self.sessions
            .read()
            .await
            .get(source_id)
            .map(|s| s.source().clone())
    }

    /// Get the decode loop state of a session
    ///
    /// A registered session in [`CaptureState::Failed`] has lost its source
    /// and will not recover on its own.
    pub async fn state(&self, source_id: &str) -> Option<CaptureState> {
        self.sessions.read().await.get(source_id).map(|s| s.state())
    }

    /// Get session statistics
    pub async fn stats(&self, source_id: &str) -> Option<CaptureStats> {
        self.sessions.read().await.get(source_id).map(|s| s.stats())
    }

    /// Wait for a session's decode loop to exit
    ///
    /// Returns `None` if no such session is registered. The registry lock is released before waiting, so `stop` may run
    /// while a caller is parked here.
    pub async fn finished(&self, source_id: &str) -> Option<CaptureState> {
        let state = self
            .sessions
            .read()
            .await
            .get(source_id)
            .map(CaptureSession::state_watch)?;
        Some(wait_finished(state).await)
    }

    /// Check if a session is registered
    pub async fn contains(&self, source_id: &str) -> bool {
        self.sessions.read().await.contains_key(source_id)
    }

    /// Source-ids of all registered sessions
    pub async fn source_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Number of registered sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is registered
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Cancel every session and clear the registry
    pub async fn stop_all(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();

        for (_, session) in sessions.drain() {
            session.cancel();
        }

        tracing::info!(sessions = count, "Stopped all capture sessions");
    }

    /// Stop every session and wait for all decode loops to exit
    pub async fn shutdown(&self) {
        self.stop_all().await;

        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();

        tracing::info!("Capture registry shut down");
    }
}

/// Pending-start claim, released on drop whether `start` succeeded or not
struct Reservation<'a> {
    pending: &'a Mutex<HashSet<String>>,
    source_id: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.source_id);
    }
}
