//! Broadcast registry
//!
//! Maps source-id to its [`BroadcastSession`] and hands out ports from the
//! configured pool. Frames come from the capture [`SessionRegistry`]; the
//! broadcast never owns the capture session's lifecycle.
//!
//! Lock order is this registry's map first, then the capture registry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::backend::FrameEncoder;
use crate::capture::SessionRegistry;
use crate::error::BroadcastError;
use crate::stats::BroadcastStats;

use super::config::BroadcastConfig;
use super::port::PortPool;
use super::session::{BroadcastInfo, BroadcastSession};
use super::viewer::ViewerEndpoint;

/// Registry of live broadcast sessions
pub struct BroadcastRegistry {
    /// Map of source-id to broadcast session
    sessions: RwLock<HashMap<String, BroadcastSession>>,

    /// Source of frame queues
    capture: Arc<SessionRegistry>,

    encoder: Arc<dyn FrameEncoder>,

    ports: PortPool,

    /// Configuration
    config: BroadcastConfig,
}

impl BroadcastRegistry {
    /// Create a registry with default configuration
    pub fn new(capture: Arc<SessionRegistry>, encoder: impl FrameEncoder) -> Self {
        Self::with_config(capture, encoder, BroadcastConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(
        capture: Arc<SessionRegistry>,
        encoder: impl FrameEncoder,
        config: BroadcastConfig,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            capture,
            encoder: Arc::new(encoder),
            ports: PortPool::from_config(&config),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    /// Start broadcasting a captured source
    ///
    /// Returns the UDP port viewers should send `CONNECT` to. Sessions whose
    /// frame queue has already closed are reaped first and do not count
    /// against the session cap.
    pub async fn start(&self, source_id: &str) -> Result<u16, BroadcastError> {
        let mut sessions = self.sessions.write().await;

        let finished: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| session.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        for id in finished {
            if let Some(session) = sessions.remove(&id) {
                tracing::debug!(source = %id, port = session.port(), "Reaping ended broadcast");
                session.shutdown().await;
            }
        }

        if sessions.contains_key(source_id) {
            return Err(BroadcastError::AlreadyExists(source_id.to_string()));
        }

        if sessions.len() >= self.config.max_sessions {
            return Err(BroadcastError::CapacityExceeded {
                max: self.config.max_sessions,
            });
        }

        let candidate = self.ports.probe().ok_or_else(|| self.ports.exhausted())?;

        // A capture whose decode loop has exited would end the broadcast at once
        let live = matches!(self.capture.state(source_id).await, Some(s) if !s.is_finished());
        if !live {
            return Err(BroadcastError::SourceNotFound(source_id.to_string()));
        }
        let queue = self
            .capture
            .frame_queue(source_id)
            .await
            .map_err(|_| BroadcastError::SourceNotFound(source_id.to_string()))?;

        let (port, socket) = self.ports.bind_from(candidate).await?;

        let session = BroadcastSession::spawn(
            source_id,
            port,
            socket,
            queue,
            Arc::clone(&self.encoder),
            &self.config,
        );
        sessions.insert(source_id.to_string(), session);

        tracing::info!(
            source = %source_id,
            port = port,
            sessions = sessions.len(),
            "Broadcast started"
        );

        Ok(port)
    }

    /// Stop a broadcast and wait until its port is released
    pub async fn stop(&self, source_id: &str) -> Result<(), BroadcastError> {
        let session = self
            .sessions
            .write()
            .await
            .remove(source_id)
            .ok_or_else(|| BroadcastError::NotFound(source_id.to_string()))?;

        let port = session.port();
        session.shutdown().await;

        tracing::info!(source = %source_id, port = port, "Broadcast stopped");
        Ok(())
    }

    /// Get a public view of a broadcast
    pub async fn get(&self, source_id: &str) -> Result<BroadcastInfo, BroadcastError> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(source_id)
            .ok_or_else(|| BroadcastError::NotFound(source_id.to_string()))?;
        Ok(session.info().await)
    }

    /// Get the subscribed viewers of a broadcast
    pub async fn viewers(&self, source_id: &str) -> Result<Vec<ViewerEndpoint>, BroadcastError> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(source_id)
            .ok_or_else(|| BroadcastError::NotFound(source_id.to_string()))?;
        Ok(session.viewers().await)
    }

    /// Get broadcast statistics
    pub async fn stats(&self, source_id: &str) -> Option<BroadcastStats> {
        let sessions = self.sessions.read().await;
        match sessions.get(source_id) {
            Some(session) => Some(session.stats().await),
            None => None,
        }
    }

    /// Check if a broadcast is registered
    pub async fn contains(&self, source_id: &str) -> bool {
        self.sessions.read().await.contains_key(source_id)
    }

    /// Source-ids of all registered broadcasts
    pub async fn source_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Number of registered broadcasts
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no broadcast is registered
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Cancel every broadcast and clear the registry
    ///
    /// Returns without waiting for the sessions' tasks.
    pub async fn stop_all(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();

        for (_, session) in sessions.drain() {
            session.cancel();
        }

        tracing::info!(sessions = count, "Stopped all broadcasts");
    }

    /// Stop every broadcast and wait for all ports to be released
    ///
    /// Safe to call more than once.
    pub async fn close(&self) {
        let drained: Vec<BroadcastSession> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, session)| session).collect()
        };

        let count = drained.len();
        for session in drained {
            session.shutdown().await;
        }

        tracing::info!(sessions = count, "Broadcast registry closed");
    }
}
