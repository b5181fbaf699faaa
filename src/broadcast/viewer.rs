//! Viewer registry
//!
//! Written by the control listener, read by the fan-out loop. Fan-out takes
//! a snapshot under the read lock and sends without holding it, so a viewer
//! added mid-frame may miss that frame.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// A subscribed viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerEndpoint {
    /// Address frames are sent to
    pub addr: SocketAddr,
    /// Last CONNECT received from this address
    pub last_seen: Instant,
}

/// Set of viewers keyed by address
#[derive(Debug, Default)]
pub struct ViewerRegistry {
    viewers: RwLock<HashMap<SocketAddr, Instant>>,
}

impl ViewerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a viewer
    ///
    /// Returns true if the viewer was not registered before.
    pub async fn connect(&self, addr: SocketAddr) -> bool {
        self.viewers
            .write()
            .await
            .insert(addr, Instant::now())
            .is_none()
    }

    /// Remove a viewer
    ///
    /// Returns true if the viewer was registered.
    pub async fn disconnect(&self, addr: &SocketAddr) -> bool {
        self.viewers.write().await.remove(addr).is_some()
    }

    /// Addresses of all current viewers
    pub async fn snapshot(&self) -> Vec<SocketAddr> {
        self.viewers.read().await.keys().copied().collect()
    }

    /// All current viewers with their last-seen time
    pub async fn endpoints(&self) -> Vec<ViewerEndpoint> {
        self.viewers
            .read()
            .await
            .iter()
            .map(|(addr, last_seen)| ViewerEndpoint {
                addr: *addr,
                last_seen: *last_seen,
            })
            .collect()
    }

    /// Check if an address is subscribed
    pub async fn contains(&self, addr: &SocketAddr) -> bool {
        self.viewers.read().await.contains_key(addr)
    }

    /// Number of viewers
    pub async fn len(&self) -> usize {
        self.viewers.read().await.len()
    }

    /// Whether there are no viewers
    pub async fn is_empty(&self) -> bool {
        self.viewers.read().await.is_empty()
    }

    /// Remove viewers not seen for longer than `max_age`
    ///
    /// Returns the removed addresses.
    pub async fn prune(&self, max_age: Duration) -> Vec<SocketAddr> {
        let now = Instant::now();
        let mut viewers = self.viewers.write().await;

        let stale: Vec<SocketAddr> = viewers
            .iter()
            .filter(|(_, last_seen)| now.duration_since(**last_seen) > max_age)
            .map(|(addr, _)| *addr)
            .collect();

        for addr in &stale {
            viewers.remove(addr);
        }

        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn test_connect_disconnect() {
        let viewers = ViewerRegistry::new();

        assert!(viewers.connect(addr(40000)).await);
        assert!(!viewers.connect(addr(40000)).await); // refresh
        assert!(viewers.connect(addr(40001)).await);
        assert_eq!(viewers.len().await, 2);

        assert!(viewers.disconnect(&addr(40000)).await);
        assert!(!viewers.disconnect(&addr(40000)).await); // absent is fine
        assert!(!viewers.contains(&addr(40000)).await);
        assert_eq!(viewers.snapshot().await, vec![addr(40001)]);
    }

    #[tokio::test]
    async fn test_refresh_updates_last_seen() {
        let viewers = ViewerRegistry::new();
        viewers.connect(addr(40000)).await;
        let first = viewers.endpoints().await[0].last_seen;

        tokio::time::sleep(Duration::from_millis(5)).await;
        viewers.connect(addr(40000)).await;
        let second = viewers.endpoints().await[0].last_seen;

        assert!(second > first);
    }

    #[tokio::test]
    async fn test_prune_stale() {
        let viewers = ViewerRegistry::new();
        viewers.connect(addr(40000)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        viewers.connect(addr(40001)).await;

        let removed = viewers.prune(Duration::from_millis(20)).await;
        assert_eq!(removed, vec![addr(40000)]);
        assert_eq!(viewers.snapshot().await, vec![addr(40001)]);
        assert!(!viewers.is_empty().await);
    }
}
