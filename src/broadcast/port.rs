//! Broadcast port pool
//!
//! Ports are found by linear probing: bind a throwaway socket on each
//! candidate in turn, release it, and take the first that bound. The
//! session's real socket is bound afterwards, so another process can grab
//! the port in between. [`PortPool::bind_from`] handles that by probing on
//! from the next port instead of reporting success on a port it does not
//! hold.

use std::net::IpAddr;

use tokio::net::UdpSocket;

use crate::error::BroadcastError;

use super::config::BroadcastConfig;

/// A contiguous range of UDP ports on one address
#[derive(Debug, Clone)]
pub struct PortPool {
    ip: IpAddr,
    base: u16,
    range: u16,
}

impl PortPool {
    /// Create a pool of `range` ports starting at `base`
    pub fn new(ip: IpAddr, base: u16, range: u16) -> Self {
        Self { ip, base, range }
    }

    /// Create the pool described by a broadcast config
    pub fn from_config(config: &BroadcastConfig) -> Self {
        Self::new(config.bind_ip, config.base_port, config.port_range)
    }

    /// Check if a port belongs to the pool
    pub fn contains(&self, port: u16) -> bool {
        let port = u32::from(port);
        port >= u32::from(self.base) && port < self.end()
    }

    /// Lowest port in the pool that can be bound right now
    pub fn probe(&self) -> Option<u16> {
        self.probe_from(self.base)
    }

    /// Lowest port at or above `start` that can be bound right now
    pub fn probe_from(&self, start: u16) -> Option<u16> {
        let start = u32::from(start.max(self.base));
        (start..self.end())
            .map(|p| p as u16)
            .find(|&port| std::net::UdpSocket::bind((self.ip, port)).is_ok())
    }

    /// Bind a socket on `candidate`, or the next free port if it was taken
    pub async fn bind_from(&self, candidate: u16) -> Result<(u16, UdpSocket), BroadcastError> {
        let mut next = Some(candidate);

        while let Some(port) = next {
            match UdpSocket::bind((self.ip, port)).await {
                Ok(socket) => return Ok((port, socket)),
                Err(e) => {
                    tracing::warn!(
                        port = port,
                        error = %e,
                        "Port taken after probe, trying next"
                    );
                    next = port.checked_add(1).and_then(|p| self.probe_from(p));
                }
            }
        }

        Err(self.exhausted())
    }

    /// Error reported when no port is available
    pub fn exhausted(&self) -> BroadcastError {
        BroadcastError::NoFreePort {
            base: self.base,
            range: self.range,
        }
    }

    fn end(&self) -> u32 {
        (u32::from(self.base) + u32::from(self.range)).min(65536)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[test]
    fn test_contains() {
        let pool = PortPool::new(LOCALHOST, 9000, 10);

        assert!(pool.contains(9000));
        assert!(pool.contains(9009));
        assert!(!pool.contains(9010));
        assert!(!pool.contains(8999));
    }

    #[test]
    fn test_probe_skips_bound_port() {
        let pool = PortPool::new(LOCALHOST, 29300, 3);
        let _held = std::net::UdpSocket::bind((LOCALHOST, 29300)).unwrap();

        assert_eq!(pool.probe(), Some(29301));
        assert_eq!(pool.probe_from(29302), Some(29302));
    }

    #[test]
    fn test_probe_exhausted() {
        let pool = PortPool::new(LOCALHOST, 29310, 2);
        let _a = std::net::UdpSocket::bind((LOCALHOST, 29310)).unwrap();
        let _b = std::net::UdpSocket::bind((LOCALHOST, 29311)).unwrap();

        assert_eq!(pool.probe(), None);
        assert!(matches!(
            pool.exhausted(),
            BroadcastError::NoFreePort {
                base: 29310,
                range: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_bind_from_recovers_lost_race() {
        let pool = PortPool::new(LOCALHOST, 29320, 3);
        let candidate = pool.probe().unwrap();
        assert_eq!(candidate, 29320);

        // Someone else takes the probed port before the real bind
        let _thief = std::net::UdpSocket::bind((LOCALHOST, candidate)).unwrap();

        let (port, socket) = pool.bind_from(candidate).await.unwrap();
        assert_eq!(port, 29321);
        assert_eq!(socket.local_addr().unwrap().port(), 29321);
    }

    #[tokio::test]
    async fn test_bind_from_exhausted() {
        let pool = PortPool::new(LOCALHOST, 29330, 1);
        let _thief = std::net::UdpSocket::bind((LOCALHOST, 29330)).unwrap();

        let result = pool.bind_from(29330).await;
        assert!(matches!(result, Err(BroadcastError::NoFreePort { .. })));
    }
}
