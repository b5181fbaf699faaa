//! Broadcast configuration

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Default first port of the broadcast pool
pub const DEFAULT_BASE_PORT: u16 = 9000;

/// Default number of ports in the pool
pub const DEFAULT_PORT_RANGE: u16 = 10;

/// Default cap on concurrent broadcasts
pub const DEFAULT_MAX_SESSIONS: usize = 10;

/// Largest payload sent as a single datagram
///
/// Stays under the 65507-byte IPv4 UDP payload limit.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 65000;

/// Broadcast registry configuration
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Address broadcast sockets bind to
    pub bind_ip: IpAddr,

    /// First port of the pool
    pub base_port: u16,

    /// Number of consecutive ports in the pool
    pub port_range: u16,

    /// Maximum concurrent broadcasts
    pub max_sessions: usize,

    /// Encoded frames larger than this are not sent
    pub max_datagram_size: usize,

    /// How long the control listener waits for a datagram before
    /// rechecking its housekeeping
    pub control_recv_timeout: Duration,

    /// Drop viewers that have not sent CONNECT within this window
    /// (`None` keeps viewers until they send DISCONNECT)
    pub viewer_timeout: Option<Duration>,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            base_port: DEFAULT_BASE_PORT,
            port_range: DEFAULT_PORT_RANGE,
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            control_recv_timeout: Duration::from_millis(500),
            viewer_timeout: None,
        }
    }
}

impl BroadcastConfig {
    /// Set the bind address
    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Set the port pool
    ///
    /// The range is clamped so the pool never runs past port 65535.
    pub fn ports(mut self, base: u16, range: u16) -> Self {
        self.base_port = base;
        let available = (65536 - u32::from(base)).min(u32::from(u16::MAX)) as u16;
        self.port_range = range.min(available);
        self
    }

    /// Set the maximum number of concurrent broadcasts
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Set the maximum datagram payload size
    pub fn max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size;
        self
    }

    /// Set the control socket receive timeout
    pub fn control_recv_timeout(mut self, timeout: Duration) -> Self {
        self.control_recv_timeout = timeout;
        self
    }

    /// Expire viewers that stay silent longer than `timeout`
    pub fn viewer_timeout(mut self, timeout: Duration) -> Self {
        self.viewer_timeout = Some(timeout);
        self
    }
}
