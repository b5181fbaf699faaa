//! Counters for capture and broadcast sessions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters updated by a capture loop
#[derive(Debug)]
pub struct CaptureCounters {
    started_at: Instant,
    frames_captured: AtomicU64,
    empty_frames: AtomicU64,
    reconnects: AtomicU64,
}

impl CaptureCounters {
    pub(crate) fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_captured: AtomicU64::new(0),
            empty_frames: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    pub(crate) fn on_frame(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_empty_frame(&self) {
        self.empty_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy
    pub fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            empty_frames: self.empty_frames.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            duration: self.started_at.elapsed(),
        }
    }
}

/// Capture session statistics
#[derive(Debug, Clone, Default)]
pub struct CaptureStats {
    /// Frames pushed towards the queue
    pub frames_captured: u64,
    /// Empty images returned by the decoder and skipped
    pub empty_frames: u64,
    /// Successful reopens after a read failure
    pub reconnects: u64,
    /// Time since the session started
    pub duration: Duration,
}

impl CaptureStats {
    /// Average capture rate in frames per second
    pub fn framerate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.frames_captured as f64 / secs
        } else {
            0.0
        }
    }
}

/// Live counters updated by a broadcast session's fan-out loop
#[derive(Debug)]
pub struct BroadcastCounters {
    started_at: Instant,
    frames_encoded: AtomicU64,
    encode_failures: AtomicU64,
    oversized_frames: AtomicU64,
    datagrams_sent: AtomicU64,
    bytes_sent: AtomicU64,
    send_failures: AtomicU64,
}

impl BroadcastCounters {
    pub(crate) fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_encoded: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
            oversized_frames: AtomicU64::new(0),
            datagrams_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
        }
    }

    pub(crate) fn on_encoded(&self) {
        self.frames_encoded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_oversized(&self) {
        self.oversized_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_sent(&self, bytes: usize) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn on_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy
    pub fn snapshot(&self, viewers: usize) -> BroadcastStats {
        BroadcastStats {
            viewers,
            frames_encoded: self.frames_encoded.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            oversized_frames: self.oversized_frames.load(Ordering::Relaxed),
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            duration: self.started_at.elapsed(),
        }
    }
}

/// Broadcast session statistics
#[derive(Debug, Clone, Default)]
pub struct BroadcastStats {
    /// Currently registered viewers
    pub viewers: usize,
    /// Frames successfully encoded
    pub frames_encoded: u64,
    /// Frames skipped because encoding failed
    pub encode_failures: u64,
    /// Frames not sent because the payload exceeded the datagram limit
    pub oversized_frames: u64,
    /// Datagrams handed to the socket
    pub datagrams_sent: u64,
    /// Payload bytes handed to the socket
    pub bytes_sent: u64,
    /// Per-viewer send errors
    pub send_failures: u64,
    /// Time since the session started
    pub duration: Duration,
}

impl BroadcastStats {
    /// Outbound bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration.as_secs();
        if secs > 0 {
            (self.bytes_sent * 8) / secs
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_counters() {
        let counters = CaptureCounters::new();
        counters.on_frame();
        counters.on_frame();
        counters.on_empty_frame();
        counters.on_reconnect();

        let stats = counters.snapshot();
        assert_eq!(stats.frames_captured, 2);
        assert_eq!(stats.empty_frames, 1);
        assert_eq!(stats.reconnects, 1);
    }

    #[test]
    fn test_capture_framerate_zero_duration() {
        let stats = CaptureStats {
            frames_captured: 100,
            ..Default::default()
        };
        assert_eq!(stats.framerate(), 0.0);
    }

    #[test]
    fn test_capture_framerate() {
        let stats = CaptureStats {
            frames_captured: 300,
            duration: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(stats.framerate(), 30.0);
    }

    #[test]
    fn test_broadcast_counters() {
        let counters = BroadcastCounters::new();
        counters.on_encoded();
        counters.on_sent(1000);
        counters.on_sent(500);
        counters.on_send_failure();
        counters.on_oversized();
        counters.on_encode_failure();

        let stats = counters.snapshot(3);
        assert_eq!(stats.viewers, 3);
        assert_eq!(stats.frames_encoded, 1);
        assert_eq!(stats.datagrams_sent, 2);
        assert_eq!(stats.bytes_sent, 1500);
        assert_eq!(stats.send_failures, 1);
        assert_eq!(stats.oversized_frames, 1);
        assert_eq!(stats.encode_failures, 1);
    }

    #[test]
    fn test_broadcast_bitrate() {
        let stats = BroadcastStats {
            bytes_sent: 1_000_000,
            duration: Duration::from_secs(10),
            ..Default::default()
        };

        // 1,000,000 bytes * 8 bits / 10 seconds
        assert_eq!(stats.bitrate(), 800_000);
    }
}
