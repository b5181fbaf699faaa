//! Synthetic test-pattern backend
//!
//! Produces grayscale gradient frames at a fixed rate without touching the
//! network. Used by the demo and the integration tests, and handy for
//! exercising a relay deployment before wiring in a real decoder.

use std::thread;
use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};

use crate::capture::Frame;
use crate::error::BackendError;

use super::codec::{CaptureHandle, FrameEncoder, RawFrame, VideoBackend};

/// Size of the header [`RawEncoder`] prepends to every payload
pub const RAW_HEADER_LEN: usize = 16;

/// Backend generating a moving gradient
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    width: u32,
    height: u32,
    frame_interval: Duration,
}

impl SyntheticBackend {
    /// Create a backend producing `width` x `height` frames at `fps`
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            frame_interval: Duration::from_secs(1) / fps.max(1),
        }
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new(64, 48, 30)
    }
}

impl VideoBackend for SyntheticBackend {
    fn open(&self, url: &str) -> Result<Box<dyn CaptureHandle>, BackendError> {
        if url.is_empty() {
            return Err(BackendError::Open("empty url".into()));
        }

        let len = (self.width * self.height) as usize;
        Ok(Box::new(SyntheticHandle {
            width: self.width,
            height: self.height,
            frame_interval: self.frame_interval,
            buffer: vec![0; len],
            next_deadline: Instant::now(),
            tick: 0,
        }))
    }
}

struct SyntheticHandle {
    width: u32,
    height: u32,
    frame_interval: Duration,
    buffer: Vec<u8>,
    next_deadline: Instant,
    tick: u8,
}

impl CaptureHandle for SyntheticHandle {
    fn read_frame(&mut self) -> Result<RawFrame<'_>, BackendError> {
        let now = Instant::now();
        if self.next_deadline > now {
            thread::sleep(self.next_deadline - now);
        }
        self.next_deadline += self.frame_interval;

        // Diagonal gradient shifted by one step per frame
        let width = self.width as usize;
        for (i, px) in self.buffer.iter_mut().enumerate() {
            let (x, y) = (i % width, i / width);
            *px = (x + y) as u8 ^ self.tick;
        }
        self.tick = self.tick.wrapping_add(1);

        Ok(RawFrame::new(&self.buffer, self.width, self.height))
    }
}

/// Encoder that ships raw pixels behind a small header
///
/// Layout (big-endian): sequence `u64`, width `u32`, height `u32`, then the
/// pixel bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawEncoder;

impl RawEncoder {
    /// Read the sequence number back out of an encoded payload
    pub fn sequence(payload: &[u8]) -> Option<u64> {
        let bytes: [u8; 8] = payload.get(..8)?.try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }
}

impl FrameEncoder for RawEncoder {
    fn encode(&self, frame: &Frame) -> Result<Bytes, BackendError> {
        let mut buf = BytesMut::with_capacity(RAW_HEADER_LEN + frame.size());
        buf.put_u64(frame.sequence);
        buf.put_u32(frame.width);
        buf.put_u32(frame.height);
        buf.put_slice(&frame.data);
        Ok(buf.freeze())
    }
}
