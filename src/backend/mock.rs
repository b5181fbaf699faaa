//! Failure-injecting backend for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;

use crate::capture::Frame;
use crate::error::BackendError;

use super::codec::{CaptureHandle, FrameEncoder, RawFrame, VideoBackend};

pub(crate) struct MockBackend {
    pub opens: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
    allowed_opens: AtomicUsize,
    fail_reads_after: Option<u64>,
    frame_len: usize,
    interval: Duration,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            opens: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            allowed_opens: AtomicUsize::new(usize::MAX),
            fail_reads_after: None,
            frame_len: 16,
            interval: Duration::from_millis(2),
        }
    }

    /// Fail every open after the first `n`
    pub fn allow_opens(self, n: usize) -> Self {
        self.set_allowed_opens(n);
        self
    }

    pub fn set_allowed_opens(&self, n: usize) {
        self.allowed_opens.store(n, Ordering::SeqCst);
    }

    /// Each handle returns a read error after `n` frames
    pub fn fail_reads_after(mut self, n: u64) -> Self {
        self.fail_reads_after = Some(n);
        self
    }

    pub fn frame_len(mut self, len: usize) -> Self {
        self.frame_len = len;
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl VideoBackend for MockBackend {
    fn open(&self, url: &str) -> Result<Box<dyn CaptureHandle>, BackendError> {
        let n = self.opens.fetch_add(1, Ordering::SeqCst);
        if n >= self.allowed_opens.load(Ordering::SeqCst) {
            return Err(BackendError::Open(format!("refused {}", url)));
        }

        Ok(Box::new(MockHandle {
            buffer: vec![0; self.frame_len],
            read: 0,
            fail_after: self.fail_reads_after,
            interval: self.interval,
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct MockHandle {
    buffer: Vec<u8>,
    read: u64,
    fail_after: Option<u64>,
    interval: Duration,
    closes: Arc<AtomicUsize>,
}

impl CaptureHandle for MockHandle {
    fn read_frame(&mut self) -> Result<RawFrame<'_>, BackendError> {
        thread::sleep(self.interval);
        if self.fail_after == Some(self.read) {
            return Err(BackendError::Read("stream ended".into()));
        }
        self.read += 1;
        self.buffer.fill(self.read as u8);
        Ok(RawFrame::new(&self.buffer, self.buffer.len() as u32, 1))
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Passes pixels through, failing for every sequence divisible by `fail_every`
pub(crate) struct FlakyEncoder {
    pub fail_every: u64,
}

impl FrameEncoder for FlakyEncoder {
    fn encode(&self, frame: &Frame) -> Result<Bytes, BackendError> {
        if frame.sequence % self.fail_every == 0 {
            return Err(BackendError::Encode(format!("frame {}", frame.sequence)));
        }
        Ok(frame.data.clone())
    }
}
