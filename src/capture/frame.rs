//! Decoded frames and the bounded hand-off queue
//!
//! The capture loop is the only producer of a queue. At most one consumer
//! pulls from it at a time: every [`FrameQueue`] handle shares one receiver
//! behind an async mutex, so concurrent `recv` calls are serialized and each
//! frame is delivered exactly once.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};

use crate::backend::RawFrame;

/// A decoded image owned by the relay
///
/// Cheap to clone: the pixel buffer is reference counted.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the capture session's output, starting at 0
    pub sequence: u64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel data
    pub data: Bytes,
    /// When the frame was read from the source
    pub captured_at: Instant,
}

impl Frame {
    /// Create a frame from owned pixel data
    pub fn new(sequence: u64, width: u32, height: u32, data: Bytes) -> Self {
        Self {
            sequence,
            width,
            height,
            data,
            captured_at: Instant::now(),
        }
    }

    /// Copy a frame out of the backend's reusable decode buffer
    pub fn from_raw(raw: &RawFrame<'_>, sequence: u64) -> Self {
        Self::new(
            sequence,
            raw.width,
            raw.height,
            Bytes::copy_from_slice(raw.data),
        )
    }

    /// Size of the pixel data in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Receive side of a capture session's bounded frame queue
///
/// The queue closes when its capture session stops; [`recv`](Self::recv)
/// then drains what is left and returns `None`.
#[derive(Debug, Clone)]
pub struct FrameQueue {
    rx: Arc<Mutex<mpsc::Receiver<Frame>>>,
    capacity: usize,
}

impl FrameQueue {
    /// Create a queue holding at most `capacity` frames
    pub(crate) fn channel(capacity: usize) -> (mpsc::Sender<Frame>, FrameQueue) {
        let (tx, rx) = mpsc::channel(capacity);
        let queue = FrameQueue {
            rx: Arc::new(Mutex::new(rx)),
            capacity,
        };
        (tx, queue)
    }

    /// Wait for the next frame
    ///
    /// Returns `None` once the producer is gone and the queue is empty.
    pub async fn recv(&self) -> Option<Frame> {
        self.rx.lock().await.recv().await
    }

    /// Take a frame if one is ready and no other consumer holds the queue
    pub fn try_recv(&self) -> Option<Frame> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }

    /// Maximum number of buffered frames
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_copies() {
        let mut buf = vec![1u8, 2, 3, 4];
        let frame = Frame::from_raw(&RawFrame::new(&buf, 2, 2), 7);
        buf[0] = 99;

        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.width, 2);
        assert_eq!(frame.height, 2);
        assert_eq!(&frame.data[..], &[1, 2, 3, 4]);
        assert_eq!(frame.size(), 4);
    }

    #[tokio::test]
    async fn test_queue_preserves_order() {
        let (tx, queue) = FrameQueue::channel(4);
        for seq in 0..3 {
            tx.send(Frame::new(seq, 1, 1, Bytes::from_static(&[0])))
                .await
                .unwrap();
        }

        for seq in 0..3 {
            assert_eq!(queue.recv().await.unwrap().sequence, seq);
        }
    }

    #[tokio::test]
    async fn test_queue_closes_after_drain() {
        let (tx, queue) = FrameQueue::channel(2);
        tx.send(Frame::new(0, 1, 1, Bytes::new())).await.unwrap();
        drop(tx);

        assert!(queue.recv().await.is_some());
        assert!(queue.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_queue_full_blocks_producer() {
        let (tx, queue) = FrameQueue::channel(1);
        tx.send(Frame::new(0, 1, 1, Bytes::new())).await.unwrap();

        let mut push = tokio_test::task::spawn(tx.send(Frame::new(1, 1, 1, Bytes::new())));
        tokio_test::assert_pending!(push.poll());

        assert_eq!(queue.try_recv().unwrap().sequence, 0);
        assert!(push.is_woken());
        tokio_test::assert_ready_ok!(push.poll());
        assert_eq!(queue.capacity(), 1);
    }
}
