//! Decode and encode capability traits

use bytes::Bytes;

use crate::capture::Frame;
use crate::error::BackendError;

/// A decoded image borrowed from the backend's reusable buffer
///
/// The data is only valid until the next call to
/// [`CaptureHandle::read_frame`]; the capture loop copies it into an owned
/// [`Frame`] before reading again.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    /// Pixel data
    pub data: &'a [u8],
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl<'a> RawFrame<'a> {
    /// Create a raw frame view
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Whether the backend produced an empty image
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// An opened video source
pub trait CaptureHandle: Send + 'static {
    /// Block until the next decoded frame is available
    fn read_frame(&mut self) -> Result<RawFrame<'_>, BackendError>;

    /// Release decoder resources
    ///
    /// Called exactly once by the capture loop before the handle is dropped.
    fn close(&mut self) {}
}

/// Opens network video sources for decoding
pub trait VideoBackend: Send + Sync + 'static {
    /// Open `url` and return a handle producing decoded frames
    fn open(&self, url: &str) -> Result<Box<dyn CaptureHandle>, BackendError>;
}

/// Compresses decoded frames into wire payloads
pub trait FrameEncoder: Send + Sync + 'static {
    /// Encode a frame into one datagram payload
    fn encode(&self, frame: &Frame) -> Result<Bytes, BackendError>;
}

impl<T: VideoBackend + ?Sized> VideoBackend for std::sync::Arc<T> {
    fn open(&self, url: &str) -> Result<Box<dyn CaptureHandle>, BackendError> {
        (**self).open(url)
    }
}

impl<T: FrameEncoder + ?Sized> FrameEncoder for std::sync::Arc<T> {
    fn encode(&self, frame: &Frame) -> Result<Bytes, BackendError> {
        (**self).encode(frame)
    }
}
