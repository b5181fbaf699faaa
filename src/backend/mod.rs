//! External collaborators
//!
//! The relay does not decode or encode video itself. It consumes three
//! capabilities supplied by the embedding application:
//!
//! - [`SourceResolver`]: turns an opaque source reference into a playable URL
//! - [`VideoBackend`]: opens a URL and hands out a [`CaptureHandle`] that
//!   yields decoded frames
//! - [`FrameEncoder`]: compresses a decoded frame into a datagram payload
//!
//! All three are blocking; the registries call them from tokio's blocking
//! pool. [`CommandResolver`] and the [`synthetic`] backend are concrete
//! implementations shipped with the crate.

pub mod codec;
pub mod resolver;
pub mod synthetic;

#[cfg(test)]
pub(crate) mod mock;

pub use codec::{CaptureHandle, FrameEncoder, RawFrame, VideoBackend};
pub use resolver::{CommandResolver, SourceResolver};
pub use synthetic::{RawEncoder, SyntheticBackend};

use crate::error::BackendError;

/// Run a blocking backend call on the blocking pool
///
/// A panic inside the call surfaces as an I/O error instead of tearing down
/// the calling task.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, BackendError>
where
    F: FnOnce() -> Result<T, BackendError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BackendError::Io(std::io::Error::other(e)))?
}
