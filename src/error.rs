//! Error types
//!
//! Setup failures are returned synchronously from the start/stop/lookup
//! calls on the registries. Failures that happen inside a running session
//! are logged and never reach a caller.

use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Capture registry error
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Broadcast registry error
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),

    /// Video backend or resolver error
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors from [`SessionRegistry`](crate::capture::SessionRegistry)
#[derive(Debug, Error)]
pub enum CaptureError {
    /// A live capture session already exists for the source
    #[error("capture session already exists: {0}")]
    AlreadyExists(String),

    /// The source reference could not be turned into a playable URL
    #[error("failed to resolve source {source_id}: {reason}")]
    ResolutionFailed {
        source_id: String,
        reason: BackendError,
    },

    /// The resolved URL could not be opened for decoding
    #[error("failed to open {url} for source {source_id}: {reason}")]
    OpenFailed {
        source_id: String,
        url: String,
        reason: BackendError,
    },

    /// No capture session is registered for the source
    #[error("capture session not found: {0}")]
    NotFound(String),
}

/// Errors from [`BroadcastRegistry`](crate::broadcast::BroadcastRegistry)
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// A broadcast is already live for the source
    #[error("broadcast already exists: {0}")]
    AlreadyExists(String),

    /// The configured number of concurrent broadcasts is reached
    #[error("maximum number of broadcasts reached ({max})")]
    CapacityExceeded { max: usize },

    /// Every port in the configured range is taken
    #[error("no free port in range {base} (+{range})")]
    NoFreePort { base: u16, range: u16 },

    /// No capture session exists to feed the broadcast
    #[error("no capture session for source: {0}")]
    SourceNotFound(String),

    /// No broadcast is registered for the source
    #[error("broadcast not found: {0}")]
    NotFound(String),
}

/// Errors raised by the external resolver and video backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// Resolution of a source reference failed
    #[error("resolve: {0}")]
    Resolve(String),

    /// Opening a stream failed
    #[error("open: {0}")]
    Open(String),

    /// Reading a frame failed
    #[error("read: {0}")]
    Read(String),

    /// Encoding a frame failed
    #[error("encode: {0}")]
    Encode(String),

    /// I/O error (process spawn, sockets)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_free_port_display() {
        let err = BroadcastError::NoFreePort {
            base: 9000,
            range: 10,
        };
        assert_eq!(err.to_string(), "no free port in range 9000 (+10)");
    }

    #[test]
    fn test_capture_error_wraps_reason() {
        let err = CaptureError::ResolutionFailed {
            source_id: "cam-1".into(),
            reason: BackendError::Resolve("not live".into()),
        };
        assert_eq!(
            err.to_string(),
            "failed to resolve source cam-1: resolve: not live"
        );
    }

    #[test]
    fn test_top_level_conversion() {
        let err: Error = CaptureError::NotFound("cam-2".into()).into();
        assert!(matches!(err, Error::Capture(CaptureError::NotFound(_))));
        assert_eq!(err.to_string(), "capture session not found: cam-2");
    }
}
