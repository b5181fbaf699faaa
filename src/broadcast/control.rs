//! Viewer control protocol
//!
//! Viewers subscribe by sending a datagram containing exactly `CONNECT` to
//! the broadcast port and unsubscribe with exactly `DISCONNECT`. There is no
//! reply, handshake or sequencing. Anything else is ignored.

/// Subscribe payload
pub const CONNECT: &[u8] = b"CONNECT";

/// Unsubscribe payload
pub const DISCONNECT: &[u8] = b"DISCONNECT";

/// A recognized control datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Add or refresh the sender as a viewer
    Connect,
    /// Remove the sender from the viewers
    Disconnect,
}

impl ControlMessage {
    /// Parse a datagram payload
    ///
    /// Only exact matches are recognized; no trimming or case folding.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        match payload {
            CONNECT => Some(ControlMessage::Connect),
            DISCONNECT => Some(ControlMessage::Disconnect),
            _ => None,
        }
    }

    /// Wire form of the message
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            ControlMessage::Connect => CONNECT,
            ControlMessage::Disconnect => DISCONNECT,
        }
    }
}
