//! Error taxonomy for the meeting client.

use huddle_core::{ParticipantId, ProtocolError};
use thiserror::Error;

use crate::media::MediaSourceKind;

/// Failures reported by a capture device.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("permission to capture {0:?} was denied")]
    PermissionDenied(MediaSourceKind),

    #[error("no {0:?} device is present")]
    NotFound(MediaSourceKind),

    #[error("{0:?} capture is not supported in this environment")]
    Unsupported(MediaSourceKind),
}

#[derive(Debug, Error)]
pub enum HuddleError {
    /// Capture could not start; the previous source (if any) stays live.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(CaptureError),

    /// Camera acquisition failed while entering the room.
    #[error("no local media available to join the room: {0}")]
    InitialMediaUnavailable(CaptureError),

    #[error("signaling channel disconnected: {0}")]
    ChannelDisconnected(String),

    #[error("negotiation with {peer} failed: {reason}")]
    NegotiationFailed { peer: ParticipantId, reason: String },

    #[error("stale {kind} from {peer} dropped")]
    StaleMessage {
        peer: ParticipantId,
        kind: &'static str,
    },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("room session is no longer running")]
    SessionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CaptureError> for HuddleError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::Unsupported(kind) => HuddleError::UnsupportedOperation(format!(
                "{:?} capture is not supported in this environment",
                kind
            )),
            other => HuddleError::DeviceUnavailable(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, HuddleError>;
