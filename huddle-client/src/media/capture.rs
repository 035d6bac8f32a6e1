use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::config::CaptureConstraints;
use crate::error::CaptureError;
use crate::media::source::MediaSourceKind;
use crate::media::track::LocalTrack;

/// Output of one device/display capture request.
pub struct CapturedStream {
    pub tracks: Vec<Arc<LocalTrack>>,
    /// Fires when the user ends a display capture from the platform UI.
    pub sharing_stopped: Option<oneshot::Receiver<()>>,
}

/// Platform boundary for camera, microphone and display capture.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn open(
        &self,
        kind: MediaSourceKind,
        constraints: &CaptureConstraints,
    ) -> Result<CapturedStream, CaptureError>;
}
