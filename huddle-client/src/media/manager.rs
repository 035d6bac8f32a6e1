use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::CaptureConstraints;
use crate::error::{HuddleError, Result};
use crate::media::capture::CaptureDevice;
use crate::media::source::{MediaSource, MediaSourceKind};
use crate::media::track::TrackKind;

/// Posted to the room loop when the user ends a screen share from the
/// platform UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceEnded {
    pub source_id: u64,
}

/// Result of a completed two-phase source switch.
#[derive(Debug)]
pub struct SourceSwap {
    pub old: Option<Arc<MediaSource>>,
    pub new: Arc<MediaSource>,
}

/// Owns the single live outbound [`MediaSource`] of a room session.
pub struct MediaSourceManager {
    device: Arc<dyn CaptureDevice>,
    constraints: CaptureConstraints,
    current: Option<Arc<MediaSource>>,
    next_id: u64,
    audio_enabled: bool,
    video_enabled: bool,
    ended_tx: mpsc::UnboundedSender<SourceEnded>,
}

impl MediaSourceManager {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        constraints: CaptureConstraints,
        ended_tx: mpsc::UnboundedSender<SourceEnded>,
    ) -> Self {
        Self {
            device,
            constraints,
            current: None,
            next_id: 1,
            audio_enabled: true,
            video_enabled: true,
            ended_tx,
        }
    }

    pub fn current(&self) -> Option<&Arc<MediaSource>> {
        self.current.as_ref()
    }

    pub fn current_kind(&self) -> Option<MediaSourceKind> {
        self.current.as_ref().map(|s| s.kind())
    }

    pub fn is_enabled(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Audio => self.audio_enabled,
            TrackKind::Video => self.video_enabled,
        }
    }

    /// Opens a new capture without installing it. The user's mute choices are
    /// applied to the fresh tracks.
    pub async fn acquire(&mut self, kind: MediaSourceKind) -> Result<Arc<MediaSource>> {
        let stream = self
            .device
            .open(kind, &self.constraints)
            .await
            .map_err(HuddleError::from)?;

        let id = self.next_id;
        self.next_id += 1;

        let source = Arc::new(MediaSource::new(id, kind, stream.tracks));
        source.set_track_enabled(TrackKind::Audio, self.audio_enabled);
        source.set_track_enabled(TrackKind::Video, self.video_enabled);

        if let Some(stopped) = stream.sharing_stopped {
            let ended_tx = self.ended_tx.clone();
            tokio::spawn(async move {
                if stopped.await.is_ok() {
                    debug!("Capture {} ended from the platform UI", id);
                    let _ = ended_tx.send(SourceEnded { source_id: id });
                }
            });
        }

        info!(
            "Acquired {:?} source #{} with {} track(s)",
            kind,
            id,
            source.tracks().len()
        );
        Ok(source)
    }

    /// Acquires the first source of the session.
    pub async fn start(&mut self, kind: MediaSourceKind) -> Result<Arc<MediaSource>> {
        let source = self.acquire(kind).await?;
        if let Some(previous) = self.current.replace(source.clone()) {
            self.release(&previous);
        }
        Ok(source)
    }

    /// Two-phase switch: the new capture is acquired before the old one is
    /// released. On failure the current source is untouched. Returns `None`
    /// when `kind` is already live.
    pub async fn switch_to(&mut self, kind: MediaSourceKind) -> Result<Option<SourceSwap>> {
        if self.current_kind() == Some(kind) {
            return Ok(None);
        }

        let new = match self.acquire(kind).await {
            Ok(source) => source,
            Err(e) => {
                warn!("Switch to {:?} aborted, keeping current source: {}", kind, e);
                return Err(e);
            }
        };

        let old = self.current.replace(new.clone());
        if let Some(old) = &old {
            self.release(old);
        }

        Ok(Some(SourceSwap { old, new }))
    }

    /// Records the user's choice and applies it to the live source.
    pub fn set_track_enabled(&mut self, kind: TrackKind, enabled: bool) -> bool {
        match kind {
            TrackKind::Audio => self.audio_enabled = enabled,
            TrackKind::Video => self.video_enabled = enabled,
        }
        self.current
            .as_ref()
            .map(|s| s.set_track_enabled(kind, enabled))
            .unwrap_or(false)
    }

    pub fn release(&self, source: &MediaSource) {
        if source.stop_all() {
            info!("Released {:?} source #{}", source.kind(), source.id());
        }
    }

    pub fn release_current(&mut self) -> Option<Arc<MediaSource>> {
        let source = self.current.take()?;
        self.release(&source);
        Some(source)
    }
}
