use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::media::track::{LocalTrack, TrackKind};

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum MediaSourceKind {
    Camera,
    Screen,
}

/// The active local capture: a camera+microphone or screen+microphone
/// composite.
#[derive(Debug)]
pub struct MediaSource {
    id: u64,
    kind: MediaSourceKind,
    tracks: Vec<Arc<LocalTrack>>,
    released: AtomicBool,
}

impl MediaSource {
    pub(crate) fn new(id: u64, kind: MediaSourceKind, tracks: Vec<Arc<LocalTrack>>) -> Self {
        Self {
            id,
            kind,
            tracks,
            released: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> MediaSourceKind {
        self.kind
    }

    pub fn tracks(&self) -> &[Arc<LocalTrack>] {
        &self.tracks
    }

    pub fn track(&self, kind: TrackKind) -> Option<&Arc<LocalTrack>> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }

    pub fn has_track(&self, kind: TrackKind) -> bool {
        self.track(kind).is_some()
    }

    /// Toggles the track of `kind` without stopping it. Returns `false` if
    /// the source has no such track.
    pub fn set_track_enabled(&self, kind: TrackKind, enabled: bool) -> bool {
        match self.track(kind) {
            Some(track) => {
                track.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    pub fn is_track_enabled(&self, kind: TrackKind) -> bool {
        self.track(kind).map(|t| t.is_enabled()).unwrap_or(false)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Stops every track. Only the first call has an effect.
    pub(crate) fn stop_all(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        for track in &self.tracks {
            track.stop();
        }
        true
    }
}
