use huddle_core::{ParticipantId, RoomId};
use std::path::PathBuf;
use std::sync::Arc;

use crate::media::MediaSourceKind;
use crate::room::chat::ChatMessage;

/// Lifecycle of a room session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Joining,
    Active,
    Leaving,
    Left,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMedia {
    pub source: Option<MediaSourceKind>,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub has_audio: bool,
}

/// Everything the UI shows about the local side of a room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub local_id: Option<ParticipantId>,
    pub state: SessionState,
    pub signaling_connected: bool,
    pub media: LocalMedia,
    pub chat: Arc<[ChatMessage]>,
    pub recording: Option<PathBuf>,
}

impl RoomSnapshot {
    pub fn joining(room_id: RoomId) -> Self {
        Self {
            room_id,
            local_id: None,
            state: SessionState::Joining,
            signaling_connected: false,
            media: LocalMedia {
                source: None,
                audio_enabled: true,
                video_enabled: true,
                has_audio: false,
            },
            chat: Arc::from(Vec::new()),
            recording: None,
        }
    }

    pub fn is_screen_sharing(&self) -> bool {
        self.media.source == Some(MediaSourceKind::Screen)
    }
}
