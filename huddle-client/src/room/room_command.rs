use std::path::PathBuf;
use tokio::sync::oneshot;

use crate::error::Result;
use crate::media::TrackKind;

pub type Reply<T> = oneshot::Sender<Result<T>>;

/// Requests the UI sends to the room loop.
#[derive(Debug)]
pub enum RoomCommand {
    /// Mute or unmute a track kind. Applies to the current and later sources.
    SetTrackEnabled { kind: TrackKind, enabled: bool },

    ToggleTrack { kind: TrackKind },

    StartScreenShare { reply: Reply<()> },

    StopScreenShare { reply: Reply<()> },

    SendChat { text: String, reply: Reply<()> },

    StartRecording { reply: Reply<PathBuf> },

    StopRecording { reply: Reply<PathBuf> },

    Leave { reply: oneshot::Sender<()> },
}
