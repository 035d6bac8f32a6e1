mod chat;
mod room_command;
mod room_session;
mod snapshot;

pub use chat::{ChatLog, ChatMessage, WELCOME_TEXT};
pub use room_command::{Reply, RoomCommand};
pub use room_session::{RoomHandle, RoomSession, SessionDeps};
pub use snapshot::{LocalMedia, RoomSnapshot, SessionState};
