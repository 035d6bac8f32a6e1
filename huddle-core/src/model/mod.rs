mod candidate;
mod participant;
mod room;
mod signaling;

pub use candidate::IceCandidate;
pub use participant::{ParticipantId, UserInfo};
pub use room::RoomId;
pub use signaling::{ClientMessage, IceServerConfig, ServerMessage};
