use crate::error::ProtocolError;
use crate::model::candidate::IceCandidate;
use crate::model::participant::{ParticipantId, UserInfo};
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

/// Messages the client sends to the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "d", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinRoom {
        room_id: RoomId,
        user_name: String,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    Offer {
        to: ParticipantId,
        offer: String,
    },
    Answer {
        to: ParticipantId,
        answer: String,
    },
    IceCandidate {
        to: ParticipantId,
        candidate: IceCandidate,
    },
    ChatMessage {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
}

impl ClientMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Messages the relay delivers to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "d", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Identifier the relay assigned to this connection.
    Welcome {
        user_id: ParticipantId,
    },
    /// Current roster, sent to the joining client.
    RoomUsers {
        users: Vec<UserInfo>,
    },
    UserJoined {
        user_id: ParticipantId,
        #[serde(default)]
        user_name: Option<String>,
        #[serde(default)]
        users: Vec<UserInfo>,
    },
    UserLeft {
        user_id: ParticipantId,
        #[serde(default)]
        users: Vec<UserInfo>,
    },
    Offer {
        from: ParticipantId,
        offer: String,
    },
    Answer {
        from: ParticipantId,
        answer: String,
    },
    IceCandidate {
        from: ParticipantId,
        candidate: IceCandidate,
    },
    ChatMessage {
        message: String,
        sender: String,
        #[serde(default)]
        sender_id: Option<ParticipantId>,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    /// Parses a relay frame and rejects shapes that carry empty identifiers
    /// or descriptions.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let msg: ServerMessage = serde_json::from_str(text)?;
        msg.validate()?;
        Ok(msg)
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        let missing = |op, field| Err(ProtocolError::MissingField { op, field });

        match self {
            ServerMessage::Welcome { user_id } if user_id.is_empty() => {
                missing("welcome", "userId")
            }
            ServerMessage::UserJoined { user_id, .. } if user_id.is_empty() => {
                missing("user_joined", "userId")
            }
            ServerMessage::UserLeft { user_id, .. } if user_id.is_empty() => {
                missing("user_left", "userId")
            }
            ServerMessage::Offer { from, .. } if from.is_empty() => missing("offer", "from"),
            ServerMessage::Offer { offer, .. } if offer.trim().is_empty() => {
                missing("offer", "offer")
            }
            ServerMessage::Answer { from, .. } if from.is_empty() => missing("answer", "from"),
            ServerMessage::Answer { answer, .. } if answer.trim().is_empty() => {
                missing("answer", "answer")
            }
            ServerMessage::IceCandidate { from, .. } if from.is_empty() => {
                missing("ice_candidate", "from")
            }
            ServerMessage::IceCandidate { candidate, .. } if candidate.candidate.is_empty() => {
                missing("ice_candidate", "candidate")
            }
            _ => Ok(()),
        }
    }
}
