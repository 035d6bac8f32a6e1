use huddle_core::{
    ClientMessage, IceCandidate, ParticipantId, ProtocolError, RoomId, ServerMessage, UserInfo,
};

/// Inbound relay traffic after validation.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// The relay accepted the join and assigned the local identifier.
    Joined { local_id: ParticipantId },
    ParticipantJoined {
        id: ParticipantId,
        name: Option<String>,
    },
    ParticipantLeft { id: ParticipantId },
    OfferReceived { from: ParticipantId, sdp: String },
    AnswerReceived { from: ParticipantId, sdp: String },
    CandidateReceived {
        from: ParticipantId,
        candidate: IceCandidate,
    },
    ChatReceived {
        sender: String,
        sender_id: Option<ParticipantId>,
        text: String,
        timestamp: Option<i64>,
    },
    ChannelError { reason: String },
}

/// Outbound intents, dispatched fire-and-forget.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalIntent {
    Offer { to: ParticipantId, sdp: String },
    Answer { to: ParticipantId, sdp: String },
    Candidate {
        to: ParticipantId,
        candidate: IceCandidate,
    },
    Leave,
    Chat { text: String },
}

impl SignalIntent {
    pub fn into_message(self, room: &RoomId) -> ClientMessage {
        match self {
            SignalIntent::Offer { to, sdp } => ClientMessage::Offer { to, offer: sdp },
            SignalIntent::Answer { to, sdp } => ClientMessage::Answer { to, answer: sdp },
            SignalIntent::Candidate { to, candidate } => {
                ClientMessage::IceCandidate { to, candidate }
            }
            SignalIntent::Leave => ClientMessage::LeaveRoom {
                room_id: room.clone(),
            },
            SignalIntent::Chat { text } => ClientMessage::ChatMessage {
                message: text,
                timestamp: Some(chrono::Utc::now().timestamp_millis()),
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SignalIntent::Offer { .. } => "offer",
            SignalIntent::Answer { .. } => "answer",
            SignalIntent::Candidate { .. } => "ice_candidate",
            SignalIntent::Leave => "leave_room",
            SignalIntent::Chat { .. } => "chat_message",
        }
    }
}

/// Maps relay messages to [`RoomEvent`]s for one connection.
///
/// Roster messages are expanded into one `ParticipantJoined` per remote
/// participant, which is how a reconnect replays the room to the controller.
#[derive(Debug, Default)]
pub struct EventTranslator {
    local_id: Option<ParticipantId>,
}

impl EventTranslator {
    pub fn local_id(&self) -> Option<&ParticipantId> {
        self.local_id.as_ref()
    }

    fn is_local(&self, id: &ParticipantId) -> bool {
        self.local_id.as_ref() == Some(id)
    }

    fn roster(&self, users: Vec<UserInfo>) -> Vec<RoomEvent> {
        users
            .into_iter()
            .filter(|u| !self.is_local(&u.id) && !u.id.is_empty())
            .map(|u| RoomEvent::ParticipantJoined {
                id: u.id,
                name: u.name,
            })
            .collect()
    }

    pub fn translate(&mut self, msg: ServerMessage) -> Result<Vec<RoomEvent>, ProtocolError> {
        let events = match msg {
            ServerMessage::Welcome { user_id } => {
                self.local_id = Some(user_id.clone());
                vec![RoomEvent::Joined { local_id: user_id }]
            }
            ServerMessage::RoomUsers { users } => self.roster(users),
            ServerMessage::UserJoined {
                user_id, user_name, ..
            } => {
                if self.is_local(&user_id) {
                    Vec::new()
                } else {
                    vec![RoomEvent::ParticipantJoined {
                        id: user_id,
                        name: user_name,
                    }]
                }
            }
            ServerMessage::UserLeft { user_id, .. } => {
                if self.is_local(&user_id) {
                    Vec::new()
                } else {
                    vec![RoomEvent::ParticipantLeft { id: user_id }]
                }
            }
            ServerMessage::Offer { from, offer } => {
                if self.is_local(&from) {
                    return Err(ProtocolError::SelfAddressed { op: "offer" });
                }
                vec![RoomEvent::OfferReceived { from, sdp: offer }]
            }
            ServerMessage::Answer { from, answer } => {
                if self.is_local(&from) {
                    return Err(ProtocolError::SelfAddressed { op: "answer" });
                }
                vec![RoomEvent::AnswerReceived { from, sdp: answer }]
            }
            ServerMessage::IceCandidate { from, candidate } => {
                if self.is_local(&from) {
                    return Err(ProtocolError::SelfAddressed {
                        op: "ice_candidate",
                    });
                }
                vec![RoomEvent::CandidateReceived { from, candidate }]
            }
            ServerMessage::ChatMessage {
                message,
                sender,
                sender_id,
                timestamp,
            } => vec![RoomEvent::ChatReceived {
                sender,
                sender_id,
                text: message,
                timestamp,
            }],
            ServerMessage::Error { message } => vec![RoomEvent::ChannelError { reason: message }],
        };
        Ok(events)
    }
}
