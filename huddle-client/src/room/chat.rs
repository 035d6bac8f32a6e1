use huddle_core::ParticipantId;
use std::sync::Arc;

pub const WELCOME_TEXT: &str = "Welcome to the room";
const SYSTEM_SENDER: &str = "System";
const LOCAL_SENDER: &str = "You";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Position in the log, starting at 1.
    pub sequence: u64,
    pub sender: String,
    pub sender_id: Option<ParticipantId>,
    pub text: String,
    /// Milliseconds since the epoch, when the relay supplied one.
    pub timestamp: Option<i64>,
    pub is_local: bool,
    pub is_system: bool,
}

/// Append-only room chat, in relay delivery order.
#[derive(Debug, Clone)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
    next_sequence: u64,
    shared: Arc<[ChatMessage]>,
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatLog {
    pub fn new() -> Self {
        let mut log = Self {
            messages: Vec::new(),
            next_sequence: 1,
            shared: Arc::from(Vec::new()),
        };
        log.push(ChatMessage {
            sequence: 0,
            sender: SYSTEM_SENDER.to_string(),
            sender_id: None,
            text: WELCOME_TEXT.to_string(),
            timestamp: None,
            is_local: false,
            is_system: true,
        });
        log
    }

    fn push(&mut self, mut message: ChatMessage) {
        message.sequence = self.next_sequence;
        self.next_sequence += 1;
        self.messages.push(message);
        self.shared = Arc::from(self.messages.as_slice());
    }

    /// Appends a message delivered by the relay. The relay echoes our own
    /// messages back; those are shown as sent by "You".
    pub fn push_delivered(
        &mut self,
        local_id: Option<&ParticipantId>,
        sender: String,
        sender_id: Option<ParticipantId>,
        text: String,
        timestamp: Option<i64>,
    ) {
        let is_local = sender_id.is_some() && sender_id.as_ref() == local_id;
        let sender = if is_local {
            LOCAL_SENDER.to_string()
        } else if sender.trim().is_empty() {
            sender_id
                .as_ref()
                .map(|id| id.fallback_name())
                .unwrap_or_else(|| "Unknown".to_string())
        } else {
            sender
        };
        self.push(ChatMessage {
            sequence: 0,
            sender,
            sender_id,
            text,
            timestamp,
            is_local,
            is_system: false,
        });
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The log as handed to snapshots. Only rebuilt when a message arrives,
    /// so publishing an unchanged log is a reference count bump.
    pub fn shared(&self) -> Arc<[ChatMessage]> {
        self.shared.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
