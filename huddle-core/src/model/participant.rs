use serde::{Deserialize, Serialize};
use std::fmt;

/// Relay-assigned participant identifier.
///
/// Ordering is significant: when two participants discover each other the
/// one whose id sorts lower sends the offer.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Name shown for a participant that never announced one.
    pub fn fallback_name(&self) -> String {
        let short: String = self.0.chars().take(8).collect();
        format!("User-{}", short)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Roster entry as published by the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    pub id: ParticipantId,
    #[serde(default)]
    pub name: Option<String>,
}
