use dashmap::DashMap;
use huddle_core::ParticipantId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::media::TrackKind;
use crate::peer::session::{NegotiationState, PeerSession, Polarity};
use crate::peer::transport::{LinkState, RemoteMedia};

/// What the UI needs to render one remote participant.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerView {
    pub id: ParticipantId,
    pub display_name: String,
    pub state: NegotiationState,
    pub link: LinkState,
    pub polarity: Polarity,
    pub remote_tracks: BTreeSet<TrackKind>,
    /// Inbound tracks with the handles a renderer reads from.
    pub remote_media: BTreeMap<TrackKind, RemoteMedia>,
    /// Track id sent to this participant per kind.
    pub outgoing: BTreeMap<TrackKind, String>,
    pub failure: Option<String>,
}

impl PeerView {
    fn of(session: &PeerSession, display_name: String) -> Self {
        Self {
            id: session.remote().clone(),
            display_name,
            state: session.state(),
            link: session.link(),
            polarity: session.polarity(),
            remote_tracks: session.remote_tracks(),
            remote_media: session.remote_media().clone(),
            outgoing: session.outgoing().clone(),
            failure: session.failure().map(str::to_string),
        }
    }
}

/// Read-only view of the peer sessions of a room. Cheap to clone and safe to
/// read from any thread while the room loop updates it.
#[derive(Clone, Default)]
pub struct RoomView {
    peers: Arc<DashMap<ParticipantId, PeerView>>,
}

impl RoomView {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn publish(&self, session: &PeerSession, display_name: String) {
        self.peers
            .insert(session.remote().clone(), PeerView::of(session, display_name));
    }

    pub(crate) fn remove(&self, id: &ParticipantId) {
        self.peers.remove(id);
    }

    pub(crate) fn clear(&self) {
        self.peers.clear();
    }

    pub fn get(&self, id: &ParticipantId) -> Option<PeerView> {
        self.peers.get(id).map(|entry| entry.value().clone())
    }

    /// Peers sorted by identifier.
    pub fn list(&self) -> Vec<PeerView> {
        let mut peers: Vec<PeerView> = self.peers.iter().map(|e| e.value().clone()).collect();
        peers.sort_by(|a, b| a.id.cmp(&b.id));
        peers
    }

    pub fn list_users(&self) -> Vec<ParticipantId> {
        self.list().into_iter().map(|p| p.id).collect()
    }

    pub fn contains_user(&self, id: &ParticipantId) -> bool {
        self.peers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
