use anyhow::Result;
use async_trait::async_trait;
use huddle_core::{IceCandidate, ParticipantId};
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::track::track_remote::TrackRemote;

use crate::media::{LocalTrack, TrackKind};

/// Connectivity of the underlying media link, as opposed to the
/// offer/answer state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// A track the remote participant sends us.
#[derive(Debug, Clone)]
pub struct RemoteMedia {
    pub kind: TrackKind,
    pub track_id: String,
    pub stream_id: String,
    /// Where samples are read from. Transports without real media leave it
    /// empty.
    pub track: Option<Arc<TrackRemote>>,
}

impl RemoteMedia {
    pub fn new(kind: TrackKind, track_id: impl Into<String>, stream_id: impl Into<String>) -> Self {
        Self {
            kind,
            track_id: track_id.into(),
            stream_id: stream_id.into(),
            track: None,
        }
    }

    pub fn with_track(mut self, track: Arc<TrackRemote>) -> Self {
        self.track = Some(track);
        self
    }
}

impl PartialEq for RemoteMedia {
    fn eq(&self, other: &Self) -> bool {
        let same_handle = match (&self.track, &other.track) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.kind == other.kind
            && self.track_id == other.track_id
            && self.stream_id == other.stream_id
            && same_handle
    }
}

/// Events a transport reports back to the room loop. Each carries the epoch
/// of the session that created the transport so late callbacks from a
/// replaced session can be recognised and dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    CandidateGenerated {
        peer: ParticipantId,
        epoch: u64,
        candidate: IceCandidate,
    },
    StateChanged {
        peer: ParticipantId,
        epoch: u64,
        state: LinkState,
    },
    RemoteTrack {
        peer: ParticipantId,
        epoch: u64,
        media: RemoteMedia,
    },
}

impl TransportEvent {
    pub fn peer(&self) -> &ParticipantId {
        match self {
            TransportEvent::CandidateGenerated { peer, .. }
            | TransportEvent::StateChanged { peer, .. }
            | TransportEvent::RemoteTrack { peer, .. } => peer,
        }
    }

    pub fn epoch(&self) -> u64 {
        match self {
            TransportEvent::CandidateGenerated { epoch, .. }
            | TransportEvent::StateChanged { epoch, .. }
            | TransportEvent::RemoteTrack { epoch, .. } => *epoch,
        }
    }
}

/// One peer connection as the negotiation logic sees it.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Generates an offer and installs it as the local description.
    async fn create_offer(&self) -> Result<String>;

    /// Generates an answer and installs it as the local description.
    async fn create_answer(&self) -> Result<String>;

    async fn set_remote_offer(&self, sdp: &str) -> Result<()>;

    async fn set_remote_answer(&self, sdp: &str) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Adds a sender for `track`. Changes the negotiated media, so the
    /// caller is expected to renegotiate if a session is already up.
    async fn add_track(&self, track: &Arc<LocalTrack>) -> Result<()>;

    /// Swaps the track on the existing sender of `kind`, or detaches it when
    /// `track` is `None`. Returns false if there is no sender of that kind.
    async fn replace_track(&self, kind: TrackKind, track: Option<&Arc<LocalTrack>>)
        -> Result<bool>;

    async fn close(&self) -> Result<()>;
}

/// Builds transports for new sessions.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        peer: ParticipantId,
        epoch: u64,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerTransport>>;
}
