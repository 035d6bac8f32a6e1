mod answer_impl;
mod candidate_impl;
mod offer_impl;
mod track_sync_impl;

pub use answer_impl::OfferOutcome;
pub use track_sync_impl::TrackSyncOutcome;

use huddle_core::{IceCandidate, ParticipantId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::HuddleError;
use crate::media::TrackKind;
use crate::peer::sdp;
use crate::peer::transport::{LinkState, PeerTransport, RemoteMedia};
use crate::signaling::SignalingOutput;

/// Offer/answer progress of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    New,
    Offering,
    AwaitingAnswer,
    Answering,
    Connected,
    Renegotiating,
    Failed,
    Closed,
}

impl NegotiationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationState::Failed | NegotiationState::Closed)
    }

    /// States with a description exchange still outstanding.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            NegotiationState::Offering
                | NegotiationState::AwaitingAnswer
                | NegotiationState::Answering
                | NegotiationState::Renegotiating
        )
    }
}

/// Which side produces the first offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Initiator,
    Responder,
}

/// Returns the polarity the local side takes towards `remote`. The lower
/// identifier initiates, so both ends agree without talking.
pub fn polarity_for(local: Option<&ParticipantId>, remote: &ParticipantId) -> Polarity {
    match local {
        Some(local) if local > remote => Polarity::Responder,
        _ => Polarity::Initiator,
    }
}

/// Negotiation with one remote participant over one transport.
pub struct PeerSession {
    remote: ParticipantId,
    local: Option<ParticipantId>,
    epoch: u64,
    polarity: Polarity,
    state: NegotiationState,
    link: LinkState,
    transport: Option<Box<dyn PeerTransport>>,
    signaling: Arc<dyn SignalingOutput>,
    remote_description_set: bool,
    remote_ufrag: Option<String>,
    pending_local: VecDeque<IceCandidate>,
    pending_remote: VecDeque<IceCandidate>,
    outgoing: BTreeMap<TrackKind, String>,
    remote_media: BTreeMap<TrackKind, RemoteMedia>,
    renegotiation_pending: bool,
    negotiation_started: Option<Instant>,
    failure: Option<String>,
}

impl PeerSession {
    pub fn new(
        remote: ParticipantId,
        local: Option<ParticipantId>,
        epoch: u64,
        polarity: Polarity,
        transport: Box<dyn PeerTransport>,
        signaling: Arc<dyn SignalingOutput>,
    ) -> Self {
        Self {
            remote,
            local,
            epoch,
            polarity,
            state: NegotiationState::New,
            link: LinkState::New,
            transport: Some(transport),
            signaling,
            remote_description_set: false,
            remote_ufrag: None,
            pending_local: VecDeque::new(),
            pending_remote: VecDeque::new(),
            outgoing: BTreeMap::new(),
            remote_media: BTreeMap::new(),
            renegotiation_pending: false,
            negotiation_started: None,
            failure: None,
        }
    }

    /// A session that never got a transport. Kept so the failure stays
    /// visible until the participant leaves.
    pub fn failed(
        remote: ParticipantId,
        local: Option<ParticipantId>,
        epoch: u64,
        polarity: Polarity,
        signaling: Arc<dyn SignalingOutput>,
        reason: String,
    ) -> Self {
        Self {
            remote,
            local,
            epoch,
            polarity,
            state: NegotiationState::Failed,
            link: LinkState::Failed,
            transport: None,
            signaling,
            remote_description_set: false,
            remote_ufrag: None,
            pending_local: VecDeque::new(),
            pending_remote: VecDeque::new(),
            outgoing: BTreeMap::new(),
            remote_media: BTreeMap::new(),
            renegotiation_pending: false,
            negotiation_started: None,
            failure: Some(reason),
        }
    }

    pub fn remote(&self) -> &ParticipantId {
        &self.remote
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn is_remote_description_set(&self) -> bool {
        self.remote_description_set
    }

    /// Track id currently sent for each kind.
    pub fn outgoing(&self) -> &BTreeMap<TrackKind, String> {
        &self.outgoing
    }

    pub fn remote_tracks(&self) -> BTreeSet<TrackKind> {
        self.remote_media.keys().copied().collect()
    }

    /// Inbound tracks by kind. Emptied when the transport is released.
    pub fn remote_media(&self) -> &BTreeMap<TrackKind, RemoteMedia> {
        &self.remote_media
    }

    pub fn pending_remote_candidates(&self) -> usize {
        self.pending_remote.len()
    }

    pub fn pending_local_candidates(&self) -> usize {
        self.pending_local.len()
    }

    /// The local side yields in glare: its own offer is abandoned and the
    /// remote one is answered.
    pub fn is_polite(&self) -> bool {
        polarity_for(self.local.as_ref(), &self.remote) == Polarity::Responder
    }

    pub fn awaits_answer(&self) -> bool {
        matches!(
            self.state,
            NegotiationState::AwaitingAnswer | NegotiationState::Renegotiating
        )
    }

    /// True when `sdp` was written by a different remote transport than the
    /// one this session negotiated with.
    pub fn is_from_new_remote_transport(&self, sdp: &str) -> bool {
        match (self.remote_ufrag.as_deref(), sdp::ice_ufrag(sdp)) {
            (Some(known), Some(incoming)) => known != incoming,
            _ => false,
        }
    }

    fn remember_remote_description(&mut self, sdp: &str) {
        self.remote_description_set = true;
        if let Some(ufrag) = sdp::ice_ufrag(sdp) {
            self.remote_ufrag = Some(ufrag.to_string());
        }
    }

    fn transport(&self) -> Result<&dyn PeerTransport, HuddleError> {
        self.transport.as_deref().ok_or(HuddleError::SessionClosed)
    }

    fn negotiation_error(&self, err: anyhow::Error) -> HuddleError {
        HuddleError::NegotiationFailed {
            peer: self.remote.clone(),
            reason: format!("{:#}", err),
        }
    }

    fn begin_negotiation(&mut self, state: NegotiationState) {
        self.state = state;
        self.negotiation_started = Some(Instant::now());
    }

    fn settle(&mut self) {
        self.state = NegotiationState::Connected;
        self.negotiation_started = None;
    }

    /// True when an exchange has been outstanding for longer than `timeout`.
    pub fn is_stalled(&self, now: Instant, timeout: Duration) -> bool {
        self.state.is_in_flight()
            && self
                .negotiation_started
                .is_some_and(|started| now.saturating_duration_since(started) >= timeout)
    }

    pub fn on_link_state(&mut self, state: LinkState) {
        debug!("Link to {} is now {:?}", self.remote, state);
        self.link = state;
    }

    /// Records an inbound track. A later track of the same kind replaces
    /// the earlier one.
    pub fn on_remote_track(&mut self, media: RemoteMedia) {
        if let Some(previous) = self.remote_media.insert(media.kind, media) {
            debug!(
                "Remote {} track {} from {} superseded",
                previous.kind, previous.track_id, self.remote
            );
        }
    }

    /// Marks the session failed and releases its transport.
    pub async fn fail(&mut self, reason: String) {
        if self.state == NegotiationState::Closed {
            return;
        }
        warn!("Session with {} failed: {}", self.remote, reason);
        self.state = NegotiationState::Failed;
        self.failure = Some(reason);
        self.release_transport().await;
    }

    /// Closes the transport. Idempotent.
    pub async fn close(&mut self) {
        if self.state != NegotiationState::Failed {
            self.state = NegotiationState::Closed;
        }
        self.release_transport().await;
    }

    /// Detaches the transport without awaiting its shutdown.
    pub(crate) fn take_transport(&mut self) -> Option<Box<dyn PeerTransport>> {
        self.state = NegotiationState::Closed;
        self.remote_media.clear();
        self.transport.take()
    }

    async fn release_transport(&mut self) {
        self.negotiation_started = None;
        self.pending_local.clear();
        self.pending_remote.clear();
        self.outgoing.clear();
        self.remote_media.clear();
        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                debug!("Transport for {} closed with error: {:#}", self.remote, e);
            }
        }
    }
}
