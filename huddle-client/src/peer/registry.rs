use huddle_core::{IceCandidate, ParticipantId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::HuddleError;
use crate::media::MediaSource;
use crate::peer::session::{
    NegotiationState, OfferOutcome, PeerSession, Polarity, TrackSyncOutcome, polarity_for,
};
use crate::peer::transport::{LinkState, PeerTransport, TransportEvent, TransportFactory};
use crate::peer::view::RoomView;
use crate::signaling::SignalingOutput;

/// One session per remote participant, keyed by identifier.
///
/// All mutation happens on the room loop; the [`RoomView`] is the only part
/// shared with other tasks.
pub struct PeerRegistry {
    local_id: Option<ParticipantId>,
    sessions: HashMap<ParticipantId, PeerSession>,
    names: HashMap<ParticipantId, String>,
    retried: HashSet<ParticipantId>,
    factory: Arc<dyn TransportFactory>,
    signaling: Arc<dyn SignalingOutput>,
    events_tx: mpsc::Sender<TransportEvent>,
    next_epoch: u64,
    negotiation_timeout: Duration,
    view: RoomView,
}

impl PeerRegistry {
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        signaling: Arc<dyn SignalingOutput>,
        events_tx: mpsc::Sender<TransportEvent>,
        negotiation_timeout: Duration,
    ) -> Self {
        Self {
            local_id: None,
            sessions: HashMap::new(),
            names: HashMap::new(),
            retried: HashSet::new(),
            factory,
            signaling,
            events_tx,
            next_epoch: 1,
            negotiation_timeout,
            view: RoomView::new(),
        }
    }

    pub fn local_id(&self) -> Option<&ParticipantId> {
        self.local_id.as_ref()
    }

    pub fn view(&self) -> RoomView {
        self.view.clone()
    }

    pub fn session(&self, id: &ParticipantId) -> Option<&PeerSession> {
        self.sessions.get(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions that are neither failed nor closed.
    pub fn live_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| !s.state().is_terminal())
            .count()
    }

    pub fn participants(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<ParticipantId> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn display_name(&self, id: &ParticipantId) -> String {
        self.names
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.fallback_name())
    }

    fn publish(&self, id: &ParticipantId) {
        if let Some(session) = self.sessions.get(id) {
            self.view.publish(session, self.display_name(id));
        }
    }

    /// Records the identifier the relay assigned. A different identifier
    /// after a reconnect means the remote ends see a new participant, so the
    /// existing sessions are dropped and rebuilt from the replayed roster.
    pub async fn set_local_id(&mut self, id: ParticipantId) -> bool {
        match &self.local_id {
            Some(current) if *current == id => return false,
            Some(current) => {
                info!(
                    "Local identity changed from {} to {}; rebuilding sessions",
                    current, id
                );
                self.close_all().await;
                self.retried.clear();
            }
            None => info!("Joined as {}", id),
        }
        self.local_id = Some(id);
        true
    }

    async fn create_session(&mut self, id: &ParticipantId, polarity: Polarity) -> PeerSession {
        let epoch = self.next_epoch;
        self.next_epoch += 1;

        match self
            .factory
            .create(id.clone(), epoch, self.events_tx.clone())
            .await
        {
            Ok(transport) => PeerSession::new(
                id.clone(),
                self.local_id.clone(),
                epoch,
                polarity,
                transport,
                self.signaling.clone(),
            ),
            Err(e) => {
                warn!("Failed to create transport for {}: {:#}", id, e);
                PeerSession::failed(
                    id.clone(),
                    self.local_id.clone(),
                    epoch,
                    polarity,
                    self.signaling.clone(),
                    format!("{:#}", e),
                )
            }
        }
    }

    /// Creates a session for a newly seen participant. Repeated joins for a
    /// known participant only refresh the display name.
    pub async fn on_participant_joined(
        &mut self,
        id: ParticipantId,
        name: Option<String>,
        source: Option<&MediaSource>,
    ) {
        if self.local_id.as_ref() == Some(&id) {
            return;
        }
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            self.names.insert(id.clone(), name);
        }
        if self.sessions.contains_key(&id) {
            debug!("Participant {} already has a session", id);
            self.publish(&id);
            return;
        }

        let polarity = polarity_for(self.local_id.as_ref(), &id);
        info!("Participant {} joined; local side is {:?}", id, polarity);
        let mut session = self.create_session(&id, polarity).await;

        let outcome = if polarity == Polarity::Initiator && !session.state().is_terminal() {
            session.start_offer(source).await
        } else {
            Ok(())
        };
        self.sessions.insert(id.clone(), session);

        if let Err(e) = outcome {
            self.fail_session(&id, e.to_string(), source).await;
        }
        self.publish(&id);
    }

    pub async fn on_participant_left(&mut self, id: &ParticipantId) {
        if let Some(mut session) = self.sessions.remove(id) {
            info!("Participant {} left", id);
            session.close().await;
        }
        self.names.remove(id);
        self.retried.remove(id);
        self.view.remove(id);
    }

    pub async fn on_offer_received(
        &mut self,
        from: ParticipantId,
        sdp: String,
        source: Option<&MediaSource>,
    ) {
        if self.local_id.as_ref() == Some(&from) {
            return;
        }

        let replace = match self.sessions.get(&from) {
            None => true,
            Some(session) if session.state().is_terminal() => true,
            Some(session) if session.is_from_new_remote_transport(&sdp) => {
                info!("{} restarted its connection; answering on a new session", from);
                true
            }
            Some(_) => false,
        };
        if replace {
            self.replace_session(&from, Polarity::Responder).await;
        }

        let mut result = self.accept_offer_from(&from, &sdp, source).await;
        if matches!(result, Ok(OfferOutcome::Yielded)) {
            self.replace_session(&from, Polarity::Responder).await;
            result = self.accept_offer_from(&from, &sdp, source).await;
        }

        match result {
            Ok(OfferOutcome::IgnoredGlare) => debug!("Ignored competing offer from {}", from),
            Ok(_) => {}
            Err(e) => self.fail_session(&from, e.to_string(), source).await,
        }
        self.publish(&from);
    }

    async fn accept_offer_from(
        &mut self,
        from: &ParticipantId,
        sdp: &str,
        source: Option<&MediaSource>,
    ) -> Result<OfferOutcome, HuddleError> {
        match self.sessions.get_mut(from) {
            Some(session) if !session.state().is_terminal() => {
                session.accept_offer(sdp, source).await
            }
            _ => Err(HuddleError::SessionClosed),
        }
    }

    /// Closes the session with `id`, if any, and puts a new one with its own
    /// transport in its place.
    async fn replace_session(&mut self, id: &ParticipantId, polarity: Polarity) {
        if let Some(mut old) = self.sessions.remove(id) {
            old.close().await;
        }
        let session = self.create_session(id, polarity).await;
        self.sessions.insert(id.clone(), session);
    }

    pub async fn on_answer_received(
        &mut self,
        from: ParticipantId,
        sdp: String,
        source: Option<&MediaSource>,
    ) {
        let restart = match self.sessions.get(&from) {
            Some(session) => {
                session.awaits_answer() && session.is_from_new_remote_transport(&sdp)
            }
            None => {
                let stale = HuddleError::StaleMessage {
                    peer: from,
                    kind: "answer",
                };
                warn!("{}", stale);
                return;
            }
        };

        let result = if restart {
            // The remote answered from a transport our offer was never
            // applied to, which happens when it yielded in glare.
            info!("Answer from {} comes from a new connection; offering again", from);
            let polarity = polarity_for(self.local_id.as_ref(), &from);
            self.replace_session(&from, polarity).await;
            match self.sessions.get_mut(&from) {
                Some(session) if !session.state().is_terminal() => {
                    session.start_offer(source).await
                }
                _ => Ok(()),
            }
        } else {
            match self.sessions.get_mut(&from) {
                Some(session) => session.accept_answer(&sdp).await.map(|_| ()),
                None => Ok(()),
            }
        };

        if let Err(e) = result {
            self.fail_session(&from, e.to_string(), source).await;
        }
        self.publish(&from);
    }

    pub async fn on_candidate_received(&mut self, from: ParticipantId, candidate: IceCandidate) {
        let Some(session) = self.sessions.get_mut(&from) else {
            let stale = HuddleError::StaleMessage {
                peer: from,
                kind: "ice_candidate",
            };
            warn!("{}", stale);
            return;
        };
        if let Err(e) = session.add_remote_candidate(candidate).await {
            warn!("Failed to add ICE candidate from {}: {}", from, e);
        }
    }

    /// Routes a transport callback to its session. Events from a transport
    /// that has since been replaced or closed are dropped.
    pub async fn on_transport_event(
        &mut self,
        event: TransportEvent,
        source: Option<&MediaSource>,
    ) {
        let peer = event.peer().clone();
        let Some(session) = self.sessions.get_mut(&peer) else {
            debug!("Dropping transport event for unknown peer {}", peer);
            return;
        };
        if session.epoch() != event.epoch() || session.state().is_terminal() {
            debug!(
                "Dropping stale transport event for {} (epoch {} vs {})",
                peer,
                event.epoch(),
                session.epoch()
            );
            return;
        }

        match event {
            TransportEvent::CandidateGenerated { candidate, .. } => {
                session.on_local_candidate(candidate).await;
            }
            TransportEvent::StateChanged { state, .. } => {
                session.on_link_state(state);
                if state == LinkState::Failed {
                    self.fail_session(&peer, "connection failed".to_string(), source)
                        .await;
                }
            }
            TransportEvent::RemoteTrack { media, .. } => {
                debug!("Receiving {} track {} from {}", media.kind, media.track_id, peer);
                session.on_remote_track(media);
            }
        }
        self.publish(&peer);
    }

    /// Applies a new local source to every live session.
    pub async fn broadcast_local_track_change(
        &mut self,
        source: &MediaSource,
    ) -> Vec<(ParticipantId, TrackSyncOutcome)> {
        let mut outcomes = Vec::new();
        for id in self.participants() {
            let result = match self.sessions.get_mut(&id) {
                Some(session) => session.sync_outgoing(source).await,
                None => continue,
            };
            match result {
                Ok(outcome) => outcomes.push((id.clone(), outcome)),
                Err(e) => self.fail_session(&id, e.to_string(), Some(source)).await,
            }
            self.publish(&id);
        }
        outcomes
    }

    /// Fails sessions whose exchange has been outstanding too long.
    pub async fn expire_stalled(
        &mut self,
        now: Instant,
        source: Option<&MediaSource>,
    ) -> Vec<ParticipantId> {
        let stalled: Vec<ParticipantId> = self
            .sessions
            .values()
            .filter(|s| s.is_stalled(now, self.negotiation_timeout))
            .map(|s| s.remote().clone())
            .collect();

        for id in &stalled {
            let reason = format!(
                "no answer within {}s",
                self.negotiation_timeout.as_secs()
            );
            self.fail_session(id, reason, source).await;
            self.publish(id);
        }
        stalled
    }

    /// Tears a session down. An initiator gets one fresh attempt; after that
    /// the failure is kept until the participant leaves.
    async fn fail_session(
        &mut self,
        id: &ParticipantId,
        reason: String,
        source: Option<&MediaSource>,
    ) {
        let Some(mut session) = self.sessions.remove(id) else {
            return;
        };
        let polarity = session.polarity();
        session.fail(reason.clone()).await;

        let mut reason = reason;
        if polarity == Polarity::Initiator && self.retried.insert(id.clone()) {
            info!("Retrying negotiation with {}", id);
            let mut fresh = self.create_session(id, Polarity::Initiator).await;
            if !fresh.state().is_terminal() {
                match fresh.start_offer(source).await {
                    Ok(()) => {
                        self.sessions.insert(id.clone(), fresh);
                        return;
                    }
                    Err(e) => {
                        reason = e.to_string();
                        fresh.fail(reason.clone()).await;
                    }
                }
            }
            session = fresh;
        }

        warn!("Giving up on {}: {}", id, reason);
        self.sessions.insert(id.clone(), session);
    }

    /// Closes every session and forgets all participants.
    pub async fn close_all(&mut self) {
        for (id, mut session) in self.sessions.drain() {
            debug!("Closing session with {}", id);
            session.close().await;
        }
        self.view.clear();
    }

    /// Detaches all transports so they can be closed off the room loop.
    pub(crate) fn drain_transports(&mut self) -> Vec<Box<dyn PeerTransport>> {
        let transports = self
            .sessions
            .values_mut()
            .filter_map(|s| s.take_transport())
            .collect();
        self.sessions.clear();
        self.view.clear();
        transports
    }

    pub fn state_of(&self, id: &ParticipantId) -> Option<NegotiationState> {
        self.sessions.get(id).map(|s| s.state())
    }
}
