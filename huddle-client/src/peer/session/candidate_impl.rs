use huddle_core::IceCandidate;
use tracing::{debug, warn};

use crate::error::HuddleError;
use crate::peer::session::PeerSession;
use crate::signaling::SignalIntent;

impl PeerSession {
    /// Applies a remote candidate, or queues it until the remote
    /// description is in place.
    pub async fn add_remote_candidate(&mut self, candidate: IceCandidate) -> Result<(), HuddleError> {
        if self.state.is_terminal() {
            debug!("Ignoring candidate for closed session with {}", self.remote);
            return Ok(());
        }
        if !self.remote_description_set {
            self.pending_remote.push_back(candidate);
            debug!(
                "Queued remote candidate from {} ({} pending)",
                self.remote,
                self.pending_remote.len()
            );
            return Ok(());
        }
        self.transport()?
            .add_ice_candidate(candidate)
            .await
            .map_err(|e| self.negotiation_error(e))
    }

    /// Forwards a locally gathered candidate, holding it back until the
    /// remote description is in place.
    pub async fn on_local_candidate(&mut self, candidate: IceCandidate) {
        if self.state.is_terminal() {
            return;
        }
        if !self.remote_description_set {
            self.pending_local.push_back(candidate);
            return;
        }
        self.signaling
            .send(SignalIntent::Candidate {
                to: self.remote.clone(),
                candidate,
            })
            .await;
    }

    /// Drains both candidate queues in arrival order.
    pub(super) async fn flush_candidates(&mut self) {
        while let Some(candidate) = self.pending_remote.pop_front() {
            let Some(transport) = self.transport.as_deref() else {
                return;
            };
            if let Err(e) = transport.add_ice_candidate(candidate).await {
                warn!("Failed to add ICE candidate from {}: {:#}", self.remote, e);
            }
        }
        while let Some(candidate) = self.pending_local.pop_front() {
            self.signaling
                .send(SignalIntent::Candidate {
                    to: self.remote.clone(),
                    candidate,
                })
                .await;
        }
    }
}
