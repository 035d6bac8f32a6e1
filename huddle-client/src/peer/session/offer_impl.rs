use tracing::{debug, info, warn};

use crate::error::HuddleError;
use crate::media::MediaSource;
use crate::peer::session::{NegotiationState, PeerSession};
use crate::signaling::SignalIntent;

impl PeerSession {
    /// Initiator path: attach the local tracks, install an offer and send it.
    pub async fn start_offer(&mut self, source: Option<&MediaSource>) -> Result<(), HuddleError> {
        if self.state != NegotiationState::New {
            debug!("Session with {} already negotiating ({:?})", self.remote, self.state);
            return Ok(());
        }
        self.begin_negotiation(NegotiationState::Offering);
        self.attach_source(source).await?;
        self.send_offer().await
    }

    /// Re-offers after a change to the negotiated media. Deferred while
    /// another exchange is outstanding.
    pub async fn renegotiate(&mut self) -> Result<(), HuddleError> {
        match self.state {
            NegotiationState::Connected => {
                info!("Renegotiating with {}", self.remote);
                self.renegotiation_pending = false;
                self.begin_negotiation(NegotiationState::Renegotiating);
                self.send_offer().await
            }
            state if state.is_in_flight() => {
                debug!("Renegotiation with {} queued behind {:?}", self.remote, state);
                self.renegotiation_pending = true;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn send_offer(&mut self) -> Result<(), HuddleError> {
        let sdp = self
            .transport()?
            .create_offer()
            .await
            .map_err(|e| self.negotiation_error(e))?;

        self.signaling
            .send(SignalIntent::Offer {
                to: self.remote.clone(),
                sdp,
            })
            .await;

        if self.state == NegotiationState::Offering {
            self.state = NegotiationState::AwaitingAnswer;
        }
        Ok(())
    }

    /// Applies the remote answer to an outstanding offer. Returns false when
    /// no offer was outstanding and the answer was dropped.
    pub async fn accept_answer(&mut self, sdp: &str) -> Result<bool, HuddleError> {
        if !matches!(
            self.state,
            NegotiationState::AwaitingAnswer | NegotiationState::Renegotiating
        ) {
            warn!(
                "Dropping answer from {} while {:?}",
                self.remote, self.state
            );
            return Ok(false);
        }

        self.transport()?
            .set_remote_answer(sdp)
            .await
            .map_err(|e| self.negotiation_error(e))?;
        self.remember_remote_description(sdp);
        self.settle();
        info!("Negotiation with {} complete", self.remote);

        self.flush_candidates().await;
        if self.renegotiation_pending {
            self.renegotiate().await?;
        }
        Ok(true)
    }
}
