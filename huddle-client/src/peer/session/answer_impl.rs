use tracing::{debug, info};

use crate::error::HuddleError;
use crate::media::{MediaSource, TrackKind};
use crate::peer::sdp;
use crate::peer::session::{NegotiationState, PeerSession, Polarity};
use crate::signaling::SignalIntent;

/// What happened to an inbound offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    Answered,
    /// Both sides offered at once and the local offer wins.
    IgnoredGlare,
    /// Both sides offered at once and the remote offer wins. The local offer
    /// stays installed on this transport, so the offer has to be answered
    /// from a new session.
    Yielded,
}

impl PeerSession {
    /// Responder path, also used for renegotiation offers from the remote.
    ///
    /// Local senders are attached before the remote description is applied:
    /// the offer's media sections pair with senders that already exist, and
    /// a sender created afterwards is left out of the answer.
    pub async fn accept_offer(
        &mut self,
        sdp: &str,
        source: Option<&MediaSource>,
    ) -> Result<OfferOutcome, HuddleError> {
        match self.state {
            NegotiationState::Failed | NegotiationState::Closed => {
                return Err(HuddleError::SessionClosed);
            }
            NegotiationState::Offering
            | NegotiationState::AwaitingAnswer
            | NegotiationState::Renegotiating => {
                if !self.is_polite() {
                    info!("Glare with {}: keeping local offer", self.remote);
                    return Ok(OfferOutcome::IgnoredGlare);
                }
                info!("Glare with {}: yielding to remote offer", self.remote);
                return Ok(OfferOutcome::Yielded);
            }
            NegotiationState::New | NegotiationState::Connected | NegotiationState::Answering => {}
        }

        let initial = !self.remote_description_set;
        self.begin_negotiation(NegotiationState::Answering);

        let added = self.attach_source(source).await?;

        self.transport()?
            .set_remote_offer(sdp)
            .await
            .map_err(|e| self.negotiation_error(e))?;
        self.remember_remote_description(sdp);
        if initial {
            self.polarity = Polarity::Responder;
        }

        let offered = sdp::media_kinds(sdp);
        let unoffered: Vec<TrackKind> = added
            .into_iter()
            .filter(|kind| !offered.contains(kind))
            .collect();

        let answer = self
            .transport()?
            .create_answer()
            .await
            .map_err(|e| self.negotiation_error(e))?;
        self.signaling
            .send(SignalIntent::Answer {
                to: self.remote.clone(),
                sdp: answer,
            })
            .await;

        self.settle();
        info!("Answered offer from {}", self.remote);

        self.flush_candidates().await;
        if !unoffered.is_empty() {
            debug!(
                "Offer from {} has no section for {:?}; offering them",
                self.remote, unoffered
            );
            self.renegotiation_pending = true;
        }
        if self.renegotiation_pending {
            self.renegotiate().await?;
        }
        Ok(OfferOutcome::Answered)
    }
}
