use tracing::debug;

use crate::error::HuddleError;
use crate::media::{MediaSource, TrackKind};
use crate::peer::session::{NegotiationState, PeerSession};

/// How a session took a new local source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSyncOutcome {
    /// Every sender was swapped in place.
    InPlace,
    /// A new track kind appeared and an offer went out (or was queued).
    Renegotiated,
    /// Tracks attach when negotiation starts.
    Deferred,
}

impl PeerSession {
    /// Attaches tracks of `source` whose kind is not being sent yet. A
    /// detached sender of the same kind is reused. Returns the kinds that
    /// needed a new sender.
    pub(super) async fn attach_source(
        &mut self,
        source: Option<&MediaSource>,
    ) -> Result<Vec<TrackKind>, HuddleError> {
        let Some(source) = source else {
            return Ok(Vec::new());
        };

        let mut added = Vec::new();
        for track in source.tracks() {
            let kind = track.kind();
            if self.outgoing.contains_key(&kind) {
                continue;
            }
            let transport = self.transport()?;
            let reused = transport
                .replace_track(kind, Some(track))
                .await
                .map_err(|e| self.negotiation_error(e))?;
            if !reused {
                transport
                    .add_track(track)
                    .await
                    .map_err(|e| self.negotiation_error(e))?;
                added.push(kind);
            }
            self.outgoing.insert(kind, track.id().to_string());
        }
        Ok(added)
    }

    /// Points every sender at the tracks of `source`. Kinds the source lacks
    /// are detached. Kinds with no sender yet are added and renegotiated.
    pub async fn sync_outgoing(
        &mut self,
        source: &MediaSource,
    ) -> Result<TrackSyncOutcome, HuddleError> {
        if self.state.is_terminal() || self.state == NegotiationState::New {
            return Ok(TrackSyncOutcome::Deferred);
        }

        let mut needs_offer = false;
        for kind in TrackKind::ALL {
            let current = self.outgoing.get(&kind).cloned();
            match (source.track(kind), current) {
                (Some(track), Some(id)) if id == track.id() => {}
                (Some(track), _) => {
                    let transport = self.transport()?;
                    let replaced = transport
                        .replace_track(kind, Some(track))
                        .await
                        .map_err(|e| self.negotiation_error(e))?;
                    if !replaced {
                        transport
                            .add_track(track)
                            .await
                            .map_err(|e| self.negotiation_error(e))?;
                        needs_offer = true;
                    }
                    self.outgoing.insert(kind, track.id().to_string());
                }
                (None, Some(_)) => {
                    self.transport()?
                        .replace_track(kind, None)
                        .await
                        .map_err(|e| self.negotiation_error(e))?;
                    self.outgoing.remove(&kind);
                    debug!("Detached {} sender for {}", kind, self.remote);
                }
                (None, None) => {}
            }
        }

        if needs_offer {
            self.renegotiate().await?;
            Ok(TrackSyncOutcome::Renegotiated)
        } else {
            Ok(TrackSyncOutcome::InPlace)
        }
    }
}
