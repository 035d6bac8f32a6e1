use tracing::{debug, info};

use crate::media::{MediaSource, TrackKind};
use crate::peer::registry::PeerRegistry;
use crate::peer::session::TrackSyncOutcome;

/// Summary of one source replacement across all sessions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub in_place: usize,
    pub renegotiated: usize,
    pub deferred: usize,
    /// Kinds the old source had and the new one lacks.
    pub detached: Vec<TrackKind>,
}

/// Keeps outbound media of every session in step with the local source.
pub struct TrackSynchronizer;

impl TrackSynchronizer {
    pub async fn on_source_replaced(
        registry: &mut PeerRegistry,
        old: Option<&MediaSource>,
        new: &MediaSource,
    ) -> SyncReport {
        let detached: Vec<TrackKind> = old
            .map(|old| {
                TrackKind::ALL
                    .into_iter()
                    .filter(|k| old.has_track(*k) && !new.has_track(*k))
                    .collect()
            })
            .unwrap_or_default();
        if !detached.is_empty() {
            debug!("New source drops {:?}", detached);
        }

        let mut report = SyncReport {
            detached,
            ..SyncReport::default()
        };
        for (_, outcome) in registry.broadcast_local_track_change(new).await {
            match outcome {
                TrackSyncOutcome::InPlace => report.in_place += 1,
                TrackSyncOutcome::Renegotiated => report.renegotiated += 1,
                TrackSyncOutcome::Deferred => report.deferred += 1,
            }
        }

        info!(
            "Switched to {:?} source #{}: {} in place, {} renegotiated",
            new.kind(),
            new.id(),
            report.in_place,
            report.renegotiated
        );
        report
    }
}
