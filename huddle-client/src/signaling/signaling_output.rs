use async_trait::async_trait;
use huddle_core::RoomId;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::signaling::event::{RoomEvent, SignalIntent};

/// Inbound half of a joined signaling channel. Not restartable: once it
/// yields `None` the channel is gone for good.
pub type RoomEvents = mpsc::Receiver<RoomEvent>;

/// Outbound half of the signaling channel.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Fire-and-forget. Intents issued while the link is down are dropped.
    async fn send(&self, intent: SignalIntent);

    /// Shuts the channel down. Later calls are no-ops.
    async fn close(&self) -> anyhow::Result<()>;
}

/// Opens a signaling channel scoped to one room.
#[async_trait]
pub trait SignalingConnector: Send + Sync {
    async fn join(
        &self,
        room: &RoomId,
        display_name: &str,
    ) -> Result<(Arc<dyn SignalingOutput>, RoomEvents)>;
}
