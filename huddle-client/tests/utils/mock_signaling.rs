use async_trait::async_trait;
use huddle_client::Result;
use huddle_client::signaling::{RoomEvent, RoomEvents, SignalIntent, SignalingConnector, SignalingOutput};
use huddle_core::{ParticipantId, RoomId};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};

/// Mock SignalingOutput that captures all outgoing intents.
#[derive(Clone)]
pub struct MockSignalingOutput {
    /// Channel to send captured intents.
    tx: mpsc::UnboundedSender<SignalIntent>,
    /// All captured intents (for verification).
    intents: Arc<Mutex<Vec<SignalIntent>>>,
    closes: Arc<AtomicUsize>,
}

impl MockSignalingOutput {
    /// Create a new MockSignalingOutput and its receiver channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SignalIntent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signaling = Self {
            tx,
            intents: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        };
        (signaling, rx)
    }

    /// Create a MockSignalingOutput without a receiver (intents are only stored).
    pub fn new_stored_only() -> Self {
        Self::new().0
    }

    pub async fn get_intents(&self) -> Vec<SignalIntent> {
        self.intents.lock().await.clone()
    }

    /// Offers sent to a specific participant, in order.
    pub async fn offers_to(&self, peer: &ParticipantId) -> Vec<String> {
        self.intents
            .lock()
            .await
            .iter()
            .filter_map(|i| match i {
                SignalIntent::Offer { to, sdp } if to == peer => Some(sdp.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn answers_to(&self, peer: &ParticipantId) -> Vec<String> {
        self.intents
            .lock()
            .await
            .iter()
            .filter_map(|i| match i {
                SignalIntent::Answer { to, sdp } if to == peer => Some(sdp.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn candidates_to(&self, peer: &ParticipantId) -> usize {
        self.intents
            .lock()
            .await
            .iter()
            .filter(|i| matches!(i, SignalIntent::Candidate { to, .. } if to == peer))
            .count()
    }

    pub async fn count_leaves(&self) -> usize {
        self.intents
            .lock()
            .await
            .iter()
            .filter(|i| matches!(i, SignalIntent::Leave))
            .count()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Default for MockSignalingOutput {
    fn default() -> Self {
        Self::new_stored_only()
    }
}

#[async_trait]
impl SignalingOutput for MockSignalingOutput {
    async fn send(&self, intent: SignalIntent) {
        tracing::debug!("[MockSignaling] {}", intent.kind());
        self.intents.lock().await.push(intent.clone());
        let _ = self.tx.send(intent);
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector that hands out a [`MockSignalingOutput`] and lets the test
/// inject relay events.
pub struct MockConnector {
    pub output: MockSignalingOutput,
    events_tx: mpsc::Sender<RoomEvent>,
    events_rx: std::sync::Mutex<Option<RoomEvents>>,
    joins: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::channel(256);
        Arc::new(Self {
            output: MockSignalingOutput::new_stored_only(),
            events_tx,
            events_rx: std::sync::Mutex::new(Some(events_rx)),
            joins: AtomicUsize::new(0),
        })
    }

    pub async fn inject(&self, event: RoomEvent) {
        self.events_tx
            .send(event)
            .await
            .expect("room loop stopped reading events");
    }

    pub fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalingConnector for MockConnector {
    async fn join(
        &self,
        _room: &RoomId,
        _display_name: &str,
    ) -> Result<(Arc<dyn SignalingOutput>, RoomEvents)> {
        self.joins.fetch_add(1, Ordering::SeqCst);
        let events = self
            .events_rx
            .lock()
            .unwrap()
            .take()
            .expect("MockConnector joined twice");
        Ok((Arc::new(self.output.clone()), events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_signaling_captures_offer() {
        let (signaling, mut rx) = MockSignalingOutput::new();
        let peer = ParticipantId::from("b");

        signaling
            .send(SignalIntent::Offer {
                to: peer.clone(),
                sdp: "test-sdp".into(),
            })
            .await;

        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, SignalIntent::Offer { .. }));
        assert_eq!(signaling.offers_to(&peer).await, vec!["test-sdp".to_string()]);
    }
}
