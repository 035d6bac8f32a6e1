
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Level;

use huddle_client::config::CaptureConstraints;
use huddle_client::media::{MediaSource, MediaSourceKind, MediaSourceManager, SourceEnded, SyntheticCapture};
use huddle_client::peer::{PeerRegistry, TrackSyncOutcome, TransportEvent};
use huddle_client::signaling::SignalingConnector;
use huddle_client::{ClientConfig, RoomHandle, RoomSession, SessionDeps};
use huddle_core::{ParticipantId, RoomId};

use huddle_client::peer::NegotiationState;
use huddle_client::signaling::RoomEvent;

use crate::utils::{MockConnector, MockSignalingOutput, MockTransportFactory, TrackingCapture};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn pid(id: &str) -> ParticipantId {
    ParticipantId::from(id)
}

pub fn test_config(name: &str) -> ClientConfig {
    ClientConfig {
        display_name: name.to_string(),
        recording_dir: std::env::temp_dir().join("huddle-tests"),
        ..ClientConfig::default()
    }
}

/// A remote description in the format the mock transports write: a header
/// line, the ICE fragment of the sending transport and a section per kind.
pub fn remote_sdp(header: &str, ufrag: &str) -> String {
    format!(
        "{}\na=ice-ufrag:{}\nm=audio 9 RTP/SAVPF 0\na=sendrecv\nm=video 9 RTP/SAVPF 0\na=sendrecv",
        header, ufrag
    )
}

/// Polls `check` until it holds or `within` elapses.
pub async fn wait_until<F, Fut>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// A registry wired to mocks, for driving handlers directly.
pub struct RegistryHarness {
    pub registry: PeerRegistry,
    pub signaling: MockSignalingOutput,
    pub factory: MockTransportFactory,
    pub events_rx: mpsc::Receiver<TransportEvent>,
    pub media: MediaSourceManager,
    pub device: Arc<SyntheticCapture>,
    _ended_rx: mpsc::UnboundedReceiver<SourceEnded>,
}

impl RegistryHarness {
    pub async fn new(local: &str) -> Self {
        Self::with_device(local, Arc::new(SyntheticCapture::new())).await
    }

    pub async fn with_device(local: &str, device: Arc<SyntheticCapture>) -> Self {
        let signaling = MockSignalingOutput::new_stored_only();
        let factory = MockTransportFactory::new(local);
        let (events_tx, events_rx) = mpsc::channel(256);
        let mut registry = PeerRegistry::new(
            Arc::new(factory.clone()),
            Arc::new(signaling.clone()),
            events_tx,
            Duration::from_secs(15),
        );
        registry.set_local_id(pid(local)).await;

        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let mut media =
            MediaSourceManager::new(device.clone(), CaptureConstraints::default(), ended_tx);
        media
            .start(MediaSourceKind::Camera)
            .await
            .expect("camera available");

        Self {
            registry,
            signaling,
            factory,
            events_rx,
            media,
            device,
            _ended_rx: ended_rx,
        }
    }

    pub fn source(&self) -> Option<Arc<MediaSource>> {
        self.media.current().cloned()
    }

    /// Feeds every queued transport event back into the registry.
    pub async fn pump(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            let source = self.source();
            self.registry
                .on_transport_event(event, source.as_deref())
                .await;
        }
    }

    /// Switches the local capture and pushes the new tracks to every session.
    pub async fn switch_source(
        &mut self,
        kind: MediaSourceKind,
    ) -> Vec<(ParticipantId, TrackSyncOutcome)> {
        let swap = self
            .media
            .switch_to(kind)
            .await
            .expect("capture available")
            .expect("source kind changed");
        self.registry.broadcast_local_track_change(&swap.new).await
    }

    pub async fn join(&mut self, id: &str) {
        let source = self.source();
        self.registry
            .on_participant_joined(pid(id), Some(id.to_uppercase()), source.as_deref())
            .await;
    }

    pub async fn offer_from(&mut self, id: &str, sdp: &str) {
        let source = self.source();
        self.registry
            .on_offer_received(pid(id), sdp.to_string(), source.as_deref())
            .await;
    }

    pub async fn answer_from(&mut self, id: &str, sdp: &str) {
        let source = self.source();
        self.registry
            .on_answer_received(pid(id), sdp.to_string(), source.as_deref())
            .await;
    }
}

pub struct JoinedClient {
    pub handle: RoomHandle,
    pub task: tokio::task::JoinHandle<()>,
    pub factory: MockTransportFactory,
    pub capture: TrackingCapture,
}

/// Joins `room` through `connector` with mock transports and a tracking
/// synthetic device.
pub async fn join_client(
    room: &str,
    name: &str,
    connector: Arc<dyn SignalingConnector>,
) -> JoinedClient {
    let factory = MockTransportFactory::new(name);
    let capture = TrackingCapture::new();
    let deps = SessionDeps {
        capture: Arc::new(capture.clone()),
        connector,
        transports: Arc::new(factory.clone()),
    };
    let (session, handle) = RoomSession::join(RoomId::from(room), test_config(name), deps)
        .await
        .expect("join room");
    JoinedClient {
        handle,
        task: session.spawn(),
        factory,
        capture,
    }
}

/// Joins as `local` through a [`MockConnector`] and completes an exchange
/// with each of `peers`, which must all sort after `local`.
pub async fn room_with_peers(local: &str, peers: &[&str]) -> (JoinedClient, Arc<MockConnector>) {
    let connector = MockConnector::new();
    let client = join_client("room-1", local, connector.clone()).await;

    connector
        .inject(RoomEvent::Joined {
            local_id: pid(local),
        })
        .await;
    for peer in peers {
        connector
            .inject(RoomEvent::ParticipantJoined {
                id: pid(peer),
                name: None,
            })
            .await;
    }

    for peer in peers {
        let offered = wait_until(Duration::from_secs(2), || async {
            !connector.output.offers_to(&pid(peer)).await.is_empty()
        })
        .await;
        assert!(offered, "no offer sent to {}", peer);
        connector
            .inject(RoomEvent::AnswerReceived {
                from: pid(peer),
                sdp: format!("answer:{}->{}", peer, local),
            })
            .await;
    }

    let connected = wait_until(Duration::from_secs(2), || async {
        peers.iter().all(|peer| {
            client
                .handle
                .peers()
                .get(&pid(peer))
                .is_some_and(|v| v.state == NegotiationState::Connected)
        })
    })
    .await;
    assert!(connected, "peers did not connect");
    (client, connector)
}
