use crate::media::{LocalTrack, TrackKind};
use crate::peer::transport::{
    LinkState, PeerTransport, RemoteMedia, TransportEvent, TransportFactory,
};
use crate::peer::transport_config::TransportConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use huddle_core::{IceCandidate, ParticipantId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Builds [`ConnectionWrapper`]s from one ICE configuration.
pub struct WebRtcTransportFactory {
    config: TransportConfig,
}

impl WebRtcTransportFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create(
        &self,
        peer: ParticipantId,
        epoch: u64,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerTransport>> {
        let wrapper = ConnectionWrapper::new(peer, epoch, self.config.clone(), events).await?;
        Ok(Box::new(wrapper))
    }
}

/// A webrtc-rs peer connection bound to one remote participant.
pub struct ConnectionWrapper {
    pub peer_id: ParticipantId,
    pub peer_connection: Arc<RTCPeerConnection>,
    senders: Mutex<HashMap<TrackKind, Arc<RTCRtpSender>>>,
}

impl ConnectionWrapper {
    /// Creates the connection and wires its callbacks into `event_tx`.
    pub async fn new(
        peer_id: ParticipantId,
        epoch: u64,
        config: TransportConfig,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config.rtc_ice_servers(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        let state_tx = event_tx.clone();
        let uid_state = peer_id.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let peer = uid_state.clone();

                Box::pin(async move {
                    info!("Peer connection state for {}: {:?}", peer, s);
                    let state = match s {
                        RTCPeerConnectionState::New => LinkState::New,
                        RTCPeerConnectionState::Connecting => LinkState::Connecting,
                        RTCPeerConnectionState::Connected => LinkState::Connected,
                        RTCPeerConnectionState::Disconnected => LinkState::Disconnected,
                        RTCPeerConnectionState::Failed => LinkState::Failed,
                        RTCPeerConnectionState::Closed => LinkState::Closed,
                        _ => return,
                    };
                    let _ = tx
                        .send(TransportEvent::StateChanged { peer, epoch, state })
                        .await;
                })
            },
        ));

        let ice_tx = event_tx.clone();
        let uid_ice = peer_id.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let peer = uid_ice.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let candidate = IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                };
                let _ = tx
                    .send(TransportEvent::CandidateGenerated {
                        peer,
                        epoch,
                        candidate,
                    })
                    .await;
            })
        }));

        let track_tx = event_tx;
        let uid_track = peer_id.clone();
        peer_connection.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
            let tx = track_tx.clone();
            let peer = uid_track.clone();

            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Audio => TrackKind::Audio,
                    RTPCodecType::Video => TrackKind::Video,
                    _ => return,
                };
                debug!("Remote {} track {} from {}", kind, track.id(), peer);
                let media = RemoteMedia::new(kind, track.id(), track.stream_id()).with_track(track);
                let _ = tx
                    .send(TransportEvent::RemoteTrack { peer, epoch, media })
                    .await;
            })
        }));

        Ok(Self {
            peer_id,
            peer_connection,
            senders: Mutex::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl PeerTransport for ConnectionWrapper {
    async fn create_offer(&self) -> Result<String> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(answer.sdp)
    }

    async fn set_remote_offer(&self, sdp: &str) -> Result<()> {
        let desc = RTCSessionDescription::offer(sdp.to_string())?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn set_remote_answer(&self, sdp: &str) -> Result<()> {
        let desc = RTCSessionDescription::answer(sdp.to_string())?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            ..Default::default()
        };
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn add_track(&self, track: &Arc<LocalTrack>) -> Result<()> {
        let sender = self
            .peer_connection
            .add_track(track.rtc_track())
            .await
            .with_context(|| format!("Failed to add {} track", track.kind()))?;

        // Drain RTCP so the interceptors keep running.
        let rtcp_sender = sender.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while rtcp_sender.read(&mut buf).await.is_ok() {}
        });

        self.senders.lock().await.insert(track.kind(), sender);
        Ok(())
    }

    async fn replace_track(
        &self,
        kind: TrackKind,
        track: Option<&Arc<LocalTrack>>,
    ) -> Result<bool> {
        let sender = self.senders.lock().await.get(&kind).cloned();
        let Some(sender) = sender else {
            return Ok(false);
        };
        let replacement: Option<Arc<dyn TrackLocal + Send + Sync>> = track.map(|t| t.rtc_track());
        sender
            .replace_track(replacement)
            .await
            .with_context(|| format!("Failed to replace {} track", kind))?;
        Ok(true)
    }

    async fn close(&self) -> Result<()> {
        self.senders.lock().await.clear();
        if let Err(e) = self.peer_connection.close().await {
            warn!("Closing connection to {} failed: {}", self.peer_id, e);
            return Err(e.into());
        }
        Ok(())
    }
}
