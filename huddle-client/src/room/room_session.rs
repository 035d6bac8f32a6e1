use huddle_core::RoomId;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::{HuddleError, Result};
use crate::media::{
    CaptureDevice, MediaSource, MediaSourceKind, MediaSourceManager, Recording, SourceEnded,
    TrackKind,
};
use crate::peer::{PeerRegistry, RoomView, TrackSynchronizer, TransportEvent, TransportFactory};
use crate::room::chat::ChatLog;
use crate::room::room_command::{Reply, RoomCommand};
use crate::room::snapshot::{LocalMedia, RoomSnapshot, SessionState};
use crate::signaling::{RoomEvent, RoomEvents, SignalIntent, SignalingConnector, SignalingOutput};

const COMMAND_BUFFER: usize = 100;
const TRANSPORT_BUFFER: usize = 256;
const TIMEOUT_TICK: Duration = Duration::from_millis(500);

/// The boundaries a room session talks to.
#[derive(Clone)]
pub struct SessionDeps {
    pub capture: Arc<dyn CaptureDevice>,
    pub connector: Arc<dyn SignalingConnector>,
    pub transports: Arc<dyn TransportFactory>,
}

/// Owns everything belonging to one joined room and runs its event loop.
pub struct RoomSession {
    room_id: RoomId,
    config: ClientConfig,
    media: MediaSourceManager,
    registry: PeerRegistry,
    signaling: Arc<dyn SignalingOutput>,
    events: RoomEvents,
    command_rx: mpsc::Receiver<RoomCommand>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    ended_rx: mpsc::UnboundedReceiver<SourceEnded>,
    chat: ChatLog,
    recording: Option<Recording>,
    state: SessionState,
    signaling_connected: bool,
    snapshot_tx: watch::Sender<RoomSnapshot>,
    torn_down: bool,
}

impl RoomSession {
    /// Acquires the camera, then joins the room's signaling channel. Fails
    /// with [`HuddleError::InitialMediaUnavailable`] when there is no camera.
    pub async fn join(
        room_id: RoomId,
        config: ClientConfig,
        deps: SessionDeps,
    ) -> Result<(RoomSession, RoomHandle)> {
        config.validate()?;

        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let mut media = MediaSourceManager::new(deps.capture, config.capture, ended_tx);
        if let Err(e) = media.start(MediaSourceKind::Camera).await {
            error!("Cannot enter room {}: {}", room_id, e);
            return Err(match e {
                HuddleError::DeviceUnavailable(c) => HuddleError::InitialMediaUnavailable(c),
                other => other,
            });
        }

        let (signaling, events) = match deps
            .connector
            .join(&room_id, &config.display_name)
            .await
        {
            Ok(joined) => joined,
            Err(e) => {
                media.release_current();
                return Err(e);
            }
        };

        let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_BUFFER);
        let registry = PeerRegistry::new(
            deps.transports,
            signaling.clone(),
            transport_tx,
            config.negotiation_timeout(),
        );

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(RoomSnapshot::joining(room_id.clone()));

        let handle = RoomHandle {
            commands: command_tx,
            snapshot: snapshot_rx,
            view: registry.view(),
        };

        let session = RoomSession {
            room_id,
            config,
            media,
            registry,
            signaling,
            events,
            command_rx,
            transport_rx,
            ended_rx,
            chat: ChatLog::new(),
            recording: None,
            state: SessionState::Joining,
            signaling_connected: true,
            snapshot_tx,
            torn_down: false,
        };
        session.publish();
        info!("Entering room {}", session.room_id);
        Ok((session, handle))
    }

    /// Spawns the event loop onto the runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        info!("Room {} event loop started", self.room_id);
        let mut ticker = tokio::time::interval(TIMEOUT_TICK);
        let mut leave_reply = None;

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(RoomCommand::Leave { reply }) => {
                            leave_reply = Some(reply);
                            break;
                        }
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("All room handles dropped. Leaving room.");
                            break;
                        }
                    }
                }

                evt = self.events.recv() => {
                    match evt {
                        Some(e) => self.handle_room_event(e).await,
                        None => {
                            warn!("Signaling channel ended. Leaving room.");
                            break;
                        }
                    }
                }

                Some(evt) = self.transport_rx.recv() => {
                    let source = self.media.current().cloned();
                    self.registry.on_transport_event(evt, source.as_deref()).await;
                }

                Some(ended) = self.ended_rx.recv() => self.handle_source_ended(ended).await,

                _ = ticker.tick() => {
                    let source = self.media.current().cloned();
                    self.registry.expire_stalled(Instant::now(), source.as_deref()).await;
                }
            }
            self.publish();
        }

        self.teardown().await;
        if let Some(reply) = leave_reply {
            let _ = reply.send(());
        }
        info!("Room {} event loop finished", self.room_id);
    }

    async fn handle_room_event(&mut self, event: RoomEvent) {
        let source = self.media.current().cloned();
        let source = source.as_deref();

        match event {
            RoomEvent::Joined { local_id } => {
                self.registry.set_local_id(local_id).await;
                self.state = SessionState::Active;
                self.signaling_connected = true;
            }
            RoomEvent::ParticipantJoined { id, name } => {
                self.registry.on_participant_joined(id, name, source).await;
            }
            RoomEvent::ParticipantLeft { id } => {
                self.registry.on_participant_left(&id).await;
            }
            RoomEvent::OfferReceived { from, sdp } => {
                self.registry.on_offer_received(from, sdp, source).await;
            }
            RoomEvent::AnswerReceived { from, sdp } => {
                self.registry.on_answer_received(from, sdp, source).await;
            }
            RoomEvent::CandidateReceived { from, candidate } => {
                self.registry.on_candidate_received(from, candidate).await;
            }
            RoomEvent::ChatReceived {
                sender,
                sender_id,
                text,
                timestamp,
            } => {
                self.chat.push_delivered(
                    self.registry.local_id(),
                    sender,
                    sender_id,
                    text,
                    timestamp,
                );
            }
            RoomEvent::ChannelError { reason } => {
                warn!("Signaling for room {} interrupted: {}", self.room_id, reason);
                self.signaling_connected = false;
            }
        }
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::SetTrackEnabled { kind, enabled } => self.set_track_enabled(kind, enabled),
            RoomCommand::ToggleTrack { kind } => {
                let enabled = !self.media.is_enabled(kind);
                self.set_track_enabled(kind, enabled);
            }
            RoomCommand::StartScreenShare { reply } => {
                let result = self.switch_source(MediaSourceKind::Screen).await;
                let _ = reply.send(result);
            }
            RoomCommand::StopScreenShare { reply } => {
                let result = self.switch_source(MediaSourceKind::Camera).await;
                let _ = reply.send(result);
            }
            RoomCommand::SendChat { text, reply } => {
                let _ = reply.send(self.send_chat(text).await);
            }
            RoomCommand::StartRecording { reply } => self.start_recording(reply).await,
            RoomCommand::StopRecording { reply } => {
                let result = match self.recording.take() {
                    Some(recording) => recording.stop().await,
                    None => Err(HuddleError::UnsupportedOperation(
                        "no recording in progress".to_string(),
                    )),
                };
                let _ = reply.send(result);
            }
            RoomCommand::Leave { reply } => {
                // Handled by the loop; only reachable if a caller bypasses it.
                let _ = reply.send(());
            }
        }
    }

    fn set_track_enabled(&mut self, kind: TrackKind, enabled: bool) {
        if self.media.set_track_enabled(kind, enabled) {
            info!("Local {} {}", kind, if enabled { "enabled" } else { "muted" });
        } else {
            debug!("Local {} already {}", kind, if enabled { "enabled" } else { "muted" });
        }
    }

    /// Swaps the outbound source and pushes the new tracks to every peer.
    async fn switch_source(&mut self, kind: MediaSourceKind) -> Result<()> {
        let Some(swap) = self.media.switch_to(kind).await? else {
            debug!("{:?} source already live", kind);
            return Ok(());
        };

        TrackSynchronizer::on_source_replaced(&mut self.registry, swap.old.as_deref(), &swap.new)
            .await;
        if let Some(recording) = &self.recording {
            recording.follow(&swap.new);
        }
        Ok(())
    }

    async fn handle_source_ended(&mut self, ended: SourceEnded) {
        let is_current = self
            .media
            .current()
            .is_some_and(|s| s.id() == ended.source_id && s.kind() == MediaSourceKind::Screen);
        if !is_current {
            debug!("Ignoring end of inactive source #{}", ended.source_id);
            return;
        }

        info!("Screen share ended from the platform; returning to camera");
        if let Err(e) = self.switch_source(MediaSourceKind::Camera).await {
            warn!("Could not return to camera after screen share ended: {}", e);
        }
    }

    async fn send_chat(&mut self, text: String) -> Result<()> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(HuddleError::UnsupportedOperation(
                "cannot send an empty chat message".to_string(),
            ));
        }
        // The relay echoes the message back; that copy is what the log shows.
        self.signaling.send(SignalIntent::Chat { text }).await;
        Ok(())
    }

    async fn start_recording(&mut self, reply: Reply<PathBuf>) {
        if self.recording.is_some() {
            let _ = reply.send(Err(HuddleError::UnsupportedOperation(
                "a recording is already in progress".to_string(),
            )));
            return;
        }
        let Some(source) = self.media.current().cloned() else {
            let _ = reply.send(Err(HuddleError::SessionClosed));
            return;
        };

        let result = Recording::start(&self.config.recording_dir, &self.room_id, &source).await;
        let _ = reply.send(result.map(|recording| {
            let path = recording.path().to_path_buf();
            self.recording = Some(recording);
            path
        }));
    }

    fn local_media(&self) -> LocalMedia {
        let current: Option<&Arc<MediaSource>> = self.media.current();
        LocalMedia {
            source: self.media.current_kind(),
            audio_enabled: self.media.is_enabled(TrackKind::Audio),
            video_enabled: self.media.is_enabled(TrackKind::Video),
            has_audio: current.is_some_and(|s| s.has_track(TrackKind::Audio)),
        }
    }

    fn publish(&self) {
        let snapshot = RoomSnapshot {
            room_id: self.room_id.clone(),
            local_id: self.registry.local_id().cloned(),
            state: self.state,
            signaling_connected: self.signaling_connected,
            media: self.local_media(),
            chat: self.chat.shared(),
            recording: self.recording.as_ref().map(|r| r.path().to_path_buf()),
        };
        self.snapshot_tx.send_replace(snapshot);
    }

    /// Leaves the room: peers first, then local media, then the channel.
    async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.state = SessionState::Leaving;
        self.publish();

        self.registry.close_all().await;

        if let Some(recording) = self.recording.take() {
            if let Err(e) = recording.stop().await {
                warn!("Recording could not be finalized: {}", e);
            }
        }
        self.media.release_current();

        self.signaling.send(SignalIntent::Leave).await;
        if let Err(e) = self.signaling.close().await {
            warn!("Closing signaling for room {} failed: {:#}", self.room_id, e);
        }

        self.torn_down = true;
        self.state = SessionState::Left;
        self.signaling_connected = false;
        self.publish();
        info!("Left room {}", self.room_id);
    }
}

impl Drop for RoomSession {
    /// Covers a loop that was cancelled before reaching its own teardown.
    fn drop(&mut self) {
        if self.torn_down {
            return;
        }
        self.media.release_current();
        let transports = self.registry.drain_transports();
        let signaling = self.signaling.clone();
        let room_id = self.room_id.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    for transport in transports {
                        let _ = transport.close().await;
                    }
                    signaling.send(SignalIntent::Leave).await;
                    if let Err(e) = signaling.close().await {
                        warn!("Closing signaling for room {} failed: {:#}", room_id, e);
                    }
                });
            }
            Err(_) => warn!("Room {} dropped outside a runtime; peers not closed", room_id),
        }
    }
}

/// Cloneable control surface for a running [`RoomSession`].
#[derive(Clone)]
pub struct RoomHandle {
    commands: mpsc::Sender<RoomCommand>,
    snapshot: watch::Receiver<RoomSnapshot>,
    view: RoomView,
}

impl RoomHandle {
    async fn post(&self, cmd: RoomCommand) -> Result<()> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| HuddleError::SessionClosed)
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> RoomCommand) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.post(make(tx)).await?;
        rx.await.map_err(|_| HuddleError::SessionClosed)?
    }

    pub async fn set_microphone(&self, enabled: bool) -> Result<()> {
        self.post(RoomCommand::SetTrackEnabled {
            kind: TrackKind::Audio,
            enabled,
        })
        .await
    }

    pub async fn set_camera(&self, enabled: bool) -> Result<()> {
        self.post(RoomCommand::SetTrackEnabled {
            kind: TrackKind::Video,
            enabled,
        })
        .await
    }

    pub async fn toggle_microphone(&self) -> Result<()> {
        self.post(RoomCommand::ToggleTrack {
            kind: TrackKind::Audio,
        })
        .await
    }

    pub async fn toggle_camera(&self) -> Result<()> {
        self.post(RoomCommand::ToggleTrack {
            kind: TrackKind::Video,
        })
        .await
    }

    pub async fn share_screen(&self) -> Result<()> {
        self.request(|reply| RoomCommand::StartScreenShare { reply })
            .await
    }

    pub async fn stop_screen_share(&self) -> Result<()> {
        self.request(|reply| RoomCommand::StopScreenShare { reply })
            .await
    }

    pub async fn send_chat(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.request(|reply| RoomCommand::SendChat { text, reply })
            .await
    }

    pub async fn start_recording(&self) -> Result<PathBuf> {
        self.request(|reply| RoomCommand::StartRecording { reply })
            .await
    }

    pub async fn stop_recording(&self) -> Result<PathBuf> {
        self.request(|reply| RoomCommand::StopRecording { reply })
            .await
    }

    /// Leaves the room and waits for teardown to finish.
    pub async fn leave(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.post(RoomCommand::Leave { reply: tx }).await?;
        rx.await.map_err(|_| HuddleError::SessionClosed)
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that resolves on every snapshot change.
    pub fn watch(&self) -> watch::Receiver<RoomSnapshot> {
        self.snapshot.clone()
    }

    pub fn peers(&self) -> &RoomView {
        &self.view
    }
}
