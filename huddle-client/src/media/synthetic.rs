use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::CaptureConstraints;
use crate::error::CaptureError;
use crate::media::capture::{CaptureDevice, CapturedStream};
use crate::media::source::MediaSourceKind;
use crate::media::track::{LocalTrack, TrackKind};

struct SyntheticState {
    camera: bool,
    microphone: bool,
    screen_supported: bool,
    screen_permission: bool,
    opened: u32,
    pump_frames: bool,
    share_stop: Option<oneshot::Sender<()>>,
}

/// Opus frame carrying 20 ms of silence.
const OPUS_SILENCE: [u8; 3] = [0xf8, 0xff, 0xfe];
const AUDIO_FRAME: Duration = Duration::from_millis(20);

/// Headless capture device producing silent tracks.
///
/// Device presence and display-capture permission are switchable at runtime,
/// and [`SyntheticCapture::stop_sharing`] plays the part of the platform's
/// "stop sharing" button.
pub struct SyntheticCapture {
    state: Mutex<SyntheticState>,
}

impl SyntheticCapture {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SyntheticState {
                camera: true,
                microphone: true,
                screen_supported: true,
                screen_permission: true,
                opened: 0,
                pump_frames: false,
                share_stop: None,
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SyntheticState) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn set_camera_available(&self, available: bool) {
        self.with_state(|s| s.camera = available);
    }

    pub fn set_microphone_available(&self, available: bool) {
        self.with_state(|s| s.microphone = available);
    }

    pub fn set_screen_supported(&self, supported: bool) {
        self.with_state(|s| s.screen_supported = supported);
    }

    pub fn set_screen_permission(&self, granted: bool) {
        self.with_state(|s| s.screen_permission = granted);
    }

    /// Feed every opened track with placeholder frames until it stops.
    pub fn set_frame_pump(&self, enabled: bool) {
        self.with_state(|s| s.pump_frames = enabled);
    }

    /// Number of successful captures so far.
    pub fn opened(&self) -> u32 {
        self.with_state(|s| s.opened)
    }

    /// Ends the most recent display capture as if the user pressed the
    /// platform's stop button.
    pub fn stop_sharing(&self) -> bool {
        match self.with_state(|s| s.share_stop.take()) {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

impl Default for SyntheticCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureDevice for SyntheticCapture {
    async fn open(
        &self,
        kind: MediaSourceKind,
        constraints: &CaptureConstraints,
    ) -> Result<CapturedStream, CaptureError> {
        let stream = self.with_state(|s| {
            match kind {
                MediaSourceKind::Camera if !s.camera => return Err(CaptureError::NotFound(kind)),
                MediaSourceKind::Screen if !s.screen_supported => {
                    return Err(CaptureError::Unsupported(kind));
                }
                MediaSourceKind::Screen if !s.screen_permission => {
                    return Err(CaptureError::PermissionDenied(kind));
                }
                _ => {}
            }

            s.opened += 1;
            let n = s.opened;
            let label = match kind {
                MediaSourceKind::Camera => "camera",
                MediaSourceKind::Screen => "screen",
            };
            let stream_id = format!("huddle-{}-{}", label, n);

            let mut tracks = Vec::new();
            if s.microphone {
                tracks.push(LocalTrack::new(
                    TrackKind::Audio,
                    format!("{}-audio-{}", label, n),
                    stream_id.clone(),
                ));
            }
            tracks.push(LocalTrack::new(
                TrackKind::Video,
                format!("{}-video-{}", label, n),
                stream_id,
            ));

            let sharing_stopped = match kind {
                MediaSourceKind::Screen => {
                    let (tx, rx) = oneshot::channel();
                    s.share_stop = Some(tx);
                    Some(rx)
                }
                MediaSourceKind::Camera => None,
            };

            debug!(
                "Synthetic {} capture #{} at {}x{}@{}",
                label, n, constraints.width, constraints.height, constraints.frame_rate
            );

            Ok((
                CapturedStream {
                    tracks,
                    sharing_stopped,
                },
                s.pump_frames,
            ))
        });

        let (stream, pump) = stream?;
        if pump {
            for track in &stream.tracks {
                spawn_pump(track.clone(), constraints.frame_rate);
            }
        }
        Ok(stream)
    }
}

fn spawn_pump(track: Arc<LocalTrack>, frame_rate: u32) {
    let (payload, period) = match track.kind() {
        TrackKind::Audio => (Bytes::from_static(&OPUS_SILENCE), AUDIO_FRAME),
        TrackKind::Video => (
            Bytes::from(vec![0u8; 64]),
            Duration::from_secs(1) / frame_rate.max(1),
        ),
    };
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        while track.is_live() {
            ticker.tick().await;
            if let Err(e) = track.write_sample(payload.clone(), period).await {
                warn!("Synthetic {} track {} stalled: {:#}", track.kind(), track.id(), e);
                break;
            }
        }
        debug!("Pump for {} stopped", track.id());
    });
}
