use anyhow::Result;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    pub const ALL: [TrackKind; 2] = [TrackKind::Audio, TrackKind::Video];

    fn codec(self) -> RTCRtpCodecCapability {
        match self {
            TrackKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            TrackKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// One encoded sample observed on a local track.
#[derive(Debug, Clone)]
pub struct TappedSample {
    pub kind: TrackKind,
    pub data: Bytes,
    pub duration: Duration,
}

/// A captured audio or video track shared read-only by every peer session.
///
/// Disabling a track keeps it attached to every sender but stops samples from
/// reaching the wire. Only the media source manager stops a track.
pub struct LocalTrack {
    id: String,
    kind: TrackKind,
    rtc: Arc<TrackLocalStaticSample>,
    enabled: AtomicBool,
    stopped: AtomicBool,
    tap: broadcast::Sender<TappedSample>,
}

impl LocalTrack {
    pub fn new(kind: TrackKind, id: impl Into<String>, stream_id: impl Into<String>) -> Arc<Self> {
        let id = id.into();
        let rtc = Arc::new(TrackLocalStaticSample::new(
            kind.codec(),
            id.clone(),
            stream_id.into(),
        ));
        let (tap, _) = broadcast::channel(64);

        Arc::new(Self {
            id,
            kind,
            rtc,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
            tap,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn rtc_track(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        self.rtc.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_live(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }

    /// Returns whether the flag changed.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::SeqCst) != enabled
    }

    pub(crate) fn stop(&self) -> bool {
        !self.stopped.swap(true, Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TappedSample> {
        self.tap.subscribe()
    }

    /// Pushes one encoded sample to every attached sender. Returns `false`
    /// when the sample was withheld because the track is muted or stopped.
    pub async fn write_sample(&self, data: Bytes, duration: Duration) -> Result<bool> {
        if !self.is_live() || !self.is_enabled() {
            return Ok(false);
        }

        let _ = self.tap.send(TappedSample {
            kind: self.kind,
            data: data.clone(),
            duration,
        });

        self.rtc
            .write_sample(&Sample {
                data,
                duration,
                ..Default::default()
            })
            .await?;
        Ok(true)
    }
}

impl fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("enabled", &self.is_enabled())
            .field("live", &self.is_live())
            .finish()
    }
}
