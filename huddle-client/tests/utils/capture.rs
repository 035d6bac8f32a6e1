use async_trait::async_trait;
use huddle_client::CaptureError;
use huddle_client::config::CaptureConstraints;
use huddle_client::media::{
    CaptureDevice, CapturedStream, LocalTrack, MediaSourceKind, SyntheticCapture,
};
use std::sync::{Arc, Mutex};

/// Synthetic capture that keeps a handle on every track it hands out.
#[derive(Clone, Default)]
pub struct TrackingCapture {
    pub device: Arc<SyntheticCapture>,
    opened: Arc<Mutex<Vec<(MediaSourceKind, Arc<LocalTrack>)>>>,
}

impl TrackingCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened_tracks(&self) -> Vec<Arc<LocalTrack>> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn live_tracks(&self) -> Vec<Arc<LocalTrack>> {
        self.opened_tracks()
            .into_iter()
            .filter(|t| t.is_live())
            .collect()
    }

    /// Tracks of the most recent capture.
    pub fn latest_tracks(&self) -> Vec<Arc<LocalTrack>> {
        let opened = self.opened.lock().unwrap();
        let Some(last) = opened.last() else {
            return Vec::new();
        };
        let stream = last.1.id().rsplit('-').next().unwrap_or_default().to_string();
        opened
            .iter()
            .filter(|(k, t)| *k == last.0 && t.id().ends_with(&format!("-{}", stream)))
            .map(|(_, t)| t.clone())
            .collect()
    }
}

#[async_trait]
impl CaptureDevice for TrackingCapture {
    async fn open(
        &self,
        kind: MediaSourceKind,
        constraints: &CaptureConstraints,
    ) -> Result<CapturedStream, CaptureError> {
        let stream = self.device.open(kind, constraints).await?;
        let mut opened = self.opened.lock().unwrap();
        for track in &stream.tracks {
            opened.push((kind, track.clone()));
        }
        Ok(stream)
    }
}
