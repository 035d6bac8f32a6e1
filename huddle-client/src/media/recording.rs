use chrono::{DateTime, Utc};
use huddle_core::RoomId;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{HuddleError, Result};
use crate::media::source::MediaSource;
use crate::media::track::{TappedSample, TrackKind};

const MAGIC: &[u8] = b"HREC1\n";

/// `huddle-<room>-<YYYYMMDD-HHMMSS>.hrec`
pub fn recording_file_name(room: &RoomId, started_at: DateTime<Utc>) -> String {
    format!(
        "huddle-{}-{}.hrec",
        room,
        started_at.format("%Y%m%d-%H%M%S")
    )
}

/// Local capture of the outbound stream into a single file.
///
/// Each frame is stored as `kind:u8 | offset_us:u64 LE | len:u32 LE | bytes`
/// after a fixed magic header.
pub struct Recording {
    path: PathBuf,
    follow_tx: mpsc::UnboundedSender<Arc<MediaSource>>,
    stop_tx: oneshot::Sender<()>,
    writer: JoinHandle<io::Result<u64>>,
}

impl Recording {
    pub async fn start(dir: &Path, room: &RoomId, source: &Arc<MediaSource>) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(recording_file_name(room, Utc::now()));
        let file = File::create(&path).await?;

        let (follow_tx, follow_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let writer = tokio::spawn(write_frames(
            BufWriter::new(file),
            source.clone(),
            follow_rx,
            stop_rx,
        ));

        info!("Recording room {} to {}", room, path.display());
        Ok(Self {
            path,
            follow_tx,
            stop_tx,
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Moves the tap onto a replacement source.
    pub fn follow(&self, source: &Arc<MediaSource>) {
        let _ = self.follow_tx.send(source.clone());
    }

    pub async fn stop(self) -> Result<PathBuf> {
        let _ = self.stop_tx.send(());
        let frames = self
            .writer
            .await
            .map_err(|e| HuddleError::Io(io::Error::other(e)))??;
        info!("Recording finalized: {} frame(s) in {}", frames, self.path.display());
        Ok(self.path)
    }
}

fn tap_source(source: &MediaSource) -> Vec<(TrackKind, broadcast::Receiver<TappedSample>)> {
    source
        .tracks()
        .iter()
        .map(|t| (t.kind(), t.subscribe()))
        .collect()
}

fn spawn_forwarders(
    source: &MediaSource,
    frames_tx: &mpsc::UnboundedSender<TappedSample>,
) -> Vec<JoinHandle<()>> {
    tap_source(source)
        .into_iter()
        .map(|(kind, mut rx)| {
            let tx = frames_tx.clone();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(sample) => {
                            if tx.send(sample).is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Recording dropped {} {} sample(s)", n, kind);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        })
        .collect()
}

const FRAME_HEADER_LEN: usize = 13;

fn frame_header(
    kind: TrackKind,
    offset: Duration,
    len: usize,
) -> io::Result<[u8; FRAME_HEADER_LEN]> {
    let len = u32::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} frame of {} bytes does not fit the length field", kind, len),
        )
    })?;
    let offset = u64::try_from(offset.as_micros()).unwrap_or(u64::MAX);

    let mut header = [0u8; FRAME_HEADER_LEN];
    header[0] = match kind {
        TrackKind::Audio => 0,
        TrackKind::Video => 1,
    };
    header[1..9].copy_from_slice(&offset.to_le_bytes());
    header[9..].copy_from_slice(&len.to_le_bytes());
    Ok(header)
}

async fn write_frame(
    out: &mut BufWriter<File>,
    started: Instant,
    sample: &TappedSample,
) -> io::Result<()> {
    let header = frame_header(sample.kind, started.elapsed(), sample.data.len())?;
    out.write_all(&header).await?;
    out.write_all(&sample.data).await
}

async fn write_frames(
    mut out: BufWriter<File>,
    source: Arc<MediaSource>,
    mut follow_rx: mpsc::UnboundedReceiver<Arc<MediaSource>>,
    mut stop_rx: oneshot::Receiver<()>,
) -> io::Result<u64> {
    let started = Instant::now();
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel();
    let mut forwarders = spawn_forwarders(&source, &frames_tx);
    let mut written = 0u64;

    out.write_all(MAGIC).await?;

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,

            next = follow_rx.recv() => {
                let Some(source) = next else { break };
                debug!("Recording now follows source #{}", source.id());
                for task in forwarders.drain(..) {
                    task.abort();
                }
                forwarders = spawn_forwarders(&source, &frames_tx);
            }

            Some(sample) = frames_rx.recv() => {
                write_frame(&mut out, started, &sample).await?;
                written += 1;
            }
        }
    }

    for task in forwarders {
        task.abort();
    }
    while let Ok(sample) = frames_rx.try_recv() {
        write_frame(&mut out, started, &sample).await?;
        written += 1;
    }

    out.flush().await?;
    Ok(written)
}
