mod capture;
mod manager;
mod recording;
mod source;
mod synthetic;
mod track;

pub use capture::{CaptureDevice, CapturedStream};
pub use manager::{MediaSourceManager, SourceEnded, SourceSwap};
pub use recording::{Recording, recording_file_name};
pub use source::{MediaSource, MediaSourceKind};
pub use synthetic::SyntheticCapture;
pub use track::{LocalTrack, TappedSample, TrackKind};
