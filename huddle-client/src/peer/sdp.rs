use std::collections::BTreeSet;

use crate::media::TrackKind;

/// The ICE username fragment of a description. A transport keeps its
/// fragment across renegotiations, so a different one means the remote end
/// is talking from a new transport.
pub fn ice_ufrag(sdp: &str) -> Option<&str> {
    sdp.lines()
        .map(str::trim_end)
        .find_map(|line| line.strip_prefix("a=ice-ufrag:"))
        .filter(|ufrag| !ufrag.is_empty())
}

/// Kinds that have at least one media section in a description.
pub fn media_kinds(sdp: &str) -> BTreeSet<TrackKind> {
    sdp.lines()
        .filter_map(|line| line.strip_prefix("m="))
        .filter_map(|media| match media.split_whitespace().next() {
            Some("audio") => Some(TrackKind::Audio),
            Some("video") => Some(TrackKind::Video),
            _ => None,
        })
        .collect()
}
