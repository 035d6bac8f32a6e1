use crate::integration::{init_tracing, room_with_peers, wait_until};
use huddle_client::media::{MediaSourceKind, TrackKind};
use std::time::Duration;

#[tokio::test]
async fn test_mute_survives_source_switch() {
    init_tracing();
    let (client, _connector) = room_with_peers("a", &["b"]).await;

    client.handle.set_microphone(false).await.unwrap();
    client.handle.share_screen().await.unwrap();

    let shared = wait_until(Duration::from_secs(2), || async {
        client.handle.snapshot().media.source == Some(MediaSourceKind::Screen)
    })
    .await;
    assert!(shared);

    let media = client.handle.snapshot().media;
    assert!(!media.audio_enabled);
    assert!(media.video_enabled);
    for track in client.capture.latest_tracks() {
        match track.kind() {
            TrackKind::Audio => assert!(!track.is_enabled()),
            TrackKind::Video => assert!(track.is_enabled()),
        }
    }

    client.handle.stop_screen_share().await.unwrap();
    let audio = client
        .capture
        .latest_tracks()
        .into_iter()
        .find(|t| t.kind() == TrackKind::Audio)
        .unwrap();
    assert!(audio.id().starts_with("camera-"));
    assert!(!audio.is_enabled());

    client.handle.leave().await.unwrap();
}

#[tokio::test]
async fn test_toggle_camera_flips_state() {
    let (client, _connector) = room_with_peers("a", &[]).await;

    client.handle.toggle_camera().await.unwrap();
    let off = wait_until(Duration::from_secs(2), || async {
        !client.handle.snapshot().media.video_enabled
    })
    .await;
    assert!(off);

    client.handle.toggle_camera().await.unwrap();
    let on = wait_until(Duration::from_secs(2), || async {
        client.handle.snapshot().media.video_enabled
    })
    .await;
    assert!(on);

    client.handle.leave().await.unwrap();
}
