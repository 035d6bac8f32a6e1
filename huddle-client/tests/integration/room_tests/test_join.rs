use crate::integration::{init_tracing, test_config};
use crate::utils::{MockConnector, MockTransportFactory, TrackingCapture};
use huddle_client::{HuddleError, RoomSession, SessionDeps};
use huddle_core::RoomId;
use std::sync::Arc;

fn deps(capture: &TrackingCapture, connector: Arc<MockConnector>) -> SessionDeps {
    SessionDeps {
        capture: Arc::new(capture.clone()),
        connector,
        transports: Arc::new(MockTransportFactory::new("a")),
    }
}

#[tokio::test]
async fn test_no_camera_blocks_join() {
    init_tracing();
    let capture = TrackingCapture::new();
    capture.device.set_camera_available(false);
    let connector = MockConnector::new();

    let result = RoomSession::join(
        RoomId::from("room-1"),
        test_config("Alice"),
        deps(&capture, connector.clone()),
    )
    .await;

    assert!(matches!(result, Err(HuddleError::InitialMediaUnavailable(_))));
    assert_eq!(connector.join_count(), 0);
    assert!(capture.opened_tracks().is_empty());
}

#[tokio::test]
async fn test_missing_microphone_still_joins() {
    init_tracing();
    let capture = TrackingCapture::new();
    capture.device.set_microphone_available(false);
    let connector = MockConnector::new();

    let (_session, handle) = RoomSession::join(
        RoomId::from("room-1"),
        test_config("Alice"),
        deps(&capture, connector.clone()),
    )
    .await
    .unwrap();

    let media = handle.snapshot().media;
    assert!(!media.has_audio);
    assert_eq!(capture.live_tracks().len(), 1);
    assert_eq!(connector.join_count(), 1);
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_capture() {
    let capture = TrackingCapture::new();
    let connector = MockConnector::new();
    let mut config = test_config("Alice");
    config.negotiation_timeout_secs = 0;

    let result = RoomSession::join(RoomId::from("room-1"), config, deps(&capture, connector.clone())).await;

    assert!(matches!(result, Err(HuddleError::Config(_))));
    assert!(capture.opened_tracks().is_empty());
    assert_eq!(connector.join_count(), 0);
}
