use crate::integration::{RegistryHarness, init_tracing, pid, remote_sdp};
use huddle_client::peer::{LinkState, NegotiationState, Polarity};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test]
async fn test_initiator_retries_once_then_stays_failed() {
    init_tracing();
    let mut h = RegistryHarness::new("a").await;
    h.factory.fail_offers_to(&pid("b")).await;

    h.join("b").await;

    assert_eq!(h.factory.created_for(&pid("b")).await.len(), 2);
    let view = h.registry.view().get(&pid("b")).unwrap();
    assert_eq!(view.state, NegotiationState::Failed);
    assert!(view.failure.unwrap().contains("offer generation failed"));
    assert!(h.signaling.offers_to(&pid("b")).await.is_empty());

    // Failed sessions stay visible and no further attempt is made.
    h.pump().await;
    assert_eq!(h.registry.len(), 1);
    assert_eq!(h.registry.live_count(), 0);
    assert_eq!(h.factory.created_for(&pid("b")).await.len(), 2);
}

#[tokio::test]
async fn test_retry_budget_resets_after_leave() {
    let mut h = RegistryHarness::new("a").await;
    h.factory.fail_offers_to(&pid("b")).await;

    h.join("b").await;
    h.registry.on_participant_left(&pid("b")).await;
    h.join("b").await;

    assert_eq!(h.factory.created_for(&pid("b")).await.len(), 4);
}

#[tokio::test]
async fn test_responder_failure_is_persistent() {
    init_tracing();
    let mut h = RegistryHarness::new("b").await;
    h.join("a").await;
    assert_eq!(
        h.registry.session(&pid("a")).unwrap().polarity(),
        Polarity::Responder
    );

    h.offer_from("a", &remote_sdp("offer:a->b#1", "a-1")).await;
    h.pump().await;
    assert_eq!(h.registry.state_of(&pid("a")), Some(NegotiationState::Connected));

    h.factory.emit_link_state(&pid("a"), LinkState::Failed).await;
    h.pump().await;

    assert_eq!(h.registry.state_of(&pid("a")), Some(NegotiationState::Failed));
    assert_eq!(h.factory.created_for(&pid("a")).await.len(), 1);
    assert!(h.signaling.offers_to(&pid("a")).await.is_empty());
}

#[tokio::test]
async fn test_offer_revives_failed_session() {
    let mut h = RegistryHarness::new("b").await;
    h.join("a").await;
    h.offer_from("a", &remote_sdp("offer:a->b#1", "a-1")).await;
    h.factory.emit_link_state(&pid("a"), LinkState::Failed).await;
    h.pump().await;

    h.offer_from("a", &remote_sdp("offer:a->b#2", "a-2")).await;

    let session = h.registry.session(&pid("a")).unwrap();
    assert_eq!(session.state(), NegotiationState::Connected);
    assert_eq!(h.factory.created_for(&pid("a")).await.len(), 2);
    assert_eq!(h.signaling.answers_to(&pid("a")).await.len(), 2);
}

#[tokio::test]
async fn test_unanswered_offer_times_out() {
    init_tracing();
    let mut h = RegistryHarness::new("a").await;
    h.join("b").await;

    let early = h.registry.expire_stalled(Instant::now(), None).await;
    assert!(early.is_empty());

    let expired = h
        .registry
        .expire_stalled(Instant::now() + Duration::from_secs(16), None)
        .await;
    assert_eq!(expired, vec![pid("b")]);
    // The retry is a fresh offer on a new transport.
    assert_eq!(h.registry.state_of(&pid("b")), Some(NegotiationState::AwaitingAnswer));
    assert_eq!(h.signaling.offers_to(&pid("b")).await.len(), 2);

    let expired = h
        .registry
        .expire_stalled(Instant::now() + Duration::from_secs(16), None)
        .await;
    assert_eq!(expired, vec![pid("b")]);
    let view = h.registry.view().get(&pid("b")).unwrap();
    assert_eq!(view.state, NegotiationState::Failed);
    assert!(view.failure.unwrap().contains("no answer within 15s"));
}

#[tokio::test]
async fn test_connected_session_never_times_out() {
    let mut h = RegistryHarness::new("a").await;
    h.join("b").await;
    h.answer_from("b", "answer:b").await;

    let expired = h
        .registry
        .expire_stalled(Instant::now() + Duration::from_secs(3600), None)
        .await;

    assert!(expired.is_empty());
    assert_eq!(h.registry.state_of(&pid("b")), Some(NegotiationState::Connected));
}
