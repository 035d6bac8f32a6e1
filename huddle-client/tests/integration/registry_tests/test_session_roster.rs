use crate::integration::{RegistryHarness, pid};
use proptest::prelude::*;
use std::collections::BTreeSet;

const LOCAL: &str = "p3";

#[derive(Debug, Clone)]
enum RosterOp {
    Join(u8),
    Leave(u8),
}

fn roster_op() -> impl Strategy<Value = RosterOp> {
    prop_oneof![
        (0u8..6).prop_map(RosterOp::Join),
        (0u8..6).prop_map(RosterOp::Leave),
    ]
}

async fn apply(ops: Vec<RosterOp>) -> Result<(), TestCaseError> {
    let mut h = RegistryHarness::new(LOCAL).await;
    let mut expected = BTreeSet::new();

    for op in ops {
        match op {
            RosterOp::Join(n) => {
                let id = format!("p{}", n);
                h.join(&id).await;
                if id != LOCAL {
                    expected.insert(pid(&id));
                }
            }
            RosterOp::Leave(n) => {
                let id = pid(&format!("p{}", n));
                h.registry.on_participant_left(&id).await;
                expected.remove(&id);
            }
        }
        h.pump().await;

        let expected_ids: Vec<_> = expected.iter().cloned().collect();
        prop_assert_eq!(h.registry.participants(), expected_ids.clone());
        prop_assert_eq!(h.registry.view().list_users(), expected_ids);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn sessions_track_the_roster(ops in prop::collection::vec(roster_op(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(apply(ops))?;
    }
}

#[tokio::test]
async fn test_duplicate_join_keeps_one_session() {
    crate::integration::init_tracing();
    let mut h = RegistryHarness::new("a").await;

    h.join("b").await;
    h.join("b").await;
    h.join("b").await;

    assert_eq!(h.registry.len(), 1);
    assert_eq!(h.factory.created_for(&pid("b")).await.len(), 1);
    assert_eq!(h.signaling.offers_to(&pid("b")).await.len(), 1);
}

#[tokio::test]
async fn test_self_join_is_ignored() {
    let mut h = RegistryHarness::new("a").await;

    h.join("a").await;

    assert!(h.registry.is_empty());
    assert!(h.factory.all().await.is_empty());
}

#[tokio::test]
async fn test_leave_closes_transport() {
    let mut h = RegistryHarness::new("a").await;
    h.join("b").await;
    let transport = h.factory.latest(&pid("b")).await.unwrap();

    h.registry.on_participant_left(&pid("b")).await;

    assert!(transport.state.lock().await.closed);
    assert!(h.registry.view().get(&pid("b")).is_none());
}
