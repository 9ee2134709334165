//! In-memory backend tests
//!
//! Queries, the mutation lifecycle and console rendering against the
//! coffee-shop fixture, without a MongoDB server.

use loyalty_rs::{
    error::LoyaltyError,
    mutation::MutationAction,
    report::{render_mutations, render_queries},
    seed,
    store::{HappyHourRecord, LoyaltyDocument, Member},
    LifecyclePlan, LoyaltyStore, MemoryLoyaltyStore, MutationEngine, QueryEngine, QueryThresholds,
};
use mongodb::bson::Bson;
use std::path::PathBuf;
use tokio_test::{assert_err, assert_ok};

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/coffee_shop.json")
}

fn fixture_store() -> MemoryLoyaltyStore {
    let documents = seed::read_fixture(&fixture_path()).expect("fixture should parse");
    let typed = seed::to_loyalty_documents(documents).expect("fixture should map to documents");
    MemoryLoyaltyStore::with_documents(typed)
}

fn store_with(members: Option<Vec<Member>>, records: Vec<HappyHourRecord>) -> MemoryLoyaltyStore {
    MemoryLoyaltyStore::with_documents(vec![LoyaltyDocument {
        member: members,
        happy_hour_member: Some(records),
    }])
}

fn names(members: &[Member]) -> Vec<&str> {
    members.iter().map(|m| m.name.as_str()).collect()
}

#[tokio::test]
async fn test_fixture_queries() {
    let store = fixture_store();
    let engine = QueryEngine::new(&store);

    let average_age = assert_ok!(engine.average_age().await);
    assert!((average_age - 40.8).abs() < 1e-9);

    let seniors = assert_ok!(engine.members_by_level_and_age().await);
    assert_eq!(names(&seniors), vec!["Breton, Robert", "Lamb, Sean"]);

    let spenders = assert_ok!(engine.high_spenders().await);
    let ids: Vec<i32> = spenders.iter().map(|s| s.member_id).collect();
    assert_eq!(ids, vec![3, 4, 5, 9]);
    assert_eq!(spenders[0].name, "Campbell, Jessie");
    assert!((spenders[0].total - 20.90).abs() < 1e-9);

    // Member 11 has no member entry but still counts towards the average
    let average_spend = assert_ok!(engine.average_happy_hour_spend().await);
    assert!((average_spend - 95.24 / 7.0).abs() < 1e-9);

    let long = assert_ok!(engine.long_purchases().await);
    let long: Vec<&str> = long.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(
        long,
        vec![
            "Ashby, Lazale",
            "Breton, Robert",
            "Campbell, Jessie",
            "Cobb, Sedrick",
            "Hayes, Steven",
            "Komisarjevsky, Joshua",
        ]
    );

    let black = assert_ok!(engine.black_card_members().await);
    let ids: Vec<i32> = black.iter().map(|m| m.member_id).collect();
    assert_eq!(ids, vec![1, 3, 4, 9]);
    assert!(black.iter().all(|m| m.membership_card == "Black"));
}

#[tokio::test]
async fn test_custom_thresholds() {
    let store = fixture_store();
    let thresholds = QueryThresholds {
        high_spend_threshold: 20.0,
        card: "White".to_string(),
        ..Default::default()
    };
    let engine = QueryEngine::with_thresholds(&store, thresholds);

    let spenders = assert_ok!(engine.high_spenders().await);
    let ids: Vec<i32> = spenders.iter().map(|s| s.member_id).collect();
    assert_eq!(ids, vec![3, 9]);

    let white = assert_ok!(engine.black_card_members().await);
    assert_eq!(white.len(), 6);
}

#[tokio::test]
async fn test_lifecycle_on_fixture() {
    let store = fixture_store();
    let plan = LifecyclePlan::default();
    let steps = MutationEngine::new(&store).run_lifecycle(&plan).await;

    assert_eq!(steps.len(), 3);
    assert_eq!(
        steps.iter().map(|s| s.action).collect::<Vec<_>>(),
        vec![MutationAction::Insert, MutationAction::Modify, MutationAction::Delete]
    );
    assert!(steps.iter().all(|s| s.outcome.is_ok()));

    let after_insert = steps[0].members_after.as_ref().unwrap();
    assert_eq!(after_insert.len(), 11);
    assert_eq!(after_insert.last(), Some(&plan.member));

    let after_modify = steps[1].members_after.as_ref().unwrap();
    let modified = after_modify
        .iter()
        .find(|m| m.name == plan.member.name)
        .unwrap();
    assert_eq!(modified.time_of_purchase, plan.modified_purchase_time);
    assert_eq!(after_modify[1].time_of_purchase, 41);

    let after_delete = steps[2].members_after.as_ref().unwrap();
    assert_eq!(after_delete.len(), 10);
    assert!(!after_delete.iter().any(|m| m.member_id == plan.member.member_id));

    // Mutations never touch the spend records
    let documents = store.snapshot().await;
    assert_eq!(documents[0].happy_hour_member.as_ref().map(Vec::len), Some(7));
}

#[tokio::test]
async fn test_lifecycle_from_empty_member_array() {
    let store = store_with(Some(vec![]), vec![]);
    let engine = MutationEngine::new(&store);
    let plan = LifecyclePlan::default();

    assert_ok!(engine.insert(&plan.member).await);
    assert_eq!(assert_ok!(engine.display_all().await).len(), 1);

    let outcome = assert_ok!(engine.modify(&plan.member.name, 99).await);
    assert_eq!(outcome.modified_count, 1);
    let members = assert_ok!(engine.display_all().await);
    assert_eq!(members[0].time_of_purchase, 99);

    assert_ok!(engine.delete(99).await);
    assert!(assert_ok!(engine.display_all().await).is_empty());
}

#[tokio::test]
async fn test_insert_then_black_card_query() {
    let store = fixture_store();
    let plan = LifecyclePlan::default();
    assert_ok!(MutationEngine::new(&store).insert(&plan.member).await);

    let black = assert_ok!(QueryEngine::new(&store).black_card_members().await);
    assert!(black.contains(&plan.member));
}

#[tokio::test]
async fn test_failed_steps_do_not_stop_lifecycle() {
    let store = store_with(None, vec![]);
    let steps = MutationEngine::new(&store)
        .run_lifecycle(&LifecyclePlan::default())
        .await;

    assert_eq!(steps.len(), 3);
    for step in &steps {
        assert!(matches!(
            step.outcome,
            Err(LoyaltyError::TargetDocumentMissing(_))
        ));
        assert!(step.members_after.as_ref().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_malformed_amount_fails_only_spend_queries() {
    let store = store_with(
        Some(vec![LifecyclePlan::default().member]),
        vec![HappyHourRecord {
            hh_id: Some(1),
            member_id: 45,
            total_amount: Bson::String("abc".to_string()),
        }],
    );
    let report = QueryEngine::new(&store).run_all().await;

    assert_err!(&report.high_spenders);
    match report.average_happy_hour_spend {
        Err(LoyaltyError::MalformedAmount { member_id, ref raw }) => {
            assert_eq!(member_id, 45);
            assert_eq!(raw, "abc");
        }
        ref other => panic!("expected MalformedAmount, got {:?}", other),
    }
    assert_eq!(report.failures(), 2);
    assert_ok!(&report.average_age);
    assert_ok!(&report.black_card_members);
}

#[tokio::test]
async fn test_empty_store_reports_zero_averages() {
    let store = MemoryLoyaltyStore::new();
    let report = QueryEngine::new(&store).run_all().await;

    assert_eq!(report.failures(), 0);
    assert_eq!(*report.average_age.as_ref().unwrap(), 0.0);
    assert_eq!(*report.average_happy_hour_spend.as_ref().unwrap(), 0.0);
    assert_eq!(store.backend_name(), "memory");
}

#[tokio::test]
async fn test_full_run_output() {
    let store = fixture_store();
    let thresholds = QueryThresholds::default();
    let steps = MutationEngine::new(&store)
        .run_lifecycle(&LifecyclePlan::default())
        .await;
    let report = QueryEngine::with_thresholds(&store, thresholds.clone())
        .run_all()
        .await;

    let mut out = Vec::new();
    render_mutations(&mut out, &steps).unwrap();
    render_queries(&mut out, &report, &thresholds).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains("Member inserted. Members:"));
    assert!(text.contains("Member modified. Members:"));
    assert!(text.contains("Member deleted. Members:"));
    assert!(text.contains("a) Average age: 40.80 years"));
    assert!(text.contains("   - ID: 9 | Name: Lamb, Sean | Total: 20.92"));
    assert!(text.contains("d) Average happy-hour spend: 13.61"));
    assert!(text.find("=== MUTATIONS ===") < text.find("=== QUERIES ==="));
}
