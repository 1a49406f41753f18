//! Version conflicts, refetches and chunked updates.

use refsync_engine::{RemoteError, SyncConfig, CONFLICT_RETRIES};
use refsync_testkit::prelude::*;

fn seeded(config: SyncConfig) -> CategoryHarness {
    let harness = CategoryHarness::new(config);
    harness.remote.seed(&CategoryDraft::new("c1", "Old"));
    harness
}

#[tokio::test]
async fn single_conflict_is_retried() {
    let harness = seeded(SyncConfig::default());
    harness.remote.conflict_on_next_updates(1);

    let stats = harness
        .engine
        .sync([vec![CategoryDraft::new("c1", "New")]])
        .await;

    assert_eq!(CONFLICT_RETRIES, 1);
    assert_eq!(stats.updated(), 1);
    assert_eq!(stats.failed(), 0);
    assert_eq!(harness.remote.calls().update(), 2);
    assert_eq!(harness.remote.calls().fetch_by_id(), 1);
    assert_eq!(harness.remote.get("c1").unwrap().name, "New");
}

#[tokio::test]
async fn second_conflict_fails_the_draft() {
    let harness = seeded(SyncConfig::default());
    harness.remote.conflict_on_next_updates(2);

    let stats = harness
        .engine
        .sync([vec![CategoryDraft::new("c1", "New")]])
        .await;

    assert_eq!(stats.failed(), 1);
    assert_eq!(stats.updated(), 0);
    assert_eq!(harness.remote.calls().update(), 2);
    assert_eq!(harness.remote.calls().fetch_by_id(), 1);

    let report = &harness.recorder.errors_for("c1")[0];
    assert!(report
        .message
        .starts_with("Failed to update category with key: 'c1'. Reason: concurrent modification"));
    assert!(report.had_old_resource);
    assert_eq!(report.operations, 1);
    assert_eq!(harness.remote.get("c1").unwrap().name, "Old");
}

#[tokio::test]
async fn failed_refetch_is_reported() {
    let harness = seeded(SyncConfig::default());
    harness.remote.conflict_on_next_updates(1);
    harness
        .remote
        .fail_fetch_by_id(Some(RemoteError::transient(500, "internal")));

    let stats = harness
        .engine
        .sync([vec![CategoryDraft::new("c1", "New")]])
        .await;

    assert_eq!(stats.failed(), 1);
    assert_eq!(harness.remote.calls().update(), 1);
    assert_eq!(
        harness.recorder.error_messages(),
        ["Failed to update category with key: 'c1'. Reason: Failed to fetch from CTP while retrying after concurrency modification."]
    );
    assert!(harness.recorder.errors()[0].has_cause);
}

#[tokio::test]
async fn resource_gone_on_refetch_is_reported() {
    let harness = seeded(SyncConfig::default());
    harness.remote.conflict_on_next_updates(1);
    harness.remote.lose_on_refetch(true);

    let stats = harness
        .engine
        .sync([vec![CategoryDraft::new("c1", "New")]])
        .await;

    assert_eq!(stats.failed(), 1);
    let report = &harness.recorder.errors()[0];
    assert_eq!(
        report.message,
        "Failed to update category with key: 'c1'. Reason: Not found when attempting to fetch while retrying after concurrency modification."
    );
    assert!(report.had_old_resource);
    assert!(!report.has_cause);
}

#[tokio::test]
async fn other_update_failures_are_not_retried() {
    let harness = seeded(SyncConfig::default());
    harness
        .remote
        .fail_updates(Some(RemoteError::Rejected("invalid name".into())));

    let stats = harness
        .engine
        .sync([vec![CategoryDraft::new("c1", "New")]])
        .await;

    assert_eq!(stats.failed(), 1);
    assert_eq!(harness.remote.calls().update(), 1);
    assert_eq!(harness.remote.calls().fetch_by_id(), 0);
    assert!(!harness.recorder.errors()[0].transient);
}

#[tokio::test]
async fn large_updates_are_sent_in_chunks() {
    let harness = seeded(SyncConfig::new().with_max_update_actions(1));
    harness.remote.seed(&CategoryDraft::new("root", "Root"));

    let stats = harness
        .engine
        .sync([vec![CategoryDraft::new("c1", "New").with_parent("root")]])
        .await;

    assert_eq!(stats.updated(), 1);
    assert_eq!(harness.remote.update_sizes(), [1, 1]);
    let stored = harness.remote.get("c1").unwrap();
    assert_eq!(stored.name, "New");
    assert_eq!(stored.parent, harness.remote.id_of("root"));
    assert_eq!(stored.version.as_u64(), 3);
}

#[tokio::test]
async fn updates_within_the_limit_use_one_call() {
    let harness = seeded(SyncConfig::default());
    harness.remote.seed(&CategoryDraft::new("root", "Root"));

    harness
        .engine
        .sync([vec![CategoryDraft::new("c1", "New").with_parent("root")]])
        .await;

    assert_eq!(harness.remote.update_sizes(), [2]);
}
