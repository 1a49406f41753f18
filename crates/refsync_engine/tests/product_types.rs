//! Detachable references: drafts are synced without the missing part and
//! completed by a later update.

use refsync_engine::{ResourceKey, SyncConfig, TypedKey};
use refsync_testkit::prelude::*;

#[tokio::test]
async fn nested_attribute_is_added_once_target_exists() {
    let harness = ProductTypeHarness::default();
    let stats = harness
        .engine
        .sync([
            vec![ProductTypeDraft::new("shirt", "Shirt")
                .with_attribute("size")
                .with_nested("fabric", "fabric")],
            vec![ProductTypeDraft::new("fabric", "Fabric").with_attribute("weight")],
        ])
        .await;

    assert_eq!(stats.processed(), 2);
    assert_eq!(stats.created(), 2);
    // the follow-up update completes an already counted draft
    assert_eq!(stats.updated(), 0);
    assert_eq!(stats.failed(), 0);
    assert_eq!(harness.remote.calls().update(), 1);

    let shirt = harness.remote.get("shirt").unwrap();
    assert!(shirt.attribute("size").is_some());
    assert_eq!(
        shirt.attribute("fabric").unwrap().reference,
        harness.remote.id_of("fabric")
    );
    assert!(harness.recorder.warnings().is_empty());
    assert!(stats.waiting().is_empty());
}

#[tokio::test]
async fn existing_target_is_linked_on_create() {
    let harness = ProductTypeHarness::default();
    harness.remote.seed(&ProductTypeDraft::new("fabric", "Fabric"));

    let stats = harness
        .engine
        .sync([vec![ProductTypeDraft::new("shirt", "Shirt").with_nested("fabric", "fabric")]])
        .await;

    assert_eq!(stats.created(), 1);
    assert_eq!(harness.remote.calls().update(), 0);
    assert_eq!(
        harness.remote.get("shirt").unwrap().attribute("fabric").unwrap().reference,
        harness.remote.id_of("fabric")
    );
}

#[tokio::test]
async fn target_later_in_the_same_batch() {
    let harness = ProductTypeHarness::new(SyncConfig::new().with_max_parallel_requests(1));
    let stats = harness
        .engine
        .sync([vec![
            ProductTypeDraft::new("shirt", "Shirt").with_nested("fabric", "fabric"),
            ProductTypeDraft::new("fabric", "Fabric"),
        ]])
        .await;

    assert_eq!(stats.processed(), 2);
    assert_eq!(stats.created(), 2);
    assert_eq!(
        harness.remote.get("shirt").unwrap().attribute("fabric").unwrap().reference,
        harness.remote.id_of("fabric")
    );
}

#[tokio::test]
async fn unchanged_resource_still_gets_completed() {
    let harness = ProductTypeHarness::default();
    harness
        .remote
        .seed(&ProductTypeDraft::new("shirt", "Shirt").with_attribute("size"));

    let stats = harness
        .engine
        .sync([
            vec![ProductTypeDraft::new("shirt", "Shirt")
                .with_attribute("size")
                .with_nested("fabric", "fabric")],
            vec![ProductTypeDraft::new("fabric", "Fabric")],
        ])
        .await;

    assert_eq!(stats.processed(), 2);
    assert_eq!(stats.unchanged(), 1);
    assert_eq!(stats.created(), 1);
    assert_eq!(stats.updated(), 0);
    assert!(harness
        .remote
        .get("shirt")
        .unwrap()
        .attribute("fabric")
        .is_some());
}

#[tokio::test]
async fn never_resolved_target_is_a_warning() {
    let harness = ProductTypeHarness::default();
    let stats = harness
        .engine
        .sync([vec![ProductTypeDraft::new("shirt", "Shirt")
            .with_attribute("size")
            .with_nested("fabric", "fabric")]])
        .await;

    assert_eq!(stats.processed(), 1);
    assert_eq!(stats.created(), 1);
    assert_eq!(stats.failed(), 0);
    assert!(harness.recorder.errors().is_empty());

    let warnings = harness.recorder.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].key, Some(ResourceKey::from("shirt")));
    assert!(warnings[0]
        .message
        .contains("product type with key 'fabric' referenced by field 'attributes[fabric]' doesn't exist."));

    assert_eq!(
        stats.waiting_on(&TypedKey::new(PRODUCT_TYPE, "fabric")),
        [ResourceKey::from("shirt")]
    );
    assert_eq!(
        stats.report_message(),
        "Summary: 1 product types were processed in total (1 created, 0 updated, 0 failed to sync and 1 product types with at least one reference to a missing key)."
    );
    assert!(harness.remote.get("shirt").unwrap().attribute("fabric").is_none());
}

#[tokio::test]
async fn fragment_of_a_missing_resource_is_dropped() {
    let harness = ProductTypeHarness::default();
    harness.remote.soft_fail_create("shirt");

    let stats = harness
        .engine
        .sync([
            vec![ProductTypeDraft::new("shirt", "Shirt").with_nested("fabric", "fabric")],
            vec![ProductTypeDraft::new("fabric", "Fabric")],
        ])
        .await;

    assert_eq!(stats.processed(), 2);
    assert_eq!(stats.failed(), 1);
    assert_eq!(stats.created(), 1);
    assert_eq!(harness.remote.calls().update(), 0);
    assert!(harness.recorder.warnings().is_empty());
    assert_eq!(harness.recorder.errors().len(), 1);
}

#[tokio::test]
async fn evicted_nested_targets_are_warmed_again() {
    let harness = ProductTypeHarness::new(SyncConfig::new().with_cache_capacity(2));
    for key in ["f1", "f2", "f3"] {
        harness.remote.seed(&ProductTypeDraft::new(key, key));
    }

    let stats = harness
        .engine
        .sync([vec![ProductTypeDraft::new("shirt", "Shirt")
            .with_nested("a1", "f1")
            .with_nested("a2", "f2")
            .with_nested("a3", "f3")]])
        .await;

    assert_eq!(stats.created(), 1);
    assert_eq!(harness.remote.calls().update(), 0);
    assert!(harness.recorder.warnings().is_empty());
    let shirt = harness.remote.get("shirt").unwrap();
    for (attribute, target) in [("a1", "f1"), ("a2", "f2"), ("a3", "f3")] {
        assert_eq!(
            shirt.attribute(attribute).unwrap().reference,
            harness.remote.id_of(target)
        );
    }
}
