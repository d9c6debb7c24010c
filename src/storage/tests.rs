//! Parameterized tests for organization stores.
//!
//! This module contains tests that work with any OrganizationStorage
//! implementation, so every backend is held to the same contract.

use super::{
    DeleteOutcome, InsertOutcome, OrganizationStorage, ScanRequest, ScanScope, UpdateOutcome,
};
use crate::filter::Filter;
use crate::model::{Organization, SortOrder};
use crate::pagination::{Position, SortKey};
use crate::tenant::TenantBinding;
use chrono::{Duration, TimeZone, Utc};

/// Test suite for any OrganizationStorage implementation.
///
/// This function contains all the tests that should pass for any correct
/// implementation of the OrganizationStorage trait.
pub async fn test_storage_provider<S>(storage: S)
where
    S: OrganizationStorage,
{
    test_insert_and_get(&storage).await;
    test_get_nonexistent(&storage).await;
    test_insert_rejections(&storage).await;
    test_parent_links(&storage).await;
    test_find_by_name(&storage).await;
    test_versioned_update(&storage).await;
    test_reparent_validation(&storage).await;
    test_delete(&storage).await;
    test_delete_with_children(&storage).await;
    test_tenant_bindings(&storage).await;
    test_scan_scopes(&storage).await;
    test_scan_ordering_and_bounds(&storage).await;
    test_scan_filter(&storage).await;
    test_stats(&storage).await;
}

fn org(id: &str, parent: Option<&str>, offset: i64) -> Organization {
    let mut org = Organization::new(format!("Org {}", id));
    org.id = id.to_string();
    org.parent_id = parent.map(str::to_string);
    org.created = Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(offset);
    org
}

fn binding(id: &str, tenant_id: i64) -> TenantBinding {
    TenantBinding::new(id, format!("{}.example", id), tenant_id)
}

async fn put<S: OrganizationStorage>(storage: &S, org: Organization, tenant_id: i64) {
    let id = org.id.clone();
    let outcome = storage.insert(org, binding(&id, tenant_id)).await.unwrap();
    assert!(
        matches!(outcome, InsertOutcome::Inserted(_)),
        "insert of {} failed: {:?}",
        id,
        outcome
    );
}

/// root
/// ├── a
/// │   └── a1
/// └── b
async fn seed_tree<S: OrganizationStorage>(storage: &S) {
    storage.clear().await.unwrap();
    put(storage, org("root", None, 0), 1).await;
    put(storage, org("a", Some("root"), 1), 2).await;
    put(storage, org("b", Some("root"), 2), 3).await;
    put(storage, org("a1", Some("a"), 3), 4).await;
}

fn scan(scope: ScanScope) -> ScanRequest {
    ScanRequest {
        scope,
        filter: None,
        sort_key: SortKey::Created,
        order: SortOrder::Ascending,
        after: None,
        limit: 100,
    }
}

fn ids(orgs: &[Organization]) -> Vec<&str> {
    orgs.iter().map(|o| o.id.as_str()).collect()
}

async fn test_insert_and_get<S: OrganizationStorage>(storage: &S) {
    storage.clear().await.unwrap();
    let root = org("root", None, 0).with_attribute("region", "EU");

    let outcome = storage.insert(root.clone(), binding("root", 1)).await.unwrap();
    let stored = match outcome {
        InsertOutcome::Inserted(stored) => stored,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(stored.version, 1);
    assert_eq!(stored.attribute("region"), Some("EU"));

    let retrieved = storage.get("root").await.unwrap().unwrap();
    assert_eq!(retrieved, stored);
    assert!(storage.exists("root").await.unwrap());
}

async fn test_get_nonexistent<S: OrganizationStorage>(storage: &S) {
    storage.clear().await.unwrap();
    assert!(storage.get("missing").await.unwrap().is_none());
    assert!(!storage.exists("missing").await.unwrap());
    assert!(storage.parent_id("missing").await.unwrap().is_none());
    assert!(storage.child_ids("missing").await.unwrap().is_empty());
}

async fn test_insert_rejections<S: OrganizationStorage>(storage: &S) {
    storage.clear().await.unwrap();
    put(storage, org("root", None, 0), 1).await;

    let outcome = storage
        .insert(org("root", None, 1), binding("root", 2))
        .await
        .unwrap();
    assert_eq!(outcome, InsertOutcome::DuplicateId);

    let outcome = storage
        .insert(org("orphan", Some("nowhere"), 1), binding("orphan", 3))
        .await
        .unwrap();
    assert_eq!(outcome, InsertOutcome::ParentMissing);
    assert!(!storage.exists("orphan").await.unwrap());

    // Numeric tenant id already taken
    let outcome = storage
        .insert(org("other", None, 1), binding("other", 1))
        .await
        .unwrap();
    assert!(matches!(outcome, InsertOutcome::TenantConflict { .. }));
    assert!(!storage.exists("other").await.unwrap());

    // Domain already taken
    let outcome = storage
        .insert(
            org("other", None, 1),
            TenantBinding::new("other", "root.example", 9),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, InsertOutcome::TenantConflict { .. }));
}

async fn test_parent_links<S: OrganizationStorage>(storage: &S) {
    seed_tree(storage).await;

    assert_eq!(storage.parent_id("root").await.unwrap(), Some(None));
    assert_eq!(
        storage.parent_id("a1").await.unwrap(),
        Some(Some("a".to_string()))
    );
    assert_eq!(
        storage.child_ids("root").await.unwrap(),
        vec!["a".to_string(), "b".to_string()]
    );
    let children = storage.children("a").await.unwrap();
    assert_eq!(ids(&children), vec!["a1"]);
    assert!(storage.child_ids("b").await.unwrap().is_empty());
}

async fn test_find_by_name<S: OrganizationStorage>(storage: &S) {
    storage.clear().await.unwrap();
    let mut first = org("x", None, 5);
    first.name = "Shared".to_string();
    let mut second = org("y", None, 1);
    second.name = "Shared".to_string();
    put(storage, first, 1).await;
    put(storage, second, 2).await;
    put(storage, org("z", None, 3), 3).await;

    let found = storage.find_by_name("Shared").await.unwrap();
    assert_eq!(ids(&found), vec!["y", "x"]);
    assert!(storage.find_by_name("shared").await.unwrap().is_empty());
}

async fn test_versioned_update<S: OrganizationStorage>(storage: &S) {
    seed_tree(storage).await;

    let mut changed = storage.get("a").await.unwrap().unwrap();
    let created = changed.created;
    changed.name = "Renamed".to_string();
    changed.created = created + Duration::days(1);

    let outcome = storage.update(changed.clone(), 1).await.unwrap();
    let stored = match outcome {
        UpdateOutcome::Updated(stored) => stored,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(stored.version, 2);
    assert_eq!(stored.name, "Renamed");
    assert_eq!(stored.created, created);

    // Stale version
    let outcome = storage.update(changed.clone(), 1).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::VersionMismatch { actual: 2 });

    let mut ghost = org("ghost", None, 0);
    ghost.version = 1;
    assert_eq!(
        storage.update(ghost, 1).await.unwrap(),
        UpdateOutcome::NotFound
    );
}

async fn test_reparent_validation<S: OrganizationStorage>(storage: &S) {
    seed_tree(storage).await;

    // Under own descendant
    let mut a = storage.get("a").await.unwrap().unwrap();
    a.parent_id = Some("a1".to_string());
    assert_eq!(
        storage.update(a.clone(), 1).await.unwrap(),
        UpdateOutcome::CycleDetected
    );

    // Under itself
    a.parent_id = Some("a".to_string());
    assert_eq!(
        storage.update(a.clone(), 1).await.unwrap(),
        UpdateOutcome::CycleDetected
    );

    a.parent_id = Some("nowhere".to_string());
    assert_eq!(
        storage.update(a, 1).await.unwrap(),
        UpdateOutcome::ParentMissing
    );

    // Valid move: a1 from a to b
    let before = storage.structure_version().await.unwrap();
    let mut a1 = storage.get("a1").await.unwrap().unwrap();
    a1.parent_id = Some("b".to_string());
    assert!(matches!(
        storage.update(a1, 1).await.unwrap(),
        UpdateOutcome::Updated(_)
    ));
    assert!(storage.structure_version().await.unwrap() > before);
    assert!(storage.child_ids("a").await.unwrap().is_empty());
    assert_eq!(
        storage.child_ids("b").await.unwrap(),
        vec!["a1".to_string()]
    );
}

async fn test_delete<S: OrganizationStorage>(storage: &S) {
    seed_tree(storage).await;

    let outcome = storage.delete("a1").await.unwrap();
    assert!(matches!(outcome, DeleteOutcome::Deleted(ref o) if o.id == "a1"));
    assert!(!storage.exists("a1").await.unwrap());
    assert!(storage.child_ids("a").await.unwrap().is_empty());

    assert_eq!(storage.delete("a1").await.unwrap(), DeleteOutcome::NotFound);
}

async fn test_delete_with_children<S: OrganizationStorage>(storage: &S) {
    seed_tree(storage).await;

    let outcome = storage.delete("root").await.unwrap();
    assert_eq!(outcome, DeleteOutcome::HasChildren { count: 2 });
    assert!(storage.exists("root").await.unwrap());
    assert_eq!(storage.child_ids("root").await.unwrap().len(), 2);
    assert!(storage.tenant_binding("root").await.unwrap().is_some());
}

async fn test_tenant_bindings<S: OrganizationStorage>(storage: &S) {
    seed_tree(storage).await;

    let binding = storage.tenant_binding("a").await.unwrap().unwrap();
    assert_eq!(binding.tenant_domain, "a.example");
    assert_eq!(binding.tenant_id, 2);
    assert_eq!(
        storage.organization_for_domain("a.example").await.unwrap(),
        Some("a".to_string())
    );
    assert_eq!(
        storage.organization_for_tenant_id(2).await.unwrap(),
        Some("a".to_string())
    );

    storage.delete("b").await.unwrap();
    assert!(storage.tenant_binding("b").await.unwrap().is_none());
    assert!(storage.organization_for_domain("b.example").await.unwrap().is_none());
    assert!(storage.organization_for_tenant_id(3).await.unwrap().is_none());
}

async fn test_scan_scopes<S: OrganizationStorage>(storage: &S) {
    seed_tree(storage).await;
    put(storage, org("other", None, 10), 10).await;

    let roots = storage.scan(scan(ScanScope::Roots)).await.unwrap();
    assert_eq!(ids(&roots), vec!["root", "other"]);

    let all = storage.scan(scan(ScanScope::All)).await.unwrap();
    assert_eq!(all.len(), 5);

    let children = storage
        .scan(scan(ScanScope::ChildrenOf("root".to_string())))
        .await
        .unwrap();
    assert_eq!(ids(&children), vec!["a", "b"]);

    let descendants = storage
        .scan(scan(ScanScope::DescendantsOf("root".to_string())))
        .await
        .unwrap();
    assert_eq!(ids(&descendants), vec!["a", "b", "a1"]);

    let none = storage
        .scan(scan(ScanScope::ChildrenOf("missing".to_string())))
        .await
        .unwrap();
    assert!(none.is_empty());
}

async fn test_scan_ordering_and_bounds<S: OrganizationStorage>(storage: &S) {
    seed_tree(storage).await;

    let mut request = scan(ScanScope::All);
    request.order = SortOrder::Descending;
    request.limit = 2;
    let first = storage.scan(request.clone()).await.unwrap();
    assert_eq!(ids(&first), vec!["a1", "b"]);

    request.after = Some(Position::of(&first[1], SortKey::Created));
    let second = storage.scan(request.clone()).await.unwrap();
    assert_eq!(ids(&second), vec!["a", "root"]);

    request.after = Some(Position::of(&second[1], SortKey::Created));
    assert!(storage.scan(request.clone()).await.unwrap().is_empty());

    let mut by_name = scan(ScanScope::All);
    by_name.sort_key = SortKey::Name;
    let sorted = storage.scan(by_name).await.unwrap();
    assert_eq!(ids(&sorted), vec!["a", "a1", "b", "root"]);

    let mut empty = scan(ScanScope::All);
    empty.limit = 0;
    assert!(storage.scan(empty).await.unwrap().is_empty());
}

async fn test_scan_filter<S: OrganizationStorage>(storage: &S) {
    seed_tree(storage).await;

    let mut request = scan(ScanScope::All);
    request.filter = Some(Filter::parse("parentId eq \"root\"").unwrap());
    let matched = storage.scan(request).await.unwrap();
    assert_eq!(ids(&matched), vec!["a", "b"]);
}

async fn test_stats<S: OrganizationStorage>(storage: &S) {
    seed_tree(storage).await;

    let stats = storage.stats().await.unwrap();
    assert_eq!(stats.organization_count, 4);
    assert_eq!(stats.root_count, 1);
    assert_eq!(stats.tenant_binding_count, 4);

    storage.clear().await.unwrap();
    let stats = storage.stats().await.unwrap();
    assert_eq!(stats.organization_count, 0);
    assert_eq!(stats.tenant_binding_count, 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    #[tokio::test]
    async fn test_in_memory_storage() {
        let storage = InMemoryStorage::new();
        test_storage_provider(storage).await;
    }
}
