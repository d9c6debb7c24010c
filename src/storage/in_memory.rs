//! In-memory storage implementation for organizations.
//!
//! This module provides a thread-safe in-memory implementation of the
//! `OrganizationStorage` trait using HashMaps behind a single tokio `RwLock`.
//! It's designed for testing, development, and scenarios where persistence is
//! not required.
//!
//! # Features
//!
//! * Thread-safe concurrent access with async RwLock
//! * Every operation runs inside one critical section, so readers always see
//!   a consistent tree
//! * Child index ordered by (created, id) for deterministic child listings
//! * Tenant bindings indexed by organization, domain and numeric id
//!
//! # Performance Characteristics
//!
//! * GET/EXISTS/PARENT_ID: O(1) average case
//! * CHILD_IDS: O(k) in the number of children
//! * UPDATE with re-parent: O(d) in the depth of the new parent
//! * SCAN: O(n log n) over the scope being listed
//! * FIND_BY_NAME: O(n)

use crate::model::Organization;
use crate::pagination::{compare_organizations, is_past};
use crate::storage::{
    DeleteOutcome, InsertOutcome, OrganizationStorage, ScanRequest, ScanScope, StorageError,
    StorageResult, StorageStats, UpdateOutcome,
};
use crate::tenant::TenantBinding;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

type ChildKey = (DateTime<Utc>, String);

#[derive(Default)]
struct Tables {
    organizations: HashMap<String, Organization>,
    // parent id -> children ordered by (created, id)
    children: HashMap<String, BTreeSet<ChildKey>>,
    bindings: HashMap<String, TenantBinding>,
    domains: HashMap<String, String>,
    tenant_ids: HashMap<i64, String>,
    structure_version: u64,
}

impl Tables {
    fn child_key(org: &Organization) -> ChildKey {
        (org.created, org.id.clone())
    }

    fn link_child(&mut self, parent_id: &str, org: &Organization) {
        self.children
            .entry(parent_id.to_string())
            .or_default()
            .insert(Self::child_key(org));
    }

    fn unlink_child(&mut self, parent_id: &str, org: &Organization) {
        if let Some(set) = self.children.get_mut(parent_id) {
            set.remove(&Self::child_key(org));
            if set.is_empty() {
                self.children.remove(parent_id);
            }
        }
    }

    fn child_ids(&self, id: &str) -> Vec<String> {
        self.children
            .get(id)
            .map(|set| set.iter().map(|(_, child)| child.clone()).collect())
            .unwrap_or_default()
    }

    /// Whether `ancestor` appears on the parent chain of `id` (or is `id`).
    fn chain_contains(&self, id: &str, ancestor: &str) -> StorageResult<bool> {
        let mut visited = HashSet::new();
        let mut current = Some(id.to_string());
        while let Some(node) = current {
            if node == ancestor {
                return Ok(true);
            }
            if !visited.insert(node.clone()) {
                return Err(StorageError::data_corruption(
                    node,
                    "parent chain contains a cycle",
                ));
            }
            current = self
                .organizations
                .get(&node)
                .and_then(|org| org.parent_id.clone());
        }
        Ok(false)
    }

    fn descendant_ids(&self, id: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<String> = self.child_ids(id).into();
        while let Some(next) = queue.pop_front() {
            if !visited.insert(next.clone()) {
                continue;
            }
            queue.extend(self.child_ids(&next));
            result.push(next);
        }
        result
    }

    fn resolve(&self, ids: Vec<String>) -> StorageResult<Vec<&Organization>> {
        ids.into_iter()
            .map(|id| {
                self.organizations.get(&id).ok_or_else(|| {
                    StorageError::data_corruption(id, "child index points at a missing record")
                })
            })
            .collect()
    }
}

/// Thread-safe in-memory organization store.
///
/// Cloning is cheap and clones share the same tables.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStorage {
    /// Create a new empty in-memory storage instance.
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrganizationStorage for InMemoryStorage {
    async fn insert(
        &self,
        organization: Organization,
        binding: TenantBinding,
    ) -> StorageResult<InsertOutcome> {
        let mut tables = self.tables.write().await;

        if tables.organizations.contains_key(&organization.id) {
            return Ok(InsertOutcome::DuplicateId);
        }
        if let Some(parent_id) = &organization.parent_id {
            if !tables.organizations.contains_key(parent_id) {
                return Ok(InsertOutcome::ParentMissing);
            }
        }
        if binding.organization_id != organization.id {
            return Ok(InsertOutcome::TenantConflict {
                detail: format!(
                    "binding names organization '{}'",
                    binding.organization_id
                ),
            });
        }
        if tables.bindings.contains_key(&organization.id) {
            return Ok(InsertOutcome::TenantConflict {
                detail: "organization already bound".to_string(),
            });
        }
        if let Some(owner) = tables.domains.get(&binding.tenant_domain) {
            return Ok(InsertOutcome::TenantConflict {
                detail: format!(
                    "domain '{}' bound to '{}'",
                    binding.tenant_domain, owner
                ),
            });
        }
        if let Some(owner) = tables.tenant_ids.get(&binding.tenant_id) {
            return Ok(InsertOutcome::TenantConflict {
                detail: format!("tenant id {} bound to '{}'", binding.tenant_id, owner),
            });
        }

        let mut stored = organization.without_projections();
        stored.version = 1;

        if let Some(parent_id) = stored.parent_id.clone() {
            tables.link_child(&parent_id, &stored);
        }
        tables
            .domains
            .insert(binding.tenant_domain.clone(), stored.id.clone());
        tables
            .tenant_ids
            .insert(binding.tenant_id, stored.id.clone());
        tables.bindings.insert(stored.id.clone(), binding);
        tables
            .organizations
            .insert(stored.id.clone(), stored.clone());
        tables.structure_version += 1;

        Ok(InsertOutcome::Inserted(stored))
    }

    async fn get(&self, id: &str) -> StorageResult<Option<Organization>> {
        let tables = self.tables.read().await;
        Ok(tables.organizations.get(id).cloned())
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.organizations.contains_key(id))
    }

    async fn find_by_name(&self, name: &str) -> StorageResult<Vec<Organization>> {
        let tables = self.tables.read().await;
        let mut found: Vec<Organization> = tables
            .organizations
            .values()
            .filter(|org| org.name == name)
            .cloned()
            .collect();
        found.sort_by(|a, b| Tables::child_key(a).cmp(&Tables::child_key(b)));
        Ok(found)
    }

    async fn parent_id(&self, id: &str) -> StorageResult<Option<Option<String>>> {
        let tables = self.tables.read().await;
        Ok(tables.organizations.get(id).map(|org| org.parent_id.clone()))
    }

    async fn child_ids(&self, id: &str) -> StorageResult<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables.child_ids(id))
    }

    async fn children(&self, id: &str) -> StorageResult<Vec<Organization>> {
        let tables = self.tables.read().await;
        let ids = tables.child_ids(id);
        Ok(tables.resolve(ids)?.into_iter().cloned().collect())
    }

    async fn update(
        &self,
        organization: Organization,
        expected_version: u64,
    ) -> StorageResult<UpdateOutcome> {
        let mut tables = self.tables.write().await;

        let existing = match tables.organizations.get(&organization.id) {
            Some(existing) => existing.clone(),
            None => return Ok(UpdateOutcome::NotFound),
        };
        if existing.version != expected_version {
            return Ok(UpdateOutcome::VersionMismatch {
                actual: existing.version,
            });
        }

        let reparented = existing.parent_id != organization.parent_id;
        if reparented {
            if let Some(new_parent) = &organization.parent_id {
                if !tables.organizations.contains_key(new_parent) {
                    return Ok(UpdateOutcome::ParentMissing);
                }
                if tables.chain_contains(new_parent, &existing.id)? {
                    return Ok(UpdateOutcome::CycleDetected);
                }
            }
        }

        let mut stored = organization.without_projections();
        stored.created = existing.created;
        stored.version = expected_version + 1;

        if reparented {
            if let Some(old_parent) = &existing.parent_id {
                tables.unlink_child(old_parent, &existing);
            }
            if let Some(new_parent) = stored.parent_id.clone() {
                tables.link_child(&new_parent, &stored);
            }
            tables.structure_version += 1;
        }
        tables
            .organizations
            .insert(stored.id.clone(), stored.clone());

        Ok(UpdateOutcome::Updated(stored))
    }

    async fn delete(&self, id: &str) -> StorageResult<DeleteOutcome> {
        let mut tables = self.tables.write().await;

        let existing = match tables.organizations.get(id) {
            Some(existing) => existing.clone(),
            None => return Ok(DeleteOutcome::NotFound),
        };
        let child_count = tables.children.get(id).map(|set| set.len()).unwrap_or(0);
        if child_count > 0 {
            return Ok(DeleteOutcome::HasChildren { count: child_count });
        }

        if let Some(parent_id) = &existing.parent_id {
            tables.unlink_child(parent_id, &existing);
        }
        if let Some(binding) = tables.bindings.remove(id) {
            tables.domains.remove(&binding.tenant_domain);
            tables.tenant_ids.remove(&binding.tenant_id);
        }
        tables.organizations.remove(id);
        tables.structure_version += 1;

        Ok(DeleteOutcome::Deleted(existing))
    }

    async fn scan(&self, request: ScanRequest) -> StorageResult<Vec<Organization>> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }

        let tables = self.tables.read().await;

        let candidates: Vec<&Organization> = match &request.scope {
            ScanScope::Roots => tables
                .organizations
                .values()
                .filter(|org| org.is_root())
                .collect(),
            ScanScope::All => tables.organizations.values().collect(),
            ScanScope::ChildrenOf(id) => tables.resolve(tables.child_ids(id))?,
            ScanScope::DescendantsOf(id) => tables.resolve(tables.descendant_ids(id))?,
        };

        let mut matches: Vec<&Organization> = candidates
            .into_iter()
            .filter(|org| {
                request
                    .after
                    .as_ref()
                    .is_none_or(|after| is_past(after, org, request.sort_key, request.order))
            })
            .filter(|org| request.filter.as_ref().is_none_or(|f| f.matches(org)))
            .collect();

        matches.sort_by(|a, b| compare_organizations(a, b, request.sort_key, request.order));
        matches.truncate(request.limit);

        Ok(matches.into_iter().cloned().collect())
    }

    async fn structure_version(&self) -> StorageResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables.structure_version)
    }

    async fn tenant_binding(&self, organization_id: &str) -> StorageResult<Option<TenantBinding>> {
        let tables = self.tables.read().await;
        Ok(tables.bindings.get(organization_id).cloned())
    }

    async fn organization_for_domain(&self, tenant_domain: &str) -> StorageResult<Option<String>> {
        let tables = self.tables.read().await;
        Ok(tables.domains.get(tenant_domain).cloned())
    }

    async fn organization_for_tenant_id(&self, tenant_id: i64) -> StorageResult<Option<String>> {
        let tables = self.tables.read().await;
        Ok(tables.tenant_ids.get(&tenant_id).cloned())
    }

    async fn stats(&self) -> StorageResult<StorageStats> {
        let tables = self.tables.read().await;
        Ok(StorageStats {
            organization_count: tables.organizations.len(),
            root_count: tables
                .organizations
                .values()
                .filter(|org| org.is_root())
                .count(),
            tenant_binding_count: tables.bindings.len(),
            structure_version: tables.structure_version,
        })
    }

    async fn clear(&self) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        let structure_version = tables.structure_version + 1;
        *tables = Tables {
            structure_version,
            ..Tables::default()
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn org(id: &str, parent: Option<&str>, offset: i64) -> Organization {
        let mut org = Organization::new(format!("Org {}", id));
        org.id = id.to_string();
        org.parent_id = parent.map(str::to_string);
        org.created = Utc::now() + Duration::seconds(offset);
        org
    }

    fn binding(id: &str, tenant_id: i64) -> TenantBinding {
        TenantBinding::new(id, format!("{}.example", id), tenant_id)
    }

    #[tokio::test]
    async fn test_children_are_ordered_by_creation() {
        let storage = InMemoryStorage::new();
        storage.insert(org("root", None, 0), binding("root", 1)).await.unwrap();
        storage
            .insert(org("late", Some("root"), 20), binding("late", 2))
            .await
            .unwrap();
        storage
            .insert(org("early", Some("root"), 10), binding("early", 3))
            .await
            .unwrap();

        assert_eq!(
            storage.child_ids("root").await.unwrap(),
            vec!["early".to_string(), "late".to_string()]
        );
    }

    #[tokio::test]
    async fn test_projections_are_not_persisted() {
        let storage = InMemoryStorage::new();
        let mut root = org("root", None, 0);
        root.permissions = vec!["read".to_string()];

        storage.insert(root, binding("root", 1)).await.unwrap();

        let stored = storage.get("root").await.unwrap().unwrap();
        assert!(stored.permissions.is_empty());
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_structure_version_tracks_structural_changes() {
        let storage = InMemoryStorage::new();
        let start = storage.structure_version().await.unwrap();

        storage.insert(org("root", None, 0), binding("root", 1)).await.unwrap();
        let after_insert = storage.structure_version().await.unwrap();
        assert!(after_insert > start);

        let mut renamed = storage.get("root").await.unwrap().unwrap();
        renamed.name = "Renamed".to_string();
        storage.update(renamed, 1).await.unwrap();
        assert_eq!(storage.structure_version().await.unwrap(), after_insert);

        storage.delete("root").await.unwrap();
        assert!(storage.structure_version().await.unwrap() > after_insert);
    }

    #[tokio::test]
    async fn test_clear_resets_tables() {
        let storage = InMemoryStorage::new();
        storage.insert(org("root", None, 0), binding("root", 1)).await.unwrap();

        storage.clear().await.unwrap();

        let stats = storage.stats().await.unwrap();
        assert_eq!(stats.organization_count, 0);
        assert_eq!(stats.tenant_binding_count, 0);
        assert!(storage.organization_for_tenant_id(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clones_share_tables() {
        let storage = InMemoryStorage::new();
        let clone = storage.clone();
        storage.insert(org("root", None, 0), binding("root", 1)).await.unwrap();
        assert!(clone.exists("root").await.unwrap());
    }
}
