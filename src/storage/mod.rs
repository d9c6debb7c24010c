//! Storage abstraction layer for organization records.
//!
//! The `OrganizationStorage` trait is the persistence boundary of the crate.
//! It stores organizations keyed by id with a parent-id field, keeps the
//! tenant bindings next to them, and exposes the tree-aware primitives the
//! hierarchy and listing code needs.
//!
//! # Architecture
//!
//! The storage layer is responsible for:
//! - Atomic insert of an organization together with its tenant binding
//! - Atomic delete that refuses non-empty subtrees
//! - Versioned updates that validate re-parenting (no cycles, parent exists)
//! - Ordered, bounded scans for cursor pagination
//! - A structure version counter for optimistic re-validation of tree walks
//!
//! The storage layer is NOT responsible for:
//! - Name uniqueness and other business rules
//! - Timestamps (the manager sets them)
//! - Cursor encoding, patch semantics, authorization
//!
//! Conditions a caller can correct are reported as typed outcomes
//! ([`InsertOutcome`], [`UpdateOutcome`], [`DeleteOutcome`]); `Err` is reserved
//! for failures of the store itself.
//!
//! # Example Usage
//!
//! ```rust
//! use organization_manager::model::Organization;
//! use organization_manager::storage::{InMemoryStorage, InsertOutcome, OrganizationStorage};
//! use organization_manager::tenant::TenantBinding;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = InMemoryStorage::new();
//!
//! let mut root = Organization::new("Root");
//! root.id = "root".to_string();
//! let binding = TenantBinding::new("root", "root.example", 1);
//!
//! let outcome = storage.insert(root, binding).await?;
//! assert!(matches!(outcome, InsertOutcome::Inserted(_)));
//! assert_eq!(storage.parent_id("root").await?, Some(None));
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod in_memory;

#[cfg(test)]
mod tests;

pub use errors::StorageError;
pub use in_memory::InMemoryStorage;

use crate::filter::Filter;
use crate::model::{Organization, SortOrder};
use crate::pagination::{Position, SortKey};
use crate::tenant::TenantBinding;
use std::future::Future;

pub type StorageResult<T> = Result<T, StorageError>;

/// Result of inserting a new organization.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// Stored, with the store-assigned version
    Inserted(Organization),
    /// The referenced parent does not exist
    ParentMissing,
    /// An organization with the same id already exists
    DuplicateId,
    /// The organization, domain or numeric tenant id is already bound
    TenantConflict { detail: String },
}

/// Result of a versioned update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated(Organization),
    NotFound,
    /// The stored version differs from the expected one
    VersionMismatch { actual: u64 },
    /// The new parent does not exist
    ParentMissing,
    /// The new parent is the organization itself or one of its descendants
    CycleDetected,
}

/// Result of deleting an organization.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// Removed together with its tenant binding
    Deleted(Organization),
    NotFound,
    /// Refused because the organization still has children
    HasChildren { count: usize },
}

/// Set of organizations a scan covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanScope {
    /// Organizations without a parent
    Roots,
    /// Every organization
    All,
    /// Direct children of an organization
    ChildrenOf(String),
    /// Every descendant of an organization, excluding itself
    DescendantsOf(String),
}

/// One bounded, ordered batch request for paginated listing.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub scope: ScanScope,
    pub filter: Option<Filter>,
    pub sort_key: SortKey,
    /// Order in which rows are returned
    pub order: SortOrder,
    /// Only rows strictly past this position (in `order`) are returned
    pub after: Option<Position>,
    /// Maximum rows in the batch
    pub limit: usize,
}

/// Counters describing the store contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageStats {
    pub organization_count: usize,
    pub root_count: usize,
    pub tenant_binding_count: usize,
    pub structure_version: u64,
}

/// Persistence boundary for organizations, parent links and tenant bindings.
///
/// Implementations must make each method atomic: a reader never observes a
/// half-applied insert, update or delete.
pub trait OrganizationStorage: Send + Sync {
    /// Insert a new organization and its tenant binding in one step.
    ///
    /// The parent (if any) must exist at the moment of insertion. The stored
    /// organization gets version 1.
    fn insert(
        &self,
        organization: Organization,
        binding: TenantBinding,
    ) -> impl Future<Output = StorageResult<InsertOutcome>> + Send;

    /// Retrieve an organization by id.
    fn get(&self, id: &str) -> impl Future<Output = StorageResult<Option<Organization>>> + Send;

    /// Check if an organization exists.
    fn exists(&self, id: &str) -> impl Future<Output = StorageResult<bool>> + Send;

    /// All organizations with exactly this name, ordered by creation then id.
    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = StorageResult<Vec<Organization>>> + Send;

    /// Parent link of an organization.
    ///
    /// `None` when the organization is unknown, `Some(None)` for a root.
    fn parent_id(
        &self,
        id: &str,
    ) -> impl Future<Output = StorageResult<Option<Option<String>>>> + Send;

    /// Ids of the direct children, ordered by creation then id.
    fn child_ids(&self, id: &str) -> impl Future<Output = StorageResult<Vec<String>>> + Send;

    /// Direct children, ordered by creation then id.
    fn children(&self, id: &str)
    -> impl Future<Output = StorageResult<Vec<Organization>>> + Send;

    /// Replace an organization if its stored version equals `expected_version`.
    ///
    /// `id` and `created` are kept from the stored record; the version is
    /// incremented. A changed parent is validated atomically.
    fn update(
        &self,
        organization: Organization,
        expected_version: u64,
    ) -> impl Future<Output = StorageResult<UpdateOutcome>> + Send;

    /// Delete a childless organization and its tenant binding.
    fn delete(&self, id: &str) -> impl Future<Output = StorageResult<DeleteOutcome>> + Send;

    /// Return one ordered batch of organizations for a listing.
    fn scan(
        &self,
        request: ScanRequest,
    ) -> impl Future<Output = StorageResult<Vec<Organization>>> + Send;

    /// Counter incremented by every structural change (insert, delete, re-parent).
    fn structure_version(&self) -> impl Future<Output = StorageResult<u64>> + Send;

    /// Tenant binding of an organization.
    fn tenant_binding(
        &self,
        organization_id: &str,
    ) -> impl Future<Output = StorageResult<Option<TenantBinding>>> + Send;

    /// Organization bound to a tenant domain.
    fn organization_for_domain(
        &self,
        tenant_domain: &str,
    ) -> impl Future<Output = StorageResult<Option<String>>> + Send;

    /// Organization bound to a numeric tenant id.
    fn organization_for_tenant_id(
        &self,
        tenant_id: i64,
    ) -> impl Future<Output = StorageResult<Option<String>>> + Send;

    /// Counters for diagnostics.
    fn stats(&self) -> impl Future<Output = StorageResult<StorageStats>> + Send;

    /// Remove every organization and binding. Intended for tests.
    fn clear(&self) -> impl Future<Output = StorageResult<()>> + Send;
}
