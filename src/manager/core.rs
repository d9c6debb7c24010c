//! Core organization manager structure and shared helpers.
//!
//! This module contains the `OrganizationManager` struct definition, its
//! constructors and the validation and naming helpers used by both the
//! mutating operations and the queries.

use crate::error::{OrganizationError, OrganizationResult};
use crate::hierarchy::HierarchyResolver;
use crate::manager::access::{NoPermissions, PermissionResolver};
use crate::manager::builder::{ManagerConfig, NameUniqueness};
use crate::manager::locks::MutationLocks;
use crate::model::{Organization, OrganizationAttribute, RequestContext};
use crate::pagination::CursorCodec;
use crate::storage::OrganizationStorage;
use crate::tenant::{SequentialTenantProvisioner, TenantProvisioner};
use log::{error, warn};
use std::collections::HashSet;
use tokio::sync::Mutex;

/// Organization hierarchy manager.
///
/// Coordinates the store, hierarchy walks, cursor pagination, patching and
/// tenant binding behind one async API. Every operation takes the
/// [`RequestContext`] of the caller first.
///
/// # Type Parameters
///
/// * `S` - The store implementing [`OrganizationStorage`]
/// * `P` - The [`TenantProvisioner`] binding new organizations to tenants
/// * `R` - The [`PermissionResolver`] used for permission hydration
///
/// # Examples
///
/// ```rust
/// use organization_manager::OrganizationManager;
/// use organization_manager::model::{Organization, RequestContext};
/// use organization_manager::storage::InMemoryStorage;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = OrganizationManager::new(InMemoryStorage::new());
/// let context = RequestContext::with_generated_id();
///
/// let root = manager
///     .add_organization(&context, Organization::new("Root"))
///     .await?;
/// let child = manager
///     .add_organization(&context, Organization::new("Child").with_parent(&root.id))
///     .await?;
///
/// assert_eq!(
///     manager.get_organization_depth_in_hierarchy(&context, &child.id).await?,
///     1
/// );
/// # Ok(())
/// # }
/// ```
pub struct OrganizationManager<S, P = SequentialTenantProvisioner, R = NoPermissions> {
    pub(super) storage: S,
    pub(super) provisioner: P,
    pub(super) permissions: R,
    pub(super) config: ManagerConfig,
    pub(super) codec: CursorCodec,
    pub(super) locks: MutationLocks,
    pub(super) naming: Mutex<()>,
}

impl<S: OrganizationStorage> OrganizationManager<S> {
    /// Create a manager with the default provisioner and configuration.
    pub fn new(storage: S) -> Self {
        Self::from_parts(
            storage,
            SequentialTenantProvisioner::default(),
            NoPermissions,
            ManagerConfig::default(),
        )
    }
}

impl<S, P, R> OrganizationManager<S, P, R>
where
    S: OrganizationStorage,
    P: TenantProvisioner,
    R: PermissionResolver,
{
    pub(super) fn from_parts(
        storage: S,
        provisioner: P,
        permissions: R,
        config: ManagerConfig,
    ) -> Self {
        let codec = CursorCodec::new(config.cursor_secret.as_bytes());
        Self {
            storage,
            provisioner,
            permissions,
            config,
            codec,
            locks: MutationLocks::new(),
            naming: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// The underlying store.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub(super) fn hierarchy(&self) -> HierarchyResolver<'_, S> {
        HierarchyResolver::new(&self.storage, self.config.walk_retry_limit)
    }

    pub(super) async fn load(&self, id: &str) -> OrganizationResult<Organization> {
        self.storage
            .get(id)
            .await?
            .ok_or_else(|| OrganizationError::not_found("Organization", id))
    }

    /// Trim a name and check it against the configured limits.
    pub(super) fn validate_name(&self, name: &str) -> OrganizationResult<String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(OrganizationError::bad_request(
                "Organization name must not be blank",
            ));
        }
        let length = trimmed.chars().count();
        if length > self.config.max_name_length {
            return Err(OrganizationError::bad_request(format!(
                "Organization name is {} characters long, the limit is {}",
                length, self.config.max_name_length
            )));
        }
        Ok(trimmed.to_string())
    }

    /// Attribute keys must be non-empty and unique.
    pub(super) fn validate_attributes(
        &self,
        attributes: &[OrganizationAttribute],
    ) -> OrganizationResult<()> {
        let mut seen = HashSet::new();
        for attribute in attributes {
            if attribute.key.trim().is_empty() {
                return Err(OrganizationError::bad_request(
                    "Attribute keys must not be blank",
                ));
            }
            if !seen.insert(attribute.key.as_str()) {
                return Err(OrganizationError::bad_request(format!(
                    "Duplicate attribute key '{}'",
                    attribute.key
                )));
            }
        }
        Ok(())
    }

    /// Root of the hierarchy an organization belongs to.
    pub(super) async fn root_of(&self, id: &str) -> OrganizationResult<Option<String>> {
        Ok(self.hierarchy().ancestor_ids(id).await?.into_iter().next())
    }

    /// Whether `name` is already used in the scope an organization lives in.
    ///
    /// `root` is the root of the organization's hierarchy (`None` for an
    /// organization that is about to become a new root), `is_root` whether the
    /// organization itself is a root and `exclude` its own id when renaming.
    pub(super) async fn name_taken(
        &self,
        name: &str,
        root: Option<&str>,
        is_root: bool,
        exclude: Option<&str>,
    ) -> OrganizationResult<bool> {
        let candidates = self.storage.find_by_name(name).await?;
        for candidate in candidates {
            if Some(candidate.id.as_str()) == exclude {
                continue;
            }
            match self.config.name_uniqueness {
                NameUniqueness::Global => return Ok(true),
                NameUniqueness::Hierarchy => {
                    if is_root && candidate.is_root() {
                        return Ok(true);
                    }
                    if let Some(root) = root {
                        if self.root_of(&candidate.id).await?.as_deref() == Some(root) {
                            return Ok(true);
                        }
                    }
                }
            }
        }
        Ok(false)
    }

    /// Ids of organizations with `name` in the hierarchy rooted at `root`.
    pub(super) async fn ids_by_name_in_hierarchy(
        &self,
        name: &str,
        root: &str,
    ) -> OrganizationResult<Vec<String>> {
        let mut ids = Vec::new();
        for candidate in self.storage.find_by_name(name).await? {
            if self.root_of(&candidate.id).await?.as_deref() == Some(root) {
                ids.push(candidate.id);
            }
        }
        Ok(ids)
    }

    /// Hierarchy the caller is acting in, taken from the context.
    pub(super) async fn acting_root(
        &self,
        context: &RequestContext,
    ) -> OrganizationResult<Option<String>> {
        let Some(acting) = context.organization_id() else {
            return Ok(None);
        };
        match self.root_of(acting).await? {
            Some(root) => Ok(Some(root)),
            None => Err(OrganizationError::not_found("Organization", acting)),
        }
    }
}

/// Log a failed operation: server errors at error level, rejections at warn.
pub(super) fn report(context: &RequestContext, operation: &str, failure: &OrganizationError) {
    if failure.is_server_error() {
        error!(
            "{} failed (request: '{}'): {}",
            operation, context.request_id, failure
        );
    } else {
        warn!(
            "{} rejected (request: '{}'): {}",
            operation, context.request_id, failure
        );
    }
}
