//! Mutating operations: create, patch, update and delete.
//!
//! Every mutation takes the per-organization locks of the ids it touches
//! (and the naming lock when a name can change) before reading current
//! state, and writes with an optimistic version check.

use super::core::{OrganizationManager, report};
use crate::error::{OrganizationError, OrganizationResult, ServerError};
use crate::manager::access::PermissionResolver;
use crate::manager::locks::MutationGuard;
use crate::model::{Organization, OrganizationStatus, RequestContext};
use crate::patch::{PatchEngine, PatchOperation};
use crate::storage::{DeleteOutcome, InsertOutcome, OrganizationStorage, UpdateOutcome};
use crate::tenant::TenantProvisioner;
use chrono::Utc;
use log::{debug, info, trace};
use uuid::Uuid;

impl<S, P, R> OrganizationManager<S, P, R>
where
    S: OrganizationStorage,
    P: TenantProvisioner,
    R: PermissionResolver,
{
    /// Create an organization.
    ///
    /// The id, timestamps and version are assigned here; values supplied for
    /// them are ignored. The new organization is bound to a tenant in the
    /// same store write.
    ///
    /// # Errors
    ///
    /// * BadRequest - blank or over-long name, malformed attributes, missing
    ///   or disabled parent, depth limit exceeded
    /// * Conflict - the name is already used in the organization's scope
    pub async fn add_organization(
        &self,
        context: &RequestContext,
        organization: Organization,
    ) -> OrganizationResult<Organization> {
        info!(
            "Creating organization '{}' under {:?} (request: '{}')",
            organization.name, organization.parent_id, context.request_id
        );
        trace!(
            "Create data: {}",
            serde_json::to_string(&organization).unwrap_or_else(|_| "invalid json".to_string())
        );

        self.create(context, organization)
            .await
            .inspect_err(|e| report(context, "add_organization", e))
    }

    async fn create(
        &self,
        context: &RequestContext,
        organization: Organization,
    ) -> OrganizationResult<Organization> {
        let name = self.validate_name(&organization.name)?;
        self.validate_attributes(&organization.attributes)?;

        let _naming = self.naming.lock().await;
        let _guard = match &organization.parent_id {
            Some(parent_id) => Some(self.locks.acquire(parent_id).await),
            None => None,
        };

        let root = match &organization.parent_id {
            Some(parent_id) => Some(self.check_parent(parent_id, 0).await?),
            None => None,
        };

        let is_root = organization.parent_id.is_none();
        if self
            .name_taken(&name, root.as_deref(), is_root, None)
            .await?
        {
            return Err(OrganizationError::conflict(format!(
                "An organization named '{}' already exists",
                name
            )));
        }

        let now = Utc::now();
        let mut candidate = organization.without_projections();
        candidate.id = Uuid::new_v4().to_string();
        candidate.name = name;
        candidate.created = now;
        candidate.last_modified = now;
        candidate.version = 0;

        let binding = self.provisioner.provision(&candidate).await?;
        debug!(
            "Binding organization '{}' to tenant '{}' ({}) (request: '{}')",
            candidate.id, binding.tenant_domain, binding.tenant_id, context.request_id
        );

        let id = candidate.id.clone();
        match self.storage.insert(candidate, binding).await? {
            InsertOutcome::Inserted(stored) => {
                info!(
                    "Created organization '{}' ({}) (request: '{}')",
                    stored.name, stored.id, context.request_id
                );
                Ok(stored)
            }
            InsertOutcome::ParentMissing => Err(OrganizationError::bad_request(format!(
                "Parent organization '{}' does not exist",
                organization.parent_id.unwrap_or_default()
            ))),
            InsertOutcome::DuplicateId => Err(OrganizationError::invariant(format!(
                "generated organization id '{}' already exists",
                id
            ))),
            InsertOutcome::TenantConflict { detail } => Err(ServerError::TenantRebinding {
                organization_id: id,
                detail,
            }
            .into()),
        }
    }

    /// Check that an organization can receive children `extra_levels + 1`
    /// levels below it and return the root of its hierarchy.
    async fn check_parent(
        &self,
        parent_id: &str,
        extra_levels: usize,
    ) -> OrganizationResult<String> {
        let parent = self.storage.get(parent_id).await?.ok_or_else(|| {
            OrganizationError::bad_request(format!(
                "Parent organization '{}' does not exist",
                parent_id
            ))
        })?;
        if !parent.is_active() {
            return Err(OrganizationError::bad_request(format!(
                "Parent organization '{}' is disabled",
                parent_id
            )));
        }

        let chain = self.hierarchy().ancestor_ids(parent_id).await?;
        let Some(root) = chain.first().cloned() else {
            return Err(OrganizationError::bad_request(format!(
                "Parent organization '{}' does not exist",
                parent_id
            )));
        };
        if let Some(max_depth) = self.config.max_depth {
            // chain.len() is the depth the new child would get
            let deepest = chain.len() + extra_levels;
            if deepest > max_depth {
                return Err(OrganizationError::bad_request(format!(
                    "Hierarchy depth {} would exceed the limit of {}",
                    deepest, max_depth
                )));
            }
        }
        Ok(root)
    }

    /// Lock an organization together with its current parent and load it.
    ///
    /// The parent link can change between reading it and taking the locks,
    /// in which case the locks are released and taken again.
    async fn lock_with_parent(
        &self,
        id: &str,
    ) -> OrganizationResult<(MutationGuard, Organization)> {
        loop {
            let parent = self.storage.parent_id(id).await?.flatten();
            let mut lock_ids = vec![id];
            if let Some(parent_id) = parent.as_deref() {
                lock_ids.push(parent_id);
            }
            let guard = self.locks.acquire_all(&lock_ids).await;
            let current = self.load(id).await?;
            if current.parent_id == parent {
                return Ok((guard, current));
            }
            trace!("Parent of organization '{}' moved while locking, retrying", id);
        }
    }

    /// An organization can only be active below an active parent.
    async fn ensure_parent_active(&self, id: &str, parent_id: &str) -> OrganizationResult<()> {
        let parent = self.load(parent_id).await?;
        if !parent.is_active() {
            return Err(OrganizationError::bad_request(format!(
                "Organization '{}' cannot be activated while its parent '{}' is disabled",
                id, parent_id
            )));
        }
        Ok(())
    }

    async fn ensure_no_active_children(&self, id: &str) -> OrganizationResult<()> {
        let active = self
            .storage
            .children(id)
            .await?
            .iter()
            .filter(|child| child.is_active())
            .count();
        if active > 0 {
            return Err(OrganizationError::conflict(format!(
                "Organization '{}' has {} active child organization(s) and cannot be disabled",
                id, active
            )));
        }
        Ok(())
    }

    async fn write(
        &self,
        candidate: Organization,
        expected_version: u64,
    ) -> OrganizationResult<Organization> {
        let id = candidate.id.clone();
        match self.storage.update(candidate, expected_version).await? {
            UpdateOutcome::Updated(stored) => Ok(stored),
            UpdateOutcome::NotFound => Err(OrganizationError::not_found("Organization", id)),
            UpdateOutcome::VersionMismatch { actual } => Err(ServerError::ConcurrentModification {
                id,
                expected: expected_version,
                actual,
            }
            .into()),
            UpdateOutcome::ParentMissing => Err(OrganizationError::bad_request(format!(
                "New parent of organization '{}' does not exist",
                id
            ))),
            UpdateOutcome::CycleDetected => Err(OrganizationError::bad_request(format!(
                "Organization '{}' cannot be moved below itself",
                id
            ))),
        }
    }

    /// Delete an organization that has no children.
    ///
    /// The tenant binding is removed in the same store write.
    pub async fn delete_organization(
        &self,
        context: &RequestContext,
        id: &str,
    ) -> OrganizationResult<()> {
        info!(
            "Deleting organization '{}' (request: '{}')",
            id, context.request_id
        );

        let _guard = self.locks.acquire(id).await;
        let outcome = match self.storage.delete(id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let failure = OrganizationError::from(e);
                report(context, "delete_organization", &failure);
                return Err(failure);
            }
        };

        let result = match outcome {
            DeleteOutcome::Deleted(_) => {
                debug!(
                    "Successfully deleted organization '{}' (request: '{}')",
                    id, context.request_id
                );
                Ok(())
            }
            DeleteOutcome::NotFound => Err(OrganizationError::not_found("Organization", id)),
            DeleteOutcome::HasChildren { count } => Err(OrganizationError::conflict(format!(
                "Organization '{}' has {} child organization(s) and cannot be deleted",
                id, count
            ))),
        };
        result.inspect_err(|e| report(context, "delete_organization", e))
    }

    /// Apply patch operations to an organization.
    ///
    /// The batch is applied to a copy; any invalid operation rejects all of
    /// them. A patch that changes nothing is not written and returns the
    /// organization as stored.
    pub async fn patch_organization(
        &self,
        context: &RequestContext,
        id: &str,
        operations: Vec<PatchOperation>,
    ) -> OrganizationResult<Organization> {
        info!(
            "Patching organization '{}' with {} operation(s) (request: '{}')",
            id,
            operations.len(),
            context.request_id
        );
        trace!(
            "Patch operations: {}",
            serde_json::to_string(&operations).unwrap_or_else(|_| "invalid json".to_string())
        );

        self.patch(context, id, &operations)
            .await
            .inspect_err(|e| report(context, "patch_organization", e))
    }

    async fn patch(
        &self,
        context: &RequestContext,
        id: &str,
        operations: &[PatchOperation],
    ) -> OrganizationResult<Organization> {
        let renames = operations
            .iter()
            .any(|op| op.path.trim().trim_end_matches('/') == "/name");
        let _naming = if renames {
            Some(self.naming.lock().await)
        } else {
            None
        };
        let (_guard, current) = self.lock_with_parent(id).await?;
        let mut candidate = PatchEngine::apply(&current, operations)?;

        if candidate.same_content(&current) {
            debug!(
                "Patch leaves organization '{}' unchanged (request: '{}')",
                id, context.request_id
            );
            return Ok(current);
        }

        if candidate.name != current.name {
            candidate.name = self.validate_name(&candidate.name)?;
            let root = self.root_of(id).await?;
            if self
                .name_taken(&candidate.name, root.as_deref(), current.is_root(), Some(id))
                .await?
            {
                return Err(OrganizationError::conflict(format!(
                    "An organization named '{}' already exists",
                    candidate.name
                )));
            }
        }
        if current.is_active() && candidate.status == OrganizationStatus::Disabled {
            self.ensure_no_active_children(id).await?;
        }
        if !current.is_active() && candidate.is_active() {
            if let Some(parent_id) = candidate.parent_id.as_deref() {
                self.ensure_parent_active(id, parent_id).await?;
            }
        }

        candidate.last_modified = Utc::now();
        let stored = self.write(candidate, current.version).await?;
        info!(
            "Patched organization '{}' to version {} (request: '{}')",
            id, stored.version, context.request_id
        );
        Ok(stored)
    }

    /// Replace the editable fields of an organization.
    ///
    /// `current_name` is the name the caller believes the organization has;
    /// a mismatch means the caller's view is stale and is a conflict. The
    /// parent may change to another organization of the same hierarchy.
    ///
    /// # Errors
    ///
    /// * NotFound - unknown id
    /// * Conflict - stale `current_name`, name collision, disabling with
    ///   active children
    /// * BadRequest - invalid fields, re-parenting a root, detaching a
    ///   non-root, moving below its own subtree or into another hierarchy,
    ///   activating below a disabled parent
    pub async fn update_organization(
        &self,
        context: &RequestContext,
        id: &str,
        current_name: &str,
        organization: Organization,
    ) -> OrganizationResult<Organization> {
        info!(
            "Updating organization '{}' ('{}') (request: '{}')",
            id, current_name, context.request_id
        );
        trace!(
            "Update data: {}",
            serde_json::to_string(&organization).unwrap_or_else(|_| "invalid json".to_string())
        );

        self.update(context, id, current_name, organization)
            .await
            .inspect_err(|e| report(context, "update_organization", e))
    }

    async fn update(
        &self,
        context: &RequestContext,
        id: &str,
        current_name: &str,
        organization: Organization,
    ) -> OrganizationResult<Organization> {
        let name = self.validate_name(&organization.name)?;
        self.validate_attributes(&organization.attributes)?;

        let _naming = self.naming.lock().await;
        let mut lock_ids = vec![id];
        if let Some(parent_id) = organization.parent_id.as_deref() {
            lock_ids.push(parent_id);
        }
        let _guard = self.locks.acquire_all(&lock_ids).await;

        let current = self.load(id).await?;
        if current.name != current_name.trim() {
            return Err(OrganizationError::conflict(format!(
                "Organization '{}' is named '{}', not '{}'",
                id, current.name, current_name
            )));
        }

        let mut candidate = current.clone();
        candidate.name = name;
        candidate.description = organization.description;
        candidate.status = organization.status;
        candidate.attributes = organization.attributes;
        candidate.parent_id = organization.parent_id;

        if candidate.parent_id != current.parent_id {
            self.check_reparent(&current, candidate.parent_id.as_deref())
                .await?;
        }

        if candidate.same_content(&current) {
            debug!(
                "Update leaves organization '{}' unchanged (request: '{}')",
                id, context.request_id
            );
            return Ok(current);
        }

        if candidate.name != current.name {
            let root = self.root_of(id).await?;
            if self
                .name_taken(&candidate.name, root.as_deref(), current.is_root(), Some(id))
                .await?
            {
                return Err(OrganizationError::conflict(format!(
                    "An organization named '{}' already exists",
                    candidate.name
                )));
            }
        }
        if current.is_active() && candidate.status == OrganizationStatus::Disabled {
            self.ensure_no_active_children(id).await?;
        }
        if !current.is_active() && candidate.is_active() {
            if let Some(parent_id) = candidate.parent_id.as_deref() {
                self.ensure_parent_active(id, parent_id).await?;
            }
        }

        candidate.last_modified = Utc::now();
        let stored = self.write(candidate, current.version).await?;
        info!(
            "Updated organization '{}' to version {} (request: '{}')",
            id, stored.version, context.request_id
        );
        Ok(stored)
    }

    async fn check_reparent(
        &self,
        current: &Organization,
        new_parent: Option<&str>,
    ) -> OrganizationResult<()> {
        let new_parent = match (current.is_root(), new_parent) {
            (true, Some(_)) => {
                return Err(OrganizationError::bad_request(format!(
                    "Root organization '{}' cannot be moved under a parent",
                    current.id
                )));
            }
            (false, None) => {
                return Err(OrganizationError::bad_request(format!(
                    "Organization '{}' cannot be detached from its hierarchy",
                    current.id
                )));
            }
            (_, Some(new_parent)) => new_parent,
            (true, None) => return Ok(()),
        };

        if new_parent == current.id
            || self
                .hierarchy()
                .is_ancestor(&current.id, new_parent)
                .await?
        {
            return Err(OrganizationError::bad_request(format!(
                "Organization '{}' cannot be moved below itself",
                current.id
            )));
        }

        let height = self.hierarchy().subtree_height(&current.id).await?;
        let new_root = self.check_parent(new_parent, height).await?;
        let own_root = self.root_of(&current.id).await?;
        if own_root.as_deref() != Some(new_root.as_str()) {
            return Err(OrganizationError::bad_request(format!(
                "Organization '{}' can only be moved within its own hierarchy",
                current.id
            )));
        }
        Ok(())
    }
}
