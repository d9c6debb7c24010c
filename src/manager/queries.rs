//! Read operations: existence checks, lookups, listings, tenant resolution
//! and hierarchy queries.

use super::core::{OrganizationManager, report};
use super::OrganizationPage;
use crate::error::{OrganizationError, OrganizationResult};
use crate::filter::Filter;
use crate::manager::access::{OrganizationAuthorizer, PermissionResolver};
use crate::model::{
    BasicOrganization, ChildOrganization, ListQuery, Organization, ReadOptions, RequestContext,
};
use crate::pagination::{CursorDirection, Page, PageRequest, Position};
use crate::storage::{OrganizationStorage, ScanRequest, ScanScope};
use crate::tenant::{TenantBinding, TenantProvisioner, parse_tenant_id};
use log::{debug, error, trace};

impl<S, P, R> OrganizationManager<S, P, R>
where
    S: OrganizationStorage,
    P: TenantProvisioner,
    R: PermissionResolver,
{
    /// Whether any organization has exactly this name.
    pub async fn is_organization_exist_by_name(
        &self,
        context: &RequestContext,
        name: &str,
    ) -> OrganizationResult<bool> {
        debug!(
            "Checking organization name '{}' (request: '{}')",
            name, context.request_id
        );
        let found = self
            .storage
            .find_by_name(name.trim())
            .await
            .map_err(OrganizationError::from)
            .inspect_err(|e| report(context, "is_organization_exist_by_name", e))?;
        Ok(!found.is_empty())
    }

    /// Whether the name is used in the hierarchy of the acting organization.
    ///
    /// Never fails: a missing acting organization or any failure is logged
    /// and reported as `false`. Use
    /// [`organization_exists_in_hierarchy`](Self::organization_exists_in_hierarchy)
    /// to see failures.
    pub async fn is_organization_exist_by_name_in_given_hierarchy(
        &self,
        context: &RequestContext,
        name: &str,
    ) -> bool {
        match self.organization_exists_in_hierarchy(context, name).await {
            Ok(exists) => exists,
            Err(e) => {
                error!(
                    "Could not check organization name '{}' in hierarchy (request: '{}'): {}",
                    name, context.request_id, e
                );
                false
            }
        }
    }

    /// Whether the name is used in the hierarchy of the acting organization.
    ///
    /// # Errors
    ///
    /// * BadRequest - the context names no acting organization
    /// * NotFound - the acting organization does not exist
    pub async fn organization_exists_in_hierarchy(
        &self,
        context: &RequestContext,
        name: &str,
    ) -> OrganizationResult<bool> {
        debug!(
            "Checking organization name '{}' in hierarchy of {:?} (request: '{}')",
            name, context.organization_id, context.request_id
        );
        let root = match self.acting_root(context).await? {
            Some(root) => root,
            None => {
                return Err(OrganizationError::bad_request(
                    "Request context names no organization to scope the hierarchy",
                ));
            }
        };
        let ids = self.ids_by_name_in_hierarchy(name.trim(), &root).await?;
        Ok(!ids.is_empty())
    }

    pub async fn is_organization_exist_by_id(
        &self,
        context: &RequestContext,
        id: &str,
    ) -> OrganizationResult<bool> {
        debug!(
            "Checking organization id '{}' (request: '{}')",
            id, context.request_id
        );
        self.storage
            .exists(id)
            .await
            .map_err(OrganizationError::from)
            .inspect_err(|e| report(context, "is_organization_exist_by_id", e))
    }

    /// Resolve a name to an id.
    ///
    /// Scoped to the acting hierarchy when the context names an organization;
    /// otherwise global, where more than one match is a conflict.
    pub async fn get_organization_id_by_name(
        &self,
        context: &RequestContext,
        name: &str,
    ) -> OrganizationResult<String> {
        debug!(
            "Resolving organization name '{}' (request: '{}')",
            name, context.request_id
        );
        self.id_by_name(context, name.trim())
            .await
            .inspect_err(|e| report(context, "get_organization_id_by_name", e))
    }

    async fn id_by_name(
        &self,
        context: &RequestContext,
        name: &str,
    ) -> OrganizationResult<String> {
        let ids = match self.acting_root(context).await? {
            Some(root) => self.ids_by_name_in_hierarchy(name, &root).await?,
            None => self
                .storage
                .find_by_name(name)
                .await?
                .into_iter()
                .map(|org| org.id)
                .collect(),
        };
        match ids.as_slice() {
            [] => Err(OrganizationError::not_found("Organization", name)),
            [only] => Ok(only.clone()),
            many => Err(OrganizationError::conflict(format!(
                "Name '{}' matches {} organizations",
                name,
                many.len()
            ))),
        }
    }

    pub async fn get_organization_name_by_id(
        &self,
        context: &RequestContext,
        id: &str,
    ) -> OrganizationResult<String> {
        debug!(
            "Resolving organization id '{}' (request: '{}')",
            id, context.request_id
        );
        self.load(id)
            .await
            .map(|org| org.name)
            .inspect_err(|e| report(context, "get_organization_name_by_id", e))
    }

    /// Read one organization, optionally with its children and the caller's
    /// permissions hydrated.
    pub async fn get_organization(
        &self,
        context: &RequestContext,
        id: &str,
        options: ReadOptions,
    ) -> OrganizationResult<Organization> {
        debug!(
            "Getting organization '{}' with {:?} (request: '{}')",
            id, options, context.request_id
        );
        self.read(context, id, options)
            .await
            .inspect_err(|e| report(context, "get_organization", e))
    }

    async fn read(
        &self,
        context: &RequestContext,
        id: &str,
        options: ReadOptions,
    ) -> OrganizationResult<Organization> {
        let mut org = self.load(id).await?;
        if options.include_children {
            org.children = self
                .storage
                .children(id)
                .await?
                .iter()
                .map(ChildOrganization::from)
                .collect();
        }
        if options.include_permissions {
            org.permissions = self.permissions.permissions(context, id).await?;
        }
        trace!("Organization found and returned");
        Ok(org)
    }

    /// Children of an organization, or all its descendants breadth first.
    pub async fn get_child_organizations(
        &self,
        context: &RequestContext,
        id: &str,
        recursive: bool,
    ) -> OrganizationResult<Vec<BasicOrganization>> {
        debug!(
            "Getting {} of '{}' (request: '{}')",
            if recursive { "descendants" } else { "children" },
            id,
            context.request_id
        );
        self.descendants_of(id, recursive)
            .await
            .inspect_err(|e| report(context, "get_child_organizations", e))
    }

    async fn ensure_exists(&self, id: &str) -> OrganizationResult<()> {
        if self.storage.exists(id).await? {
            Ok(())
        } else {
            Err(OrganizationError::not_found("Organization", id))
        }
    }

    async fn descendants_of(
        &self,
        id: &str,
        recursive: bool,
    ) -> OrganizationResult<Vec<BasicOrganization>> {
        self.ensure_exists(id).await?;
        let descendants = self.hierarchy().descendants(id, recursive).await?;
        Ok(descendants.iter().map(BasicOrganization::from).collect())
    }

    pub async fn get_child_organizations_ids(
        &self,
        context: &RequestContext,
        id: &str,
    ) -> OrganizationResult<Vec<String>> {
        debug!(
            "Getting child ids of '{}' (request: '{}')",
            id, context.request_id
        );
        self.child_ids_of(id)
            .await
            .inspect_err(|e| report(context, "get_child_organizations_ids", e))
    }

    async fn child_ids_of(&self, id: &str) -> OrganizationResult<Vec<String>> {
        self.ensure_exists(id).await?;
        Ok(self.storage.child_ids(id).await?)
    }

    /// One page of organizations.
    ///
    /// With an acting organization in the context the listing covers its
    /// children (all descendants when `recursive`); otherwise the roots
    /// (every organization when `recursive`).
    pub async fn get_organizations(
        &self,
        context: &RequestContext,
        query: &ListQuery,
    ) -> OrganizationResult<OrganizationPage> {
        debug!(
            "Listing organizations with {:?} (request: '{}')",
            query, context.request_id
        );
        let everyone = |_: &RequestContext, _: &BasicOrganization| true;
        self.list(context, query, &everyone)
            .await
            .inspect_err(|e| report(context, "get_organizations", e))
    }

    /// One page of the organizations the authorizer lets the caller see.
    ///
    /// The authorizer is applied while the page is filled, so pages stay full
    /// and cursors continue where the previous page ended.
    pub async fn get_user_authorized_organizations<A: OrganizationAuthorizer>(
        &self,
        context: &RequestContext,
        query: &ListQuery,
        authorizer: &A,
    ) -> OrganizationResult<OrganizationPage> {
        debug!(
            "Listing authorized organizations with {:?} (request: '{}')",
            query, context.request_id
        );
        self.list(context, query, authorizer)
            .await
            .inspect_err(|e| report(context, "get_user_authorized_organizations", e))
    }

    fn page_limit(&self, requested: Option<usize>) -> OrganizationResult<usize> {
        match requested {
            None => Ok(self.config.default_page_limit),
            Some(0) => Err(OrganizationError::bad_request(
                "Page limit must be greater than zero",
            )),
            Some(limit) => Ok(limit.min(self.config.max_page_limit)),
        }
    }

    async fn list<A: OrganizationAuthorizer>(
        &self,
        context: &RequestContext,
        query: &ListQuery,
        authorizer: &A,
    ) -> OrganizationResult<OrganizationPage> {
        let limit = self.page_limit(query.limit)?;
        let filter = Filter::parse_optional(query.filter.as_deref())?;

        let cursor = match (&query.after, &query.before) {
            (Some(_), Some(_)) => {
                return Err(OrganizationError::bad_request(
                    "Only one of 'after' and 'before' may be given",
                ));
            }
            (Some(token), None) => Some(self.codec.decode(
                token,
                query.sort_by,
                query.sort_order,
                CursorDirection::After,
            )?),
            (None, Some(token)) => Some(self.codec.decode(
                token,
                query.sort_by,
                query.sort_order,
                CursorDirection::Before,
            )?),
            (None, None) => None,
        };

        let scope = match context.organization_id() {
            Some(acting) => {
                self.ensure_exists(acting).await?;
                if query.recursive {
                    ScanScope::DescendantsOf(acting.to_string())
                } else {
                    ScanScope::ChildrenOf(acting.to_string())
                }
            }
            None if query.recursive => ScanScope::All,
            None => ScanScope::Roots,
        };

        let request = PageRequest {
            limit,
            sort_key: query.sort_by,
            sort_order: query.sort_order,
            cursor,
        };

        let batch_size = self.config.scan_batch_size;
        let mut matches = Vec::with_capacity(limit + 1);
        let mut position = request.start();
        loop {
            let batch = self
                .storage
                .scan(ScanRequest {
                    scope: scope.clone(),
                    filter: filter.clone(),
                    sort_key: request.sort_key,
                    order: request.scan_order(),
                    after: position.clone(),
                    limit: batch_size,
                })
                .await?;
            let exhausted = batch.len() < batch_size;
            if let Some(last) = batch.last() {
                position = Some(Position::of(last, request.sort_key));
            }

            for org in batch {
                if authorizer.is_authorized(context, &BasicOrganization::from(&org)) {
                    matches.push(org);
                    if matches.len() > limit {
                        break;
                    }
                }
            }
            if exhausted || matches.len() > limit {
                break;
            }
        }

        let page = request.finish(&self.codec, matches)?;
        debug!(
            "Returning {} organization(s) (request: '{}')",
            page.len(),
            context.request_id
        );
        Ok(Page {
            items: page.items.iter().map(BasicOrganization::from).collect(),
            next_cursor: page.next_cursor,
            previous_cursor: page.previous_cursor,
        })
    }

    async fn binding(&self, id: &str) -> OrganizationResult<TenantBinding> {
        self.storage
            .tenant_binding(id)
            .await?
            .ok_or_else(|| OrganizationError::not_found("Tenant binding", id))
    }

    pub async fn resolve_tenant_domain(
        &self,
        context: &RequestContext,
        id: &str,
    ) -> OrganizationResult<String> {
        debug!(
            "Resolving tenant domain of '{}' (request: '{}')",
            id, context.request_id
        );
        self.binding(id)
            .await
            .map(|binding| binding.tenant_domain)
            .inspect_err(|e| report(context, "resolve_tenant_domain", e))
    }

    pub async fn resolve_tenant_id(
        &self,
        context: &RequestContext,
        id: &str,
    ) -> OrganizationResult<String> {
        debug!(
            "Resolving tenant id of '{}' (request: '{}')",
            id, context.request_id
        );
        self.binding(id)
            .await
            .map(|binding| binding.tenant_id.to_string())
            .inspect_err(|e| report(context, "resolve_tenant_id", e))
    }

    pub async fn resolve_organization_id(
        &self,
        context: &RequestContext,
        tenant_domain: &str,
    ) -> OrganizationResult<String> {
        debug!(
            "Resolving organization of tenant domain '{}' (request: '{}')",
            tenant_domain, context.request_id
        );
        self.organization_for_domain(tenant_domain)
            .await
            .inspect_err(|e| report(context, "resolve_organization_id", e))
    }

    async fn organization_for_domain(&self, tenant_domain: &str) -> OrganizationResult<String> {
        self.storage
            .organization_for_domain(tenant_domain)
            .await?
            .ok_or_else(|| OrganizationError::not_found("Tenant domain", tenant_domain))
    }

    /// Resolve a numeric tenant id given as text.
    ///
    /// A non-numeric id is a bad request.
    pub async fn resolve_organization_id_from_tenant_id(
        &self,
        context: &RequestContext,
        tenant_id: &str,
    ) -> OrganizationResult<String> {
        debug!(
            "Resolving organization of tenant id '{}' (request: '{}')",
            tenant_id, context.request_id
        );
        self.organization_for_tenant(tenant_id)
            .await
            .inspect_err(|e| report(context, "resolve_organization_id_from_tenant_id", e))
    }

    async fn organization_for_tenant(&self, tenant_id: &str) -> OrganizationResult<String> {
        let numeric = parse_tenant_id(tenant_id)?;
        self.storage
            .organization_for_tenant_id(numeric)
            .await?
            .ok_or_else(|| OrganizationError::not_found("Tenant", tenant_id))
    }

    /// Ids from the root down to `id` inclusive; empty for an unknown id.
    pub async fn get_ancestor_organization_ids(
        &self,
        context: &RequestContext,
        id: &str,
    ) -> OrganizationResult<Vec<String>> {
        debug!(
            "Getting ancestors of '{}' (request: '{}')",
            id, context.request_id
        );
        self.hierarchy()
            .ancestor_ids(id)
            .await
            .inspect_err(|e| report(context, "get_ancestor_organization_ids", e))
    }

    /// Every organization with exactly this name, oldest first.
    pub async fn get_organizations_by_name(
        &self,
        context: &RequestContext,
        name: &str,
    ) -> OrganizationResult<Vec<Organization>> {
        debug!(
            "Getting organizations named '{}' (request: '{}')",
            name, context.request_id
        );
        self.storage
            .find_by_name(name.trim())
            .await
            .map_err(OrganizationError::from)
            .inspect_err(|e| report(context, "get_organizations_by_name", e))
    }

    /// Depth of `id` (root = 0), or [`DEPTH_NOT_FOUND`](crate::hierarchy::DEPTH_NOT_FOUND).
    pub async fn get_organization_depth_in_hierarchy(
        &self,
        context: &RequestContext,
        id: &str,
    ) -> OrganizationResult<i32> {
        debug!(
            "Getting depth of '{}' (request: '{}')",
            id, context.request_id
        );
        self.hierarchy()
            .depth(id)
            .await
            .inspect_err(|e| report(context, "get_organization_depth_in_hierarchy", e))
    }

    /// Edge distance between two organizations on the same branch.
    pub async fn get_relative_depth_between_organizations_in_same_branch(
        &self,
        context: &RequestContext,
        first: &str,
        second: &str,
    ) -> OrganizationResult<i32> {
        debug!(
            "Getting relative depth of '{}' and '{}' (request: '{}')",
            first, second, context.request_id
        );
        self.hierarchy()
            .relative_depth(first, second)
            .await
            .inspect_err(|e| {
                report(
                    context,
                    "get_relative_depth_between_organizations_in_same_branch",
                    e,
                )
            })
    }

    /// Parent of `id`; `None` for a root.
    pub async fn get_parent_organization_id(
        &self,
        context: &RequestContext,
        id: &str,
    ) -> OrganizationResult<Option<String>> {
        debug!(
            "Getting parent of '{}' (request: '{}')",
            id, context.request_id
        );
        self.hierarchy()
            .parent_id(id)
            .await
            .inspect_err(|e| report(context, "get_parent_organization_id", e))
    }
}
