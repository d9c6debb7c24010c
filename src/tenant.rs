//! Tenant bindings between organizations and tenants.
//!
//! Every organization is bound to exactly one tenant, identified both by a
//! tenant domain and by a numeric tenant id. Bindings are created together
//! with the organization and removed together with it; they are never
//! reassigned.
//!
//! Bindings are produced by a [`TenantProvisioner`]. The default
//! [`SequentialTenantProvisioner`] uses the organization id as the domain and
//! hands out numeric ids from a counter.

use crate::error::{OrganizationError, OrganizationResult};
use crate::model::Organization;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};

/// One-to-one association between an organization and its tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantBinding {
    pub organization_id: String,
    pub tenant_domain: String,
    pub tenant_id: i64,
}

impl TenantBinding {
    pub fn new(
        organization_id: impl Into<String>,
        tenant_domain: impl Into<String>,
        tenant_id: i64,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            tenant_domain: tenant_domain.into(),
            tenant_id,
        }
    }
}

/// Produces the tenant binding for a newly created organization.
///
/// Called once per creation, after the organization id has been assigned and
/// before anything is stored. A failure aborts the creation.
pub trait TenantProvisioner: Send + Sync {
    fn provision(
        &self,
        organization: &Organization,
    ) -> impl Future<Output = OrganizationResult<TenantBinding>> + Send;
}

/// Binds each organization to a tenant domain equal to its id and to the
/// next value of a numeric counter.
#[derive(Debug)]
pub struct SequentialTenantProvisioner {
    next_id: AtomicI64,
}

impl SequentialTenantProvisioner {
    /// Start numbering tenants at `first_tenant_id`.
    pub fn starting_at(first_tenant_id: i64) -> Self {
        Self {
            next_id: AtomicI64::new(first_tenant_id),
        }
    }
}

impl Default for SequentialTenantProvisioner {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl TenantProvisioner for SequentialTenantProvisioner {
    async fn provision(&self, organization: &Organization) -> OrganizationResult<TenantBinding> {
        let tenant_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(TenantBinding::new(
            organization.id.clone(),
            organization.id.clone(),
            tenant_id,
        ))
    }
}

/// Parse a tenant id received as text.
pub fn parse_tenant_id(tenant_id: &str) -> OrganizationResult<i64> {
    tenant_id.trim().parse::<i64>().map_err(|_| {
        OrganizationError::bad_request(format!("Tenant id '{}' is not numeric", tenant_id))
    })
}
