//! Extension points for permissions and per-user visibility.
//!
//! Neither is computed by this crate. A [`PermissionResolver`] supplies the
//! permission names hydrated into an organization read with
//! `include_permissions`, and an [`OrganizationAuthorizer`] decides which
//! organizations a caller may see in
//! [`get_user_authorized_organizations`](super::OrganizationManager::get_user_authorized_organizations).

use crate::error::OrganizationResult;
use crate::model::{BasicOrganization, RequestContext};
use std::future::Future;

/// Supplies the permission names a caller holds on an organization.
pub trait PermissionResolver: Send + Sync {
    fn permissions(
        &self,
        context: &RequestContext,
        organization_id: &str,
    ) -> impl Future<Output = OrganizationResult<Vec<String>>> + Send;
}

/// Resolver that grants nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPermissions;

impl PermissionResolver for NoPermissions {
    async fn permissions(
        &self,
        _context: &RequestContext,
        _organization_id: &str,
    ) -> OrganizationResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Decides whether a caller may see an organization in a listing.
///
/// Implemented for any `Fn(&RequestContext, &BasicOrganization) -> bool`.
pub trait OrganizationAuthorizer: Send + Sync {
    fn is_authorized(&self, context: &RequestContext, organization: &BasicOrganization) -> bool;
}

impl<F> OrganizationAuthorizer for F
where
    F: Fn(&RequestContext, &BasicOrganization) -> bool + Send + Sync,
{
    fn is_authorized(&self, context: &RequestContext, organization: &BasicOrganization) -> bool {
        self(context, organization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Organization;

    #[tokio::test]
    async fn test_no_permissions() {
        let context = RequestContext::new("test".to_string());
        assert!(
            NoPermissions
                .permissions(&context, "org")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_closure_authorizer() {
        let allow_acme =
            |_: &RequestContext, org: &BasicOrganization| org.name.starts_with("Acme");
        let context = RequestContext::new("test".to_string());

        let acme = BasicOrganization::from(Organization::new("Acme EU"));
        let other = BasicOrganization::from(Organization::new("Globex"));
        assert!(allow_acme.is_authorized(&context, &acme));
        assert!(!allow_acme.is_authorized(&context, &other));
    }
}
