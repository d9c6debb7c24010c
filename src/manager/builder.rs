//! Builder pattern for configuring organization manager instances.
//!
//! [`ManagerConfig`] collects the tunables of the manager (page sizes, cursor
//! signing secret, naming rules, depth limit, walk retries) and
//! [`ManagerBuilder`] wires a store, a tenant provisioner and a permission
//! resolver together with a validated configuration.

use crate::error::{BuildError, BuildResult};
use crate::manager::access::{NoPermissions, PermissionResolver};
use crate::manager::core::OrganizationManager;
use crate::storage::OrganizationStorage;
use crate::tenant::{SequentialTenantProvisioner, TenantProvisioner};
use uuid::Uuid;

/// Scope within which organization names must be unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameUniqueness {
    /// Unique among the organizations of one hierarchy; root names are
    /// unique among roots.
    #[default]
    Hierarchy,

    /// Unique across every organization.
    Global,
}

/// Configuration for an [`OrganizationManager`].
#[derive(Clone)]
pub struct ManagerConfig {
    /// Page size used when a listing does not ask for one. Defaults to 15.
    pub default_page_limit: usize,

    /// Largest page size a listing may ask for. Defaults to 100.
    pub max_page_limit: usize,

    /// Secret used to sign pagination cursors.
    ///
    /// Random per process unless set, which means cursors do not survive a
    /// restart. Set it explicitly when several processes serve one store.
    pub cursor_secret: String,

    pub name_uniqueness: NameUniqueness,

    /// Deepest allowed depth (root = 0). Unlimited when `None`.
    pub max_depth: Option<usize>,

    /// Longest allowed organization name in characters. Defaults to 255.
    pub max_name_length: usize,

    /// Attempts of a tree walk before giving up on a changing tree. Defaults to 3.
    pub walk_retry_limit: usize,

    /// Rows requested from the store per batch while filling a page. Defaults to 64.
    pub scan_batch_size: usize,
}

impl std::fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("default_page_limit", &self.default_page_limit)
            .field("max_page_limit", &self.max_page_limit)
            .field("cursor_secret", &"<redacted>")
            .field("name_uniqueness", &self.name_uniqueness)
            .field("max_depth", &self.max_depth)
            .field("max_name_length", &self.max_name_length)
            .field("walk_retry_limit", &self.walk_retry_limit)
            .field("scan_batch_size", &self.scan_batch_size)
            .finish()
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_page_limit: 15,
            max_page_limit: 100,
            cursor_secret: Uuid::new_v4().to_string(),
            name_uniqueness: NameUniqueness::Hierarchy,
            max_depth: None,
            max_name_length: 255,
            walk_retry_limit: 3,
            scan_batch_size: 64,
        }
    }
}

impl ManagerConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> BuildResult<()> {
        let invalid = |message: &str| {
            Err(BuildError::InvalidConfiguration {
                message: message.to_string(),
            })
        };

        if self.default_page_limit == 0 || self.max_page_limit == 0 {
            return invalid("Page limits must be greater than zero");
        }
        if self.default_page_limit > self.max_page_limit {
            return invalid("Default page limit cannot exceed the maximum page limit");
        }
        if self.cursor_secret.is_empty() {
            return invalid("Cursor secret cannot be empty");
        }
        if self.max_name_length == 0 {
            return invalid("Maximum name length must be greater than zero");
        }
        if self.walk_retry_limit == 0 {
            return invalid("Walk retry limit must be greater than zero");
        }
        if self.scan_batch_size == 0 {
            return invalid("Scan batch size must be greater than zero");
        }
        Ok(())
    }
}

/// Builder for configuring and creating organization managers.
///
/// # Examples
///
/// ```rust
/// use organization_manager::{ManagerBuilder, NameUniqueness};
/// use organization_manager::storage::InMemoryStorage;
/// use organization_manager::tenant::SequentialTenantProvisioner;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = ManagerBuilder::new(InMemoryStorage::new())
///     .with_tenant_provisioner(SequentialTenantProvisioner::starting_at(1000))
///     .with_name_uniqueness(NameUniqueness::Global)
///     .with_max_depth(8)
///     .with_cursor_secret("shared-secret")
///     .build()?;
/// assert_eq!(manager.config().max_depth, Some(8));
/// # Ok(())
/// # }
/// ```
pub struct ManagerBuilder<S, P = SequentialTenantProvisioner, R = NoPermissions> {
    storage: S,
    provisioner: P,
    permissions: R,
    config: ManagerConfig,
}

impl<S: OrganizationStorage> ManagerBuilder<S> {
    /// Start from the default provisioner, no permissions and default configuration.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            provisioner: SequentialTenantProvisioner::default(),
            permissions: NoPermissions,
            config: ManagerConfig::default(),
        }
    }
}

impl<S, P, R> ManagerBuilder<S, P, R>
where
    S: OrganizationStorage,
    P: TenantProvisioner,
    R: PermissionResolver,
{
    pub fn with_tenant_provisioner<P2: TenantProvisioner>(
        self,
        provisioner: P2,
    ) -> ManagerBuilder<S, P2, R> {
        ManagerBuilder {
            storage: self.storage,
            provisioner,
            permissions: self.permissions,
            config: self.config,
        }
    }

    pub fn with_permission_resolver<R2: PermissionResolver>(
        self,
        permissions: R2,
    ) -> ManagerBuilder<S, P, R2> {
        ManagerBuilder {
            storage: self.storage,
            provisioner: self.provisioner,
            permissions,
            config: self.config,
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_default_page_limit(mut self, limit: usize) -> Self {
        self.config.default_page_limit = limit;
        self
    }

    pub fn with_max_page_limit(mut self, limit: usize) -> Self {
        self.config.max_page_limit = limit;
        self
    }

    pub fn with_cursor_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.cursor_secret = secret.into();
        self
    }

    pub fn with_name_uniqueness(mut self, uniqueness: NameUniqueness) -> Self {
        self.config.name_uniqueness = uniqueness;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = Some(max_depth);
        self
    }

    pub fn with_max_name_length(mut self, length: usize) -> Self {
        self.config.max_name_length = length;
        self
    }

    pub fn with_walk_retry_limit(mut self, attempts: usize) -> Self {
        self.config.walk_retry_limit = attempts;
        self
    }

    pub fn with_scan_batch_size(mut self, batch_size: usize) -> Self {
        self.config.scan_batch_size = batch_size;
        self
    }

    /// Build the configured manager.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidConfiguration`] if the configuration is invalid.
    pub fn build(self) -> BuildResult<OrganizationManager<S, P, R>> {
        self.config.validate()?;
        Ok(OrganizationManager::from_parts(
            self.storage,
            self.provisioner,
            self.permissions,
            self.config,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    #[test]
    fn test_default_config_is_valid() {
        let config = ManagerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_page_limit, 15);
        assert_eq!(config.max_page_limit, 100);
        assert_eq!(config.name_uniqueness, NameUniqueness::Hierarchy);
    }

    #[test]
    fn test_default_secrets_differ() {
        assert_ne!(
            ManagerConfig::default().cursor_secret,
            ManagerConfig::default().cursor_secret
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = ManagerConfig::default();
        config.default_page_limit = 200;
        assert!(config.validate().is_err());

        let mut config = ManagerConfig::default();
        config.cursor_secret = String::new();
        assert!(config.validate().is_err());

        let mut config = ManagerConfig::default();
        config.walk_retry_limit = 0;
        assert!(config.validate().is_err());

        let mut config = ManagerConfig::default();
        config.scan_batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = ManagerConfig {
            cursor_secret: "top-secret".to_string(),
            ..ManagerConfig::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("top-secret"));
    }

    #[test]
    fn test_builder_rejects_invalid_configuration() {
        let result = ManagerBuilder::new(InMemoryStorage::new())
            .with_max_page_limit(10)
            .with_default_page_limit(20)
            .build();
        assert!(matches!(
            result,
            Err(BuildError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_builder_applies_settings() {
        let manager = ManagerBuilder::new(InMemoryStorage::new())
            .with_max_depth(3)
            .with_max_name_length(32)
            .with_scan_batch_size(8)
            .build()
            .unwrap();
        let config = manager.config();
        assert_eq!(config.max_depth, Some(3));
        assert_eq!(config.max_name_length, 32);
        assert_eq!(config.scan_batch_size, 8);
    }
}
