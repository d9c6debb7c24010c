//! Organization hierarchy management for multi-tenant identity systems.
//!
//! Organizations form a forest: each one has at most one parent, and each
//! root starts an independent hierarchy. Every organization is bound to
//! exactly one tenant. The crate provides an async manager over pluggable
//! storage with hierarchy queries, cursor pagination and patch operations.
//!
//! # Core Components
//!
//! - [`OrganizationManager`] - Operation surface for creating, reading, patching and listing organizations
//! - [`OrganizationStorage`] - Trait for implementing storage backends
//! - [`hierarchy::HierarchyResolver`] - Depth and ancestry computed from parent links
//! - [`pagination::CursorCodec`] - Signed, opaque pagination cursors
//! - [`patch::PatchEngine`] - Atomic application of patch operations
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use organization_manager::{ManagerBuilder, Organization, RequestContext};
//! use organization_manager::storage::InMemoryStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ManagerBuilder::new(InMemoryStorage::new())
//!     .with_cursor_secret("change-me")
//!     .build()?;
//!
//! let context = RequestContext::with_generated_id();
//! let root = manager
//!     .add_organization(&context, Organization::new("Acme"))
//!     .await?;
//! let tenant = manager.resolve_tenant_domain(&context, &root.id).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod filter;
pub mod hierarchy;
pub mod manager;
pub mod model;
pub mod pagination;
pub mod patch;
pub mod storage;
pub mod tenant;

// Re-export commonly used types for convenience
pub use error::{
    BuildError, BuildResult, ClientError, ErrorKind, OrganizationError, OrganizationResult,
    ServerError,
};
pub use manager::{
    ManagerBuilder, ManagerConfig, NameUniqueness, NoPermissions, OrganizationAuthorizer,
    OrganizationManager, OrganizationPage, PermissionResolver,
};
pub use model::{
    BasicOrganization, ChildOrganization, ListQuery, Organization, OrganizationAttribute,
    OrganizationStatus, ReadOptions, RequestContext, SortOrder,
};
pub use pagination::{Page, SortKey};
pub use patch::{PatchOp, PatchOperation};
pub use storage::{InMemoryStorage, OrganizationStorage};
pub use tenant::{SequentialTenantProvisioner, TenantBinding, TenantProvisioner};
