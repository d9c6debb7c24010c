//! Core data types: organizations, their list projections, request context
//! and query parameters.

pub mod context;
pub mod organization;

pub use context::{ListQuery, ReadOptions, RequestContext, SortOrder};
pub use organization::{
    BasicOrganization, ChildOrganization, Organization, OrganizationAttribute, OrganizationStatus,
};
