//! Organization manager: the operation surface over the hierarchy.
//!
//! # Module Organization
//!
//! * [`core`] - Core OrganizationManager struct, constructors and shared helpers
//! * [`builder`] - Configuration and the builder
//! * [`operations`] - Create, patch, update and delete
//! * [`queries`] - Lookups, listings, tenant resolution and hierarchy queries
//! * [`access`] - Permission and visibility extension points
//! * [`locks`] - Per-organization mutation locks

pub mod access;
pub mod builder;
pub mod core;
pub mod locks;
pub mod operations;
pub mod queries;


pub use access::{NoPermissions, OrganizationAuthorizer, PermissionResolver};
pub use builder::{ManagerBuilder, ManagerConfig, NameUniqueness};
pub use core::OrganizationManager;

use crate::model::BasicOrganization;
use crate::pagination::Page;

/// One page of a listing.
pub type OrganizationPage = Page<BasicOrganization>;
