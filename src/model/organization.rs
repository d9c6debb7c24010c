//! Organization domain types.
//!
//! An [`Organization`] is a node in the tenant hierarchy. Every organization
//! except a root carries the id of its parent; depth is always derived from the
//! parent links and never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrganizationStatus {
    #[default]
    Active,
    Disabled,
}

impl OrganizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Disabled => "DISABLED",
        }
    }
}

impl fmt::Display for OrganizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrganizationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "DISABLED" => Ok(Self::Disabled),
            other => Err(format!(
                "Invalid organization status '{}', expected ACTIVE or DISABLED",
                other
            )),
        }
    }
}

/// A single key/value attribute attached to an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationAttribute {
    pub key: String,
    pub value: String,
}

impl OrganizationAttribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Child reference hydrated into an [`Organization`] read with children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildOrganization {
    pub id: String,
    pub name: String,
    pub status: OrganizationStatus,
}

impl From<&Organization> for ChildOrganization {
    fn from(org: &Organization) -> Self {
        Self {
            id: org.id.clone(),
            name: org.name.clone(),
            status: org.status,
        }
    }
}

/// An organization in the hierarchy.
///
/// `children` and `permissions` are response projections. They are only
/// populated when a read asks for them and are never persisted.
///
/// # Examples
///
/// ```
/// use organization_manager::model::{Organization, OrganizationStatus};
///
/// let org = Organization::new("Acme")
///     .with_description("Widgets and gadgets")
///     .with_attribute("region", "EU");
/// assert_eq!(org.status, OrganizationStatus::Active);
/// assert_eq!(org.attribute("region"), Some("EU"));
/// assert!(org.is_root());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Assigned by the manager on creation; ignored on input
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub status: OrganizationStatus,

    /// Parent organization id; `None` only for a root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Ordered attributes, keys unique
    #[serde(default)]
    pub attributes: Vec<OrganizationAttribute>,

    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub last_modified: DateTime<Utc>,

    /// Bumped by the store on every write
    #[serde(default)]
    pub version: u64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildOrganization>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
}

impl Organization {
    /// Create a new active root organization with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            name: name.into(),
            description: None,
            status: OrganizationStatus::Active,
            parent_id: None,
            attributes: Vec::new(),
            created: now,
            last_modified: now,
            version: 0,
            children: Vec::new(),
            permissions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_status(mut self, status: OrganizationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_active(&self) -> bool {
        self.status == OrganizationStatus::Active
    }

    /// Look up an attribute value by key.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.key == key)
            .map(|attr| attr.value.as_str())
    }

    /// Insert or overwrite an attribute, keeping the position of an existing key.
    ///
    /// Returns `true` when the key was newly added.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|attr| attr.key == key) {
            Some(existing) => {
                existing.value = value;
                false
            }
            None => {
                self.attributes.push(OrganizationAttribute { key, value });
                true
            }
        }
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attribute(&mut self, key: &str) -> Option<String> {
        let index = self.attributes.iter().position(|attr| attr.key == key)?;
        Some(self.attributes.remove(index).value)
    }

    /// Copy of this organization without response-only projections.
    pub fn without_projections(&self) -> Self {
        let mut org = self.clone();
        org.children.clear();
        org.permissions.clear();
        org
    }

    /// Whether the editable fields of two organizations are equal.
    pub fn same_content(&self, other: &Organization) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.status == other.status
            && self.parent_id == other.parent_id
            && self.attributes == other.attributes
    }
}

/// Lightweight organization projection used by list operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicOrganization {
    pub id: String,
    pub name: String,
    pub status: OrganizationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl From<&Organization> for BasicOrganization {
    fn from(org: &Organization) -> Self {
        Self {
            id: org.id.clone(),
            name: org.name.clone(),
            status: org.status,
            parent_id: org.parent_id.clone(),
            created: org.created,
            last_modified: org.last_modified,
        }
    }
}

impl From<Organization> for BasicOrganization {
    fn from(org: Organization) -> Self {
        Self::from(&org)
    }
}
