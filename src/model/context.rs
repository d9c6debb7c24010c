//! Request context and query structures for organization operations.

use crate::error::OrganizationError;
use crate::pagination::SortKey;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Request context for organization operations.
///
/// Provides request tracking for logging. Optionally names the organization
/// the caller is acting on behalf of, which scopes hierarchy-relative
/// operations such as listing and in-hierarchy name checks.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request
    pub request_id: String,
    /// Organization the caller is acting for
    pub organization_id: Option<String>,
}

impl RequestContext {
    /// Create a new request context with a specific request ID.
    pub fn new(request_id: String) -> Self {
        Self {
            request_id,
            organization_id: None,
        }
    }

    /// Create a new request context with a generated request ID.
    pub fn with_generated_id() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Create a request context acting for an organization.
    pub fn with_organization(request_id: String, organization_id: impl Into<String>) -> Self {
        Self {
            request_id,
            organization_id: Some(organization_id.into()),
        }
    }

    /// Create a request context with generated ID acting for an organization.
    pub fn for_organization(organization_id: impl Into<String>) -> Self {
        Self::with_organization(Uuid::new_v4().to_string(), organization_id)
    }

    pub fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::with_generated_id()
    }
}

/// Direction of a sorted listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = OrganizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            other => Err(OrganizationError::bad_request(format!(
                "Invalid sort order '{}', expected asc or desc",
                other
            ))),
        }
    }
}

/// Query parameters for listing organizations.
///
/// Mirrors the list surface: limit, `after`/`before` cursors, sort order and
/// key, filter expression and recursion.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Maximum number of results to return
    pub limit: Option<usize>,
    /// Cursor of the page to continue after
    pub after: Option<String>,
    /// Cursor of the page to continue before
    pub before: Option<String>,
    pub sort_order: SortOrder,
    pub sort_by: SortKey,
    /// Filter expression
    pub filter: Option<String>,
    /// Include all descendants rather than direct children
    pub recursive: bool,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn with_before(mut self, cursor: impl Into<String>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    pub fn with_sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn with_sort_by(mut self, sort_by: SortKey) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

/// Optional sub-resources to hydrate when reading a single organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOptions {
    pub include_children: bool,
    pub include_permissions: bool,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_children(mut self) -> Self {
        self.include_children = true;
        self
    }

    pub fn with_permissions(mut self) -> Self {
        self.include_permissions = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Ascending);
        assert_eq!(
            "descending".parse::<SortOrder>().unwrap(),
            SortOrder::Descending
        );
        assert_eq!(
            "sideways".parse::<SortOrder>().unwrap_err().kind(),
            ErrorKind::BadRequest
        );
    }

    #[test]
    fn test_context_organization() {
        let context = RequestContext::for_organization("org-1");
        assert_eq!(context.organization_id(), Some("org-1"));
        assert!(!context.request_id.is_empty());
        assert!(RequestContext::default().organization_id().is_none());
    }

    #[test]
    fn test_list_query_builder() {
        let query = ListQuery::new()
            .with_limit(5)
            .with_filter("name sw A")
            .with_sort_order(SortOrder::Descending)
            .recursive(true);
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.filter.as_deref(), Some("name sw A"));
        assert!(query.recursive);
        assert!(query.after.is_none());
    }
}
