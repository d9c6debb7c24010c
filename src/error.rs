//! Error types for organization management operations.
//!
//! Errors fall into two tiers. [`ClientError`] covers conditions the caller can
//! correct (malformed input, unknown ids, conflicting state) and is surfaced
//! verbatim. [`ServerError`] covers store failures and broken tree invariants;
//! callers should treat these as opaque failures.

use crate::storage::StorageError;

/// Main error type for organization management operations.
#[derive(Debug, thiserror::Error)]
pub enum OrganizationError {
    /// Caller-correctable error
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Server-side failure
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Errors the caller can correct and retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Malformed filter, cursor, patch or organization payload
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// An id, name or tenant could not be resolved
    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    /// The request conflicts with the current state (duplicate name, non-empty subtree)
    #[error("Conflict: {message}")]
    Conflict { message: String },
}

/// Server-side failures. These are logged with full context and must not be
/// handled by caller-side recovery.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The backing store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The stored tree violates a structural invariant (cycle, dangling parent)
    #[error("Hierarchy invariant violated: {message}")]
    InvariantViolation { message: String },

    /// The organization changed between read and write
    #[error("Organization '{id}' was modified concurrently (expected version {expected}, found {actual})")]
    ConcurrentModification {
        id: String,
        expected: u64,
        actual: u64,
    },

    /// The tree structure kept changing while it was being walked
    #[error("Hierarchy changed during traversal after {attempts} attempts")]
    ConcurrentStructureChange { attempts: usize },

    /// A tenant binding already exists for the organization, domain or tenant id
    #[error("Tenant binding for organization '{organization_id}' conflicts with an existing binding ({detail})")]
    TenantRebinding {
        organization_id: String,
        detail: String,
    },

    /// Relative depth requested for organizations on different branches
    #[error("Organizations '{first}' and '{second}' are not on the same branch")]
    NotOnSameBranch { first: String, second: String },

    /// The tenant provisioner failed to produce a binding
    #[error("Tenant provisioning failed: {message}")]
    Provisioning { message: String },
}

/// Coarse classification of an [`OrganizationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Conflict,
    Server,
}

impl OrganizationError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        ClientError::BadRequest {
            message: message.into(),
        }
        .into()
    }

    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        ClientError::NotFound {
            entity: entity.into(),
            key: key.into(),
        }
        .into()
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        ClientError::Conflict {
            message: message.into(),
        }
        .into()
    }

    /// Create an invariant violation error
    pub fn invariant(message: impl Into<String>) -> Self {
        ServerError::InvariantViolation {
            message: message.into(),
        }
        .into()
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Client(ClientError::BadRequest { .. }) => ErrorKind::BadRequest,
            Self::Client(ClientError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Client(ClientError::Conflict { .. }) => ErrorKind::Conflict,
            Self::Server(_) => ErrorKind::Server,
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Client(_))
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Server(_))
    }
}

impl From<StorageError> for OrganizationError {
    fn from(error: StorageError) -> Self {
        Self::Server(ServerError::Storage(error))
    }
}

/// Errors that can occur while building an [`OrganizationManager`](crate::OrganizationManager).
///
/// These are configuration mistakes and should surface during startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

pub type OrganizationResult<T> = Result<T, OrganizationError>;
pub type BuildResult<T> = Result<T, BuildError>;
