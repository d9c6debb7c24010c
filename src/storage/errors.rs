//! Failures of the backing store.
//!
//! Conditions a caller can correct (unknown id, children present, stale
//! version) are not errors at this level; they are reported through the
//! typed outcomes of the [`OrganizationStorage`](super::OrganizationStorage)
//! operations. Every `StorageError` surfaces as a server error.

use std::error::Error;
use std::fmt;
use std::time::Duration;

type BoxedSource = Box<dyn Error + Send + Sync>;

/// Errors raised by a storage backend.
#[derive(Debug)]
pub enum StorageError {
    /// The backend cannot be reached right now.
    Unavailable {
        reason: String,
        retry_after: Option<Duration>,
    },

    /// A store call did not finish in time.
    Timeout { operation: String, elapsed: Duration },

    /// Stored records contradict each other, e.g. a child index entry
    /// without a record.
    DataCorruption {
        organization_id: String,
        details: String,
    },

    /// Any other backend failure, with the underlying cause.
    Backend {
        operation: String,
        source: Option<BoxedSource>,
    },
}

impl StorageError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
            retry_after: None,
        }
    }

    /// Unavailable with a hint on when to try again.
    pub fn unavailable_for(reason: impl Into<String>, retry_after: Duration) -> Self {
        Self::Unavailable {
            reason: reason.into(),
            retry_after: Some(retry_after),
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed,
        }
    }

    pub fn data_corruption(organization_id: impl Into<String>, details: impl Into<String>) -> Self {
        Self::DataCorruption {
            organization_id: organization_id.into(),
            details: details.into(),
        }
    }

    /// Wrap a backend error raised while running `operation`.
    pub fn backend(operation: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        Self::Backend {
            operation: operation.into(),
            source: Some(source.into()),
        }
    }

    /// Whether repeating the call later may succeed.
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable {
                reason,
                retry_after: Some(after),
            } => write!(f, "organization store unavailable ({}), retry in {:?}", reason, after),
            Self::Unavailable { reason, .. } => {
                write!(f, "organization store unavailable ({})", reason)
            }
            Self::Timeout { operation, elapsed } => {
                write!(f, "store call '{}' timed out after {:?}", operation, elapsed)
            }
            Self::DataCorruption {
                organization_id,
                details,
            } => write!(
                f,
                "inconsistent records for organization '{}': {}",
                organization_id, details
            ),
            Self::Backend { operation, source } => match source {
                Some(cause) => write!(f, "store call '{}' failed: {}", operation, cause),
                None => write!(f, "store call '{}' failed", operation),
            },
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Backend {
                source: Some(cause),
                ..
            } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            StorageError::unavailable("connection refused").to_string(),
            "organization store unavailable (connection refused)"
        );
        assert_eq!(
            StorageError::data_corruption("org-1", "dangling child entry").to_string(),
            "inconsistent records for organization 'org-1': dangling child entry"
        );
        assert!(
            StorageError::unavailable_for("failover", Duration::from_secs(5))
                .to_string()
                .contains("retry in 5s")
        );
    }

    #[test]
    fn test_temporary_failures() {
        assert!(StorageError::timeout("scan", Duration::from_secs(30)).is_temporary());
        assert!(StorageError::unavailable("down").is_temporary());
        assert!(!StorageError::data_corruption("x", "y").is_temporary());
    }

    #[test]
    fn test_backend_source() {
        let io = std::io::Error::other("disk gone");
        let error = StorageError::backend("insert", io);
        assert!(error.source().is_some());
        assert_eq!(error.to_string(), "store call 'insert' failed: disk gone");
        assert!(StorageError::unavailable("down").source().is_none());
    }
}
