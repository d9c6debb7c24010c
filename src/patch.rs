//! Partial updates of organizations through ordered patch operations.
//!
//! A patch is a list of `{op, path, value}` operations applied in order to a
//! copy of the stored organization. Either every operation applies or the
//! whole batch is rejected and the stored organization is untouched.
//!
//! Supported paths:
//!
//! | path                | add | replace | remove |
//! |---------------------|-----|---------|--------|
//! | `/name`             | yes | yes     | no     |
//! | `/description`      | yes | yes     | yes    |
//! | `/status`           | yes | yes     | no     |
//! | `/attributes/<key>` | yes | yes     | yes    |
//!
//! `/id`, `/parentId`, `/created`, `/lastModified` and `/version` are
//! read-only. Attribute keys follow JSON pointer escaping (`~1` for `/`,
//! `~0` for `~`).

use crate::error::{OrganizationError, OrganizationResult};
use crate::model::{Organization, OrganizationStatus};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Kind of patch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
}

impl PatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
        }
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatchOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            "replace" => Ok(Self::Replace),
            other => Err(format!(
                "Unsupported patch operation '{}', expected add, remove or replace",
                other
            )),
        }
    }
}

impl<'de> Deserialize<'de> for PatchOp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            value: Some(value.into()),
        }
    }

    pub fn replace(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value: Some(value.into()),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            value: None,
        }
    }

    /// Parse a JSON array of operations.
    pub fn parse_list(json: &str) -> OrganizationResult<Vec<PatchOperation>> {
        serde_json::from_str(json)
            .map_err(|e| OrganizationError::bad_request(format!("Malformed patch request: {}", e)))
    }

    /// Convert an already parsed JSON array of operations.
    pub fn from_value(value: Value) -> OrganizationResult<Vec<PatchOperation>> {
        serde_json::from_value(value)
            .map_err(|e| OrganizationError::bad_request(format!("Malformed patch request: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatchTarget {
    Name,
    Description,
    Status,
    Attribute(String),
}

const READ_ONLY_PATHS: &[&str] = &["id", "parentId", "created", "lastModified", "version"];

impl PatchTarget {
    fn parse(path: &str) -> OrganizationResult<Self> {
        let trimmed = path.trim();
        let Some(pointer) = trimmed.strip_prefix('/') else {
            return Err(OrganizationError::bad_request(format!(
                "Patch path '{}' must start with '/'",
                path
            )));
        };

        if let Some(key) = pointer.strip_prefix("attributes/") {
            if key.is_empty() {
                return Err(OrganizationError::bad_request(
                    "Patch path '/attributes/' is missing the attribute key",
                ));
            }
            return Ok(Self::Attribute(unescape(key)));
        }

        match pointer {
            "name" => Ok(Self::Name),
            "description" => Ok(Self::Description),
            "status" => Ok(Self::Status),
            other if READ_ONLY_PATHS.contains(&other) => Err(OrganizationError::bad_request(
                format!("Patch path '{}' is read-only", path),
            )),
            _ => Err(OrganizationError::bad_request(format!(
                "Unsupported patch path '{}'",
                path
            ))),
        }
    }
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

fn string_value<'v>(operation: &'v PatchOperation) -> OrganizationResult<&'v str> {
    match &operation.value {
        Some(Value::String(value)) => Ok(value),
        Some(other) => Err(OrganizationError::bad_request(format!(
            "Patch value for '{}' must be a string, got {}",
            operation.path, other
        ))),
        None => Err(OrganizationError::bad_request(format!(
            "Patch operation '{}' on '{}' requires a value",
            operation.op, operation.path
        ))),
    }
}

/// Applies patch operations to organization snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchEngine;

impl PatchEngine {
    /// Apply `operations` in order to a copy of `organization`.
    ///
    /// The first invalid operation rejects the whole batch.
    pub fn apply(
        organization: &Organization,
        operations: &[PatchOperation],
    ) -> OrganizationResult<Organization> {
        let mut candidate = organization.without_projections();
        for operation in operations {
            Self::apply_one(&mut candidate, operation)?;
        }
        Ok(candidate)
    }

    fn apply_one(org: &mut Organization, operation: &PatchOperation) -> OrganizationResult<()> {
        let target = PatchTarget::parse(&operation.path)?;

        match (operation.op, target) {
            (PatchOp::Remove, PatchTarget::Name) | (PatchOp::Remove, PatchTarget::Status) => {
                Err(OrganizationError::bad_request(format!(
                    "Patch path '{}' is required and cannot be removed",
                    operation.path
                )))
            }
            (PatchOp::Remove, PatchTarget::Description) => {
                org.description = None;
                Ok(())
            }
            (PatchOp::Remove, PatchTarget::Attribute(key)) => match org.remove_attribute(&key) {
                Some(_) => Ok(()),
                None => Err(OrganizationError::bad_request(format!(
                    "Attribute '{}' does not exist and cannot be removed",
                    key
                ))),
            },
            (PatchOp::Add | PatchOp::Replace, PatchTarget::Name) => {
                let name = string_value(operation)?.trim();
                if name.is_empty() {
                    return Err(OrganizationError::bad_request(
                        "Organization name must not be blank",
                    ));
                }
                org.name = name.to_string();
                Ok(())
            }
            (PatchOp::Add | PatchOp::Replace, PatchTarget::Description) => {
                org.description = Some(string_value(operation)?.to_string());
                Ok(())
            }
            (PatchOp::Add | PatchOp::Replace, PatchTarget::Status) => {
                org.status = string_value(operation)?
                    .parse::<OrganizationStatus>()
                    .map_err(OrganizationError::bad_request)?;
                Ok(())
            }
            (PatchOp::Add | PatchOp::Replace, PatchTarget::Attribute(key)) => {
                let value = string_value(operation)?;
                org.set_attribute(key, value);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn acme() -> Organization {
        let mut org = Organization::new("Acme")
            .with_description("Widgets")
            .with_attribute("region", "EU");
        org.id = "acme".to_string();
        org
    }

    #[test]
    fn test_description_and_attribute() {
        let ops = vec![
            PatchOperation::replace("/description", "Gadgets"),
            PatchOperation::add("/attributes/tier", "gold"),
        ];
        let patched = PatchEngine::apply(&acme(), &ops).unwrap();
        assert_eq!(patched.description.as_deref(), Some("Gadgets"));
        assert_eq!(patched.attribute("tier"), Some("gold"));
        assert_eq!(patched.attribute("region"), Some("EU"));
    }

    #[test]
    fn test_invalid_path_rejects_batch() {
        let original = acme();
        let ops = vec![
            PatchOperation::replace("/description", "Gadgets"),
            PatchOperation::replace("/bogus", "x"),
        ];
        let error = PatchEngine::apply(&original, &ops).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::BadRequest);
        assert_eq!(original.description.as_deref(), Some("Widgets"));
    }

    #[test]
    fn test_remove_missing_attribute_is_bad_request() {
        let error = PatchEngine::apply(&acme(), &[PatchOperation::remove("/attributes/nope")])
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn test_read_only_and_required_paths() {
        for path in ["/id", "/parentId", "/created", "/lastModified", "/version"] {
            let error = PatchEngine::apply(&acme(), &[PatchOperation::replace(path, "x")])
                .unwrap_err();
            assert!(error.to_string().contains("read-only"), "{}", path);
        }
        assert!(PatchEngine::apply(&acme(), &[PatchOperation::remove("/name")]).is_err());
        assert!(PatchEngine::apply(&acme(), &[PatchOperation::remove("/status")]).is_err());
        assert!(PatchEngine::apply(&acme(), &[PatchOperation::replace("/name", "   ")]).is_err());
    }

    #[test]
    fn test_value_validation() {
        let ops = [PatchOperation::replace("/status", "disabled")];
        let patched = PatchEngine::apply(&acme(), &ops).unwrap();
        assert_eq!(patched.status, OrganizationStatus::Disabled);

        let bad_status = [PatchOperation::replace("/status", "gone")];
        assert!(PatchEngine::apply(&acme(), &bad_status).is_err());
        assert!(PatchEngine::apply(&acme(), &[PatchOperation::replace("/name", 42)]).is_err());

        let missing_value = PatchOperation {
            op: PatchOp::Add,
            path: "/description".to_string(),
            value: None,
        };
        assert!(PatchEngine::apply(&acme(), &[missing_value]).is_err());
    }

    #[test]
    fn test_empty_and_repeated_patches() {
        let original = acme();
        assert!(PatchEngine::apply(&original, &[]).unwrap().same_content(&original));

        let op = [PatchOperation::replace("/name", "Acme Corp")];
        let once = PatchEngine::apply(&original, &op).unwrap();
        let twice = PatchEngine::apply(&once, &op).unwrap();
        assert!(once.same_content(&twice));
    }

    #[test]
    fn test_remove_description_and_escaped_key() {
        let mut org = acme();
        org.set_attribute("a/b", "slash");
        let ops = [
            PatchOperation::remove("/description"),
            PatchOperation::remove("/attributes/a~1b"),
        ];
        let patched = PatchEngine::apply(&org, &ops).unwrap();
        assert!(patched.description.is_none());
        assert!(patched.attribute("a/b").is_none());
    }

    #[test]
    fn test_parse_list() {
        let ops = PatchOperation::parse_list(
            r#"[{"op": "REPLACE", "path": "/name", "value": "New"},
                {"op": "Remove", "path": "/attributes/region"}]"#,
        )
        .unwrap();
        assert_eq!(ops[0].op, PatchOp::Replace);
        assert_eq!(ops[1], PatchOperation::remove("/attributes/region"));

        let error = PatchOperation::parse_list(r#"[{"op": "move", "path": "/name"}]"#).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::BadRequest);

        let ops = PatchOperation::from_value(json!([
            {"op": "add", "path": "/description", "value": "d"}
        ]))
        .unwrap();
        assert_eq!(ops.len(), 1);
    }
}
