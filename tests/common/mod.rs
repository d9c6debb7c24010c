//! Shared helpers for the integration tests.
//!
//! Builds managers over in-memory storage and seeds small organization
//! trees so each test can focus on the behavior it checks.

#![allow(dead_code)]

use organization_manager::{
    InMemoryStorage, ManagerBuilder, Organization, OrganizationManager, RequestContext,
};
use std::collections::HashMap;

pub type TestManager = OrganizationManager<InMemoryStorage>;

/// Initialize logging once; repeated calls are ignored.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A manager with a fixed cursor secret and default settings.
pub fn test_manager() -> TestManager {
    init_logging();
    ManagerBuilder::new(InMemoryStorage::new())
        .with_cursor_secret("integration-test-secret")
        .build()
        .expect("default test configuration is valid")
}

pub fn context() -> RequestContext {
    RequestContext::new(format!("it-{}", uuid::Uuid::new_v4()))
}

/// Create an organization and return it, panicking on failure.
pub async fn create(manager: &TestManager, name: &str, parent: Option<&str>) -> Organization {
    let mut organization = Organization::new(name);
    organization.parent_id = parent.map(str::to_string);
    manager
        .add_organization(&context(), organization)
        .await
        .unwrap_or_else(|e| panic!("failed to create '{}': {}", name, e))
}

/// Build a tree from `(name, parent name)` pairs listed parents first.
///
/// Returns the ids keyed by name.
pub async fn build_tree(
    manager: &TestManager,
    layout: &[(&str, Option<&str>)],
) -> HashMap<String, String> {
    let mut ids: HashMap<String, String> = HashMap::new();
    for (name, parent) in layout {
        let parent_id = parent.map(|p| ids[p].clone());
        let org = create(manager, name, parent_id.as_deref()).await;
        ids.insert(name.to_string(), org.id);
    }
    ids
}

/// A single chain `Level 0 → Level 1 → ... → Level {depth}`; returns ids root first.
pub async fn build_chain(manager: &TestManager, depth: usize) -> Vec<String> {
    let mut ids: Vec<String> = Vec::with_capacity(depth + 1);
    for level in 0..=depth {
        let parent = ids.last().map(String::as_str);
        let org = create(manager, &format!("Level {}", level), parent).await;
        ids.push(org.id);
    }
    ids
}
