//! Hierarchy queries derived from parent links.
//!
//! Depth is never stored; every answer here comes from walking parent links
//! (upwards) or child lists (downwards) one store call at a time. A walk
//! reads the store's structure version before and after it runs and is
//! repeated when the tree changed underneath it, so an answer always
//! reflects one consistent tree. After `retry_limit` unstable attempts the
//! walk gives up with [`ServerError::ConcurrentStructureChange`].
//!
//! Absence is reported as a value by the pure hierarchy queries (an unknown
//! id has no ancestors and depth [`DEPTH_NOT_FOUND`]). Broken structure
//! (cycles, parents that do not exist) is a server error.

use crate::error::{OrganizationError, OrganizationResult, ServerError};
use crate::model::Organization;
use crate::storage::OrganizationStorage;
use log::{debug, error};
use std::collections::HashSet;
use std::future::Future;

/// Depth reported for an organization that does not exist.
pub const DEPTH_NOT_FOUND: i32 = -1;

/// Walks the organization tree held by a store.
pub struct HierarchyResolver<'a, S> {
    storage: &'a S,
    retry_limit: usize,
}

impl<'a, S: OrganizationStorage> HierarchyResolver<'a, S> {
    pub fn new(storage: &'a S, retry_limit: usize) -> Self {
        Self {
            storage,
            retry_limit: retry_limit.max(1),
        }
    }

    async fn validated<T, F, Fut>(&self, mut walk: F) -> OrganizationResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = OrganizationResult<T>>,
    {
        for attempt in 1..=self.retry_limit {
            let before = self.storage.structure_version().await?;
            let result = walk().await;
            let after = self.storage.structure_version().await?;
            if before == after {
                return result;
            }
            debug!(
                "Hierarchy changed during walk (attempt {}/{}), retrying",
                attempt, self.retry_limit
            );
        }
        error!(
            "Hierarchy walk abandoned after {} unstable attempts",
            self.retry_limit
        );
        Err(ServerError::ConcurrentStructureChange {
            attempts: self.retry_limit,
        }
        .into())
    }

    async fn walk_to_root(&self, id: &str) -> OrganizationResult<Vec<String>> {
        let mut chain: Vec<String> = Vec::new();
        let mut visited = HashSet::new();
        let mut current = id.to_string();

        loop {
            let parent = match self.storage.parent_id(&current).await? {
                Some(parent) => parent,
                None if chain.is_empty() => return Ok(Vec::new()),
                None => {
                    let child = chain.last().map(String::as_str).unwrap_or(id);
                    error!(
                        "Organization '{}' references missing parent '{}'",
                        child, current
                    );
                    return Err(OrganizationError::invariant(format!(
                        "organization '{}' references missing parent '{}'",
                        child, current
                    )));
                }
            };
            if !visited.insert(current.clone()) {
                error!("Parent chain of '{}' loops at '{}'", id, current);
                return Err(OrganizationError::invariant(format!(
                    "parent chain of '{}' contains a cycle at '{}'",
                    id, current
                )));
            }
            chain.push(current);
            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }

        chain.reverse();
        Ok(chain)
    }

    /// Ids from the root down to `id` inclusive; empty when `id` is unknown.
    pub async fn ancestor_ids(&self, id: &str) -> OrganizationResult<Vec<String>> {
        self.validated(|| self.walk_to_root(id)).await
    }

    /// Number of edges between `id` and its root, or [`DEPTH_NOT_FOUND`].
    pub async fn depth(&self, id: &str) -> OrganizationResult<i32> {
        let chain = self.ancestor_ids(id).await?;
        Ok(depth_of_chain(&chain))
    }

    /// Edge distance between two organizations on one root-to-leaf branch.
    ///
    /// Symmetric: the order of the arguments does not matter.
    pub async fn relative_depth(&self, first: &str, second: &str) -> OrganizationResult<i32> {
        let (a, b) = self
            .validated(|| async move {
                let a = self.walk_to_root(first).await?;
                let b = self.walk_to_root(second).await?;
                Ok((a, b))
            })
            .await?;

        relative_distance(&a, &b).ok_or_else(|| {
            error!(
                "Organizations '{}' and '{}' are not on the same branch",
                first, second
            );
            ServerError::NotOnSameBranch {
                first: first.to_string(),
                second: second.to_string(),
            }
            .into()
        })
    }

    /// Parent of an existing organization; `None` for a root.
    pub async fn parent_id(&self, id: &str) -> OrganizationResult<Option<String>> {
        self.storage
            .parent_id(id)
            .await?
            .ok_or_else(|| OrganizationError::not_found("Organization", id))
    }

    /// Whether `ancestor` is a strict ancestor of `id`.
    pub async fn is_ancestor(&self, ancestor: &str, id: &str) -> OrganizationResult<bool> {
        let chain = self.ancestor_ids(id).await?;
        Ok(chain.len() > 1 && chain[..chain.len() - 1].iter().any(|a| a == ancestor))
    }

    async fn walk_down(
        &self,
        id: &str,
        recursive: bool,
    ) -> OrganizationResult<Vec<Vec<Organization>>> {
        let mut levels = Vec::new();
        let mut visited: HashSet<String> = HashSet::from([id.to_string()]);
        let mut frontier = vec![id.to_string()];

        while !frontier.is_empty() {
            let mut level = Vec::new();
            for parent in &frontier {
                for child in self.storage.children(parent).await? {
                    if !visited.insert(child.id.clone()) {
                        error!("Organization '{}' reached twice below '{}'", child.id, id);
                        return Err(OrganizationError::invariant(format!(
                            "subtree of '{}' contains a cycle at '{}'",
                            id, child.id
                        )));
                    }
                    level.push(child);
                }
            }
            if level.is_empty() {
                break;
            }
            frontier = level.iter().map(|o| o.id.clone()).collect();
            levels.push(level);
            if !recursive {
                break;
            }
        }

        Ok(levels)
    }

    /// Children of `id`, or every descendant breadth first when `recursive`.
    pub async fn descendants(
        &self,
        id: &str,
        recursive: bool,
    ) -> OrganizationResult<Vec<Organization>> {
        let levels = self.validated(|| self.walk_down(id, recursive)).await?;
        Ok(levels.into_iter().flatten().collect())
    }

    /// Number of levels below `id`; 0 for a leaf.
    pub async fn subtree_height(&self, id: &str) -> OrganizationResult<usize> {
        let levels = self.validated(|| self.walk_down(id, true)).await?;
        Ok(levels.len())
    }
}

/// Depth encoded by a root-to-node chain.
pub fn depth_of_chain(chain: &[String]) -> i32 {
    if chain.is_empty() {
        DEPTH_NOT_FOUND
    } else {
        (chain.len() - 1) as i32
    }
}

/// Distance between two root-to-node chains when one is a prefix of the other.
pub fn relative_distance(a: &[String], b: &[String]) -> Option<i32> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if long.starts_with(short) {
        Some((long.len() - short.len()) as i32)
    } else {
        None
    }
}
