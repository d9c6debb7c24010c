//! Per-organization serialization of mutations.
//!
//! Each organization id maps to an async mutex while someone holds or waits
//! for it. The table only keeps weak references, so entries disappear once
//! the last guard for an id is dropped and are pruned on the next acquire.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Guard holding the mutation lock of one or more organizations.
#[derive(Debug)]
pub struct MutationGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

/// Table of per-organization mutation locks.
#[derive(Debug, Default)]
pub struct MutationLocks {
    entries: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl MutationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn handle(&self, id: &str) -> Arc<Mutex<()>> {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.strong_count() > 0);
        if let Some(existing) = entries.get(id).and_then(Weak::upgrade) {
            return existing;
        }
        let created = Arc::new(Mutex::new(()));
        entries.insert(id.to_string(), Arc::downgrade(&created));
        created
    }

    /// Lock one organization.
    pub async fn acquire(&self, id: &str) -> MutationGuard {
        self.acquire_all(&[id]).await
    }

    /// Lock several organizations, always in sorted order so that two
    /// callers locking overlapping sets cannot deadlock.
    pub async fn acquire_all(&self, ids: &[&str]) -> MutationGuard {
        let mut sorted: Vec<&str> = ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for id in sorted {
            let handle = self.handle(id).await;
            guards.push(handle.lock_owned().await);
        }
        MutationGuard { _guards: guards }
    }

    /// Number of ids currently locked or waited for.
    pub async fn active(&self) -> usize {
        let entries = self.entries.lock().await;
        entries
            .values()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }
}
