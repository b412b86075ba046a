//! In-memory record of the Jobs this process submitted
//!
//! Advisory bookkeeping only: entries are never removed, and the cleanup pass
//! works from cluster labels, not from this map.
//!
//! Ids are case-insensitive, matching the lowercased Job names derived from
//! them: `ABC` and `abc` share one entry.

use std::collections::HashMap;

use k8s_openapi::api::batch::v1::Job;
use tokio::sync::{RwLock, RwLockWriteGuard};

/// Queue entry id → submitted Job.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the Job recorded for `id`
    pub async fn get(&self, id: &str) -> Option<Job> {
        self.jobs.read().await.get(&key(id)).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.jobs.read().await.contains_key(&key(id))
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Take exclusive access for a record-then-submit sequence.
    ///
    /// Other readers and writers wait until the returned guard is dropped.
    pub(crate) async fn lock(&self) -> RegistryGuard<'_> {
        RegistryGuard {
            jobs: self.jobs.write().await,
        }
    }
}

/// Exclusive write access to the registry.
pub(crate) struct RegistryGuard<'a> {
    jobs: RwLockWriteGuard<'a, HashMap<String, Job>>,
}

impl RegistryGuard<'_> {
    /// Record (or replace) the Job for `id`
    pub(crate) fn record(&mut self, id: &str, job: Job) {
        self.jobs.insert(key(id), job);
    }
}

fn key(id: &str) -> String {
    id.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn named(name: &str) -> Job {
        let mut job = Job::default();
        job.metadata.name = Some(name.to_string());
        job
    }

    #[tokio::test]
    async fn record_then_replace() {
        let registry = JobRegistry::new();
        assert!(registry.is_empty().await);

        {
            let mut guard = registry.lock().await;
            guard.record("a", named("derived"));
            guard.record("a", named("created"));
        }

        assert_eq!(registry.len().await, 1);
        assert!(registry.contains("a").await);
        assert_eq!(
            registry.get("a").await.unwrap().metadata.name.as_deref(),
            Some("created")
        );
        assert!(registry.get("b").await.is_none());
    }

    #[tokio::test]
    async fn concurrent_writers_do_not_lose_entries() {
        let registry = Arc::new(JobRegistry::new());

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let mut guard = registry.lock().await;
                    guard.record(&format!("id-{i:02}"), named(&format!("job-{i}")));
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.len().await, 32);
        assert!(registry.contains("id-00").await);
        assert!(registry.contains("id-31").await);
    }

    #[tokio::test]
    async fn ids_differing_in_case_share_an_entry() {
        let registry = JobRegistry::new();
        registry.lock().await.record("ABC", named("first"));
        registry.lock().await.record("abc", named("second"));

        assert_eq!(registry.len().await, 1);
        assert!(registry.contains("Abc").await);
        assert_eq!(
            registry.get("ABC").await.unwrap().metadata.name.as_deref(),
            Some("second")
        );
    }

    #[tokio::test]
    async fn get_returns_a_copy() {
        let registry = JobRegistry::new();
        registry.lock().await.record("a", named("original"));

        let mut copy = registry.get("a").await.unwrap();
        copy.metadata.name = Some("mutated".to_string());

        assert_eq!(
            registry.get("a").await.unwrap().metadata.name.as_deref(),
            Some("original")
        );
    }
}
