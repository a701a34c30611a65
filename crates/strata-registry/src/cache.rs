//! Read-after-write bridge between a finalized upload and ledger finality.
//!
//! When an upload is finalized its reference is marked in flight here before
//! the ledger write is even attempted. Existence checks consult this table
//! first, so a client that pushes a blob and immediately checks for it sees
//! it. Entries expire after a fixed time-to-live; from then on only the
//! ledger answers.

use std::time::Duration;

use moka::future::Cache;
use strata_types::{Digest, TxId};

use crate::config::RegistryConfig;

/// Cache key. Scoped by repository so an upload to one artifact never
/// vouches for the same digest in another.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub org: String,
    pub artifact: String,
    pub digest: Digest,
}

impl CacheKey {
    pub fn new(org: impl Into<String>, artifact: impl Into<String>, digest: Digest) -> Self {
        Self {
            org: org.into(),
            artifact: artifact.into(),
            digest,
        }
    }
}

/// State of a finalized upload as far as this process knows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadStatus {
    /// Background publication dispatched, outcome unknown.
    InFlight,
    /// The ledger accepted the record; readers may not see it yet.
    Committed(TxId),
}

/// Concurrent, TTL-bounded table of recently finalized uploads.
///
/// Backed by [`moka::future::Cache`], which locks per shard, so unrelated
/// uploads never contend on one lock.
#[derive(Clone)]
pub struct ConsistencyCache {
    entries: Cache<CacheKey, UploadStatus>,
}

impl ConsistencyCache {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { entries }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(config.cache_ttl(), config.cache_capacity)
    }

    pub async fn mark_in_flight(&self, key: CacheKey) {
        self.entries.insert(key, UploadStatus::InFlight).await;
    }

    /// Record a successful submission. Keeps bridging until the entry
    /// expires, since submission is not visibility.
    pub async fn mark_committed(&self, key: CacheKey, id: TxId) {
        self.entries.insert(key, UploadStatus::Committed(id)).await;
    }

    /// Drop an entry early, e.g. after a failed publication.
    pub async fn invalidate(&self, key: &CacheKey) {
        self.entries.invalidate(key).await;
    }

    pub async fn status(&self, key: &CacheKey) -> Option<UploadStatus> {
        self.entries.get(key).await
    }

    /// Whether `key` should be reported as present.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.status(key).await.is_some()
    }

    /// Run expiry and eviction now instead of lazily.
    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }
}

impl std::fmt::Debug for ConsistencyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsistencyCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(artifact: &str) -> CacheKey {
        CacheKey::new("acme", artifact, Digest::from_sha256([7; 32]))
    }

    #[tokio::test]
    async fn in_flight_then_committed() {
        let cache = ConsistencyCache::new(Duration::from_secs(60), 100);
        assert!(!cache.contains(&key("web")).await);

        cache.mark_in_flight(key("web")).await;
        assert_eq!(cache.status(&key("web")).await, Some(UploadStatus::InFlight));

        let id = TxId::new("tx1").unwrap();
        cache.mark_committed(key("web"), id.clone()).await;
        assert_eq!(cache.status(&key("web")).await, Some(UploadStatus::Committed(id)));
    }

    #[tokio::test]
    async fn keys_are_scoped_by_repository() {
        let cache = ConsistencyCache::new(Duration::from_secs(60), 100);
        cache.mark_in_flight(key("web")).await;
        assert!(!cache.contains(&key("api")).await);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = ConsistencyCache::new(Duration::from_secs(60), 100);
        cache.mark_in_flight(key("web")).await;
        cache.invalidate(&key("web")).await;
        assert!(!cache.contains(&key("web")).await);
    }

    #[tokio::test]
    async fn entries_expire() {
        let cache = ConsistencyCache::new(Duration::from_millis(50), 100);
        cache.mark_in_flight(key("web")).await;
        assert!(cache.contains(&key("web")).await);

        tokio::time::sleep(Duration::from_millis(100)).await;
        cache.run_pending_tasks().await;
        assert!(!cache.contains(&key("web")).await);
        assert_eq!(cache.entry_count(), 0);
    }
}
