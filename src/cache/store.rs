//! Edge response cache store.
//!
//! The store wraps a pluggable key/value backend and layers HTTP cache
//! semantics on top: freshness windows, content-hash ETags, Cache-Control
//! assembly. Every backend operation runs under a short timeout and fails
//! open — a broken cache degrades to "uncached", never to a failed request.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::warn;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock;
use super::policy::CachePolicy;

pub const CACHE_STATUS_HEADER: &str = "x-cache-status";
pub const CACHE_CAPTURED_HEADER: &str = "x-cache-captured-at";

/// Whether a response was served from the edge cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

/// A stored response. Entries are replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub body: Bytes,
    pub status: u16,
    /// Original response headers, order preserved, stored verbatim.
    pub headers: Vec<(String, String)>,
    pub created_at: OffsetDateTime,
    pub fresh_until: OffsetDateTime,
    pub stale_until: OffsetDateTime,
}

impl CacheEntry {
    pub fn is_fresh_at(&self, now: OffsetDateTime) -> bool {
        now < self.fresh_until
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.stale_until
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Key/value backend behind the store. Implementations are free to evict
/// at will; the store never treats absence as an error.
#[async_trait]
pub trait EdgeCacheBackend: Send + Sync {
    async fn fetch(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;
    async fn store(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError>;
    async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError>;
}

/// In-process LRU backend. Stands in for the distributed edge cache in
/// tests and single-node deployments.
pub struct MemoryEdgeCache {
    entries: std::sync::Mutex<lru::LruCache<CacheKey, CacheEntry>>,
}

impl MemoryEdgeCache {
    pub fn new(capacity: std::num::NonZeroUsize) -> Self {
        Self {
            entries: std::sync::Mutex::new(lru::LruCache::new(capacity)),
        }
    }
}

#[async_trait]
impl EdgeCacheBackend for MemoryEdgeCache {
    async fn fetch(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let mut entries = lock::acquire(&self.entries);
        Ok(entries.get(key).cloned())
    }

    async fn store(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError> {
        let mut entries = lock::acquire(&self.entries);
        entries.put(key, entry);
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let mut entries = lock::acquire(&self.entries);
        Ok(entries.pop(key).is_some())
    }
}

/// The edge store handed to handlers: backend + timeout + HTTP semantics.
pub struct TieredCacheStore {
    backend: Box<dyn EdgeCacheBackend>,
    op_timeout: Duration,
}

impl TieredCacheStore {
    pub fn new(backend: Box<dyn EdgeCacheBackend>, config: &CacheConfig) -> Self {
        Self {
            backend,
            op_timeout: config.op_timeout,
        }
    }

    /// Look up an entry. Stale entries are a miss: the advertised
    /// stale-while-revalidate window is for downstream caches, not for
    /// this store. Entries past their stale window are dropped eagerly.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let fetched = match self.with_timeout(self.backend.fetch(key)).await {
            Ok(found) => found,
            Err(err) => {
                warn!(%key, error = %err, "cache fetch failed, treating as miss");
                metrics::counter!("hireboard_cache_errors_total", "op" => "fetch").increment(1);
                return None;
            }
        };

        let entry = fetched?;
        let now = OffsetDateTime::now_utc();
        if entry.is_fresh_at(now) {
            return Some(entry);
        }
        if entry.is_expired_at(now) {
            // Fully expired, reclaim the slot.
            if let Err(err) = self.with_timeout(self.backend.remove(key)).await {
                warn!(%key, error = %err, "failed to drop expired cache entry");
            }
        }
        None
    }

    /// Store a response under `key`, computing freshness windows and the
    /// headers the entry will replay: Cache-Control, a content-hash ETag,
    /// and the capture timestamp. Original headers are preserved verbatim.
    ///
    /// Errors are absorbed: a failed put returns the entry that would have
    /// been stored so the caller can still serve it.
    pub async fn put(
        &self,
        key: CacheKey,
        body: Bytes,
        status: u16,
        headers: Vec<(String, String)>,
        policy: &CachePolicy,
    ) -> CacheEntry {
        let now = OffsetDateTime::now_utc();
        let fresh_until = now + policy.fresh_for();
        let stale_until = fresh_until + policy.stale_while_revalidate;

        let mut stored_headers = headers;
        upsert_header(
            &mut stored_headers,
            "cache-control",
            policy.cache_control_header(),
        );
        upsert_header(&mut stored_headers, "etag", content_etag(&body));
        upsert_header(
            &mut stored_headers,
            CACHE_CAPTURED_HEADER,
            now.unix_timestamp().to_string(),
        );

        let entry = CacheEntry {
            body,
            status,
            headers: stored_headers,
            created_at: now,
            fresh_until,
            stale_until,
        };

        if let Err(err) = self
            .with_timeout(self.backend.store(key.clone(), entry.clone()))
            .await
        {
            warn!(%key, error = %err, "cache store failed, serving uncached");
            metrics::counter!("hireboard_cache_errors_total", "op" => "store").increment(1);
        }
        entry
    }

    /// Best-effort delete; absence is not an error.
    pub async fn delete(&self, key: &CacheKey) -> bool {
        match self.with_timeout(self.backend.remove(key)).await {
            Ok(removed) => removed,
            Err(err) => {
                warn!(%key, error = %err, "cache delete failed");
                metrics::counter!("hireboard_cache_errors_total", "op" => "remove").increment(1);
                false
            }
        }
    }

    async fn with_timeout<T>(
        &self,
        op: impl std::future::Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        match tokio::time::timeout(self.op_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.op_timeout)),
        }
    }
}

/// Strong ETag from a content hash of the body alone.
fn content_etag(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("\"{}\"", hex::encode(&digest[..16]))
}

fn upsert_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    if let Some(slot) = headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        slot.1 = value;
    } else {
        headers.push((name.to_string(), value));
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::cache::keys::{CacheKeyDeriver, ScopeContext};
    use crate::domain::types::Role;

    fn store() -> TieredCacheStore {
        let config = CacheConfig::default();
        TieredCacheStore::new(
            Box::new(MemoryEdgeCache::new(NonZeroUsize::new(64).unwrap())),
            &config,
        )
    }

    fn key(path: &str) -> CacheKey {
        CacheKeyDeriver::new()
            .derive(path, "", &ScopeContext::new(Role::Anonymous, None))
            .unwrap()
    }

    #[tokio::test]
    async fn put_then_get_returns_identical_body_and_headers() {
        let store = store();
        let key = key("/jobs");
        let body = Bytes::from_static(b"{\"jobs\":[]}");
        let headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            (
                "access-control-allow-origin".to_string(),
                "*".to_string(),
            ),
        ];

        store
            .put(
                key.clone(),
                body.clone(),
                200,
                headers,
                &CachePolicy::public_listing(),
            )
            .await;

        let entry = store.get(&key).await.unwrap();
        assert_eq!(entry.body, body);
        assert_eq!(entry.status, 200);
        assert_eq!(entry.header("content-type"), Some("application/json"));
        assert_eq!(entry.header("access-control-allow-origin"), Some("*"));
        assert!(entry.header("etag").is_some());
        assert!(entry.header("cache-control").is_some());
    }

    #[tokio::test]
    async fn stale_entry_is_a_miss() {
        let store = store();
        let key = key("/jobs");
        let mut entry = store
            .put(
                key.clone(),
                Bytes::from_static(b"x"),
                200,
                vec![],
                &CachePolicy::public_listing(),
            )
            .await;

        // Rewind the windows so the entry is past staleUntil.
        let past = OffsetDateTime::now_utc() - Duration::from_secs(10);
        entry.fresh_until = past;
        entry.stale_until = past;
        store
            .backend
            .store(key.clone(), entry)
            .await
            .unwrap();

        assert!(store.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn swr_window_entry_is_a_miss_but_retained() {
        let store = store();
        let key = key("/jobs");
        let mut entry = store
            .put(
                key.clone(),
                Bytes::from_static(b"x"),
                200,
                vec![],
                &CachePolicy::public_listing(),
            )
            .await;

        // Freshness expired, stale window still open.
        entry.fresh_until = OffsetDateTime::now_utc() - Duration::from_secs(5);
        entry.stale_until = OffsetDateTime::now_utc() + Duration::from_secs(3600);
        store.backend.store(key.clone(), entry).await.unwrap();

        // The caller sees a miss, but the entry is retained for the
        // downstream revalidation window.
        assert!(store.get(&key).await.is_none());
        assert!(store.backend.fetch(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_of_absent_key_is_false_not_error() {
        let store = store();
        assert!(!store.delete(&key("/nothing")).await);
    }

    #[test]
    fn etag_tracks_content_not_headers() {
        let a = content_etag(b"body-one");
        let b = content_etag(b"body-one");
        let c = content_etag(b"body-two");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with('"') && a.ends_with('"'));
    }

    #[tokio::test]
    async fn put_replaces_previous_entry_wholesale() {
        let store = store();
        let key = key("/jobs");
        store
            .put(
                key.clone(),
                Bytes::from_static(b"old"),
                200,
                vec![("x-old".to_string(), "1".to_string())],
                &CachePolicy::public_listing(),
            )
            .await;
        store
            .put(
                key.clone(),
                Bytes::from_static(b"new"),
                200,
                vec![],
                &CachePolicy::public_listing(),
            )
            .await;

        let entry = store.get(&key).await.unwrap();
        assert_eq!(entry.body, Bytes::from_static(b"new"));
        assert!(entry.header("x-old").is_none());
    }
}
