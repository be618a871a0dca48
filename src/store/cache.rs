// src/store/cache.rs
use log::debug;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::identifiers::IdentifierKind;
use crate::models::core::StoreEntity;

/// Process-wide LRU cache for identifier lookups.
///
/// Keyed by the `(kind, value)` tuple rather than a concatenated string so
/// distinct axes can never collide. Entries are immutable snapshots and
/// expire after a freshness window, bounding load on the store without
/// serving stale identifier data for long.
pub struct IdentifierCache {
    entries: Mutex<LruCache<(IdentifierKind, String), CachedLookup>>,
    ttl: Duration,
}

#[derive(Clone)]
struct CachedLookup {
    fetched_at: Instant,
    results: Arc<Vec<StoreEntity>>,
}

impl IdentifierCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Returns a cached snapshot if present and fresh.
    pub async fn get(&self, kind: IdentifierKind, value: &str) -> Option<Arc<Vec<StoreEntity>>> {
        let mut entries = self.entries.lock().await;
        let key = (kind, value.to_string());
        if let Some(cached) = entries.get(&key) {
            if cached.fetched_at.elapsed() < self.ttl {
                debug!("Identifier cache hit: {} {}", kind.label(), value);
                return Some(Arc::clone(&cached.results));
            }
        }
        // Stale or absent entries fall through; pop is a no-op when absent.
        entries.pop(&key);
        None
    }

    pub async fn put(&self, kind: IdentifierKind, value: &str, results: Vec<StoreEntity>) {
        let mut entries = self.entries.lock().await;
        entries.put(
            (kind, value.to_string()),
            CachedLookup {
                fetched_at: Instant::now(),
                results: Arc::new(results),
            },
        );
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}
