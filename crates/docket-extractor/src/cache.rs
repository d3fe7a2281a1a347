//! Single-flight document cache
//!
//! Maps a key (a landing-page reference or a document URL) to the value
//! loaded for it. Concurrent requests for the same key share one load: the
//! first caller becomes the leader and runs the loader, every other caller
//! waits on the leader's result.
//!
//! # Invariants
//!
//! - At most one load is in flight per key at any time
//! - Successful values are stored and returned to every later caller
//! - Failures are never stored; the next caller after a failure loads again
//! - A leader that is dropped before finishing (aborted or timed-out job)
//!   releases its slot, and one of the waiting callers takes over the load

use crate::error::ExtractError;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, trace};

type Published<V> = Option<Result<V, ExtractError>>;

/// A stored value together with the key it was loaded for
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Cache key
    pub key: String,
    /// Loaded value
    pub value: V,
    /// When the load finished
    pub created_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Time since the value was stored
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

enum Slot<V> {
    Ready(CacheEntry<V>),
    InFlight {
        leader: u64,
        receiver: watch::Receiver<Published<V>>,
    },
}

/// Counters describing how the cache has been used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered from a stored value
    pub hits: u64,
    /// Loads actually performed
    pub misses: u64,
    /// Requests that waited on another caller's load
    pub coalesced: u64,
    /// Values currently stored
    pub entries: usize,
}

impl CacheStats {
    /// Combine the counters of two caches
    pub fn merge(self, other: CacheStats) -> CacheStats {
        CacheStats {
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            coalesced: self.coalesced + other.coalesced,
            entries: self.entries + other.entries,
        }
    }
}

/// Keyed cache with single-flight loading
pub struct DocumentCache<V> {
    name: &'static str,
    enabled: bool,
    slots: Mutex<HashMap<String, Slot<V>>>,
    next_leader: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
}

enum Role<V> {
    Leader(watch::Sender<Published<V>>, u64),
    Follower(watch::Receiver<Published<V>>),
}

impl<V> DocumentCache<V>
where
    V: Clone + Send + Sync,
{
    /// Create an enabled cache; `name` only shows up in logs
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            enabled: true,
            slots: Mutex::new(HashMap::new()),
            next_leader: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Create a cache that runs the loader on every call
    pub fn disabled(name: &'static str) -> Self {
        Self {
            enabled: false,
            ..Self::new(name)
        }
    }

    /// Whether values are stored and loads are shared
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Return the value for `key`, loading it at most once concurrently
    ///
    /// A blank key fails with [`ExtractError::MissingReference`] without
    /// touching the cache or calling the loader.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, loader: F) -> Result<V, ExtractError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ExtractError>>,
    {
        let key = key.trim();
        if key.is_empty() {
            return Err(ExtractError::MissingReference);
        }

        if !self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return loader().await;
        }

        let mut loader = Some(loader);

        loop {
            let role = {
                let mut slots = self.lock();
                match slots.get(key) {
                    Some(Slot::Ready(entry)) => {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        trace!(cache = self.name, key, "hit");
                        return Ok(entry.value.clone());
                    }
                    Some(Slot::InFlight { receiver, .. }) => Role::Follower(receiver.clone()),
                    None => {
                        let leader = self.next_leader.fetch_add(1, Ordering::Relaxed);
                        let (sender, receiver) = watch::channel(None);
                        slots.insert(key.to_string(), Slot::InFlight { leader, receiver });
                        Role::Leader(sender, leader)
                    }
                }
            };

            match role {
                Role::Follower(mut receiver) => {
                    self.coalesced.fetch_add(1, Ordering::Relaxed);
                    debug!(cache = self.name, key, "waiting on in-flight load");
                    let published = match receiver.wait_for(Option::is_some).await {
                        Ok(value) => (*value).clone(),
                        // Leader went away without publishing
                        Err(_) => continue,
                    };
                    if let Some(result) = published {
                        return result;
                    }
                }
                Role::Leader(sender, leader) => {
                    let Some(load) = loader.take() else {
                        return Err(ExtractError::Internal(
                            "cache loader invoked twice".to_string(),
                        ));
                    };
                    let mut guard = LeaderGuard {
                        cache: self,
                        key,
                        leader,
                        armed: true,
                    };

                    self.misses.fetch_add(1, Ordering::Relaxed);
                    let result = load().await;

                    {
                        let mut slots = self.lock();
                        match &result {
                            Ok(value) => {
                                slots.insert(
                                    key.to_string(),
                                    Slot::Ready(CacheEntry {
                                        key: key.to_string(),
                                        value: value.clone(),
                                        created_at: Instant::now(),
                                    }),
                                );
                            }
                            Err(e) => {
                                debug!(cache = self.name, key, error = %e, "load failed, not cached");
                                slots.remove(key);
                            }
                        }
                    }
                    guard.armed = false;

                    sender.send_replace(Some(result.clone()));
                    return result;
                }
            }
        }
    }

    /// Stored value for `key`, without loading
    pub fn get(&self, key: &str) -> Option<V> {
        match self.lock().get(key.trim()) {
            Some(Slot::Ready(entry)) => Some(entry.value.clone()),
            _ => None,
        }
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Whether no values are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every stored value
    ///
    /// In-flight loads are left alone.
    pub fn clear(&self) {
        self.lock().retain(|_, slot| matches!(slot, Slot::InFlight { .. }));
    }

    /// Current counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes the leader's in-flight slot if the load never finished
struct LeaderGuard<'a, V> {
    cache: &'a DocumentCache<V>,
    key: &'a str,
    leader: u64,
    armed: bool,
}

impl<V> Drop for LeaderGuard<'_, V> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slots = self
            .cache
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let owned = matches!(
            slots.get(self.key),
            Some(Slot::InFlight { leader, .. }) if *leader == self.leader
        );
        if owned {
            slots.remove(self.key);
            debug!(cache = self.cache.name, key = self.key, "abandoned load released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_blank_key_short_circuits() {
        let cache: DocumentCache<String> = DocumentCache::new("test");
        let calls = AtomicUsize::new(0);

        let result = cache
            .get_or_fetch("   ", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("never".to_string())
            })
            .await;

        assert_eq!(result, Err(ExtractError::MissingReference));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[tokio::test]
    async fn test_value_is_stored_after_first_load() {
        let cache: DocumentCache<String> = DocumentCache::new("test");

        let first = cache
            .get_or_fetch("a.pdf", || async { Ok("text".to_string()) })
            .await;
        let second = cache
            .get_or_fetch("a.pdf", || async { Ok("other".to_string()) })
            .await;

        assert_eq!(first.unwrap(), "text");
        assert_eq!(second.unwrap(), "text");
        assert_eq!(cache.get("a.pdf"), Some("text".to_string()));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache: DocumentCache<String> = DocumentCache::new("test");

        let failed = cache
            .get_or_fetch("b.pdf", || async { Err(ExtractError::http(503, "busy")) })
            .await;
        assert_eq!(failed, Err(ExtractError::http(503, "busy")));
        assert!(cache.is_empty());

        let retried = cache
            .get_or_fetch("b.pdf", || async { Ok("recovered".to_string()) })
            .await;
        assert_eq!(retried.unwrap(), "recovered");
        assert_eq!(cache.stats().misses, 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_load() {
        let cache: Arc<DocumentCache<Arc<str>>> = Arc::new(DocumentCache::new("test"));
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let loads = Arc::clone(&loads);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("shared.pdf", || async {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(Arc::<str>::from("minutes"))
                    })
                    .await
            }));
        }

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        // Every caller holds the very same allocation
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.coalesced + stats.hits, 7);
    }

    #[tokio::test]
    async fn test_waiters_receive_the_same_error() {
        let cache: Arc<DocumentCache<String>> = Arc::new(DocumentCache::new("test"));
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            let loads = Arc::clone(&loads);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("broken.pdf", || async {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(ExtractError::http(500, "document download failed"))
                    })
                    .await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap();
            assert_eq!(result, Err(ExtractError::http(500, "document download failed")));
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_leader_hands_over() {
        let cache: Arc<DocumentCache<String>> = Arc::new(DocumentCache::new("test"));

        let leader = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_fetch("slow.pdf", || async {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        Ok("too late".to_string())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let follower = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_fetch("slow.pdf", || async { Ok("second leader".to_string()) })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        leader.abort();
        let value = tokio::time::timeout(Duration::from_secs(2), follower)
            .await
            .expect("follower should not hang")
            .unwrap()
            .unwrap();

        assert_eq!(value, "second leader");
        assert_eq!(cache.get("slow.pdf"), Some("second leader".to_string()));
    }

    #[tokio::test]
    async fn test_disabled_cache_always_loads() {
        let cache: DocumentCache<String> = DocumentCache::disabled("test");
        assert!(!cache.is_enabled());

        for expected in ["one", "two"] {
            let value = cache
                .get_or_fetch("c.pdf", || async move { Ok(expected.to_string()) })
                .await;
            assert_eq!(value.unwrap(), expected);
        }
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 2);
    }

    #[tokio::test]
    async fn test_clear_drops_stored_values() {
        let cache: DocumentCache<String> = DocumentCache::new("test");
        cache
            .get_or_fetch("d.pdf", || async { Ok("x".to_string()) })
            .await
            .unwrap();
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats_merge() {
        let a = CacheStats { hits: 1, misses: 2, coalesced: 3, entries: 4 };
        let b = CacheStats { hits: 10, misses: 20, coalesced: 30, entries: 40 };
        assert_eq!(
            a.merge(b),
            CacheStats { hits: 11, misses: 22, coalesced: 33, entries: 44 }
        );
    }
}
