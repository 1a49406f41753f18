//! Bounded key-to-id cache.
//!
//! One cache serves one resource type. It is populated by [`ReferenceIdCache::warm`]
//! (one remote query per call for all keys not yet cached) and by explicit
//! inserts after creates and fetches. Eviction is least-recently-used, so
//! callers must tolerate misses by warming again.

use crate::client::KeyLookup;
use crate::error::RemoteResult;
use crate::types::{ResourceId, ResourceKey, ResourceType};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Key-to-id cache for one resource type.
pub struct ReferenceIdCache {
    resource_type: ResourceType,
    entries: Mutex<LruCache<ResourceKey, ResourceId>>,
    lookup: Arc<dyn KeyLookup>,
    hits: AtomicU64,
    misses: AtomicU64,
    remote_queries: AtomicU64,
    keys_queried: AtomicU64,
}

impl ReferenceIdCache {
    /// Creates an empty cache backed by `lookup`.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize, lookup: Arc<dyn KeyLookup>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            resource_type: lookup.resource_type(),
            entries: Mutex::new(LruCache::new(capacity)),
            lookup,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            remote_queries: AtomicU64::new(0),
            keys_queried: AtomicU64::new(0),
        }
    }

    /// Resource type whose keys this cache maps.
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Looks up a key without touching the network.
    pub fn get(&self, key: &ResourceKey) -> Option<ResourceId> {
        let found = self.entries.lock().get(key).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Returns true if the key is cached, without updating recency or counters.
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.entries.lock().contains(key)
    }

    /// Records a mapping learned from the remote service.
    pub fn insert(&self, key: ResourceKey, id: ResourceId) {
        self.entries.lock().put(key, id);
    }

    /// Forgets a key, e.g. after the resource was deleted.
    pub fn remove(&self, key: &ResourceKey) -> Option<ResourceId> {
        self.entries.lock().pop(key)
    }

    /// Forgets every key.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of cached keys.
    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// Ensures every resolvable key in `keys` is cached.
    ///
    /// Keys already cached are answered locally; the rest are deduplicated
    /// into a single remote query. Returns the ids of all keys that exist
    /// remotely; unknown and blank keys are simply absent.
    pub async fn warm(
        &self,
        keys: &HashSet<ResourceKey>,
    ) -> RemoteResult<HashMap<ResourceKey, ResourceId>> {
        let mut resolved = HashMap::with_capacity(keys.len());
        let mut missing = HashSet::new();
        {
            let mut entries = self.entries.lock();
            for key in keys.iter().filter(|key| !key.is_blank()) {
                match entries.get(key) {
                    Some(id) => {
                        resolved.insert(key.clone(), id.clone());
                    }
                    None => {
                        missing.insert(key.clone());
                    }
                }
            }
        }

        if missing.is_empty() {
            return Ok(resolved);
        }

        self.remote_queries.fetch_add(1, Ordering::Relaxed);
        self.keys_queried
            .fetch_add(missing.len() as u64, Ordering::Relaxed);
        debug!(
            resource_type = %self.resource_type,
            keys = missing.len(),
            "warming key cache"
        );

        let fetched = self.lookup.fetch_ids_by_keys(&missing).await?;

        let mut entries = self.entries.lock();
        for (key, id) in fetched {
            if missing.contains(&key) {
                entries.put(key.clone(), id.clone());
                resolved.insert(key, id);
            }
        }
        Ok(resolved)
    }

    /// Number of `get` calls answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of `get` calls that missed.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of remote queries issued by `warm`.
    pub fn remote_queries(&self) -> u64 {
        self.remote_queries.load(Ordering::Relaxed)
    }

    /// Total number of keys sent to the remote service by `warm`.
    pub fn keys_queried(&self) -> u64 {
        self.keys_queried.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for ReferenceIdCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceIdCache")
            .field("resource_type", &self.resource_type)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;

    const TYPE: ResourceType = ResourceType::new("type", "types");

    #[derive(Default)]
    struct RecordingLookup {
        known: HashMap<ResourceKey, ResourceId>,
        queries: Mutex<Vec<HashSet<ResourceKey>>>,
        fail: AtomicBool,
    }

    impl RecordingLookup {
        fn with(pairs: &[(&str, &str)]) -> Self {
            Self {
                known: pairs
                    .iter()
                    .map(|(k, v)| (ResourceKey::new(*k), ResourceId::new(*v)))
                    .collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl KeyLookup for RecordingLookup {
        fn resource_type(&self) -> ResourceType {
            TYPE
        }

        async fn fetch_ids_by_keys(
            &self,
            keys: &HashSet<ResourceKey>,
        ) -> RemoteResult<HashMap<ResourceKey, ResourceId>> {
            self.queries.lock().push(keys.clone());
            if self.fail.load(Ordering::SeqCst) {
                return Err(RemoteError::transient(502, "bad gateway"));
            }
            Ok(keys
                .iter()
                .filter_map(|k| self.known.get(k).map(|id| (k.clone(), id.clone())))
                .collect())
        }
    }

    fn keys(raw: &[&str]) -> HashSet<ResourceKey> {
        raw.iter().map(|k| ResourceKey::new(*k)).collect()
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        futures::executor::block_on(future)
    }

    #[test]
    fn warm_queries_missing_keys_once() {
        let lookup = Arc::new(RecordingLookup::with(&[("a", "id-a"), ("b", "id-b")]));
        let cache = ReferenceIdCache::new(100, lookup.clone());

        let resolved = block_on(cache.warm(&keys(&["a", "b", "unknown"]))).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved.get("a"), Some(&ResourceId::new("id-a")));
        assert!(!resolved.contains_key("unknown"));

        // a second warm for cached keys stays local
        let resolved = block_on(cache.warm(&keys(&["a", "b"]))).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(lookup.queries.lock().len(), 1);
        assert_eq!(cache.remote_queries(), 1);
        assert_eq!(cache.keys_queried(), 3);
    }

    #[test]
    fn warm_skips_blank_keys() {
        let lookup = Arc::new(RecordingLookup::with(&[("a", "id-a")]));
        let cache = ReferenceIdCache::new(100, lookup.clone());

        block_on(cache.warm(&keys(&["", "  "]))).unwrap();
        assert!(lookup.queries.lock().is_empty());
    }

    #[test]
    fn warm_failure_leaves_cache_untouched() {
        let lookup = Arc::new(RecordingLookup::with(&[("a", "id-a")]));
        lookup.fail.store(true, Ordering::SeqCst);
        let cache = ReferenceIdCache::new(100, lookup.clone());

        let result = block_on(cache.warm(&keys(&["a"])));
        assert!(matches!(result, Err(RemoteError::Transient { status: 502, .. })));
        assert!(cache.is_empty());
    }

    #[test]
    fn get_counts_hits_and_misses() {
        let cache = ReferenceIdCache::new(10, Arc::new(RecordingLookup::default()));
        cache.insert("a".into(), "id-a".into());

        assert_eq!(cache.get(&"a".into()), Some(ResourceId::new("id-a")));
        assert_eq!(cache.get(&"b".into()), None);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn least_recently_used_key_is_evicted() {
        let cache = ReferenceIdCache::new(2, Arc::new(RecordingLookup::default()));
        cache.insert("a".into(), "id-a".into());
        cache.insert("b".into(), "id-b".into());
        // touch a so b becomes the eviction candidate
        assert!(cache.get(&"a".into()).is_some());
        cache.insert("c".into(), "id-c".into());

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&"a".into()));
        assert!(!cache.contains(&"b".into()));
        assert!(cache.contains(&"c".into()));
    }

    #[test]
    fn zero_capacity_is_raised() {
        let cache = ReferenceIdCache::new(0, Arc::new(RecordingLookup::default()));
        assert_eq!(cache.capacity(), 1);
    }

    #[test]
    fn remove_and_clear() {
        let cache = ReferenceIdCache::new(10, Arc::new(RecordingLookup::default()));
        cache.insert("a".into(), "id-a".into());
        cache.insert("b".into(), "id-b".into());

        assert_eq!(cache.remove(&"a".into()), Some(ResourceId::new("id-a")));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
