//! Fixed key-to-id lookup for referenced resource types.

use async_trait::async_trait;
use parking_lot::Mutex;
use refsync_engine::{KeyLookup, RemoteError, RemoteResult, ResourceId, ResourceKey, ResourceType};
use std::collections::{HashMap, HashSet};

/// A [`KeyLookup`] answering from a mutable in-memory map.
///
/// Every query is logged so tests can assert which keys went over the wire.
pub struct StaticLookup {
    resource_type: ResourceType,
    known: Mutex<HashMap<ResourceKey, ResourceId>>,
    queries: Mutex<Vec<HashSet<ResourceKey>>>,
    failure: Mutex<Option<RemoteError>>,
}

impl StaticLookup {
    /// Creates a lookup with no known keys.
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            known: Mutex::new(HashMap::new()),
            queries: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    /// Adds a known key.
    pub fn with(self, key: &str, id: &str) -> Self {
        self.insert(key, id);
        self
    }

    /// Adds a known key after construction.
    pub fn insert(&self, key: &str, id: &str) {
        self.known.lock().insert(key.into(), id.into());
    }

    /// Makes every query fail until cleared.
    pub fn fail_with(&self, error: Option<RemoteError>) {
        *self.failure.lock() = error;
    }

    /// Number of queries received.
    pub fn query_count(&self) -> usize {
        self.queries.lock().len()
    }

    /// Every query received, in order.
    pub fn queries(&self) -> Vec<HashSet<ResourceKey>> {
        self.queries.lock().clone()
    }

    /// How many queries asked for `key`.
    pub fn times_queried(&self, key: &str) -> usize {
        self.queries
            .lock()
            .iter()
            .filter(|query| query.contains(key))
            .count()
    }
}

#[async_trait]
impl KeyLookup for StaticLookup {
    fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    async fn fetch_ids_by_keys(
        &self,
        keys: &HashSet<ResourceKey>,
    ) -> RemoteResult<HashMap<ResourceKey, ResourceId>> {
        self.queries.lock().push(keys.clone());
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        let known = self.known.lock();
        Ok(keys
            .iter()
            .filter_map(|key| known.get(key).map(|id| (key.clone(), id.clone())))
            .collect())
    }
}
