//! Configuration for the sync engine.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default number of drafts per internal batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;
/// Default number of drafts processed concurrently within a batch.
pub const DEFAULT_MAX_PARALLEL_REQUESTS: usize = 20;
/// Default capacity of each key-to-id cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;
/// Default maximum number of update operations per update request.
pub const DEFAULT_MAX_UPDATE_ACTIONS: usize = 500;

/// Configuration for sync runs.
///
/// A zero value for any size means "use the default".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum number of drafts per internal batch.
    pub batch_size: usize,
    /// Maximum number of drafts processed concurrently within a batch.
    pub max_parallel_requests: usize,
    /// Capacity of each key-to-id cache.
    pub cache_capacity: usize,
    /// Maximum number of update operations sent in one update request.
    pub max_update_actions: usize,
    /// Whether reference keys shaped like UUIDs are accepted.
    pub allow_uuid_keys: bool,
}

impl SyncConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_parallel_requests: DEFAULT_MAX_PARALLEL_REQUESTS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            max_update_actions: DEFAULT_MAX_UPDATE_ACTIONS,
            allow_uuid_keys: false,
        }
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = or_default(size, DEFAULT_BATCH_SIZE);
        self
    }

    /// Sets the maximum number of concurrent drafts per batch.
    pub fn with_max_parallel_requests(mut self, max: usize) -> Self {
        self.max_parallel_requests = or_default(max, DEFAULT_MAX_PARALLEL_REQUESTS);
        self
    }

    /// Sets the capacity of each key-to-id cache.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = or_default(capacity, DEFAULT_CACHE_CAPACITY);
        self
    }

    /// Sets the maximum number of operations per update request.
    pub fn with_max_update_actions(mut self, max: usize) -> Self {
        self.max_update_actions = or_default(max, DEFAULT_MAX_UPDATE_ACTIONS);
        self
    }

    /// Allows UUID-shaped reference keys.
    pub fn allow_uuid_keys(mut self, allow: bool) -> Self {
        self.allow_uuid_keys = allow;
        self
    }

    /// Returns a copy with every zero size replaced by its default.
    pub fn sanitized(&self) -> Self {
        Self {
            batch_size: checked("batch_size", self.batch_size, DEFAULT_BATCH_SIZE),
            max_parallel_requests: checked(
                "max_parallel_requests",
                self.max_parallel_requests,
                DEFAULT_MAX_PARALLEL_REQUESTS,
            ),
            cache_capacity: checked("cache_capacity", self.cache_capacity, DEFAULT_CACHE_CAPACITY),
            max_update_actions: checked(
                "max_update_actions",
                self.max_update_actions,
                DEFAULT_MAX_UPDATE_ACTIONS,
            ),
            allow_uuid_keys: self.allow_uuid_keys,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn or_default(value: usize, default: usize) -> usize {
    if value == 0 {
        default
    } else {
        value
    }
}

fn checked(name: &str, value: usize, default: usize) -> usize {
    if value == 0 {
        warn!(setting = name, default, "non-positive sync setting, using default");
    }
    or_default(value, default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.cache_capacity, 10_000);
        assert_eq!(config.max_update_actions, 500);
        assert!(!config.allow_uuid_keys);
    }

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_batch_size(25)
            .with_max_parallel_requests(4)
            .with_cache_capacity(100)
            .with_max_update_actions(10)
            .allow_uuid_keys(true);

        assert_eq!(config.batch_size, 25);
        assert_eq!(config.max_parallel_requests, 4);
        assert_eq!(config.cache_capacity, 100);
        assert_eq!(config.max_update_actions, 10);
        assert!(config.allow_uuid_keys);
    }

    #[test]
    fn zero_sizes_fall_back_to_defaults() {
        let config = SyncConfig::new().with_batch_size(0).with_cache_capacity(0);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);

        let raw = SyncConfig {
            batch_size: 0,
            max_parallel_requests: 0,
            cache_capacity: 7,
            max_update_actions: 0,
            allow_uuid_keys: false,
        };
        let sanitized = raw.sanitized();
        assert_eq!(sanitized.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(sanitized.max_parallel_requests, DEFAULT_MAX_PARALLEL_REQUESTS);
        assert_eq!(sanitized.cache_capacity, 7);
        assert_eq!(sanitized.max_update_actions, DEFAULT_MAX_UPDATE_ACTIONS);
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let config: SyncConfig = serde_json::from_str(r#"{"batch_size": 10}"#).unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_parallel_requests, DEFAULT_MAX_PARALLEL_REQUESTS);
    }
}
