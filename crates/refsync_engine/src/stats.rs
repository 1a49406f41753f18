//! Per-run statistics.

use crate::state::DraftOutcome;
use crate::types::{ResourceKey, ResourceType, TypedKey};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters of one `sync` run.
///
/// All methods take `&self`; the counters are updated concurrently by every
/// draft in flight. `processed` always equals
/// `created + updated + failed + unchanged` once a run has finished.
pub struct SyncStatistics {
    resource_type: ResourceType,
    processed: AtomicU64,
    created: AtomicU64,
    updated: AtomicU64,
    failed: AtomicU64,
    unchanged: AtomicU64,
    batches: AtomicU64,
    elapsed_millis: AtomicU64,
    waiting: Mutex<HashMap<TypedKey, HashSet<ResourceKey>>>,
}

impl SyncStatistics {
    /// Creates zeroed statistics.
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            processed: AtomicU64::new(0),
            created: AtomicU64::new(0),
            updated: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            unchanged: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            elapsed_millis: AtomicU64::new(0),
            waiting: Mutex::new(HashMap::new()),
        }
    }

    /// Resource type the run synced.
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Counts one draft as processed with the given outcome.
    pub fn record(&self, outcome: DraftOutcome) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            DraftOutcome::Created => &self.created,
            DraftOutcome::Updated => &self.updated,
            DraftOutcome::Unchanged => &self.unchanged,
            DraftOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_elapsed(&self, elapsed: Duration) {
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.elapsed_millis.store(millis, Ordering::Relaxed);
    }

    /// Drafts processed.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Resources created.
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Resources updated.
    pub fn updated(&self) -> u64 {
        self.updated.load(Ordering::Relaxed)
    }

    /// Drafts that failed.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Drafts that needed no remote change, or whose change was suppressed.
    pub fn unchanged(&self) -> u64 {
        self.unchanged.load(Ordering::Relaxed)
    }

    /// Internal batches processed.
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Wall-clock duration of the run.
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_millis.load(Ordering::Relaxed))
    }

    /// Records that `entity` waits on `missing`.
    pub fn add_waiting(&self, missing: TypedKey, entity: ResourceKey) {
        self.waiting.lock().entry(missing).or_default().insert(entity);
    }

    /// Forgets everything waiting on `missing`, which now exists.
    pub fn remove_waiting_key(&self, missing: &TypedKey) -> Option<HashSet<ResourceKey>> {
        self.waiting.lock().remove(missing)
    }

    /// Forgets `entity` under every key it was waiting on.
    pub fn remove_waiting_dependent(&self, entity: &ResourceKey) {
        let mut waiting = self.waiting.lock();
        waiting.retain(|_, entities| {
            entities.remove(entity);
            !entities.is_empty()
        });
    }

    /// Entities waiting on `missing`, sorted.
    pub fn waiting_on(&self, missing: &TypedKey) -> Vec<ResourceKey> {
        let mut entities: Vec<_> = self
            .waiting
            .lock()
            .get(missing)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        entities.sort();
        entities
    }

    /// Deterministic copy of the waiting map.
    pub fn waiting(&self) -> BTreeMap<TypedKey, BTreeSet<ResourceKey>> {
        self.waiting
            .lock()
            .iter()
            .map(|(key, entities)| (key.clone(), entities.iter().cloned().collect()))
            .collect()
    }

    /// Number of distinct entities waiting on at least one missing key.
    pub fn entities_waiting(&self) -> usize {
        let waiting = self.waiting.lock();
        waiting
            .values()
            .flatten()
            .collect::<HashSet<_>>()
            .len()
    }

    /// One-line human-readable summary.
    pub fn report_message(&self) -> String {
        let plural = self.resource_type.plural();
        let waiting = self.entities_waiting();
        if waiting == 0 {
            format!(
                "Summary: {} {plural} were processed in total ({} created, {} updated and {} {plural} failed to sync).",
                self.processed(),
                self.created(),
                self.updated(),
                self.failed(),
            )
        } else {
            format!(
                "Summary: {} {plural} were processed in total ({} created, {} updated, {} failed to sync and {waiting} {plural} with at least one reference to a missing key).",
                self.processed(),
                self.created(),
                self.updated(),
                self.failed(),
            )
        }
    }

    /// Serializable copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            resource_type: self.resource_type.name().to_string(),
            processed: self.processed(),
            created: self.created(),
            updated: self.updated(),
            failed: self.failed(),
            unchanged: self.unchanged(),
            batches: self.batches(),
            waiting: self.entities_waiting(),
            elapsed_ms: self.elapsed_millis.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for SyncStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report_message())
    }
}

impl fmt::Debug for SyncStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.snapshot(), f)
    }
}

/// Point-in-time copy of [`SyncStatistics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Resource type name.
    pub resource_type: String,
    /// Drafts processed.
    pub processed: u64,
    /// Resources created.
    pub created: u64,
    /// Resources updated.
    pub updated: u64,
    /// Drafts that failed.
    pub failed: u64,
    /// Drafts needing no change.
    pub unchanged: u64,
    /// Internal batches.
    pub batches: u64,
    /// Entities waiting on a missing key.
    pub waiting: usize,
    /// Run duration in milliseconds.
    pub elapsed_ms: u64,
}
