//! Drafts waiting on keys that do not exist yet.
//!
//! Entries are indexed by the missing key and by the waiting entity. Both
//! indexes live behind one lock so every operation is atomic with respect
//! to the others.
//!
//! ## Invariants
//!
//! - At most one entry per (entity, missing key) pair; deferring again merges.
//! - `on_resolved` drains atomically, so each entry is handed out once.

use crate::types::{ResourceKey, TypedKey};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// What part of a draft is waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeferralKind {
    /// The whole draft is waiting; it has not been counted yet.
    Whole,
    /// One or more detached fields are waiting; the rest of the draft was synced.
    Fragment,
}

/// A draft, or part of one, waiting on a missing key.
#[derive(Debug, Clone)]
pub struct DeferredEntry<D> {
    /// The full, unresolved draft of the waiting entity.
    pub draft: D,
    /// Key of the waiting entity.
    pub entity_key: ResourceKey,
    /// The key being waited on.
    pub missing: TypedKey,
    /// Fields of the draft holding the missing key.
    pub fields: Vec<String>,
    /// Whether the whole draft or only detached fields wait.
    pub kind: DeferralKind,
    /// When the entity first started waiting on `missing`.
    pub waiting_since: Instant,
}

impl<D> DeferredEntry<D> {
    /// Creates an entry for one field.
    pub fn new(
        draft: D,
        entity_key: ResourceKey,
        missing: TypedKey,
        field: impl Into<String>,
        kind: DeferralKind,
    ) -> Self {
        Self {
            draft,
            entity_key,
            missing,
            fields: vec![field.into()],
            kind,
            waiting_since: Instant::now(),
        }
    }

    /// How long the entry has been waiting.
    pub fn waited(&self) -> Duration {
        self.waiting_since.elapsed()
    }

    fn merge(&mut self, newer: DeferredEntry<D>) {
        for field in newer.fields {
            if !self.fields.contains(&field) {
                self.fields.push(field);
            }
        }
        if newer.kind == DeferralKind::Whole {
            self.kind = DeferralKind::Whole;
        }
        self.draft = newer.draft;
    }
}

struct TrackerState<D> {
    by_missing: HashMap<TypedKey, HashMap<ResourceKey, DeferredEntry<D>>>,
    by_entity: HashMap<ResourceKey, HashSet<TypedKey>>,
}

impl<D> TrackerState<D> {
    fn unlink(&mut self, entity: &ResourceKey, missing: &TypedKey) {
        if let Some(keys) = self.by_entity.get_mut(entity) {
            keys.remove(missing);
            if keys.is_empty() {
                self.by_entity.remove(entity);
            }
        }
    }
}

/// Concurrent multimap from missing keys to waiting entries.
pub struct DeferredTracker<D> {
    state: Mutex<TrackerState<D>>,
}

impl<D> DeferredTracker<D> {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState {
                by_missing: HashMap::new(),
                by_entity: HashMap::new(),
            }),
        }
    }

    /// Adds an entry. Returns false if it was merged into an existing one.
    pub fn defer(&self, entry: DeferredEntry<D>) -> bool {
        let mut state = self.state.lock();
        state
            .by_entity
            .entry(entry.entity_key.clone())
            .or_default()
            .insert(entry.missing.clone());

        let waiting = state.by_missing.entry(entry.missing.clone()).or_default();
        match waiting.get_mut(&entry.entity_key) {
            Some(existing) => {
                existing.merge(entry);
                false
            }
            None => {
                waiting.insert(entry.entity_key.clone(), entry);
                true
            }
        }
    }

    /// Removes and returns every entry waiting on `key`, ordered by entity key.
    ///
    /// A second call for the same key returns nothing.
    pub fn on_resolved(&self, key: &TypedKey) -> Vec<DeferredEntry<D>> {
        let mut state = self.state.lock();
        let Some(waiting) = state.by_missing.remove(key) else {
            return Vec::new();
        };
        let mut entries: Vec<_> = waiting.into_values().collect();
        for entry in &entries {
            state.unlink(&entry.entity_key, key);
        }
        entries.sort_by(|a, b| a.entity_key.cmp(&b.entity_key));
        entries
    }

    /// Removes the entry of `entity` waiting on `missing`.
    pub fn remove(&self, entity: &ResourceKey, missing: &TypedKey) -> Option<DeferredEntry<D>> {
        let mut state = self.state.lock();
        let waiting = state.by_missing.get_mut(missing)?;
        let entry = waiting.remove(entity)?;
        if waiting.is_empty() {
            state.by_missing.remove(missing);
        }
        state.unlink(entity, missing);
        Some(entry)
    }

    /// Removes every entry of `entity`, e.g. because a newer draft superseded it.
    pub fn remove_entity(&self, entity: &ResourceKey) -> Vec<DeferredEntry<D>> {
        let mut state = self.state.lock();
        let Some(keys) = state.by_entity.remove(entity) else {
            return Vec::new();
        };
        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(waiting) = state.by_missing.get_mut(&key) {
                if let Some(entry) = waiting.remove(entity) {
                    removed.push(entry);
                }
                if waiting.is_empty() {
                    state.by_missing.remove(&key);
                }
            }
        }
        removed
    }

    /// Every key something is waiting on, sorted.
    pub fn pending_keys(&self) -> Vec<TypedKey> {
        let mut keys: Vec<_> = self.state.lock().by_missing.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Entities waiting on `key`, sorted.
    pub fn waiting_on(&self, key: &TypedKey) -> Vec<ResourceKey> {
        let mut entities: Vec<_> = self
            .state
            .lock()
            .by_missing
            .get(key)
            .map(|waiting| waiting.keys().cloned().collect())
            .unwrap_or_default();
        entities.sort();
        entities
    }

    /// Returns true if anything waits on `key`.
    pub fn is_pending(&self, key: &TypedKey) -> bool {
        self.state.lock().by_missing.contains_key(key)
    }

    /// Returns true if `entity` waits on anything.
    pub fn is_waiting(&self, entity: &ResourceKey) -> bool {
        self.state.lock().by_entity.contains_key(entity)
    }

    /// Removes and returns every entry, ordered by entity key then missing key.
    pub fn drain_all(&self) -> Vec<DeferredEntry<D>> {
        let mut state = self.state.lock();
        state.by_entity.clear();
        let mut entries: Vec<_> = state
            .by_missing
            .drain()
            .flat_map(|(_, waiting)| waiting.into_values())
            .collect();
        entries.sort_by(|a, b| {
            a.entity_key
                .cmp(&b.entity_key)
                .then_with(|| a.missing.cmp(&b.missing))
        });
        entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.state.lock().by_missing.values().map(HashMap::len).sum()
    }

    /// Returns true if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.state.lock().by_missing.is_empty()
    }
}

impl<D> Default for DeferredTracker<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> std::fmt::Debug for DeferredTracker<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredTracker")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceType;
    use proptest::prelude::*;

    const ITEM: ResourceType = ResourceType::new("item", "items");

    fn missing(key: &str) -> TypedKey {
        TypedKey::new(ITEM, key)
    }

    fn entry(entity: &str, on: &str, field: &str, kind: DeferralKind) -> DeferredEntry<String> {
        DeferredEntry::new(format!("{entity}-draft"), entity.into(), missing(on), field, kind)
    }

    #[test]
    fn many_entries_wait_on_one_key() {
        let tracker = DeferredTracker::new();
        assert!(tracker.defer(entry("b", "p", "parent", DeferralKind::Whole)));
        assert!(tracker.defer(entry("a", "p", "parent", DeferralKind::Whole)));
        assert!(tracker.defer(entry("c", "q", "parent", DeferralKind::Whole)));

        assert_eq!(tracker.len(), 3);
        assert_eq!(tracker.pending_keys(), vec![missing("p"), missing("q")]);
        assert_eq!(tracker.waiting_on(&missing("p")), vec![ResourceKey::from("a"), "b".into()]);

        let flushed = tracker.on_resolved(&missing("p"));
        let entities: Vec<_> = flushed.iter().map(|e| e.entity_key.as_str()).collect();
        assert_eq!(entities, ["a", "b"]);
        assert_eq!(tracker.len(), 1);
        assert!(!tracker.is_waiting(&"a".into()));
        assert!(tracker.is_waiting(&"c".into()));
    }

    #[test]
    fn on_resolved_is_idempotent() {
        let tracker = DeferredTracker::new();
        tracker.defer(entry("a", "p", "parent", DeferralKind::Whole));

        assert!(tracker.is_pending(&missing("p")));
        assert_eq!(tracker.on_resolved(&missing("p")).len(), 1);
        assert!(tracker.on_resolved(&missing("p")).is_empty());
        assert!(!tracker.is_pending(&missing("p")));
        assert!(tracker.is_empty());
    }

    #[test]
    fn deferring_the_same_pair_merges() {
        let tracker = DeferredTracker::new();
        assert!(tracker.defer(entry("a", "p", "attributes[x]", DeferralKind::Fragment)));
        let mut newer = entry("a", "p", "attributes[y]", DeferralKind::Fragment);
        newer.draft = "a-draft-v2".into();
        assert!(!tracker.defer(newer));

        let flushed = tracker.on_resolved(&missing("p"));
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].fields, ["attributes[x]", "attributes[y]"]);
        assert_eq!(flushed[0].draft, "a-draft-v2");
        assert_eq!(flushed[0].kind, DeferralKind::Fragment);
    }

    #[test]
    fn whole_wins_when_merging() {
        let tracker = DeferredTracker::new();
        tracker.defer(entry("a", "p", "attributes[x]", DeferralKind::Fragment));
        tracker.defer(entry("a", "p", "parent", DeferralKind::Whole));

        let flushed = tracker.drain_all();
        assert_eq!(flushed[0].kind, DeferralKind::Whole);
    }

    #[test]
    fn superseded_entity_is_dropped_everywhere() {
        let tracker = DeferredTracker::new();
        tracker.defer(entry("a", "p", "attributes[x]", DeferralKind::Fragment));
        tracker.defer(entry("a", "q", "attributes[y]", DeferralKind::Fragment));
        tracker.defer(entry("b", "p", "parent", DeferralKind::Whole));

        let removed = tracker.remove_entity(&"a".into());
        assert_eq!(removed.len(), 2);
        assert_eq!(tracker.pending_keys(), vec![missing("p")]);
        assert_eq!(tracker.waiting_on(&missing("p")), vec![ResourceKey::from("b")]);
        assert!(tracker.remove_entity(&"a".into()).is_empty());
    }

    #[test]
    fn remove_single_pair() {
        let tracker = DeferredTracker::new();
        tracker.defer(entry("a", "p", "parent", DeferralKind::Whole));
        tracker.defer(entry("a", "q", "attributes[y]", DeferralKind::Fragment));

        assert!(tracker.remove(&"a".into(), &missing("p")).is_some());
        assert!(tracker.remove(&"a".into(), &missing("p")).is_none());
        assert!(tracker.is_waiting(&"a".into()));
        assert_eq!(tracker.pending_keys(), vec![missing("q")]);
    }

    #[test]
    fn concurrent_defers_are_not_lost() {
        let tracker = std::sync::Arc::new(DeferredTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let entity = format!("e{t}-{i}");
                        tracker.defer(entry(&entity, "shared", "parent", DeferralKind::Whole));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.on_resolved(&missing("shared")).len(), 400);
    }

    proptest! {
        #[test]
        fn every_entry_is_handed_out_once(
            pairs in proptest::collection::vec((0u8..6, 0u8..4), 0..40),
            order in proptest::collection::vec(0u8..4, 0..10),
        ) {
            let tracker = DeferredTracker::new();
            let mut expected = HashSet::new();
            for (entity, key) in &pairs {
                tracker.defer(entry(&format!("e{entity}"), &format!("k{key}"), "parent", DeferralKind::Whole));
                expected.insert((format!("e{entity}"), format!("k{key}")));
            }

            let mut seen = HashSet::new();
            for key in order.iter().chain([0u8, 1, 2, 3].iter()) {
                for flushed in tracker.on_resolved(&missing(&format!("k{key}"))) {
                    let pair = (flushed.entity_key.to_string(), flushed.missing.key.to_string());
                    prop_assert!(seen.insert(pair), "entry handed out twice");
                }
            }
            prop_assert_eq!(seen, expected);
            prop_assert!(tracker.is_empty());
        }
    }
}
