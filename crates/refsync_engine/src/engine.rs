//! The reconciliation engine.
//!
//! A run takes the caller's batches one at a time. Each batch is split into
//! internal batches of at most `batch_size` drafts, and each internal batch
//! goes through:
//!
//! 1. validation (no network);
//! 2. cache warming for every referenced key and the batch's own keys;
//! 3. one fetch of the existing resources by key;
//! 4. the per-draft pipeline, up to `max_parallel_requests` drafts at a time;
//! 5. a flush of deferred drafts whose missing key has become known.
//!
//! Nothing escapes `sync` as an error. Every failure is routed to the error
//! callback and counted in the returned statistics.

use crate::cache::ReferenceIdCache;
use crate::callbacks::SyncCallbacks;
use crate::client::{ClientKeyLookup, KeyLookup, ResourceClient};
use crate::config::SyncConfig;
use crate::deferred::{DeferralKind, DeferredEntry, DeferredTracker};
use crate::error::{RemoteError, RemoteResult, SyncError};
use crate::model::{DiffEngine, SyncDraft, SyncResource};
use crate::resolver::{ReferenceError, ReferenceResolver, ResolvedDraft, UnresolvedReference};
use crate::state::{DraftOutcome, DraftState, UpdateAttempt};
use crate::stats::SyncStatistics;
use crate::types::{ResourceId, ResourceKey, ResourceType, TypedKey};
use crate::validator::{BatchValidator, ValidatedBatch};
use futures::future::try_join_all;
use futures::{stream, FutureExt, StreamExt};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Number of times an update is retried after a version conflict.
pub const CONFLICT_RETRIES: usize = 1;

/// How a draft entered the per-draft pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Straight from a caller batch.
    Fresh,
    /// Re-offered after a whole-draft deferral.
    Deferred,
    /// Re-offered to apply detached fields; already counted.
    Fragment,
}

impl Origin {
    fn counts(self) -> bool {
        !matches!(self, Origin::Fragment)
    }

    fn deferral_kind(self) -> DeferralKind {
        match self {
            Origin::Fragment => DeferralKind::Fragment,
            Origin::Fresh | Origin::Deferred => DeferralKind::Whole,
        }
    }
}

/// State scoped to one `sync` call.
struct Run<D> {
    stats: SyncStatistics,
    tracker: DeferredTracker<D>,
    /// Keys the last warm of the current batch did not find remotely.
    absent: Mutex<HashSet<TypedKey>>,
    /// Pending keys known to exist, whether or not the cache still holds them.
    ready: Mutex<HashSet<TypedKey>>,
}

impl<D> Run<D> {
    fn new(resource_type: ResourceType) -> Self {
        Self {
            stats: SyncStatistics::new(resource_type),
            tracker: DeferredTracker::new(),
            absent: Mutex::new(HashSet::new()),
            ready: Mutex::new(HashSet::new()),
        }
    }

    fn is_absent(&self, key: &TypedKey) -> bool {
        self.absent.lock().contains(key)
    }
}

/// Reconciles drafts of one resource type against a remote service.
///
/// The engine owns the key-to-id cache of its own resource type and any
/// caches registered for referenced types. Caches outlive runs; deferred
/// drafts and statistics do not.
pub struct SyncEngine<C, E>
where
    C: ResourceClient,
{
    config: SyncConfig,
    client: Arc<C>,
    diff: E,
    callbacks: SyncCallbacks<C::Draft, C::Resource, C::Operation>,
    own_cache: Arc<ReferenceIdCache>,
    resolver: ReferenceResolver,
    validator: BatchValidator,
}

impl<C, E> SyncEngine<C, E>
where
    C: ResourceClient + 'static,
    E: DiffEngine<Resource = C::Resource, Draft = C::Draft, Operation = C::Operation>,
{
    /// Creates an engine. Zero sizes in `config` fall back to their defaults.
    pub fn new(client: Arc<C>, diff: E, config: SyncConfig) -> Self {
        let config = config.sanitized();
        let resource_type = client.resource_type();
        let lookup: Arc<dyn KeyLookup> = Arc::new(ClientKeyLookup::new(client.clone()));
        let own_cache = Arc::new(ReferenceIdCache::new(config.cache_capacity, lookup));
        let mut resolver = ReferenceResolver::new(config.allow_uuid_keys);
        resolver.register(own_cache.clone());

        Self {
            config,
            client,
            diff,
            callbacks: SyncCallbacks::new(),
            own_cache,
            resolver,
            validator: BatchValidator::new(resource_type),
        }
    }

    /// Sets the caller hooks.
    pub fn with_callbacks(
        mut self,
        callbacks: SyncCallbacks<C::Draft, C::Resource, C::Operation>,
    ) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Uses a shared cache for its resource type.
    ///
    /// Passing a cache of the engine's own type replaces the private one.
    pub fn with_reference_cache(mut self, cache: Arc<ReferenceIdCache>) -> Self {
        if cache.resource_type() == self.resource_type() {
            self.own_cache = cache.clone();
        }
        self.resolver.register(cache);
        self
    }

    /// Creates a private cache for a referenced resource type.
    pub fn with_reference_lookup(self, lookup: Arc<dyn KeyLookup>) -> Self {
        let cache = Arc::new(ReferenceIdCache::new(self.config.cache_capacity, lookup));
        self.with_reference_cache(cache)
    }

    /// Resource type this engine syncs.
    pub fn resource_type(&self) -> ResourceType {
        self.client.resource_type()
    }

    /// Effective configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Cache registered for `resource_type`, the engine's own type included.
    pub fn reference_cache(&self, resource_type: ResourceType) -> Option<Arc<ReferenceIdCache>> {
        self.resolver.cache(resource_type).cloned()
    }

    /// Syncs every draft of every batch.
    ///
    /// Batches are processed strictly in order. Items may be drafts or
    /// `Option`s of drafts; `None` is reported as an absent draft. Drafts
    /// still waiting on a missing key when the batches run out are reported
    /// before this returns.
    pub async fn sync<I, B>(&self, batches: I) -> SyncStatistics
    where
        I: IntoIterator<Item = B>,
        B: IntoIterator,
        B::Item: Into<Option<C::Draft>>,
    {
        let started = Instant::now();
        let run = Run::new(self.resource_type());

        for batch in batches {
            let drafts: Vec<Option<C::Draft>> = batch.into_iter().map(Into::into).collect();
            for chunk in split_batch(drafts, self.config.batch_size) {
                run.stats.record_batch();
                run.absent.lock().clear();
                self.process_batch(&run, chunk).await;
                self.flush_resolved(&run).await;
            }
        }

        self.finish(&run).await;
        run.stats.record_elapsed(started.elapsed());
        info!(
            resource_type = %self.resource_type(),
            elapsed_ms = run.stats.elapsed().as_millis() as u64,
            "{}",
            run.stats.report_message()
        );
        run.stats
    }

    async fn process_batch(&self, run: &Run<C::Draft>, drafts: Vec<Option<C::Draft>>) {
        let batch_number = run.stats.batches();
        debug!(
            resource_type = %self.resource_type(),
            batch = batch_number,
            size = drafts.len(),
            "processing batch"
        );

        let validated = self.validator.validate(drafts);
        let own_keys = validated.own_keys();
        let ValidatedBatch {
            valid,
            referenced_keys,
            rejected,
        } = validated;
        for (draft, error) in rejected {
            if let Some(key) = draft.as_ref().and_then(SyncDraft::key) {
                self.trace_state(key, DraftState::Rejected);
            }
            run.stats.record(self.fail(&error, draft.as_ref(), None, &[]));
        }
        if valid.is_empty() {
            return;
        }

        for draft in &valid {
            let Some(key) = draft.valid_key() else {
                continue;
            };
            self.trace_state(key, DraftState::Validated);
            let superseded = run.tracker.remove_entity(key);
            if !superseded.is_empty() {
                debug!(key = %key, entries = superseded.len(), "dropping superseded deferred entries");
            }
            run.stats.remove_waiting_dependent(key);
        }

        let mut warm_keys = referenced_keys;
        warm_keys
            .entry(self.resource_type())
            .or_default()
            .extend(own_keys.iter().cloned());

        if let Err(source) = self.warm_caches(run, &warm_keys).await {
            for draft in &valid {
                let error = SyncError::CacheWarmFailed {
                    source: source.clone(),
                };
                run.stats.record(self.fail(&error, Some(draft), None, &[]));
            }
            return;
        }

        let existing = match self.fetch_existing(&own_keys).await {
            Ok(existing) => existing,
            Err(source) => {
                let keys = join_keys(&own_keys);
                for draft in &valid {
                    let error = SyncError::FetchFailed {
                        resource_type: self.resource_type(),
                        keys: keys.clone(),
                        source: source.clone(),
                    };
                    run.stats.record(self.fail(&error, Some(draft), None, &[]));
                }
                return;
            }
        };

        let work = valid
            .into_iter()
            .map(|draft| {
                let old = draft.valid_key().and_then(|key| existing.get(key).cloned());
                if let Some(key) = draft.valid_key() {
                    self.trace_state(key, DraftState::KeysCached);
                }
                (draft, old, Origin::Fresh)
            })
            .collect();
        self.run_drafts(run, work).await;
    }

    /// Warms every cache concerned and records which keys do not exist.
    async fn warm_caches(
        &self,
        run: &Run<C::Draft>,
        keys: &HashMap<ResourceType, HashSet<ResourceKey>>,
    ) -> RemoteResult<()> {
        let warms = keys.iter().filter_map(|(resource_type, keys)| {
            // unknown types are reported per draft by the resolver
            let cache = self.resolver.cache(*resource_type)?;
            let resource_type = *resource_type;
            Some(async move {
                let found = cache.warm(keys).await?;
                Ok::<_, RemoteError>((resource_type, keys, found))
            })
        });
        let warmed = try_join_all(warms).await?;

        let mut absent = run.absent.lock();
        for (resource_type, keys, found) in warmed {
            for key in keys.iter().filter(|key| !key.is_blank()) {
                let typed = TypedKey::new(resource_type, key.clone());
                if found.contains_key(key) {
                    absent.remove(&typed);
                } else {
                    absent.insert(typed);
                }
            }
        }
        Ok(())
    }

    /// Resolves `draft`, warming again any missing key that was not
    /// reported absent in this batch. Such a key was evicted from its
    /// cache, or created since the batch was warmed.
    async fn resolve(
        &self,
        run: &Run<C::Draft>,
        draft: &C::Draft,
    ) -> Result<ResolvedDraft<C::Draft>, ReferenceError> {
        let mut known: HashMap<TypedKey, ResourceId> = HashMap::new();
        let mut refilled: HashSet<TypedKey> = HashSet::new();
        loop {
            let result = self.resolver.resolve_with(draft, &known);
            let missing: Vec<TypedKey> = match &result {
                Ok(resolved) => resolved.detached.iter().map(|u| u.missing.clone()).collect(),
                Err(ReferenceError::Missing(unresolved)) => vec![unresolved.missing.clone()],
                Err(ReferenceError::Invalid { .. }) => Vec::new(),
            };
            let retry: Vec<TypedKey> = missing
                .into_iter()
                .filter(|key| !run.is_absent(key) && refilled.insert(key.clone()))
                .collect();
            if retry.is_empty() {
                return result;
            }

            let before = known.len();
            for key in retry {
                self.refill(run, key, &mut known).await;
            }
            if known.len() == before {
                return result;
            }
        }
    }

    /// Warms a single key, keeping its id even if the cache evicts it again.
    async fn refill(
        &self,
        run: &Run<C::Draft>,
        key: TypedKey,
        known: &mut HashMap<TypedKey, ResourceId>,
    ) {
        let Some(cache) = self.resolver.cache(key.resource_type) else {
            return;
        };
        trace!(missing = %key, "cache miss, warming single key");
        let keys = HashSet::from([key.key.clone()]);
        match cache.warm(&keys).await {
            Ok(mut found) => match found.remove(&key.key) {
                Some(id) => {
                    known.insert(key, id);
                }
                None => {
                    run.absent.lock().insert(key);
                }
            },
            Err(err) => debug!(missing = %key, error = %err, "failed to warm single key"),
        }
    }

    /// Fetches existing resources by key and records their ids.
    async fn fetch_existing(
        &self,
        keys: &HashSet<ResourceKey>,
    ) -> RemoteResult<HashMap<ResourceKey, C::Resource>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let resources = self.client.fetch_by_keys(keys).await?;
        Ok(resources
            .into_iter()
            .map(|resource| {
                self.own_cache
                    .insert(resource.key().clone(), resource.id().clone());
                (resource.key().clone(), resource)
            })
            .collect())
    }

    async fn run_drafts(
        &self,
        run: &Run<C::Draft>,
        work: Vec<(C::Draft, Option<C::Resource>, Origin)>,
    ) {
        stream::iter(work)
            .map(|(draft, old, origin)| self.guarded_sync_draft(run, draft, old, origin))
            .buffer_unordered(self.config.max_parallel_requests)
            .collect::<Vec<()>>()
            .await;
    }

    /// Runs one draft, turning a panic into a failure of that draft only.
    async fn guarded_sync_draft(
        &self,
        run: &Run<C::Draft>,
        draft: C::Draft,
        old: Option<C::Resource>,
        origin: Origin,
    ) {
        let key = draft
            .key()
            .cloned()
            .unwrap_or_else(|| ResourceKey::new(""));
        let result = AssertUnwindSafe(self.sync_draft(run, draft, old, origin))
            .catch_unwind()
            .await;
        if let Err(panic) = result {
            let error = SyncError::Internal {
                key,
                message: panic_message(panic.as_ref()),
            };
            self.fail(&error, None, None, &[]);
            if origin.counts() {
                run.stats.record(DraftOutcome::Failed);
            }
        }
    }

    async fn sync_draft(
        &self,
        run: &Run<C::Draft>,
        draft: C::Draft,
        old: Option<C::Resource>,
        origin: Origin,
    ) {
        let Some(key) = draft.valid_key().cloned() else {
            return;
        };

        let resolved = match self.resolve(run, &draft).await {
            Ok(resolved) => resolved,
            Err(ReferenceError::Missing(unresolved)) => {
                self.defer(run, &key, draft, unresolved, origin.deferral_kind());
                return;
            }
            Err(ReferenceError::Invalid { field, reason }) => {
                let error = SyncError::InvalidReference {
                    resource_type: self.resource_type(),
                    key,
                    field,
                    problem: reason,
                };
                self.fail(&error, Some(&draft), old.as_ref(), &[]);
                if origin.counts() {
                    run.stats.record(DraftOutcome::Failed);
                }
                return;
            }
        };
        self.trace_state(&key, DraftState::Resolved);
        for unresolved in resolved.detached {
            self.defer(run, &key, draft.clone(), unresolved, DeferralKind::Fragment);
        }

        let outcome = match old {
            Some(old) => self.update(&key, resolved.draft, old).await,
            None if origin == Origin::Fragment => {
                debug!(key = %key, "resource no longer exists, skipping detached fields");
                return;
            }
            None => self.create(run, &key, resolved.draft).await,
        };

        self.trace_state(&key, outcome.state());
        if origin.counts() {
            run.stats.record(outcome);
        }
    }

    fn defer(
        &self,
        run: &Run<C::Draft>,
        key: &ResourceKey,
        draft: C::Draft,
        unresolved: UnresolvedReference,
        kind: DeferralKind,
    ) {
        debug!(
            key = %key,
            missing = %unresolved.missing,
            field = %unresolved.field,
            ?kind,
            "deferring until referenced key exists"
        );
        self.trace_state(key, DraftState::Deferred);
        run.stats.add_waiting(unresolved.missing.clone(), key.clone());
        run.tracker.defer(DeferredEntry::new(
            draft,
            key.clone(),
            unresolved.missing,
            unresolved.field,
            kind,
        ));
    }

    async fn create(&self, run: &Run<C::Draft>, key: &ResourceKey, draft: C::Draft) -> DraftOutcome {
        let Some(draft) = self.callbacks.apply_before_create(draft) else {
            debug!(key = %key, "create suppressed by callback");
            return DraftOutcome::Unchanged;
        };

        match self.client.create(&draft).await {
            Ok(Some(resource)) => {
                self.own_cache
                    .insert(resource.key().clone(), resource.id().clone());
                let created = TypedKey::new(self.resource_type(), resource.key().clone());
                run.absent.lock().remove(&created);
                if run.tracker.is_pending(&created) {
                    run.ready.lock().insert(created);
                }
                DraftOutcome::Created
            }
            Ok(None) => {
                let error = SyncError::CreateFailed {
                    key: key.clone(),
                    reason: "no resource was returned".to_string(),
                    source: None,
                };
                self.fail(&error, Some(&draft), None, &[])
            }
            Err(source) => {
                let error = SyncError::CreateFailed {
                    key: key.clone(),
                    reason: source.to_string(),
                    source: Some(source),
                };
                self.fail(&error, Some(&draft), None, &[])
            }
        }
    }

    /// Diffs and updates, retrying at most [`CONFLICT_RETRIES`] times after
    /// a version conflict. The diff is recomputed against a fresh copy of
    /// the resource before every retry.
    async fn update(&self, key: &ResourceKey, draft: C::Draft, old: C::Resource) -> DraftOutcome {
        let mut current = old;
        let mut retries_left = CONFLICT_RETRIES;

        loop {
            let operations = self.diff.diff(Some(&current), &draft);
            let operations = self
                .callbacks
                .apply_before_update(operations, &draft, &current);
            self.trace_state(key, DraftState::Diffed);
            if operations.is_empty() {
                return DraftOutcome::Unchanged;
            }

            let source = match self.send_update(&current, &operations).await {
                UpdateAttempt::Applied(_) => return DraftOutcome::Updated,
                UpdateAttempt::Failed(source) => source,
                UpdateAttempt::Conflict(source) if retries_left == 0 => source,
                UpdateAttempt::Conflict(source) => {
                    retries_left -= 1;
                    self.trace_state(key, DraftState::ConflictRetried);
                    debug!(key = %key, error = %source, "version conflict, refetching");
                    match self.client.fetch_by_id(current.id()).await {
                        Ok(Some(fresh)) => {
                            current = fresh;
                            continue;
                        }
                        Ok(None) => {
                            let error = SyncError::ConflictResourceMissing {
                                resource_type: self.resource_type(),
                                key: key.clone(),
                            };
                            return self.fail(&error, Some(&draft), Some(&current), &operations);
                        }
                        Err(source) => {
                            let error = SyncError::ConflictRefetchFailed {
                                resource_type: self.resource_type(),
                                key: key.clone(),
                                source,
                            };
                            return self.fail(&error, Some(&draft), Some(&current), &operations);
                        }
                    }
                }
            };

            let error = SyncError::UpdateFailed {
                resource_type: self.resource_type(),
                key: key.clone(),
                source,
            };
            return self.fail(&error, Some(&draft), Some(&current), &operations);
        }
    }

    /// Sends `operations` in chunks of at most `max_update_actions`, each
    /// chunk applied to the resource returned by the previous one.
    async fn send_update(
        &self,
        resource: &C::Resource,
        operations: &[C::Operation],
    ) -> UpdateAttempt<C::Resource> {
        let mut latest: Option<C::Resource> = None;
        for chunk in operations.chunks(self.config.max_update_actions) {
            let base = latest.as_ref().unwrap_or(resource);
            match UpdateAttempt::from_result(self.client.update(base, chunk).await) {
                UpdateAttempt::Applied(updated) => latest = Some(updated),
                other => return other,
            }
        }
        UpdateAttempt::Applied(latest.unwrap_or_else(|| resource.clone()))
    }

    /// Re-offers deferred drafts whose missing key is now known to exist,
    /// repeating until no further key becomes resolvable. Each key is
    /// flushed at most once per call.
    async fn flush_resolved(&self, run: &Run<C::Draft>) {
        let mut flushed: HashSet<TypedKey> = HashSet::new();
        loop {
            let ready: Vec<TypedKey> = run
                .tracker
                .pending_keys()
                .into_iter()
                .filter(|key| {
                    !flushed.contains(key)
                        && (run.ready.lock().remove(key) || self.resolver.is_resolvable(key))
                })
                .collect();
            if ready.is_empty() {
                return;
            }

            // entity -> (draft, whole?)
            let mut entities: BTreeMap<ResourceKey, (C::Draft, bool)> = BTreeMap::new();
            for key in ready {
                run.stats.remove_waiting_key(&key);
                for entry in run.tracker.on_resolved(&key) {
                    let whole = entry.kind == DeferralKind::Whole;
                    entities
                        .entry(entry.entity_key)
                        .and_modify(|(_, w)| *w |= whole)
                        .or_insert((entry.draft, whole));
                }
                flushed.insert(key);
            }
            debug!(
                resource_type = %self.resource_type(),
                drafts = entities.len(),
                "flushing deferred drafts"
            );

            let drafts: Vec<&C::Draft> = entities.values().map(|(draft, _)| draft).collect();
            if let Err(err) = self.warm_caches(run, &referenced_keys(drafts)).await {
                warn!(error = %err, "failed to warm caches for deferred drafts");
            }

            let keys: HashSet<ResourceKey> = entities.keys().cloned().collect();
            let existing = match self.fetch_existing(&keys).await {
                Ok(existing) => existing,
                Err(source) => {
                    let joined = join_keys(&keys);
                    for (_, (draft, whole)) in entities {
                        let error = SyncError::FetchFailed {
                            resource_type: self.resource_type(),
                            keys: joined.clone(),
                            source: source.clone(),
                        };
                        self.fail(&error, Some(&draft), None, &[]);
                        if whole {
                            run.stats.record(DraftOutcome::Failed);
                        }
                    }
                    continue;
                }
            };

            let work = entities
                .into_iter()
                .map(|(key, (draft, whole))| {
                    let origin = if whole { Origin::Deferred } else { Origin::Fragment };
                    (draft, existing.get(&key).cloned(), origin)
                })
                .collect();
            self.run_drafts(run, work).await;
        }
    }

    /// Gives pending drafts a last chance, then reports what is left.
    async fn finish(&self, run: &Run<C::Draft>) {
        if run.tracker.is_empty() {
            return;
        }

        let mut pending: HashMap<ResourceType, HashSet<ResourceKey>> = HashMap::new();
        for key in run.tracker.pending_keys() {
            pending.entry(key.resource_type).or_default().insert(key.key);
        }
        match self.warm_caches(run, &pending).await {
            Ok(()) => {
                let absent = run.absent.lock();
                run.ready.lock().extend(
                    run.tracker
                        .pending_keys()
                        .into_iter()
                        .filter(|key| !absent.contains(key)),
                );
            }
            Err(err) => warn!(error = %err, "failed to warm caches for still-pending keys"),
        }
        self.flush_resolved(run).await;

        let mut counted = HashSet::new();
        for entry in run.tracker.drain_all() {
            let error = SyncError::UnresolvedReference {
                resource_type: self.resource_type(),
                key: entry.entity_key.clone(),
                field: entry.fields.join(", "),
                missing: entry.missing.clone(),
            };
            match entry.kind {
                DeferralKind::Whole => {
                    self.fail(&error, Some(&entry.draft), None, &[]);
                    if counted.insert(entry.entity_key) {
                        run.stats.record(DraftOutcome::Failed);
                    }
                }
                DeferralKind::Fragment => {
                    warn!(
                        key = %entry.entity_key,
                        missing = %entry.missing,
                        waited_ms = entry.waited().as_millis() as u64,
                        "detached reference never resolved"
                    );
                    self.callbacks
                        .report_warning(&error, Some(&entry.draft), None);
                }
            }
        }
    }

    fn fail(
        &self,
        error: &SyncError,
        draft: Option<&C::Draft>,
        old: Option<&C::Resource>,
        operations: &[C::Operation],
    ) -> DraftOutcome {
        warn!(resource_type = %self.resource_type(), error = %error, "draft failed to sync");
        self.callbacks.report_error(error, draft, old, operations);
        DraftOutcome::Failed
    }

    fn trace_state(&self, key: &ResourceKey, state: DraftState) {
        trace!(resource_type = %self.resource_type(), key = %key, state = %state, "draft state");
    }
}

impl<C, E> std::fmt::Debug for SyncEngine<C, E>
where
    C: ResourceClient,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("resource_type", &self.client.resource_type())
            .field("config", &self.config)
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

/// Splits `items` into consecutive chunks of at most `size` items.
fn split_batch<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(size));
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        chunks.push(items.by_ref().take(size).collect());
    }
    chunks
}

fn referenced_keys<'a, D: SyncDraft>(
    drafts: impl IntoIterator<Item = &'a D>,
) -> HashMap<ResourceType, HashSet<ResourceKey>> {
    let mut keys: HashMap<ResourceType, HashSet<ResourceKey>> = HashMap::new();
    for draft in drafts {
        for field in draft.references() {
            if let Some(key) = field.reference.key().filter(|key| !key.is_blank()) {
                keys.entry(field.reference.resource_type)
                    .or_default()
                    .insert(key.clone());
            }
        }
    }
    keys
}

fn join_keys(keys: &HashSet<ResourceKey>) -> String {
    let mut keys: Vec<&str> = keys.iter().map(ResourceKey::as_str).collect();
    keys.sort_unstable();
    keys.join(", ")
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
