//! In-memory remote service.
//!
//! [`MemoryRemote`] stores resources of one family, counts every call and
//! can be told to misbehave: conflict on the next updates, fail fetches,
//! soft-fail or panic on creates, lose a resource between a conflict and
//! its refetch.

use async_trait::async_trait;
use parking_lot::Mutex;
use refsync_engine::{
    RemoteError, RemoteResult, ResourceClient, ResourceId, ResourceKey, ResourceType,
    SyncDraft, SyncResource, Version,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// How a resource family is stored and mutated by [`MemoryRemote`].
pub trait RemoteModel: Send + Sync + 'static {
    /// Resource representation.
    type Resource: SyncResource;
    /// Draft representation.
    type Draft: SyncDraft;
    /// Update operation.
    type Operation: Clone + Debug + Send + Sync + 'static;

    /// Resource type served.
    fn resource_type() -> ResourceType;

    /// Builds a version 1 resource from a draft.
    fn build(draft: &Self::Draft, id: ResourceId) -> Self::Resource;

    /// Applies one operation.
    fn apply(resource: &mut Self::Resource, operation: &Self::Operation);

    /// Overwrites the version.
    fn set_version(resource: &mut Self::Resource, version: Version);
}

/// Number of calls per client method.
#[derive(Debug, Default)]
pub struct CallCounters {
    fetch_by_keys: AtomicU64,
    fetch_ids_by_keys: AtomicU64,
    fetch_by_id: AtomicU64,
    create: AtomicU64,
    update: AtomicU64,
}

impl CallCounters {
    /// `fetch_by_keys` calls.
    pub fn fetch_by_keys(&self) -> u64 {
        self.fetch_by_keys.load(Ordering::SeqCst)
    }

    /// `fetch_ids_by_keys` calls.
    pub fn fetch_ids_by_keys(&self) -> u64 {
        self.fetch_ids_by_keys.load(Ordering::SeqCst)
    }

    /// `fetch_by_id` calls.
    pub fn fetch_by_id(&self) -> u64 {
        self.fetch_by_id.load(Ordering::SeqCst)
    }

    /// `create` calls.
    pub fn create(&self) -> u64 {
        self.create.load(Ordering::SeqCst)
    }

    /// `update` calls.
    pub fn update(&self) -> u64 {
        self.update.load(Ordering::SeqCst)
    }

    /// Every write call.
    pub fn writes(&self) -> u64 {
        self.create() + self.update()
    }

    fn reset(&self) {
        for counter in [
            &self.fetch_by_keys,
            &self.fetch_ids_by_keys,
            &self.fetch_by_id,
            &self.create,
            &self.update,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    conflicts: usize,
    fetch_by_keys: Option<RemoteError>,
    fetch_ids_by_keys: Option<RemoteError>,
    fetch_by_id: Option<RemoteError>,
    lose_on_refetch: bool,
    update: Option<RemoteError>,
    soft_create: HashSet<ResourceKey>,
    create: HashMap<ResourceKey, RemoteError>,
    panic_on_create: HashSet<ResourceKey>,
}

struct Store<R> {
    by_id: BTreeMap<ResourceId, R>,
    ids: HashMap<ResourceKey, ResourceId>,
}

/// In-memory [`ResourceClient`] for one resource family.
pub struct MemoryRemote<M: RemoteModel> {
    store: Mutex<Store<M::Resource>>,
    faults: Mutex<Faults>,
    calls: CallCounters,
    update_sizes: Mutex<Vec<usize>>,
    _model: PhantomData<M>,
}

impl<M: RemoteModel> MemoryRemote<M> {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store {
                by_id: BTreeMap::new(),
                ids: HashMap::new(),
            }),
            faults: Mutex::new(Faults::default()),
            calls: CallCounters::default(),
            update_sizes: Mutex::new(Vec::new()),
            _model: PhantomData,
        }
    }

    /// Stores a resource built from `draft` without counting a call.
    ///
    /// # Panics
    ///
    /// Panics if the draft has no key.
    pub fn seed(&self, draft: &M::Draft) -> M::Resource {
        let key = draft.key().cloned().expect("seeded draft must have a key");
        let resource = M::build(draft, new_id());
        let mut store = self.store.lock();
        store.ids.insert(key, resource.id().clone());
        store.by_id.insert(resource.id().clone(), resource.clone());
        resource
    }

    /// Current resource stored under `key`.
    pub fn get(&self, key: &str) -> Option<M::Resource> {
        let store = self.store.lock();
        let id = store.ids.get(key)?;
        store.by_id.get(id).cloned()
    }

    /// Id of the resource stored under `key`.
    pub fn id_of(&self, key: &str) -> Option<ResourceId> {
        self.store.lock().ids.get(key).cloned()
    }

    /// Every stored resource, ordered by id.
    pub fn resources(&self) -> Vec<M::Resource> {
        self.store.lock().by_id.values().cloned().collect()
    }

    /// Number of stored resources.
    pub fn len(&self) -> usize {
        self.store.lock().by_id.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deletes the resource stored under `key`.
    pub fn delete(&self, key: &str) -> Option<M::Resource> {
        let mut store = self.store.lock();
        let id = store.ids.remove(key)?;
        store.by_id.remove(&id)
    }

    /// Bumps the version of the resource under `key`, as a concurrent writer would.
    pub fn bump_version(&self, key: &str) {
        let mut store = self.store.lock();
        let Some(id) = store.ids.get(key).cloned() else {
            return;
        };
        if let Some(resource) = store.by_id.get_mut(&id) {
            let next = resource.version().next();
            M::set_version(resource, next);
        }
    }

    /// Makes the next `count` update calls fail with a version conflict.
    pub fn conflict_on_next_updates(&self, count: usize) {
        self.faults.lock().conflicts = count;
    }

    /// Makes every `fetch_by_keys` call fail until cleared.
    pub fn fail_fetch_by_keys(&self, error: Option<RemoteError>) {
        self.faults.lock().fetch_by_keys = error;
    }

    /// Makes every `fetch_ids_by_keys` call fail until cleared.
    pub fn fail_fetch_ids_by_keys(&self, error: Option<RemoteError>) {
        self.faults.lock().fetch_ids_by_keys = error;
    }

    /// Makes every `fetch_by_id` call fail until cleared.
    pub fn fail_fetch_by_id(&self, error: Option<RemoteError>) {
        self.faults.lock().fetch_by_id = error;
    }

    /// Makes `fetch_by_id` report every resource as missing.
    pub fn lose_on_refetch(&self, lose: bool) {
        self.faults.lock().lose_on_refetch = lose;
    }

    /// Makes every update call fail until cleared.
    pub fn fail_updates(&self, error: Option<RemoteError>) {
        self.faults.lock().update = error;
    }

    /// Makes `create` return no resource for `key`.
    pub fn soft_fail_create(&self, key: &str) {
        self.faults.lock().soft_create.insert(key.into());
    }

    /// Makes `create` fail with `error` for `key`.
    pub fn fail_create(&self, key: &str, error: RemoteError) {
        self.faults.lock().create.insert(key.into(), error);
    }

    /// Makes `create` panic for `key`.
    pub fn panic_on_create(&self, key: &str) {
        self.faults.lock().panic_on_create.insert(key.into());
    }

    /// Clears every injected fault.
    pub fn heal(&self) {
        *self.faults.lock() = Faults::default();
    }

    /// Call counters.
    pub fn calls(&self) -> &CallCounters {
        &self.calls
    }

    /// Number of operations sent by each update call, in call order.
    pub fn update_sizes(&self) -> Vec<usize> {
        self.update_sizes.lock().clone()
    }

    /// Resets call counters and the update log.
    pub fn reset_calls(&self) {
        self.calls.reset();
        self.update_sizes.lock().clear();
    }
}

impl<M: RemoteModel> Default for MemoryRemote<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<M: RemoteModel> ResourceClient for MemoryRemote<M> {
    type Resource = M::Resource;
    type Draft = M::Draft;
    type Operation = M::Operation;

    fn resource_type(&self) -> ResourceType {
        M::resource_type()
    }

    async fn fetch_by_keys(&self, keys: &HashSet<ResourceKey>) -> RemoteResult<Vec<M::Resource>> {
        self.calls.fetch_by_keys.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.faults.lock().fetch_by_keys.clone() {
            return Err(err);
        }
        let store = self.store.lock();
        Ok(keys
            .iter()
            .filter_map(|key| store.ids.get(key))
            .filter_map(|id| store.by_id.get(id).cloned())
            .collect())
    }

    async fn fetch_ids_by_keys(
        &self,
        keys: &HashSet<ResourceKey>,
    ) -> RemoteResult<HashMap<ResourceKey, ResourceId>> {
        self.calls.fetch_ids_by_keys.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.faults.lock().fetch_ids_by_keys.clone() {
            return Err(err);
        }
        let store = self.store.lock();
        Ok(keys
            .iter()
            .filter_map(|key| store.ids.get(key).map(|id| (key.clone(), id.clone())))
            .collect())
    }

    async fn fetch_by_id(&self, id: &ResourceId) -> RemoteResult<Option<M::Resource>> {
        self.calls.fetch_by_id.fetch_add(1, Ordering::SeqCst);
        {
            let faults = self.faults.lock();
            if let Some(err) = faults.fetch_by_id.clone() {
                return Err(err);
            }
            if faults.lose_on_refetch {
                return Ok(None);
            }
        }
        Ok(self.store.lock().by_id.get(id).cloned())
    }

    async fn create(&self, draft: &M::Draft) -> RemoteResult<Option<M::Resource>> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        let Some(key) = draft.key().cloned() else {
            return Err(RemoteError::Rejected("draft has no key".to_string()));
        };
        {
            let faults = self.faults.lock();
            if faults.panic_on_create.contains(&key) {
                drop(faults);
                panic!("injected panic while creating '{key}'");
            }
            if faults.soft_create.contains(&key) {
                debug!(key = %key, "injected soft create failure");
                return Ok(None);
            }
            if let Some(err) = faults.create.get(&key) {
                debug!(key = %key, error = %err, "injected create failure");
                return Err(err.clone());
            }
        }

        let mut store = self.store.lock();
        if store.ids.contains_key(&key) {
            return Err(RemoteError::Rejected(format!(
                "a resource with key '{key}' already exists"
            )));
        }
        let resource = M::build(draft, new_id());
        store.ids.insert(key, resource.id().clone());
        store.by_id.insert(resource.id().clone(), resource.clone());
        Ok(Some(resource))
    }

    async fn update(
        &self,
        resource: &M::Resource,
        operations: &[M::Operation],
    ) -> RemoteResult<M::Resource> {
        self.calls.update.fetch_add(1, Ordering::SeqCst);
        self.update_sizes.lock().push(operations.len());

        let mut store = self.store.lock();
        let Some(stored) = store.by_id.get_mut(resource.id()) else {
            return Err(RemoteError::NotFound(resource.id().to_string()));
        };

        {
            let mut faults = self.faults.lock();
            if faults.conflicts > 0 {
                faults.conflicts -= 1;
                debug!(key = %resource.key(), remaining = faults.conflicts, "injected version conflict");
                // a concurrent writer got there first
                let actual = stored.version().next();
                M::set_version(stored, actual);
                return Err(RemoteError::ConcurrentModification {
                    expected: resource.version(),
                    actual,
                });
            }
            if let Some(err) = faults.update.clone() {
                return Err(err);
            }
        }

        if stored.version() != resource.version() {
            return Err(RemoteError::ConcurrentModification {
                expected: resource.version(),
                actual: stored.version(),
            });
        }
        for operation in operations {
            M::apply(stored, operation);
        }
        let next = stored.version().next();
        M::set_version(stored, next);
        Ok(stored.clone())
    }
}

fn new_id() -> ResourceId {
    ResourceId::new(uuid::Uuid::new_v4().to_string())
}
