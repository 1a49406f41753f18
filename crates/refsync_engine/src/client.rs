//! Remote service abstraction.
//!
//! The engine never talks to the network directly. A [`ResourceClient`]
//! covers the resource type being synced; a [`KeyLookup`] covers any other
//! resource type that drafts reference.

use crate::error::RemoteResult;
use crate::model::{SyncDraft, SyncResource};
use crate::types::{ResourceId, ResourceKey, ResourceType};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;

/// Resolves keys of one resource type to ids.
#[async_trait]
pub trait KeyLookup: Send + Sync {
    /// Resource type this lookup serves.
    fn resource_type(&self) -> ResourceType;

    /// Queries the ids of the given keys in one request.
    ///
    /// Keys without a matching remote resource are absent from the result.
    async fn fetch_ids_by_keys(
        &self,
        keys: &HashSet<ResourceKey>,
    ) -> RemoteResult<HashMap<ResourceKey, ResourceId>>;
}

/// Client for the resource type being synced.
///
/// Implementations handle transport, authentication and payload encoding.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Resource representation.
    type Resource: SyncResource;
    /// Draft representation.
    type Draft: SyncDraft;
    /// Update operation.
    type Operation: Clone + Debug + Send + Sync + 'static;

    /// Resource type this client serves.
    fn resource_type(&self) -> ResourceType;

    /// Fetches every resource whose key is in `keys`.
    async fn fetch_by_keys(&self, keys: &HashSet<ResourceKey>) -> RemoteResult<Vec<Self::Resource>>;

    /// Queries only the ids of the given keys.
    ///
    /// The default fetches full resources; override it when the service has
    /// a cheaper projection.
    async fn fetch_ids_by_keys(
        &self,
        keys: &HashSet<ResourceKey>,
    ) -> RemoteResult<HashMap<ResourceKey, ResourceId>> {
        let resources = self.fetch_by_keys(keys).await?;
        Ok(resources
            .into_iter()
            .map(|resource| (resource.key().clone(), resource.id().clone()))
            .collect())
    }

    /// Fetches a resource by id. `Ok(None)` means it does not exist.
    async fn fetch_by_id(&self, id: &ResourceId) -> RemoteResult<Option<Self::Resource>>;

    /// Creates a resource. `Ok(None)` is a soft failure.
    async fn create(&self, draft: &Self::Draft) -> RemoteResult<Option<Self::Resource>>;

    /// Applies `operations`, in order, to `resource` at its current version.
    ///
    /// Fails with [`RemoteError::ConcurrentModification`] on a stale version.
    ///
    /// [`RemoteError::ConcurrentModification`]: crate::RemoteError::ConcurrentModification
    async fn update(
        &self,
        resource: &Self::Resource,
        operations: &[Self::Operation],
    ) -> RemoteResult<Self::Resource>;
}

/// Exposes a [`ResourceClient`] as the [`KeyLookup`] of its own type.
pub struct ClientKeyLookup<C> {
    client: Arc<C>,
}

impl<C: ResourceClient> ClientKeyLookup<C> {
    /// Wraps a client.
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: ResourceClient> KeyLookup for ClientKeyLookup<C> {
    fn resource_type(&self) -> ResourceType {
        self.client.resource_type()
    }

    async fn fetch_ids_by_keys(
        &self,
        keys: &HashSet<ResourceKey>,
    ) -> RemoteResult<HashMap<ResourceKey, ResourceId>> {
        self.client.fetch_ids_by_keys(keys).await
    }
}
