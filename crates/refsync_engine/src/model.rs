//! Per-resource-family seams.
//!
//! A resource family plugs into the engine by implementing three traits:
//! [`SyncResource`] for the remote representation, [`SyncDraft`] for the
//! desired state, and [`DiffEngine`] to compute update operations.

use crate::types::{FieldReference, ResourceId, ResourceKey, Version};
use std::fmt::Debug;

/// The actual state of a resource as stored remotely.
pub trait SyncResource: Clone + Debug + Send + Sync + 'static {
    /// Caller-assigned key.
    fn key(&self) -> &ResourceKey;

    /// System-assigned id.
    fn id(&self) -> &ResourceId;

    /// Current version, used for optimistic concurrency.
    fn version(&self) -> Version;
}

/// The desired state of a resource as supplied by the caller.
pub trait SyncDraft: Clone + Debug + Send + Sync + 'static {
    /// Caller-assigned key, `None` if the draft has none.
    fn key(&self) -> Option<&ResourceKey>;

    /// Every reference field of the draft, nested ones included.
    fn references(&self) -> Vec<FieldReference>;

    /// Rewrites the reference held at `field` to point at `id`.
    fn apply_resolved_reference(&mut self, field: &str, id: &ResourceId);

    /// Strips the field at `field` from the draft.
    ///
    /// Only called for fields reported as [`ReferencePolicy::Detachable`].
    ///
    /// [`ReferencePolicy::Detachable`]: crate::ReferencePolicy::Detachable
    fn detach_reference(&mut self, field: &str) {
        let _ = field;
    }

    /// Returns the key if it is present and not blank.
    fn valid_key(&self) -> Option<&ResourceKey> {
        self.key().filter(|key| !key.is_blank())
    }
}

/// Computes the update operations turning a resource into a draft.
///
/// Implementations must be pure: the engine re-runs them after a conflict.
/// The returned order is preserved when the update is sent.
pub trait DiffEngine: Send + Sync {
    /// Resource representation.
    type Resource: SyncResource;
    /// Draft representation.
    type Draft: SyncDraft;
    /// Update operation.
    type Operation: Clone + Debug + Send + Sync + 'static;

    /// Returns the operations needed to reconcile `old` with `draft`.
    ///
    /// `old` is `None` when no matching resource exists.
    fn diff(&self, old: Option<&Self::Resource>, draft: &Self::Draft) -> Vec<Self::Operation>;
}
