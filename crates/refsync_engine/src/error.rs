//! Error types for the sync engine.

use crate::types::{ResourceKey, ResourceType, TypedKey, Version};
use thiserror::Error;

/// Result type for calls to the remote service.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors reported by a resource client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The resource changed since it was read.
    #[error("concurrent modification: expected version {expected}, found {actual}")]
    ConcurrentModification {
        /// Version the update was based on.
        expected: Version,
        /// Version currently stored remotely.
        actual: Version,
    },

    /// The service is temporarily unable to serve the request (5xx, gateway errors).
    #[error("remote service unavailable ({status}): {message}")]
    Transient {
        /// HTTP-like status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// The service rejected the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The addressed resource does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),
}

impl RemoteError {
    /// Creates a transient error.
    pub fn transient(status: u16, message: impl Into<String>) -> Self {
        Self::Transient {
            status,
            message: message.into(),
        }
    }

    /// Returns true if this is an optimistic concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, RemoteError::ConcurrentModification { .. })
    }

    /// Returns true if re-submitting the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient { .. })
    }
}

/// Why a key-form reference could not even be looked up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceProblem {
    /// The reference carries a blank key.
    #[error("Reference 'id' field value is blank (null/empty).")]
    BlankKey,

    /// The reference carries a UUID where a key is expected.
    #[error(
        "Found a UUID in the id field. Expecting a key without a UUID value. If you want to \
         allow UUID values for reference keys, please use the allow_uuid_keys(true) option in \
         the sync config."
    )]
    UuidNotAllowed,

    /// No cache is registered for the referenced resource type.
    #[error("No key lookup is registered for resource type '{0}'.")]
    UnknownResourceType(ResourceType),
}

/// Terminal failures reported through the error and warning callbacks.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The batch contained an absent draft.
    #[error("{resource_type} draft is null.")]
    MissingDraft {
        /// Type being synced.
        resource_type: ResourceType,
    },

    /// The draft has no usable key.
    #[error("{resource_type} draft at batch position {position} doesn't have a key.")]
    BlankKey {
        /// Type being synced.
        resource_type: ResourceType,
        /// Position of the draft in its batch.
        position: usize,
    },

    /// A reference field cannot be looked up at all.
    #[error(
        "Failed to resolve references on {resource_type} draft with key:'{key}'. \
         Reason: field '{field}': {problem}"
    )]
    InvalidReference {
        /// Type being synced.
        resource_type: ResourceType,
        /// Key of the draft.
        key: ResourceKey,
        /// Offending field.
        field: String,
        /// What is wrong with it.
        problem: ReferenceProblem,
    },

    /// A required reference never became resolvable during the run.
    #[error(
        "Failed to resolve references on {resource_type} draft with key:'{key}'. \
         Reason: {missing} referenced by field '{field}' doesn't exist."
    )]
    UnresolvedReference {
        /// Type being synced.
        resource_type: ResourceType,
        /// Key of the draft.
        key: ResourceKey,
        /// Field holding the reference.
        field: String,
        /// The key that does not exist.
        missing: TypedKey,
    },

    /// Warming the key-to-id caches failed for a batch.
    #[error("Failed to build a cache of keys to ids. Reason: {source}")]
    CacheWarmFailed {
        /// Underlying remote failure.
        #[source]
        source: RemoteError,
    },

    /// Fetching the existing resources of a batch failed.
    #[error("Failed to fetch existing {resource_type} resources with keys: '{keys}'. Reason: {source}")]
    FetchFailed {
        /// Type being synced.
        resource_type: ResourceType,
        /// Comma-separated keys of the batch.
        keys: String,
        /// Underlying remote failure.
        #[source]
        source: RemoteError,
    },

    /// Creating the resource failed; `source` is `None` for a soft failure.
    #[error("Failed to create draft with key: '{key}'. Reason: {reason}")]
    CreateFailed {
        /// Key of the draft.
        key: ResourceKey,
        /// Human-readable reason.
        reason: String,
        /// Underlying remote failure, if any.
        #[source]
        source: Option<RemoteError>,
    },

    /// Updating the resource failed.
    #[error("Failed to update {resource_type} with key: '{key}'. Reason: {source}")]
    UpdateFailed {
        /// Type being synced.
        resource_type: ResourceType,
        /// Key of the resource.
        key: ResourceKey,
        /// Underlying remote failure.
        #[source]
        source: RemoteError,
    },

    /// The refetch after a conflict failed.
    #[error(
        "Failed to update {resource_type} with key: '{key}'. Reason: Failed to fetch from CTP \
         while retrying after concurrency modification."
    )]
    ConflictRefetchFailed {
        /// Type being synced.
        resource_type: ResourceType,
        /// Key of the resource.
        key: ResourceKey,
        /// Underlying remote failure.
        #[source]
        source: RemoteError,
    },

    /// The resource disappeared between the conflict and the refetch.
    #[error(
        "Failed to update {resource_type} with key: '{key}'. Reason: Not found when attempting \
         to fetch while retrying after concurrency modification."
    )]
    ConflictResourceMissing {
        /// Type being synced.
        resource_type: ResourceType,
        /// Key of the resource.
        key: ResourceKey,
    },

    /// The per-draft pipeline panicked.
    #[error("Unexpected failure while syncing draft with key: '{key}'. Reason: {message}")]
    Internal {
        /// Key of the draft.
        key: ResourceKey,
        /// Panic payload, if it was a string.
        message: String,
    },
}

impl SyncError {
    /// Returns the remote failure behind this error, if any.
    pub fn remote_cause(&self) -> Option<&RemoteError> {
        match self {
            SyncError::CacheWarmFailed { source }
            | SyncError::FetchFailed { source, .. }
            | SyncError::UpdateFailed { source, .. }
            | SyncError::ConflictRefetchFailed { source, .. } => Some(source),
            SyncError::CreateFailed { source, .. } => source.as_ref(),
            _ => None,
        }
    }

    /// Returns true if the caller may re-submit the draft in a later run.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::UnresolvedReference { .. } => true,
            _ => self.remote_cause().is_some_and(RemoteError::is_transient),
        }
    }
}
