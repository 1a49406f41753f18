//! Rewrites key-form references into id-form references.
//!
//! The resolver only reads the caches. Keys that are not cached count as
//! missing; it is up to the caller to warm the caches beforehand.

use crate::cache::ReferenceIdCache;
use crate::error::ReferenceProblem;
use crate::model::SyncDraft;
use crate::types::{ReferencePolicy, ReferenceTarget, ResourceId, ResourceType, TypedKey};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A reference whose key does not exist (yet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    /// Field holding the reference.
    pub field: String,
    /// The missing key.
    pub missing: TypedKey,
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} referenced by field '{}' doesn't exist.",
            self.missing, self.field
        )
    }
}

/// Why a draft could not be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    /// A required reference points at a key that is not known.
    #[error("{0}")]
    Missing(UnresolvedReference),

    /// A reference can never be looked up.
    #[error("field '{field}': {reason}")]
    Invalid {
        /// Offending field.
        field: String,
        /// What is wrong with it.
        reason: ReferenceProblem,
    },
}

/// A draft whose references are all id-form, minus any detached fields.
#[derive(Debug, Clone)]
pub struct ResolvedDraft<D> {
    /// The rewritten draft.
    pub draft: D,
    /// Detachable references that were stripped because their key is missing.
    pub detached: Vec<UnresolvedReference>,
}

/// Resolves draft references through one cache per resource type.
#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
    caches: HashMap<ResourceType, Arc<ReferenceIdCache>>,
    allow_uuid_keys: bool,
}

impl ReferenceResolver {
    /// Creates a resolver with no caches.
    pub fn new(allow_uuid_keys: bool) -> Self {
        Self {
            caches: HashMap::new(),
            allow_uuid_keys,
        }
    }

    /// Registers the cache for its resource type, returning the one it replaces.
    pub fn register(&mut self, cache: Arc<ReferenceIdCache>) -> Option<Arc<ReferenceIdCache>> {
        self.caches.insert(cache.resource_type(), cache)
    }

    /// Cache registered for `resource_type`.
    pub fn cache(&self, resource_type: ResourceType) -> Option<&Arc<ReferenceIdCache>> {
        self.caches.get(&resource_type)
    }

    /// Every registered cache.
    pub fn caches(&self) -> impl Iterator<Item = &Arc<ReferenceIdCache>> {
        self.caches.values()
    }

    /// Returns true if `key` is cached for its resource type.
    pub fn is_resolvable(&self, key: &TypedKey) -> bool {
        self.caches
            .get(&key.resource_type)
            .is_some_and(|cache| cache.contains(&key.key))
    }

    /// Resolves every reference of `draft`.
    ///
    /// Invalid references fail immediately. A missing `Required` reference
    /// fails the whole draft; missing `Detachable` references are stripped
    /// and listed in [`ResolvedDraft::detached`]. The input draft is never
    /// modified.
    pub fn resolve<D: SyncDraft>(&self, draft: &D) -> Result<ResolvedDraft<D>, ReferenceError> {
        self.resolve_with(draft, &HashMap::new())
    }

    /// Like [`resolve`](Self::resolve), but keys missing from the caches are
    /// also looked up in `known`.
    ///
    /// `known` holds ids the caller fetched itself, typically by warming a
    /// key the cache had already evicted.
    pub fn resolve_with<D: SyncDraft>(
        &self,
        draft: &D,
        known: &HashMap<TypedKey, ResourceId>,
    ) -> Result<ResolvedDraft<D>, ReferenceError> {
        let references = draft.references();
        let mut resolved = draft.clone();
        let mut detached = Vec::new();
        let mut first_missing = None;

        for reference in references {
            let ReferenceTarget::Key(key) = &reference.reference.target else {
                continue;
            };
            let resource_type = reference.reference.resource_type;
            let invalid = |reason| ReferenceError::Invalid {
                field: reference.field.clone(),
                reason,
            };

            if key.is_blank() {
                return Err(invalid(ReferenceProblem::BlankKey));
            }
            if !self.allow_uuid_keys && key.looks_like_uuid() {
                return Err(invalid(ReferenceProblem::UuidNotAllowed));
            }
            let Some(cache) = self.caches.get(&resource_type) else {
                return Err(invalid(ReferenceProblem::UnknownResourceType(resource_type)));
            };

            if let Some(id) = cache.get(key) {
                resolved.apply_resolved_reference(&reference.field, &id);
                continue;
            }
            let missing = TypedKey::new(resource_type, key.clone());
            if let Some(id) = known.get(&missing) {
                resolved.apply_resolved_reference(&reference.field, id);
                continue;
            }

            let unresolved = UnresolvedReference {
                field: reference.field.clone(),
                missing,
            };
            match reference.policy {
                ReferencePolicy::Required => {
                    first_missing.get_or_insert(unresolved);
                }
                ReferencePolicy::Detachable => detached.push(unresolved),
            }
        }

        if let Some(missing) = first_missing {
            return Err(ReferenceError::Missing(missing));
        }
        for reference in &detached {
            resolved.detach_reference(&reference.field);
        }
        Ok(ResolvedDraft {
            draft: resolved,
            detached,
        })
    }
}
