//! # refsync engine
//!
//! Reconciles caller-supplied desired-state drafts against resources held
//! by a remote service, where drafts point at each other by human-readable
//! keys rather than by remote ids.
//!
//! This crate provides:
//! - Batch validation
//! - Bounded key-to-id caches, warmed with one query per batch and type
//! - Reference resolution, with deferral of references to keys that do not exist yet
//! - Minimal-diff updates through a pluggable [`DiffEngine`]
//! - Optimistic concurrency with a single refetch-and-retry
//! - Per-run statistics with a one-line summary
//!
//! ## Architecture
//!
//! A resource family plugs in by implementing [`SyncResource`],
//! [`SyncDraft`] and [`DiffEngine`], and by supplying a [`ResourceClient`]
//! for the remote service. [`SyncEngine::sync`] drives the rest:
//!
//! ```text
//! validate → warm caches → fetch existing → resolve → diff → create | update
//!                                              ↓
//!                                          deferred ──(key appears)──→ resolve ...
//! ```
//!
//! ## Key Invariants
//!
//! - Drafts without a key never reach the network
//! - A key is sent to the remote service at most once per warm
//! - A deferred entry is re-offered at most once per resolved key
//! - An update is retried at most once after a version conflict
//! - `processed == created + updated + failed + unchanged` after every run

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod callbacks;
mod client;
mod config;
mod deferred;
mod engine;
mod error;
mod model;
mod resolver;
mod state;
mod stats;
mod types;
mod validator;

pub use cache::ReferenceIdCache;
pub use callbacks::{
    BeforeCreateCallback, BeforeUpdateCallback, ErrorCallback, SyncCallbacks, WarningCallback,
};
pub use client::{ClientKeyLookup, KeyLookup, ResourceClient};
pub use config::{
    SyncConfig, DEFAULT_BATCH_SIZE, DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_PARALLEL_REQUESTS,
    DEFAULT_MAX_UPDATE_ACTIONS,
};
pub use deferred::{DeferralKind, DeferredEntry, DeferredTracker};
pub use engine::{SyncEngine, CONFLICT_RETRIES};
pub use error::{ReferenceProblem, RemoteError, RemoteResult, SyncError};
pub use model::{DiffEngine, SyncDraft, SyncResource};
pub use resolver::{ReferenceError, ReferenceResolver, ResolvedDraft, UnresolvedReference};
pub use state::{DraftOutcome, DraftState, UpdateAttempt};
pub use stats::{StatsSnapshot, SyncStatistics};
pub use types::{
    FieldReference, Reference, ReferencePolicy, ReferenceTarget, ResourceId, ResourceKey,
    ResourceType, TypedKey, Version,
};
pub use validator::{BatchValidator, ValidatedBatch};
