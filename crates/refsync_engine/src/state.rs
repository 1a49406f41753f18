//! Draft lifecycle states and outcomes.

use crate::error::RemoteError;
use std::fmt;

/// Where a draft is in its pipeline.
///
/// ```text
/// Received → Validated → {Rejected | KeysCached} → {Resolved | Deferred}
///          → Diffed → {NoOp | Created | Updated} → {ConflictRetried → Updated | Failed} → Done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftState {
    /// Taken from the caller's batch.
    Received,
    /// Passed validation.
    Validated,
    /// Failed validation.
    Rejected,
    /// Caches warmed and the existing resource looked up.
    KeysCached,
    /// All required references resolved.
    Resolved,
    /// Waiting on a key that does not exist yet.
    Deferred,
    /// Update operations computed.
    Diffed,
    /// Nothing to send.
    NoOp,
    /// Resource created.
    Created,
    /// Resource updated.
    Updated,
    /// Update hit a version conflict and is being retried.
    ConflictRetried,
    /// Terminal failure.
    Failed,
    /// Finished.
    Done,
}

impl DraftState {
    /// Returns true if no further transition follows.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DraftState::Rejected | DraftState::Failed | DraftState::Done
        )
    }

    /// Returns the state name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftState::Received => "received",
            DraftState::Validated => "validated",
            DraftState::Rejected => "rejected",
            DraftState::KeysCached => "keys_cached",
            DraftState::Resolved => "resolved",
            DraftState::Deferred => "deferred",
            DraftState::Diffed => "diffed",
            DraftState::NoOp => "no_op",
            DraftState::Created => "created",
            DraftState::Updated => "updated",
            DraftState::ConflictRetried => "conflict_retried",
            DraftState::Failed => "failed",
            DraftState::Done => "done",
        }
    }
}

impl fmt::Display for DraftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a counted draft ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftOutcome {
    /// A new resource was created.
    Created,
    /// An existing resource was updated.
    Updated,
    /// Nothing was sent: empty diff, or the change was suppressed by a callback.
    Unchanged,
    /// The draft failed.
    Failed,
}

impl DraftOutcome {
    /// The terminal state matching this outcome.
    pub fn state(&self) -> DraftState {
        match self {
            DraftOutcome::Created => DraftState::Created,
            DraftOutcome::Updated => DraftState::Updated,
            DraftOutcome::Unchanged => DraftState::NoOp,
            DraftOutcome::Failed => DraftState::Failed,
        }
    }
}

/// Result of sending one update.
#[derive(Debug, Clone)]
pub enum UpdateAttempt<R> {
    /// Every operation was applied; holds the resulting resource.
    Applied(R),
    /// The resource version was stale.
    Conflict(RemoteError),
    /// Any other failure.
    Failed(RemoteError),
}

impl<R> UpdateAttempt<R> {
    /// Classifies the outcome of an update call.
    pub fn from_result(result: Result<R, RemoteError>) -> Self {
        match result {
            Ok(resource) => UpdateAttempt::Applied(resource),
            Err(err) if err.is_conflict() => UpdateAttempt::Conflict(err),
            Err(err) => UpdateAttempt::Failed(err),
        }
    }
}
