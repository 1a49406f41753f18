//! Records what the engine reports through its callbacks.

use parking_lot::Mutex;
use refsync_engine::{ResourceKey, SyncCallbacks, SyncDraft, SyncError};
use std::error::Error as _;
use std::sync::Arc;

/// One reported error or warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Display string of the error.
    pub message: String,
    /// Key of the draft, if a draft was passed.
    pub key: Option<ResourceKey>,
    /// Whether an existing resource was passed.
    pub had_old_resource: bool,
    /// Number of operations passed.
    pub operations: usize,
    /// Whether the error has an underlying cause.
    pub has_cause: bool,
    /// Whether the error is worth retrying in a later run.
    pub transient: bool,
}

impl Report {
    fn new<D: SyncDraft>(error: &SyncError, draft: Option<&D>, had_old: bool, operations: usize) -> Self {
        Self {
            message: error.to_string(),
            key: draft.and_then(|d| d.key().cloned()),
            had_old_resource: had_old,
            operations,
            has_cause: error.source().is_some(),
            transient: error.is_transient(),
        }
    }
}

/// Collects error and warning reports.
#[derive(Debug, Default)]
pub struct CallbackRecorder {
    errors: Mutex<Vec<Report>>,
    warnings: Mutex<Vec<Report>>,
}

impl CallbackRecorder {
    /// Creates a shared recorder.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Callbacks feeding this recorder.
    pub fn callbacks<D, R, O>(self: &Arc<Self>) -> SyncCallbacks<D, R, O>
    where
        D: SyncDraft,
        R: 'static,
        O: 'static,
    {
        let errors = Arc::clone(self);
        let warnings = Arc::clone(self);
        SyncCallbacks::new()
            .on_error(move |error, draft: Option<&D>, old: Option<&R>, operations: &[O]| {
                errors
                    .errors
                    .lock()
                    .push(Report::new(error, draft, old.is_some(), operations.len()));
            })
            .on_warning(move |error, draft: Option<&D>, old: Option<&R>| {
                warnings
                    .warnings
                    .lock()
                    .push(Report::new(error, draft, old.is_some(), 0));
            })
    }

    /// Every error reported so far.
    pub fn errors(&self) -> Vec<Report> {
        self.errors.lock().clone()
    }

    /// Every warning reported so far.
    pub fn warnings(&self) -> Vec<Report> {
        self.warnings.lock().clone()
    }

    /// Error messages, in report order.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.lock().iter().map(|r| r.message.clone()).collect()
    }

    /// Errors reported for `key`.
    pub fn errors_for(&self, key: &str) -> Vec<Report> {
        self.errors
            .lock()
            .iter()
            .filter(|r| r.key.as_ref().is_some_and(|k| k.as_str() == key))
            .cloned()
            .collect()
    }

    /// Forgets every report.
    pub fn clear(&self) {
        self.errors.lock().clear();
        self.warnings.lock().clear();
    }
}
