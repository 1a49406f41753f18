//! Caller hooks invoked by the engine.

use crate::error::SyncError;
use std::fmt;
use std::sync::Arc;

/// Called for every terminal failure with the draft, the existing resource
/// and the operations that were about to be sent, when known.
pub type ErrorCallback<D, R, O> =
    Arc<dyn Fn(&SyncError, Option<&D>, Option<&R>, &[O]) + Send + Sync>;

/// Called for non-fatal problems.
pub type WarningCallback<D, R> = Arc<dyn Fn(&SyncError, Option<&D>, Option<&R>) + Send + Sync>;

/// May rewrite the operations of an update; an empty result suppresses it.
pub type BeforeUpdateCallback<D, R, O> = Arc<dyn Fn(Vec<O>, &D, &R) -> Vec<O> + Send + Sync>;

/// May rewrite a draft before creation; `None` suppresses the create.
pub type BeforeCreateCallback<D> = Arc<dyn Fn(D) -> Option<D> + Send + Sync>;

/// Hooks for one engine. Every hook is optional.
pub struct SyncCallbacks<D, R, O> {
    on_error: Option<ErrorCallback<D, R, O>>,
    on_warning: Option<WarningCallback<D, R>>,
    before_update: Option<BeforeUpdateCallback<D, R, O>>,
    before_create: Option<BeforeCreateCallback<D>>,
}

impl<D, R, O> SyncCallbacks<D, R, O> {
    /// Creates a set with no hooks.
    pub fn new() -> Self {
        Self {
            on_error: None,
            on_warning: None,
            before_update: None,
            before_create: None,
        }
    }

    /// Sets the error hook.
    pub fn on_error(
        mut self,
        callback: impl Fn(&SyncError, Option<&D>, Option<&R>, &[O]) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Sets the warning hook.
    pub fn on_warning(
        mut self,
        callback: impl Fn(&SyncError, Option<&D>, Option<&R>) + Send + Sync + 'static,
    ) -> Self {
        self.on_warning = Some(Arc::new(callback));
        self
    }

    /// Sets the hook run before each update.
    pub fn before_update(
        mut self,
        callback: impl Fn(Vec<O>, &D, &R) -> Vec<O> + Send + Sync + 'static,
    ) -> Self {
        self.before_update = Some(Arc::new(callback));
        self
    }

    /// Sets the hook run before each create.
    pub fn before_create(mut self, callback: impl Fn(D) -> Option<D> + Send + Sync + 'static) -> Self {
        self.before_create = Some(Arc::new(callback));
        self
    }

    pub(crate) fn report_error(&self, error: &SyncError, draft: Option<&D>, old: Option<&R>, operations: &[O]) {
        if let Some(callback) = &self.on_error {
            callback(error, draft, old, operations);
        }
    }

    pub(crate) fn report_warning(&self, error: &SyncError, draft: Option<&D>, old: Option<&R>) {
        if let Some(callback) = &self.on_warning {
            callback(error, draft, old);
        }
    }

    pub(crate) fn apply_before_update(&self, operations: Vec<O>, draft: &D, old: &R) -> Vec<O> {
        match &self.before_update {
            Some(callback) => callback(operations, draft, old),
            None => operations,
        }
    }

    pub(crate) fn apply_before_create(&self, draft: D) -> Option<D> {
        match &self.before_create {
            Some(callback) => callback(draft),
            None => Some(draft),
        }
    }
}

impl<D, R, O> Default for SyncCallbacks<D, R, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D, R, O> Clone for SyncCallbacks<D, R, O> {
    fn clone(&self) -> Self {
        Self {
            on_error: self.on_error.clone(),
            on_warning: self.on_warning.clone(),
            before_update: self.before_update.clone(),
            before_create: self.before_create.clone(),
        }
    }
}

impl<D, R, O> fmt::Debug for SyncCallbacks<D, R, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCallbacks")
            .field("on_error", &self.on_error.is_some())
            .field("on_warning", &self.on_warning.is_some())
            .field("before_update", &self.before_update.is_some())
            .field("before_create", &self.before_create.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceType;
    use parking_lot::Mutex;

    type Hooks = SyncCallbacks<String, String, u32>;

    #[test]
    fn missing_hooks_pass_through() {
        let hooks = Hooks::default();
        assert_eq!(hooks.apply_before_update(vec![1, 2], &"d".into(), &"r".into()), [1, 2]);
        assert_eq!(hooks.apply_before_create("d".into()), Some("d".to_string()));
        hooks.report_error(
            &SyncError::MissingDraft {
                resource_type: ResourceType::new("x", "xs"),
            },
            None,
            None,
            &[],
        );
    }

    #[test]
    fn hooks_are_invoked() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hooks = Hooks::new()
            .on_error(move |err, draft, _, ops| {
                sink.lock().push(format!("{err} {draft:?} {}", ops.len()));
            })
            .before_update(|ops, _, _| ops.into_iter().filter(|op| op % 2 == 0).collect())
            .before_create(|draft| (draft != "skip").then_some(draft));

        assert_eq!(hooks.apply_before_update(vec![1, 2, 3, 4], &"d".into(), &"r".into()), [2, 4]);
        assert_eq!(hooks.apply_before_create("skip".into()), None);
        assert_eq!(hooks.apply_before_create("keep".into()), Some("keep".to_string()));

        let draft = "d1".to_string();
        hooks.clone().report_error(
            &SyncError::MissingDraft {
                resource_type: ResourceType::new("x", "xs"),
            },
            Some(&draft),
            None,
            &[9],
        );
        assert_eq!(seen.lock().as_slice(), ["x draft is null. Some(\"d1\") 1"]);
    }
}
