//! Batch validation.
//!
//! Splits a raw batch into drafts worth processing and drafts rejected
//! outright. Validation is local: it never touches the network, and no
//! draft's validity depends on another draft.

use crate::error::SyncError;
use crate::model::SyncDraft;
use crate::types::{ReferenceTarget, ResourceKey, ResourceType};
use std::collections::{HashMap, HashSet};

/// Outcome of validating one batch.
#[derive(Debug)]
pub struct ValidatedBatch<D> {
    /// Drafts with a usable key, in input order.
    pub valid: Vec<D>,
    /// Non-blank keys referenced by the valid drafts, grouped by resource type.
    pub referenced_keys: HashMap<ResourceType, HashSet<ResourceKey>>,
    /// Rejected drafts (`None` for an absent draft) with the reason.
    pub rejected: Vec<(Option<D>, SyncError)>,
}

impl<D: SyncDraft> ValidatedBatch<D> {
    /// Keys of the valid drafts.
    pub fn own_keys(&self) -> HashSet<ResourceKey> {
        self.valid
            .iter()
            .filter_map(|draft| draft.valid_key().cloned())
            .collect()
    }
}

/// Validates drafts of one resource type.
#[derive(Debug, Clone, Copy)]
pub struct BatchValidator {
    resource_type: ResourceType,
}

impl BatchValidator {
    /// Creates a validator for drafts of `resource_type`.
    pub fn new(resource_type: ResourceType) -> Self {
        Self { resource_type }
    }

    /// Validates a batch.
    ///
    /// A draft is rejected when it is absent or its key is blank. Every
    /// key-form reference of an accepted draft contributes its key to
    /// `referenced_keys`, whether or not it will resolve; blank reference
    /// keys are left out since they can never be looked up.
    pub fn validate<D: SyncDraft>(&self, drafts: Vec<Option<D>>) -> ValidatedBatch<D> {
        let mut batch = ValidatedBatch {
            valid: Vec::with_capacity(drafts.len()),
            referenced_keys: HashMap::new(),
            rejected: Vec::new(),
        };

        for (position, draft) in drafts.into_iter().enumerate() {
            let Some(draft) = draft else {
                batch.rejected.push((
                    None,
                    SyncError::MissingDraft {
                        resource_type: self.resource_type,
                    },
                ));
                continue;
            };

            if draft.valid_key().is_none() {
                batch.rejected.push((
                    Some(draft),
                    SyncError::BlankKey {
                        resource_type: self.resource_type,
                        position,
                    },
                ));
                continue;
            }

            for field in draft.references() {
                if let ReferenceTarget::Key(key) = field.reference.target {
                    if !key.is_blank() {
                        batch
                            .referenced_keys
                            .entry(field.reference.resource_type)
                            .or_default()
                            .insert(key);
                    }
                }
            }
            batch.valid.push(draft);
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldReference, Reference, ResourceId};

    const PAGE: ResourceType = ResourceType::new("page", "pages");
    const AUTHOR: ResourceType = ResourceType::new("author", "authors");

    #[derive(Debug, Clone)]
    struct Page {
        key: Option<ResourceKey>,
        parent: Option<Reference>,
        authors: Vec<Reference>,
    }

    impl Page {
        fn new(key: &str) -> Self {
            Self {
                key: Some(key.into()),
                parent: None,
                authors: Vec::new(),
            }
        }
    }

    impl SyncDraft for Page {
        fn key(&self) -> Option<&ResourceKey> {
            self.key.as_ref()
        }

        fn references(&self) -> Vec<FieldReference> {
            let mut refs: Vec<_> = self
                .parent
                .iter()
                .map(|r| FieldReference::required("parent", r.clone()))
                .collect();
            refs.extend(
                self.authors
                    .iter()
                    .enumerate()
                    .map(|(i, r)| FieldReference::required(format!("authors[{i}]"), r.clone())),
            );
            refs
        }

        fn apply_resolved_reference(&mut self, _field: &str, _id: &ResourceId) {}
    }

    #[test]
    fn rejects_absent_and_keyless_drafts() {
        let validator = BatchValidator::new(PAGE);
        let mut keyless = Page::new("");
        keyless.parent = Some(Reference::by_key(PAGE, "p"));
        let mut whitespace = Page::new("x");
        whitespace.key = Some("   ".into());

        let batch = validator.validate(vec![
            Some(Page::new("a")),
            None,
            Some(keyless),
            Some(whitespace),
            Some(Page { key: None, ..Page::new("b") }),
        ]);

        assert_eq!(batch.valid.len(), 1);
        assert_eq!(batch.rejected.len(), 4);
        assert!(matches!(batch.rejected[0], (None, SyncError::MissingDraft { .. })));
        assert!(matches!(
            batch.rejected[1],
            (Some(_), SyncError::BlankKey { position: 2, .. })
        ));
        // references of rejected drafts are not collected
        assert!(batch.referenced_keys.is_empty());
    }

    #[test]
    fn collects_referenced_keys_per_type() {
        let validator = BatchValidator::new(PAGE);
        let mut first = Page::new("a");
        first.parent = Some(Reference::by_key(PAGE, "root"));
        first.authors = vec![
            Reference::by_key(AUTHOR, "ada"),
            Reference::by_key(AUTHOR, ""),
            Reference::by_id(AUTHOR, "id-1"),
        ];
        let mut second = Page::new("b");
        second.parent = Some(Reference::by_key(PAGE, "missing"));
        second.authors = vec![Reference::by_key(AUTHOR, "ada")];

        let batch = validator.validate(vec![Some(first), Some(second)]);

        let pages = batch.referenced_keys.get(&PAGE).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages.contains("root"));
        assert!(pages.contains("missing"));
        let authors = batch.referenced_keys.get(&AUTHOR).unwrap();
        assert_eq!(authors.len(), 1);
        assert!(authors.contains("ada"));
    }

    #[test]
    fn keeps_input_order() {
        let validator = BatchValidator::new(PAGE);
        let batch = validator.validate(vec![
            Some(Page::new("c")),
            None,
            Some(Page::new("a")),
            Some(Page::new("b")),
        ]);

        let keys: Vec<_> = batch
            .valid
            .iter()
            .map(|p| p.key.clone().unwrap().to_string())
            .collect();
        assert_eq!(keys, ["c", "a", "b"]);
        assert_eq!(batch.own_keys().len(), 3);
    }
}
