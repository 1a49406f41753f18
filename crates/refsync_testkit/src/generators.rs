//! Property-based test generators using proptest.
//!
//! Keys are drawn from a small pool so that parents, duplicates and
//! forward references show up often.

use crate::categories::CategoryDraft;
use proptest::prelude::*;

/// Strategy for category keys from a pool of `pool` keys.
pub fn category_key_strategy(pool: u8) -> impl Strategy<Value = String> {
    (0..pool.max(1)).prop_map(|n| format!("c{n}"))
}

/// Strategy for one batch entry: usually a valid draft, sometimes absent
/// or keyless, with a parent drawn from the pool or from keys that never exist.
pub fn category_entry_strategy(pool: u8) -> impl Strategy<Value = Option<CategoryDraft>> {
    let parent = prop_oneof![
        3 => Just(None),
        3 => category_key_strategy(pool).prop_map(Some),
        1 => Just(Some("never-created".to_string())),
    ];
    let valid = (category_key_strategy(pool), "[A-Z][a-z]{2,8}", parent).prop_map(
        |(key, name, parent)| {
            let draft = CategoryDraft::new(&key, &name);
            match parent {
                // a category cannot be its own parent
                Some(parent) if parent != key => draft.with_parent(&parent),
                _ => draft,
            }
        },
    );
    prop_oneof![
        8 => valid.prop_map(Some),
        1 => Just(None),
        1 => "[a-z]{1,4}".prop_map(|name| Some(CategoryDraft::keyless(&name))),
    ]
}

/// Strategy for a list of caller batches.
pub fn category_batches_strategy(
    pool: u8,
    max_batches: usize,
    max_batch_len: usize,
) -> impl Strategy<Value = Vec<Vec<Option<CategoryDraft>>>> {
    prop::collection::vec(
        prop::collection::vec(category_entry_strategy(pool), 0..=max_batch_len),
        1..=max_batches.max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use refsync_engine::SyncDraft;

    proptest! {
        #[test]
        fn keys_come_from_the_pool(key in category_key_strategy(4)) {
            prop_assert!(["c0", "c1", "c2", "c3"].contains(&key.as_str()));
        }

        #[test]
        fn no_draft_is_its_own_parent(entry in category_entry_strategy(3)) {
            if let Some(draft) = entry {
                if let (Some(key), Some(parent)) = (draft.key(), draft.parent.as_ref()) {
                    prop_assert_ne!(Some(key), parent.key());
                }
            }
        }
    }
}
