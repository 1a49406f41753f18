//! Core type definitions: keys, ids, versions and references.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Caller-assigned, immutable key identifying a resource across systems.
///
/// Keys are the only identity a draft carries. A key made only of
/// whitespace counts as blank.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Creates a new key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the key is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Returns true if the key has the shape of a canonical UUID.
    ///
    /// Only lowercase, hyphenated, RFC 4122 UUIDs of version 1 to 5 match.
    #[must_use]
    pub fn looks_like_uuid(&self) -> bool {
        let raw = self.0.as_str();
        if raw.len() != 36 || raw.chars().any(|c| c.is_ascii_uppercase()) {
            return false;
        }
        match uuid::Uuid::try_parse(raw) {
            Ok(parsed) => {
                (1..=5).contains(&parsed.get_version_num())
                    && parsed.get_variant() == uuid::Variant::RFC4122
            }
            Err(_) => false,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ResourceKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl Borrow<str> for ResourceKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// System-assigned identifier of a remote resource.
///
/// Opaque to the engine and stable for the lifetime of the resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Creates a new id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Monotonic resource version used for optimistic concurrency.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(pub u64);

impl Version {
    /// Creates a new version.
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// Returns the raw version value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next version.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A kind of remote resource (category, product type, ...).
///
/// `plural` is only used for human-readable summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceType {
    name: &'static str,
    plural: &'static str,
}

impl ResourceType {
    /// Creates a new resource type.
    #[must_use]
    pub const fn new(name: &'static str, plural: &'static str) -> Self {
        Self { name, plural }
    }

    /// Returns the singular name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }

    /// Returns the plural name.
    #[must_use]
    pub const fn plural(self) -> &'static str {
        self.plural
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A key qualified by the resource type it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypedKey {
    /// Type of the resource the key identifies.
    pub resource_type: ResourceType,
    /// The key.
    pub key: ResourceKey,
}

impl TypedKey {
    /// Creates a new typed key.
    #[must_use]
    pub fn new(resource_type: ResourceType, key: impl Into<ResourceKey>) -> Self {
        Self {
            resource_type,
            key: key.into(),
        }
    }
}

impl fmt::Display for TypedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} with key '{}'", self.resource_type, self.key)
    }
}

/// Where a reference points: a resolved id or a key still to be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceTarget {
    /// Resolved reference.
    Id(ResourceId),
    /// Unresolved reference.
    Key(ResourceKey),
}

/// A typed pointer to another resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Type of the referenced resource.
    pub resource_type: ResourceType,
    /// Id or key of the referenced resource.
    pub target: ReferenceTarget,
}

impl Reference {
    /// Creates an unresolved reference by key.
    #[must_use]
    pub fn by_key(resource_type: ResourceType, key: impl Into<ResourceKey>) -> Self {
        Self {
            resource_type,
            target: ReferenceTarget::Key(key.into()),
        }
    }

    /// Creates a resolved reference by id.
    #[must_use]
    pub fn by_id(resource_type: ResourceType, id: impl Into<ResourceId>) -> Self {
        Self {
            resource_type,
            target: ReferenceTarget::Id(id.into()),
        }
    }

    /// Returns the key if the reference is unresolved.
    #[must_use]
    pub fn key(&self) -> Option<&ResourceKey> {
        match &self.target {
            ReferenceTarget::Key(key) => Some(key),
            ReferenceTarget::Id(_) => None,
        }
    }

    /// Returns the id if the reference is resolved.
    #[must_use]
    pub fn id(&self) -> Option<&ResourceId> {
        match &self.target {
            ReferenceTarget::Id(id) => Some(id),
            ReferenceTarget::Key(_) => None,
        }
    }

    /// Returns true if the reference carries an id.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self.target, ReferenceTarget::Id(_))
    }
}

/// How the engine may treat a reference it cannot resolve yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReferencePolicy {
    /// The draft cannot be sent without this reference; the whole draft waits.
    #[default]
    Required,
    /// The field may be stripped so the rest of the draft proceeds; the
    /// field is re-applied once the referenced key exists.
    Detachable,
}

/// One reference field of a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldReference {
    /// Path of the field inside the draft, e.g. `parent` or `assets[2].custom.type`.
    pub field: String,
    /// The reference held by the field.
    pub reference: Reference,
    /// What to do while the reference cannot be resolved.
    pub policy: ReferencePolicy,
}

impl FieldReference {
    /// Creates a required field reference.
    #[must_use]
    pub fn required(field: impl Into<String>, reference: Reference) -> Self {
        Self {
            field: field.into(),
            reference,
            policy: ReferencePolicy::Required,
        }
    }

    /// Creates a detachable field reference.
    #[must_use]
    pub fn detachable(field: impl Into<String>, reference: Reference) -> Self {
        Self {
            field: field.into(),
            reference,
            policy: ReferencePolicy::Detachable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATEGORY: ResourceType = ResourceType::new("category", "categories");

    #[test]
    fn blank_keys() {
        assert!(ResourceKey::new("").is_blank());
        assert!(ResourceKey::new("  \t").is_blank());
        assert!(!ResourceKey::new("k1").is_blank());
    }

    #[test]
    fn uuid_shaped_keys() {
        assert!(ResourceKey::new("3f2b1c9e-8d7a-4b6c-9e5f-1a2b3c4d5e6f").looks_like_uuid());
        // uppercase is not canonical
        assert!(!ResourceKey::new("3F2B1C9E-8D7A-4B6C-9E5F-1A2B3C4D5E6F").looks_like_uuid());
        // simple form is not hyphenated
        assert!(!ResourceKey::new("3f2b1c9e8d7a4b6c9e5f1a2b3c4d5e6f").looks_like_uuid());
        assert!(!ResourceKey::new("winter-sale").looks_like_uuid());
    }

    #[test]
    fn reference_target_accessors() {
        let by_key = Reference::by_key(CATEGORY, "parent");
        assert_eq!(by_key.key(), Some(&ResourceKey::new("parent")));
        assert!(by_key.id().is_none());
        assert!(!by_key.is_resolved());

        let by_id = Reference::by_id(CATEGORY, "id-1");
        assert!(by_id.is_resolved());
        assert!(by_id.key().is_none());
    }

    #[test]
    fn display_formats() {
        let typed = TypedKey::new(CATEGORY, "k2");
        assert_eq!(typed.to_string(), "category with key 'k2'");
        assert_eq!(Version::new(3).to_string(), "v3");
        assert_eq!(Version::new(3).next(), Version::new(4));
    }

    #[test]
    fn keys_serialize_transparently() {
        let key = ResourceKey::new("k1");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"k1\"");
    }
}
