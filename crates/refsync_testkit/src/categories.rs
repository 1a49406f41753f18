//! Sample family: categories.
//!
//! A category may point at a parent category and at a custom type, and
//! each of its assets may point at a custom type. All of these references
//! are required: a category whose parent does not exist yet waits as a whole.

use crate::memory::{MemoryRemote, RemoteModel};
use refsync_engine::{
    DiffEngine, FieldReference, Reference, ResourceId, ResourceKey, ResourceType, SyncDraft,
    SyncResource, Version,
};

/// Resource type of categories.
pub const CATEGORY: ResourceType = ResourceType::new("category", "categories");

/// Resource type of custom types.
pub const CUSTOM_TYPE: ResourceType = ResourceType::new("type", "types");

/// Desired state of a category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryDraft {
    /// Key; `None` or blank drafts are rejected.
    pub key: Option<ResourceKey>,
    /// Display name.
    pub name: String,
    /// Parent category.
    pub parent: Option<Reference>,
    /// Custom type of the category.
    pub custom_type: Option<Reference>,
    /// Assets.
    pub assets: Vec<AssetDraft>,
}

/// Desired state of a category asset.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetDraft {
    /// Asset name.
    pub name: String,
    /// Custom type of the asset.
    pub custom_type: Option<Reference>,
}

impl CategoryDraft {
    /// Creates a draft with a key and a name.
    pub fn new(key: &str, name: &str) -> Self {
        Self {
            key: Some(key.into()),
            name: name.to_string(),
            parent: None,
            custom_type: None,
            assets: Vec::new(),
        }
    }

    /// Creates a draft without a key.
    pub fn keyless(name: &str) -> Self {
        Self {
            key: None,
            ..Self::new("", name)
        }
    }

    /// Points the parent at a category key.
    pub fn with_parent(mut self, key: &str) -> Self {
        self.parent = Some(Reference::by_key(CATEGORY, key));
        self
    }

    /// Points the custom type at a type key.
    pub fn with_custom_type(mut self, key: &str) -> Self {
        self.custom_type = Some(Reference::by_key(CUSTOM_TYPE, key));
        self
    }

    /// Adds an asset, optionally with a custom type key.
    pub fn with_asset(mut self, name: &str, type_key: Option<&str>) -> Self {
        self.assets.push(AssetDraft {
            name: name.to_string(),
            custom_type: type_key.map(|key| Reference::by_key(CUSTOM_TYPE, key)),
        });
        self
    }
}

impl SyncDraft for CategoryDraft {
    fn key(&self) -> Option<&ResourceKey> {
        self.key.as_ref()
    }

    fn references(&self) -> Vec<FieldReference> {
        let mut references = Vec::new();
        if let Some(parent) = &self.parent {
            references.push(FieldReference::required("parent", parent.clone()));
        }
        if let Some(custom_type) = &self.custom_type {
            references.push(FieldReference::required("custom.type", custom_type.clone()));
        }
        for (index, asset) in self.assets.iter().enumerate() {
            if let Some(custom_type) = &asset.custom_type {
                references.push(FieldReference::required(
                    format!("assets[{index}].custom.type"),
                    custom_type.clone(),
                ));
            }
        }
        references
    }

    fn apply_resolved_reference(&mut self, field: &str, id: &ResourceId) {
        match field {
            "parent" => self.parent = Some(Reference::by_id(CATEGORY, id.clone())),
            "custom.type" => self.custom_type = Some(Reference::by_id(CUSTOM_TYPE, id.clone())),
            _ => {
                let asset = asset_index(field).and_then(|index| self.assets.get_mut(index));
                if let Some(asset) = asset {
                    asset.custom_type = Some(Reference::by_id(CUSTOM_TYPE, id.clone()));
                }
            }
        }
    }
}

fn asset_index(field: &str) -> Option<usize> {
    field
        .strip_prefix("assets[")?
        .strip_suffix("].custom.type")?
        .parse()
        .ok()
}

/// A stored category.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    /// Remote id.
    pub id: ResourceId,
    /// Key.
    pub key: ResourceKey,
    /// Version.
    pub version: Version,
    /// Display name.
    pub name: String,
    /// Parent category id.
    pub parent: Option<ResourceId>,
    /// Custom type id.
    pub custom_type: Option<ResourceId>,
    /// Assets.
    pub assets: Vec<Asset>,
}

/// A stored category asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Asset name.
    pub name: String,
    /// Custom type id.
    pub custom_type: Option<ResourceId>,
}

impl SyncResource for Category {
    fn key(&self) -> &ResourceKey {
        &self.key
    }

    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn version(&self) -> Version {
        self.version
    }
}

/// Category update operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryAction {
    /// Sets the name.
    ChangeName(String),
    /// Sets or clears the parent.
    ChangeParent(Option<ResourceId>),
    /// Sets or clears the custom type.
    SetCustomType(Option<ResourceId>),
    /// Replaces the assets.
    SetAssets(Vec<Asset>),
}

/// Diff for categories.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryDiff;

impl DiffEngine for CategoryDiff {
    type Resource = Category;
    type Draft = CategoryDraft;
    type Operation = CategoryAction;

    fn diff(&self, old: Option<&Category>, draft: &CategoryDraft) -> Vec<CategoryAction> {
        let Some(old) = old else {
            return Vec::new();
        };
        let mut actions = Vec::new();
        if old.name != draft.name {
            actions.push(CategoryAction::ChangeName(draft.name.clone()));
        }
        let parent = resolved_id(draft.parent.as_ref());
        if old.parent != parent {
            actions.push(CategoryAction::ChangeParent(parent));
        }
        let custom_type = resolved_id(draft.custom_type.as_ref());
        if old.custom_type != custom_type {
            actions.push(CategoryAction::SetCustomType(custom_type));
        }
        let assets = assets_of(draft);
        if old.assets != assets {
            actions.push(CategoryAction::SetAssets(assets));
        }
        actions
    }
}

fn resolved_id(reference: Option<&Reference>) -> Option<ResourceId> {
    reference.and_then(Reference::id).cloned()
}

fn assets_of(draft: &CategoryDraft) -> Vec<Asset> {
    draft
        .assets
        .iter()
        .map(|asset| Asset {
            name: asset.name.clone(),
            custom_type: resolved_id(asset.custom_type.as_ref()),
        })
        .collect()
}

/// Storage model for categories.
#[derive(Debug)]
pub struct CategoryModel;

impl RemoteModel for CategoryModel {
    type Resource = Category;
    type Draft = CategoryDraft;
    type Operation = CategoryAction;

    fn resource_type() -> ResourceType {
        CATEGORY
    }

    fn build(draft: &CategoryDraft, id: ResourceId) -> Category {
        Category {
            id,
            key: draft.key.clone().unwrap_or_else(|| ResourceKey::new("")),
            version: Version::new(1),
            name: draft.name.clone(),
            parent: resolved_id(draft.parent.as_ref()),
            custom_type: resolved_id(draft.custom_type.as_ref()),
            assets: assets_of(draft),
        }
    }

    fn apply(resource: &mut Category, operation: &CategoryAction) {
        match operation {
            CategoryAction::ChangeName(name) => resource.name = name.clone(),
            CategoryAction::ChangeParent(parent) => resource.parent = parent.clone(),
            CategoryAction::SetCustomType(custom_type) => {
                resource.custom_type = custom_type.clone()
            }
            CategoryAction::SetAssets(assets) => resource.assets = assets.clone(),
        }
    }

    fn set_version(resource: &mut Category, version: Version) {
        resource.version = version;
    }
}

/// In-memory category service.
pub type CategoryRemote = MemoryRemote<CategoryModel>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_cover_nested_assets() {
        let draft = CategoryDraft::new("c1", "Shoes")
            .with_parent("root")
            .with_custom_type("t1")
            .with_asset("img", Some("t2"))
            .with_asset("plain", None);

        let fields: Vec<_> = draft.references().into_iter().map(|r| r.field).collect();
        assert_eq!(fields, ["parent", "custom.type", "assets[0].custom.type"]);
    }

    #[test]
    fn applies_resolved_references() {
        let mut draft = CategoryDraft::new("c1", "Shoes")
            .with_parent("root")
            .with_asset("img", Some("t2"));
        draft.apply_resolved_reference("parent", &"id-root".into());
        draft.apply_resolved_reference("assets[0].custom.type", &"id-t2".into());

        assert_eq!(draft.parent, Some(Reference::by_id(CATEGORY, "id-root")));
        assert_eq!(draft.assets[0].custom_type, Some(Reference::by_id(CUSTOM_TYPE, "id-t2")));
    }

    #[test]
    fn diff_is_empty_for_identical_state() {
        let mut draft = CategoryDraft::new("c1", "Shoes").with_parent("root");
        draft.apply_resolved_reference("parent", &"id-root".into());
        let category = CategoryModel::build(&draft, "id-c1".into());

        assert!(CategoryDiff.diff(Some(&category), &draft).is_empty());

        draft.name = "Boots".into();
        assert_eq!(
            CategoryDiff.diff(Some(&category), &draft),
            [CategoryAction::ChangeName("Boots".into())]
        );
    }
}
