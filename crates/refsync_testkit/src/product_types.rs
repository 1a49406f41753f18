//! Sample family: product types.
//!
//! An attribute may reference another product type. Such references are
//! detachable: while the referenced product type does not exist, the
//! attribute is left out and added by a later update.

use crate::memory::{MemoryRemote, RemoteModel};
use refsync_engine::{
    DiffEngine, FieldReference, Reference, ResourceId, ResourceKey, ResourceType, SyncDraft,
    SyncResource, Version,
};

/// Resource type of product types.
pub const PRODUCT_TYPE: ResourceType = ResourceType::new("product type", "product types");

/// Desired state of a product type.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductTypeDraft {
    /// Key.
    pub key: Option<ResourceKey>,
    /// Display name.
    pub name: String,
    /// Attribute definitions.
    pub attributes: Vec<AttributeDraft>,
}

/// Desired state of an attribute definition.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDraft {
    /// Attribute name, unique within the product type.
    pub name: String,
    /// Product type referenced by a nested attribute.
    pub reference: Option<Reference>,
}

impl ProductTypeDraft {
    /// Creates a draft with a key and a name.
    pub fn new(key: &str, name: &str) -> Self {
        Self {
            key: Some(key.into()),
            name: name.to_string(),
            attributes: Vec::new(),
        }
    }

    /// Adds a plain attribute.
    pub fn with_attribute(mut self, name: &str) -> Self {
        self.attributes.push(AttributeDraft {
            name: name.to_string(),
            reference: None,
        });
        self
    }

    /// Adds a nested attribute referencing a product type key.
    pub fn with_nested(mut self, name: &str, product_type: &str) -> Self {
        self.attributes.push(AttributeDraft {
            name: name.to_string(),
            reference: Some(Reference::by_key(PRODUCT_TYPE, product_type)),
        });
        self
    }
}

fn attribute_field(name: &str) -> String {
    format!("attributes[{name}]")
}

fn attribute_name(field: &str) -> Option<&str> {
    field.strip_prefix("attributes[")?.strip_suffix(']')
}

impl SyncDraft for ProductTypeDraft {
    fn key(&self) -> Option<&ResourceKey> {
        self.key.as_ref()
    }

    fn references(&self) -> Vec<FieldReference> {
        self.attributes
            .iter()
            .filter_map(|attribute| {
                let reference = attribute.reference.clone()?;
                Some(FieldReference::detachable(attribute_field(&attribute.name), reference))
            })
            .collect()
    }

    fn apply_resolved_reference(&mut self, field: &str, id: &ResourceId) {
        let Some(name) = attribute_name(field) else {
            return;
        };
        if let Some(attribute) = self.attributes.iter_mut().find(|a| a.name == name) {
            attribute.reference = Some(Reference::by_id(PRODUCT_TYPE, id.clone()));
        }
    }

    fn detach_reference(&mut self, field: &str) {
        if let Some(name) = attribute_name(field) {
            self.attributes.retain(|attribute| attribute.name != name);
        }
    }
}

/// A stored product type.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductType {
    /// Remote id.
    pub id: ResourceId,
    /// Key.
    pub key: ResourceKey,
    /// Version.
    pub version: Version,
    /// Display name.
    pub name: String,
    /// Attribute definitions.
    pub attributes: Vec<Attribute>,
}

impl ProductType {
    /// Looks up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// A stored attribute definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Id of the referenced product type.
    pub reference: Option<ResourceId>,
}

impl SyncResource for ProductType {
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

/// Product type update operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductTypeAction {
    /// Sets the name.
    ChangeName(String),
    /// Removes an attribute definition.
    RemoveAttribute(String),
    /// Adds an attribute definition.
    AddAttribute(Attribute),
    /// Repoints a nested attribute.
    ChangeAttributeReference {
        /// Attribute name.
        name: String,
        /// New referenced product type.
        reference: Option<ResourceId>,
    },
}

/// Diff for product types.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductTypeDiff;

impl DiffEngine for ProductTypeDiff {
    type Resource = ProductType;
    type Draft = ProductTypeDraft;
    type Operation = ProductTypeAction;

    fn diff(&self, old: Option<&ProductType>, draft: &ProductTypeDraft) -> Vec<ProductTypeAction> {
        let Some(old) = old else {
            return Vec::new();
        };
        let mut actions = Vec::new();
        if old.name != draft.name {
            actions.push(ProductTypeAction::ChangeName(draft.name.clone()));
        }
        for attribute in &old.attributes {
            if !draft.attributes.iter().any(|a| a.name == attribute.name) {
                actions.push(ProductTypeAction::RemoveAttribute(attribute.name.clone()));
            }
        }
        for attribute in attributes_of(draft) {
            match old.attribute(&attribute.name) {
                None => actions.push(ProductTypeAction::AddAttribute(attribute)),
                Some(existing) if existing.reference != attribute.reference => {
                    actions.push(ProductTypeAction::ChangeAttributeReference {
                        name: attribute.name,
                        reference: attribute.reference,
                    });
                }
                Some(_) => {}
            }
        }
        actions
    }
}

fn attributes_of(draft: &ProductTypeDraft) -> Vec<Attribute> {
    draft
        .attributes
        .iter()
        .map(|attribute| Attribute {
            name: attribute.name.clone(),
            reference: attribute.reference.as_ref().and_then(Reference::id).cloned(),
        })
        .collect()
}

/// Storage model for product types.
#[derive(Debug)]
pub struct ProductTypeModel;

impl RemoteModel for ProductTypeModel {
    type Resource = ProductType;
    type Draft = ProductTypeDraft;
    type Operation = ProductTypeAction;

    fn resource_type() -> ResourceType {
        PRODUCT_TYPE
    }

    fn build(draft: &ProductTypeDraft, id: ResourceId) -> ProductType {
        ProductType {
            id,
            key: draft.key.clone().unwrap_or_else(|| ResourceKey::new("")),
            version: Version::new(1),
            name: draft.name.clone(),
            attributes: attributes_of(draft),
        }
    }

    fn apply(resource: &mut ProductType, operation: &ProductTypeAction) {
        match operation {
            ProductTypeAction::ChangeName(name) => resource.name = name.clone(),
            ProductTypeAction::RemoveAttribute(name) => {
                resource.attributes.retain(|a| &a.name != name)
            }
            ProductTypeAction::AddAttribute(attribute) => {
                resource.attributes.push(attribute.clone())
            }
            ProductTypeAction::ChangeAttributeReference { name, reference } => {
                if let Some(attribute) = resource.attributes.iter_mut().find(|a| &a.name == name) {
                    attribute.reference = reference.clone();
                }
            }
        }
    }

    fn set_version(resource: &mut ProductType, version: Version) {
        resource.version = version;
    }
}

/// In-memory product type service.
pub type ProductTypeRemote = MemoryRemote<ProductTypeModel>;
