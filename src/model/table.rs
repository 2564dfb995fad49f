use serde::{Deserialize, Serialize};

use super::attribute::Attribute;
use super::index::Index;
use super::item::{ModelItem, OwnedItemList, SystemId};

/// A table with its ordered attributes and indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    id: SystemId,
    pub name: String,
    pub comment: Option<String>,
    attributes: OwnedItemList<Attribute>,
    indexes: OwnedItemList<Index>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SystemId::new(),
            name: name.into(),
            comment: None,
            attributes: OwnedItemList::new(),
            indexes: OwnedItemList::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.add(attribute);
        self
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.indexes.add(index);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn attributes(&self) -> &OwnedItemList<Attribute> {
        &self.attributes
    }

    pub fn indexes(&self) -> &OwnedItemList<Index> {
        &self.indexes
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut OwnedItemList<Attribute> {
        &mut self.attributes
    }

    pub(crate) fn indexes_mut(&mut self) -> &mut OwnedItemList<Index> {
        &mut self.indexes
    }

    pub fn primary_key(&self) -> Option<&Index> {
        self.indexes.iter().find(|i| i.is_primary_key())
    }

    /// Name of the attribute an id refers to, for rendering and comparison.
    pub fn attribute_name(&self, id: SystemId) -> Option<&str> {
        self.attributes.find_by_id(id).map(|a| a.name.as_str())
    }

    /// The index owning an index expression.
    pub fn index_of_expression(&self, expression: SystemId) -> Option<&Index> {
        self.indexes
            .iter()
            .find(|i| i.find_expression(expression).is_some())
    }

    /// Set back-pointers of all owned attributes and indexes.
    pub(crate) fn adopt_children(&mut self) {
        let id = self.id;
        for attribute in self.attributes.iter_mut() {
            attribute.set_owner(id);
        }
        for index in self.indexes.iter_mut() {
            index.set_owner(id);
        }
    }
}

impl ModelItem for Table {
    const KIND: &'static str = "Table";

    fn system_id(&self) -> SystemId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}
