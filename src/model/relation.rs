use serde::{Deserialize, Serialize};

use super::index::Index;
use super::item::{ModelItem, OwnedItemList, SystemId};

/// Referential action of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForeignKeyAction {
    Cascade,
    SetNull,
    Restrict,
    #[default]
    NoAction,
    SetDefault,
}

impl ForeignKeyAction {
    pub fn sql(self) -> &'static str {
        match self {
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
        }
    }

    pub fn from_sql(s: &str) -> Option<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_uppercase().as_str() {
            "CASCADE" => Some(ForeignKeyAction::Cascade),
            "SET NULL" => Some(ForeignKeyAction::SetNull),
            "RESTRICT" => Some(ForeignKeyAction::Restrict),
            "NO ACTION" => Some(ForeignKeyAction::NoAction),
            "SET DEFAULT" => Some(ForeignKeyAction::SetDefault),
            _ => None,
        }
    }
}

/// Maps an index expression of the exporting table to an attribute of the
/// importing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMapping {
    pub expression: SystemId,
    pub attribute: SystemId,
}

/// Directed foreign-key edge between two tables.
///
/// Only system ids are stored; tables, expressions and attributes are resolved
/// through the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    id: SystemId,
    pub name: String,
    importing_table: SystemId,
    exporting_table: SystemId,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
    pub mapping: Vec<RelationMapping>,
    pub comment: Option<String>,
}

impl Relation {
    pub fn new(name: impl Into<String>, importing_table: SystemId, exporting_table: SystemId) -> Self {
        Self {
            id: SystemId::new(),
            name: name.into(),
            importing_table,
            exporting_table,
            on_delete: ForeignKeyAction::default(),
            on_update: ForeignKeyAction::default(),
            mapping: Vec::new(),
            comment: None,
        }
    }

    /// Map an exporting index expression to an importing attribute.
    pub fn map(mut self, expression: SystemId, attribute: SystemId) -> Self {
        self.mapping.push(RelationMapping {
            expression,
            attribute,
        });
        self
    }

    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }

    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = action;
        self
    }

    pub fn importing_table(&self) -> SystemId {
        self.importing_table
    }

    pub fn exporting_table(&self) -> SystemId {
        self.exporting_table
    }

    pub fn touches(&self, table: SystemId) -> bool {
        self.importing_table == table || self.exporting_table == table
    }

    pub fn uses_attribute(&self, attribute: SystemId) -> bool {
        self.mapping.iter().any(|m| m.attribute == attribute)
    }

    pub fn uses_expression(&self, expression: SystemId) -> bool {
        self.mapping.iter().any(|m| m.expression == expression)
    }

    pub fn uses_index(&self, index: &Index) -> bool {
        index.expressions.iter().any(|e| self.uses_expression(e.system_id()))
    }

    /// Copy the mutable fields from a template. Endpoints stay unchanged.
    pub fn restore_from(&mut self, template: &Relation) {
        self.name = template.name.clone();
        self.on_delete = template.on_delete;
        self.on_update = template.on_update;
        self.mapping = template.mapping.clone();
        self.comment = template.comment.clone();
    }
}

impl ModelItem for Relation {
    const KIND: &'static str = "Relation";

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

pub type RelationList = OwnedItemList<Relation>;

impl OwnedItemList<Relation> {
    pub fn is_table_in_use(&self, table: SystemId) -> bool {
        self.iter().any(|r| r.touches(table))
    }

    /// Whether the attribute is a mapping value of any relation.
    pub fn is_foreign_key_attribute(&self, attribute: SystemId) -> bool {
        self.iter().any(|r| r.uses_attribute(attribute))
    }

    /// Whether any relation maps one of the index's expressions.
    pub fn is_index_in_use(&self, index: &Index) -> bool {
        self.iter().any(|r| r.uses_index(index))
    }

    pub fn relations_of_table(&self, table: SystemId) -> impl Iterator<Item = &Relation> {
        self.iter().filter(move |r| r.touches(table))
    }

    /// Remove every relation importing or exporting the table.
    pub fn remove_by_table(&mut self, table: SystemId) -> Vec<Relation> {
        self.drain_where(|r| r.touches(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_from_sql() {
        assert_eq!(ForeignKeyAction::from_sql("set  null"), Some(ForeignKeyAction::SetNull));
        assert_eq!(ForeignKeyAction::from_sql("NO ACTION"), Some(ForeignKeyAction::NoAction));
        assert_eq!(ForeignKeyAction::from_sql("explode"), None);
    }

    #[test]
    fn test_remove_by_table() {
        let (a, b, c) = (SystemId::new(), SystemId::new(), SystemId::new());
        let mut list = RelationList::new();
        list.add(Relation::new("FK_AB", a, b));
        list.add(Relation::new("FK_CB", c, b));
        list.add(Relation::new("FK_CA", c, a));

        assert!(list.is_table_in_use(b));
        let removed = list.remove_by_table(b);
        assert_eq!(removed.len(), 2);
        assert_eq!(list.len(), 1);
        assert!(!list.is_table_in_use(b));
    }
}
