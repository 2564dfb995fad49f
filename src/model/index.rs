use serde::{Deserialize, Serialize};

use super::item::{ModelItem, SystemId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexKind {
    PrimaryKey,
    Unique,
    NonUnique,
}

impl IndexKind {
    /// Primary and unique indexes may be referenced by relations.
    pub fn is_unique(self) -> bool {
        matches!(self, IndexKind::PrimaryKey | IndexKind::Unique)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExpressionKind {
    /// Reference to an attribute of the owning table.
    Attribute(SystemId),
    Literal(String),
}

/// One ordered element of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexExpression {
    id: SystemId,
    pub kind: ExpressionKind,
}

impl IndexExpression {
    pub fn attribute(attribute: SystemId) -> Self {
        Self {
            id: SystemId::new(),
            kind: ExpressionKind::Attribute(attribute),
        }
    }

    pub fn literal(expression: impl Into<String>) -> Self {
        Self {
            id: SystemId::new(),
            kind: ExpressionKind::Literal(expression.into()),
        }
    }

    pub fn system_id(&self) -> SystemId {
        self.id
    }

    pub fn attribute_ref(&self) -> Option<SystemId> {
        match self.kind {
            ExpressionKind::Attribute(id) => Some(id),
            ExpressionKind::Literal(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    id: SystemId,
    pub name: String,
    pub kind: IndexKind,
    pub expressions: Vec<IndexExpression>,
    owner: Option<SystemId>,
}

impl Index {
    pub fn new(name: impl Into<String>, kind: IndexKind) -> Self {
        Self {
            id: SystemId::new(),
            name: name.into(),
            kind,
            expressions: Vec::new(),
            owner: None,
        }
    }

    pub fn primary_key(name: impl Into<String>) -> Self {
        Self::new(name, IndexKind::PrimaryKey)
    }

    pub fn with_attribute(mut self, attribute: SystemId) -> Self {
        self.expressions.push(IndexExpression::attribute(attribute));
        self
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expressions.push(IndexExpression::literal(expression));
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.kind == IndexKind::PrimaryKey
    }

    pub fn owner(&self) -> Option<SystemId> {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: SystemId) {
        self.owner = Some(owner);
    }

    pub fn find_expression(&self, id: SystemId) -> Option<&IndexExpression> {
        self.expressions.iter().find(|e| e.id == id)
    }

    /// The expression referencing the given attribute, if any.
    pub fn find_by_attribute(&self, attribute: SystemId) -> Option<&IndexExpression> {
        self.expressions
            .iter()
            .find(|e| e.attribute_ref() == Some(attribute))
    }

    pub fn references_attribute(&self, attribute: SystemId) -> bool {
        self.find_by_attribute(attribute).is_some()
    }

    pub fn restore_from(&mut self, template: &Index) {
        self.name = template.name.clone();
        self.kind = template.kind;
        self.expressions = template.expressions.clone();
    }
}

impl ModelItem for Index {
    const KIND: &'static str = "Index";

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
