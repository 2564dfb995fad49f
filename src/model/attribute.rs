use serde::{Deserialize, Serialize};

use super::item::{ModelItem, SystemId};

/// Datatype of an attribute: either a catalog type or a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DataTypeRef {
    Type(String),
    Domain(SystemId),
}

impl DataTypeRef {
    pub fn type_name(&self) -> Option<&str> {
        match self {
            DataTypeRef::Type(name) => Some(name),
            DataTypeRef::Domain(_) => None,
        }
    }
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    id: SystemId,
    pub name: String,
    pub datatype: DataTypeRef,
    pub size: Option<u32>,
    pub fraction: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub extra: Option<String>,
    pub comment: Option<String>,
    owner: Option<SystemId>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            id: SystemId::new(),
            name: name.into(),
            datatype: DataTypeRef::Type(datatype.into()),
            size: None,
            fraction: None,
            scale: None,
            nullable: true,
            default_value: None,
            extra: None,
            comment: None,
            owner: None,
        }
    }

    /// An attribute typed by a domain.
    pub fn with_domain(name: impl Into<String>, domain: SystemId) -> Self {
        Self {
            datatype: DataTypeRef::Domain(domain),
            ..Self::new(name, "")
        }
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn fraction(mut self, fraction: u32) -> Self {
        self.fraction = Some(fraction);
        self
    }

    pub fn scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    /// The owning table, set when the attribute is added to a model.
    pub fn owner(&self) -> Option<SystemId> {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: SystemId) {
        self.owner = Some(owner);
    }

    /// Copy every mutable field from a template, keeping identity and owner.
    pub fn restore_from(&mut self, template: &Attribute) {
        self.name = template.name.clone();
        self.datatype = template.datatype.clone();
        self.size = template.size;
        self.fraction = template.fraction;
        self.scale = template.scale;
        self.nullable = template.nullable;
        self.default_value = template.default_value.clone();
        self.extra = template.extra.clone();
        self.comment = template.comment.clone();
    }
}

impl ModelItem for Attribute {
    const KIND: &'static str = "Attribute";

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_keeps_identity() {
        let mut existing = Attribute::new("amount", "DECIMAL").size(10).fraction(2);
        existing.set_owner(SystemId::new());
        let id = existing.system_id();
        let owner = existing.owner();

        let template = Attribute::new("total", "DECIMAL").size(20).fraction(5).not_null();
        existing.restore_from(&template);

        assert_eq!(existing.system_id(), id);
        assert_eq!(existing.owner(), owner);
        assert_eq!(existing.name, "total");
        assert_eq!(existing.size, Some(20));
        assert!(!existing.nullable);
    }
}
