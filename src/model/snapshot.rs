//! Structural view of a model with every system id resolved to a name.
//!
//! Two models built independently compare equal here when they describe the
//! same schema, whatever ids their items carry.

use super::{
    Attribute, DataTypeRef, ExpressionKind, ForeignKeyAction, Index, IndexKind, Model, Relation,
    Table,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSnapshot {
    pub dialect: &'static str,
    pub tables: Vec<TableSnapshot>,
    pub relations: Vec<RelationSnapshot>,
    pub views: Vec<ViewSnapshot>,
    pub domains: Vec<DomainSnapshot>,
    pub subject_areas: Vec<SubjectAreaSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    pub name: String,
    pub comment: Option<String>,
    pub attributes: Vec<AttributeSnapshot>,
    pub indexes: Vec<IndexSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSnapshot {
    pub name: String,
    /// Catalog type name, or `domain:<name>`.
    pub datatype: String,
    pub size: Option<u32>,
    pub fraction: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub extra: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSnapshot {
    pub name: String,
    pub kind: IndexKind,
    pub expressions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSnapshot {
    pub name: String,
    pub importing_table: String,
    pub exporting_table: String,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
    /// (exporting key attribute, importing attribute) pairs.
    pub mapping: Vec<(String, String)>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSnapshot {
    pub name: String,
    pub sql: String,
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSnapshot {
    pub name: String,
    pub datatype: String,
    pub size: Option<u32>,
    pub fraction: Option<u32>,
    pub scale: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAreaSnapshot {
    pub name: String,
    pub tables: Vec<String>,
    pub views: Vec<String>,
}

const UNRESOLVED: &str = "?";

impl ModelSnapshot {
    pub fn of(model: &Model) -> Self {
        let table_name = |id| {
            model
                .table(id)
                .map(|t| t.name.clone())
                .unwrap_or_else(|| UNRESOLVED.to_string())
        };

        Self {
            dialect: model.dialect().unique_name(),
            tables: model
                .tables()
                .iter()
                .map(|t| TableSnapshot::of(t, model))
                .collect(),
            relations: model
                .relations()
                .iter()
                .map(|r| RelationSnapshot::of(r, model))
                .collect(),
            views: model
                .views()
                .iter()
                .map(|v| ViewSnapshot {
                    name: v.name.clone(),
                    sql: v.sql.clone(),
                    attributes: v.attributes.clone(),
                })
                .collect(),
            domains: model
                .domains()
                .iter()
                .map(|d| DomainSnapshot {
                    name: d.name.clone(),
                    datatype: d.datatype.clone(),
                    size: d.size,
                    fraction: d.fraction,
                    scale: d.scale,
                })
                .collect(),
            subject_areas: model
                .subject_areas()
                .iter()
                .map(|a| SubjectAreaSnapshot {
                    name: a.name.clone(),
                    tables: a.tables.iter().map(|t| table_name(*t)).collect(),
                    views: a
                        .views
                        .iter()
                        .map(|v| {
                            model
                                .views()
                                .find_by_id(*v)
                                .map(|v| v.name.clone())
                                .unwrap_or_else(|| UNRESOLVED.to_string())
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableSnapshot> {
        self.tables.iter().find(|t| t.name == name)
    }
}

impl TableSnapshot {
    fn of(table: &Table, model: &Model) -> Self {
        Self {
            name: table.name.clone(),
            comment: table.comment.clone(),
            attributes: table
                .attributes()
                .iter()
                .map(|a| AttributeSnapshot::of(a, model))
                .collect(),
            indexes: table
                .indexes()
                .iter()
                .map(|i| IndexSnapshot::of(i, table))
                .collect(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSnapshot> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

impl AttributeSnapshot {
    fn of(attribute: &Attribute, model: &Model) -> Self {
        let datatype = match &attribute.datatype {
            DataTypeRef::Type(name) => name.clone(),
            DataTypeRef::Domain(id) => format!(
                "domain:{}",
                model
                    .domains()
                    .find_by_id(*id)
                    .map(|d| d.name.as_str())
                    .unwrap_or(UNRESOLVED)
            ),
        };
        Self {
            name: attribute.name.clone(),
            datatype,
            size: attribute.size,
            fraction: attribute.fraction,
            scale: attribute.scale,
            nullable: attribute.nullable,
            default_value: attribute.default_value.clone(),
            extra: attribute.extra.clone(),
            comment: attribute.comment.clone(),
        }
    }
}

impl IndexSnapshot {
    fn of(index: &Index, table: &Table) -> Self {
        Self {
            name: index.name.clone(),
            kind: index.kind,
            expressions: index
                .expressions
                .iter()
                .map(|e| match &e.kind {
                    ExpressionKind::Attribute(id) => {
                        table.attribute_name(*id).unwrap_or(UNRESOLVED).to_string()
                    }
                    ExpressionKind::Literal(sql) => sql.clone(),
                })
                .collect(),
        }
    }
}

impl RelationSnapshot {
    fn of(relation: &Relation, model: &Model) -> Self {
        let importing = model.table(relation.importing_table());
        let exporting = model.table(relation.exporting_table());
        let mapping = relation
            .mapping
            .iter()
            .map(|m| {
                let key = exporting
                    .and_then(|t| {
                        let attribute = t
                            .index_of_expression(m.expression)?
                            .find_expression(m.expression)?
                            .attribute_ref()?;
                        t.attribute_name(attribute)
                    })
                    .unwrap_or(UNRESOLVED);
                let value = importing
                    .and_then(|t| t.attribute_name(m.attribute))
                    .unwrap_or(UNRESOLVED);
                (key.to_string(), value.to_string())
            })
            .collect();

        Self {
            name: relation.name.clone(),
            importing_table: importing.map_or(UNRESOLVED, |t| t.name.as_str()).to_string(),
            exporting_table: exporting.map_or(UNRESOLVED, |t| t.name.as_str()).to_string(),
            on_delete: relation.on_delete,
            on_update: relation.on_update,
            mapping,
            comment: relation.comment.clone(),
        }
    }
}
