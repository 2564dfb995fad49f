//! Forward engineering: SQL statements for model changes and whole models.

use thiserror::Error;

use crate::dialect::Dialect;
use crate::model::{
    Attribute, DataTypeRef, ExpressionKind, Index, IndexKind, Model, ModelItem, Relation, Table,
};
use crate::tracker::ModelEvent;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("{dialect} cannot express {what}")]
    Unsupported { dialect: Dialect, what: &'static str },
}

/// Renders model changes as statements of one dialect.
#[derive(Debug, Clone, Copy)]
pub struct SqlGenerator {
    dialect: Dialect,
}

impl SqlGenerator {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Whether the event can be expressed in this dialect at all.
    pub fn check(&self, event: &ModelEvent) -> Result<(), RenderError> {
        match (self.dialect, event) {
            (Dialect::Generic, ModelEvent::ChangeTableComment { .. }) => {
                Err(RenderError::Unsupported {
                    dialect: self.dialect,
                    what: "table comments",
                })
            }
            (Dialect::Generic, ModelEvent::AddTable { table }) if table.comment.is_some() => {
                Err(RenderError::Unsupported {
                    dialect: self.dialect,
                    what: "table comments",
                })
            }
            _ => Ok(()),
        }
    }

    /// Statements realizing an applied event. `model` is the state after the
    /// change.
    pub fn render(&self, event: &ModelEvent, model: &Model) -> Vec<String> {
        match event {
            ModelEvent::AddTable { table } => self.create_table(table, model),
            ModelEvent::RemoveTable { table, relations } => {
                let mut statements: Vec<String> = relations
                    .iter()
                    .filter(|r| r.importing_table() != table.system_id())
                    .filter_map(|r| {
                        let importing = model.table(r.importing_table())?;
                        Some(self.drop_foreign_key(&importing.name, r))
                    })
                    .collect();
                statements.push(format!("DROP TABLE {}", self.q(&table.name)));
                statements
            }
            ModelEvent::RenameTable {
                old_name, new_name, ..
            } => vec![self.rename_table(old_name, new_name)],
            ModelEvent::ChangeTableComment {
                table, new_comment, ..
            } => model
                .table(*table)
                .map(|t| vec![self.table_comment(&t.name, new_comment.as_deref())])
                .unwrap_or_default(),
            ModelEvent::AddRelation { relation } => {
                self.add_foreign_key(relation, model).into_iter().collect()
            }
            ModelEvent::RemoveRelation { relation } => model
                .table(relation.importing_table())
                .map(|t| vec![self.drop_foreign_key(&t.name, relation)])
                .unwrap_or_default(),
            ModelEvent::ChangeRelation { old, new } => {
                let mut statements: Vec<String> = model
                    .table(old.importing_table())
                    .map(|t| self.drop_foreign_key(&t.name, old))
                    .into_iter()
                    .collect();
                statements.extend(self.add_foreign_key(new, model));
                statements
            }
            ModelEvent::AddAttributeToTable { table, attribute } => {
                let Some(table) = model.table(*table) else {
                    return Vec::new();
                };
                let column = self.column_definition(attribute, model);
                let statement = match self.dialect {
                    Dialect::Oracle => format!("ALTER TABLE {} ADD ({column})", self.q(&table.name)),
                    _ => format!("ALTER TABLE {} ADD COLUMN {column}", self.q(&table.name)),
                };
                vec![statement]
            }
            ModelEvent::RemoveAttributeFromTable { table, attribute } => model
                .table(*table)
                .map(|t| {
                    vec![format!(
                        "ALTER TABLE {} DROP COLUMN {}",
                        self.q(&t.name),
                        self.q(&attribute.name)
                    )]
                })
                .unwrap_or_default(),
            ModelEvent::RenameAttribute {
                table,
                old_name,
                new_name,
                ..
            } => model
                .table(*table)
                .map(|t| vec![self.rename_column(&t.name, old_name, new_name)])
                .unwrap_or_default(),
            ModelEvent::ChangeAttribute { table, old, new } => model
                .table(*table)
                .map(|t| self.change_column(&t.name, old, new, model))
                .unwrap_or_default(),
            ModelEvent::AddIndexToTable { table, index }
            | ModelEvent::AddPrimaryKeyToTable { table, index } => model
                .table(*table)
                .map(|t| vec![self.create_index(t, index)])
                .unwrap_or_default(),
            ModelEvent::RemoveIndexFromTable { table, index }
            | ModelEvent::RemovePrimaryKeyFromTable { table, index } => model
                .table(*table)
                .map(|t| vec![self.drop_index(&t.name, index)])
                .unwrap_or_default(),
            ModelEvent::ChangeIndex { table, old, new } => model
                .table(*table)
                .map(|t| vec![self.drop_index(&t.name, old), self.create_index(t, new)])
                .unwrap_or_default(),
            ModelEvent::AddView { view } => vec![format!(
                "CREATE VIEW {} AS {}",
                self.q(&view.name),
                view.sql.trim().trim_end_matches(';')
            )],
            ModelEvent::RemoveView { view } => vec![format!("DROP VIEW {}", self.q(&view.name))],
            ModelEvent::AddDomain { domain } if self.dialect == Dialect::PostgreSQL => {
                let datatype = self
                    .dialect
                    .find_data_type(&domain.datatype)
                    .map(|t| t.render(domain.size, domain.fraction))
                    .unwrap_or_else(|| domain.datatype.clone());
                vec![format!("CREATE DOMAIN {} AS {datatype}", self.q(&domain.name))]
            }
            ModelEvent::RemoveDomain { domain } if self.dialect == Dialect::PostgreSQL => {
                vec![format!("DROP DOMAIN {}", self.q(&domain.name))]
            }
            // design-time only
            ModelEvent::AddDomain { .. }
            | ModelEvent::RemoveDomain { .. }
            | ModelEvent::AddSubjectArea { .. }
            | ModelEvent::RemoveSubjectArea { .. } => Vec::new(),
        }
    }

    /// Script creating the whole model: domains, tables with their indexes,
    /// foreign keys, then views.
    pub fn create_script(&self, model: &Model) -> Vec<String> {
        let mut statements = Vec::new();
        for domain in model.domains() {
            statements.extend(self.render(
                &ModelEvent::AddDomain {
                    domain: domain.clone(),
                },
                model,
            ));
        }
        for table in model.tables() {
            statements.extend(self.create_table(table, model));
        }
        for relation in model.relations() {
            statements.extend(self.add_foreign_key(relation, model));
        }
        for view in model.views() {
            statements.extend(self.render(&ModelEvent::AddView { view: view.clone() }, model));
        }
        statements
    }

    fn q(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    fn literal(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn column_type(&self, attribute: &Attribute, model: &Model) -> String {
        match &attribute.datatype {
            DataTypeRef::Type(name) => self
                .dialect
                .find_data_type(name)
                .map(|t| t.render(attribute.size, attribute.fraction))
                .unwrap_or_else(|| name.clone()),
            DataTypeRef::Domain(id) => match model.domains().find_by_id(*id) {
                Some(domain) if self.dialect == Dialect::PostgreSQL => self.q(&domain.name),
                Some(domain) => self
                    .dialect
                    .find_data_type(&domain.datatype)
                    .map(|t| t.render(domain.size, domain.fraction))
                    .unwrap_or_else(|| domain.datatype.clone()),
                None => self.dialect.default_data_type().name.to_string(),
            },
        }
    }

    fn column_definition(&self, attribute: &Attribute, model: &Model) -> String {
        let mut column = format!(
            "{} {}",
            self.q(&attribute.name),
            self.column_type(attribute, model)
        );
        if let Some(default) = &attribute.default_value {
            column.push_str(" DEFAULT ");
            column.push_str(default);
        }
        if !attribute.nullable {
            column.push_str(" NOT NULL");
        }
        if let Some(extra) = &attribute.extra {
            column.push(' ');
            column.push_str(extra);
        }
        if self.dialect == Dialect::MySQL {
            if let Some(comment) = &attribute.comment {
                column.push_str(" COMMENT ");
                column.push_str(&Self::literal(comment));
            }
        }
        column
    }

    fn expression_list(&self, table: &Table, index: &Index) -> String {
        index
            .expressions
            .iter()
            .map(|e| match &e.kind {
                ExpressionKind::Attribute(id) => table
                    .attribute_name(*id)
                    .map(|n| self.q(n))
                    .unwrap_or_default(),
                ExpressionKind::Literal(sql) => sql.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn create_table(&self, table: &Table, model: &Model) -> Vec<String> {
        let mut lines: Vec<String> = table
            .attributes()
            .iter()
            .map(|a| format!("  {}", self.column_definition(a, model)))
            .collect();
        if let Some(pk) = table.primary_key() {
            lines.push(format!(
                "  CONSTRAINT {} PRIMARY KEY ({})",
                self.q(&pk.name),
                self.expression_list(table, pk)
            ));
        }

        let mut create = format!("CREATE TABLE {} (\n{}\n)", self.q(&table.name), lines.join(",\n"));
        let mut statements = Vec::new();
        match (&table.comment, self.dialect) {
            (Some(comment), Dialect::MySQL) => {
                create.push_str(" COMMENT = ");
                create.push_str(&Self::literal(comment));
                statements.push(create);
            }
            (Some(comment), Dialect::PostgreSQL | Dialect::Oracle) => {
                statements.push(create);
                statements.push(self.table_comment(&table.name, Some(comment)));
            }
            _ => statements.push(create),
        }

        for index in table.indexes().iter().filter(|i| !i.is_primary_key()) {
            statements.push(self.create_index(table, index));
        }
        statements
    }

    fn create_index(&self, table: &Table, index: &Index) -> String {
        let columns = self.expression_list(table, index);
        match index.kind {
            IndexKind::PrimaryKey => format!(
                "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({columns})",
                self.q(&table.name),
                self.q(&index.name)
            ),
            IndexKind::Unique => format!(
                "CREATE UNIQUE INDEX {} ON {} ({columns})",
                self.q(&index.name),
                self.q(&table.name)
            ),
            IndexKind::NonUnique => format!(
                "CREATE INDEX {} ON {} ({columns})",
                self.q(&index.name),
                self.q(&table.name)
            ),
        }
    }

    fn drop_index(&self, table: &str, index: &Index) -> String {
        match (index.kind, self.dialect) {
            (IndexKind::PrimaryKey, Dialect::MySQL) => {
                format!("ALTER TABLE {} DROP PRIMARY KEY", self.q(table))
            }
            (IndexKind::PrimaryKey, _) => format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.q(table),
                self.q(&index.name)
            ),
            (_, Dialect::MySQL) => format!("DROP INDEX {} ON {}", self.q(&index.name), self.q(table)),
            _ => format!("DROP INDEX {}", self.q(&index.name)),
        }
    }

    fn add_foreign_key(&self, relation: &Relation, model: &Model) -> Option<String> {
        let importing = model.table(relation.importing_table())?;
        let exporting = model.table(relation.exporting_table())?;

        let mut columns = Vec::new();
        let mut referenced = Vec::new();
        for m in &relation.mapping {
            let key = exporting
                .index_of_expression(m.expression)
                .and_then(|i| i.find_expression(m.expression))
                .and_then(|e| e.attribute_ref())
                .and_then(|a| exporting.attribute_name(a));
            match (importing.attribute_name(m.attribute), key) {
                (Some(column), Some(key)) => {
                    columns.push(self.q(column));
                    referenced.push(self.q(key));
                }
                _ => {
                    tracing::warn!(relation = %relation.name, "mapping does not resolve, foreign key skipped");
                    return None;
                }
            }
        }

        let mut statement = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.q(&importing.name),
            self.q(&relation.name),
            columns.join(", "),
            self.q(&exporting.name),
            referenced.join(", ")
        );
        let default = crate::model::ForeignKeyAction::default();
        if relation.on_delete != default {
            statement.push_str(" ON DELETE ");
            statement.push_str(relation.on_delete.sql());
        }
        // Oracle has no ON UPDATE clause
        if relation.on_update != default && self.dialect != Dialect::Oracle {
            statement.push_str(" ON UPDATE ");
            statement.push_str(relation.on_update.sql());
        }
        Some(statement)
    }

    fn drop_foreign_key(&self, importing: &str, relation: &Relation) -> String {
        match self.dialect {
            Dialect::MySQL => format!(
                "ALTER TABLE {} DROP FOREIGN KEY {}",
                self.q(importing),
                self.q(&relation.name)
            ),
            _ => format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.q(importing),
                self.q(&relation.name)
            ),
        }
    }

    fn rename_table(&self, old: &str, new: &str) -> String {
        match self.dialect {
            Dialect::MySQL => format!("RENAME TABLE {} TO {}", self.q(old), self.q(new)),
            _ => format!("ALTER TABLE {} RENAME TO {}", self.q(old), self.q(new)),
        }
    }

    fn rename_column(&self, table: &str, old: &str, new: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.q(table),
            self.q(old),
            self.q(new)
        )
    }

    fn change_column(&self, table: &str, old: &Attribute, new: &Attribute, model: &Model) -> Vec<String> {
        if self.dialect == Dialect::MySQL {
            return vec![format!(
                "ALTER TABLE {} CHANGE COLUMN {} {}",
                self.q(table),
                self.q(&old.name),
                self.column_definition(new, model)
            )];
        }

        let mut statements = Vec::new();
        if old.name != new.name {
            statements.push(self.rename_column(table, &old.name, &new.name));
        }
        let column = self.q(&new.name);
        let datatype = self.column_type(new, model);
        match self.dialect {
            Dialect::Oracle => {
                let nullability = if new.nullable { "NULL" } else { "NOT NULL" };
                statements.push(format!(
                    "ALTER TABLE {} MODIFY ({column} {datatype} {nullability})",
                    self.q(table)
                ));
            }
            _ => {
                statements.push(format!(
                    "ALTER TABLE {} ALTER COLUMN {column} TYPE {datatype}",
                    self.q(table)
                ));
                if old.nullable != new.nullable {
                    let action = if new.nullable { "DROP" } else { "SET" };
                    statements.push(format!(
                        "ALTER TABLE {} ALTER COLUMN {column} {action} NOT NULL",
                        self.q(table)
                    ));
                }
            }
        }
        statements
    }

    fn table_comment(&self, table: &str, comment: Option<&str>) -> String {
        match self.dialect {
            Dialect::MySQL => format!(
                "ALTER TABLE {} COMMENT = {}",
                self.q(table),
                Self::literal(comment.unwrap_or(""))
            ),
            _ => format!(
                "COMMENT ON TABLE {} IS {}",
                self.q(table),
                comment.map(Self::literal).unwrap_or_else(|| "NULL".to_string())
            ),
        }
    }
}
