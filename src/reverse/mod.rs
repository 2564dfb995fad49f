//! Reverse engineering: populate a model from a live catalog session.
//!
//! The pipeline reads tables (columns, then primary key, then secondary
//! indexes), then foreign keys, then views. Every change goes through the
//! model's mutation protocol, so trackers see reverse engineering like any
//! other edit.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::catalog::{
    CatalogSession, ColumnEntry, DdlCatalog, DriverRegistry, ForeignKeyEntry, IndexEntry,
    TableEntry,
};
use crate::dialect::Dialect;
use crate::error::{CatalogError, ModelError, ReverseEngineeringError};
use crate::model::{
    Attribute, Index, IndexKind, ItemKind, Model, ModelItem, Relation, SystemId, Table, View,
};
use crate::tracker::ModificationTracker;
use crate::world::{HeadlessWorldConnector, WorldConnector};

/// Resource keys of the notifier messages.
pub mod messages {
    pub const SCHEMAS: &str = "reverse.schemas";
    pub const TABLE: &str = "reverse.table";
    pub const COLUMNS: &str = "reverse.columns";
    pub const INDEXES: &str = "reverse.indexes";
    pub const FOREIGN_KEYS: &str = "reverse.foreign_keys";
    pub const RELATION: &str = "reverse.relation";
    pub const VIEWS: &str = "reverse.views";
    pub const VIEW: &str = "reverse.view";
    pub const FINISHED: &str = "reverse.finished";
    pub const CANCELLED: &str = "reverse.cancelled";

    pub const TYPE_SUBSTITUTED: &str = "reverse.warning.type_substituted";
    pub const NAME_COLLISION: &str = "reverse.warning.name_collision";
    pub const INVALID_NAME: &str = "reverse.warning.invalid_name";
    pub const UNRESOLVED_RELATION: &str = "reverse.warning.unresolved_relation";
    pub const INDEX_SKIPPED: &str = "reverse.warning.index_skipped";

    pub fn is_warning(key: &str) -> bool {
        key.starts_with("reverse.warning.")
    }
}

/// Progress and warning channel of the pipeline.
pub trait ReverseEngineeringNotifier {
    fn notify_message(&self, key: &str, args: &[&str]);
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyReverseEngineeringNotifier;

impl ReverseEngineeringNotifier for EmptyReverseEngineeringNotifier {
    fn notify_message(&self, _key: &str, _args: &[&str]) {}
}

/// Writes messages to the log, warnings at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl ReverseEngineeringNotifier for TracingNotifier {
    fn notify_message(&self, key: &str, args: &[&str]) {
        if messages::is_warning(key) {
            tracing::warn!(key, ?args, "reverse engineering");
        } else {
            tracing::info!(key, ?args, "reverse engineering");
        }
    }
}

/// Shared flag a host sets to stop a running pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How catalog names become model names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableNaming {
    /// The raw catalog name.
    #[default]
    Standard,
    /// `<schema>_<name>`.
    IncludeSchema,
}

#[derive(Debug, Clone, Default)]
pub struct ReverseEngineeringOptions {
    /// Schemas to read. Empty means every non-system schema.
    pub schemas: Vec<String>,
    pub table_naming: TableNaming,
    /// Tables to read. Empty means every table of the selected schemas.
    pub table_entries: Vec<TableEntry>,
    pub skip_views: bool,
    pub cancellation: CancellationFlag,
}

/// What a pipeline run added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReverseEngineeringSummary {
    pub tables: usize,
    pub relations: usize,
    pub views: usize,
    pub warnings: usize,
}

/// Counts warnings on their way to the notifier. Logging is left to the
/// notifier, see [`TracingNotifier`].
struct Progress<'a> {
    notifier: &'a dyn ReverseEngineeringNotifier,
    warnings: usize,
}

impl Progress<'_> {
    fn message(&self, key: &str, args: &[&str]) {
        self.notifier.notify_message(key, args);
    }

    fn warn(&mut self, key: &str, args: &[&str]) {
        self.warnings += 1;
        self.notifier.notify_message(key, args);
    }
}

/// Flavor-specific reader of a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReverseEngineeringStrategy {
    dialect: Dialect,
}

impl ReverseEngineeringStrategy {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn system_schemas(&self) -> &'static [&'static str] {
        match self.dialect {
            Dialect::MySQL => &["information_schema", "mysql", "performance_schema", "sys"],
            Dialect::PostgreSQL => &["information_schema", "pg_catalog", "pg_toast"],
            Dialect::Oracle => &["sys", "system", "outln", "xdb", "mdsys", "ctxsys"],
            Dialect::Generic => &["information_schema"],
        }
    }

    pub fn is_system_schema(&self, schema: &str) -> bool {
        self.system_schemas()
            .iter()
            .any(|s| s.eq_ignore_ascii_case(schema))
    }

    /// User schemas of the catalog.
    pub fn get_schema_entries(
        &self,
        session: &mut dyn CatalogSession,
    ) -> Result<Vec<String>, CatalogError> {
        let mut schemas = session.schemas()?;
        schemas.retain(|s| !self.is_system_schema(s));
        Ok(schemas)
    }

    pub fn get_tables_for_schemas(
        &self,
        session: &mut dyn CatalogSession,
        schemas: &[String],
    ) -> Result<Vec<TableEntry>, CatalogError> {
        let mut tables = Vec::new();
        for schema in schemas {
            tables.extend(session.tables(schema)?);
        }
        Ok(tables)
    }

    /// Whether two catalog entries name the same table under the dialect's
    /// name rules.
    fn same_entry(&self, a: &TableEntry, b: &TableEntry) -> bool {
        let normalize = |name: &str| self.dialect.normalize(name);
        normalize(&a.schema) == normalize(&b.schema) && normalize(&a.name) == normalize(&b.name)
    }

    fn model_name(&self, naming: TableNaming, schema: &str, name: &str) -> String {
        match naming {
            TableNaming::Standard => name.to_string(),
            TableNaming::IncludeSchema => format!("{schema}_{name}"),
        }
    }

    /// Read the selected catalog objects into the model.
    ///
    /// On cancellation or a catalog error, everything applied so far stays in
    /// the model.
    pub fn update_model_from_connection(
        &self,
        model: &mut Model,
        world: &dyn WorldConnector,
        session: &mut dyn CatalogSession,
        options: &ReverseEngineeringOptions,
        notifier: &dyn ReverseEngineeringNotifier,
    ) -> Result<ReverseEngineeringSummary, ReverseEngineeringError> {
        let mut progress = Progress {
            notifier,
            warnings: 0,
        };
        let mut summary = ReverseEngineeringSummary::default();

        let schemas = if options.schemas.is_empty() {
            self.get_schema_entries(session)?
        } else {
            options.schemas.clone()
        };
        progress.message(messages::SCHEMAS, &[&schemas.join(", ")]);
        tracing::info!(dialect = %self.dialect, schemas = ?schemas, "reading catalog");

        let mut entries = self.get_tables_for_schemas(session, &schemas)?;
        if !options.table_entries.is_empty() {
            entries.retain(|e| {
                options
                    .table_entries
                    .iter()
                    .any(|allowed| self.same_entry(allowed, e))
            });
        }

        // catalog entry, exactly as the session reports it -> model table
        let mut created: HashMap<TableEntry, SystemId> = HashMap::new();
        let mut processed: Vec<TableEntry> = Vec::new();

        for entry in &entries {
            self.check_cancelled(options, &progress)?;
            let name = self.model_name(options.table_naming, &entry.schema, &entry.name);
            progress.message(messages::TABLE, &[&entry.qualified_name()]);

            let name = match model.check_name(ItemKind::Table, &name, None) {
                Ok(name) => name,
                Err(e) => {
                    self.warn_name(&mut progress, &e, &entry.qualified_name());
                    continue;
                }
            };

            let columns = session.columns(entry)?;
            progress.message(messages::COLUMNS, &[&name, &columns.len().to_string()]);
            let mut table = Table::new(name.clone());
            for column in &columns {
                if let Some(attribute) = self.attribute_of(&table, column, &mut progress) {
                    table = table.with_attribute(attribute);
                }
            }
            let id = model.add_table(table)?;
            created.insert(entry.clone(), id);
            processed.push(entry.clone());
            summary.tables += 1;

            let indexes = session.indexes(entry)?;
            progress.message(messages::INDEXES, &[&name, &indexes.len().to_string()]);
            // primary key first
            let (primary, secondary): (Vec<&IndexEntry>, Vec<&IndexEntry>) =
                indexes.iter().partition(|i| i.primary_key);
            for index in primary.into_iter().chain(secondary) {
                self.add_index(model, id, index, &mut progress)?;
            }
        }

        progress.message(messages::FOREIGN_KEYS, &[&processed.len().to_string()]);
        for entry in &processed {
            self.check_cancelled(options, &progress)?;
            for fk in session.foreign_keys(entry)? {
                self.check_cancelled(options, &progress)?;
                if self.add_relation(model, &created, &fk, &mut progress)? {
                    summary.relations += 1;
                }
            }
        }

        if !options.skip_views {
            for schema in &schemas {
                let views = session.views(schema)?;
                progress.message(messages::VIEWS, &[schema, &views.len().to_string()]);
                for view in views {
                    self.check_cancelled(options, &progress)?;
                    let name = self.model_name(options.table_naming, &view.schema, &view.name);
                    let name = match model.check_name(ItemKind::View, &name, None) {
                        Ok(name) => name,
                        Err(e) => {
                            self.warn_name(&mut progress, &e, &view.name);
                            continue;
                        }
                    };
                    progress.message(messages::VIEW, &[&name]);
                    model.add_view(View::new(name, view.sql))?;
                    summary.views += 1;
                }
            }
        }

        summary.warnings = progress.warnings;
        progress.message(
            messages::FINISHED,
            &[&summary.tables.to_string(), &summary.relations.to_string()],
        );
        tracing::info!(?summary, "reverse engineering finished");
        world.initialize_loaded_model(model);
        world.set_status_text(&format!(
            "{} tables, {} relations and {} views read",
            summary.tables, summary.relations, summary.views
        ));
        Ok(summary)
    }

    fn check_cancelled(
        &self,
        options: &ReverseEngineeringOptions,
        progress: &Progress<'_>,
    ) -> Result<(), ReverseEngineeringError> {
        if options.cancellation.is_cancelled() {
            progress.message(messages::CANCELLED, &[]);
            tracing::info!("reverse engineering cancelled");
            return Err(ReverseEngineeringError::Cancelled);
        }
        Ok(())
    }

    fn warn_name(&self, progress: &mut Progress<'_>, error: &ModelError, what: &str) {
        match error {
            ModelError::AlreadyExists { .. } => progress.warn(messages::NAME_COLLISION, &[what]),
            _ => progress.warn(messages::INVALID_NAME, &[what, &error.to_string()]),
        }
    }

    /// Attribute for a catalog column, or `None` when its name is unusable.
    fn attribute_of(
        &self,
        table: &Table,
        column: &ColumnEntry,
        progress: &mut Progress<'_>,
    ) -> Option<Attribute> {
        let qualified = format!("{}.{}", table.name, column.name);
        let name = match self.dialect.check_name(&column.name) {
            Ok(name) => name,
            Err(e) => {
                progress.warn(messages::INVALID_NAME, &[&qualified, &e.to_string()]);
                return None;
            }
        };
        if table.attributes().find_by_name(&name, self.dialect).is_some() {
            progress.warn(messages::NAME_COLLISION, &[&qualified]);
            return None;
        }

        let (datatype, substituted) = self.dialect.closest_data_type(&column.type_name);
        if substituted {
            progress.warn(
                messages::TYPE_SUBSTITUTED,
                &[&qualified, &column.type_name, datatype.name],
            );
        }

        let mut attribute = Attribute::new(name, datatype.name);
        if datatype.supports_size {
            attribute.size = column.size;
        }
        if datatype.supports_fraction {
            attribute.fraction = column.fraction;
        }
        if datatype.supports_scale {
            attribute.scale = column.scale;
        }
        attribute.nullable = column.nullable;
        attribute.default_value = column.default_value.clone();
        attribute.extra = column.extra.clone();
        attribute.comment = column.comment.clone();
        Some(attribute)
    }

    fn add_index(
        &self,
        model: &mut Model,
        table: SystemId,
        entry: &IndexEntry,
        progress: &mut Progress<'_>,
    ) -> Result<(), ReverseEngineeringError> {
        let Some(owner) = model.table(table) else {
            return Ok(());
        };
        let qualified = format!("{}.{}", owner.name, entry.name);

        let kind = if entry.primary_key {
            IndexKind::PrimaryKey
        } else if entry.unique {
            IndexKind::Unique
        } else {
            IndexKind::NonUnique
        };
        let mut index = Index::new(entry.name.clone(), kind);
        for column in &entry.columns {
            match owner.attributes().find_by_name(column, self.dialect) {
                Some(attribute) => index = index.with_attribute(attribute.system_id()),
                None => {
                    progress.warn(
                        messages::INDEX_SKIPPED,
                        &[&qualified, &format!("unknown column {column}")],
                    );
                    return Ok(());
                }
            }
        }

        match model.add_index_to_table(table, index) {
            Ok(_) => Ok(()),
            Err(e) if e.is_veto() => Err(e.into()),
            Err(e) => {
                progress.warn(messages::INDEX_SKIPPED, &[&qualified, &e.to_string()]);
                Ok(())
            }
        }
    }

    fn unresolved(
        progress: &mut Progress<'_>,
        fk: &ForeignKeyEntry,
        reason: String,
    ) -> Result<bool, ReverseEngineeringError> {
        progress.warn(messages::UNRESOLVED_RELATION, &[&fk.name, &reason]);
        Ok(false)
    }

    /// Resolve a foreign key to a relation. Returns whether it was added.
    fn add_relation(
        &self,
        model: &mut Model,
        created: &HashMap<TableEntry, SystemId>,
        fk: &ForeignKeyEntry,
        progress: &mut Progress<'_>,
    ) -> Result<bool, ReverseEngineeringError> {
        let importing = created.get(&fk.importing);
        let exporting = created.get(&fk.exporting);
        let (Some(&importing), Some(&exporting)) = (importing, exporting) else {
            return Self::unresolved(progress, fk, format!(
                "{} or {} was not read",
                fk.importing.qualified_name(),
                fk.exporting.qualified_name()
            ));
        };
        if fk.columns.is_empty() || fk.columns.len() != fk.referenced_columns.len() {
            return Self::unresolved(progress, fk, "column lists do not match".to_string());
        }
        let (Some(importing_table), Some(exporting_table)) =
            (model.table(importing), model.table(exporting))
        else {
            return Self::unresolved(progress, fk, "table is no longer part of the model".to_string());
        };

        let mut pairs = Vec::with_capacity(fk.columns.len());
        for (column, referenced) in fk.columns.iter().zip(&fk.referenced_columns) {
            let value = importing_table.attributes().find_by_name(column, self.dialect);
            let key = exporting_table.attributes().find_by_name(referenced, self.dialect);
            match (key, value) {
                (Some(key), Some(value)) => pairs.push((key.system_id(), value.system_id())),
                _ => {
                    return Self::unresolved(
                        progress,
                        fk,
                        format!("column {column} or {referenced} is unknown"),
                    );
                }
            }
        }

        // the unique index covering exactly the referenced columns, primary key first
        let covers = |index: &&Index| {
            index.kind.is_unique()
                && index.expressions.len() == pairs.len()
                && pairs.iter().all(|(key, _)| index.find_by_attribute(*key).is_some())
        };
        let index = exporting_table
            .primary_key()
            .filter(covers)
            .or_else(|| exporting_table.indexes().iter().find(covers));
        let Some(index) = index else {
            return Self::unresolved(progress, fk, format!(
                "{} has no unique index on the referenced columns",
                exporting_table.name
            ));
        };

        let mut relation = Relation::new(fk.name.clone(), importing, exporting)
            .on_delete(fk.on_delete)
            .on_update(fk.on_update);
        for (key, value) in &pairs {
            if let Some(expression) = index.find_by_attribute(*key) {
                relation = relation.map(expression.system_id(), *value);
            }
        }

        match model.check_name(ItemKind::Relation, &fk.name, None) {
            Ok(name) => relation.name = name,
            Err(e) => {
                self.warn_name(progress, &e, &fk.name);
                return Ok(false);
            }
        }
        progress.message(messages::RELATION, &[&relation.name]);
        match model.add_relation(relation) {
            Ok(_) => Ok(true),
            Err(e) if e.is_veto() => Err(e.into()),
            Err(e) => Self::unresolved(progress, fk, e.to_string()),
        }
    }
}

/// Closes the session on every exit path.
struct SessionGuard(Box<dyn CatalogSession>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.0.is_closed() {
            self.0.close();
            tracing::debug!("catalog session closed");
        }
    }
}

/// Open a session from the model's connection properties, read the catalog
/// into the model and close the session.
pub fn reverse_engineer(
    model: &mut Model,
    drivers: &DriverRegistry,
    world: &dyn WorldConnector,
    options: &ReverseEngineeringOptions,
    notifier: &dyn ReverseEngineeringNotifier,
) -> Result<ReverseEngineeringSummary, ReverseEngineeringError> {
    let mut guard = SessionGuard(model.create_connection(drivers).inspect_err(|e| {
        world.notify_about_exception(e);
    })?);
    let strategy = model.dialect().reverse_engineering_strategy();
    strategy
        .update_model_from_connection(model, world, guard.0.as_mut(), options, notifier)
        .inspect_err(|e| world.notify_about_exception(e))
}

/// Reverse engineer a DDL script into a fresh model carrying `tracker`.
pub fn reverse_engineer_script(
    source: &str,
    dialect: Dialect,
    tracker: Box<dyn ModificationTracker>,
    options: &ReverseEngineeringOptions,
    notifier: &dyn ReverseEngineeringNotifier,
) -> Result<(Model, ReverseEngineeringSummary), ReverseEngineeringError> {
    let mut catalog = DdlCatalog::from_script(dialect, source)?;
    let world = HeadlessWorldConnector;
    let mut model = Model::with_tracker(dialect, tracker);
    let summary = dialect.reverse_engineering_strategy().update_model_from_connection(
        &mut model,
        &world,
        &mut catalog,
        options,
        notifier,
    )?;
    catalog.close();
    Ok((model, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{QueryResult, ViewEntry};
    use crate::model::{DataTypeRef, ForeignKeyAction};
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingNotifier(RefCell<Vec<(String, Vec<String>)>>);

    impl RecordingNotifier {
        fn keys(&self) -> Vec<String> {
            self.0.borrow().iter().map(|(k, _)| k.clone()).collect()
        }
    }

    impl ReverseEngineeringNotifier for RecordingNotifier {
        fn notify_message(&self, key: &str, args: &[&str]) {
            self.0
                .borrow_mut()
                .push((key.to_string(), args.iter().map(|a| a.to_string()).collect()));
        }
    }

    fn run(
        dialect: Dialect,
        script: &str,
        options: &ReverseEngineeringOptions,
    ) -> (Model, ReverseEngineeringSummary, RecordingNotifier) {
        let mut catalog = DdlCatalog::from_script(dialect, script).unwrap();
        let mut model = Model::new(dialect);
        let notifier = RecordingNotifier::default();
        let summary = dialect
            .reverse_engineering_strategy()
            .update_model_from_connection(
                &mut model,
                &HeadlessWorldConnector,
                &mut catalog,
                options,
                &notifier,
            )
            .unwrap();
        (model, summary, notifier)
    }

    #[test]
    fn test_system_schemas_are_filtered() {
        let mut catalog = DdlCatalog::from_script(
            Dialect::MySQL,
            "CREATE TABLE mysql.user (a INT); CREATE TABLE shop.t (a INT);",
        )
        .unwrap();
        let strategy = Dialect::MySQL.reverse_engineering_strategy();
        assert_eq!(strategy.get_schema_entries(&mut catalog).unwrap(), ["shop"]);
    }

    #[test]
    fn test_types_are_substituted_with_warning() {
        let (model, summary, notifier) = run(
            Dialect::PostgreSQL,
            "CREATE TABLE geo (id int4 PRIMARY KEY, shape geometry, price money);",
            &ReverseEngineeringOptions::default(),
        );
        let table = model.table_by_name("geo").unwrap();
        let id = table.attributes().find_by_name("id", Dialect::PostgreSQL).unwrap();
        assert_eq!(id.datatype, DataTypeRef::Type("INTEGER".into()));
        let shape = table.attributes().find_by_name("shape", Dialect::PostgreSQL).unwrap();
        assert_eq!(shape.datatype, DataTypeRef::Type("VARCHAR".into()));

        assert_eq!(summary.warnings, 2);
        assert!(notifier.keys().contains(&messages::TYPE_SUBSTITUTED.to_string()));
    }

    #[test]
    fn test_name_collision_is_skipped() {
        let (model, summary, notifier) = run(
            Dialect::MySQL,
            "CREATE TABLE a.Customer (id INT); CREATE TABLE b.CUSTOMER (id INT);",
            &ReverseEngineeringOptions::default(),
        );
        assert_eq!(model.tables().len(), 1);
        assert_eq!(summary.tables, 1);
        assert!(notifier.keys().contains(&messages::NAME_COLLISION.to_string()));
    }

    #[test]
    fn test_include_schema_naming() {
        let options = ReverseEngineeringOptions {
            table_naming: TableNaming::IncludeSchema,
            ..Default::default()
        };
        let (model, _, _) = run(
            Dialect::MySQL,
            "CREATE TABLE a.customer (id INT); CREATE TABLE b.customer (id INT);",
            &options,
        );
        assert!(model.table_by_name("A_CUSTOMER").is_some());
        assert!(model.table_by_name("b_customer").is_some());
    }

    #[test]
    fn test_table_allow_list_and_skip_views() {
        let options = ReverseEngineeringOptions {
            table_entries: vec![TableEntry::new("PUBLIC", "Orders")],
            skip_views: true,
            ..Default::default()
        };
        let (model, summary, _) = run(
            Dialect::PostgreSQL,
            "CREATE TABLE customer (id INT PRIMARY KEY);
             CREATE TABLE orders (id INT PRIMARY KEY, cust_id INT REFERENCES customer (id));
             CREATE VIEW v AS SELECT id FROM orders;",
            &options,
        );
        assert_eq!(model.tables().len(), 1);
        assert!(model.views().is_empty());
        // the exporting table was not read
        assert_eq!(summary.relations, 0);
        assert_eq!(summary.warnings, 1);
    }

    #[test]
    fn test_relation_to_unique_index() {
        let (model, summary, _) = run(
            Dialect::PostgreSQL,
            "CREATE TABLE country (id INT PRIMARY KEY, code CHAR(2) NOT NULL UNIQUE);
             CREATE TABLE city (id INT PRIMARY KEY, country_code CHAR(2));
             ALTER TABLE city ADD CONSTRAINT fk_city_country FOREIGN KEY (country_code)
                 REFERENCES country (code) ON DELETE SET NULL;",
            &ReverseEngineeringOptions::default(),
        );
        assert_eq!(summary.relations, 1);
        let relation = model.relation_by_name("fk_city_country").unwrap();
        assert_eq!(relation.on_delete, ForeignKeyAction::SetNull);
        let snapshot = model.snapshot();
        assert_eq!(
            snapshot.relations[0].mapping,
            [("code".to_string(), "country_code".to_string())]
        );
    }

    #[test]
    fn test_cancellation_keeps_partial_result() {
        let options = ReverseEngineeringOptions::default();
        options.cancellation.cancel();
        let mut catalog =
            DdlCatalog::from_script(Dialect::Generic, "CREATE TABLE t (a INT);").unwrap();
        let mut model = Model::new(Dialect::Generic);
        let notifier = RecordingNotifier::default();

        let err = Dialect::Generic
            .reverse_engineering_strategy()
            .update_model_from_connection(
                &mut model,
                &HeadlessWorldConnector,
                &mut catalog,
                &options,
                &notifier,
            )
            .unwrap_err();
        assert!(matches!(err, ReverseEngineeringError::Cancelled));
        assert!(model.tables().is_empty());
        assert_eq!(notifier.keys().last().unwrap(), messages::CANCELLED);
    }

    /// Catalog serving fixed entries, names exactly as given.
    #[derive(Debug, Default)]
    struct FixedCatalog {
        tables: Vec<(TableEntry, Vec<ColumnEntry>, Vec<IndexEntry>)>,
        foreign_keys: Vec<ForeignKeyEntry>,
        closed: bool,
    }

    impl FixedCatalog {
        fn table(mut self, name: &str, columns: &[&str], key: Option<&str>) -> Self {
            let indexes = key
                .map(|k| IndexEntry {
                    name: format!("pk_{name}"),
                    primary_key: true,
                    unique: true,
                    columns: vec![k.to_string()],
                })
                .into_iter()
                .collect();
            self.tables.push((
                TableEntry::new("main", name),
                columns.iter().map(|c| ColumnEntry::new(*c, "INTEGER")).collect(),
                indexes,
            ));
            self
        }

        fn find(&self, entry: &TableEntry) -> Result<(&[ColumnEntry], &[IndexEntry]), CatalogError> {
            self.tables
                .iter()
                .find(|(e, _, _)| e == entry)
                .map(|(_, columns, indexes)| (columns.as_slice(), indexes.as_slice()))
                .ok_or_else(|| CatalogError::query(format!("no table {}", entry.qualified_name())))
        }
    }

    impl CatalogSession for FixedCatalog {
        fn schemas(&mut self) -> Result<Vec<String>, CatalogError> {
            Ok(vec!["main".to_string()])
        }

        fn tables(&mut self, schema: &str) -> Result<Vec<TableEntry>, CatalogError> {
            Ok(self
                .tables
                .iter()
                .filter(|(e, _, _)| e.schema == schema)
                .map(|(e, _, _)| e.clone())
                .collect())
        }

        fn columns(&mut self, table: &TableEntry) -> Result<Vec<ColumnEntry>, CatalogError> {
            Ok(self.find(table)?.0.to_vec())
        }

        fn indexes(&mut self, table: &TableEntry) -> Result<Vec<IndexEntry>, CatalogError> {
            Ok(self.find(table)?.1.to_vec())
        }

        fn foreign_keys(&mut self, table: &TableEntry) -> Result<Vec<ForeignKeyEntry>, CatalogError> {
            Ok(self
                .foreign_keys
                .iter()
                .filter(|fk| &fk.importing == table)
                .cloned()
                .collect())
        }

        fn views(&mut self, _schema: &str) -> Result<Vec<ViewEntry>, CatalogError> {
            Ok(Vec::new())
        }

        fn execute_query(&mut self, sql: &str) -> Result<QueryResult, CatalogError> {
            Err(CatalogError::query(format!("unsupported: {sql}")))
        }

        fn close(&mut self) {
            self.closed = true;
        }

        fn is_closed(&self) -> bool {
            self.closed
        }
    }

    #[test]
    fn test_case_variant_tables_keep_their_relations() {
        let mut catalog = FixedCatalog::default()
            .table("Foo", &["id"], Some("id"))
            .table("foo", &["id"], Some("id"))
            .table("child", &["x"], None);
        catalog.foreign_keys.push(ForeignKeyEntry {
            name: "fk_child_Foo".into(),
            importing: TableEntry::new("main", "child"),
            columns: vec!["x".into()],
            exporting: TableEntry::new("main", "Foo"),
            referenced_columns: vec!["id".into()],
            on_delete: ForeignKeyAction::default(),
            on_update: ForeignKeyAction::default(),
        });

        let mut model = Model::new(Dialect::Generic);
        let summary = Dialect::Generic
            .reverse_engineering_strategy()
            .update_model_from_connection(
                &mut model,
                &HeadlessWorldConnector,
                &mut catalog,
                &ReverseEngineeringOptions::default(),
                &EmptyReverseEngineeringNotifier,
            )
            .unwrap();

        assert_eq!(summary.tables, 3);
        assert_eq!(summary.relations, 1);
        let upper = model.table_by_name("Foo").unwrap().system_id();
        let lower = model.table_by_name("foo").unwrap().system_id();
        assert_ne!(upper, lower);
        let relation = model.relation_by_name("fk_child_Foo").unwrap();
        assert_eq!(relation.exporting_table(), upper);
    }

    #[test]
    fn test_each_warning_reaches_notifier_once() {
        let (_, summary, notifier) = run(
            Dialect::MySQL,
            "CREATE TABLE t (a INT, A INT, b geometry);",
            &ReverseEngineeringOptions::default(),
        );
        let warnings = notifier
            .keys()
            .into_iter()
            .filter(|k| messages::is_warning(k))
            .count();
        assert_eq!(summary.warnings, 2);
        assert_eq!(warnings, 2);
    }

    #[test]
    fn test_numeric_scale_is_read_where_supported() {
        let (model, _, _) = run(
            Dialect::Oracle,
            "CREATE TABLE invoice (total NUMBER(12,2), label VARCHAR2(20));",
            &ReverseEngineeringOptions::default(),
        );
        let table = model.table_by_name("invoice").unwrap();
        let total = table.attributes().find_by_name("total", Dialect::Oracle).unwrap();
        assert_eq!((total.size, total.fraction, total.scale), (Some(12), Some(2), Some(10)));
        let label = table.attributes().find_by_name("label", Dialect::Oracle).unwrap();
        assert_eq!(label.scale, None);

        // DECIMAL on MySQL has no scale parameter
        let (model, _, _) = run(
            Dialect::MySQL,
            "CREATE TABLE invoice (total DECIMAL(12,2));",
            &ReverseEngineeringOptions::default(),
        );
        let table = model.table_by_name("invoice").unwrap();
        let total = table.attributes().find_by_name("total", Dialect::MySQL).unwrap();
        assert_eq!(total.scale, None);
    }

    #[test]
    fn test_reverse_engineer_closes_session() {
        let mut model = Model::new(Dialect::MySQL);
        model.properties_mut().set(crate::model::PROPERTY_DRIVER, "ddl");
        model.properties_mut().set(crate::model::PROPERTY_URL, "ddl:");
        let summary = reverse_engineer(
            &mut model,
            &DriverRegistry::default(),
            &HeadlessWorldConnector,
            &ReverseEngineeringOptions::default(),
            &EmptyReverseEngineeringNotifier,
        )
        .unwrap();
        assert_eq!(summary, ReverseEngineeringSummary::default());

        model.properties_mut().set(crate::model::PROPERTY_DRIVER, "odbc");
        let err = reverse_engineer(
            &mut model,
            &DriverRegistry::default(),
            &HeadlessWorldConnector,
            &ReverseEngineeringOptions::default(),
            &EmptyReverseEngineeringNotifier,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ReverseEngineeringError::Catalog(CatalogError::DriverUnavailable(_))
        ));
    }
}
