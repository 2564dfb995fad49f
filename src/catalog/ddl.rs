//! The built-in `ddl` driver: a catalog populated by executing DDL.

use std::fs;
use std::io;

use indexmap::IndexMap;

use super::parser::{CreateTable, QualifiedName, Statement, TableConstraint, parse_statements};
use super::{
    CatalogDriver, CatalogSession, ColumnEntry, ForeignKeyEntry, IndexEntry, QueryResult,
    TableEntry, ViewEntry,
};
use crate::dialect::{Dialect, TypeFamily};
use crate::error::CatalogError;
use crate::model::ForeignKeyAction;

pub const DDL_URL_PREFIX: &str = "ddl:";

/// Schema that unqualified names resolve to until a `USE` switches it.
const DEFAULT_SCHEMA: &str = "public";

/// Driver for `ddl:<path>` URLs. `ddl:` alone opens an empty catalog.
#[derive(Debug, Clone, Default)]
pub struct DdlDriver {
    credentials: Option<(String, String)>,
}

impl DdlDriver {
    /// Require a user and password on connect.
    pub fn with_credentials(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Some((user.into(), password.into())),
        }
    }
}

impl CatalogDriver for DdlDriver {
    fn name(&self) -> &str {
        "ddl"
    }

    fn connect(
        &self,
        dialect: Dialect,
        url: &str,
        user: &str,
        password: &str,
    ) -> Result<Box<dyn CatalogSession>, CatalogError> {
        let Some(path) = url.strip_prefix(DDL_URL_PREFIX) else {
            return Err(CatalogError::ConnectionRefused(format!(
                "{url} is not a ddl: url"
            )));
        };
        if let Some((expected_user, expected_password)) = &self.credentials {
            if expected_user != user || expected_password != password {
                return Err(CatalogError::AuthFailed(user.to_string()));
            }
        }

        let mut catalog = DdlCatalog::new(dialect);
        if !path.is_empty() {
            let source = fs::read_to_string(path).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => CatalogError::ConnectionRefused(format!("{path}: {e}")),
                _ => CatalogError::Io(e),
            })?;
            catalog.execute_script(&source)?;
        }
        tracing::debug!(url, schemas = catalog.schemas.len(), "ddl catalog opened");
        Ok(Box::new(catalog))
    }
}

#[derive(Debug, Clone)]
struct CatalogForeignKey {
    name: String,
    columns: Vec<String>,
    schema: String,
    table: String,
    referenced: Vec<String>,
    on_delete: ForeignKeyAction,
    on_update: ForeignKeyAction,
}

#[derive(Debug, Clone)]
struct CatalogTable {
    name: String,
    columns: Vec<ColumnEntry>,
    indexes: Vec<IndexEntry>,
    foreign_keys: Vec<CatalogForeignKey>,
}

impl CatalogTable {
    fn primary_key(&self) -> Option<&IndexEntry> {
        self.indexes.iter().find(|i| i.primary_key)
    }

    fn has_index(&self, name: &str) -> bool {
        self.indexes.iter().any(|i| i.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone)]
struct CatalogSchema {
    name: String,
    tables: IndexMap<String, CatalogTable>,
    views: IndexMap<String, ViewEntry>,
}

impl CatalogSchema {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tables: IndexMap::new(),
            views: IndexMap::new(),
        }
    }
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

/// In-memory catalog. Names are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct DdlCatalog {
    dialect: Dialect,
    schemas: IndexMap<String, CatalogSchema>,
    current: String,
    closed: bool,
}

impl DdlCatalog {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            schemas: IndexMap::new(),
            current: DEFAULT_SCHEMA.to_string(),
            closed: false,
        }
    }

    /// Catalog holding the objects a DDL script creates.
    pub fn from_script(dialect: Dialect, source: &str) -> Result<Self, CatalogError> {
        let mut catalog = Self::new(dialect);
        catalog.execute_script(source)?;
        Ok(catalog)
    }

    /// Execute every DDL statement of a script. Statements the catalog does
    /// not track (INSERT, SET, GRANT...) are skipped.
    pub fn execute_script(&mut self, source: &str) -> Result<usize, CatalogError> {
        let mut executed = 0;
        for statement in parse_statements(source)? {
            if statement == Statement::Other {
                continue;
            }
            self.execute(statement)?;
            executed += 1;
        }
        Ok(executed)
    }

    fn check_open(&self) -> Result<(), CatalogError> {
        if self.closed {
            return Err(CatalogError::ConnectionLost);
        }
        Ok(())
    }

    fn schema_key(&self, name: &QualifiedName) -> String {
        key(name.schema.as_deref().unwrap_or(&self.current))
    }

    fn schema_mut(&mut self, name: &str) -> &mut CatalogSchema {
        self.schemas
            .entry(key(name))
            .or_insert_with(|| CatalogSchema::new(name))
    }

    fn table_mut(&mut self, name: &QualifiedName) -> Result<&mut CatalogTable, CatalogError> {
        let schema = self.schema_key(name);
        self.schemas
            .get_mut(&schema)
            .and_then(|s| s.tables.get_mut(&key(&name.name)))
            .ok_or_else(|| CatalogError::query(format!("table {} does not exist", name.name)))
    }

    fn find_table(&self, entry: &TableEntry) -> Result<&CatalogTable, CatalogError> {
        self.schemas
            .get(&key(&entry.schema))
            .and_then(|s| s.tables.get(&key(&entry.name)))
            .ok_or_else(|| {
                CatalogError::query(format!("table {} does not exist", entry.qualified_name()))
            })
    }

    fn execute(&mut self, statement: Statement) -> Result<(), CatalogError> {
        match statement {
            Statement::CreateTable(create) => self.create_table(create),
            Statement::CreateIndex {
                name,
                table,
                unique,
                columns,
            } => {
                let target = self.table_mut(&table)?;
                if target.has_index(&name) {
                    return Err(CatalogError::query(format!("index {name} already exists")));
                }
                target.indexes.push(IndexEntry {
                    name,
                    primary_key: false,
                    unique,
                    columns,
                });
                Ok(())
            }
            Statement::CreateView { name, sql } => {
                let schema_name = name.schema.clone().unwrap_or_else(|| self.current.clone());
                let schema = self.schema_mut(&schema_name);
                let entry = ViewEntry {
                    schema: schema.name.clone(),
                    name: name.name.clone(),
                    sql,
                };
                // CREATE OR REPLACE
                schema.views.insert(key(&name.name), entry);
                Ok(())
            }
            Statement::AddConstraint { table, constraint } => {
                let dialect = self.dialect;
                let schema = self.schema_key(&table);
                let target = self.table_mut(&table)?;
                let table_name = target.name.clone();
                add_constraint(dialect, &schema, &table_name, target, constraint)
            }
            Statement::DropTable(name) => {
                let schema = self.schema_key(&name);
                let dropped = self
                    .schemas
                    .get_mut(&schema)
                    .and_then(|s| s.tables.shift_remove(&key(&name.name)));
                if dropped.is_none() {
                    tracing::debug!(table = %name.name, "drop of unknown table ignored");
                }
                Ok(())
            }
            Statement::DropView(name) => {
                let schema = self.schema_key(&name);
                if let Some(s) = self.schemas.get_mut(&schema) {
                    s.views.shift_remove(&key(&name.name));
                }
                Ok(())
            }
            Statement::CreateSchema(name) => {
                self.schema_mut(&name);
                Ok(())
            }
            Statement::Use(name) => {
                self.schema_mut(&name);
                self.current = name;
                Ok(())
            }
            Statement::Other => Err(CatalogError::query("statement is not supported by the ddl catalog")),
        }
    }

    fn create_table(&mut self, create: CreateTable) -> Result<(), CatalogError> {
        let schema_name = create
            .name
            .schema
            .clone()
            .unwrap_or_else(|| self.current.clone());
        let dialect = self.dialect;
        let schema = self.schema_mut(&schema_name);
        let schema_key = key(&schema.name);
        let table_key = key(&create.name.name);
        if schema.tables.contains_key(&table_key) {
            return Err(CatalogError::query(format!(
                "table {} already exists",
                create.name.name
            )));
        }

        let mut table = CatalogTable {
            name: create.name.name.clone(),
            columns: create.columns,
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        };
        for constraint in create.constraints {
            add_constraint(dialect, &schema_key, &create.name.name, &mut table, constraint)?;
        }
        schema.tables.insert(table_key, table);
        Ok(())
    }
}

/// Constraint names a flavor generates when the DDL gives none.
fn default_constraint_name(dialect: Dialect, table: &str, kind: &str, columns: &[String], n: usize) -> String {
    match (dialect, kind) {
        (Dialect::MySQL, "pk") => "PRIMARY".to_string(),
        (Dialect::MySQL, "fk") => format!("{table}_ibfk_{n}"),
        (Dialect::MySQL, _) => columns.first().cloned().unwrap_or_else(|| format!("{table}_{n}")),
        (Dialect::PostgreSQL, "pk") => format!("{table}_pkey"),
        (Dialect::PostgreSQL, "fk") => format!("{table}_{}_fkey", columns.join("_")),
        (Dialect::PostgreSQL, _) => format!("{table}_{}_key", columns.join("_")),
        (_, "pk") => format!("PK_{table}"),
        (_, "fk") => format!("FK_{table}_{n}"),
        _ => format!("UK_{table}_{n}"),
    }
}

fn add_constraint(
    dialect: Dialect,
    schema: &str,
    table_name: &str,
    table: &mut CatalogTable,
    constraint: TableConstraint,
) -> Result<(), CatalogError> {
    match constraint {
        TableConstraint::PrimaryKey { name, columns } => {
            if table.primary_key().is_some() {
                return Err(CatalogError::query(format!(
                    "multiple primary keys for table {table_name}"
                )));
            }
            for column in table
                .columns
                .iter_mut()
                .filter(|c| columns.iter().any(|k| k.eq_ignore_ascii_case(&c.name)))
            {
                column.nullable = false;
            }
            let name = name.unwrap_or_else(|| default_constraint_name(dialect, table_name, "pk", &columns, 0));
            table.indexes.insert(
                0,
                IndexEntry {
                    name,
                    primary_key: true,
                    unique: true,
                    columns,
                },
            );
        }
        TableConstraint::Unique { name, columns } | TableConstraint::Index { name, columns }
            if columns.is_empty() =>
        {
            tracing::debug!(table = table_name, ?name, "index without columns ignored");
        }
        TableConstraint::Unique { name, columns } => {
            let n = table.indexes.len() + 1;
            let name = name.unwrap_or_else(|| default_constraint_name(dialect, table_name, "uk", &columns, n));
            push_index(table, name, true, columns)?;
        }
        TableConstraint::Index { name, columns } => {
            let n = table.indexes.len() + 1;
            let name = name.unwrap_or_else(|| default_constraint_name(dialect, table_name, "ix", &columns, n));
            push_index(table, name, false, columns)?;
        }
        TableConstraint::ForeignKey {
            name,
            columns,
            table: referenced_table,
            referenced,
            on_delete,
            on_update,
        } => {
            let n = table.foreign_keys.len() + 1;
            let name = name.unwrap_or_else(|| default_constraint_name(dialect, table_name, "fk", &columns, n));
            table.foreign_keys.push(CatalogForeignKey {
                name,
                columns,
                schema: referenced_table
                    .schema
                    .as_deref()
                    .map(key)
                    .unwrap_or_else(|| schema.to_string()),
                table: referenced_table.name,
                referenced,
                on_delete,
                on_update,
            });
        }
    }
    Ok(())
}

fn push_index(
    table: &mut CatalogTable,
    name: String,
    unique: bool,
    columns: Vec<String>,
) -> Result<(), CatalogError> {
    if table.has_index(&name) {
        return Err(CatalogError::query(format!("index {name} already exists")));
    }
    table.indexes.push(IndexEntry {
        name,
        primary_key: false,
        unique,
        columns,
    });
    Ok(())
}

impl CatalogSession for DdlCatalog {
    fn schemas(&mut self) -> Result<Vec<String>, CatalogError> {
        self.check_open()?;
        Ok(self.schemas.values().map(|s| s.name.clone()).collect())
    }

    fn tables(&mut self, schema: &str) -> Result<Vec<TableEntry>, CatalogError> {
        self.check_open()?;
        Ok(self
            .schemas
            .get(&key(schema))
            .map(|s| {
                s.tables
                    .values()
                    .map(|t| TableEntry::new(s.name.clone(), t.name.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn columns(&mut self, table: &TableEntry) -> Result<Vec<ColumnEntry>, CatalogError> {
        self.check_open()?;
        let dialect = self.dialect;
        let mut columns = self.find_table(table)?.columns.clone();
        // DDL numbers are decimal
        for column in &mut columns {
            let numeric = dialect.find_data_type(&column.type_name).is_some_and(|t| {
                matches!(t.family, TypeFamily::Integer | TypeFamily::Decimal | TypeFamily::Float)
            });
            if numeric {
                column.scale = Some(10);
            }
        }
        Ok(columns)
    }

    fn indexes(&mut self, table: &TableEntry) -> Result<Vec<IndexEntry>, CatalogError> {
        self.check_open()?;
        Ok(self.find_table(table)?.indexes.clone())
    }

    fn foreign_keys(&mut self, table: &TableEntry) -> Result<Vec<ForeignKeyEntry>, CatalogError> {
        self.check_open()?;
        let importing = self.find_table(table)?;

        let mut entries = Vec::with_capacity(importing.foreign_keys.len());
        for fk in &importing.foreign_keys {
            let target = self
                .schemas
                .get(&fk.schema)
                .and_then(|s| s.tables.get(&key(&fk.table)).map(|t| (s, t)));
            let exporting = match target {
                Some((s, t)) => TableEntry::new(s.name.clone(), t.name.clone()),
                None => TableEntry::new(fk.schema.clone(), fk.table.clone()),
            };
            // REFERENCES t without columns means the primary key of t
            let referenced_columns = if fk.referenced.is_empty() {
                target
                    .and_then(|(_, t)| t.primary_key())
                    .map(|pk| pk.columns.clone())
                    .unwrap_or_default()
            } else {
                fk.referenced.clone()
            };
            entries.push(ForeignKeyEntry {
                name: fk.name.clone(),
                importing: table.clone(),
                columns: fk.columns.clone(),
                exporting,
                referenced_columns,
                on_delete: fk.on_delete,
                on_update: fk.on_update,
            });
        }
        Ok(entries)
    }

    fn views(&mut self, schema: &str) -> Result<Vec<ViewEntry>, CatalogError> {
        self.check_open()?;
        Ok(self
            .schemas
            .get(&key(schema))
            .map(|s| s.views.values().cloned().collect())
            .unwrap_or_default())
    }

    fn execute_query(&mut self, sql: &str) -> Result<QueryResult, CatalogError> {
        self.check_open()?;
        let statements = parse_statements(sql)?;
        if statements.iter().any(|s| *s == Statement::Other) {
            return Err(CatalogError::query(format!(
                "only DDL statements can be executed: {}",
                sql.trim()
            )));
        }
        for statement in statements {
            self.execute(statement)?;
        }
        Ok(QueryResult::default())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SHOP: &str = r#"
        CREATE TABLE customer (id INT NOT NULL, name VARCHAR(40), PRIMARY KEY (id));
        CREATE TABLE orders (
            id INT PRIMARY KEY,
            cust_id INT REFERENCES customer ON DELETE CASCADE
        );
        CREATE INDEX ix_cust ON orders (cust_id);
        CREATE VIEW v_orders AS SELECT id FROM orders;
        INSERT INTO customer VALUES (1, 'x');
    "#;

    fn orders() -> TableEntry {
        TableEntry::new("public", "orders")
    }

    #[test]
    fn test_script_builds_catalog() {
        let mut catalog = DdlCatalog::from_script(Dialect::PostgreSQL, SHOP).unwrap();
        assert_eq!(catalog.schemas().unwrap(), ["public"]);
        assert_eq!(
            catalog.tables("PUBLIC").unwrap(),
            [TableEntry::new("public", "customer"), orders()]
        );

        let indexes = catalog.indexes(&orders()).unwrap();
        assert_eq!(indexes[0].name, "orders_pkey");
        assert!(indexes[0].primary_key);
        assert_eq!(indexes[1].name, "ix_cust");

        let fks = catalog.foreign_keys(&orders()).unwrap();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].name, "orders_cust_id_fkey");
        assert_eq!(fks[0].exporting.name, "customer");
        assert_eq!(fks[0].referenced_columns, ["id"]);
        assert_eq!(fks[0].on_delete, ForeignKeyAction::Cascade);

        assert_eq!(catalog.views("public").unwrap()[0].sql, "SELECT id FROM orders");
    }

    #[test]
    fn test_use_switches_schema() {
        let mut catalog = DdlCatalog::from_script(
            Dialect::MySQL,
            "CREATE DATABASE mogwai; USE mogwai; CREATE TABLE t (a INT, PRIMARY KEY (a));",
        )
        .unwrap();
        assert_eq!(catalog.schemas().unwrap(), ["mogwai"]);
        let indexes = catalog.indexes(&TableEntry::new("mogwai", "T")).unwrap();
        assert_eq!(indexes[0].name, "PRIMARY");
        assert!(!catalog.columns(&TableEntry::new("mogwai", "t")).unwrap()[0].nullable);
    }

    #[test]
    fn test_catalog_errors() {
        let mut catalog = DdlCatalog::new(Dialect::Generic);
        assert!(matches!(
            catalog.execute_query("CREATE INDEX ix ON missing (a)"),
            Err(CatalogError::Query(_))
        ));
        assert!(matches!(
            catalog.execute_query("SELECT 1"),
            Err(CatalogError::Query(_))
        ));
        catalog.execute_query("CREATE TABLE t (a INT PRIMARY KEY)").unwrap();
        assert!(matches!(
            catalog.execute_query("ALTER TABLE t ADD PRIMARY KEY (a)"),
            Err(CatalogError::Query(_))
        ));

        catalog.close();
        assert!(catalog.is_closed());
        assert!(matches!(
            catalog.execute_query("CREATE TABLE u (a INT)"),
            Err(CatalogError::ConnectionLost)
        ));
        assert!(matches!(catalog.schemas(), Err(CatalogError::ConnectionLost)));
    }

    #[test]
    fn test_driver_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SHOP.as_bytes()).unwrap();
        let url = format!("ddl:{}", file.path().display());

        let mut session = DdlDriver::default()
            .connect(Dialect::PostgreSQL, &url, "", "")
            .unwrap();
        assert_eq!(session.tables("public").unwrap().len(), 2);
    }

    #[test]
    fn test_driver_refusals() {
        let driver = DdlDriver::with_credentials("scott", "tiger");
        assert!(matches!(
            driver.connect(Dialect::MySQL, "jdbc:mysql://localhost", "scott", "tiger"),
            Err(CatalogError::ConnectionRefused(_))
        ));
        assert!(matches!(
            driver.connect(Dialect::MySQL, "ddl:", "scott", "lion"),
            Err(CatalogError::AuthFailed(user)) if user == "scott"
        ));
        assert!(matches!(
            driver.connect(Dialect::MySQL, "ddl:/nonexistent/dump.sql", "scott", "tiger"),
            Err(CatalogError::ConnectionRefused(_))
        ));
        let mut empty = driver.connect(Dialect::MySQL, "ddl:", "scott", "tiger").unwrap();
        assert!(empty.schemas().unwrap().is_empty());
    }
}
