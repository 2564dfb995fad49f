//! Catalog sessions: the metadata source reverse engineering reads from.
//!
//! A [`CatalogDriver`] opens a [`CatalogSession`] for a connection URL. The
//! [`DriverRegistry`] maps driver identifiers to drivers; the built-in `ddl`
//! driver serves a catalog built by executing a DDL script.

mod ddl;
pub mod lexer;
mod parser;

pub use ddl::{DdlCatalog, DdlDriver};
pub use parser::{DdlParseError, QualifiedName, Statement, TableConstraint, parse_statements};

use indexmap::IndexMap;

use crate::dialect::Dialect;
use crate::error::CatalogError;
use crate::model::ForeignKeyAction;

/// A table as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableEntry {
    pub schema: String,
    pub name: String,
}

impl TableEntry {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// Column metadata, in catalog order.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnEntry {
    pub name: String,
    /// Raw catalog type name, without size.
    pub type_name: String,
    pub size: Option<u32>,
    pub fraction: Option<u32>,
    /// Radix of numeric precision, as catalogs report it (10 or 2).
    pub scale: Option<u32>,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub extra: Option<String>,
    pub comment: Option<String>,
}

impl ColumnEntry {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            size: None,
            fraction: None,
            scale: None,
            nullable: true,
            default_value: None,
            extra: None,
            comment: None,
        }
    }
}

/// Index metadata. Columns are in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub primary_key: bool,
    pub unique: bool,
    pub columns: Vec<String>,
}

/// An imported foreign key: `importing.columns` reference
/// `exporting.referenced_columns` position by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyEntry {
    pub name: String,
    pub importing: TableEntry,
    pub columns: Vec<String>,
    pub exporting: TableEntry,
    pub referenced_columns: Vec<String>,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewEntry {
    pub schema: String,
    pub name: String,
    pub sql: String,
}

/// Rows returned by [`CatalogSession::execute_query`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// An open connection to a catalog.
///
/// Every call on a closed session fails with [`CatalogError::ConnectionLost`].
pub trait CatalogSession: std::fmt::Debug {
    fn schemas(&mut self) -> Result<Vec<String>, CatalogError>;

    fn tables(&mut self, schema: &str) -> Result<Vec<TableEntry>, CatalogError>;

    fn columns(&mut self, table: &TableEntry) -> Result<Vec<ColumnEntry>, CatalogError>;

    /// Primary key first, then secondary indexes in creation order.
    fn indexes(&mut self, table: &TableEntry) -> Result<Vec<IndexEntry>, CatalogError>;

    /// Foreign keys declared on the table.
    fn foreign_keys(&mut self, table: &TableEntry) -> Result<Vec<ForeignKeyEntry>, CatalogError>;

    fn views(&mut self, schema: &str) -> Result<Vec<ViewEntry>, CatalogError>;

    fn execute_query(&mut self, sql: &str) -> Result<QueryResult, CatalogError>;

    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Opens sessions for one family of connection URLs.
pub trait CatalogDriver: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn connect(
        &self,
        dialect: Dialect,
        url: &str,
        user: &str,
        password: &str,
    ) -> Result<Box<dyn CatalogSession>, CatalogError>;
}

/// Driver identifiers to drivers.
#[derive(Debug)]
pub struct DriverRegistry {
    drivers: IndexMap<String, Box<dyn CatalogDriver>>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(DdlDriver::default()));
        registry
    }
}

impl DriverRegistry {
    pub fn empty() -> Self {
        Self {
            drivers: IndexMap::new(),
        }
    }

    /// Register a driver under its name, replacing any previous one.
    pub fn register(&mut self, driver: Box<dyn CatalogDriver>) {
        self.drivers.insert(driver.name().to_string(), driver);
    }

    pub fn get(&self, name: &str) -> Option<&dyn CatalogDriver> {
        self.drivers.get(name).map(|d| d.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.drivers.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_knows_ddl() {
        let registry = DriverRegistry::default();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["ddl"]);
        assert!(registry.get("ddl").is_some());
        assert!(registry.get("jdbc").is_none());
    }

    #[test]
    fn test_unknown_driver_is_unavailable() {
        let registry = DriverRegistry::empty();
        let err = Dialect::MySQL
            .create_connection(&registry, "ddl", "ddl:", "", "")
            .unwrap_err();
        assert!(matches!(err, CatalogError::DriverUnavailable(name) if name == "ddl"));
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(TableEntry::new("shop", "orders").qualified_name(), "shop.orders");
    }
}
