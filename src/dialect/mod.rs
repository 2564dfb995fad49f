//! Database flavors: identifier rules, datatype catalogs and catalog access.

mod datatypes;

pub use datatypes::{DataType, TypeFamily, classify};

use datatypes::{GENERIC_TYPES, MYSQL_TYPES, ORACLE_TYPES, POSTGRES_TYPES};

use crate::catalog::{CatalogSession, DriverRegistry};
use crate::error::{CatalogError, ModelError};
use crate::reverse::ReverseEngineeringStrategy;

/// How a flavor stores unquoted identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameCasing {
    Upper,
    Lower,
    Preserve,
}

/// SQL dialect variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// Standard SQL, case preserving
    #[default]
    Generic,
    /// PostgreSQL
    PostgreSQL,
    /// MySQL
    MySQL,
    /// Oracle
    Oracle,
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [
        Dialect::Generic,
        Dialect::PostgreSQL,
        Dialect::MySQL,
        Dialect::Oracle,
    ];

    /// Parse dialect from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "generic" => Some(Self::Generic),
            "postgres" | "postgresql" => Some(Self::PostgreSQL),
            "mysql" => Some(Self::MySQL),
            "oracle" => Some(Self::Oracle),
            _ => None,
        }
    }

    /// Stable identifier of the flavor.
    pub fn unique_name(self) -> &'static str {
        match self {
            Self::Generic => "Generic",
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::Oracle => "Oracle",
        }
    }

    /// Look a dialect up by its unique name.
    pub fn from_unique_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.unique_name() == name)
    }

    pub fn casing(self) -> NameCasing {
        match self {
            Self::Generic => NameCasing::Preserve,
            Self::PostgreSQL => NameCasing::Lower,
            Self::MySQL | Self::Oracle => NameCasing::Upper,
        }
    }

    pub fn max_name_length(self) -> usize {
        match self {
            Self::Generic => 128,
            Self::PostgreSQL => 63,
            Self::MySQL => 64,
            Self::Oracle => 30,
        }
    }

    fn allows_char(self, c: char) -> bool {
        if c.is_alphanumeric() || c == '_' {
            return true;
        }
        match self {
            Self::MySQL => c == '$',
            Self::Oracle => c == '$' || c == '#',
            Self::Generic | Self::PostgreSQL => false,
        }
    }

    /// Fold an identifier to its stored form without validating it.
    ///
    /// Two names are equal for this dialect iff their normalized forms are
    /// byte-equal.
    pub fn normalize(self, name: &str) -> String {
        self.fold(strip_quotes(name.trim()))
    }

    fn fold(self, name: &str) -> String {
        match self.casing() {
            NameCasing::Upper => name.to_uppercase(),
            NameCasing::Lower => name.to_lowercase(),
            NameCasing::Preserve => name.to_string(),
        }
    }

    /// Validate an identifier and return it as it must be stored.
    pub fn check_name(self, name: &str) -> Result<String, ModelError> {
        let unquoted = strip_quotes(name.trim());

        let Some(first) = unquoted.chars().next() else {
            return Err(ModelError::invalid_name(name, "name is empty"));
        };
        if !(first.is_alphabetic() || first == '_') {
            return Err(ModelError::invalid_name(
                name,
                "name must start with a letter or underscore",
            ));
        }
        if let Some(bad) = unquoted.chars().find(|c| !self.allows_char(*c)) {
            return Err(ModelError::invalid_name(
                name,
                format!("character {bad:?} is not allowed in {} names", self.unique_name()),
            ));
        }
        let length = unquoted.chars().count();
        if length > self.max_name_length() {
            return Err(ModelError::invalid_name(
                name,
                format!(
                    "name exceeds the maximum length of {} characters",
                    self.max_name_length()
                ),
            ));
        }

        Ok(self.fold(unquoted))
    }

    /// Quote an identifier for use in generated SQL.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Self::MySQL => format!("`{}`", name.replace('`', "``")),
            _ => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// The closed catalog of datatypes this flavor supports.
    pub fn data_types(self) -> &'static [DataType] {
        match self {
            Self::Generic => GENERIC_TYPES,
            Self::PostgreSQL => POSTGRES_TYPES,
            Self::MySQL => MYSQL_TYPES,
            Self::Oracle => ORACLE_TYPES,
        }
    }

    pub fn find_data_type(self, name: &str) -> Option<&'static DataType> {
        self.data_types().iter().find(|t| t.matches(name))
    }

    /// Preferred substitute for a family of types.
    fn family_substitute(self, family: TypeFamily) -> &'static str {
        use TypeFamily::*;
        match (self, family) {
            (Self::MySQL, Integer) => "INT",
            (_, Integer) => "INTEGER",
            (Self::PostgreSQL, Decimal) => "NUMERIC",
            (Self::Oracle, Decimal | Boolean) => "NUMBER",
            (_, Decimal) => "DECIMAL",
            (Self::PostgreSQL, Float) => "DOUBLE PRECISION",
            (Self::Oracle, Float) => "BINARY_DOUBLE",
            (_, Float) => "DOUBLE",
            (Self::Oracle, Character | Other) => "VARCHAR2",
            (_, Character | Other) => "VARCHAR",
            (Self::MySQL | Self::PostgreSQL, Text) => "TEXT",
            (_, Text) => "CLOB",
            (_, Temporal) => "TIMESTAMP",
            (Self::PostgreSQL, Binary) => "BYTEA",
            (_, Binary) => "BLOB",
            (_, Boolean) => "BOOLEAN",
        }
    }

    fn catalog_type(self, name: &str) -> &'static DataType {
        self.data_types()
            .iter()
            .find(|t| t.name == name)
            .unwrap_or(&self.data_types()[0])
    }

    /// Type used when nothing closer can be found.
    pub fn default_data_type(self) -> &'static DataType {
        self.catalog_type(self.family_substitute(TypeFamily::Character))
    }

    /// Map a catalog type name to a supported type, substituting the closest
    /// match for unknown names. The flag is `true` when a substitution happened.
    pub fn closest_data_type(self, raw: &str) -> (&'static DataType, bool) {
        let base = raw.split('(').next().unwrap_or(raw).trim();
        if let Some(found) = self.find_data_type(base) {
            return (found, false);
        }
        let substitute = self.catalog_type(self.family_substitute(classify(base)));
        (substitute, true)
    }

    /// The flavor-specific reverse-engineering strategy.
    pub fn reverse_engineering_strategy(self) -> ReverseEngineeringStrategy {
        ReverseEngineeringStrategy::new(self)
    }

    /// Open a catalog session through a driver from the registry.
    pub fn create_connection(
        self,
        drivers: &DriverRegistry,
        driver: &str,
        url: &str,
        user: &str,
        password: &str,
    ) -> Result<Box<dyn CatalogSession>, CatalogError> {
        tracing::debug!(dialect = self.unique_name(), driver, url, user, "opening catalog session");
        let driver_impl = drivers
            .get(driver)
            .ok_or_else(|| CatalogError::DriverUnavailable(driver.to_string()))?;
        driver_impl.connect(self, url, user, password)
    }

    /// Detect dialect from SQL content.
    pub fn detect(content: &str) -> Self {
        let lower = content.to_lowercase();

        // Check header comments
        if lower.contains("postgresql database dump")
            || lower.contains("pg_dump")
            || lower.contains("-- postgres")
        {
            return Self::PostgreSQL;
        }
        if lower.contains("mysql dump")
            || lower.contains("mysqldump")
            || lower.contains("-- mysql")
        {
            return Self::MySQL;
        }
        if lower.contains("-- oracle") || lower.contains("sql*plus") {
            return Self::Oracle;
        }

        // Check type keywords
        if lower.contains("serial")
            || lower.contains("text[]")
            || lower.contains("::text")
            || lower.contains("timestamptz")
        {
            return Self::PostgreSQL;
        }
        if lower.contains("auto_increment")
            || lower.contains("tinyint")
            || lower.contains("engine=")
            || lower.contains("unsigned")
        {
            return Self::MySQL;
        }
        if lower.contains("varchar2") || lower.contains("number(") {
            return Self::Oracle;
        }

        Self::Generic
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.unique_name())
    }
}

fn strip_quotes(name: &str) -> &str {
    let mut chars = name.chars();
    match (chars.next(), chars.next_back()) {
        (Some('"'), Some('"')) | (Some('`'), Some('`')) | (Some('['), Some(']')) => {
            &name[1..name.len() - 1]
        }
        _ => name,
    }
}
