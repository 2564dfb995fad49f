//! Datatype catalogs of the supported dialects.

use serde::Serialize;

/// Coarse classification used to find a substitute for unknown catalog types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TypeFamily {
    Integer,
    Decimal,
    Float,
    Character,
    Text,
    Temporal,
    Binary,
    Boolean,
    Other,
}

/// A datatype a dialect supports, with the parameters that are meaningful for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataType {
    pub name: &'static str,
    pub family: TypeFamily,
    pub supports_size: bool,
    pub supports_fraction: bool,
    pub supports_scale: bool,
    pub supports_extra: bool,
    /// Catalog spellings that denote this type.
    #[serde(skip)]
    pub aliases: &'static [&'static str],
}

impl DataType {
    const fn plain(name: &'static str, family: TypeFamily) -> Self {
        Self {
            name,
            family,
            supports_size: false,
            supports_fraction: false,
            supports_scale: false,
            supports_extra: false,
            aliases: &[],
        }
    }

    const fn sized(name: &'static str, family: TypeFamily) -> Self {
        Self {
            supports_size: true,
            ..Self::plain(name, family)
        }
    }

    const fn numeric(name: &'static str) -> Self {
        Self {
            supports_size: true,
            supports_fraction: true,
            ..Self::plain(name, TypeFamily::Decimal)
        }
    }

    const fn with_extra(mut self) -> Self {
        self.supports_extra = true;
        self
    }

    const fn with_scale(mut self) -> Self {
        self.supports_scale = true;
        self
    }

    const fn aka(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    /// Case-insensitive match against the name and the aliases.
    pub fn matches(&self, name: &str) -> bool {
        let upper = name.trim().to_uppercase();
        self.name == upper || self.aliases.iter().any(|a| *a == upper)
    }

    /// Render the type with its parameters, e.g. `DECIMAL(20,5)`.
    pub fn render(&self, size: Option<u32>, fraction: Option<u32>) -> String {
        match (self.supports_size.then_some(size).flatten(), fraction) {
            (Some(size), Some(fraction)) if self.supports_fraction => {
                format!("{}({},{})", self.name, size, fraction)
            }
            (Some(size), _) => format!("{}({})", self.name, size),
            (None, _) => self.name.to_string(),
        }
    }
}

use TypeFamily::*;

pub(crate) static GENERIC_TYPES: &[DataType] = &[
    DataType::plain("INTEGER", Integer).aka(&["INT"]),
    DataType::plain("SMALLINT", Integer),
    DataType::plain("BIGINT", Integer),
    DataType::numeric("DECIMAL").aka(&["NUMERIC", "DEC"]),
    DataType::plain("REAL", Float).aka(&["FLOAT"]),
    DataType::plain("DOUBLE", Float).aka(&["DOUBLE PRECISION"]),
    DataType::sized("CHAR", Character).aka(&["CHARACTER"]),
    DataType::sized("VARCHAR", Character).aka(&["CHARACTER VARYING"]),
    DataType::plain("CLOB", Text).aka(&["TEXT"]),
    DataType::plain("BLOB", Binary),
    DataType::plain("DATE", Temporal),
    DataType::plain("TIME", Temporal),
    DataType::plain("TIMESTAMP", Temporal).aka(&["DATETIME"]),
    DataType::plain("BOOLEAN", Boolean).aka(&["BOOL"]),
];

pub(crate) static MYSQL_TYPES: &[DataType] = &[
    DataType::sized("TINYINT", Integer).with_extra(),
    DataType::sized("SMALLINT", Integer).with_extra(),
    DataType::sized("MEDIUMINT", Integer).with_extra(),
    DataType::sized("INT", Integer).with_extra().aka(&["INTEGER"]),
    DataType::sized("BIGINT", Integer).with_extra(),
    DataType::numeric("DECIMAL").aka(&["NUMERIC", "DEC", "FIXED"]),
    DataType::numeric("FLOAT"),
    DataType::numeric("DOUBLE").aka(&["DOUBLE PRECISION", "REAL"]),
    DataType::sized("BIT", Boolean),
    DataType::plain("BOOLEAN", Boolean).aka(&["BOOL"]),
    DataType::sized("CHAR", Character).aka(&["CHARACTER"]),
    DataType::sized("VARCHAR", Character).aka(&["CHARACTER VARYING"]),
    DataType::plain("TINYTEXT", Text),
    DataType::plain("TEXT", Text),
    DataType::plain("MEDIUMTEXT", Text),
    DataType::plain("LONGTEXT", Text),
    DataType::plain("DATE", Temporal),
    DataType::plain("TIME", Temporal),
    DataType::plain("DATETIME", Temporal),
    DataType::plain("TIMESTAMP", Temporal),
    DataType::plain("YEAR", Temporal),
    DataType::sized("BINARY", Binary),
    DataType::sized("VARBINARY", Binary),
    DataType::plain("TINYBLOB", Binary),
    DataType::plain("BLOB", Binary),
    DataType::plain("MEDIUMBLOB", Binary),
    DataType::plain("LONGBLOB", Binary),
    DataType::plain("ENUM", Other).with_extra(),
    DataType::plain("SET", Other).with_extra(),
    DataType::plain("JSON", Other),
];

pub(crate) static POSTGRES_TYPES: &[DataType] = &[
    DataType::plain("SMALLINT", Integer).aka(&["INT2"]),
    DataType::plain("INTEGER", Integer).aka(&["INT", "INT4"]),
    DataType::plain("BIGINT", Integer).aka(&["INT8"]),
    DataType::plain("SERIAL", Integer).aka(&["SERIAL4"]),
    DataType::plain("BIGSERIAL", Integer).aka(&["SERIAL8"]),
    DataType::numeric("NUMERIC").aka(&["DECIMAL"]),
    DataType::plain("REAL", Float).aka(&["FLOAT4"]),
    DataType::plain("DOUBLE PRECISION", Float).aka(&["FLOAT8", "DOUBLE"]),
    DataType::plain("BOOLEAN", Boolean).aka(&["BOOL"]),
    DataType::sized("CHAR", Character).aka(&["CHARACTER", "BPCHAR"]),
    DataType::sized("VARCHAR", Character).aka(&["CHARACTER VARYING"]),
    DataType::plain("TEXT", Text),
    DataType::plain("DATE", Temporal),
    DataType::sized("TIME", Temporal).aka(&["TIME WITHOUT TIME ZONE"]),
    DataType::sized("TIMESTAMP", Temporal).aka(&["TIMESTAMP WITHOUT TIME ZONE"]),
    DataType::sized("TIMESTAMPTZ", Temporal).aka(&["TIMESTAMP WITH TIME ZONE"]),
    DataType::plain("INTERVAL", Temporal),
    DataType::plain("BYTEA", Binary),
    DataType::plain("UUID", Other),
    DataType::plain("JSON", Other),
    DataType::plain("JSONB", Other),
];

pub(crate) static ORACLE_TYPES: &[DataType] = &[
    DataType::numeric("NUMBER").with_scale().aka(&["NUMERIC", "DECIMAL"]),
    DataType::plain("INTEGER", Integer).aka(&["INT", "SMALLINT"]),
    DataType::sized("FLOAT", Float),
    DataType::plain("BINARY_FLOAT", Float),
    DataType::plain("BINARY_DOUBLE", Float),
    DataType::sized("CHAR", Character),
    DataType::sized("VARCHAR2", Character).aka(&["VARCHAR"]),
    DataType::sized("NCHAR", Character),
    DataType::sized("NVARCHAR2", Character),
    DataType::plain("CLOB", Text),
    DataType::plain("NCLOB", Text),
    DataType::plain("LONG", Text),
    DataType::plain("BLOB", Binary),
    DataType::sized("RAW", Binary),
    DataType::plain("DATE", Temporal),
    DataType::sized("TIMESTAMP", Temporal),
];

/// Guess the family of a catalog type name that is not in the catalog.
pub fn classify(raw: &str) -> TypeFamily {
    let lower = raw.to_lowercase();
    let base = lower.split('(').next().unwrap_or(&lower).trim();

    if base.contains("bool") || base == "bit" {
        Boolean
    } else if base.contains("int") || base.contains("serial") {
        Integer
    } else if base.contains("dec") || base.contains("num") || base.contains("money") {
        Decimal
    } else if base.contains("float") || base.contains("double") || base.contains("real") {
        Float
    } else if base.contains("text") || base.contains("clob") {
        Text
    } else if base.contains("char") || base.contains("string") {
        Character
    } else if base.contains("date") || base.contains("time") || base == "year" {
        Temporal
    } else if base.contains("blob") || base.contains("binary") || base.contains("bytea") || base.contains("raw") {
        Binary
    } else {
        Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_aliases() {
        let int4 = POSTGRES_TYPES.iter().find(|t| t.matches("int4")).unwrap();
        assert_eq!(int4.name, "INTEGER");
        let double = POSTGRES_TYPES
            .iter()
            .find(|t| t.matches("double precision"))
            .unwrap();
        assert_eq!(double.name, "DOUBLE PRECISION");
    }

    #[test]
    fn test_render_parameters() {
        let decimal = MYSQL_TYPES.iter().find(|t| t.name == "DECIMAL").unwrap();
        assert_eq!(decimal.render(Some(20), Some(5)), "DECIMAL(20,5)");
        let varchar = MYSQL_TYPES.iter().find(|t| t.name == "VARCHAR").unwrap();
        assert_eq!(varchar.render(Some(20), None), "VARCHAR(20)");
        let text = MYSQL_TYPES.iter().find(|t| t.name == "TEXT").unwrap();
        assert_eq!(text.render(Some(20), None), "TEXT");
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("tinyint(1)"), Integer);
        assert_eq!(classify("money"), Decimal);
        assert_eq!(classify("nvarchar(max)"), Character);
        assert_eq!(classify("ntext"), Text);
        assert_eq!(classify("datetime2"), Temporal);
        assert_eq!(classify("image"), Other);
    }
}
