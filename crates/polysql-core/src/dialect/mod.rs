//! SQL dialect support.
//!
//! A dialect is a capability table plus a handful of behavioural hooks. The
//! table is data ([`CapabilityMatrix`]); the hooks live on [`DialectRules`],
//! implemented by one unit struct per engine. [`Dialect`] ties the rules to a
//! set of [`GeneratorOptions`] and the resolved type registry, and is the
//! value every generator routine reads from.

mod db2;
mod ibmi;
mod mariadb;
mod mssql;
mod mysql;
pub mod options;
mod postgres;
mod sqlite;
pub mod supports;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{LazyLock, Mutex};

use chrono::FixedOffset;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use db2::Db2Dialect;
pub use ibmi::IbmiDialect;
pub use mariadb::MariadbDialect;
pub use mssql::MssqlDialect;
pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;
pub use supports::CapabilityMatrix;

use crate::bind::BindStyle;
use crate::config::GeneratorOptions;
use crate::error::{Error, Result};
use crate::expr::JsonPathSegment;
use crate::filter::Op;
use crate::query::{
    IsolationLevel, QueryGenerator, RemoveIndexOptions, ShowConstraintsOptions, TruncateOptions,
};
use crate::schema::TableName;
use crate::types::{DataType, TypeDescriptor, TypeRegistry};
use crate::value::hex_upper;

static SAFE_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^[a-z_][a-z0-9_]*$").expect("valid identifier pattern")
});

/// The engines a [`Dialect`] can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    Postgres,
    Mysql,
    Mariadb,
    Sqlite,
    Mssql,
    Db2,
    Ibmi,
}

impl DialectKind {
    /// Every supported engine.
    pub const ALL: [Self; 7] = [
        Self::Postgres,
        Self::Mysql,
        Self::Mariadb,
        Self::Sqlite,
        Self::Mssql,
        Self::Db2,
        Self::Ibmi,
    ];

    /// Returns the behavioural rules for this engine.
    #[must_use]
    pub fn rules(self) -> &'static dyn DialectRules {
        match self {
            Self::Postgres => &PostgresDialect,
            Self::Mysql => &MysqlDialect,
            Self::Mariadb => &MariadbDialect,
            Self::Sqlite => &SqliteDialect,
            Self::Mssql => &MssqlDialect,
            Self::Db2 => &Db2Dialect,
            Self::Ibmi => &IbmiDialect,
        }
    }

    /// Whether this engine belongs to the MySQL family.
    #[must_use]
    pub const fn is_mysql_family(self) -> bool {
        matches!(self, Self::Mysql | Self::Mariadb)
    }

    /// Whether this engine belongs to the DB2 family.
    #[must_use]
    pub const fn is_db2_family(self) -> bool {
        matches!(self, Self::Db2 | Self::Ibmi)
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rules().name())
    }
}

impl FromStr for DialectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.rules().name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid(format!("unknown dialect {s:?}")))
    }
}

/// Opening and closing identifier delimiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiter {
    pub start: char,
    pub end: char,
}

impl Delimiter {
    pub const DOUBLE_QUOTE: Self = Self::symmetric('"');
    pub const BACKTICK: Self = Self::symmetric('`');
    pub const BRACKETS: Self = Self {
        start: '[',
        end: ']',
    };

    #[must_use]
    pub const fn symmetric(c: char) -> Self {
        Self { start: c, end: c }
    }
}

/// Standard SQL string literal: single quotes doubled.
pub(crate) fn quote_sql_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Renders a JSON path in the `$.key[0]` form used by `json_extract` and
/// `JSON_VALUE`.
pub(crate) fn json_path_string(path: &[JsonPathSegment]) -> String {
    path.iter().fold(String::from("$"), |mut out, segment| {
        match segment {
            JsonPathSegment::Index(index) => out.push_str(&format!("[{index}]")),
            JsonPathSegment::Key(key) if SAFE_IDENTIFIER.is_match(key) => {
                out.push('.');
                out.push_str(key);
            }
            JsonPathSegment::Key(key) => {
                out.push_str(&format!(".\"{}\"", key.replace('"', "\\\"")));
            }
        }
        out
    })
}

/// Appends the optional `AND col = 'value'` filters of a constraint listing.
pub(crate) fn constraint_filters(
    dialect: &Dialect,
    options: &ShowConstraintsOptions,
    column: &str,
    name: &str,
    kind: &str,
) -> String {
    let mut sql = String::new();
    if let Some(column_name) = &options.column_name {
        sql.push_str(&format!(" AND {column} = {}", dialect.escape_string(column_name)));
    }
    if let Some(constraint_name) = &options.constraint_name {
        sql.push_str(&format!(" AND {name} = {}", dialect.escape_string(constraint_name)));
    }
    if let Some(constraint_type) = options.constraint_type {
        sql.push_str(&format!(
            " AND {kind} = {}",
            dialect.escape_string(constraint_type.as_sql())
        ));
    }
    sql
}

/// How ALTER TABLE redefines or renames an existing column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlterColumnStyle {
    /// One `ALTER COLUMN` statement per property, `RENAME COLUMN` to rename.
    Piecewise,
    /// `CHANGE old new <definition>` restating the whole column.
    Change,
    /// `ALTER COLUMN c <type>` plus separate default and key clauses;
    /// renames go through `sp_rename`.
    AlterColumn,
    /// `ALTER COLUMN c SET DATA TYPE <type>` chained in one statement.
    SetDataType,
    /// Columns can be renamed but not redefined in place.
    RenameOnly,
}

/// Escapes each name and joins them for an `IN (...)` list.
pub(crate) fn escaped_list(dialect: &Dialect, names: &[&str]) -> String {
    names
        .iter()
        .map(|name| dialect.escape_string(name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Engine-specific behaviour.
///
/// Every method that has a sensible ANSI spelling provides it as a default;
/// engines override only what differs.
pub trait DialectRules: Send + Sync + fmt::Debug {
    /// Returns the lowercase engine name.
    fn name(&self) -> &'static str;

    /// Returns the capability table.
    fn supports(&self) -> &'static CapabilityMatrix;

    /// Returns the identifier delimiters.
    fn identifier_delimiter(&self) -> Delimiter {
        Delimiter::DOUBLE_QUOTE
    }

    /// Returns how bind parameters are spelled.
    fn bind_style(&self) -> BindStyle;

    /// Oldest server version this dialect generates SQL for.
    fn minimum_version(&self) -> &'static str;

    /// Schema assumed when a table names none.
    fn default_schema(&self) -> &'static str {
        ""
    }

    fn docs_url(&self) -> &'static str;

    /// Whether a backslash escapes the next character inside plain string
    /// literals.
    fn can_backslash_escape(&self) -> bool {
        false
    }

    /// Renders a string literal.
    fn escape_string(&self, value: &str) -> String {
        quote_sql_string(value)
    }

    /// Renders a binary literal.
    fn escape_buffer(&self, bytes: &[u8]) -> String {
        format!("X'{}'", hex_upper(bytes))
    }

    /// Data type descriptors replacing the base ones.
    fn type_overrides(&self) -> Vec<Box<dyn TypeDescriptor>> {
        Vec::new()
    }

    /// Overrides the default keyword of a WHERE operator.
    fn operator_keyword(&self, _op: Op) -> Option<&'static str> {
        None
    }

    /// Whether the engine has any spelling for `op`.
    fn supports_operator(&self, _op: Op) -> bool {
        true
    }

    /// Whether regular expression matches are written `REGEXP_LIKE(a, b)`
    /// instead of with an infix keyword.
    fn regexp_function(&self) -> bool {
        false
    }

    /// Whether `DROP SCHEMA` must end with `RESTRICT`.
    fn drop_schema_restrict(&self) -> bool {
        false
    }

    /// Renders a JSON path extraction over an already formatted expression.
    /// `None` means the engine has no JSON path syntax.
    fn json_path(
        &self,
        _dialect: &Dialect,
        _base: &str,
        _path: &[JsonPathSegment],
        _unquote: bool,
    ) -> Option<String> {
        None
    }

    fn create_savepoint(&self, quoted: &str) -> String {
        format!("SAVEPOINT {quoted}")
    }

    fn rollback_savepoint(&self, quoted: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT {quoted}")
    }

    /// `None` when savepoints cannot be released explicitly.
    fn release_savepoint(&self, quoted: &str) -> Option<String> {
        Some(format!("RELEASE SAVEPOINT {quoted}"))
    }

    fn set_isolation_level(&self, _dialect: &Dialect, level: IsolationLevel) -> Result<String> {
        Ok(format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql()))
    }

    /// Query listing the constraints of a table. `None` when the engine has
    /// no catalog for it.
    fn show_constraints_query(
        &self,
        _dialect: &Dialect,
        _table: &TableName,
        _options: &ShowConstraintsOptions,
    ) -> Option<String> {
        None
    }

    /// Whether the constraint listing can be narrowed by column, name or
    /// type.
    fn show_constraints_filters(&self) -> bool {
        true
    }

    /// Query returning the server version in a column named `version`.
    fn version_query(&self) -> &'static str {
        "SELECT VERSION() AS version"
    }

    /// Renames a table. Schemas only differ here when the caller asked to
    /// move the table.
    fn rename_table(
        &self,
        dialect: &Dialect,
        before: &TableName,
        after: &TableName,
    ) -> Result<String> {
        if before.schema != after.schema {
            return Err(dialect.unsupported("moving a table between schemas"));
        }
        let generator = dialect.query_generator();
        Ok(format!(
            "ALTER TABLE {} RENAME TO {}",
            generator.quote_table_name(before),
            generator.quote_table_name(after)
        ))
    }

    /// Statements emptying a table.
    fn truncate_table(
        &self,
        dialect: &Dialect,
        table: &TableName,
        _options: &TruncateOptions,
    ) -> Vec<String> {
        vec![format!(
            "TRUNCATE TABLE {}",
            dialect.query_generator().quote_table_name(table)
        )]
    }

    fn remove_index(
        &self,
        dialect: &Dialect,
        _table: &TableName,
        index: &str,
        options: &RemoveIndexOptions,
    ) -> String {
        let mut sql = String::from("DROP INDEX ");
        if options.if_exists {
            sql.push_str("IF EXISTS ");
        }
        sql.push_str(&dialect.quote_identifier(index));
        sql
    }

    /// Opening of a CREATE TABLE that leaves an existing table alone.
    fn create_table_prefix(&self, _dialect: &Dialect, quoted: &str) -> String {
        format!("CREATE TABLE IF NOT EXISTS {quoted}")
    }

    /// Opening of a DROP TABLE that tolerates a missing table.
    fn drop_table_prefix(&self, _dialect: &Dialect, quoted: &str) -> String {
        format!("DROP TABLE IF EXISTS {quoted}")
    }

    /// Keyword introducing a new column in ALTER TABLE.
    fn add_column_keyword(&self) -> &'static str {
        "ADD COLUMN"
    }

    /// Applies the engine's auto-increment spelling to a column type.
    fn auto_increment_column(&self, sql_type: &str) -> String {
        format!("{sql_type} AUTO_INCREMENT")
    }

    /// Whether the auto-increment spelling already declares the primary key.
    fn auto_increment_is_primary_key(&self) -> bool {
        false
    }

    /// Whether foreign keys are declared inline with `REFERENCES` rather than
    /// in a trailing `FOREIGN KEY` clause.
    fn inline_foreign_keys(&self) -> bool {
        true
    }

    /// Whether a row limit must come with an ORDER BY.
    fn limit_requires_order(&self) -> bool {
        false
    }

    /// Whether UPDATE and DELETE limits are written as `TOP(n)`.
    fn top_limit(&self) -> bool {
        false
    }

    /// Limit written before an OFFSET when no limit was asked for. `None`
    /// means OFFSET may stand alone.
    fn unbounded_limit(&self) -> Option<&'static str> {
        None
    }

    /// Most rows a single INSERT may carry.
    fn max_bulk_insert_rows(&self) -> Option<usize> {
        None
    }

    fn alter_column_style(&self) -> AlterColumnStyle {
        AlterColumnStyle::Piecewise
    }

    /// Query describing the columns of a table.
    fn describe_table_query(&self, dialect: &Dialect, table: &TableName) -> String {
        format!(
            "SHOW FULL COLUMNS FROM {}",
            dialect.query_generator().quote_table_name(table)
        )
    }

    /// Query listing the indexes of a table, one row per indexed column.
    fn show_indexes_query(&self, dialect: &Dialect, table: &TableName) -> String {
        format!(
            "SHOW INDEX FROM {}",
            dialect.query_generator().quote_table_name(table)
        )
    }

    /// Schemas owned by the engine itself. Listings leave them out.
    fn technical_schema_names(&self) -> &'static [&'static str] {
        &[]
    }

    /// Query listing base tables with `tableName` and `schema` columns,
    /// either within `schema` or across every user schema.
    fn list_tables_query(&self, dialect: &Dialect, schema: Option<&str>) -> String {
        let mut sql = format!(
            "SELECT TABLE_NAME AS {}, TABLE_SCHEMA AS {} FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_TYPE = 'BASE TABLE'",
            dialect.quote_identifier("tableName"),
            dialect.quote_identifier("schema")
        );
        match schema {
            Some(schema) => {
                sql.push_str(" AND TABLE_SCHEMA = ");
                sql.push_str(&dialect.escape_string(schema));
            }
            None if !self.technical_schema_names().is_empty() => {
                sql.push_str(&format!(
                    " AND TABLE_SCHEMA NOT IN ({})",
                    escaped_list(dialect, self.technical_schema_names())
                ));
            }
            None => {}
        }
        sql.push_str(" ORDER BY TABLE_SCHEMA, TABLE_NAME");
        sql
    }

    /// Query listing user schemas in a `schema` column, leaving out `skip`.
    /// `None` when the engine has no schema catalog.
    fn list_schemas_query(&self, _dialect: &Dialect, _skip: &[&str]) -> Option<String> {
        None
    }

    /// Query listing foreign keys for engines that keep them outside the
    /// constraint catalog.
    fn foreign_key_list_query(
        &self,
        _dialect: &Dialect,
        _table: &TableName,
        _column: Option<&str>,
    ) -> Option<String> {
        None
    }

    /// Query returning a row when the table exists.
    fn table_exists_query(&self, dialect: &Dialect, table: &TableName) -> String {
        let schema = table
            .schema
            .clone()
            .unwrap_or_else(|| dialect.default_schema().to_string());
        let mut sql = format!(
            "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_NAME = {}",
            dialect.escape_string(&table.table)
        );
        if !schema.is_empty() {
            sql.push_str(" AND TABLE_SCHEMA = ");
            sql.push_str(&dialect.escape_string(&schema));
        }
        sql
    }
}

/// A dialect bound to its options.
///
/// Built once and then only read. The single piece of interior state is the
/// set of warnings already emitted, which only ever grows.
#[derive(Debug)]
pub struct Dialect {
    kind: DialectKind,
    rules: &'static dyn DialectRules,
    options: GeneratorOptions,
    timezone: FixedOffset,
    types: TypeRegistry,
    printed_warnings: Mutex<HashSet<String>>,
}

impl Dialect {
    /// Creates a dialect with default options.
    ///
    /// # Errors
    ///
    /// Fails if the engine's type overrides conflict.
    pub fn new(kind: DialectKind) -> Result<Self> {
        Self::with_options(kind, GeneratorOptions::default())
    }

    /// Creates a dialect with the given options.
    ///
    /// # Errors
    ///
    /// Fails if the timezone is malformed or the type overrides conflict.
    pub fn with_options(kind: DialectKind, options: GeneratorOptions) -> Result<Self> {
        let rules = kind.rules();
        let timezone = options.timezone_offset()?;
        let types = TypeRegistry::build(rules.name(), rules.type_overrides())?;

        let dialect = Self {
            kind,
            rules,
            options,
            timezone,
            types,
            printed_warnings: Mutex::new(HashSet::new()),
        };
        dialect.check_version();
        Ok(dialect)
    }

    fn check_version(&self) {
        let Some(version) = self.options.database_version.as_deref() else {
            return;
        };
        let minimum = self.rules.minimum_version();
        if version_lt(version, minimum) {
            tracing::warn!(
                dialect = self.name(),
                version,
                minimum,
                "database version is below the minimum supported version, generated SQL may not work"
            );
        }
    }

    #[must_use]
    pub const fn kind(&self) -> DialectKind {
        self.kind
    }

    #[must_use]
    pub fn rules(&self) -> &'static dyn DialectRules {
        self.rules
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.rules.name()
    }

    #[must_use]
    pub fn supports(&self) -> &'static CapabilityMatrix {
        self.rules.supports()
    }

    #[must_use]
    pub const fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    #[must_use]
    pub const fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    #[must_use]
    pub const fn types(&self) -> &TypeRegistry {
        &self.types
    }

    #[must_use]
    pub fn identifier_delimiter(&self) -> Delimiter {
        self.rules.identifier_delimiter()
    }

    #[must_use]
    pub fn bind_style(&self) -> BindStyle {
        self.rules.bind_style()
    }

    #[must_use]
    pub fn minimum_version(&self) -> &'static str {
        self.rules.minimum_version()
    }

    #[must_use]
    pub fn docs_url(&self) -> &'static str {
        self.rules.docs_url()
    }

    /// Schema used when none is given, honouring the configured override.
    #[must_use]
    pub fn default_schema(&self) -> &str {
        self.options
            .default_schema
            .as_deref()
            .unwrap_or_else(|| self.rules.default_schema())
    }

    /// Quotes an identifier, doubling any embedded closing delimiter.
    ///
    /// With `quote_identifiers` off, plain lowercase identifiers are left
    /// bare.
    #[must_use]
    pub fn quote_identifier(&self, name: &str) -> String {
        if !self.options.quote_identifiers && SAFE_IDENTIFIER.is_match(name) {
            return name.to_string();
        }
        let Delimiter { start, end } = self.identifier_delimiter();
        let doubled = format!("{end}{end}");
        format!("{start}{}{end}", name.replace(end, &doubled))
    }

    #[must_use]
    pub fn escape_string(&self, value: &str) -> String {
        self.rules.escape_string(value)
    }

    #[must_use]
    pub fn escape_buffer(&self, bytes: &[u8]) -> String {
        self.rules.escape_buffer(bytes)
    }

    /// Renders a data type as column SQL.
    ///
    /// # Errors
    ///
    /// Fails when the type or one of its options is not supported.
    pub fn type_to_sql(&self, data_type: &DataType) -> Result<String> {
        self.types.descriptor(data_type).to_sql(data_type, self)
    }

    /// Emits `message` as a warning the first time it is seen.
    pub fn warn_once(&self, message: &str) {
        let mut printed = self
            .printed_warnings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if printed.insert(message.to_string()) {
            tracing::warn!(dialect = self.name(), "{message}");
        }
    }

    /// Returns the statement generator for this dialect.
    #[must_use]
    pub const fn query_generator(&self) -> QueryGenerator<'_> {
        QueryGenerator::new(self)
    }

    pub(crate) fn unsupported(&self, feature: impl Into<String>) -> Error {
        Error::unsupported(self.name(), feature)
    }
}

/// Compares dotted numeric versions. Non-numeric suffixes are ignored.
fn version_lt(version: &str, minimum: &str) -> bool {
    fn parts(v: &str) -> Vec<u64> {
        v.split('.')
            .map(|part| {
                part.chars()
                    .take_while(char::is_ascii_digit)
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    }
    let (mut a, mut b) = (parts(version), parts(minimum));
    let len = a.len().max(b.len());
    a.resize(len, 0);
    b.resize(len, 0);
    a < b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_names() {
        for kind in DialectKind::ALL {
            assert_eq!(kind.to_string().parse::<DialectKind>().unwrap(), kind);
        }
        assert!("oracle".parse::<DialectKind>().is_err());
    }

    #[test]
    fn test_quote_identifier_doubles_closing_delimiter() {
        let pg = Dialect::new(DialectKind::Postgres).unwrap();
        assert_eq!(pg.quote_identifier("users"), "\"users\"");
        assert_eq!(pg.quote_identifier("we\"ird"), "\"we\"\"ird\"");

        let mysql = Dialect::new(DialectKind::Mysql).unwrap();
        assert_eq!(mysql.quote_identifier("a`b"), "`a``b`");

        let mssql = Dialect::new(DialectKind::Mssql).unwrap();
        assert_eq!(mssql.quote_identifier("x]y"), "[x]]y]");
    }

    #[test]
    fn test_unquoted_identifiers_only_when_safe() {
        let pg = Dialect::with_options(
            DialectKind::Postgres,
            GeneratorOptions::new().quote_identifiers(false),
        )
        .unwrap();
        assert_eq!(pg.quote_identifier("users"), "users");
        assert_eq!(pg.quote_identifier("Users"), "\"Users\"");
        assert_eq!(pg.quote_identifier("user name"), "\"user name\"");
    }

    #[test]
    fn test_default_schema_override() {
        let pg = Dialect::new(DialectKind::Postgres).unwrap();
        assert_eq!(pg.default_schema(), "public");
        let custom = Dialect::with_options(
            DialectKind::Postgres,
            GeneratorOptions::new().default_schema("app"),
        )
        .unwrap();
        assert_eq!(custom.default_schema(), "app");
    }

    #[test]
    fn test_warn_once_deduplicates() {
        let dialect = Dialect::new(DialectKind::Sqlite).unwrap();
        dialect.warn_once("unsigned ignored");
        dialect.warn_once("unsigned ignored");
        assert_eq!(dialect.printed_warnings.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_version_comparison() {
        assert!(version_lt("8.0.18", "8.0.19"));
        assert!(!version_lt("8.0.19", "8.0.19"));
        assert!(!version_lt("11.2", "9.6"));
        assert!(version_lt("10", "10.0.1"));
    }

    #[test]
    fn test_json_path_string() {
        let path = [
            JsonPathSegment::Key("address".into()),
            JsonPathSegment::Index(2),
            JsonPathSegment::Key("Zip Code".into()),
        ];
        assert_eq!(json_path_string(&path), "$.address[2].\"Zip Code\"");
    }

    #[test]
    fn test_every_dialect_builds() {
        for kind in DialectKind::ALL {
            let dialect = Dialect::new(kind).unwrap();
            assert_eq!(dialect.kind(), kind);
            assert!(!dialect.docs_url().is_empty());
        }
    }
}
