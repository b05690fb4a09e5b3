//! MariaDB dialect.
//!
//! Behaves like MySQL except for `RETURNING` support and the version floor.

use super::mysql::{
    escape_mysql_string, mysql_json_path, mysql_list_schemas, mysql_operator, mysql_remove_index,
    mysql_rename_table, mysql_show_constraints, mysql_type_overrides,
};
use super::supports::ReturnValues;
use super::{AlterColumnStyle, CapabilityMatrix, Delimiter, Dialect, DialectRules};
use crate::bind::BindStyle;
use crate::error::Result;
use crate::expr::JsonPathSegment;
use crate::filter::Op;
use crate::query::{RemoveIndexOptions, ShowConstraintsOptions, TruncateOptions};
use crate::schema::TableName;
use crate::types::TypeDescriptor;

const SUPPORTS: CapabilityMatrix = CapabilityMatrix {
    returning: ReturnValues::Returning,
    ..super::mysql::SUPPORTS
};

const MARIADB_TECHNICAL_SCHEMAS: &[&str] = &[
    "MYSQL",
    "INFORMATION_SCHEMA",
    "PERFORMANCE_SCHEMA",
    "mysql",
    "information_schema",
    "performance_schema",
];

/// MariaDB 10.4 and later.
#[derive(Debug, Clone, Copy, Default)]
pub struct MariadbDialect;

impl MariadbDialect {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DialectRules for MariadbDialect {
    fn name(&self) -> &'static str {
        "mariadb"
    }

    fn supports(&self) -> &'static CapabilityMatrix {
        &SUPPORTS
    }

    fn identifier_delimiter(&self) -> Delimiter {
        Delimiter::BACKTICK
    }

    fn bind_style(&self) -> BindStyle {
        BindStyle::UnspecifiedOrdered { token: "?" }
    }

    fn minimum_version(&self) -> &'static str {
        "10.4.30"
    }

    fn docs_url(&self) -> &'static str {
        "https://mariadb.com/kb/en/"
    }

    fn can_backslash_escape(&self) -> bool {
        true
    }

    fn escape_string(&self, value: &str) -> String {
        escape_mysql_string(value)
    }

    fn type_overrides(&self) -> Vec<Box<dyn TypeDescriptor>> {
        mysql_type_overrides()
    }

    fn operator_keyword(&self, op: Op) -> Option<&'static str> {
        mysql_operator(op)
    }

    fn json_path(
        &self,
        dialect: &Dialect,
        base: &str,
        path: &[JsonPathSegment],
        unquote: bool,
    ) -> Option<String> {
        Some(mysql_json_path(base, path, unquote, dialect))
    }

    fn show_constraints_query(
        &self,
        dialect: &Dialect,
        table: &TableName,
        options: &ShowConstraintsOptions,
    ) -> Option<String> {
        Some(mysql_show_constraints(dialect, table, options))
    }

    fn version_query(&self) -> &'static str {
        "SELECT CAST(VERSION() AS CHAR) AS `version`"
    }

    fn rename_table(
        &self,
        dialect: &Dialect,
        before: &TableName,
        after: &TableName,
    ) -> Result<String> {
        Ok(mysql_rename_table(dialect, before, after))
    }

    fn truncate_table(
        &self,
        dialect: &Dialect,
        table: &TableName,
        _options: &TruncateOptions,
    ) -> Vec<String> {
        vec![format!("TRUNCATE {}", dialect.query_generator().quote_table_name(table))]
    }

    fn remove_index(
        &self,
        dialect: &Dialect,
        table: &TableName,
        index: &str,
        _options: &RemoveIndexOptions,
    ) -> String {
        mysql_remove_index(dialect, table, index)
    }

    fn inline_foreign_keys(&self) -> bool {
        false
    }

    fn alter_column_style(&self) -> AlterColumnStyle {
        AlterColumnStyle::Change
    }

    fn technical_schema_names(&self) -> &'static [&'static str] {
        MARIADB_TECHNICAL_SCHEMAS
    }

    fn list_schemas_query(&self, dialect: &Dialect, skip: &[&str]) -> Option<String> {
        Some(mysql_list_schemas(dialect, MARIADB_TECHNICAL_SCHEMAS, skip))
    }
}
