//! MySQL dialect.
//!
//! MariaDB shares nearly everything here; the helpers below are reused by
//! [`MariadbDialect`](super::MariadbDialect).

use super::supports::{
    CreateSchemaSupport, CreateTableSupport, DataTypeSupport, DecimalSupport,
    IndexSupport, InsertSupport, IntSupport, Pagination, RemoveOptionsSupport, RenameTableSupport,
    StartTransactionSupport,
};
use super::{
    constraint_filters, escaped_list, json_path_string, AlterColumnStyle, CapabilityMatrix,
    Delimiter, Dialect, DialectRules,
};
use crate::bind::BindStyle;
use crate::error::Result;
use crate::expr::JsonPathSegment;
use crate::filter::Op;
use crate::query::{RemoveIndexOptions, ShowConstraintsOptions, TruncateOptions};
use crate::schema::TableName;
use crate::types::base::format_timestamp;
use crate::types::{DataType, DataTypeId, TypeDescriptor, TypeOverride};
use crate::value::SqlValue;

const MYSQL_DECIMAL: DecimalSupport = DecimalSupport {
    nan: false,
    infinity: false,
    zerofill: true,
    unsigned: true,
    scale_and_precision: true,
};

pub(super) const SUPPORTS: CapabilityMatrix = CapabilityMatrix {
    values_empty_parens: true,
    schemas: true,
    start_transaction: StartTransactionSupport {
        read_only: true,
        ..CapabilityMatrix::BASE.start_transaction
    },
    inserts: InsertSupport {
        ignore_duplicates: Some(" IGNORE"),
        update_on_duplicate: Some(" ON DUPLICATE KEY UPDATE"),
        on_conflict_do_nothing: None,
        on_conflict_where: false,
        conflict_fields: false,
    },
    index: IndexSupport {
        collate: false,
        length: true,
        parser: true,
        index_type: true,
        using: true,
        function_based: true,
        ..CapabilityMatrix::BASE.index
    },
    data_types: DataTypeSupport {
        ints: IntSupport {
            zerofill: true,
            unsigned: true,
            length: true,
        },
        float: MYSQL_DECIMAL,
        real: MYSQL_DECIMAL,
        double: MYSQL_DECIMAL,
        decimal: MYSQL_DECIMAL,
        json: true,
        enums: true,
        time_precision: true,
        ..CapabilityMatrix::BASE.data_types
    },
    json_operations: true,
    rename_table: RenameTableSupport {
        change_schema: true,
    },
    create_schema: CreateSchemaSupport {
        charset: true,
        collate: true,
        if_not_exists: true,
        ..CapabilityMatrix::BASE.create_schema
    },
    drop_schema: RemoveOptionsSupport {
        cascade: false,
        if_exists: true,
    },
    create_table: CreateTableSupport {
        collate: true,
        charset: true,
        engine: true,
        row_format: true,
        comment: true,
        initial_auto_increment: true,
        unique_keys: true,
    },
    limit_on_update: true,
    index_hints: true,
    pagination: Pagination::LimitCommaOffset,
    ..CapabilityMatrix::BASE
};

/// MySQL 8.0 and later.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Backslash escaping, as the server applies it to string literals.
pub(super) fn escape_mysql_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\u{8}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{1a}' => out.push_str("\\Z"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

fn datetime_bindable(_ty: &DataType, value: &SqlValue, dialect: &Dialect) -> Result<SqlValue> {
    format_timestamp(value, dialect, false)
}

pub(super) fn mysql_type_overrides() -> Vec<Box<dyn TypeDescriptor>> {
    vec![
        TypeOverride::sql(DataTypeId::Boolean, |_, _| Ok(String::from("TINYINT(1)")))
            .with_names(&["tinyint(1)", "boolean", "bool"])
            .boxed(),
        TypeOverride::new(DataTypeId::Date)
            .with_bindable(datetime_bindable)
            .with_names(&["datetime", "timestamp"])
            .boxed(),
        TypeOverride::sql(DataTypeId::Uuid, |_, _| Ok(String::from("CHAR(36) BINARY"))).boxed(),
    ]
}

pub(super) const fn mysql_operator(op: Op) -> Option<&'static str> {
    match op {
        Op::Regexp | Op::IRegexp => Some("REGEXP"),
        Op::NotRegexp | Op::NotIRegexp => Some("NOT REGEXP"),
        Op::ILike => Some("LIKE"),
        Op::NotILike => Some("NOT LIKE"),
        _ => None,
    }
}

pub(super) fn mysql_json_path(
    base: &str,
    path: &[JsonPathSegment],
    unquote: bool,
    dialect: &Dialect,
) -> String {
    let extracted = format!(
        "json_extract({base},{})",
        dialect.escape_string(&json_path_string(path))
    );
    if unquote {
        format!("json_unquote({extracted})")
    } else {
        extracted
    }
}

pub(super) fn mysql_show_constraints(
    dialect: &Dialect,
    table: &TableName,
    options: &ShowConstraintsOptions,
) -> String {
    let schema = table.schema.as_deref().map_or_else(
        || String::from("DATABASE()"),
        |schema| dialect.escape_string(schema),
    );
    format!(
        "SELECT c.CONSTRAINT_SCHEMA AS constraintSchema, \
         c.CONSTRAINT_NAME AS constraintName, \
         c.CONSTRAINT_TYPE AS constraintType, \
         c.TABLE_SCHEMA AS tableSchema, \
         c.TABLE_NAME AS tableName, \
         kcu.COLUMN_NAME AS columnNames, \
         kcu.REFERENCED_TABLE_SCHEMA AS referencedTableSchema, \
         kcu.REFERENCED_TABLE_NAME AS referencedTableName, \
         kcu.REFERENCED_COLUMN_NAME AS referencedColumnNames, \
         r.DELETE_RULE AS deleteAction, \
         r.UPDATE_RULE AS updateAction, \
         ch.CHECK_CLAUSE AS definition \
         FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS c \
         LEFT JOIN INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS r ON c.CONSTRAINT_CATALOG = r.CONSTRAINT_CATALOG AND c.CONSTRAINT_SCHEMA = r.CONSTRAINT_SCHEMA AND c.CONSTRAINT_NAME = r.CONSTRAINT_NAME AND c.TABLE_NAME = r.TABLE_NAME \
         LEFT JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu ON c.CONSTRAINT_CATALOG = kcu.CONSTRAINT_CATALOG AND c.CONSTRAINT_SCHEMA = kcu.CONSTRAINT_SCHEMA AND c.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME AND c.TABLE_NAME = kcu.TABLE_NAME \
         LEFT JOIN INFORMATION_SCHEMA.CHECK_CONSTRAINTS ch ON c.CONSTRAINT_CATALOG = ch.CONSTRAINT_CATALOG AND c.CONSTRAINT_SCHEMA = ch.CONSTRAINT_SCHEMA AND c.CONSTRAINT_NAME = ch.CONSTRAINT_NAME \
         WHERE c.TABLE_NAME = {} AND c.TABLE_SCHEMA = {schema}{} \
         ORDER BY c.CONSTRAINT_NAME, kcu.ORDINAL_POSITION",
        dialect.escape_string(&table.table),
        constraint_filters(
            dialect,
            options,
            "kcu.COLUMN_NAME",
            "c.CONSTRAINT_NAME",
            "c.CONSTRAINT_TYPE",
        ),
    )
}

const MYSQL_TECHNICAL_SCHEMAS: &[&str] = &[
    "MYSQL",
    "INFORMATION_SCHEMA",
    "PERFORMANCE_SCHEMA",
    "SYS",
    "mysql",
    "information_schema",
    "performance_schema",
    "sys",
];

pub(super) fn mysql_list_schemas(dialect: &Dialect, technical: &[&str], skip: &[&str]) -> String {
    let skipped: Vec<&str> = technical.iter().chain(skip).copied().collect();
    format!(
        "SELECT SCHEMA_NAME AS `schema` FROM INFORMATION_SCHEMA.SCHEMATA WHERE SCHEMA_NAME NOT IN ({})",
        escaped_list(dialect, &skipped)
    )
}

pub(super) fn mysql_rename_table(
    dialect: &Dialect,
    before: &TableName,
    after: &TableName,
) -> String {
    let generator = dialect.query_generator();
    format!(
        "RENAME TABLE {} TO {}",
        generator.quote_table_name(before),
        generator.quote_table_name(after)
    )
}

pub(super) fn mysql_remove_index(dialect: &Dialect, table: &TableName, index: &str) -> String {
    format!(
        "DROP INDEX {} ON {}",
        dialect.quote_identifier(index),
        dialect.query_generator().quote_table_name(table)
    )
}

impl DialectRules for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
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
        "8.0.19"
    }

    fn docs_url(&self) -> &'static str {
        "https://dev.mysql.com/doc/refman/8.0/en/"
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
        MYSQL_TECHNICAL_SCHEMAS
    }

    fn list_schemas_query(&self, dialect: &Dialect, skip: &[&str]) -> Option<String> {
        Some(mysql_list_schemas(dialect, MYSQL_TECHNICAL_SCHEMAS, skip))
    }
}
