//! IBM Db2 for LUW dialect.
//!
//! IBM i shares the type spellings and operator handling defined here.

use super::supports::{
    AutoIncrementSupport, ConstraintSupport, IndexSupport, Pagination, RemoveIndexSupport,
};
use super::{escaped_list, AlterColumnStyle, CapabilityMatrix, Dialect, DialectRules};
use crate::bind::BindStyle;
use crate::error::Result;
use crate::filter::Op;
use crate::query::{ConstraintType, ShowConstraintsOptions, TruncateOptions};
use crate::schema::TableName;
use crate::types::base::{integer_options, integer_sql};
use crate::types::{DataType, DataTypeId, TextLength, TypeDescriptor, TypeOverride};
use crate::value::hex_upper;

const SUPPORTS: CapabilityMatrix = CapabilityMatrix {
    auto_increment: AutoIncrementSupport {
        identity_insert: false,
        default_value: false,
        update: false,
    },
    schemas: true,
    connection_transaction_methods: true,
    constraints: ConstraintSupport {
        on_update: false,
        ..CapabilityMatrix::BASE.constraints
    },
    index: IndexSupport {
        collate: false,
        using: false,
        include: true,
        ..CapabilityMatrix::BASE.index
    },
    remove_index: RemoveIndexSupport {
        concurrently: false,
        if_exists: false,
        cascade: false,
    },
    delete_limit: false,
    final_table: true,
    pagination: Pagination::OffsetFetch,
    ..CapabilityMatrix::BASE
};

/// Db2 11.1 and later.
#[derive(Debug, Clone, Copy, Default)]
pub struct Db2Dialect;

impl Db2Dialect {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn bit_data(name: &str, length: Option<u32>, binary: bool) -> String {
    let mut sql = format!("{name}({})", length.unwrap_or(255));
    if binary {
        sql.push_str(" FOR BIT DATA");
    }
    sql
}

fn string_sql(ty: &DataType, _dialect: &Dialect) -> Result<String> {
    Ok(match ty {
        DataType::Char { length, binary } => bit_data("CHAR", *length, *binary),
        DataType::String { length, binary } => bit_data("VARCHAR", *length, *binary),
        _ => bit_data("VARCHAR", None, false),
    })
}

fn text_sql(ty: &DataType, _dialect: &Dialect) -> Result<String> {
    Ok(match ty {
        DataType::Text {
            length: Some(TextLength::Tiny),
        } => String::from("VARCHAR(256)"),
        DataType::Text {
            length: Some(TextLength::Medium),
        } => String::from("VARCHAR(8192)"),
        DataType::Text {
            length: Some(TextLength::Long),
        } => String::from("CLOB(65536)"),
        _ => String::from("VARCHAR(32672)"),
    })
}

fn blob_sql(ty: &DataType, _dialect: &Dialect) -> Result<String> {
    Ok(match ty {
        DataType::Blob {
            length: Some(TextLength::Tiny),
        } => String::from("BLOB(255)"),
        DataType::Blob {
            length: Some(TextLength::Medium),
        } => String::from("BLOB(16M)"),
        DataType::Blob {
            length: Some(TextLength::Long),
        } => String::from("BLOB(2G)"),
        _ => String::from("BLOB(1M)"),
    })
}

fn timestamp_sql(ty: &DataType, _dialect: &Dialect) -> Result<String> {
    Ok(match ty {
        DataType::Date {
            precision: Some(p),
        } => format!("TIMESTAMP({p})"),
        _ => String::from("TIMESTAMP"),
    })
}

/// Type spellings shared by the Db2 family.
pub(super) fn db2_type_overrides() -> Vec<Box<dyn TypeDescriptor>> {
    vec![
        TypeOverride::sql(DataTypeId::TinyInt, |ty, d| {
            integer_sql("SMALLINT", integer_options(ty), d)
        })
        .boxed(),
        TypeOverride::sql(DataTypeId::MediumInt, |ty, d| {
            integer_sql("INTEGER", integer_options(ty), d)
        })
        .boxed(),
        TypeOverride::sql(DataTypeId::String, string_sql)
            .with_names(&["varchar"])
            .boxed(),
        TypeOverride::sql(DataTypeId::Char, string_sql).boxed(),
        TypeOverride::sql(DataTypeId::Text, text_sql)
            .with_names(&["clob"])
            .boxed(),
        TypeOverride::sql(DataTypeId::Blob, blob_sql).boxed(),
        TypeOverride::sql(DataTypeId::Date, timestamp_sql)
            .with_names(&["timestamp"])
            .boxed(),
        TypeOverride::sql(DataTypeId::Uuid, |_, _| {
            Ok(String::from("CHAR(36) FOR BIT DATA"))
        })
        .boxed(),
    ]
}

pub(super) const fn db2_operator(op: Op) -> Option<&'static str> {
    match op {
        Op::Regexp | Op::IRegexp => Some("REGEXP_LIKE"),
        Op::NotRegexp | Op::NotIRegexp => Some("NOT REGEXP_LIKE"),
        _ => None,
    }
}

/// Db2 has no case-insensitive LIKE.
pub(super) const fn db2_supports_operator(op: Op) -> bool {
    !matches!(op, Op::ILike | Op::NotILike)
}

pub(super) fn db2_escape_buffer(bytes: &[u8]) -> String {
    format!("BX'{}'", hex_upper(bytes))
}

pub(super) fn db2_auto_increment(sql_type: &str) -> String {
    format!("{sql_type} GENERATED BY DEFAULT AS IDENTITY(START WITH 1, INCREMENT BY 1)")
}

/// `RENAME TABLE`, which cannot move a table between schemas.
pub(super) fn db2_rename_table(
    dialect: &Dialect,
    before: &TableName,
    after: &TableName,
) -> Result<String> {
    if before.schema != after.schema {
        return Err(dialect.unsupported("moving a table between schemas"));
    }
    Ok(format!(
        "RENAME TABLE {} TO {}",
        dialect.query_generator().quote_table_name(before),
        dialect.quote_identifier(&after.table)
    ))
}

pub(super) fn db2_truncate(dialect: &Dialect, table: &TableName) -> Vec<String> {
    vec![format!(
        "TRUNCATE TABLE {} IMMEDIATE",
        dialect.query_generator().quote_table_name(table)
    )]
}

/// The table's schema as a literal, or the session schema.
pub(super) fn schema_or_current(dialect: &Dialect, table: &TableName) -> String {
    table
        .schema
        .as_deref()
        .map_or_else(|| String::from("CURRENT SCHEMA"), |schema| dialect.escape_string(schema))
}

const fn constraint_type_code(kind: ConstraintType) -> &'static str {
    match kind {
        ConstraintType::PrimaryKey => "P",
        ConstraintType::ForeignKey => "F",
        ConstraintType::Check => "K",
        ConstraintType::Unique => "U",
        ConstraintType::Default => "D",
    }
}

impl DialectRules for Db2Dialect {
    fn name(&self) -> &'static str {
        "db2"
    }

    fn supports(&self) -> &'static CapabilityMatrix {
        &SUPPORTS
    }

    fn bind_style(&self) -> BindStyle {
        BindStyle::UnspecifiedOrdered { token: "?" }
    }

    fn minimum_version(&self) -> &'static str {
        "11.1.0"
    }

    fn docs_url(&self) -> &'static str {
        "https://www.ibm.com/docs/en/db2/11.5"
    }

    fn escape_buffer(&self, bytes: &[u8]) -> String {
        db2_escape_buffer(bytes)
    }

    fn type_overrides(&self) -> Vec<Box<dyn TypeDescriptor>> {
        db2_type_overrides()
    }

    fn operator_keyword(&self, op: Op) -> Option<&'static str> {
        db2_operator(op)
    }

    fn supports_operator(&self, op: Op) -> bool {
        db2_supports_operator(op)
    }

    fn regexp_function(&self) -> bool {
        true
    }

    fn drop_schema_restrict(&self) -> bool {
        true
    }

    fn show_constraints_query(
        &self,
        dialect: &Dialect,
        table: &TableName,
        options: &ShowConstraintsOptions,
    ) -> Option<String> {
        let mut sql = format!(
            "SELECT TRIM(c.TABSCHEMA) AS \"constraintSchema\", c.CONSTNAME AS \"constraintName\", \
             CASE c.TYPE WHEN 'P' THEN 'PRIMARY KEY' WHEN 'F' THEN 'FOREIGN KEY' WHEN 'K' THEN 'CHECK' WHEN 'U' THEN 'UNIQUE' ELSE NULL END AS \"constraintType\", \
             TRIM(c.TABSCHEMA) AS \"tableSchema\", c.TABNAME AS \"tableName\", k.COLNAME AS \"columnNames\", \
             TRIM(r.REFTABSCHEMA) AS \"referencedTableSchema\", r.REFTABNAME AS \"referencedTableName\", fk.COLNAME AS \"referencedColumnNames\", \
             CASE r.DELETERULE WHEN 'A' THEN 'NO ACTION' WHEN 'C' THEN 'CASCADE' WHEN 'N' THEN 'SET NULL' WHEN 'R' THEN 'RESTRICT' ELSE NULL END AS \"deleteAction\", \
             CASE r.UPDATERULE WHEN 'A' THEN 'NO ACTION' WHEN 'R' THEN 'RESTRICT' ELSE NULL END AS \"updateAction\", \
             ck.TEXT AS \"definition\" \
             FROM SYSCAT.TABCONST c \
             LEFT JOIN SYSCAT.REFERENCES r ON c.CONSTNAME = r.CONSTNAME AND c.TABNAME = r.TABNAME AND c.TABSCHEMA = r.TABSCHEMA \
             LEFT JOIN SYSCAT.KEYCOLUSE k ON c.CONSTNAME = k.CONSTNAME AND c.TABNAME = k.TABNAME AND c.TABSCHEMA = k.TABSCHEMA \
             LEFT JOIN SYSCAT.KEYCOLUSE fk ON r.REFKEYNAME = fk.CONSTNAME \
             LEFT JOIN SYSCAT.CHECKS ck ON c.CONSTNAME = ck.CONSTNAME AND c.TABNAME = ck.TABNAME AND c.TABSCHEMA = ck.TABSCHEMA \
             WHERE c.TABNAME = {} AND c.TABSCHEMA = {}",
            dialect.escape_string(&table.table),
            schema_or_current(dialect, table)
        );
        if let Some(column) = &options.column_name {
            sql.push_str(&format!(" AND k.COLNAME = {}", dialect.escape_string(column)));
        }
        if let Some(name) = &options.constraint_name {
            sql.push_str(&format!(" AND c.CONSTNAME = {}", dialect.escape_string(name)));
        }
        if let Some(kind) = options.constraint_type {
            sql.push_str(&format!(
                " AND c.TYPE = {}",
                dialect.escape_string(constraint_type_code(kind))
            ));
        }
        sql.push_str(" ORDER BY c.CONSTNAME, k.COLSEQ, fk.COLSEQ");
        Some(sql)
    }

    fn version_query(&self) -> &'static str {
        "select service_level as \"version\" from TABLE (sysproc.env_get_inst_info()) as A"
    }

    fn rename_table(
        &self,
        dialect: &Dialect,
        before: &TableName,
        after: &TableName,
    ) -> Result<String> {
        db2_rename_table(dialect, before, after)
    }

    fn truncate_table(
        &self,
        dialect: &Dialect,
        table: &TableName,
        _options: &TruncateOptions,
    ) -> Vec<String> {
        db2_truncate(dialect, table)
    }

    fn create_table_prefix(&self, _dialect: &Dialect, quoted: &str) -> String {
        format!("CREATE TABLE {quoted}")
    }

    fn drop_table_prefix(&self, _dialect: &Dialect, quoted: &str) -> String {
        format!("DROP TABLE {quoted}")
    }

    fn auto_increment_column(&self, sql_type: &str) -> String {
        db2_auto_increment(sql_type)
    }

    fn inline_foreign_keys(&self) -> bool {
        false
    }

    fn table_exists_query(&self, dialect: &Dialect, table: &TableName) -> String {
        format!(
            "SELECT TABNAME FROM SYSCAT.TABLES WHERE TABNAME = {} AND TABSCHEMA = {}",
            dialect.escape_string(&table.table),
            schema_or_current(dialect, table)
        )
    }

    fn alter_column_style(&self) -> AlterColumnStyle {
        AlterColumnStyle::SetDataType
    }

    fn describe_table_query(&self, dialect: &Dialect, table: &TableName) -> String {
        format!(
            "SELECT COLNAME AS \"Name\", TABNAME AS \"Table\", TABSCHEMA AS \"Schema\", \
             TYPENAME AS \"Type\", LENGTH AS \"Length\", SCALE AS \"Scale\", NULLS AS \"IsNull\", \
             DEFAULT AS \"Default\", COLNO AS \"Colno\", IDENTITY AS \"IsIdentity\", \
             KEYSEQ AS \"KeySeq\", REMARKS AS \"Comment\" FROM SYSCAT.COLUMNS \
             WHERE TABNAME = {} AND TABSCHEMA = {}",
            dialect.escape_string(&table.table),
            schema_or_current(dialect, table)
        )
    }

    fn show_indexes_query(&self, dialect: &Dialect, table: &TableName) -> String {
        format!(
            "SELECT i.INDNAME AS \"name\", i.TABNAME AS \"tableName\", i.UNIQUERULE AS \"keyType\", \
             i.INDEXTYPE AS \"type\", c.COLNAME AS \"columnName\", c.COLORDER AS \"columnOrder\" \
             FROM SYSCAT.INDEXES i \
             INNER JOIN SYSCAT.INDEXCOLUSE c ON i.INDNAME = c.INDNAME AND i.INDSCHEMA = c.INDSCHEMA \
             WHERE i.TABNAME = {} AND i.TABSCHEMA = {} ORDER BY i.INDNAME, c.COLSEQ",
            dialect.escape_string(&table.table),
            schema_or_current(dialect, table)
        )
    }

    fn technical_schema_names(&self) -> &'static [&'static str] {
        &["ERRORSCHEMA", "NULLID", "SQLJ"]
    }

    fn list_tables_query(&self, dialect: &Dialect, schema: Option<&str>) -> String {
        let filter = schema.map_or_else(
            || {
                format!(
                    "TABSCHEMA NOT LIKE 'SYS%' AND TABSCHEMA NOT IN ({})",
                    escaped_list(dialect, self.technical_schema_names())
                )
            },
            |schema| format!("TABSCHEMA = {}", dialect.escape_string(schema)),
        );
        format!(
            "SELECT TABNAME AS \"tableName\", TRIM(TABSCHEMA) AS \"schema\" \
             FROM SYSCAT.TABLES WHERE TYPE = 'T' AND {filter} ORDER BY TABSCHEMA, TABNAME"
        )
    }

    fn list_schemas_query(&self, dialect: &Dialect, skip: &[&str]) -> Option<String> {
        let skipped: Vec<&str> = self
            .technical_schema_names()
            .iter()
            .chain(skip)
            .copied()
            .collect();
        Some(format!(
            "SELECT SCHEMANAME AS \"schema\" FROM SYSCAT.SCHEMATA \
             WHERE SCHEMANAME NOT LIKE 'SYS%' AND SCHEMANAME NOT IN ({})",
            escaped_list(dialect, &skipped)
        ))
    }
}
