//! IBM i (Db2 for i) dialect.

use super::db2::{
    db2_auto_increment, db2_escape_buffer, db2_operator, db2_rename_table, db2_supports_operator,
    db2_truncate, db2_type_overrides, schema_or_current,
};
use super::supports::{
    AutoIncrementSupport, ConstraintSupport, DataTypeSupport, IndexSupport, Pagination,
    RemoveIndexSupport,
};
use super::{escaped_list, AlterColumnStyle, CapabilityMatrix, Dialect, DialectRules};
use crate::bind::BindStyle;
use crate::error::Result;
use crate::filter::Op;
use crate::query::{RemoveIndexOptions, ShowConstraintsOptions, TruncateOptions};
use crate::schema::TableName;
use crate::types::base::parse_boolean;
use crate::types::{DataType, DataTypeId, TypeDescriptor, TypeOverride};
use crate::value::SqlValue;

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
        where_clause: true,
        include: true,
        ..CapabilityMatrix::BASE.index
    },
    remove_index: RemoveIndexSupport {
        concurrently: false,
        if_exists: true,
        cascade: false,
    },
    data_types: DataTypeSupport {
        blob_as_text: true,
        ..CapabilityMatrix::BASE.data_types
    },
    delete_limit: false,
    pagination: Pagination::FetchFirst,
    ..CapabilityMatrix::BASE
};

/// IBM i 7.3 and later.
#[derive(Debug, Clone, Copy, Default)]
pub struct IbmiDialect;

impl IbmiDialect {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn small_bool(_ty: &DataType, value: &SqlValue, _dialect: &Dialect) -> Result<SqlValue> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }
    Ok(SqlValue::Int(i64::from(parse_boolean(value)?)))
}

impl DialectRules for IbmiDialect {
    fn name(&self) -> &'static str {
        "ibmi"
    }

    fn supports(&self) -> &'static CapabilityMatrix {
        &SUPPORTS
    }

    fn bind_style(&self) -> BindStyle {
        BindStyle::UnspecifiedOrdered { token: "?" }
    }

    fn minimum_version(&self) -> &'static str {
        "7.3.0"
    }

    fn docs_url(&self) -> &'static str {
        "https://www.ibm.com/docs/en/i/7.5"
    }

    fn escape_buffer(&self, bytes: &[u8]) -> String {
        db2_escape_buffer(bytes)
    }

    fn type_overrides(&self) -> Vec<Box<dyn TypeDescriptor>> {
        let mut overrides = db2_type_overrides();
        overrides.push(
            TypeOverride::sql(DataTypeId::Boolean, |_, _| Ok(String::from("SMALLINT")))
                .with_bindable(small_bool)
                .boxed(),
        );
        overrides
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

    fn create_savepoint(&self, quoted: &str) -> String {
        format!("SAVEPOINT {quoted} ON ROLLBACK RETAIN CURSORS")
    }

    fn show_constraints_query(
        &self,
        dialect: &Dialect,
        table: &TableName,
        options: &ShowConstraintsOptions,
    ) -> Option<String> {
        let mut sql = format!(
            "SELECT c.CONSTRAINT_SCHEMA AS \"constraintSchema\", c.CONSTRAINT_NAME AS \"constraintName\", \
             c.CONSTRAINT_TYPE AS \"constraintType\", c.TABLE_SCHEMA AS \"tableSchema\", c.TABLE_NAME AS \"tableName\", \
             k.COLUMN_NAME AS \"columnNames\", fk.TABLE_SCHEMA AS \"referencedTableSchema\", fk.TABLE_NAME AS \"referencedTableName\", \
             fk.COLUMN_NAME AS \"referencedColumnNames\", r.DELETE_RULE AS \"deleteRule\", r.UPDATE_RULE AS \"updateRule\", \
             ch.CHECK_CLAUSE AS \"definition\", c.IS_DEFERRABLE AS \"isDeferrable\", c.INITIALLY_DEFERRED AS \"initiallyDeferred\" \
             FROM QSYS2.SYSCST c \
             LEFT JOIN QSYS2.SYSREFCST r ON c.CONSTRAINT_NAME = r.CONSTRAINT_NAME AND c.CONSTRAINT_SCHEMA = r.CONSTRAINT_SCHEMA \
             LEFT JOIN QSYS2.SYSKEYCST k ON c.CONSTRAINT_NAME = k.CONSTRAINT_NAME AND c.CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA \
             LEFT JOIN QSYS2.SYSKEYCST fk ON r.UNIQUE_CONSTRAINT_NAME = k.CONSTRAINT_NAME AND r.UNIQUE_CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA \
             LEFT JOIN QSYS2.SYSCHKCST ch ON c.CONSTRAINT_NAME = ch.CONSTRAINT_NAME AND c.CONSTRAINT_SCHEMA = ch.CONSTRAINT_SCHEMA \
             WHERE c.TABLE_NAME = {} AND c.TABLE_SCHEMA = {}",
            dialect.escape_string(&table.table),
            schema_or_current(dialect, table)
        );
        sql.push_str(&super::constraint_filters(
            dialect,
            options,
            "k.COLUMN_NAME",
            "c.CONSTRAINT_NAME",
            "c.CONSTRAINT_TYPE",
        ));
        sql.push_str(" ORDER BY c.CONSTRAINT_NAME, k.ORDINAL_POSITION, fk.ORDINAL_POSITION");
        Some(sql)
    }

    fn version_query(&self) -> &'static str {
        "SELECT CONCAT(OS_VERSION, CONCAT('.', OS_RELEASE)) AS \"version\" FROM SYSIBMADM.ENV_SYS_INFO"
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

    fn remove_index(
        &self,
        dialect: &Dialect,
        _table: &TableName,
        index: &str,
        options: &RemoveIndexOptions,
    ) -> String {
        let quoted = dialect.quote_identifier(index);
        if options.if_exists {
            format!(
                "BEGIN IF EXISTS (SELECT * FROM QSYS2.SYSINDEXES WHERE INDEX_NAME = {quoted}) THEN DROP INDEX {quoted}; COMMIT; END IF; END"
            )
        } else {
            format!("BEGIN DROP INDEX {quoted}; COMMIT; END")
        }
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
            "SELECT TABLE_NAME FROM QSYS2.SYSTABLES WHERE TABLE_NAME = {} AND TABLE_SCHEMA = {}",
            dialect.escape_string(&table.table),
            schema_or_current(dialect, table)
        )
    }

    fn alter_column_style(&self) -> AlterColumnStyle {
        AlterColumnStyle::SetDataType
    }

    fn describe_table_query(&self, dialect: &Dialect, table: &TableName) -> String {
        format!(
            "SELECT QSYS2.SYSCOLUMNS.*, QSYS2.SYSCST.CONSTRAINT_NAME, QSYS2.SYSCST.CONSTRAINT_TYPE \
             FROM QSYS2.SYSCOLUMNS LEFT OUTER JOIN QSYS2.SYSCSTCOL \
             ON QSYS2.SYSCOLUMNS.TABLE_SCHEMA = QSYS2.SYSCSTCOL.TABLE_SCHEMA \
             AND QSYS2.SYSCOLUMNS.TABLE_NAME = QSYS2.SYSCSTCOL.TABLE_NAME \
             AND QSYS2.SYSCOLUMNS.COLUMN_NAME = QSYS2.SYSCSTCOL.COLUMN_NAME \
             LEFT JOIN QSYS2.SYSCST ON QSYS2.SYSCSTCOL.CONSTRAINT_NAME = QSYS2.SYSCST.CONSTRAINT_NAME \
             WHERE QSYS2.SYSCOLUMNS.TABLE_SCHEMA = {} AND QSYS2.SYSCOLUMNS.TABLE_NAME = {}",
            schema_or_current(dialect, table),
            dialect.escape_string(&table.table)
        )
    }

    fn show_indexes_query(&self, dialect: &Dialect, table: &TableName) -> String {
        let schema = schema_or_current(dialect, table);
        let name = dialect.escape_string(&table.table);
        format!(
            "SELECT QSYS2.SYSCSTCOL.CONSTRAINT_NAME AS NAME, QSYS2.SYSCSTCOL.COLUMN_NAME, \
             QSYS2.SYSCST.CONSTRAINT_TYPE, QSYS2.SYSCST.TABLE_SCHEMA, QSYS2.SYSCST.TABLE_NAME \
             FROM QSYS2.SYSCSTCOL LEFT OUTER JOIN QSYS2.SYSCST \
             ON QSYS2.SYSCSTCOL.TABLE_SCHEMA = QSYS2.SYSCST.TABLE_SCHEMA \
             AND QSYS2.SYSCSTCOL.TABLE_NAME = QSYS2.SYSCST.TABLE_NAME \
             AND QSYS2.SYSCSTCOL.CONSTRAINT_NAME = QSYS2.SYSCST.CONSTRAINT_NAME \
             WHERE QSYS2.SYSCSTCOL.TABLE_SCHEMA = {schema} AND QSYS2.SYSCSTCOL.TABLE_NAME = {name} \
             UNION SELECT QSYS2.SYSKEYS.INDEX_NAME AS NAME, QSYS2.SYSKEYS.COLUMN_NAME, \
             CAST('INDEX' AS VARCHAR(11)), QSYS2.SYSINDEXES.TABLE_SCHEMA, QSYS2.SYSINDEXES.TABLE_NAME \
             FROM QSYS2.SYSKEYS LEFT OUTER JOIN QSYS2.SYSINDEXES \
             ON QSYS2.SYSKEYS.INDEX_NAME = QSYS2.SYSINDEXES.INDEX_NAME \
             WHERE QSYS2.SYSINDEXES.TABLE_SCHEMA = {schema} AND QSYS2.SYSINDEXES.TABLE_NAME = {name}"
        )
    }

    fn list_tables_query(&self, dialect: &Dialect, schema: Option<&str>) -> String {
        let filter = schema.map_or_else(
            || String::from("TABLE_SCHEMA NOT LIKE 'Q%' AND TABLE_SCHEMA NOT LIKE 'SYS%'"),
            |schema| format!("TABLE_SCHEMA = {}", dialect.escape_string(schema)),
        );
        format!(
            "SELECT TABLE_NAME AS \"tableName\", TABLE_SCHEMA AS \"schema\" \
             FROM QSYS2.SYSTABLES WHERE TABLE_TYPE = 'T' AND {filter} \
             ORDER BY TABLE_SCHEMA, TABLE_NAME"
        )
    }

    fn list_schemas_query(&self, dialect: &Dialect, skip: &[&str]) -> Option<String> {
        let mut sql = String::from(
            "SELECT DISTINCT SCHEMA_NAME AS \"schema\" FROM QSYS2.SYSSCHEMAAUTH \
             WHERE GRANTEE = CURRENT USER AND SCHEMA_NAME NOT LIKE 'Q%' AND SCHEMA_NAME NOT LIKE 'SYS%'",
        );
        if !skip.is_empty() {
            sql.push_str(&format!(" AND SCHEMA_NAME NOT IN ({})", escaped_list(dialect, skip)));
        }
        Some(sql)
    }
}
