//! Microsoft SQL Server dialect.

use super::supports::{
    AutoIncrementSupport, ConstraintSupport, IndexSupport, Pagination, RemoveIndexSupport,
    RenameTableSupport, ReturnValues,
};
use super::{
    escaped_list, json_path_string, AlterColumnStyle, CapabilityMatrix, Delimiter, Dialect,
    DialectRules,
};
use crate::bind::BindStyle;
use crate::error::Result;
use crate::expr::JsonPathSegment;
use crate::filter::Op;
use crate::query::{ConstraintType, RemoveIndexOptions, ShowConstraintsOptions};
use crate::schema::TableName;
use crate::types::base::{integer_options, integer_sql, parse_boolean};
use crate::types::{DataType, DataTypeId, TextLength, TypeDescriptor, TypeOverride};
use crate::value::{hex_upper, SqlValue};

const SUPPORTS: CapabilityMatrix = CapabilityMatrix {
    default_values: true,
    returning: ReturnValues::Output,
    auto_increment: AutoIncrementSupport {
        identity_insert: true,
        default_value: false,
        update: false,
    },
    schemas: true,
    connection_transaction_methods: true,
    constraints: ConstraintSupport {
        restrict: false,
        default: true,
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
    json_operations: true,
    rename_table: RenameTableSupport {
        change_schema: true,
    },
    limit_on_update: true,
    table_hints: true,
    pagination: Pagination::OffsetFetch,
    ..CapabilityMatrix::BASE
};

/// SQL Server 2017 and later.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlDialect;

impl MssqlDialect {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn bit_value(_ty: &DataType, value: &SqlValue, _dialect: &Dialect) -> Result<SqlValue> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }
    Ok(SqlValue::Int(i64::from(parse_boolean(value)?)))
}

fn string_sql(ty: &DataType, _dialect: &Dialect) -> Result<String> {
    Ok(match ty {
        DataType::String { length, binary: true } => {
            format!("VARBINARY({})", length.unwrap_or(255))
        }
        DataType::String { length, .. } => format!("NVARCHAR({})", length.unwrap_or(255)),
        DataType::Char { length, binary: true } => format!("BINARY({})", length.unwrap_or(255)),
        DataType::Char { length, .. } => format!("CHAR({})", length.unwrap_or(255)),
        _ => String::from("NVARCHAR(255)"),
    })
}

fn text_sql(ty: &DataType, _dialect: &Dialect) -> Result<String> {
    Ok(match ty {
        DataType::Text {
            length: Some(TextLength::Tiny),
        } => String::from("NVARCHAR(256)"),
        _ => String::from("NVARCHAR(MAX)"),
    })
}

fn blob_sql(ty: &DataType, _dialect: &Dialect) -> Result<String> {
    Ok(match ty {
        DataType::Blob {
            length: Some(TextLength::Tiny),
        } => String::from("VARBINARY(256)"),
        _ => String::from("VARBINARY(MAX)"),
    })
}

fn datetimeoffset_sql(ty: &DataType, _dialect: &Dialect) -> Result<String> {
    Ok(match ty {
        DataType::Date {
            precision: Some(p),
        } => format!("DATETIMEOFFSET({p})"),
        _ => String::from("DATETIMEOFFSET"),
    })
}

/// Catalog spelling of a constraint kind in `sys.*.type_desc`.
const fn constraint_type_desc(kind: ConstraintType) -> &'static str {
    match kind {
        ConstraintType::Check => "CHECK_CONSTRAINT",
        ConstraintType::Default => "DEFAULT_CONSTRAINT",
        ConstraintType::ForeignKey => "FOREIGN_KEY_CONSTRAINT",
        ConstraintType::PrimaryKey => "PRIMARY_KEY_CONSTRAINT",
        ConstraintType::Unique => "UNIQUE_CONSTRAINT",
    }
}

impl DialectRules for MssqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn supports(&self) -> &'static CapabilityMatrix {
        &SUPPORTS
    }

    fn identifier_delimiter(&self) -> Delimiter {
        Delimiter::BRACKETS
    }

    fn bind_style(&self) -> BindStyle {
        BindStyle::Named { prefix: "@" }
    }

    fn minimum_version(&self) -> &'static str {
        "14.0.1000"
    }

    fn default_schema(&self) -> &'static str {
        "dbo"
    }

    fn docs_url(&self) -> &'static str {
        "https://learn.microsoft.com/en-us/sql/t-sql/"
    }

    fn escape_buffer(&self, bytes: &[u8]) -> String {
        format!("0x{}", hex_upper(bytes))
    }

    fn type_overrides(&self) -> Vec<Box<dyn TypeDescriptor>> {
        vec![
            TypeOverride::sql(DataTypeId::Boolean, |_, _| Ok(String::from("BIT")))
                .with_bindable(bit_value)
                .with_names(&["bit"])
                .boxed(),
            TypeOverride::sql(DataTypeId::MediumInt, |ty, d| {
                integer_sql("INTEGER", integer_options(ty), d)
            })
            .boxed(),
            TypeOverride::sql(DataTypeId::String, string_sql)
                .with_names(&["nvarchar", "varchar"])
                .boxed(),
            TypeOverride::sql(DataTypeId::Char, string_sql).boxed(),
            TypeOverride::sql(DataTypeId::Text, text_sql).boxed(),
            TypeOverride::sql(DataTypeId::Blob, blob_sql)
                .with_names(&["varbinary"])
                .boxed(),
            TypeOverride::sql(DataTypeId::Date, datetimeoffset_sql)
                .with_names(&["datetimeoffset", "datetime2", "datetime"])
                .boxed(),
            TypeOverride::sql(DataTypeId::Uuid, |_, _| Ok(String::from("UNIQUEIDENTIFIER")))
                .with_names(&["uniqueidentifier"])
                .boxed(),
        ]
    }

    fn supports_operator(&self, op: Op) -> bool {
        !matches!(
            op,
            Op::Regexp | Op::NotRegexp | Op::IRegexp | Op::NotIRegexp
        )
    }

    fn json_path(
        &self,
        dialect: &Dialect,
        base: &str,
        path: &[JsonPathSegment],
        unquote: bool,
    ) -> Option<String> {
        // JSON_VALUE is the only extraction and it always unquotes
        unquote.then(|| {
            format!(
                "JSON_VALUE({base}, {})",
                dialect.escape_string(&json_path_string(path))
            )
        })
    }

    fn create_savepoint(&self, quoted: &str) -> String {
        format!("SAVE TRANSACTION {quoted}")
    }

    fn rollback_savepoint(&self, quoted: &str) -> String {
        format!("ROLLBACK TRANSACTION {quoted}")
    }

    fn release_savepoint(&self, _quoted: &str) -> Option<String> {
        None
    }

    fn show_constraints_query(
        &self,
        dialect: &Dialect,
        table: &TableName,
        options: &ShowConstraintsOptions,
    ) -> Option<String> {
        let schema = table.schema.as_deref().unwrap_or_else(|| dialect.default_schema());
        let mut sql = String::from(
            "SELECT DB_NAME() AS constraintCatalog, s.[name] AS constraintSchema, c.constraintName, \
             REPLACE(LEFT(c.constraintType, CHARINDEX('_CONSTRAINT', c.constraintType) - 1), '_', ' ') AS constraintType, \
             DB_NAME() AS tableCatalog, s.[name] AS tableSchema, t.[name] AS tableName, c.columnNames, \
             c.referencedTableSchema, c.referencedTableName, c.referencedColumnNames, c.deleteAction, c.updateAction, c.definition \
             FROM sys.tables t INNER JOIN sys.schemas s ON t.schema_id = s.schema_id INNER JOIN (\
             SELECT kc.[name] AS constraintName, kc.[type_desc] AS constraintType, kc.[parent_object_id] AS constraintTableId, c.[name] AS columnNames, null AS referencedTableSchema, \
             null AS referencedTableName, null AS referencedColumnNames, null AS deleteAction, null AS updateAction, null AS [definition], null AS column_id FROM sys.key_constraints kc \
             LEFT JOIN sys.indexes i ON kc.name = i.name LEFT JOIN sys.index_columns ic ON ic.index_id = i.index_id AND ic.object_id = kc.parent_object_id \
             LEFT JOIN sys.columns c ON c.column_id = ic.column_id AND c.object_id = kc.parent_object_id \
             UNION ALL SELECT [name] AS constraintName, [type_desc] AS constraintType, [parent_object_id] AS constraintTableId, null AS columnNames, null AS referencedTableSchema, \
             null AS referencedTableName, null AS referencedColumnNames, null AS deleteAction, null AS updateAction, [definition], null AS column_id FROM sys.check_constraints c \
             UNION ALL SELECT dc.[name] AS constraintName, dc.[type_desc] AS constraintType, dc.[parent_object_id] AS constraintTableId, c.[name] AS columnNames, null AS referencedTableSchema, \
             null AS referencedTableName, null AS referencedColumnNames, null AS deleteAction, null AS updateAction, [definition], null AS column_id FROM sys.default_constraints dc \
             INNER JOIN sys.columns c ON dc.parent_column_id = c.column_id AND dc.parent_object_id = c.object_id \
             UNION ALL SELECT k.[name] AS constraintName, k.[type_desc] AS constraintType, k.[parent_object_id] AS constraintTableId, fcol.[name] AS columnNames, \
             OBJECT_SCHEMA_NAME(k.[referenced_object_id]) AS referencedTableSchema, OBJECT_NAME(k.[referenced_object_id]) AS referencedTableName, rcol.[name] AS referencedColumnNames, \
             k.[delete_referential_action_desc] AS deleteAction, k.[update_referential_action_desc] AS updateAction, null AS [definition], rcol.column_id \
             FROM sys.foreign_keys k INNER JOIN sys.foreign_key_columns c ON k.[object_id] = c.constraint_object_id \
             INNER JOIN sys.columns fcol ON c.parent_column_id = fcol.column_id AND c.parent_object_id = fcol.object_id \
             INNER JOIN sys.columns rcol ON c.referenced_column_id = rcol.column_id AND c.referenced_object_id = rcol.object_id\
             ) c ON t.object_id = c.constraintTableId",
        );
        sql.push_str(&format!(
            " WHERE s.name = {} AND t.name = {}",
            dialect.escape_string(schema),
            dialect.escape_string(&table.table)
        ));
        if let Some(column) = &options.column_name {
            sql.push_str(&format!(" AND c.columnNames = {}", dialect.escape_string(column)));
        }
        if let Some(name) = &options.constraint_name {
            sql.push_str(&format!(" AND c.constraintName = {}", dialect.escape_string(name)));
        }
        if let Some(kind) = options.constraint_type {
            sql.push_str(&format!(
                " AND c.constraintType = {}",
                dialect.escape_string(constraint_type_desc(kind))
            ));
        }
        sql.push_str(" ORDER BY c.constraintName, c.column_id");
        Some(sql)
    }

    fn version_query(&self) -> &'static str {
        "DECLARE @ms_ver NVARCHAR(20); \
         SET @ms_ver = REVERSE(CONVERT(NVARCHAR(20), SERVERPROPERTY('ProductVersion'))); \
         SELECT REVERSE(SUBSTRING(@ms_ver, CHARINDEX('.', @ms_ver)+1, 20)) AS 'version'"
    }

    fn rename_table(
        &self,
        dialect: &Dialect,
        before: &TableName,
        after: &TableName,
    ) -> Result<String> {
        let generator = dialect.query_generator();
        if before.schema != after.schema {
            if before.table != after.table {
                return Err(
                    dialect.unsupported("renaming a table while moving it to another schema")
                );
            }
            let schema = after.schema.as_deref().unwrap_or_else(|| dialect.default_schema());
            return Ok(format!(
                "ALTER SCHEMA {} TRANSFER {}",
                dialect.quote_identifier(schema),
                generator.quote_table_name(before)
            ));
        }
        Ok(format!(
            "EXEC sp_rename '{}', {}",
            generator.quote_table_name(before),
            dialect.escape_string(&after.table)
        ))
    }

    fn remove_index(
        &self,
        dialect: &Dialect,
        table: &TableName,
        index: &str,
        options: &RemoveIndexOptions,
    ) -> String {
        format!(
            "DROP INDEX {}{} ON {}",
            if options.if_exists { "IF EXISTS " } else { "" },
            dialect.quote_identifier(index),
            dialect.query_generator().quote_table_name(table)
        )
    }

    fn create_table_prefix(&self, dialect: &Dialect, quoted: &str) -> String {
        format!(
            "IF OBJECT_ID({}, 'U') IS NULL CREATE TABLE {quoted}",
            dialect.escape_string(quoted)
        )
    }

    fn drop_table_prefix(&self, dialect: &Dialect, quoted: &str) -> String {
        format!(
            "IF OBJECT_ID({}, 'U') IS NOT NULL DROP TABLE {quoted}",
            dialect.escape_string(quoted)
        )
    }

    fn add_column_keyword(&self) -> &'static str {
        "ADD"
    }

    fn auto_increment_column(&self, sql_type: &str) -> String {
        format!("{sql_type} IDENTITY(1,1)")
    }

    fn limit_requires_order(&self) -> bool {
        true
    }

    fn top_limit(&self) -> bool {
        true
    }

    fn max_bulk_insert_rows(&self) -> Option<usize> {
        Some(1000)
    }

    fn alter_column_style(&self) -> AlterColumnStyle {
        AlterColumnStyle::AlterColumn
    }

    fn describe_table_query(&self, dialect: &Dialect, table: &TableName) -> String {
        let schema = table.schema.as_deref().unwrap_or_else(|| dialect.default_schema());
        format!(
            "SELECT c.COLUMN_NAME AS 'Name', c.DATA_TYPE AS 'Type', \
             c.CHARACTER_MAXIMUM_LENGTH AS 'Length', c.IS_NULLABLE AS 'IsNull', \
             COLUMN_DEFAULT AS 'Default', pk.CONSTRAINT_TYPE AS 'Constraint', \
             COLUMNPROPERTY(OBJECT_ID('[' + c.TABLE_SCHEMA + '].[' + c.TABLE_NAME + ']'), c.COLUMN_NAME, 'IsIdentity') AS 'IsIdentity', \
             CAST(prop.value AS NVARCHAR) AS 'Comment' \
             FROM INFORMATION_SCHEMA.TABLES t \
             INNER JOIN INFORMATION_SCHEMA.COLUMNS c ON t.TABLE_NAME = c.TABLE_NAME AND t.TABLE_SCHEMA = c.TABLE_SCHEMA \
             LEFT JOIN (SELECT tc.table_schema, tc.table_name, cu.column_name, tc.CONSTRAINT_TYPE \
             FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
             JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE cu ON tc.table_schema = cu.table_schema \
             AND tc.table_name = cu.table_name AND tc.constraint_name = cu.constraint_name \
             AND tc.CONSTRAINT_TYPE = 'PRIMARY KEY') pk \
             ON pk.table_schema = c.table_schema AND pk.table_name = c.table_name \
             AND pk.column_name = c.column_name \
             INNER JOIN sys.columns AS sc \
             ON sc.object_id = object_id('[' + t.table_schema + '].[' + t.table_name + ']') AND sc.name = c.column_name \
             LEFT JOIN sys.extended_properties prop ON prop.major_id = sc.object_id \
             AND prop.minor_id = sc.column_id AND prop.name = 'MS_Description' \
             WHERE t.TABLE_NAME = {} AND t.TABLE_SCHEMA = {}",
            dialect.escape_string(&table.table),
            dialect.escape_string(schema)
        )
    }

    fn show_indexes_query(&self, dialect: &Dialect, table: &TableName) -> String {
        let object = table.schema.as_deref().map_or_else(
            || table.table.clone(),
            |schema| format!("{schema}.{}", table.table),
        );
        format!(
            "SELECT I.[name] AS [index_name], I.[type_desc] AS [index_type], C.[name] AS [column_name], \
             IC.[is_descending_key], IC.[is_included_column], I.[is_unique], I.[is_primary_key], \
             I.[is_unique_constraint] FROM sys.indexes I \
             INNER JOIN sys.index_columns IC ON IC.index_id = I.index_id AND IC.object_id = I.object_id \
             INNER JOIN sys.columns C ON IC.object_id = C.object_id AND IC.column_id = C.column_id \
             WHERE I.[object_id] = OBJECT_ID({}) ORDER BY I.[name]",
            dialect.escape_string(&object)
        )
    }

    fn technical_schema_names(&self) -> &'static [&'static str] {
        &[
            "db_accessadmin",
            "db_backupoperator",
            "db_datareader",
            "db_datawriter",
            "db_ddladmin",
            "db_denydatareader",
            "db_denydatawriter",
            "db_owner",
            "db_securityadmin",
            "INFORMATION_SCHEMA",
            "sys",
        ]
    }

    fn list_tables_query(&self, dialect: &Dialect, schema: Option<&str>) -> String {
        let filter = schema.map_or_else(
            || {
                format!(
                    "s.name NOT IN ({})",
                    escaped_list(dialect, self.technical_schema_names())
                )
            },
            |schema| format!("s.name = {}", dialect.escape_string(schema)),
        );
        format!(
            "SELECT t.name AS [tableName], s.name AS [schema] FROM sys.tables t \
             INNER JOIN sys.schemas s ON t.schema_id = s.schema_id WHERE t.type = 'U' AND {filter} \
             EXCEPT \
             SELECT OBJECT_NAME(t.history_table_id) AS [tableName], s.name AS [schema] FROM sys.tables t \
             INNER JOIN sys.schemas s ON t.schema_id = s.schema_id WHERE t.type = 'U' AND {filter} \
             ORDER BY [schema], [tableName]"
        )
    }

    fn list_schemas_query(&self, dialect: &Dialect, skip: &[&str]) -> Option<String> {
        let skipped: Vec<&str> = ["dbo", "guest"]
            .into_iter()
            .chain(self.technical_schema_names().iter().copied())
            .chain(skip.iter().copied())
            .collect();
        Some(format!(
            "SELECT [name] AS [schema] FROM sys.schemas WHERE [name] NOT IN ({})",
            escaped_list(dialect, &skipped)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectKind;

    fn mssql() -> Dialect {
        Dialect::new(DialectKind::Mssql).unwrap()
    }

    #[test]
    fn test_type_spellings() {
        let d = mssql();
        assert_eq!(d.type_to_sql(&DataType::Boolean).unwrap(), "BIT");
        assert_eq!(d.type_to_sql(&DataType::string()).unwrap(), "NVARCHAR(255)");
        assert_eq!(d.type_to_sql(&DataType::text()).unwrap(), "NVARCHAR(MAX)");
        assert_eq!(d.type_to_sql(&DataType::blob()).unwrap(), "VARBINARY(MAX)");
        assert_eq!(d.type_to_sql(&DataType::Uuid).unwrap(), "UNIQUEIDENTIFIER");
        assert_eq!(d.type_to_sql(&DataType::date()).unwrap(), "DATETIMEOFFSET");
    }

    #[test]
    fn test_booleans_escape_as_bits() {
        let d = mssql();
        let descriptor = d.types().resolve(DataTypeId::Boolean);
        assert_eq!(descriptor.escape(&DataType::Boolean, &SqlValue::Bool(true), &d).unwrap(), "1");
        assert_eq!(descriptor.escape(&DataType::Boolean, &SqlValue::Bool(false), &d).unwrap(), "0");
    }

    #[test]
    fn test_literals() {
        let d = mssql();
        assert_eq!(d.escape_string("O'Brien"), "'O''Brien'");
        assert_eq!(d.escape_buffer(&[0xca, 0xfe]), "0xCAFE");
    }

    #[test]
    fn test_json_value_requires_unquote() {
        let d = mssql();
        let path = [JsonPathSegment::Key("name".into())];
        assert_eq!(
            MssqlDialect.json_path(&d, "[data]", &path, true).unwrap(),
            "JSON_VALUE([data], '$.name')"
        );
        assert!(MssqlDialect.json_path(&d, "[data]", &path, false).is_none());
    }

    #[test]
    fn test_rename_and_transfer() {
        let d = mssql();
        assert_eq!(
            MssqlDialect
                .rename_table(&d, &TableName::new("old"), &TableName::new("new"))
                .unwrap(),
            "EXEC sp_rename '[old]', 'new'"
        );
        assert_eq!(
            MssqlDialect
                .rename_table(
                    &d,
                    &TableName::new("users"),
                    &TableName::new("users").with_schema("archive")
                )
                .unwrap(),
            "ALTER SCHEMA [archive] TRANSFER [users]"
        );
    }

    #[test]
    fn test_savepoints() {
        assert_eq!(MssqlDialect.create_savepoint("[sp]"), "SAVE TRANSACTION [sp]");
        assert_eq!(MssqlDialect.rollback_savepoint("[sp]"), "ROLLBACK TRANSACTION [sp]");
        assert!(MssqlDialect.release_savepoint("[sp]").is_none());
    }
}
