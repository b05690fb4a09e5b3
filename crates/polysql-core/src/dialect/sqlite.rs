//! SQLite dialect.

use super::supports::{
    ConstraintSupport, DataTypeSupport, IndexSupport, InsertSupport, RemoveIndexSupport,
    ReturnValues, StartTransactionSupport, TruncateSupport,
};
use super::{
    json_path_string, AlterColumnStyle, CapabilityMatrix, Delimiter, Dialect, DialectRules,
};
use crate::bind::BindStyle;
use crate::error::Result;
use crate::expr::JsonPathSegment;
use crate::filter::Op;
use crate::query::{IsolationLevel, ShowConstraintsOptions, TruncateOptions};
use crate::schema::TableName;
use crate::types::base::{integer_options, integer_sql};
use crate::types::{DataType, DataTypeId, TypeDescriptor, TypeOverride};

const SUPPORTS: CapabilityMatrix = CapabilityMatrix {
    default_values: true,
    returning: ReturnValues::Returning,
    start_transaction: StartTransactionSupport {
        use_begin: true,
        read_only: false,
        transaction_type: true,
    },
    inserts: InsertSupport {
        ignore_duplicates: Some(" OR IGNORE"),
        update_on_duplicate: Some(" ON CONFLICT DO UPDATE SET"),
        on_conflict_do_nothing: Some(" ON CONFLICT DO NOTHING"),
        on_conflict_where: true,
        conflict_fields: true,
    },
    constraints: ConstraintSupport {
        add: false,
        remove: false,
        ..CapabilityMatrix::BASE.constraints
    },
    index: IndexSupport {
        where_clause: true,
        if_not_exists: true,
        function_based: true,
        ..CapabilityMatrix::BASE.index
    },
    remove_index: RemoveIndexSupport {
        concurrently: false,
        if_exists: true,
        cascade: false,
    },
    data_types: DataTypeSupport {
        json: true,
        ..CapabilityMatrix::BASE.data_types
    },
    json_operations: true,
    truncate: TruncateSupport {
        cascade: false,
        restart_identity: true,
    },
    delete_limit: false,
    ..CapabilityMatrix::BASE
};

/// SQLite 3.8 and later.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn text(_ty: &DataType, _dialect: &Dialect) -> Result<String> {
    Ok(String::from("TEXT"))
}

fn real(_ty: &DataType, _dialect: &Dialect) -> Result<String> {
    Ok(String::from("REAL"))
}

fn integer(ty: &DataType, dialect: &Dialect) -> Result<String> {
    integer_sql("INTEGER", integer_options(ty), dialect)
}

/// Escapes a table name as the string stored in `sqlite_master`.
fn escape_table(dialect: &Dialect, table: &TableName) -> String {
    match &table.schema {
        Some(schema) => dialect.escape_string(&format!(
            "{schema}{}{}",
            table.delimiter.as_deref().unwrap_or("."),
            table.table
        )),
        None => dialect.escape_string(&table.table),
    }
}

impl DialectRules for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn supports(&self) -> &'static CapabilityMatrix {
        &SUPPORTS
    }

    fn identifier_delimiter(&self) -> Delimiter {
        Delimiter::BACKTICK
    }

    fn bind_style(&self) -> BindStyle {
        BindStyle::Named { prefix: "$" }
    }

    fn minimum_version(&self) -> &'static str {
        "3.8.0"
    }

    fn docs_url(&self) -> &'static str {
        "https://www.sqlite.org/docs.html"
    }

    fn type_overrides(&self) -> Vec<Box<dyn TypeDescriptor>> {
        let mut overrides: Vec<Box<dyn TypeDescriptor>> = [
            DataTypeId::TinyInt,
            DataTypeId::SmallInt,
            DataTypeId::MediumInt,
            DataTypeId::Integer,
            DataTypeId::BigInt,
        ]
        .into_iter()
        .map(|id| TypeOverride::sql(id, integer).boxed())
        .collect();
        overrides.extend(
            [DataTypeId::Float, DataTypeId::Real, DataTypeId::Double, DataTypeId::Decimal]
                .into_iter()
                .map(|id| TypeOverride::sql(id, real).boxed()),
        );
        overrides.extend(
            [
                DataTypeId::String,
                DataTypeId::Char,
                DataTypeId::Text,
                DataTypeId::Json,
                DataTypeId::Date,
                DataTypeId::DateOnly,
                DataTypeId::Time,
                DataTypeId::Uuid,
                DataTypeId::Enum,
            ]
            .into_iter()
            .map(|id| TypeOverride::sql(id, text).boxed()),
        );
        overrides.push(
            TypeOverride::sql(DataTypeId::Boolean, |_, _| Ok(String::from("INTEGER"))).boxed(),
        );
        overrides
    }

    fn operator_keyword(&self, op: Op) -> Option<&'static str> {
        match op {
            Op::Regexp | Op::IRegexp => Some("REGEXP"),
            Op::NotRegexp | Op::NotIRegexp => Some("NOT REGEXP"),
            Op::ILike => Some("LIKE"),
            Op::NotILike => Some("NOT LIKE"),
            _ => None,
        }
    }

    fn json_path(
        &self,
        dialect: &Dialect,
        base: &str,
        path: &[JsonPathSegment],
        unquote: bool,
    ) -> Option<String> {
        let path = dialect.escape_string(&json_path_string(path));
        // json_extract already hands back SQL values for scalars
        Some(if unquote {
            format!("json_extract({base},{path})")
        } else {
            format!("({base}->{path})")
        })
    }

    fn set_isolation_level(&self, dialect: &Dialect, level: IsolationLevel) -> Result<String> {
        match level {
            IsolationLevel::ReadUncommitted => Ok(String::from("PRAGMA read_uncommitted = 1")),
            IsolationLevel::Serializable => Ok(String::from("PRAGMA read_uncommitted = 0")),
            other => Err(dialect.unsupported(format!("the {} isolation level", other.as_sql()))),
        }
    }

    fn show_constraints_query(
        &self,
        dialect: &Dialect,
        table: &TableName,
        _options: &ShowConstraintsOptions,
    ) -> Option<String> {
        Some(format!(
            "SELECT sql FROM sqlite_master WHERE tbl_name = {}",
            escape_table(dialect, table)
        ))
    }

    fn show_constraints_filters(&self) -> bool {
        false
    }

    fn version_query(&self) -> &'static str {
        "SELECT sqlite_version() as `version`"
    }

    fn truncate_table(
        &self,
        dialect: &Dialect,
        table: &TableName,
        options: &TruncateOptions,
    ) -> Vec<String> {
        let generator = dialect.query_generator();
        let mut statements = vec![format!("DELETE FROM {}", generator.quote_table_name(table))];
        if options.restart_identity {
            statements.push(format!(
                "DELETE FROM {} WHERE {} = {}",
                generator.quote_table_name(&TableName::new("sqlite_sequence")),
                dialect.quote_identifier("name"),
                escape_table(dialect, table)
            ));
        }
        statements
    }

    fn auto_increment_column(&self, _sql_type: &str) -> String {
        String::from("INTEGER PRIMARY KEY AUTOINCREMENT")
    }

    fn auto_increment_is_primary_key(&self) -> bool {
        true
    }

    fn unbounded_limit(&self) -> Option<&'static str> {
        Some("-1")
    }

    fn table_exists_query(&self, dialect: &Dialect, table: &TableName) -> String {
        format!(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = {}",
            escape_table(dialect, table)
        )
    }

    fn alter_column_style(&self) -> AlterColumnStyle {
        AlterColumnStyle::RenameOnly
    }

    fn describe_table_query(&self, dialect: &Dialect, table: &TableName) -> String {
        format!(
            "PRAGMA TABLE_INFO({})",
            dialect.query_generator().quote_table_name(table)
        )
    }

    fn show_indexes_query(&self, dialect: &Dialect, table: &TableName) -> String {
        format!(
            "PRAGMA INDEX_LIST({})",
            dialect.query_generator().quote_table_name(table)
        )
    }

    fn list_tables_query(&self, dialect: &Dialect, _schema: Option<&str>) -> String {
        format!(
            "SELECT name AS {} FROM sqlite_master WHERE type = 'table' AND name != 'sqlite_sequence' \
             ORDER BY name",
            dialect.quote_identifier("tableName")
        )
    }

    fn foreign_key_list_query(
        &self,
        dialect: &Dialect,
        table: &TableName,
        column: Option<&str>,
    ) -> Option<String> {
        let mut sql = format!(
            "SELECT * FROM pragma_foreign_key_list({})",
            escape_table(dialect, table)
        );
        if let Some(column) = column {
            sql.push_str(&format!(
                " WHERE {} = {}",
                dialect.quote_identifier("from"),
                dialect.escape_string(column)
            ));
        }
        Some(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectKind;

    fn sqlite() -> Dialect {
        Dialect::new(DialectKind::Sqlite).unwrap()
    }

    #[test]
    fn test_storage_classes() {
        let d = sqlite();
        assert_eq!(d.type_to_sql(&DataType::bigint()).unwrap(), "INTEGER");
        assert_eq!(d.type_to_sql(&DataType::Boolean).unwrap(), "INTEGER");
        assert_eq!(d.type_to_sql(&DataType::string()).unwrap(), "TEXT");
        assert_eq!(d.type_to_sql(&DataType::decimal(10, 2)).unwrap(), "REAL");
        assert_eq!(d.type_to_sql(&DataType::blob()).unwrap(), "BLOB");
    }

    #[test]
    fn test_schema_is_folded_into_table_name() {
        let d = sqlite();
        let table = TableName::new("users").with_schema("main");
        assert_eq!(
            SqliteDialect.table_exists_query(&d, &table),
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'main.users'"
        );
    }

    #[test]
    fn test_truncate_restarting_identity() {
        let d = sqlite();
        let statements = SqliteDialect.truncate_table(
            &d,
            &TableName::new("users"),
            &TruncateOptions {
                restart_identity: true,
                cascade: false,
            },
        );
        assert_eq!(
            statements,
            vec![
                "DELETE FROM `users`".to_string(),
                "DELETE FROM `sqlite_sequence` WHERE `name` = 'users'".to_string(),
            ]
        );
    }

    #[test]
    fn test_isolation_levels_use_pragmas() {
        let d = sqlite();
        assert_eq!(
            SqliteDialect.set_isolation_level(&d, IsolationLevel::ReadUncommitted).unwrap(),
            "PRAGMA read_uncommitted = 1"
        );
        assert!(SqliteDialect.set_isolation_level(&d, IsolationLevel::RepeatableRead).is_err());
    }
}
