//! PostgreSQL dialect.

use super::supports::{
    CascadeSupport, ConstraintSupport, CreateSchemaSupport, DataTypeSupport, DecimalSupport,
    IfNotExistsSupport, IndexSupport, InsertSupport, RemoveIndexSupport, RemoveOptionsSupport,
    RenameTableSupport, ReturnValues, StartTransactionSupport, TruncateSupport,
};
use super::{
    constraint_filters, escaped_list, quote_sql_string, CapabilityMatrix, Dialect, DialectRules,
};
use crate::bind::BindStyle;
use crate::error::Result;
use crate::expr::JsonPathSegment;
use crate::query::{RemoveIndexOptions, ShowConstraintsOptions, TruncateOptions};
use crate::schema::TableName;
use crate::types::base::{integer_options, integer_sql};
use crate::types::{DataType, DataTypeId, TypeDescriptor, TypeOverride};
use crate::value::hex_upper;

const NAN_AND_INFINITY: DecimalSupport = DecimalSupport {
    nan: true,
    infinity: true,
    zerofill: false,
    unsigned: false,
    scale_and_precision: false,
};

const SUPPORTS: CapabilityMatrix = CapabilityMatrix {
    default_values: true,
    returning: ReturnValues::Returning,
    bulk_default: true,
    schemas: true,
    start_transaction: StartTransactionSupport {
        read_only: true,
        ..CapabilityMatrix::BASE.start_transaction
    },
    inserts: InsertSupport {
        ignore_duplicates: None,
        update_on_duplicate: Some(" ON CONFLICT DO UPDATE SET"),
        on_conflict_do_nothing: Some(" ON CONFLICT DO NOTHING"),
        on_conflict_where: true,
        conflict_fields: true,
    },
    constraints: ConstraintSupport {
        deferrable: true,
        remove_options: RemoveOptionsSupport {
            cascade: true,
            if_exists: true,
        },
        ..CapabilityMatrix::BASE.constraints
    },
    index: IndexSupport {
        concurrently: true,
        using: true,
        function_based: true,
        operator: true,
        where_clause: true,
        include: true,
        if_not_exists: true,
        ..CapabilityMatrix::BASE.index
    },
    remove_index: RemoveIndexSupport {
        concurrently: true,
        if_exists: true,
        cascade: true,
    },
    data_types: DataTypeSupport {
        float: NAN_AND_INFINITY,
        real: NAN_AND_INFINITY,
        double: NAN_AND_INFINITY,
        decimal: NAN_AND_INFINITY,
        json: true,
        jsonb: true,
        array: true,
        range: true,
        citext: true,
        tsvector: true,
        network: true,
        datetime_infinity: true,
        time_precision: true,
        ..CapabilityMatrix::BASE.data_types
    },
    json_operations: true,
    escape_string_constants: true,
    uuid_v4_generation: true,
    drop_table: CascadeSupport { cascade: true },
    truncate: TruncateSupport {
        cascade: true,
        restart_identity: true,
    },
    remove_column: RemoveOptionsSupport {
        cascade: true,
        if_exists: true,
    },
    add_column: IfNotExistsSupport {
        if_not_exists: true,
    },
    rename_table: RenameTableSupport {
        change_schema: true,
    },
    create_schema: CreateSchemaSupport {
        authorization: true,
        if_not_exists: true,
        ..CapabilityMatrix::BASE.create_schema
    },
    drop_schema: RemoveOptionsSupport {
        cascade: true,
        if_exists: true,
    },
    delete_limit: false,
    ..CapabilityMatrix::BASE
};

/// PostgreSQL 11 and later.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn timestamp_sql(ty: &DataType, _dialect: &Dialect) -> Result<String> {
    Ok(match ty {
        DataType::Date {
            precision: Some(p),
        } => format!("TIMESTAMP({p}) WITH TIME ZONE"),
        _ => String::from("TIMESTAMP WITH TIME ZONE"),
    })
}

fn string_sql(ty: &DataType, _dialect: &Dialect) -> Result<String> {
    Ok(match ty {
        DataType::String { binary: true, .. } | DataType::Char { binary: true, .. } => {
            String::from("BYTEA")
        }
        DataType::Char { length, .. } => format!("CHAR({})", length.unwrap_or(255)),
        DataType::String { length, .. } => format!("VARCHAR({})", length.unwrap_or(255)),
        _ => String::from("VARCHAR(255)"),
    })
}

fn text_sql(ty: &DataType, dialect: &Dialect) -> Result<String> {
    if matches!(ty, DataType::Text { length: Some(_) }) {
        dialect.warn_once(
            "postgres does not support TEXT with a length, plain TEXT is used instead",
        );
    }
    Ok(String::from("TEXT"))
}

impl DialectRules for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn supports(&self) -> &'static CapabilityMatrix {
        &SUPPORTS
    }

    fn bind_style(&self) -> BindStyle {
        BindStyle::SpecifiedOrdered { prefix: "$" }
    }

    fn minimum_version(&self) -> &'static str {
        "11.0.0"
    }

    fn default_schema(&self) -> &'static str {
        "public"
    }

    fn docs_url(&self) -> &'static str {
        "https://www.postgresql.org/docs/current/index.html"
    }

    fn escape_string(&self, value: &str) -> String {
        // NUL bytes are rejected by the server inside text values
        quote_sql_string(&value.replace('\0', "\\0"))
    }

    fn escape_buffer(&self, bytes: &[u8]) -> String {
        format!("'\\x{}'", hex_upper(bytes).to_lowercase())
    }

    fn type_overrides(&self) -> Vec<Box<dyn TypeDescriptor>> {
        vec![
            TypeOverride::sql(DataTypeId::TinyInt, |ty, d| {
                integer_sql("SMALLINT", integer_options(ty), d)
            })
            .boxed(),
            TypeOverride::sql(DataTypeId::MediumInt, |ty, d| {
                integer_sql("INTEGER", integer_options(ty), d)
            })
            .boxed(),
            TypeOverride::sql(DataTypeId::Date, timestamp_sql)
                .with_names(&["timestamptz", "timestamp with time zone", "timestamp"])
                .boxed(),
            TypeOverride::sql(DataTypeId::String, string_sql).boxed(),
            TypeOverride::sql(DataTypeId::Char, string_sql).boxed(),
            TypeOverride::sql(DataTypeId::Text, text_sql).boxed(),
            TypeOverride::sql(DataTypeId::Blob, |_, _| Ok(String::from("BYTEA")))
                .with_names(&["bytea"])
                .boxed(),
        ]
    }

    fn json_path(
        &self,
        dialect: &Dialect,
        base: &str,
        path: &[JsonPathSegment],
        unquote: bool,
    ) -> Option<String> {
        let segment = |s: &JsonPathSegment| match s {
            JsonPathSegment::Key(key) => dialect.escape_string(key),
            JsonPathSegment::Index(index) => index.to_string(),
        };
        Some(match path {
            [] => base.to_string(),
            [single] => {
                let operator = if unquote { "->>" } else { "->" };
                format!("({base}{operator}{})", segment(single))
            }
            _ => {
                let operator = if unquote { "#>>" } else { "#>" };
                let elements: Vec<String> = path
                    .iter()
                    .map(|s| match s {
                        JsonPathSegment::Key(key) => dialect.escape_string(key),
                        JsonPathSegment::Index(index) => dialect.escape_string(&index.to_string()),
                    })
                    .collect();
                format!("({base}{operator}ARRAY[{}]::VARCHAR(255)[])", elements.join(","))
            }
        })
    }

    fn show_constraints_query(
        &self,
        dialect: &Dialect,
        table: &TableName,
        options: &ShowConstraintsOptions,
    ) -> Option<String> {
        let schema = table.schema.as_deref().unwrap_or_else(|| dialect.default_schema());
        Some(format!(
            "SELECT c.constraint_catalog AS \"constraintCatalog\", \
             c.constraint_schema AS \"constraintSchema\", \
             c.constraint_name AS \"constraintName\", \
             c.constraint_type AS \"constraintType\", \
             c.table_catalog AS \"tableCatalog\", \
             c.table_schema AS \"tableSchema\", \
             c.table_name AS \"tableName\", \
             kcu.column_name AS \"columnNames\", \
             ccu.table_schema AS \"referencedTableSchema\", \
             ccu.table_name AS \"referencedTableName\", \
             ccu.column_name AS \"referencedColumnNames\", \
             r.delete_rule AS \"deleteAction\", \
             r.update_rule AS \"updateAction\", \
             pg_get_expr(pgc.conbin, pgc.conrelid) AS \"definition\", \
             c.is_deferrable AS \"isDeferrable\", \
             c.initially_deferred AS \"initiallyDeferred\" \
             FROM INFORMATION_SCHEMA.table_constraints c \
             LEFT JOIN INFORMATION_SCHEMA.referential_constraints r ON c.constraint_catalog = r.constraint_catalog AND c.constraint_schema = r.constraint_schema AND c.constraint_name = r.constraint_name \
             LEFT JOIN INFORMATION_SCHEMA.key_column_usage kcu ON c.constraint_catalog = kcu.constraint_catalog AND c.constraint_schema = kcu.constraint_schema AND c.constraint_name = kcu.constraint_name \
             LEFT JOIN information_schema.constraint_column_usage AS ccu ON r.constraint_catalog = ccu.constraint_catalog AND r.constraint_schema = ccu.constraint_schema AND r.constraint_name = ccu.constraint_name \
             LEFT JOIN pg_constraint pgc ON c.constraint_name = pgc.conname AND c.table_schema = (SELECT nspname FROM pg_namespace WHERE oid = pgc.connamespace) AND c.table_name = pgc.conrelid::regclass::text \
             WHERE c.table_name = {} AND c.table_schema = {}{} \
             ORDER BY c.constraint_name, kcu.ordinal_position",
            dialect.escape_string(&table.table),
            dialect.escape_string(schema),
            constraint_filters(
                dialect,
                options,
                "kcu.column_name",
                "c.constraint_name",
                "c.constraint_type",
            ),
        ))
    }

    fn version_query(&self) -> &'static str {
        "SHOW SERVER_VERSION"
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
                "ALTER TABLE {} SET SCHEMA {}",
                generator.quote_table_name(before),
                dialect.quote_identifier(schema)
            ));
        }
        Ok(format!(
            "ALTER TABLE {} RENAME TO {}",
            generator.quote_table_name(before),
            dialect.quote_identifier(&after.table)
        ))
    }

    fn truncate_table(
        &self,
        dialect: &Dialect,
        table: &TableName,
        options: &TruncateOptions,
    ) -> Vec<String> {
        let mut sql = format!("TRUNCATE {}", dialect.query_generator().quote_table_name(table));
        if options.restart_identity {
            sql.push_str(" RESTART IDENTITY");
        }
        if options.cascade {
            sql.push_str(" CASCADE");
        }
        vec![sql]
    }

    fn remove_index(
        &self,
        dialect: &Dialect,
        table: &TableName,
        index: &str,
        options: &RemoveIndexOptions,
    ) -> String {
        let mut sql = String::from("DROP INDEX");
        if options.concurrently {
            sql.push_str(" CONCURRENTLY");
        }
        if options.if_exists {
            sql.push_str(" IF EXISTS");
        }
        let indexed = TableName {
            table: index.to_string(),
            schema: table.schema.clone(),
            delimiter: None,
        };
        sql.push(' ');
        sql.push_str(&dialect.query_generator().quote_table_name(&indexed));
        if options.cascade {
            sql.push_str(" CASCADE");
        }
        sql
    }

    fn auto_increment_column(&self, sql_type: &str) -> String {
        match sql_type {
            "BIGINT" => String::from("BIGSERIAL"),
            "SMALLINT" => String::from("SMALLSERIAL"),
            _ => String::from("SERIAL"),
        }
    }

    fn table_exists_query(&self, dialect: &Dialect, table: &TableName) -> String {
        let schema = table.schema.as_deref().unwrap_or_else(|| dialect.default_schema());
        format!(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = {} AND table_name = {}",
            dialect.escape_string(schema),
            dialect.escape_string(&table.table)
        )
    }

    fn describe_table_query(&self, dialect: &Dialect, table: &TableName) -> String {
        let schema = table.schema.as_deref().unwrap_or_else(|| dialect.default_schema());
        format!(
            "SELECT pk.constraint_type AS \"Constraint\", c.column_name AS \"Field\", \
             c.column_default AS \"Default\", c.is_nullable AS \"Null\", \
             (CASE WHEN c.udt_name = 'hstore' THEN c.udt_name ELSE c.data_type END) || \
             (CASE WHEN c.character_maximum_length IS NOT NULL \
             THEN '(' || c.character_maximum_length || ')' ELSE '' END) AS \"Type\", \
             (SELECT array_agg(e.enumlabel) FROM pg_catalog.pg_type t \
             JOIN pg_catalog.pg_enum e ON t.oid = e.enumtypid WHERE t.typname = c.udt_name) AS \"special\", \
             (SELECT pgd.description FROM pg_catalog.pg_statio_all_tables AS st \
             INNER JOIN pg_catalog.pg_description pgd ON pgd.objoid = st.relid \
             WHERE c.ordinal_position = pgd.objsubid AND c.table_name = st.relname) AS \"Comment\" \
             FROM information_schema.columns c \
             LEFT JOIN (SELECT tc.table_schema, tc.table_name, cu.column_name, tc.constraint_type \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage cu ON tc.table_schema = cu.table_schema \
             AND tc.table_name = cu.table_name AND tc.constraint_name = cu.constraint_name \
             AND tc.constraint_type = 'PRIMARY KEY') pk \
             ON pk.table_schema = c.table_schema AND pk.table_name = c.table_name \
             AND pk.column_name = c.column_name \
             WHERE c.table_name = {} AND c.table_schema = {}",
            dialect.escape_string(&table.table),
            dialect.escape_string(schema)
        )
    }

    fn show_indexes_query(&self, dialect: &Dialect, table: &TableName) -> String {
        let schema = table.schema.as_deref().unwrap_or_else(|| dialect.default_schema());
        format!(
            "SELECT n.nspname AS table_schema, t.relname AS table_name, i.indexname AS index_name, \
             am.amname AS index_method, pg_index.indisprimary AS is_primary_key, \
             pg_index.indisunique AS is_unique, \
             pg_get_expr(pg_index.indpred, t.oid) AS where_clause, \
             a.attname AS column_name, \
             array_position(pg_index.indkey, a.attnum) AS position_in_index \
             FROM pg_indexes i \
             INNER JOIN pg_class ic ON ic.relname = i.indexname \
             INNER JOIN pg_index ON pg_index.indexrelid = ic.oid \
             INNER JOIN pg_class t ON t.oid = pg_index.indrelid \
             INNER JOIN pg_namespace n ON n.oid = t.relnamespace AND n.nspname = i.schemaname \
             INNER JOIN pg_am am ON am.oid = ic.relam \
             INNER JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(pg_index.indkey) \
             WHERE i.tablename = {} AND i.schemaname = {} \
             ORDER BY i.indexname, position_in_index",
            dialect.escape_string(&table.table),
            dialect.escape_string(schema)
        )
    }

    fn technical_schema_names(&self) -> &'static [&'static str] {
        &["information_schema", "tiger", "tiger_data", "topology"]
    }

    fn list_tables_query(&self, dialect: &Dialect, schema: Option<&str>) -> String {
        let filter = schema.map_or_else(
            || {
                format!(
                    "table_schema !~ E'^pg_' AND table_schema NOT IN ({})",
                    escaped_list(dialect, self.technical_schema_names())
                )
            },
            |schema| format!("table_schema = {}", dialect.escape_string(schema)),
        );
        format!(
            "SELECT table_name AS \"tableName\", table_schema AS \"schema\" \
             FROM information_schema.tables WHERE table_type = 'BASE TABLE' \
             AND table_name != 'spatial_ref_sys' AND {filter} ORDER BY table_schema, table_name"
        )
    }

    fn list_schemas_query(&self, dialect: &Dialect, skip: &[&str]) -> Option<String> {
        let skipped: Vec<&str> = std::iter::once("public")
            .chain(self.technical_schema_names().iter().copied())
            .chain(skip.iter().copied())
            .collect();
        Some(format!(
            "SELECT schema_name AS \"schema\" FROM information_schema.schemata \
             WHERE schema_name !~ E'^pg_' AND schema_name NOT IN ({})",
            escaped_list(dialect, &skipped)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectKind;

    fn pg() -> Dialect {
        Dialect::new(DialectKind::Postgres).unwrap()
    }

    #[test]
    fn test_type_spellings() {
        let d = pg();
        assert_eq!(
            d.type_to_sql(&DataType::Date { precision: Some(3) }).unwrap(),
            "TIMESTAMP(3) WITH TIME ZONE"
        );
        assert_eq!(d.type_to_sql(&DataType::blob()).unwrap(), "BYTEA");
        assert_eq!(
            d.type_to_sql(&DataType::String { length: Some(10), binary: true }).unwrap(),
            "BYTEA"
        );
        assert_eq!(d.type_to_sql(&DataType::TinyInt(Default::default())).unwrap(), "SMALLINT");
        assert_eq!(
            d.type_to_sql(&DataType::Text {
                length: Some(crate::types::TextLength::Long)
            })
            .unwrap(),
            "TEXT"
        );
    }

    #[test]
    fn test_escaping() {
        let d = pg();
        assert_eq!(d.escape_string("O'Brien"), "'O''Brien'");
        assert_eq!(d.escape_buffer(&[0xde, 0xad]), "'\\xdead'");
    }

    #[test]
    fn test_json_paths() {
        let d = pg();
        let one = [JsonPathSegment::Key("name".into())];
        assert_eq!(
            PostgresDialect.json_path(&d, "\"data\"", &one, false).unwrap(),
            "(\"data\"->'name')"
        );
        let many = [JsonPathSegment::Key("a".into()), JsonPathSegment::Index(0)];
        assert_eq!(
            PostgresDialect.json_path(&d, "\"data\"", &many, true).unwrap(),
            "(\"data\"#>>ARRAY['a','0']::VARCHAR(255)[])"
        );
    }

    #[test]
    fn test_serial_columns() {
        assert_eq!(PostgresDialect.auto_increment_column("INTEGER"), "SERIAL");
        assert_eq!(PostgresDialect.auto_increment_column("BIGINT"), "BIGSERIAL");
    }

    #[test]
    fn test_rename_into_other_schema() {
        let d = pg();
        let before = TableName::new("users");
        let after = TableName::new("users").with_schema("archive");
        assert_eq!(
            PostgresDialect.rename_table(&d, &before, &after).unwrap(),
            "ALTER TABLE \"users\" SET SCHEMA \"archive\""
        );
        let renamed = TableName::new("people").with_schema("archive");
        assert!(PostgresDialect.rename_table(&d, &before, &renamed).is_err());
    }
}
