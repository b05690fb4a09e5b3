//! Catalog queries: columns, indexes, tables, schemas, foreign keys and the
//! server version.
//!
//! None of these take values, so everything is inlined. The row shapes are
//! whatever the engine's catalog returns.

use super::{
    ConstraintType, ListSchemasOptions, ListTablesOptions, Query, QueryGenerator,
    ShowConstraintsOptions,
};
use crate::bind::ValueBinder;
use crate::dialect::options::{validate_options, LIST_TABLES_SUPPORTABLE};
use crate::error::Result;
use crate::schema::TableRef;

impl QueryGenerator<'_> {
    fn catalog_query(&self, method: &'static str, mut sql: String) -> Result<Query> {
        sql.push(';');
        self.finish(method, sql, ValueBinder::inline())
    }

    /// Lists the columns of a table with their type, nullability, default
    /// and key.
    ///
    /// # Errors
    ///
    /// Never fails today; kept fallible like the other routines.
    pub fn describe_table_query(&self, table: &TableRef) -> Result<Query> {
        let sql = self
            .dialect
            .rules()
            .describe_table_query(self.dialect, &table.table_name());
        self.catalog_query("describeTableQuery", sql)
    }

    /// Lists the indexes of a table, one row per indexed column.
    ///
    /// # Errors
    ///
    /// Never fails today; kept fallible like the other routines.
    pub fn show_indexes_query(&self, table: &TableRef) -> Result<Query> {
        let sql = self
            .dialect
            .rules()
            .show_indexes_query(self.dialect, &table.table_name());
        self.catalog_query("showIndexesQuery", sql)
    }

    /// Lists base tables, leaving out the engine's own schemas.
    ///
    /// # Errors
    ///
    /// Fails when a schema is given to an engine without schemas.
    pub fn list_tables_query(&self, options: &ListTablesOptions) -> Result<Query> {
        let supported: &[&str] = if self.dialect.supports().schemas {
            LIST_TABLES_SUPPORTABLE
        } else {
            &[]
        };
        validate_options(
            "listTablesQuery",
            self.dialect,
            LIST_TABLES_SUPPORTABLE,
            supported,
            options,
        )?;
        let sql = self
            .dialect
            .rules()
            .list_tables_query(self.dialect, options.schema.as_deref());
        self.catalog_query("listTablesQuery", sql)
    }

    /// Lists user schemas. The engine's own schemas and `options.skip` are
    /// left out.
    ///
    /// # Errors
    ///
    /// Fails on engines without schemas.
    pub fn list_schemas_query(&self, options: &ListSchemasOptions) -> Result<Query> {
        if !self.dialect.supports().schemas {
            return Err(self.dialect.unsupported("schemas"));
        }
        let skip: Vec<&str> = options.skip.iter().map(String::as_str).collect();
        let sql = self
            .dialect
            .rules()
            .list_schemas_query(self.dialect, &skip)
            .ok_or_else(|| self.dialect.unsupported("listing schemas"))?;
        self.catalog_query("listSchemasQuery", sql)
    }

    /// Lists the foreign keys of a table, optionally only those on `column`.
    ///
    /// Engines with a constraint catalog answer through
    /// [`show_constraints_query`](Self::show_constraints_query); SQLite reads
    /// `pragma_foreign_key_list`.
    ///
    /// # Errors
    ///
    /// Fails on engines without a constraint catalog.
    pub fn get_foreign_key_query(&self, table: &TableRef, column: Option<&str>) -> Result<Query> {
        let table_name = table.table_name();
        let column = match (column, table.model()) {
            (Some(column), Some(model)) => Some(model.column_for(column)),
            (column, _) => column,
        };
        if let Some(sql) =
            self.dialect
                .rules()
                .foreign_key_list_query(self.dialect, &table_name, column)
        {
            return self.catalog_query("getForeignKeyQuery", sql);
        }
        self.show_constraints_query(
            table,
            &ShowConstraintsOptions {
                column_name: column.map(str::to_string),
                constraint_type: Some(ConstraintType::ForeignKey),
                ..ShowConstraintsOptions::default()
            },
        )
    }

    /// Query returning the server version in a `version` column.
    ///
    /// # Errors
    ///
    /// Never fails today; kept fallible like the other routines.
    pub fn version_query(&self) -> Result<Query> {
        let sql = self.dialect.rules().version_query().to_string();
        self.catalog_query("versionQuery", sql)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dialect::{Dialect, DialectKind};
    use crate::error::Error;
    use crate::schema::{AttributeDef, ModelSchema, TableName};
    use crate::types::DataType;

    fn generator_sql(
        kind: DialectKind,
        run: impl Fn(QueryGenerator<'_>) -> Result<Query>,
    ) -> Result<String> {
        let dialect = Dialect::new(kind).unwrap();
        run(dialect.query_generator()).map(|q| q.sql)
    }

    #[test]
    fn test_describe_table() {
        let users = TableRef::from("users");
        assert_eq!(
            generator_sql(DialectKind::Mysql, |g| g.describe_table_query(&users)).unwrap(),
            "SHOW FULL COLUMNS FROM `users`;"
        );
        assert_eq!(
            generator_sql(DialectKind::Sqlite, |g| g.describe_table_query(&users)).unwrap(),
            "PRAGMA TABLE_INFO(`users`);"
        );

        let pg = generator_sql(DialectKind::Postgres, |g| g.describe_table_query(&users)).unwrap();
        assert!(pg.starts_with("SELECT pk.constraint_type AS \"Constraint\""));
        assert!(pg.ends_with("WHERE c.table_name = 'users' AND c.table_schema = 'public';"));

        let app_users: TableRef = TableName::new("users").with_schema("app").into();
        let mssql =
            generator_sql(DialectKind::Mssql, |g| g.describe_table_query(&app_users)).unwrap();
        assert!(mssql.ends_with("WHERE t.TABLE_NAME = 'users' AND t.TABLE_SCHEMA = 'app';"));

        let db2 = generator_sql(DialectKind::Db2, |g| g.describe_table_query(&users)).unwrap();
        assert!(db2.ends_with(
            "FROM SYSCAT.COLUMNS WHERE TABNAME = 'users' AND TABSCHEMA = CURRENT SCHEMA;"
        ));
    }

    #[test]
    fn test_show_indexes() {
        let users = TableRef::from("users");
        assert_eq!(
            generator_sql(DialectKind::Mariadb, |g| g.show_indexes_query(&users)).unwrap(),
            "SHOW INDEX FROM `users`;"
        );
        assert_eq!(
            generator_sql(DialectKind::Sqlite, |g| g.show_indexes_query(&users)).unwrap(),
            "PRAGMA INDEX_LIST(`users`);"
        );

        let pg = generator_sql(DialectKind::Postgres, |g| g.show_indexes_query(&users)).unwrap();
        assert!(pg.ends_with(
            "WHERE i.tablename = 'users' AND i.schemaname = 'public' ORDER BY i.indexname, position_in_index;"
        ));

        let app_users: TableRef = TableName::new("users").with_schema("app").into();
        let mssql =
            generator_sql(DialectKind::Mssql, |g| g.show_indexes_query(&app_users)).unwrap();
        assert!(mssql.ends_with("WHERE I.[object_id] = OBJECT_ID('app.users') ORDER BY I.[name];"));

        let ibmi = generator_sql(DialectKind::Ibmi, |g| g.show_indexes_query(&users)).unwrap();
        assert_eq!(ibmi.matches("TABLE_SCHEMA = CURRENT SCHEMA").count(), 2);
    }

    #[test]
    fn test_list_tables_skips_engine_schemas() {
        let all = ListTablesOptions::default();
        let app = ListTablesOptions {
            schema: Some("app".into()),
        };

        assert_eq!(
            generator_sql(DialectKind::Mysql, |g| g.list_tables_query(&app)).unwrap(),
            "SELECT TABLE_NAME AS `tableName`, TABLE_SCHEMA AS `schema` FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_SCHEMA = 'app' ORDER BY TABLE_SCHEMA, TABLE_NAME;"
        );
        let mysql = generator_sql(DialectKind::Mysql, |g| g.list_tables_query(&all)).unwrap();
        assert!(mysql.contains(
            "AND TABLE_SCHEMA NOT IN ('MYSQL', 'INFORMATION_SCHEMA', 'PERFORMANCE_SCHEMA', 'SYS', "
        ));

        let pg = generator_sql(DialectKind::Postgres, |g| g.list_tables_query(&all)).unwrap();
        assert!(pg.contains(
            "AND table_schema !~ E'^pg_' AND table_schema NOT IN ('information_schema', 'tiger', 'tiger_data', 'topology')"
        ));

        let mssql = generator_sql(DialectKind::Mssql, |g| g.list_tables_query(&app)).unwrap();
        assert_eq!(mssql.matches("AND s.name = 'app'").count(), 2);
        assert!(mssql.contains(" EXCEPT "));

        let ibmi = generator_sql(DialectKind::Ibmi, |g| g.list_tables_query(&all)).unwrap();
        assert!(ibmi.contains("TABLE_SCHEMA NOT LIKE 'Q%' AND TABLE_SCHEMA NOT LIKE 'SYS%'"));

        assert_eq!(
            generator_sql(DialectKind::Sqlite, |g| g.list_tables_query(&all)).unwrap(),
            "SELECT name AS `tableName` FROM sqlite_master WHERE type = 'table' AND name != 'sqlite_sequence' ORDER BY name;"
        );
        assert!(matches!(
            generator_sql(DialectKind::Sqlite, |g| g.list_tables_query(&app)),
            Err(Error::UnsupportedOption { .. })
        ));
    }

    #[test]
    fn test_list_schemas() {
        let options = ListSchemasOptions {
            skip: vec!["audit".into()],
        };
        assert_eq!(
            generator_sql(DialectKind::Postgres, |g| g.list_schemas_query(&options)).unwrap(),
            "SELECT schema_name AS \"schema\" FROM information_schema.schemata \
             WHERE schema_name !~ E'^pg_' AND schema_name NOT IN \
             ('public', 'information_schema', 'tiger', 'tiger_data', 'topology', 'audit');"
        );
        assert_eq!(
            generator_sql(DialectKind::Mariadb, |g| g.list_schemas_query(&options)).unwrap(),
            "SELECT SCHEMA_NAME AS `schema` FROM INFORMATION_SCHEMA.SCHEMATA WHERE SCHEMA_NAME NOT IN \
             ('MYSQL', 'INFORMATION_SCHEMA', 'PERFORMANCE_SCHEMA', 'mysql', 'information_schema', \
             'performance_schema', 'audit');"
        );

        let mssql = generator_sql(DialectKind::Mssql, |g| g.list_schemas_query(&options)).unwrap();
        assert!(mssql.starts_with(
            "SELECT [name] AS [schema] FROM sys.schemas WHERE [name] NOT IN ('dbo', 'guest', "
        ));
        assert!(mssql.ends_with("'sys', 'audit');"));

        let db2 = generator_sql(DialectKind::Db2, |g| g.list_schemas_query(&options)).unwrap();
        assert!(db2.ends_with("NOT IN ('ERRORSCHEMA', 'NULLID', 'SQLJ', 'audit');"));

        let ibmi = generator_sql(DialectKind::Ibmi, |g| {
            g.list_schemas_query(&ListSchemasOptions::default())
        })
        .unwrap();
        assert!(!ibmi.contains("NOT IN"));

        assert!(matches!(
            generator_sql(DialectKind::Sqlite, |g| g.list_schemas_query(&options)),
            Err(Error::UnsupportedByDialect { .. })
        ));
    }

    #[test]
    fn test_foreign_keys_by_column() {
        let model = Arc::new(
            ModelSchema::new("posts")
                .attribute(AttributeDef::new("authorId", DataType::integer()).field("author_id")),
        );
        let posts = TableRef::Model(model);

        let by_column = |kind| {
            generator_sql(kind, |g| g.get_foreign_key_query(&posts, Some("authorId"))).unwrap()
        };
        assert_eq!(
            by_column(DialectKind::Sqlite),
            "SELECT * FROM pragma_foreign_key_list('posts') WHERE `from` = 'author_id';"
        );
        assert_eq!(
            generator_sql(DialectKind::Sqlite, |g| g.get_foreign_key_query(&posts, None)).unwrap(),
            "SELECT * FROM pragma_foreign_key_list('posts');"
        );

        let pg = by_column(DialectKind::Postgres);
        assert!(pg.contains("AND c.constraint_type = 'FOREIGN KEY'"));
        assert!(pg.contains("'author_id'"));
    }

    #[test]
    fn test_version_query() {
        assert_eq!(
            generator_sql(DialectKind::Postgres, |g| g.version_query()).unwrap(),
            "SHOW SERVER_VERSION;"
        );
        assert_eq!(
            generator_sql(DialectKind::Sqlite, |g| g.version_query()).unwrap(),
            "SELECT sqlite_version() as `version`;"
        );
        assert_eq!(
            generator_sql(DialectKind::Mariadb, |g| g.version_query()).unwrap(),
            "SELECT CAST(VERSION() AS CHAR) AS `version`;"
        );
    }
}
