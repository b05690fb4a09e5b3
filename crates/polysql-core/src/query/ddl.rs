//! Table, column, schema and index DDL.

use indexmap::IndexMap;

use super::{
    AddColumnOptions, AddIndexOptions, CreateSchemaOptions, CreateTableOptions, DropTableOptions,
    Query, QueryGenerator, RemoveIndexOptions, RemoveOptions, RenameTableOptions, TruncateOptions,
};
use crate::bind::ValueBinder;
use crate::dialect::options::{
    validate_options, ADD_COLUMN_SUPPORTABLE, ADD_INDEX_SUPPORTABLE, CREATE_SCHEMA_SUPPORTABLE,
    CREATE_TABLE_SUPPORTABLE, DROP_SCHEMA_SUPPORTABLE, DROP_TABLE_SUPPORTABLE,
    REMOVE_COLUMN_SUPPORTABLE, REMOVE_INDEX_SUPPORTABLE, RENAME_TABLE_SUPPORTABLE,
    TRUNCATE_SUPPORTABLE,
};
use crate::dialect::supports::SupportedOptions;
use crate::dialect::{AlterColumnStyle, DialectKind};
use crate::error::{Error, Result};
use crate::expr::FormatContext;
use crate::schema::{
    index_name, AttributeDef, DefaultValue, ModelSchema, References, TableName, TableRef, Unique,
};
use crate::types::DataType;

/// One rendered column plus what has to go elsewhere in the statement.
struct ColumnSql {
    definition: String,
    /// Out-of-line `FOREIGN KEY (...) REFERENCES ...` clause.
    foreign_key: Option<String>,
    /// Trailing `COMMENT ON COLUMN` statement.
    comment: Option<String>,
}

impl QueryGenerator<'_> {
    /// `REFERENCES t (k)` with its actions and deferrability.
    fn references_clause(&self, references: &References) -> Result<String> {
        let mut sql = format!(
            "REFERENCES {} ({})",
            self.quote_table_name(&references.table),
            self.quote_identifier(&references.key)
        );
        if let Some(action) = references.on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action.as_sql());
        }
        if let Some(action) = references.on_update {
            if !self.dialect.supports().constraints.on_update {
                return Err(self.dialect.unsupported("ON UPDATE on foreign keys"));
            }
            sql.push_str(" ON UPDATE ");
            sql.push_str(action.as_sql());
        }
        if let Some(deferrable) = references.deferrable {
            sql.push(' ');
            sql.push_str(self.deferrable_snippet(deferrable)?);
        }
        Ok(sql)
    }

    fn default_sql(&self, attribute: &AttributeDef) -> Result<Option<String>> {
        match &attribute.default {
            Some(DefaultValue::Value(value)) => {
                Ok(Some(self.escape(value, Some(&attribute.data_type))?))
            }
            Some(DefaultValue::Expression(raw)) => Ok(Some(raw.clone())),
            None => Ok(None),
        }
    }

    /// Standalone `COMMENT ON COLUMN`, where the engine has one.
    fn comment_statement(&self, table: &TableName, column: &str, text: &str) -> Option<String> {
        if self.dialect.kind() == DialectKind::Postgres {
            return Some(format!(
                "COMMENT ON COLUMN {}.{column} IS {};",
                self.quote_table_name(table),
                self.dialect.escape_string(text)
            ));
        }
        self.dialect.warn_once(&format!(
            "{} does not support column comments, they are left out of the DDL",
            self.dialect.name()
        ));
        None
    }

    fn attribute_sql(
        &self,
        attribute: &AttributeDef,
        table: &TableName,
        inline_primary_key: bool,
    ) -> Result<ColumnSql> {
        let rules = self.dialect.rules();
        let supports = self.dialect.supports();
        let column = self.quote_identifier(&attribute.field);

        let mut sql_type = self.dialect.type_to_sql(&attribute.data_type)?;
        let type_declares_key = attribute.auto_increment && rules.auto_increment_is_primary_key();
        if attribute.auto_increment {
            sql_type = rules.auto_increment_column(&sql_type);
        }
        let mut sql = format!("{column} {sql_type}");

        if !attribute.allow_null && !type_declares_key {
            sql.push_str(" NOT NULL");
        }
        if !attribute.auto_increment {
            if let Some(default) = self.default_sql(attribute)? {
                sql.push_str(" DEFAULT ");
                sql.push_str(&default);
            }
        }
        if attribute.unique == Some(Unique::Single) && !attribute.primary_key {
            sql.push_str(" UNIQUE");
        }
        if let DataType::Enum { values } = &attribute.data_type {
            if !supports.data_types.enums {
                let members: Vec<String> =
                    values.iter().map(|v| self.dialect.escape_string(v)).collect();
                sql.push_str(&format!(" CHECK ({column} IN ({}))", members.join(", ")));
            }
        }
        if inline_primary_key && attribute.primary_key && !type_declares_key {
            sql.push_str(" PRIMARY KEY");
        }

        let mut comment = None;
        if let Some(text) = &attribute.comment {
            if supports.create_table.comment {
                sql.push_str(" COMMENT ");
                sql.push_str(&self.dialect.escape_string(text));
            } else {
                comment = self.comment_statement(table, &column, text);
            }
        }

        let foreign_key = match &attribute.references {
            None => None,
            Some(references) => {
                let clause = self.references_clause(references)?;
                if rules.inline_foreign_keys() {
                    sql.push(' ');
                    sql.push_str(&clause);
                    None
                } else {
                    Some(format!("FOREIGN KEY ({column}) {clause}"))
                }
            }
        };

        Ok(ColumnSql {
            definition: sql,
            foreign_key,
            comment,
        })
    }

    /// Builds a `CREATE TABLE` that leaves an existing table alone.
    ///
    /// Composite primary keys go out of line, as do foreign keys on engines
    /// that cannot declare them next to the column. Named unique groups and
    /// the extra keys in `options` become `CONSTRAINT ... UNIQUE` clauses.
    ///
    /// # Errors
    ///
    /// Fails on unsupported options, a model without attributes, and types
    /// or defaults the engine cannot render.
    pub fn create_table_query(
        &self,
        model: &ModelSchema,
        options: &CreateTableOptions,
    ) -> Result<Query> {
        let supports = self.dialect.supports();
        validate_options(
            "createTableQuery",
            self.dialect,
            CREATE_TABLE_SUPPORTABLE,
            &supports.create_table.supported(),
            options,
        )?;

        let table = &model.table;
        let quoted_table = self.quote_table_name(table);
        let primary_keys: Vec<String> =
            model.primary_keys().iter().map(|a| a.field.clone()).collect();
        let composite = primary_keys.len() > 1;

        let mut body = Vec::new();
        let mut foreign_keys = Vec::new();
        let mut comments = Vec::new();
        for attribute in model.attributes() {
            let column = self.attribute_sql(attribute, table, !composite)?;
            body.push(column.definition);
            foreign_keys.extend(column.foreign_key);
            comments.extend(column.comment);
        }
        if body.is_empty() {
            return Err(Error::invalid(format!("table {} has no attributes", table.table)));
        }
        if composite {
            body.push(format!("PRIMARY KEY ({})", self.quote_identifiers(&primary_keys)));
        }

        let mut groups: IndexMap<&str, Vec<String>> = IndexMap::new();
        for attribute in model.attributes() {
            if let Some(Unique::Group(name)) = &attribute.unique {
                groups.entry(name.as_str()).or_default().push(attribute.field.clone());
            }
        }
        for (name, fields) in groups {
            body.push(format!(
                "CONSTRAINT {} UNIQUE ({})",
                self.quote_identifier(name),
                self.quote_identifiers(&fields)
            ));
        }
        for key in &options.unique_keys {
            let fields: Vec<String> = key
                .fields
                .iter()
                .map(|f| model.column_for(f).to_string())
                .collect();
            body.push(format!(
                "CONSTRAINT {} UNIQUE ({})",
                self.quote_identifier(&key.name),
                self.quote_identifiers(&fields)
            ));
        }
        body.extend(foreign_keys);

        let mut sql = format!(
            "{} ({})",
            self.dialect.rules().create_table_prefix(self.dialect, &quoted_table),
            body.join(", ")
        );
        if let Some(engine) = &options.engine {
            sql.push_str(&format!(" ENGINE={engine}"));
        }
        if let Some(charset) = &options.charset {
            sql.push_str(&format!(" DEFAULT CHARSET={charset}"));
        }
        if let Some(collate) = &options.collate {
            sql.push_str(&format!(" COLLATE {collate}"));
        }
        if let Some(row_format) = &options.row_format {
            sql.push_str(&format!(" ROW_FORMAT={row_format}"));
        }
        if let Some(comment) = &options.comment {
            sql.push_str(" COMMENT ");
            sql.push_str(&self.dialect.escape_string(comment));
        }
        if let Some(start) = options.initial_auto_increment {
            sql.push_str(&format!(" AUTO_INCREMENT={start}"));
        }
        sql.push(';');
        for comment in comments {
            sql.push(' ');
            sql.push_str(&comment);
        }
        self.finish("createTableQuery", sql, ValueBinder::inline())
    }

    /// # Errors
    ///
    /// Fails on unsupported options.
    pub fn drop_table_query(&self, table: &TableRef, options: &DropTableOptions) -> Result<Query> {
        validate_options(
            "dropTableQuery",
            self.dialect,
            DROP_TABLE_SUPPORTABLE,
            &self.dialect.supports().drop_table.supported(),
            options,
        )?;
        let quoted = self.quote_table(table, None);
        let mut sql = self.dialect.rules().drop_table_prefix(self.dialect, &quoted);
        if options.cascade {
            sql.push_str(" CASCADE");
        }
        sql.push(';');
        self.finish("dropTableQuery", sql, ValueBinder::inline())
    }

    /// Renames a table. Moving it to another schema needs `change_schema`.
    ///
    /// # Errors
    ///
    /// Fails on unsupported options, and when the schemas differ without
    /// `change_schema`.
    pub fn rename_table_query(
        &self,
        before: &TableName,
        after: &TableName,
        options: &RenameTableOptions,
    ) -> Result<Query> {
        validate_options(
            "renameTableQuery",
            self.dialect,
            RENAME_TABLE_SUPPORTABLE,
            &self.dialect.supports().rename_table.supported(),
            options,
        )?;
        if before.schema != after.schema && !options.change_schema {
            return Err(Error::invalid(
                "renaming a table into another schema requires changeSchema",
            ));
        }
        let mut sql = self.dialect.rules().rename_table(self.dialect, before, after)?;
        sql.push(';');
        self.finish("renameTableQuery", sql, ValueBinder::inline())
    }

    /// Empties a table. Engines without TRUNCATE get a `DELETE FROM`.
    ///
    /// # Errors
    ///
    /// Fails on unsupported options.
    pub fn truncate_table_query(
        &self,
        table: &TableRef,
        options: &TruncateOptions,
    ) -> Result<Query> {
        validate_options(
            "truncateTableQuery",
            self.dialect,
            TRUNCATE_SUPPORTABLE,
            &self.dialect.supports().truncate.supported(),
            options,
        )?;
        let sql = self
            .dialect
            .rules()
            .truncate_table(self.dialect, &table.table_name(), options)
            .into_iter()
            .map(|statement| format!("{statement};"))
            .collect::<Vec<_>>()
            .join(" ");
        self.finish("truncateTableQuery", sql, ValueBinder::inline())
    }

    /// # Errors
    ///
    /// Fails on unsupported options, and on types or defaults the engine
    /// cannot render.
    pub fn add_column_query(
        &self,
        table: &TableRef,
        attribute: &AttributeDef,
        options: &AddColumnOptions,
    ) -> Result<Query> {
        validate_options(
            "addColumnQuery",
            self.dialect,
            ADD_COLUMN_SUPPORTABLE,
            &self.dialect.supports().add_column.supported(),
            options,
        )?;
        let table_name = table.table_name();
        let column = self.attribute_sql(attribute, &table_name, true)?;

        let mut sql = format!(
            "ALTER TABLE {} {} ",
            self.quote_table_name(&table_name),
            self.dialect.rules().add_column_keyword()
        );
        if options.if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&column.definition);
        if let Some(foreign_key) = column.foreign_key {
            sql.push_str(", ADD ");
            sql.push_str(&foreign_key);
        }
        sql.push(';');
        if let Some(comment) = column.comment {
            sql.push(' ');
            sql.push_str(&comment);
        }
        self.finish("addColumnQuery", sql, ValueBinder::inline())
    }

    /// # Errors
    ///
    /// Fails on unsupported options.
    pub fn remove_column_query(
        &self,
        table: &TableRef,
        attribute: &str,
        options: &RemoveOptions,
    ) -> Result<Query> {
        validate_options(
            "removeColumnQuery",
            self.dialect,
            REMOVE_COLUMN_SUPPORTABLE,
            &self.dialect.supports().remove_column.supported(),
            options,
        )?;
        let column = table.model().map_or(attribute, |model| model.column_for(attribute));
        let mut sql = format!("ALTER TABLE {} DROP COLUMN ", self.quote_table(table, None));
        if options.if_exists {
            sql.push_str("IF EXISTS ");
        }
        sql.push_str(&self.quote_identifier(column));
        if options.cascade {
            sql.push_str(" CASCADE");
        }
        sql.push(';');
        self.finish("removeColumnQuery", sql, ValueBinder::inline())
    }

    /// Redefines existing columns to match `attributes`.
    ///
    /// PostgreSQL changes nullability, default and type one `ALTER COLUMN`
    /// at a time. MySQL restates each column with `CHANGE`. SQL Server
    /// alters the type and nullability, then adds defaults and keys as
    /// separate statements. Db2 chains `SET DATA TYPE` clauses in one
    /// statement. An attribute with a reference gains a foreign key.
    ///
    /// # Errors
    ///
    /// Fails without attributes, on SQLite, and on types or defaults the
    /// engine cannot render.
    pub fn change_column_query(
        &self,
        table: &TableRef,
        attributes: &[AttributeDef],
    ) -> Result<Query> {
        if attributes.is_empty() {
            return Err(Error::invalid("changeColumnQuery needs at least one attribute"));
        }
        let table_name = table.table_name();
        let quoted_table = self.quote_table_name(&table_name);

        let sql = match self.dialect.rules().alter_column_style() {
            AlterColumnStyle::RenameOnly => {
                return Err(self.dialect.unsupported("changing a column definition"));
            }
            AlterColumnStyle::Change => {
                let mut clauses = Vec::with_capacity(attributes.len());
                for attribute in attributes {
                    let column = self.attribute_sql(attribute, &table_name, false)?;
                    clauses.push(format!(
                        "CHANGE {} {}",
                        self.quote_identifier(&attribute.field),
                        column.definition
                    ));
                    if let Some(foreign_key) = column.foreign_key {
                        clauses.push(format!("ADD {foreign_key}"));
                    }
                }
                format!("ALTER TABLE {quoted_table} {};", clauses.join(", "))
            }
            AlterColumnStyle::Piecewise => {
                let mut statements = Vec::new();
                for attribute in attributes {
                    statements.extend(self.piecewise_change(
                        &table_name,
                        &quoted_table,
                        attribute,
                    )?);
                }
                statements.join(" ")
            }
            AlterColumnStyle::AlterColumn => {
                let mut statements = Vec::new();
                for attribute in attributes {
                    let column = self.quote_identifier(&attribute.field);
                    let null = if attribute.allow_null { "NULL" } else { "NOT NULL" };
                    statements.push(format!(
                        "ALTER TABLE {quoted_table} ALTER COLUMN {column} {} {null};",
                        self.dialect.type_to_sql(&attribute.data_type)?
                    ));
                    if let Some(default) = self.default_sql(attribute)? {
                        statements.push(format!(
                            "ALTER TABLE {quoted_table} ADD DEFAULT {default} FOR {column};"
                        ));
                    }
                    statements.extend(
                        self.key_clauses(&column, attribute, None)?
                            .into_iter()
                            .map(|clause| format!("ALTER TABLE {quoted_table} {clause};")),
                    );
                    if let Some(text) = &attribute.comment {
                        statements.extend(self.comment_statement(&table_name, &column, text));
                    }
                }
                statements.join(" ")
            }
            AlterColumnStyle::SetDataType => {
                let mut clauses = Vec::new();
                let mut comments = Vec::new();
                for attribute in attributes {
                    let column = self.quote_identifier(&attribute.field);
                    clauses.push(format!(
                        "ALTER COLUMN {column} SET DATA TYPE {}",
                        self.dialect.type_to_sql(&attribute.data_type)?
                    ));
                    let nullability = if attribute.allow_null { "DROP" } else { "SET" };
                    clauses.push(format!("ALTER COLUMN {column} {nullability} NOT NULL"));
                    if let Some(default) = self.default_sql(attribute)? {
                        clauses.push(format!("ALTER COLUMN {column} SET DEFAULT {default}"));
                    }
                    let constraint =
                        self.quote_identifier(&format!("{}_foreign_idx", attribute.field));
                    clauses.extend(self.key_clauses(&column, attribute, Some(&constraint))?);
                    if let Some(text) = &attribute.comment {
                        comments.extend(self.comment_statement(&table_name, &column, text));
                    }
                }
                let mut sql = format!("ALTER TABLE {quoted_table} {};", clauses.join(" "));
                for comment in comments {
                    sql.push(' ');
                    sql.push_str(&comment);
                }
                sql
            }
        };
        self.finish("changeColumnQuery", sql, ValueBinder::inline())
    }

    fn piecewise_change(
        &self,
        table_name: &TableName,
        quoted_table: &str,
        attribute: &AttributeDef,
    ) -> Result<Vec<String>> {
        let column = self.quote_identifier(&attribute.field);
        let alter = format!("ALTER TABLE {quoted_table} ALTER COLUMN {column}");
        let referenced = attribute.references.is_some();
        let mut statements = Vec::new();

        if !attribute.allow_null {
            statements.push(format!("{alter} SET NOT NULL;"));
        } else if !referenced {
            statements.push(format!("{alter} DROP NOT NULL;"));
        }
        match self.default_sql(attribute)? {
            Some(default) => statements.push(format!("{alter} SET DEFAULT {default};")),
            None if !referenced => statements.push(format!("{alter} DROP DEFAULT;")),
            None => {}
        }
        statements.extend(
            self.key_clauses(&column, attribute, None)?
                .into_iter()
                .map(|clause| format!("ALTER TABLE {quoted_table} {clause};")),
        );
        if !referenced {
            statements.push(format!(
                "{alter} TYPE {};",
                self.dialect.type_to_sql(&attribute.data_type)?
            ));
        }
        if let Some(text) = &attribute.comment {
            statements.extend(self.comment_statement(table_name, &column, text));
        }
        Ok(statements)
    }

    /// `ADD UNIQUE` and `ADD FOREIGN KEY` clauses for a changed column.
    fn key_clauses(
        &self,
        column: &str,
        attribute: &AttributeDef,
        foreign_key_name: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut clauses = Vec::new();
        if attribute.unique == Some(Unique::Single) {
            clauses.push(format!("ADD UNIQUE ({column})"));
        }
        if let Some(references) = &attribute.references {
            let constraint =
                foreign_key_name.map_or_else(String::new, |name| format!("CONSTRAINT {name} "));
            clauses.push(format!(
                "ADD {constraint}FOREIGN KEY ({column}) {}",
                self.references_clause(references)?
            ));
        }
        Ok(clauses)
    }

    /// Renames the `before` column of a table to `after.field`.
    ///
    /// MySQL and MariaDB rename with `CHANGE`, which restates the column,
    /// so `after` carries the full definition. SQL Server goes through
    /// `sp_rename`.
    ///
    /// # Errors
    ///
    /// Fails on types or defaults the engine cannot render, when the
    /// definition is restated.
    pub fn rename_column_query(
        &self,
        table: &TableRef,
        before: &str,
        after: &AttributeDef,
    ) -> Result<Query> {
        let table_name = table.table_name();
        let quoted_table = self.quote_table_name(&table_name);
        let before =
            self.quote_identifier(table.model().map_or(before, |model| model.column_for(before)));

        let sql = match self.dialect.rules().alter_column_style() {
            AlterColumnStyle::Change => format!(
                "ALTER TABLE {quoted_table} CHANGE {before} {};",
                self.attribute_sql(after, &table_name, false)?.definition
            ),
            AlterColumnStyle::AlterColumn => format!(
                "EXEC sp_rename {}, {}, 'COLUMN';",
                self.dialect.escape_string(&format!("{quoted_table}.{before}")),
                self.dialect.escape_string(&after.field)
            ),
            _ => format!(
                "ALTER TABLE {quoted_table} RENAME COLUMN {before} TO {};",
                self.quote_identifier(&after.field)
            ),
        };
        self.finish("renameColumnQuery", sql, ValueBinder::inline())
    }

    /// # Errors
    ///
    /// Fails on unsupported options and on engines without schemas.
    pub fn create_schema_query(
        &self,
        schema: &str,
        options: &CreateSchemaOptions,
    ) -> Result<Query> {
        let supports = self.dialect.supports();
        validate_options(
            "createSchemaQuery",
            self.dialect,
            CREATE_SCHEMA_SUPPORTABLE,
            &supports.create_schema.supported(),
            options,
        )?;
        if !supports.schemas {
            return Err(self.dialect.unsupported("schemas"));
        }

        let mut sql = String::from("CREATE ");
        if options.replace {
            sql.push_str("OR REPLACE ");
        }
        sql.push_str("SCHEMA ");
        if options.if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&self.quote_identifier(schema));
        if let Some(owner) = &options.authorization {
            sql.push_str(" AUTHORIZATION ");
            sql.push_str(&self.quote_identifier(owner));
        }
        if let Some(charset) = &options.charset {
            sql.push_str(" DEFAULT CHARACTER SET ");
            sql.push_str(&self.dialect.escape_string(charset));
        }
        if let Some(collate) = &options.collate {
            sql.push_str(" DEFAULT COLLATE ");
            sql.push_str(&self.dialect.escape_string(collate));
        }
        if let Some(comment) = &options.comment {
            sql.push_str(" COMMENT ");
            sql.push_str(&self.dialect.escape_string(comment));
        }
        sql.push(';');
        self.finish("createSchemaQuery", sql, ValueBinder::inline())
    }

    /// # Errors
    ///
    /// Fails on unsupported options and on engines without schemas.
    pub fn drop_schema_query(&self, schema: &str, options: &RemoveOptions) -> Result<Query> {
        let supports = self.dialect.supports();
        validate_options(
            "dropSchemaQuery",
            self.dialect,
            DROP_SCHEMA_SUPPORTABLE,
            &supports.drop_schema.supported(),
            options,
        )?;
        if !supports.schemas {
            return Err(self.dialect.unsupported("schemas"));
        }

        let mut sql = String::from("DROP SCHEMA ");
        if options.if_exists {
            sql.push_str("IF EXISTS ");
        }
        sql.push_str(&self.quote_identifier(schema));
        if options.cascade {
            sql.push_str(" CASCADE");
        } else if self.dialect.rules().drop_schema_restrict() {
            sql.push_str(" RESTRICT");
        }
        sql.push(';');
        self.finish("dropSchemaQuery", sql, ValueBinder::inline())
    }

    /// Builds a `CREATE INDEX` over `fields`.
    ///
    /// Unnamed indexes are called `{table}_{fields}` in snake case, with the
    /// prefix in place of the table when one is given and `_unique` for
    /// unique ones.
    ///
    /// # Errors
    ///
    /// Fails on unsupported options, an empty field list and a predicate
    /// that does not compile.
    pub fn add_index_query(
        &self,
        table: &TableRef,
        fields: &[String],
        options: &AddIndexOptions,
    ) -> Result<Query> {
        validate_options(
            "addIndexQuery",
            self.dialect,
            ADD_INDEX_SUPPORTABLE,
            &self.dialect.supports().index.supported(),
            options,
        )?;
        if fields.is_empty() {
            return Err(Error::invalid("an index needs at least one field"));
        }

        let model = table.model();
        let table_name = table.table_name();
        let columns: Vec<String> = fields
            .iter()
            .map(|field| model.map_or(field.as_str(), |m| m.column_for(field)).to_string())
            .collect();
        let name = options.name.clone().unwrap_or_else(|| {
            index_name(
                options.prefix.as_deref().unwrap_or(&table_name.table),
                &columns,
                options.unique,
            )
        });
        let using_before_table = self.dialect.kind().is_mysql_family();

        let mut sql = String::from("CREATE ");
        if options.unique {
            sql.push_str("UNIQUE ");
        } else if let Some(kind) = &options.index_type {
            sql.push_str(&kind.to_uppercase());
            sql.push(' ');
        }
        sql.push_str("INDEX ");
        if options.concurrently {
            sql.push_str("CONCURRENTLY ");
        }
        if options.if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&self.quote_identifier(&name));
        if let (true, Some(using)) = (using_before_table, &options.using) {
            sql.push_str(&format!(" USING {using}"));
        }
        sql.push_str(" ON ");
        sql.push_str(&self.quote_table_name(&table_name));
        if let (false, Some(using)) = (using_before_table, &options.using) {
            sql.push_str(&format!(" USING {using}"));
        }

        let keys: Vec<String> = columns
            .iter()
            .map(|column| match &options.operator {
                Some(operator) => format!("{} {operator}", self.quote_identifier(column)),
                None => self.quote_identifier(column),
            })
            .collect();
        sql.push_str(&format!(" ({})", keys.join(", ")));

        if !options.include.is_empty() {
            sql.push_str(&format!(" INCLUDE ({})", self.quote_identifiers(&options.include)));
        }
        if let Some(parser) = &options.parser {
            sql.push_str(&format!(" WITH PARSER {parser}"));
        }
        if let Some(filter) = options.where_clause.as_ref().filter(|w| !w.is_empty()) {
            let ctx = FormatContext::default().with_model(model);
            let predicate = self.where_item_query(filter, &ctx, &mut ValueBinder::inline())?;
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }
        sql.push(';');
        self.finish("addIndexQuery", sql, ValueBinder::inline())
    }

    /// # Errors
    ///
    /// Fails on options the engine cannot apply, such as `cascade` on SQLite.
    pub fn remove_index_query(
        &self,
        table: &TableRef,
        index: &str,
        options: &RemoveIndexOptions,
    ) -> Result<Query> {
        validate_options(
            "removeIndexQuery",
            self.dialect,
            REMOVE_INDEX_SUPPORTABLE,
            &self.dialect.supports().remove_index.supported(),
            options,
        )?;
        let mut sql = self
            .dialect
            .rules()
            .remove_index(self.dialect, &table.table_name(), index, options);
        sql.push(';');
        self.finish("removeIndexQuery", sql, ValueBinder::inline())
    }

    /// Query returning a row when the table exists.
    ///
    /// # Errors
    ///
    /// Never fails today; kept fallible like the other routines.
    pub fn table_exists_query(&self, table: &TableRef) -> Result<Query> {
        let mut sql = self
            .dialect
            .rules()
            .table_exists_query(self.dialect, &table.table_name());
        sql.push(';');
        self.finish("tableExistsQuery", sql, ValueBinder::inline())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::filter::Where;
    use crate::schema::{Deferrable, ReferentialAction, UniqueKey};

    fn users() -> ModelSchema {
        ModelSchema::new("users")
            .attribute(AttributeDef::new("id", DataType::integer()).primary_key().auto_increment())
            .attribute(AttributeDef::new("email", DataType::string()).not_null().unique())
            .attribute(AttributeDef::new("name", DataType::string()).default_value("anon"))
            .attribute(
                AttributeDef::new("teamId", DataType::integer())
                    .field("team_id")
                    .references(
                        References::new("teams", "id").on_delete(ReferentialAction::Cascade),
                    ),
            )
    }

    fn create(kind: DialectKind, model: &ModelSchema) -> Result<String> {
        let dialect = Dialect::new(kind).unwrap();
        dialect
            .query_generator()
            .create_table_query(model, &CreateTableOptions::default())
            .map(|q| q.sql)
    }

    #[test]
    fn test_create_table_postgres() {
        assert_eq!(
            create(DialectKind::Postgres, &users()).unwrap(),
            "CREATE TABLE IF NOT EXISTS \"users\" (\"id\" SERIAL NOT NULL PRIMARY KEY, \"email\" VARCHAR(255) NOT NULL UNIQUE, \"name\" VARCHAR(255) DEFAULT 'anon', \"team_id\" INTEGER REFERENCES \"teams\" (\"id\") ON DELETE CASCADE);"
        );
    }

    #[test]
    fn test_create_table_sqlite_autoincrement_declares_key() {
        let sql = create(DialectKind::Sqlite, &users()).unwrap();
        assert!(sql.starts_with(
            "CREATE TABLE IF NOT EXISTS `users` (`id` INTEGER PRIMARY KEY AUTOINCREMENT, `email` TEXT NOT NULL UNIQUE"
        ));
        assert!(!sql.contains("AUTOINCREMENT NOT NULL"));
    }

    #[test]
    fn test_foreign_keys_out_of_line_on_mysql() {
        let sql = create(DialectKind::Mysql, &users()).unwrap();
        assert!(sql.contains(
            "`team_id` INTEGER, FOREIGN KEY (`team_id`) REFERENCES `teams` (`id`) ON DELETE CASCADE)"
        ));
        let db2 = create(DialectKind::Db2, &users()).unwrap();
        assert!(db2.starts_with("CREATE TABLE \"users\" ("));
        assert!(db2.contains(
            "FOREIGN KEY (\"team_id\") REFERENCES \"teams\" (\"id\") ON DELETE CASCADE"
        ));
    }

    #[test]
    fn test_mssql_create_guard_and_inline_references() {
        let sql = create(DialectKind::Mssql, &users()).unwrap();
        assert!(sql.starts_with(
            "IF OBJECT_ID('[users]', 'U') IS NULL CREATE TABLE [users] \
             ([id] INTEGER IDENTITY(1,1) NOT NULL PRIMARY KEY"
        ));
        assert!(sql.contains("[team_id] INTEGER REFERENCES [teams] ([id]) ON DELETE CASCADE"));
    }

    #[test]
    fn test_composite_key_and_unique_groups() {
        let model = ModelSchema::new("memberships")
            .attribute(
                AttributeDef::new("userId", DataType::integer())
                    .field("user_id")
                    .primary_key(),
            )
            .attribute(
                AttributeDef::new("teamId", DataType::integer())
                    .field("team_id")
                    .primary_key(),
            )
            .attribute(AttributeDef::new("slot", DataType::integer()).unique_group("slot_per_team"))
            .attribute(
                AttributeDef::new("rank", DataType::integer()).unique_group("slot_per_team"),
            );
        assert_eq!(
            create(DialectKind::Postgres, &model).unwrap(),
            "CREATE TABLE IF NOT EXISTS \"memberships\" (\"user_id\" INTEGER NOT NULL, \"team_id\" INTEGER NOT NULL, \"slot\" INTEGER, \"rank\" INTEGER, PRIMARY KEY (\"user_id\", \"team_id\"), CONSTRAINT \"slot_per_team\" UNIQUE (\"slot\", \"rank\"));"
        );
    }

    #[test]
    fn test_enum_check_where_not_native() {
        let model = ModelSchema::new("users")
            .attribute(AttributeDef::new("status", DataType::enumeration(["active", "banned"])));
        assert_eq!(
            create(DialectKind::Sqlite, &model).unwrap(),
            "CREATE TABLE IF NOT EXISTS `users` (`status` TEXT CHECK (`status` IN ('active', 'banned')));"
        );
        assert_eq!(
            create(DialectKind::Mysql, &model).unwrap(),
            "CREATE TABLE IF NOT EXISTS `users` (`status` ENUM('active', 'banned'));"
        );
    }

    #[test]
    fn test_column_comments() {
        let model = ModelSchema::new("users")
            .attribute(AttributeDef::new("bio", DataType::text()).comment("About me"));
        assert_eq!(
            create(DialectKind::Postgres, &model).unwrap(),
            "CREATE TABLE IF NOT EXISTS \"users\" (\"bio\" TEXT); COMMENT ON COLUMN \"users\".\"bio\" IS 'About me';"
        );
        assert_eq!(
            create(DialectKind::Mysql, &model).unwrap(),
            "CREATE TABLE IF NOT EXISTS `users` (`bio` TEXT COMMENT 'About me');"
        );
    }

    #[test]
    fn test_mysql_table_options() {
        let mysql = Dialect::new(DialectKind::Mysql).unwrap();
        let options = CreateTableOptions {
            engine: Some("InnoDB".into()),
            charset: Some("utf8mb4".into()),
            initial_auto_increment: Some(100),
            unique_keys: vec![UniqueKey {
                name: "users_name_email".into(),
                fields: vec!["name".into(), "email".into()],
            }],
            ..CreateTableOptions::default()
        };
        let model = ModelSchema::new("users")
            .attribute(AttributeDef::new("name", DataType::string()))
            .attribute(AttributeDef::new("email", DataType::string()));
        assert_eq!(
            mysql.query_generator().create_table_query(&model, &options).unwrap().sql,
            "CREATE TABLE IF NOT EXISTS `users` (`name` VARCHAR(255), `email` VARCHAR(255), CONSTRAINT `users_name_email` UNIQUE (`name`, `email`)) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 AUTO_INCREMENT=100;"
        );

        let pg = Dialect::new(DialectKind::Postgres).unwrap();
        let err = pg.query_generator().create_table_query(&model, &options).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOption { ref options, .. }
            if options == &["charset", "engine", "initialAutoIncrement"]));
    }

    #[test]
    fn test_deferrable_references_need_support() {
        let model = ModelSchema::new("users").attribute(
            AttributeDef::new("team_id", DataType::integer())
                .references(
                    References::new("teams", "id").deferrable(Deferrable::InitiallyDeferred),
                ),
        );
        assert!(create(DialectKind::Postgres, &model)
            .unwrap()
            .contains("REFERENCES \"teams\" (\"id\") DEFERRABLE INITIALLY DEFERRED"));
        assert!(create(DialectKind::Mysql, &model).is_err());
    }

    #[test]
    fn test_drop_and_truncate() {
        let pg = Dialect::new(DialectKind::Postgres).unwrap();
        let generator = pg.query_generator();
        assert_eq!(
            generator
                .drop_table_query(&"users".into(), &DropTableOptions { cascade: true })
                .unwrap()
                .sql,
            "DROP TABLE IF EXISTS \"users\" CASCADE;"
        );
        assert_eq!(
            generator
                .truncate_table_query(
                    &"users".into(),
                    &TruncateOptions {
                        cascade: true,
                        restart_identity: true
                    }
                )
                .unwrap()
                .sql,
            "TRUNCATE \"users\" RESTART IDENTITY CASCADE;"
        );

        let sqlite = Dialect::new(DialectKind::Sqlite).unwrap();
        assert_eq!(
            sqlite
                .query_generator()
                .truncate_table_query(&"users".into(), &TruncateOptions::default())
                .unwrap()
                .sql,
            "DELETE FROM `users`;"
        );
        assert!(sqlite
            .query_generator()
            .drop_table_query(&"users".into(), &DropTableOptions { cascade: true })
            .is_err());
    }

    #[test]
    fn test_rename_table_between_schemas() {
        let pg = Dialect::new(DialectKind::Postgres).unwrap();
        let generator = pg.query_generator();
        let before = TableName::new("users");
        let after = TableName::new("users").with_schema("archive");
        assert!(generator
            .rename_table_query(&before, &after, &RenameTableOptions::default())
            .is_err());
        assert_eq!(
            generator
                .rename_table_query(&before, &after, &RenameTableOptions { change_schema: true })
                .unwrap()
                .sql,
            "ALTER TABLE \"users\" SET SCHEMA \"archive\";"
        );
        assert_eq!(
            generator
                .rename_table_query(
                    &before,
                    &TableName::new("people"),
                    &RenameTableOptions::default()
                )
                .unwrap()
                .sql,
            "ALTER TABLE \"users\" RENAME TO \"people\";"
        );
    }

    #[test]
    fn test_add_and_remove_column() {
        let mssql = Dialect::new(DialectKind::Mssql).unwrap();
        assert_eq!(
            mssql
                .query_generator()
                .add_column_query(
                    &"users".into(),
                    &AttributeDef::new("age", DataType::integer()).not_null(),
                    &AddColumnOptions::default()
                )
                .unwrap()
                .sql,
            "ALTER TABLE [users] ADD [age] INTEGER NOT NULL;"
        );

        let mysql = Dialect::new(DialectKind::Mysql).unwrap();
        assert_eq!(
            mysql
                .query_generator()
                .add_column_query(
                    &"users".into(),
                    &AttributeDef::new("team_id", DataType::integer())
                        .references(References::new("teams", "id")),
                    &AddColumnOptions::default()
                )
                .unwrap()
                .sql,
            "ALTER TABLE `users` ADD COLUMN `team_id` INTEGER, ADD FOREIGN KEY (`team_id`) REFERENCES `teams` (`id`);"
        );

        let pg = Dialect::new(DialectKind::Postgres).unwrap();
        let options = RemoveOptions {
            if_exists: true,
            cascade: true,
        };
        assert_eq!(
            pg.query_generator()
                .remove_column_query(&"users".into(), "age", &options)
                .unwrap()
                .sql,
            "ALTER TABLE \"users\" DROP COLUMN IF EXISTS \"age\" CASCADE;"
        );
        assert!(mysql
            .query_generator()
            .remove_column_query(&"users".into(), "age", &options)
            .is_err());
    }

    fn changed_columns() -> Vec<AttributeDef> {
        vec![
            AttributeDef::new("age", DataType::integer()).not_null().default_value(0),
            AttributeDef::new("teamId", DataType::integer())
                .field("team_id")
                .references(References::new("teams", "id")),
        ]
    }

    fn change(kind: DialectKind, attributes: &[AttributeDef]) -> Result<String> {
        let dialect = Dialect::new(kind).unwrap();
        dialect
            .query_generator()
            .change_column_query(&"users".into(), attributes)
            .map(|q| q.sql)
    }

    #[test]
    fn test_change_column_postgres_one_property_at_a_time() {
        let columns = changed_columns();
        assert_eq!(
            change(DialectKind::Postgres, &columns[..1]).unwrap(),
            "ALTER TABLE \"users\" ALTER COLUMN \"age\" SET NOT NULL; \
             ALTER TABLE \"users\" ALTER COLUMN \"age\" SET DEFAULT 0; \
             ALTER TABLE \"users\" ALTER COLUMN \"age\" TYPE INTEGER;"
        );
        assert_eq!(
            change(DialectKind::Postgres, &columns[1..]).unwrap(),
            "ALTER TABLE \"users\" ADD FOREIGN KEY (\"team_id\") REFERENCES \"teams\" (\"id\");"
        );

        let loosened = AttributeDef::new("bio", DataType::text()).unique();
        assert_eq!(
            change(DialectKind::Postgres, &[loosened]).unwrap(),
            "ALTER TABLE \"users\" ALTER COLUMN \"bio\" DROP NOT NULL; \
             ALTER TABLE \"users\" ALTER COLUMN \"bio\" DROP DEFAULT; \
             ALTER TABLE \"users\" ADD UNIQUE (\"bio\"); \
             ALTER TABLE \"users\" ALTER COLUMN \"bio\" TYPE TEXT;"
        );
    }

    #[test]
    fn test_change_column_per_engine() {
        let columns = changed_columns();
        assert_eq!(
            change(DialectKind::Mysql, &columns).unwrap(),
            "ALTER TABLE `users` CHANGE `age` `age` INTEGER NOT NULL DEFAULT 0, \
             CHANGE `team_id` `team_id` INTEGER, \
             ADD FOREIGN KEY (`team_id`) REFERENCES `teams` (`id`);"
        );
        assert_eq!(
            change(DialectKind::Mssql, &columns[..1]).unwrap(),
            "ALTER TABLE [users] ALTER COLUMN [age] INTEGER NOT NULL; \
             ALTER TABLE [users] ADD DEFAULT 0 FOR [age];"
        );
        assert_eq!(
            change(DialectKind::Db2, &columns).unwrap(),
            "ALTER TABLE \"users\" ALTER COLUMN \"age\" SET DATA TYPE INTEGER \
             ALTER COLUMN \"age\" SET NOT NULL ALTER COLUMN \"age\" SET DEFAULT 0 \
             ALTER COLUMN \"team_id\" SET DATA TYPE INTEGER ALTER COLUMN \"team_id\" DROP NOT NULL \
             ADD CONSTRAINT \"team_id_foreign_idx\" FOREIGN KEY (\"team_id\") REFERENCES \"teams\" (\"id\");"
        );
        assert!(matches!(
            change(DialectKind::Sqlite, &columns),
            Err(Error::UnsupportedByDialect { .. })
        ));
        assert!(matches!(
            change(DialectKind::Postgres, &[]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rename_column() {
        let model = ModelSchema::new("users")
            .attribute(AttributeDef::new("fullName", DataType::string()).field("full_name"));
        let table = TableRef::Model(std::sync::Arc::new(model));
        let after = AttributeDef::new("display_name", DataType::string()).not_null();
        let rename = |kind| {
            Dialect::new(kind)
                .unwrap()
                .query_generator()
                .rename_column_query(&table, "fullName", &after)
                .map(|q| q.sql)
        };
        assert_eq!(
            rename(DialectKind::Postgres).unwrap(),
            "ALTER TABLE \"users\" RENAME COLUMN \"full_name\" TO \"display_name\";"
        );
        assert_eq!(
            rename(DialectKind::Sqlite).unwrap(),
            "ALTER TABLE `users` RENAME COLUMN `full_name` TO `display_name`;"
        );
        assert_eq!(
            rename(DialectKind::Mariadb).unwrap(),
            "ALTER TABLE `users` CHANGE `full_name` `display_name` VARCHAR(255) NOT NULL;"
        );
        assert_eq!(
            rename(DialectKind::Mssql).unwrap(),
            "EXEC sp_rename '[users].[full_name]', 'display_name', 'COLUMN';"
        );
    }

    #[test]
    fn test_schemas() {
        let pg = Dialect::new(DialectKind::Postgres).unwrap();
        let generator = pg.query_generator();
        assert_eq!(
            generator
                .create_schema_query(
                    "app",
                    &CreateSchemaOptions {
                        if_not_exists: true,
                        authorization: Some("owner".into()),
                        ..CreateSchemaOptions::default()
                    }
                )
                .unwrap()
                .sql,
            "CREATE SCHEMA IF NOT EXISTS \"app\" AUTHORIZATION \"owner\";"
        );
        assert_eq!(
            generator
                .drop_schema_query("app", &RemoveOptions::default())
                .unwrap()
                .sql,
            "DROP SCHEMA \"app\";"
        );

        let db2 = Dialect::new(DialectKind::Db2).unwrap();
        assert_eq!(
            db2.query_generator()
                .drop_schema_query("app", &RemoveOptions::default())
                .unwrap()
                .sql,
            "DROP SCHEMA \"app\" RESTRICT;"
        );

        let sqlite = Dialect::new(DialectKind::Sqlite).unwrap();
        assert!(sqlite
            .query_generator()
            .create_schema_query("app", &CreateSchemaOptions::default())
            .is_err());
    }

    #[test]
    fn test_add_index_names_and_options() {
        let pg = Dialect::new(DialectKind::Postgres).unwrap();
        let generator = pg.query_generator();
        assert_eq!(
            generator
                .add_index_query(&"Users".into(), &["email".into()], &AddIndexOptions::default())
                .unwrap()
                .sql,
            "CREATE INDEX \"users_email\" ON \"Users\" (\"email\");"
        );
        let options = AddIndexOptions {
            unique: true,
            concurrently: true,
            using: Some("BTREE".into()),
            where_clause: Some(Where::attr("deleted_at").is_null()),
            ..AddIndexOptions::default()
        };
        assert_eq!(
            generator
                .add_index_query(&"users".into(), &["email".into()], &options)
                .unwrap()
                .sql,
            "CREATE UNIQUE INDEX CONCURRENTLY \"users_email_unique\" ON \"users\" USING BTREE (\"email\") WHERE \"deleted_at\" IS NULL;"
        );

        let prefixed = AddIndexOptions {
            prefix: Some("app_users".into()),
            ..AddIndexOptions::default()
        };
        assert_eq!(
            generator
                .add_index_query(
                    &"users".into(),
                    &["first_name".into(), "last_name".into()],
                    &prefixed
                )
                .unwrap()
                .sql,
            "CREATE INDEX \"app_users_first_name_last_name\" ON \"users\" (\"first_name\", \"last_name\");"
        );
        assert!(generator
            .add_index_query(&"users".into(), &[], &AddIndexOptions::default())
            .is_err());
    }

    #[test]
    fn test_mysql_index_type_and_using() {
        let mysql = Dialect::new(DialectKind::Mysql).unwrap();
        let options = AddIndexOptions {
            index_type: Some("fulltext".into()),
            parser: Some("ngram".into()),
            ..AddIndexOptions::default()
        };
        assert_eq!(
            mysql
                .query_generator()
                .add_index_query(&"posts".into(), &["body".into()], &options)
                .unwrap()
                .sql,
            "CREATE FULLTEXT INDEX `posts_body` ON `posts` (`body`) WITH PARSER ngram;"
        );
        let using = AddIndexOptions {
            using: Some("HASH".into()),
            ..AddIndexOptions::default()
        };
        assert_eq!(
            mysql
                .query_generator()
                .add_index_query(&"posts".into(), &["slug".into()], &using)
                .unwrap()
                .sql,
            "CREATE INDEX `posts_slug` USING HASH ON `posts` (`slug`);"
        );
    }

    #[test]
    fn test_remove_index_gates_options() {
        let sqlite = Dialect::new(DialectKind::Sqlite).unwrap();
        let generator = sqlite.query_generator();
        let err = generator
            .remove_index_query(
                &"users".into(),
                "users_email",
                &RemoveIndexOptions {
                    cascade: true,
                    ..RemoveIndexOptions::default()
                },
            )
            .unwrap_err();
        assert!(
            matches!(err, Error::UnsupportedOption { ref options, .. } if options == &["cascade"])
        );
        assert_eq!(
            generator
                .remove_index_query(
                    &"users".into(),
                    "users_email",
                    &RemoveIndexOptions {
                        if_exists: true,
                        ..RemoveIndexOptions::default()
                    }
                )
                .unwrap()
                .sql,
            "DROP INDEX IF EXISTS `users_email`;"
        );
    }

    #[test]
    fn test_table_exists() {
        let mysql = Dialect::new(DialectKind::Mysql).unwrap();
        let sql = mysql
            .query_generator()
            .table_exists_query(&TableName::new("users").with_schema("app").into())
            .unwrap()
            .sql;
        assert_eq!(
            sql,
            "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_NAME = 'users' AND TABLE_SCHEMA = 'app';"
        );
    }
}
