//! Statement generation.
//!
//! [`QueryGenerator`] borrows a [`Dialect`] and produces one [`Query`] per
//! call. Every routine validates its option bag before it builds any
//! fragment, escapes or binds values through the type registry, and returns
//! the finished SQL with its bind values.
//!
//! ```ignore
//! use polysql_core::dialect::{Dialect, DialectKind};
//! use polysql_core::filter::Where;
//! use polysql_core::query::SelectOptions;
//!
//! let dialect = Dialect::new(DialectKind::Postgres)?;
//! let query = dialect.query_generator().select_query(
//!     &"users".into(),
//!     &SelectOptions {
//!         where_clause: Some(Where::attr("age").gte(18)),
//!         limit: Some(10),
//!         ..SelectOptions::default()
//!     },
//! )?;
//! assert_eq!(query.sql, r#"SELECT * FROM "users" WHERE "age" >= 18 LIMIT 10;"#);
//! ```

mod constraints;
mod ddl;
mod insert;
mod introspect;
mod options;
mod select;
mod transaction;
mod update;
mod upsert;

use serde::Serialize;

pub use constraints::{fold_constraints, ConstraintChecking, ConstraintDescription, ConstraintRow};
pub use options::{
    AddColumnOptions, AddIndexOptions, ArithmeticOptions, BulkInsertOptions, ConstraintKind,
    ConstraintSpec, ConstraintType, CreateSchemaOptions, CreateTableOptions, DeleteOptions,
    Direction, DropTableOptions, InsertOptions, IsolationLevel, ListSchemasOptions,
    ListTablesOptions, OrderBy, RemoveIndexOptions, RemoveOptions, RenameTableOptions, Returning,
    SelectOptions, ShowConstraintsOptions, StartTransactionOptions, TransactionType,
    TruncateOptions, UpdateOptions, UpsertOptions,
};
pub use upsert::upsert_keys;

use crate::bind::{inject_named_replacements, map_known_bind_parameters, Bind, ValueBinder};
use crate::dialect::Dialect;
use crate::error::Result;
use crate::expr::{
    parse_attribute_syntax, CastTarget, Expr, FormatContext, JsonPathSegment, LiteralPart,
};
use crate::schema::{TableName, TableRef};
use crate::types::{best_guess_type, DataType};
use crate::value::SqlValue;

/// A generated statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub sql: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<Bind>,
    /// Set on statements that end the current transaction, so the caller can
    /// release the connection afterwards.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub completes_transaction: bool,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bind: None,
            completes_transaction: false,
        }
    }

    /// Whether there is nothing to execute.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    #[must_use]
    const fn completing(mut self) -> Self {
        self.completes_transaction = true;
        self
    }
}

/// Generates statements for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct QueryGenerator<'d> {
    dialect: &'d Dialect,
}

impl<'d> QueryGenerator<'d> {
    #[must_use]
    pub const fn new(dialect: &'d Dialect) -> Self {
        Self { dialect }
    }

    #[must_use]
    pub const fn dialect(&self) -> &'d Dialect {
        self.dialect
    }

    /// Maps the neutral bind tokens and logs the statement.
    fn finish(&self, method: &'static str, sql: String, binder: ValueBinder) -> Result<Query> {
        let query = if binder.is_collecting() && !binder.is_empty() {
            let (sql, order) =
                map_known_bind_parameters(&sql, self.dialect, &|name| binder.contains(name))?;
            Query {
                sql,
                bind: Some(Bind {
                    values: binder.into_values(),
                    order,
                }),
                completes_transaction: false,
            }
        } else {
            Query::new(sql)
        };
        tracing::debug!(
            dialect = self.dialect.name(),
            method,
            sql = %query.sql,
            "generated statement"
        );
        Ok(query)
    }

    #[must_use]
    pub fn quote_identifier(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    fn quote_identifiers(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|name| self.quote_identifier(name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Quotes a table name with its schema.
    ///
    /// The dialect's default schema is omitted. On engines without schemas
    /// the schema is folded into the table name with the table's delimiter.
    #[must_use]
    pub fn quote_table_name(&self, table: &TableName) -> String {
        let schema = table
            .schema
            .as_deref()
            .filter(|schema| !schema.is_empty() && *schema != self.dialect.default_schema());
        match schema {
            None => self.quote_identifier(&table.table),
            Some(schema) if self.dialect.supports().schemas => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(&table.table)
            ),
            Some(schema) => {
                let delimiter = table.delimiter.as_deref().unwrap_or(".");
                self.quote_identifier(&format!("{schema}{delimiter}{}", table.table))
            }
        }
    }

    /// Quotes a table reference, with an optional `AS` alias.
    #[must_use]
    pub fn quote_table(&self, table: &TableRef, alias: Option<&str>) -> String {
        let mut sql = self.quote_table_name(&table.table_name());
        if let Some(alias) = alias {
            sql.push_str(" AS ");
            sql.push_str(&self.quote_identifier(alias));
        }
        sql
    }

    /// Renders a value as a literal.
    ///
    /// Without a type, one is guessed from the value.
    ///
    /// # Errors
    ///
    /// Fails when the value does not validate against the type.
    pub fn escape(&self, value: &SqlValue, ty: Option<&DataType>) -> Result<String> {
        self.escape_or_bind(value, ty, &mut ValueBinder::inline())
    }

    /// Renders a value as a literal of its guessed type.
    ///
    /// # Errors
    ///
    /// Fails for values whose type cannot be guessed, such as empty arrays.
    pub fn escape_value(&self, value: &SqlValue) -> Result<String> {
        self.escape(value, None)
    }

    /// Renders values as a comma separated list of literals.
    ///
    /// # Errors
    ///
    /// Fails when one of the values does not validate.
    pub fn escape_list(&self, values: &[SqlValue], ty: Option<&DataType>) -> Result<String> {
        self.escape_list_with(values, ty, &mut ValueBinder::inline())
    }

    pub(crate) fn escape_list_with(
        &self,
        values: &[SqlValue],
        ty: Option<&DataType>,
        binder: &mut ValueBinder,
    ) -> Result<String> {
        let items = values
            .iter()
            .map(|value| self.escape_or_bind(value, ty, binder))
            .collect::<Result<Vec<_>>>()?;
        Ok(items.join(", "))
    }

    /// Escapes `value` inline, or records it in a collecting `binder` and
    /// returns its token.
    pub(crate) fn escape_or_bind(
        &self,
        value: &SqlValue,
        ty: Option<&DataType>,
        binder: &mut ValueBinder,
    ) -> Result<String> {
        let guessed;
        let ty = match ty {
            Some(ty) => ty,
            None => {
                guessed = best_guess_type(value, self.dialect)?;
                &guessed
            }
        };
        let descriptor = self.dialect.types().descriptor(ty);
        if value.is_null() && !descriptor.accepts_null(self.dialect) {
            return Ok(String::from("NULL"));
        }
        if !self.dialect.options().no_type_validation {
            descriptor.validate(ty, value, self.dialect)?;
        }
        if binder.is_collecting() {
            descriptor.bind_param_sql(ty, value, self.dialect, binder)
        } else {
            descriptor.escape(ty, value, self.dialect)
        }
    }

    /// Formats an expression tree.
    ///
    /// # Errors
    ///
    /// Fails on malformed attribute syntax, JSON paths on engines without
    /// them, missing replacements, and values that do not validate.
    pub fn format_expr(
        &self,
        expr: &Expr,
        ctx: &FormatContext<'_>,
        binder: &mut ValueBinder,
    ) -> Result<String> {
        match expr {
            Expr::Literal(parts) => {
                let mut sql = String::new();
                for part in parts {
                    match part {
                        LiteralPart::Sql(raw) => match ctx.replacements {
                            Some(replacements) => sql.push_str(&inject_named_replacements(
                                raw,
                                self.dialect,
                                replacements,
                            )?),
                            None => sql.push_str(raw),
                        },
                        LiteralPart::Expr(inner) => {
                            sql.push_str(&self.format_expr(inner, ctx, binder)?)
                        }
                    }
                }
                Ok(sql)
            }
            Expr::Identifier(parts) => Ok(parts
                .iter()
                .map(|part| self.quote_identifier(part))
                .collect::<Vec<_>>()
                .join(".")),
            Expr::Col(name) => Ok(self.format_column(name)),
            Expr::Fn { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.format_expr(arg, ctx, binder))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("{name}({})", args.join(", ")))
            }
            Expr::Cast { expr, target } => {
                let mut inner = self.format_expr(expr, ctx, binder)?;
                if expr.is_combinator() {
                    inner = format!("({inner})");
                }
                let target = match target {
                    CastTarget::Type(ty) => self.dialect.type_to_sql(ty)?,
                    CastTarget::Named(name) => name.to_uppercase(),
                };
                Ok(format!("CAST({inner} AS {target})"))
            }
            Expr::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.format_expr(item, ctx, binder))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("({})", items.join(", ")))
            }
            Expr::Attribute(raw) => self.format_attribute(raw, ctx),
            Expr::JsonPath {
                expr,
                path,
                unquote,
            } => {
                let base = self.format_expr(expr, ctx, binder)?;
                self.json_path(&base, path, *unquote)
            }
            Expr::AssociationPath {
                associations,
                attribute,
            } => Ok(self.format_association_path(associations, attribute)),
            Expr::Value(value) => self.escape_or_bind(value, None, binder),
            Expr::Where(filter) => self.where_item_query(filter, ctx, binder),
        }
    }

    /// `*` stays bare, dotted names are quoted per segment.
    fn format_column(&self, name: &str) -> String {
        name.split('.')
            .map(|segment| {
                if segment == "*" {
                    segment.to_string()
                } else {
                    self.quote_identifier(segment)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    fn format_association_path(&self, associations: &[String], attribute: &str) -> String {
        format!(
            "{}.{}",
            self.quote_identifier(&associations.join("->")),
            self.quote_identifier(attribute)
        )
    }

    fn format_attribute(&self, raw: &str, ctx: &FormatContext<'_>) -> Result<String> {
        let parsed = parse_attribute_syntax(raw)?;
        let mut sql = if parsed.associations.is_empty() {
            let column = ctx
                .model
                .map_or(parsed.attribute.as_str(), |model| model.column_for(&parsed.attribute));
            let quoted = self.quote_identifier(column);
            match ctx.main_alias {
                Some(alias) => format!("{}.{quoted}", self.quote_identifier(alias)),
                None => quoted,
            }
        } else {
            self.format_association_path(&parsed.associations, &parsed.attribute)
        };
        if !parsed.json_path.is_empty() || parsed.unquote {
            sql = self.json_path(&sql, &parsed.json_path, parsed.unquote)?;
        }
        for cast in &parsed.casts {
            sql = format!("CAST({sql} AS {})", cast.to_uppercase());
        }
        Ok(sql)
    }

    fn json_path(&self, base: &str, path: &[JsonPathSegment], unquote: bool) -> Result<String> {
        self.dialect
            .rules()
            .json_path(self.dialect, base, path, unquote)
            .ok_or_else(|| self.dialect.unsupported("JSON path extraction"))
    }
}
