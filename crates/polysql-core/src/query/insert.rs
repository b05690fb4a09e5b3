//! INSERT and bulk INSERT.

use indexmap::{IndexMap, IndexSet};

use super::{BulkInsertOptions, InsertOptions, Query, QueryGenerator, Returning};
use crate::bind::ValueBinder;
use crate::dialect::options::{validate_options, BULK_INSERT_SUPPORTABLE, INSERT_SUPPORTABLE};
use crate::dialect::supports::ReturnValues;
use crate::error::{Error, Result};
use crate::expr::FormatContext;
use crate::schema::{ModelSchema, TableRef};
use crate::value::SqlValue;

/// One row of an INSERT, ready to be assembled.
#[derive(Debug, Default)]
pub(super) struct InsertRow {
    /// Column names, unquoted.
    pub columns: Vec<String>,
    pub values: Vec<String>,
    /// An auto-increment column received an explicit value.
    pub identity_insert: bool,
}

impl QueryGenerator<'_> {
    /// Builds a single-row `INSERT`.
    ///
    /// Values are bound unless `inline_values` is set. Auto-increment
    /// columns given NULL are written as `DEFAULT`, or left out on engines
    /// that reject `DEFAULT` there.
    ///
    /// # Errors
    ///
    /// Fails on unsupported options, reserved bind names, and values that do
    /// not validate against their column type.
    pub fn insert_query(
        &self,
        table: &TableRef,
        values: &IndexMap<String, SqlValue>,
        options: &InsertOptions,
    ) -> Result<Query> {
        let supports = self.dialect.supports();
        let inserts = &supports.inserts;
        let supported: Vec<&str> = [
            (
                "ignoreDuplicates",
                inserts.ignore_duplicates.is_some() || inserts.on_conflict_do_nothing.is_some(),
            ),
            (
                "returning",
                supports.returning != ReturnValues::None || supports.final_table,
            ),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect();
        validate_options("insertQuery", self.dialect, INSERT_SUPPORTABLE, &supported, options)?;

        let mut binder = if options.inline_values {
            ValueBinder::inline()
        } else {
            ValueBinder::with_reserved(options.bind.clone())?
        };

        let row = self.insert_row(table.model(), values, &mut binder)?;
        let quoted_table = self.quote_table(table, None);
        let (output, returning) = self.returning_clauses(&options.returning);
        let (ignore, do_nothing) = self.ignore_duplicates_clauses(options.ignore_duplicates);

        let mut sql = format!("INSERT{ignore} INTO {quoted_table}");
        if row.columns.is_empty() {
            sql.push_str(&output);
            if supports.default_values {
                sql.push_str(" DEFAULT VALUES");
            } else if supports.values_empty_parens {
                sql.push_str(" VALUES ()");
            } else {
                sql.push_str(" VALUES (DEFAULT)");
            }
        } else {
            sql.push_str(&format!(
                " ({}){output} VALUES ({})",
                self.quote_identifiers(&row.columns),
                row.values.join(", ")
            ));
        }
        sql.push_str(do_nothing);
        sql.push_str(&returning);

        let mut sql = self.wrap_final_table(sql, &options.returning);
        sql.push(';');
        if row.identity_insert {
            sql = identity_insert_wrap(&quoted_table, &sql);
        }
        self.finish("insertQuery", sql, binder)
    }

    /// Builds a multi-row `INSERT` with inlined values.
    ///
    /// Columns are the union of every row's keys, in first-seen order.
    /// Engines with a per-statement row ceiling get one statement per chunk.
    ///
    /// # Errors
    ///
    /// Fails on unsupported options, an empty row set, a missing conflict
    /// target for `update_on_duplicate`, and invalid values.
    pub fn bulk_insert_query(
        &self,
        table: &TableRef,
        rows: &[IndexMap<String, SqlValue>],
        options: &BulkInsertOptions,
    ) -> Result<Query> {
        let supports = self.dialect.supports();
        let inserts = &supports.inserts;
        let supported: Vec<&str> = [
            (
                "ignoreDuplicates",
                inserts.ignore_duplicates.is_some() || inserts.on_conflict_do_nothing.is_some(),
            ),
            ("updateOnDuplicate", inserts.update_on_duplicate.is_some()),
            ("conflictWhere", inserts.on_conflict_where),
            (
                "returning",
                supports.returning != ReturnValues::None || supports.final_table,
            ),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect();
        validate_options(
            "bulkInsertQuery",
            self.dialect,
            BULK_INSERT_SUPPORTABLE,
            &supported,
            options,
        )?;

        if rows.is_empty() {
            return Err(Error::invalid("bulk insert needs at least one row"));
        }

        let model = table.model();
        let ctx = FormatContext::default().with_model(model);
        let mut binder = ValueBinder::inline();
        let quoted_table = self.quote_table(table, None);

        let attributes: IndexSet<&str> = rows
            .iter()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect();
        let columns: Vec<String> = attributes
            .iter()
            .map(|name| model.map_or(*name, |m| m.column_for(name)).to_string())
            .collect();

        let (output, returning) = self.returning_clauses(&options.returning);
        let (ignore, do_nothing) = self.ignore_duplicates_clauses(options.ignore_duplicates);
        let on_conflict = if options.update_on_duplicate.is_empty() {
            String::from(do_nothing)
        } else {
            self.update_on_duplicate_clause(table, options, &ctx, &mut binder)?
        };

        let mut tuples = Vec::with_capacity(rows.len());
        for row in rows {
            let mut identity_insert = false;
            let mut values = Vec::with_capacity(attributes.len());
            for name in &attributes {
                let attribute = model.and_then(|m| m.get(name));
                let value = row.get(*name).filter(|value| !value.is_null());
                let serial = attribute.is_some_and(|a| a.auto_increment);
                match value {
                    None if serial && supports.bulk_default => values.push(String::from("DEFAULT")),
                    None => values.push(String::from("NULL")),
                    Some(value) => {
                        identity_insert |= serial && supports.auto_increment.identity_insert;
                        values.push(self.escape_or_bind(
                            value,
                            attribute.map(|a| &a.data_type),
                            &mut binder,
                        )?);
                    }
                }
            }
            tuples.push((format!("({})", values.join(",")), identity_insert));
        }

        let chunk_size = self.dialect.rules().max_bulk_insert_rows().unwrap_or(tuples.len());
        let mut statements = Vec::new();
        for chunk in tuples.chunks(chunk_size.max(1)) {
            let values: Vec<&str> = chunk.iter().map(|(tuple, _)| tuple.as_str()).collect();
            let sql = format!(
                "INSERT{ignore} INTO {quoted_table} ({}){output} VALUES {}{on_conflict}{returning}",
                self.quote_identifiers(&columns),
                values.join(",")
            );
            let mut sql = self.wrap_final_table(sql, &options.returning);
            sql.push(';');
            if chunk.iter().any(|(_, identity_insert)| *identity_insert) {
                sql = identity_insert_wrap(&quoted_table, &sql);
            }
            statements.push(sql);
        }
        tracing::trace!(
            rows = rows.len(),
            statements = statements.len(),
            "bulk insert chunked"
        );

        self.finish("bulkInsertQuery", statements.join(" "), binder)
    }

    /// Resolves column names and renders the values of one row.
    pub(super) fn insert_row(
        &self,
        model: Option<&ModelSchema>,
        values: &IndexMap<String, SqlValue>,
        binder: &mut ValueBinder,
    ) -> Result<InsertRow> {
        let auto_increment = self.dialect.supports().auto_increment;
        let mut row = InsertRow::default();
        for (name, value) in values {
            let attribute = model.and_then(|m| m.get(name));
            let column = attribute.map_or(name.as_str(), |a| a.field.as_str());
            if attribute.is_some_and(|a| a.auto_increment) {
                if value.is_null() {
                    if auto_increment.default_value {
                        row.columns.push(column.to_string());
                        row.values.push(String::from("DEFAULT"));
                    }
                    continue;
                }
                row.identity_insert |= auto_increment.identity_insert;
            }
            row.columns.push(column.to_string());
            row.values.push(self.escape_or_bind(
                value,
                attribute.map(|a| &a.data_type),
                binder,
            )?);
        }
        Ok(row)
    }

    /// The `OUTPUT` fragment (placed before VALUES) and the `RETURNING`
    /// fragment (placed at the end). At most one of them is non-empty.
    pub(super) fn returning_clauses(&self, returning: &Returning) -> (String, String) {
        let columns = match returning {
            Returning::Nothing => return (String::new(), String::new()),
            Returning::All => None,
            Returning::Columns(columns) => Some(columns),
        };
        match self.dialect.supports().returning {
            ReturnValues::Returning => {
                let list = columns.map_or_else(|| String::from("*"), |c| self.quote_identifiers(c));
                (String::new(), format!(" RETURNING {list}"))
            }
            ReturnValues::Output => {
                let list = columns.map_or_else(
                    || String::from("INSERTED.*"),
                    |c| {
                        c.iter()
                            .map(|column| format!("INSERTED.{}", self.quote_identifier(column)))
                            .collect::<Vec<_>>()
                            .join(", ")
                    },
                );
                (format!(" OUTPUT {list}"), String::new())
            }
            ReturnValues::None => (String::new(), String::new()),
        }
    }

    /// Wraps a data-changing statement so its rows can be selected, on
    /// engines that read results through `FINAL TABLE`.
    pub(super) fn wrap_final_table(&self, sql: String, returning: &Returning) -> String {
        if !self.dialect.supports().final_table {
            return sql;
        }
        match returning {
            Returning::Nothing => sql,
            Returning::All => format!("SELECT * FROM FINAL TABLE ({sql})"),
            Returning::Columns(columns) => format!(
                "SELECT {} FROM FINAL TABLE ({sql})",
                self.quote_identifiers(columns)
            ),
        }
    }

    /// The keyword placed after `INSERT` and the suffix placed after VALUES
    /// for ignore-duplicates. The keyword wins when the engine has both.
    fn ignore_duplicates_clauses(&self, ignore: bool) -> (&'static str, &'static str) {
        if !ignore {
            return ("", "");
        }
        let inserts = &self.dialect.supports().inserts;
        match inserts.ignore_duplicates {
            Some(keyword) => (keyword, ""),
            None => ("", inserts.on_conflict_do_nothing.unwrap_or("")),
        }
    }

    fn update_on_duplicate_clause(
        &self,
        table: &TableRef,
        options: &BulkInsertOptions,
        ctx: &FormatContext<'_>,
        binder: &mut ValueBinder,
    ) -> Result<String> {
        let model = table.model();
        let columns: Vec<String> = options
            .update_on_duplicate
            .iter()
            .map(|name| model.map_or(name.as_str(), |m| m.column_for(name)).to_string())
            .collect();
        let inserts = &self.dialect.supports().inserts;

        if !inserts.conflict_fields {
            let prefix = inserts.update_on_duplicate.unwrap_or(" ON DUPLICATE KEY UPDATE");
            let assignments: Vec<String> = columns
                .iter()
                .map(|column| {
                    let quoted = self.quote_identifier(column);
                    format!("{quoted} = VALUES({quoted})")
                })
                .collect();
            return Ok(format!("{prefix} {}", assignments.join(", ")));
        }

        let keys = if options.upsert_keys.is_empty() {
            let model = model.ok_or_else(|| Error::NoUpsertKey {
                table: table.table_name().table,
            })?;
            super::upsert_keys(model, &options.update_on_duplicate, &[])?
        } else {
            options
                .upsert_keys
                .iter()
                .map(|name| model.map_or(name.as_str(), |m| m.column_for(name)).to_string())
                .collect()
        };

        let mut sql = format!(" ON CONFLICT ({})", self.quote_identifiers(&keys));
        if let Some(filter) = &options.conflict_where {
            let clause = self.where_query(filter, ctx, binder)?;
            if !clause.is_empty() {
                sql.push(' ');
                sql.push_str(&clause);
            }
        }
        let assignments: Vec<String> = columns
            .iter()
            .map(|column| {
                let quoted = self.quote_identifier(column);
                format!("{quoted} = EXCLUDED.{quoted}")
            })
            .collect();
        sql.push_str(" DO UPDATE SET ");
        sql.push_str(&assignments.join(", "));
        Ok(sql)
    }
}

/// Brackets a statement with `SET IDENTITY_INSERT` so explicit values can
/// be written to an identity column.
pub(super) fn identity_insert_wrap(quoted_table: &str, sql: &str) -> String {
    format!("SET IDENTITY_INSERT {quoted_table} ON; {sql} SET IDENTITY_INSERT {quoted_table} OFF;")
}
