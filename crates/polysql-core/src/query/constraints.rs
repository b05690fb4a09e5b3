//! Constraint statements and catalog folding.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{
    ConstraintKind, ConstraintSpec, ConstraintType, Query, QueryGenerator, RemoveOptions,
    ShowConstraintsOptions,
};
use crate::bind::ValueBinder;
use crate::dialect::options::{
    validate_options, REMOVE_CONSTRAINT_SUPPORTABLE, SHOW_CONSTRAINTS_SUPPORTABLE,
};
use crate::dialect::supports::SupportedOptions;
use crate::error::{Error, Result};
use crate::expr::FormatContext;
use crate::schema::{Deferrable, TableRef};

/// When deferrable constraints are checked inside the current transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConstraintChecking {
    Deferred,
    Immediate,
}

impl ConstraintChecking {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Deferred => "DEFERRED",
            Self::Immediate => "IMMEDIATE",
        }
    }
}

/// One row of a constraint listing. Multi-column constraints come back as
/// one row per column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConstraintRow {
    pub constraint_catalog: Option<String>,
    pub constraint_schema: Option<String>,
    pub constraint_name: String,
    pub constraint_type: String,
    pub table_catalog: Option<String>,
    pub table_schema: Option<String>,
    pub table_name: Option<String>,
    pub column_names: Option<String>,
    pub referenced_table_schema: Option<String>,
    pub referenced_table_name: Option<String>,
    pub referenced_column_names: Option<String>,
    pub delete_action: Option<String>,
    pub update_action: Option<String>,
    pub definition: Option<String>,
    pub is_deferrable: Option<String>,
    pub initially_deferred: Option<String>,
}

/// One constraint, folded from its catalog rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint_catalog: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint_schema: Option<String>,
    pub constraint_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint_type: Option<ConstraintType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_catalog: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub column_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_table_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_table_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub referenced_column_names: Vec<String>,
    /// `NO ACTION`, `CASCADE`, `SET NULL` or `RESTRICT`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deferrable: Option<Deferrable>,
}

fn normalize_action(raw: &str) -> String {
    let action = raw.trim().replace('_', " ").to_uppercase();
    match action.as_str() {
        "CASCADE" | "SET NULL" | "RESTRICT" => action,
        _ => String::from("NO ACTION"),
    }
}

fn push_unique(list: &mut Vec<String>, item: Option<&String>) {
    if let Some(item) = item {
        if !list.contains(item) {
            list.push(item.clone());
        }
    }
}

/// Folds catalog rows into one description per constraint name.
///
/// Columns accumulate in first-seen order without duplicates. Referential
/// actions are normalized; anything unrecognised reads as `NO ACTION`.
#[must_use]
pub fn fold_constraints(rows: &[ConstraintRow]) -> Vec<ConstraintDescription> {
    let mut folded: IndexMap<&str, ConstraintDescription> = IndexMap::new();
    for row in rows {
        let description = folded.entry(row.constraint_name.as_str()).or_insert_with(|| {
            let deferrable = row.is_deferrable.as_deref().map(|is_deferrable| {
                match (is_deferrable, row.initially_deferred.as_deref()) {
                    ("YES", Some("YES")) => Deferrable::InitiallyDeferred,
                    ("YES", _) => Deferrable::InitiallyImmediate,
                    _ => Deferrable::NotDeferrable,
                }
            });
            ConstraintDescription {
                constraint_catalog: row.constraint_catalog.clone(),
                constraint_schema: row.constraint_schema.clone(),
                constraint_name: row.constraint_name.clone(),
                constraint_type: ConstraintType::from_catalog(&row.constraint_type),
                table_catalog: row.table_catalog.clone(),
                table_schema: row.table_schema.clone(),
                table_name: row.table_name.clone(),
                column_names: Vec::new(),
                referenced_table_schema: row.referenced_table_schema.clone(),
                referenced_table_name: row.referenced_table_name.clone(),
                referenced_column_names: Vec::new(),
                delete_action: row.delete_action.as_deref().map(normalize_action),
                update_action: row.update_action.as_deref().map(normalize_action),
                definition: row.definition.clone(),
                deferrable,
            }
        });
        push_unique(&mut description.column_names, row.column_names.as_ref());
        push_unique(
            &mut description.referenced_column_names,
            row.referenced_column_names.as_ref(),
        );
    }
    folded.into_values().collect()
}

impl QueryGenerator<'_> {
    /// Builds `ALTER TABLE ... ADD CONSTRAINT`.
    ///
    /// Unnamed constraints are named `{table}_{fields}_{ck|uk|df|pk}`, or
    /// `{table}_{fields}_{referenced table}_fk` for foreign keys.
    ///
    /// # Errors
    ///
    /// Fails when the engine cannot add constraints, lacks the constraint
    /// kind, or lacks deferrable constraints or `ON UPDATE` when asked.
    pub fn add_constraint_query(
        &self,
        table: &TableRef,
        constraint: &ConstraintSpec,
    ) -> Result<Query> {
        let support = self.dialect.supports().constraints;
        if !support.add {
            return Err(self.dialect.unsupported("adding constraints"));
        }
        if constraint.fields.is_empty() {
            return Err(Error::invalid("a constraint needs at least one field"));
        }

        let table_name = table.table_name();
        let fields = constraint.fields.join("_");
        let quoted_fields = self.quote_identifiers(&constraint.fields);
        let name_or = |suffix: &str| {
            let name = constraint
                .name
                .clone()
                .unwrap_or_else(|| format!("{}_{fields}_{suffix}", table_name.table));
            self.quote_identifier(&name)
        };
        let mut binder = ValueBinder::inline();

        let mut snippet = match &constraint.kind {
            ConstraintKind::Check(filter) => {
                if !support.check {
                    return Err(self.dialect.unsupported("CHECK constraints"));
                }
                let ctx = FormatContext::default().with_model(table.model());
                format!(
                    "CONSTRAINT {} CHECK ({})",
                    name_or("ck"),
                    self.where_item_query(filter, &ctx, &mut binder)?
                )
            }
            ConstraintKind::Unique => {
                if !support.unique {
                    return Err(self.dialect.unsupported("UNIQUE constraints"));
                }
                format!("CONSTRAINT {} UNIQUE ({quoted_fields})", name_or("uk"))
            }
            ConstraintKind::Default(value) => {
                if !support.default {
                    return Err(self.dialect.unsupported("DEFAULT constraints"));
                }
                format!(
                    "CONSTRAINT {} DEFAULT ({}) FOR {}",
                    name_or("df"),
                    self.escape_value(value)?,
                    self.quote_identifier(&constraint.fields[0])
                )
            }
            ConstraintKind::PrimaryKey => {
                if !support.primary_key {
                    return Err(self.dialect.unsupported("PRIMARY KEY constraints"));
                }
                format!("CONSTRAINT {} PRIMARY KEY ({quoted_fields})", name_or("pk"))
            }
            ConstraintKind::ForeignKey(references) => {
                if !support.foreign_key {
                    return Err(self.dialect.unsupported("FOREIGN KEY constraints"));
                }
                let name = name_or(&format!("{}_fk", references.table.table));
                let mut sql = format!(
                    "CONSTRAINT {name} FOREIGN KEY ({quoted_fields}) REFERENCES {} ({})",
                    self.quote_table_name(&references.table),
                    self.quote_identifier(&references.key)
                );
                if let Some(action) = references.on_update {
                    if !support.on_update {
                        return Err(self.dialect.unsupported("ON UPDATE on foreign keys"));
                    }
                    sql.push_str(" ON UPDATE ");
                    sql.push_str(action.as_sql());
                }
                if let Some(action) = references.on_delete {
                    sql.push_str(" ON DELETE ");
                    sql.push_str(action.as_sql());
                }
                sql
            }
        };

        let deferrable = match &constraint.kind {
            ConstraintKind::Unique | ConstraintKind::PrimaryKey => constraint.deferrable,
            ConstraintKind::ForeignKey(references) => {
                constraint.deferrable.or(references.deferrable)
            }
            ConstraintKind::Check(_) | ConstraintKind::Default(_) => None,
        };
        if let Some(deferrable) = deferrable {
            snippet.push(' ');
            snippet.push_str(&self.deferrable_snippet(deferrable)?);
        }

        let sql = format!(
            "ALTER TABLE {} ADD {snippet};",
            self.quote_table_name(&table_name)
        );
        self.finish("addConstraintQuery", sql, binder)
    }

    pub(super) fn deferrable_snippet(&self, deferrable: Deferrable) -> Result<&'static str> {
        if !self.dialect.supports().constraints.deferrable {
            return Err(self.dialect.unsupported("deferrable constraints"));
        }
        Ok(deferrable.as_sql())
    }

    /// # Errors
    ///
    /// Fails when the engine cannot drop constraints, or on unsupported
    /// options.
    pub fn remove_constraint_query(
        &self,
        table: &TableRef,
        constraint_name: &str,
        options: &RemoveOptions,
    ) -> Result<Query> {
        let support = self.dialect.supports().constraints;
        validate_options(
            "removeConstraintQuery",
            self.dialect,
            REMOVE_CONSTRAINT_SUPPORTABLE,
            &support.remove_options.supported(),
            options,
        )?;
        if !support.remove {
            return Err(self.dialect.unsupported("removing constraints"));
        }

        let mut sql = format!("ALTER TABLE {} DROP CONSTRAINT ", self.quote_table(table, None));
        if options.if_exists {
            sql.push_str("IF EXISTS ");
        }
        sql.push_str(&self.quote_identifier(constraint_name));
        if options.cascade {
            sql.push_str(" CASCADE");
        }
        sql.push(';');
        Ok(Query::new(sql))
    }

    /// Drops a foreign key by constraint name. MySQL and MariaDB spell it
    /// `DROP FOREIGN KEY`; elsewhere it is an ordinary constraint.
    ///
    /// # Errors
    ///
    /// Fails when the engine cannot drop constraints.
    pub fn drop_foreign_key_query(&self, table: &TableRef, foreign_key: &str) -> Result<Query> {
        if !self.dialect.kind().is_mysql_family() {
            return self.remove_constraint_query(table, foreign_key, &RemoveOptions::default());
        }
        Ok(Query::new(format!(
            "ALTER TABLE {} DROP FOREIGN KEY {};",
            self.quote_table(table, None),
            self.quote_identifier(foreign_key)
        )))
    }

    /// `SET CONSTRAINTS ... DEFERRED|IMMEDIATE`, for every deferrable
    /// constraint when `constraints` is empty.
    ///
    /// # Errors
    ///
    /// Fails on engines without deferrable constraints.
    pub fn set_constraint_checking_query(
        &self,
        checking: ConstraintChecking,
        constraints: &[String],
    ) -> Result<Query> {
        if !self.dialect.supports().constraints.deferrable {
            return Err(self.dialect.unsupported("deferrable constraints"));
        }
        let target = if constraints.is_empty() {
            String::from("ALL")
        } else {
            self.quote_identifiers(constraints)
        };
        Ok(Query::new(format!("SET CONSTRAINTS {target} {};", checking.as_sql())))
    }

    /// Lists the constraints of a table, one row per constraint column.
    /// Feed the rows to [`fold_constraints`].
    ///
    /// # Errors
    ///
    /// Fails on engines without a constraint catalog, and on filters the
    /// engine cannot apply.
    pub fn show_constraints_query(
        &self,
        table: &TableRef,
        options: &ShowConstraintsOptions,
    ) -> Result<Query> {
        let rules = self.dialect.rules();
        let supported: &[&str] = if rules.show_constraints_filters() {
            SHOW_CONSTRAINTS_SUPPORTABLE
        } else {
            &[]
        };
        validate_options(
            "showConstraintsQuery",
            self.dialect,
            SHOW_CONSTRAINTS_SUPPORTABLE,
            supported,
            options,
        )?;
        let sql = rules
            .show_constraints_query(self.dialect, &table.table_name(), options)
            .ok_or_else(|| self.dialect.unsupported("listing constraints"))?;
        Ok(Query::new(sql))
    }
}
