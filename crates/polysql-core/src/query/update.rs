//! UPDATE and DELETE.

use indexmap::IndexMap;

use super::{
    ArithmeticOptions, DeleteOptions, OrderBy, Query, QueryGenerator, SelectOptions, UpdateOptions,
};
use crate::bind::ValueBinder;
use crate::dialect::options::{validate_options, ARITHMETIC_SUPPORTABLE, UPDATE_SUPPORTABLE};
use crate::dialect::supports::ReturnValues;
use crate::error::{Error, Result};
use crate::expr::FormatContext;
use crate::filter::Where;
use crate::schema::TableRef;
use crate::value::SqlValue;

impl QueryGenerator<'_> {
    /// Builds an `UPDATE`.
    ///
    /// Returns an empty [`Query`] when nothing is left to set. Values are
    /// bound unless `inline_values` is set.
    ///
    /// # Errors
    ///
    /// Fails on unsupported options, reserved bind names, and values or
    /// filters that do not compile.
    pub fn update_query(
        &self,
        table: &TableRef,
        values: &IndexMap<String, SqlValue>,
        filter: &Where,
        options: &UpdateOptions,
    ) -> Result<Query> {
        let supports = self.dialect.supports();
        let supported: Vec<&str> = [
            ("limit", supports.limit_on_update),
            (
                "returning",
                supports.returning != ReturnValues::None || supports.final_table,
            ),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect();
        validate_options("updateQuery", self.dialect, UPDATE_SUPPORTABLE, &supported, options)?;

        let mut binder = if options.inline_values {
            ValueBinder::inline()
        } else {
            ValueBinder::with_reserved(options.bind.clone())?
        };
        let model = table.model();

        let mut assignments = Vec::with_capacity(values.len());
        for (name, value) in values {
            let attribute = model.and_then(|m| m.get(name));
            if attribute.is_some_and(|a| a.auto_increment) && !supports.auto_increment.update {
                continue;
            }
            let column = attribute.map_or(name.as_str(), |a| a.field.as_str());
            let value = self.escape_or_bind(value, attribute.map(|a| &a.data_type), &mut binder)?;
            assignments.push(format!("{} = {value}", self.quote_identifier(column)));
        }
        if assignments.is_empty() {
            return Ok(Query::default());
        }

        let top = self.dialect.rules().top_limit();
        let mut sql = String::from("UPDATE ");
        if let (true, Some(limit)) = (top, options.limit) {
            sql.push_str(&format!("TOP({limit}) "));
        }
        sql.push_str(&self.quote_table(table, None));
        sql.push_str(" SET ");
        sql.push_str(&assignments.join(", "));

        let (output, returning) = self.returning_clauses(&options.returning);
        sql.push_str(&output);

        let ctx = FormatContext::default().with_model(model);
        let clause = self.where_query(filter, &ctx, &mut binder)?;
        if !clause.is_empty() {
            sql.push(' ');
            sql.push_str(&clause);
        }
        if let (false, Some(limit)) = (top, options.limit) {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        sql.push_str(&returning);

        let mut sql = self.wrap_final_table(sql, &options.returning);
        sql.push(';');
        self.finish("updateQuery", sql, binder)
    }

    /// Builds a `DELETE` with inlined values.
    ///
    /// A limit uses the engine's own syntax where there is one. Otherwise
    /// the rows are picked by primary key in a subquery.
    ///
    /// # Errors
    ///
    /// Fails when the filter does not compile, or when a limit needs the
    /// subquery and the table has no known primary key.
    pub fn delete_query(
        &self,
        table: &TableRef,
        filter: &Where,
        options: &DeleteOptions,
    ) -> Result<Query> {
        let model = table.model();
        let ctx = FormatContext::default().with_model(model);
        let mut binder = ValueBinder::inline();
        let quoted_table = self.quote_table(table, None);
        let clause = self.where_query(filter, &ctx, &mut binder)?;
        let where_fragment = if clause.is_empty() {
            String::new()
        } else {
            format!(" {clause}")
        };

        let sql = match options.limit {
            None => format!("DELETE FROM {quoted_table}{where_fragment};"),
            Some(limit) if self.dialect.rules().top_limit() => {
                format!("DELETE TOP({limit}) FROM {quoted_table}{where_fragment};")
            }
            Some(limit) if self.dialect.supports().delete_limit => {
                format!("DELETE FROM {quoted_table}{where_fragment} LIMIT {limit};")
            }
            Some(limit) => {
                let pk = model
                    .and_then(|m| m.primary_keys().first().map(|pk| pk.field.clone()))
                    .ok_or_else(|| {
                        Error::invalid("a limited delete needs a model with a primary key")
                    })?;
                let quoted_pk = self.quote_identifier(&pk);
                let paging = SelectOptions {
                    order: vec![OrderBy::asc(pk)],
                    limit: Some(limit),
                    ..SelectOptions::default()
                };
                format!(
                    "DELETE FROM {quoted_table} WHERE {quoted_pk} IN (SELECT {quoted_pk} FROM {quoted_table}{where_fragment} ORDER BY {quoted_pk} ASC{});",
                    self.add_limit_and_offset(&paging, table)
                )
            }
        };
        self.finish("deleteQuery", sql, binder)
    }

    /// Builds an `UPDATE` adding each amount to its column in place,
    /// `SET "c" = "c" + n`.
    ///
    /// `extra` holds plain assignments made in the same statement. Every
    /// value is inlined.
    ///
    /// # Errors
    ///
    /// Fails on unsupported options, when there is nothing to increment,
    /// on amounts that are not finite numbers, and on filters that do not
    /// compile.
    pub fn increment_query(
        &self,
        table: &TableRef,
        filter: &Where,
        amounts: &IndexMap<String, SqlValue>,
        extra: &IndexMap<String, SqlValue>,
        options: &ArithmeticOptions,
    ) -> Result<Query> {
        self.arithmetic_query("incrementQuery", "+", table, filter, amounts, extra, options)
    }

    /// Same as [`increment_query`](Self::increment_query), subtracting.
    ///
    /// # Errors
    ///
    /// See [`increment_query`](Self::increment_query).
    pub fn decrement_query(
        &self,
        table: &TableRef,
        filter: &Where,
        amounts: &IndexMap<String, SqlValue>,
        extra: &IndexMap<String, SqlValue>,
        options: &ArithmeticOptions,
    ) -> Result<Query> {
        self.arithmetic_query("decrementQuery", "-", table, filter, amounts, extra, options)
    }

    #[allow(clippy::too_many_arguments)]
    fn arithmetic_query(
        &self,
        method: &'static str,
        operator: &str,
        table: &TableRef,
        filter: &Where,
        amounts: &IndexMap<String, SqlValue>,
        extra: &IndexMap<String, SqlValue>,
        options: &ArithmeticOptions,
    ) -> Result<Query> {
        let supports = self.dialect.supports();
        let supported: &[&str] =
            if supports.returning != ReturnValues::None || supports.final_table {
                &["returning"]
            } else {
                &[]
            };
        validate_options(method, self.dialect, ARITHMETIC_SUPPORTABLE, supported, options)?;
        if amounts.is_empty() {
            return Err(Error::invalid(format!("{method} needs at least one column to change")));
        }

        let model = table.model();
        let mut assignments = Vec::with_capacity(amounts.len() + extra.len());
        for (name, amount) in amounts {
            let finite = match amount {
                SqlValue::Int(_) => true,
                SqlValue::Float(f) => f.is_finite(),
                _ => false,
            };
            if !finite {
                return Err(Error::invalid(format!(
                    "the amount for {name} must be a finite number"
                )));
            }
            let attribute = model.and_then(|m| m.get(name));
            let column =
                self.quote_identifier(attribute.map_or(name.as_str(), |a| a.field.as_str()));
            let amount = self.escape_value(amount)?;
            assignments.push(format!("{column} = {column} {operator} {amount}"));
        }
        for (name, value) in extra {
            let attribute = model.and_then(|m| m.get(name));
            let column = attribute.map_or(name.as_str(), |a| a.field.as_str());
            let value = self.escape(value, attribute.map(|a| &a.data_type))?;
            assignments.push(format!("{} = {value}", self.quote_identifier(column)));
        }

        let mut sql = format!(
            "UPDATE {} SET {}",
            self.quote_table(table, None),
            assignments.join(", ")
        );
        let (output, returning) = self.returning_clauses(&options.returning);
        sql.push_str(&output);

        let mut binder = ValueBinder::inline();
        let ctx = FormatContext::default().with_model(model);
        let clause = self.where_query(filter, &ctx, &mut binder)?;
        if !clause.is_empty() {
            sql.push(' ');
            sql.push_str(&clause);
        }
        sql.push_str(&returning);

        let mut sql = self.wrap_final_table(sql, &options.returning);
        sql.push(';');
        self.finish(method, sql, binder)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dialect::{Dialect, DialectKind};
    use crate::query::Returning;
    use crate::schema::{AttributeDef, ModelSchema};
    use crate::types::DataType;

    fn users() -> TableRef {
        TableRef::Model(Arc::new(
            ModelSchema::new("users")
                .attribute(
                    AttributeDef::new("id", DataType::integer())
                        .primary_key()
                        .auto_increment(),
                )
                .attribute(AttributeDef::new("name", DataType::string())),
        ))
    }

    fn set(pairs: &[(&str, SqlValue)]) -> IndexMap<String, SqlValue> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_update_binds_values_and_filter() {
        let dialect = Dialect::new(DialectKind::Postgres).unwrap();
        let query = dialect
            .query_generator()
            .update_query(
                &users(),
                &set(&[("name", SqlValue::Text("Bob".into()))]),
                &Where::attr("id").eq(3),
                &UpdateOptions::default(),
            )
            .unwrap();
        assert_eq!(query.sql, "UPDATE \"users\" SET \"name\" = $1 WHERE \"id\" = $2;");
        assert_eq!(
            query.bind.unwrap().positional(),
            vec![SqlValue::Text("Bob".into()), SqlValue::Int(3)]
        );
    }

    #[test]
    fn test_update_with_nothing_to_set_is_empty() {
        let dialect = Dialect::new(DialectKind::Mssql).unwrap();
        let query = dialect
            .query_generator()
            .update_query(
                &users(),
                &set(&[("id", SqlValue::Int(9))]),
                &Where::default(),
                &UpdateOptions::default(),
            )
            .unwrap();
        assert!(query.is_empty());
        assert!(query.bind.is_none());
    }

    #[test]
    fn test_update_limits() {
        let options = UpdateOptions {
            limit: Some(2),
            inline_values: true,
            ..UpdateOptions::default()
        };
        let values = set(&[("name", SqlValue::Text("x".into()))]);
        let filter = Where::attr("name").eq("y");

        let mysql = Dialect::new(DialectKind::Mysql).unwrap();
        assert_eq!(
            mysql.query_generator().update_query(&users(), &values, &filter, &options).unwrap().sql,
            "UPDATE `users` SET `name` = 'x' WHERE `name` = 'y' LIMIT 2;"
        );
        let mssql = Dialect::new(DialectKind::Mssql).unwrap();
        assert_eq!(
            mssql.query_generator().update_query(&users(), &values, &filter, &options).unwrap().sql,
            "UPDATE TOP(2) [users] SET [name] = 'x' WHERE [name] = 'y';"
        );
        let pg = Dialect::new(DialectKind::Postgres).unwrap();
        assert!(pg.query_generator().update_query(&users(), &values, &filter, &options).is_err());
    }

    #[test]
    fn test_update_returning() {
        let options = UpdateOptions {
            returning: Returning::Columns(vec!["id".into()]),
            inline_values: true,
            ..UpdateOptions::default()
        };
        let values = set(&[("name", SqlValue::Text("x".into()))]);
        let mssql = Dialect::new(DialectKind::Mssql).unwrap();
        assert_eq!(
            mssql
                .query_generator()
                .update_query(&users(), &values, &Where::default(), &options)
                .unwrap()
                .sql,
            "UPDATE [users] SET [name] = 'x' OUTPUT INSERTED.[id];"
        );
        let pg = Dialect::new(DialectKind::Postgres).unwrap();
        assert_eq!(
            pg.query_generator()
                .update_query(&users(), &values, &Where::default(), &options)
                .unwrap()
                .sql,
            "UPDATE \"users\" SET \"name\" = 'x' RETURNING \"id\";"
        );
    }

    #[test]
    fn test_delete_limits() {
        let filter = Where::attr("name").eq("x");
        let options = DeleteOptions { limit: Some(10) };

        let mysql = Dialect::new(DialectKind::Mysql).unwrap();
        assert_eq!(
            mysql.query_generator().delete_query(&users(), &filter, &options).unwrap().sql,
            "DELETE FROM `users` WHERE `name` = 'x' LIMIT 10;"
        );
        let mssql = Dialect::new(DialectKind::Mssql).unwrap();
        assert_eq!(
            mssql.query_generator().delete_query(&users(), &filter, &options).unwrap().sql,
            "DELETE TOP(10) FROM [users] WHERE [name] = 'x';"
        );
        let pg = Dialect::new(DialectKind::Postgres).unwrap();
        assert_eq!(
            pg.query_generator().delete_query(&users(), &filter, &options).unwrap().sql,
            "DELETE FROM \"users\" WHERE \"id\" IN (SELECT \"id\" FROM \"users\" WHERE \"name\" = 'x' ORDER BY \"id\" ASC LIMIT 10);"
        );
        let db2 = Dialect::new(DialectKind::Db2).unwrap();
        assert_eq!(
            db2.query_generator().delete_query(&users(), &filter, &options).unwrap().sql,
            "DELETE FROM \"users\" WHERE \"id\" IN (SELECT \"id\" FROM \"users\" WHERE \"name\" = 'x' ORDER BY \"id\" ASC OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY);"
        );
    }

    #[test]
    fn test_delete_everything_and_keyless_limit() {
        let pg = Dialect::new(DialectKind::Postgres).unwrap();
        assert_eq!(
            pg.query_generator()
                .delete_query(&TableRef::from("logs"), &Where::default(), &DeleteOptions::default())
                .unwrap()
                .sql,
            "DELETE FROM \"logs\";"
        );
        assert!(matches!(
            pg.query_generator().delete_query(
                &TableRef::from("logs"),
                &Where::default(),
                &DeleteOptions { limit: Some(1) }
            ),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_increment_and_decrement_in_place() {
        let pg = Dialect::new(DialectKind::Postgres).unwrap();
        let query = pg
            .query_generator()
            .increment_query(
                &users(),
                &Where::attr("id").eq(3),
                &set(&[("id", SqlValue::Int(1))]),
                &set(&[("name", SqlValue::Text("seen".into()))]),
                &ArithmeticOptions::default(),
            )
            .unwrap();
        assert_eq!(
            query.sql,
            "UPDATE \"users\" SET \"id\" = \"id\" + 1, \"name\" = 'seen' WHERE \"id\" = 3;"
        );
        assert!(query.bind.is_none());

        let mysql = Dialect::new(DialectKind::Mysql).unwrap();
        assert_eq!(
            mysql
                .query_generator()
                .decrement_query(
                    &TableRef::from("stock"),
                    &Where::default(),
                    &set(&[("count", SqlValue::Float(2.5))]),
                    &IndexMap::new(),
                    &ArithmeticOptions::default(),
                )
                .unwrap()
                .sql,
            "UPDATE `stock` SET `count` = `count` - 2.5;"
        );
    }

    #[test]
    fn test_arithmetic_returning_per_engine() {
        let options = ArithmeticOptions {
            returning: Returning::All,
        };
        let amounts = set(&[("hits", SqlValue::Int(1))]);
        let table = TableRef::from("pages");
        let run = |kind| {
            Dialect::new(kind).unwrap().query_generator().increment_query(
                &table,
                &Where::default(),
                &amounts,
                &IndexMap::new(),
                &options,
            )
        };
        assert_eq!(
            run(DialectKind::Postgres).unwrap().sql,
            "UPDATE \"pages\" SET \"hits\" = \"hits\" + 1 RETURNING *;"
        );
        assert_eq!(
            run(DialectKind::Mssql).unwrap().sql,
            "UPDATE [pages] SET [hits] = [hits] + 1 OUTPUT INSERTED.*;"
        );
        assert_eq!(
            run(DialectKind::Db2).unwrap().sql,
            "SELECT * FROM FINAL TABLE (UPDATE \"pages\" SET \"hits\" = \"hits\" + 1);"
        );
        assert!(matches!(
            run(DialectKind::Mysql),
            Err(Error::UnsupportedOption { .. })
        ));
    }

    #[test]
    fn test_arithmetic_rejects_bad_amounts() {
        let pg = Dialect::new(DialectKind::Postgres).unwrap();
        let generator = pg.query_generator();
        for amounts in [
            IndexMap::new(),
            set(&[("hits", SqlValue::Text("1; DROP TABLE pages".into()))]),
            set(&[("hits", SqlValue::Float(f64::NAN))]),
            set(&[("hits", SqlValue::Null)]),
        ] {
            assert!(matches!(
                generator.increment_query(
                    &TableRef::from("pages"),
                    &Where::default(),
                    &amounts,
                    &IndexMap::new(),
                    &ArithmeticOptions::default(),
                ),
                Err(Error::InvalidInput(_))
            ));
        }
    }
}
