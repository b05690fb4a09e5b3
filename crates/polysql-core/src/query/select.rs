//! SELECT and pagination.

use super::{Query, QueryGenerator, SelectOptions};
use crate::bind::ValueBinder;
use crate::dialect::supports::Pagination;
use crate::error::Result;
use crate::expr::FormatContext;
use crate::schema::TableRef;

/// Row count standing in for "no limit" where OFFSET needs one.
const NO_LIMIT: &str = "10000000000000";

impl QueryGenerator<'_> {
    /// Builds a `SELECT` over one table.
    ///
    /// # Errors
    ///
    /// Fails when the filter or an attribute cannot be compiled.
    pub fn select_query(&self, table: &TableRef, options: &SelectOptions) -> Result<Query> {
        let ctx = FormatContext::default()
            .with_model(table.model())
            .with_alias(options.alias.as_deref())
            .with_replacements(options.replacements.as_ref());
        let mut binder = ValueBinder::inline();

        let mut sql = String::from("SELECT ");
        if options.attributes.is_empty() {
            sql.push('*');
        } else {
            let attributes = options
                .attributes
                .iter()
                .map(|attribute| self.format_expr(attribute, &ctx, &mut binder))
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(&attributes.join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(&self.quote_table(table, options.alias.as_deref()));

        if let Some(filter) = &options.where_clause {
            let clause = self.where_query(filter, &ctx, &mut binder)?;
            if !clause.is_empty() {
                sql.push(' ');
                sql.push_str(&clause);
            }
        }

        if !options.group_by.is_empty() {
            let groups = options
                .group_by
                .iter()
                .map(|group| self.format_expr(group, &ctx, &mut binder))
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" GROUP BY ");
            sql.push_str(&groups.join(", "));
        }

        if !options.order.is_empty() {
            let order = options
                .order
                .iter()
                .map(|term| {
                    self.format_expr(&term.expr, &ctx, &mut binder)
                        .map(|sql| format!("{sql} {}", term.direction.as_sql()))
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        sql.push_str(&self.add_limit_and_offset(options, table));
        sql.push(';');
        self.finish("selectQuery", sql, binder)
    }

    /// The LIMIT/OFFSET fragment of a select, with its leading space.
    ///
    /// Engines whose row limiting depends on ordering get an `ORDER BY` on
    /// the primary key when the select has none.
    #[must_use]
    pub fn add_limit_and_offset(&self, options: &SelectOptions, table: &TableRef) -> String {
        let limit = options.limit;
        let offset = options.offset.filter(|offset| *offset > 0);
        let rules = self.dialect.rules();
        let mut fragment = String::new();

        match self.dialect.supports().pagination {
            Pagination::LimitOffset => {
                if let Some(limit) = limit {
                    fragment.push_str(&format!(" LIMIT {limit}"));
                } else if let (Some(_), Some(unbounded)) = (offset, rules.unbounded_limit()) {
                    fragment.push_str(&format!(" LIMIT {unbounded}"));
                }
                if let Some(offset) = offset {
                    fragment.push_str(&format!(" OFFSET {offset}"));
                }
            }
            Pagination::LimitCommaOffset => match (limit, offset) {
                (Some(limit), Some(offset)) => {
                    fragment.push_str(&format!(" LIMIT {offset}, {limit}"))
                }
                (Some(limit), None) => fragment.push_str(&format!(" LIMIT {limit}")),
                (None, Some(offset)) => fragment.push_str(&format!(
                    " LIMIT {offset}, {}",
                    rules.unbounded_limit().unwrap_or(NO_LIMIT)
                )),
                (None, None) => {}
            },
            pagination @ (Pagination::OffsetFetch | Pagination::FetchFirst) => {
                if limit.is_none() && offset.is_none() {
                    return fragment;
                }
                if options.order.is_empty() && rules.limit_requires_order() {
                    fragment.push_str(" ORDER BY ");
                    fragment.push_str(&self.tiebreaker(table, options.alias.as_deref()));
                }
                if pagination == Pagination::OffsetFetch || offset.is_some() {
                    fragment.push_str(&format!(" OFFSET {} ROWS", offset.unwrap_or(0)));
                }
                if let Some(limit) = limit {
                    let next = if pagination == Pagination::OffsetFetch { "NEXT" } else { "FIRST" };
                    fragment.push_str(&format!(" FETCH {next} {limit} ROWS ONLY"));
                }
            }
        }
        fragment
    }

    /// Deterministic ordering for order-sensitive row limiting.
    fn tiebreaker(&self, table: &TableRef, alias: Option<&str>) -> String {
        let Some(pk) = table
            .model()
            .and_then(|model| model.primary_keys().first().map(|pk| pk.field.clone()))
        else {
            return String::from("(SELECT NULL)");
        };
        let qualifier = alias.map_or_else(
            || self.quote_table(table, None),
            |alias| self.quote_identifier(alias),
        );
        format!("{qualifier}.{}", self.quote_identifier(&pk))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dialect::{Dialect, DialectKind};
    use crate::expr::Expr;
    use crate::filter::Where;
    use crate::query::OrderBy;
    use crate::schema::{AttributeDef, ModelSchema};
    use crate::types::DataType;

    fn paged(limit: Option<u64>, offset: Option<u64>) -> SelectOptions {
        SelectOptions {
            limit,
            offset,
            ..SelectOptions::default()
        }
    }

    fn fragment(kind: DialectKind, options: &SelectOptions, table: &TableRef) -> String {
        let dialect = Dialect::new(kind).unwrap();
        dialect.query_generator().add_limit_and_offset(options, table)
    }

    fn users_model() -> TableRef {
        TableRef::Model(Arc::new(
            ModelSchema::new("Users")
                .attribute(
                    AttributeDef::new("id", DataType::integer())
                        .primary_key()
                        .auto_increment(),
                ),
        ))
    }

    #[test]
    fn test_limit_offset_family() {
        let table = TableRef::from("users");
        assert_eq!(
            fragment(DialectKind::Postgres, &paged(Some(10), Some(20)), &table),
            " LIMIT 10 OFFSET 20"
        );
        assert_eq!(fragment(DialectKind::Postgres, &paged(None, Some(5)), &table), " OFFSET 5");
        assert_eq!(
            fragment(DialectKind::Sqlite, &paged(None, Some(5)), &table),
            " LIMIT -1 OFFSET 5"
        );
        assert_eq!(fragment(DialectKind::Postgres, &paged(None, None), &table), "");
    }

    #[test]
    fn test_limit_comma_offset() {
        let table = TableRef::from("users");
        assert_eq!(
            fragment(DialectKind::Mysql, &paged(Some(10), Some(20)), &table),
            " LIMIT 20, 10"
        );
        assert_eq!(
            fragment(DialectKind::Mariadb, &paged(None, Some(20)), &table),
            " LIMIT 20, 10000000000000"
        );
    }

    #[test]
    fn test_offset_fetch_injects_order() {
        assert_eq!(
            fragment(DialectKind::Mssql, &paged(Some(10), None), &users_model()),
            " ORDER BY [Users].[id] OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY"
        );
        assert_eq!(
            fragment(DialectKind::Mssql, &paged(Some(10), None), &TableRef::from("t")),
            " ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY"
        );
        assert_eq!(
            fragment(DialectKind::Db2, &paged(Some(10), Some(5)), &users_model()),
            " OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY"
        );
        assert_eq!(
            fragment(DialectKind::Ibmi, &paged(Some(10), None), &users_model()),
            " FETCH FIRST 10 ROWS ONLY"
        );
    }

    #[test]
    fn test_select_query_assembles_clauses() {
        let dialect = Dialect::new(DialectKind::Postgres).unwrap();
        let options = SelectOptions {
            attributes: vec![Expr::attribute("id"), Expr::func("COUNT", vec![Expr::col("*")])],
            where_clause: Some(Where::attr("age").gte(18)),
            group_by: vec![Expr::attribute("id")],
            order: vec![OrderBy::desc("id")],
            limit: Some(5),
            ..SelectOptions::default()
        };
        let query = dialect
            .query_generator()
            .select_query(&TableRef::from("users"), &options)
            .unwrap();
        assert_eq!(
            query.sql,
            "SELECT \"id\", COUNT(*) FROM \"users\" WHERE \"age\" >= 18 GROUP BY \"id\" ORDER BY \"id\" DESC LIMIT 5;"
        );
        assert!(query.bind.is_none());
    }

    #[test]
    fn test_select_with_empty_filter_has_no_where() {
        let dialect = Dialect::new(DialectKind::Sqlite).unwrap();
        let options = SelectOptions {
            where_clause: Some(Where::default()),
            ..SelectOptions::default()
        };
        let query = dialect
            .query_generator()
            .select_query(&TableRef::from("users"), &options)
            .unwrap();
        assert_eq!(query.sql, "SELECT * FROM `users`;");
    }
}
