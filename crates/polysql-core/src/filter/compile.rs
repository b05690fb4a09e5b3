//! Compiling [`Where`] trees into SQL predicates.

use super::{Op, Operand, Where};
use crate::bind::ValueBinder;
use crate::error::{Error, Result};
use crate::expr::{parse_attribute_syntax, Expr, FormatContext};
use crate::query::QueryGenerator;
use crate::types::DataType;
use crate::value::SqlValue;

/// How a compiled fragment combines its parts, for parenthesization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Leaf,
    And,
    Or,
    /// Raw SQL that may contain either combinator.
    Mixed,
}

struct Compiled {
    sql: String,
    shape: Shape,
}

impl Compiled {
    const fn leaf(sql: String) -> Self {
        Self {
            sql,
            shape: Shape::Leaf,
        }
    }
}

/// Declared type of a plain model attribute.
fn attribute_type<'a>(left: &Expr, ctx: &FormatContext<'a>) -> Option<&'a DataType> {
    let (Expr::Attribute(name), Some(model)) = (left, ctx.model) else {
        return None;
    };
    let parsed = parse_attribute_syntax(name).ok()?;
    if !parsed.associations.is_empty() || !parsed.json_path.is_empty() || !parsed.casts.is_empty() {
        return None;
    }
    model.get(&parsed.attribute).map(|a| &a.data_type)
}

fn list_operand(op: Op, right: &Operand) -> Result<&[SqlValue]> {
    match right {
        Operand::List(values) => Ok(values),
        Operand::Value(SqlValue::Array(values)) => Ok(values),
        Operand::Value(other) => Err(Error::invalid(format!(
            "{op} expects a list of values, got {}",
            other.kind()
        ))),
        Operand::Expr(_) => Err(Error::invalid(format!("{op} expects a list of values"))),
    }
}

impl QueryGenerator<'_> {
    /// Compiles a filter into a bare predicate.
    ///
    /// An empty filter gives an empty string.
    ///
    /// # Errors
    ///
    /// Fails on unsupported operators, malformed comparands or values that
    /// do not validate against their type.
    pub fn where_item_query(
        &self,
        filter: &Where,
        ctx: &FormatContext<'_>,
        binder: &mut ValueBinder,
    ) -> Result<String> {
        Ok(self.compile_where(filter, ctx, binder)?.sql)
    }

    /// Compiles a filter into a `WHERE` clause, or an empty string when the
    /// filter has no conditions.
    ///
    /// # Errors
    ///
    /// See [`where_item_query`](Self::where_item_query).
    pub fn where_query(
        &self,
        filter: &Where,
        ctx: &FormatContext<'_>,
        binder: &mut ValueBinder,
    ) -> Result<String> {
        let predicate = self.where_item_query(filter, ctx, binder)?;
        if predicate.is_empty() {
            return Ok(predicate);
        }
        Ok(format!("WHERE {predicate}"))
    }

    fn compile_where(
        &self,
        filter: &Where,
        ctx: &FormatContext<'_>,
        binder: &mut ValueBinder,
    ) -> Result<Compiled> {
        match filter {
            Where::And(items) => self.compile_group(items, Shape::And, ctx, binder),
            Where::Or(items) => self.compile_group(items, Shape::Or, ctx, binder),
            Where::Not(inner) => {
                let compiled = self.compile_where(inner, ctx, binder)?;
                if compiled.sql.is_empty() {
                    return Ok(compiled);
                }
                Ok(Compiled::leaf(format!("NOT ({})", compiled.sql)))
            }
            Where::Compare { left, op, right } => self
                .compile_comparison(left, *op, right, ctx, binder)
                .map(Compiled::leaf),
            Where::Raw(expr) => {
                let sql = self.format_expr(expr, ctx, binder)?;
                let shape = if sql.contains(" AND ") || sql.contains(" OR ") {
                    Shape::Mixed
                } else {
                    Shape::Leaf
                };
                Ok(Compiled { sql, shape })
            }
        }
    }

    fn compile_group(
        &self,
        items: &[Where],
        kind: Shape,
        ctx: &FormatContext<'_>,
        binder: &mut ValueBinder,
    ) -> Result<Compiled> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            let compiled = self.compile_where(item, ctx, binder)?;
            if !compiled.sql.is_empty() {
                parts.push(compiled);
            }
        }

        if parts.len() <= 1 {
            return Ok(parts
                .pop()
                .unwrap_or_else(|| Compiled::leaf(String::new())));
        }

        let glue = if kind == Shape::And { " AND " } else { " OR " };
        let sql = parts
            .into_iter()
            .map(|part| {
                if part.shape == Shape::Leaf || part.shape == kind {
                    part.sql
                } else {
                    format!("({})", part.sql)
                }
            })
            .collect::<Vec<_>>()
            .join(glue);
        Ok(Compiled { sql, shape: kind })
    }

    fn compile_comparison(
        &self,
        left: &Expr,
        op: Op,
        right: &Operand,
        ctx: &FormatContext<'_>,
        binder: &mut ValueBinder,
    ) -> Result<String> {
        let rules = self.dialect().rules();
        let data_types = &self.dialect().supports().data_types;
        if !rules.supports_operator(op) {
            return Err(self.dialect().unsupported(format!("the {op} operator")));
        }
        if op.is_range_only() && !data_types.range {
            return Err(self.dialect().unsupported(format!("the {op} range operator")));
        }
        if op.is_array_or_range() && !data_types.array && !data_types.range {
            return Err(self.dialect().unsupported(format!("the {op} array operator")));
        }

        let declared = attribute_type(left, ctx);
        let left_sql = self.format_expr(left, ctx, binder)?;
        let keyword = rules
            .operator_keyword(op)
            .unwrap_or_else(|| op.default_keyword());

        match op {
            Op::Eq | Op::Ne if matches!(right, Operand::Value(SqlValue::Null)) => {
                let test = if op == Op::Eq { "IS NULL" } else { "IS NOT NULL" };
                Ok(format!("{left_sql} {test}"))
            }
            Op::Is | Op::IsNot => {
                let rhs = match right {
                    Operand::Value(SqlValue::Null) => String::from("NULL"),
                    Operand::Value(SqlValue::Bool(true)) => String::from("TRUE"),
                    Operand::Value(SqlValue::Bool(false)) => String::from("FALSE"),
                    Operand::Expr(expr @ Expr::Literal(_)) => self.format_expr(expr, ctx, binder)?,
                    _ => {
                        return Err(Error::invalid(format!(
                            "{op} only accepts null, true or false"
                        )))
                    }
                };
                Ok(format!("{left_sql} {keyword} {rhs}"))
            }
            Op::In | Op::NotIn => {
                if let Operand::Expr(expr) = right {
                    let rhs = self.format_expr(expr, ctx, binder)?;
                    return Ok(format!("{left_sql} {keyword} {rhs}"));
                }
                let values = list_operand(op, right)?;
                if values.is_empty() {
                    return Ok(if op == Op::In {
                        format!("{left_sql} IN (NULL)")
                    } else {
                        String::new()
                    });
                }
                let element = match declared {
                    Some(DataType::Array { of }) => Some(&**of),
                    other => other,
                };
                let items = self.escape_list_with(values, element, binder)?;
                Ok(format!("{left_sql} {keyword} ({items})"))
            }
            Op::Between | Op::NotBetween => {
                let [low, high] = list_operand(op, right)? else {
                    return Err(Error::invalid(format!("{op} expects exactly two values")));
                };
                let low = self.escape_or_bind(low, declared, binder)?;
                let high = self.escape_or_bind(high, declared, binder)?;
                Ok(format!("{left_sql} {keyword} {low} AND {high}"))
            }
            Op::StartsWith
            | Op::EndsWith
            | Op::Substring
            | Op::NotStartsWith
            | Op::NotEndsWith
            | Op::NotSubstring => {
                let rhs = self.wildcard_operand(op, right, ctx, binder)?;
                Ok(format!("{left_sql} {keyword} {rhs}"))
            }
            _ if op.is_regexp() && rules.regexp_function() => {
                let pattern = self.operand_sql(right, Some(&DataType::text()), ctx, binder)?;
                let negate = if matches!(op, Op::NotRegexp | Op::NotIRegexp) {
                    "NOT "
                } else {
                    ""
                };
                let flags = if matches!(op, Op::IRegexp | Op::NotIRegexp) {
                    ", 'i'"
                } else {
                    ""
                };
                Ok(format!("{negate}REGEXP_LIKE({left_sql}, {pattern}{flags})"))
            }
            _ => {
                let text = DataType::text();
                let ty = if op.is_textual() { Some(&text) } else { declared };
                let rhs = self.operand_sql(right, ty, ctx, binder)?;
                Ok(format!("{left_sql} {keyword} {rhs}"))
            }
        }
    }

    /// Right-hand side of a prefix, suffix or substring match.
    fn wildcard_operand(
        &self,
        op: Op,
        right: &Operand,
        ctx: &FormatContext<'_>,
        binder: &mut ValueBinder,
    ) -> Result<String> {
        let (leading, trailing) = match op {
            Op::StartsWith | Op::NotStartsWith => (false, true),
            Op::EndsWith | Op::NotEndsWith => (true, false),
            _ => (true, true),
        };
        match right {
            Operand::Value(SqlValue::Text(text)) => {
                let pattern = format!(
                    "{}{text}{}",
                    if leading { "%" } else { "" },
                    if trailing { "%" } else { "" }
                );
                self.escape_or_bind(&SqlValue::Text(pattern), Some(&DataType::text()), binder)
            }
            Operand::Expr(expr) => {
                let inner = self.format_expr(expr, ctx, binder)?;
                let mut parts = Vec::with_capacity(3);
                if leading {
                    parts.push(String::from("'%'"));
                }
                parts.push(inner);
                if trailing {
                    parts.push(String::from("'%'"));
                }
                Ok(format!("CONCAT({})", parts.join(", ")))
            }
            Operand::Value(other) => Err(Error::validation(other, "string")),
            Operand::List(_) => Err(Error::invalid(format!("{op} expects a single string"))),
        }
    }

    fn operand_sql(
        &self,
        right: &Operand,
        ty: Option<&DataType>,
        ctx: &FormatContext<'_>,
        binder: &mut ValueBinder,
    ) -> Result<String> {
        match right {
            Operand::Value(value) => self.escape_or_bind(value, ty, binder),
            Operand::Expr(expr) => self.format_expr(expr, ctx, binder),
            Operand::List(values) => {
                self.escape_or_bind(&SqlValue::Array(values.clone()), ty, binder)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dialect::{Dialect, DialectKind};
    use crate::schema::{AttributeDef, ModelSchema};

    fn compile(kind: DialectKind, filter: &Where) -> Result<String> {
        let dialect = Dialect::new(kind).unwrap();
        let mut binder = ValueBinder::inline();
        dialect
            .query_generator()
            .where_item_query(filter, &FormatContext::default(), &mut binder)
    }

    fn pg(filter: &Where) -> String {
        compile(DialectKind::Postgres, filter).unwrap()
    }

    #[test]
    fn test_empty_filter_is_empty_string() {
        assert_eq!(pg(&Where::from_json(&json!({})).unwrap()), "");
        let dialect = Dialect::new(DialectKind::Postgres).unwrap();
        let clause = dialect
            .query_generator()
            .where_query(&Where::default(), &FormatContext::default(), &mut ValueBinder::inline())
            .unwrap();
        assert_eq!(clause, "");
    }

    #[test]
    fn test_operator_object_compiles() {
        let filter = Where::from_json(&json!({"age": {"gt": 5}})).unwrap();
        assert_eq!(pg(&filter), "\"age\" > 5");
    }

    #[test]
    fn test_null_equality_becomes_is_null() {
        let filter = Where::from_json(&json!({"deletedAt": null, "name": {"ne": null}})).unwrap();
        assert_eq!(pg(&filter), "\"deletedAt\" IS NULL AND \"name\" IS NOT NULL");
    }

    #[test]
    fn test_in_lists() {
        assert_eq!(pg(&Where::attr("id").in_list(vec![1, 2])), "\"id\" IN (1, 2)");
        assert_eq!(pg(&Where::attr("id").in_list(Vec::<i64>::new())), "\"id\" IN (NULL)");
        assert_eq!(pg(&Where::attr("id").not_in_list(Vec::<i64>::new())), "");
        let filter = Where::attr("a").eq(1).and(Where::attr("id").not_in_list(Vec::<i64>::new()));
        assert_eq!(pg(&filter), "\"a\" = 1");
    }

    #[test]
    fn test_between_needs_two_values() {
        assert_eq!(pg(&Where::attr("age").between(18, 30)), "\"age\" BETWEEN 18 AND 30");
        let filter = Where::attr("age").op(Op::Between, Operand::List(vec![SqlValue::Int(1)]));
        assert!(matches!(
            compile(DialectKind::Postgres, &filter),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_wildcards() {
        assert_eq!(pg(&Where::attr("name").starts_with("Jo")), "\"name\" LIKE 'Jo%'");
        assert_eq!(pg(&Where::attr("name").substring("o'b")), "\"name\" LIKE '%o''b%'");
        let filter = Where::attr("name").op(Op::EndsWith, Operand::Expr(Expr::col("other.name")));
        assert_eq!(pg(&filter), "\"name\" LIKE CONCAT('%', \"other\".\"name\")");
    }

    #[test]
    fn test_is_accepts_only_keywords() {
        let filter = Where::attr("active").op(Op::Is, Operand::value(true));
        assert_eq!(pg(&filter), "\"active\" IS TRUE");
        let filter = Where::attr("active").op(Op::IsNot, Operand::value(1));
        assert!(compile(DialectKind::Postgres, &filter).is_err());
    }

    #[test]
    fn test_combinators_parenthesize_other_kinds() {
        let filter = Where::attr("a")
            .eq(1)
            .and(Where::attr("b").eq(2).or(Where::attr("c").eq(3)));
        assert_eq!(pg(&filter), "\"a\" = 1 AND (\"b\" = 2 OR \"c\" = 3)");

        let negated = Where::attr("a").eq(1).and(Where::attr("b").eq(2)).not();
        assert_eq!(pg(&negated), "NOT (\"a\" = 1 AND \"b\" = 2)");
    }

    #[test]
    fn test_raw_fragments_with_combinators_are_wrapped() {
        let filter = Where::Raw(Expr::literal("x = 1 OR y = 2")).and(Where::attr("z").eq(3));
        assert_eq!(pg(&filter), "(x = 1 OR y = 2) AND \"z\" = 3");
    }

    #[test]
    fn test_regexp_spellings() {
        let filter = Where::attr("name").regexp("^a");
        assert_eq!(pg(&filter), "\"name\" ~ '^a'");
        assert_eq!(
            compile(DialectKind::Mysql, &filter).unwrap(),
            "`name` REGEXP '^a'"
        );
        let insensitive = Where::attr("name").op(Op::NotIRegexp, Operand::value("^a"));
        assert_eq!(
            compile(DialectKind::Db2, &insensitive).unwrap(),
            "NOT REGEXP_LIKE(\"name\", '^a', 'i')"
        );
        assert!(matches!(
            compile(DialectKind::Mssql, &filter),
            Err(Error::UnsupportedByDialect { .. })
        ));
    }

    #[test]
    fn test_array_operators_need_array_support() {
        let filter = Where::attr("tags").op(
            Op::Overlap,
            Operand::List(vec![SqlValue::from_json(&json!("a"))]),
        );
        assert!(compile(DialectKind::Postgres, &filter).is_ok());
        assert!(matches!(
            compile(DialectKind::Sqlite, &filter),
            Err(Error::UnsupportedByDialect { .. })
        ));
    }

    #[test]
    fn test_model_types_and_columns() {
        let model = ModelSchema::new("users")
            .attribute(AttributeDef::new("firstName", DataType::string()).field("first_name"))
            .attribute(AttributeDef::new("age", DataType::integer()));
        let dialect = Dialect::new(DialectKind::Postgres).unwrap();
        let ctx = FormatContext::default()
            .with_model(Some(&model))
            .with_alias(Some("User"));
        let filter = Where::attr("firstName").eq("Ann");
        let sql = dialect
            .query_generator()
            .where_item_query(&filter, &ctx, &mut ValueBinder::inline())
            .unwrap();
        assert_eq!(sql, "\"User\".\"first_name\" = 'Ann'");

        let bad = Where::attr("age").eq("old");
        assert!(matches!(
            dialect
                .query_generator()
                .where_item_query(&bad, &ctx, &mut ValueBinder::inline()),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_collecting_binder_emits_tokens() {
        let dialect = Dialect::new(DialectKind::Postgres).unwrap();
        let mut binder = ValueBinder::collecting();
        let filter = Where::attr("name").eq("Ann").and(Where::attr("age").gt(3));
        let sql = dialect
            .query_generator()
            .where_item_query(&filter, &FormatContext::default(), &mut binder)
            .unwrap();
        assert_eq!(sql, "\"name\" = $sequelize_1 AND \"age\" > $sequelize_2");
        assert!(!binder.is_empty());
    }
}
