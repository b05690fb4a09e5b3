//! WHERE filters.
//!
//! A [`Where`] is a boolean expression tree. It is built either with the
//! Q-object style builders:
//!
//! ```ignore
//! use polysql_core::filter::Where;
//!
//! let filter = Where::attr("status").eq("active")
//!     .and(Where::attr("age").gt(18).or(Where::attr("verified").eq(true)));
//! ```
//!
//! or parsed from a JSON filter specification with [`Where::from_json`].
//! Compiling it into SQL is done by the query generator, see
//! [`QueryGenerator::where_query`](crate::query::QueryGenerator::where_query).

mod compile;

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::value::{SqlValue, ToSqlValue};

/// WHERE operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Is,
    IsNot,
    In,
    NotIn,
    Like,
    NotLike,
    ILike,
    NotILike,
    StartsWith,
    EndsWith,
    Substring,
    NotStartsWith,
    NotEndsWith,
    NotSubstring,
    Regexp,
    NotRegexp,
    IRegexp,
    NotIRegexp,
    Between,
    NotBetween,
    Overlap,
    Contains,
    Contained,
    Adjacent,
    StrictLeft,
    StrictRight,
    NoExtendLeft,
    NoExtendRight,
}

impl Op {
    pub const ALL: [Self; 34] = [
        Self::Eq,
        Self::Ne,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Is,
        Self::IsNot,
        Self::In,
        Self::NotIn,
        Self::Like,
        Self::NotLike,
        Self::ILike,
        Self::NotILike,
        Self::StartsWith,
        Self::EndsWith,
        Self::Substring,
        Self::NotStartsWith,
        Self::NotEndsWith,
        Self::NotSubstring,
        Self::Regexp,
        Self::NotRegexp,
        Self::IRegexp,
        Self::NotIRegexp,
        Self::Between,
        Self::NotBetween,
        Self::Overlap,
        Self::Contains,
        Self::Contained,
        Self::Adjacent,
        Self::StrictLeft,
        Self::StrictRight,
        Self::NoExtendLeft,
        Self::NoExtendRight,
    ];

    /// The name used in filter specifications.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Is => "is",
            Self::IsNot => "isNot",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::Like => "like",
            Self::NotLike => "notLike",
            Self::ILike => "iLike",
            Self::NotILike => "notILike",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::Substring => "substring",
            Self::NotStartsWith => "notStartsWith",
            Self::NotEndsWith => "notEndsWith",
            Self::NotSubstring => "notSubstring",
            Self::Regexp => "regexp",
            Self::NotRegexp => "notRegexp",
            Self::IRegexp => "iRegexp",
            Self::NotIRegexp => "notIRegexp",
            Self::Between => "between",
            Self::NotBetween => "notBetween",
            Self::Overlap => "overlap",
            Self::Contains => "contains",
            Self::Contained => "contained",
            Self::Adjacent => "adjacent",
            Self::StrictLeft => "strictLeft",
            Self::StrictRight => "strictRight",
            Self::NoExtendLeft => "noExtendLeft",
            Self::NoExtendRight => "noExtendRight",
        }
    }

    /// Looks an operator up by name. A leading `$` is accepted.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.strip_prefix('$').unwrap_or(name);
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// The ANSI/PostgreSQL spelling. Dialects may override it.
    #[must_use]
    pub const fn default_keyword(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Is => "IS",
            Self::IsNot => "IS NOT",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Like | Self::StartsWith | Self::EndsWith | Self::Substring => "LIKE",
            Self::NotLike | Self::NotStartsWith | Self::NotEndsWith | Self::NotSubstring => {
                "NOT LIKE"
            }
            Self::ILike => "ILIKE",
            Self::NotILike => "NOT ILIKE",
            Self::Regexp => "~",
            Self::NotRegexp => "!~",
            Self::IRegexp => "~*",
            Self::NotIRegexp => "!~*",
            Self::Between => "BETWEEN",
            Self::NotBetween => "NOT BETWEEN",
            Self::Overlap => "&&",
            Self::Contains => "@>",
            Self::Contained => "<@",
            Self::Adjacent => "-|-",
            Self::StrictLeft => "<<",
            Self::StrictRight => ">>",
            Self::NoExtendLeft => "&>",
            Self::NoExtendRight => "&<",
        }
    }

    /// Operators whose comparand is a list of values.
    #[must_use]
    pub const fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn | Self::Between | Self::NotBetween)
    }

    #[must_use]
    pub const fn is_regexp(self) -> bool {
        matches!(
            self,
            Self::Regexp | Self::NotRegexp | Self::IRegexp | Self::NotIRegexp
        )
    }

    /// Pattern operators, whose comparand is always text.
    #[must_use]
    pub const fn is_textual(self) -> bool {
        matches!(
            self,
            Self::Like
                | Self::NotLike
                | Self::ILike
                | Self::NotILike
                | Self::StartsWith
                | Self::EndsWith
                | Self::Substring
                | Self::NotStartsWith
                | Self::NotEndsWith
                | Self::NotSubstring
        ) || self.is_regexp()
    }

    /// Operators that only exist for arrays or ranges.
    #[must_use]
    pub const fn is_array_or_range(self) -> bool {
        matches!(self, Self::Overlap | Self::Contains | Self::Contained) || self.is_range_only()
    }

    #[must_use]
    pub const fn is_range_only(self) -> bool {
        matches!(
            self,
            Self::Adjacent
                | Self::StrictLeft
                | Self::StrictRight
                | Self::NoExtendLeft
                | Self::NoExtendRight
        )
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(SqlValue),
    List(Vec<SqlValue>),
    Expr(Expr),
}

impl Operand {
    pub fn value<V: ToSqlValue>(value: V) -> Self {
        Self::Value(value.to_sql_value())
    }
}

/// A boolean expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    And(Vec<Where>),
    Or(Vec<Where>),
    Not(Box<Where>),
    Compare { left: Expr, op: Op, right: Operand },
    /// A raw boolean fragment.
    Raw(Expr),
}

impl Default for Where {
    fn default() -> Self {
        Self::And(Vec::new())
    }
}

impl Where {
    /// Starts a comparison on a model attribute.
    pub fn attr(name: impl Into<String>) -> Condition {
        Condition {
            left: Expr::attribute(name),
        }
    }

    /// Starts a comparison on an arbitrary expression.
    #[must_use]
    pub const fn expr(left: Expr) -> Condition {
        Condition { left }
    }

    /// Combines two filters with AND, flattening nested ANDs.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut items) => {
                items.push(other);
                Self::And(items)
            }
            this => Self::And(vec![this, other]),
        }
    }

    /// Combines two filters with OR, flattening nested ORs.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Or(mut items) => {
                items.push(other);
                Self::Or(items)
            }
            this => Self::Or(vec![this, other]),
        }
    }

    /// Negates the filter.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Whether the filter has no conditions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::And(items) | Self::Or(items) => items.iter().all(Self::is_empty),
            Self::Not(inner) => inner.is_empty(),
            Self::Compare { .. } | Self::Raw(_) => false,
        }
    }

    /// Parses a JSON filter specification.
    ///
    /// Keys are attributes (plain names or `$assoc.attr$`) or the
    /// combinators `$and`, `$or` and `$not`. Under an attribute, a scalar
    /// means equality, an array means `IN`, and an object maps operator
    /// names (with or without a `$` prefix) to comparands.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousWhere`] for every shape that does not
    /// resolve to exactly one operator per comparison.
    pub fn from_json(spec: &Value) -> Result<Self> {
        match spec {
            Value::Object(map) => parse_object(map),
            Value::Array(items) => items
                .iter()
                .map(Self::from_json)
                .collect::<Result<_>>()
                .map(Self::And),
            other => Err(ambiguous(
                "<root>",
                format!("expected an object, found {}", json_kind(other)),
            )),
        }
    }
}

/// A comparison waiting for its operator.
#[derive(Debug, Clone)]
pub struct Condition {
    left: Expr,
}

impl Condition {
    /// Compares with any operator.
    #[must_use]
    pub fn op(self, op: Op, right: Operand) -> Where {
        Where::Compare {
            left: self.left,
            op,
            right,
        }
    }

    fn value<V: ToSqlValue>(self, op: Op, value: V) -> Where {
        self.op(op, Operand::value(value))
    }

    pub fn eq<V: ToSqlValue>(self, value: V) -> Where {
        self.value(Op::Eq, value)
    }

    pub fn ne<V: ToSqlValue>(self, value: V) -> Where {
        self.value(Op::Ne, value)
    }

    pub fn gt<V: ToSqlValue>(self, value: V) -> Where {
        self.value(Op::Gt, value)
    }

    pub fn gte<V: ToSqlValue>(self, value: V) -> Where {
        self.value(Op::Gte, value)
    }

    pub fn lt<V: ToSqlValue>(self, value: V) -> Where {
        self.value(Op::Lt, value)
    }

    pub fn lte<V: ToSqlValue>(self, value: V) -> Where {
        self.value(Op::Lte, value)
    }

    #[must_use]
    pub fn is_null(self) -> Where {
        self.op(Op::Is, Operand::Value(SqlValue::Null))
    }

    #[must_use]
    pub fn is_not_null(self) -> Where {
        self.op(Op::IsNot, Operand::Value(SqlValue::Null))
    }

    pub fn in_list<V: ToSqlValue>(self, values: Vec<V>) -> Where {
        let values = values.into_iter().map(ToSqlValue::to_sql_value).collect();
        self.op(Op::In, Operand::List(values))
    }

    pub fn not_in_list<V: ToSqlValue>(self, values: Vec<V>) -> Where {
        let values = values.into_iter().map(ToSqlValue::to_sql_value).collect();
        self.op(Op::NotIn, Operand::List(values))
    }

    pub fn between<V: ToSqlValue>(self, low: V, high: V) -> Where {
        self.op(
            Op::Between,
            Operand::List(vec![low.to_sql_value(), high.to_sql_value()]),
        )
    }

    pub fn like(self, pattern: impl Into<String>) -> Where {
        self.value(Op::Like, pattern.into())
    }

    pub fn starts_with(self, prefix: impl Into<String>) -> Where {
        self.value(Op::StartsWith, prefix.into())
    }

    pub fn ends_with(self, suffix: impl Into<String>) -> Where {
        self.value(Op::EndsWith, suffix.into())
    }

    pub fn substring(self, needle: impl Into<String>) -> Where {
        self.value(Op::Substring, needle.into())
    }

    pub fn regexp(self, pattern: impl Into<String>) -> Where {
        self.value(Op::Regexp, pattern.into())
    }
}

fn ambiguous(key: &str, shape: impl Into<String>) -> Error {
    Error::AmbiguousWhere {
        key: key.to_string(),
        shape: shape.into(),
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn is_attribute_syntax(key: &str) -> bool {
    key.starts_with('$') && key[1..].contains('$')
}

fn parse_object(map: &Map<String, Value>) -> Result<Where> {
    let mut items = Vec::with_capacity(map.len());
    for (key, value) in map {
        items.push(match key.as_str() {
            "$and" => Where::And(parse_group(key, value)?),
            "$or" => Where::Or(parse_group(key, value)?),
            "$not" => Where::from_json(value)?.not(),
            _ if key.starts_with('$') && !is_attribute_syntax(key) => {
                return Err(ambiguous(
                    key,
                    "operator or unknown combinator used without an attribute",
                ));
            }
            _ => parse_attribute(key, value)?,
        });
    }
    Ok(Where::And(items))
}

/// `$and`/`$or` take an array of specifications, or an object whose entries
/// are each one specification.
fn parse_group(key: &str, value: &Value) -> Result<Vec<Where>> {
    match value {
        Value::Array(items) => items.iter().map(Where::from_json).collect(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let mut single = Map::new();
                single.insert(k.clone(), v.clone());
                parse_object(&single)
            })
            .collect(),
        other => Err(ambiguous(key, format!("expected an array, found {}", json_kind(other)))),
    }
}

fn parse_attribute(attribute: &str, value: &Value) -> Result<Where> {
    let left = || Expr::attribute(attribute);
    match value {
        Value::Object(map) => parse_operators(attribute, map),
        Value::Array(items) => Ok(Where::Compare {
            left: left(),
            op: Op::In,
            right: Operand::List(items.iter().map(SqlValue::from_json).collect()),
        }),
        scalar => Ok(Where::Compare {
            left: left(),
            op: Op::Eq,
            right: Operand::Value(SqlValue::from_json(scalar)),
        }),
    }
}

fn parse_operators(attribute: &str, map: &Map<String, Value>) -> Result<Where> {
    if map.is_empty() {
        return Err(ambiguous(attribute, "empty object"));
    }
    let unknown: Vec<&str> = map
        .keys()
        .map(String::as_str)
        .filter(|k| !matches!(*k, "$and" | "$or") && Op::from_name(k).is_none())
        .collect();
    if !unknown.is_empty() {
        return Err(ambiguous(
            attribute,
            format!("object with unrecognized keys {}", unknown.join(", ")),
        ));
    }

    let mut items = Vec::with_capacity(map.len());
    for (key, value) in map {
        let item = match key.as_str() {
            "$and" => Where::And(parse_operator_group(attribute, value)?),
            "$or" => Where::Or(parse_operator_group(attribute, value)?),
            name => {
                let op = Op::from_name(name).ok_or_else(|| ambiguous(attribute, name))?;
                Where::Compare {
                    left: Expr::attribute(attribute),
                    op,
                    right: parse_operand(attribute, op, value)?,
                }
            }
        };
        items.push(item);
    }

    Ok(if items.len() == 1 {
        items.remove(0)
    } else {
        Where::And(items)
    })
}

/// Operators grouped under one attribute, as in `{age: {$or: {lt: 5, gt: 60}}}`.
fn parse_operator_group(attribute: &str, value: &Value) -> Result<Vec<Where>> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let mut single = Map::new();
                single.insert(k.clone(), v.clone());
                parse_operators(attribute, &single)
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(map) => parse_operators(attribute, map),
                other => Ok(Where::Compare {
                    left: Expr::attribute(attribute),
                    op: Op::Eq,
                    right: Operand::Value(SqlValue::from_json(other)),
                }),
            })
            .collect(),
        other => Err(ambiguous(
            attribute,
            format!("operator group must be an object or array, found {}", json_kind(other)),
        )),
    }
}

fn parse_operand(attribute: &str, op: Op, value: &Value) -> Result<Operand> {
    match value {
        Value::Array(items) if op.takes_list() => {
            Ok(Operand::List(items.iter().map(SqlValue::from_json).collect()))
        }
        _ if op.takes_list() => Err(ambiguous(
            attribute,
            format!("{op} expects an array, found {}", json_kind(value)),
        )),
        Value::Object(_) if matches!(op, Op::Contains | Op::Contained) => {
            Ok(Operand::Value(SqlValue::Json(value.clone())))
        }
        Value::Object(_) => Err(ambiguous(
            attribute,
            format!("{op} expects a value, found an object"),
        )),
        other => Ok(Operand::Value(SqlValue::from_json(other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compare(attr: &str, op: Op, right: Operand) -> Where {
        Where::Compare {
            left: Expr::attribute(attr),
            op,
            right,
        }
    }

    #[test]
    fn test_operator_names_round_trip() {
        for op in Op::ALL {
            assert_eq!(Op::from_name(op.name()), Some(op));
        }
        assert_eq!(Op::from_name("$gt"), Some(Op::Gt));
        assert_eq!(Op::from_name("notAnOperator"), None);
    }

    #[test]
    fn test_scalar_is_equality_and_array_is_in() {
        let filter = Where::from_json(&json!({"name": "bob", "id": [1, 2]})).unwrap();
        assert_eq!(
            filter,
            Where::And(vec![
                compare("name", Op::Eq, Operand::value("bob")),
                compare("id", Op::In, Operand::List(vec![SqlValue::Int(1), SqlValue::Int(2)])),
            ])
        );
    }

    #[test]
    fn test_operator_object_expands() {
        let filter = Where::from_json(&json!({"age": {"gt": 5, "$lte": 10}})).unwrap();
        assert_eq!(
            filter,
            Where::And(vec![Where::And(vec![
                compare("age", Op::Gt, Operand::value(5)),
                compare("age", Op::Lte, Operand::value(10)),
            ])])
        );
    }

    #[test]
    fn test_unknown_operator_is_ambiguous() {
        let err = Where::from_json(&json!({"age": {"notAnOperator": 5}})).unwrap_err();
        assert!(matches!(err, Error::AmbiguousWhere { ref key, .. } if key == "age"));
    }

    #[test]
    fn test_mixed_operator_and_unknown_keys_are_ambiguous() {
        assert!(Where::from_json(&json!({"age": {"gt": 5, "other": 1}})).is_err());
        assert!(Where::from_json(&json!({"profile": {}})).is_err());
        assert!(Where::from_json(&json!({"$gt": 5})).is_err());
        assert!(Where::from_json(&json!({"$nand": []})).is_err());
        assert!(Where::from_json(&json!({"age": {"eq": {"nested": 1}}})).is_err());
        assert!(Where::from_json(&json!({"age": {"in": 5}})).is_err());
    }

    #[test]
    fn test_combinators() {
        let filter =
            Where::from_json(&json!({"$or": [{"a": 1}, {"b": 2}], "$not": {"c": 3}})).unwrap();
        let Where::And(items) = filter else {
            panic!("expected AND");
        };
        assert!(matches!(&items[0], Where::Or(inner) if inner.len() == 2));
        assert!(matches!(&items[1], Where::Not(_)));
    }

    #[test]
    fn test_operator_group_under_attribute() {
        let filter = Where::from_json(&json!({"age": {"$or": {"lt": 5, "gt": 60}}})).unwrap();
        assert_eq!(
            filter,
            Where::And(vec![Where::Or(vec![
                compare("age", Op::Lt, Operand::value(5)),
                compare("age", Op::Gt, Operand::value(60)),
            ])])
        );
    }

    #[test]
    fn test_association_attribute_keys() {
        let filter = Where::from_json(&json!({"$author.name$": "ann"})).unwrap();
        assert_eq!(
            filter,
            Where::And(vec![compare("$author.name$", Op::Eq, Operand::value("ann"))])
        );
    }

    #[test]
    fn test_builders_flatten() {
        let filter = Where::attr("a").eq(1).and(Where::attr("b").eq(2)).and(Where::attr("c").eq(3));
        assert!(matches!(filter, Where::And(ref items) if items.len() == 3));
        assert!(Where::default().is_empty());
        assert!(!filter.is_empty());
    }
}
