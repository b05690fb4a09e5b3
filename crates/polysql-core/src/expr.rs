//! SQL expression nodes.
//!
//! An [`Expr`] is an immutable tree describing a fragment of SQL. Nothing is
//! rendered here; [`QueryGenerator::format_expr`](crate::query::QueryGenerator::format_expr)
//! turns a tree into text for one dialect, quoting identifiers and escaping
//! or binding values on the way.

use std::sync::LazyLock;

use regex::Regex;

use crate::bind::Replacements;
use crate::error::{Error, Result};
use crate::filter::Where;
use crate::schema::ModelSchema;
use crate::types::DataType;
use crate::value::{SqlValue, ToSqlValue};

static ATTRIBUTE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^.:\[\]$]+").expect("valid attribute pattern"));
static CAST_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*").expect("valid cast pattern"));

/// One step of a JSON path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonPathSegment {
    Key(String),
    Index(usize),
}

/// Piece of a [`Expr::Literal`].
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralPart {
    /// Raw SQL, emitted as is.
    Sql(String),
    Expr(Expr),
}

/// Target of a [`Expr::Cast`].
#[derive(Debug, Clone, PartialEq)]
pub enum CastTarget {
    /// Rendered through the dialect's type registry.
    Type(DataType),
    /// Rendered uppercased, as written.
    Named(String),
}

/// A SQL fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Raw SQL interleaved with nested expressions.
    Literal(Vec<LiteralPart>),
    /// A dotted identifier, each part quoted.
    Identifier(Vec<String>),
    /// A column reference such as `users.id` or `*`.
    Col(String),
    Fn {
        name: String,
        args: Vec<Expr>,
    },
    Cast {
        expr: Box<Expr>,
        target: CastTarget,
    },
    /// A parenthesized, comma separated list.
    List(Vec<Expr>),
    /// A model attribute, resolved to its column when a schema is known.
    ///
    /// Supports `$assoc.path.attr$`, `attr.json.path`, `attr[0]`,
    /// `attr::type` and `attr:unquote`.
    Attribute(String),
    JsonPath {
        expr: Box<Expr>,
        path: Vec<JsonPathSegment>,
        unquote: bool,
    },
    /// A column reached through associations, rendered `"a->b"."column"`.
    AssociationPath {
        associations: Vec<String>,
        attribute: String,
    },
    /// A value, escaped or bound when formatted.
    Value(SqlValue),
    /// A nested boolean expression.
    Where(Box<Where>),
}

impl Expr {
    /// Raw SQL. Named `:replacements` inside are substituted when the
    /// statement is formatted with replacements.
    pub fn literal(sql: impl Into<String>) -> Self {
        Self::Literal(vec![LiteralPart::Sql(sql.into())])
    }

    pub fn identifier<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Identifier(parts.into_iter().map(Into::into).collect())
    }

    pub fn col(name: impl Into<String>) -> Self {
        Self::Col(name.into())
    }

    pub fn func(name: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Fn {
            name: name.into(),
            args,
        }
    }

    #[must_use]
    pub fn cast(self, target: CastTarget) -> Self {
        Self::Cast {
            expr: Box::new(self),
            target,
        }
    }

    #[must_use]
    pub const fn list(items: Vec<Self>) -> Self {
        Self::List(items)
    }

    pub fn attribute(name: impl Into<String>) -> Self {
        Self::Attribute(name.into())
    }

    #[must_use]
    pub fn json_path(self, path: Vec<JsonPathSegment>, unquote: bool) -> Self {
        Self::JsonPath {
            expr: Box::new(self),
            path,
            unquote,
        }
    }

    pub fn association_path<I, S>(associations: I, attribute: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AssociationPath {
            associations: associations.into_iter().map(Into::into).collect(),
            attribute: attribute.into(),
        }
    }

    pub fn value<V: ToSqlValue>(value: V) -> Self {
        Self::Value(value.to_sql_value())
    }

    /// Whether formatting this node yields an AND/OR combination that
    /// needs parentheses when embedded.
    #[must_use]
    pub fn is_combinator(&self) -> bool {
        matches!(self, Self::Where(w) if matches!(**w, Where::And(_) | Where::Or(_)))
    }
}

impl From<Where> for Expr {
    fn from(value: Where) -> Self {
        Self::Where(Box::new(value))
    }
}

/// What an expression is formatted against.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatContext<'a> {
    /// Resolves attribute names to columns and comparand types.
    pub model: Option<&'a ModelSchema>,
    /// Qualifies plain attributes.
    pub main_alias: Option<&'a str>,
    /// Named replacements substituted into literals.
    pub replacements: Option<&'a Replacements>,
}

impl<'a> FormatContext<'a> {
    #[must_use]
    pub const fn with_model(mut self, model: Option<&'a ModelSchema>) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub const fn with_alias(mut self, alias: Option<&'a str>) -> Self {
        self.main_alias = alias;
        self
    }

    #[must_use]
    pub const fn with_replacements(mut self, replacements: Option<&'a Replacements>) -> Self {
        self.replacements = replacements;
        self
    }
}

/// An attribute reference split into its parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAttribute {
    pub associations: Vec<String>,
    pub attribute: String,
    pub json_path: Vec<JsonPathSegment>,
    /// Cast targets, applied in order.
    pub casts: Vec<String>,
    pub unquote: bool,
}

/// Splits `$a.b.attr$.json[0]::int:unquote` style attribute syntax.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] when the syntax is malformed.
pub fn parse_attribute_syntax(input: &str) -> Result<ParsedAttribute> {
    let malformed = || Error::invalid(format!("cannot parse attribute syntax {input:?}"));
    let mut parsed = ParsedAttribute::default();

    let mut rest = if let Some(stripped) = input.strip_prefix('$') {
        let end = stripped.find('$').ok_or_else(malformed)?;
        let mut parts: Vec<String> = stripped[..end].split('.').map(str::to_string).collect();
        parsed.attribute = parts.pop().filter(|a| !a.is_empty()).ok_or_else(malformed)?;
        parsed.associations = parts;
        &stripped[end + 1..]
    } else {
        let name = ATTRIBUTE_NAME.find(input).ok_or_else(malformed)?;
        parsed.attribute = name.as_str().to_string();
        &input[name.end()..]
    };

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("::") {
            let target = CAST_TYPE.find(after).ok_or_else(malformed)?;
            parsed.casts.push(target.as_str().to_string());
            rest = &after[target.end()..];
        } else if let Some(after) = rest.strip_prefix(':') {
            let modifier = after.split([':', '.', '[']).next().unwrap_or_default();
            if modifier != "unquote" {
                return Err(Error::invalid(format!(
                    "unknown attribute modifier {modifier:?} in {input:?}"
                )));
            }
            parsed.unquote = true;
            rest = &after[modifier.len()..];
        } else if let Some(after) = rest.strip_prefix('.') {
            let (key, remaining) = take_key(after).ok_or_else(malformed)?;
            parsed.json_path.push(JsonPathSegment::Key(key));
            rest = remaining;
        } else if let Some(after) = rest.strip_prefix('[') {
            let end = after.find(']').ok_or_else(malformed)?;
            let inner = &after[..end];
            let segment = match inner.parse::<usize>() {
                Ok(index) => JsonPathSegment::Index(index),
                Err(_) => JsonPathSegment::Key(
                    inner
                        .strip_prefix('"')
                        .and_then(|s| s.strip_suffix('"'))
                        .ok_or_else(malformed)?
                        .to_string(),
                ),
            };
            parsed.json_path.push(segment);
            rest = &after[end + 1..];
        } else {
            return Err(malformed());
        }
    }

    Ok(parsed)
}

/// Reads one JSON key, bare or double-quoted.
fn take_key(input: &str) -> Option<(String, &str)> {
    if let Some(quoted) = input.strip_prefix('"') {
        let end = quoted.find('"')?;
        return Some((quoted[..end].to_string(), &quoted[end + 1..]));
    }
    let end = input.find(['.', '[', ':']).unwrap_or(input.len());
    (end > 0).then(|| (input[..end].to_string(), &input[end..]))
}
