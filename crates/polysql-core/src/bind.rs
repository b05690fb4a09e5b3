//! Bind parameters and replacements.
//!
//! Values are collected per statement under generated names and referenced
//! in SQL by a neutral `$name` token. Once the statement is complete,
//! [`map_bind_parameters`] rewrites those tokens into the engine's own
//! placeholder syntax, skipping anything inside string literals, delimited
//! identifiers, comments and dollar-quoted strings.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::value::SqlValue;

/// Prefix of every generated bind name. Caller binds may not use it.
pub const RESERVED_PREFIX: &str = "sequelize_";

static DOLLAR_QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\$([a-z_][0-9a-z_]*)?\$").expect("valid pattern"));
static BIND_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\$([a-z_][0-9a-z_]*|[1-9][0-9]*)(?:\]|\)|,|$|\s|::|;)")
        .expect("valid pattern")
});
static REPLACEMENT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^:([a-z_][0-9a-z_]*)(?:\)|,|$|\s|::|;|\])").expect("valid pattern")
});

/// How an engine spells bind placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindStyle {
    /// Every occurrence is `token` and order matters (`?`).
    UnspecifiedOrdered { token: &'static str },
    /// Numbered placeholders (`$1`); a repeated name reuses its number.
    SpecifiedOrdered { prefix: &'static str },
    /// Named placeholders (`$name`, `@name`).
    Named { prefix: &'static str },
}

/// Bind values of a generated statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Bind {
    pub values: IndexMap<String, SqlValue>,
    /// Name of the value behind each placeholder, for ordered styles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<String>>,
}

impl Bind {
    /// Values in the order the driver expects them.
    ///
    /// Ordered styles follow the placeholder order, named styles follow
    /// collection order.
    #[must_use]
    pub fn positional(&self) -> Vec<SqlValue> {
        self.order.as_ref().map_or_else(
            || self.values.values().cloned().collect(),
            |order| {
                order
                    .iter()
                    .map(|name| self.values.get(name).cloned().unwrap_or(SqlValue::Null))
                    .collect()
            },
        )
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Per-statement value sink.
///
/// In inline mode nothing is collected and callers escape values into the
/// SQL. In collecting mode every value handed to [`collect`](Self::collect)
/// is stored and replaced by a `$sequelize_N` token.
#[derive(Debug, Default)]
pub struct ValueBinder {
    collecting: bool,
    values: IndexMap<String, SqlValue>,
    next: usize,
}

impl ValueBinder {
    #[must_use]
    pub fn inline() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn collecting() -> Self {
        Self {
            collecting: true,
            ..Self::default()
        }
    }

    /// Starts a collecting binder that already holds caller binds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservedBindName`] if any caller name starts with
    /// [`RESERVED_PREFIX`].
    pub fn with_reserved(caller: IndexMap<String, SqlValue>) -> Result<Self> {
        let clashing: Vec<String> = caller
            .keys()
            .filter(|name| name.starts_with(RESERVED_PREFIX))
            .cloned()
            .collect();
        if !clashing.is_empty() {
            return Err(Error::ReservedBindName { names: clashing });
        }

        Ok(Self {
            collecting: true,
            values: caller,
            next: 0,
        })
    }

    #[must_use]
    pub const fn is_collecting(&self) -> bool {
        self.collecting
    }

    /// Stores `value` and returns the token that references it.
    pub fn collect(&mut self, value: SqlValue) -> String {
        self.next += 1;
        let name = format!("{RESERVED_PREFIX}{}", self.next);
        let token = format!("${name}");
        self.values.insert(name, value);
        token
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether a value is recorded under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub(crate) fn into_values(self) -> IndexMap<String, SqlValue> {
        self.values
    }
}

/// Named or positional replacement values.
#[derive(Debug, Clone, PartialEq)]
pub enum Replacements {
    Named(IndexMap<String, SqlValue>),
    Positional(Vec<SqlValue>),
}

enum Pass<'a> {
    /// Returns `None` to leave the token untouched.
    Bind(&'a mut dyn FnMut(&str) -> Option<String>),
    Replace {
        replacements: &'a Replacements,
        reject_positional: bool,
    },
}

/// Whether `c` may directly precede a placeholder.
fn can_precede_token(c: Option<u8>) -> bool {
    c.is_none_or(|c| c.is_ascii_whitespace() || matches!(c, b'(' | b'[' | b'>' | b',' | b'='))
}

fn is_backslash_escaped(bytes: &[u8], quote: usize) -> bool {
    bytes[..quote]
        .iter()
        .rev()
        .take_while(|b| **b == b'\\')
        .count()
        % 2
        == 1
}

#[allow(clippy::too_many_lines)]
fn scan(sql: &str, dialect: &Dialect, mut pass: Pass<'_>) -> Result<String> {
    let bytes = sql.as_bytes();
    let delimiter = dialect.identifier_delimiter();
    let tick_left = u8::try_from(delimiter.start).unwrap_or(b'"');
    let tick_right = u8::try_from(delimiter.end).unwrap_or(b'"');
    let supports_e_strings = dialect.supports().escape_string_constants;
    let backslash_strings = dialect.rules().can_backslash_escape();

    let mut output = String::with_capacity(sql.len());
    let mut slice_start = 0;
    let mut positional_index = 0;

    let mut in_identifier = false;
    let mut in_string = false;
    let mut string_backslashes = false;
    let mut dollar_tag: Option<String> = None;
    let mut line_comment = false;
    let mut block_comment = false;

    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        let prev = i.checked_sub(1).map(|p| bytes[p]);

        if in_identifier {
            if c == tick_right {
                in_identifier = false;
            }
        } else if in_string {
            if c == b'\'' && (!string_backslashes || !is_backslash_escaped(bytes, i)) {
                in_string = false;
                string_backslashes = false;
            }
        } else if let Some(tag) = &dollar_tag {
            if c == b'$' {
                if let Some(m) = DOLLAR_QUOTE.captures(&sql[i..]) {
                    let found = m.get(1).map_or("", |g| g.as_str());
                    if found == tag.as_str() {
                        dollar_tag = None;
                        i += m[0].len();
                        continue;
                    }
                }
            }
        } else if line_comment {
            if c == b'\n' {
                line_comment = false;
            }
        } else if block_comment {
            if c == b'*' && bytes.get(i + 1) == Some(&b'/') {
                block_comment = false;
                i += 1;
            }
        } else if c == tick_left {
            in_identifier = true;
        } else if c == b'\'' {
            in_string = true;
            let e_prefixed = matches!(prev, Some(b'E' | b'e'))
                && can_precede_token(i.checked_sub(2).map(|p| bytes[p]));
            string_backslashes = backslash_strings || (supports_e_strings && e_prefixed);
        } else if c == b'-' && sql[i..].starts_with("-- ") {
            line_comment = true;
        } else if c == b'/' && sql[i..].starts_with("/*") {
            block_comment = true;
            i += 1;
        } else if c == b'$' {
            if prev.is_some_and(|p| p.is_ascii_alphanumeric() || p == b'_') {
                i += 1;
                continue;
            }
            if let Some(m) = DOLLAR_QUOTE.captures(&sql[i..]) {
                dollar_tag = Some(m.get(1).map_or("", |g| g.as_str()).to_string());
                i += m[0].len();
                continue;
            }
            if let Pass::Bind(on_bind) = &mut pass {
                if can_precede_token(prev) {
                    let captured = BIND_NAME.captures(&sql[i..]).and_then(|m| m.get(1));
                    if let Some(name) = captured.map(|m| m.as_str()) {
                        if let Some(token) = on_bind(name) {
                            output.push_str(&sql[slice_start..i]);
                            output.push_str(&token);
                            slice_start = i + name.len() + 1;
                            i = slice_start;
                            continue;
                        }
                    }
                }
            }
        } else if let Pass::Replace {
            replacements,
            reject_positional,
        } = &pass
        {
            if c == b':'
                && matches!(replacements, Replacements::Named(_))
                && can_precede_token(prev)
            {
                if let (Replacements::Named(map), Some(name)) = (
                    replacements,
                    REPLACEMENT_NAME.captures(&sql[i..]).and_then(|m| m.get(1)),
                ) {
                    let name = name.as_str();
                    let value = map.get(name).ok_or_else(|| Error::MissingReplacement {
                        name: name.to_string(),
                    })?;
                    output.push_str(&sql[slice_start..i]);
                    output.push_str(&dialect.query_generator().escape_value(value)?);
                    slice_start = i + name.len() + 1;
                    i = slice_start;
                    continue;
                }
            } else if c == b'?'
                && can_precede_token(prev)
                && !matches!(bytes.get(i + 1), Some(b'|' | b'&'))
            {
                if *reject_positional {
                    return Err(Error::PositionalReplacement);
                }
                if let Replacements::Positional(list) = replacements {
                    let value = list.get(positional_index).ok_or_else(|| {
                        Error::invalid(format!(
                            "positional replacement {positional_index} has no entry in the replacement list"
                        ))
                    })?;
                    positional_index += 1;
                    output.push_str(&sql[slice_start..i]);
                    output.push_str(&dialect.query_generator().escape_value(value)?);
                    slice_start = i + 1;
                }
            }
        }

        i += 1;
    }

    if in_string {
        return Err(Error::invalid(format!(
            "the following SQL includes an unterminated string literal: {sql}"
        )));
    }

    output.push_str(&sql[slice_start..]);
    Ok(output)
}

/// Rewrites neutral `$name` tokens into the dialect's placeholders.
///
/// Returns the rewritten SQL and, for ordered styles, the name behind each
/// placeholder position.
///
/// # Errors
///
/// Fails on an unterminated string literal.
pub fn map_bind_parameters(sql: &str, dialect: &Dialect) -> Result<(String, Option<Vec<String>>)> {
    map_known_bind_parameters(sql, dialect, &|_| true)
}

/// Like [`map_bind_parameters`], but only tokens for which `known` holds
/// are rewritten. Others, such as the `$action` pseudo column of a MERGE,
/// are left as written.
///
/// # Errors
///
/// Fails on an unterminated string literal.
pub fn map_known_bind_parameters(
    sql: &str,
    dialect: &Dialect,
    known: &dyn Fn(&str) -> bool,
) -> Result<(String, Option<Vec<String>>)> {
    let style = dialect.bind_style();
    let mut order: Vec<String> = Vec::new();

    let mut on_bind = |name: &str| -> Option<String> {
        if !known(name) {
            return None;
        }
        Some(match style {
            BindStyle::UnspecifiedOrdered { token } => {
                order.push(name.to_string());
                token.to_string()
            }
            BindStyle::SpecifiedOrdered { prefix } => {
                let position = order.iter().position(|n| n == name).unwrap_or_else(|| {
                    order.push(name.to_string());
                    order.len() - 1
                });
                format!("{prefix}{}", position + 1)
            }
            BindStyle::Named { prefix } => format!("{prefix}{name}"),
        })
    };

    let mapped = scan(sql, dialect, Pass::Bind(&mut on_bind))?;
    let order = match style {
        BindStyle::Named { .. } => None,
        _ => Some(order),
    };
    Ok((mapped, order))
}

/// Substitutes `:name` or `?` replacements with escaped values.
///
/// # Errors
///
/// Fails on a missing named replacement, a positional replacement past the
/// end of the list, or an unterminated string literal.
pub fn inject_replacements(
    sql: &str,
    dialect: &Dialect,
    replacements: &Replacements,
) -> Result<String> {
    scan(
        sql,
        dialect,
        Pass::Replace {
            replacements,
            reject_positional: false,
        },
    )
}

/// Like [`inject_replacements`], but a positional `?` is an error.
pub(crate) fn inject_named_replacements(
    sql: &str,
    dialect: &Dialect,
    replacements: &Replacements,
) -> Result<String> {
    scan(
        sql,
        dialect,
        Pass::Replace {
            replacements,
            reject_positional: true,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectKind;

    fn dialect(kind: DialectKind) -> Dialect {
        Dialect::new(kind).unwrap()
    }

    #[test]
    fn test_collect_generates_reserved_names() {
        let mut binder = ValueBinder::collecting();
        assert_eq!(binder.collect(SqlValue::Int(1)), "$sequelize_1");
        assert_eq!(binder.collect(SqlValue::Int(2)), "$sequelize_2");
        let values = binder.into_values();
        assert_eq!(values.get("sequelize_2"), Some(&SqlValue::Int(2)));
    }

    #[test]
    fn test_reserved_names_rejected_before_sql() {
        let mut caller = IndexMap::new();
        caller.insert("sequelize_1".to_string(), SqlValue::Int(1));
        caller.insert("mine".to_string(), SqlValue::Int(2));
        let err = ValueBinder::with_reserved(caller).unwrap_err();
        assert_eq!(
            err,
            Error::ReservedBindName {
                names: vec!["sequelize_1".into()]
            }
        );
    }

    #[test]
    fn test_postgres_numbers_and_reuses_positions() {
        let pg = dialect(DialectKind::Postgres);
        let (sql, order) =
            map_bind_parameters("SELECT $a, $b WHERE x = $a", &pg).unwrap();
        assert_eq!(sql, "SELECT $1, $2 WHERE x = $1");
        assert_eq!(order.unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_mysql_question_marks_repeat_names() {
        let mysql = dialect(DialectKind::Mysql);
        let (sql, order) = map_bind_parameters("SELECT $a, $a", &mysql).unwrap();
        assert_eq!(sql, "SELECT ?, ?");
        assert_eq!(order.unwrap(), vec!["a", "a"]);
    }

    #[test]
    fn test_named_styles_keep_names() {
        let mssql = dialect(DialectKind::Mssql);
        let (sql, order) = map_bind_parameters("SELECT $a", &mssql).unwrap();
        assert_eq!(sql, "SELECT @a");
        assert!(order.is_none());
    }

    #[test]
    fn test_tokens_inside_literals_are_left_alone() {
        let pg = dialect(DialectKind::Postgres);
        let (sql, order) = map_bind_parameters(
            "SELECT '$a', \"$b\", $$ $c $$, $tag$ $d $tag$ -- $e\n, $f /* $g */",
            &pg,
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT '$a', \"$b\", $$ $c $$, $tag$ $d $tag$ -- $e\n, $1 /* $g */"
        );
        assert_eq!(order.unwrap(), vec!["f"]);
    }

    #[test]
    fn test_backslash_escaped_quote_in_mysql_strings() {
        let mysql = dialect(DialectKind::Mysql);
        let (sql, _) = map_bind_parameters(r"SELECT 'it\'s $a', $b", &mysql).unwrap();
        assert_eq!(sql, r"SELECT 'it\'s $a', ?");
    }

    #[test]
    fn test_postgres_e_strings_honour_backslashes() {
        let pg = dialect(DialectKind::Postgres);
        let (sql, _) = map_bind_parameters(r"SELECT E'\' $a', $b", &pg).unwrap();
        assert_eq!(sql, r"SELECT E'\' $a', $1");
    }

    #[test]
    fn test_unterminated_string_is_rejected() {
        let pg = dialect(DialectKind::Postgres);
        assert!(matches!(
            map_bind_parameters("SELECT 'oops", &pg),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_operator_like_dollars_are_not_binds() {
        let pg = dialect(DialectKind::Postgres);
        let (sql, _) = map_bind_parameters("SELECT a$b, x::$c", &pg).unwrap();
        assert_eq!(sql, "SELECT a$b, x::$c");
    }

    #[test]
    fn test_unknown_tokens_are_left_alone() {
        let mssql = dialect(DialectKind::Mssql);
        let (sql, order) = map_known_bind_parameters(
            "MERGE ... OUTPUT $action, INSERTED.* WHERE a = $sequelize_1;",
            &mssql,
            &|name| name.starts_with(RESERVED_PREFIX),
        )
        .unwrap();
        assert_eq!(sql, "MERGE ... OUTPUT $action, INSERTED.* WHERE a = @sequelize_1;");
        assert!(order.is_none());
    }

    #[test]
    fn test_named_replacements() {
        let sqlite = dialect(DialectKind::Sqlite);
        let mut map = IndexMap::new();
        map.insert("name".to_string(), SqlValue::Text("O'Brien".into()));
        let sql = inject_replacements(
            "SELECT * FROM t WHERE a = :name AND b = ':name'",
            &sqlite,
            &Replacements::Named(map),
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a = 'O''Brien' AND b = ':name'");
    }

    #[test]
    fn test_missing_named_replacement() {
        let sqlite = dialect(DialectKind::Sqlite);
        let err = inject_replacements(
            "SELECT :missing",
            &sqlite,
            &Replacements::Named(IndexMap::new()),
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::MissingReplacement {
                name: "missing".into()
            }
        );
    }

    #[test]
    fn test_positional_replacements_and_json_operators() {
        let pg = dialect(DialectKind::Postgres);
        let sql = inject_replacements(
            "SELECT ? WHERE doc ?| keys",
            &pg,
            &Replacements::Positional(vec![SqlValue::Int(3)]),
        )
        .unwrap();
        assert_eq!(sql, "SELECT 3 WHERE doc ?| keys");
    }

    #[test]
    fn test_positional_rejected_in_literals() {
        let pg = dialect(DialectKind::Postgres);
        let err = inject_named_replacements(
            "SELECT ?",
            &pg,
            &Replacements::Named(IndexMap::new()),
        )
        .unwrap_err();
        assert_eq!(err, Error::PositionalReplacement);
    }

    #[test]
    fn test_positional_follows_order() {
        let mut values = IndexMap::new();
        values.insert("a".to_string(), SqlValue::Int(1));
        values.insert("b".to_string(), SqlValue::Int(2));
        let bind = Bind {
            values,
            order: Some(vec!["b".into(), "a".into(), "b".into()]),
        };
        assert_eq!(
            bind.positional(),
            vec![SqlValue::Int(2), SqlValue::Int(1), SqlValue::Int(2)]
        );
    }
}
