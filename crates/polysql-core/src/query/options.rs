//! Option bags of the generator routines.
//!
//! Every bag that has a supportable set implements
//! [`OptionBag`](crate::dialect::options::OptionBag), so the routine can
//! validate it against the dialect before producing SQL.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::bind::Replacements;
use crate::dialect::options::{present, OptionBag};
use crate::expr::Expr;
use crate::filter::Where;
use crate::schema::{Deferrable, References, UniqueKey};
use crate::value::SqlValue;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DropTableOptions {
    pub cascade: bool,
}

impl OptionBag for DropTableOptions {
    fn present_options(&self) -> Vec<String> {
        present(&[("cascade", self.cascade)])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TruncateOptions {
    pub cascade: bool,
    pub restart_identity: bool,
}

impl OptionBag for TruncateOptions {
    fn present_options(&self) -> Vec<String> {
        present(&[
            ("cascade", self.cascade),
            ("restartIdentity", self.restart_identity),
        ])
    }
}

/// Options of DROP statements that take `IF EXISTS` and `CASCADE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoveOptions {
    pub if_exists: bool,
    pub cascade: bool,
}

impl OptionBag for RemoveOptions {
    fn present_options(&self) -> Vec<String> {
        present(&[("ifExists", self.if_exists), ("cascade", self.cascade)])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenameTableOptions {
    /// Allow the new name to live in another schema.
    pub change_schema: bool,
}

impl OptionBag for RenameTableOptions {
    fn present_options(&self) -> Vec<String> {
        present(&[("changeSchema", self.change_schema)])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AddColumnOptions {
    pub if_not_exists: bool,
}

impl OptionBag for AddColumnOptions {
    fn present_options(&self) -> Vec<String> {
        present(&[("ifNotExists", self.if_not_exists)])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoveIndexOptions {
    /// Drop without locking the table.
    pub concurrently: bool,
    pub if_exists: bool,
    pub cascade: bool,
}

impl OptionBag for RemoveIndexOptions {
    fn present_options(&self) -> Vec<String> {
        present(&[
            ("concurrently", self.concurrently),
            ("ifExists", self.if_exists),
            ("cascade", self.cascade),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddIndexOptions {
    /// Defaults to the snake_cased table and field names.
    pub name: Option<String>,
    /// Replaces the table name in the default index name.
    pub prefix: Option<String>,
    pub unique: bool,
    pub concurrently: bool,
    pub if_not_exists: bool,
    /// Non-key columns stored in the index.
    pub include: Vec<String>,
    pub operator: Option<String>,
    pub parser: Option<String>,
    /// Index kind keyword, such as `FULLTEXT`.
    pub index_type: Option<String>,
    pub using: Option<String>,
    /// Partial index predicate.
    pub where_clause: Option<Where>,
}

impl OptionBag for AddIndexOptions {
    fn present_options(&self) -> Vec<String> {
        present(&[
            ("concurrently", self.concurrently),
            ("ifNotExists", self.if_not_exists),
            ("include", !self.include.is_empty()),
            ("operator", self.operator.is_some()),
            ("parser", self.parser.is_some()),
            ("type", self.index_type.is_some()),
            ("using", self.using.is_some()),
            ("where", self.where_clause.as_ref().is_some_and(|w| !w.is_empty())),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateSchemaOptions {
    pub authorization: Option<String>,
    pub charset: Option<String>,
    pub collate: Option<String>,
    pub comment: Option<String>,
    pub if_not_exists: bool,
    pub replace: bool,
}

impl OptionBag for CreateSchemaOptions {
    fn present_options(&self) -> Vec<String> {
        present(&[
            ("authorization", self.authorization.is_some()),
            ("charset", self.charset.is_some()),
            ("collate", self.collate.is_some()),
            ("comment", self.comment.is_some()),
            ("ifNotExists", self.if_not_exists),
            ("replace", self.replace),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateTableOptions {
    pub collate: Option<String>,
    pub charset: Option<String>,
    pub engine: Option<String>,
    pub row_format: Option<String>,
    pub comment: Option<String>,
    pub initial_auto_increment: Option<u64>,
    /// Extra unique keys on top of the attribute flags.
    pub unique_keys: Vec<UniqueKey>,
}

impl OptionBag for CreateTableOptions {
    fn present_options(&self) -> Vec<String> {
        present(&[
            ("collate", self.collate.is_some()),
            ("charset", self.charset.is_some()),
            ("engine", self.engine.is_some()),
            ("rowFormat", self.row_format.is_some()),
            ("comment", self.comment.is_some()),
            ("initialAutoIncrement", self.initial_auto_increment.is_some()),
            ("uniqueKeys", !self.unique_keys.is_empty()),
        ])
    }
}

/// Kind of a table constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintType {
    #[serde(rename = "CHECK")]
    Check,
    #[serde(rename = "DEFAULT")]
    Default,
    #[serde(rename = "FOREIGN KEY")]
    ForeignKey,
    #[serde(rename = "PRIMARY KEY")]
    PrimaryKey,
    #[serde(rename = "UNIQUE")]
    Unique,
}

impl ConstraintType {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Check => "CHECK",
            Self::Default => "DEFAULT",
            Self::ForeignKey => "FOREIGN KEY",
            Self::PrimaryKey => "PRIMARY KEY",
            Self::Unique => "UNIQUE",
        }
    }

    /// Parses the type names catalogs report. Unknown names give `None`.
    #[must_use]
    pub fn from_catalog(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().replace('_', " ").as_str() {
            "CHECK" | "CHECK CONSTRAINT" | "C" | "K" => Some(Self::Check),
            "DEFAULT" | "DEFAULT CONSTRAINT" | "D" => Some(Self::Default),
            "FOREIGN KEY" | "FOREIGN KEY CONSTRAINT" | "F" => Some(Self::ForeignKey),
            "PRIMARY KEY" | "PRIMARY KEY CONSTRAINT" | "P" => Some(Self::PrimaryKey),
            "UNIQUE" | "UNIQUE CONSTRAINT" | "U" => Some(Self::Unique),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShowConstraintsOptions {
    pub column_name: Option<String>,
    pub constraint_name: Option<String>,
    pub constraint_type: Option<ConstraintType>,
}

impl OptionBag for ShowConstraintsOptions {
    fn present_options(&self) -> Vec<String> {
        present(&[
            ("columnName", self.column_name.is_some()),
            ("constraintName", self.constraint_name.is_some()),
            ("constraintType", self.constraint_type.is_some()),
        ])
    }
}

/// What a new constraint enforces.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintKind {
    Check(Where),
    Unique,
    /// Column default, for engines that model defaults as constraints.
    Default(SqlValue),
    PrimaryKey,
    ForeignKey(References),
}

impl ConstraintKind {
    #[must_use]
    pub const fn constraint_type(&self) -> ConstraintType {
        match self {
            Self::Check(_) => ConstraintType::Check,
            Self::Unique => ConstraintType::Unique,
            Self::Default(_) => ConstraintType::Default,
            Self::PrimaryKey => ConstraintType::PrimaryKey,
            Self::ForeignKey(_) => ConstraintType::ForeignKey,
        }
    }
}

/// A constraint to add to an existing table.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSpec {
    pub name: Option<String>,
    /// Constrained columns.
    pub fields: Vec<String>,
    pub kind: ConstraintKind,
    pub deferrable: Option<Deferrable>,
}

impl ConstraintSpec {
    pub fn new<I, S>(kind: ConstraintKind, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            fields: fields.into_iter().map(Into::into).collect(),
            kind,
            deferrable: None,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub const fn deferrable(mut self, deferrable: Deferrable) -> Self {
        self.deferrable = Some(deferrable);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// SQLite lock acquisition mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Deferred,
    Immediate,
    Exclusive,
}

impl TransactionType {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Deferred => "DEFERRED",
            Self::Immediate => "IMMEDIATE",
            Self::Exclusive => "EXCLUSIVE",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StartTransactionOptions {
    pub read_only: bool,
    pub transaction_type: Option<TransactionType>,
}

impl OptionBag for StartTransactionOptions {
    fn present_options(&self) -> Vec<String> {
        present(&[
            ("readOnly", self.read_only),
            ("transactionType", self.transaction_type.is_some()),
        ])
    }
}

/// Rows reported back by INSERT, UPDATE and upsert statements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Returning {
    #[default]
    Nothing,
    All,
    Columns(Vec<String>),
}

impl Returning {
    #[must_use]
    pub const fn is_requested(&self) -> bool {
        !matches!(self, Self::Nothing)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(attribute: impl Into<String>) -> Self {
        Self {
            expr: Expr::attribute(attribute),
            direction: Direction::Asc,
        }
    }

    pub fn desc(attribute: impl Into<String>) -> Self {
        Self {
            expr: Expr::attribute(attribute),
            direction: Direction::Desc,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectOptions {
    /// Selected expressions. Empty means `*`.
    pub attributes: Vec<Expr>,
    pub where_clause: Option<Where>,
    pub order: Vec<OrderBy>,
    pub group_by: Vec<Expr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Table alias used to qualify attributes.
    pub alias: Option<String>,
    /// Named values substituted into literal fragments.
    pub replacements: Option<Replacements>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOptions {
    pub ignore_duplicates: bool,
    pub returning: Returning,
    /// Escape values into the SQL instead of binding them.
    pub inline_values: bool,
    /// Caller bind values, referenced as `$name` from literals.
    pub bind: IndexMap<String, SqlValue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkInsertOptions {
    pub ignore_duplicates: bool,
    /// Columns to overwrite when a row conflicts.
    pub update_on_duplicate: Vec<String>,
    /// Conflict target for `update_on_duplicate`. Chosen from the model when
    /// empty.
    pub upsert_keys: Vec<String>,
    pub conflict_where: Option<Where>,
    pub returning: Returning,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertOptions {
    /// Explicit conflict target.
    pub conflict_fields: Vec<String>,
    pub conflict_where: Option<Where>,
    pub returning: Returning,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    pub limit: Option<u64>,
    pub returning: Returning,
    pub inline_values: bool,
    /// Caller bind values, referenced as `$name` from literals.
    pub bind: IndexMap<String, SqlValue>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub limit: Option<u64>,
}

/// Options of `increment_query` and `decrement_query`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArithmeticOptions {
    pub returning: Returning,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListTablesOptions {
    /// Only list tables of this schema.
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListSchemasOptions {
    /// Schemas left out on top of the engine's own.
    pub skip: Vec<String>,
}

impl OptionBag for InsertOptions {
    fn present_options(&self) -> Vec<String> {
        present(&[
            ("ignoreDuplicates", self.ignore_duplicates),
            ("returning", self.returning.is_requested()),
        ])
    }
}

impl OptionBag for BulkInsertOptions {
    fn present_options(&self) -> Vec<String> {
        present(&[
            ("ignoreDuplicates", self.ignore_duplicates),
            ("updateOnDuplicate", !self.update_on_duplicate.is_empty()),
            (
                "conflictWhere",
                self.conflict_where.as_ref().is_some_and(|w| !w.is_empty()),
            ),
            ("returning", self.returning.is_requested()),
        ])
    }
}

impl OptionBag for UpsertOptions {
    fn present_options(&self) -> Vec<String> {
        present(&[
            ("conflictFields", !self.conflict_fields.is_empty()),
            (
                "conflictWhere",
                self.conflict_where.as_ref().is_some_and(|w| !w.is_empty()),
            ),
            ("returning", self.returning.is_requested()),
        ])
    }
}

impl OptionBag for ArithmeticOptions {
    fn present_options(&self) -> Vec<String> {
        present(&[("returning", self.returning.is_requested())])
    }
}

impl OptionBag for ListTablesOptions {
    fn present_options(&self) -> Vec<String> {
        present(&[("schema", self.schema.is_some())])
    }
}

impl OptionBag for UpdateOptions {
    fn present_options(&self) -> Vec<String> {
        present(&[
            ("limit", self.limit.is_some()),
            ("returning", self.returning.is_requested()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_options_only_reports_set_flags() {
        let options = RemoveIndexOptions {
            if_exists: true,
            ..RemoveIndexOptions::default()
        };
        assert_eq!(options.present_options(), vec!["ifExists"]);

        let index = AddIndexOptions {
            using: Some("GIN".into()),
            include: vec!["name".into()],
            ..AddIndexOptions::default()
        };
        assert_eq!(index.present_options(), vec!["include", "using"]);
    }

    #[test]
    fn test_constraint_type_from_catalog() {
        assert_eq!(
            ConstraintType::from_catalog("FOREIGN_KEY_CONSTRAINT"),
            Some(ConstraintType::ForeignKey)
        );
        assert_eq!(ConstraintType::from_catalog("p"), Some(ConstraintType::PrimaryKey));
        assert_eq!(ConstraintType::from_catalog("EXCLUDE"), None);
    }

    #[test]
    fn test_options_deserialize_camel_case() {
        let options: TruncateOptions =
            serde_json::from_str(r#"{"restartIdentity": true}"#).unwrap();
        assert!(options.restart_identity);
        assert!(!options.cascade);
    }
}
