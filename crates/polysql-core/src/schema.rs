//! Statement descriptors.
//!
//! Tables are named by a [`TableRef`], resolved once into a [`TableName`].
//! Model-aware statements additionally take a [`ModelSchema`]: the ordered
//! attributes of a table with their column names, types and keys.

use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::DataType;
use crate::value::{SqlValue, ToSqlValue};

/// A table name with its optional schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableName {
    #[serde(alias = "tableName")]
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
    /// Joins schema and table on engines without schemas. Defaults to `.`.
    #[serde(default)]
    pub delimiter: Option<String>,
}

impl TableName {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            schema: None,
            delimiter: None,
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }
}

impl From<&str> for TableName {
    fn from(table: &str) -> Self {
        Self::new(table)
    }
}

/// Anything that names a table.
#[derive(Debug, Clone)]
pub enum TableRef {
    Name(String),
    Qualified(TableName),
    Model(Arc<ModelSchema>),
}

impl TableRef {
    /// Resolves the reference to a plain table name.
    #[must_use]
    pub fn table_name(&self) -> TableName {
        match self {
            Self::Name(name) => TableName::new(name.clone()),
            Self::Qualified(name) => name.clone(),
            Self::Model(model) => model.table.clone(),
        }
    }

    /// The model behind the reference, if there is one.
    #[must_use]
    pub fn model(&self) -> Option<&ModelSchema> {
        match self {
            Self::Model(model) => Some(model),
            _ => None,
        }
    }
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<TableName> for TableRef {
    fn from(name: TableName) -> Self {
        Self::Qualified(name)
    }
}

impl From<Arc<ModelSchema>> for TableRef {
    fn from(model: Arc<ModelSchema>) -> Self {
        Self::Model(model)
    }
}

/// Foreign key referential action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    /// Returns the SQL representation of the action.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// When a deferrable constraint is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Deferrable {
    InitiallyDeferred,
    InitiallyImmediate,
    NotDeferrable,
}

impl Deferrable {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::InitiallyDeferred => "DEFERRABLE INITIALLY DEFERRED",
            Self::InitiallyImmediate => "DEFERRABLE INITIALLY IMMEDIATE",
            Self::NotDeferrable => "NOT DEFERRABLE",
        }
    }
}

/// A reference to a column of another table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct References {
    pub table: TableName,
    pub key: String,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
    pub deferrable: Option<Deferrable>,
}

impl References {
    pub fn new(table: impl Into<TableName>, key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
            on_delete: None,
            on_update: None,
            deferrable: None,
        }
    }

    #[must_use]
    pub const fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    #[must_use]
    pub const fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }

    #[must_use]
    pub const fn deferrable(mut self, deferrable: Deferrable) -> Self {
        self.deferrable = Some(deferrable);
        self
    }
}

/// Default value of a column.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// Escaped through the column's data type.
    Value(SqlValue),
    /// Raw SQL expression (e.g., `CURRENT_TIMESTAMP`).
    Expression(String),
}

/// Unique membership of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unique {
    /// A single-column unique key.
    Single,
    /// Member of the named composite key.
    Group(String),
}

/// One attribute of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDef {
    /// Attribute name, as used in value maps and filters.
    pub name: String,
    /// Column name.
    pub field: String,
    pub data_type: DataType,
    pub allow_null: bool,
    pub default: Option<DefaultValue>,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: Option<Unique>,
    pub references: Option<References>,
    pub comment: Option<String>,
}

impl AttributeDef {
    /// Creates a nullable attribute whose column has the same name.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        Self {
            field: name.clone(),
            name,
            data_type,
            allow_null: true,
            default: None,
            primary_key: false,
            auto_increment: false,
            unique: None,
            references: None,
            comment: None,
        }
    }

    /// Stores the attribute in a column with another name.
    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.allow_null = false;
        self
    }

    #[must_use]
    pub fn default_value<V: ToSqlValue>(mut self, value: V) -> Self {
        self.default = Some(DefaultValue::Value(value.to_sql_value()));
        self
    }

    #[must_use]
    pub fn default_expr(mut self, sql: impl Into<String>) -> Self {
        self.default = Some(DefaultValue::Expression(sql.into()));
        self
    }

    /// Marks the attribute as (part of) the primary key. Implies NOT NULL.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.allow_null = false;
        self
    }

    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = Some(Unique::Single);
        self
    }

    /// Adds the attribute to a named composite unique key.
    #[must_use]
    pub fn unique_group(mut self, name: impl Into<String>) -> Self {
        self.unique = Some(Unique::Group(name.into()));
        self
    }

    #[must_use]
    pub fn references(mut self, references: References) -> Self {
        self.references = Some(references);
        self
    }

    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

impl From<SqlValue> for DefaultValue {
    fn from(value: SqlValue) -> Self {
        Self::Value(value)
    }
}

/// An index declared on a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: Option<String>,
    /// Column names, in index order.
    pub fields: Vec<String>,
    pub unique: bool,
}

impl IndexDef {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            fields: fields.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A set of columns whose values are unique together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueKey {
    pub name: String,
    pub fields: Vec<String>,
}

/// Default name of an index over `fields` of `table`.
///
/// `Users` and `[email]` give `users_email`, plus `_unique` for unique
/// indexes.
#[must_use]
pub fn index_name(table: &str, fields: &[String], unique: bool) -> String {
    use heck::ToSnakeCase;

    let mut name = format!("{table}_{}", fields.join("_")).to_snake_case();
    if unique {
        name.push_str("_unique");
    }
    name
}

/// The shape of one table as the model layer sees it.
#[derive(Debug, Clone)]
pub struct ModelSchema {
    pub table: TableName,
    attributes: IndexMap<String, AttributeDef>,
    indexes: Vec<IndexDef>,
    unique_keys: OnceLock<Vec<UniqueKey>>,
}

impl ModelSchema {
    pub fn new(table: impl Into<TableName>) -> Self {
        Self {
            table: table.into(),
            attributes: IndexMap::new(),
            indexes: Vec::new(),
            unique_keys: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.insert(attribute.name.clone(), attribute);
        self.unique_keys = OnceLock::new();
        self
    }

    #[must_use]
    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self.unique_keys = OnceLock::new();
        self
    }

    /// Attributes in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = &AttributeDef> {
        self.attributes.values()
    }

    #[must_use]
    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    /// Looks an attribute up by attribute name, then by column name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes
            .get(name)
            .or_else(|| self.attributes.values().find(|a| a.field == name))
    }

    /// Column name for an attribute name. Unknown names are returned as is.
    #[must_use]
    pub fn column_for<'a>(&'a self, name: &'a str) -> &'a str {
        self.get(name).map_or(name, |a| a.field.as_str())
    }

    /// Primary key attributes, in declaration order.
    #[must_use]
    pub fn primary_keys(&self) -> Vec<&AttributeDef> {
        self.attributes().filter(|a| a.primary_key).collect()
    }

    #[must_use]
    pub fn auto_increment_attribute(&self) -> Option<&AttributeDef> {
        self.attributes().find(|a| a.auto_increment)
    }

    /// Unique keys from attribute flags and unique indexes, computed once.
    ///
    /// Attribute keys come first, in attribute order, then unique indexes in
    /// declaration order. Fields are column names.
    pub fn unique_keys(&self) -> &[UniqueKey] {
        self.unique_keys.get_or_init(|| {
            let mut keys: IndexMap<String, Vec<String>> = IndexMap::new();
            for attribute in self.attributes() {
                let name = match &attribute.unique {
                    None => continue,
                    Some(Unique::Single) => {
                        index_name(&self.table.table, std::slice::from_ref(&attribute.field), true)
                    }
                    Some(Unique::Group(group)) => group.clone(),
                };
                keys.entry(name).or_default().push(attribute.field.clone());
            }
            for index in self.indexes.iter().filter(|i| i.unique) {
                let name = index
                    .name
                    .clone()
                    .unwrap_or_else(|| index_name(&self.table.table, &index.fields, true));
                keys.entry(name).or_insert_with(|| index.fields.clone());
            }
            keys.into_iter()
                .map(|(name, fields)| UniqueKey { name, fields })
                .collect()
        })
    }
}
