//! JSON statement descriptors.
//!
//! A descriptor names one statement kind, the table it targets, and the
//! values, filter and options the generator routine takes:
//!
//! ```json
//! {
//!   "statement": "upsert",
//!   "table": "users",
//!   "model": {
//!     "attributes": [
//!       { "name": "id", "type": "INTEGER", "primaryKey": true, "autoIncrement": true },
//!       { "name": "email", "type": "STRING" }
//!     ],
//!     "indexes": [{ "fields": ["email"], "unique": true }]
//!   },
//!   "values": { "email": "a@b.c", "name": "Ann" }
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use polysql_core::query::{
    AddIndexOptions, BulkInsertOptions, DeleteOptions, DropTableOptions, InsertOptions, OrderBy,
    RemoveIndexOptions, Returning, SelectOptions, TruncateOptions, UpdateOptions, UpsertOptions,
};
use polysql_core::schema::{AttributeDef, IndexDef, ModelSchema, TableName, TableRef};
use polysql_core::{DataType, Dialect, Expr, Query, SqlValue, Where};

use crate::error::{CliError, Result};

/// Statement kinds a descriptor can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Statement {
    Select,
    Insert,
    BulkInsert,
    Upsert,
    Update,
    Delete,
    DropTable,
    Truncate,
    AddIndex,
    RemoveIndex,
}

/// A bare table name or a `{ "tableName", "schema" }` object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TableSpec {
    Name(String),
    Qualified(TableName),
}

impl TableSpec {
    fn table_name(&self) -> TableName {
        match self {
            Self::Name(name) => TableName::new(name.clone()),
            Self::Qualified(name) => name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeSpec {
    pub name: String,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(flatten)]
    pub data_type: DataType,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub allow_null: Option<bool>,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexSpec {
    pub fields: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unique: bool,
}

/// Attributes and indexes the generator reads primary and unique keys from.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelSpec {
    pub attributes: Vec<AttributeSpec>,
    pub indexes: Vec<IndexSpec>,
}

impl ModelSpec {
    fn into_model(self, table: TableName) -> ModelSchema {
        let mut model = ModelSchema::new(table);
        for spec in self.attributes {
            let mut attribute = AttributeDef::new(spec.name, spec.data_type);
            if let Some(field) = spec.field {
                attribute = attribute.field(field);
            }
            if spec.primary_key {
                attribute = attribute.primary_key();
            }
            if spec.auto_increment {
                attribute = attribute.auto_increment();
            }
            if spec.allow_null == Some(false) {
                attribute = attribute.not_null();
            }
            if spec.unique {
                attribute = attribute.unique();
            }
            model = model.attribute(attribute);
        }
        for spec in self.indexes {
            let mut index = IndexDef::new(spec.fields);
            if spec.unique {
                index = index.unique();
            }
            if let Some(name) = spec.name {
                index = index.name(name);
            }
            model = model.index(index);
        }
        model
    }
}

/// One statement to generate.
#[derive(Debug, Clone, Deserialize)]
pub struct Descriptor {
    pub statement: Statement,
    pub table: TableSpec,
    #[serde(default)]
    pub model: Option<ModelSpec>,
    #[serde(default)]
    pub values: Option<Value>,
    #[serde(default, rename = "where")]
    pub filter: Option<Value>,
    #[serde(default)]
    pub options: Map<String, Value>,
}

/// `true` for every column, or a list of columns.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ReturningSpec {
    All(bool),
    Columns(Vec<String>),
}

fn returning(spec: Option<ReturningSpec>) -> Returning {
    match spec {
        None | Some(ReturningSpec::All(false)) => Returning::Nothing,
        Some(ReturningSpec::All(true)) => Returning::All,
        Some(ReturningSpec::Columns(columns)) => Returning::Columns(columns),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SelectSpec {
    attributes: Vec<String>,
    /// `[attribute, "ASC" | "DESC"]` pairs.
    order: Vec<(String, String)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct InsertSpec {
    ignore_duplicates: bool,
    returning: Option<ReturningSpec>,
    inline_values: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BulkInsertSpec {
    ignore_duplicates: bool,
    update_on_duplicate: Vec<String>,
    upsert_keys: Vec<String>,
    returning: Option<ReturningSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct UpsertSpec {
    /// Values written on conflict. Defaults to the inserted values.
    update_values: Option<Map<String, Value>>,
    conflict_fields: Vec<String>,
    returning: Option<ReturningSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct UpdateSpec {
    limit: Option<u64>,
    returning: Option<ReturningSpec>,
    inline_values: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AddIndexSpec {
    fields: Vec<String>,
    name: Option<String>,
    prefix: Option<String>,
    unique: bool,
    concurrently: bool,
    if_not_exists: bool,
    include: Vec<String>,
    operator: Option<String>,
    parser: Option<String>,
    #[serde(rename = "type")]
    index_type: Option<String>,
    using: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveIndexSpec {
    index: String,
    #[serde(flatten)]
    options: RemoveIndexOptions,
}

impl Descriptor {
    /// Reads and parses a descriptor file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not a descriptor.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| CliError::json(path.display().to_string(), e))
    }

    fn table_ref(&self) -> TableRef {
        let name = self.table.table_name();
        match &self.model {
            Some(model) => TableRef::Model(Arc::new(model.clone().into_model(name))),
            None => TableRef::Qualified(name),
        }
    }

    fn options<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.options.clone()))
            .map_err(|e| CliError::json(format!("{:?} options", self.statement), e))
    }

    fn filter(&self) -> Result<Where> {
        Ok(self
            .filter
            .as_ref()
            .map(Where::from_json)
            .transpose()?
            .unwrap_or_default())
    }

    fn row(&self) -> Result<IndexMap<String, SqlValue>> {
        match &self.values {
            Some(Value::Object(map)) => Ok(value_map(map)),
            Some(_) => Err(CliError::Descriptor(String::from("values must be an object"))),
            None => Err(CliError::Descriptor(String::from("values are required"))),
        }
    }

    fn rows(&self) -> Result<Vec<IndexMap<String, SqlValue>>> {
        let Some(Value::Array(items)) = &self.values else {
            return Err(CliError::Descriptor(String::from(
                "bulkInsert values must be an array of objects",
            )));
        };
        items
            .iter()
            .map(|item| match item {
                Value::Object(map) => Ok(value_map(map)),
                _ => Err(CliError::Descriptor(String::from(
                    "bulkInsert values must be an array of objects",
                ))),
            })
            .collect()
    }

    /// Runs the generator routine the descriptor names.
    ///
    /// # Errors
    ///
    /// Fails on malformed descriptor parts and on anything the generator
    /// rejects.
    pub fn generate(&self, dialect: &Dialect) -> Result<Query> {
        let generator = dialect.query_generator();
        let table = self.table_ref();
        debug!(statement = ?self.statement, table = %self.table.table_name().table, "generating");

        let query = match self.statement {
            Statement::Select => {
                let spec: SelectSpec = self.options()?;
                let order = spec
                    .order
                    .into_iter()
                    .map(|(attribute, direction)| {
                        if direction.eq_ignore_ascii_case("desc") {
                            OrderBy::desc(attribute)
                        } else {
                            OrderBy::asc(attribute)
                        }
                    })
                    .collect();
                let filter = self.filter()?;
                generator.select_query(
                    &table,
                    &SelectOptions {
                        attributes: spec.attributes.into_iter().map(Expr::attribute).collect(),
                        where_clause: (!filter.is_empty()).then_some(filter),
                        order,
                        limit: spec.limit,
                        offset: spec.offset,
                        ..SelectOptions::default()
                    },
                )?
            }
            Statement::Insert => {
                let spec: InsertSpec = self.options()?;
                generator.insert_query(
                    &table,
                    &self.row()?,
                    &InsertOptions {
                        ignore_duplicates: spec.ignore_duplicates,
                        returning: returning(spec.returning),
                        inline_values: spec.inline_values,
                        ..InsertOptions::default()
                    },
                )?
            }
            Statement::BulkInsert => {
                let spec: BulkInsertSpec = self.options()?;
                let conflict_where = self.filter()?;
                generator.bulk_insert_query(
                    &table,
                    &self.rows()?,
                    &BulkInsertOptions {
                        ignore_duplicates: spec.ignore_duplicates,
                        update_on_duplicate: spec.update_on_duplicate,
                        upsert_keys: spec.upsert_keys,
                        conflict_where: (!conflict_where.is_empty()).then_some(conflict_where),
                        returning: returning(spec.returning),
                    },
                )?
            }
            Statement::Upsert => {
                let spec: UpsertSpec = self.options()?;
                let insert = self.row()?;
                let update = spec.update_values.as_ref().map_or_else(|| insert.clone(), value_map);
                let conflict_where = self.filter()?;
                generator.upsert_query(
                    &table,
                    &insert,
                    &update,
                    &UpsertOptions {
                        conflict_fields: spec.conflict_fields,
                        conflict_where: (!conflict_where.is_empty()).then_some(conflict_where),
                        returning: returning(spec.returning),
                    },
                )?
            }
            Statement::Update => {
                let spec: UpdateSpec = self.options()?;
                generator.update_query(
                    &table,
                    &self.row()?,
                    &self.filter()?,
                    &UpdateOptions {
                        limit: spec.limit,
                        returning: returning(spec.returning),
                        inline_values: spec.inline_values,
                        ..UpdateOptions::default()
                    },
                )?
            }
            Statement::Delete => {
                #[derive(Deserialize, Default)]
                #[serde(default)]
                struct DeleteSpec {
                    limit: Option<u64>,
                }
                let spec: DeleteSpec = self.options()?;
                generator.delete_query(
                    &table,
                    &self.filter()?,
                    &DeleteOptions { limit: spec.limit },
                )?
            }
            Statement::DropTable => {
                let options: DropTableOptions = self.options()?;
                generator.drop_table_query(&table, &options)?
            }
            Statement::Truncate => {
                let options: TruncateOptions = self.options()?;
                generator.truncate_table_query(&table, &options)?
            }
            Statement::AddIndex => {
                let spec: AddIndexSpec = self.options()?;
                let predicate = self.filter()?;
                generator.add_index_query(
                    &table,
                    &spec.fields,
                    &AddIndexOptions {
                        name: spec.name,
                        prefix: spec.prefix,
                        unique: spec.unique,
                        concurrently: spec.concurrently,
                        if_not_exists: spec.if_not_exists,
                        include: spec.include,
                        operator: spec.operator,
                        parser: spec.parser,
                        index_type: spec.index_type,
                        using: spec.using,
                        where_clause: (!predicate.is_empty()).then_some(predicate),
                    },
                )?
            }
            Statement::RemoveIndex => {
                let spec: RemoveIndexSpec = self.options()?;
                generator.remove_index_query(&table, &spec.index, &spec.options)?
            }
        };
        Ok(query)
    }
}

fn value_map(map: &Map<String, Value>) -> IndexMap<String, SqlValue> {
    map.iter()
        .map(|(name, value)| (name.clone(), SqlValue::from_json(value)))
        .collect()
}

/// Parses a `--type` argument: a bare type name such as `integer`, or a
/// tagged object such as `{"type": "STRING", "length": 20}`.
///
/// # Errors
///
/// Fails when the argument names no known type.
pub fn parse_data_type(spec: &str) -> Result<DataType> {
    let value = if spec.trim_start().starts_with('{') {
        serde_json::from_str(spec).map_err(|e| CliError::json("--type", e))?
    } else {
        serde_json::json!({ "type": spec.to_uppercase() })
    };
    serde_json::from_value(value).map_err(|e| CliError::json("--type", e))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use polysql_core::DialectKind;

    use super::*;

    fn write_descriptor(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    fn generate(kind: DialectKind, json: &str) -> Result<Query> {
        let file = write_descriptor(json);
        let descriptor = Descriptor::load(file.path())?;
        descriptor.generate(&Dialect::new(kind)?)
    }

    #[test]
    fn test_load_select_descriptor() {
        let query = generate(
            DialectKind::Postgres,
            r#"{"statement": "select", "table": "users", "where": {"age": {"gt": 5}}, "options": {"limit": 10}}"#,
        )
        .unwrap();
        assert_eq!(query.sql, "SELECT * FROM \"users\" WHERE \"age\" > 5 LIMIT 10;");
    }

    #[test]
    fn test_upsert_descriptor_uses_model_keys() {
        let query = generate(
            DialectKind::Postgres,
            r#"{
                "statement": "upsert",
                "table": "users",
                "model": {
                    "attributes": [
                        {"name": "id", "type": "INTEGER", "primaryKey": true, "autoIncrement": true},
                        {"name": "email", "type": "STRING"},
                        {"name": "name", "type": "STRING"}
                    ],
                    "indexes": [{"fields": ["email"], "unique": true}]
                },
                "values": {"email": "a@b.c", "name": "Ann"}
            }"#,
        )
        .unwrap();
        assert!(query.sql.contains("ON CONFLICT (\"email\")"), "{}", query.sql);
        assert_eq!(query.bind.unwrap().values.len(), 2);
    }

    #[test]
    fn test_remove_index_options_are_gated() {
        let json = r#"{
            "statement": "removeIndex",
            "table": "users",
            "options": {"index": "users_email", "cascade": true}
        }"#;
        let err = generate(DialectKind::Sqlite, json).unwrap_err();
        assert!(err.to_string().contains("cascade"), "{err}");
    }

    #[test]
    fn test_ambiguous_filter_is_reported() {
        let json =
            r#"{"statement": "delete", "table": "users", "where": {"age": {"notAnOperator": 5}}}"#;
        let err = generate(DialectKind::Postgres, json).unwrap_err();
        assert!(matches!(
            err,
            CliError::Generate(polysql_core::Error::AmbiguousWhere { .. })
        ));
    }

    #[test]
    fn test_missing_file_and_bad_json() {
        let err = Descriptor::load(Path::new("/nonexistent/descriptor.json")).unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));

        let file = write_descriptor("{not json");
        assert!(matches!(
            Descriptor::load(file.path()),
            Err(CliError::Json { .. })
        ));
    }

    #[test]
    fn test_bulk_insert_needs_an_array() {
        let json = r#"{"statement": "bulkInsert", "table": "users", "values": {"email": "a"}}"#;
        assert!(matches!(
            generate(DialectKind::Postgres, json),
            Err(CliError::Descriptor(_))
        ));
    }

    #[test]
    fn test_parse_data_type() {
        assert_eq!(parse_data_type("integer").unwrap(), DataType::integer());
        assert_eq!(
            parse_data_type(r#"{"type": "STRING", "length": 20}"#).unwrap(),
            DataType::String {
                length: Some(20),
                binary: false
            }
        );
        assert!(parse_data_type("no_such_type").is_err());
    }
}
