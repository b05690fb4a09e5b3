#![allow(dead_code)]

use std::sync::Arc;

use indexmap::IndexMap;
use polysql_core::dialect::{Dialect, DialectKind};
use polysql_core::schema::{AttributeDef, IndexDef, ModelSchema, TableRef};
use polysql_core::types::DataType;
use polysql_core::SqlValue;

pub fn dialect(kind: DialectKind) -> Dialect {
    Dialect::new(kind).unwrap_or_else(|e| panic!("Failed to build dialect {kind}: {e:?}"))
}

/// `users` with a serial primary key `id`, a uniquely indexed `email` and a
/// free `name`.
pub fn users_model() -> ModelSchema {
    ModelSchema::new("users")
        .attribute(
            AttributeDef::new("id", DataType::integer())
                .primary_key()
                .auto_increment(),
        )
        .attribute(AttributeDef::new("email", DataType::string()).not_null())
        .attribute(AttributeDef::new("name", DataType::string()))
        .index(IndexDef::new(["email"]).unique())
}

pub fn users() -> TableRef {
    TableRef::Model(Arc::new(users_model()))
}

pub fn values(pairs: &[(&str, SqlValue)]) -> IndexMap<String, SqlValue> {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_string(), value.clone()))
        .collect()
}

pub fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

pub fn text(value: &str) -> SqlValue {
    SqlValue::Text(value.to_string())
}
