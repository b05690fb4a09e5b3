//! Option-bag gating.
//!
//! Each generator method documents the full set of options it can ever
//! accept (its *supportable* set). The dialect's capability matrix decides
//! which of those it actually implements (the *supported* set). Anything in
//! the first but not the second is rejected before SQL is produced.

use crate::error::{Error, Result};

use super::Dialect;

pub const CREATE_SCHEMA_SUPPORTABLE: &[&str] = &[
    "authorization",
    "charset",
    "collate",
    "comment",
    "ifNotExists",
    "replace",
];
pub const DROP_SCHEMA_SUPPORTABLE: &[&str] = &["cascade", "ifExists"];
pub const DROP_TABLE_SUPPORTABLE: &[&str] = &["cascade"];
pub const REMOVE_COLUMN_SUPPORTABLE: &[&str] = &["ifExists", "cascade"];
pub const ADD_COLUMN_SUPPORTABLE: &[&str] = &["ifNotExists"];
pub const REMOVE_CONSTRAINT_SUPPORTABLE: &[&str] = &["ifExists", "cascade"];
pub const REMOVE_INDEX_SUPPORTABLE: &[&str] = &["concurrently", "ifExists", "cascade"];
pub const ADD_INDEX_SUPPORTABLE: &[&str] = &[
    "concurrently",
    "ifNotExists",
    "include",
    "operator",
    "parser",
    "type",
    "using",
    "where",
];
pub const RENAME_TABLE_SUPPORTABLE: &[&str] = &["changeSchema"];
pub const SHOW_CONSTRAINTS_SUPPORTABLE: &[&str] =
    &["columnName", "constraintName", "constraintType"];
pub const START_TRANSACTION_SUPPORTABLE: &[&str] = &["readOnly", "transactionType"];
pub const TRUNCATE_SUPPORTABLE: &[&str] = &["cascade", "restartIdentity"];
pub const CREATE_TABLE_SUPPORTABLE: &[&str] = &[
    "collate",
    "charset",
    "engine",
    "rowFormat",
    "comment",
    "initialAutoIncrement",
    "uniqueKeys",
];
pub const INSERT_SUPPORTABLE: &[&str] = &["ignoreDuplicates", "returning"];
pub const BULK_INSERT_SUPPORTABLE: &[&str] = &[
    "ignoreDuplicates",
    "updateOnDuplicate",
    "conflictWhere",
    "returning",
];
pub const UPSERT_SUPPORTABLE: &[&str] = &["conflictFields", "conflictWhere", "returning"];
pub const UPDATE_SUPPORTABLE: &[&str] = &["limit", "returning"];
pub const ARITHMETIC_SUPPORTABLE: &[&str] = &["returning"];
pub const LIST_TABLES_SUPPORTABLE: &[&str] = &["schema"];

/// An option bag that can report which of its options are set.
///
/// An option is "present" when it is set to anything other than
/// absent/`false`/null.
pub trait OptionBag {
    /// Names of the present options, in declaration order.
    fn present_options(&self) -> Vec<String>;
}

impl OptionBag for serde_json::Map<String, serde_json::Value> {
    fn present_options(&self) -> Vec<String> {
        self.iter()
            .filter(|(_, v)| !matches!(v, serde_json::Value::Null | serde_json::Value::Bool(false)))
            .map(|(k, _)| k.clone())
            .collect()
    }
}

/// Collects the names whose flag is set. Used by the typed option structs.
pub(crate) fn present(flags: &[(&str, bool)]) -> Vec<String> {
    flags
        .iter()
        .filter(|(_, on)| *on)
        .map(|(name, _)| (*name).to_string())
        .collect()
}

/// Rejects options that `method` could accept but `dialect` does not support.
///
/// # Errors
///
/// Returns [`Error::UnsupportedOption`] naming every offending option.
pub fn validate_options(
    method: &str,
    dialect: &Dialect,
    supportable: &[&str],
    supported: &[&str],
    received: &dyn OptionBag,
) -> Result<()> {
    let unsupported: Vec<String> = received
        .present_options()
        .into_iter()
        .filter(|name| supportable.contains(&name.as_str()) && !supported.contains(&name.as_str()))
        .collect();

    if unsupported.is_empty() {
        return Ok(());
    }

    Err(Error::UnsupportedOption {
        method: method.to_string(),
        dialect: dialect.name().to_string(),
        options: unsupported,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectKind;
    use serde_json::json;

    fn bag(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_rejects_supportable_but_unsupported() {
        let dialect = Dialect::new(DialectKind::Sqlite).unwrap();
        let err = validate_options(
            "removeIndexQuery",
            &dialect,
            REMOVE_INDEX_SUPPORTABLE,
            &["ifExists"],
            &bag(json!({"cascade": true})),
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::UnsupportedOption {
                method: "removeIndexQuery".into(),
                dialect: "sqlite".into(),
                options: vec!["cascade".into()],
            }
        );
    }

    #[test]
    fn test_accepts_supported_and_falsy() {
        let dialect = Dialect::new(DialectKind::Sqlite).unwrap();
        validate_options(
            "removeIndexQuery",
            &dialect,
            REMOVE_INDEX_SUPPORTABLE,
            &["ifExists"],
            &bag(json!({"ifExists": true, "cascade": false, "concurrently": null})),
        )
        .unwrap();
    }

    #[test]
    fn test_ignores_options_outside_the_supportable_set() {
        let dialect = Dialect::new(DialectKind::Postgres).unwrap();
        validate_options(
            "dropTableQuery",
            &dialect,
            DROP_TABLE_SUPPORTABLE,
            &[],
            &bag(json!({"somethingElse": 1})),
        )
        .unwrap();
    }

    #[test]
    fn test_lists_every_offender_in_received_order() {
        let dialect = Dialect::new(DialectKind::Mysql).unwrap();
        let err = validate_options(
            "removeIndexQuery",
            &dialect,
            REMOVE_INDEX_SUPPORTABLE,
            &[],
            &bag(json!({"ifExists": true, "concurrently": "yes"})),
        )
        .unwrap_err();
        match err {
            Error::UnsupportedOption { options, .. } => {
                assert_eq!(options, vec!["ifExists", "concurrently"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
