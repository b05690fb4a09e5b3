//! Multi-row inserts.

mod common;
use common::*;

use polysql_core::dialect::DialectKind;
use polysql_core::query::BulkInsertOptions;
use polysql_core::{Error, SqlValue};

#[test]
fn columns_are_the_union_of_row_keys() {
    let rows = vec![
        values(&[("email", text("a@x"))]),
        values(&[("name", text("Bo")), ("email", text("b@x"))]),
    ];
    let sql = dialect(DialectKind::Postgres)
        .query_generator()
        .bulk_insert_query(&users(), &rows, &BulkInsertOptions::default())
        .unwrap()
        .sql;
    assert_eq!(
        sql,
        "INSERT INTO \"users\" (\"email\", \"name\") VALUES ('a@x',NULL),('b@x','Bo');"
    );
}

#[test]
fn values_are_inlined_not_bound() {
    let rows = vec![values(&[("email", text("O'Brien"))])];
    let query = dialect(DialectKind::Mysql)
        .query_generator()
        .bulk_insert_query(&users(), &rows, &BulkInsertOptions::default())
        .unwrap();
    assert_eq!(query.sql, "INSERT INTO `users` (`email`) VALUES ('O\\'Brien');");
    assert!(query.bind.is_none());
}

#[test]
fn update_on_duplicate_picks_the_unique_key() {
    let rows = vec![values(&[("email", text("a@x")), ("name", text("A"))])];
    let options = BulkInsertOptions {
        update_on_duplicate: fields(&["name"]),
        upsert_keys: fields(&["email"]),
        ..BulkInsertOptions::default()
    };
    let sql = dialect(DialectKind::Sqlite)
        .query_generator()
        .bulk_insert_query(&users(), &rows, &options)
        .unwrap()
        .sql;
    assert_eq!(
        sql,
        "INSERT INTO `users` (`email`, `name`) VALUES ('a@x','A') ON CONFLICT (`email`) DO UPDATE SET `name` = EXCLUDED.`name`;"
    );
}

#[test]
fn mssql_splits_into_chunks() {
    let rows: Vec<_> = (0..1500)
        .map(|i| values(&[("email", text(&format!("u{i}"))), ("name", SqlValue::Null)]))
        .collect();
    let sql = dialect(DialectKind::Mssql)
        .query_generator()
        .bulk_insert_query(&users(), &rows, &BulkInsertOptions::default())
        .unwrap()
        .sql;
    assert_eq!(sql.matches("INSERT INTO [users]").count(), 2);
    assert!(sql.ends_with("('u1499',NULL);"), "{}", &sql[sql.len() - 40..]);
}

#[test]
fn empty_row_set_is_invalid() {
    let err = dialect(DialectKind::Postgres)
        .query_generator()
        .bulk_insert_query(&users(), &[], &BulkInsertOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)), "{err:?}");
}
