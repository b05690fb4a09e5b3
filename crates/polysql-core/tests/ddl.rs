//! Schema statements and index naming.

mod common;
use common::*;

use polysql_core::dialect::DialectKind;
use polysql_core::query::{AddIndexOptions, CreateTableOptions, DropTableOptions};
use polysql_core::schema::index_name;
use polysql_core::Error;

#[test]
fn index_names_follow_table_and_fields() {
    assert_eq!(index_name("users", &fields(&["email"]), false), "users_email");
    assert_eq!(index_name("users", &fields(&["email"]), true), "users_email_unique");
    assert_eq!(
        index_name("Users", &fields(&["firstName", "lastName"]), false),
        "users_first_name_last_name"
    );
}

#[test]
fn add_index_uses_the_default_name() {
    let pg = dialect(DialectKind::Postgres);
    let generator = pg.query_generator();
    assert_eq!(
        generator
            .add_index_query(&"users".into(), &fields(&["email"]), &AddIndexOptions::default())
            .unwrap()
            .sql,
        "CREATE INDEX \"users_email\" ON \"users\" (\"email\");"
    );
    assert_eq!(
        generator
            .add_index_query(
                &"users".into(),
                &fields(&["email"]),
                &AddIndexOptions {
                    unique: true,
                    ..AddIndexOptions::default()
                },
            )
            .unwrap()
            .sql,
        "CREATE UNIQUE INDEX \"users_email_unique\" ON \"users\" (\"email\");"
    );
}

#[test]
fn model_unique_index_is_a_unique_key() {
    let model = users_model();
    let keys = model.unique_keys();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].name, "users_email_unique");
    assert_eq!(keys[0].fields, fields(&["email"]));
}

#[test]
fn create_table_per_engine() {
    let model = users_model();
    let pg = dialect(DialectKind::Postgres)
        .query_generator()
        .create_table_query(&model, &CreateTableOptions::default())
        .unwrap()
        .sql;
    assert_eq!(
        pg,
        "CREATE TABLE IF NOT EXISTS \"users\" (\"id\" SERIAL NOT NULL PRIMARY KEY, \"email\" VARCHAR(255) NOT NULL, \"name\" VARCHAR(255));"
    );

    let mssql = dialect(DialectKind::Mssql)
        .query_generator()
        .create_table_query(&model, &CreateTableOptions::default())
        .unwrap()
        .sql;
    assert!(
        mssql.starts_with("IF OBJECT_ID('[users]', 'U') IS NULL CREATE TABLE [users] ("),
        "{mssql}"
    );
}

#[test]
fn drop_table_options_are_gated() {
    let options = DropTableOptions { cascade: true };
    let pg = dialect(DialectKind::Postgres);
    assert_eq!(
        pg.query_generator()
            .drop_table_query(&"users".into(), &options)
            .unwrap()
            .sql,
        "DROP TABLE IF EXISTS \"users\" CASCADE;"
    );
    let sqlite = dialect(DialectKind::Sqlite);
    assert!(matches!(
        sqlite.query_generator().drop_table_query(&"users".into(), &options),
        Err(Error::UnsupportedOption { .. })
    ));
}
