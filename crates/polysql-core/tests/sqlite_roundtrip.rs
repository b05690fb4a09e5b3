//! Generated SQL executed against an in-memory SQLite database.

mod common;
use common::*;

use polysql_core::dialect::DialectKind;
use polysql_core::query::{
    AddIndexOptions, ArithmeticOptions, BulkInsertOptions, CreateTableOptions, DeleteOptions,
    InsertOptions, ListTablesOptions, SelectOptions, UpdateOptions,
};
use polysql_core::schema::AttributeDef;
use polysql_core::types::{DataType, TypeDescriptor};
use polysql_core::{SqlValue, Where};
use serde_json::json;
use sqlx::{Connection, Row, SqliteConnection};

async fn users_table() -> SqliteConnection {
    let mut conn = SqliteConnection::connect("sqlite::memory:")
        .await
        .unwrap_or_else(|e| panic!("Failed to open sqlite: {e}"));
    let sqlite = dialect(DialectKind::Sqlite);
    let generator = sqlite.query_generator();
    let create = generator
        .create_table_query(&users_model(), &CreateTableOptions::default())
        .unwrap();
    sqlx::query(&create.sql).execute(&mut conn).await.unwrap();
    let index = generator
        .add_index_query(
            &users(),
            &fields(&["email"]),
            &AddIndexOptions {
                unique: true,
                ..AddIndexOptions::default()
            },
        )
        .unwrap();
    sqlx::query(&index.sql).execute(&mut conn).await.unwrap();
    conn
}

async fn names(conn: &mut SqliteConnection) -> Vec<(String, Option<String>)> {
    let sqlite = dialect(DialectKind::Sqlite);
    let select = sqlite
        .query_generator()
        .select_query(&users(), &SelectOptions::default())
        .unwrap();
    sqlx::query_as::<_, (i64, String, Option<String>)>(&select.sql)
        .fetch_all(conn)
        .await
        .unwrap()
        .into_iter()
        .map(|(_, email, name)| (email, name))
        .collect()
}

#[tokio::test]
async fn escaped_text_survives_the_engine() {
    let mut conn = users_table().await;
    let tricky = ["O'Brien", "back\\slash", "''", "line\nbreak", "emoji \u{1f600}", "--"];
    let sqlite = dialect(DialectKind::Sqlite);
    let generator = sqlite.query_generator();
    for (i, name) in tricky.iter().enumerate() {
        let insert = generator
            .insert_query(
                &users(),
                &values(&[("email", text(&format!("u{i}"))), ("name", text(name))]),
                &InsertOptions {
                    inline_values: true,
                    ..InsertOptions::default()
                },
            )
            .unwrap();
        sqlx::query(&insert.sql).execute(&mut conn).await.unwrap();
    }

    let stored: Vec<Option<String>> = names(&mut conn).await.into_iter().map(|(_, n)| n).collect();
    let expected: Vec<Option<String>> = tricky.iter().map(|n| Some((*n).to_string())).collect();
    assert_eq!(stored, expected);

    let select = generator
        .select_query(
            &users(),
            &SelectOptions {
                where_clause: Some(Where::attr("name").eq("O'Brien")),
                ..SelectOptions::default()
            },
        )
        .unwrap();
    let rows = sqlx::query(&select.sql).fetch_all(&mut conn).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn bulk_upsert_updates_on_the_unique_key() {
    let mut conn = users_table().await;
    let sqlite = dialect(DialectKind::Sqlite);
    let generator = sqlite.query_generator();
    let options = BulkInsertOptions {
        update_on_duplicate: fields(&["name"]),
        upsert_keys: fields(&["email"]),
        ..BulkInsertOptions::default()
    };

    let first = generator
        .bulk_insert_query(
            &users(),
            &[
                values(&[("email", text("a@x")), ("name", text("A"))]),
                values(&[("email", text("b@x")), ("name", SqlValue::Null)]),
            ],
            &options,
        )
        .unwrap();
    sqlx::query(&first.sql).execute(&mut conn).await.unwrap();

    let second = generator
        .bulk_insert_query(
            &users(),
            &[values(&[("email", text("b@x")), ("name", text("B"))])],
            &options,
        )
        .unwrap();
    sqlx::query(&second.sql).execute(&mut conn).await.unwrap();

    assert_eq!(
        names(&mut conn).await,
        vec![
            ("a@x".to_string(), Some("A".to_string())),
            ("b@x".to_string(), Some("B".to_string())),
        ]
    );
}

#[tokio::test]
async fn update_and_delete_hit_the_filtered_rows() {
    let mut conn = users_table().await;
    let sqlite = dialect(DialectKind::Sqlite);
    let generator = sqlite.query_generator();
    let rows: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|email| values(&[("email", text(email)), ("name", text("old"))]))
        .collect();
    let insert = generator
        .bulk_insert_query(&users(), &rows, &BulkInsertOptions::default())
        .unwrap();
    sqlx::query(&insert.sql).execute(&mut conn).await.unwrap();

    let update = generator
        .update_query(
            &users(),
            &values(&[("name", text("new"))]),
            &Where::attr("email").in_list(vec!["a", "b"]),
            &UpdateOptions {
                inline_values: true,
                ..UpdateOptions::default()
            },
        )
        .unwrap();
    sqlx::query(&update.sql).execute(&mut conn).await.unwrap();

    let delete = generator
        .delete_query(&users(), &Where::attr("email").eq("a"), &DeleteOptions::default())
        .unwrap();
    sqlx::query(&delete.sql).execute(&mut conn).await.unwrap();

    assert_eq!(
        names(&mut conn).await,
        vec![
            ("b".to_string(), Some("new".to_string())),
            ("c".to_string(), Some("old".to_string())),
        ]
    );
}

#[tokio::test]
async fn escaped_literals_parse_back_to_the_same_value() {
    let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
    let sqlite = dialect(DialectKind::Sqlite);
    let generator = sqlite.query_generator();
    let date = chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    let cases = vec![
        (DataType::integer(), SqlValue::Int(-42)),
        (DataType::bigint(), SqlValue::Int(9_007_199_254_740_993)),
        (DataType::string(), text("O'Brien")),
        (DataType::text(), text("two '' quotes")),
        (DataType::DateOnly, SqlValue::Date(date)),
        (DataType::Json, SqlValue::Json(json!({"name": "O'Brien", "tags": [1, 2]}))),
    ];

    for (ty, value) in cases {
        let literal = generator.escape(&value, Some(&ty)).unwrap();
        let row = sqlx::query(&format!("SELECT {literal} AS v"))
            .fetch_one(&mut conn)
            .await
            .unwrap_or_else(|e| panic!("Failed to select {literal}: {e}"));
        let raw = match value {
            SqlValue::Int(_) => SqlValue::Int(row.get::<i64, _>("v")),
            _ => SqlValue::Text(row.get::<String, _>("v")),
        };
        let parsed = sqlite
            .types()
            .descriptor(&ty)
            .parse_database_value(&ty, raw, &sqlite)
            .unwrap();
        assert_eq!(parsed, value, "{literal}");
    }
}

#[tokio::test]
async fn catalog_queries_read_the_live_schema() {
    let mut conn = users_table().await;
    let sqlite = dialect(DialectKind::Sqlite);
    let generator = sqlite.query_generator();

    let tables = generator.list_tables_query(&ListTablesOptions::default()).unwrap();
    let rows = sqlx::query(&tables.sql).fetch_all(&mut conn).await.unwrap();
    let listed: Vec<String> = rows.iter().map(|row| row.get("tableName")).collect();
    assert_eq!(listed, vec!["users".to_string()]);

    let indexes = generator.show_indexes_query(&users()).unwrap();
    let rows = sqlx::query(&indexes.sql).fetch_all(&mut conn).await.unwrap();
    assert!(rows
        .iter()
        .any(|row| row.get::<String, _>("name") == "users_email_unique"));

    let rename = generator
        .rename_column_query(
            &users(),
            "name",
            &AttributeDef::new("displayName", DataType::string()).field("display_name"),
        )
        .unwrap();
    sqlx::query(&rename.sql).execute(&mut conn).await.unwrap();

    let describe = generator.describe_table_query(&users()).unwrap();
    let rows = sqlx::query(&describe.sql).fetch_all(&mut conn).await.unwrap();
    let columns: Vec<String> = rows.iter().map(|row| row.get("name")).collect();
    assert_eq!(columns, vec!["id", "email", "display_name"]);

    let version = generator.version_query().unwrap();
    let row = sqlx::query(&version.sql).fetch_one(&mut conn).await.unwrap();
    assert!(row.get::<String, _>("version").starts_with('3'));
}

#[tokio::test]
async fn increment_changes_the_stored_value_in_place() {
    let mut conn = users_table().await;
    let sqlite = dialect(DialectKind::Sqlite);
    let generator = sqlite.query_generator();
    let insert = generator
        .insert_query(
            &users(),
            &values(&[("id", SqlValue::Int(1)), ("email", text("a@x"))]),
            &InsertOptions {
                inline_values: true,
                ..InsertOptions::default()
            },
        )
        .unwrap();
    sqlx::query(&insert.sql).execute(&mut conn).await.unwrap();

    let increment = generator
        .increment_query(
            &users(),
            &Where::attr("email").eq("a@x"),
            &values(&[("id", SqlValue::Int(41))]),
            &values(&[("name", text("bumped"))]),
            &ArithmeticOptions::default(),
        )
        .unwrap();
    sqlx::query(&increment.sql).execute(&mut conn).await.unwrap();

    let (id, name): (i64, Option<String>) = sqlx::query_as("SELECT id, name FROM users")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!((id, name.as_deref()), (42, Some("bumped")));
}
