//! Literal escaping across engines.

mod common;
use common::*;

use polysql_core::dialect::DialectKind;
use polysql_core::SqlValue;

#[test]
fn single_quotes_are_doubled() {
    for kind in [
        DialectKind::Postgres,
        DialectKind::Sqlite,
        DialectKind::Mssql,
        DialectKind::Db2,
        DialectKind::Ibmi,
    ] {
        let dialect = dialect(kind);
        assert_eq!(
            dialect.query_generator().escape_value(&text("O'Brien")).unwrap(),
            "'O''Brien'",
            "{kind}"
        );
    }
}

#[test]
fn mysql_family_uses_backslashes() {
    for kind in [DialectKind::Mysql, DialectKind::Mariadb] {
        let dialect = dialect(kind);
        assert_eq!(
            dialect.query_generator().escape_value(&text("O'Brien")).unwrap(),
            "'O\\'Brien'"
        );
        assert_eq!(
            dialect.query_generator().escape_value(&text("a\\b\nc")).unwrap(),
            "'a\\\\b\\nc'"
        );
    }
}

#[test]
fn null_and_numbers_are_bare() {
    let pg = dialect(DialectKind::Postgres);
    let generator = pg.query_generator();
    assert_eq!(generator.escape_value(&SqlValue::Null).unwrap(), "NULL");
    assert_eq!(generator.escape_value(&SqlValue::Int(-7)).unwrap(), "-7");
    assert_eq!(
        generator
            .escape_list(&[SqlValue::Int(1), text("x")], None)
            .unwrap(),
        "1, 'x'"
    );
}

#[test]
fn identifiers_use_engine_delimiters() {
    assert_eq!(dialect(DialectKind::Postgres).quote_identifier("user"), "\"user\"");
    assert_eq!(dialect(DialectKind::Mysql).quote_identifier("user"), "`user`");
    assert_eq!(dialect(DialectKind::Mssql).quote_identifier("user"), "[user]");
}

#[test]
fn buffers_use_engine_literals() {
    let bytes = [0xde_u8, 0xad];
    assert_eq!(dialect(DialectKind::Sqlite).escape_buffer(&bytes), "X'DEAD'");
    assert_eq!(dialect(DialectKind::Postgres).escape_buffer(&bytes), "'\\xdead'");
}
