//! # polysql-core
//!
//! Dialect-aware SQL generation.
//!
//! This crate turns statement descriptors (a table, a map of column values,
//! a filter and an option bag) into SQL text plus bind values for one of
//! seven engines:
//! - A capability matrix per engine, read before any SQL is produced
//! - A type registry that validates, escapes and binds values per engine
//! - A WHERE compiler over nested filter specifications
//! - One generator routine per statement kind
//!
//! ## Generating a statement
//!
//! ```rust
//! use polysql_core::dialect::{Dialect, DialectKind};
//! use polysql_core::filter::Where;
//! use polysql_core::query::SelectOptions;
//!
//! let dialect = Dialect::new(DialectKind::Postgres).unwrap();
//! let query = dialect
//!     .query_generator()
//!     .select_query(
//!         &"users".into(),
//!         &SelectOptions {
//!             where_clause: Some(Where::attr("name").eq("O'Brien")),
//!             ..SelectOptions::default()
//!         },
//!     )
//!     .unwrap();
//!
//! assert_eq!(query.sql, r#"SELECT * FROM "users" WHERE "name" = 'O''Brien';"#);
//! ```
//!
//! ## Option gating
//!
//! Options a statement kind can take but the engine cannot honour are
//! rejected up front:
//!
//! ```rust
//! use polysql_core::dialect::{Dialect, DialectKind};
//! use polysql_core::query::RemoveIndexOptions;
//! use polysql_core::Error;
//!
//! let sqlite = Dialect::new(DialectKind::Sqlite).unwrap();
//! let err = sqlite
//!     .query_generator()
//!     .remove_index_query(
//!         &"users".into(),
//!         "users_email",
//!         &RemoveIndexOptions { cascade: true, ..RemoveIndexOptions::default() },
//!     )
//!     .unwrap_err();
//!
//! assert!(matches!(err, Error::UnsupportedOption { .. }));
//! ```

pub mod bind;
pub mod config;
pub mod dialect;
pub mod error;
pub mod expr;
pub mod filter;
pub mod query;
pub mod schema;
pub mod types;
pub mod value;

pub use bind::{Bind, BindStyle};
pub use config::GeneratorOptions;
pub use dialect::{Dialect, DialectKind};
pub use error::{Error, Result};
pub use expr::Expr;
pub use filter::Where;
pub use query::{Query, QueryGenerator};
pub use schema::{AttributeDef, ModelSchema, TableName, TableRef};
pub use types::DataType;
pub use value::{SqlValue, ToSqlValue};
