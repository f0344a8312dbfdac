//! A blocking statement executor with a tag-addressable prepared-statement cache.
//!
//! [`SqlExecutor`] wraps one database session (`SQLite` through rusqlite, `PostgreSQL` through
//! tokio-postgres), prepares and binds statements with `:name` placeholders, and keeps the
//! results of the last statement readable. With the cache enabled, statements are reused by
//! the MD5 of their text and their results stay reachable by that tag.
//!
//! ```no_run
//! use sql_statement_cache::prelude::*;
//!
//! # fn main() -> Result<(), SqlCacheError> {
//! let mut db = SqlExecutor::connect("sqlite::memory:", "", "", false)?;
//! db.raw("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")?;
//! db.exec(
//!     "INSERT INTO t (name) VALUES (:name)",
//!     &NamedParams::new().with("name", "alice"),
//! )?;
//!
//! db.cache_enable();
//! db.exec("SELECT name FROM t", &NamedParams::new())?;
//! let tag = db.tag()?.unwrap_or_default();
//! assert_eq!(db.count(Some(tag.as_str()))?, 1);
//! # Ok(())
//! # }
//! ```

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("enable at least one of the `sqlite` or `postgres` features");

pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
mod persistent;
pub mod prelude;
pub mod results;
pub mod tag;
pub mod translation;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::{ConnectOptions, ConnectOptionsBuilder, DatabaseType, Dsn};
pub use driver::{AnyDriver, AnyStatement, Driver, DriverStatement};
pub use error::{DriverError, SqlCacheError};
pub use executor::SqlExecutor;
pub use results::{DbRow, ResultCursor};
pub use types::{BoundParam, ErrorInfo, NamedParams, ParamType, RowValues};
