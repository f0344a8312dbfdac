//! Convenient imports for common functionality.
//!
//! This module re-exports the types most callers need to open an executor, run statements
//! and read their results.

pub use crate::config::{ConnectOptions, DatabaseType};
pub use crate::driver::{AnyDriver, Driver, DriverStatement};
pub use crate::error::SqlCacheError;
pub use crate::executor::SqlExecutor;
pub use crate::results::DbRow;
pub use crate::types::{ErrorInfo, NamedParams, RowValues};

#[cfg(feature = "postgres")]
pub use crate::postgres::PgDriver;
#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteDriver;
