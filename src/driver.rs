//! The database driver contract consumed by [`SqlExecutor`](crate::SqlExecutor).
//!
//! A driver owns one session. Statement handles are plain owned values: they remember their
//! text, their bindings and the cursor of their last execution, and are executed by handing
//! them back to the driver that prepared them.

use crate::config::{ConnectOptions, DatabaseType};
use crate::error::{DriverError, SqlCacheError};
use crate::results::{DbRow, ResultCursor};
use crate::types::{BoundParam, ErrorInfo};

#[cfg(feature = "postgres")]
use crate::postgres::{PgDriver, PgStatement};
#[cfg(feature = "sqlite")]
use crate::sqlite::{SqliteDriver, SqliteStatement};

/// One database session.
pub trait Driver {
    type Statement: DriverStatement;

    /// Create a statement handle for `sql`.
    ///
    /// `Ok(None)` is a soft failure: the driver rejected the text without raising.
    ///
    /// # Errors
    /// Returns `DriverError` if the driver raised while creating the handle.
    fn prepare(&mut self, sql: &str) -> Result<Option<Self::Statement>, DriverError>;

    /// Run `stmt` with its current bindings and buffer its results.
    ///
    /// # Errors
    /// Returns `DriverError` if binding or execution fails.
    fn execute(&mut self, stmt: &mut Self::Statement) -> Result<bool, DriverError>;

    /// Run `sql` without preparation or bindings and return the affected row count.
    ///
    /// # Errors
    /// Returns `DriverError` if execution fails.
    fn exec(&mut self, sql: &str) -> Result<i64, DriverError>;

    /// # Errors
    /// Returns `DriverError` if the transaction cannot be started.
    fn begin(&mut self) -> Result<bool, DriverError>;

    /// # Errors
    /// Returns `DriverError` if the commit fails.
    fn commit(&mut self) -> Result<bool, DriverError>;

    /// # Errors
    /// Returns `DriverError` if the rollback fails.
    fn rollback(&mut self) -> Result<bool, DriverError>;

    fn in_transaction(&self) -> bool;

    /// Descriptor of the last connection-level operation.
    fn error_info(&self) -> ErrorInfo;

    /// # Errors
    /// Returns `DriverError` if the identifier cannot be read.
    fn last_insert_id(&mut self, sequence: Option<&str>) -> Result<String, DriverError>;
}

/// A prepared statement handle; keeps the cursor of its last execution.
pub trait DriverStatement {
    fn sql(&self) -> &str;

    /// Record a binding; applied at the next execution and kept until rebound.
    fn bind(&mut self, param: BoundParam);

    /// Rows returned or affected by the last execution.
    fn row_count(&self) -> i64;

    fn fetch_all(&mut self) -> Vec<DbRow>;

    fn fetch_next(&mut self) -> Option<DbRow>;

    /// Descriptor of the last operation on this handle.
    fn error_info(&self) -> ErrorInfo;
}

/// State shared by every backend's statement handle.
#[derive(Debug, Clone)]
pub(crate) struct HandleState {
    pub(crate) sql: String,
    pub(crate) bindings: Vec<BoundParam>,
    pub(crate) cursor: ResultCursor,
    pub(crate) error: ErrorInfo,
}

impl HandleState {
    pub(crate) fn new(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            bindings: Vec::new(),
            cursor: ResultCursor::default(),
            error: ErrorInfo::none(),
        }
    }

    pub(crate) fn bind(&mut self, param: BoundParam) {
        if let Some(slot) = self.bindings.iter_mut().find(|p| p.name == param.name) {
            *slot = param;
        } else {
            self.bindings.push(param);
        }
    }

    /// Store the outcome of an execution; a failed run leaves an empty cursor behind.
    pub(crate) fn finish(
        &mut self,
        outcome: Result<ResultCursor, DriverError>,
    ) -> Result<bool, DriverError> {
        match outcome {
            Ok(cursor) => {
                self.cursor = cursor;
                self.error = ErrorInfo::none();
                Ok(true)
            }
            Err(err) => {
                self.cursor = ResultCursor::default();
                self.error = err.info.clone();
                Err(err)
            }
        }
    }
}

/// Driver selected at runtime from the DSN.
#[derive(Debug)]
pub enum AnyDriver {
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteDriver),
    #[cfg(feature = "postgres")]
    Postgres(PgDriver),
}

/// Statement handle of an [`AnyDriver`].
#[derive(Debug)]
pub enum AnyStatement {
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteStatement),
    #[cfg(feature = "postgres")]
    Postgres(PgStatement),
}

impl AnyDriver {
    /// Open a session for `opts`.
    ///
    /// # Errors
    /// Returns `SqlCacheError::ConnectionError` if the session cannot be established and
    /// `SqlCacheError::ConfigError` if the backend is not compiled in.
    pub fn open(opts: &ConnectOptions) -> Result<Self, SqlCacheError> {
        match opts.database_type() {
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => Ok(AnyDriver::Sqlite(SqliteDriver::open(opts)?)),
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => Ok(AnyDriver::Postgres(PgDriver::open(opts)?)),
            #[allow(unreachable_patterns)]
            other => Err(SqlCacheError::ConfigError(format!(
                "{other:?} support is not enabled in this build"
            ))),
        }
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        match self {
            #[cfg(feature = "sqlite")]
            AnyDriver::Sqlite(_) => DatabaseType::Sqlite,
            #[cfg(feature = "postgres")]
            AnyDriver::Postgres(_) => DatabaseType::Postgres,
        }
    }
}

fn mismatched_statement() -> DriverError {
    DriverError::new("HY000", "statement handle belongs to a different driver")
}

impl Driver for AnyDriver {
    type Statement = AnyStatement;

    fn prepare(&mut self, sql: &str) -> Result<Option<AnyStatement>, DriverError> {
        match self {
            #[cfg(feature = "sqlite")]
            AnyDriver::Sqlite(d) => Ok(d.prepare(sql)?.map(AnyStatement::Sqlite)),
            #[cfg(feature = "postgres")]
            AnyDriver::Postgres(d) => Ok(d.prepare(sql)?.map(AnyStatement::Postgres)),
        }
    }

    fn execute(&mut self, stmt: &mut AnyStatement) -> Result<bool, DriverError> {
        match (self, stmt) {
            #[cfg(feature = "sqlite")]
            (AnyDriver::Sqlite(d), AnyStatement::Sqlite(s)) => d.execute(s),
            #[cfg(feature = "postgres")]
            (AnyDriver::Postgres(d), AnyStatement::Postgres(s)) => d.execute(s),
            #[allow(unreachable_patterns)]
            _ => Err(mismatched_statement()),
        }
    }

    fn exec(&mut self, sql: &str) -> Result<i64, DriverError> {
        match self {
            #[cfg(feature = "sqlite")]
            AnyDriver::Sqlite(d) => d.exec(sql),
            #[cfg(feature = "postgres")]
            AnyDriver::Postgres(d) => d.exec(sql),
        }
    }

    fn begin(&mut self) -> Result<bool, DriverError> {
        match self {
            #[cfg(feature = "sqlite")]
            AnyDriver::Sqlite(d) => d.begin(),
            #[cfg(feature = "postgres")]
            AnyDriver::Postgres(d) => d.begin(),
        }
    }

    fn commit(&mut self) -> Result<bool, DriverError> {
        match self {
            #[cfg(feature = "sqlite")]
            AnyDriver::Sqlite(d) => d.commit(),
            #[cfg(feature = "postgres")]
            AnyDriver::Postgres(d) => d.commit(),
        }
    }

    fn rollback(&mut self) -> Result<bool, DriverError> {
        match self {
            #[cfg(feature = "sqlite")]
            AnyDriver::Sqlite(d) => d.rollback(),
            #[cfg(feature = "postgres")]
            AnyDriver::Postgres(d) => d.rollback(),
        }
    }

    fn in_transaction(&self) -> bool {
        match self {
            #[cfg(feature = "sqlite")]
            AnyDriver::Sqlite(d) => d.in_transaction(),
            #[cfg(feature = "postgres")]
            AnyDriver::Postgres(d) => d.in_transaction(),
        }
    }

    fn error_info(&self) -> ErrorInfo {
        match self {
            #[cfg(feature = "sqlite")]
            AnyDriver::Sqlite(d) => d.error_info(),
            #[cfg(feature = "postgres")]
            AnyDriver::Postgres(d) => d.error_info(),
        }
    }

    fn last_insert_id(&mut self, sequence: Option<&str>) -> Result<String, DriverError> {
        match self {
            #[cfg(feature = "sqlite")]
            AnyDriver::Sqlite(d) => d.last_insert_id(sequence),
            #[cfg(feature = "postgres")]
            AnyDriver::Postgres(d) => d.last_insert_id(sequence),
        }
    }
}

impl DriverStatement for AnyStatement {
    fn sql(&self) -> &str {
        match self {
            #[cfg(feature = "sqlite")]
            AnyStatement::Sqlite(s) => s.sql(),
            #[cfg(feature = "postgres")]
            AnyStatement::Postgres(s) => s.sql(),
        }
    }

    fn bind(&mut self, param: BoundParam) {
        match self {
            #[cfg(feature = "sqlite")]
            AnyStatement::Sqlite(s) => s.bind(param),
            #[cfg(feature = "postgres")]
            AnyStatement::Postgres(s) => s.bind(param),
        }
    }

    fn row_count(&self) -> i64 {
        match self {
            #[cfg(feature = "sqlite")]
            AnyStatement::Sqlite(s) => s.row_count(),
            #[cfg(feature = "postgres")]
            AnyStatement::Postgres(s) => s.row_count(),
        }
    }

    fn fetch_all(&mut self) -> Vec<DbRow> {
        match self {
            #[cfg(feature = "sqlite")]
            AnyStatement::Sqlite(s) => s.fetch_all(),
            #[cfg(feature = "postgres")]
            AnyStatement::Postgres(s) => s.fetch_all(),
        }
    }

    fn fetch_next(&mut self) -> Option<DbRow> {
        match self {
            #[cfg(feature = "sqlite")]
            AnyStatement::Sqlite(s) => s.fetch_next(),
            #[cfg(feature = "postgres")]
            AnyStatement::Postgres(s) => s.fetch_next(),
        }
    }

    fn error_info(&self) -> ErrorInfo {
        match self {
            #[cfg(feature = "sqlite")]
            AnyStatement::Sqlite(s) => s.error_info(),
            #[cfg(feature = "postgres")]
            AnyStatement::Postgres(s) => s.error_info(),
        }
    }
}
