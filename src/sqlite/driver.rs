use std::fmt;
use std::time::Duration;

use lazy_static::lazy_static;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::config::{ConnectOptions, Dsn};
use crate::driver::{Driver, DriverStatement, HandleState};
use crate::error::{DriverError, SqlCacheError};
use crate::persistent::{PersistentRegistry, Session};
use crate::results::DbRow;
use crate::translation::is_blank;
use crate::types::{BoundParam, ErrorInfo};

use super::query::run_statement;

lazy_static! {
    static ref PERSISTENT: PersistentRegistry<Connection> = PersistentRegistry::new();
}

/// A `SQLite` session.
pub struct SqliteDriver {
    conn: Session<Connection>,
    last_error: ErrorInfo,
}

/// Statement handle of a [`SqliteDriver`].
///
/// The compiled statement lives in the connection's `prepare_cached` cache; the handle keeps
/// the text, the bindings and the rows of its last run.
#[derive(Debug, Clone)]
pub struct SqliteStatement {
    state: HandleState,
}

fn open_connection(path: &str, busy_timeout: Option<Duration>) -> rusqlite::Result<Connection> {
    let conn = if path == ":memory:" {
        Connection::open_in_memory()?
    } else {
        Connection::open(path)?
    };
    if let Some(timeout) = busy_timeout {
        conn.busy_timeout(timeout)?;
    }
    Ok(conn)
}

impl SqliteDriver {
    /// Open the database named by a `sqlite:` DSN.
    ///
    /// # Errors
    /// Returns `SqlCacheError::ConnectionError` if the database cannot be opened.
    pub fn open(opts: &ConnectOptions) -> Result<Self, SqlCacheError> {
        let Dsn::Sqlite(path) = &opts.dsn else {
            return Err(SqlCacheError::ConfigError(
                "SqliteDriver needs a sqlite: DSN".into(),
            ));
        };
        let open = || open_connection(path, opts.busy_timeout);
        let conn = if opts.persistent {
            let (session, reused) = PERSISTENT
                .checkout(&opts.persistent_key(), open)
                .map_err(|e| SqlCacheError::ConnectionError(e.to_string()))?;
            debug!(reused, "sqlite persistent session checked out");
            session
        } else {
            Session::Owned(open().map_err(|e| SqlCacheError::ConnectionError(e.to_string()))?)
        };
        info!(path = %path, persistent = conn.is_persistent(), "sqlite session opened");
        Ok(Self {
            conn,
            last_error: ErrorInfo::none(),
        })
    }

    /// Wrap an already opened connection.
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Session::Owned(conn),
            last_error: ErrorInfo::none(),
        }
    }

    /// Borrow the underlying rusqlite connection.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn record<T>(&mut self, result: Result<T, DriverError>) -> Result<T, DriverError> {
        self.last_error = match &result {
            Ok(_) => ErrorInfo::none(),
            Err(err) => err.info.clone(),
        };
        result
    }

    fn batch(&mut self, sql: &str) -> Result<bool, DriverError> {
        let result = self.conn.execute_batch(sql).map_err(DriverError::from);
        self.record(result).map(|()| true)
    }
}

impl fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("conn", &self.conn)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl Drop for SqliteDriver {
    fn drop(&mut self) {
        if self.conn.is_persistent() && !self.conn.is_autocommit() {
            if let Err(err) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %err, "rollback of persistent sqlite session failed");
            }
        }
    }
}

impl Driver for SqliteDriver {
    type Statement = SqliteStatement;

    fn prepare(&mut self, sql: &str) -> Result<Option<SqliteStatement>, DriverError> {
        if is_blank(sql) {
            self.last_error =
                ErrorInfo::new("HY000", None, Some("statement text is empty".into()));
            return Ok(None);
        }
        self.last_error = ErrorInfo::none();
        Ok(Some(SqliteStatement {
            state: HandleState::new(sql),
        }))
    }

    fn execute(&mut self, stmt: &mut SqliteStatement) -> Result<bool, DriverError> {
        let outcome = run_statement(&self.conn, &stmt.state.sql, &stmt.state.bindings);
        let result = stmt.state.finish(outcome);
        self.record(result)
    }

    fn exec(&mut self, sql: &str) -> Result<i64, DriverError> {
        let before = self.conn.total_changes();
        let result = self
            .conn
            .execute_batch(sql)
            .map(|()| {
                let changed = self.conn.total_changes().saturating_sub(before);
                i64::try_from(changed).unwrap_or(i64::MAX)
            })
            .map_err(DriverError::from);
        self.record(result)
    }

    fn begin(&mut self) -> Result<bool, DriverError> {
        self.batch("BEGIN")
    }

    fn commit(&mut self) -> Result<bool, DriverError> {
        self.batch("COMMIT")
    }

    fn rollback(&mut self) -> Result<bool, DriverError> {
        self.batch("ROLLBACK")
    }

    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn error_info(&self) -> ErrorInfo {
        self.last_error.clone()
    }

    fn last_insert_id(&mut self, _sequence: Option<&str>) -> Result<String, DriverError> {
        self.last_error = ErrorInfo::none();
        Ok(self.conn.last_insert_rowid().to_string())
    }
}

impl DriverStatement for SqliteStatement {
    fn sql(&self) -> &str {
        &self.state.sql
    }

    fn bind(&mut self, param: BoundParam) {
        self.state.bind(param);
    }

    fn row_count(&self) -> i64 {
        self.state.cursor.row_count()
    }

    fn fetch_all(&mut self) -> Vec<DbRow> {
        self.state.cursor.fetch_all()
    }

    fn fetch_next(&mut self) -> Option<DbRow> {
        self.state.cursor.fetch_next()
    }

    fn error_info(&self) -> ErrorInfo {
        self.state.error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowValues;

    fn driver() -> SqliteDriver {
        let opts = ConnectOptions::new("sqlite::memory:", "", "").unwrap();
        SqliteDriver::open(&opts).unwrap()
    }

    #[test]
    fn blank_text_is_a_soft_failure() {
        let mut d = driver();
        assert!(d.prepare("  -- nothing\n").unwrap().is_none());
        assert!(d.error_info().is_error());
        assert!(d.prepare("SELECT 1").unwrap().is_some());
        assert!(!d.error_info().is_error());
    }

    #[test]
    fn malformed_sql_fails_at_execution_and_is_recorded_twice() {
        let mut d = driver();
        let mut stmt = d.prepare("malformed sql").unwrap().unwrap();
        let err = d.execute(&mut stmt).unwrap_err();
        let conn_msg = d.error_info().message.unwrap();
        let stmt_msg = stmt.error_info().message.unwrap();
        assert!(err.message.contains(&conn_msg));
        assert_eq!(conn_msg, stmt_msg);
        assert_eq!(stmt.error_info().sqlstate, "HY000");
    }

    #[test]
    fn transactions_follow_autocommit() {
        let mut d = driver();
        assert!(!d.in_transaction());
        assert!(d.begin().unwrap());
        assert!(d.in_transaction());
        assert!(d.rollback().unwrap());
        assert!(!d.in_transaction());
    }

    #[test]
    fn exec_returns_changed_rows_and_last_id() {
        let mut d = driver();
        assert_eq!(d.exec("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)").unwrap(), 0);
        assert_eq!(
            d.exec("INSERT INTO t (v) VALUES ('a'); INSERT INTO t (v) VALUES ('b');")
                .unwrap(),
            2
        );
        assert_eq!(d.last_insert_id(None).unwrap(), "2");

        let mut stmt = d.prepare("SELECT v FROM t WHERE id = :id").unwrap().unwrap();
        stmt.bind(BoundParam::new("id", RowValues::Int(2)));
        assert!(d.execute(&mut stmt).unwrap());
        let row = stmt.fetch_next().unwrap();
        assert_eq!(row.get("v"), Some(&RowValues::Text("b".into())));
    }
}
