use std::fmt;

use lazy_static::lazy_static;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage, Statement};
use tracing::{debug, info, warn};

use crate::config::ConnectOptions;
use crate::driver::{Driver, DriverStatement, HandleState};
use crate::error::{DriverError, SqlCacheError};
use crate::persistent::{PersistentRegistry, Session};
use crate::results::{DbRow, ResultCursor};
use crate::translation::{PositionalSql, is_blank, named_to_positional};
use crate::types::{BoundParam, ErrorInfo, RowValues};

use super::config::pg_config;
use super::params::PgValue;
use super::query::build_cursor;

lazy_static! {
    static ref PERSISTENT: PersistentRegistry<PgSession> = PersistentRegistry::new();
}

/// A connected client plus the single-threaded runtime that drives its connection task.
pub(crate) struct PgSession {
    runtime: Runtime,
    client: Client,
    in_transaction: bool,
}

impl PgSession {
    fn connect(opts: &ConnectOptions) -> Result<Self, SqlCacheError> {
        let config = pg_config(opts)?;
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SqlCacheError::ConnectionError(format!("runtime error: {e}")))?;
        let (client, connection) = runtime
            .block_on(config.connect(NoTls))
            .map_err(|e| SqlCacheError::ConnectionError(DriverError::from(e).message))?;
        runtime.spawn(async move {
            if let Err(err) = connection.await {
                warn!(error = %err, "postgres connection closed with error");
            }
        });
        Ok(Self {
            runtime,
            client,
            in_transaction: false,
        })
    }

    fn batch(&mut self, sql: &str) -> Result<(), DriverError> {
        self.runtime
            .block_on(self.client.batch_execute(sql))
            .map_err(DriverError::from)
    }
}

/// A `PostgreSQL` session.
///
/// Calls block on a private current-thread runtime; the connection task only makes progress
/// while one of them is running.
///
/// # Panics
/// Opening a session inside a tokio runtime fails with `ConnectionError`, but a session opened
/// outside and then moved into async code panics on its next call, as `Runtime::block_on` does.
pub struct PgDriver {
    session: Session<PgSession>,
    last_error: ErrorInfo,
}

/// Statement handle of a [`PgDriver`].
///
/// `:name` placeholders are rewritten to `$n` when the handle is created. The server-side
/// statement is prepared on first execution and reused afterwards.
pub struct PgStatement {
    state: HandleState,
    positional: PositionalSql,
    prepared: Option<Statement>,
}

impl fmt::Debug for PgStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgStatement")
            .field("state", &self.state)
            .field("positional", &self.positional)
            .field("prepared", &self.prepared.is_some())
            .finish()
    }
}

impl fmt::Debug for PgDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgDriver")
            .field("session", &self.session)
            .field("in_transaction", &self.session.in_transaction)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl PgDriver {
    /// Connect to the server named by a `pgsql:` or `postgres://` DSN.
    ///
    /// # Errors
    /// Returns `SqlCacheError::ConfigError` for a malformed DSN and
    /// `SqlCacheError::ConnectionError` if the server cannot be reached or the calling thread is
    /// already inside a tokio runtime.
    pub fn open(opts: &ConnectOptions) -> Result<Self, SqlCacheError> {
        if Handle::try_current().is_ok() {
            return Err(SqlCacheError::ConnectionError(
                "postgres sessions block on their own runtime and cannot be opened from inside \
                 an async runtime"
                    .into(),
            ));
        }
        let session = if opts.persistent {
            let (session, reused) =
                PERSISTENT.checkout(&opts.persistent_key(), || PgSession::connect(opts))?;
            debug!(reused, "postgres persistent session checked out");
            session
        } else {
            Session::Owned(PgSession::connect(opts)?)
        };
        info!(persistent = session.is_persistent(), "postgres session opened");
        Ok(Self {
            session,
            last_error: ErrorInfo::none(),
        })
    }

    fn record<T>(&mut self, result: Result<T, DriverError>) -> Result<T, DriverError> {
        self.last_error = match &result {
            Ok(_) => ErrorInfo::none(),
            Err(err) => err.info.clone(),
        };
        result
    }

    fn run(&mut self, stmt: &mut PgStatement) -> Result<ResultCursor, DriverError> {
        let session = &mut *self.session;
        let prepared = match &stmt.prepared {
            Some(prepared) => prepared.clone(),
            None => {
                let prepared = session
                    .runtime
                    .block_on(session.client.prepare(&stmt.positional.sql))?;
                stmt.prepared = Some(prepared.clone());
                prepared
            }
        };

        let mut values = vec![RowValues::Null; stmt.positional.names.len()];
        for param in &stmt.state.bindings {
            let position = stmt
                .positional
                .position_of(&param.name)
                .ok_or_else(|| DriverError::undefined_parameter(&param.name))?;
            values[position - 1] = param.value.clone();
        }
        let wrapped: Vec<PgValue<'_>> = values.iter().map(PgValue).collect();
        let params: Vec<&(dyn ToSql + Sync)> = wrapped
            .iter()
            .map(|v| v as &(dyn ToSql + Sync))
            .collect();

        if prepared.columns().is_empty() {
            let affected = session
                .runtime
                .block_on(session.client.execute(&prepared, &params))?;
            Ok(ResultCursor::affected(
                i64::try_from(affected).unwrap_or(i64::MAX),
            ))
        } else {
            let rows = session
                .runtime
                .block_on(session.client.query(&prepared, &params))?;
            build_cursor(&prepared, &rows)
        }
    }

    fn transaction_command(
        &mut self,
        sql: &str,
        in_transaction: bool,
    ) -> Result<bool, DriverError> {
        let result = self.session.batch(sql);
        if result.is_ok() {
            self.session.in_transaction = in_transaction;
        }
        self.record(result).map(|()| true)
    }
}

impl Drop for PgDriver {
    fn drop(&mut self) {
        if self.session.is_persistent() && self.session.in_transaction {
            match self.session.batch("ROLLBACK") {
                Ok(()) => self.session.in_transaction = false,
                Err(err) => warn!(error = %err, "rollback of persistent postgres session failed"),
            }
        }
    }
}

impl Driver for PgDriver {
    type Statement = PgStatement;

    fn prepare(&mut self, sql: &str) -> Result<Option<PgStatement>, DriverError> {
        if is_blank(sql) {
            self.last_error =
                ErrorInfo::new("42601", None, Some("statement text is empty".into()));
            return Ok(None);
        }
        self.last_error = ErrorInfo::none();
        Ok(Some(PgStatement {
            state: HandleState::new(sql),
            positional: named_to_positional(sql),
            prepared: None,
        }))
    }

    fn execute(&mut self, stmt: &mut PgStatement) -> Result<bool, DriverError> {
        let outcome = self.run(stmt);
        let result = stmt.state.finish(outcome);
        self.record(result)
    }

    fn exec(&mut self, sql: &str) -> Result<i64, DriverError> {
        let session = &mut *self.session;
        let result = session
            .runtime
            .block_on(session.client.simple_query(sql))
            .map(|messages| {
                messages
                    .iter()
                    .map(|message| match message {
                        SimpleQueryMessage::CommandComplete(n) => *n,
                        _ => 0,
                    })
                    .sum::<u64>()
            })
            .map(|total| i64::try_from(total).unwrap_or(i64::MAX))
            .map_err(DriverError::from);
        self.record(result)
    }

    fn begin(&mut self) -> Result<bool, DriverError> {
        self.transaction_command("BEGIN", true)
    }

    fn commit(&mut self) -> Result<bool, DriverError> {
        self.transaction_command("COMMIT", false)
    }

    fn rollback(&mut self) -> Result<bool, DriverError> {
        self.transaction_command("ROLLBACK", false)
    }

    fn in_transaction(&self) -> bool {
        self.session.in_transaction
    }

    fn error_info(&self) -> ErrorInfo {
        self.last_error.clone()
    }

    fn last_insert_id(&mut self, sequence: Option<&str>) -> Result<String, DriverError> {
        let session = &mut *self.session;
        let result = match sequence {
            Some(name) => session.runtime.block_on(
                session
                    .client
                    .query_one("SELECT currval($1::text::regclass)::text", &[&name]),
            ),
            None => session
                .runtime
                .block_on(session.client.query_one("SELECT lastval()::text", &[])),
        }
        .and_then(|row| row.try_get::<_, String>(0))
        .map_err(DriverError::from);
        self.record(result)
    }
}

impl DriverStatement for PgStatement {
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
