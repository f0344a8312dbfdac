//! The statement executor: one driver session, an optional tag-addressed statement cache, and
//! the "last statement" that untagged accessors read from.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::config::ConnectOptions;
use crate::driver::{AnyDriver, Driver, DriverStatement};
use crate::error::{DriverError, SqlCacheError};
use crate::results::DbRow;
use crate::tag::tag_for;
use crate::types::{ErrorInfo, NamedParams};

/// Where the last executed statement lives.
enum LastStatement<S> {
    /// Filed in the cache under this tag.
    Cached(String),
    /// Held by the executor alone (cache disabled).
    Owned(S),
}

/// Blocking statement executor with an optional prepared-statement cache.
///
/// With the cache disabled every call prepares a fresh statement. With it enabled, statements
/// are filed under the MD5 hex of their text and reused whenever the same text comes back;
/// the tag returned by [`SqlExecutor::tag`] addresses a statement's results after later calls
/// have moved on.
///
/// The executor is single-threaded: callers sharing one across threads must serialise access.
pub struct SqlExecutor<D: Driver = AnyDriver> {
    driver: D,
    cache: Option<HashMap<String, D::Statement>>,
    last: Option<LastStatement<D::Statement>>,
    last_tag: Option<String>,
    last_query: Option<String>,
}

impl SqlExecutor<AnyDriver> {
    /// Open a session from a DSN and credentials.
    ///
    /// `use_pool` asks for a persistent connection that is handed back to a process-wide
    /// registry when the executor is dropped, and reused by the next executor opened with the
    /// same DSN and user.
    ///
    /// # Errors
    /// Returns `SqlCacheError::ConnectionError` carrying the driver's message if the session
    /// cannot be established, including when the DSN is not understood.
    pub fn connect(
        dsn: &str,
        user: &str,
        password: &str,
        use_pool: bool,
    ) -> Result<Self, SqlCacheError> {
        let opts = ConnectOptions::builder(dsn)
            .user(user)
            .password(password)
            .persistent(use_pool)
            .finish()
            .map_err(|err| match err {
                SqlCacheError::ConfigError(msg) => SqlCacheError::ConnectionError(msg),
                other => other,
            })?;
        Self::with_options(&opts).map_err(|err| match err {
            SqlCacheError::ConfigError(msg) => SqlCacheError::ConnectionError(msg),
            other => other,
        })
    }

    /// Open a session from prepared [`ConnectOptions`].
    ///
    /// # Errors
    /// Returns `SqlCacheError::ConnectionError` if the session cannot be established and
    /// `SqlCacheError::ConfigError` if the options do not describe a usable backend.
    pub fn with_options(opts: &ConnectOptions) -> Result<Self, SqlCacheError> {
        let driver = AnyDriver::open(opts)?;
        Ok(Self::with_driver(driver))
    }
}

impl<D: Driver> SqlExecutor<D> {
    /// Wrap an already opened driver session. The cache starts disabled.
    #[must_use]
    pub fn with_driver(driver: D) -> Self {
        Self {
            driver,
            cache: None,
            last: None,
            last_tag: None,
            last_query: None,
        }
    }

    #[must_use]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Turn the statement cache on. Existing entries survive repeated calls.
    pub fn cache_enable(&mut self) {
        if self.cache.is_none() {
            debug!("statement cache enabled");
            self.cache = Some(HashMap::new());
        }
    }

    /// Turn the statement cache off, dropping every cached statement.
    ///
    /// The last executed statement stays readable through the untagged accessors.
    pub fn cache_disable(&mut self) {
        let Some(mut cache) = self.cache.take() else {
            return;
        };
        if let Some(LastStatement::Cached(tag)) = &self.last {
            let stmt = cache.remove(tag.as_str());
            self.last = stmt.map(LastStatement::Owned);
        }
        debug!(dropped = cache.len(), "statement cache disabled");
    }

    #[must_use]
    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Tags currently held by the cache, sorted. Empty when the cache is disabled.
    #[must_use]
    pub fn cached_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self
            .cache
            .iter()
            .flat_map(|cache| cache.keys().map(String::as_str))
            .collect();
        tags.sort_unstable();
        tags
    }

    /// Start a transaction. Returns `false` if one is already active.
    ///
    /// # Errors
    /// Returns `SqlCacheError::QueryError` if the driver fails to start it.
    pub fn transaction_begin(&mut self) -> Result<bool, SqlCacheError> {
        if self.driver.in_transaction() {
            return Ok(false);
        }
        self.driver.begin().map_err(query_error)
    }

    #[must_use]
    pub fn transaction_active(&self) -> bool {
        self.driver.in_transaction()
    }

    /// Commit the active transaction. Returns `false` if none is active.
    ///
    /// # Errors
    /// Returns `SqlCacheError::QueryError` if the commit fails.
    pub fn transaction_commit(&mut self) -> Result<bool, SqlCacheError> {
        if !self.driver.in_transaction() {
            return Ok(false);
        }
        self.driver.commit().map_err(query_error)
    }

    /// Roll back the active transaction. Returns `false` if none is active.
    ///
    /// # Errors
    /// Returns `SqlCacheError::QueryError` if the rollback fails.
    pub fn transaction_rollback(&mut self) -> Result<bool, SqlCacheError> {
        if !self.driver.in_transaction() {
            return Ok(false);
        }
        self.driver.rollback().map_err(query_error)
    }

    /// Prepare (or reuse) `sql`, bind `params` and execute it once.
    ///
    /// Returns `Ok(false)` without raising when the driver refuses to produce a statement
    /// handle.
    ///
    /// # Errors
    /// Returns `SqlCacheError::QueryError` carrying the driver message if preparing, binding or
    /// executing fails.
    pub fn exec(&mut self, sql: &str, params: &NamedParams) -> Result<bool, SqlCacheError> {
        if !self.select_statement(sql)? {
            return Ok(false);
        }
        self.run_last(std::slice::from_ref(params))
    }

    /// Prepare (or reuse) `sql` once, then bind and execute it for every parameter set in order.
    ///
    /// The result is `true` if at least one execution succeeded, not only when all of them
    /// did. An empty batch executes nothing and returns `false`, since nothing succeeded; this
    /// differs from PDO-style wrappers that seed the flag with `true` and report an empty batch
    /// as success, so callers wanting that should check for an empty slice first. The first
    /// execution that raises stops the batch.
    ///
    /// # Errors
    /// Returns `SqlCacheError::QueryError` carrying the driver message of the failing step.
    pub fn multi_exec(
        &mut self,
        sql: &str,
        param_sets: &[NamedParams],
    ) -> Result<bool, SqlCacheError> {
        if !self.select_statement(sql)? {
            return Ok(false);
        }
        self.run_last(param_sets)
    }

    /// Execute `sql` directly, without preparing or binding.
    ///
    /// Returns the number of rows the driver reports as affected. The last statement and the
    /// cache are left untouched.
    ///
    /// # Errors
    /// Returns `SqlCacheError::QueryError` carrying the driver message if execution fails.
    pub fn raw(&mut self, sql: &str) -> Result<i64, SqlCacheError> {
        self.last_query = Some(sql.to_string());
        self.driver.exec(sql).map_err(query_error)
    }

    /// Error descriptor of the last operation on the connection. Never fails.
    #[must_use]
    pub fn last_connection_error(&self) -> ErrorInfo {
        self.driver.error_info()
    }

    /// Error descriptor of the last operation on a statement.
    ///
    /// `None` when no statement has run yet, or when the tag is not in the cache.
    ///
    /// # Errors
    /// Returns `SqlCacheError::CacheDisabled` if a tag is given while the cache is off.
    pub fn last_statement_error(
        &self,
        tag: Option<&str>,
    ) -> Result<Option<ErrorInfo>, SqlCacheError> {
        Ok(self.statement(tag)?.map(DriverStatement::error_info))
    }

    /// Last generated identifier, optionally for a named sequence.
    ///
    /// # Errors
    /// Returns `SqlCacheError::QueryError` if the driver cannot report one.
    pub fn last_id(&mut self, sequence: Option<&str>) -> Result<String, SqlCacheError> {
        self.driver.last_insert_id(sequence).map_err(query_error)
    }

    /// Tag of the last statement executed through the cache, filing the statement under it
    /// if it is not there yet.
    ///
    /// Returns `Ok(None)` if no statement has gone through the cache since the last
    /// cache-less execution.
    ///
    /// # Errors
    /// Returns `SqlCacheError::CacheDisabled` if the cache is off.
    pub fn tag(&mut self) -> Result<Option<String>, SqlCacheError> {
        let cache = self.cache.as_mut().ok_or(SqlCacheError::CacheDisabled)?;
        let Some(tag) = self.last_tag.clone() else {
            return Ok(None);
        };
        if cache.contains_key(&tag) || !matches!(self.last, Some(LastStatement::Owned(_))) {
            return Ok(Some(tag));
        }
        if let Some(LastStatement::Owned(stmt)) = self.last.take() {
            debug!(tag = %tag, "filing last statement in the cache");
            cache.insert(tag.clone(), stmt);
            self.last = Some(LastStatement::Cached(tag.clone()));
        }
        Ok(Some(tag))
    }

    /// Rows returned or affected by the last execution. `-1` when there is no statement.
    ///
    /// # Errors
    /// Returns `SqlCacheError::CacheDisabled` if a tag is given while the cache is off.
    pub fn count(&self, tag: Option<&str>) -> Result<i64, SqlCacheError> {
        Ok(self.statement(tag)?.map_or(-1, DriverStatement::row_count))
    }

    /// The rows not yet fetched from the statement's last execution.
    ///
    /// # Errors
    /// Returns `SqlCacheError::CacheDisabled` if a tag is given while the cache is off.
    pub fn results(&mut self, tag: Option<&str>) -> Result<Vec<DbRow>, SqlCacheError> {
        Ok(self
            .statement_mut(tag)?
            .map(DriverStatement::fetch_all)
            .unwrap_or_default())
    }

    /// The next row of the statement's last execution, if any.
    ///
    /// # Errors
    /// Returns `SqlCacheError::CacheDisabled` if a tag is given while the cache is off.
    pub fn next(&mut self, tag: Option<&str>) -> Result<Option<DbRow>, SqlCacheError> {
        Ok(self.statement_mut(tag)?.and_then(DriverStatement::fetch_next))
    }

    /// Text of the last statement submitted through `exec`, `multi_exec` or `raw`.
    #[must_use]
    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    /// Make the statement for `sql` the last statement. Returns `false` on a soft failure.
    fn select_statement(&mut self, sql: &str) -> Result<bool, SqlCacheError> {
        self.last_query = Some(sql.to_string());

        let Some(cache) = self.cache.as_mut() else {
            self.last_tag = None;
            return match self.driver.prepare(sql).map_err(query_error)? {
                Some(stmt) => {
                    self.last = Some(LastStatement::Owned(stmt));
                    Ok(true)
                }
                None => {
                    self.last = None;
                    warn!(sql, "driver returned no statement handle");
                    Ok(false)
                }
            };
        };

        let tag = tag_for(sql);
        if cache.contains_key(&tag) {
            debug!(tag = %tag, "reusing cached statement");
        } else {
            match self.driver.prepare(sql).map_err(query_error)? {
                Some(stmt) => {
                    debug!(tag = %tag, "caching new statement");
                    cache.insert(tag.clone(), stmt);
                }
                None => {
                    self.last = None;
                    self.last_tag = None;
                    warn!(sql, "driver returned no statement handle");
                    return Ok(false);
                }
            }
        }
        self.last = Some(LastStatement::Cached(tag.clone()));
        self.last_tag = Some(tag);
        Ok(true)
    }

    /// Bind and execute the last statement once per parameter set, OR-ing the outcomes.
    fn run_last(&mut self, param_sets: &[NamedParams]) -> Result<bool, SqlCacheError> {
        let Self {
            driver,
            cache,
            last,
            ..
        } = self;
        let stmt = match last {
            Some(LastStatement::Owned(stmt)) => stmt,
            Some(LastStatement::Cached(tag)) => {
                match cache.as_mut().and_then(|c| c.get_mut(tag.as_str())) {
                    Some(stmt) => stmt,
                    None => return Ok(false),
                }
            }
            None => return Ok(false),
        };

        let mut succeeded = false;
        for params in param_sets {
            for param in params.to_bound() {
                stmt.bind(param);
            }
            succeeded |= driver.execute(stmt).map_err(query_error)?;
        }
        Ok(succeeded)
    }

    fn statement(&self, tag: Option<&str>) -> Result<Option<&D::Statement>, SqlCacheError> {
        match tag {
            None => Ok(match &self.last {
                Some(LastStatement::Owned(stmt)) => Some(stmt),
                Some(LastStatement::Cached(tag)) => {
                    self.cache.as_ref().and_then(|c| c.get(tag.as_str()))
                }
                None => None,
            }),
            Some(tag) => {
                let cache = self.cache.as_ref().ok_or(SqlCacheError::CacheDisabled)?;
                Ok(cache.get(tag))
            }
        }
    }

    fn statement_mut(
        &mut self,
        tag: Option<&str>,
    ) -> Result<Option<&mut D::Statement>, SqlCacheError> {
        match tag {
            None => Ok(match &mut self.last {
                Some(LastStatement::Owned(stmt)) => Some(stmt),
                Some(LastStatement::Cached(tag)) => {
                    self.cache.as_mut().and_then(|c| c.get_mut(tag.as_str()))
                }
                None => None,
            }),
            Some(tag) => {
                let cache = self.cache.as_mut().ok_or(SqlCacheError::CacheDisabled)?;
                Ok(cache.get_mut(tag))
            }
        }
    }
}

impl<D: Driver + fmt::Debug> fmt::Debug for SqlExecutor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlExecutor")
            .field("driver", &self.driver)
            .field("cached_tags", &self.cached_tags())
            .field("last_tag", &self.last_tag)
            .field("last_query", &self.last_query)
            .finish_non_exhaustive()
    }
}

fn query_error(err: DriverError) -> SqlCacheError {
    warn!(sqlstate = %err.info.sqlstate, error = %err.message, "driver call failed");
    SqlCacheError::from(err)
}
