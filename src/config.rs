use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;

use crate::error::SqlCacheError;
use crate::tag::md5_hex;

/// The database type behind a DSN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
pub enum DatabaseType {
    /// `SQLite` database (`sqlite:<path>`)
    Sqlite,
    /// `PostgreSQL` database (`pgsql:key=value;...` or `postgres://...`)
    Postgres,
}

/// A parsed data source name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dsn {
    /// Path to the database file, or `:memory:`.
    Sqlite(String),
    /// `key=value` pairs from a PDO-style DSN.
    PostgresPairs(Vec<(String, String)>),
    /// A `postgres://` / `postgresql://` connection URL.
    PostgresUrl(String),
}

impl Dsn {
    /// Parse a driver-specific connection string.
    ///
    /// # Errors
    /// Returns `SqlCacheError::ConfigError` if the prefix is unknown or the DSN is empty.
    pub fn parse(dsn: &str) -> Result<Self, SqlCacheError> {
        let dsn = dsn.trim();
        if let Some(path) = dsn.strip_prefix("sqlite:") {
            if path.is_empty() {
                return Err(SqlCacheError::ConfigError(
                    "sqlite DSN needs a path or :memory:".into(),
                ));
            }
            return Ok(Dsn::Sqlite(path.to_string()));
        }
        if dsn.starts_with("postgres://") || dsn.starts_with("postgresql://") {
            return Ok(Dsn::PostgresUrl(dsn.to_string()));
        }
        if let Some(rest) = dsn
            .strip_prefix("pgsql:")
            .or_else(|| dsn.strip_prefix("postgres:"))
        {
            let mut pairs = Vec::new();
            for part in rest.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                let (key, value) = part.split_once('=').ok_or_else(|| {
                    SqlCacheError::ConfigError(format!("malformed DSN segment '{part}'"))
                })?;
                pairs.push((key.trim().to_string(), value.trim().to_string()));
            }
            return Ok(Dsn::PostgresPairs(pairs));
        }
        Err(SqlCacheError::ConfigError(format!(
            "unsupported DSN '{dsn}' (expected sqlite:, pgsql: or postgres://)"
        )))
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        match self {
            Dsn::Sqlite(_) => DatabaseType::Sqlite,
            Dsn::PostgresPairs(_) | Dsn::PostgresUrl(_) => DatabaseType::Postgres,
        }
    }
}

/// Options for opening an executor.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub dsn: Dsn,
    /// Raw DSN text, used to key persistent connections.
    pub dsn_text: String,
    pub user: String,
    pub password: String,
    /// Ask the driver for a persistent connection that outlives the executor.
    pub persistent: bool,
    pub busy_timeout: Option<Duration>,
}

impl ConnectOptions {
    /// # Errors
    /// Returns `SqlCacheError::ConfigError` if the DSN cannot be parsed.
    pub fn new(dsn: &str, user: &str, password: &str) -> Result<Self, SqlCacheError> {
        Ok(Self {
            dsn: Dsn::parse(dsn)?,
            dsn_text: dsn.trim().to_string(),
            user: user.to_string(),
            password: password.to_string(),
            persistent: false,
            busy_timeout: None,
        })
    }

    #[must_use]
    pub fn builder(dsn: &str) -> ConnectOptionsBuilder {
        ConnectOptionsBuilder::new(dsn)
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.dsn.database_type()
    }

    /// Key under which a persistent connection for these options is kept.
    ///
    /// The password takes part as an MD5 digest, so a session authenticated with one password
    /// is never handed to a caller presenting another.
    #[must_use]
    pub fn persistent_key(&self) -> String {
        format!(
            "{}\u{1f}{}\u{1f}{}",
            self.dsn_text,
            self.user,
            md5_hex(self.password.as_bytes())
        )
    }
}

/// Fluent builder for [`ConnectOptions`].
#[derive(Debug, Clone)]
pub struct ConnectOptionsBuilder {
    dsn: String,
    user: String,
    password: String,
    persistent: bool,
    busy_timeout: Option<Duration>,
}

impl ConnectOptionsBuilder {
    #[must_use]
    pub fn new(dsn: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            user: String::new(),
            password: String::new(),
            persistent: false,
            busy_timeout: None,
        }
    }

    #[must_use]
    pub fn user(mut self, user: &str) -> Self {
        self.user = user.to_string();
        self
    }

    #[must_use]
    pub fn password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    #[must_use]
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// `SQLite` only: how long to wait on a locked database.
    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    /// # Errors
    /// Returns `SqlCacheError::ConfigError` if the DSN cannot be parsed.
    pub fn finish(self) -> Result<ConnectOptions, SqlCacheError> {
        let mut opts = ConnectOptions::new(&self.dsn, &self.user, &self.password)?;
        opts.persistent = self.persistent;
        opts.busy_timeout = self.busy_timeout;
        Ok(opts)
    }
}
