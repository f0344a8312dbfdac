use thiserror::Error;

use crate::types::ErrorInfo;

/// Errors raised by [`SqlExecutor`](crate::SqlExecutor).
///
/// Every variant that originates in the database carries the driver's message unmodified, so
/// the text can be matched against [`ErrorInfo::message`] from the error accessors.
#[derive(Debug, Error)]
pub enum SqlCacheError {
    /// The session could not be established. Fatal to the executor being built.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The driver failed while preparing, binding or executing a statement.
    #[error("Query error: {0}")]
    QueryError(String),

    /// A tag-based operation was used while the statement cache is off.
    #[error("You have to enable cache before tagging a query.")]
    CacheDisabled,

    /// The connection options could not be interpreted.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SqlCacheError {
    /// The driver message carried by this error, if any.
    #[must_use]
    pub fn driver_message(&self) -> Option<&str> {
        match self {
            SqlCacheError::ConnectionError(msg) | SqlCacheError::QueryError(msg) => Some(msg),
            SqlCacheError::CacheDisabled | SqlCacheError::ConfigError(_) => None,
        }
    }
}

/// Failure reported by a [`Driver`](crate::driver::Driver) implementation.
///
/// `info` is the descriptor the driver also records as its "last error"; `message` is the text
/// surfaced to callers through [`SqlCacheError::QueryError`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DriverError {
    pub info: ErrorInfo,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl DriverError {
    /// Build an error that has no native driver error behind it.
    #[must_use]
    pub fn new(sqlstate: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            info: ErrorInfo::new(sqlstate, None, Some(message.clone())),
            message,
            source: None,
        }
    }

    /// Parameter name used in a bind that the statement does not declare.
    #[must_use]
    pub fn undefined_parameter(name: &str) -> Self {
        Self::new(
            "HY093",
            format!("SQLSTATE[HY093]: Invalid parameter number: parameter {name} was not defined"),
        )
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for DriverError {
    fn from(err: rusqlite::Error) -> Self {
        let message = err.to_string();
        let code = err.sqlite_error().map(|e| i64::from(e.extended_code));
        Self {
            info: ErrorInfo::new("HY000", code, Some(message.clone())),
            message,
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for DriverError {
    fn from(err: tokio_postgres::Error) -> Self {
        // tokio-postgres keeps the server text in the source chain; surface it directly.
        let (info, message) = if let Some(db) = err.as_db_error() {
            let sqlstate = db.code().code().to_string();
            let message = format!(
                "SQLSTATE[{sqlstate}]: {}: {}",
                db.severity(),
                db.message()
            );
            (
                ErrorInfo::new(&sqlstate, None, Some(db.message().to_string())),
                message,
            )
        } else {
            let sqlstate = if err.is_closed() { "08006" } else { "HY000" };
            let message = with_causes(&err);
            (ErrorInfo::new(sqlstate, None, Some(message.clone())), message)
        };
        Self {
            info,
            message,
            source: Some(Box::new(err)),
        }
    }
}

/// `err` followed by every cause in its source chain that its own text does not already show.
#[must_use]
pub fn with_causes(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        cause = inner.source();
    }
    message
}

impl From<DriverError> for SqlCacheError {
    fn from(err: DriverError) -> Self {
        SqlCacheError::QueryError(err.message)
    }
}
