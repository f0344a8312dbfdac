use std::time::Duration;

use tokio_postgres::Config as PgConfig;

use crate::config::{ConnectOptions, Dsn};
use crate::error::SqlCacheError;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;

fn config_error(msg: impl Into<String>) -> SqlCacheError {
    SqlCacheError::ConfigError(msg.into())
}

/// Build a `tokio_postgres::Config` from connection options.
///
/// PDO-style `key=value` DSNs default to `localhost:5432`. A non-empty user or password passed
/// alongside the DSN overrides the one inside it.
///
/// # Errors
/// Returns `SqlCacheError::ConfigError` for non-Postgres DSNs, unknown keys or malformed values.
pub fn pg_config(opts: &ConnectOptions) -> Result<PgConfig, SqlCacheError> {
    let mut cfg = match &opts.dsn {
        Dsn::PostgresUrl(url) => url
            .parse::<PgConfig>()
            .map_err(|e| config_error(format!("invalid postgres URL: {e}")))?,
        Dsn::PostgresPairs(pairs) => {
            let mut cfg = PgConfig::new();
            for (key, value) in pairs {
                apply_pair(&mut cfg, key, value)?;
            }
            if cfg.get_hosts().is_empty() {
                cfg.host(DEFAULT_HOST);
            }
            if cfg.get_ports().is_empty() {
                cfg.port(DEFAULT_PORT);
            }
            cfg
        }
        Dsn::Sqlite(_) => return Err(config_error("PgDriver needs a pgsql: DSN")),
    };

    if !opts.user.is_empty() {
        cfg.user(opts.user.as_str());
    }
    if !opts.password.is_empty() {
        cfg.password(opts.password.as_str());
    }
    Ok(cfg)
}

fn apply_pair(cfg: &mut PgConfig, key: &str, value: &str) -> Result<(), SqlCacheError> {
    match key {
        "host" => {
            cfg.host(value);
        }
        "port" => {
            let port = value
                .parse::<u16>()
                .map_err(|e| config_error(format!("invalid port '{value}': {e}")))?;
            cfg.port(port);
        }
        "dbname" => {
            cfg.dbname(value);
        }
        "user" => {
            cfg.user(value);
        }
        "password" => {
            cfg.password(value);
        }
        "application_name" => {
            cfg.application_name(value);
        }
        "connect_timeout" => {
            let secs = value
                .parse::<u64>()
                .map_err(|e| config_error(format!("invalid connect_timeout '{value}': {e}")))?;
            cfg.connect_timeout(Duration::from_secs(secs));
        }
        other => return Err(config_error(format!("unsupported DSN key '{other}'"))),
    }
    Ok(())
}
