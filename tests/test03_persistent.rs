#![cfg(feature = "sqlite")]

use sql_statement_cache::prelude::*;

// SQLite ignores credentials, so a distinct user gives each test its own persistent key.
fn persistent(user: &str) -> Result<SqlExecutor, SqlCacheError> {
    SqlExecutor::connect("sqlite::memory:", user, "", true)
}

#[test]
fn released_connection_is_reused() -> Result<(), SqlCacheError> {
    let mut db = persistent("reuse")?;
    db.raw("CREATE TABLE kept (v TEXT)")?;
    db.raw("INSERT INTO kept (v) VALUES ('still here')")?;
    drop(db);

    let mut db = persistent("reuse")?;
    db.exec("SELECT v FROM kept", &NamedParams::new())?;
    assert_eq!(db.count(None)?, 1);
    Ok(())
}

#[test]
fn open_transaction_is_rolled_back_on_release() -> Result<(), SqlCacheError> {
    let mut db = persistent("rollback")?;
    db.raw("CREATE TABLE r (v TEXT)")?;
    assert!(db.transaction_begin()?);
    db.exec("INSERT INTO r (v) VALUES (:v)", &NamedParams::new().with("v", "lost"))?;
    drop(db);

    let mut db = persistent("rollback")?;
    assert!(!db.transaction_active());
    db.exec("SELECT v FROM r", &NamedParams::new())?;
    assert_eq!(db.count(None)?, 0);
    Ok(())
}

#[test]
fn connection_in_use_is_not_shared() -> Result<(), SqlCacheError> {
    let mut first = persistent("busy")?;
    first.raw("CREATE TABLE only_first (v TEXT)")?;

    let mut second = persistent("busy")?;
    assert!(matches!(
        second.raw("SELECT * FROM only_first"),
        Err(SqlCacheError::QueryError(_))
    ));
    Ok(())
}

#[test]
fn non_persistent_connections_are_private() -> Result<(), SqlCacheError> {
    let mut db = SqlExecutor::connect("sqlite::memory:", "private", "", false)?;
    db.raw("CREATE TABLE gone (v TEXT)")?;
    drop(db);

    let mut db = SqlExecutor::connect("sqlite::memory:", "private", "", false)?;
    assert!(db.raw("SELECT * FROM gone").is_err());
    Ok(())
}
