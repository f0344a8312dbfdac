#![cfg(feature = "postgres")]

// These run against a live server named by SQLCACHE_TEST_PG_DSN, e.g.
// `pgsql:host=localhost;port=5432;dbname=testing;user=postgres`, and pass trivially without it.
// The persistent password check also needs SQLCACHE_TEST_PG_USER and SQLCACHE_TEST_PG_PASSWORD
// for a role the server authenticates by password.

use sql_statement_cache::prelude::*;

fn pg_dsn() -> Option<String> {
    std::env::var("SQLCACHE_TEST_PG_DSN").ok().filter(|dsn| !dsn.trim().is_empty())
}

/// Executor with a fresh `t_<suffix>` table, or `None` when no server is configured.
fn open(suffix: &str) -> Result<Option<(SqlExecutor, String)>, SqlCacheError> {
    let Some(dsn) = pg_dsn() else {
        return Ok(None);
    };
    let mut db = SqlExecutor::connect(&dsn, "", "", false)?;
    let table = format!("t_{suffix}");
    db.raw(&format!("DROP TABLE IF EXISTS \"{table}\" CASCADE"))?;
    db.raw(&format!(
        "CREATE TABLE \"{table}\" (\"id\" serial primary key, \"str_field\" text, \"bool_field\" boolean, \"int_field\" integer)"
    ))?;
    Ok(Some((db, table)))
}

#[test]
fn unreachable_server_is_a_connection_error() {
    if pg_dsn().is_none() {
        return;
    }
    let err = SqlExecutor::connect(
        "pgsql:host=127.0.0.1;port=1;dbname=testing;connect_timeout=2",
        "postgres",
        "",
        false,
    )
    .unwrap_err();
    assert!(matches!(err, SqlCacheError::ConnectionError(_)));
}

#[test]
fn param_bind_round_trip() -> Result<(), SqlCacheError> {
    let Some((mut db, table)) = open("bind")? else {
        return Ok(());
    };
    let params = NamedParams::new()
        .with("str_field", RowValues::Null)
        .with("int_field", 10)
        .with("bool_field", true);
    db.exec(
        &format!(
            "INSERT INTO \"{table}\" (\"str_field\", \"int_field\", \"bool_field\") VALUES (:str_field, :int_field, :bool_field)"
        ),
        &params,
    )?;
    db.exec(
        &format!("SELECT \"str_field\", \"int_field\", \"bool_field\" FROM \"{table}\""),
        &NamedParams::new(),
    )?;
    let row = db.next(None)?.expect("one row");
    let expected: Vec<(&str, &RowValues)> = params.iter().collect();
    assert_eq!(row.to_pairs().collect::<Vec<_>>(), expected);
    db.raw(&format!("DROP TABLE \"{table}\" CASCADE"))?;
    Ok(())
}

#[test]
fn multi_exec_cache_and_last_id() -> Result<(), SqlCacheError> {
    let Some((mut db, table)) = open("cache")? else {
        return Ok(());
    };
    db.cache_enable();
    let insert = format!("INSERT INTO \"{table}\" (\"str_field\") VALUES (:str_field)");
    let sets = ["value1", "value2", "value3"].map(|v| NamedParams::new().with("str_field", v));
    assert!(db.multi_exec(&insert, &sets)?);
    assert_eq!(db.last_id(Some(format!("{table}_id_seq").as_str()))?, "3");

    db.exec(
        &format!("SELECT \"str_field\" FROM \"{table}\" ORDER BY \"id\" ASC"),
        &NamedParams::new(),
    )?;
    let tag = db.tag()?.expect("cached");
    assert_eq!(db.count(Some(tag.as_str()))?, 3);
    assert_eq!(
        db.next(Some(tag.as_str()))?,
        Some(DbRow::from_pairs([("str_field", "value1")]))
    );
    assert_eq!(db.results(Some(tag.as_str()))?.len(), 2);
    assert_eq!(db.count(Some("tag"))?, -1);
    db.raw(&format!("DROP TABLE \"{table}\" CASCADE"))?;
    Ok(())
}

#[test]
fn transactions_and_errors() -> Result<(), SqlCacheError> {
    let Some((mut db, table)) = open("tx")? else {
        return Ok(());
    };
    let insert = format!("INSERT INTO \"{table}\" (\"str_field\") VALUES (:str_field)");
    assert!(db.transaction_begin()?);
    assert!(!db.transaction_begin()?);
    db.exec(&insert, &NamedParams::new().with("str_field", "value"))?;
    assert!(db.transaction_rollback()?);
    assert!(!db.transaction_rollback()?);
    db.exec(&format!("SELECT * FROM \"{table}\""), &NamedParams::new())?;
    assert_eq!(db.count(None)?, 0);

    let err = db.exec("bad sql", &NamedParams::new()).unwrap_err();
    let conn = db.last_connection_error();
    let stmt = db.last_statement_error(None)?.expect("statement ran");
    assert_eq!(conn.sqlstate, "42601");
    assert!(err.to_string().ends_with(conn.message.as_deref().unwrap_or("<none>")));
    assert!(err.to_string().ends_with(stmt.message.as_deref().unwrap_or("<none>")));
    db.raw(&format!("DROP TABLE \"{table}\" CASCADE"))?;
    Ok(())
}

#[test]
fn numeric_looking_text_round_trips_unchanged() -> Result<(), SqlCacheError> {
    let Some((mut db, table)) = open("numtext")? else {
        return Ok(());
    };
    let insert = format!(
        "INSERT INTO \"{table}\" (\"str_field\", \"int_field\") VALUES (:str_field, :int_field)"
    );
    let sets = ["007", "1.50"]
        .map(|v| NamedParams::new().with("str_field", v).with("int_field", "007"));
    assert!(db.multi_exec(&insert, &sets)?);

    db.exec(
        &format!("SELECT \"str_field\", \"int_field\" FROM \"{table}\" ORDER BY \"id\""),
        &NamedParams::new(),
    )?;
    let rows = db.results(None)?;
    let texts: Vec<_> = rows.iter().filter_map(|r| r.get("str_field").cloned()).collect();
    assert_eq!(texts, [RowValues::Text("007".into()), RowValues::Text("1.50".into())]);
    assert!(rows.iter().all(|r| r.get("int_field") == Some(&RowValues::Int(7))));
    db.raw(&format!("DROP TABLE \"{table}\" CASCADE"))?;
    Ok(())
}

#[test]
fn wider_column_types_read_and_bind() -> Result<(), SqlCacheError> {
    let Some((mut db, table)) = open("types")? else {
        return Ok(());
    };
    db.exec("SELECT 1.5 AS x", &NamedParams::new())?;
    let row = db.next(None)?.expect("one row");
    assert_eq!(row.get("x"), Some(&RowValues::Text("1.5".into())));

    let typed = format!("{table}_typed");
    db.raw(&format!(
        "CREATE TABLE \"{typed}\" (\"amount\" numeric, \"ref\" uuid, \"span\" interval, \"at\" time, \"tags\" int4[])"
    ))?;
    let id = "0b7f3f2e-9c1a-4e0b-8a55-2f6d1c1e4a10";
    db.exec(
        &format!(
            "INSERT INTO \"{typed}\" (\"amount\", \"ref\", \"span\", \"at\", \"tags\") VALUES (:amount, :ref, '1 day 02:00', '04:05:06', ARRAY[1, 2])"
        ),
        &NamedParams::new().with("amount", 10).with("ref", id),
    )?;
    db.exec(
        &format!("SELECT \"amount\", \"ref\", \"span\", \"at\", \"tags\" FROM \"{typed}\""),
        &NamedParams::new(),
    )?;
    let row = db.next(None)?.expect("one row");
    assert_eq!(row.get("amount"), Some(&RowValues::Text("10".into())));
    assert_eq!(row.get("ref"), Some(&RowValues::Text(id.into())));
    assert_eq!(row.get("span"), Some(&RowValues::Text("1 day 02:00:00".into())));
    assert_eq!(row.get("at"), Some(&RowValues::Text("04:05:06".into())));
    assert_eq!(row.get("tags"), Some(&RowValues::JSON(serde_json::json!([1, 2]))));
    db.raw(&format!("DROP TABLE \"{typed}\", \"{table}\" CASCADE"))?;
    Ok(())
}

#[test]
fn persistent_connect_checks_the_password() -> Result<(), SqlCacheError> {
    let (Some(dsn), Ok(user), Ok(password)) = (
        pg_dsn(),
        std::env::var("SQLCACHE_TEST_PG_USER"),
        std::env::var("SQLCACHE_TEST_PG_PASSWORD"),
    ) else {
        return Ok(());
    };
    let db = SqlExecutor::connect(&dsn, &user, &password, true)?;
    drop(db);

    let wrong = format!("{password}-wrong");
    let err = SqlExecutor::connect(&dsn, &user, &wrong, true).unwrap_err();
    assert!(matches!(err, SqlCacheError::ConnectionError(_)));

    let db = SqlExecutor::connect(&dsn, &user, &password, true)?;
    drop(db);
    Ok(())
}

#[test]
fn connecting_inside_an_async_runtime_is_refused() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let result = runtime.block_on(async {
        SqlExecutor::connect("pgsql:host=127.0.0.1;port=1;dbname=testing", "postgres", "", false)
    });
    let err = result.unwrap_err();
    assert!(matches!(err, SqlCacheError::ConnectionError(_)));
    assert!(err.to_string().contains("async runtime"));
}
