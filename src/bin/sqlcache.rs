use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use serde_json::Value as JsonValue;
use sql_statement_cache::prelude::*;
use tracing::Level;

#[derive(Parser, Debug, Serialize)]
#[command(author, version, about = "Run statements through a caching SQL executor")]
struct Args {
    /// `sqlite:<path>`, `sqlite::memory:`, `pgsql:host=..;dbname=..` or `postgres://...`
    #[arg(long, env = "SQLCACHE_DSN")]
    dsn: String,
    #[arg(long, env = "SQLCACHE_USER", default_value = "")]
    user: String,
    #[serde(skip)]
    #[arg(long, env = "SQLCACHE_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,
    /// Reuse a persistent connection for this DSN and user.
    #[arg(long)]
    persistent: bool,
    /// Enable the statement cache and report each statement's tag.
    #[arg(long)]
    cache: bool,
    /// Run the statements through the raw path instead of preparing them.
    #[arg(long, conflicts_with = "param")]
    raw: bool,
    /// Named parameter bound to every statement, as `name=value`.
    #[arg(long = "param", value_parser = parse_param)]
    param: Vec<(String, String)>,
    #[arg(short, long)]
    verbose: bool,
    /// Statements to run, in order.
    #[arg(required = true)]
    statements: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Outcome {
    sql: String,
    ok: bool,
    count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
    rows: Vec<JsonValue>,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))
}

fn param_value(value: &str) -> RowValues {
    match value {
        "null" | "NULL" => RowValues::Null,
        "true" => RowValues::Bool(true),
        "false" => RowValues::Bool(false),
        other => RowValues::Text(other.to_string()),
    }
}

fn run_statement(
    db: &mut SqlExecutor,
    args: &Args,
    params: &NamedParams,
    sql: &str,
) -> Result<Outcome, SqlCacheError> {
    if args.raw {
        let count = db.raw(sql)?;
        return Ok(Outcome {
            sql: sql.to_string(),
            ok: true,
            count,
            tag: None,
            rows: Vec::new(),
        });
    }
    let ok = db.exec(sql, params)?;
    let tag = if args.cache { db.tag()? } else { None };
    Ok(Outcome {
        sql: sql.to_string(),
        ok,
        count: db.count(None)?,
        tag,
        rows: db.results(None)?.iter().map(DbRow::to_json).collect(),
    })
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::WARN
        })
        .init();

    let config_json = serde_json::to_string(&args).unwrap_or_else(|_| "{}".to_string());
    tracing::debug!("config: {}", config_json);

    let mut db = match SqlExecutor::connect(&args.dsn, &args.user, &args.password, args.persistent)
    {
        Ok(db) => db,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    if args.cache {
        db.cache_enable();
    }

    let params: NamedParams = args
        .param
        .iter()
        .map(|(name, value)| (name.as_str(), param_value(value)))
        .collect();

    for sql in &args.statements {
        match run_statement(&mut db, &args, &params, sql) {
            Ok(outcome) => match serde_json::to_string(&outcome) {
                Ok(line) => println!("{line}"),
                Err(err) => {
                    eprintln!("failed to render result: {err}");
                    return ExitCode::FAILURE;
                }
            },
            Err(err) => {
                eprintln!("{err}");
                if let Some(info) = db.last_statement_error(None).ok().flatten() {
                    eprintln!("statement error: {info:?}");
                }
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}
