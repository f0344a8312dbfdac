// PostgreSQL backend built on tokio-postgres, driven from a private current-thread runtime.
//
// - config: DSN to `tokio_postgres::Config`
// - driver: session handling, transactions and the raw execution path
// - params: encoding bound values against server-inferred parameter types
// - query: decoding rows into `RowValues`

pub mod config;
mod driver;
pub mod params;
pub mod query;

pub use driver::{PgDriver, PgStatement};
