// SQLite backend built on rusqlite.
//
// - driver: session handling, transactions and the raw execution path
// - params: conversion of bound parameters into rusqlite values
// - query: running a prepared statement and buffering its rows

mod driver;
pub mod params;
pub mod query;

pub use driver::{SqliteDriver, SqliteStatement};
