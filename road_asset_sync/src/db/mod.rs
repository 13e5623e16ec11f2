//! Destination database plumbing: the connection pool and embedded
//! migrations.
//!
//! - [`pool::build_pool`] creates a deadpool of `AsyncPgConnection`s; the
//!   store checks out one connection per transaction.
//! - [`migrate::run_pending`] applies the bundled schema to a local or test
//!   database. Production schemas are managed elsewhere.

pub mod migrate;
pub mod pool;
