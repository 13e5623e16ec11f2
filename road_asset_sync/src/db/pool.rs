use diesel_async::{
    AsyncPgConnection,
    pooled_connection::{AsyncDieselConnectionManager, deadpool::Pool},
};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::config::ConfigError;

use crate::error::SyncError;

/// Pool of async Postgres connections.
pub type PgPool = Pool<AsyncPgConnection>;

/// Builds a pool of at most `max_size` connections. Connections are opened
/// lazily on first checkout.
pub fn build_pool(database_url: &SecretString, max_size: usize) -> Result<PgPool, SyncError> {
    let manager =
        AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url.expose_secret());
    Pool::builder(manager)
        .max_size(max_size.max(1))
        .build()
        .map_err(|e| ConfigError::invalid("database.pool_size", e.to_string()).into())
}
