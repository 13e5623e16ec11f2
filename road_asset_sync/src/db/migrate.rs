//! Embedded schema migrations.

use anyhow::{Context, anyhow};
use diesel::Connection;
use diesel_async::{AsyncPgConnection, async_connection_wrapper::AsyncConnectionWrapper};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

/// Migrations bundled with this crate.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Applies all pending migrations and returns the versions that ran.
///
/// The migration harness is synchronous, so it runs on the blocking pool
/// over a wrapped async connection.
pub async fn run_pending(database_url: SecretString) -> anyhow::Result<Vec<String>> {
    let applied = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<String>> {
        let mut conn =
            AsyncConnectionWrapper::<AsyncPgConnection>::establish(database_url.expose_secret())
                .context("connecting to the destination database")?;
        let versions = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow!(e))?;
        Ok(versions.iter().map(ToString::to_string).collect())
    })
    .await
    .context("migration task panicked")??;

    info!(count = applied.len(), versions = ?applied, "migrations applied");
    Ok(applied)
}
