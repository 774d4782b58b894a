//! Session database connection.
//!
//! The storefront keeps no domain data of its own. `PostgreSQL` only holds
//! the `tower_sessions` table, created by the session store on startup.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Session reads and writes are small; a handful of connections is plenty.
const MAX_CONNECTIONS: u32 = 5;

/// Create the session database pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url.expose_secret())
        .await
}
