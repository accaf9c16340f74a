//! SQLite pool construction and migration bootstrap.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::MonitorResult;

/// Open (creating if absent) the SQLite file at `db_path`, enable foreign
/// key enforcement on every connection, and run pending migrations.
///
/// `db_path` may be `:memory:` for tests, in which case a single-connection
/// pool is used so the in-memory database isn't dropped between queries.
pub async fn init_pool(db_path: &str) -> MonitorResult<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);

    let max_connections = if db_path == ":memory:" { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|err| {
        crate::error::MonitorError::configuration(format!("failed to run migrations: {err}"))
    })?;

    Ok(pool)
}
