//! Postgres connection pool construction.

use notify_core::config::DatabaseConfig;
use notify_core::error::{Error, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Build a connection pool from config and verify it with a trivial query.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_open_conns)
        .min_connections(config.max_idle_conns)
        .acquire_timeout(config.connect_timeout())
        .connect(&config.url)
        .await
        .map_err(|e| Error::database_with_source("failed to connect to postgres", e))?;

    health_check(&pool).await?;
    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| Error::database_with_source("health check failed", e))?;
    Ok(())
}
