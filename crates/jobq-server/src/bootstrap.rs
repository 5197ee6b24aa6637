//! Connection pool construction with retry, and schema migration.
//!
//! Mirrors the original system's `connect_with_retry`: a handful of attempts
//! with a fixed delay between them, so a server or worker started in lockstep
//! with the database container doesn't die on the first connection refusal.

use std::time::Duration;

use jobq_postgres::PgJobStore;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

const CONNECT_RETRIES: u32 = 5;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Connect to Postgres, retrying on failure, then return the pool.
pub async fn connect_with_retry(db_url: &str) -> anyhow::Result<PgPool> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match PgPoolOptions::new()
            .max_connections(5)
            .test_before_acquire(true)
            .connect(db_url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(error) if attempt < CONNECT_RETRIES => {
                tracing::warn!(attempt, %error, "database connection attempt failed, retrying");
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
            Err(error) => return Err(error.into()),
        }
    }
}

/// Connect and run pending migrations, returning a ready-to-use store.
pub async fn bootstrap_store(db_url: &str) -> anyhow::Result<PgJobStore> {
    let pool = connect_with_retry(db_url).await?;
    let store = PgJobStore::new(pool);
    store.migrate().await?;
    tracing::info!("database connected and migrations applied");
    Ok(store)
}
