//! Database connection management.
//!
//! One pool per process, created on first use. Concurrent first callers share
//! a single in-flight initialization instead of each opening their own pool.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

use crate::{Error, Result};

static POOL: OnceCell<PgPool> = OnceCell::const_new();

/// Connection settings for the process-wide pool.
#[derive(Debug, Clone)]
pub struct DbSettings {
    pub database_url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

impl From<&crate::Config> for DbSettings {
    fn from(config: &crate::Config) -> Self {
        Self {
            database_url: config.database_url.clone(),
            max_connections: config.database_max_connections,
            run_migrations: config.run_migrations,
        }
    }
}

/// Get the process-wide pool, connecting on the first call.
pub async fn pool(settings: &DbSettings) -> Result<&'static PgPool> {
    POOL.get_or_try_init(|| create_pool(settings)).await
}

/// Create a database connection pool.
pub async fn create_pool(settings: &DbSettings) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&settings.database_url)
        .await
        .map_err(Error::Database)?;

    if settings.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| Error::Database(e.into()))?;
        info!("Database migrations applied");
    }

    info!("Connected to database");
    Ok(pool)
}
