pub mod audit;
pub mod management;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use trailsync_common::error::{TrailsyncError, TrailsyncResult};

/// Create a Postgres connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> TrailsyncResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| TrailsyncError::Database(e.to_string()))
}
