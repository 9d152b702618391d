use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use riskwatch_common::retry::{retry_async, RetryConfig};

/// Connects with a few spaced attempts so the service tolerates a database
/// that is still starting.
pub async fn create_pool(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let retry = RetryConfig {
        max_attempts: 5,
        initial_delay: Duration::from_millis(500),
        backoff_factor: 2.0,
    };
    let pool = retry_async(&retry, || {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
    })
    .await?;
    tracing::info!(max_connections, "database pool ready");
    Ok(pool)
}
