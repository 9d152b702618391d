use std::future::Future;
use std::time::Duration;

pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
        }
    }
}

/// Runs `f` until it succeeds or `max_attempts` is reached, sleeping between
/// attempts. Used for startup work such as connecting to the database.
pub async fn retry_async<F, Fut, T, E>(config: &RetryConfig, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt >= max_attempts => return Err(e),
            Err(e) => {
                tracing::warn!(attempt, max_attempts, error = %e, "attempt failed, retrying");
                tokio::time::sleep(delay).await;
                delay = Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_factor);
                attempt += 1;
            }
        }
    }
}

/// `base * 2^(attempt - 1)`, capped at `ceiling`. Attempt numbering starts at 1.
pub fn exponential_delay(base: Duration, attempt: u32, ceiling: Duration) -> Duration {
    let exp = attempt.saturating_sub(1).min(31);
    base.checked_mul(1u32 << exp)
        .map_or(ceiling, |d| d.min(ceiling))
}
