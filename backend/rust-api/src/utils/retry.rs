use rand::Rng;
use std::cmp;
use std::future::Future;
use std::time::Duration;

/// Backoff schedule for transient storage failures.
#[derive(Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
            jitter_max: Some(Duration::from_millis(50)),
        }
    }
}

impl RetryConfig {
    /// More attempts with longer waits, for writes that may race an index
    /// build or a primary step-down.
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 7,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(1000),
            jitter_max: Some(Duration::from_millis(100)),
        }
    }

    fn delay_for(&self, backoff: Duration) -> Duration {
        match self.jitter_max {
            Some(jitter_max) if !jitter_max.is_zero() => {
                let extra = rand::rng().random_range(0..=jitter_max.as_millis() as u64);
                backoff + Duration::from_millis(extra)
            }
            _ => backoff,
        }
    }
}

/// Exponential backoff with optional jitter. Used around store reads and
/// idempotent inserts; never around writes that must not repeat.
pub async fn retry_async_with_config<F, Fut, T, E>(config: RetryConfig, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut backoff = config.base_backoff;

    for attempt in 1.. {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= config.max_attempts => return Err(err),
            Err(_) => {
                tokio::time::sleep(config.delay_for(backoff)).await;
                backoff = cmp::min(backoff * 2, config.max_backoff);
            }
        }
    }
    unreachable!("retry loop exits via return")
}
