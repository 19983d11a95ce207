//! Bounded retry with a constant delay between attempts

use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (the first call is not a retry)
    pub max_retries: u32,
    /// Pause between two attempts
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::fixed(3, Duration::from_millis(100))
    }
}

impl RetryConfig {
    /// Fixed number of total attempts with a constant delay between them.
    ///
    /// Used for startup connectivity (database, broker) where the process gives up
    /// after the last attempt.
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_retries: attempts.saturating_sub(1),
            delay,
        }
    }

    /// Total number of calls made before giving up
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last_error, .. } => last_error,
        }
    }
}

/// Execute a future with retry logic
pub async fn with_retry<F, Fut, T, E>(config: RetryConfig, mut f: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries {
                    warn!(
                        attempts = attempt,
                        error = %e,
                        "Max retries ({}) reached",
                        config.max_retries
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }

                warn!(
                    error = %e,
                    "Retry attempt {}/{}, waiting {:?}",
                    attempt, config.max_retries, config.delay
                );

                tokio::time::sleep(config.delay).await;
            }
        }
    }
}
