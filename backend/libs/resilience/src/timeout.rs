//! Time limits for single external calls

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, thiserror::Error)]
pub enum TimeoutError<E> {
    #[error("operation timed out after {0:?}")]
    Elapsed(Duration),
    #[error(transparent)]
    Failed(E),
}

/// Execute a fallible future with timeout, keeping the original error type
pub async fn with_timeout_result<F, T, E>(duration: Duration, future: F) -> Result<T, TimeoutError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match timeout(duration, future).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(TimeoutError::Failed(e)),
        Err(_) => Err(TimeoutError::Elapsed(duration)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_elapsed() {
        let result = with_timeout_result(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, String>(42)
        })
        .await;

        assert!(matches!(result, Err(TimeoutError::Elapsed(_))));
    }

    #[tokio::test]
    async fn test_timeout_result_keeps_error() {
        let result = with_timeout_result(Duration::from_secs(1), async {
            Err::<i32, _>("constraint violated")
        })
        .await;

        match result {
            Err(TimeoutError::Failed(e)) => assert_eq!(e, "constraint violated"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_result_success() {
        let result =
            with_timeout_result(Duration::from_secs(1), async { Ok::<_, String>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
