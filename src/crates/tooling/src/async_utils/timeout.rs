//! Timeout wrapper for async operations

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout as tokio_timeout;

/// Execute a fallible async operation with a deadline
///
/// ```rust,ignore
/// match with_timeout(Duration::from_secs(30), model.chat(request)).await {
///     Ok(response) => { /* ... */ }
///     Err(TimeoutError::Timeout(after)) => { /* deadline hit */ }
///     Err(TimeoutError::OperationFailed(e)) => { /* inner error */ }
/// }
/// ```
pub async fn with_timeout<F, T, E>(duration: Duration, operation: F) -> Result<T, TimeoutError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio_timeout(duration, operation).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(error)) => Err(TimeoutError::OperationFailed(error)),
        Err(_elapsed) => Err(TimeoutError::Timeout(duration)),
    }
}

/// Error type for timeout operations
#[derive(Debug)]
pub enum TimeoutError<E> {
    /// Operation completed but failed
    OperationFailed(E),
    /// Operation timed out
    Timeout(Duration),
}

impl<E> TimeoutError<E> {
    /// Collapse into the inner error type, mapping a timeout with `on_timeout`
    pub fn into_inner_or(self, on_timeout: impl FnOnce(Duration) -> E) -> E {
        match self {
            TimeoutError::OperationFailed(error) => error,
            TimeoutError::Timeout(after) => on_timeout(after),
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for TimeoutError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutError::OperationFailed(e) => write!(f, "Operation failed: {}", e),
            TimeoutError::Timeout(d) => write!(f, "Operation timed out after {:?}", d),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for TimeoutError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TimeoutError::OperationFailed(e) => Some(e),
            TimeoutError::Timeout(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_in_time() {
        let result: Result<i32, TimeoutError<String>> =
            with_timeout(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let result: Result<(), TimeoutError<String>> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(TimeoutError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_into_inner_or() {
        let result: Result<(), TimeoutError<String>> =
            with_timeout(Duration::from_secs(1), async { Err("inner".to_string()) }).await;
        let error = result.unwrap_err().into_inner_or(|d| format!("timeout {:?}", d));
        assert_eq!(error, "inner");
    }
}
