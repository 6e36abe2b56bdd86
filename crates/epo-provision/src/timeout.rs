use epo_backend::{BackendError, BackendResult};
use std::future::Future;
use std::time::Duration;

/// Run a remote call under `limit`
///
/// # Errors
/// `BackendError::Timeout` when the bound expires, otherwise the call's own
/// result.
pub async fn bounded<T, F>(operation: &str, limit: Duration, call: F) -> BackendResult<T>
where
    F: Future<Output = BackendResult<T>>,
{
    if let Ok(result) = tokio::time::timeout(limit, call).await {
        result
    } else {
        let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
        tracing::warn!(operation, timeout_ms, "backend call timed out");
        Err(BackendError::Timeout {
            operation: operation.to_string(),
            timeout_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_fast_calls() {
        let r = bounded("op", Duration::from_secs(1), async { Ok::<_, BackendError>(7) }).await;
        assert_eq!(r, Ok(7));
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let r: BackendResult<()> = bounded("storage.ensure_folder", Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(())
        })
        .await;
        assert_eq!(
            r,
            Err(BackendError::Timeout {
                operation: "storage.ensure_folder".into(),
                timeout_ms: 50
            })
        );
    }
}
