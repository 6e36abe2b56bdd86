use crate::error::{BackendError, BackendResult};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Switchable failure and latency simulation
#[derive(Debug, Default)]
pub struct FaultInjector {
    always: AtomicBool,
    remaining: AtomicUsize,
    latency_ms: AtomicU64,
}

impl FaultInjector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call until switched off
    pub fn fail_always(&self, on: bool) {
        self.always.store(on, Ordering::SeqCst);
    }

    /// Fail the next `n` calls
    pub fn fail_next(&self, n: usize) {
        self.remaining.store(n, Ordering::SeqCst);
    }

    /// Delay every call
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Apply latency, then fail if a fault is armed
    pub(crate) async fn before_call(&self, backend: &str, operation: &str) -> BackendResult<()> {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        let consumed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed || self.always.load(Ordering::SeqCst) {
            return Err(BackendError::remote(
                backend,
                format!("{operation}: injected failure"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fail_next_counts_down() {
        let faults = FaultInjector::new();
        faults.fail_next(2);
        assert!(faults.before_call("t", "op").await.is_err());
        assert!(faults.before_call("t", "op").await.is_err());
        assert!(faults.before_call("t", "op").await.is_ok());
    }

    #[tokio::test]
    async fn fail_always_toggles() {
        let faults = FaultInjector::new();
        faults.fail_always(true);
        assert!(faults.before_call("t", "op").await.is_err());
        faults.fail_always(false);
        assert!(faults.before_call("t", "op").await.is_ok());
    }
}
