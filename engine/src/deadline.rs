//! Deadlines for network-bound operations

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::EngineError;

/// Per-class operation deadlines, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Deadlines {
    /// Account lookups, blockhash fetches, submissions
    pub rpc_ms: u64,
    /// Validity proof requests
    pub proof_ms: u64,
    /// Ownership proof generation
    pub ownership_ms: u64,
    /// Health probes
    pub health_ms: u64,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            rpc_ms: 30_000,
            proof_ms: 60_000,
            ownership_ms: 10_000,
            health_ms: 5_000,
        }
    }
}

impl Deadlines {
    pub fn rpc(&self) -> Duration {
        Duration::from_millis(self.rpc_ms)
    }

    pub fn proof(&self) -> Duration {
        Duration::from_millis(self.proof_ms)
    }

    pub fn ownership(&self) -> Duration {
        Duration::from_millis(self.ownership_ms)
    }

    pub fn health(&self) -> Duration {
        Duration::from_millis(self.health_ms)
    }
}

/// Race `future` against a timer.
///
/// On expiry the future is dropped where it stands, so a late result can
/// never be observed or applied, and [`EngineError::Timeout`] is returned.
pub async fn with_deadline<T, F>(
    operation: &'static str,
    limit: Duration,
    future: F,
) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, EngineError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, limit_ms = limit.as_millis() as u64, "deadline expired");
            Err(EngineError::Timeout {
                operation,
                after: limit,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_never_settling_operation_times_out_at_deadline() {
        let started = Instant::now();
        let result: Result<(), _> = with_deadline(
            "never settles",
            Duration::from_millis(10),
            std::future::pending(),
        )
        .await;

        let elapsed = started.elapsed();
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(elapsed >= Duration::from_millis(10));
        assert!(elapsed < Duration::from_millis(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_operation_passes_through() {
        let value = with_deadline("quick", Duration::from_secs(1), async { Ok(7u64) })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let err = with_deadline::<u64, _>("fails", Duration::from_secs(1), async {
            Err(EngineError::NoShieldedFunds)
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoShieldedFunds);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_is_discarded() {
        let applied = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&applied);

        let result = with_deadline("slow", Duration::from_millis(10), async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!applied.load(Ordering::SeqCst));
    }

    #[test]
    fn test_default_deadlines() {
        let deadlines = Deadlines::default();
        assert_eq!(deadlines.rpc(), Duration::from_secs(30));
        assert_eq!(deadlines.proof(), Duration::from_secs(60));
        assert!(deadlines.proof() > deadlines.rpc());
    }
}
