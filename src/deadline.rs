//! Deadline racing for capability calls.
//!
//! Every call into an optionally-present backend is wrapped here so that a
//! slow or wedged backend degrades to a `Timeout` instead of stalling the
//! pipeline. The timer is structurally released on every exit path.

use std::future::Future;
use std::time::Duration;

use crate::error::AiError;

/// Race `operation` against a timer with the given `budget`.
///
/// If the operation settles first, its own result (success or failure) is
/// returned unchanged. If the timer wins, `AiError::Timeout` carrying `label`
/// is returned and the operation's future is dropped — a backend request
/// already in flight may still complete on the host side; that eventual
/// result is discarded, never observed.
pub async fn with_deadline<F, T>(operation: F, budget: Duration, label: &str) -> Result<T, AiError>
where
    F: Future<Output = Result<T, AiError>>,
{
    match tokio::time::timeout(budget, operation).await {
        Ok(result) => result,
        Err(_elapsed) => {
            tracing::debug!(
                label,
                budget_ms = budget.as_millis() as u64,
                "deadline elapsed"
            );
            Err(AiError::Timeout {
                label: label.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    async fn quick_ok() -> Result<u32, AiError> {
        Ok(7)
    }

    async fn quick_err() -> Result<u32, AiError> {
        Err(AiError::CapabilityFailure("backend rejected input".into()))
    }

    async fn slow_ok(delay: Duration) -> Result<u32, AiError> {
        sleep(delay).await;
        Ok(9)
    }

    #[tokio::test]
    async fn fast_success_passes_through() {
        let result = with_deadline(quick_ok(), Duration::from_secs(1), "fetch").await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn fast_failure_passes_through() {
        let result = with_deadline(quick_err(), Duration::from_secs(1), "fetch").await;
        match result.unwrap_err() {
            AiError::CapabilityFailure(msg) => assert!(msg.contains("rejected")),
            other => panic!("expected CapabilityFailure, got: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_operation_times_out_with_label() {
        let result = with_deadline(
            slow_ok(Duration::from_secs(60)),
            Duration::from_millis(50),
            "chunk summary",
        )
        .await;
        match result.unwrap_err() {
            AiError::Timeout { label } => assert_eq!(label, "chunk summary"),
            other => panic!("expected Timeout, got: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn operation_inside_budget_is_not_cut() {
        let result = with_deadline(
            slow_ok(Duration::from_millis(40)),
            Duration::from_millis(50),
            "fetch",
        )
        .await;
        assert_eq!(result.unwrap(), 9);
    }
}
