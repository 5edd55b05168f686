//! Per-attempt timeout resolution and linked cancellation.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Resolves the effective timeout for one activity attempt: the activity's
/// own timeout overrides the definition's, which overrides the engine's
/// configured default.
pub fn resolve_timeout(
    activity_timeout: Option<Duration>,
    definition_timeout: Option<Duration>,
    engine_default: Duration,
) -> Duration {
    activity_timeout
        .or(definition_timeout)
        .unwrap_or(engine_default)
}

/// The outcome of racing a future against a timeout and an outer
/// cancellation signal.
#[derive(Debug, PartialEq)]
pub enum TimedOutcome<T> {
    Completed(T),
    TimedOut,
    Cancelled,
}

/// Runs `fut` to completion unless `timeout` elapses first or
/// `cancellation` fires first, whichever comes sooner.
pub async fn run_with_timeout<T>(
    fut: impl Future<Output = T>,
    timeout: Duration,
    cancellation: &CancellationToken,
) -> TimedOutcome<T> {
    tokio::select! {
        biased;
        _ = cancellation.cancelled() => TimedOutcome::Cancelled,
        result = tokio::time::timeout(timeout, fut) => match result {
            Ok(value) => TimedOutcome::Completed(value),
            Err(_elapsed) => TimedOutcome::TimedOut,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_timeout_wins() {
        let resolved = resolve_timeout(
            Some(Duration::from_secs(1)),
            Some(Duration::from_secs(2)),
            Duration::from_secs(3),
        );
        assert_eq!(resolved, Duration::from_secs(1));
    }

    #[test]
    fn falls_back_to_engine_default() {
        let resolved = resolve_timeout(None, None, Duration::from_secs(3));
        assert_eq!(resolved, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn times_out_before_completion() {
        let token = CancellationToken::new();
        let outcome = run_with_timeout(
            async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                "done"
            },
            Duration::from_millis(50),
            &token,
        )
        .await;
        assert_eq!(outcome, TimedOutcome::TimedOut);
    }

    #[tokio::test]
    async fn outer_cancellation_wins_over_timeout() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = run_with_timeout(
            async { "done" },
            Duration::from_secs(5),
            &token,
        )
        .await;
        assert_eq!(outcome, TimedOutcome::Cancelled);
    }

    #[tokio::test]
    async fn completes_normally_within_budget() {
        let token = CancellationToken::new();
        let outcome = run_with_timeout(async { 42 }, Duration::from_secs(1), &token).await;
        assert_eq!(outcome, TimedOutcome::Completed(42));
    }
}
