use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use haven_config::PollConfig;
use tracing::{trace, warn};

use crate::error::{HavenError, WaitStage};

/// Outcome of a single poll attempt.
///
/// Terminal failures are not a variant here: a poll that observes one returns `Err` and the
/// polling loop stops immediately.
#[derive(Debug, Eq, PartialEq)]
pub enum PollStep<T> {
    /// Expected state was reached.
    Ready(T),
    /// Not there yet, wait and look again.
    Pending,
}

/// Races `operation` against a timer.
///
/// When the timer fires first the operation is dropped and a [`HavenError::Timeout`] carrying
/// `message` is returned. The timer is dropped together with the race on either outcome. A
/// timeout means the outcome is unknown: a transaction abandoned here may still land.
pub async fn with_timeout<F, T>(
    operation: F,
    duration: Duration,
    stage: WaitStage,
    message: &str,
) -> Result<T, HavenError>
where
    F: Future<Output = Result<T, HavenError>>,
{
    match tokio::time::timeout(duration, operation).await {
        Ok(result) => result,
        Err(_) => Err(HavenError::timeout(stage, message)),
    }
}

/// Runs `operation` up to `max_retries + 1` times, sleeping `delay` between attempts.
///
/// Failures of non-final attempts are only logged; once attempts are exhausted the error of the
/// last attempt is returned.
pub async fn with_retry<F, Fut, T, E>(
    mut operation: F,
    max_retries: usize,
    delay: Duration,
) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_retries => {
                warn!(attempt, max_retries, "attempt failed, retrying: {err}");
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Calls `check` until it reports [`PollStep::Ready`], at most `poll.max_attempts` times and
/// `poll.interval()` apart.
///
/// An `Err` from `check` is terminal and returned as is. Running out of attempts yields a
/// [`HavenError::Timeout`] for `stage`.
pub async fn poll_until<F, Fut, T>(
    poll: PollConfig,
    stage: WaitStage,
    message: &str,
    mut check: F,
) -> Result<T, HavenError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<PollStep<T>, HavenError>>,
{
    for attempt in 1..=poll.max_attempts {
        match check(attempt).await? {
            PollStep::Ready(value) => return Ok(value),
            PollStep::Pending => {
                trace!(%stage, attempt, max_attempts = poll.max_attempts, "not ready yet");
                if attempt < poll.max_attempts {
                    tokio::time::sleep(poll.interval()).await;
                }
            }
        }
    }
    Err(HavenError::timeout(stage, message))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use haven_config::PollConfig;
    use tokio::time::Instant;

    use super::{PollStep, poll_until, with_retry, with_timeout};
    use crate::error::{HavenError, WaitStage};

    #[tokio::test(start_paused = true)]
    async fn timeout_fires_and_leaves_other_timers_alone() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, HavenError>("late")
        };
        let result = with_timeout(slow, Duration::from_secs(1), WaitStage::WalletConfirmation, "wallet").await;
        match result {
            Err(HavenError::Timeout { stage, message }) => {
                assert_eq!(stage, WaitStage::WalletConfirmation);
                assert_eq!(message, "wallet");
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        // An unrelated timer set afterwards still fires on schedule.
        let start = Instant::now();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_passes_through_results() {
        let fast = async { Ok::<_, HavenError>(7) };
        let value = with_timeout(fast, Duration::from_secs(1), WaitStage::TransactionFinality, "x")
            .await
            .unwrap();
        assert_eq!(value, 7);

        let failing = async { Err::<(), _>(HavenError::UserRejected) };
        let error = with_timeout(failing, Duration::from_secs(1), WaitStage::TransactionFinality, "x")
            .await
            .unwrap_err();
        assert!(error.is_user_rejected());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_is_bounded_and_surfaces_the_last_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();
        let result: Result<(), String> = with_retry(
            |attempt| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(format!("failure {attempt}"))
                }
            },
            2,
            Duration::from_millis(500),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap_err(), "failure 2");
        // Two delays between three attempts, none after the last.
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_stops_on_first_success() {
        let calls = AtomicUsize::new(0);
        let result: Result<usize, String> = with_retry(
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 1 {
                        Ok(attempt)
                    } else {
                        Err("transient".to_string())
                    }
                }
            },
            5,
            Duration::from_millis(10),
        )
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_returns_when_ready() {
        let value = poll_until(
            PollConfig::new(100, 5),
            WaitStage::BackendFileReady,
            "file",
            |attempt| async move {
                Ok(if attempt == 3 {
                    PollStep::Ready(attempt)
                } else {
                    PollStep::Pending
                })
            },
        )
        .await
        .unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_exhaustion_is_a_timeout_for_the_stage() {
        let calls = AtomicUsize::new(0);
        let error = poll_until(
            PollConfig::new(100, 4),
            WaitStage::BackendBucketSync,
            "bucket",
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<PollStep<()>, _>(PollStep::Pending) }
            },
        )
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(matches!(
            error,
            HavenError::Timeout {
                stage: WaitStage::BackendBucketSync,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_stops_on_terminal_error() {
        let calls = AtomicUsize::new(0);
        let error = poll_until(
            PollConfig::new(100, 10),
            WaitStage::BackendFileReady,
            "file",
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<PollStep<()>, _>(HavenError::BackendRejected) }
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(error, HavenError::BackendRejected));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
