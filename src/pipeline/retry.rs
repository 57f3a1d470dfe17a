//! Retry controller: linear backoff, unbounded unless configured otherwise.

use crate::config::ScraperConfig;
use crate::pipeline::progress::{EventSink, FetchEvent};
use crate::scraper::{Outcome, SkipReason, StationSource};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            base_delay: config.retry_base_delay(),
            max_attempts: config.max_attempts,
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            base: self.base_delay,
            max_attempts: self.max_attempts,
            attempt: 0,
        }
    }
}

/// Retry state. Each `next()` records a failed attempt and yields the wait
/// before the following one: `attempt * base`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max_attempts: Option<u32>,
    attempt: u32,
}

impl Backoff {
    /// Attempts that have failed so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        self.attempt = self.attempt.saturating_add(1);
        if self.max_attempts.is_some_and(|max| self.attempt >= max) {
            return None;
        }
        Some(self.base.saturating_mul(self.attempt))
    }
}

/// Fetch one station until it succeeds or is skipped.
///
/// Transient errors never escape: with no `max_attempts` this loops until the
/// source answers, otherwise exhaustion becomes `Skip(RetriesExhausted)`.
pub async fn fetch_with_retry(
    source: &dyn StationSource,
    station_id: &str,
    policy: &RetryPolicy,
    events: &EventSink,
) -> Outcome {
    let mut backoff = policy.backoff();

    loop {
        let err = match source.fetch(station_id).await {
            Ok(outcome) => return outcome,
            Err(err) => err,
        };

        let Some(wait) = backoff.next() else {
            warn!(
                station = station_id,
                attempts = backoff.attempts(),
                error = %err,
                "giving up on station"
            );
            return Outcome::Skip(SkipReason::RetriesExhausted(backoff.attempts()));
        };

        warn!(
            station = station_id,
            attempt = backoff.attempts(),
            wait_secs = wait.as_secs(),
            error = %err,
            "fetch failed, retrying"
        );
        events.emit(FetchEvent::Retrying {
            station_id: station_id.to_string(),
            attempt: backoff.attempts(),
            wait,
            error: err.to_string(),
        });

        sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::FetchError;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails `failures` times, then answers with `then`.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        then: Outcome,
    }

    impl Flaky {
        fn new(failures: u32, then: Outcome) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                then,
            }
        }
    }

    #[async_trait]
    impl StationSource for Flaky {
        async fn fetch(&self, station_id: &str) -> Result<Outcome, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(FetchError::Status {
                    url: format!("http://sir.test/{}", station_id),
                    status: StatusCode::BAD_GATEWAY,
                });
            }
            Ok(self.then.clone())
        }
    }

    fn policy(max_attempts: Option<u32>) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_secs(10),
            max_attempts,
        }
    }

    fn waits(rx: &mut tokio::sync::mpsc::UnboundedReceiver<FetchEvent>) -> Vec<u64> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let FetchEvent::Retrying { wait, .. } = event {
                out.push(wait.as_secs());
            }
        }
        out
    }

    #[test]
    fn test_backoff_is_linear_and_unbounded() {
        let waits: Vec<u64> = policy(None).backoff().take(5).map(|d| d.as_secs()).collect();
        assert_eq!(waits, vec![10, 20, 30, 40, 50]);
        assert!(policy(None).backoff().nth(10_000).is_some());
    }

    #[test]
    fn test_backoff_bounded_by_max_attempts() {
        // Three attempts means two waits between them.
        let waits: Vec<u64> = policy(Some(3)).backoff().map(|d| d.as_secs()).collect();
        assert_eq!(waits, vec![10, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_growing_waits_until_success() {
        let source = Flaky::new(4, Outcome::Success("page".into()));
        let (events, mut rx) = EventSink::channel();
        let started = tokio::time::Instant::now();

        let outcome = fetch_with_retry(&source, "TOS1", &policy(None), &events).await;

        assert_eq!(outcome, Outcome::Success("page".into()));
        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
        assert_eq!(waits(&mut rx), vec![10, 20, 30, 40]);
        assert_eq!(started.elapsed(), Duration::from_secs(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_returns_without_retry() {
        let source = Flaky::new(0, Outcome::Skip(SkipReason::Status(500)));
        let (events, mut rx) = EventSink::channel();

        let outcome = fetch_with_retry(&source, "TOS1", &policy(None), &events).await;

        assert_eq!(outcome, Outcome::Skip(SkipReason::Status(500)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(waits(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_outage_never_gives_up_without_bound() {
        let source = Flaky::new(200, Outcome::Success("late".into()));
        let outcome = fetch_with_retry(&source, "TOS1", &policy(None), &EventSink::none()).await;
        assert_eq!(outcome, Outcome::Success("late".into()));
        assert_eq!(source.calls.load(Ordering::SeqCst), 201);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_policy_skips_when_exhausted() {
        let source = Flaky::new(u32::MAX, Outcome::Success("never".into()));
        let (events, mut rx) = EventSink::channel();

        let outcome = fetch_with_retry(&source, "TOS1", &policy(Some(3)), &events).await;

        assert_eq!(outcome, Outcome::Skip(SkipReason::RetriesExhausted(3)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(waits(&mut rx), vec![10, 20]);
    }
}
