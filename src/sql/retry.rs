//! Bounded retry for cloud resources that are not ready yet.

use crate::azure_auth::TokenProvider;
use crate::config::{Config, SQL_SCOPE};
use crate::error::{BillingError, IsRetryable};
use crate::sql::connection::{ConnectionSpec, SynapseClient};
use backon::{BackoffBuilder, Retryable};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// Delay schedule between connection attempts.
///
/// With `step_secs = 0` every wait is `delay_secs`; otherwise the n-th wait is
/// `delay_secs + n * step_secs`, capped at `max_delay_secs` when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySchedule {
    /// Total attempts, including the first one.
    pub attempts: u32,
    pub delay_secs: u64,
    pub step_secs: u64,
    pub max_delay_secs: Option<u64>,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay_secs: 30,
            step_secs: 0,
            max_delay_secs: None,
        }
    }
}

impl RetrySchedule {
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            delay_secs: delay.as_secs(),
            step_secs: 0,
            max_delay_secs: None,
        }
    }

    pub fn linear(attempts: u32, initial: Duration, step: Duration) -> Self {
        Self {
            attempts,
            delay_secs: initial.as_secs(),
            step_secs: step.as_secs(),
            max_delay_secs: None,
        }
    }

    pub fn with_max_delay(mut self, max: Duration) -> Self {
        self.max_delay_secs = Some(max.as_secs());
        self
    }

    /// The sleeps taken between attempts; one fewer than `attempts`.
    pub fn delays(&self) -> Vec<Duration> {
        (0..self.attempts.saturating_sub(1) as u64)
            .map(|n| {
                let secs = self.delay_secs.saturating_add(n.saturating_mul(self.step_secs));
                let secs = match self.max_delay_secs {
                    Some(max) => secs.min(max),
                    None => secs,
                };
                Duration::from_secs(secs)
            })
            .collect()
    }

    /// Worst-case time spent sleeping before giving up.
    pub fn total_wait(&self) -> Duration {
        self.delays().iter().sum()
    }
}

impl BackoffBuilder for RetrySchedule {
    type Backoff = std::vec::IntoIter<Duration>;

    fn build(self) -> Self::Backoff {
        self.delays().into_iter()
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// schedule is exhausted. Returns the last error in the latter cases.
pub async fn retry_with_schedule<T, F, Fut>(
    what: &str,
    schedule: &RetrySchedule,
    op: F,
) -> Result<T, BillingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BillingError>>,
{
    let attempt = AtomicU32::new(1);
    let total = schedule.attempts.max(1);

    let result = op
        .retry(schedule.clone())
        .when(|e: &BillingError| e.is_retryable())
        .notify(|err: &BillingError, dur: Duration| {
            let n = attempt.fetch_add(1, Ordering::Relaxed);
            warn!(
                attempt = n,
                attempts = total,
                failure = err.failure().label(),
                error = %err,
                "{what} not ready yet, waiting {:?}",
                dur
            );
        })
        .await;

    match &result {
        Ok(_) => info!(
            attempt = attempt.load(Ordering::Relaxed),
            "{what} ready"
        ),
        Err(e) => warn!(
            attempts = attempt.load(Ordering::Relaxed),
            error = %e,
            "{what} still unavailable, giving up"
        ),
    }
    result
}

/// Connect to `spec.database`, retrying along `schedule`.
///
/// The token is looked up on every attempt, so one that expires during a long
/// wait is replaced. Until then the cached token is reused; database
/// permissions are checked by the server at login, not carried in the token.
pub async fn connect_with_retry(
    spec: &ConnectionSpec,
    tokens: &TokenProvider,
    schedule: &RetrySchedule,
) -> Result<SynapseClient, BillingError> {
    let what = format!("database {}", spec.database);
    retry_with_schedule(&what, schedule, || async {
        let token = tokens.token(SQL_SCOPE).await?;
        SynapseClient::connect(spec, &token).await
    })
    .await
}

/// Wait until the workspace's serverless endpoint accepts logins to `master`.
pub async fn wait_for_synapse(
    config: &Config,
    tokens: &TokenProvider,
) -> Result<SynapseClient, BillingError> {
    info!(
        host = %config.sql_host(),
        attempts = config.retry.attempts,
        max_wait = ?config.retry.total_wait(),
        "waiting for the serverless SQL endpoint"
    );
    connect_with_retry(&ConnectionSpec::master(config), tokens, &config.retry).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_schedule_repeats_the_delay() {
        let schedule = RetrySchedule::fixed(4, Duration::from_secs(30));
        assert_eq!(schedule.delays(), vec![Duration::from_secs(30); 3]);
        assert_eq!(schedule.total_wait(), Duration::from_secs(90));
    }

    #[test]
    fn linear_schedule_grows_and_caps() {
        let schedule = RetrySchedule::linear(5, Duration::from_secs(10), Duration::from_secs(20))
            .with_max_delay(Duration::from_secs(45));
        assert_eq!(
            schedule.delays(),
            [10, 30, 45, 45].map(Duration::from_secs).to_vec()
        );
    }

    #[test]
    fn single_attempt_never_sleeps() {
        assert!(RetrySchedule::fixed(1, Duration::from_secs(5)).delays().is_empty());
        assert!(RetrySchedule::fixed(0, Duration::from_secs(5)).delays().is_empty());
    }
}
