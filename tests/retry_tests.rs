use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use synapse_billing::error::BillingError;
use synapse_billing::sql::retry::{RetrySchedule, retry_with_schedule};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn gives_up_after_the_last_attempt() {
    let calls = Arc::new(AtomicU32::new(0));
    let schedule = RetrySchedule::fixed(4, Duration::from_secs(30));
    let started = Instant::now();

    let result: Result<(), _> = retry_with_schedule("master", &schedule, || {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BillingError::Timeout(Duration::from_secs(30)))
        }
    })
    .await;

    assert!(matches!(result, Err(BillingError::Timeout(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(started.elapsed() >= Duration::from_secs(90));
}

#[tokio::test(start_paused = true)]
async fn stops_retrying_once_connected() {
    let calls = Arc::new(AtomicU32::new(0));
    let schedule = RetrySchedule::linear(10, Duration::from_secs(5), Duration::from_secs(5));
    let started = Instant::now();

    let result = retry_with_schedule("database", &schedule, || {
        let calls = calls.clone();
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(BillingError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connection timed out",
                )))
            } else {
                Ok(n)
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 5s then 10s.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(15), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(30), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn configuration_errors_fail_immediately() {
    let calls = Arc::new(AtomicU32::new(0));
    let schedule = RetrySchedule::default();

    let result: Result<(), _> = retry_with_schedule("master", &schedule, || {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BillingError::Config("missing tenant_id".into()))
        }
    })
    .await;

    assert!(matches!(result, Err(BillingError::Config(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn default_schedule_waits_thirty_seconds_nine_times() {
    let schedule = RetrySchedule::default();
    assert_eq!(schedule.attempts, 10);
    assert_eq!(schedule.delays().len(), 9);
    assert_eq!(schedule.total_wait(), Duration::from_secs(270));
}
