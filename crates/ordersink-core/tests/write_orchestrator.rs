//! Integration tests: the attempt loop against scripted drivers and the
//! simulated throttled store, on a paused tokio clock.

mod common;

use common::{
    other, throttled, throttled_with_hint, timeout, unavailable, RecordingObserver,
    ScriptedDriver, Step,
};
use ordersink_core::config::{RetryConfig, StoreConfig};
use ordersink_core::control::CancelToken;
use ordersink_core::operation::{Operation, OrderRecord};
use ordersink_core::retry::{
    Attempt, AttemptObserver, AttemptOutcome, CountingObserver, ErrorKind, RetryPolicy,
    WriteError, WriteOrchestrator,
};
use ordersink_core::store::ThrottledStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

type Orchestrator = WriteOrchestrator<Arc<ScriptedDriver>, Arc<RecordingObserver>>;

fn orchestrator(
    driver: ScriptedDriver,
    policy: Option<RetryPolicy>,
) -> (Orchestrator, Arc<ScriptedDriver>, Arc<RecordingObserver>) {
    let driver = Arc::new(driver);
    let observer = Arc::new(RecordingObserver::default());
    let o = WriteOrchestrator::with_observer(Arc::clone(&driver), policy, Arc::clone(&observer));
    (o, driver, observer)
}

fn insert() -> Operation {
    Operation::insert(OrderRecord::generate())
}

#[tokio::test(start_paused = true)]
async fn continuous_throttling_makes_n_plus_one_attempts() {
    for n in 0..=4 {
        let (o, driver, observer) =
            orchestrator(ScriptedDriver::always(throttled()), Some(RetryPolicy::new(n)));
        let err = o.execute(&insert()).await.unwrap_err();
        match err {
            WriteError::Failed { kind, attempts, .. } => {
                assert_eq!(kind, ErrorKind::Throttled { retry_after: None });
                assert_eq!(attempts, n + 1);
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(driver.calls(), n + 1);
        assert_eq!(observer.indices(), (0..=n).collect::<Vec<_>>());
    }
}

#[tokio::test(start_paused = true)]
async fn throttled_then_success_scenario() {
    let (o, driver, observer) = orchestrator(
        ScriptedDriver::new(
            vec![Step::Fail(throttled()), Step::Fail(throttled())],
            Step::Ok,
        ),
        Some(RetryPolicy::new(2)),
    );
    let op = insert();
    let receipt = o.execute(&op).await.unwrap();
    assert_eq!(receipt.attempts, 3);
    assert_eq!(driver.calls(), 3);
    assert_eq!(observer.indices(), vec![0, 1, 2]);
    assert!(observer
        .correlation_ids()
        .iter()
        .all(|id| *id == op.correlation_id));
    let attempts = observer.attempts();
    assert!(matches!(
        attempts[0].outcome,
        AttemptOutcome::Failed {
            kind: ErrorKind::Throttled { .. },
            ..
        }
    ));
    assert_eq!(attempts[2].outcome, AttemptOutcome::Success);
}

#[tokio::test(start_paused = true)]
async fn non_idempotent_timeout_surfaces_immediately() {
    let (o, driver, observer) =
        orchestrator(ScriptedDriver::always(timeout()), Some(RetryPolicy::new(5)));
    let err = o.execute(&insert().non_idempotent()).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Timeout));
    assert_eq!(err.attempts_made(), 1);
    assert_eq!(err.status_code(), 408);
    assert_eq!(driver.calls(), 1);
    assert_eq!(observer.indices(), vec![0]);
}

#[tokio::test(start_paused = true)]
async fn idempotent_timeout_retries_up_to_cap() {
    let (o, driver, _observer) =
        orchestrator(ScriptedDriver::always(timeout()), Some(RetryPolicy::new(3)));
    let err = o.execute(&insert()).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Timeout));
    assert_eq!(err.attempts_made(), 4);
    assert_eq!(driver.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn other_errors_never_retry() {
    for n in [0, 1, 10] {
        let (o, driver, _observer) =
            orchestrator(ScriptedDriver::always(other()), Some(RetryPolicy::new(n)));
        let err = o.execute(&insert()).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Other));
        assert_eq!(err.attempts_made(), 1);
        assert_eq!(err.status_code(), 500);
        assert_eq!(driver.calls(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn unavailable_retries_then_recovers() {
    let (o, driver, _observer) = orchestrator(
        ScriptedDriver::new(
            vec![Step::Fail(unavailable()), Step::Fail(unavailable())],
            Step::Ok,
        ),
        Some(RetryPolicy::new(5)),
    );
    let receipt = o.execute(&insert()).await.unwrap();
    assert_eq!(receipt.attempts, 3);
    assert_eq!(driver.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn persistent_unavailable_gives_up_at_cap() {
    let (o, driver, observer) =
        orchestrator(ScriptedDriver::always(unavailable()), Some(RetryPolicy::new(3)));
    let err = o.execute(&insert()).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Unavailable));
    assert_eq!(err.attempts_made(), 4);
    assert_eq!(err.status_code(), 500);
    assert_eq!(driver.calls(), 4);
    assert_eq!(observer.indices(), vec![0, 1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn retry_disabled_makes_one_attempt() {
    let cfg = RetryConfig {
        enabled: false,
        ..RetryConfig::default()
    };
    let driver = Arc::new(ScriptedDriver::always(throttled()));
    let observer = Arc::new(RecordingObserver::default());
    let o = WriteOrchestrator::from_config(Arc::clone(&driver), &cfg, Arc::clone(&observer));
    assert!(o.policy().is_none());

    let err = o.execute(&insert()).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Throttled { retry_after: None }));
    assert_eq!(err.attempts_made(), 1);
    assert_eq!(err.status_code(), 429);
    assert_eq!(driver.calls(), 1);
    assert_eq!(observer.indices(), vec![0]);
}

#[tokio::test(start_paused = true)]
async fn server_hint_drives_the_sleep() {
    let (o, _driver, _observer) = orchestrator(
        ScriptedDriver::new(
            vec![
                Step::Fail(throttled_with_hint(1_000)),
                Step::Fail(throttled_with_hint(1_000)),
            ],
            Step::Ok,
        ),
        Some(RetryPolicy::new(5)),
    );
    let start = Instant::now();
    let receipt = o.execute(&insert()).await.unwrap();
    assert_eq!(receipt.attempts, 3);
    assert_eq!(start.elapsed(), Duration::from_secs(2));
    assert_eq!(receipt.elapsed, Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff_issues_no_further_attempt() {
    let (o, driver, observer) = orchestrator(
        ScriptedDriver::new(
            vec![
                Step::Fail(throttled_with_hint(1_000)),
                Step::Fail(throttled_with_hint(10_000)),
            ],
            Step::Ok,
        ),
        Some(RetryPolicy::new(5)),
    );
    let o = Arc::new(o);
    let token = CancelToken::new();
    let task = {
        let o = Arc::clone(&o);
        let token = token.clone();
        tokio::spawn(async move { o.execute_with(&insert(), &token).await })
    };

    // Attempt 1 fails at t=1s and backs off until t=11s.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(driver.calls(), 2);
    token.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.attempts_made(), 2);
    assert_eq!(driver.calls(), 2);
    assert_eq!(observer.indices(), vec![0, 1]);
}

#[tokio::test(start_paused = true)]
async fn deadline_aborts_in_flight_attempt() {
    let (o, driver, observer) =
        orchestrator(ScriptedDriver::new(vec![], Step::Hang), Some(RetryPolicy::new(5)));
    let token = CancelToken::with_deadline(Instant::now() + Duration::from_secs(3));
    let err = o.execute_with(&insert(), &token).await.unwrap_err();
    assert!(matches!(err, WriteError::Cancelled { attempts: 1 }));
    assert_eq!(driver.calls(), 1);
    let attempts = observer.attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, AttemptOutcome::Cancelled);
    assert_eq!(attempts[0].elapsed, Duration::from_secs(3));
}

#[tokio::test]
async fn already_cancelled_issues_nothing() {
    let (o, driver, observer) =
        orchestrator(ScriptedDriver::new(vec![], Step::Ok), Some(RetryPolicy::new(5)));
    let token = CancelToken::new();
    token.cancel();
    let err = o.execute_with(&insert(), &token).await.unwrap_err();
    assert!(matches!(err, WriteError::Cancelled { attempts: 0 }));
    assert_eq!(driver.calls(), 0);
    assert!(observer.attempts().is_empty());
}

struct PanickingObserver;

impl AttemptObserver for PanickingObserver {
    fn record(&self, _correlation_id: &Uuid, _attempt: &Attempt) {
        panic!("log sink exploded");
    }
}

#[tokio::test(start_paused = true)]
async fn observer_panic_does_not_abort_write() {
    let driver = ScriptedDriver::new(vec![Step::Fail(throttled())], Step::Ok);
    let o = WriteOrchestrator::with_observer(driver, Some(RetryPolicy::new(3)), PanickingObserver);
    let receipt = o.execute(&insert()).await.unwrap();
    assert_eq!(receipt.attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn backoff_of_one_write_does_not_stall_another() {
    let driver = Arc::new(ScriptedDriver::new(
        vec![Step::Fail(throttled_with_hint(60_000))],
        Step::Ok,
    ));
    let o = Arc::new(WriteOrchestrator::with_observer(
        Arc::clone(&driver),
        Some(RetryPolicy::new(5)),
        CountingObserver::new(),
    ));

    let slow = {
        let o = Arc::clone(&o);
        tokio::spawn(async move { o.execute(&insert()).await })
    };
    while driver.calls() == 0 {
        tokio::task::yield_now().await;
    }

    let start = Instant::now();
    let fast = o.execute(&insert()).await.unwrap();
    assert_eq!(fast.attempts, 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(!slow.is_finished());

    let slow = slow.await.unwrap().unwrap();
    assert_eq!(slow.attempts, 2);
    let stats = o.observer().snapshot();
    assert_eq!(stats.attempts, 3);
    assert_eq!(stats.throttled, 1);
    assert_eq!(stats.successes, 2);
}

#[tokio::test(start_paused = true)]
async fn throttled_store_writes_all_rows_exactly_once() {
    let store = Arc::new(ThrottledStore::new(StoreConfig {
        partitions: 1,
        request_units_per_sec: 10,
        write_cost: 10,
        latency_ms: 0,
        timeout_ms: 0,
    }));
    let o = Arc::new(WriteOrchestrator::with_observer(
        Arc::clone(&store),
        Some(RetryPolicy::new(10)),
        CountingObserver::new(),
    ));

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let o = Arc::clone(&o);
        tasks.push(tokio::spawn(async move { o.execute(&insert()).await }));
    }
    for t in tasks {
        t.await.unwrap().unwrap();
    }

    assert_eq!(store.len(), 4);
    let stats = o.observer().snapshot();
    assert_eq!(stats.successes, 4);
    assert!(stats.throttled >= 3, "expected throttling, got {stats:?}");
    assert_eq!(stats.attempts, stats.successes + stats.throttled);
}

#[tokio::test(start_paused = true)]
async fn exhausted_store_surfaces_throttled_terminal() {
    let store = ThrottledStore::new(StoreConfig {
        partitions: 1,
        request_units_per_sec: 10,
        write_cost: 10,
        latency_ms: 0,
        timeout_ms: 0,
    });
    let o = WriteOrchestrator::new(store, None);
    o.execute(&insert()).await.unwrap();
    let err = o.execute(&insert()).await.unwrap_err();
    assert_eq!(err.status_code(), 429);
    assert!(err.to_string().contains("TooManyRequests (429)"));
}
