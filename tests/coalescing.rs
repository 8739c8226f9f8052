//! Burst collapse and supersession behavior for keyed work.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

use shirabe::error::CoreResult;
use shirabe::metrics::SchedulerMetrics;
use shirabe::schedule::{RequestClass, RequestScheduler};

fn scheduler() -> RequestScheduler {
    RequestScheduler::new(Arc::new(SchedulerMetrics::new()))
}

#[tokio::test]
async fn two_keyed_schedules_keep_only_the_second() {
    helpers::init_logging();
    let scheduler = scheduler();
    let executions = Arc::new(AtomicUsize::new(0));

    let first = {
        let executions = Arc::clone(&executions);
        scheduler.schedule(
            RequestClass::Typing,
            Some("file:///x"),
            Some(Duration::from_millis(25)),
            move |_checkpoint| async move {
                executions.fetch_add(1, Ordering::SeqCst);
                Ok("first")
            },
        )
    };
    let second = {
        let executions = Arc::clone(&executions);
        scheduler.schedule(
            RequestClass::Typing,
            Some("file:///x"),
            Some(Duration::from_millis(25)),
            move |_checkpoint| async move {
                executions.fetch_add(1, Ordering::SeqCst);
                Ok("second")
            },
        )
    };

    let err = tokio_test::assert_err!(first.await);
    assert!(err.is_superseded());
    assert_eq!(err.to_string(), "Request superseded (key: file:///x)");
    assert_eq!(tokio_test::assert_ok!(second.await), "second");
    assert_eq!(executions.load(Ordering::SeqCst), 1);
    scheduler.shutdown().await;
}

#[tokio::test]
async fn burst_of_n_yields_one_execution_and_n_minus_one_supersessions() {
    helpers::init_logging();
    let scheduler = scheduler();
    let executions = Arc::new(AtomicUsize::new(0));
    const N: usize = 6;

    let handles: Vec<_> = (0..N)
        .map(|index| {
            let executions = Arc::clone(&executions);
            scheduler.schedule(
                RequestClass::Typing,
                Some("file:///burst.rs"),
                Some(Duration::from_millis(30)),
                move |_checkpoint| async move {
                    executions.fetch_add(1, Ordering::SeqCst);
                    Ok(index)
                },
            )
        })
        .collect();

    let mut superseded = 0;
    let mut winners = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(index) => winners.push(index),
            Err(err) => {
                assert!(err.is_superseded());
                superseded += 1;
            }
        }
    }

    assert_eq!(winners, vec![N - 1], "only the last submission survives");
    assert_eq!(superseded, N - 1);
    assert_eq!(executions.load(Ordering::SeqCst), 1);

    scheduler.shutdown().await;
    let snapshot = scheduler.snapshot_metrics();
    assert_eq!(snapshot.scheduled, N as u64);
    assert_eq!(snapshot.started, 1);
    assert_eq!(snapshot.completed, 1);
    assert_eq!(snapshot.canceled, (N - 1) as u64);
}

#[tokio::test]
async fn running_unit_is_cancelled_at_its_next_checkpoint() {
    helpers::init_logging();
    let scheduler = scheduler();
    let started = Arc::new(tokio::sync::Notify::new());

    // No coalesce window: the first unit starts immediately and loops on
    // checkpoints until the supersession arrives.
    let first: shirabe::schedule::ScheduledRequest<()> = {
        let started = Arc::clone(&started);
        scheduler.schedule(
            RequestClass::Interactive,
            Some("file:///slow.rs"),
            None,
            move |checkpoint| async move {
                started.notify_one();
                loop {
                    checkpoint.check()?;
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            },
        )
    };
    started.notified().await;

    let second = scheduler.schedule(
        RequestClass::Interactive,
        Some("file:///slow.rs"),
        None,
        |_checkpoint| async { Ok("winner") },
    );

    // The superseded promise must settle promptly, not when the slow work
    // would have finished on its own.
    let err = timeout(Duration::from_millis(500), first)
        .await
        .expect("superseded unit settles within the latency bound")
        .unwrap_err();
    assert!(err.is_superseded());
    assert_eq!(second.await.unwrap(), "winner");
    scheduler.shutdown().await;
}

#[tokio::test]
async fn coalesce_window_holds_execution_for_late_arrivals() {
    helpers::init_logging();
    let scheduler = scheduler();
    let executions = Arc::new(AtomicUsize::new(0));

    let first = {
        let executions = Arc::clone(&executions);
        scheduler.schedule(
            RequestClass::Background,
            Some("file:///held.rs"),
            Some(Duration::from_millis(80)),
            move |_checkpoint| async move {
                executions.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
    };

    // Well inside the window the unit has not run yet, so a newcomer can
    // still replace it even though the slot was idle the whole time.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(executions.load(Ordering::SeqCst), 0);

    let second = {
        let executions = Arc::clone(&executions);
        scheduler.schedule(
            RequestClass::Background,
            Some("file:///held.rs"),
            Some(Duration::from_millis(80)),
            move |_checkpoint| async move {
                executions.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
    };

    assert!(first.await.unwrap_err().is_superseded());
    second.await.unwrap();
    assert_eq!(executions.load(Ordering::SeqCst), 1);
    scheduler.shutdown().await;
}

#[tokio::test]
async fn held_unit_does_not_block_other_keys() {
    helpers::init_logging();
    let scheduler = scheduler();

    let _held: shirabe::schedule::ScheduledRequest<()> = scheduler.schedule(
        RequestClass::Typing,
        Some("file:///held.rs"),
        Some(Duration::from_secs(60)),
        |_checkpoint| async { Ok(()) },
    );

    // A lower-class unit with no window runs straight through the idle slot.
    let unrelated = scheduler.schedule(
        RequestClass::Background,
        Some("file:///other.rs"),
        None,
        |_checkpoint| async { Ok("ran") },
    );
    let result = timeout(Duration::from_millis(500), unrelated)
        .await
        .expect("unrelated key is not held");
    assert_eq!(result.unwrap(), "ran");
    scheduler.shutdown().await;
}

#[tokio::test]
async fn distinct_keys_never_supersede_each_other() {
    helpers::init_logging();
    let scheduler = scheduler();

    let a = scheduler.schedule(
        RequestClass::Typing,
        Some("file:///a.rs"),
        None,
        |_checkpoint| async { Ok("a") },
    );
    let b = scheduler.schedule(
        RequestClass::Typing,
        Some("file:///b.rs"),
        None,
        |_checkpoint| async { Ok("b") },
    );

    let results: CoreResult<(&str, &str)> = async { Ok((a.await?, b.await?)) }.await;
    assert_eq!(results.unwrap(), ("a", "b"));
    scheduler.shutdown().await;
}
