//! Priority request scheduler with coalescing and cooperative cancellation.
//!
//! All analysis work funnels through one scheduler instance. Each unit of work
//! carries a [`RequestClass`], an optional coalescing key and an optional
//! coalesce window. A single executor task drains three FIFO queues in
//! priority order, so at most one unit runs at a time.
//!
//! # Architecture
//!
//! ```text
//! schedule(class, key, window, run)
//!       │
//!       ├─► Discard queued units with the same key (they settle superseded)
//!       ├─► Cancel the running unit's token if it shares the key
//!       │
//!       └─► Enqueue, eligible once the coalesce window elapses
//!               │
//!               ▼
//!        executor task (single execution slot)
//!               │
//!               ├─► Pick the oldest eligible unit from the
//!               │   highest-priority non-empty class
//!               ├─► Record queue wait, mark the slot busy
//!               └─► Spawn the run with its Checkpoint, await settlement
//! ```
//!
//! # Key Design Decision: Coalesce Window as Eligibility Hold
//!
//! A keyed unit with a coalesce window is held back from the execution slot
//! until the window elapses. A newer unit with the same key scheduled inside
//! the window discards the held one, which is what collapses a burst of N
//! submissions into exactly one execution (the last) even when the slot is
//! idle the whole time. A held unit never blocks other keys or classes; the
//! executor simply skips it until it becomes eligible.
//!
//! # Key Design Decision: Cooperative Cancellation Only
//!
//! Running work is never aborted from outside. Supersession cancels the
//! running unit's token and the run notices at its next [`Checkpoint::check`]
//! call (or while racing [`Checkpoint::cancelled`] in a long await) and
//! unwinds with a supersession error. A run that never checkpoints occupies
//! the slot until it finishes; that is the documented cost of keeping
//! partial-effect windows impossible.
//!
//! Priority is strict. A sustained flood of typing-class work starves
//! background work; the metrics snapshot makes that visible when it happens.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, CoreResult, LockResultExt};
use crate::metrics::SchedulerMetrics;

use super::checkpoint::Checkpoint;
use super::class::RequestClass;

/// Logging target for the scheduler.
const LOG_TARGET: &str = "shirabe::scheduler";

/// How a run left the execution slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunOutcome {
    Completed,
    Failed,
    Canceled,
}

type ErasedRun =
    Box<dyn FnOnce(Checkpoint) -> Pin<Box<dyn Future<Output = RunOutcome> + Send>> + Send>;

/// A unit of work waiting for the execution slot.
struct QueuedUnit {
    class: RequestClass,
    key: Option<Arc<str>>,
    cancel: CancellationToken,
    enqueued_at: Instant,
    /// Earliest instant the executor may start this unit.
    eligible_at: Instant,
    run: ErasedRun,
    /// Side channel for the executor to settle the handle when the run
    /// itself can no longer send (it panicked and took the result sender
    /// down with it).
    failure: oneshot::Sender<CoreError>,
}

/// The unit currently occupying the execution slot.
struct RunningUnit {
    key: Option<Arc<str>>,
    cancel: CancellationToken,
}

/// What the executor should do next, decided under the queue lock.
enum Next {
    Unit(QueuedUnit),
    WaitUntil(Instant),
    Idle,
}

/// Queues and slot state, always mutated together under one lock so
/// supersession never races the pop-and-mark-running transition.
#[derive(Default)]
struct QueueSet {
    queues: [VecDeque<QueuedUnit>; RequestClass::COUNT],
    running: Option<RunningUnit>,
}

impl QueueSet {
    fn push(&mut self, unit: QueuedUnit) {
        self.queues[unit.class.index()].push_back(unit);
    }

    /// Remove every queued unit carrying `key`. Dropping a unit closes its
    /// result channel, which settles the caller's handle as superseded.
    fn discard_key(&mut self, key: &str) -> usize {
        let mut discarded = 0;
        for queue in &mut self.queues {
            let before = queue.len();
            queue.retain(|unit| unit.key.as_deref() != Some(key));
            discarded += before - queue.len();
        }
        discarded
    }

    /// Pop the oldest eligible unit from the highest-priority non-empty
    /// class and mark the slot busy, or report how long to wait.
    fn take_eligible(&mut self, now: Instant) -> Next {
        let mut earliest: Option<Instant> = None;
        for class in RequestClass::in_priority_order() {
            let queue = &mut self.queues[class.index()];
            if let Some(pos) = queue.iter().position(|unit| unit.eligible_at <= now) {
                if let Some(unit) = queue.remove(pos) {
                    self.running = Some(RunningUnit {
                        key: unit.key.clone(),
                        cancel: unit.cancel.clone(),
                    });
                    return Next::Unit(unit);
                }
            }
            for unit in queue.iter() {
                earliest = Some(match earliest {
                    Some(at) if at <= unit.eligible_at => at,
                    _ => unit.eligible_at,
                });
            }
        }
        match earliest {
            Some(at) => Next::WaitUntil(at),
            None => Next::Idle,
        }
    }

    fn drain_all(&mut self) -> usize {
        let mut drained = 0;
        for queue in &mut self.queues {
            drained += queue.len();
            queue.clear();
        }
        drained
    }

    #[cfg(test)]
    fn queued_len(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }
}

/// Shared state between scheduler handles and the executor task.
struct SchedulerInner {
    queues: Mutex<QueueSet>,
    /// Wakes the executor after a push, a shutdown, or anything else that
    /// changes what `take_eligible` would answer.
    work_ready: Notify,
}

/// Priority scheduler owning the single execution slot.
///
/// One instance is created per server and passed explicitly to everything
/// that submits work; there is no ambient global. Must be created inside a
/// Tokio runtime because construction spawns the executor task.
pub struct RequestScheduler {
    inner: Arc<SchedulerInner>,
    metrics: Arc<SchedulerMetrics>,
    shutdown: CancellationToken,
    executor: Mutex<Option<JoinHandle<()>>>,
}

impl RequestScheduler {
    pub fn new(metrics: Arc<SchedulerMetrics>) -> Self {
        let inner = Arc::new(SchedulerInner {
            queues: Mutex::new(QueueSet::default()),
            work_ready: Notify::new(),
        });
        let shutdown = CancellationToken::new();
        let executor = tokio::spawn(run_executor(
            Arc::clone(&inner),
            Arc::clone(&metrics),
            shutdown.clone(),
        ));
        Self {
            inner,
            metrics,
            shutdown,
            executor: Mutex::new(Some(executor)),
        }
    }

    /// Submit a unit of work and receive a handle resolving to its result.
    ///
    /// Registration is synchronous: by the time this returns, any queued unit
    /// with the same `key` has been discarded (its handle settles superseded)
    /// and a running unit with the same `key` has had its token cancelled.
    /// `coalesce_window` holds the unit back from execution so a newer
    /// same-key submission can replace it; it is ignored without a key.
    pub fn schedule<T, F, Fut>(
        &self,
        class: RequestClass,
        key: Option<&str>,
        coalesce_window: Option<Duration>,
        run: F,
    ) -> ScheduledRequest<T>
    where
        T: Send + 'static,
        F: FnOnce(Checkpoint) -> Fut + Send + 'static,
        Fut: Future<Output = CoreResult<T>> + Send + 'static,
    {
        self.metrics.record_scheduled();
        let key: Option<Arc<str>> = key.map(Arc::from);
        let (tx, rx) = oneshot::channel::<CoreResult<T>>();
        let (fail_tx, fail_rx) = oneshot::channel::<CoreError>();

        let run: ErasedRun = Box::new(move |checkpoint: Checkpoint| {
            Box::pin(async move {
                let result = run(checkpoint).await;
                let outcome = match &result {
                    Ok(_) => RunOutcome::Completed,
                    Err(err) if err.is_superseded() => RunOutcome::Canceled,
                    Err(_) => RunOutcome::Failed,
                };
                // The caller may have dropped its handle; the run's effects
                // stand either way.
                let _ = tx.send(result);
                outcome
            }) as Pin<Box<dyn Future<Output = RunOutcome> + Send>>
        });

        let now = Instant::now();
        let window = match (&key, coalesce_window) {
            (Some(_), Some(window)) => window,
            _ => Duration::ZERO,
        };
        let unit = QueuedUnit {
            class,
            key: key.clone(),
            cancel: CancellationToken::new(),
            enqueued_at: now,
            eligible_at: now + window,
            run,
            failure: fail_tx,
        };

        match self
            .inner
            .queues
            .lock()
            .recover_poison("RequestScheduler::schedule")
        {
            Ok(mut queues) => {
                if self.shutdown.is_cancelled() {
                    drop(queues);
                    log::trace!(target: LOG_TARGET, "Discarding unit scheduled after shutdown");
                    self.metrics.record_canceled();
                    return ScheduledRequest {
                        rx: Some(rx),
                        failure: fail_rx,
                        key,
                    };
                }
                if let Some(key) = unit.key.as_deref() {
                    let discarded = queues.discard_key(key);
                    for _ in 0..discarded {
                        self.metrics.record_canceled();
                    }
                    if discarded > 0 {
                        log::trace!(
                            target: LOG_TARGET,
                            "Superseded {} queued unit(s) for key {}",
                            discarded,
                            key
                        );
                    }
                    if let Some(running) = &queues.running
                        && running.key.as_deref() == Some(key)
                    {
                        running.cancel.cancel();
                        log::trace!(
                            target: LOG_TARGET,
                            "Cancelling running unit for key {} at its next checkpoint",
                            key
                        );
                    }
                }
                queues.push(unit);
            }
            Err(_) => {
                // recover_poison never returns Err; keep the handle coherent anyway.
                self.metrics.record_canceled();
                return ScheduledRequest {
                    rx: Some(rx),
                    failure: fail_rx,
                    key,
                };
            }
        }
        self.inner.work_ready.notify_one();
        ScheduledRequest {
            rx: Some(rx),
            failure: fail_rx,
            key,
        }
    }

    /// Borrow the shared metrics recorder.
    pub fn metrics(&self) -> &Arc<SchedulerMetrics> {
        &self.metrics
    }

    /// Point-in-time metrics snapshot.
    pub fn snapshot_metrics(&self) -> crate::metrics::MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Discard all queued work, cancel the running unit and stop the
    /// executor. Waits for the in-flight run, if any, to settle.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let discarded = match self
            .inner
            .queues
            .lock()
            .recover_poison("RequestScheduler::shutdown")
        {
            Ok(mut queues) => {
                if let Some(running) = &queues.running {
                    running.cancel.cancel();
                }
                queues.drain_all()
            }
            Err(_) => 0,
        };
        for _ in 0..discarded {
            self.metrics.record_canceled();
        }
        self.inner.work_ready.notify_one();

        let executor = match self
            .executor
            .lock()
            .recover_poison("RequestScheduler::shutdown executor")
        {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(executor) = executor {
            if let Err(err) = executor.await {
                log::warn!(target: LOG_TARGET, "Executor task ended abnormally: {}", err);
            }
        }
        log::debug!(target: LOG_TARGET, "Scheduler shut down, {} unit(s) discarded", discarded);
    }
}

impl Drop for RequestScheduler {
    fn drop(&mut self) {
        // Orderly teardown goes through shutdown(); this only stops the
        // executor task from idling forever.
        self.shutdown.cancel();
        self.inner.work_ready.notify_one();
    }
}

/// Handle resolving to a scheduled run's result.
///
/// Settles with a supersession error when the unit is discarded before it
/// runs, and with [`CoreError::Internal`] when the run panics. Dropping the
/// handle does not cancel the unit; key supersession is the only way queued
/// work is discarded.
pub struct ScheduledRequest<T> {
    /// Taken once the run-side sender is gone; the failure channel decides
    /// what that means.
    rx: Option<oneshot::Receiver<CoreResult<T>>>,
    failure: oneshot::Receiver<CoreError>,
    key: Option<Arc<str>>,
}

impl<T> Future for ScheduledRequest<T> {
    type Output = CoreResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(rx) = this.rx.as_mut() {
            match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(result)) => return Poll::Ready(result),
                Poll::Ready(Err(_)) => {
                    this.rx = None;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
        // The run never sent a result. Wait for the executor's verdict: a
        // panic report, or a closed channel meaning the unit was discarded.
        match Pin::new(&mut this.failure).poll(cx) {
            Poll::Ready(Ok(err)) => Poll::Ready(Err(err)),
            Poll::Ready(Err(_)) => {
                Poll::Ready(Err(CoreError::superseded(this.key.as_deref())))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Executor loop: pick eligible units one at a time and run each on its own
/// task so a panicking run cannot take the slot down with it.
async fn run_executor(
    inner: Arc<SchedulerInner>,
    metrics: Arc<SchedulerMetrics>,
    shutdown: CancellationToken,
) {
    loop {
        let unit = loop {
            let next = match inner
                .queues
                .lock()
                .recover_poison("RequestScheduler::executor")
            {
                Ok(mut queues) => queues.take_eligible(Instant::now()),
                Err(_) => return,
            };
            match next {
                Next::Unit(unit) => break unit,
                Next::WaitUntil(at) => {
                    tokio::select! {
                        _ = inner.work_ready.notified() => {}
                        _ = shutdown.cancelled() => return,
                        _ = tokio::time::sleep_until(at) => {}
                    }
                }
                Next::Idle => {
                    tokio::select! {
                        _ = inner.work_ready.notified() => {}
                        _ = shutdown.cancelled() => return,
                    }
                }
            }
        };

        let queue_wait = unit.enqueued_at.elapsed();
        metrics.record_started(unit.class, queue_wait);
        log::trace!(
            target: LOG_TARGET,
            "Starting {} unit after {:?} queued (key: {:?})",
            unit.class,
            queue_wait,
            unit.key.as_deref()
        );

        let checkpoint = Checkpoint::new(unit.cancel.clone(), unit.key.clone());
        let join = tokio::spawn((unit.run)(checkpoint));
        let outcome = match join.await {
            Ok(outcome) => outcome,
            Err(err) => {
                log::warn!(target: LOG_TARGET, "Scheduled run aborted abnormally: {}", err);
                // A panic destroyed the run's result sender; settle the
                // handle through the side channel so the caller sees a
                // failure, not a supersession.
                if err.is_panic() {
                    let _ = unit
                        .failure
                        .send(CoreError::internal(format!("scheduled run panicked: {err}")));
                }
                RunOutcome::Failed
            }
        };
        match outcome {
            RunOutcome::Completed => metrics.record_completed(),
            RunOutcome::Failed => metrics.record_failed(),
            RunOutcome::Canceled => metrics.record_canceled(),
        }

        if let Ok(mut queues) = inner
            .queues
            .lock()
            .recover_poison("RequestScheduler::executor release")
        {
            queues.running = None;
        }
    }
}
