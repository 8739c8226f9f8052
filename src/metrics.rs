//! Passive metrics recorder for the request scheduler.
//!
//! The scheduler records counter transitions and queue-wait samples here as
//! part of its own state transitions, so the counts stay consistent with what
//! the queues and the execution slot actually did. The recorder never drives
//! behavior; it only observes and hands out snapshots.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LockResultExt;
use crate::schedule::RequestClass;

/// Shared recorder for scheduler activity.
///
/// Counter updates use atomics so recording never blocks; queue-wait samples
/// sit behind a mutex taken once per execution start.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    scheduled: AtomicU64,
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    canceled: AtomicU64,
    queue_wait_ms: Mutex<[Vec<f64>; RequestClass::COUNT]>,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a unit entering a queue.
    pub fn record_scheduled(&self) {
        self.scheduled.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a unit leaving its queue for the execution slot, with the time
    /// it spent waiting there.
    pub fn record_started(&self, class: RequestClass, queue_wait: Duration) {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut samples) = self
            .queue_wait_ms
            .lock()
            .recover_poison("SchedulerMetrics::record_started")
        {
            samples[class.index()].push(queue_wait.as_secs_f64() * 1000.0);
        }
    }

    /// Record a unit finishing its run successfully.
    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a unit finishing its run with an error.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a unit discarded before starting or stopped at a checkpoint.
    pub fn record_canceled(&self) {
        self.canceled.fetch_add(1, Ordering::SeqCst);
    }

    /// Point-in-time view of everything recorded so far.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let queue_wait_ms = match self
            .queue_wait_ms
            .lock()
            .recover_poison("SchedulerMetrics::snapshot")
        {
            Ok(samples) => QueueWaitSamples {
                typing: samples[RequestClass::Typing.index()].clone(),
                interactive: samples[RequestClass::Interactive.index()].clone(),
                background: samples[RequestClass::Background.index()].clone(),
            },
            Err(_) => QueueWaitSamples::default(),
        };
        MetricsSnapshot {
            scheduled: self.scheduled.load(Ordering::SeqCst),
            started: self.started.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            canceled: self.canceled.load(Ordering::SeqCst),
            queue_wait_ms,
        }
    }
}

/// Owned snapshot of scheduler metrics for observability and triage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricsSnapshot {
    /// Units accepted into a queue.
    pub scheduled: u64,
    /// Units that reached the execution slot.
    pub started: u64,
    /// Units that ran to completion.
    pub completed: u64,
    /// Units whose run ended in an error.
    pub failed: u64,
    /// Units discarded while queued or stopped at a checkpoint.
    pub canceled: u64,
    /// Queue-wait samples in milliseconds, grouped by request class.
    pub queue_wait_ms: QueueWaitSamples,
}

/// Per-class queue-wait samples, each recorded at execution start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QueueWaitSamples {
    pub typing: Vec<f64>,
    pub interactive: Vec<f64>,
    pub background: Vec<f64>,
}

impl QueueWaitSamples {
    /// Samples for one class, mostly useful in assertions.
    pub fn for_class(&self, class: RequestClass) -> &[f64] {
        match class {
            RequestClass::Typing => &self.typing,
            RequestClass::Interactive => &self.interactive,
            RequestClass::Background => &self.background,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_default_is_all_zero() {
        let snapshot = SchedulerMetrics::new().snapshot();
        assert_eq!(snapshot.scheduled, 0);
        assert_eq!(snapshot.started, 0);
        assert_eq!(snapshot.completed, 0);
        assert_eq!(snapshot.failed, 0);
        assert_eq!(snapshot.canceled, 0);
        assert!(snapshot.queue_wait_ms.typing.is_empty());
        assert!(snapshot.queue_wait_ms.interactive.is_empty());
        assert!(snapshot.queue_wait_ms.background.is_empty());
    }

    #[test]
    fn counters_accumulate() {
        let metrics = SchedulerMetrics::new();
        metrics.record_scheduled();
        metrics.record_scheduled();
        metrics.record_started(RequestClass::Typing, Duration::from_millis(2));
        metrics.record_completed();
        metrics.record_canceled();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.scheduled, 2);
        assert_eq!(snapshot.started, 1);
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.failed, 0);
        assert_eq!(snapshot.canceled, 1);
    }

    #[test]
    fn queue_wait_samples_land_in_their_class() {
        let metrics = SchedulerMetrics::new();
        metrics.record_started(RequestClass::Background, Duration::from_millis(10));
        metrics.record_started(RequestClass::Background, Duration::from_millis(20));
        metrics.record_started(RequestClass::Interactive, Duration::from_millis(1));

        let samples = metrics.snapshot().queue_wait_ms;
        assert_eq!(samples.background.len(), 2);
        assert_eq!(samples.interactive.len(), 1);
        assert!(samples.typing.is_empty());
        assert!(samples.background[0] >= 10.0);
        assert!(samples.background[1] >= 20.0);
    }

    #[test]
    fn snapshot_serializes_for_observability() {
        let metrics = SchedulerMetrics::new();
        metrics.record_scheduled();
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["scheduled"], 1);
        assert!(json["queue_wait_ms"]["typing"].as_array().unwrap().is_empty());
    }
}
