//! Bridge from an external long-task facility into the metric store.
//!
//! Long tasks are reported after the fact, so they bypass start/end and are
//! inserted directly as completed records in [`Category::LONG_TASK`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::category::Category;
use crate::error::{PerfError, PerfResult};
use crate::monitor::PerfMonitor;
use crate::record::{AdditionalData, RecordId};

/// One blocking task reported by the external facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongTaskEvent {
    /// How long the task blocked, in milliseconds
    pub duration: f64,
    /// Monotonic start time, in milliseconds
    pub start_time: f64,
    /// What the facility blamed the task on, if anything
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
}

impl LongTaskEvent {
    /// Create an event without attribution.
    pub fn new(start_time: f64, duration: f64) -> Self {
        Self {
            duration,
            start_time,
            attribution: None,
        }
    }

    /// Attach an attribution.
    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = Some(attribution.into());
        self
    }
}

/// Source of long-task events.
pub trait LongTaskSource: Send + Sync {
    /// Start observing. Events arrive on the returned channel until the
    /// source goes away.
    fn subscribe(&self, capacity: usize) -> PerfResult<mpsc::Receiver<LongTaskEvent>>;
}

/// Source used where no long-task facility exists. Its channel is closed
/// from the start.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLongTaskSource;

impl LongTaskSource for NoopLongTaskSource {
    fn subscribe(&self, _capacity: usize) -> PerfResult<mpsc::Receiver<LongTaskEvent>> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }
}

/// In-process source that fans reported events out to every subscriber.
///
/// Embedders hold a clone and call [`report`](Self::report) from whatever
/// observes blocking work.
#[derive(Debug, Clone, Default)]
pub struct ChannelLongTaskSource {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<LongTaskEvent>>>>,
}

impl ChannelLongTaskSource {
    /// Create a source with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every live subscriber. Returns how many
    /// accepted it; a full subscriber drops the event.
    pub fn report(&self, event: LongTaskEvent) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(target: "perf::long_task", "long-task channel full, dropping event");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        delivered
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }
}

impl LongTaskSource for ChannelLongTaskSource {
    fn subscribe(&self, capacity: usize) -> PerfResult<mpsc::Receiver<LongTaskEvent>> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        Ok(rx)
    }
}

impl PerfMonitor {
    /// Record a reported long task as a completed record.
    ///
    /// Returns `None` while the monitor is disabled.
    pub fn record_long_task(&self, event: &LongTaskEvent) -> Option<RecordId> {
        if !self.is_enabled() {
            return None;
        }
        let mut data = AdditionalData::new();
        if let Some(attribution) = &event.attribution {
            data.insert("attribution".to_string(), Value::String(attribution.clone()));
        }
        self.insert_completed(
            Category::LONG_TASK.as_str().to_string(),
            Category::LONG_TASK,
            event.start_time,
            event.duration,
            data,
        )
    }
}

/// Subscribe to `source` and forward its events into `monitor`.
///
/// A source that cannot be subscribed to is logged and replaced with
/// [`NoopLongTaskSource`]. The returned task ends when the source closes.
pub fn spawn_long_task_bridge(monitor: PerfMonitor, source: &dyn LongTaskSource) -> JoinHandle<()> {
    let capacity = monitor.long_task_capacity();
    let mut events = match source.subscribe(capacity) {
        Ok(events) => events,
        Err(err) => {
            tracing::warn!(target: "perf::long_task", error = %err, "long-task observation unavailable");
            subscribe_noop(capacity)
        }
    };

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            monitor.record_long_task(&event);
        }
        tracing::debug!(target: "perf::long_task", "long-task source closed");
    })
}

fn subscribe_noop(capacity: usize) -> mpsc::Receiver<LongTaskEvent> {
    match NoopLongTaskSource.subscribe(capacity) {
        Ok(events) => events,
        Err(_) => mpsc::channel(1).1,
    }
}

/// Source that always fails to subscribe.
#[derive(Debug, Clone, Default)]
pub struct UnavailableLongTaskSource {
    reason: String,
}

impl UnavailableLongTaskSource {
    /// Create a source that reports `reason` when subscribed to.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl LongTaskSource for UnavailableLongTaskSource {
    fn subscribe(&self, _capacity: usize) -> PerfResult<mpsc::Receiver<LongTaskEvent>> {
        Err(PerfError::SourceUnavailable(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::MonitorConfig;

    fn monitor() -> PerfMonitor {
        PerfMonitor::with_clock(MonitorConfig::default(), ManualClock::new())
    }

    #[test]
    fn test_record_long_task_inserts_completed_record() {
        let monitor = monitor();
        let id = monitor
            .record_long_task(&LongTaskEvent::new(100.0, 120.0).with_attribution("script"))
            .unwrap();

        let record = monitor.record(id).unwrap();
        assert_eq!(record.category, Category::LONG_TASK);
        assert_eq!(record.start_time, 100.0);
        assert_eq!(record.end_time(), Some(220.0));
        assert_eq!(record.duration(), Some(120.0));
        assert_eq!(record.threshold(), Some(50.0));
        assert!(record.is_slow());
        assert_eq!(record.additional_data["attribution"], "script");
    }

    #[test]
    fn test_short_long_task_is_not_slow() {
        let monitor = monitor();
        let id = monitor.record_long_task(&LongTaskEvent::new(0.0, 50.0)).unwrap();
        assert!(!monitor.record(id).unwrap().is_slow());
    }

    #[test]
    fn test_record_long_task_disabled() {
        let monitor = monitor();
        monitor.set_enabled(false, false);
        assert!(monitor.record_long_task(&LongTaskEvent::new(0.0, 500.0)).is_none());
        assert_eq!(monitor.record_count(), 0);
    }

    #[test]
    fn test_channel_source_drops_closed_subscribers() {
        let source = ChannelLongTaskSource::new();
        let rx = source.subscribe(4).unwrap();
        let _kept = source.subscribe(4).unwrap();
        drop(rx);

        assert_eq!(source.report(LongTaskEvent::new(0.0, 60.0)), 1);
        assert_eq!(source.subscriber_count(), 1);
    }

    #[test]
    fn test_channel_source_full_drops_event() {
        let source = ChannelLongTaskSource::new();
        let mut rx = source.subscribe(1).unwrap();

        assert_eq!(source.report(LongTaskEvent::new(0.0, 60.0)), 1);
        assert_eq!(source.report(LongTaskEvent::new(1.0, 70.0)), 0);
        assert_eq!(rx.try_recv().unwrap().duration, 60.0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_bridge_forwards_events() {
        let monitor = monitor();
        let source = ChannelLongTaskSource::new();
        let bridge = spawn_long_task_bridge(monitor.clone(), &source);

        source.report(LongTaskEvent::new(0.0, 80.0));
        source.report(LongTaskEvent::new(100.0, 20.0));
        drop(source);
        bridge.await.unwrap();

        let stats = monitor.stats();
        let long_tasks = stats.category(&Category::LONG_TASK).unwrap();
        assert_eq!(long_tasks.count, 2);
        assert_eq!(long_tasks.slow_count, 1);
        assert_eq!(long_tasks.max_duration, 80.0);
    }

    #[tokio::test]
    async fn test_unavailable_source_degrades_to_noop() {
        let monitor = monitor();
        let bridge = spawn_long_task_bridge(
            monitor.clone(),
            &UnavailableLongTaskSource::new("not supported"),
        );

        bridge.await.unwrap();
        assert_eq!(monitor.record_count(), 0);

        // the rest of the monitor is unaffected
        let token = monitor.start("still works", Category::GENERAL);
        assert!(!token.is_inert());
    }

    #[tokio::test]
    async fn test_noop_source_closes_immediately() {
        let mut events = NoopLongTaskSource.subscribe(8).unwrap();
        assert!(events.recv().await.is_none());
    }
}
