//! Background task lifecycle.

use tokio::task::JoinHandle;

use crate::long_task::{spawn_long_task_bridge, LongTaskSource};
use crate::monitor::PerfMonitor;
use crate::sweeper::spawn_sweeper;

/// Handles to the monitor's background tasks.
///
/// Tasks are aborted on [`shutdown`](Self::shutdown) or when this value is
/// dropped.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    sweeper: Option<JoinHandle<()>>,
    bridge: Option<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Whether any task is still running.
    pub fn is_running(&self) -> bool {
        [&self.sweeper, &self.bridge]
            .into_iter()
            .flatten()
            .any(|handle| !handle.is_finished())
    }

    /// Stop all tasks and wait for them to wind down.
    pub async fn shutdown(mut self) {
        for handle in self.take_handles() {
            handle.abort();
            // cancellation is the expected outcome
            let _ = handle.await;
        }
        tracing::debug!(target: "perf", "background tasks stopped");
    }

    fn take_handles(&mut self) -> impl Iterator<Item = JoinHandle<()>> {
        [self.sweeper.take(), self.bridge.take()].into_iter().flatten()
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        for handle in self.take_handles() {
            handle.abort();
        }
    }
}

impl PerfMonitor {
    /// Start the retention sweeper and the long-task bridge.
    ///
    /// Must be called from within a tokio runtime. Without one, nothing is
    /// spawned and the monitor keeps working without sweeping or long-task
    /// capture.
    pub fn run(&self, source: &dyn LongTaskSource) -> BackgroundTasks {
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::warn!(target: "perf", "no tokio runtime, background tasks not started");
            return BackgroundTasks::default();
        }

        tracing::info!(
            target: "perf",
            sweep_interval_secs = self.sweep_interval().as_secs(),
            retention_secs = self.retention().as_secs(),
            "starting background tasks"
        );
        BackgroundTasks {
            sweeper: Some(spawn_sweeper(self.clone())),
            bridge: Some(spawn_long_task_bridge(self.clone(), source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::clock::ManualClock;
    use crate::config::MonitorConfig;
    use crate::long_task::{ChannelLongTaskSource, LongTaskEvent, NoopLongTaskSource};
    use crate::record::AdditionalData;
    use std::time::Duration;

    #[test]
    fn test_run_without_runtime_spawns_nothing() {
        let monitor = PerfMonitor::new(MonitorConfig::default());
        let tasks = monitor.run(&NoopLongTaskSource);
        assert!(!tasks.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sweeps_and_bridges() {
        let clock = ManualClock::new();
        let config = MonitorConfig::default()
            .with_retention_secs(60)
            .with_sweep_interval_secs(30);
        let monitor = PerfMonitor::with_clock(config, clock.clone());
        let source = ChannelLongTaskSource::new();

        let tasks = monitor.run(&source);
        assert!(tasks.is_running());

        let token = monitor.start("old", Category::GENERAL);
        monitor.end(token, AdditionalData::new());
        clock.advance(Duration::from_secs(120));

        source.report(LongTaskEvent::new(0.0, 75.0));
        tokio::time::sleep(Duration::from_secs(31)).await;

        let stats = monitor.stats();
        assert!(stats.category(&Category::GENERAL).is_none());
        assert_eq!(stats.category(&Category::LONG_TASK).unwrap().count, 1);

        tasks.shutdown().await;
    }

    #[tokio::test]
    async fn test_drop_aborts_tasks() {
        let monitor = PerfMonitor::new(MonitorConfig::default());
        let source = ChannelLongTaskSource::new();
        let tasks = monitor.run(&source);
        assert_eq!(source.subscriber_count(), 1);

        drop(tasks);
        for _ in 0..10 {
            if source.subscriber_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(source.report(LongTaskEvent::new(0.0, 60.0)), 0);
    }
}
