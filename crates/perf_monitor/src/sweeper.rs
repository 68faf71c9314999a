//! Retention sweeping.
//!
//! Completed records older than the retention window are evicted on a fixed
//! interval. In-flight records are never evicted.

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::monitor::PerfMonitor;

impl PerfMonitor {
    /// Evict completed records whose timestamp is older than the retention
    /// window. A record aged exactly the window is kept.
    ///
    /// Does nothing while the monitor is disabled. Returns the number of
    /// evicted records.
    pub fn sweep(&self) -> usize {
        if !self.is_enabled() {
            return 0;
        }
        let Ok(retention) = chrono::Duration::from_std(self.retention()) else {
            return 0;
        };
        let Some(cutoff) = self.clock().wall_clock().checked_sub_signed(retention) else {
            return 0;
        };

        let (evicted, remaining) = {
            let mut store = self.lock_store();
            let evicted = store.evict_completed_before(cutoff);
            (evicted, store.len())
        };
        if evicted > 0 {
            tracing::debug!(target: "perf::sweep", evicted, remaining, "evicted expired records");
        }
        evicted
    }
}

/// Spawn a task that calls [`PerfMonitor::sweep`] every sweep interval.
///
/// The first sweep happens one interval after spawning. Abort the returned
/// handle to stop.
pub fn spawn_sweeper(monitor: PerfMonitor) -> JoinHandle<()> {
    let period = monitor.sweep_interval();
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            monitor.sweep();
        }
    })
}
