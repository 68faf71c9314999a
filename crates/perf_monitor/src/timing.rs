//! Scoped measurement guards.

use serde_json::Value;

use crate::category::Category;
use crate::monitor::{MeasureToken, PerfMonitor};
use crate::record::AdditionalData;

/// A measurement that ends when the guard is dropped.
///
/// Guarantees `end` is called on every exit path, including early returns
/// and panics. A guard dropped while unwinding tags its record with
/// `{"error": "panicked", "panicked": true}`.
///
/// # Example
///
/// ```rust
/// use perf_monitor::{Category, MonitorConfig, PerfMonitor};
///
/// let monitor = PerfMonitor::new(MonitorConfig::default());
///
/// fn layout_page(monitor: &PerfMonitor) {
///     let _guard = monitor.scope("layout_page", Category::COMPUTATION);
///     // ... layout code ...
/// } // record ends here
///
/// layout_page(&monitor);
/// assert_eq!(monitor.stats().summary.unwrap().in_flight, 0);
/// ```
#[must_use = "dropping the guard ends the measurement immediately"]
pub struct MeasureGuard {
    monitor: PerfMonitor,
    token: MeasureToken,
    finished: bool,
}

impl MeasureGuard {
    /// The token of the underlying record.
    #[inline]
    pub fn token(&self) -> MeasureToken {
        self.token
    }

    /// End the measurement now, attaching `additional_data`.
    ///
    /// Returns the duration, as [`PerfMonitor::end`] does.
    pub fn finish(mut self, additional_data: AdditionalData) -> Option<f64> {
        self.finished = true;
        self.monitor.end(self.token, additional_data)
    }
}

impl Drop for MeasureGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut data = AdditionalData::new();
        if std::thread::panicking() {
            data.insert("error".to_string(), Value::String("panicked".to_string()));
            data.insert("panicked".to_string(), Value::Bool(true));
        }
        self.monitor.end(self.token, data);
    }
}

impl PerfMonitor {
    /// Start a measurement bound to the returned guard.
    pub fn scope(&self, name: impl Into<String>, category: impl Into<Category>) -> MeasureGuard {
        MeasureGuard {
            token: self.start(name, category),
            monitor: self.clone(),
            finished: false,
        }
    }
}

/// Measure the rest of the enclosing scope.
///
/// # Example
///
/// ```rust
/// use perf_monitor::{measure_scope, Category, MonitorConfig, PerfMonitor};
///
/// let monitor = PerfMonitor::new(MonitorConfig::default());
/// {
///     measure_scope!(monitor, "paint", Category::RENDER);
///     // ... paint ...
/// }
/// assert_eq!(monitor.record_count(), 1);
/// ```
#[macro_export]
macro_rules! measure_scope {
    ($monitor:expr, $name:expr) => {
        let _measure_guard = $monitor.scope($name, $crate::Category::GENERAL);
    };
    ($monitor:expr, $name:expr, $category:expr) => {
        let _measure_guard = $monitor.scope($name, $category);
    };
}
