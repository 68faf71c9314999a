//! The performance monitor service and its start/end measurement API.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::category::Category;
use crate::clock::{Clock, SystemClock};
use crate::config::MonitorConfig;
use crate::record::{AdditionalData, MeasurementRecord, RecordId};
use crate::settings::MonitorSettings;
use crate::store::MetricStore;
use crate::threshold::{Severity, ThresholdTable};

/// Handle returned by [`PerfMonitor::start`] and consumed by
/// [`PerfMonitor::end`].
///
/// A token issued while the monitor is disabled is inert: ending it is a
/// cheap no-op, so call sites never branch on the enabled state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeasureToken(Option<RecordId>);

impl MeasureToken {
    /// A token that refers to no record.
    pub const fn inert() -> Self {
        Self(None)
    }

    /// The record this token addresses, if any.
    pub const fn id(&self) -> Option<RecordId> {
        self.0
    }

    /// Check whether the token addresses no record.
    pub const fn is_inert(&self) -> bool {
        self.0.is_none()
    }
}

struct Inner {
    store: Mutex<MetricStore>,
    thresholds: ThresholdTable,
    retention: Duration,
    sweep_interval: Duration,
    long_task_capacity: usize,
    enabled: AtomicBool,
    detailed_tracing: AtomicBool,
    next_id: AtomicU64,
    clock: Arc<dyn Clock>,
}

/// Process-wide performance instrumentation service.
///
/// Cloning is cheap and every clone shares the same store and state, so one
/// instance can be handed to every component that instruments itself.
///
/// # Example
///
/// ```rust
/// use perf_monitor::{AdditionalData, Category, MonitorConfig, PerfMonitor};
///
/// let monitor = PerfMonitor::new(MonitorConfig::default());
///
/// let token = monitor.start("load_profile", Category::API);
/// // ... perform the request ...
/// let duration = monitor.end(token, AdditionalData::new());
/// assert!(duration.is_some());
///
/// let stats = monitor.stats();
/// assert!(stats.enabled);
/// ```
#[derive(Clone)]
pub struct PerfMonitor {
    inner: Arc<Inner>,
}

/// Data needed to surface one completion through tracing.
struct Completion {
    name: String,
    category: Category,
    duration: f64,
    threshold: f64,
    is_slow: bool,
}

impl PerfMonitor {
    /// Create a monitor driven by the system clock.
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_clock(config, SystemClock::new())
    }

    /// Create a monitor driven by the given clock.
    pub fn with_clock(config: MonitorConfig, clock: impl Clock) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(MetricStore::new()),
                retention: config.retention(),
                sweep_interval: config.sweep_interval(),
                thresholds: config.thresholds,
                long_task_capacity: config.long_task_channel_capacity.max(1),
                enabled: AtomicBool::new(config.enabled),
                detailed_tracing: AtomicBool::new(config.detailed_tracing),
                next_id: AtomicU64::new(1),
                clock: Arc::new(clock),
            }),
        }
    }

    /// Open a timed record.
    ///
    /// Returns an inert token when the monitor is disabled.
    pub fn start(&self, name: impl Into<String>, category: impl Into<Category>) -> MeasureToken {
        if !self.is_enabled() {
            return MeasureToken::inert();
        }

        let id = self.allocate_id();
        let record = MeasurementRecord::in_flight(
            id,
            name,
            category.into(),
            self.inner.clock.now_ms(),
            self.inner.clock.wall_clock(),
        );

        match self.lock_store().insert(record) {
            Ok(id) => MeasureToken(Some(id)),
            Err(err) => {
                tracing::warn!(target: "perf", error = %err, "failed to open measurement");
                MeasureToken::inert()
            }
        }
    }

    /// Close the record addressed by `token`.
    ///
    /// Returns the duration in milliseconds, or `None` when the monitor is
    /// disabled or the token does not address an in-flight record (inert,
    /// already ended, or evicted). Never affects any other record.
    pub fn end(&self, token: MeasureToken, additional_data: AdditionalData) -> Option<f64> {
        if !self.is_enabled() {
            return None;
        }
        let id = token.id()?;
        let end_time = self.inner.clock.now_ms();
        let timestamp = self.inner.clock.wall_clock();
        let traced = self.is_detailed_tracing();

        let completion = {
            let mut store = self.lock_store();
            let record = store.get_mut(id)?;
            let threshold = self.inner.thresholds.resolve(&record.category);
            let duration = record.complete(end_time, threshold, timestamp, additional_data)?;
            Completion {
                name: record.name.clone(),
                category: record.category.clone(),
                duration,
                threshold,
                is_slow: record.is_slow(),
            }
        };

        if completion.is_slow || traced {
            surface(&completion);
        }
        Some(completion.duration)
    }

    /// Insert a record that completed outside the start/end API.
    pub(crate) fn insert_completed(
        &self,
        name: impl Into<String>,
        category: Category,
        start_time: f64,
        duration: f64,
        additional_data: AdditionalData,
    ) -> Option<RecordId> {
        let id = self.allocate_id();
        let timestamp = self.inner.clock.wall_clock();
        let threshold = self.inner.thresholds.resolve(&category);

        let mut record = MeasurementRecord::in_flight(id, name, category, start_time, timestamp);
        record.complete(start_time + duration.max(0.0), threshold, timestamp, additional_data);
        let completion = Completion {
            name: record.name.clone(),
            category: record.category.clone(),
            duration: record.duration().unwrap_or_default(),
            threshold,
            is_slow: record.is_slow(),
        };

        if let Err(err) = self.lock_store().insert(record) {
            tracing::warn!(target: "perf", error = %err, "failed to insert completed record");
            return None;
        }
        if completion.is_slow || self.is_detailed_tracing() {
            surface(&completion);
        }
        Some(id)
    }

    /// Toggle recording and detailed tracing.
    ///
    /// Disabling stops new records; existing history is left untouched.
    pub fn set_enabled(&self, enabled: bool, detailed_tracing: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
        self.inner
            .detailed_tracing
            .store(detailed_tracing, Ordering::SeqCst);
        tracing::info!(target: "perf", enabled, detailed_tracing, "performance monitoring toggled");
    }

    /// Check if recording is enabled.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Check if every completion is traced. Only meaningful while enabled.
    #[inline]
    pub fn is_detailed_tracing(&self) -> bool {
        self.is_enabled() && self.inner.detailed_tracing.load(Ordering::SeqCst)
    }

    /// Current flag pair, in the shape the settings store persists.
    pub fn settings(&self) -> MonitorSettings {
        MonitorSettings {
            enabled: self.is_enabled(),
            detailed_tracing: self.inner.detailed_tracing.load(Ordering::SeqCst),
        }
    }

    /// Apply a flag pair loaded from a settings store.
    pub fn apply_settings(&self, settings: &MonitorSettings) {
        self.set_enabled(settings.enabled, settings.detailed_tracing);
    }

    /// Threshold table fixed at construction.
    pub fn thresholds(&self) -> &ThresholdTable {
        &self.inner.thresholds
    }

    /// Retention window for completed records.
    pub fn retention(&self) -> Duration {
        self.inner.retention
    }

    /// Interval between background sweeps.
    pub fn sweep_interval(&self) -> Duration {
        self.inner.sweep_interval
    }

    pub(crate) fn long_task_capacity(&self) -> usize {
        self.inner.long_task_capacity
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    /// Current monotonic time on the monitor's clock, in milliseconds.
    ///
    /// Long-task sources use this to stamp events on the same timeline as
    /// start/end records.
    pub fn now_ms(&self) -> f64 {
        self.inner.clock.now_ms()
    }

    /// Snapshot of one record.
    pub fn record(&self, id: RecordId) -> Option<MeasurementRecord> {
        self.lock_store().get(id).cloned()
    }

    /// Number of stored records, in-flight and completed.
    pub fn record_count(&self) -> usize {
        self.lock_store().len()
    }

    /// Drop every record. Intended for tests and debugging sessions.
    pub fn reset(&self) {
        self.lock_store().clear();
    }

    pub(crate) fn lock_store(&self) -> MutexGuard<'_, MetricStore> {
        self.inner
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate_id(&self) -> RecordId {
        RecordId::from_raw(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for PerfMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerfMonitor")
            .field("enabled", &self.is_enabled())
            .field("detailed_tracing", &self.is_detailed_tracing())
            .field("records", &self.record_count())
            .field("thresholds", &self.inner.thresholds)
            .finish()
    }
}

/// Emit a completion on the tracing channel. Slow operations always warn.
fn surface(completion: &Completion) {
    if completion.is_slow {
        tracing::warn!(
            target: "perf::slow",
            name = %completion.name,
            category = %completion.category,
            duration_ms = completion.duration,
            threshold_ms = completion.threshold,
            severity = ?Severity::classify(completion.duration, completion.threshold),
            "slow operation"
        );
    } else {
        tracing::debug!(
            target: "perf::trace",
            name = %completion.name,
            category = %completion.category,
            duration_ms = completion.duration,
            threshold_ms = completion.threshold,
            "operation completed"
        );
    }
}
