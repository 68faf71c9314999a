//! Performance Monitoring
//!
//! This crate provides timing instrumentation for interactive applications:
//! - Start/end measurements with per-category slow thresholds
//! - RAII guards, closure/future adapters and lifecycle hook decorators
//! - Aggregate statistics and slowest-operation reports
//! - Time-based retention with a background sweeper
//! - Long-task capture from an external event source
//! - Runtime enable/disable with persisted settings
//!
//! # Logging
//!
//! Diagnostics go through `tracing` under these targets:
//!
//! - `perf::slow`: every slow completion, at `warn`
//! - `perf::trace`: every completion when detailed tracing is on, at `debug`
//! - `perf::sweep`: retention evictions
//! - `perf::long_task`: long-task source status
//! - `perf::settings`: settings resolution and persistence
//!
//! # Example
//!
//! ```rust
//! use perf_monitor::{measure_scope, AdditionalData, Category, MonitorConfig, PerfMonitor};
//!
//! let monitor = PerfMonitor::new(MonitorConfig::default());
//!
//! let token = monitor.start("fetch_user", Category::API);
//! // ... request ...
//! monitor.end(token, AdditionalData::new());
//!
//! fn do_layout(monitor: &PerfMonitor) {
//!     measure_scope!(monitor, "layout", Category::COMPUTATION);
//!     // ... layout code ...
//! }
//! do_layout(&monitor);
//!
//! let stats = monitor.stats();
//! assert_eq!(stats.summary.unwrap().total_records, 2);
//! ```

mod adapters;
mod category;
mod clock;
mod config;
mod error;
mod global;
mod instrument;
mod long_task;
mod monitor;
mod record;
mod settings;
mod stats;
mod store;
mod sweeper;
mod tasks;
mod threshold;
mod timing;

pub use adapters::TimedFuture;
pub use category::Category;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MonitorConfig;
pub use error::{PerfError, PerfResult};
pub use global::{global, install_global};
pub use instrument::{instrument_methods, method_category, Instrumented, LifecycleHooks, LIFECYCLE_METHODS};
pub use long_task::{
    spawn_long_task_bridge, ChannelLongTaskSource, LongTaskEvent, LongTaskSource, NoopLongTaskSource,
    UnavailableLongTaskSource,
};
pub use monitor::{MeasureToken, PerfMonitor};
pub use record::{AdditionalData, MeasurementRecord, RecordId, RecordState};
pub use settings::{
    parse_flag, persist_settings, resolve_initial_settings, resolve_settings, JsonFileSettings, MemorySettings,
    MonitorSettings, SettingsStore, ENV_VAR,
};
pub use stats::{slowest, CategorySummary, PerfStats, SlowOperation, StoreSummary};
pub use store::MetricStore;
pub use sweeper::spawn_sweeper;
pub use tasks::BackgroundTasks;
pub use threshold::{Severity, ThresholdTable, DEFAULT_THRESHOLD_MS};
pub use timing::MeasureGuard;
