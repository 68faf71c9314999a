//! Aggregate statistics derived from the metric store.
//!
//! Nothing here is cached: every call recomputes from the stored records in
//! a single pass, so partially applied updates can never be double counted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::category::Category;
use crate::monitor::PerfMonitor;
use crate::record::{MeasurementRecord, RecordState};
use crate::threshold::Severity;

/// Statistics returned to dashboards.
///
/// When the monitor is disabled only `enabled: false` is reported and the
/// store is not read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfStats {
    /// Whether the monitor is enabled
    pub enabled: bool,
    /// Aggregates, present only while enabled
    #[serde(flatten)]
    pub summary: Option<StoreSummary>,
}

impl PerfStats {
    /// The minimal value reported while disabled.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            summary: None,
        }
    }

    /// Summary for one category.
    pub fn category(&self, category: &Category) -> Option<&CategorySummary> {
        self.summary
            .as_ref()
            .and_then(|summary| summary.category_summary.get(category))
    }
}

/// Whole-store aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSummary {
    /// Every stored record
    pub total_records: usize,
    /// Records not yet ended
    pub in_flight: usize,
    /// Completed records flagged slow
    pub slow_operations: usize,
    /// Per-category breakdown
    pub category_summary: BTreeMap<Category, CategorySummary>,
}

/// Aggregates for one category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    /// Records in this category, in-flight included
    pub count: usize,
    /// Completed records in this category
    pub completed: usize,
    /// Mean duration of completed records, zero when none completed
    pub avg_duration: f64,
    /// Longest completed duration
    pub max_duration: f64,
    /// Completed records flagged slow
    pub slow_count: usize,
}

#[derive(Default)]
struct CategoryAccumulator {
    count: usize,
    completed: usize,
    total: f64,
    max: f64,
    slow: usize,
}

impl CategoryAccumulator {
    fn finish(self) -> CategorySummary {
        let avg_duration = if self.completed == 0 {
            0.0
        } else {
            self.total / self.completed as f64
        };
        CategorySummary {
            count: self.count,
            completed: self.completed,
            avg_duration,
            max_duration: self.max,
            slow_count: self.slow,
        }
    }
}

impl StoreSummary {
    /// Summarize records in a single pass.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a MeasurementRecord>) -> Self {
        let mut summary = StoreSummary::default();
        let mut categories: BTreeMap<Category, CategoryAccumulator> = BTreeMap::new();

        for record in records {
            summary.total_records += 1;
            let acc = categories.entry(record.category.clone()).or_default();
            acc.count += 1;

            match record.state {
                RecordState::InFlight => summary.in_flight += 1,
                RecordState::Completed {
                    duration, is_slow, ..
                } => {
                    acc.completed += 1;
                    acc.total += duration;
                    acc.max = acc.max.max(duration);
                    if is_slow {
                        acc.slow += 1;
                        summary.slow_operations += 1;
                    }
                }
            }
        }

        summary.category_summary = categories
            .into_iter()
            .map(|(category, acc)| (category, acc.finish()))
            .collect();
        summary
    }
}

/// Projection of a slow completed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlowOperation {
    /// Operation label
    pub name: String,
    /// Operation category
    pub category: Category,
    /// Duration in milliseconds
    pub duration: f64,
    /// When the record completed
    pub timestamp: DateTime<Utc>,
    /// Threshold that was exceeded
    pub threshold: f64,
    /// How far the threshold was exceeded
    pub severity: Severity,
}

/// The `limit` slowest slow records, longest first.
///
/// The sort is stable, so equal durations keep store (creation) order.
pub fn slowest<'a>(
    records: impl IntoIterator<Item = &'a MeasurementRecord>,
    limit: usize,
) -> Vec<SlowOperation> {
    let mut slow: Vec<SlowOperation> = records
        .into_iter()
        .filter_map(|record| match record.state {
            RecordState::Completed {
                duration,
                threshold,
                is_slow: true,
                ..
            } => Some(SlowOperation {
                name: record.name.clone(),
                category: record.category.clone(),
                duration,
                timestamp: record.timestamp,
                threshold,
                severity: Severity::classify(duration, threshold),
            }),
            _ => None,
        })
        .collect();

    slow.sort_by(|a, b| b.duration.total_cmp(&a.duration));
    slow.truncate(limit);
    slow
}

impl PerfMonitor {
    /// Current aggregate statistics.
    pub fn stats(&self) -> PerfStats {
        if !self.is_enabled() {
            return PerfStats::disabled();
        }
        let store = self.lock_store();
        PerfStats {
            enabled: true,
            summary: Some(StoreSummary::from_records(store.values())),
        }
    }

    /// The `limit` slowest completed slow operations, longest first.
    pub fn slow_operations(&self, limit: usize) -> Vec<SlowOperation> {
        slowest(self.lock_store().values(), limit)
    }

    /// JSON snapshot for interactive debugging.
    pub fn debug_snapshot(&self) -> serde_json::Value {
        let in_flight: Vec<String> = self
            .lock_store()
            .values()
            .filter(|record| !record.is_completed())
            .map(|record| record.name.clone())
            .collect();

        serde_json::json!({
            "settings": self.settings(),
            "thresholds": self.thresholds(),
            "stats": self.stats(),
            "slowOperations": self.slow_operations(10),
            "inFlight": in_flight,
        })
    }
}
