//! Per-category latency thresholds and slow-operation severity.

use crate::category::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Threshold used for categories absent from the table.
pub const DEFAULT_THRESHOLD_MS: f64 = 100.0;

/// Mapping from category to the duration beyond which a completed
/// measurement is flagged slow.
///
/// Fixed once a monitor is built; callers needing different limits build a
/// new monitor with a new table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdTable {
    /// Limits in milliseconds, keyed by category
    limits: BTreeMap<Category, f64>,
    /// Limit applied to any category not in `limits`
    default_ms: f64,
}

impl ThresholdTable {
    /// Create an empty table where every category uses `default_ms`.
    pub fn new(default_ms: f64) -> Self {
        Self {
            limits: BTreeMap::new(),
            default_ms,
        }
    }

    /// Thresholds targeting a 60fps UI with responsive network calls.
    pub fn for_60fps() -> Self {
        Self::new(DEFAULT_THRESHOLD_MS)
            .with_threshold(Category::RENDER, 16.0)
            .with_threshold(Category::API, 1000.0)
            .with_threshold(Category::COMPUTATION, 100.0)
            .with_threshold(Category::TRANSITION, 300.0)
            .with_threshold(Category::LONG_TASK, 50.0)
            .with_threshold(Category::LIFECYCLE, 16.0)
    }

    /// Tighter limits for performance testing.
    pub fn strict() -> Self {
        Self::new(50.0)
            .with_threshold(Category::RENDER, 8.0)
            .with_threshold(Category::API, 500.0)
            .with_threshold(Category::COMPUTATION, 50.0)
            .with_threshold(Category::TRANSITION, 150.0)
            .with_threshold(Category::LONG_TASK, 50.0)
            .with_threshold(Category::LIFECYCLE, 8.0)
    }

    /// Relaxed limits for heavy workloads.
    pub fn relaxed() -> Self {
        Self::new(200.0)
            .with_threshold(Category::RENDER, 33.0) // 30fps
            .with_threshold(Category::API, 3000.0)
            .with_threshold(Category::COMPUTATION, 250.0)
            .with_threshold(Category::TRANSITION, 600.0)
            .with_threshold(Category::LONG_TASK, 100.0)
            .with_threshold(Category::LIFECYCLE, 33.0)
    }

    /// Builder method to set the limit for one category.
    pub fn with_threshold(mut self, category: impl Into<Category>, ms: f64) -> Self {
        self.limits.insert(category.into(), ms);
        self
    }

    /// Builder method to set the fallback limit.
    pub fn with_default(mut self, ms: f64) -> Self {
        self.default_ms = ms;
        self
    }

    /// Limit for `category`, falling back to the default.
    pub fn resolve(&self, category: &Category) -> f64 {
        self.limits.get(category).copied().unwrap_or(self.default_ms)
    }

    /// The fallback limit.
    pub fn default_ms(&self) -> f64 {
        self.default_ms
    }

    /// Check whether a duration is within the limit. Equal counts as within.
    pub fn is_within(&self, category: &Category, ms: f64) -> bool {
        ms <= self.resolve(category)
    }

    /// Remaining time before `ms` would exceed the limit (negative when over).
    pub fn headroom(&self, category: &Category, ms: f64) -> f64 {
        self.resolve(category) - ms
    }

    /// Iterate the explicitly configured limits.
    pub fn iter(&self) -> impl Iterator<Item = (&Category, f64)> {
        self.limits.iter().map(|(category, ms)| (category, *ms))
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::for_60fps()
    }
}

/// How far a slow operation overshot its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Up to 1.5x the threshold
    Low,
    /// 1.5-2x the threshold
    Medium,
    /// 2-3x the threshold
    High,
    /// More than 3x the threshold
    Critical,
}

impl Severity {
    /// Classify a duration against its threshold.
    pub fn classify(duration_ms: f64, threshold_ms: f64) -> Self {
        if threshold_ms <= 0.0 {
            return Severity::Critical;
        }
        let ratio = duration_ms / threshold_ms;
        if ratio > 3.0 {
            Severity::Critical
        } else if ratio > 2.0 {
            Severity::High
        } else if ratio > 1.5 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let table = ThresholdTable::default();
        assert_eq!(table.resolve(&Category::RENDER), 16.0);
        assert_eq!(table.resolve(&Category::API), 1000.0);
        assert_eq!(table.resolve(&Category::LONG_TASK), 50.0);
    }

    #[test]
    fn test_unknown_category_uses_single_default() {
        let table = ThresholdTable::default();
        assert_eq!(table.resolve(&Category::GENERAL), DEFAULT_THRESHOLD_MS);
        assert_eq!(table.resolve(&Category::new("websocket")), DEFAULT_THRESHOLD_MS);

        let table = table.with_default(250.0);
        assert_eq!(table.resolve(&Category::new("websocket")), 250.0);
    }

    #[test]
    fn test_is_within_is_inclusive() {
        let table = ThresholdTable::new(100.0).with_threshold("render", 50.0);
        assert!(table.is_within(&Category::RENDER, 50.0));
        assert!(!table.is_within(&Category::RENDER, 50.01));
    }

    #[test]
    fn test_headroom() {
        let table = ThresholdTable::default();
        assert_eq!(table.headroom(&Category::API, 300.0), 700.0);
        assert_eq!(table.headroom(&Category::RENDER, 20.0), -4.0);
    }

    #[test]
    fn test_presets_differ() {
        assert_eq!(ThresholdTable::strict().resolve(&Category::RENDER), 8.0);
        assert_eq!(ThresholdTable::relaxed().resolve(&Category::RENDER), 33.0);
        assert_eq!(ThresholdTable::relaxed().default_ms(), 200.0);
    }

    #[test]
    fn test_severity_ladder() {
        assert_eq!(Severity::classify(55.0, 50.0), Severity::Low);
        assert_eq!(Severity::classify(80.0, 50.0), Severity::Medium);
        assert_eq!(Severity::classify(110.0, 50.0), Severity::High);
        assert_eq!(Severity::classify(200.0, 50.0), Severity::Critical);
        assert_eq!(Severity::classify(1.0, 0.0), Severity::Critical);
    }

    #[test]
    fn test_table_serialization() {
        let table = ThresholdTable::new(100.0).with_threshold(Category::API, 1000.0);
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["limits"]["api"], 1000.0);
        assert_eq!(json["defaultMs"], 100.0);
    }
}
