//! Measurement records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::category::Category;

/// Caller-supplied payload attached when a measurement completes.
pub type AdditionalData = Map<String, Value>;

/// Unique identifier of a record, never reused within one monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    /// Wrap a raw sequence number.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw sequence number.
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a record. Completion data only exists once completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum RecordState {
    /// Started, not yet ended
    InFlight,
    /// Ended; duration and slowness are fixed
    #[serde(rename_all = "camelCase")]
    Completed {
        /// Monotonic end time in milliseconds
        end_time: f64,
        /// `end_time - start_time`
        duration: f64,
        /// Threshold the duration was compared against
        threshold: f64,
        /// `duration > threshold`
        is_slow: bool,
    },
}

/// One timed occurrence of a named, categorized operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRecord {
    /// Unique id, doubles as the caller's token
    pub id: RecordId,
    /// Caller-supplied label, not necessarily unique
    pub name: String,
    /// Category used for threshold lookup and aggregation
    pub category: Category,
    /// Monotonic start time in milliseconds
    pub start_time: f64,
    /// Wall-clock time of creation, refreshed on completion; retention only
    pub timestamp: DateTime<Utc>,
    /// Lifecycle state
    #[serde(flatten)]
    pub state: RecordState,
    /// Opaque caller payload
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub additional_data: AdditionalData,
}

impl MeasurementRecord {
    /// Create an in-flight record.
    pub fn in_flight(
        id: RecordId,
        name: impl Into<String>,
        category: Category,
        start_time: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            category,
            start_time,
            timestamp,
            state: RecordState::InFlight,
            additional_data: AdditionalData::new(),
        }
    }

    /// Transition to completed. Returns the duration, or `None` if the
    /// record was already completed.
    pub fn complete(
        &mut self,
        end_time: f64,
        threshold: f64,
        timestamp: DateTime<Utc>,
        additional_data: AdditionalData,
    ) -> Option<f64> {
        if self.is_completed() {
            return None;
        }
        let duration = (end_time - self.start_time).max(0.0);
        self.state = RecordState::Completed {
            end_time,
            duration,
            threshold,
            is_slow: duration > threshold,
        };
        self.timestamp = timestamp;
        self.additional_data = additional_data;
        Some(duration)
    }

    /// Whether the record has been ended.
    #[inline]
    pub fn is_completed(&self) -> bool {
        matches!(self.state, RecordState::Completed { .. })
    }

    /// Duration in milliseconds, defined only once completed.
    pub fn duration(&self) -> Option<f64> {
        match self.state {
            RecordState::Completed { duration, .. } => Some(duration),
            RecordState::InFlight => None,
        }
    }

    /// Monotonic end time, defined only once completed.
    pub fn end_time(&self) -> Option<f64> {
        match self.state {
            RecordState::Completed { end_time, .. } => Some(end_time),
            RecordState::InFlight => None,
        }
    }

    /// Threshold applied at completion.
    pub fn threshold(&self) -> Option<f64> {
        match self.state {
            RecordState::Completed { threshold, .. } => Some(threshold),
            RecordState::InFlight => None,
        }
    }

    /// Whether the completed duration exceeded its threshold.
    pub fn is_slow(&self) -> bool {
        matches!(self.state, RecordState::Completed { is_slow: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MeasurementRecord {
        MeasurementRecord::in_flight(RecordId::from_raw(1), "load", Category::API, 10.0, Utc::now())
    }

    #[test]
    fn test_in_flight_has_no_duration() {
        let record = record();
        assert!(!record.is_completed());
        assert_eq!(record.duration(), None);
        assert_eq!(record.end_time(), None);
        assert!(!record.is_slow());
    }

    #[test]
    fn test_complete_computes_duration_once() {
        let mut record = record();
        let duration = record.complete(60.0, 50.0, Utc::now(), AdditionalData::new());
        assert_eq!(duration, Some(50.0));
        assert_eq!(record.end_time(), Some(60.0));
        // strict inequality: exactly at threshold is not slow
        assert!(!record.is_slow());

        assert_eq!(record.complete(500.0, 50.0, Utc::now(), AdditionalData::new()), None);
        assert_eq!(record.duration(), Some(50.0));
    }

    #[test]
    fn test_complete_over_threshold_is_slow() {
        let mut record = record();
        record.complete(61.0, 50.0, Utc::now(), AdditionalData::new());
        assert!(record.is_slow());
        assert_eq!(record.threshold(), Some(50.0));
    }

    #[test]
    fn test_serialized_shape() {
        let mut record = record();
        let mut data = AdditionalData::new();
        data.insert("async".to_string(), Value::Bool(true));
        record.complete(30.0, 1000.0, Utc::now(), data);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["state"], "completed");
        assert_eq!(json["duration"], 20.0);
        assert_eq!(json["isSlow"], false);
        assert_eq!(json["category"], "api");
        assert_eq!(json["additionalData"]["async"], true);
    }
}
