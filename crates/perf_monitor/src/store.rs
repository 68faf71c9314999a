//! Keyed storage of measurement records.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::error::{PerfError, PerfResult};
use crate::record::{MeasurementRecord, RecordId};

/// Collection of in-flight and completed records.
///
/// Records are keyed by id. Ids are allocated in increasing order, so
/// iteration follows creation order. Size is bounded only by
/// [`MetricStore::evict_completed_before`].
#[derive(Debug, Clone, Default)]
pub struct MetricStore {
    records: BTreeMap<RecordId, MeasurementRecord>,
}

impl MetricStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. Fails if its id is already live.
    pub fn insert(&mut self, record: MeasurementRecord) -> PerfResult<RecordId> {
        let id = record.id;
        if self.records.contains_key(&id) {
            return Err(PerfError::DuplicateRecord(id));
        }
        self.records.insert(id, record);
        Ok(id)
    }

    /// Look up a record.
    pub fn get(&self, id: RecordId) -> Option<&MeasurementRecord> {
        self.records.get(&id)
    }

    /// Look up a record for mutation.
    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut MeasurementRecord> {
        self.records.get_mut(&id)
    }

    /// Remove a record, returning it if present.
    pub fn delete(&mut self, id: RecordId) -> Option<MeasurementRecord> {
        self.records.remove(&id)
    }

    /// Iterate every record in creation order.
    pub fn values(&self) -> impl Iterator<Item = &MeasurementRecord> {
        self.records.values()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records that have not been ended.
    pub fn in_flight_count(&self) -> usize {
        self.records.values().filter(|r| !r.is_completed()).count()
    }

    /// Remove every completed record whose timestamp is strictly before
    /// `cutoff`. In-flight records are never removed. Returns the number of
    /// records evicted.
    pub fn evict_completed_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, record| !(record.is_completed() && record.timestamp < cutoff));
        before - self.records.len()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::record::AdditionalData;
    use chrono::Duration;

    fn in_flight(raw: u64, at: DateTime<Utc>) -> MeasurementRecord {
        MeasurementRecord::in_flight(RecordId::from_raw(raw), "op", Category::GENERAL, 0.0, at)
    }

    fn completed(raw: u64, at: DateTime<Utc>) -> MeasurementRecord {
        let mut record = in_flight(raw, at);
        record.complete(5.0, 100.0, at, AdditionalData::new());
        record
    }

    #[test]
    fn test_insert_get_delete() {
        let mut store = MetricStore::new();
        let id = store.insert(in_flight(1, Utc::now())).unwrap();

        assert_eq!(store.get(id).unwrap().name, "op");
        assert_eq!(store.len(), 1);

        assert!(store.delete(id).is_some());
        assert!(store.get(id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_insert_rejects_live_duplicate() {
        let mut store = MetricStore::new();
        store.insert(in_flight(1, Utc::now())).unwrap();

        let err = store.insert(in_flight(1, Utc::now())).unwrap_err();
        assert!(matches!(err, PerfError::DuplicateRecord(id) if id.as_raw() == 1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_values_in_creation_order() {
        let mut store = MetricStore::new();
        for raw in [3, 1, 2] {
            store.insert(in_flight(raw, Utc::now())).unwrap();
        }

        let ids: Vec<u64> = store.values().map(|r| r.id.as_raw()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_evict_completed_before_spares_in_flight() {
        let now = Utc::now();
        let old = now - Duration::hours(2);
        let mut store = MetricStore::new();
        store.insert(completed(1, old)).unwrap();
        store.insert(in_flight(2, old)).unwrap();
        store.insert(completed(3, now)).unwrap();

        let evicted = store.evict_completed_before(now - Duration::minutes(30));

        assert_eq!(evicted, 1);
        assert!(store.get(RecordId::from_raw(1)).is_none());
        assert!(store.get(RecordId::from_raw(2)).is_some());
        assert!(store.get(RecordId::from_raw(3)).is_some());
        assert_eq!(store.in_flight_count(), 1);
    }

    #[test]
    fn test_evict_keeps_record_exactly_at_cutoff() {
        let cutoff = Utc::now();
        let mut store = MetricStore::new();
        store.insert(completed(1, cutoff)).unwrap();

        assert_eq!(store.evict_completed_before(cutoff), 0);
        assert_eq!(store.len(), 1);
    }
}
