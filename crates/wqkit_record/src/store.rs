//! Per-site measurement store with synchronously maintained monthly aggregates.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use crate::aggregate::derive_monthly_aggregates;
use crate::spec::{
    EnumSite, EnumUpsertOutcome, SpecMeasurement, SpecMonthKey, SpecMonthlyAggregate,
    SpecStoreSnapshot, ValidationError,
};

/// Read access the pivot engine needs from a record store.
pub trait RecordSource {
    /// Every measurement of `site`, ordered by date.
    fn all_measurements(&self, site: EnumSite) -> Vec<SpecMeasurement>;
    /// Every monthly aggregate of `site`, ordered by `(year, month)`.
    fn all_aggregates(&self, site: EnumSite) -> Vec<SpecMonthlyAggregate>;
}

#[derive(Debug, Default)]
struct SiteLedger {
    measurements: BTreeMap<NaiveDate, SpecMeasurement>,
    aggregates: BTreeMap<SpecMonthKey, SpecMonthlyAggregate>,
}

impl SiteLedger {
    /// Replace the aggregate set; return the number of months whose aggregate changed.
    fn recompute(&mut self, site: EnumSite) -> usize {
        let dict_aggregates_new = derive_monthly_aggregates(site, self.measurements.values());

        let n_changed = dict_aggregates_new
            .iter()
            .filter(|(key, aggregate)| self.aggregates.get(*key) != Some(*aggregate))
            .count()
            + self
                .aggregates
                .keys()
                .filter(|key| !dict_aggregates_new.contains_key(*key))
                .count();

        self.aggregates = dict_aggregates_new;
        n_changed
    }
}

/// In-memory store. One mutex per site; an upsert and its aggregate
/// recompute run under the same lock.
#[derive(Debug)]
pub struct MeasurementStore {
    ledgers: [Mutex<SiteLedger>; EnumSite::COUNT],
}

impl Default for MeasurementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementStore {
    pub fn new() -> Self {
        Self {
            ledgers: std::array::from_fn(|_| Mutex::new(SiteLedger::default())),
        }
    }

    /// Rebuild a store from a snapshot. Records are re-validated; a later
    /// record for the same `(site, date)` overwrites an earlier one.
    pub fn from_snapshot(snapshot: SpecStoreSnapshot) -> Result<Self, ValidationError> {
        let store = Self::new();
        for m in snapshot.measurements {
            m.validate()?;
            let mut ledger = store.lock_ledger(m.site);
            ledger.measurements.insert(m.date, m);
        }
        for site in EnumSite::ALL {
            store.recompute_aggregates(site);
        }
        info!(
            "Loaded store snapshot with {} measurements",
            store.len_total()
        );
        Ok(store)
    }

    /// Every measurement across all sites, ordered by site then date.
    pub fn snapshot(&self) -> SpecStoreSnapshot {
        SpecStoreSnapshot {
            measurements: EnumSite::ALL
                .into_iter()
                .flat_map(|site| self.all_measurements(site))
                .collect(),
        }
    }

    /// Insert or replace the measurement for `(site, date)`, then recompute
    /// the site's aggregates before releasing the site lock.
    #[instrument(skip(self))]
    pub fn upsert_measurement(
        &self,
        site: EnumSite,
        date: NaiveDate,
        ph: f64,
        temperature: Option<f64>,
        flow: f64,
    ) -> Result<EnumUpsertOutcome, ValidationError> {
        self.submit(SpecMeasurement::new(site, date, ph, temperature, flow))
    }

    /// Ingress form of [`Self::upsert_measurement`].
    pub fn submit(
        &self,
        measurement: SpecMeasurement,
    ) -> Result<EnumUpsertOutcome, ValidationError> {
        measurement.validate()?;

        let site = measurement.site;
        let date = measurement.date;
        let mut ledger = self.lock_ledger(site);
        let outcome = match ledger.measurements.insert(date, measurement) {
            Some(_) => EnumUpsertOutcome::Replaced,
            None => EnumUpsertOutcome::Inserted,
        };
        let n_changed = ledger.recompute(site);
        drop(ledger);

        debug!(
            "Upserted {} {}: {:?}, {} aggregate(s) changed",
            site, date, outcome, n_changed
        );
        Ok(outcome)
    }

    /// Recompute every monthly aggregate of `site`; return the number of aggregates held.
    #[instrument(skip(self))]
    pub fn recompute_aggregates(&self, site: EnumSite) -> usize {
        let mut ledger = self.lock_ledger(site);
        let n_changed = ledger.recompute(site);
        debug!("Recomputed aggregates for {}: {} changed", site, n_changed);
        ledger.aggregates.len()
    }

    /// Aggregate for one month, if that month has measurements.
    pub fn aggregate(
        &self,
        site: EnumSite,
        key_month: SpecMonthKey,
    ) -> Option<SpecMonthlyAggregate> {
        self.lock_ledger(site).aggregates.get(&key_month).cloned()
    }

    pub fn measurement(&self, site: EnumSite, date: NaiveDate) -> Option<SpecMeasurement> {
        self.lock_ledger(site).measurements.get(&date).cloned()
    }

    pub fn len_measurements(&self, site: EnumSite) -> usize {
        self.lock_ledger(site).measurements.len()
    }

    pub fn len_total(&self) -> usize {
        EnumSite::ALL
            .into_iter()
            .map(|site| self.len_measurements(site))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len_total() == 0
    }

    fn lock_ledger(&self, site: EnumSite) -> MutexGuard<'_, SiteLedger> {
        // Poison is ignored: aggregates are swapped in with one assignment.
        self.ledgers[site.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordSource for MeasurementStore {
    fn all_measurements(&self, site: EnumSite) -> Vec<SpecMeasurement> {
        self.lock_ledger(site).measurements.values().cloned().collect()
    }

    fn all_aggregates(&self, site: EnumSite) -> Vec<SpecMonthlyAggregate> {
        self.lock_ledger(site).aggregates.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_upsert_replaces_same_day() {
        let store = MeasurementStore::new();
        let outcome = store
            .upsert_measurement(EnumSite::DrainA, date(2024, 1, 5), 7.0, Some(25.0), 1.2)
            .expect("insert");
        assert_eq!(outcome, EnumUpsertOutcome::Inserted);

        let outcome = store
            .upsert_measurement(EnumSite::DrainA, date(2024, 1, 5), 8.0, None, 2.0)
            .expect("replace");
        assert_eq!(outcome, EnumUpsertOutcome::Replaced);
        assert_eq!(store.len_measurements(EnumSite::DrainA), 1);

        let m = store
            .measurement(EnumSite::DrainA, date(2024, 1, 5))
            .expect("stored");
        assert_eq!(m.ph, 8.0);
        assert_eq!(m.temperature, None);

        let agg = store
            .aggregate(EnumSite::DrainA, SpecMonthKey::new(2024, 1))
            .expect("aggregate");
        assert_eq!(agg.avg_ph, Some(8.0));
        assert_eq!(agg.avg_temperature, None);
        assert_eq!(agg.count_measurements, 1);
    }

    #[test]
    fn test_replace_only_touches_affected_month() {
        let store = MeasurementStore::new();
        store
            .upsert_measurement(EnumSite::DrainB, date(2024, 1, 5), 7.0, Some(25.0), 1.2)
            .expect("jan");
        store
            .upsert_measurement(EnumSite::DrainB, date(2024, 2, 3), 6.5, Some(22.0), 0.8)
            .expect("feb");
        let feb_before = store.aggregate(EnumSite::DrainB, SpecMonthKey::new(2024, 2));

        store
            .upsert_measurement(EnumSite::DrainB, date(2024, 1, 5), 7.6, Some(24.0), 1.0)
            .expect("replace jan");

        assert_eq!(store.len_measurements(EnumSite::DrainB), 2);
        assert_eq!(
            store.aggregate(EnumSite::DrainB, SpecMonthKey::new(2024, 2)),
            feb_before
        );
        let jan = store
            .aggregate(EnumSite::DrainB, SpecMonthKey::new(2024, 1))
            .expect("jan aggregate");
        assert_eq!(jan.avg_ph, Some(7.6));
    }

    #[test]
    fn test_rejected_input_leaves_store_unchanged() {
        let store = MeasurementStore::new();
        store
            .upsert_measurement(EnumSite::DrainA, date(2024, 1, 5), 7.0, None, 1.2)
            .expect("insert");
        let snapshot_before = store.snapshot();
        let l_aggregates_before = store.all_aggregates(EnumSite::DrainA);

        let err = store
            .upsert_measurement(EnumSite::DrainA, date(2024, 1, 5), 15.0, None, 1.2)
            .expect_err("ph out of range");
        assert_eq!(err, ValidationError::PhOutOfRange(15.0));

        let err = store
            .upsert_measurement(EnumSite::DrainA, date(2024, 1, 6), 7.0, None, -1.0)
            .expect_err("negative flow");
        assert_eq!(err, ValidationError::NegativeFlow(-1.0));

        assert_eq!(store.snapshot(), snapshot_before);
        assert_eq!(store.all_aggregates(EnumSite::DrainA), l_aggregates_before);
    }

    #[test]
    fn test_aggregates_track_months_with_data() {
        let store = MeasurementStore::new();
        for (n_month, n_day) in [(1, 1), (1, 2), (3, 9), (12, 31)] {
            store
                .upsert_measurement(
                    EnumSite::DrainC,
                    date(2023, n_month, n_day),
                    7.0,
                    None,
                    1.0,
                )
                .expect("insert");
        }

        let l_keys: Vec<SpecMonthKey> = store
            .all_aggregates(EnumSite::DrainC)
            .iter()
            .map(SpecMonthlyAggregate::key_month)
            .collect();
        assert_eq!(
            l_keys,
            vec![
                SpecMonthKey::new(2023, 1),
                SpecMonthKey::new(2023, 3),
                SpecMonthKey::new(2023, 12)
            ]
        );
        assert_eq!(store.recompute_aggregates(EnumSite::DrainC), 3);
        assert!(store.all_aggregates(EnumSite::DrainD).is_empty());
    }

    #[test]
    fn test_snapshot_round_trip_rederives_aggregates() {
        let store = MeasurementStore::new();
        store
            .upsert_measurement(EnumSite::DrainA, date(2024, 1, 5), 7.0, Some(25.0), 1.2)
            .expect("insert");
        store
            .upsert_measurement(EnumSite::DrainD, date(2024, 2, 1), 6.0, None, 0.0)
            .expect("insert");

        let restored = MeasurementStore::from_snapshot(store.snapshot()).expect("restore");
        assert_eq!(restored.snapshot(), store.snapshot());
        for site in EnumSite::ALL {
            assert_eq!(restored.all_aggregates(site), store.all_aggregates(site));
        }
    }

    #[test]
    fn test_from_snapshot_rejects_invalid_record() {
        let snapshot = SpecStoreSnapshot {
            measurements: vec![SpecMeasurement::new(
                EnumSite::DrainA,
                date(2024, 1, 5),
                7.0,
                None,
                -3.0,
            )],
        };
        assert_eq!(
            MeasurementStore::from_snapshot(snapshot).expect_err("invalid flow"),
            ValidationError::NegativeFlow(-3.0)
        );
    }
}
