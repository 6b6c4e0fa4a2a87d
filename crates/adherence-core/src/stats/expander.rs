//! Expected-dose expansion.
//!
//! Turns the prescriptions, medicines and schedules of a care group into the
//! number of doses expected per medicine, per timing and per day.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::models::{DosingSchedule, Medicine, MedicineStats, Prescription, TimingBreakdown};

/// In-memory view of a care group's dosing plan, indexed by ID.
///
/// Built once per computation from batch loads; per-day filtering runs
/// against this index instead of the store.
#[derive(Debug, Default)]
pub struct ScheduleIndex {
    prescriptions: Vec<Prescription>,
    medicines_by_prescription: HashMap<String, Vec<Medicine>>,
    schedules_by_medicine: HashMap<String, DosingSchedule>,
    medicine_keys: HashMap<String, String>,
}

impl ScheduleIndex {
    /// Index the loaded entities.
    ///
    /// Drops deleted or deactivated prescriptions, deleted and orphaned
    /// medicines, and deleted schedules. A medicine with more than one
    /// live schedule is left without a schedule.
    pub fn build(
        prescriptions: Vec<Prescription>,
        medicines: Vec<Medicine>,
        schedules: Vec<DosingSchedule>,
    ) -> Self {
        let prescriptions: Vec<Prescription> = prescriptions
            .into_iter()
            .filter(|p| p.is_active && !p.is_deleted())
            .collect();

        let live_medicines: Vec<Medicine> = medicines.into_iter().filter(|m| !m.is_deleted()).collect();

        let medicine_keys = live_medicines
            .iter()
            .map(|m| (m.id.clone(), m.stats_key()))
            .collect();

        let mut medicines_by_prescription: HashMap<String, Vec<Medicine>> = HashMap::new();
        for medicine in live_medicines {
            let Some(prescription_id) = medicine.prescription_id.clone() else {
                continue;
            };
            if prescriptions.iter().any(|p| p.id == prescription_id) {
                medicines_by_prescription
                    .entry(prescription_id)
                    .or_default()
                    .push(medicine);
            }
        }

        let mut grouped: HashMap<String, Vec<DosingSchedule>> = HashMap::new();
        for schedule in schedules.into_iter().filter(|s| !s.is_deleted()) {
            grouped
                .entry(schedule.medicine_id.clone())
                .or_default()
                .push(schedule);
        }

        let schedules_by_medicine = grouped
            .into_iter()
            .filter_map(|(medicine_id, mut schedules)| {
                if schedules.len() > 1 {
                    tracing::warn!(
                        medicine_id = %medicine_id,
                        count = schedules.len(),
                        "Medicine has multiple active schedules, excluding it from expected doses"
                    );
                    return None;
                }
                schedules.pop().map(|schedule| (medicine_id, schedule))
            })
            .collect();

        Self {
            prescriptions,
            medicines_by_prescription,
            schedules_by_medicine,
            medicine_keys,
        }
    }

    /// Prescriptions in force on `date`.
    pub fn prescriptions_on(&self, date: NaiveDate) -> impl Iterator<Item = &Prescription> {
        self.prescriptions
            .iter()
            .filter(move |p| p.contributes_on(date))
    }

    pub fn medicines_of(&self, prescription_id: &str) -> &[Medicine] {
        self.medicines_by_prescription
            .get(prescription_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn schedule_of(&self, medicine_id: &str) -> Option<&DosingSchedule> {
        self.schedules_by_medicine.get(medicine_id)
    }

    /// Statistics key of a live medicine, orphans included.
    pub fn medicine_key(&self, medicine_id: &str) -> Option<&str> {
        self.medicine_keys.get(medicine_id).map(String::as_str)
    }
}

/// Expected doses accumulated over a date range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpectedDoses {
    /// Per medicine, keyed by normalized display name
    pub medicines: BTreeMap<String, MedicineStats>,
    /// Per regular timing; only `total` is filled
    pub timings: TimingBreakdown,
    /// Expected doses per day
    pub per_day: BTreeMap<NaiveDate, u32>,
}

impl ExpectedDoses {
    /// Add the doses expected on `date`.
    fn with_day(mut self, index: &ScheduleIndex, date: NaiveDate, medicine_filter: Option<&str>) -> Self {
        let mut day_total = 0;

        for prescription in index.prescriptions_on(date) {
            for medicine in index.medicines_of(&prescription.id) {
                if medicine_filter.is_some_and(|id| id != medicine.id) {
                    continue;
                }
                let Some(schedule) = index.schedule_of(&medicine.id) else {
                    continue;
                };

                let key = medicine.stats_key();
                let entry = self
                    .medicines
                    .entry(key.clone())
                    .or_insert_with(|| MedicineStats::new(key, Some(medicine.id.clone())));

                let mut count = 0u32;
                for timing in schedule.regular_timings() {
                    if let Some(stats) = self.timings.get_mut(timing) {
                        stats.total += 1;
                    }
                    count += 1;
                }

                entry.total_doses += count;
                if let Some(dosage) = &schedule.dosage {
                    entry.total_amount += dosage.amount * f64::from(count);
                    if entry.unit.is_empty() {
                        entry.unit = dosage.unit.clone();
                    }
                }
                day_total += count;
            }
        }

        *self.per_day.entry(date).or_insert(0) += day_total;
        self
    }

    /// Total expected doses across all medicines.
    pub fn total(&self) -> u32 {
        self.per_day.values().sum()
    }
}

/// Expand the dosing plan over `dates`, optionally for a single medicine.
pub fn expand(index: &ScheduleIndex, dates: &[NaiveDate], medicine_filter: Option<&str>) -> ExpectedDoses {
    dates.iter().fold(ExpectedDoses::default(), |acc, &date| {
        acc.with_day(index, date, medicine_filter)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timing;
    use crate::stats::date_range;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    struct Plan {
        prescriptions: Vec<Prescription>,
        medicines: Vec<Medicine>,
        schedules: Vec<DosingSchedule>,
    }

    impl Plan {
        fn new() -> Self {
            Self {
                prescriptions: Vec::new(),
                medicines: Vec::new(),
                schedules: Vec::new(),
            }
        }

        fn prescription(&mut self, start: &str, end: Option<&str>) -> String {
            let mut rx = Prescription::new("g1".into(), "Rx".into(), date(start));
            rx.end_date = end.map(date);
            let id = rx.id.clone();
            self.prescriptions.push(rx);
            id
        }

        fn medicine(&mut self, prescription_id: &str, name: &str, timings: Vec<Timing>) -> String {
            let med = Medicine::new("g1".into(), Some(prescription_id.into()), name.into());
            let id = med.id.clone();
            self.schedules
                .push(DosingSchedule::new(id.clone(), "g1".into(), timings).with_dosage(1.0, "tablet"));
            self.medicines.push(med);
            id
        }

        fn index(self) -> ScheduleIndex {
            ScheduleIndex::build(self.prescriptions, self.medicines, self.schedules)
        }
    }

    #[test]
    fn test_full_period_expansion() {
        let mut plan = Plan::new();
        let rx = plan.prescription("2025-01-01", Some("2025-01-31"));
        plan.medicine(&rx, "Med A", vec![Timing::Morning, Timing::Evening]);
        let index = plan.index();

        let dates = date_range(date("2025-01-01"), date("2025-01-31"));
        let expected = expand(&index, &dates, None);

        let med = &expected.medicines["Med A"];
        assert_eq!(med.total_doses, 62);
        assert_eq!(med.total_amount, 62.0);
        assert_eq!(med.unit, "tablet");
        assert_eq!(expected.timings.morning.total, 31);
        assert_eq!(expected.timings.evening.total, 31);
        assert_eq!(expected.timings.noon.total, 0);
        assert_eq!(expected.total(), 62);
    }

    #[test]
    fn test_mid_period_start_counts_from_start_date() {
        let mut plan = Plan::new();
        let rx = plan.prescription("2025-01-21", None);
        plan.medicine(&rx, "Med A", vec![Timing::Noon]);
        let index = plan.index();

        let dates = date_range(date("2025-01-01"), date("2025-01-31"));
        let expected = expand(&index, &dates, None);

        assert_eq!(expected.medicines["Med A"].total_doses, 11);
        assert_eq!(expected.per_day[&date("2025-01-20")], 0);
        assert_eq!(expected.per_day[&date("2025-01-21")], 1);
    }

    #[test]
    fn test_future_prescription_contributes_nothing() {
        let mut plan = Plan::new();
        let rx = plan.prescription("2025-03-01", None);
        plan.medicine(&rx, "Med A", vec![Timing::Morning]);
        let index = plan.index();

        let dates = date_range(date("2025-01-01"), date("2025-01-31"));
        let expected = expand(&index, &dates, None);

        assert!(expected.medicines.is_empty());
        assert_eq!(expected.total(), 0);
    }

    #[test]
    fn test_as_needed_is_not_expected() {
        let mut plan = Plan::new();
        let rx = plan.prescription("2025-01-01", None);
        plan.medicine(&rx, "Painkiller", vec![Timing::AsNeeded]);
        plan.medicine(&rx, "Med A", vec![Timing::Bedtime, Timing::AsNeeded]);
        let index = plan.index();

        let dates = date_range(date("2025-01-01"), date("2025-01-10"));
        let expected = expand(&index, &dates, None);

        assert_eq!(expected.medicines["Painkiller"].total_doses, 0);
        assert_eq!(expected.medicines["Painkiller"].total_amount, 0.0);
        assert_eq!(expected.medicines["Med A"].total_doses, 10);
        assert_eq!(expected.timings.bedtime.total, 10);
    }

    #[test]
    fn test_medicine_without_schedule_is_skipped() {
        let mut plan = Plan::new();
        let rx = plan.prescription("2025-01-01", None);
        plan.medicines
            .push(Medicine::new("g1".into(), Some(rx), "No schedule".into()));
        let index = plan.index();

        let expected = expand(&index, &[date("2025-01-01")], None);
        assert!(expected.medicines.is_empty());
    }

    #[test]
    fn test_orphaned_medicine_is_excluded_but_resolvable() {
        let mut plan = Plan::new();
        let orphan = Medicine::new("g1".into(), None, "Legacy".into());
        let orphan_id = orphan.id.clone();
        plan.schedules
            .push(DosingSchedule::new(orphan_id.clone(), "g1".into(), vec![Timing::Morning]));
        plan.medicines.push(orphan);
        let index = plan.index();

        let expected = expand(&index, &[date("2025-01-01")], None);
        assert!(expected.medicines.is_empty());
        assert_eq!(index.medicine_key(&orphan_id), Some("Legacy"));
    }

    #[test]
    fn test_duplicate_schedules_fail_soft() {
        let mut plan = Plan::new();
        let rx = plan.prescription("2025-01-01", None);
        let med_id = plan.medicine(&rx, "Med A", vec![Timing::Morning]);
        plan.schedules
            .push(DosingSchedule::new(med_id.clone(), "g1".into(), vec![Timing::Evening]));
        let index = plan.index();

        assert!(index.schedule_of(&med_id).is_none());
        let expected = expand(&index, &[date("2025-01-01")], None);
        assert!(expected.medicines.is_empty());
    }

    #[test]
    fn test_deleted_and_inactive_prescriptions_excluded() {
        let mut plan = Plan::new();
        let deleted = plan.prescription("2025-01-01", None);
        plan.medicine(&deleted, "Deleted", vec![Timing::Morning]);
        let paused = plan.prescription("2025-01-01", None);
        plan.medicine(&paused, "Paused", vec![Timing::Morning]);
        plan.prescriptions[0].deleted_at = Some("2025-01-02T00:00:00Z".into());
        plan.prescriptions[1].is_active = false;
        let index = plan.index();

        let expected = expand(&index, &[date("2025-01-05")], None);
        assert!(expected.medicines.is_empty());
    }

    #[test]
    fn test_medicine_filter() {
        let mut plan = Plan::new();
        let rx = plan.prescription("2025-01-01", None);
        let med_a = plan.medicine(&rx, "Med A", vec![Timing::Morning]);
        plan.medicine(&rx, "Med B", vec![Timing::Evening]);
        let index = plan.index();

        let expected = expand(&index, &[date("2025-01-01")], Some(&med_a));
        assert_eq!(expected.medicines.len(), 1);
        assert!(expected.medicines.contains_key("Med A"));
        assert_eq!(expected.timings.evening.total, 0);
    }

    #[test]
    fn test_same_name_merges_by_key() {
        let mut plan = Plan::new();
        let old = plan.prescription("2025-01-01", Some("2025-01-15"));
        let new = plan.prescription("2025-01-16", None);
        plan.medicine(&old, "Med A", vec![Timing::Morning]);
        plan.medicine(&new, " Med  A", vec![Timing::Morning]);
        let index = plan.index();

        let dates = date_range(date("2025-01-01"), date("2025-01-31"));
        let expected = expand(&index, &dates, None);

        assert_eq!(expected.medicines.len(), 1);
        assert_eq!(expected.medicines["Med A"].total_doses, 31);
    }
}
