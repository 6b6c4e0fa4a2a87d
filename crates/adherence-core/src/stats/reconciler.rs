//! Record reconciliation and backfill.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::expander::{ExpectedDoses, ScheduleIndex};
use crate::models::{AsNeededStats, MedicineStats, OutcomeRecord, TimingBreakdown, TimingStats};

/// Expected doses with recorded outcomes counted in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    pub medicines: BTreeMap<String, MedicineStats>,
    pub timings: TimingBreakdown,
    pub as_needed: AsNeededStats,
    /// Regular-timing outcomes per day; `total` is the expected count
    pub daily: BTreeMap<NaiveDate, TimingStats>,
}

/// Count `records` against `expected`.
///
/// As-needed records land only in the as-needed bucket. Regular records
/// always count towards their timing slot and towards their medicine when
/// the medicine resolves to a name present in the expected map.
pub fn reconcile(
    expected: ExpectedDoses,
    records: &[OutcomeRecord],
    index: &ScheduleIndex,
) -> Reconciled {
    let ExpectedDoses {
        mut medicines,
        mut timings,
        per_day,
    } = expected;

    let mut daily: BTreeMap<NaiveDate, TimingStats> = per_day
        .into_iter()
        .map(|(date, total)| {
            (
                date,
                TimingStats {
                    total,
                    ..Default::default()
                },
            )
        })
        .collect();
    let mut as_needed = AsNeededStats::default();
    let mut unresolved = 0usize;

    for record in records.iter().filter(|r| !r.is_deleted()) {
        let Some(slot) = timings.get_mut(record.timing) else {
            as_needed.count(record.status);
            continue;
        };
        slot.count(record.status);
        daily.entry(record.scheduled_date).or_default().count(record.status);

        let entry = record
            .medicine_id
            .as_deref()
            .and_then(|id| index.medicine_key(id))
            .and_then(|key| medicines.get_mut(key));
        match entry {
            Some(stats) => stats.count(record.status),
            None => unresolved += 1,
        }
    }

    if unresolved > 0 {
        tracing::debug!(unresolved, "Records without a resolvable medicine counted per timing only");
    }

    Reconciled {
        medicines,
        timings,
        as_needed,
        daily,
    }
}

/// Treat every expected dose without a record as pending.
pub fn backfill(reconciled: Reconciled) -> Reconciled {
    Reconciled {
        medicines: reconciled
            .medicines
            .into_iter()
            .map(|(name, stats)| (name, stats.backfilled()))
            .collect(),
        timings: reconciled.timings.map(TimingStats::backfilled),
        daily: reconciled
            .daily
            .into_iter()
            .map(|(date, stats)| (date, stats.backfilled()))
            .collect(),
        as_needed: reconciled.as_needed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DosingSchedule, Medicine, Prescription, RecordStatus, Timing};
    use crate::stats::{date_range, expand};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// One prescription over January 2025 with "Med A" at morning and evening.
    fn january_plan() -> (ScheduleIndex, Medicine) {
        let rx = Prescription::new("g1".into(), "Rx".into(), date("2025-01-01"))
            .with_end_date(date("2025-01-31"));
        let med = Medicine::new("g1".into(), Some(rx.id.clone()), "Med A".into());
        let schedule = DosingSchedule::new(
            med.id.clone(),
            "g1".into(),
            vec![Timing::Morning, Timing::Evening, Timing::AsNeeded],
        )
        .with_dosage(1.0, "tablet");
        let index = ScheduleIndex::build(vec![rx], vec![med.clone()], vec![schedule]);
        (index, med)
    }

    fn january(index: &ScheduleIndex) -> ExpectedDoses {
        expand(index, &date_range(date("2025-01-01"), date("2025-01-31")), None)
    }

    fn record(timing: Timing, day: &str, status: RecordStatus) -> OutcomeRecord {
        OutcomeRecord::new("g1".into(), "p1".into(), timing, date(day), status)
    }

    #[test]
    fn test_records_counted_per_medicine_and_timing() {
        let (index, med) = january_plan();
        let records = vec![
            record(Timing::Morning, "2025-01-01", RecordStatus::Taken).for_medicine(&med.id),
            record(Timing::Evening, "2025-01-01", RecordStatus::Skipped).for_medicine(&med.id),
            record(Timing::Morning, "2025-01-02", RecordStatus::Pending).for_medicine(&med.id),
        ];

        let result = reconcile(january(&index), &records, &index);

        let stats = &result.medicines["Med A"];
        assert_eq!(stats.taken_count, 1);
        assert_eq!(stats.skipped_count, 1);
        assert_eq!(stats.pending_count, 1);
        assert_eq!(result.timings.morning.taken, 1);
        assert_eq!(result.timings.morning.pending, 1);
        assert_eq!(result.timings.evening.skipped, 1);
        assert_eq!(result.daily[&date("2025-01-01")].recorded(), 2);
    }

    #[test]
    fn test_as_needed_records_are_isolated() {
        let (index, med) = january_plan();
        let records = vec![
            record(Timing::AsNeeded, "2025-01-03", RecordStatus::Taken).for_medicine(&med.id),
            record(Timing::AsNeeded, "2025-01-04", RecordStatus::Skipped).for_medicine(&med.id),
        ];

        let result = reconcile(january(&index), &records, &index);

        assert_eq!(result.as_needed.taken, 1);
        assert_eq!(result.as_needed.skipped, 1);
        assert_eq!(result.as_needed.total, 2);
        assert_eq!(result.medicines["Med A"].recorded(), 0);
        assert_eq!(result.medicines["Med A"].total_doses, 62);
        assert_eq!(result.timings.morning.recorded(), 0);
        assert_eq!(result.daily[&date("2025-01-03")].recorded(), 0);
    }

    #[test]
    fn test_unresolved_medicine_counts_per_timing_only() {
        let (index, _) = january_plan();
        let records = vec![
            record(Timing::Noon, "2025-01-05", RecordStatus::Taken).for_medicine("deleted-med"),
            record(Timing::Noon, "2025-01-05", RecordStatus::Taken).with_simple_name("Vitamin D"),
        ];

        let result = reconcile(january(&index), &records, &index);

        assert_eq!(result.timings.noon.taken, 2);
        assert_eq!(result.medicines["Med A"].taken_count, 0);
    }

    #[test]
    fn test_medicine_filter_keeps_every_record_per_timing() {
        let (index, med) = january_plan();
        let records = vec![
            record(Timing::Morning, "2025-01-01", RecordStatus::Taken).for_medicine(&med.id),
            record(Timing::Morning, "2025-01-01", RecordStatus::Taken).for_medicine("other"),
            record(Timing::AsNeeded, "2025-01-01", RecordStatus::Taken),
        ];

        let expected = expand(
            &index,
            &date_range(date("2025-01-01"), date("2025-01-31")),
            Some(&med.id),
        );
        let result = reconcile(expected, &records, &index);

        assert_eq!(result.timings.morning.taken, 2);
        assert_eq!(result.medicines["Med A"].taken_count, 1);
        assert_eq!(result.as_needed.total, 1);
    }

    #[test]
    fn test_backfill_fills_unrecorded_slots() {
        let (index, med) = january_plan();
        let records = vec![
            record(Timing::Morning, "2025-01-01", RecordStatus::Taken).for_medicine(&med.id),
            record(Timing::Evening, "2025-01-01", RecordStatus::Skipped).for_medicine(&med.id),
        ];

        let result = backfill(reconcile(january(&index), &records, &index));

        let stats = &result.medicines["Med A"];
        assert_eq!(stats.total_doses, 62);
        assert_eq!(stats.pending_count, 60);
        assert_eq!(stats.recorded(), stats.total_doses);
        assert_eq!(result.timings.morning.pending, 30);
        assert_eq!(result.timings.evening.pending, 30);
        assert_eq!(result.timings.noon.pending, 0);
        assert_eq!(result.daily[&date("2025-01-01")].pending, 0);
        assert_eq!(result.daily[&date("2025-01-02")].pending, 2);
    }

    #[test]
    fn test_backfill_keeps_surplus_records() {
        let (index, med) = january_plan();
        let records: Vec<_> = (0..3)
            .map(|_| record(Timing::Morning, "2025-01-01", RecordStatus::Taken).for_medicine(&med.id))
            .collect();

        let expected = expand(&index, &[date("2025-01-01")], None);
        let result = backfill(reconcile(expected, &records, &index));

        assert_eq!(result.timings.morning.taken, 3);
        assert_eq!(result.timings.morning.pending, 0);
        assert_eq!(result.timings.evening.pending, 1);
    }
}
