//! Final report assembly.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::reconciler::Reconciled;
use crate::models::{
    adherence_rate, DailyStats, MedicationStatsReport, MedicineStats, Period, StatsSummary,
    TimingStats,
};

/// Build the report from backfilled, grouped statistics.
pub fn assemble(
    reconciled: Reconciled,
    warnings: Vec<String>,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> MedicationStatsReport {
    let mut medicines: Vec<MedicineStats> = reconciled
        .medicines
        .into_values()
        .map(MedicineStats::with_rate)
        .collect();
    medicines.sort_by(|a, b| {
        b.total_doses
            .cmp(&a.total_doses)
            .then_with(|| a.medicine_name.cmp(&b.medicine_name))
    });

    let summary = summarize(&medicines);
    let days = (end_date - start_date).num_days() + 1;

    MedicationStatsReport {
        medicines,
        summary,
        timing_stats: reconciled.timings.map(TimingStats::with_rate),
        as_needed: reconciled.as_needed,
        period: Period {
            start_date,
            end_date,
            days: u32::try_from(days).unwrap_or(0),
        },
        warnings,
    }
}

fn summarize(medicines: &[MedicineStats]) -> StatsSummary {
    let mut summary = medicines.iter().fold(StatsSummary::default(), |mut acc, m| {
        acc.total_doses += m.total_doses;
        acc.total_taken += m.taken_count;
        acc.total_skipped += m.skipped_count;
        acc.total_pending += m.pending_count;
        acc
    });
    summary.total_medicines = u32::try_from(medicines.len()).unwrap_or(u32::MAX);
    summary.overall_adherence_rate = adherence_rate(summary.total_taken, summary.total_doses);
    summary
}

/// Per-day series of regular-timing outcomes, in date order.
pub fn daily_series(daily: BTreeMap<NaiveDate, TimingStats>) -> Vec<DailyStats> {
    daily
        .into_iter()
        .map(|(date, stats)| {
            let stats = stats.with_rate();
            DailyStats {
                date,
                taken: stats.taken,
                skipped: stats.skipped,
                pending: stats.pending,
                total: stats.total,
                rate: stats.rate,
            }
        })
        .collect()
}
