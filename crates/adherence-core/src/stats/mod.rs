//! Adherence statistics engine.
//!
//! Computes expected-versus-actual dose statistics for a care group over a
//! date range. Everything the computation needs is loaded in one batch,
//! then the pipeline runs in memory:
//!
//! ```text
//! date range → active-window filter → expander ─┐
//!                                                ├→ reconciler → backfill → grouping → aggregate
//!                                      records ──┘
//! ```

mod aggregate;
mod expander;
mod grouping;
mod period;
mod reconciler;

pub use aggregate::*;
pub use expander::*;
pub use grouping::*;
pub use period::*;
pub use reconciler::*;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::config::StatsConfig;
use crate::db::{Database, DbError};
use crate::models::{
    DailyStats, MedicationStatsReport, MedicineGroup, MonthlyStatsReport, NameSuggestion,
    OutcomeRecord, StatsQuery,
};

/// Statistics errors.
#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Invalid month: {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },
}

pub type StatsResult<T> = Result<T, StatsError>;

/// Everything one computation reads from the store.
struct Snapshot {
    index: ScheduleIndex,
    records: Vec<OutcomeRecord>,
    groups: Vec<MedicineGroup>,
}

/// Period report plus its per-day series.
struct Computed {
    report: MedicationStatsReport,
    daily: Vec<DailyStats>,
}

/// Read-only statistics engine over a [`Database`].
pub struct StatsEngine<'a> {
    db: &'a Database,
    config: StatsConfig,
}

impl<'a> StatsEngine<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self::with_config(db, StatsConfig::default())
    }

    pub fn with_config(db: &'a Database, config: StatsConfig) -> Self {
        Self { db, config }
    }

    /// Statistics for `query.start_date..=query.end_date`.
    ///
    /// An inverted range yields an empty report rather than an error.
    pub fn stats_by_period(&self, query: &StatsQuery) -> StatsResult<MedicationStatsReport> {
        Ok(self.compute(query)?.report)
    }

    /// Statistics for a calendar month with a per-day series.
    pub fn monthly_stats(
        &self,
        group_id: &str,
        patient_id: Option<&str>,
        year: i32,
        month: u32,
    ) -> StatsResult<MonthlyStatsReport> {
        let (start, end) =
            month_range(year, month).ok_or(StatsError::InvalidMonth { year, month })?;

        let mut query = StatsQuery::new(group_id, start, end);
        query.patient_id = patient_id.map(str::to_string);

        let Computed { report, daily } = self.compute(&query)?;
        Ok(MonthlyStatsReport {
            year,
            month,
            stats: report,
            daily,
        })
    }

    /// Per-day regular-timing series for an arbitrary range.
    pub fn daily_breakdown(&self, query: &StatsQuery) -> StatsResult<Vec<DailyStats>> {
        Ok(self.compute(query)?.daily)
    }

    /// Pairs of medicine names in the group that look like the same medicine.
    pub fn suggest_similar_names(
        &self,
        group_id: &str,
        threshold: Option<f64>,
    ) -> StatsResult<Vec<NameSuggestion>> {
        let names: Vec<String> = self
            .db
            .list_medicines_by_group(group_id)?
            .into_iter()
            .map(|m| m.name)
            .collect();
        let groups = self.db.list_medicine_groups(group_id)?;

        let threshold = threshold.unwrap_or(self.config.similarity_threshold);
        Ok(grouping::suggest_similar_names(
            &names,
            &groups,
            threshold,
            self.config.max_suggestions,
        ))
    }

    fn load(&self, query: &StatsQuery) -> StatsResult<Snapshot> {
        let prescriptions = self.db.list_active_prescriptions_overlapping(
            &query.group_id,
            query.start_date,
            query.end_date,
        )?;
        let medicines = self.db.list_medicines_by_group(&query.group_id)?;
        let schedules = self.db.list_schedules_by_group(&query.group_id)?;
        let records = self.db.list_records(
            &query.group_id,
            query.patient_id.as_deref(),
            query.start_date,
            query.end_date,
        )?;
        let groups = self.db.list_medicine_groups(&query.group_id)?;

        tracing::debug!(
            group_id = %query.group_id,
            prescriptions = prescriptions.len(),
            medicines = medicines.len(),
            schedules = schedules.len(),
            records = records.len(),
            medicine_groups = groups.len(),
            "Loaded statistics snapshot"
        );

        Ok(Snapshot {
            index: ScheduleIndex::build(prescriptions, medicines, schedules),
            records,
            groups,
        })
    }

    fn compute(&self, query: &StatsQuery) -> StatsResult<Computed> {
        let dates = date_range(query.start_date, query.end_date);
        let Snapshot {
            index,
            mut records,
            groups,
        } = self.load(query)?;
        records.retain(|r| r.is_within(query.start_date, query.end_date));

        let expected = expand(&index, &dates, query.medicine_id.as_deref());
        let reconciled = backfill(reconcile(expected, &records, &index));

        let (medicines, mismatches) = apply_grouping(reconciled.medicines, &groups);
        let warnings = mismatches.iter().map(ToString::to_string).collect();
        let daily = daily_series(reconciled.daily);

        let report = assemble(
            Reconciled {
                medicines,
                timings: reconciled.timings,
                as_needed: reconciled.as_needed,
                daily: BTreeMap::new(),
            },
            warnings,
            query.start_date,
            query.end_date,
        );

        tracing::debug!(
            days = report.period.days,
            medicines = report.medicines.len(),
            total_doses = report.summary.total_doses,
            "Computed adherence statistics"
        );

        Ok(Computed { report, daily })
    }
}
