//! Statistics query and report types.
//!
//! Report types serialize with camelCase keys; presentation layers and the
//! PDF report generator consume them as-is.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{RecordStatus, Timing};

/// Adherence rate in percent, `0` when nothing was expected.
///
/// Clamped to `[0, 100]` so surplus records cannot push it past 100.
pub fn adherence_rate(taken: u32, expected: u32) -> f64 {
    if expected == 0 {
        return 0.0;
    }
    (f64::from(taken) / f64::from(expected) * 100.0).min(100.0)
}

/// Input of a period statistics computation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub group_id: String,
    pub patient_id: Option<String>,
    /// Restrict the computation to one medicine
    pub medicine_id: Option<String>,
    /// First day, inclusive
    pub start_date: NaiveDate,
    /// Last day, inclusive
    pub end_date: NaiveDate,
}

impl StatsQuery {
    /// Query a whole group over `[start_date, end_date]`.
    pub fn new(group_id: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            group_id: group_id.into(),
            patient_id: None,
            medicine_id: None,
            start_date,
            end_date,
        }
    }

    pub fn for_patient(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    pub fn for_medicine(mut self, medicine_id: impl Into<String>) -> Self {
        self.medicine_id = Some(medicine_id.into());
        self
    }
}

/// Statistics of one medicine (or one canonical medicine group).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MedicineStats {
    /// First medicine seen under this name; display only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medicine_id: Option<String>,
    pub medicine_name: String,
    /// Sum of dose amounts over all expected doses
    pub total_amount: f64,
    pub unit: String,
    /// Expected doses
    pub total_doses: u32,
    pub taken_count: u32,
    pub skipped_count: u32,
    pub pending_count: u32,
    pub adherence_rate: f64,
}

impl MedicineStats {
    pub fn new(medicine_name: impl Into<String>, medicine_id: Option<String>) -> Self {
        Self {
            medicine_id,
            medicine_name: medicine_name.into(),
            total_amount: 0.0,
            unit: String::new(),
            total_doses: 0,
            taken_count: 0,
            skipped_count: 0,
            pending_count: 0,
            adherence_rate: 0.0,
        }
    }

    /// Records counted so far.
    pub fn recorded(&self) -> u32 {
        self.taken_count + self.skipped_count + self.pending_count
    }

    pub fn count(&mut self, status: RecordStatus) {
        match status {
            RecordStatus::Taken => self.taken_count += 1,
            RecordStatus::Skipped => self.skipped_count += 1,
            RecordStatus::Pending => self.pending_count += 1,
        }
    }

    /// Treat expected doses without a record as pending.
    pub fn backfilled(mut self) -> Self {
        let recorded = self.recorded();
        if recorded < self.total_doses {
            self.pending_count += self.total_doses - recorded;
        }
        self
    }

    /// Recompute the adherence rate from the counters.
    pub fn with_rate(mut self) -> Self {
        self.adherence_rate = adherence_rate(self.taken_count, self.total_doses);
        self
    }
}

/// Counters of one regular timing slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimingStats {
    pub taken: u32,
    pub skipped: u32,
    pub pending: u32,
    /// Expected doses
    pub total: u32,
    pub rate: f64,
}

impl TimingStats {
    pub fn count(&mut self, status: RecordStatus) {
        match status {
            RecordStatus::Taken => self.taken += 1,
            RecordStatus::Skipped => self.skipped += 1,
            RecordStatus::Pending => self.pending += 1,
        }
    }

    pub fn recorded(&self) -> u32 {
        self.taken + self.skipped + self.pending
    }

    /// Treat expected doses without a record as pending.
    pub fn backfilled(mut self) -> Self {
        let recorded = self.recorded();
        if recorded < self.total {
            self.pending += self.total - recorded;
        }
        self
    }

    pub fn with_rate(mut self) -> Self {
        self.rate = adherence_rate(self.taken, self.total);
        self
    }
}

/// Per-timing statistics for the four regular slots.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimingBreakdown {
    pub morning: TimingStats,
    pub noon: TimingStats,
    pub evening: TimingStats,
    pub bedtime: TimingStats,
}

impl TimingBreakdown {
    /// Slot of a regular timing; `None` for as-needed.
    pub fn get_mut(&mut self, timing: Timing) -> Option<&mut TimingStats> {
        match timing {
            Timing::Morning => Some(&mut self.morning),
            Timing::Noon => Some(&mut self.noon),
            Timing::Evening => Some(&mut self.evening),
            Timing::Bedtime => Some(&mut self.bedtime),
            Timing::AsNeeded => None,
        }
    }

    /// Apply `f` to every slot.
    pub fn map(self, f: impl Fn(TimingStats) -> TimingStats) -> Self {
        Self {
            morning: f(self.morning),
            noon: f(self.noon),
            evening: f(self.evening),
            bedtime: f(self.bedtime),
        }
    }
}

/// As-needed outcomes; raw counts only, there is no expected baseline.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AsNeededStats {
    pub taken: u32,
    pub skipped: u32,
    pub pending: u32,
    pub total: u32,
}

impl AsNeededStats {
    pub fn count(&mut self, status: RecordStatus) {
        self.total += 1;
        match status {
            RecordStatus::Taken => self.taken += 1,
            RecordStatus::Skipped => self.skipped += 1,
            RecordStatus::Pending => self.pending += 1,
        }
    }
}

/// Totals across all reported medicines.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_medicines: u32,
    pub total_doses: u32,
    pub total_taken: u32,
    pub total_skipped: u32,
    pub total_pending: u32,
    pub overall_adherence_rate: f64,
}

/// The period a report covers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: u32,
}

/// Result of a period statistics computation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MedicationStatsReport {
    /// Sorted by expected doses, descending
    pub medicines: Vec<MedicineStats>,
    pub summary: StatsSummary,
    pub timing_stats: TimingBreakdown,
    pub as_needed: AsNeededStats,
    pub period: Period,
    /// Non-fatal data inconsistencies (e.g., unit mismatches in a group)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl MedicationStatsReport {
    /// Find a medicine entry by display name.
    pub fn medicine(&self, name: &str) -> Option<&MedicineStats> {
        self.medicines.iter().find(|m| m.medicine_name == name)
    }
}

/// Regular-timing outcomes of a single day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub taken: u32,
    pub skipped: u32,
    pub pending: u32,
    /// Expected doses
    pub total: u32,
    pub rate: f64,
}

/// Calendar-month report with a per-day series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStatsReport {
    pub year: i32,
    pub month: u32,
    pub stats: MedicationStatsReport,
    pub daily: Vec<DailyStats>,
}

/// Medicine names that look like spellings of the same medicine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NameSuggestion {
    pub medicine_names: Vec<String>,
    /// Normalized Levenshtein similarity in `[0, 1]`
    pub similarity: f64,
}
