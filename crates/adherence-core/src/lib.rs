//! Adherence Core Library
//!
//! Local-first medication adherence statistics for care groups.
//!
//! # Architecture
//!
//! ```text
//!   Prescriptions ─→ Medicines ─→ Dosing Schedules        Outcome Records
//!         │                                                      │
//!         ▼                                                      │
//!   Active-Window Filter (per day)                               │
//!         │                                                      │
//!         ▼                                                      ▼
//!   Expected-Dose Expander ───────────────────────────→ Record Reconciler
//!                                                                │
//!                                                                ▼
//!                                                       Backfill Completer
//!                                                                │
//!                                                                ▼
//!                                                 Canonical-Name Grouping
//!                                                                │
//!                                              ┌─────────────────┼─────────────────┐
//!                                              ▼                 ▼                 ▼
//!                                        Period Report     Monthly Report     Report Export
//! ```
//!
//! # Core Principle
//!
//! **Missing data degrades, it never fails.** An expected dose without a
//! record is pending; a record without a resolvable medicine still counts
//! for its timing slot.
//!
//! # Modules
//!
//! - [`db`]: SQLite store for prescriptions, medicines, schedules, records and medicine groups
//! - [`models`]: Domain and report types
//! - [`stats`]: Statistics engine (expansion, reconciliation, grouping, aggregation)
//! - [`export`]: Report export with content hash
//! - [`config`]: Engine configuration
//! - [`logging`]: Tracing subscriber setup

pub mod config;
pub mod db;
pub mod export;
pub mod logging;
pub mod models;
pub mod stats;

// Re-export commonly used types
pub use config::{ConfigError, StatsConfig};
pub use db::{Database, DbError, DeleteOutcome};
pub use export::ReportExport;
pub use models::{
    DosingSchedule, GroupConfigError, MedicationStatsReport, Medicine, MedicineGroup,
    MedicineGroupUpdate, MedicineStats, MonthlyStatsReport, NameSuggestion, OutcomeRecord,
    Prescription, RecordStatus, StatsQuery, Timing,
};
pub use stats::{StatsEngine, StatsError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum AdherenceError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl From<DbError> for AdherenceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => AdherenceError::NotFound(what),
            DbError::Constraint(_) | DbError::GroupConfig(_) => {
                AdherenceError::InvalidInput(e.to_string())
            }
            other => AdherenceError::DatabaseError(other.to_string()),
        }
    }
}

impl From<StatsError> for AdherenceError {
    fn from(e: StatsError) -> Self {
        match e {
            StatsError::Database(db) => db.into(),
            StatsError::InvalidMonth { .. } => AdherenceError::InvalidInput(e.to_string()),
        }
    }
}

impl From<ConfigError> for AdherenceError {
    fn from(e: ConfigError) -> Self {
        AdherenceError::ConfigError(e.to_string())
    }
}

impl From<GroupConfigError> for AdherenceError {
    fn from(e: GroupConfigError) -> Self {
        AdherenceError::InvalidInput(e.to_string())
    }
}

impl From<models::ModelParseError> for AdherenceError {
    fn from(e: models::ModelParseError) -> Self {
        AdherenceError::InvalidInput(e.to_string())
    }
}

impl From<serde_json::Error> for AdherenceError {
    fn from(e: serde_json::Error) -> Self {
        AdherenceError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for AdherenceError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        AdherenceError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, AdherenceError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AdherenceError::InvalidInput(format!("expected YYYY-MM-DD, got {:?}", value)))
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<AdherenceCore>, AdherenceError> {
    let db = Database::open(&path)?;
    Ok(AdherenceCore::wrap(db, StatsConfig::default()))
}

/// Open or create a database with an engine config given as JSON.
#[uniffi::export]
pub fn open_database_with_config(
    path: String,
    config_json: String,
) -> Result<Arc<AdherenceCore>, AdherenceError> {
    let config = StatsConfig::from_json_str(&config_json)?;
    let db = Database::open(&path)?;
    Ok(AdherenceCore::wrap(db, config))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<AdherenceCore>, AdherenceError> {
    let db = Database::open_in_memory()?;
    Ok(AdherenceCore::wrap(db, StatsConfig::default()))
}

/// Install the tracing subscriber; `false` if one was already installed.
#[uniffi::export]
pub fn init_logging(default_filter: Option<String>) -> bool {
    logging::init_logging(default_filter.as_deref().unwrap_or(logging::DEFAULT_LOG_FILTER))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct AdherenceCore {
    db: Arc<Mutex<Database>>,
    config: StatsConfig,
}

impl AdherenceCore {
    fn wrap(db: Database, config: StatsConfig) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            config,
        })
    }

    fn query(
        group_id: String,
        patient_id: Option<String>,
        medicine_id: Option<String>,
        start_date: &str,
        end_date: &str,
    ) -> Result<StatsQuery, AdherenceError> {
        let mut query = StatsQuery::new(group_id, parse_date(start_date)?, parse_date(end_date)?);
        query.patient_id = patient_id;
        query.medicine_id = medicine_id;
        Ok(query)
    }

    fn period_report(&self, query: &StatsQuery) -> Result<MedicationStatsReport, AdherenceError> {
        let db = self.db.lock()?;
        let engine = StatsEngine::with_config(&db, self.config.clone());
        Ok(engine.stats_by_period(query)?)
    }
}

#[uniffi::export]
impl AdherenceCore {
    // =========================================================================
    // Prescription Operations
    // =========================================================================

    /// Create a prescription. Dates are `YYYY-MM-DD`; no end date means open-ended.
    pub fn create_prescription(
        &self,
        group_id: String,
        name: String,
        start_date: String,
        end_date: Option<String>,
        notes: Option<String>,
    ) -> Result<FfiPrescription, AdherenceError> {
        let mut prescription = Prescription::new(group_id, name, parse_date(&start_date)?);
        prescription.end_date = end_date.as_deref().map(parse_date).transpose()?;
        prescription.notes = notes;

        let db = self.db.lock()?;
        db.insert_prescription(&prescription)?;
        Ok(prescription.into())
    }

    /// List the non-deleted prescriptions of a group.
    pub fn list_prescriptions(&self, group_id: String) -> Result<Vec<FfiPrescription>, AdherenceError> {
        let db = self.db.lock()?;
        let prescriptions = db.list_prescriptions(&group_id)?;
        Ok(prescriptions.into_iter().map(|p| p.into()).collect())
    }

    /// Toggle whether a prescription produces expected doses.
    pub fn set_prescription_active(&self, id: String, is_active: bool) -> Result<bool, AdherenceError> {
        let db = self.db.lock()?;
        Ok(db.set_prescription_active(&id, is_active)?)
    }

    /// Delete a prescription; soft when outcome records reference its medicines.
    pub fn delete_prescription(&self, id: String) -> Result<FfiDeleteOutcome, AdherenceError> {
        let db = self.db.lock()?;
        Ok(db.delete_prescription(&id)?.into())
    }

    /// Undo a soft delete, restoring the medicines deleted with it.
    pub fn restore_prescription(&self, id: String) -> Result<bool, AdherenceError> {
        let db = self.db.lock()?;
        Ok(db.restore_prescription(&id)?)
    }

    // =========================================================================
    // Medicine & Schedule Operations
    // =========================================================================

    /// Add a medicine to a prescription.
    pub fn add_medicine(
        &self,
        group_id: String,
        prescription_id: Option<String>,
        name: String,
        description: Option<String>,
    ) -> Result<FfiMedicine, AdherenceError> {
        let mut medicine = Medicine::new(group_id, prescription_id, name);
        medicine.description = description;

        let db = self.db.lock()?;
        db.insert_medicine(&medicine)?;
        Ok(medicine.into())
    }

    /// List the non-deleted medicines of a group, or of one of its prescriptions.
    pub fn list_medicines(
        &self,
        group_id: String,
        prescription_id: Option<String>,
    ) -> Result<Vec<FfiMedicine>, AdherenceError> {
        let db = self.db.lock()?;
        let medicines = match prescription_id {
            Some(prescription_id) => db.list_medicines_by_prescription(&prescription_id)?,
            None => db.list_medicines_by_group(&group_id)?,
        };
        Ok(medicines.into_iter().map(|m| m.into()).collect())
    }

    pub fn delete_medicine(&self, id: String) -> Result<bool, AdherenceError> {
        let db = self.db.lock()?;
        Ok(db.soft_delete_medicine(&id)?)
    }

    /// Replace the dosing schedule of a medicine.
    ///
    /// The previous schedule is soft-deleted in the same transaction, so a
    /// failed replace leaves it active.
    pub fn set_schedule(
        &self,
        medicine_id: String,
        timings: Vec<String>,
        dosage_amount: Option<f64>,
        dosage_unit: Option<String>,
    ) -> Result<FfiSchedule, AdherenceError> {
        let timings = timings
            .iter()
            .map(|t| t.parse::<Timing>())
            .collect::<Result<Vec<_>, _>>()?;
        if timings.is_empty() {
            return Err(AdherenceError::InvalidInput(
                "a schedule needs at least one timing".into(),
            ));
        }

        let db = self.db.lock()?;
        let medicine = db
            .get_medicine(&medicine_id)?
            .ok_or_else(|| AdherenceError::NotFound(format!("medicine {}", medicine_id)))?;

        let mut schedule = DosingSchedule::new(medicine.id.clone(), medicine.group_id, timings);
        if let Some(amount) = dosage_amount {
            schedule = schedule.with_dosage(amount, dosage_unit.unwrap_or_default());
        }

        db.replace_schedule(&schedule)?;
        Ok(schedule.into())
    }

    /// Live schedules of a medicine.
    pub fn list_schedules(&self, medicine_id: String) -> Result<Vec<FfiSchedule>, AdherenceError> {
        let db = self.db.lock()?;
        let schedules = db.list_schedules_by_medicine(&medicine_id)?;
        Ok(schedules.into_iter().map(|s| s.into()).collect())
    }

    /// Soft-delete a schedule; its medicine stops producing expected doses.
    pub fn delete_schedule(&self, id: String) -> Result<bool, AdherenceError> {
        let db = self.db.lock()?;
        Ok(db.soft_delete_schedule(&id)?)
    }

    // =========================================================================
    // Outcome Record Operations
    // =========================================================================

    /// Record the outcome of a dose.
    pub fn record_outcome(&self, input: FfiOutcomeInput) -> Result<FfiOutcomeRecord, AdherenceError> {
        let mut record = OutcomeRecord::new(
            input.group_id,
            input.patient_id,
            input.timing.parse()?,
            parse_date(&input.scheduled_date)?,
            input.status.parse()?,
        );
        record.medicine_id = input.medicine_id;
        record.schedule_id = input.schedule_id;
        record.simple_medicine_name = input.simple_medicine_name;
        record.notes = input.notes;
        if let Some(recorded_by) = input.recorded_by {
            record.recorded_by = recorded_by;
        }

        let db = self.db.lock()?;
        db.insert_record(&record)?;
        Ok(record.into())
    }

    /// Change the status of a record. Marking it taken stamps the intake time.
    pub fn update_record_status(&self, id: String, status: String) -> Result<bool, AdherenceError> {
        let status: RecordStatus = status.parse()?;
        let taken_at = (status == RecordStatus::Taken).then(|| chrono::Utc::now().to_rfc3339());

        let db = self.db.lock()?;
        Ok(db.update_record_status(&id, status, taken_at.as_deref())?)
    }

    pub fn delete_record(&self, id: String) -> Result<bool, AdherenceError> {
        let db = self.db.lock()?;
        Ok(db.soft_delete_record(&id)?)
    }

    // =========================================================================
    // Medicine Group Operations
    // =========================================================================

    /// Declare several medicine names as one canonical medicine.
    pub fn create_medicine_group(
        &self,
        group_id: String,
        canonical_name: String,
        medicine_names: Vec<String>,
        notes: Option<String>,
    ) -> Result<FfiMedicineGroup, AdherenceError> {
        let mut group = MedicineGroup::new(group_id, &canonical_name, medicine_names)?;
        group.notes = notes;

        let db = self.db.lock()?;
        db.create_medicine_group(&group)?;
        Ok(group.into())
    }

    /// Apply a partial update; omitted fields stay unchanged.
    pub fn update_medicine_group(
        &self,
        id: String,
        canonical_name: Option<String>,
        medicine_names: Option<Vec<String>>,
        notes: Option<String>,
    ) -> Result<FfiMedicineGroup, AdherenceError> {
        let update = MedicineGroupUpdate {
            canonical_name,
            medicine_names,
            notes,
        };

        let db = self.db.lock()?;
        Ok(db.update_medicine_group(&id, update)?.into())
    }

    pub fn list_medicine_groups(&self, group_id: String) -> Result<Vec<FfiMedicineGroup>, AdherenceError> {
        let db = self.db.lock()?;
        let groups = db.list_medicine_groups(&group_id)?;
        Ok(groups.into_iter().map(|g| g.into()).collect())
    }

    pub fn delete_medicine_group(&self, id: String) -> Result<bool, AdherenceError> {
        let db = self.db.lock()?;
        Ok(db.delete_medicine_group(&id)?)
    }

    /// Suggest medicine names that look like spellings of the same medicine.
    pub fn suggest_similar_names(
        &self,
        group_id: String,
        threshold: Option<f64>,
    ) -> Result<Vec<FfiNameSuggestion>, AdherenceError> {
        let db = self.db.lock()?;
        let engine = StatsEngine::with_config(&db, self.config.clone());
        let suggestions = engine.suggest_similar_names(&group_id, threshold)?;
        Ok(suggestions.into_iter().map(|s| s.into()).collect())
    }

    // =========================================================================
    // Statistics Operations
    // =========================================================================

    /// Period statistics as camelCase JSON.
    pub fn stats_by_period_json(
        &self,
        group_id: String,
        patient_id: Option<String>,
        medicine_id: Option<String>,
        start_date: String,
        end_date: String,
    ) -> Result<String, AdherenceError> {
        let query = Self::query(group_id, patient_id, medicine_id, &start_date, &end_date)?;
        let report = self.period_report(&query)?;
        Ok(serde_json::to_string(&report)?)
    }

    /// Calendar-month statistics with a daily series, as camelCase JSON.
    pub fn monthly_stats_json(
        &self,
        group_id: String,
        patient_id: Option<String>,
        year: i32,
        month: u32,
    ) -> Result<String, AdherenceError> {
        let db = self.db.lock()?;
        let engine = StatsEngine::with_config(&db, self.config.clone());
        let report = engine.monthly_stats(&group_id, patient_id.as_deref(), year, month)?;
        Ok(serde_json::to_string(&report)?)
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Export period statistics as JSON with a content hash.
    pub fn export_report_json(
        &self,
        group_id: String,
        patient_id: Option<String>,
        start_date: String,
        end_date: String,
    ) -> Result<String, AdherenceError> {
        let query = Self::query(group_id.clone(), patient_id.clone(), None, &start_date, &end_date)?;
        let report = self.period_report(&query)?;
        let export = ReportExport::from_report(report, group_id, patient_id)?;
        Ok(export.to_json()?)
    }

    /// Export period statistics as CSV.
    pub fn export_report_csv(
        &self,
        group_id: String,
        patient_id: Option<String>,
        start_date: String,
        end_date: String,
    ) -> Result<String, AdherenceError> {
        let query = Self::query(group_id.clone(), patient_id.clone(), None, &start_date, &end_date)?;
        let report = self.period_report(&query)?;
        let export = ReportExport::from_report(report, group_id, patient_id)?;
        Ok(export.to_csv())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe prescription.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPrescription {
    pub id: String,
    pub group_id: String,
    pub name: String,
    pub start_date: String,
    pub end_date: Option<String>,
    pub is_active: bool,
    pub notes: Option<String>,
}

impl From<Prescription> for FfiPrescription {
    fn from(p: Prescription) -> Self {
        Self {
            id: p.id,
            group_id: p.group_id,
            name: p.name,
            start_date: p.start_date.to_string(),
            end_date: p.end_date.map(|d| d.to_string()),
            is_active: p.is_active,
            notes: p.notes,
        }
    }
}

/// FFI-safe delete outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiDeleteOutcome {
    SoftDeleted,
    HardDeleted,
}

impl From<DeleteOutcome> for FfiDeleteOutcome {
    fn from(outcome: DeleteOutcome) -> Self {
        match outcome {
            DeleteOutcome::SoftDeleted => FfiDeleteOutcome::SoftDeleted,
            DeleteOutcome::HardDeleted => FfiDeleteOutcome::HardDeleted,
        }
    }
}

/// FFI-safe medicine.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicine {
    pub id: String,
    pub group_id: String,
    pub prescription_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
}

impl From<Medicine> for FfiMedicine {
    fn from(m: Medicine) -> Self {
        Self {
            id: m.id,
            group_id: m.group_id,
            prescription_id: m.prescription_id,
            name: m.name,
            description: m.description,
        }
    }
}

/// FFI-safe dosing schedule.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSchedule {
    pub id: String,
    pub medicine_id: String,
    pub timings: Vec<String>,
    pub dosage_amount: Option<f64>,
    pub dosage_unit: Option<String>,
}

impl From<DosingSchedule> for FfiSchedule {
    fn from(s: DosingSchedule) -> Self {
        Self {
            id: s.id,
            medicine_id: s.medicine_id,
            timings: s.timings.iter().map(|t| t.to_string()).collect(),
            dosage_amount: s.dosage.as_ref().map(|d| d.amount),
            dosage_unit: s.dosage.map(|d| d.unit),
        }
    }
}

/// FFI-safe outcome to record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOutcomeInput {
    pub group_id: String,
    pub patient_id: String,
    pub medicine_id: Option<String>,
    pub schedule_id: Option<String>,
    pub simple_medicine_name: Option<String>,
    /// morning, noon, evening, bedtime or asNeeded
    pub timing: String,
    /// YYYY-MM-DD
    pub scheduled_date: String,
    /// pending, taken or skipped
    pub status: String,
    /// Defaults to the patient
    pub recorded_by: Option<String>,
    pub notes: Option<String>,
}

/// FFI-safe outcome record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOutcomeRecord {
    pub id: String,
    pub group_id: String,
    pub patient_id: String,
    pub medicine_id: Option<String>,
    pub timing: String,
    pub scheduled_date: String,
    pub status: String,
    pub taken_at: Option<String>,
    pub recorded_by: String,
}

impl From<OutcomeRecord> for FfiOutcomeRecord {
    fn from(r: OutcomeRecord) -> Self {
        Self {
            id: r.id,
            group_id: r.group_id,
            patient_id: r.patient_id,
            medicine_id: r.medicine_id,
            timing: r.timing.to_string(),
            scheduled_date: r.scheduled_date.to_string(),
            status: r.status.to_string(),
            taken_at: r.taken_at,
            recorded_by: r.recorded_by,
        }
    }
}

/// FFI-safe medicine group.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicineGroup {
    pub id: String,
    pub group_id: String,
    pub canonical_name: String,
    pub medicine_names: Vec<String>,
    pub notes: Option<String>,
}

impl From<MedicineGroup> for FfiMedicineGroup {
    fn from(g: MedicineGroup) -> Self {
        Self {
            id: g.id,
            group_id: g.group_id,
            canonical_name: g.canonical_name,
            medicine_names: g.medicine_names,
            notes: g.notes,
        }
    }
}

/// FFI-safe name suggestion.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNameSuggestion {
    pub medicine_names: Vec<String>,
    pub similarity: f64,
}

impl From<NameSuggestion> for FfiNameSuggestion {
    fn from(s: NameSuggestion) -> Self {
        Self {
            medicine_names: s.medicine_names,
            similarity: s.similarity,
        }
    }
}
