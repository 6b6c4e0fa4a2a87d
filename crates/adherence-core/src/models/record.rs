//! Medication outcome records.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ModelParseError, Timing};

/// Latest known outcome of a scheduled dose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Not yet taken
    Pending,
    /// Taken
    Taken,
    /// Deliberately skipped
    Skipped,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Taken => "taken",
            RecordStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = ModelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecordStatus::Pending),
            "taken" => Ok(RecordStatus::Taken),
            "skipped" => Ok(RecordStatus::Skipped),
            other => Err(ModelParseError::UnknownStatus(other.to_string())),
        }
    }
}

/// One outcome per (patient, medicine, timing, scheduled date).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutcomeRecord {
    /// Unique record ID
    pub id: String,
    /// Owning care group
    pub group_id: String,
    /// Patient who takes the medicine
    pub patient_id: String,
    /// Registered medicine, if any
    pub medicine_id: Option<String>,
    /// Schedule the record was created from, if any
    pub schedule_id: Option<String>,
    /// Display name when no medicine is registered (e.g., "morning pills")
    pub simple_medicine_name: Option<String>,
    /// Timing slot
    pub timing: Timing,
    /// Calendar date the dose was scheduled for
    pub scheduled_date: NaiveDate,
    /// Current status
    pub status: RecordStatus,
    /// Actual intake timestamp
    pub taken_at: Option<String>,
    /// Who recorded the outcome (patient or supporter)
    pub recorded_by: String,
    /// Free-text note
    pub notes: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
    /// Soft-delete timestamp
    pub deleted_at: Option<String>,
}

impl OutcomeRecord {
    /// Create a record recorded by the patient themself.
    pub fn new(
        group_id: String,
        patient_id: String,
        timing: Timing,
        scheduled_date: NaiveDate,
        status: RecordStatus,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            group_id,
            recorded_by: patient_id.clone(),
            patient_id,
            medicine_id: None,
            schedule_id: None,
            simple_medicine_name: None,
            timing,
            scheduled_date,
            taken_at: (status == RecordStatus::Taken).then(|| now.clone()),
            status,
            notes: None,
            created_at: now.clone(),
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Attach a registered medicine.
    pub fn for_medicine(mut self, medicine_id: impl Into<String>) -> Self {
        self.medicine_id = Some(medicine_id.into());
        self
    }

    /// Attach a free-text medicine name.
    pub fn with_simple_name(mut self, name: impl Into<String>) -> Self {
        self.simple_medicine_name = Some(name.into());
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Scheduled date within `[start, end]`.
    pub fn is_within(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.scheduled_date >= start && self.scheduled_date <= end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("taken".parse::<RecordStatus>().unwrap(), RecordStatus::Taken);
        assert_eq!("skipped".parse::<RecordStatus>().unwrap(), RecordStatus::Skipped);
        assert_eq!("pending".parse::<RecordStatus>().unwrap(), RecordStatus::Pending);
        assert!("done".parse::<RecordStatus>().is_err());
    }

    #[test]
    fn test_taken_record_gets_timestamp() {
        let taken = OutcomeRecord::new(
            "g1".into(),
            "p1".into(),
            Timing::Morning,
            date("2025-01-01"),
            RecordStatus::Taken,
        );
        assert!(taken.taken_at.is_some());
        assert_eq!(taken.recorded_by, "p1");

        let skipped = OutcomeRecord::new(
            "g1".into(),
            "p1".into(),
            Timing::Morning,
            date("2025-01-01"),
            RecordStatus::Skipped,
        );
        assert!(skipped.taken_at.is_none());
    }

    #[test]
    fn test_is_within_inclusive() {
        let record = OutcomeRecord::new(
            "g1".into(),
            "p1".into(),
            Timing::Noon,
            date("2025-01-31"),
            RecordStatus::Pending,
        );
        assert!(record.is_within(date("2025-01-01"), date("2025-01-31")));
        assert!(record.is_within(date("2025-01-31"), date("2025-01-31")));
        assert!(!record.is_within(date("2025-02-01"), date("2025-02-28")));
    }
}
