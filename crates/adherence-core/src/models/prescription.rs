//! Prescription, medicine and dosing schedule models.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ModelParseError;

/// A named time-of-day dosing slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum Timing {
    Morning,
    Noon,
    Evening,
    Bedtime,
    /// Taken without a fixed schedule (PRN)
    AsNeeded,
}

impl Timing {
    /// The four slots that carry an expected-dose baseline.
    pub const REGULAR: [Timing; 4] = [
        Timing::Morning,
        Timing::Noon,
        Timing::Evening,
        Timing::Bedtime,
    ];

    /// Whether this slot counts towards expected doses.
    pub fn is_regular(self) -> bool {
        !matches!(self, Timing::AsNeeded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timing::Morning => "morning",
            Timing::Noon => "noon",
            Timing::Evening => "evening",
            Timing::Bedtime => "bedtime",
            Timing::AsNeeded => "asNeeded",
        }
    }
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timing {
    type Err = ModelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "morning" => Ok(Timing::Morning),
            "noon" => Ok(Timing::Noon),
            "evening" => Ok(Timing::Evening),
            "bedtime" => Ok(Timing::Bedtime),
            "asNeeded" => Ok(Timing::AsNeeded),
            other => Err(ModelParseError::UnknownTiming(other.to_string())),
        }
    }
}

/// A prescription: the validity window for the medicines it carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    /// Unique prescription ID
    pub id: String,
    /// Owning care group
    pub group_id: String,
    /// Human-readable name (e.g., "October refill")
    pub name: String,
    /// First day the prescription is in force
    pub start_date: NaiveDate,
    /// Last day in force; `None` means still active
    pub end_date: Option<NaiveDate>,
    /// Manual activation switch, independent of the date window
    pub is_active: bool,
    /// Free-text notes (clinic, purpose)
    pub notes: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
    /// Soft-delete timestamp
    pub deleted_at: Option<String>,
}

impl Prescription {
    /// Create an open-ended, active prescription.
    pub fn new(group_id: String, name: String, start_date: NaiveDate) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            group_id,
            name,
            start_date,
            end_date: None,
            is_active: true,
            notes: None,
            created_at: now.clone(),
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Set the end date.
    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// End date, when present, must not precede the start date.
    pub fn has_valid_window(&self) -> bool {
        self.end_date.map_or(true, |end| end >= self.start_date)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether `date` falls inside the prescription's window.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        crate::stats::is_active_on(date, self.start_date, self.end_date)
    }

    /// Whether this prescription produces expected doses on `date`.
    pub fn contributes_on(&self, date: NaiveDate) -> bool {
        self.is_active && !self.is_deleted() && self.is_active_on(date)
    }
}

/// A medicine attached to a prescription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medicine {
    /// Unique medicine ID
    pub id: String,
    /// Owning care group
    pub group_id: String,
    /// Parent prescription; legacy records may lack it
    pub prescription_id: Option<String>,
    /// Display name
    pub name: String,
    /// Free-text notes
    pub description: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Soft-delete timestamp
    pub deleted_at: Option<String>,
}

impl Medicine {
    /// Create a medicine belonging to `prescription_id`.
    pub fn new(group_id: String, prescription_id: Option<String>, name: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            group_id,
            prescription_id,
            name,
            description: None,
            created_at: chrono::Utc::now().to_rfc3339(),
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Name used as the statistics key.
    pub fn stats_key(&self) -> String {
        normalize_name(&self.name)
    }
}

/// Numeric dose per administration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dosage {
    /// Amount per timing (e.g., 1, 2.5)
    pub amount: f64,
    /// Unit (e.g., "mg", "tablet", "mL")
    pub unit: String,
}

/// Dosing schedule of a single medicine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DosingSchedule {
    /// Unique schedule ID
    pub id: String,
    /// Medicine this schedule belongs to
    pub medicine_id: String,
    /// Owning care group
    pub group_id: String,
    /// Timing slots, duplicates removed
    pub timings: Vec<Timing>,
    /// Dose per timing
    pub dosage: Option<Dosage>,
    /// Free-text notes
    pub notes: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
    /// Soft-delete timestamp
    pub deleted_at: Option<String>,
}

impl DosingSchedule {
    /// Create a schedule; timings are sorted and deduplicated.
    pub fn new(medicine_id: String, group_id: String, mut timings: Vec<Timing>) -> Self {
        timings.sort();
        timings.dedup();
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            medicine_id,
            group_id,
            timings,
            dosage: None,
            notes: None,
            created_at: now.clone(),
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Set the dose per timing.
    pub fn with_dosage(mut self, amount: f64, unit: impl Into<String>) -> Self {
        self.dosage = Some(Dosage {
            amount,
            unit: unit.into(),
        });
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Timings that produce an expected dose each day.
    pub fn regular_timings(&self) -> impl Iterator<Item = Timing> + '_ {
        self.timings.iter().copied().filter(|t| t.is_regular())
    }
}

/// Normalize a medicine display name for keying statistics.
///
/// Trims and collapses inner whitespace; case is preserved.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}
