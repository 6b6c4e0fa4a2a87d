//! Canonical-name medicine groups.
//!
//! A medicine group declares that several display names refer to the same
//! medicine, so their statistics are reported under one canonical name.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::normalize_name;

/// Validation failures raised when defining a medicine group.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GroupConfigError {
    #[error("Canonical name must not be empty")]
    EmptyCanonicalName,

    #[error("At least one medicine name is required")]
    EmptyMedicineNames,

    #[error("Medicine name \"{name}\" already belongs to group \"{canonical_name}\"")]
    NameAlreadyGrouped {
        name: String,
        canonical_name: String,
    },
}

/// A canonical name plus the variant names it subsumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicineGroup {
    /// Unique configuration ID
    pub id: String,
    /// Owning care group
    pub group_id: String,
    /// Name the merged statistics are reported under
    pub canonical_name: String,
    /// Variant names to merge
    pub medicine_names: Vec<String>,
    /// Free-text notes
    pub notes: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl MedicineGroup {
    /// Create a validated medicine group. Names are normalized and deduplicated.
    pub fn new(
        group_id: String,
        canonical_name: &str,
        medicine_names: Vec<String>,
    ) -> Result<Self, GroupConfigError> {
        let now = chrono::Utc::now().to_rfc3339();
        let group = Self {
            id: uuid::Uuid::new_v4().to_string(),
            group_id,
            canonical_name: normalize_name(canonical_name),
            medicine_names: clean_names(medicine_names),
            notes: None,
            created_at: now.clone(),
            updated_at: now,
        };
        group.validate()?;
        Ok(group)
    }

    /// Check the canonical name and variant list are non-empty.
    pub fn validate(&self) -> Result<(), GroupConfigError> {
        if self.canonical_name.is_empty() {
            return Err(GroupConfigError::EmptyCanonicalName);
        }
        if self.medicine_names.is_empty() {
            return Err(GroupConfigError::EmptyMedicineNames);
        }
        Ok(())
    }

    /// Reject variant names already claimed by another group.
    pub fn check_conflicts<'a, I>(&self, existing: I) -> Result<(), GroupConfigError>
    where
        I: IntoIterator<Item = &'a MedicineGroup>,
    {
        for other in existing {
            if other.id == self.id {
                continue;
            }
            if let Some(name) = self.medicine_names.iter().find(|n| other.contains(n)) {
                return Err(GroupConfigError::NameAlreadyGrouped {
                    name: name.clone(),
                    canonical_name: other.canonical_name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Whether `name` is one of the variants.
    pub fn contains(&self, name: &str) -> bool {
        let key = normalize_name(name);
        self.medicine_names.iter().any(|n| *n == key)
    }
}

/// Partial update of a medicine group.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MedicineGroupUpdate {
    pub canonical_name: Option<String>,
    pub medicine_names: Option<Vec<String>>,
    pub notes: Option<String>,
}

impl MedicineGroupUpdate {
    /// Apply the update, returning the validated result.
    pub fn apply_to(self, mut group: MedicineGroup) -> Result<MedicineGroup, GroupConfigError> {
        if let Some(canonical_name) = self.canonical_name {
            group.canonical_name = normalize_name(&canonical_name);
        }
        if let Some(names) = self.medicine_names {
            group.medicine_names = clean_names(names);
        }
        if let Some(notes) = self.notes {
            group.notes = Some(notes);
        }
        group.validate()?;
        group.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(group)
    }
}

fn clean_names(names: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(names.len());
    for name in names.iter().map(|n| normalize_name(n)) {
        if !name.is_empty() && !cleaned.contains(&name) {
            cleaned.push(name);
        }
    }
    cleaned
}
