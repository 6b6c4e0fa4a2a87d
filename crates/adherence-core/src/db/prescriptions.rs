//! Prescription database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{format_date, parse_date, Database, DbError, DbResult};
use crate::models::Prescription;

/// How a prescription was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Outcome records exist; the prescription and its medicines were marked deleted
    SoftDeleted,
    /// No records referenced it; rows were removed
    HardDeleted,
}

impl Database {
    /// Insert a new prescription.
    pub fn insert_prescription(&self, prescription: &Prescription) -> DbResult<()> {
        if !prescription.has_valid_window() {
            return Err(DbError::Constraint(format!(
                "prescription {} ends before it starts",
                prescription.id
            )));
        }

        self.conn.execute(
            r#"
            INSERT INTO prescriptions (
                id, group_id, name, start_date, end_date, is_active,
                notes, created_at, updated_at, deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                prescription.id,
                prescription.group_id,
                prescription.name,
                format_date(prescription.start_date),
                prescription.end_date.map(format_date),
                prescription.is_active,
                prescription.notes,
                prescription.created_at,
                prescription.updated_at,
                prescription.deleted_at,
            ],
        )?;
        Ok(())
    }

    /// Get a prescription by ID (including soft-deleted ones).
    pub fn get_prescription(&self, id: &str) -> DbResult<Option<Prescription>> {
        self.conn
            .query_row(
                r#"
                SELECT id, group_id, name, start_date, end_date, is_active,
                       notes, created_at, updated_at, deleted_at
                FROM prescriptions
                WHERE id = ?
                "#,
                [id],
                prescription_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List the group's prescriptions that are not deleted.
    pub fn list_prescriptions(&self, group_id: &str) -> DbResult<Vec<Prescription>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, group_id, name, start_date, end_date, is_active,
                   notes, created_at, updated_at, deleted_at
            FROM prescriptions
            WHERE group_id = ? AND deleted_at IS NULL
            ORDER BY start_date DESC
            "#,
        )?;

        let rows = stmt.query_map([group_id], prescription_row)?;

        let mut prescriptions = Vec::new();
        for row in rows {
            prescriptions.push(row?.try_into()?);
        }
        Ok(prescriptions)
    }

    /// List active, non-deleted prescriptions whose window overlaps `[start, end]`.
    pub fn list_active_prescriptions_overlapping(
        &self,
        group_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DbResult<Vec<Prescription>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, group_id, name, start_date, end_date, is_active,
                   notes, created_at, updated_at, deleted_at
            FROM prescriptions
            WHERE group_id = ?1
              AND is_active = 1
              AND deleted_at IS NULL
              AND start_date <= ?3
              AND (end_date IS NULL OR end_date >= ?2)
            ORDER BY start_date
            "#,
        )?;

        let rows = stmt.query_map(
            params![group_id, format_date(start), format_date(end)],
            prescription_row,
        )?;

        let mut prescriptions = Vec::new();
        for row in rows {
            prescriptions.push(row?.try_into()?);
        }
        Ok(prescriptions)
    }

    /// Toggle the manual activation flag.
    pub fn set_prescription_active(&self, id: &str, is_active: bool) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE prescriptions SET is_active = ?, updated_at = datetime('now') WHERE id = ?",
            params![is_active, id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Delete a prescription.
    ///
    /// Soft-deletes (together with its medicines) when outcome records
    /// reference any of its medicines, otherwise removes the rows.
    pub fn delete_prescription(&self, id: &str) -> DbResult<DeleteOutcome> {
        if self.get_prescription(id)?.is_none() {
            return Err(DbError::NotFound(format!("prescription {}", id)));
        }

        let record_count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM medication_records r
            JOIN medicines m ON r.medicine_id = m.id
            WHERE m.prescription_id = ?
            "#,
            [id],
            |row| row.get(0),
        )?;

        let tx = self.conn.unchecked_transaction()?;
        let outcome = if record_count > 0 {
            // Shared marker so restore only revives medicines removed with the prescription
            let deleted_at = chrono::Utc::now().to_rfc3339();
            tx.execute(
                "UPDATE medicines SET deleted_at = ?2 WHERE prescription_id = ?1 AND deleted_at IS NULL",
                params![id, deleted_at],
            )?;
            tx.execute(
                "UPDATE prescriptions SET deleted_at = ?2, updated_at = datetime('now') WHERE id = ?1",
                params![id, deleted_at],
            )?;
            DeleteOutcome::SoftDeleted
        } else {
            tx.execute(
                "DELETE FROM medication_schedules WHERE medicine_id IN (SELECT id FROM medicines WHERE prescription_id = ?)",
                [id],
            )?;
            tx.execute("DELETE FROM medicines WHERE prescription_id = ?", [id])?;
            tx.execute("DELETE FROM prescriptions WHERE id = ?", [id])?;
            DeleteOutcome::HardDeleted
        };
        tx.commit()?;

        tracing::debug!(prescription_id = id, ?outcome, "Deleted prescription");
        Ok(outcome)
    }

    /// Undo a soft delete, including the medicines deleted with it.
    pub fn restore_prescription(&self, id: &str) -> DbResult<bool> {
        let deleted_at: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT deleted_at FROM prescriptions WHERE id = ?",
                [id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(Some(deleted_at)) = deleted_at else {
            return Ok(false);
        };

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE medicines SET deleted_at = NULL WHERE prescription_id = ?1 AND deleted_at = ?2",
            params![id, deleted_at],
        )?;
        tx.execute(
            "UPDATE prescriptions SET deleted_at = NULL, updated_at = datetime('now') WHERE id = ?",
            [id],
        )?;
        tx.commit()?;
        Ok(true)
    }
}

fn prescription_row(row: &Row<'_>) -> rusqlite::Result<PrescriptionRow> {
    Ok(PrescriptionRow {
        id: row.get(0)?,
        group_id: row.get(1)?,
        name: row.get(2)?,
        start_date: row.get(3)?,
        end_date: row.get(4)?,
        is_active: row.get(5)?,
        notes: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        deleted_at: row.get(9)?,
    })
}

/// Intermediate row struct for database mapping.
struct PrescriptionRow {
    id: String,
    group_id: String,
    name: String,
    start_date: String,
    end_date: Option<String>,
    is_active: bool,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
}

impl TryFrom<PrescriptionRow> for Prescription {
    type Error = DbError;

    fn try_from(row: PrescriptionRow) -> Result<Self, Self::Error> {
        Ok(Prescription {
            id: row.id,
            group_id: row.group_id,
            name: row.name,
            start_date: parse_date(&row.start_date)?,
            end_date: row.end_date.as_deref().map(parse_date).transpose()?,
            is_active: row.is_active,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Medicine, OutcomeRecord, RecordStatus, Timing};

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let rx = Prescription::new("g1".into(), "January".into(), date("2025-01-01"))
            .with_end_date(date("2025-01-31"));
        db.insert_prescription(&rx).unwrap();

        let retrieved = db.get_prescription(&rx.id).unwrap().unwrap();
        assert_eq!(retrieved, rx);
    }

    #[test]
    fn test_inverted_window_rejected() {
        let db = setup_db();

        let rx = Prescription::new("g1".into(), "Bad".into(), date("2025-02-01"))
            .with_end_date(date("2025-01-01"));
        assert!(matches!(
            db.insert_prescription(&rx),
            Err(DbError::Constraint(_))
        ));
    }

    #[test]
    fn test_overlapping_filter() {
        let db = setup_db();

        let january = Prescription::new("g1".into(), "Jan".into(), date("2025-01-01"))
            .with_end_date(date("2025-01-31"));
        let ongoing = Prescription::new("g1".into(), "Ongoing".into(), date("2024-06-01"));
        let later = Prescription::new("g1".into(), "Later".into(), date("2025-03-01"));
        let mut inactive = Prescription::new("g1".into(), "Paused".into(), date("2025-01-01"));
        inactive.is_active = false;
        let other_group = Prescription::new("g2".into(), "Other".into(), date("2025-01-01"));

        for rx in [&january, &ongoing, &later, &inactive, &other_group] {
            db.insert_prescription(rx).unwrap();
        }

        let found = db
            .list_active_prescriptions_overlapping("g1", date("2025-01-15"), date("2025-02-15"))
            .unwrap();
        let names: Vec<_> = found.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Ongoing", "Jan"]);
    }

    #[test]
    fn test_delete_without_records_is_hard() {
        let db = setup_db();

        let rx = Prescription::new("g1".into(), "Rx".into(), date("2025-01-01"));
        db.insert_prescription(&rx).unwrap();
        let medicine = Medicine::new("g1".into(), Some(rx.id.clone()), "Med A".into());
        db.insert_medicine(&medicine).unwrap();

        assert_eq!(db.delete_prescription(&rx.id).unwrap(), DeleteOutcome::HardDeleted);
        assert!(db.get_prescription(&rx.id).unwrap().is_none());
        assert!(db.get_medicine(&medicine.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_with_records_is_soft_and_restorable() {
        let db = setup_db();

        let rx = Prescription::new("g1".into(), "Rx".into(), date("2025-01-01"));
        db.insert_prescription(&rx).unwrap();
        let medicine = Medicine::new("g1".into(), Some(rx.id.clone()), "Med A".into());
        db.insert_medicine(&medicine).unwrap();
        let record = OutcomeRecord::new(
            "g1".into(),
            "p1".into(),
            Timing::Morning,
            date("2025-01-02"),
            RecordStatus::Taken,
        )
        .for_medicine(&medicine.id);
        db.insert_record(&record).unwrap();

        assert_eq!(db.delete_prescription(&rx.id).unwrap(), DeleteOutcome::SoftDeleted);
        assert!(db.get_prescription(&rx.id).unwrap().unwrap().is_deleted());
        assert!(db.list_prescriptions("g1").unwrap().is_empty());
        assert!(db.list_medicines_by_group("g1").unwrap().is_empty());

        assert!(db.restore_prescription(&rx.id).unwrap());
        assert_eq!(db.list_prescriptions("g1").unwrap().len(), 1);
        assert_eq!(db.list_medicines_by_group("g1").unwrap().len(), 1);
    }

    #[test]
    fn test_delete_missing_prescription() {
        let db = setup_db();
        assert!(matches!(
            db.delete_prescription("missing"),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn test_set_active() {
        let db = setup_db();

        let rx = Prescription::new("g1".into(), "Rx".into(), date("2025-01-01"));
        db.insert_prescription(&rx).unwrap();

        assert!(db.set_prescription_active(&rx.id, false).unwrap());
        assert!(db
            .list_active_prescriptions_overlapping("g1", date("2025-01-01"), date("2025-01-31"))
            .unwrap()
            .is_empty());
    }
}
