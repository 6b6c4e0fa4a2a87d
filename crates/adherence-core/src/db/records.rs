//! Outcome record database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{format_date, parse_date, Database, DbError, DbResult};
use crate::models::{OutcomeRecord, RecordStatus};

impl Database {
    /// Insert a new outcome record.
    pub fn insert_record(&self, record: &OutcomeRecord) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO medication_records (
                id, group_id, patient_id, medicine_id, schedule_id, simple_medicine_name,
                timing, scheduled_date, status, taken_at, recorded_by, notes,
                created_at, updated_at, deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                record.id,
                record.group_id,
                record.patient_id,
                record.medicine_id,
                record.schedule_id,
                record.simple_medicine_name,
                record.timing.as_str(),
                format_date(record.scheduled_date),
                record.status.as_str(),
                record.taken_at,
                record.recorded_by,
                record.notes,
                record.created_at,
                record.updated_at,
                record.deleted_at,
            ],
        )?;
        Ok(())
    }

    /// Get a record by ID (including soft-deleted ones).
    pub fn get_record(&self, id: &str) -> DbResult<Option<OutcomeRecord>> {
        self.conn
            .query_row(
                r#"
                SELECT id, group_id, patient_id, medicine_id, schedule_id, simple_medicine_name,
                       timing, scheduled_date, status, taken_at, recorded_by, notes,
                       created_at, updated_at, deleted_at
                FROM medication_records
                WHERE id = ?
                "#,
                [id],
                record_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Overwrite the status of a record; the latest value is all the store keeps.
    pub fn update_record_status(
        &self,
        id: &str,
        status: RecordStatus,
        taken_at: Option<&str>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE medication_records SET
                status = ?2,
                taken_at = ?3,
                updated_at = datetime('now')
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
            params![id, status.as_str(), taken_at],
        )?;
        Ok(rows_affected > 0)
    }

    /// Mark a record deleted.
    pub fn soft_delete_record(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE medication_records SET deleted_at = datetime('now'), updated_at = datetime('now') WHERE id = ? AND deleted_at IS NULL",
            [id],
        )?;
        Ok(rows_affected > 0)
    }

    /// List non-deleted records of a group scheduled within `[start, end]`,
    /// optionally narrowed to one patient.
    pub fn list_records(
        &self,
        group_id: &str,
        patient_id: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DbResult<Vec<OutcomeRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, group_id, patient_id, medicine_id, schedule_id, simple_medicine_name,
                   timing, scheduled_date, status, taken_at, recorded_by, notes,
                   created_at, updated_at, deleted_at
            FROM medication_records
            WHERE group_id = ?1
              AND (?2 IS NULL OR patient_id = ?2)
              AND scheduled_date >= ?3
              AND scheduled_date <= ?4
              AND deleted_at IS NULL
            ORDER BY scheduled_date, timing
            "#,
        )?;

        let rows = stmt.query_map(
            params![group_id, patient_id, format_date(start), format_date(end)],
            record_row,
        )?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.try_into()?);
        }
        Ok(records)
    }
}

fn record_row(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        group_id: row.get(1)?,
        patient_id: row.get(2)?,
        medicine_id: row.get(3)?,
        schedule_id: row.get(4)?,
        simple_medicine_name: row.get(5)?,
        timing: row.get(6)?,
        scheduled_date: row.get(7)?,
        status: row.get(8)?,
        taken_at: row.get(9)?,
        recorded_by: row.get(10)?,
        notes: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
        deleted_at: row.get(14)?,
    })
}

/// Intermediate row struct for database mapping.
struct RecordRow {
    id: String,
    group_id: String,
    patient_id: String,
    medicine_id: Option<String>,
    schedule_id: Option<String>,
    simple_medicine_name: Option<String>,
    timing: String,
    scheduled_date: String,
    status: String,
    taken_at: Option<String>,
    recorded_by: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
}

impl TryFrom<RecordRow> for OutcomeRecord {
    type Error = DbError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        Ok(OutcomeRecord {
            id: row.id,
            group_id: row.group_id,
            patient_id: row.patient_id,
            medicine_id: row.medicine_id,
            schedule_id: row.schedule_id,
            simple_medicine_name: row.simple_medicine_name,
            timing: row.timing.parse()?,
            scheduled_date: parse_date(&row.scheduled_date)?,
            status: row.status.parse()?,
            taken_at: row.taken_at,
            recorded_by: row.recorded_by,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}
