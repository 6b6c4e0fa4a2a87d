//! Dosing schedule database operations.

use rusqlite::{params, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Dosage, DosingSchedule};

impl Database {
    /// Insert a new dosing schedule.
    ///
    /// Fails with [`DbError::Constraint`] when the medicine already has a live
    /// schedule; use [`Database::replace_schedule`] to swap it.
    pub fn insert_schedule(&self, schedule: &DosingSchedule) -> DbResult<()> {
        check_timings(schedule)?;

        let live: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM medication_schedules WHERE medicine_id = ? AND deleted_at IS NULL",
            [&schedule.medicine_id],
            |row| row.get(0),
        )?;
        if live > 0 {
            return Err(DbError::Constraint(format!(
                "medicine {} already has an active schedule",
                schedule.medicine_id
            )));
        }

        let timings_json = serde_json::to_string(&schedule.timings)?;

        self.conn.execute(
            r#"
            INSERT INTO medication_schedules (
                id, medicine_id, group_id, timings, dosage_amount, dosage_unit,
                notes, created_at, updated_at, deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                schedule.id,
                schedule.medicine_id,
                schedule.group_id,
                timings_json,
                schedule.dosage.as_ref().map(|d| d.amount),
                schedule.dosage.as_ref().map(|d| d.unit.as_str()),
                schedule.notes,
                schedule.created_at,
                schedule.updated_at,
                schedule.deleted_at,
            ],
        )?;
        Ok(())
    }

    /// Soft-delete every live schedule of the medicine and insert `schedule`.
    ///
    /// Runs in one transaction: on failure the previous schedule stays active.
    pub fn replace_schedule(&self, schedule: &DosingSchedule) -> DbResult<()> {
        check_timings(schedule)?;

        let tx = self.conn.unchecked_transaction()?;
        let replaced = tx.execute(
            "UPDATE medication_schedules SET deleted_at = datetime('now'), updated_at = datetime('now') WHERE medicine_id = ? AND deleted_at IS NULL",
            [&schedule.medicine_id],
        )?;
        self.insert_schedule(schedule)?;
        tx.commit()?;

        tracing::debug!(medicine_id = %schedule.medicine_id, replaced, "Replaced dosing schedule");
        Ok(())
    }

    /// List non-deleted schedules of a medicine, oldest first.
    pub fn list_schedules_by_medicine(&self, medicine_id: &str) -> DbResult<Vec<DosingSchedule>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, medicine_id, group_id, timings, dosage_amount, dosage_unit,
                   notes, created_at, updated_at, deleted_at
            FROM medication_schedules
            WHERE medicine_id = ? AND deleted_at IS NULL
            ORDER BY created_at
            "#,
        )?;

        let rows = stmt.query_map([medicine_id], schedule_row)?;

        let mut schedules = Vec::new();
        for row in rows {
            schedules.push(row?.try_into()?);
        }
        Ok(schedules)
    }

    /// List all non-deleted schedules of a group.
    pub fn list_schedules_by_group(&self, group_id: &str) -> DbResult<Vec<DosingSchedule>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, medicine_id, group_id, timings, dosage_amount, dosage_unit,
                   notes, created_at, updated_at, deleted_at
            FROM medication_schedules
            WHERE group_id = ? AND deleted_at IS NULL
            ORDER BY created_at
            "#,
        )?;

        let rows = stmt.query_map([group_id], schedule_row)?;

        let mut schedules = Vec::new();
        for row in rows {
            schedules.push(row?.try_into()?);
        }
        Ok(schedules)
    }

    /// Mark a schedule deleted.
    pub fn soft_delete_schedule(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE medication_schedules SET deleted_at = datetime('now'), updated_at = datetime('now') WHERE id = ? AND deleted_at IS NULL",
            [id],
        )?;
        Ok(rows_affected > 0)
    }
}

fn check_timings(schedule: &DosingSchedule) -> DbResult<()> {
    if schedule.timings.is_empty() {
        return Err(DbError::Constraint(format!(
            "schedule {} has no timings",
            schedule.id
        )));
    }
    Ok(())
}

fn schedule_row(row: &Row<'_>) -> rusqlite::Result<ScheduleRow> {
    Ok(ScheduleRow {
        id: row.get(0)?,
        medicine_id: row.get(1)?,
        group_id: row.get(2)?,
        timings: row.get(3)?,
        dosage_amount: row.get(4)?,
        dosage_unit: row.get(5)?,
        notes: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        deleted_at: row.get(9)?,
    })
}

/// Intermediate row struct for database mapping.
struct ScheduleRow {
    id: String,
    medicine_id: String,
    group_id: String,
    timings: String,
    dosage_amount: Option<f64>,
    dosage_unit: Option<String>,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
    deleted_at: Option<String>,
}

impl TryFrom<ScheduleRow> for DosingSchedule {
    type Error = DbError;

    fn try_from(row: ScheduleRow) -> Result<Self, Self::Error> {
        Ok(DosingSchedule {
            id: row.id,
            medicine_id: row.medicine_id,
            group_id: row.group_id,
            timings: serde_json::from_str(&row.timings)?,
            dosage: row.dosage_amount.map(|amount| Dosage {
                amount,
                unit: row.dosage_unit.unwrap_or_default(),
            }),
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}
