//! Medicine group (canonical-name mapping) database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{MedicineGroup, MedicineGroupUpdate};

impl Database {
    /// Create a medicine group after validating it against the group's existing ones.
    pub fn create_medicine_group(&self, group: &MedicineGroup) -> DbResult<()> {
        group.validate()?;
        let existing = self.list_medicine_groups(&group.group_id)?;
        group.check_conflicts(&existing)?;

        let names_json = serde_json::to_string(&group.medicine_names)?;
        self.conn.execute(
            r#"
            INSERT INTO medicine_groups (
                id, group_id, canonical_name, medicine_names, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                group.id,
                group.group_id,
                group.canonical_name,
                names_json,
                group.notes,
                group.created_at,
                group.updated_at,
            ],
        )?;

        tracing::debug!(
            canonical_name = %group.canonical_name,
            variants = group.medicine_names.len(),
            "Created medicine group"
        );
        Ok(())
    }

    /// Apply a partial update to a medicine group.
    pub fn update_medicine_group(
        &self,
        id: &str,
        update: MedicineGroupUpdate,
    ) -> DbResult<MedicineGroup> {
        let current = self
            .get_medicine_group(id)?
            .ok_or_else(|| DbError::NotFound(format!("medicine group {}", id)))?;

        let updated = update.apply_to(current)?;
        let existing = self.list_medicine_groups(&updated.group_id)?;
        updated.check_conflicts(&existing)?;

        let names_json = serde_json::to_string(&updated.medicine_names)?;
        self.conn.execute(
            r#"
            UPDATE medicine_groups SET
                canonical_name = ?2,
                medicine_names = ?3,
                notes = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
            params![
                updated.id,
                updated.canonical_name,
                names_json,
                updated.notes,
                updated.updated_at,
            ],
        )?;
        Ok(updated)
    }

    /// Get a medicine group by ID.
    pub fn get_medicine_group(&self, id: &str) -> DbResult<Option<MedicineGroup>> {
        self.conn
            .query_row(
                r#"
                SELECT id, group_id, canonical_name, medicine_names, notes, created_at, updated_at
                FROM medicine_groups
                WHERE id = ?
                "#,
                [id],
                medicine_group_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List the medicine groups of a care group, in creation order.
    pub fn list_medicine_groups(&self, group_id: &str) -> DbResult<Vec<MedicineGroup>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, group_id, canonical_name, medicine_names, notes, created_at, updated_at
            FROM medicine_groups
            WHERE group_id = ?
            ORDER BY created_at, rowid
            "#,
        )?;

        let rows = stmt.query_map([group_id], medicine_group_row)?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?.try_into()?);
        }
        Ok(groups)
    }

    /// Delete a medicine group.
    pub fn delete_medicine_group(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM medicine_groups WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

fn medicine_group_row(row: &Row<'_>) -> rusqlite::Result<MedicineGroupRow> {
    Ok(MedicineGroupRow {
        id: row.get(0)?,
        group_id: row.get(1)?,
        canonical_name: row.get(2)?,
        medicine_names: row.get(3)?,
        notes: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Intermediate row struct for database mapping.
struct MedicineGroupRow {
    id: String,
    group_id: String,
    canonical_name: String,
    medicine_names: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<MedicineGroupRow> for MedicineGroup {
    type Error = DbError;

    fn try_from(row: MedicineGroupRow) -> Result<Self, Self::Error> {
        Ok(MedicineGroup {
            id: row.id,
            group_id: row.group_id,
            canonical_name: row.canonical_name,
            medicine_names: serde_json::from_str(&row.medicine_names)?,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
