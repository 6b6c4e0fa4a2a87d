//! Medicine database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::Medicine;

impl Database {
    /// Insert a new medicine.
    pub fn insert_medicine(&self, medicine: &Medicine) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO medicines (
                id, group_id, prescription_id, name, description, created_at, deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                medicine.id,
                medicine.group_id,
                medicine.prescription_id,
                medicine.name,
                medicine.description,
                medicine.created_at,
                medicine.deleted_at,
            ],
        )?;
        Ok(())
    }

    /// Get a medicine by ID (including soft-deleted ones).
    pub fn get_medicine(&self, id: &str) -> DbResult<Option<Medicine>> {
        self.conn
            .query_row(
                r#"
                SELECT id, group_id, prescription_id, name, description, created_at, deleted_at
                FROM medicines
                WHERE id = ?
                "#,
                [id],
                medicine_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List non-deleted medicines of a prescription.
    pub fn list_medicines_by_prescription(&self, prescription_id: &str) -> DbResult<Vec<Medicine>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, group_id, prescription_id, name, description, created_at, deleted_at
            FROM medicines
            WHERE prescription_id = ? AND deleted_at IS NULL
            ORDER BY name
            "#,
        )?;

        let rows = stmt.query_map([prescription_id], medicine_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// List all non-deleted medicines of a group, orphaned ones included.
    pub fn list_medicines_by_group(&self, group_id: &str) -> DbResult<Vec<Medicine>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, group_id, prescription_id, name, description, created_at, deleted_at
            FROM medicines
            WHERE group_id = ? AND deleted_at IS NULL
            ORDER BY name
            "#,
        )?;

        let rows = stmt.query_map([group_id], medicine_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Mark a medicine deleted.
    pub fn soft_delete_medicine(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE medicines SET deleted_at = datetime('now') WHERE id = ? AND deleted_at IS NULL",
            [id],
        )?;
        Ok(rows_affected > 0)
    }
}

fn medicine_from_row(row: &Row<'_>) -> rusqlite::Result<Medicine> {
    Ok(Medicine {
        id: row.get(0)?,
        group_id: row.get(1)?,
        prescription_id: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        created_at: row.get(5)?,
        deleted_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Prescription;
    use chrono::NaiveDate;

    fn setup_db() -> (Database, Prescription) {
        let db = Database::open_in_memory().unwrap();
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let rx = Prescription::new("g1".into(), "Rx".into(), start);
        db.insert_prescription(&rx).unwrap();
        (db, rx)
    }

    #[test]
    fn test_insert_and_list_by_prescription() {
        let (db, rx) = setup_db();

        let mut med = Medicine::new("g1".into(), Some(rx.id.clone()), "Med A".into());
        med.description = Some("after meals".into());
        db.insert_medicine(&med).unwrap();

        let listed = db.list_medicines_by_prescription(&rx.id).unwrap();
        assert_eq!(listed, vec![med]);
    }

    #[test]
    fn test_group_listing_includes_orphans() {
        let (db, rx) = setup_db();

        db.insert_medicine(&Medicine::new("g1".into(), Some(rx.id.clone()), "Med A".into()))
            .unwrap();
        db.insert_medicine(&Medicine::new("g1".into(), None, "Legacy".into()))
            .unwrap();

        let listed = db.list_medicines_by_group("g1").unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|m| m.prescription_id.is_none()));
    }

    #[test]
    fn test_soft_delete_hides_medicine() {
        let (db, rx) = setup_db();

        let med = Medicine::new("g1".into(), Some(rx.id.clone()), "Med A".into());
        db.insert_medicine(&med).unwrap();

        assert!(db.soft_delete_medicine(&med.id).unwrap());
        assert!(!db.soft_delete_medicine(&med.id).unwrap());
        assert!(db.list_medicines_by_prescription(&rx.id).unwrap().is_empty());
        assert!(db.get_medicine(&med.id).unwrap().unwrap().is_deleted());
    }
}
