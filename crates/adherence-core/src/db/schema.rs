//! SQLite schema definition.

/// Complete database schema for the adherence store.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Prescriptions
-- ============================================================================

CREATE TABLE IF NOT EXISTS prescriptions (
    id TEXT PRIMARY KEY,
    group_id TEXT NOT NULL,
    name TEXT NOT NULL,
    start_date TEXT NOT NULL,                    -- YYYY-MM-DD
    end_date TEXT,                               -- YYYY-MM-DD, NULL = ongoing
    is_active INTEGER NOT NULL DEFAULT 1,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at TEXT,
    CHECK (end_date IS NULL OR end_date >= start_date)
);

CREATE INDEX IF NOT EXISTS idx_prescriptions_group_active ON prescriptions(group_id, is_active);
CREATE INDEX IF NOT EXISTS idx_prescriptions_group_start ON prescriptions(group_id, start_date);

-- ============================================================================
-- Medicines
-- ============================================================================

CREATE TABLE IF NOT EXISTS medicines (
    id TEXT PRIMARY KEY,
    group_id TEXT NOT NULL,
    prescription_id TEXT REFERENCES prescriptions(id), -- NULL for legacy medicines
    name TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_medicines_group ON medicines(group_id);
CREATE INDEX IF NOT EXISTS idx_medicines_prescription ON medicines(prescription_id);

-- ============================================================================
-- Dosing Schedules
-- ============================================================================

CREATE TABLE IF NOT EXISTS medication_schedules (
    id TEXT PRIMARY KEY,
    medicine_id TEXT NOT NULL REFERENCES medicines(id),
    group_id TEXT NOT NULL,
    timings TEXT NOT NULL DEFAULT '[]',          -- JSON array of timing names
    dosage_amount REAL,
    dosage_unit TEXT,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_schedules_medicine ON medication_schedules(medicine_id);
CREATE INDEX IF NOT EXISTS idx_schedules_group ON medication_schedules(group_id);

-- ============================================================================
-- Outcome Records (latest state only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS medication_records (
    id TEXT PRIMARY KEY,
    group_id TEXT NOT NULL,
    patient_id TEXT NOT NULL,
    medicine_id TEXT,                            -- may dangle after medicine deletion
    schedule_id TEXT,
    simple_medicine_name TEXT,
    timing TEXT NOT NULL CHECK (timing IN ('morning', 'noon', 'evening', 'bedtime', 'asNeeded')),
    scheduled_date TEXT NOT NULL,                -- YYYY-MM-DD
    status TEXT NOT NULL CHECK (status IN ('pending', 'taken', 'skipped')),
    taken_at TEXT,
    recorded_by TEXT NOT NULL,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_records_group_date ON medication_records(group_id, scheduled_date);
CREATE INDEX IF NOT EXISTS idx_records_patient_date ON medication_records(patient_id, scheduled_date);
CREATE INDEX IF NOT EXISTS idx_records_medicine ON medication_records(medicine_id);

-- ============================================================================
-- Medicine Groups (canonical-name mappings)
-- ============================================================================

CREATE TABLE IF NOT EXISTS medicine_groups (
    id TEXT PRIMARY KEY,
    group_id TEXT NOT NULL,
    canonical_name TEXT NOT NULL CHECK (length(canonical_name) > 0),
    medicine_names TEXT NOT NULL DEFAULT '[]',   -- JSON array of variant names
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_medicine_groups_group ON medicine_groups(group_id);
"#;
