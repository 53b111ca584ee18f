//! SQLite schema definition.

/// Complete database schema for vision screening.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Registration
-- ============================================================================

CREATE TABLE IF NOT EXISTS schools (
    school_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    street TEXT NOT NULL DEFAULT '',
    number TEXT NOT NULL DEFAULT '',
    complement TEXT,
    district TEXT NOT NULL DEFAULT '',
    city TEXT NOT NULL DEFAULT '',
    state TEXT NOT NULL DEFAULT '',
    postal_code TEXT NOT NULL DEFAULT '',
    latitude REAL,
    longitude REAL,
    region TEXT,                                 -- administrative region label
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_schools_region ON schools(region);

CREATE TABLE IF NOT EXISTS students (
    student_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    birth_date TEXT NOT NULL,                    -- YYYY-MM-DD
    sex TEXT NOT NULL,
    school_id INTEGER REFERENCES schools(school_id),
    region TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_students_school ON students(school_id);
CREATE INDEX IF NOT EXISTS idx_students_name ON students(name);

-- ============================================================================
-- Exams
-- ============================================================================

CREATE TABLE IF NOT EXISTS exams (
    exam_id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL REFERENCES students(student_id),
    taken_at TEXT,                               -- YYYY-MM-DD HH:MM:SS, NULL if unknown

    od_spherical REAL,
    od_cylindrical REAL,
    od_dioptric_cylinder REAL,
    od_axis INTEGER,
    od_corneal_radius_mm REAL,
    od_kerato_steep_axis REAL,
    od_kerato_flat_axis REAL,

    os_spherical REAL,
    os_cylindrical REAL,
    os_dioptric_cylinder REAL,
    os_axis INTEGER,
    os_corneal_radius_mm REAL,
    os_kerato_steep_axis REAL,
    os_kerato_flat_axis REAL,

    interpupillary_distance_mm REAL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_exams_student ON exams(student_id);
CREATE INDEX IF NOT EXISTS idx_exams_taken_at ON exams(taken_at);

-- ============================================================================
-- Workflow Flags (keyed by student, versioned for conflict detection)
-- ============================================================================

CREATE TABLE IF NOT EXISTS flag_exam_done (
    student_id INTEGER PRIMARY KEY,
    student_name TEXT NOT NULL,
    exam_done INTEGER NOT NULL DEFAULT 0,
    version INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS flag_needs_glasses (
    student_id INTEGER PRIMARY KEY,
    student_name TEXT NOT NULL,
    needs_glasses INTEGER NOT NULL DEFAULT 0,
    other_pathology INTEGER NOT NULL DEFAULT 0,
    version INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS flag_delivered (
    student_id INTEGER PRIMARY KEY,
    student_name TEXT NOT NULL,
    delivered INTEGER NOT NULL DEFAULT 0,
    version INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Legacy Flags (keyed by display name, read until migrated)
-- ============================================================================

CREATE TABLE IF NOT EXISTS legacy_flag_exam_done (
    name TEXT NOT NULL,
    exam_done INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS legacy_flag_needs_glasses (
    name TEXT NOT NULL,
    needs_glasses INTEGER NOT NULL DEFAULT 0,
    other_pathology INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS legacy_flag_delivered (
    name TEXT NOT NULL,
    delivered INTEGER NOT NULL DEFAULT 0
);

-- ============================================================================
-- Sync Log (append-only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS flag_sync_log (
    sync_id TEXT PRIMARY KEY,
    mode TEXT NOT NULL CHECK (mode IN ('upsert', 'replace', 'migration')),
    rows_written INTEGER NOT NULL,
    digest TEXT NOT NULL,                        -- SHA-256 of written state
    synced_at TEXT NOT NULL
);
"#;
