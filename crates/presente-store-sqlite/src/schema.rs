//! SQL schema for the Presente SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// `courses` and `students` are the directory side: provisioned by the
/// administration system, read-only for the attendance engine. Dates are
/// ISO-8601 TEXT so lexicographic comparison matches calendar order.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS courses (
    course_id   INTEGER PRIMARY KEY,
    school_code TEXT NOT NULL,
    name        TEXT NOT NULL,
    cycle       INTEGER NOT NULL,   -- school year (ciclo lectivo)
    division    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS students (
    student_id  INTEGER PRIMARY KEY
);

-- One row per (course, student, date); upserts overwrite status/rain
-- in place. No history is kept.
CREATE TABLE IF NOT EXISTS attendance (
    course_id   INTEGER NOT NULL REFERENCES courses(course_id),
    student_id  INTEGER NOT NULL REFERENCES students(student_id),
    date        TEXT NOT NULL,      -- ISO 8601 calendar date
    status      TEXT NOT NULL,      -- 'Presente' | 'Ausente' | 'Tarde'
    rain        INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (course_id, student_id, date)
);

CREATE INDEX IF NOT EXISTS courses_school_idx    ON courses(school_code);
CREATE INDEX IF NOT EXISTS attendance_student_idx ON attendance(student_id);
CREATE INDEX IF NOT EXISTS attendance_date_idx    ON attendance(date);

PRAGMA user_version = 1;
";
