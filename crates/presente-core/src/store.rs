//! The `Directory` and `AttendanceStore` traits and supporting query types.
//!
//! The traits are implemented by storage backends (e.g.
//! `presente-store-sqlite`). The engine and the API layer depend on these
//! abstractions, not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;

use crate::{course::Course, record::AttendanceRecord};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Offset/limit pagination as submitted by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
  pub offset: u64,
  /// `None` means "use the endpoint's default".
  pub limit:  Option<u64>,
}

impl Page {
  /// Resolve against an endpoint's default and cap. A limit above the cap
  /// is a validation failure, not silently clamped.
  pub fn resolve(self, default_limit: u64, cap: u64) -> crate::Result<(u64, u64)> {
    let limit = self.limit.unwrap_or(default_limit);
    if limit > cap {
      return Err(crate::Error::LimitExceeded { limit, cap });
    }
    Ok((self.offset, limit))
  }
}

/// The common filter for every statistics operation: one school, an
/// inclusive date range, and optional narrowing by course list or rain flag.
#[derive(Debug, Clone)]
pub struct StatsScope {
  pub school_code: String,
  pub from:        NaiveDate,
  pub to:          NaiveDate,
  /// If set, restrict to these courses (still school-scoped).
  pub course_ids:  Option<Vec<i64>>,
  /// `Some(true)` keeps only rainy-day rows, `Some(false)` only dry ones.
  pub only_rain:   Option<bool>,
}

impl StatsScope {
  pub fn new(
    school_code: impl Into<String>,
    from: NaiveDate,
    to: NaiveDate,
  ) -> Self {
    Self {
      school_code: school_code.into(),
      from,
      to,
      course_ids: None,
      only_rain: None,
    }
  }
}

/// An attendance row joined to its course, as loaded for the Statistics
/// Engine. The course carries the labels per-course breakdowns need.
#[derive(Debug, Clone)]
pub struct ScopedRecord {
  pub record: AttendanceRecord,
  pub course: Course,
}

// ─── Directory ───────────────────────────────────────────────────────────────

/// Read-only existence lookups against the school directory.
///
/// Courses and students are owned by an external administration system; the
/// core only ever asks whether they exist (and, for courses, which school
/// they belong to).
pub trait Directory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Resolve a course by id. Returns `None` if it does not exist.
  fn get_course(
    &self,
    course_id: i64,
  ) -> impl Future<Output = Result<Option<Course>, Self::Error>> + Send + '_;

  /// Whether a student exists.
  fn student_exists(
    &self,
    student_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Which of `ids` do NOT exist, as one batched check. Bounds batch
  /// validation cost to O(distinct ids) instead of O(batch size).
  fn missing_students<'a>(
    &'a self,
    ids: &'a [i64],
  ) -> impl Future<Output = Result<Vec<i64>, Self::Error>> + Send + 'a;
}

// ─── AttendanceStore ─────────────────────────────────────────────────────────

/// Abstraction over the durable attendance table.
///
/// The store enforces the one-row-per-(course, student, date) invariant via
/// its composite primary key; writes are insert-or-overwrite. All methods
/// return `Send` futures so the trait can be used in multi-threaded async
/// runtimes (e.g. tokio with `axum`).
pub trait AttendanceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Insert the record, or overwrite `status`/`rain` if the key exists.
  /// Returns the post-write row.
  fn upsert(
    &self,
    record: AttendanceRecord,
  ) -> impl Future<Output = Result<AttendanceRecord, Self::Error>> + Send + '_;

  /// Apply [`upsert`](Self::upsert) semantics to every record within a
  /// single transaction — the whole batch commits or none of it does.
  /// Returns the post-write rows in input order.
  fn upsert_many(
    &self,
    records: Vec<AttendanceRecord>,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Point lookup by the composite key.
  fn get(
    &self,
    course_id: i64,
    student_id: i64,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<AttendanceRecord>, Self::Error>> + Send + '_;

  /// Every record for a course on one date (one classroom roll call).
  fn list_by_course_and_date(
    &self,
    course_id: i64,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + '_;

  /// Course history, newest date first.
  fn list_by_course(
    &self,
    course_id: i64,
    offset: u64,
    limit: u64,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + '_;

  /// Student history across all courses, newest date first.
  fn list_by_student(
    &self,
    student_id: i64,
    offset: u64,
    limit: u64,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + '_;

  /// Student history within one course, newest date first, optionally
  /// restricted to a calendar year (inclusive Jan 1 .. Dec 31).
  fn list_by_course_and_student(
    &self,
    course_id: i64,
    student_id: i64,
    year: Option<i32>,
    offset: u64,
    limit: u64,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + '_;

  /// Load every attendance row matching `scope`, joined to its course.
  /// Feeds the Statistics Engine; an empty result is not an error.
  fn load_scope<'a>(
    &'a self,
    scope: &'a StatsScope,
  ) -> impl Future<Output = Result<Vec<ScopedRecord>, Self::Error>> + Send + 'a;
}
