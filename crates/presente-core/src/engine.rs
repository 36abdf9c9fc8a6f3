//! The upsert engine and query layer.
//!
//! Free async functions generic over [`Directory`] and [`AttendanceStore`],
//! so the validation discipline (existence checks before any write, one
//! lookup per distinct id in batches) is independent of the backend and
//! observable from test doubles.
//!
//! Every function surfaces failures synchronously to its caller; there are
//! no internal retries.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::{
  Error, Result,
  course::Course,
  record::AttendanceRecord,
  stats::{
    self, DEFAULT_BUCKETS, DistributionReport, GroupBy, RainComparison,
    CourseRiskRow, SeriesBucket, SummaryReport,
  },
  store::{AttendanceStore, Directory, Page, StatsScope},
};

// ─── Pagination caps ─────────────────────────────────────────────────────────

pub const COURSE_HISTORY_DEFAULT_LIMIT: u64 = 100;
pub const COURSE_HISTORY_CAP: u64 = 200;
pub const STUDENT_HISTORY_DEFAULT_LIMIT: u64 = 200;
pub const STUDENT_HISTORY_CAP: u64 = 500;

// ─── Existence checks ────────────────────────────────────────────────────────

async fn ensure_course<D: Directory>(
  directory: &D,
  course_id: i64,
) -> Result<Course> {
  directory
    .get_course(course_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::CourseNotFound(course_id))
}

async fn ensure_student<D: Directory>(
  directory: &D,
  student_id: i64,
) -> Result<()> {
  if directory
    .student_exists(student_id)
    .await
    .map_err(Error::store)?
  {
    Ok(())
  } else {
    Err(Error::StudentNotFound(student_id))
  }
}

// ─── Upsert engine ───────────────────────────────────────────────────────────

/// Insert-or-overwrite one attendance record after confirming the
/// referenced course and student exist. Returns the post-write row.
pub async fn upsert_one<D, S>(
  directory: &D,
  store: &S,
  record: AttendanceRecord,
) -> Result<AttendanceRecord>
where
  D: Directory,
  S: AttendanceStore,
{
  ensure_course(directory, record.course_id).await?;
  ensure_student(directory, record.student_id).await?;
  store.upsert(record).await.map_err(Error::store)
}

/// Batch upsert within one transaction.
///
/// Validation runs once per **distinct** course id and once (batched) for
/// the distinct student ids, never per row; if anything is missing, nothing
/// is written. Results come back in input order.
pub async fn upsert_batch<D, S>(
  directory: &D,
  store: &S,
  records: Vec<AttendanceRecord>,
) -> Result<Vec<AttendanceRecord>>
where
  D: Directory,
  S: AttendanceStore,
{
  if records.is_empty() {
    return Ok(Vec::new());
  }

  let course_ids: BTreeSet<i64> =
    records.iter().map(|r| r.course_id).collect();
  for course_id in course_ids {
    ensure_course(directory, course_id).await?;
  }

  let student_ids: Vec<i64> = records
    .iter()
    .map(|r| r.student_id)
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect();
  let mut missing = directory
    .missing_students(&student_ids)
    .await
    .map_err(Error::store)?;
  if !missing.is_empty() {
    missing.sort_unstable();
    return Err(Error::StudentsNotFound(missing));
  }

  store.upsert_many(records).await.map_err(Error::store)
}

// ─── Query layer ─────────────────────────────────────────────────────────────

/// Point lookup by composite key. A missing record is an explicit
/// [`Error::RecordNotFound`], distinct from a missing course or student.
pub async fn get_one<D, S>(
  directory: &D,
  store: &S,
  course_id: i64,
  student_id: i64,
  date: NaiveDate,
) -> Result<AttendanceRecord>
where
  D: Directory,
  S: AttendanceStore,
{
  ensure_course(directory, course_id).await?;
  ensure_student(directory, student_id).await?;
  store
    .get(course_id, student_id, date)
    .await
    .map_err(Error::store)?
    .ok_or(Error::RecordNotFound { course_id, student_id, date })
}

/// One classroom roll call: every record for a course on one date.
pub async fn list_by_course_and_date<D, S>(
  directory: &D,
  store: &S,
  course_id: i64,
  date: NaiveDate,
) -> Result<Vec<AttendanceRecord>>
where
  D: Directory,
  S: AttendanceStore,
{
  ensure_course(directory, course_id).await?;
  store
    .list_by_course_and_date(course_id, date)
    .await
    .map_err(Error::store)
}

/// Course history, newest first. Pagination is validated before any lookup.
pub async fn list_by_course<D, S>(
  directory: &D,
  store: &S,
  course_id: i64,
  page: Page,
) -> Result<Vec<AttendanceRecord>>
where
  D: Directory,
  S: AttendanceStore,
{
  let (offset, limit) =
    page.resolve(COURSE_HISTORY_DEFAULT_LIMIT, COURSE_HISTORY_CAP)?;
  ensure_course(directory, course_id).await?;
  store
    .list_by_course(course_id, offset, limit)
    .await
    .map_err(Error::store)
}

/// Student history across courses, newest first.
pub async fn list_by_student<D, S>(
  directory: &D,
  store: &S,
  student_id: i64,
  page: Page,
) -> Result<Vec<AttendanceRecord>>
where
  D: Directory,
  S: AttendanceStore,
{
  let (offset, limit) =
    page.resolve(STUDENT_HISTORY_DEFAULT_LIMIT, STUDENT_HISTORY_CAP)?;
  ensure_student(directory, student_id).await?;
  store
    .list_by_student(student_id, offset, limit)
    .await
    .map_err(Error::store)
}

/// Student history within one course, optionally restricted to a calendar
/// year.
pub async fn list_by_course_and_student<D, S>(
  directory: &D,
  store: &S,
  course_id: i64,
  student_id: i64,
  year: Option<i32>,
  page: Page,
) -> Result<Vec<AttendanceRecord>>
where
  D: Directory,
  S: AttendanceStore,
{
  let (offset, limit) =
    page.resolve(STUDENT_HISTORY_DEFAULT_LIMIT, STUDENT_HISTORY_CAP)?;
  ensure_course(directory, course_id).await?;
  ensure_student(directory, student_id).await?;
  store
    .list_by_course_and_student(course_id, student_id, year, offset, limit)
    .await
    .map_err(Error::store)
}

// ─── Statistics entry points ─────────────────────────────────────────────────

fn validate_scope(scope: &StatsScope) -> Result<()> {
  if scope.from > scope.to {
    return Err(Error::InvalidDateRange { from: scope.from, to: scope.to });
  }
  Ok(())
}

fn validate_threshold(umbral: u32) -> Result<()> {
  if umbral < 1 {
    return Err(Error::InvalidThreshold(umbral));
  }
  Ok(())
}

/// KPI summary plus top-5 courses by ausentismo. An empty scope yields
/// all-zero aggregates, never an error.
pub async fn stats_resumen<S: AttendanceStore>(
  store: &S,
  scope: &StatsScope,
  umbral_riesgo: u32,
) -> Result<SummaryReport> {
  validate_scope(scope)?;
  validate_threshold(umbral_riesgo)?;
  let rows = store.load_scope(scope).await.map_err(Error::store)?;
  Ok(stats::summary(&rows, scope.from, scope.to, umbral_riesgo))
}

/// Time series grouped by day, ISO week, or month. The scope's `only_rain`
/// carries the soloLluvia filter.
pub async fn stats_serie<S: AttendanceStore>(
  store: &S,
  scope: &StatsScope,
  group_by: GroupBy,
) -> Result<Vec<SeriesBucket>> {
  validate_scope(scope)?;
  let rows = store.load_scope(scope).await.map_err(Error::store)?;
  Ok(stats::series(&rows, group_by))
}

/// Distribution of students over the default absence-count ranges.
pub async fn stats_distribucion<S: AttendanceStore>(
  store: &S,
  scope: &StatsScope,
) -> Result<DistributionReport> {
  validate_scope(scope)?;
  let rows = store.load_scope(scope).await.map_err(Error::store)?;
  Ok(stats::distribution(&rows, DEFAULT_BUCKETS))
}

/// Per-course at-risk student counts.
pub async fn stats_riesgo<S: AttendanceStore>(
  store: &S,
  scope: &StatsScope,
  umbral: u32,
) -> Result<Vec<CourseRiskRow>> {
  validate_scope(scope)?;
  validate_threshold(umbral)?;
  let rows = store.load_scope(scope).await.map_err(Error::store)?;
  Ok(stats::risk_by_course(&rows, umbral))
}

/// Rain vs no-rain KPI comparison over one scope load.
pub async fn stats_lluvia<S: AttendanceStore>(
  store: &S,
  scope: &StatsScope,
) -> Result<RainComparison> {
  validate_scope(scope)?;
  let rows = store.load_scope(scope).await.map_err(Error::store)?;
  Ok(stats::rain_comparison(&rows))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
