//! Handlers for attendance writes and reads.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/asistencias` | Body: one wire record; echoes the stored row |
//! | `POST` | `/asistencias/bulk` | Body: array of wire records; all-or-nothing |
//! | `GET`  | `/asistencias/one/:idCurso/:idAlumno/:fecha` | Point read, 404 if absent |
//! | `GET`  | `/asistencias/:idCurso/:fecha` | One roll call |
//! | `GET`  | `/asistencias/curso/:idCurso` | History; `?offset`, `?limit` |
//! | `GET`  | `/asistencias/curso/:idCurso/alumno/:idAlumno` | + optional `?anio` |
//! | `GET`  | `/asistencias/alumno/:idAlumno` | History across courses |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::NaiveDate;
use presente_core::{
  engine,
  record::AttendanceRecord,
  store::{AttendanceStore, Directory, Page},
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── Pagination params ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct PageParams {
  pub offset: Option<u64>,
  /// Above-cap limits are rejected with 400, never clamped.
  pub limit:  Option<u64>,
}

impl PageParams {
  fn page(&self) -> Page {
    Page {
      offset: self.offset.unwrap_or(0),
      limit:  self.limit,
    }
  }
}

#[derive(Debug, Deserialize, Default)]
pub struct StudentHistoryParams {
  /// Calendar-year filter (inclusive Jan 1 .. Dec 31).
  pub anio:   Option<i32>,
  pub offset: Option<u64>,
  pub limit:  Option<u64>,
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// `POST /asistencias` — insert-or-overwrite one record.
pub async fn upsert<S>(
  State(store): State<Arc<S>>,
  Json(record): Json<AttendanceRecord>,
) -> Result<Json<AttendanceRecord>, ApiError>
where
  S: Directory + AttendanceStore,
{
  let stored = engine::upsert_one(&*store, &*store, record).await?;
  Ok(Json(stored))
}

/// `POST /asistencias/bulk` — one transaction; either every record lands
/// or none do.
pub async fn upsert_bulk<S>(
  State(store): State<Arc<S>>,
  Json(records): Json<Vec<AttendanceRecord>>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError>
where
  S: Directory + AttendanceStore,
{
  let stored = engine::upsert_batch(&*store, &*store, records).await?;
  Ok(Json(stored))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /asistencias/one/:idCurso/:idAlumno/:fecha`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path((course_id, student_id, date)): Path<(i64, i64, NaiveDate)>,
) -> Result<Json<AttendanceRecord>, ApiError>
where
  S: Directory + AttendanceStore,
{
  let record =
    engine::get_one(&*store, &*store, course_id, student_id, date).await?;
  Ok(Json(record))
}

/// `GET /asistencias/:idCurso/:fecha` — every record for one course on one
/// date, i.e. a classroom roll call.
pub async fn by_course_and_date<S>(
  State(store): State<Arc<S>>,
  Path((course_id, date)): Path<(i64, NaiveDate)>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError>
where
  S: Directory + AttendanceStore,
{
  let rows =
    engine::list_by_course_and_date(&*store, &*store, course_id, date).await?;
  Ok(Json(rows))
}

/// `GET /asistencias/curso/:idCurso[?offset=...][&limit=...]`
pub async fn by_course<S>(
  State(store): State<Arc<S>>,
  Path(course_id): Path<i64>,
  Query(params): Query<PageParams>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError>
where
  S: Directory + AttendanceStore,
{
  let rows =
    engine::list_by_course(&*store, &*store, course_id, params.page()).await?;
  Ok(Json(rows))
}

/// `GET /asistencias/alumno/:idAlumno[?offset=...][&limit=...]`
pub async fn by_student<S>(
  State(store): State<Arc<S>>,
  Path(student_id): Path<i64>,
  Query(params): Query<PageParams>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError>
where
  S: Directory + AttendanceStore,
{
  let rows =
    engine::list_by_student(&*store, &*store, student_id, params.page())
      .await?;
  Ok(Json(rows))
}

/// `GET /asistencias/curso/:idCurso/alumno/:idAlumno[?anio=...]`
pub async fn by_course_and_student<S>(
  State(store): State<Arc<S>>,
  Path((course_id, student_id)): Path<(i64, i64)>,
  Query(params): Query<StudentHistoryParams>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError>
where
  S: Directory + AttendanceStore,
{
  let page = Page {
    offset: params.offset.unwrap_or(0),
    limit:  params.limit,
  };
  let rows = engine::list_by_course_and_student(
    &*store, &*store, course_id, student_id, params.anio, page,
  )
  .await?;
  Ok(Json(rows))
}
