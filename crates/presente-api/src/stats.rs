//! Handlers for `/asistencias/stats/*` endpoints.
//!
//! All five share [`StatsParams`]: `cue` names the school, `desde`/`hasta`
//! the inclusive date range, and `cursoIds`/`soloLluvia` optionally narrow
//! the scope. `cursoIds` is a comma-separated id list, e.g. `cursoIds=4,7`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::NaiveDate;
use presente_core::{
  engine,
  stats::{
    CourseRiskRow, DEFAULT_RISK_THRESHOLD, DistributionReport, GroupBy,
    RainComparison, SeriesBucket, SummaryReport,
  },
  store::{AttendanceStore, StatsScope},
};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsParams {
  /// School identifier (CUE).
  pub cue:         String,
  pub desde:       NaiveDate,
  pub hasta:       NaiveDate,
  /// Comma-separated course ids; absent means the whole school.
  pub curso_ids:   Option<String>,
  /// At-risk absence threshold; defaults to 20.
  pub umbral:      Option<u32>,
  /// Bucketing for the serie endpoint: `day` (default), `week`, `month`.
  #[serde(default)]
  pub group_by:    GroupBy,
  pub solo_lluvia: Option<bool>,
}

impl StatsParams {
  fn scope(&self) -> Result<StatsScope, ApiError> {
    let mut scope = StatsScope::new(self.cue.clone(), self.desde, self.hasta);
    if let Some(raw) = &self.curso_ids {
      let ids = raw
        .split(',')
        .map(|s| s.trim().parse::<i64>())
        .collect::<Result<Vec<i64>, _>>()
        .map_err(|_| {
          ApiError::BadRequest(format!("cursoIds is not an id list: {raw:?}"))
        })?;
      scope.course_ids = Some(ids);
    }
    scope.only_rain = self.solo_lluvia;
    Ok(scope)
  }

  fn umbral(&self) -> u32 { self.umbral.unwrap_or(DEFAULT_RISK_THRESHOLD) }
}

/// `GET /asistencias/stats/resumen`
pub async fn resumen<S: AttendanceStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<StatsParams>,
) -> Result<Json<SummaryReport>, ApiError> {
  let scope = params.scope()?;
  let report = engine::stats_resumen(&*store, &scope, params.umbral()).await?;
  Ok(Json(report))
}

/// `GET /asistencias/stats/serie`
pub async fn serie<S: AttendanceStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<StatsParams>,
) -> Result<Json<Vec<SeriesBucket>>, ApiError> {
  let scope = params.scope()?;
  let buckets = engine::stats_serie(&*store, &scope, params.group_by).await?;
  Ok(Json(buckets))
}

/// `GET /asistencias/stats/distribucion`
pub async fn distribucion<S: AttendanceStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<StatsParams>,
) -> Result<Json<DistributionReport>, ApiError> {
  let scope = params.scope()?;
  let report = engine::stats_distribucion(&*store, &scope).await?;
  Ok(Json(report))
}

/// `GET /asistencias/stats/riesgo`
pub async fn riesgo<S: AttendanceStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<StatsParams>,
) -> Result<Json<Vec<CourseRiskRow>>, ApiError> {
  let scope = params.scope()?;
  let rows = engine::stats_riesgo(&*store, &scope, params.umbral()).await?;
  Ok(Json(rows))
}

/// `GET /asistencias/stats/lluvia`
pub async fn lluvia<S: AttendanceStore>(
  State(store): State<Arc<S>>,
  Query(params): Query<StatsParams>,
) -> Result<Json<RainComparison>, ApiError> {
  let scope = params.scope()?;
  let report = engine::stats_lluvia(&*store, &scope).await?;
  Ok(Json(report))
}
