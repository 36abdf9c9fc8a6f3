//! JSON REST API for Presente.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`presente_core::store::Directory`] and
//! [`presente_core::store::AttendanceStore`]. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", presente_api::api_router(store.clone()))
//! ```

pub mod attendance;
pub mod error;
pub mod stats;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use presente_core::store::{AttendanceStore, Directory};

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: Directory + AttendanceStore + 'static,
{
  Router::new()
    // Writes
    .route("/asistencias", post(attendance::upsert::<S>))
    .route("/asistencias/bulk", post(attendance::upsert_bulk::<S>))
    // Statistics
    .route("/asistencias/stats/resumen", get(stats::resumen::<S>))
    .route("/asistencias/stats/serie", get(stats::serie::<S>))
    .route("/asistencias/stats/distribucion", get(stats::distribucion::<S>))
    .route("/asistencias/stats/riesgo", get(stats::riesgo::<S>))
    .route("/asistencias/stats/lluvia", get(stats::lluvia::<S>))
    // Reads
    .route(
      "/asistencias/one/{id_curso}/{id_alumno}/{fecha}",
      get(attendance::get_one::<S>),
    )
    .route("/asistencias/curso/{id_curso}", get(attendance::by_course::<S>))
    .route(
      "/asistencias/curso/{id_curso}/alumno/{id_alumno}",
      get(attendance::by_course_and_student::<S>),
    )
    .route("/asistencias/alumno/{id_alumno}", get(attendance::by_student::<S>))
    .route(
      "/asistencias/{id_curso}/{fecha}",
      get(attendance::by_course_and_date::<S>),
    )
    .with_state(store)
}

// ─── Integration tests ────────────────────────────────────────────────────────
