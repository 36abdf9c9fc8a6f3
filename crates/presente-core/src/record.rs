//! Attendance records — the fundamental unit of the Presente store.
//!
//! A record is identified by the composite key (course, student, date).
//! The key is immutable once written; `status` and `rain` are overwritten
//! in place by later upserts. No history is retained.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The attendance status of one student in one course on one day.
///
/// The Spanish strings are the wire and column representation; the enum is
/// closed, so an unknown string is rejected at the boundary and never
/// travels through the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
  Presente,
  Ausente,
  Tarde,
}

impl AttendanceStatus {
  /// `Tarde` counts toward the presence percentage — the "late counts as
  /// present" business rule used by every statistic.
  pub fn is_present_equivalent(self) -> bool {
    matches!(self, Self::Presente | Self::Tarde)
  }

  pub fn is_absent(self) -> bool { matches!(self, Self::Ausente) }

  pub fn is_late(self) -> bool { matches!(self, Self::Tarde) }
}

/// One attendance row. The first three fields form the composite primary
/// key; exactly one row exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
  #[serde(rename = "idCurso")]
  pub course_id:  i64,
  #[serde(rename = "idAlumno")]
  pub student_id: i64,
  #[serde(rename = "fecha")]
  pub date:       NaiveDate,
  #[serde(rename = "estado")]
  pub status:     AttendanceStatus,
  #[serde(rename = "lluvia")]
  pub rain:       bool,
}

impl AttendanceRecord {
  /// The composite key, useful as a map key in callers and tests.
  pub fn key(&self) -> (i64, i64, NaiveDate) {
    (self.course_id, self.student_id, self.date)
  }
}
