//! Error types for `presente-core`.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The referenced course does not exist in the directory.
  #[error("course not found: {0}")]
  CourseNotFound(i64),

  /// The referenced student does not exist in the directory.
  #[error("student not found: {0}")]
  StudentNotFound(i64),

  /// Batch validation: every missing student id, reported together.
  #[error("students not found: {0:?}")]
  StudentsNotFound(Vec<i64>),

  /// Point read at a key with no record. A normal "no data" outcome for
  /// reads, surfaced explicitly rather than as an empty result.
  #[error("no attendance record for course {course_id}, student {student_id} on {date}")]
  RecordNotFound {
    course_id:  i64,
    student_id: i64,
    date:       NaiveDate,
  },

  /// A submitted page limit above the endpoint's cap. Rejected, not
  /// clamped, so behavior stays predictable under test.
  #[error("limit {limit} exceeds the cap of {cap}")]
  LimitExceeded { limit: u64, cap: u64 },

  #[error("date range is inverted: {from} > {to}")]
  InvalidDateRange { from: NaiveDate, to: NaiveDate },

  #[error("risk threshold must be at least 1, got {0}")]
  InvalidThreshold(u32),

  /// A fault in the backing store or directory, outside the core's control.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error; used by the engine when a trait call fails.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  /// True for the whole NotFound family (missing entity or missing record).
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::CourseNotFound(_)
        | Self::StudentNotFound(_)
        | Self::StudentsNotFound(_)
        | Self::RecordNotFound { .. }
    )
  }

  /// True for input rejected before any lookup or store access.
  pub fn is_validation(&self) -> bool {
    matches!(
      self,
      Self::LimitExceeded { .. }
        | Self::InvalidDateRange { .. }
        | Self::InvalidThreshold(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
